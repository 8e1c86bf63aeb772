//! The interactive loop: slash commands and requests to the agent.

use std::sync::Arc;
use std::time::Duration;

use codeclaw_agent::{AgentError, AgentLoop, PlanOutcome, RunOutcome, RunView};
use codeclaw_core::agent::{SafetyLevel, StreamingMode};
use crossterm::style::Stylize;
use tracing::warn;

use crate::console::{Console, Shutdown};
use crate::view::TerminalView;

/// One parsed line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// A request for the agent
    Prompt(String),
    Plan(String),
    Execute,
    Safety(Option<String>),
    Width(String),
    Markdown(String),
    Stream(String),
    Model(String),
    WebSearch(String),
    Clear,
    Usage,
    Help,
    Exit,
    Unknown(String),
    Empty,
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        if matches!(line, "exit" | "quit") {
            return Self::Exit;
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Self::Prompt(line.to_string());
        };

        let (name, arg) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        let arg = arg.trim().to_string();
        match name {
            "plan" => Self::Plan(arg),
            "execute" => Self::Execute,
            "safety" => Self::Safety((!arg.is_empty()).then_some(arg)),
            "width" => Self::Width(arg),
            "markdown" => Self::Markdown(arg),
            "stream" => Self::Stream(arg),
            "model" => Self::Model(arg),
            "websearch" => Self::WebSearch(arg),
            "clear" => Self::Clear,
            "usage" => Self::Usage,
            "help" => Self::Help,
            "exit" | "quit" => Self::Exit,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// `on`/`off` and the usual synonyms.
pub fn parse_toggle(arg: &str) -> Option<bool> {
    match arg.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Some(true),
        "off" | "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

pub fn legend() -> String {
    [
        "Commands:",
        "  /plan <task>         explore read-only and propose a plan",
        "  /execute             run the pending plan",
        "  /safety [level]      full | delete-only | off (no argument cycles)",
        "  /width <n>           render width, 40-140",
        "  /markdown on|off     markdown formatting",
        "  /stream live|final   live redraw or render at the end",
        "  /model <id>          switch model",
        "  /websearch on|off    let the model search the web",
        "  /clear               forget the conversation",
        "  /usage               token usage",
        "  /help                this list",
        "  /exit                save and quit",
        "Markers: ⚙ tool  ✓ ok  ✗ failed  ⊘ declined  ⚠ warning",
    ]
    .join("\n")
}

enum Flow {
    Continue,
    Exit,
}

pub struct Repl {
    agent: Arc<AgentLoop>,
    console: Arc<Console>,
    shutdown: Shutdown,
    throttle: Duration,
}

impl Repl {
    pub fn new(agent: Arc<AgentLoop>, console: Arc<Console>, shutdown: Shutdown, throttle: Duration) -> Self {
        Self {
            agent,
            console,
            shutdown,
            throttle,
        }
    }

    pub async fn run(&self) {
        if self.agent.ui().show_legend_on_startup {
            println!("{}\n", legend().dark_grey());
        }

        loop {
            if self.shutdown.is_triggered() {
                break;
            }
            let line = match self.console.read_line(&format!("{} ", "❯".cyan())).await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Input failed");
                    break;
                }
            };

            if let Flow::Exit = self.handle(Command::parse(&line)).await {
                break;
            }
        }
    }

    fn view(&self) -> TerminalView {
        TerminalView::new(self.agent.ui(), self.throttle)
    }

    async fn handle(&self, command: Command) -> Flow {
        match command {
            Command::Empty => {}
            Command::Exit => return Flow::Exit,
            Command::Help => println!("{}", legend()),
            Command::Unknown(name) => println!("Unknown command /{name}. Type /help for the list."),

            Command::Prompt(text) => {
                let mut view = self.view();
                let result = self.agent.run(&text, &mut view).await;
                report_run(result, &mut view);
            }
            Command::Plan(task) if task.is_empty() => println!("Usage: /plan <task>"),
            Command::Plan(task) => {
                let mut view = self.view();
                match self.agent.plan(&task, &mut view).await {
                    Ok(PlanOutcome::Stored(_)) => {
                        println!("\n{}", "Plan stored. Run /execute to carry it out.".green());
                    }
                    Ok(PlanOutcome::NoPlanFound) => {}
                    Ok(PlanOutcome::Stopped | PlanOutcome::Interrupted) => println!("Planning stopped."),
                    Err(e) => eprintln!("{} {e}", "✗".red()),
                }
            }
            Command::Execute => {
                let mut view = self.view();
                let result = self.agent.execute_plan(&mut view).await;
                report_run(result, &mut view);
            }

            Command::Safety(None) => {
                let level = self.agent.cycle_safety_level();
                println!("Safety level: {level}");
            }
            Command::Safety(Some(arg)) => match arg.parse::<SafetyLevel>() {
                Ok(level) => {
                    self.agent.set_safety_level(level);
                    println!("Safety level: {level}");
                }
                Err(e) => println!("{e}"),
            },
            Command::Width(arg) => match arg.parse::<u16>() {
                Ok(width) => {
                    let applied = self.agent.set_max_width(width);
                    println!("Width: {applied}");
                }
                Err(_) => println!("Usage: /width <40-140>"),
            },
            Command::Markdown(arg) => match parse_toggle(&arg) {
                Some(enabled) => {
                    self.agent.set_markdown(enabled);
                    println!("Markdown: {}", if enabled { "on" } else { "off" });
                }
                None => println!("Usage: /markdown on|off"),
            },
            Command::Stream(arg) => match arg.parse::<StreamingMode>() {
                Ok(mode) => {
                    self.agent.set_streaming_mode(mode);
                    println!("Streaming: {mode}");
                }
                Err(_) => println!("Usage: /stream live|final"),
            },
            Command::Model(arg) if arg.is_empty() => println!("Model: {}", self.agent.settings().model),
            Command::Model(arg) => match self.agent.set_model(&arg) {
                Ok(()) => println!("Model: {arg}"),
                Err(e) => println!("{e}"),
            },
            Command::WebSearch(arg) => match parse_toggle(&arg) {
                Some(enabled) => {
                    self.agent.set_web_search(enabled);
                    println!("Web search: {}", if enabled { "on" } else { "off" });
                }
                None => println!("Usage: /websearch on|off"),
            },
            Command::Clear => match self.agent.clear().await {
                Ok(()) => println!("Conversation cleared."),
                Err(e) => eprintln!("{} {e}", "✗".red()),
            },
            Command::Usage => println!("Tokens this session: {}", self.agent.usage().await),
        }
        Flow::Continue
    }
}

fn report_run(result: Result<RunOutcome, AgentError>, view: &mut dyn RunView) {
    match result {
        Ok(RunOutcome::Completed { summary }) => {
            if let Some(summary) = summary {
                println!("\n{} {summary}", "✓".green());
            }
        }
        Ok(RunOutcome::Stopped | RunOutcome::Interrupted) => {}
        Err(e) => view.notice(codeclaw_agent::NoticeLevel::Error, &e.to_string()),
    }
}
