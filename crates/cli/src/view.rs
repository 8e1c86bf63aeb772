//! Terminal rendering of a run: live assistant text, tool activity,
//! notices and the token summary.

use std::io::{self, IsTerminal, Stdout, Write};
use std::time::Duration;

use codeclaw_agent::{LiveRenderer, NoticeLevel, RunView, render_panel};
use codeclaw_core::agent::{AgentRunState, UiConfig};
use codeclaw_core::message::TokenUsage;
use crossterm::style::Stylize;
use crossterm::terminal::{self, Clear, ClearType};
use crossterm::{cursor, queue};
use tokio::time::Instant;
use tracing::debug;

pub struct TerminalView {
    renderer: LiveRenderer<Stdout>,
    ui: UiConfig,
    status_shown: bool,
}

impl TerminalView {
    pub fn new(ui: UiConfig, throttle: Duration) -> Self {
        let ui = fit_to_terminal(ui);
        let capable = io::stdout().is_terminal() && std::env::var("TERM").map_or(true, |t| t != "dumb");
        let mut renderer = LiveRenderer::new(io::stdout(), ui.clone(), throttle, capable);
        renderer.set_viewport_rows(viewport_rows());
        Self {
            renderer,
            ui,
            status_shown: false,
        }
    }

    /// Start the next block, picking up a resized terminal.
    fn next_block(&mut self) {
        self.renderer.reset(self.ui.clone());
        self.renderer.set_viewport_rows(viewport_rows());
    }

    fn out(&mut self) -> &mut Stdout {
        self.renderer.writer()
    }

    fn show_status(&mut self, label: &str) {
        self.clear_status();
        let line = format!("  {} {label}", "…".dark_grey());
        let result = queue!(self.out(), cursor::MoveToColumn(0), crossterm::style::Print(line));
        report(result.and_then(|()| self.out().flush()));
        self.status_shown = true;
    }

    fn clear_status(&mut self) {
        if !self.status_shown {
            return;
        }
        self.status_shown = false;
        let result = queue!(self.out(), cursor::MoveToColumn(0), Clear(ClearType::CurrentLine));
        report(result.and_then(|()| self.out().flush()));
    }

    fn line(&mut self, text: &str) {
        self.clear_status();
        report(writeln!(self.out(), "{text}"));
    }
}

impl RunView for TerminalView {
    fn state_changed(&mut self, state: AgentRunState) {
        match state {
            AgentRunState::Thinking => self.show_status("thinking"),
            AgentRunState::Executing => self.show_status("running"),
            _ => self.clear_status(),
        }
    }

    fn text_delta(&mut self, delta: &str) {
        self.clear_status();
        report(self.renderer.push(delta, Instant::now()));
    }

    fn redraw_deadline(&self) -> Option<Instant> {
        self.renderer.next_deadline()
    }

    fn redraw_due(&mut self) {
        report(self.renderer.tick(Instant::now()));
    }

    fn text_finished(&mut self, text: &str) {
        self.clear_status();
        match self.renderer.finish(Instant::now()) {
            Ok(true) => {}
            Ok(false) => {
                for line in render_panel(text, &self.ui) {
                    report(writeln!(self.out(), "{line}"));
                }
            }
            Err(e) => debug!(error = %e, "Live render failed"),
        }
        self.next_block();
    }

    fn stream_aborted(&mut self) {
        self.clear_status();
        report(self.renderer.abort());
        self.next_block();
    }

    fn tool_started(&mut self, name: &str, summary: &str) {
        let first = summary.lines().next().unwrap_or_default();
        self.line(&format!("  {} {} {}", "⚙".cyan(), name.bold(), first.dark_grey()));
    }

    fn tool_finished(&mut self, name: &str, success: bool, output: &str) {
        let first = output.lines().next().unwrap_or_default();
        let preview: String = first.chars().take(usize::from(self.ui.max_width).saturating_sub(8)).collect();
        if success {
            self.line(&format!("  {} {name}", "✓".green()));
        } else {
            self.line(&format!("  {} {name}: {}", "✗".red(), preview.dark_grey()));
        }
    }

    fn notice(&mut self, level: NoticeLevel, text: &str) {
        let marker = match level {
            NoticeLevel::Info => "ℹ".blue(),
            NoticeLevel::Warn => "⚠".yellow(),
            NoticeLevel::Error => "✗".red(),
            NoticeLevel::Denied => "⊘".magenta(),
        };
        self.line(&format!("  {marker} {text}"));
    }

    fn usage(&mut self, run: TokenUsage, session: TokenUsage) {
        let summary = format!("tokens: {run} this run, {} session total", session.total());
        self.line(&format!("  {}", summary.dark_grey()));
    }
}

/// Never render wider than the terminal.
fn fit_to_terminal(mut ui: UiConfig) -> UiConfig {
    if let Ok((cols, _)) = terminal::size() {
        ui.max_width = ui.max_width.min(cols.saturating_sub(1).max(20));
    }
    ui
}

/// Rows the live block may occupy: all but the line the cursor rests on.
fn viewport_rows() -> Option<usize> {
    terminal::size().ok().map(|(_, rows)| usize::from(rows.saturating_sub(1)))
}

fn report(result: io::Result<()>) {
    if let Err(e) = result {
        debug!(error = %e, "Terminal write failed");
    }
}
