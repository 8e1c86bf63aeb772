//! The run controller: one user request driven to completion.
//!
//! Each turn rebuilds the system prompt, trims the conversation to the
//! context budget, streams the model's reply through the
//! [`StreamAssembler`], and executes any tool calls in order through the
//! [`SafetyGate`]. Plain text never ends a run by itself; only the `done`
//! tool does (or the user declining to continue at the step ceiling).
//! An interrupt is honoured between steps and between tool calls, never
//! in the middle of one.

use std::sync::{Arc, MutexGuard, PoisonError};

use codeclaw_config::AppConfig;
use codeclaw_core::agent::{AgentRunState, SafetyLevel, StreamingMode, UiConfig};
use codeclaw_core::error::ProviderError;
use codeclaw_core::human::HumanIo;
use codeclaw_core::message::{Message, MessageToolCall, TokenUsage};
use codeclaw_core::provider::{Provider, ProviderRequest, ToolDefinition};
use codeclaw_core::tool::ToolRegistry;
use codeclaw_session::{SessionRecord, SessionStore};
use codeclaw_tools::{ASK_USER, DONE};
use tokio::sync::{Mutex, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::context::ContextBudget;
use crate::error::AgentError;
use crate::event::{NoticeLevel, RunView};
use crate::guard::RunGuard;
use crate::intent;
use crate::planning::PendingPlan;
use crate::prompt::{self, SystemPromptBuilder};
use crate::safety::{GateOutcome, OperationSummary, SafetyGate};
use crate::stream_assembler::{AssembledTurn, StreamAssembler};
use crate::truncate::truncate_output;

/// Reminder sent when the model answers with text but no tool call.
pub const CONTINUE_NUDGE: &str = "You replied without calling a tool. \
If the task is finished, call the `done` tool with a summary. \
Otherwise continue working by calling the appropriate tool.";

/// Tool result when `ask_user` gets an empty reply or no input at all.
const NO_ANSWER: &str = "(the user gave no answer)";

/// Tool result for calls skipped because the run was interrupted.
const INTERRUPTED_RESULT: &str = "Not run: the user interrupted the session before this call.";

/// How a run ended, when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The model called `done`.
    Completed { summary: Option<String> },
    /// The user declined to continue past the step ceiling.
    Stopped,
    /// An interrupt arrived; the run stopped at the next step boundary.
    Interrupted,
}

/// Runtime-adjustable settings, seeded from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub web_search: bool,
    pub safety_level: SafetyLevel,
    pub ui: UiConfig,
    pub step_ceiling: u32,
    pub history_tool_output_chars: usize,
    pub context_tool_output_chars: usize,
}

impl AgentSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.default_model.clone(),
            temperature: config.default_temperature,
            max_tokens: Some(config.default_max_tokens),
            web_search: config.web_search,
            safety_level: config.agent.safety_level,
            ui: config.ui_config(),
            step_ceiling: config.agent.step_ceiling.max(1),
            history_tool_output_chars: config.agent.history_tool_output_chars,
            context_tool_output_chars: config.agent.context_tool_output_chars,
        }
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RunMode {
    Full,
    Planning,
}

/// How the turn loop stopped.
#[derive(Debug)]
pub(crate) enum Finish {
    Done(Option<String>),
    Stopped,
    Interrupted,
    PlanText(String),
    NoPlan,
}

#[derive(Debug, Default)]
pub(crate) struct SessionState {
    pub(crate) history: Vec<Message>,
    pub(crate) usage: TokenUsage,
    pub(crate) pending_plan: Option<PendingPlan>,
}

impl SessionState {
    fn record(&self) -> SessionRecord {
        SessionRecord {
            messages: self.history.clone(),
            usage: self.usage,
        }
    }
}

/// The agent: owns the conversation and runs requests against it.
pub struct AgentLoop {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    human: Arc<dyn HumanIo>,
    store: Arc<dyn SessionStore>,
    gate: SafetyGate,
    prompt: SystemPromptBuilder,
    budget: ContextBudget,
    interrupt: Option<watch::Receiver<bool>>,
    pub(crate) guard: RunGuard,
    settings: std::sync::Mutex<AgentSettings>,
    pub(crate) session: Mutex<SessionState>,
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        human: Arc<dyn HumanIo>,
        store: Arc<dyn SessionStore>,
        prompt: SystemPromptBuilder,
        settings: AgentSettings,
    ) -> Self {
        Self {
            gate: SafetyGate::new(tools.clone(), human.clone()),
            provider,
            tools,
            human,
            store,
            prompt,
            budget: ContextBudget::default(),
            interrupt: None,
            guard: RunGuard::new(),
            settings: std::sync::Mutex::new(settings),
            session: Mutex::new(SessionState::default()),
        }
    }

    /// Use a specific context budget instead of the defaults.
    pub fn with_budget(mut self, budget: ContextBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Stop runs at the next step boundary once `interrupt` reads `true`.
    pub fn with_interrupt(mut self, interrupt: watch::Receiver<bool>) -> Self {
        self.interrupt = Some(interrupt);
        self
    }

    fn interrupted(&self) -> bool {
        self.interrupt.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Load the saved session, replacing the in-memory one.
    pub async fn restore(&self) {
        let record = self.store.load().await;
        let mut session = self.session.lock().await;
        info!(messages = record.messages.len(), "Restored session");
        session.history = record.messages;
        session.usage = record.usage;
    }

    /// Persist the current session.
    pub async fn save(&self) -> Result<(), AgentError> {
        let session = self.session.lock().await;
        self.store
            .save(&session.record())
            .await
            .map_err(|e| AgentError::Internal(e.to_string()))
    }

    /// Forget the conversation and token counters, then save.
    pub async fn clear(&self) -> Result<(), AgentError> {
        let _permit = self.guard.try_acquire().ok_or(AgentError::RunInProgress)?;
        {
            let mut session = self.session.lock().await;
            session.history.clear();
            session.usage.clear();
            session.pending_plan = None;
        }
        info!("Session cleared");
        self.save().await
    }

    pub async fn usage(&self) -> TokenUsage {
        self.session.lock().await.usage
    }

    pub async fn history_len(&self) -> usize {
        self.session.lock().await.history.len()
    }

    pub fn is_running(&self) -> bool {
        self.guard.is_active()
    }

    // ── Settings ──

    fn lock_settings(&self) -> MutexGuard<'_, AgentSettings> {
        self.settings.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current settings.
    pub fn settings(&self) -> AgentSettings {
        self.lock_settings().clone()
    }

    pub fn ui(&self) -> UiConfig {
        self.lock_settings().ui.clone()
    }

    pub fn set_model(&self, model: &str) -> Result<(), AgentError> {
        let model = model.trim();
        if model.is_empty() || model.contains(char::is_whitespace) {
            return Err(AgentError::InvalidSetting(format!("not a model identifier: '{model}'")));
        }
        self.lock_settings().model = model.to_string();
        Ok(())
    }

    pub fn set_web_search(&self, enabled: bool) {
        self.lock_settings().web_search = enabled;
    }

    /// Advance `full → delete-only → off → full`. Returns the new level.
    pub fn cycle_safety_level(&self) -> SafetyLevel {
        let mut settings = self.lock_settings();
        settings.safety_level = settings.safety_level.next();
        settings.safety_level
    }

    pub fn set_safety_level(&self, level: SafetyLevel) {
        self.lock_settings().safety_level = level;
    }

    /// Set the render width, clamped to the supported range. Returns the
    /// width actually applied.
    pub fn set_max_width(&self, width: u16) -> u16 {
        self.lock_settings().ui.set_max_width(width)
    }

    pub fn set_markdown(&self, enabled: bool) {
        self.lock_settings().ui.markdown_enabled = enabled;
    }

    pub fn set_streaming_mode(&self, mode: StreamingMode) {
        self.lock_settings().ui.streaming_mode = mode;
    }

    pub fn set_show_legend(&self, show: bool) {
        self.lock_settings().ui.show_legend_on_startup = show;
    }

    // ── Runs ──

    /// Handle one user request until `done`, a stop at the step ceiling,
    /// or a fatal error. The session is saved either way.
    pub async fn run(&self, input: &str, view: &mut dyn RunView) -> Result<RunOutcome, AgentError> {
        let _permit = self.guard.try_acquire().ok_or(AgentError::RunInProgress)?;
        self.run_unguarded(input, view).await
    }

    pub(crate) async fn run_unguarded(&self, input: &str, view: &mut dyn RunView) -> Result<RunOutcome, AgentError> {
        let settings = self.settings();
        let mut session = self.session.lock().await;
        let before = session.usage;
        info!(model = %settings.model, history = session.history.len(), "Starting run");

        let result = self.drive(RunMode::Full, input, &settings, &mut session, view).await;
        self.conclude(&session, before, result.is_ok(), view).await;

        match result? {
            Finish::Done(summary) => Ok(RunOutcome::Completed { summary }),
            Finish::Stopped => Ok(RunOutcome::Stopped),
            Finish::Interrupted => Ok(RunOutcome::Interrupted),
            Finish::PlanText(_) | Finish::NoPlan => Err(AgentError::Internal("planning result from a full run".into())),
        }
    }

    /// Common end of every run: final state, save, usage summary.
    pub(crate) async fn conclude(&self, session: &SessionState, before: TokenUsage, ok: bool, view: &mut dyn RunView) {
        view.state_changed(if ok { AgentRunState::Complete } else { AgentRunState::Error });

        if let Err(e) = self.store.save(&session.record()).await {
            warn!(error = %e, "Failed to save session");
            view.notice(NoticeLevel::Warn, &format!("Session not saved: {e}"));
        }

        let run = TokenUsage {
            input: session.usage.input.saturating_sub(before.input),
            output: session.usage.output.saturating_sub(before.output),
        };
        view.usage(run, session.usage);
    }

    /// The turn loop shared by full and planning runs.
    pub(crate) async fn drive(
        &self,
        mode: RunMode,
        input: &str,
        settings: &AgentSettings,
        session: &mut SessionState,
        view: &mut dyn RunView,
    ) -> Result<Finish, AgentError> {
        let planning = mode == RunMode::Planning;
        let definitions = if planning {
            self.tools.read_only_definitions()
        } else {
            self.tools.definitions()
        };
        let system = if planning {
            self.prompt.build_planning(&definitions)
        } else {
            self.prompt.build(&definitions)
        };

        // Planning works on a scratch copy; only full runs write history.
        let mut outgoing = session.history.clone();
        let user = Message::user(input);
        if !planning {
            session.history.push(user.clone());
        }
        outgoing.push(user);

        let mut steps = 0u32;
        loop {
            if self.interrupted() {
                info!(steps, "Run interrupted");
                view.notice(NoticeLevel::Info, "Interrupted; run stopped.");
                return Ok(Finish::Interrupted);
            }

            steps += 1;
            if steps > settings.step_ceiling {
                view.state_changed(AgentRunState::Waiting);
                warn!(step_ceiling = settings.step_ceiling, "Step ceiling reached");
                let question = format!(
                    "The agent has taken {} steps. Continue? [y/N] ",
                    settings.step_ceiling
                );
                if !self.human.confirm(&question).await? {
                    info!("User stopped the run at the step ceiling");
                    view.notice(NoticeLevel::Info, "Run stopped at the step limit.");
                    return Ok(Finish::Stopped);
                }
                steps = 1;
            }
            debug!(step = steps, planning, "Agent loop iteration");

            if !planning {
                self.budget.fit(&mut session.history, &settings.model);
            }
            self.budget.fit(&mut outgoing, &settings.model);

            let mut messages = Vec::with_capacity(outgoing.len() + 1);
            messages.push(Message::system(&system));
            messages.extend(outgoing.iter().cloned());

            let request = ProviderRequest {
                model: settings.model.clone(),
                messages,
                temperature: settings.temperature,
                max_tokens: settings.max_tokens,
                tools: definitions.clone(),
                web_search: settings.web_search,
            };

            view.state_changed(AgentRunState::Thinking);
            let turn = self.stream_turn(request, view).await?;
            if let Some(usage) = &turn.usage {
                session.usage.record(usage);
            }

            let AssembledTurn { text, tool_calls, .. } = turn;

            if !tool_calls.is_empty() {
                let assistant = Message::assistant_tool_calls(text, tool_calls.clone());
                push_message(session, &mut outgoing, assistant, planning);

                view.state_changed(AgentRunState::ToolCalling);
                let mut completed = None;
                for call in &tool_calls {
                    // Skipped calls still get a result so every call stays paired.
                    let output = if self.interrupted() {
                        debug!(tool = %call.name, "Skipping tool call after interrupt");
                        INTERRUPTED_RESULT.to_string()
                    } else {
                        self.handle_call(call, planning, settings, view, &mut completed).await?
                    };

                    outgoing.push(Message::tool_result(
                        &call.id,
                        truncate_output(&output, settings.context_tool_output_chars),
                    ));
                    if !planning {
                        session.history.push(Message::tool_result(
                            &call.id,
                            truncate_output(&output, settings.history_tool_output_chars),
                        ));
                    }
                }

                if let Some(summary) = completed {
                    info!(steps, "Run completed");
                    return Ok(Finish::Done(summary));
                }
                continue;
            }

            let text = text.unwrap_or_default();

            if planning {
                if prompt::contains_plan(&text) {
                    return Ok(Finish::PlanText(text));
                }
                return Ok(Finish::NoPlan);
            }

            if !text.is_empty() {
                push_message(session, &mut outgoing, Message::assistant(&text), false);

                if intent::asks_for_input(&text) {
                    view.state_changed(AgentRunState::Waiting);
                    match self.human.ask("> ").await {
                        Ok(Some(reply)) => {
                            debug!("User replied to assistant question");
                            push_message(session, &mut outgoing, Message::user(reply), false);
                            continue;
                        }
                        Ok(None) => {}
                        Err(e) => debug!(error = %e, "No reply to assistant question"),
                    }
                }
            }

            debug!("No tool call in reply; nudging the model");
            outgoing.push(Message::system(CONTINUE_NUDGE));
        }
    }

    /// Stream one model reply, forwarding text to the view and servicing
    /// its redraw deadline while waiting for chunks.
    async fn stream_turn(&self, request: ProviderRequest, view: &mut dyn RunView) -> Result<AssembledTurn, AgentError> {
        let mut rx = match self.provider.stream(request).await {
            Ok(rx) => rx,
            Err(e) => {
                view.stream_aborted();
                return Err(e.into());
            }
        };

        let mut assembler = StreamAssembler::new();
        let mut streaming = false;
        loop {
            tokio::select! {
                chunk = rx.recv() => match chunk {
                    Some(Ok(chunk)) => {
                        let done = chunk.done;
                        if let Some(delta) = assembler.push(chunk) {
                            if !streaming {
                                view.state_changed(AgentRunState::Streaming);
                                streaming = true;
                            }
                            view.text_delta(&delta);
                        }
                        if done {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "Model stream failed");
                        view.stream_aborted();
                        return Err(e.into());
                    }
                    None => {
                        warn!("Model stream closed before completion");
                        view.stream_aborted();
                        return Err(ProviderError::StreamInterrupted("stream closed before completion".into()).into());
                    }
                },
                () = sleep_until(view.redraw_deadline()) => view.redraw_due(),
            }
        }

        let turn = assembler.finish();
        if let Some(text) = &turn.text {
            view.text_finished(text);
        }
        Ok(turn)
    }

    /// Execute one tool call and return the tool-result text.
    async fn handle_call(
        &self,
        call: &MessageToolCall,
        planning: bool,
        settings: &AgentSettings,
        view: &mut dyn RunView,
        completed: &mut Option<Option<String>>,
    ) -> Result<String, AgentError> {
        let name = call.name.as_str();

        if planning && !self.tools.is_read_only(name) {
            warn!(tool = %name, "Rejected non-read-only tool during planning");
            let output = format!(
                "Error: `{name}` is not available while planning. Only read-only tools may be used: {}.",
                tool_names(&self.tools.read_only_definitions())
            );
            view.tool_finished(name, false, &output);
            return Ok(output);
        }

        let arguments = match self.tools.validate(name, &call.arguments) {
            Ok(arguments) => arguments,
            Err(e) => {
                debug!(tool = %name, error = %e, "Tool arguments rejected");
                let output = format!("Error: {e}");
                view.tool_finished(name, false, &output);
                return Ok(output);
            }
        };

        match name {
            ASK_USER => {
                let question = arguments["question"].as_str().unwrap_or_default();
                view.state_changed(AgentRunState::Waiting);
                let answer = match self.human.ask(&format!("{question}\n> ")).await {
                    Ok(answer) => answer,
                    Err(e) => {
                        debug!(error = %e, "ask_user got no input");
                        None
                    }
                };
                Ok(answer.unwrap_or_else(|| NO_ANSWER.into()))
            }
            DONE => {
                let summary = arguments["summary"].as_str().map(String::from);
                *completed = Some(summary);
                Ok("Task marked complete.".into())
            }
            _ => {
                let summary = OperationSummary::describe(name, self.tools.tier(name), &arguments);
                view.tool_started(name, &summary.to_string());

                let outcome = self.gate.dispatch(settings.safety_level, name, arguments, view).await;
                if let GateOutcome::Denied(text) = &outcome {
                    view.notice(NoticeLevel::Denied, text);
                }
                view.tool_finished(name, outcome.is_success(), outcome.as_tool_result());
                Ok(outcome.as_tool_result().to_string())
            }
        }
    }
}

fn push_message(session: &mut SessionState, outgoing: &mut Vec<Message>, message: Message, planning: bool) {
    if !planning {
        session.history.push(message.clone());
    }
    outgoing.push(message);
}

fn tool_names(definitions: &[ToolDefinition]) -> String {
    definitions.iter().map(|d| d.name.as_str()).collect::<Vec<_>>().join(", ")
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
