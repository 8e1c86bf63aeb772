//! Run events: how the agent reports progress to whatever is displaying it.

use codeclaw_core::agent::AgentRunState;
use codeclaw_core::message::TokenUsage;
use tokio::time::Instant;

/// Visual marker attached to a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warn,
    Error,
    Denied,
}

/// Receives everything a run wants the user to see.
///
/// Callbacks are synchronous and called from the run's task. The render
/// hooks let a view throttle redraws: the run waits on
/// [`RunView::redraw_deadline`] alongside the model stream and calls
/// [`RunView::redraw_due`] when it passes.
pub trait RunView: Send {
    fn state_changed(&mut self, state: AgentRunState);

    /// A piece of assistant text arrived.
    fn text_delta(&mut self, delta: &str);

    /// When the view next wants [`RunView::redraw_due`] to be called.
    fn redraw_deadline(&self) -> Option<Instant> {
        None
    }

    fn redraw_due(&mut self) {}

    /// The assistant text for this turn is complete.
    fn text_finished(&mut self, text: &str);

    /// The stream failed; any partial text is void.
    fn stream_aborted(&mut self);

    fn tool_started(&mut self, name: &str, summary: &str);

    fn tool_finished(&mut self, name: &str, success: bool, output: &str);

    fn notice(&mut self, level: NoticeLevel, text: &str);

    /// Token counts for the run just ended and for the whole session.
    fn usage(&mut self, run: TokenUsage, session: TokenUsage);
}

/// A view that discards everything.
#[derive(Debug, Default)]
pub struct NullView;

impl RunView for NullView {
    fn state_changed(&mut self, _state: AgentRunState) {}
    fn text_delta(&mut self, _delta: &str) {}
    fn text_finished(&mut self, _text: &str) {}
    fn stream_aborted(&mut self) {}
    fn tool_started(&mut self, _name: &str, _summary: &str) {}
    fn tool_finished(&mut self, _name: &str, _success: bool, _output: &str) {}
    fn notice(&mut self, _level: NoticeLevel, _text: &str) {}
    fn usage(&mut self, _run: TokenUsage, _session: TokenUsage) {}
}
