//! Terminal rendering of assistant text.

pub mod format;
pub mod live;

pub use format::render_panel;
pub use live::LiveRenderer;
