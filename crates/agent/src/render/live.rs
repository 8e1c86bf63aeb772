//! Throttled in-place redraw of streaming assistant text.
//!
//! Each redraw renders the whole accumulated text with [`render_panel`],
//! moves the cursor back to the top of the previous block, clears
//! downward and writes the new block. Redraws happen at most once per
//! throttle interval; a pending one is flushed by [`LiveRenderer::tick`]
//! or [`LiveRenderer::finish`].
//!
//! The cursor cannot move above the top of the viewport, so while
//! streaming only the tail that fits on screen is drawn. The full block
//! is written once by `finish`.

use std::io::{self, Write};
use std::time::Duration;

use codeclaw_core::agent::{StreamingMode, UiConfig};
use crossterm::cursor::MoveToPreviousLine;
use crossterm::queue;
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};
use tokio::time::Instant;

use super::format::render_panel;

pub struct LiveRenderer<W: Write> {
    out: W,
    ui: UiConfig,
    throttle: Duration,
    cursor_capable: bool,
    viewport_rows: Option<usize>,
    text: String,
    drawn_lines: usize,
    clipped: bool,
    last_draw: Option<Instant>,
    dirty: bool,
    finished: bool,
    redraws: usize,
}

impl<W: Write> LiveRenderer<W> {
    pub fn new(out: W, ui: UiConfig, throttle: Duration, cursor_capable: bool) -> Self {
        Self {
            out,
            ui,
            throttle,
            cursor_capable,
            viewport_rows: None,
            text: String::new(),
            drawn_lines: 0,
            clipped: false,
            last_draw: None,
            dirty: false,
            finished: false,
            redraws: 0,
        }
    }

    /// Whether this renderer draws anything at all. When it does not, the
    /// caller renders the text once at the end of the turn.
    pub fn is_live(&self) -> bool {
        self.cursor_capable && self.ui.streaming_mode == StreamingMode::Live
    }

    /// Start a fresh block for a new turn, with the current UI settings.
    pub fn reset(&mut self, ui: UiConfig) {
        self.ui = ui;
        self.text.clear();
        self.drawn_lines = 0;
        self.clipped = false;
        self.last_draw = None;
        self.dirty = false;
        self.finished = false;
    }

    /// Rows available for the live block, usually the terminal height
    /// minus one. `None` draws the whole block on every redraw.
    pub fn set_viewport_rows(&mut self, rows: Option<usize>) {
        self.viewport_rows = rows.map(|r| r.max(1));
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn redraws(&self) -> usize {
        self.redraws
    }

    pub fn writer(&mut self) -> &mut W {
        &mut self.out
    }

    /// Append a delta. Draws immediately if the throttle allows, otherwise
    /// marks the block dirty for the next [`LiveRenderer::tick`].
    pub fn push(&mut self, delta: &str, now: Instant) -> io::Result<()> {
        self.text.push_str(delta);
        if !self.is_live() || self.finished {
            return Ok(());
        }
        match self.last_draw {
            Some(last) if now < last + self.throttle => {
                self.dirty = true;
                Ok(())
            }
            _ => self.redraw(now, false),
        }
    }

    /// When a pending redraw becomes due.
    pub fn next_deadline(&self) -> Option<Instant> {
        if !self.dirty || self.finished || !self.is_live() {
            return None;
        }
        self.last_draw.map(|last| last + self.throttle)
    }

    /// Run a pending redraw if its deadline has passed.
    pub fn tick(&mut self, now: Instant) -> io::Result<()> {
        match self.next_deadline() {
            Some(deadline) if now >= deadline => self.redraw(now, false),
            _ => Ok(()),
        }
    }

    /// Final synchronous flush. Leaves the cursor after the block; nothing
    /// is drawn for this turn afterwards. Returns whether the text is
    /// already on screen.
    pub fn finish(&mut self, now: Instant) -> io::Result<bool> {
        if self.finished {
            return Ok(self.drawn_lines > 0);
        }
        if self.is_live() && (self.dirty || self.clipped || (self.drawn_lines == 0 && !self.text.is_empty())) {
            self.redraw(now, true)?;
        }
        self.finished = true;
        Ok(self.drawn_lines > 0)
    }

    /// Erase whatever was drawn for this turn and stop drawing.
    pub fn abort(&mut self) -> io::Result<()> {
        if self.drawn_lines > 0 {
            self.clear_block()?;
            self.out.flush()?;
        }
        self.drawn_lines = 0;
        self.clipped = false;
        self.dirty = false;
        self.finished = true;
        Ok(())
    }

    fn clear_block(&mut self) -> io::Result<()> {
        let up = u16::try_from(self.drawn_lines).unwrap_or(u16::MAX);
        queue!(self.out, MoveToPreviousLine(up), Clear(ClearType::FromCursorDown))
    }

    fn redraw(&mut self, now: Instant, full: bool) -> io::Result<()> {
        let lines = render_panel(&self.text, &self.ui);
        let skip = match self.viewport_rows {
            Some(rows) if !full => lines.len().saturating_sub(rows),
            _ => 0,
        };
        if self.drawn_lines > 0 {
            self.clear_block()?;
        }
        for line in &lines[skip..] {
            queue!(self.out, Print(line), Print("\n"))?;
        }
        self.out.flush()?;

        self.drawn_lines = lines.len() - skip;
        self.clipped = skip > 0;
        self.last_draw = Some(now);
        self.dirty = false;
        self.redraws += 1;
        Ok(())
    }
}
