//! Lays out assistant text as terminal lines.
//!
//! The same function serves live redraws and the final render, so what the
//! user watches stream in is exactly what stays on screen.

use codeclaw_core::agent::UiConfig;
use crossterm::style::{Attribute, Color, ContentStyle};
use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Render `text` into lines no wider than `ui.max_width` columns.
///
/// With markdown enabled the text is parsed as CommonMark: headings and
/// strong text are bold, list items get `•` or their number with a hanging
/// indent, and fenced code is indented, dimmed and left unwrapped. Without
/// it every source line is wrapped as-is.
pub fn render_panel(text: &str, ui: &UiConfig) -> Vec<String> {
    let width = usize::from(ui.max_width).max(1);
    if !ui.markdown_enabled {
        let mut lines: Vec<String> = text.lines().flat_map(|raw| wrap(raw, width)).collect();
        if text.ends_with('\n') {
            lines.push(String::new());
        }
        return lines;
    }
    PanelRenderer::new(width).render(text)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct SpanStyle {
    bold: bool,
    italic: bool,
    strike: bool,
    code: bool,
    dim: bool,
}

impl SpanStyle {
    fn paint(self, text: &str) -> String {
        if self == Self::default() {
            return text.to_string();
        }
        let mut style = ContentStyle::new();
        if self.bold {
            style.attributes.set(Attribute::Bold);
        }
        if self.italic {
            style.attributes.set(Attribute::Italic);
        }
        if self.strike {
            style.attributes.set(Attribute::CrossedOut);
        }
        if self.dim {
            style.attributes.set(Attribute::Dim);
        }
        if self.code {
            style.foreground_color = Some(Color::Cyan);
        }
        style.apply(text).to_string()
    }
}

#[derive(Debug, Clone)]
struct Span {
    text: String,
    style: SpanStyle,
}

/// A run of spans with no space between them.
type Word = Vec<Span>;

struct PanelRenderer {
    width: usize,
    lines: Vec<String>,
    spans: Vec<Span>,

    // Counters so `# Heading with **bold**` stays bold after the inner tag ends.
    bold: usize,
    italic: usize,
    strike: usize,

    in_code_block: bool,
    code_block: String,

    in_table: bool,
    table_rows: Vec<Vec<String>>,
    table_row: Vec<String>,
    table_cell: String,

    list_stack: Vec<Option<u64>>,
    item_lead: Option<String>,
    item_pads: Vec<usize>,
}

impl PanelRenderer {
    fn new(width: usize) -> Self {
        Self {
            width,
            lines: Vec::new(),
            spans: Vec::new(),
            bold: 0,
            italic: 0,
            strike: 0,
            in_code_block: false,
            code_block: String::new(),
            in_table: false,
            table_rows: Vec::new(),
            table_row: Vec::new(),
            table_cell: String::new(),
            list_stack: Vec::new(),
            item_lead: None,
            item_pads: Vec::new(),
        }
    }

    fn render(mut self, text: &str) -> Vec<String> {
        let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS;
        for event in Parser::new_ext(text, options) {
            self.handle_event(event);
        }
        // An unterminated fence mid-stream still shows its body.
        if self.in_code_block {
            self.end_code_block();
        }
        self.flush_line();
        self.lines
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Start(tag) => self.start_tag(tag),
            Event::End(tag) => self.end_tag(tag),
            Event::Text(text) => self.handle_text(&text),
            Event::Code(code) => self.handle_inline_code(&code),
            Event::SoftBreak => self.push_span(" ", SpanStyle::default()),
            Event::HardBreak => self.flush_line(),
            Event::Rule => {
                self.flush_line();
                self.separate_block();
                let rule = "─".repeat(self.width.min(40));
                self.lines.push(SpanStyle { dim: true, ..SpanStyle::default() }.paint(&rule));
            }
            Event::TaskListMarker(done) => {
                self.push_span(if done { "[x] " } else { "[ ] " }, SpanStyle::default());
            }
            // Models emit XML-ish tags that parse as HTML; show them rather than drop them.
            Event::Html(html) => {
                for line in html.lines() {
                    self.push_span(line, SpanStyle::default());
                    self.flush_line();
                }
            }
            Event::InlineHtml(html) => self.handle_text(&html),
            _ => {}
        }
    }

    fn start_tag(&mut self, tag: Tag) {
        match tag {
            Tag::Paragraph => self.separate_block(),
            Tag::Heading { .. } => {
                self.separate_block();
                self.bold += 1;
            }
            Tag::Strong => self.bold += 1,
            Tag::Emphasis => self.italic += 1,
            Tag::Strikethrough => self.strike += 1,
            Tag::CodeBlock(_) => {
                self.flush_line();
                self.separate_block();
                self.in_code_block = true;
                self.code_block.clear();
            }
            Tag::List(start) => {
                self.flush_line();
                self.list_stack.push(start);
            }
            Tag::Item => {
                self.flush_line();
                let indent = "  ".repeat(self.list_stack.len().saturating_sub(1));
                let marker = match self.list_stack.last_mut() {
                    Some(Some(n)) => {
                        let m = format!("{indent}{n}. ");
                        *n += 1;
                        m
                    }
                    _ => format!("{indent}• "),
                };
                self.item_pads.push(marker.width());
                self.item_lead = Some(marker);
            }
            Tag::Table(_) => {
                self.flush_line();
                self.separate_block();
                self.in_table = true;
                self.table_rows.clear();
            }
            Tag::TableHead | Tag::TableRow => self.table_row.clear(),
            Tag::TableCell => self.table_cell.clear(),
            _ => {}
        }
    }

    fn end_tag(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => self.flush_line(),
            TagEnd::Heading(_) => {
                self.flush_line();
                self.bold = self.bold.saturating_sub(1);
            }
            TagEnd::Strong => self.bold = self.bold.saturating_sub(1),
            TagEnd::Emphasis => self.italic = self.italic.saturating_sub(1),
            TagEnd::Strikethrough => self.strike = self.strike.saturating_sub(1),
            TagEnd::CodeBlock => self.end_code_block(),
            TagEnd::List(_) => {
                self.flush_line();
                self.list_stack.pop();
            }
            TagEnd::Item => {
                self.flush_line();
                self.item_pads.pop();
                self.item_lead = None;
            }
            TagEnd::TableCell => self.table_row.push(std::mem::take(&mut self.table_cell)),
            TagEnd::TableHead | TagEnd::TableRow => {
                if !self.table_row.is_empty() {
                    self.table_rows.push(std::mem::take(&mut self.table_row));
                }
            }
            TagEnd::Table => {
                self.in_table = false;
                self.render_table();
            }
            _ => {}
        }
    }

    fn handle_text(&mut self, text: &str) {
        if self.in_code_block {
            self.code_block.push_str(text);
        } else if self.in_table {
            self.table_cell.push_str(text);
        } else {
            self.push_span(text, self.current_style());
        }
    }

    fn handle_inline_code(&mut self, code: &str) {
        if self.in_table {
            self.table_cell.push_str(code);
        } else {
            self.push_span(code, SpanStyle { code: true, ..self.current_style() });
        }
    }

    fn current_style(&self) -> SpanStyle {
        SpanStyle {
            bold: self.bold > 0,
            italic: self.italic > 0,
            strike: self.strike > 0,
            ..SpanStyle::default()
        }
    }

    fn push_span(&mut self, text: &str, style: SpanStyle) {
        self.spans.push(Span { text: text.to_string(), style });
    }

    /// Blank line between top-level blocks. List items stay tight.
    fn separate_block(&mut self) {
        if self.list_stack.is_empty() && self.lines.last().is_some_and(|l| !l.is_empty()) {
            self.lines.push(String::new());
        }
    }

    fn flush_line(&mut self) {
        if self.spans.is_empty() {
            return;
        }
        let spans = std::mem::take(&mut self.spans);
        let pad = self.item_pads.last().copied().unwrap_or(0);
        let lead = self.item_lead.take().unwrap_or_else(|| " ".repeat(pad));
        let indent = " ".repeat(pad);
        let lead_width = lead.width();

        if lead_width >= self.width {
            self.lines.extend(wrap_spans(&spans, self.width));
            return;
        }
        for (i, line) in wrap_spans(&spans, self.width - lead_width).into_iter().enumerate() {
            let prefix = if i == 0 { &lead } else { &indent };
            self.lines.push(format!("{prefix}{line}"));
        }
    }

    fn end_code_block(&mut self) {
        self.in_code_block = false;
        let dim = SpanStyle { dim: true, ..SpanStyle::default() };
        let indent = " ".repeat(self.item_pads.last().copied().unwrap_or(0) + 2);
        for line in std::mem::take(&mut self.code_block).lines() {
            self.lines.push(dim.paint(&format!("{indent}{line}")));
        }
    }

    fn render_table(&mut self) {
        let rows = std::mem::take(&mut self.table_rows);
        let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
        let mut widths = vec![0; columns];
        for row in &rows {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.trim().width());
            }
        }

        let header = SpanStyle { bold: true, ..SpanStyle::default() };
        for (r, row) in rows.iter().enumerate() {
            let cells: Vec<String> = widths
                .iter()
                .enumerate()
                .map(|(i, &w)| {
                    let cell = row.get(i).map_or("", |c| c.trim());
                    format!("{cell}{}", " ".repeat(w.saturating_sub(cell.width())))
                })
                .collect();
            for line in wrap(cells.join(" │ ").trim_end(), self.width) {
                self.lines.push(if r == 0 { header.paint(&line) } else { line });
            }
            if r == 0 {
                let rule: Vec<String> = widths.iter().map(|&w| "─".repeat(w)).collect();
                for line in wrap(&rule.join("─┼─"), self.width) {
                    self.lines.push(line);
                }
            }
        }
    }
}

/// Split spans into words. A word may carry several styles, as in `**bold**ness`.
fn words(spans: &[Span]) -> Vec<Word> {
    let mut words: Vec<Word> = Vec::new();
    let mut open = false;
    for span in spans {
        for (i, part) in span.text.split(' ').enumerate() {
            if i > 0 {
                open = false;
            }
            if part.is_empty() {
                continue;
            }
            let piece = Span { text: part.to_string(), style: span.style };
            match words.last_mut() {
                Some(word) if open => word.push(piece),
                _ => words.push(vec![piece]),
            }
            open = true;
        }
    }
    words
}

fn word_width(word: &Word) -> usize {
    word.iter().map(|s| s.text.width()).sum()
}

/// Break a word wider than `width` into chunks that fit.
fn split_word(word: Word, width: usize) -> Vec<Word> {
    let mut chunks = Vec::new();
    let mut current: Word = Vec::new();
    let mut current_width = 0;
    for span in word {
        let mut piece = String::new();
        for ch in span.text.chars() {
            let w = ch.width().unwrap_or(0);
            if current_width + w > width && current_width > 0 {
                if !piece.is_empty() {
                    current.push(Span { text: std::mem::take(&mut piece), style: span.style });
                }
                chunks.push(std::mem::take(&mut current));
                current_width = 0;
            }
            piece.push(ch);
            current_width += w;
        }
        if !piece.is_empty() {
            current.push(Span { text: piece, style: span.style });
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Greedy word wrap over styled spans; styling never counts toward width.
fn wrap_spans(spans: &[Span], width: usize) -> Vec<String> {
    let mut lines: Vec<Vec<Word>> = Vec::new();
    let mut current: Vec<Word> = Vec::new();
    let mut current_width = 0;

    for word in words(spans) {
        let w = word_width(&word);
        let sep = usize::from(!current.is_empty());
        if current_width + sep + w <= width {
            current_width += sep + w;
            current.push(word);
            continue;
        }
        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
            current_width = 0;
        }
        if w <= width {
            current_width = w;
            current.push(word);
            continue;
        }
        let mut chunks = split_word(word, width);
        let last = chunks.pop();
        lines.extend(chunks.into_iter().map(|c| vec![c]));
        if let Some(last) = last {
            current_width = word_width(&last);
            current.push(last);
        }
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }

    lines
        .into_iter()
        .map(|line| {
            line.iter()
                .map(|word| word.iter().map(|s| s.style.paint(&s.text)).collect::<String>())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

/// Greedy word wrap by display width. Words wider than `width` are split.
pub fn wrap(line: &str, width: usize) -> Vec<String> {
    if line.width() <= width {
        return vec![line.to_string()];
    }
    wrap_spans(&[Span { text: line.to_string(), style: SpanStyle::default() }], width)
}
