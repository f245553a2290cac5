//! Serializers that turn ranges of cells back into text.
//!
//! The plain-text decoder feeds the filter chain and clipboard paths; the
//! HTML decoder backs rich-text export of selections.

use std::sync::Arc;

use crate::character::{
    Character, ColorTable, ExtendedCharTable, LineProperty, Rendition,
};

/// Decodes successive lines of terminal characters into an output buffer.
pub trait TerminalCharacterDecoder {
    fn begin(&mut self);
    fn decode_line(&mut self, cells: &[Character], property: LineProperty);
    /// Finish and take the decoded output.
    fn end(&mut self) -> String;
}

/// Produces plain text, ignoring colors and renditions.
pub struct PlainTextDecoder {
    output: String,
    include_trailing_whitespace: bool,
    include_leading_whitespace: bool,
    record_line_positions: bool,
    line_positions: Vec<usize>,
    /// Insert `\n` between lines unless the previous line wrapped.
    line_breaks: bool,
    extended_chars: Option<Arc<ExtendedCharTable>>,
    previous_wrapped: bool,
    started: bool,
}

impl PlainTextDecoder {
    pub fn new() -> Self {
        Self {
            output: String::new(),
            include_trailing_whitespace: true,
            include_leading_whitespace: true,
            record_line_positions: false,
            line_positions: Vec::new(),
            line_breaks: true,
            extended_chars: None,
            previous_wrapped: false,
            started: false,
        }
    }

    pub fn set_trailing_whitespace(&mut self, enable: bool) {
        self.include_trailing_whitespace = enable;
    }

    pub fn set_leading_whitespace(&mut self, enable: bool) {
        self.include_leading_whitespace = enable;
    }

    /// Record the byte offset in the output at which each line begins.
    /// The filter chain uses this to map matches back onto the grid.
    pub fn set_record_line_positions(&mut self, record: bool) {
        self.record_line_positions = record;
    }

    pub fn set_line_breaks(&mut self, enable: bool) {
        self.line_breaks = enable;
    }

    pub fn set_extended_char_table(&mut self, table: Arc<ExtendedCharTable>) {
        self.extended_chars = Some(table);
    }

    pub fn line_positions(&self) -> &[usize] {
        &self.line_positions
    }

    fn push_cell(out: &mut String, cell: &Character, table: Option<&ExtendedCharTable>) {
        if cell.width == 0 {
            return; // trailing half of a wide character
        }
        if cell.rendition.contains(Rendition::EXTENDED) {
            if let Some(seq) = table.and_then(|t| t.lookup(cell.code)) {
                out.extend(seq);
                return;
            }
        }
        out.push(cell.literal_char());
    }
}

impl Default for PlainTextDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalCharacterDecoder for PlainTextDecoder {
    fn begin(&mut self) {
        self.output.clear();
        self.line_positions.clear();
        self.previous_wrapped = false;
        self.started = false;
    }

    fn decode_line(&mut self, cells: &[Character], property: LineProperty) {
        // A wrapped predecessor joins directly with this line so content
        // split across a soft wrap stays contiguous in the output.
        if self.started && !self.previous_wrapped && self.line_breaks {
            self.output.push('\n');
        }
        self.started = true;
        self.previous_wrapped = property.contains(LineProperty::WRAPPED);

        if self.record_line_positions {
            self.line_positions.push(self.output.len());
        }

        let mut count = cells.len();
        if !self.include_trailing_whitespace && !self.previous_wrapped {
            while count > 0 && cells[count - 1].width != 0 && cells[count - 1].literal_char() == ' '
            {
                count -= 1;
            }
        }
        let mut start = 0;
        if !self.include_leading_whitespace {
            while start < count && cells[start].literal_char() == ' ' {
                start += 1;
            }
        }

        let table = self.extended_chars.as_deref();
        for cell in &cells[start..count] {
            Self::push_cell(&mut self.output, cell, table);
        }
    }

    fn end(&mut self) -> String {
        std::mem::take(&mut self.output)
    }
}

/// Produces HTML markup with one span per style run.
pub struct HtmlDecoder {
    output: String,
    color_table: ColorTable,
    extended_chars: Option<Arc<ExtendedCharTable>>,
    inner_span_open: bool,
    last_rendition: Rendition,
    last_fg: Option<(u8, u8, u8)>,
    last_bg: Option<(u8, u8, u8)>,
}

impl HtmlDecoder {
    pub fn new(color_table: ColorTable) -> Self {
        Self {
            output: String::new(),
            color_table,
            extended_chars: None,
            inner_span_open: false,
            last_rendition: Rendition::empty(),
            last_fg: None,
            last_bg: None,
        }
    }

    pub fn set_extended_char_table(&mut self, table: Arc<ExtendedCharTable>) {
        self.extended_chars = Some(table);
    }

    fn open_span(out: &mut String, style: &str) {
        out.push_str(&format!("<span style=\"{style}\">"));
    }

    fn close_span(out: &mut String) {
        out.push_str("</span>");
    }

    fn push_escaped(out: &mut String, c: char) {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            _ => out.push(c),
        }
    }
}

impl TerminalCharacterDecoder for HtmlDecoder {
    fn begin(&mut self) {
        self.output.clear();
        self.inner_span_open = false;
        self.last_rendition = Rendition::empty();
        self.last_fg = None;
        self.last_bg = None;
        Self::open_span(&mut self.output, "font-family:monospace");
    }

    fn decode_line(&mut self, cells: &[Character], _property: LineProperty) {
        let mut space_count = 0;
        for cell in cells {
            if cell.width == 0 {
                continue;
            }
            let fg = cell.fg.resolve(&self.color_table);
            let bg = cell.bg.resolve(&self.color_table);
            // Reverse swaps the resolved colors at export time.
            let (fg, bg) = if cell.rendition.contains(Rendition::REVERSE) {
                (bg, fg)
            } else {
                (fg, bg)
            };

            if cell.rendition != self.last_rendition
                || Some(fg) != self.last_fg
                || Some(bg) != self.last_bg
            {
                if self.inner_span_open {
                    Self::close_span(&mut self.output);
                }
                self.last_rendition = cell.rendition;
                self.last_fg = Some(fg);
                self.last_bg = Some(bg);

                let mut style = String::new();
                if cell.rendition.contains(Rendition::BOLD) {
                    style.push_str("font-weight:bold;");
                }
                if cell.rendition.contains(Rendition::ITALIC) {
                    style.push_str("font-style:italic;");
                }
                if cell.rendition.contains(Rendition::UNDERLINE) {
                    style.push_str("text-decoration:underline;");
                }
                if cell.rendition.contains(Rendition::STRIKEOUT) {
                    style.push_str("text-decoration:line-through;");
                }
                style.push_str(&format!(
                    "color:#{:02x}{:02x}{:02x};background-color:#{:02x}{:02x}{:02x};",
                    fg.0, fg.1, fg.2, bg.0, bg.1, bg.2
                ));
                Self::open_span(&mut self.output, &style);
                self.inner_span_open = true;
            }

            let ch = cell.literal_char();
            if ch == ' ' {
                space_count += 1;
            } else {
                space_count = 0;
            }

            if ch == ' ' && space_count > 1 {
                // HTML collapses space runs, so substitute after the first.
                self.output.push_str("&nbsp;");
            } else if cell.rendition.contains(Rendition::EXTENDED) {
                if let Some(seq) = self
                    .extended_chars
                    .as_deref()
                    .and_then(|t| t.lookup(cell.code))
                {
                    for c in seq {
                        Self::push_escaped(&mut self.output, c);
                    }
                } else {
                    self.output.push(char::REPLACEMENT_CHARACTER);
                }
            } else {
                Self::push_escaped(&mut self.output, ch);
            }
        }

        if self.inner_span_open {
            Self::close_span(&mut self.output);
            self.inner_span_open = false;
            self.last_fg = None;
            self.last_bg = None;
            self.last_rendition = Rendition::empty();
        }
        self.output.push_str("<br>");
    }

    fn end(&mut self) -> String {
        Self::close_span(&mut self.output);
        std::mem::take(&mut self.output)
    }
}
