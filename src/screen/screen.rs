use std::sync::Arc;

use bitflags::bitflags;

use crate::character::{
    char_width, Character, ColorEntry, ColorTable, ExtendedCharTable, LineProperty, Rendition,
};
use crate::decoder::{HtmlDecoder, PlainTextDecoder, TerminalCharacterDecoder};
use crate::event::Diagnostic;
use crate::history::{migrate, CompactHistory, HistoryMode, HistoryScroll};

use super::hyperlink::UrlExtractor;

bitflags! {
    /// Options for [`Screen::selected_text`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SelectionOptions: u8 {
        /// Keep hard line breaks; without this they become spaces.
        const PRESERVE_LINE_BREAKS      = 1 << 0;
        const TRIM_LEADING_WHITESPACE   = 1 << 1;
        const TRIM_TRAILING_WHITESPACE  = 1 << 2;
        const CONVERT_TO_HTML           = 1 << 3;
        /// Skip lines inside shell-integration prompt regions.
        const EXCLUDE_PROMPT            = 1 << 4;
        const EXCLUDE_INPUT             = 1 << 5;
        const EXCLUDE_OUTPUT            = 1 << 6;
    }
}

/// How selection anchors expand to cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    /// Reading order from begin to end.
    Stream,
    /// The column rectangle spanned by the anchors.
    Block,
    /// Whole lines.
    Line,
}

#[derive(Debug, Clone)]
struct Selection {
    anchor: (usize, usize),
    end: (usize, usize),
    mode: SelectionMode,
}

#[derive(Debug, Clone, Default)]
struct SavedState {
    cursor: (usize, usize),
    rendition: Rendition,
    fg: Option<ColorEntry>,
    bg: Option<ColorEntry>,
    origin_mode: bool,
}

/// The screen model: a grid of styled cells plus cursor, margins, tab
/// stops, selection, and the history the grid evicts into.
///
/// The screen is passive. It is driven exclusively by the emulation layer
/// (never by raw bytes) and signals nothing; state the host needs comes
/// back from queries.
pub struct Screen {
    lines: usize,
    columns: usize,
    image: Vec<Vec<Character>>,
    line_properties: Vec<LineProperty>,

    history: HistoryScroll,

    // Cursor. `cu_x == columns` is the pending-wrap state: the next
    // printable wraps before it lands.
    cu_x: usize,
    cu_y: usize,

    top_margin: usize,
    bottom_margin: usize,

    origin_mode: bool,
    auto_wrap: bool,
    insert_mode: bool,
    cursor_visible: bool,

    rendition: Rendition,
    fg: ColorEntry,
    bg: ColorEntry,

    saved: SavedState,
    tab_stops: Vec<bool>,
    selection: Option<Selection>,

    extended_chars: Arc<ExtendedCharTable>,
    pub(crate) hyperlinks: UrlExtractor,

    reflow_enabled: bool,
    diagnostics: Vec<Diagnostic>,
}

impl Screen {
    pub fn new(
        lines: usize,
        columns: usize,
        history: HistoryScroll,
        extended_chars: Arc<ExtendedCharTable>,
        allowed_schemes: Vec<String>,
        reflow_enabled: bool,
    ) -> Self {
        let lines = lines.max(1);
        let columns = columns.max(1);
        Self {
            lines,
            columns,
            image: vec![vec![Character::default(); columns]; lines],
            line_properties: vec![LineProperty::empty(); lines],
            history,
            cu_x: 0,
            cu_y: 0,
            top_margin: 0,
            bottom_margin: lines - 1,
            origin_mode: false,
            auto_wrap: true,
            insert_mode: false,
            cursor_visible: true,
            rendition: Rendition::empty(),
            fg: ColorEntry::DefaultForeground,
            bg: ColorEntry::DefaultBackground,
            saved: SavedState::default(),
            tab_stops: default_tab_stops(columns),
            selection: None,
            extended_chars,
            hyperlinks: UrlExtractor::new(allowed_schemes),
            reflow_enabled,
            diagnostics: Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Geometry and basic accessors
    // ------------------------------------------------------------------

    pub fn lines(&self) -> usize {
        self.lines
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn history_lines(&self) -> usize {
        self.history.line_count()
    }

    /// Total addressable lines: history plus visible screen.
    pub fn total_lines(&self) -> usize {
        self.history.line_count() + self.lines
    }

    pub fn cursor_position(&self) -> (usize, usize) {
        (self.cu_y, self.cu_x.min(self.columns.saturating_sub(1)))
    }

    pub fn cursor_visible(&self) -> bool {
        self.cursor_visible
    }

    pub fn top_margin(&self) -> usize {
        self.top_margin
    }

    pub fn bottom_margin(&self) -> usize {
        self.bottom_margin
    }

    pub fn history(&mut self) -> &mut HistoryScroll {
        &mut self.history
    }

    pub fn extended_chars(&self) -> &Arc<ExtendedCharTable> {
        &self.extended_chars
    }

    /// Swap in a different history backend, migrating existing lines.
    /// The screen itself is not reset.
    pub fn set_history(&mut self, mode: &HistoryMode, dir: Option<&std::path::Path>) -> std::io::Result<()> {
        let mut new = HistoryScroll::new(mode, dir)?;
        migrate(&mut self.history, &mut new);
        let kept = new.line_count();
        let had = self.history.line_count();
        self.history = new;
        // A smaller backend may not have room for everything.
        if kept < had {
            self.shift_for_dropped(had - kept);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Modes and rendition registers
    // ------------------------------------------------------------------

    pub fn set_origin_mode(&mut self, on: bool) {
        self.origin_mode = on;
        // DECOM homes the cursor on either transition.
        self.cu_y = if on { self.top_margin } else { 0 };
        self.cu_x = 0;
    }

    pub fn origin_mode(&self) -> bool {
        self.origin_mode
    }

    pub fn set_auto_wrap(&mut self, on: bool) {
        self.auto_wrap = on;
        if !on {
            self.cu_x = self.cu_x.min(self.columns.saturating_sub(1));
        }
    }

    pub fn set_insert_mode(&mut self, on: bool) {
        self.insert_mode = on;
    }

    pub fn set_cursor_visible(&mut self, on: bool) {
        self.cursor_visible = on;
    }

    pub fn set_rendition(&mut self, flag: Rendition) {
        self.rendition |= flag;
    }

    pub fn reset_rendition(&mut self, flag: Rendition) {
        self.rendition &= !flag;
    }

    pub fn set_foreground(&mut self, color: ColorEntry) {
        self.fg = color;
    }

    pub fn set_background(&mut self, color: ColorEntry) {
        self.bg = color;
    }

    /// SGR 0.
    pub fn set_default_rendition(&mut self) {
        // LINKED marks hyperlink spans, which SGR does not terminate.
        self.rendition &= Rendition::LINKED;
        self.fg = ColorEntry::DefaultForeground;
        self.bg = ColorEntry::DefaultBackground;
    }

    pub fn save_cursor(&mut self) {
        self.saved = SavedState {
            cursor: (self.cu_y, self.cu_x),
            rendition: self.rendition,
            fg: Some(self.fg),
            bg: Some(self.bg),
            origin_mode: self.origin_mode,
        };
    }

    pub fn restore_cursor(&mut self) {
        let saved = self.saved.clone();
        self.cu_y = saved.cursor.0.min(self.lines - 1);
        self.cu_x = saved.cursor.1.min(self.columns);
        self.rendition = saved.rendition;
        if let Some(fg) = saved.fg {
            self.fg = fg;
        }
        if let Some(bg) = saved.bg {
            self.bg = bg;
        }
        self.origin_mode = saved.origin_mode;
    }

    // ------------------------------------------------------------------
    // Margins and tab stops
    // ------------------------------------------------------------------

    /// DECSTBM. `top`/`bottom` are 0-based inclusive. Out-of-order or
    /// out-of-range arguments fall back to the full screen.
    pub fn set_margins(&mut self, top: usize, bottom: usize) {
        if top < bottom && bottom < self.lines {
            self.top_margin = top;
            self.bottom_margin = bottom;
        } else {
            self.top_margin = 0;
            self.bottom_margin = self.lines - 1;
        }
        self.cu_y = if self.origin_mode { self.top_margin } else { 0 };
        self.cu_x = 0;
    }

    pub fn set_default_margins(&mut self) {
        self.top_margin = 0;
        self.bottom_margin = self.lines - 1;
    }

    pub fn set_tab_stop_at_cursor(&mut self) {
        let x = self.cu_x.min(self.columns.saturating_sub(1));
        self.tab_stops[x] = true;
    }

    pub fn clear_tab_stop_at_cursor(&mut self) {
        let x = self.cu_x.min(self.columns.saturating_sub(1));
        self.tab_stops[x] = false;
    }

    pub fn clear_all_tab_stops(&mut self) {
        self.tab_stops.fill(false);
    }

    /// Tab forward `n` stops, stopping at the last column.
    pub fn tab(&mut self, n: usize) {
        let mut x = self.cu_x.min(self.columns.saturating_sub(1));
        for _ in 0..n.max(1) {
            x += 1;
            while x < self.columns && !self.tab_stops[x] {
                x += 1;
            }
            if x >= self.columns {
                x = self.columns - 1;
                break;
            }
        }
        self.cu_x = x;
    }

    /// Tab backward `n` stops. From column 0 this is a no-op.
    pub fn backtab(&mut self, n: usize) {
        let mut x = self.cu_x.min(self.columns.saturating_sub(1));
        for _ in 0..n.max(1) {
            if x == 0 {
                break;
            }
            x -= 1;
            while x > 0 && !self.tab_stops[x] {
                x -= 1;
            }
        }
        self.cu_x = x;
    }

    // ------------------------------------------------------------------
    // Cursor motion
    // ------------------------------------------------------------------

    pub fn cursor_up(&mut self, n: usize) {
        let stop = if self.cu_y >= self.top_margin {
            self.top_margin
        } else {
            0
        };
        self.cu_y = self.cu_y.saturating_sub(n.max(1)).max(stop);
        self.cu_x = self.cu_x.min(self.columns - 1);
    }

    pub fn cursor_down(&mut self, n: usize) {
        let stop = if self.cu_y <= self.bottom_margin {
            self.bottom_margin
        } else {
            self.lines - 1
        };
        self.cu_y = (self.cu_y + n.max(1)).min(stop);
        self.cu_x = self.cu_x.min(self.columns - 1);
    }

    pub fn cursor_left(&mut self, n: usize) {
        // Moving out of pending wrap starts from the last real column.
        let x = self.cu_x.min(self.columns - 1);
        self.cu_x = x.saturating_sub(n.max(1));
    }

    pub fn cursor_right(&mut self, n: usize) {
        self.cu_x = (self.cu_x + n.max(1)).min(self.columns - 1);
    }

    /// Absolute positioning (CUP). Coordinates are 0-based here; origin
    /// mode offsets and clamps into the scroll region.
    pub fn set_cursor_yx(&mut self, y: usize, x: usize) {
        self.set_cursor_y(y);
        self.set_cursor_x(x);
    }

    pub fn set_cursor_x(&mut self, x: usize) {
        self.cu_x = x.min(self.columns - 1);
    }

    pub fn set_cursor_y(&mut self, y: usize) {
        self.cu_y = if self.origin_mode {
            (self.top_margin + y).min(self.bottom_margin)
        } else {
            y.min(self.lines - 1)
        };
    }

    pub fn to_start_of_line(&mut self) {
        self.cu_x = 0;
    }

    /// IND: move down, scrolling the region when at the bottom margin.
    pub fn index(&mut self) {
        if self.cu_y == self.bottom_margin {
            self.scroll_up(1);
        } else if self.cu_y < self.lines - 1 {
            self.cu_y += 1;
        }
    }

    /// RI: move up, scrolling the region down when at the top margin.
    pub fn reverse_index(&mut self) {
        if self.cu_y == self.top_margin {
            self.scroll_down(1);
        } else if self.cu_y > 0 {
            self.cu_y -= 1;
        }
    }

    /// NEL.
    pub fn next_line(&mut self) {
        self.index();
        self.cu_x = 0;
    }

    /// CR. Also cancels a pending wrap.
    pub fn carriage_return(&mut self) {
        self.cu_x = 0;
    }

    // ------------------------------------------------------------------
    // Character output
    // ------------------------------------------------------------------

    /// Print one translated character at the cursor, honoring insert mode,
    /// auto-wrap, and wide-character placement.
    pub fn show_character(&mut self, c: char) {
        let width = char_width(c) as usize;
        if width == 0 {
            self.compose_into_previous(c);
            return;
        }
        if width > self.columns {
            return;
        }

        if self.cu_x + width > self.columns {
            if self.auto_wrap {
                self.line_properties[self.cu_y] |= LineProperty::WRAPPED;
                self.next_line();
            } else {
                self.cu_x = self.columns - width;
            }
        }

        if self.insert_mode {
            self.insert_chars(width);
        }

        let x = self.cu_x;
        let y = self.cu_y;
        let mut rendition = self.rendition;
        if self.hyperlinks.reading() {
            rendition |= Rendition::LINKED;
        }
        let cell = Character::new(c as u32, self.fg, self.bg, rendition, width as u8);
        self.put_cell(y, x, cell);
        if width == 2 {
            self.put_cell(y, x + 1, Character::wide_trailing(&cell));
        }

        if self.hyperlinks.reading() {
            let abs = self.history.line_count() + y;
            self.hyperlinks.append_char(c, abs, x);
        }
        let overflow = self.hyperlinks.take_diagnostics();
        self.diagnostics.extend(overflow);

        self.cu_x = x + width;
    }

    /// Attach a zero-width combining character to the previously printed
    /// cell, interning the cluster in the extended-char table.
    fn compose_into_previous(&mut self, c: char) {
        let (y, mut x) = if self.cu_x == 0 {
            if self.cu_y == 0 {
                return;
            }
            (self.cu_y - 1, self.columns - 1)
        } else {
            (self.cu_y, self.cu_x.min(self.columns) - 1)
        };
        if self.image[y][x].width == 0 && x > 0 {
            x -= 1; // land on the leading half of a wide character
        }

        let base = self.image[y][x];
        let mut sequence: Vec<char> = if base.rendition.contains(Rendition::EXTENDED) {
            self.extended_chars.lookup(base.code).unwrap_or_default()
        } else {
            vec![base.literal_char()]
        };
        sequence.push(c);

        match self.extended_chars.intern(&sequence) {
            Some(handle) => {
                if base.rendition.contains(Rendition::EXTENDED) {
                    self.extended_chars.release(base.code);
                }
                let cell = &mut self.image[y][x];
                cell.code = handle;
                cell.rendition |= Rendition::EXTENDED;
            }
            None => {
                // Table saturated: keep the base character as-is.
                self.diagnostics.push(Diagnostic::ExtendedCharTableFull);
            }
        }
    }

    fn put_cell(&mut self, y: usize, x: usize, cell: Character) {
        let old = self.image[y][x];
        self.release_cell(&old);
        // Overwriting half of a wide pair blanks the orphaned half.
        if old.width == 0 && x > 0 && self.image[y][x - 1].width == 2 {
            let bg = self.image[y][x - 1].bg;
            self.image[y][x - 1] = Character::erased(bg);
        }
        if old.width == 2 && x + 1 < self.columns {
            let bg = self.image[y][x + 1].bg;
            self.image[y][x + 1] = Character::erased(bg);
        }
        self.image[y][x] = cell;
    }

    fn release_cell(&self, cell: &Character) {
        if cell.rendition.contains(Rendition::EXTENDED) {
            self.extended_chars.release(cell.code);
        }
    }

    fn release_line(&self, cells: &[Character]) {
        for cell in cells {
            self.release_cell(cell);
        }
    }

    // ------------------------------------------------------------------
    // Erase and edit
    // ------------------------------------------------------------------

    fn erased_cell(&self) -> Character {
        Character::erased(self.bg)
    }

    /// Erase `[from..=to]` on row `y`. Selective erase (DECSED/DECSEL)
    /// skips protected cells.
    fn erase_block(&mut self, y: usize, from: usize, to: usize, selective: bool) {
        let to = to.min(self.columns - 1);
        if from > to {
            return;
        }
        // Widen to whole wide-character pairs.
        let from = if self.image[y][from].width == 0 && from > 0 {
            from - 1
        } else {
            from
        };
        let end_was_wide = self.image[y][to].width == 2;
        let erased = self.erased_cell();
        for x in from..=to {
            if selective && self.image[y][x].rendition.contains(Rendition::PROTECTED) {
                continue;
            }
            let old = self.image[y][x];
            self.release_cell(&old);
            self.image[y][x] = erased;
        }
        if end_was_wide && to + 1 < self.columns {
            self.image[y][to + 1] = erased;
        }
    }

    fn effective_cursor_x(&self) -> usize {
        // Pending wrap counts as the last column for erase purposes.
        self.cu_x.min(self.columns - 1)
    }

    pub fn clear_to_end_of_line(&mut self, selective: bool) {
        let x = self.effective_cursor_x();
        let y = self.cu_y;
        self.erase_block(y, x, self.columns - 1, selective);
    }

    pub fn clear_to_begin_of_line(&mut self, selective: bool) {
        let x = self.effective_cursor_x();
        let y = self.cu_y;
        self.erase_block(y, 0, x, selective);
    }

    pub fn clear_entire_line(&mut self, selective: bool) {
        let y = self.cu_y;
        self.erase_block(y, 0, self.columns - 1, selective);
    }

    pub fn clear_to_end_of_screen(&mut self, selective: bool) {
        self.clear_to_end_of_line(selective);
        for y in self.cu_y + 1..self.lines {
            self.erase_block(y, 0, self.columns - 1, selective);
            if !selective {
                self.line_properties[y] = LineProperty::empty();
            }
        }
    }

    pub fn clear_to_begin_of_screen(&mut self, selective: bool) {
        self.clear_to_begin_of_line(selective);
        for y in 0..self.cu_y {
            self.erase_block(y, 0, self.columns - 1, selective);
            if !selective {
                self.line_properties[y] = LineProperty::empty();
            }
        }
    }

    pub fn clear_entire_screen(&mut self, selective: bool) {
        for y in 0..self.lines {
            self.erase_block(y, 0, self.columns - 1, selective);
            if !selective {
                self.line_properties[y] = LineProperty::empty();
            }
        }
    }

    /// ECH.
    pub fn erase_chars(&mut self, n: usize) {
        let x = self.effective_cursor_x();
        let y = self.cu_y;
        let to = (x + n.max(1) - 1).min(self.columns - 1);
        self.erase_block(y, x, to, false);
    }

    /// DCH: delete cells at the cursor, shifting the remainder left.
    pub fn delete_chars(&mut self, n: usize) {
        let x = self.effective_cursor_x();
        let n = n.max(1).min(self.columns - x);
        let erased = self.erased_cell();
        let removed: Vec<Character> = self.image[self.cu_y][x..x + n].to_vec();
        self.release_line(&removed);
        let columns = self.columns;
        let row = &mut self.image[self.cu_y];
        row.drain(x..x + n);
        row.resize(columns, erased);
    }

    /// ICH: insert blank cells at the cursor, shifting the remainder right.
    pub fn insert_chars(&mut self, n: usize) {
        let x = self.effective_cursor_x();
        let n = n.max(1).min(self.columns - x);
        let erased = self.erased_cell();
        let dropped: Vec<Character> = self.image[self.cu_y][self.columns - n..].to_vec();
        self.release_line(&dropped);
        let columns = self.columns;
        let row = &mut self.image[self.cu_y];
        row.truncate(columns - n);
        for _ in 0..n {
            row.insert(x, erased);
        }
    }

    /// IL: insert blank lines at the cursor (inside the margins).
    pub fn insert_lines(&mut self, n: usize) {
        if self.cu_y < self.top_margin || self.cu_y > self.bottom_margin {
            return;
        }
        self.scroll_down_region(self.cu_y, n.max(1));
        self.cu_x = 0;
    }

    /// DL: delete lines at the cursor (inside the margins).
    pub fn delete_lines(&mut self, n: usize) {
        if self.cu_y < self.top_margin || self.cu_y > self.bottom_margin {
            return;
        }
        self.scroll_up_region(self.cu_y, n.max(1));
        self.cu_x = 0;
    }

    /// SU: scroll the region up, evicting to history at the region top.
    pub fn scroll_up(&mut self, n: usize) {
        self.scroll_up_region(self.top_margin, n.max(1));
    }

    /// SD.
    pub fn scroll_down(&mut self, n: usize) {
        self.scroll_down_region(self.top_margin, n.max(1));
    }

    fn scroll_up_region(&mut self, from: usize, n: usize) {
        if from > self.bottom_margin {
            return;
        }
        let n = n.min(self.bottom_margin - from + 1);
        if n == 0 {
            return;
        }

        // Lines leaving a region that starts at the very top of the primary
        // screen are preserved in history; anywhere else they are discarded.
        let evict = from == 0 && self.top_margin == 0 && self.history.has_scroll();
        for y in from..from + n {
            if evict {
                self.add_history_line(y);
            } else {
                let row = std::mem::take(&mut self.image[y]);
                self.release_line(&row);
                if self.selection.is_some() {
                    self.clear_selection();
                }
            }
        }

        let erased = self.erased_cell();
        self.image.drain(from..from + n);
        self.line_properties.drain(from..from + n);
        for _ in 0..n {
            self.image
                .insert(self.bottom_margin + 1 - n, vec![erased; self.columns]);
            self.line_properties
                .insert(self.bottom_margin + 1 - n, LineProperty::empty());
        }

        if evict {
            let dropped = self.history.take_dropped_lines();
            if dropped > 0 {
                self.shift_for_dropped(dropped);
            }
        }
    }

    fn scroll_down_region(&mut self, from: usize, n: usize) {
        if from > self.bottom_margin {
            return;
        }
        let n = n.min(self.bottom_margin - from + 1);
        if n == 0 {
            return;
        }
        let erased = self.erased_cell();
        for y in self.bottom_margin + 1 - n..=self.bottom_margin {
            let taken = std::mem::take(&mut self.image[y]);
            self.release_line(&taken);
        }
        self.image
            .drain(self.bottom_margin + 1 - n..=self.bottom_margin);
        self.line_properties
            .drain(self.bottom_margin + 1 - n..=self.bottom_margin);
        for _ in 0..n {
            self.image.insert(from, vec![erased; self.columns]);
            self.line_properties.insert(from, LineProperty::empty());
        }
        if self.selection.is_some() {
            self.clear_selection();
        }
    }

    /// Append screen row `y` to the history: wrapped lines keep their full
    /// width (interior blanks are content), others are trimmed of trailing
    /// default cells.
    fn add_history_line(&mut self, y: usize) {
        let property = self.line_properties[y];
        let row = &self.image[y];
        let len = if property.contains(LineProperty::WRAPPED) {
            row.len()
        } else {
            trimmed_length(row)
        };
        self.history.append_cells(&row[..len]);
        self.history.append_line(property);
    }

    /// `dropped` lines fell off the top of a bounded history; every
    /// absolute coordinate shifts down with them.
    fn shift_for_dropped(&mut self, dropped: usize) {
        self.hyperlinks.history_lines_removed(dropped);
        if let Some(sel) = &mut self.selection {
            if sel.anchor.0 < dropped || sel.end.0 < dropped {
                self.selection = None;
            } else {
                sel.anchor.0 -= dropped;
                sel.end.0 -= dropped;
            }
        }
    }

    // ------------------------------------------------------------------
    // Line properties
    // ------------------------------------------------------------------

    pub fn set_line_property(&mut self, property: LineProperty, enable: bool) {
        if enable {
            self.line_properties[self.cu_y] |= property;
        } else {
            self.line_properties[self.cu_y] &= !property;
        }
    }

    pub fn current_line_property(&self) -> LineProperty {
        self.line_properties[self.cu_y]
    }

    /// DECALN: fill the screen with E and reset margins.
    pub fn align_test(&mut self) {
        let cell = Character {
            code: 'E' as u32,
            ..Character::default()
        };
        for y in 0..self.lines {
            self.release_line(&self.image[y].clone());
            self.image[y].fill(cell);
            self.line_properties[y] = LineProperty::empty();
        }
        self.set_default_margins();
        self.cu_x = 0;
        self.cu_y = 0;
    }

    /// RIS-level reset of screen state. History is kept.
    pub fn reset(&mut self) {
        for y in 0..self.lines {
            self.release_line(&self.image[y].clone());
            self.image[y].fill(Character::default());
            self.line_properties[y] = LineProperty::empty();
        }
        self.cu_x = 0;
        self.cu_y = 0;
        self.origin_mode = false;
        self.auto_wrap = true;
        self.insert_mode = false;
        self.cursor_visible = true;
        self.rendition = Rendition::empty();
        self.fg = ColorEntry::DefaultForeground;
        self.bg = ColorEntry::DefaultBackground;
        self.saved = SavedState::default();
        self.set_default_margins();
        self.tab_stops = default_tab_stops(self.columns);
        self.selection = None;
        self.hyperlinks.clear();
    }

    // ------------------------------------------------------------------
    // Image access
    // ------------------------------------------------------------------

    /// Copy lines `[start_line, end_line)` of the combined history+screen
    /// space into `dst`, one `columns`-sized stride per line.
    pub fn image(&mut self, dst: &mut [Character], start_line: usize, end_line: usize) {
        let hist = self.history.line_count();
        let mut offset = 0;
        for line in start_line..end_line {
            if offset + self.columns > dst.len() {
                break;
            }
            let stride = &mut dst[offset..offset + self.columns];
            if line < hist {
                self.history.get_cells(line, 0, stride);
            } else if line - hist < self.lines {
                stride.copy_from_slice(&self.image[line - hist]);
            } else {
                stride.fill(Character::default());
            }
            offset += self.columns;
        }
    }

    pub fn line_property_range(&mut self, start_line: usize, end_line: usize) -> Vec<LineProperty> {
        let hist = self.history.line_count();
        (start_line..end_line)
            .map(|line| {
                if line < hist {
                    self.history.line_property(line)
                } else if line - hist < self.lines {
                    self.line_properties[line - hist]
                } else {
                    LineProperty::empty()
                }
            })
            .collect()
    }

    /// One line of the combined space: its cells (trimmed to content for
    /// history lines, full width for screen lines) and properties.
    fn line_at(&mut self, line: usize) -> (Vec<Character>, LineProperty) {
        let hist = self.history.line_count();
        if line < hist {
            let len = self.history.line_length(line);
            let mut cells = vec![Character::default(); len];
            self.history.get_cells(line, 0, &mut cells);
            (cells, self.history.line_property(line))
        } else if line - hist < self.lines {
            (
                self.image[line - hist].clone(),
                self.line_properties[line - hist],
            )
        } else {
            (Vec::new(), LineProperty::empty())
        }
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    /// Anchor a new selection at an absolute (history+screen) coordinate.
    pub fn set_selection_start(&mut self, line: usize, column: usize, mode: SelectionMode) {
        let line = line.min(self.total_lines().saturating_sub(1));
        self.selection = Some(Selection {
            anchor: (line, column.min(self.columns)),
            end: (line, column.min(self.columns)),
            mode,
        });
    }

    pub fn set_selection_end(&mut self, line: usize, column: usize) {
        let line = line.min(self.total_lines().saturating_sub(1));
        if let Some(sel) = &mut self.selection {
            sel.end = (line, column.min(self.columns));
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    pub fn has_selection(&self) -> bool {
        self.selection.is_some()
    }

    /// Normalized (top-left, bottom-right, mode) of the current selection.
    pub fn selection_range(&self) -> Option<((usize, usize), (usize, usize), SelectionMode)> {
        let sel = self.selection.as_ref()?;
        let (mut a, mut b) = (sel.anchor, sel.end);
        match sel.mode {
            SelectionMode::Block => {
                let tl = (a.0.min(b.0), a.1.min(b.1));
                let br = (a.0.max(b.0), a.1.max(b.1));
                Some((tl, br, sel.mode))
            }
            _ => {
                if b.0 < a.0 || (b.0 == a.0 && b.1 < a.1) {
                    std::mem::swap(&mut a, &mut b);
                }
                Some((a, b, sel.mode))
            }
        }
    }

    pub fn is_selected(&self, line: usize, column: usize) -> bool {
        let Some((tl, br, mode)) = self.selection_range() else {
            return false;
        };
        match mode {
            SelectionMode::Line => line >= tl.0 && line <= br.0,
            SelectionMode::Block => {
                line >= tl.0 && line <= br.0 && column >= tl.1 && column <= br.1
            }
            SelectionMode::Stream => {
                if line < tl.0 || line > br.0 {
                    false
                } else if tl.0 == br.0 {
                    column >= tl.1 && column <= br.1
                } else if line == tl.0 {
                    column >= tl.1
                } else if line == br.0 {
                    column <= br.1
                } else {
                    true
                }
            }
        }
    }

    /// The text covered by the selection, serialized per `options`.
    pub fn selected_text(&mut self, options: SelectionOptions) -> String {
        self.text_in_range(self.selection_range(), options)
    }

    fn text_in_range(
        &mut self,
        range: Option<((usize, usize), (usize, usize), SelectionMode)>,
        options: SelectionOptions,
    ) -> String {
        let Some((tl, br, mode)) = range else {
            return String::new();
        };

        let mut plain = PlainTextDecoder::new();
        plain.set_extended_char_table(self.extended_chars.clone());
        plain.set_trailing_whitespace(!options.contains(SelectionOptions::TRIM_TRAILING_WHITESPACE));
        plain.set_leading_whitespace(!options.contains(SelectionOptions::TRIM_LEADING_WHITESPACE));
        let mut html = HtmlDecoder::new(ColorTable::default());
        html.set_extended_char_table(self.extended_chars.clone());

        let to_html = options.contains(SelectionOptions::CONVERT_TO_HTML);
        if to_html {
            html.begin();
        } else {
            plain.begin();
        }

        // Shell-integration exclusion tracks the region kind as marks go by.
        let mut region: Option<LineProperty> = None;
        for line in tl.0..=br.0 {
            let (cells, property) = self.line_at(line);
            for mark in [
                LineProperty::PROMPT_START,
                LineProperty::INPUT_START,
                LineProperty::OUTPUT_START,
            ] {
                if property.contains(mark) {
                    region = Some(mark);
                }
            }
            let excluded = if region == Some(LineProperty::PROMPT_START) {
                options.contains(SelectionOptions::EXCLUDE_PROMPT)
            } else if region == Some(LineProperty::INPUT_START) {
                options.contains(SelectionOptions::EXCLUDE_INPUT)
            } else if region == Some(LineProperty::OUTPUT_START) {
                options.contains(SelectionOptions::EXCLUDE_OUTPUT)
            } else {
                false
            };
            if excluded {
                continue;
            }

            let (from, to) = match mode {
                SelectionMode::Line => (0, cells.len()),
                SelectionMode::Block => (tl.1.min(cells.len()), (br.1 + 1).min(cells.len())),
                SelectionMode::Stream => {
                    let from = if line == tl.0 { tl.1.min(cells.len()) } else { 0 };
                    let to = if line == br.0 {
                        (br.1 + 1).min(cells.len())
                    } else {
                        cells.len()
                    };
                    (from, to)
                }
            };
            let slice = if from <= to { &cells[from..to] } else { &[][..] };
            // Block selections always break per row.
            let property = if matches!(mode, SelectionMode::Block) {
                property & !LineProperty::WRAPPED
            } else {
                property
            };
            if to_html {
                html.decode_line(slice, property);
            } else {
                plain.decode_line(slice, property);
            }
        }

        if to_html {
            html.end()
        } else {
            let text = plain.end();
            if options.contains(SelectionOptions::PRESERVE_LINE_BREAKS) {
                text
            } else {
                text.replace('\n', " ")
            }
        }
    }

    // ------------------------------------------------------------------
    // Resize and reflow
    // ------------------------------------------------------------------

    /// Change the screen geometry. Column changes reflow (when enabled for
    /// this screen); row shrinks evict from the top, row grows extend at
    /// the bottom.
    pub fn set_size(&mut self, new_lines: usize, new_columns: usize) {
        let new_lines = new_lines.max(1);
        let new_columns = new_columns.max(1);
        if new_lines == self.lines && new_columns == self.columns {
            return;
        }

        if new_columns != self.columns && self.reflow_enabled {
            self.reflow(new_lines, new_columns);
        } else {
            self.truncate_resize(new_lines, new_columns);
        }

        self.lines = new_lines;
        self.columns = new_columns;
        self.set_default_margins();
        self.tab_stops = default_tab_stops(new_columns);
        self.cu_y = self.cu_y.min(new_lines - 1);
        self.cu_x = self.cu_x.min(new_columns);
    }

    fn truncate_resize(&mut self, new_lines: usize, new_columns: usize) {
        if new_columns < self.columns {
            for y in 0..self.image.len() {
                let cut: Vec<Character> = self.image[y][new_columns..].to_vec();
                self.release_line(&cut);
            }
        }
        for row in &mut self.image {
            row.resize(new_columns, Character::default());
        }

        if new_lines < self.lines {
            let excess = self.lines - new_lines;
            let evict = self.history.has_scroll();
            for y in 0..excess {
                if evict {
                    self.add_history_line(y);
                } else {
                    self.release_line(&self.image[y].clone());
                }
            }
            self.image.drain(0..excess);
            self.line_properties.drain(0..excess);
            self.cu_y = self.cu_y.saturating_sub(excess);
            if evict {
                let dropped = self.history.take_dropped_lines();
                if dropped > 0 {
                    self.shift_for_dropped(dropped);
                }
            } else if self.selection.is_some() {
                self.clear_selection();
            }
        } else {
            for _ in self.lines..new_lines {
                self.image.push(vec![Character::default(); new_columns]);
                self.line_properties.push(LineProperty::empty());
            }
        }

        if let Some(sel) = &mut self.selection {
            sel.anchor.1 = sel.anchor.1.min(new_columns);
            sel.end.1 = sel.end.1.min(new_columns);
        }
    }

    /// Screen lines that hold content: everything up to the last non-blank
    /// row, and never less than the cursor row.
    fn used_lines(&self) -> usize {
        let mut last = 0;
        for (y, row) in self.image.iter().enumerate() {
            if trimmed_length(row) > 0 || !self.line_properties[y].is_empty() {
                last = y + 1;
            }
        }
        last.max(self.cu_y + 1).min(self.lines)
    }

    fn reflow(&mut self, new_lines: usize, new_columns: usize) {
        // With no scrollback the same machinery runs against a scratch
        // backend; whatever is left in it afterwards is the overflow, which
        // has nowhere to go and is discarded.
        let scratch = !self.history.has_scroll();
        if scratch {
            self.history = HistoryScroll::Compact(CompactHistory::new(usize::MAX / 2));
        }

        let old_hist = self.history.line_count();
        let used = self.used_lines();

        // Positions to carry across the reflow, in pre-reflow absolute
        // coordinates.
        let cursor_abs = (old_hist + self.cu_y.min(used - 1), self.cu_x);
        let selection = self.selection.clone();
        let boundary_abs = old_hist;

        // Move the used screen rows into history so the whole content is in
        // one place, then let the backend re-split it.
        for y in 0..used {
            self.add_history_line(y);
        }
        for y in 0..self.lines {
            self.image[y].fill(Character::default());
            self.line_properties[y] = LineProperty::empty();
        }
        let dropped = self.history.take_dropped_lines();

        let adjust = |pos: (usize, usize)| -> Option<(usize, usize)> {
            if pos.0 < dropped {
                None
            } else {
                Some((pos.0 - dropped, pos.1))
            }
        };

        let old_meta = HistoryMeta::build(&mut self.history);
        let cursor_logical = adjust(cursor_abs).and_then(|p| old_meta.to_logical(p.0, p.1));
        let boundary_logical = adjust((boundary_abs, 0)).and_then(|p| old_meta.to_logical(p.0, 0));
        let selection_logical = selection.as_ref().map(|sel| {
            (
                adjust(sel.anchor).and_then(|p| old_meta.to_logical(p.0, p.1)),
                adjust(sel.end).and_then(|p| old_meta.to_logical(p.0, p.1)),
                sel.mode,
            )
        });
        self.history.reflow(new_columns);
        let reflow_dropped_paragraphs;
        let new_meta = HistoryMeta::build(&mut self.history);
        {
            let old_pars = old_meta.paragraph_count();
            let new_pars = new_meta.paragraph_count();
            reflow_dropped_paragraphs = old_pars.saturating_sub(new_pars);
        }

        let map = |logical: Option<(usize, usize)>| -> Option<(usize, usize)> {
            let (par, offset) = logical?;
            let par = par.checked_sub(reflow_dropped_paragraphs)?;
            new_meta.from_logical(par, offset)
        };

        // Pull the former screen content (post-split) back out of history.
        let hist_after = self.history.line_count();
        let needed = match map(boundary_logical) {
            Some((line, _)) => hist_after - line.min(hist_after),
            None => hist_after,
        };
        let pull = needed.min(new_lines);
        let mut pulled = Vec::with_capacity(pull);
        for _ in 0..pull {
            match self.history.remove_last_line() {
                Some(line) => pulled.push(line),
                None => break,
            }
        }
        pulled.reverse();

        self.image.clear();
        self.line_properties.clear();
        for (mut cells, property) in pulled {
            cells.resize(new_columns, Character::default());
            self.image.push(cells);
            self.line_properties.push(property);
        }
        while self.image.len() < new_lines {
            self.image.push(vec![Character::default(); new_columns]);
            self.line_properties.push(LineProperty::empty());
        }

        let hist_final = self.history.line_count();

        // Cursor: same logical character, clamped to the new content end.
        match map(cursor_logical) {
            Some((abs, col)) => {
                self.cu_y = abs.saturating_sub(hist_final).min(new_lines - 1);
                self.cu_x = col.min(new_columns);
            }
            None => {
                self.cu_y = 0;
                self.cu_x = 0;
            }
        }

        // Selection: remapped in the same logical space, cleared when an
        // anchor's paragraph is gone.
        self.selection = match selection_logical {
            Some((anchor, end, mode)) => match (map(anchor), map(end)) {
                (Some(anchor), Some(end)) => Some(Selection { anchor, end, mode }),
                _ => None,
            },
            None => None,
        };

        self.hyperlinks.remap(|row, col| {
            let logical = old_meta.to_logical(row.checked_sub(dropped)?, col)?;
            let par = logical.0.checked_sub(reflow_dropped_paragraphs)?;
            new_meta.from_logical(par, logical.1)
        });

        if scratch {
            self.history = HistoryScroll::None;
            // Everything left in the scratch backend is gone; absolute
            // coordinates collapse back to screen space.
            self.shift_for_dropped(hist_final);
            self.cu_y = self.cu_y.min(new_lines - 1);
        }
    }

    // ------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        let mut out = std::mem::take(&mut self.diagnostics);
        out.extend(self.history.take_diagnostics());
        out.extend(self.hyperlinks.take_diagnostics());
        out
    }
}

fn default_tab_stops(columns: usize) -> Vec<bool> {
    (0..columns).map(|x| x % 8 == 0).collect()
}

fn trimmed_length(row: &[Character]) -> usize {
    let mut len = row.len();
    while len > 0 && row[len - 1].is_default() {
        len -= 1;
    }
    len
}

/// Snapshot of the history's line structure used to map absolute
/// coordinates to (paragraph, cell offset) pairs and back across a reflow.
struct HistoryMeta {
    wrapped: Vec<bool>,
    length: Vec<usize>,
    /// Absolute first line of each paragraph.
    paragraph_starts: Vec<usize>,
    /// Paragraphs completed before each line.
    paragraphs_before: Vec<usize>,
}

impl HistoryMeta {
    fn build(history: &mut HistoryScroll) -> Self {
        let count = history.line_count();
        let mut wrapped: Vec<bool> = Vec::with_capacity(count);
        let mut length = Vec::with_capacity(count);
        let mut paragraph_starts = Vec::new();
        let mut paragraphs_before = Vec::with_capacity(count);
        let mut completed = 0;
        for line in 0..count {
            if line == 0 || !wrapped[line - 1] {
                paragraph_starts.push(line);
            }
            paragraphs_before.push(completed);
            let w = history.is_wrapped(line);
            if !w {
                completed += 1;
            }
            wrapped.push(w);
            length.push(history.line_length(line));
        }
        Self {
            wrapped,
            length,
            paragraph_starts,
            paragraphs_before,
        }
    }

    fn paragraph_count(&self) -> usize {
        self.paragraph_starts.len()
    }

    fn to_logical(&self, line: usize, column: usize) -> Option<(usize, usize)> {
        if line >= self.wrapped.len() {
            return None;
        }
        let paragraph = self.paragraphs_before[line];
        let start = self.paragraph_starts[paragraph];
        let offset: usize = self.length[start..line].iter().sum::<usize>() + column;
        Some((paragraph, offset))
    }

    fn from_logical(&self, paragraph: usize, mut offset: usize) -> Option<(usize, usize)> {
        let start = *self.paragraph_starts.get(paragraph)?;
        let mut line = start;
        loop {
            let len = self.length[line];
            let has_next = self.wrapped[line] && line + 1 < self.wrapped.len();
            if offset < len || !has_next || len == 0 {
                return Some((line, offset.min(len)));
            }
            offset -= len;
            line += 1;
        }
    }
}
