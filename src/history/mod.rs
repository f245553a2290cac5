//! Scrollback history: append-only storage for lines evicted from the top
//! of the primary screen.
//!
//! Three interchangeable backends sit behind one tagged enum: `None`
//! discards everything, `Compact` keeps a bounded in-memory ring, `File`
//! spills to unlinked temp files with demand-paged reads. The backend set
//! is closed and switching is rare, so an enum beats trait objects here.

pub mod compact;
pub mod file;

use std::path::Path;

use crate::character::{Character, LineProperty};
use crate::event::Diagnostic;

pub use compact::CompactHistory;
pub use file::FileHistory;

/// History backend selection, passed in the core configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryMode {
    /// No scrollback: evicted lines are discarded.
    None,
    /// In-memory ring bounded to this many lines.
    Bounded(usize),
    /// File-backed, limited only by disk space.
    Unbounded,
}

/// A history scroll: the ordered sequence of lines that have left the
/// visible screen, oldest first.
#[derive(Debug)]
pub enum HistoryScroll {
    None,
    Compact(CompactHistory),
    File(FileHistory),
}

impl HistoryScroll {
    /// Construct the backend for `mode`. `scrollback_dir` is only consulted
    /// by the file backend; `None` means the system temp directory.
    pub fn new(mode: &HistoryMode, scrollback_dir: Option<&Path>) -> std::io::Result<Self> {
        match mode {
            HistoryMode::None => Ok(HistoryScroll::None),
            HistoryMode::Bounded(lines) => Ok(HistoryScroll::Compact(CompactHistory::new(*lines))),
            HistoryMode::Unbounded => Ok(HistoryScroll::File(FileHistory::new(scrollback_dir)?)),
        }
    }

    pub fn line_count(&self) -> usize {
        match self {
            HistoryScroll::None => 0,
            HistoryScroll::Compact(h) => h.line_count(),
            HistoryScroll::File(h) => h.line_count(),
        }
    }

    pub fn line_length(&mut self, line: usize) -> usize {
        match self {
            HistoryScroll::None => 0,
            HistoryScroll::Compact(h) => h.line_length(line),
            HistoryScroll::File(h) => h.line_length(line),
        }
    }

    /// Copy `dst.len()` cells of `line` starting at `col` into `dst`.
    /// Positions past the stored line length are filled with default cells.
    pub fn get_cells(&mut self, line: usize, col: usize, dst: &mut [Character]) {
        match self {
            HistoryScroll::None => dst.fill(Character::default()),
            HistoryScroll::Compact(h) => h.get_cells(line, col, dst),
            HistoryScroll::File(h) => h.get_cells(line, col, dst),
        }
    }

    pub fn line_property(&mut self, line: usize) -> LineProperty {
        match self {
            HistoryScroll::None => LineProperty::empty(),
            HistoryScroll::Compact(h) => h.line_property(line),
            HistoryScroll::File(h) => h.line_property(line),
        }
    }

    pub fn is_wrapped(&mut self, line: usize) -> bool {
        self.line_property(line).contains(LineProperty::WRAPPED)
    }

    /// Append cells for the line currently being evicted. A line is not
    /// visible to readers until [`append_line`](Self::append_line) closes it.
    pub fn append_cells(&mut self, cells: &[Character]) {
        match self {
            HistoryScroll::None => {}
            HistoryScroll::Compact(h) => h.append_cells(cells),
            HistoryScroll::File(h) => h.append_cells(cells),
        }
    }

    /// Close the pending line with its properties.
    pub fn append_line(&mut self, property: LineProperty) {
        match self {
            HistoryScroll::None => {}
            HistoryScroll::Compact(h) => h.append_line(property),
            HistoryScroll::File(h) => h.append_line(property),
        }
    }

    /// Drop the most recent line (a widening reflow pulls it back onto the
    /// screen). Returns its cells and properties.
    pub fn remove_last_line(&mut self) -> Option<(Vec<Character>, LineProperty)> {
        match self {
            HistoryScroll::None => None,
            HistoryScroll::Compact(h) => h.remove_last_line(),
            HistoryScroll::File(h) => h.remove_last_line(),
        }
    }

    /// Re-split stored wrapped runs at `new_columns`. Returns the change in
    /// line count (positive when splitting produced more lines).
    pub fn reflow(&mut self, new_columns: usize) -> isize {
        match self {
            HistoryScroll::None => 0,
            HistoryScroll::Compact(h) => h.reflow(new_columns),
            HistoryScroll::File(h) => h.reflow(new_columns),
        }
    }

    /// Lines evicted from the *top* of the history since the last call
    /// (bounded backend only). The screen uses this to shift absolute
    /// coordinates in selections and hyperlink records.
    pub fn take_dropped_lines(&mut self) -> usize {
        match self {
            HistoryScroll::Compact(h) => h.take_dropped_lines(),
            _ => 0,
        }
    }

    /// Degradations recorded since the last call (file backend only).
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        match self {
            HistoryScroll::File(h) => h.take_diagnostics(),
            _ => Vec::new(),
        }
    }

    /// Whether this backend retains anything at all.
    pub fn has_scroll(&self) -> bool {
        !matches!(self, HistoryScroll::None)
    }
}

/// Copy every line of `old` into `new`, oldest first. Used when the host
/// switches backends on a live session; the owning screen is not reset.
pub fn migrate(old: &mut HistoryScroll, new: &mut HistoryScroll) {
    let count = old.line_count();
    let mut buf = Vec::new();
    for line in 0..count {
        let len = old.line_length(line);
        buf.resize(len, Character::default());
        old.get_cells(line, 0, &mut buf);
        new.append_cells(&buf);
        new.append_line(old.line_property(line));
    }
}
