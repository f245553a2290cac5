use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use crate::character::{Character, LineProperty};
use crate::event::Diagnostic;

/// When the read/write balance counter drops below this, the blob is mapped
/// read-only. Each `add` moves the counter up, each `get` down, so crossing
/// the threshold means roughly a thousand more reads than writes.
const MAP_THRESHOLD: i32 = -1000;

/// An extendable temp-file blob. The file is created unlinked (via
/// `tempfile`), so it vanishes on crash. Reads either go through a
/// read-only mmap or a seek+read pair; any write unmaps first.
#[derive(Debug)]
struct BlobFile {
    file: File,
    length: u64,
    map: Option<Mmap>,
    read_write_balance: i32,
    diagnostics: Vec<Diagnostic>,
}

impl BlobFile {
    fn create(dir: Option<&Path>) -> std::io::Result<Self> {
        let file = match dir {
            Some(dir) => tempfile::tempfile_in(dir)?,
            None => tempfile::tempfile()?,
        };
        Ok(Self {
            file,
            length: 0,
            map: None,
            read_write_balance: 0,
            diagnostics: Vec::new(),
        })
    }

    fn len(&self) -> u64 {
        self.length
    }

    fn degrade(&mut self, op: &str, err: std::io::Error) {
        tracing::warn!("history blob {op} failed: {err}");
        self.diagnostics.push(Diagnostic::HistoryIoError {
            detail: format!("{op}: {err}"),
        });
    }

    fn map(&mut self) {
        debug_assert!(self.map.is_none());
        if let Err(err) = self.file.flush() {
            self.degrade("flush", err);
            return;
        }
        // Safety: the file is owned by this instance and every write path
        // unmaps before touching it, so the mapping cannot observe a
        // concurrent mutation from this process.
        match unsafe { Mmap::map(&self.file) } {
            Ok(map) => self.map = Some(map),
            Err(err) => {
                // Fall back to seek+read and stop trying for a while.
                tracing::debug!("mmap of history blob failed: {err}");
                self.read_write_balance = 0;
            }
        }
    }

    fn add(&mut self, buf: &[u8]) {
        if self.map.is_some() {
            self.map = None;
        }
        self.read_write_balance = self.read_write_balance.saturating_add(1);

        if let Err(err) = self.file.seek(SeekFrom::Start(self.length)) {
            self.degrade("seek", err);
            return;
        }
        match self.file.write_all(buf) {
            // Silent truncation on failure: length only advances on success.
            Err(err) => self.degrade("write", err),
            Ok(()) => self.length += buf.len() as u64,
        }
    }

    fn get(&mut self, dst: &mut [u8], loc: u64) {
        if loc + dst.len() as u64 > self.length {
            dst.fill(0);
            return;
        }

        self.read_write_balance = self.read_write_balance.saturating_sub(1);
        if self.map.is_none() && self.read_write_balance < MAP_THRESHOLD {
            self.map();
        }

        if let Some(map) = &self.map {
            let loc = loc as usize;
            dst.copy_from_slice(&map[loc..loc + dst.len()]);
            return;
        }

        if let Err(err) = self.file.seek(SeekFrom::Start(loc)) {
            self.degrade("seek", err);
            dst.fill(0);
            return;
        }
        if let Err(err) = self.file.read_exact(dst) {
            self.degrade("read", err);
            dst.fill(0);
        }
    }

    /// Logical truncation; the bytes stay on disk but are never read again.
    fn remove_last(&mut self, loc: u64) {
        if loc <= self.length {
            self.length = loc;
        }
    }

    #[cfg(test)]
    fn is_mapped(&self) -> bool {
        self.map.is_some()
    }
}

const INDEX_ENTRY: u64 = 8;
const CELL_ENTRY: u64 = Character::SERIALIZED_LEN as u64;

/// Unbounded scrollback backed by three blob files:
///
/// - `cells`: concatenated fixed-size Character records,
/// - `index`: one 64-bit end offset into `cells` per line,
/// - `flags`: one LineProperty byte per line.
///
/// `index[i]` is where line `i` ends, so line 0 starts at offset 0 and line
/// `i + 1` starts at `index[i]`.
#[derive(Debug)]
pub struct FileHistory {
    cells: BlobFile,
    index: BlobFile,
    flags: BlobFile,
    dir: Option<PathBuf>,
}

impl FileHistory {
    pub fn new(dir: Option<&Path>) -> std::io::Result<Self> {
        Ok(Self {
            cells: BlobFile::create(dir)?,
            index: BlobFile::create(dir)?,
            flags: BlobFile::create(dir)?,
            dir: dir.map(Path::to_path_buf),
        })
    }

    pub fn line_count(&self) -> usize {
        (self.index.len() / INDEX_ENTRY) as usize
    }

    fn start_of_line(&mut self, line: usize) -> u64 {
        if line == 0 {
            return 0;
        }
        if line <= self.line_count() {
            let mut buf = [0u8; 8];
            self.index.get(&mut buf, (line as u64 - 1) * INDEX_ENTRY);
            return u64::from_le_bytes(buf);
        }
        self.cells.len()
    }

    pub fn line_length(&mut self, line: usize) -> usize {
        if line >= self.line_count() {
            return 0;
        }
        let start = self.start_of_line(line);
        let end = self.start_of_line(line + 1);
        ((end - start) / CELL_ENTRY) as usize
    }

    pub fn get_cells(&mut self, line: usize, col: usize, dst: &mut [Character]) {
        dst.fill(Character::default());
        let stored = self.line_length(line);
        if col >= stored {
            return;
        }
        let n = dst.len().min(stored - col);
        let start = self.start_of_line(line) + col as u64 * CELL_ENTRY;
        let mut raw = vec![0u8; n * Character::SERIALIZED_LEN];
        self.cells.get(&mut raw, start);
        for (i, chunk) in raw.chunks_exact(Character::SERIALIZED_LEN).enumerate() {
            dst[i] = Character::decode_from(chunk);
        }
    }

    pub fn line_property(&mut self, line: usize) -> LineProperty {
        if line >= self.line_count() {
            return LineProperty::empty();
        }
        let mut buf = [0u8; 1];
        self.flags.get(&mut buf, line as u64);
        LineProperty::from_bits_truncate(buf[0])
    }

    pub fn append_cells(&mut self, cells: &[Character]) {
        let mut raw = vec![0u8; cells.len() * Character::SERIALIZED_LEN];
        for (cell, chunk) in cells
            .iter()
            .zip(raw.chunks_exact_mut(Character::SERIALIZED_LEN))
        {
            cell.encode_into(chunk);
        }
        self.cells.add(&raw);
    }

    pub fn append_line(&mut self, property: LineProperty) {
        let end = self.cells.len();
        self.index.add(&end.to_le_bytes());
        self.flags.add(&[property.bits()]);
    }

    pub fn remove_last_line(&mut self) -> Option<(Vec<Character>, LineProperty)> {
        let count = self.line_count();
        if count == 0 {
            return None;
        }
        let last = count - 1;
        let mut cells = vec![Character::default(); self.line_length(last)];
        self.get_cells(last, 0, &mut cells);
        let property = self.line_property(last);

        let start = self.start_of_line(last);
        self.cells.remove_last(start);
        self.index.remove_last(last as u64 * INDEX_ENTRY);
        self.flags.remove_last(last as u64);
        Some((cells, property))
    }

    /// Re-split wrapped runs at `new_columns`. A single forward pass writes
    /// the new line boundaries to an auxiliary temp file, then `index` and
    /// `flags` are rewritten in place; `cells` is untouched.
    pub fn reflow(&mut self, new_columns: usize) -> isize {
        if new_columns == 0 {
            return 0;
        }
        let before = self.line_count() as isize;
        let mut aux = match BlobFile::create(self.dir.as_deref()) {
            Ok(aux) => aux,
            Err(err) => {
                self.cells.degrade("reflow scratch", err);
                return 0;
            }
        };

        // Aux record: 8-byte fragment end offset + 1-byte line property.
        const AUX_ENTRY: u64 = 9;
        let width = new_columns as u64 * CELL_ENTRY;

        let mut current = 0;
        while current < self.line_count() {
            let mut start = self.start_of_line(current);
            let base = self.line_property(current) & !LineProperty::WRAPPED;
            while self
                .line_property(current)
                .contains(LineProperty::WRAPPED)
                && current + 1 < self.line_count()
            {
                current += 1;
            }
            let end = self.start_of_line(current + 1);
            current += 1;

            let mut first = true;
            while end - start > width {
                start += width;
                let prop = if first { base } else { LineProperty::empty() } | LineProperty::WRAPPED;
                let mut record = [0u8; AUX_ENTRY as usize];
                record[..8].copy_from_slice(&start.to_le_bytes());
                record[8] = prop.bits();
                aux.add(&record);
                first = false;
            }
            let prop = if first { base } else { LineProperty::empty() };
            let mut record = [0u8; AUX_ENTRY as usize];
            record[..8].copy_from_slice(&end.to_le_bytes());
            record[8] = prop.bits();
            aux.add(&record);
        }

        self.index.remove_last(0);
        self.flags.remove_last(0);

        let total = aux.len() / AUX_ENTRY;
        let mut record = [0u8; AUX_ENTRY as usize];
        for i in 0..total {
            aux.get(&mut record, i * AUX_ENTRY);
            self.index.add(&record[..8]);
            self.flags.add(&record[8..9]);
        }

        self.line_count() as isize - before
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        let mut out = std::mem::take(&mut self.cells.diagnostics);
        out.append(&mut self.index.diagnostics);
        out.append(&mut self.flags.diagnostics);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(s: &str) -> Vec<Character> {
        s.chars()
            .map(|c| Character {
                code: c as u32,
                ..Character::default()
            })
            .collect()
    }

    fn push(h: &mut FileHistory, s: &str, property: LineProperty) {
        h.append_cells(&line(s));
        h.append_line(property);
    }

    fn text(h: &mut FileHistory, i: usize) -> String {
        let mut buf = vec![Character::default(); h.line_length(i)];
        h.get_cells(i, 0, &mut buf);
        buf.iter().map(|c| c.literal_char()).collect()
    }

    #[test]
    fn lines_round_trip_through_the_blob_files() {
        let mut h = FileHistory::new(None).unwrap();
        push(&mut h, "alpha", LineProperty::empty());
        push(&mut h, "beta", LineProperty::WRAPPED);
        push(&mut h, "", LineProperty::empty());

        assert_eq!(h.line_count(), 3);
        assert_eq!(h.line_length(0), 5);
        assert_eq!(h.line_length(2), 0);
        assert_eq!(text(&mut h, 0), "alpha");
        assert_eq!(text(&mut h, 1), "beta");
        assert!(h.line_property(1).contains(LineProperty::WRAPPED));
    }

    #[test]
    fn mid_line_reads_honor_the_column_offset() {
        let mut h = FileHistory::new(None).unwrap();
        push(&mut h, "0123456789", LineProperty::empty());
        let mut buf = vec![Character::default(); 4];
        h.get_cells(0, 3, &mut buf);
        let s: String = buf.iter().map(|c| c.literal_char()).collect();
        assert_eq!(s, "3456");
    }

    #[test]
    fn remove_last_line_truncates_all_three_blobs() {
        let mut h = FileHistory::new(None).unwrap();
        push(&mut h, "keep", LineProperty::empty());
        push(&mut h, "pull", LineProperty::WRAPPED);

        let (cells, property) = h.remove_last_line().unwrap();
        assert_eq!(cells.len(), 4);
        assert!(property.contains(LineProperty::WRAPPED));
        assert_eq!(h.line_count(), 1);
        assert_eq!(text(&mut h, 0), "keep");

        // A fresh append lands after the truncation point.
        push(&mut h, "next", LineProperty::empty());
        assert_eq!(text(&mut h, 1), "next");
    }

    #[test]
    fn reflow_rewrites_index_without_touching_cells() {
        let mut h = FileHistory::new(None).unwrap();
        push(&mut h, "0123456789", LineProperty::empty());
        push(&mut h, "ab", LineProperty::empty());
        let cells_len = h.cells.len();

        let delta = h.reflow(4);
        assert_eq!(delta, 2);
        assert_eq!(h.cells.len(), cells_len, "cells blob untouched");
        assert_eq!(h.line_count(), 4);
        assert_eq!(text(&mut h, 0), "0123");
        assert_eq!(text(&mut h, 1), "4567");
        assert_eq!(text(&mut h, 2), "89");
        assert_eq!(text(&mut h, 3), "ab");
        assert!(h.line_property(0).contains(LineProperty::WRAPPED));
        assert!(!h.line_property(2).contains(LineProperty::WRAPPED));
    }

    #[test]
    fn reflow_joins_wrapped_runs_before_splitting() {
        let mut h = FileHistory::new(None).unwrap();
        push(&mut h, "0123", LineProperty::WRAPPED);
        push(&mut h, "45", LineProperty::empty());
        h.reflow(10);
        assert_eq!(h.line_count(), 1);
        assert_eq!(text(&mut h, 0), "012345");
    }

    #[test]
    fn heavy_read_traffic_switches_to_mmap() {
        let mut h = FileHistory::new(None).unwrap();
        push(&mut h, "mapped", LineProperty::empty());
        let mut buf = vec![Character::default(); 6];
        for _ in 0..1100 {
            h.get_cells(0, 0, &mut buf);
        }
        assert!(h.cells.is_mapped(), "cells blob should be mapped after read-heavy use");
        let s: String = buf.iter().map(|c| c.literal_char()).collect();
        assert_eq!(s, "mapped", "mapped reads return the same data");

        // Appending unmaps before writing.
        push(&mut h, "more", LineProperty::empty());
        assert!(!h.cells.is_mapped());
        assert_eq!(text(&mut h, 1), "more");
    }
}
