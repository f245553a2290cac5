use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

/// Interns grapheme clusters longer than one code point behind a stable
/// 32-bit handle.
///
/// The table is an explicitly constructed registry, not a process global:
/// the host builds one, hands an `Arc` of it to the core at construction,
/// and tears it down after the last screen is gone. The mutex is held only
/// for the duration of a single intern, retain, release, or lookup.
///
/// Handles are reference-counted against live cells. A cell created from a
/// cluster owns one reference; evicting the cell to history transfers that
/// reference; overwriting the cell releases it. When a refcount reaches
/// zero the slot is freed and the handle may be reused.
#[derive(Debug)]
pub struct ExtendedCharTable {
    inner: Mutex<TableInner>,
    /// Maximum code points accepted per cluster; longer clusters truncate.
    max_sequence_len: usize,
}

#[derive(Debug, Default)]
struct TableInner {
    by_sequence: HashMap<Box<[char]>, u32>,
    by_handle: HashMap<u32, Entry>,
    free: Vec<u32>,
    next: u32,
}

#[derive(Debug)]
struct Entry {
    sequence: Box<[char]>,
    refs: usize,
}

/// Table capacity. Interning past this point fails and the caller falls
/// back to the literal first code point of the cluster.
const MAX_ENTRIES: usize = 1 << 20;

impl ExtendedCharTable {
    pub fn new(max_sequence_len: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(TableInner::default()),
            max_sequence_len,
        })
    }

    /// Intern a cluster, returning its handle with one reference taken.
    ///
    /// Lookup is by value, so interning the same sequence twice yields the
    /// same handle (with its refcount bumped). Returns `None` when the table
    /// is saturated; the caller then stores the first code point literally.
    pub fn intern(&self, sequence: &[char]) -> Option<u32> {
        let sequence: Box<[char]> = if sequence.len() > self.max_sequence_len {
            sequence[..self.max_sequence_len].into()
        } else {
            sequence.into()
        };

        let mut inner = self.inner.lock();
        if let Some(&handle) = inner.by_sequence.get(&sequence) {
            if let Some(entry) = inner.by_handle.get_mut(&handle) {
                entry.refs += 1;
            }
            return Some(handle);
        }

        if inner.by_handle.len() >= MAX_ENTRIES {
            return None;
        }

        let handle = inner.free.pop().unwrap_or_else(|| {
            // Handle 0 is reserved so a zeroed cell never aliases a cluster.
            inner.next += 1;
            inner.next
        });
        inner.by_sequence.insert(sequence.clone(), handle);
        inner.by_handle.insert(
            handle,
            Entry {
                sequence,
                refs: 1,
            },
        );
        Some(handle)
    }

    /// Take an additional reference on a handle (a cell was copied).
    pub fn retain(&self, handle: u32) {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.by_handle.get_mut(&handle) {
            entry.refs += 1;
        }
    }

    /// Drop a reference (a cell holding the handle was overwritten). Frees
    /// the slot when the last reference goes away.
    pub fn release(&self, handle: u32) {
        let mut inner = self.inner.lock();
        let emptied = match inner.by_handle.get_mut(&handle) {
            Some(entry) => {
                entry.refs = entry.refs.saturating_sub(1);
                entry.refs == 0
            }
            None => false,
        };
        if emptied {
            if let Some(entry) = inner.by_handle.remove(&handle) {
                inner.by_sequence.remove(&entry.sequence);
                inner.free.push(handle);
            }
        }
    }

    /// The code-point sequence behind a handle, or `None` for a stale handle.
    pub fn lookup(&self, handle: u32) -> Option<Vec<char>> {
        self.inner
            .lock()
            .by_handle
            .get(&handle)
            .map(|e| e.sequence.to_vec())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().by_handle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
