//! The passed list: the set of canonical encodings seen so far.

use std::collections::HashSet;

/// Deduplicates states by their canonical byte encoding.
#[derive(Debug, Default)]
pub struct PassedList {
    seen: HashSet<Box<[u8]>, ahash::RandomState>,
}

impl PassedList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, encoding: &[u8]) -> bool {
        self.seen.contains(encoding)
    }

    /// Insert `encoding`, reporting whether it was new.
    pub fn insert(&mut self, encoding: &[u8]) -> bool {
        if self.seen.contains(encoding) {
            return false;
        }
        self.seen.insert(encoding.into());
        true
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
