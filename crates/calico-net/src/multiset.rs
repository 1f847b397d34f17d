//! Sorted multisets of colored tokens.

use std::fmt;

use crate::ids::{Color, MarkingCount};

/// A multiset of colors, stored as a sorted vector of `(color, count)`
/// pairs with a cached total.
///
/// Entries with a zero count are never stored, so two multisets with the
/// same contents are structurally equal and hash identically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ColorMultiset {
    entries: Vec<(Color, MarkingCount)>,
    total: MarkingCount,
}

impl ColorMultiset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (Color, MarkingCount)>) -> Self {
        let mut ms = Self::new();
        for (color, count) in entries {
            ms.add(color, count);
        }
        ms
    }

    /// Total number of tokens across all colors.
    #[inline]
    pub fn total(&self) -> MarkingCount {
        self.total
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Number of distinct colors present.
    #[inline]
    pub fn distinct(&self) -> usize {
        self.entries.len()
    }

    pub fn count(&self, color: Color) -> MarkingCount {
        match self.entries.binary_search_by_key(&color, |e| e.0) {
            Ok(i) => self.entries[i].1,
            Err(_) => 0,
        }
    }

    pub fn add(&mut self, color: Color, count: MarkingCount) {
        if count == 0 {
            return;
        }
        match self.entries.binary_search_by_key(&color, |e| e.0) {
            Ok(i) => self.entries[i].1 += count,
            Err(i) => self.entries.insert(i, (color, count)),
        }
        self.total += count;
    }

    /// Remove up to `count` tokens of `color`. The caller is expected to
    /// have checked availability; removing more than present saturates.
    pub fn remove(&mut self, color: Color, count: MarkingCount) {
        if count == 0 {
            return;
        }
        if let Ok(i) = self.entries.binary_search_by_key(&color, |e| e.0) {
            let present = self.entries[i].1;
            let removed = present.min(count);
            self.total -= removed;
            if removed == present {
                self.entries.remove(i);
            } else {
                self.entries[i].1 = present - removed;
            }
        }
    }

    /// True if every color of `other` is present here with at least the
    /// same count.
    pub fn contains(&self, other: &ColorMultiset) -> bool {
        if self.total < other.total {
            return false;
        }
        other
            .entries
            .iter()
            .all(|&(color, count)| self.count(color) >= count)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Color, MarkingCount)> + '_ {
        self.entries.iter().copied()
    }
}

impl fmt::Display for ColorMultiset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (color, count)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{count}'{color}")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_merges_and_sorts() {
        let mut ms = ColorMultiset::new();
        ms.add(3, 1);
        ms.add(1, 2);
        ms.add(3, 1);
        assert_eq!(ms.total(), 4);
        assert_eq!(ms.count(1), 2);
        assert_eq!(ms.count(3), 2);
        assert_eq!(ms.iter().collect::<Vec<_>>(), vec![(1, 2), (3, 2)]);
    }

    #[test]
    fn zero_counts_are_never_stored() {
        let mut ms = ColorMultiset::new();
        ms.add(5, 0);
        assert!(ms.is_empty());
        ms.add(5, 2);
        ms.remove(5, 2);
        assert!(ms.is_empty());
        assert_eq!(ms.distinct(), 0);
        assert_eq!(ms, ColorMultiset::new());
    }

    #[test]
    fn contains_is_componentwise() {
        let big = ColorMultiset::from_entries([(0, 2), (1, 1)]);
        let small = ColorMultiset::from_entries([(0, 1)]);
        assert!(big.contains(&small));
        assert!(!small.contains(&big));
        assert!(big.contains(&ColorMultiset::new()));
        let other = ColorMultiset::from_entries([(2, 1)]);
        assert!(!big.contains(&other));
    }

    #[test]
    fn remove_saturates() {
        let mut ms = ColorMultiset::from_entries([(0, 1)]);
        ms.remove(0, 5);
        assert!(ms.is_empty());
        ms.remove(7, 1);
        assert!(ms.is_empty());
    }
}
