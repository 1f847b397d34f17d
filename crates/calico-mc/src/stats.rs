//! Search statistics.

/// Counters reported alongside a verdict.
///
/// `discovered` counts unique states inserted into the passed list,
/// `explored` counts successor-generation steps, and `checked` counts
/// query evaluations. The waiting and encoding fields describe memory
/// behavior rather than progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStatistics {
    pub discovered: u64,
    pub explored: u64,
    pub checked: u64,
    pub peak_waiting: usize,
    pub end_waiting: usize,
    pub biggest_encoding: usize,
}

impl SearchStatistics {
    pub(crate) fn note_waiting(&mut self, waiting: usize) {
        self.peak_waiting = self.peak_waiting.max(waiting);
    }
}
