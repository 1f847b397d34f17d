//! Check configuration and outcome types.

use std::str::FromStr;
use std::time::Instant;

use calico_net::{Binding, TransitionId};

use crate::error::CheckError;
use crate::stats::SearchStatistics;

/// Worklist discipline for the reachability search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    #[default]
    Dfs,
    Bfs,
    /// Depth-first with randomized sibling order, seeded.
    Rdfs,
    /// Distance-guided best-first.
    BestFs,
}

impl FromStr for Strategy {
    type Err = CheckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dfs" => Ok(Strategy::Dfs),
            "bfs" => Ok(Strategy::Bfs),
            "rdfs" => Ok(Strategy::Rdfs),
            "bestfs" => Ok(Strategy::BestFs),
            other => Err(CheckError::UnsupportedStrategy(other.to_string())),
        }
    }
}

/// How a state's successor cursor walks the transition space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorPolicy {
    /// Exhaust one transition's bindings before the next.
    #[default]
    Fixed,
    /// Round-robin over transitions, one firing per visit.
    Even,
}

impl FromStr for CursorPolicy {
    type Err = CheckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fixed" => Ok(CursorPolicy::Fixed),
            "even" => Ok(CursorPolicy::Even),
            other => Err(CheckError::UnsupportedGenerator(other.to_string())),
        }
    }
}

/// Three-valued check outcome.
///
/// `Unknown` is returned when the search ran out of time or the
/// statespace could not be covered exactly, never as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Satisfied,
    NotSatisfied,
    Unknown,
}

/// Knobs for a single check run.
#[derive(Debug, Clone)]
pub struct CheckConfig {
    pub strategy: Strategy,
    pub cursor_policy: CursorPolicy,
    /// Drop markings of parked waiting states, keeping only their byte
    /// encoding.
    pub encode_waiting: bool,
    pub seed: u64,
    pub deadline: Option<Instant>,
    /// Record firing steps so a witness trace can be rebuilt.
    pub track_trace: bool,
    /// Binding spaces larger than this get constraint narrowing.
    pub narrow_threshold: u64,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            cursor_policy: CursorPolicy::default(),
            encode_waiting: false,
            seed: 0,
            deadline: None,
            track_trace: false,
            narrow_threshold: 30,
        }
    }
}

/// One step of a witness trace: the transition fired and the binding it
/// was fired under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceStep {
    pub transition: TransitionId,
    pub binding: Binding,
}

/// Verdict, statistics, and optional witness trace of one check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub verdict: Verdict,
    pub stats: SearchStatistics,
    pub trace: Option<Vec<TraceStep>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_names_parse() {
        assert_eq!("rdfs".parse::<Strategy>().unwrap(), Strategy::Rdfs);
        assert_eq!(
            "random".parse::<Strategy>().unwrap_err(),
            CheckError::UnsupportedStrategy("random".to_string())
        );
    }

    #[test]
    fn cursor_names_parse() {
        assert_eq!("even".parse::<CursorPolicy>().unwrap(), CursorPolicy::Even);
        assert!(matches!(
            "odd".parse::<CursorPolicy>(),
            Err(CheckError::UnsupportedGenerator(_))
        ));
    }
}
