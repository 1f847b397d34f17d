//! The reachability search.
//!
//! One generic worklist loop serves all strategies: pull the front state,
//! draw one successor at a time, deduplicate against the passed list,
//! check fresh states against the query, and stop early the moment the
//! query is decided. EF stops on a satisfying state, AG on a violating
//! one; an exhausted search decides the query negatively only when the
//! encoder could vouch for every state it saw.

use std::collections::HashMap;
use std::time::Instant;

use tracing::debug;

use calico_net::{Binding, ColoredPetriNet, TransitionId};

use crate::config::{CheckConfig, CheckResult, Strategy, TraceStep, Verdict};
use crate::encoder::ColoredEncoder;
use crate::error::CheckError;
use crate::passed::PassedList;
use crate::query::{compile_reachability, CompiledQuery, Quantifier, QueryExpr};
use crate::stats::SearchStatistics;
use crate::successor::ColoredSuccessorGenerator;
use crate::worklist::{BestFs, Bfs, Dfs, Rdfs, WaitingState, Worklist};

/// How often the deadline is polled, in loop iterations.
const DEADLINE_MASK: u64 = 0x3ff;

type TraceMap = HashMap<u64, (u64, TransitionId, Binding), ahash::RandomState>;

/// Checks one compiled reachability query against a net.
pub struct ReachabilityChecker<'a> {
    net: &'a ColoredPetriNet,
    query: CompiledQuery,
    config: CheckConfig,
}

impl<'a> ReachabilityChecker<'a> {
    pub fn new(
        net: &'a ColoredPetriNet,
        query: &QueryExpr,
        config: CheckConfig,
    ) -> Result<Self, CheckError> {
        let query = compile_reachability(query, net)?;
        Ok(Self { net, query, config })
    }

    pub fn run(mut self) -> CheckResult {
        match self.config.strategy {
            Strategy::Dfs => {
                let waiting = Dfs::new(self.config.encode_waiting);
                self.search(waiting)
            }
            Strategy::Bfs => {
                let waiting = Bfs::new(self.config.encode_waiting);
                self.search(waiting)
            }
            Strategy::Rdfs => {
                let waiting = Rdfs::new(self.config.seed, self.config.encode_waiting);
                self.search(waiting)
            }
            Strategy::BestFs => {
                let waiting = BestFs::new(
                    self.query.condition.clone(),
                    self.query.quantifier == Quantifier::AlwaysGlobally,
                );
                self.search(waiting)
            }
        }
    }

    fn search<W: Worklist>(&mut self, mut waiting: W) -> CheckResult {
        let mut encoder = ColoredEncoder::new(self.net.place_count());
        let mut passed = PassedList::new();
        let mut generator = ColoredSuccessorGenerator::new(self.net, self.config.narrow_threshold);
        let mut stats = SearchStatistics::default();
        let mut trace: TraceMap = TraceMap::default();

        // A hit on this value of the query decides the search.
        let early_termination = self.query.quantifier == Quantifier::ExistsFinally;

        let initial = self.net.initial_marking().clone();
        passed.insert(encoder.encode(&initial));
        stats.discovered = 1;
        stats.checked = 1;

        if self.query.condition.eval(&mut generator, &initial, 0) == early_termination {
            stats.biggest_encoding = encoder.biggest();
            return self.finish(Verdict::from_search(
                true,
                encoder.full_statespace(),
                self.query.quantifier,
            ), stats, Some(Vec::new()));
        }
        if self.net.transition_count() == 0 {
            stats.biggest_encoding = encoder.biggest();
            return self.finish(Verdict::from_search(
                false,
                encoder.full_statespace(),
                self.query.quantifier,
            ), stats, None);
        }

        let cursor = generator.cursor(self.config.cursor_policy);
        waiting.add(
            WaitingState::new(0, cursor.clone(), initial),
            &mut encoder,
        );
        stats.note_waiting(waiting.len());

        let mut iterations: u64 = 0;
        while !waiting.is_empty() {
            iterations += 1;
            if iterations & DEADLINE_MASK == 0 {
                if let Some(deadline) = self.config.deadline {
                    if Instant::now() >= deadline {
                        stats.end_waiting = waiting.len();
                        stats.biggest_encoding = encoder.biggest();
                        debug!(explored = stats.explored, "deadline reached");
                        return self.finish(Verdict::Unknown, stats, None);
                    }
                }
            }

            let state = waiting.peek(&mut encoder);
            let state_id = state.id;
            let (marking, state_cursor) = state.expand_parts();
            let step = generator.next(marking, state_cursor, state_id);
            let wrapped = state_cursor.take_shuffle();
            let Some((successor_marking, step)) = step else {
                // An exhausted state leaves before the wrap signal is
                // honored; `Rdfs::remove` respills its cache after the
                // pop, so nothing fresh can land under a dead top.
                waiting.remove(&mut encoder);
                generator.shrink_state(state_id);
                continue;
            };
            if wrapped {
                waiting.shuffle(&mut encoder);
            }

            stats.explored += 1;
            let encoding: Box<[u8]> = encoder.encode(&successor_marking).into();
            if passed.contains(&encoding) {
                continue;
            }
            stats.checked += 1;
            if self.config.track_trace {
                trace.insert(
                    step.id,
                    (
                        step.predecessor,
                        step.transition,
                        generator.current_binding().clone(),
                    ),
                );
            }
            if self.query.condition.eval(&mut generator, &successor_marking, step.id)
                == early_termination
            {
                stats.discovered += 1;
                stats.end_waiting = waiting.len();
                stats.biggest_encoding = encoder.biggest();
                let witness = self
                    .config
                    .track_trace
                    .then(|| rebuild_trace(&trace, step.id));
                return self.finish(Verdict::from_search(
                    true,
                    encoder.full_statespace(),
                    self.query.quantifier,
                ), stats, witness);
            }
            let successor = WaitingState::new(step.id, cursor.clone(), successor_marking);
            waiting.add(successor, &mut encoder);
            passed.insert(&encoding);
            stats.discovered += 1;
            stats.note_waiting(waiting.len());
        }

        stats.end_waiting = waiting.len();
        stats.biggest_encoding = encoder.biggest();
        self.finish(Verdict::from_search(
            false,
            encoder.full_statespace(),
            self.query.quantifier,
        ), stats, None)
    }

    fn finish(
        &self,
        verdict: Verdict,
        stats: SearchStatistics,
        trace: Option<Vec<TraceStep>>,
    ) -> CheckResult {
        debug!(
            ?verdict,
            discovered = stats.discovered,
            explored = stats.explored,
            checked = stats.checked,
            "reachability check finished"
        );
        CheckResult {
            verdict,
            stats,
            trace: if self.config.track_trace { trace } else { None },
        }
    }
}

impl Verdict {
    /// Map search outcome to a verdict the way the quantifier reads it.
    /// An exhausted search without full statespace coverage proves
    /// nothing.
    fn from_search(found: bool, full_statespace: bool, quantifier: Quantifier) -> Self {
        if !found && !full_statespace {
            return Verdict::Unknown;
        }
        let satisfied = match quantifier {
            Quantifier::ExistsFinally => found,
            Quantifier::AlwaysGlobally => !found,
        };
        if satisfied {
            Verdict::Satisfied
        } else {
            Verdict::NotSatisfied
        }
    }
}

fn rebuild_trace(trace: &TraceMap, mut id: u64) -> Vec<TraceStep> {
    let mut steps = Vec::new();
    while let Some((predecessor, transition, binding)) = trace.get(&id) {
        steps.push(TraceStep {
            transition: *transition,
            binding: binding.clone(),
        });
        id = *predecessor;
    }
    steps.reverse();
    steps
}
