//! Nested depth-first search for accepting cycles in the product.
//!
//! The automaton is expected to accept the violations of the property
//! under check, so an accepting cycle is a counterexample: the property
//! is not satisfied. No cycle plus exact statespace coverage proves the
//! property; anything less is unknown.
//!
//! The outer search runs to post-order; when an accepting state retires
//! it is either dismissed through an unconditional self loop or handed to
//! the inner search, which looks for a path back to it. Both searches
//! share one inner marking set per outer run, which keeps the whole
//! procedure linear in the product size.

use std::time::Instant;

use tracing::debug;

use calico_net::ColoredPetriNet;

use crate::buchi::BuchiAutomaton;
use crate::config::{CheckConfig, CheckResult, Verdict};
use crate::encoder::ProductEncoder;
use crate::passed::PassedList;
use crate::product::{ProductCursor, ProductGenerator, ProductState};
use crate::stats::SearchStatistics;

const DEADLINE_MASK: u64 = 0x3ff;

struct Entry {
    state: ProductState,
    cursor: ProductCursor,
}

/// Deadline expiry, unwound through both search levels.
struct DeadlineHit;

/// Checks a Büchi automaton (accepting the property's violations)
/// against a net.
pub struct NdfsChecker<'a> {
    product: ProductGenerator<'a>,
    encoder: ProductEncoder,
    deadline: Option<Instant>,
    stats: SearchStatistics,
    iterations: u64,
}

impl<'a> NdfsChecker<'a> {
    pub fn new(net: &'a ColoredPetriNet, automaton: &'a BuchiAutomaton, config: &CheckConfig) -> Self {
        Self {
            product: ProductGenerator::new(net, automaton, config.cursor_policy),
            encoder: ProductEncoder::new(net.place_count()),
            deadline: config.deadline,
            stats: SearchStatistics::default(),
            iterations: 0,
        }
    }

    pub fn run(mut self) -> CheckResult {
        let initials = self.product.initial_states();
        self.stats.discovered = initials.len() as u64;
        let mut found = false;
        for initial in initials {
            match self.dfs(initial) {
                Ok(true) => {
                    found = true;
                    break;
                }
                Ok(false) => {}
                Err(DeadlineHit) => {
                    debug!(explored = self.stats.explored, "deadline reached");
                    return self.finish(Verdict::Unknown);
                }
            }
        }
        let verdict = if found {
            Verdict::NotSatisfied
        } else if self.encoder.full_statespace() {
            Verdict::Satisfied
        } else {
            Verdict::Unknown
        };
        self.finish(verdict)
    }

    fn finish(mut self, verdict: Verdict) -> CheckResult {
        self.stats.biggest_encoding = self.encoder.biggest();
        debug!(
            ?verdict,
            discovered = self.stats.discovered,
            explored = self.stats.explored,
            "cycle search finished"
        );
        CheckResult {
            verdict,
            stats: self.stats,
            trace: None,
        }
    }

    fn dfs(&mut self, initial: ProductState) -> Result<bool, DeadlineHit> {
        let mut todo = vec![Entry {
            cursor: self.product.cursor(),
            state: initial,
        }];
        let mut nested_todo = Vec::new();
        let mut mark1 = PassedList::new();
        let mut mark2 = PassedList::new();

        while let Some(top) = todo.last_mut() {
            self.check_deadline()?;
            let working = self.product.next(&top.state, &mut top.cursor);
            self.stats.explored += 1;
            match working {
                None => {
                    let state = todo.pop().expect("todo is nonempty").state;
                    if state.accepting {
                        if self.product.has_invariant_self_loop(&state) {
                            return Ok(true);
                        }
                        if self.ndfs(&state, &mut nested_todo, &mut mark2)? {
                            return Ok(true);
                        }
                    }
                }
                Some(working) => {
                    let encoding = self.encoder.encode(&working.marking, working.buchi_state);
                    if mark1.insert(encoding) {
                        self.stats.discovered += 1;
                        // An accepting state that can loop on itself
                        // unconditionally closes a cycle immediately.
                        let top = todo.last().expect("todo is nonempty");
                        if top.state.accepting && self.product.has_invariant_self_loop(&top.state) {
                            return Ok(true);
                        }
                        todo.push(Entry {
                            cursor: self.product.cursor(),
                            state: working,
                        });
                        self.stats.note_waiting(todo.len() + nested_todo.len());
                    }
                }
            }
        }
        Ok(false)
    }

    /// Inner search: look for a path from `seed`'s successors back to
    /// `seed`.
    fn ndfs(
        &mut self,
        seed: &ProductState,
        nested_todo: &mut Vec<Entry>,
        mark2: &mut PassedList,
    ) -> Result<bool, DeadlineHit> {
        nested_todo.push(Entry {
            cursor: self.product.cursor(),
            state: seed.clone(),
        });
        while let Some(top) = nested_todo.last_mut() {
            self.check_deadline()?;
            let working = self.product.next(&top.state, &mut top.cursor);
            self.stats.explored += 1;
            match working {
                None => {
                    nested_todo.pop();
                }
                Some(working) => {
                    if working == *seed {
                        return Ok(true);
                    }
                    let encoding = self.encoder.encode(&working.marking, working.buchi_state);
                    if mark2.insert(encoding) {
                        self.stats.discovered += 1;
                        nested_todo.push(Entry {
                            cursor: self.product.cursor(),
                            state: working,
                        });
                    }
                }
            }
        }
        Ok(false)
    }

    fn check_deadline(&mut self) -> Result<(), DeadlineHit> {
        self.iterations += 1;
        if self.iterations & DEADLINE_MASK == 0 {
            if let Some(deadline) = self.deadline {
                if Instant::now() >= deadline {
                    return Err(DeadlineHit);
                }
            }
        }
        Ok(())
    }
}
