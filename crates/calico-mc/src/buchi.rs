//! Büchi automata with compiled edge conditions.
//!
//! Edge conditions are small binary decision graphs over atomic
//! propositions; evaluating one walks a branch per proposition instead of
//! re-evaluating a boolean formula tree. Atomic propositions are compiled
//! state predicates indexed into the automaton's atom table.

use calico_net::Marking;

use crate::query::GammaQuery;
use crate::successor::ColoredSuccessorGenerator;

/// A decision graph over atomic propositions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeCond {
    True,
    False,
    Branch {
        /// Index into the automaton's atom table.
        ap: usize,
        high: Box<EdgeCond>,
        low: Box<EdgeCond>,
    },
}

impl EdgeCond {
    /// Condition holding exactly when atom `ap` holds.
    pub fn ap(ap: usize) -> Self {
        EdgeCond::Branch {
            ap,
            high: Box::new(EdgeCond::True),
            low: Box::new(EdgeCond::False),
        }
    }

    /// Condition holding exactly when atom `ap` does not hold.
    pub fn not_ap(ap: usize) -> Self {
        EdgeCond::Branch {
            ap,
            high: Box::new(EdgeCond::False),
            low: Box::new(EdgeCond::True),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BuchiEdge {
    pub cond: EdgeCond,
    pub target: u32,
}

#[derive(Debug, Clone, Default)]
pub struct BuchiState {
    pub accepting: bool,
    pub edges: Vec<BuchiEdge>,
}

/// A Büchi automaton over state predicates of the net.
#[derive(Debug, Clone, Default)]
pub struct BuchiAutomaton {
    states: Vec<BuchiState>,
    initial: u32,
    atoms: Vec<GammaQuery>,
}

impl BuchiAutomaton {
    pub fn new(atoms: Vec<GammaQuery>) -> Self {
        Self {
            states: Vec::new(),
            initial: 0,
            atoms,
        }
    }

    pub fn add_state(&mut self, accepting: bool) -> u32 {
        let id = self.states.len() as u32;
        self.states.push(BuchiState {
            accepting,
            edges: Vec::new(),
        });
        id
    }

    pub fn add_edge(&mut self, from: u32, cond: EdgeCond, to: u32) {
        self.states[from as usize]
            .edges
            .push(BuchiEdge { cond, target: to });
    }

    pub fn set_initial(&mut self, state: u32) {
        self.initial = state;
    }

    pub fn initial(&self) -> u32 {
        self.initial
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn edges(&self, state: u32) -> &[BuchiEdge] {
        &self.states[state as usize].edges
    }

    pub fn is_accepting(&self, state: u32) -> bool {
        self.states[state as usize].accepting
    }

    /// Walk `cond` under the atom valuation of `marking`.
    pub fn eval_cond(
        &self,
        cond: &EdgeCond,
        generator: &mut ColoredSuccessorGenerator<'_>,
        marking: &Marking,
    ) -> bool {
        let mut cond = cond;
        loop {
            match cond {
                EdgeCond::True => return true,
                EdgeCond::False => return false,
                EdgeCond::Branch { ap, high, low } => {
                    cond = if self.atoms[*ap].eval(generator, marking, 0) {
                        high
                    } else {
                        low
                    };
                }
            }
        }
    }

    /// True if `state` carries an unconditional edge back to itself.
    pub fn has_invariant_self_loop(&self, state: u32) -> bool {
        self.edges(state)
            .iter()
            .any(|edge| edge.cond == EdgeCond::True && edge.target == state)
    }
}
