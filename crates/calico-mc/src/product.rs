//! Product of the net's transition system with a Büchi automaton.
//!
//! A product successor pairs a net successor with an automaton edge whose
//! condition holds in that successor marking. A deadlocked marking
//! stutters: the marking stays fixed and only the automaton moves, so
//! finite runs extend to infinite ones.

use calico_net::{ColoredPetriNet, Marking};

use crate::buchi::BuchiAutomaton;
use crate::config::CursorPolicy;
use crate::successor::{ColoredSuccessorGenerator, Cursor};

/// A state of the product system.
#[derive(Debug, Clone)]
pub struct ProductState {
    pub marking: Marking,
    pub buchi_state: u32,
    pub accepting: bool,
}

impl PartialEq for ProductState {
    /// `accepting` is derived from `buchi_state` and excluded.
    fn eq(&self, other: &Self) -> bool {
        self.buchi_state == other.buchi_state && self.marking == other.marking
    }
}

impl Eq for ProductState {}

/// Enumeration cursor of one product state.
#[derive(Debug, Clone)]
pub struct ProductCursor {
    net_cursor: Cursor,
    /// Next automaton edge to pair with the current net successor.
    edge: usize,
    /// Net successor currently being paired with edges.
    successor: Option<Marking>,
    started: bool,
    deadlock: bool,
}

/// Generates successors of product states.
pub struct ProductGenerator<'a> {
    automaton: &'a BuchiAutomaton,
    generator: ColoredSuccessorGenerator<'a>,
    policy: CursorPolicy,
}

impl<'a> ProductGenerator<'a> {
    /// Narrowing is disabled here: product exploration reuses one state
    /// id for every marking, which would poison the narrowing cache.
    pub fn new(net: &'a ColoredPetriNet, automaton: &'a BuchiAutomaton, policy: CursorPolicy) -> Self {
        Self {
            automaton,
            generator: ColoredSuccessorGenerator::new(net, u64::MAX),
            policy,
        }
    }

    pub fn cursor(&self) -> ProductCursor {
        ProductCursor {
            net_cursor: self.generator.cursor(self.policy),
            edge: 0,
            successor: None,
            started: false,
            deadlock: false,
        }
    }

    /// Product states reachable from the initial marking through an
    /// initial automaton edge.
    pub fn initial_states(&mut self) -> Vec<ProductState> {
        let marking = self.generator.net().initial_marking().clone();
        let mut states = Vec::new();
        for edge in self.automaton.edges(self.automaton.initial()) {
            if self
                .automaton
                .eval_cond(&edge.cond, &mut self.generator, &marking)
            {
                states.push(self.make_state(marking.clone(), edge.target));
            }
        }
        states
    }

    pub fn has_invariant_self_loop(&self, state: &ProductState) -> bool {
        self.automaton.has_invariant_self_loop(state.buchi_state)
    }

    /// The next product successor of `state` under `cursor`, or `None`
    /// when exhausted.
    pub fn next(&mut self, state: &ProductState, cursor: &mut ProductCursor) -> Option<ProductState> {
        if !cursor.started {
            cursor.started = true;
            match self.net_successor(&state.marking, cursor) {
                Some(successor) => cursor.successor = Some(successor),
                None => cursor.deadlock = true,
            }
        }

        let edges = self.automaton.edges(state.buchi_state);

        if cursor.deadlock {
            // Stutter: the marking stays, the automaton moves alone.
            // Conditions are evaluated on the unchanged marking.
            while cursor.edge < edges.len() {
                let edge = &edges[cursor.edge];
                cursor.edge += 1;
                if self
                    .automaton
                    .eval_cond(&edge.cond, &mut self.generator, &state.marking)
                {
                    return Some(self.make_state(state.marking.clone(), edge.target));
                }
            }
            return None;
        }

        loop {
            cursor.successor.as_ref()?;
            while cursor.edge < edges.len() {
                let edge = &edges[cursor.edge];
                cursor.edge += 1;
                let successor = cursor.successor.as_ref().expect("successor present");
                if self
                    .automaton
                    .eval_cond(&edge.cond, &mut self.generator, successor)
                {
                    let marking = successor.clone();
                    return Some(self.make_state(marking, edge.target));
                }
            }
            cursor.successor = self.net_successor(&state.marking, cursor);
            cursor.edge = 0;
        }
    }

    fn net_successor(&mut self, marking: &Marking, cursor: &mut ProductCursor) -> Option<Marking> {
        let result = self
            .generator
            .next(marking, &mut cursor.net_cursor, 0)
            .map(|(successor, _)| successor);
        cursor.net_cursor.take_shuffle();
        result
    }

    fn make_state(&self, marking: Marking, buchi_state: u32) -> ProductState {
        ProductState {
            marking,
            buchi_state,
            accepting: self.automaton.is_accepting(buchi_state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buchi::EdgeCond;
    use crate::query::{CountValue, GammaQuery};
    use calico_net::{ArcSpec, CmpOp, NetBuilder};

    fn count_atom(place: u32, op: CmpOp, rhs: u64) -> GammaQuery {
        GammaQuery::Compare {
            op,
            lhs: CountValue::Place(place),
            rhs: CountValue::Constant(rhs),
        }
    }

    /// p feeds q through one transition; q is a sink.
    fn drain_net() -> ColoredPetriNet {
        let mut b = NetBuilder::new();
        let p = b.add_place("p", &[1]).unwrap();
        let q = b.add_place("q", &[1]).unwrap();
        let t = b.add_transition("t", None).unwrap();
        b.add_input_arc(t, p, ArcSpec::constant([(0, 1)])).unwrap();
        b.add_output_arc(t, q, ArcSpec::constant([(0, 1)])).unwrap();
        b.set_initial(p, [(0, 1)]).unwrap();
        b.build().unwrap()
    }

    fn two_state_automaton() -> BuchiAutomaton {
        // State a loops while p is nonempty, moves to accepting b once
        // p drains; b loops unconditionally.
        let mut automaton = BuchiAutomaton::new(vec![count_atom(0, CmpOp::Ge, 1)]);
        let a = automaton.add_state(false);
        let b = automaton.add_state(true);
        automaton.add_edge(a, EdgeCond::ap(0), a);
        automaton.add_edge(a, EdgeCond::not_ap(0), b);
        automaton.add_edge(b, EdgeCond::True, b);
        automaton.set_initial(a);
        automaton
    }

    #[test]
    fn initial_states_follow_initial_edges() {
        let net = drain_net();
        let automaton = two_state_automaton();
        let mut product = ProductGenerator::new(&net, &automaton, CursorPolicy::Fixed);
        let initials = product.initial_states();
        // Only the p-nonempty edge matches the initial marking.
        assert_eq!(initials.len(), 1);
        assert_eq!(initials[0].buchi_state, 0);
        assert!(!initials[0].accepting);
    }

    #[test]
    fn successors_pair_net_steps_with_matching_edges() {
        let net = drain_net();
        let automaton = two_state_automaton();
        let mut product = ProductGenerator::new(&net, &automaton, CursorPolicy::Fixed);
        let state = product.initial_states().remove(0);
        let mut cursor = product.cursor();

        // Firing t empties p, so only the edge into b matches.
        let successor = product.next(&state, &mut cursor).unwrap();
        assert_eq!(successor.buchi_state, 1);
        assert!(successor.accepting);
        assert!(successor.marking.place(0).is_empty());
        assert_eq!(successor.marking.place(1).count(0), 1);
        assert!(product.next(&state, &mut cursor).is_none());
    }

    #[test]
    fn deadlocked_marking_stutters_through_the_automaton() {
        let net = drain_net();
        let automaton = two_state_automaton();
        let mut product = ProductGenerator::new(&net, &automaton, CursorPolicy::Fixed);
        let state = product.initial_states().remove(0);
        let mut cursor = product.cursor();
        let drained = product.next(&state, &mut cursor).unwrap();

        // q has no outgoing transition, so the product stutters on the
        // unconditional self loop of b.
        let mut cursor = product.cursor();
        let stutter = product.next(&drained, &mut cursor).unwrap();
        assert_eq!(stutter, drained);
        assert!(product.next(&drained, &mut cursor).is_none());
    }
}
