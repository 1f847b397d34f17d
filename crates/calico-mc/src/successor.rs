//! Successor generation: binding enumeration, narrowing, firing.
//!
//! Bindings of a transition are enumerated as dense ids through the
//! transition's binding codec. Two cursor shapes walk that space: the
//! fixed cursor exhausts one transition before moving on, the even cursor
//! visits transitions round-robin taking one firing per visit.
//!
//! For transitions whose binding space is large, the generator first
//! narrows each variable to the values actually offered by tokens in the
//! preset places and enumerates the narrowed space instead. Narrowing
//! results are cached per `(state, transition)` and pruned once a state's
//! successors are exhausted.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::CursorPolicy;
use calico_net::{
    offset_color, Binding, BindingId, Color, ColoredPetriNet, Marking, PackCodec, TransitionId,
    VariableId,
};

const EXHAUSTED: BindingId = BindingId::MAX;

/// One firing recorded for trace reconstruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    /// Id assigned to the successor state.
    pub id: u64,
    /// Id of the state the firing happened in.
    pub predecessor: u64,
    pub transition: TransitionId,
    pub binding: BindingId,
}

/// Cursor that exhausts each transition's bindings in order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixedCursor {
    transition: TransitionId,
    binding: BindingId,
}

/// Cursor that takes one firing per transition, round-robin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvenCursor {
    /// Next binding id to try per transition; `EXHAUSTED` when done.
    bindings: Vec<BindingId>,
    current: usize,
    live: usize,
    /// Set when the round-robin wraps past the last transition. The
    /// search uses it to reshuffle randomized worklists.
    pub shuffle: bool,
}

impl EvenCursor {
    fn new(transition_count: usize) -> Self {
        Self {
            bindings: vec![0; transition_count],
            current: 0,
            live: transition_count,
            shuffle: false,
        }
    }
}

/// Per-state successor cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cursor {
    Fixed(FixedCursor),
    Even(EvenCursor),
}

impl Cursor {
    pub fn fixed() -> Self {
        Cursor::Fixed(FixedCursor::default())
    }

    pub fn even(transition_count: usize) -> Self {
        Cursor::Even(EvenCursor::new(transition_count))
    }

    /// Take and clear the even cursor's wrap signal.
    pub fn take_shuffle(&mut self) -> bool {
        match self {
            Cursor::Even(cursor) => std::mem::take(&mut cursor.shuffle),
            Cursor::Fixed(_) => false,
        }
    }
}

/// Possible values of one variable after preset narrowing.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PossibleValues {
    All,
    Some(Vec<Color>),
}

/// Cached narrowing result for one `(state, transition)` pair.
#[derive(Debug)]
struct ConstraintData {
    codec: PackCodec,
    variables: Vec<VariableId>,
    values: Vec<PossibleValues>,
}

/// Enumerates and fires enabled bindings of a net.
#[derive(Debug)]
pub struct ColoredSuccessorGenerator<'a> {
    net: &'a ColoredPetriNet,
    /// Narrow binding spaces strictly larger than this. `u64::MAX`
    /// disables narrowing.
    threshold: u64,
    constraints: BTreeMap<u64, ConstraintData>,
    binding: Binding,
    next_id: u64,
}

/// Cache key packing a state id and transition id. Transitions get the
/// low 16 bits, state ids the remaining 48.
fn cache_key(state_id: u64, transition: TransitionId) -> u64 {
    debug_assert!(
        u64::from(transition) <= 0xFFFF,
        "transition id exceeds the cache key range"
    );
    debug_assert!(
        state_id < 1 << 48,
        "state id exceeds the cache key range"
    );
    ((state_id & 0xFFFF_FFFF_FFFF) << 16) | (u64::from(transition) & 0xFFFF)
}

impl<'a> ColoredSuccessorGenerator<'a> {
    pub fn new(net: &'a ColoredPetriNet, threshold: u64) -> Self {
        Self {
            net,
            threshold,
            constraints: BTreeMap::new(),
            binding: Binding::new(net.variable_count()),
            next_id: 1,
        }
    }

    pub fn net(&self) -> &ColoredPetriNet {
        self.net
    }

    /// The binding of the most recent firing.
    pub fn current_binding(&self) -> &Binding {
        &self.binding
    }

    pub fn cursor(&self, policy: CursorPolicy) -> Cursor {
        match policy {
            CursorPolicy::Fixed => Cursor::fixed(),
            CursorPolicy::Even => Cursor::even(self.net.transition_count()),
        }
    }

    #[cfg(test)]
    pub(crate) fn constraint_cache_len(&self) -> usize {
        self.constraints.len()
    }

    /// Produce the next successor of `marking` under `cursor`, or `None`
    /// when the state is exhausted.
    pub fn next(
        &mut self,
        marking: &Marking,
        cursor: &mut Cursor,
        state_id: u64,
    ) -> Option<(Marking, Step)> {
        match cursor {
            Cursor::Fixed(_) => self.next_fixed(marking, cursor, state_id),
            Cursor::Even(_) => self.next_even(marking, cursor, state_id),
        }
    }

    fn next_fixed(
        &mut self,
        marking: &Marking,
        cursor: &mut Cursor,
        state_id: u64,
    ) -> Option<(Marking, Step)> {
        let Cursor::Fixed(fixed) = cursor else { unreachable!() };
        let transition_count = self.net.transition_count() as TransitionId;
        while fixed.transition < transition_count {
            let tid = fixed.transition;
            match self.find_next_valid_binding(marking, tid, fixed.binding, state_id) {
                Some(bid) => {
                    fixed.binding = bid + 1;
                    return Some(self.fire(marking, tid, bid, state_id));
                }
                None => {
                    fixed.binding = 0;
                    fixed.transition += 1;
                }
            }
        }
        None
    }

    fn next_even(
        &mut self,
        marking: &Marking,
        cursor: &mut Cursor,
        state_id: u64,
    ) -> Option<(Marking, Step)> {
        let transition_count = self.net.transition_count();
        loop {
            let (tid, bid) = {
                let Cursor::Even(even) = &mut *cursor else { unreachable!() };
                if even.live == 0 {
                    return None;
                }
                loop {
                    if even.current >= transition_count {
                        even.current = 0;
                        even.shuffle = true;
                    }
                    let tid = even.current;
                    if even.bindings[tid] != EXHAUSTED {
                        break (tid as TransitionId, even.bindings[tid]);
                    }
                    even.current += 1;
                }
            };
            let found = self.find_next_valid_binding(marking, tid, bid, state_id);
            let Cursor::Even(even) = cursor else { unreachable!() };
            even.current += 1;
            match found {
                Some(found_bid) => {
                    even.bindings[tid as usize] = found_bid + 1;
                    return Some(self.fire(marking, tid, found_bid, state_id));
                }
                None => {
                    even.bindings[tid as usize] = EXHAUSTED;
                    even.live -= 1;
                }
            }
        }
    }

    /// Clone `marking` and fire `transition` under the binding left in
    /// the scratch slot by the preceding search.
    fn fire(
        &mut self,
        marking: &Marking,
        transition: TransitionId,
        binding_id: BindingId,
        predecessor: u64,
    ) -> (Marking, Step) {
        let mut successor = marking.clone();
        self.net.fire(&mut successor, transition, &self.binding);
        let step = Step {
            id: self.next_id,
            predecessor,
            transition,
            binding: binding_id,
        };
        self.next_id += 1;
        (successor, step)
    }

    /// Find the first enabled binding of `transition` with id `>= from`,
    /// leaving its variable assignment in the scratch binding.
    pub fn find_next_valid_binding(
        &mut self,
        marking: &Marking,
        transition: TransitionId,
        from: BindingId,
        state_id: u64,
    ) -> Option<BindingId> {
        if from == 0 && self.should_early_terminate(marking, transition) {
            return None;
        }

        let total_bindings = self.net.transition(transition).total_bindings;
        if total_bindings == 0 {
            // Ground transition: only the empty binding exists.
            if from == 0 && self.check_preset_and_guard(marking, transition) {
                return Some(0);
            }
            return None;
        }

        let key = cache_key(state_id, transition);
        if total_bindings > self.threshold && !self.constraints.contains_key(&key) {
            match self.calculate_constraint_data(marking, transition) {
                Some(data) => {
                    self.constraints.insert(key, data);
                }
                None => return None,
            }
        }

        if !self.constraints.contains_key(&key) {
            for bid in from..total_bindings {
                self.load_binding(transition, bid);
                if self.check_preset_and_guard(marking, transition) {
                    return Some(bid);
                }
            }
            return None;
        }

        let max = self.constraints[&key].codec.max();
        for bid in from..max {
            self.load_narrowed_binding(&key, bid);
            if self.check_preset_and_guard(marking, transition) {
                return Some(bid);
            }
        }
        None
    }

    /// Drop cached narrowing data of a fully expanded state.
    pub fn shrink_state(&mut self, state_id: u64) {
        let start = cache_key(state_id, 0);
        let end = cache_key(state_id + 1, 0);
        let mut tail = self.constraints.split_off(&start);
        let mut rest = tail.split_off(&end);
        self.constraints.append(&mut rest);
    }

    /// True if `transition` has at least one enabled binding in
    /// `marking`.
    pub fn can_fire(&mut self, marking: &Marking, transition: TransitionId, state_id: u64) -> bool {
        self.find_next_valid_binding(marking, transition, 0, state_id)
            .is_some()
    }

    /// True if no transition has an enabled binding in `marking`.
    pub fn has_deadlock(&mut self, marking: &Marking, state_id: u64) -> bool {
        (0..self.net.transition_count() as TransitionId)
            .all(|transition| !self.can_fire(marking, transition, state_id))
    }

    fn should_early_terminate(&self, marking: &Marking, transition: TransitionId) -> bool {
        !self.check_inhibitors(marking, transition) || !self.has_minimal_cardinality(marking, transition)
    }

    fn check_inhibitors(&self, marking: &Marking, transition: TransitionId) -> bool {
        self.net
            .inhibitors_of(transition)
            .iter()
            .all(|inhibitor| marking.place(inhibitor.place).total() < inhibitor.weight)
    }

    fn has_minimal_cardinality(&self, marking: &Marking, transition: TransitionId) -> bool {
        self.net.inputs(transition).iter().all(|arc| {
            let place = marking.place(arc.place);
            place.total() >= arc.expression.minimal_count()
                && place.contains(arc.expression.minimal_marking())
        })
    }

    fn check_preset_and_guard(&self, marking: &Marking, transition: TransitionId) -> bool {
        let tr = self.net.transition(transition);
        if let Some(guard) = &tr.guard {
            if !guard.eval(&self.binding) {
                return false;
            }
        }
        self.net
            .inputs(transition)
            .iter()
            .all(|arc| arc.expression.is_subset(marking.place(arc.place), &self.binding))
    }

    /// Decode `binding_id` through the transition's full binding codec
    /// into the scratch binding.
    fn load_binding(&mut self, transition: TransitionId, binding_id: BindingId) {
        let tr = self.net.transition(transition);
        for (i, &var) in tr.variables.iter().enumerate() {
            self.binding.set(var, tr.binding_codec.decode(binding_id, i));
        }
    }

    /// Decode `binding_id` through a narrowed codec into the scratch
    /// binding.
    fn load_narrowed_binding(&mut self, key: &u64, binding_id: BindingId) {
        let data = &self.constraints[key];
        for (i, &var) in data.variables.iter().enumerate() {
            let index = data.codec.decode(binding_id, i);
            let color = match &data.values[i] {
                PossibleValues::All => index,
                PossibleValues::Some(colors) => colors[index as usize],
            };
            self.binding.set(var, color);
        }
    }

    /// Intersect, per variable, the values offered by tokens in the
    /// places the variable is constrained by. `None` when some variable
    /// has no possible value at all.
    fn calculate_constraint_data(
        &self,
        marking: &Marking,
        transition: TransitionId,
    ) -> Option<ConstraintData> {
        let tr = self.net.transition(transition);
        let mut values = Vec::with_capacity(tr.variables.len());
        let mut sizes: Vec<Color> = Vec::with_capacity(tr.variables.len());

        for &var in &tr.variables {
            let domain = self.net.variable(var).domain;
            let constraints = tr
                .preset_constraints
                .iter()
                .find(|(v, _)| *v == var)
                .map(|(_, c)| c.as_slice())
                .unwrap_or(&[]);
            if constraints.is_empty() {
                sizes.push(domain);
                values.push(PossibleValues::All);
                continue;
            }

            let mut possible = PossibleValues::All;
            for constraint in constraints {
                let place = self.net.place(constraint.place);
                let mut offered: BTreeSet<Color> = BTreeSet::new();
                for (color, _) in marking.place(constraint.place).iter() {
                    let component = place.codec.decode(u64::from(color), constraint.tuple_pos);
                    offered.insert(offset_color(component, -constraint.offset, domain));
                }
                possible = match possible {
                    PossibleValues::All => {
                        if offered.len() == domain as usize {
                            PossibleValues::All
                        } else {
                            PossibleValues::Some(offered.into_iter().collect())
                        }
                    }
                    PossibleValues::Some(colors) => PossibleValues::Some(
                        colors.into_iter().filter(|c| offered.contains(c)).collect(),
                    ),
                };
                if matches!(&possible, PossibleValues::Some(colors) if colors.is_empty()) {
                    return None;
                }
            }
            sizes.push(match &possible {
                PossibleValues::All => domain,
                PossibleValues::Some(colors) => colors.len() as Color,
            });
            values.push(possible);
        }

        Some(ConstraintData {
            codec: PackCodec::new(&sizes),
            variables: tr.variables.clone(),
            values,
        })
    }
}
