//! The compiled net and its builder.
//!
//! A [`ColoredPetriNet`] is an immutable, fully resolved structure: arcs
//! and inhibitors live in flat arrays sliced per transition, every
//! transition carries its sorted variable list and binding codec, and
//! preset occurrence data for constraint narrowing is precomputed. All
//! validation happens in [`NetBuilder::build`]; the checker never sees a
//! malformed net.

use std::ops::Range;

use thiserror::Error;

use crate::arc::{ColorRef, CompiledArc, ParamColor};
use crate::binding::Binding;
use crate::codec::PackCodec;
use crate::guard::CompiledGuard;
use crate::ids::{Color, MarkingCount, PlaceId, TransitionId, VariableId};
use crate::marking::Marking;
use crate::multiset::ColorMultiset;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NetError {
    #[error("place index {0} out of range")]
    PlaceOutOfRange(PlaceId),
    #[error("transition index {0} out of range")]
    TransitionOutOfRange(TransitionId),
    #[error("variable index {0} out of range")]
    VariableOutOfRange(VariableId),
    #[error("color domain must not be empty")]
    EmptyDomain,
    #[error("tuple color domain of size {size} exceeds the packed color width")]
    DomainTooLarge { size: u64 },
    #[error("sequence has {got} components but place {place} expects {expected}")]
    SequenceLengthMismatch {
        place: PlaceId,
        expected: usize,
        got: usize,
    },
    #[error("component domain {got} does not match expected domain {expected}")]
    DomainMismatch { expected: Color, got: Color },
    #[error("constant color {color} outside domain of size {domain}")]
    ColorOutOfDomain { color: Color, domain: Color },
    #[error("the all-colors expression is not allowed in guards")]
    AllInGuard,
    #[error("duplicate name {0:?}")]
    DuplicateName(String),
}

/// A place: a named slot for a multiset of packed tuple colors.
#[derive(Debug, Clone)]
pub struct Place {
    pub name: String,
    /// Per-component domain sizes of the place's tuple color type.
    pub tuple_sizes: Vec<Color>,
    /// Codec packing component tuples into single colors.
    pub codec: PackCodec,
}

impl Place {
    /// Total number of distinct colors the place can hold.
    pub fn color_size(&self) -> u64 {
        self.codec.max()
    }
}

/// A binding variable declaration.
#[derive(Debug, Clone, Copy)]
pub struct VariableDecl {
    /// Number of colors the variable ranges over.
    pub domain: Color,
}

/// Occurrence of a variable at a tuple position of an input arc. Tokens in
/// `place` restrict what the variable can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresetConstraint {
    pub place: PlaceId,
    pub tuple_pos: usize,
    /// Offset the arc applies to the variable; a token component `c`
    /// admits the variable value `c - offset` (cyclically).
    pub offset: i64,
}

/// An inhibitor: the transition is disabled while `place` holds `weight`
/// or more tokens in total.
#[derive(Debug, Clone, Copy)]
pub struct Inhibitor {
    pub place: PlaceId,
    pub weight: MarkingCount,
}

/// A transition with resolved guard, variable list and arc slices.
#[derive(Debug, Clone)]
pub struct Transition {
    pub name: String,
    pub guard: Option<CompiledGuard>,
    /// Variables the guard or any incident arc mentions, ascending.
    pub variables: Vec<VariableId>,
    /// Packs assignments to `variables` (in order) into binding ids.
    pub binding_codec: PackCodec,
    /// Size of the binding space; `0` when the transition is ground and
    /// only the empty binding exists.
    pub total_bindings: u64,
    /// Narrowing data per variable, ascending by variable, restricted to
    /// variables that occur plainly on some input arc.
    pub preset_constraints: Vec<(VariableId, Vec<PresetConstraint>)>,
    pub(crate) input_range: Range<usize>,
    pub(crate) output_range: Range<usize>,
    pub(crate) inhibitor_range: Range<usize>,
}

/// An arc instance: a compiled expression targeting one place.
#[derive(Debug, Clone)]
pub struct NetArc {
    pub place: PlaceId,
    pub expression: CompiledArc,
}

/// The immutable compiled net.
#[derive(Debug, Clone)]
pub struct ColoredPetriNet {
    places: Vec<Place>,
    transitions: Vec<Transition>,
    variables: Vec<VariableDecl>,
    input_arcs: Vec<NetArc>,
    output_arcs: Vec<NetArc>,
    inhibitors: Vec<Inhibitor>,
    initial_marking: Marking,
}

impl ColoredPetriNet {
    #[inline]
    pub fn place_count(&self) -> usize {
        self.places.len()
    }

    #[inline]
    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }

    #[inline]
    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    #[inline]
    pub fn place(&self, place: PlaceId) -> &Place {
        &self.places[place as usize]
    }

    #[inline]
    pub fn transition(&self, transition: TransitionId) -> &Transition {
        &self.transitions[transition as usize]
    }

    #[inline]
    pub fn variable(&self, var: VariableId) -> VariableDecl {
        self.variables[var as usize]
    }

    pub fn initial_marking(&self) -> &Marking {
        &self.initial_marking
    }

    pub fn place_named(&self, name: &str) -> Option<PlaceId> {
        self.places
            .iter()
            .position(|p| p.name == name)
            .map(|i| i as PlaceId)
    }

    pub fn transition_named(&self, name: &str) -> Option<TransitionId> {
        self.transitions
            .iter()
            .position(|t| t.name == name)
            .map(|i| i as TransitionId)
    }

    pub fn inputs(&self, transition: TransitionId) -> &[NetArc] {
        &self.input_arcs[self.transitions[transition as usize].input_range.clone()]
    }

    pub fn outputs(&self, transition: TransitionId) -> &[NetArc] {
        &self.output_arcs[self.transitions[transition as usize].output_range.clone()]
    }

    pub fn inhibitors_of(&self, transition: TransitionId) -> &[Inhibitor] {
        &self.inhibitors[self.transitions[transition as usize].inhibitor_range.clone()]
    }

    /// Fire `transition` under `binding`, mutating `marking` in place.
    /// The caller has already established enabledness.
    pub fn fire(&self, marking: &mut Marking, transition: TransitionId, binding: &Binding) {
        for arc in self.inputs(transition) {
            arc.expression.consume(marking.place_mut(arc.place), binding);
        }
        for arc in self.outputs(transition) {
            arc.expression.produce(marking.place_mut(arc.place), binding);
        }
    }
}

/// Raw arc expression handed to the builder before compilation.
///
/// Sequences carry signed weights; the builder merges equal sequences and
/// drops those whose net weight is not positive.
#[derive(Debug, Clone, Default)]
pub struct ArcSpec {
    pub constant: Vec<(Color, MarkingCount)>,
    pub sequences: Vec<(Vec<ParamColor>, i64)>,
}

impl ArcSpec {
    pub fn constant(entries: impl IntoIterator<Item = (Color, MarkingCount)>) -> Self {
        Self {
            constant: entries.into_iter().collect(),
            sequences: Vec::new(),
        }
    }

    pub fn sequence(components: Vec<ParamColor>) -> Self {
        Self {
            constant: Vec::new(),
            sequences: vec![(components, 1)],
        }
    }

    pub fn weighted(components: Vec<ParamColor>, weight: i64) -> Self {
        Self {
            constant: Vec::new(),
            sequences: vec![(components, weight)],
        }
    }
}

#[derive(Debug, Default)]
struct TransitionSpec {
    name: String,
    guard: Option<CompiledGuard>,
    inputs: Vec<(PlaceId, ArcSpec)>,
    outputs: Vec<(PlaceId, ArcSpec)>,
    inhibitors: Vec<Inhibitor>,
}

/// Assembles and validates a [`ColoredPetriNet`].
#[derive(Debug, Default)]
pub struct NetBuilder {
    places: Vec<Place>,
    variables: Vec<VariableDecl>,
    transitions: Vec<TransitionSpec>,
    initial: Vec<ColorMultiset>,
}

impl NetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_place(
        &mut self,
        name: impl Into<String>,
        tuple_sizes: &[Color],
    ) -> Result<PlaceId, NetError> {
        if tuple_sizes.iter().any(|&s| s == 0) {
            return Err(NetError::EmptyDomain);
        }
        // Packed tuple colors must fit `Color`.
        let codec = PackCodec::new(tuple_sizes);
        if codec.max() > u64::from(Color::MAX) {
            return Err(NetError::DomainTooLarge { size: codec.max() });
        }
        let name = name.into();
        if self.places.iter().any(|p| p.name == name) {
            return Err(NetError::DuplicateName(name));
        }
        let id = self.places.len() as PlaceId;
        self.places.push(Place {
            name,
            tuple_sizes: tuple_sizes.to_vec(),
            codec,
        });
        self.initial.push(ColorMultiset::new());
        Ok(id)
    }

    pub fn add_variable(&mut self, domain: Color) -> Result<VariableId, NetError> {
        if domain == 0 {
            return Err(NetError::EmptyDomain);
        }
        let id = self.variables.len() as VariableId;
        self.variables.push(VariableDecl { domain });
        Ok(id)
    }

    pub fn add_transition(
        &mut self,
        name: impl Into<String>,
        guard: Option<CompiledGuard>,
    ) -> Result<TransitionId, NetError> {
        let name = name.into();
        if self.transitions.iter().any(|t| t.name == name) {
            return Err(NetError::DuplicateName(name));
        }
        let id = self.transitions.len() as TransitionId;
        self.transitions.push(TransitionSpec {
            name,
            guard,
            ..TransitionSpec::default()
        });
        Ok(id)
    }

    pub fn set_initial(
        &mut self,
        place: PlaceId,
        tokens: impl IntoIterator<Item = (Color, MarkingCount)>,
    ) -> Result<(), NetError> {
        let slot = self
            .initial
            .get_mut(place as usize)
            .ok_or(NetError::PlaceOutOfRange(place))?;
        *slot = ColorMultiset::from_entries(tokens);
        Ok(())
    }

    pub fn add_input_arc(
        &mut self,
        transition: TransitionId,
        place: PlaceId,
        spec: ArcSpec,
    ) -> Result<(), NetError> {
        self.check_transition(transition)?;
        self.check_arc(place, &spec)?;
        self.transitions[transition as usize].inputs.push((place, spec));
        Ok(())
    }

    pub fn add_output_arc(
        &mut self,
        transition: TransitionId,
        place: PlaceId,
        spec: ArcSpec,
    ) -> Result<(), NetError> {
        self.check_transition(transition)?;
        self.check_arc(place, &spec)?;
        self.transitions[transition as usize].outputs.push((place, spec));
        Ok(())
    }

    pub fn add_inhibitor(
        &mut self,
        transition: TransitionId,
        place: PlaceId,
        weight: MarkingCount,
    ) -> Result<(), NetError> {
        self.check_transition(transition)?;
        if place as usize >= self.places.len() {
            return Err(NetError::PlaceOutOfRange(place));
        }
        self.transitions[transition as usize]
            .inhibitors
            .push(Inhibitor { place, weight });
        Ok(())
    }

    pub fn build(self) -> Result<ColoredPetriNet, NetError> {
        for spec in &self.transitions {
            if let Some(guard) = &spec.guard {
                self.check_guard(guard)?;
            }
        }

        let mut transitions = Vec::with_capacity(self.transitions.len());
        let mut input_arcs = Vec::new();
        let mut output_arcs = Vec::new();
        let mut inhibitors = Vec::new();

        for spec in &self.transitions {
            let input_start = input_arcs.len();
            for (place, arc_spec) in &spec.inputs {
                input_arcs.push(NetArc {
                    place: *place,
                    expression: self.compile_arc(*place, arc_spec),
                });
            }
            let output_start = output_arcs.len();
            for (place, arc_spec) in &spec.outputs {
                output_arcs.push(NetArc {
                    place: *place,
                    expression: self.compile_arc(*place, arc_spec),
                });
            }
            let inhibitor_start = inhibitors.len();
            inhibitors.extend_from_slice(&spec.inhibitors);

            let input_range = input_start..input_arcs.len();
            let output_range = output_start..output_arcs.len();

            let mut variables: Vec<VariableId> = Vec::new();
            for arc in input_arcs[input_range.clone()]
                .iter()
                .chain(&output_arcs[output_range.clone()])
            {
                variables.extend_from_slice(arc.expression.variables());
            }
            if let Some(guard) = &spec.guard {
                collect_guard_variables(guard, &mut variables);
            }
            variables.sort_unstable();
            variables.dedup();

            let sizes: Vec<Color> = variables
                .iter()
                .map(|&v| self.variables[v as usize].domain)
                .collect();
            let binding_codec = PackCodec::new(&sizes);
            let total_bindings = if variables.is_empty() {
                0
            } else {
                binding_codec.max()
            };

            let preset_constraints =
                collect_preset_constraints(&variables, &input_arcs[input_range.clone()]);

            transitions.push(Transition {
                name: spec.name.clone(),
                guard: spec.guard.clone(),
                variables,
                binding_codec,
                total_bindings,
                preset_constraints,
                input_range,
                output_range,
                inhibitor_range: inhibitor_start..inhibitors.len(),
            });
        }

        Ok(ColoredPetriNet {
            places: self.places,
            transitions,
            variables: self.variables,
            input_arcs,
            output_arcs,
            inhibitors,
            initial_marking: Marking::from_places(self.initial),
        })
    }

    fn check_transition(&self, transition: TransitionId) -> Result<(), NetError> {
        if transition as usize >= self.transitions.len() {
            return Err(NetError::TransitionOutOfRange(transition));
        }
        Ok(())
    }

    fn check_component(&self, pc: &ParamColor) -> Result<(), NetError> {
        match pc.base {
            ColorRef::Color(c) => {
                if c >= pc.domain {
                    return Err(NetError::ColorOutOfDomain {
                        color: c,
                        domain: pc.domain,
                    });
                }
            }
            ColorRef::Variable(v) => {
                let decl = self
                    .variables
                    .get(v as usize)
                    .ok_or(NetError::VariableOutOfRange(v))?;
                if decl.domain != pc.domain {
                    return Err(NetError::DomainMismatch {
                        expected: decl.domain,
                        got: pc.domain,
                    });
                }
            }
            ColorRef::All => {}
        }
        Ok(())
    }

    fn check_arc(&self, place: PlaceId, spec: &ArcSpec) -> Result<(), NetError> {
        let place_decl = self
            .places
            .get(place as usize)
            .ok_or(NetError::PlaceOutOfRange(place))?;
        for &(color, _) in &spec.constant {
            let domain = place_decl.color_size();
            if u64::from(color) >= domain {
                return Err(NetError::ColorOutOfDomain {
                    color,
                    domain: domain as Color,
                });
            }
        }
        for (components, _) in &spec.sequences {
            if components.len() != place_decl.tuple_sizes.len() {
                return Err(NetError::SequenceLengthMismatch {
                    place,
                    expected: place_decl.tuple_sizes.len(),
                    got: components.len(),
                });
            }
            for (pos, pc) in components.iter().enumerate() {
                if pc.domain != place_decl.tuple_sizes[pos] {
                    return Err(NetError::DomainMismatch {
                        expected: place_decl.tuple_sizes[pos],
                        got: pc.domain,
                    });
                }
                self.check_component(pc)?;
            }
        }
        Ok(())
    }

    fn check_guard(&self, guard: &CompiledGuard) -> Result<(), NetError> {
        match guard {
            CompiledGuard::True => Ok(()),
            CompiledGuard::And(children) | CompiledGuard::Or(children) => {
                children.iter().try_for_each(|g| self.check_guard(g))
            }
            CompiledGuard::Not(inner) => self.check_guard(inner),
            CompiledGuard::Compare { lhs, rhs, .. } => {
                for side in [lhs, rhs] {
                    if side.base == ColorRef::All {
                        return Err(NetError::AllInGuard);
                    }
                    self.check_component(side)?;
                }
                Ok(())
            }
        }
    }

    /// Resolve signed weights and compile the arc against the place codec.
    fn compile_arc(&self, place: PlaceId, spec: &ArcSpec) -> CompiledArc {
        let codec = self.places[place as usize].codec.clone();
        let mut merged: Vec<(Vec<ParamColor>, i64)> = Vec::new();
        for (components, weight) in &spec.sequences {
            match merged.iter_mut().find(|(seq, _)| seq == components) {
                Some((_, w)) => *w += weight,
                None => merged.push((components.clone(), *weight)),
            }
        }
        let sequences = merged
            .into_iter()
            .filter(|&(_, weight)| weight > 0)
            .map(|(components, weight)| {
                (
                    smallvec::SmallVec::from_vec(components),
                    weight as MarkingCount,
                )
            })
            .collect();
        CompiledArc::new(
            ColorMultiset::from_entries(spec.constant.iter().copied()),
            sequences,
            codec,
        )
    }
}

fn collect_guard_variables(guard: &CompiledGuard, out: &mut Vec<VariableId>) {
    match guard {
        CompiledGuard::True => {}
        CompiledGuard::And(children) | CompiledGuard::Or(children) => {
            for child in children {
                collect_guard_variables(child, out);
            }
        }
        CompiledGuard::Not(inner) => collect_guard_variables(inner, out),
        CompiledGuard::Compare { lhs, rhs, .. } => {
            for side in [lhs, rhs] {
                if let ColorRef::Variable(v) = side.base {
                    out.push(v);
                }
            }
        }
    }
}

fn collect_preset_constraints(
    variables: &[VariableId],
    inputs: &[NetArc],
) -> Vec<(VariableId, Vec<PresetConstraint>)> {
    let mut out = Vec::new();
    for &var in variables {
        let mut constraints = Vec::new();
        for arc in inputs {
            for (components, _) in arc.expression.sequences() {
                for (pos, pc) in components.iter().enumerate() {
                    if pc.base == ColorRef::Variable(var) {
                        constraints.push(PresetConstraint {
                            place: arc.place,
                            tuple_pos: pos,
                            offset: pc.offset,
                        });
                    }
                }
            }
        }
        if !constraints.is_empty() {
            out.push((var, constraints));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ground_transition_has_sentinel_binding_space() {
        let mut b = NetBuilder::new();
        let p = b.add_place("p", &[1]).unwrap();
        let t = b.add_transition("t", None).unwrap();
        b.add_input_arc(t, p, ArcSpec::constant([(0, 1)])).unwrap();
        let net = b.build().unwrap();
        assert_eq!(net.transition(t).total_bindings, 0);
        assert!(net.transition(t).variables.is_empty());
    }

    #[test]
    fn binding_space_is_the_product_of_variable_domains() {
        let mut b = NetBuilder::new();
        let p = b.add_place("p", &[3]).unwrap();
        let q = b.add_place("q", &[4]).unwrap();
        let x = b.add_variable(3).unwrap();
        let y = b.add_variable(4).unwrap();
        let t = b.add_transition("t", None).unwrap();
        b.add_input_arc(t, p, ArcSpec::sequence(vec![ParamColor::variable(x, 3)]))
            .unwrap();
        b.add_output_arc(t, q, ArcSpec::sequence(vec![ParamColor::variable(y, 4)]))
            .unwrap();
        let net = b.build().unwrap();
        assert_eq!(net.transition(t).total_bindings, 12);
        assert_eq!(net.transition(t).variables, vec![x, y]);
    }

    #[test]
    fn preset_constraints_only_cover_input_occurrences() {
        let mut b = NetBuilder::new();
        let p = b.add_place("p", &[3]).unwrap();
        let q = b.add_place("q", &[3]).unwrap();
        let x = b.add_variable(3).unwrap();
        let y = b.add_variable(3).unwrap();
        let t = b.add_transition("t", None).unwrap();
        b.add_input_arc(
            t,
            p,
            ArcSpec::sequence(vec![ParamColor::variable(x, 3).with_offset(1)]),
        )
        .unwrap();
        b.add_output_arc(t, q, ArcSpec::sequence(vec![ParamColor::variable(y, 3)]))
            .unwrap();
        let net = b.build().unwrap();
        let constraints = &net.transition(t).preset_constraints;
        assert_eq!(constraints.len(), 1);
        assert_eq!(constraints[0].0, x);
        assert_eq!(
            constraints[0].1,
            vec![PresetConstraint {
                place: p,
                tuple_pos: 0,
                offset: 1,
            }]
        );
    }

    #[test]
    fn negative_weights_cancel_sequences() {
        let mut b = NetBuilder::new();
        let p = b.add_place("p", &[3]).unwrap();
        let x = b.add_variable(3).unwrap();
        let t = b.add_transition("t", None).unwrap();
        let mut spec = ArcSpec::sequence(vec![ParamColor::variable(x, 3)]);
        spec.sequences
            .push((vec![ParamColor::variable(x, 3)], -1));
        b.add_input_arc(t, p, spec).unwrap();
        let net = b.build().unwrap();
        assert!(net.inputs(t)[0].expression.is_ground());
        assert_eq!(net.inputs(t)[0].expression.minimal_count(), 0);
    }

    #[test]
    fn oversized_tuple_domains_are_rejected() {
        let mut b = NetBuilder::new();
        let err = b.add_place("p", &[1 << 16, 1 << 17]).unwrap_err();
        assert_eq!(err, NetError::DomainTooLarge { size: 1 << 33 });
        // The largest representable product is still accepted.
        b.add_place("q", &[Color::MAX]).unwrap();
    }

    #[test]
    fn guards_reject_the_all_expression() {
        let mut b = NetBuilder::new();
        b.add_place("p", &[2]).unwrap();
        b.add_transition(
            "t",
            Some(CompiledGuard::Compare {
                op: crate::guard::CmpOp::Eq,
                lhs: ParamColor {
                    base: ColorRef::All,
                    offset: 0,
                    domain: 2,
                },
                rhs: ParamColor::color(0, 2),
            }),
        )
        .unwrap();
        assert_eq!(b.build().unwrap_err(), NetError::AllInGuard);
    }

    #[test]
    fn arc_domain_validation() {
        let mut b = NetBuilder::new();
        let p = b.add_place("p", &[2, 3]).unwrap();
        let t = b.add_transition("t", None).unwrap();
        let err = b
            .add_input_arc(t, p, ArcSpec::sequence(vec![ParamColor::color(0, 2)]))
            .unwrap_err();
        assert_eq!(
            err,
            NetError::SequenceLengthMismatch {
                place: p,
                expected: 2,
                got: 1,
            }
        );
        let err = b
            .add_input_arc(
                t,
                p,
                ArcSpec::sequence(vec![ParamColor::color(0, 2), ParamColor::color(0, 4)]),
            )
            .unwrap_err();
        assert_eq!(err, NetError::DomainMismatch { expected: 3, got: 4 });
    }

    #[test]
    fn fire_moves_tokens() {
        let mut b = NetBuilder::new();
        let p = b.add_place("p", &[2]).unwrap();
        let q = b.add_place("q", &[2]).unwrap();
        let x = b.add_variable(2).unwrap();
        let t = b.add_transition("t", None).unwrap();
        b.add_input_arc(t, p, ArcSpec::sequence(vec![ParamColor::variable(x, 2)]))
            .unwrap();
        b.add_output_arc(
            t,
            q,
            ArcSpec::sequence(vec![ParamColor::variable(x, 2).with_offset(1)]),
        )
        .unwrap();
        b.set_initial(p, [(0, 1)]).unwrap();
        let net = b.build().unwrap();

        let mut marking = net.initial_marking().clone();
        let mut binding = Binding::new(net.variable_count());
        binding.set(x, 0);
        net.fire(&mut marking, t, &binding);
        assert!(marking.place(p).is_empty());
        assert_eq!(marking.place(q).count(1), 1);
    }
}
