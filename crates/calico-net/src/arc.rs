//! Compiled arc expressions.
//!
//! An arc expression is compiled down to a constant multiset plus a list of
//! weighted color-tuple sequences whose components are resolved against a
//! binding at fire time. The compiled form never allocates per firing.

use smallvec::SmallVec;

use crate::binding::Binding;
use crate::codec::PackCodec;
use crate::ids::{Color, MarkingCount, VariableId};
use crate::multiset::ColorMultiset;

/// What a tuple component refers to before binding resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorRef {
    /// A fixed color of the component domain.
    Color(Color),
    /// The value a binding assigns to this variable.
    Variable(VariableId),
    /// Every color of the component domain at once.
    All,
}

/// One tuple component: a base reference plus a cyclic successor offset
/// within the component's domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamColor {
    pub base: ColorRef,
    /// Applied modulo `domain`, so `-1` is the cyclic predecessor.
    pub offset: i64,
    /// Size of the component's color domain.
    pub domain: Color,
}

impl ParamColor {
    pub fn color(color: Color, domain: Color) -> Self {
        Self {
            base: ColorRef::Color(color),
            offset: 0,
            domain,
        }
    }

    pub fn variable(var: VariableId, domain: Color) -> Self {
        Self {
            base: ColorRef::Variable(var),
            offset: 0,
            domain,
        }
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }

    /// Resolve to a concrete color. Must not be called on an `All`
    /// component; those are expanded by the arc, not resolved.
    pub fn resolve(&self, binding: &Binding) -> Color {
        let base = match self.base {
            ColorRef::Color(c) => c,
            ColorRef::Variable(v) => binding.get(v),
            ColorRef::All => unreachable!("All components are expanded, not resolved"),
        };
        offset_color(base, self.offset, self.domain)
    }
}

/// Cyclic successor arithmetic within a domain of `domain` colors.
#[inline]
pub fn offset_color(base: Color, offset: i64, domain: Color) -> Color {
    debug_assert!(domain > 0);
    (i64::from(base) + offset).rem_euclid(i64::from(domain)) as Color
}

type Sequence = SmallVec<[ParamColor; 4]>;

/// Resolve one sequence against `binding`, expanding `All` components over
/// their full domain, and report each packed color with `weight`.
///
/// Packed tuples fit [`Color`]: the net builder rejects places whose tuple
/// domain product exceeds the color width.
fn for_each_sequence_token(
    codec: &PackCodec,
    seq: &Sequence,
    binding: &Binding,
    weight: MarkingCount,
    f: &mut impl FnMut(Color, MarkingCount),
) {
    let mut components: SmallVec<[Color; 4]> = SmallVec::new();
    components.resize(seq.len(), 0);
    let mut all_positions: SmallVec<[usize; 4]> = SmallVec::new();
    for (pos, pc) in seq.iter().enumerate() {
        if pc.base == ColorRef::All {
            all_positions.push(pos);
        } else {
            components[pos] = pc.resolve(binding);
        }
    }
    if all_positions.is_empty() {
        f(codec.encode(&components) as Color, weight);
        return;
    }
    let expansion: u64 = all_positions
        .iter()
        .map(|&pos| u64::from(seq[pos].domain))
        .product();
    for combo in 0..expansion {
        let mut rest = combo;
        for &pos in all_positions.iter().rev() {
            let pc = &seq[pos];
            let raw = (rest % u64::from(pc.domain)) as Color;
            rest /= u64::from(pc.domain);
            components[pos] = offset_color(raw, pc.offset, pc.domain);
        }
        f(codec.encode(&components) as Color, weight);
    }
}

/// A compiled arc expression targeting one place.
#[derive(Debug, Clone)]
pub struct CompiledArc {
    /// Tokens the arc moves regardless of the binding.
    constant: ColorMultiset,
    /// Binding-dependent tuple sequences, each with a token weight.
    sequences: Vec<(Sequence, MarkingCount)>,
    /// Codec of the target place, packs resolved tuples into colors.
    codec: PackCodec,
    /// Variables the sequences mention, sorted and deduplicated.
    variables: Vec<VariableId>,
    /// Tokens moved by any binding. Exact, since `All` expansion widths
    /// are binding-independent.
    minimal_count: MarkingCount,
    /// The binding-independent tokens themselves: the constant part plus
    /// every sequence that mentions no variable, fully expanded.
    minimal_marking: ColorMultiset,
}

impl CompiledArc {
    pub fn new(
        constant: ColorMultiset,
        sequences: Vec<(Sequence, MarkingCount)>,
        codec: PackCodec,
    ) -> Self {
        let mut variables: Vec<VariableId> = sequences
            .iter()
            .flat_map(|(seq, _)| seq.iter())
            .filter_map(|pc| match pc.base {
                ColorRef::Variable(v) => Some(v),
                _ => None,
            })
            .collect();
        variables.sort_unstable();
        variables.dedup();

        let mut minimal_count = constant.total();
        for (seq, weight) in &sequences {
            let expansion: u64 = seq
                .iter()
                .filter(|pc| pc.base == ColorRef::All)
                .map(|pc| u64::from(pc.domain))
                .product();
            minimal_count += *weight * expansion as MarkingCount;
        }

        let mut minimal_marking = constant.clone();
        let no_binding = Binding::default();
        for (seq, weight) in &sequences {
            let ground = seq
                .iter()
                .all(|pc| !matches!(pc.base, ColorRef::Variable(_)));
            if ground {
                for_each_sequence_token(&codec, seq, &no_binding, *weight, &mut |color, count| {
                    minimal_marking.add(color, count)
                });
            }
        }

        Self {
            constant,
            sequences,
            codec,
            variables,
            minimal_count,
            minimal_marking,
        }
    }

    /// An arc moving only a fixed multiset.
    pub fn constant(constant: ColorMultiset, codec: PackCodec) -> Self {
        Self::new(constant, Vec::new(), codec)
    }

    /// Variables whose binding the arc's value depends on.
    pub fn variables(&self) -> &[VariableId] {
        &self.variables
    }

    /// Tokens moved by the arc under any binding.
    #[inline]
    pub fn minimal_count(&self) -> MarkingCount {
        self.minimal_count
    }

    /// Tokens the arc consumes under every binding, as a multiset.
    #[inline]
    pub fn minimal_marking(&self) -> &ColorMultiset {
        &self.minimal_marking
    }

    /// True if no sequence mentions a variable.
    pub fn is_ground(&self) -> bool {
        self.variables.is_empty()
    }

    pub(crate) fn sequences(&self) -> &[(Sequence, MarkingCount)] {
        &self.sequences
    }

    /// The multiset the arc evaluates to under `binding`.
    pub fn eval(&self, binding: &Binding) -> ColorMultiset {
        let mut out = self.constant.clone();
        self.for_each_token(binding, |color, count| out.add(color, count));
        out
    }

    /// Add the arc's value under `binding` into `place`.
    pub fn produce(&self, place: &mut ColorMultiset, binding: &Binding) {
        for (color, count) in self.constant.iter() {
            place.add(color, count);
        }
        self.for_each_token(binding, |color, count| place.add(color, count));
    }

    /// Remove the arc's value under `binding` from `place`. The caller
    /// checks [`CompiledArc::is_subset`] first.
    pub fn consume(&self, place: &mut ColorMultiset, binding: &Binding) {
        for (color, count) in self.constant.iter() {
            place.remove(color, count);
        }
        self.for_each_token(binding, |color, count| place.remove(color, count));
    }

    /// True if `place` holds at least the arc's value under `binding`.
    pub fn is_subset(&self, place: &ColorMultiset, binding: &Binding) -> bool {
        if place.total() < self.minimal_count {
            return false;
        }
        // Accumulate first: sequences may overlap on the same color, and
        // componentwise checks against the place must see the sum.
        let needed = self.eval(binding);
        place.contains(&needed)
    }

    /// Resolve every sequence against `binding`, expanding `All`
    /// components over their full domain, and report each packed color
    /// with its weight.
    fn for_each_token(&self, binding: &Binding, mut f: impl FnMut(Color, MarkingCount)) {
        for (seq, weight) in &self.sequences {
            for_each_sequence_token(&self.codec, seq, binding, *weight, &mut f);
        }
    }
}
