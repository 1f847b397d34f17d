//! Index types shared across the net model.
//!
//! Everything is a plain integer index into net-owned tables; the aliases
//! exist to keep signatures readable, not to enforce separation.

/// A color value: an index into a (possibly composite) color domain.
pub type Color = u32;

/// Index of a place in the net.
pub type PlaceId = u32;

/// Index of a transition in the net.
pub type TransitionId = u32;

/// Index of a binding variable in the net.
pub type VariableId = u32;

/// Token count inside a place multiset.
pub type MarkingCount = u32;

/// Index of one binding in a transition's binding space.
pub type BindingId = u64;

/// The single color of the unit ("dot") color type.
pub const DOT_COLOR: Color = 0;
