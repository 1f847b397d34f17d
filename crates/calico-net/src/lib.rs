//! Compiled colored Petri net model.
//!
//! This crate holds the pure data side of the checker: color and id types,
//! the mixed-radix codec used to pack color tuples and binding ids,
//! per-place token multisets, markings, bindings, and the compiled arc and
//! guard expressions a [`net::ColoredPetriNet`] is assembled from.
//! No search logic lives here.

pub mod arc;
pub mod binding;
pub mod codec;
pub mod guard;
pub mod ids;
pub mod marking;
pub mod multiset;
pub mod net;

pub use arc::{offset_color, ColorRef, CompiledArc, ParamColor};
pub use binding::Binding;
pub use codec::PackCodec;
pub use guard::{CmpOp, CompiledGuard};
pub use ids::{BindingId, Color, MarkingCount, PlaceId, TransitionId, VariableId, DOT_COLOR};
pub use marking::Marking;
pub use multiset::ColorMultiset;
pub use net::{
    ArcSpec, ColoredPetriNet, Inhibitor, NetArc, NetBuilder, NetError, Place, PresetConstraint,
    Transition, VariableDecl,
};
