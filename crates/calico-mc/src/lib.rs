//! Explicit-state model checking over colored Petri nets.
//!
//! Two checkers share the same state machinery: [`ReachabilityChecker`]
//! decides EF/AG queries with a worklist search over canonical marking
//! encodings, and [`NdfsChecker`] decides linear-time properties by
//! hunting accepting cycles in the product with a Büchi automaton.
//! Both report a three-valued [`Verdict`], since deadlines and encoding
//! limits can leave a search unable to vouch for a negative answer.

pub mod buchi;
pub mod config;
pub mod encoder;
pub mod error;
pub mod ndfs;
pub mod passed;
pub mod product;
pub mod query;
pub mod reachability;
pub mod stats;
pub mod successor;
pub mod worklist;

pub use buchi::{BuchiAutomaton, BuchiEdge, BuchiState, EdgeCond};
pub use config::{
    CheckConfig, CheckResult, CursorPolicy, Strategy, TraceStep, Verdict,
};
pub use encoder::{ColoredEncoder, ProductEncoder};
pub use error::CheckError;
pub use ndfs::NdfsChecker;
pub use passed::PassedList;
pub use product::{ProductGenerator, ProductState};
pub use query::{
    compile_reachability, CompiledQuery, CountExpr, CountValue, GammaQuery, Quantifier, QueryExpr,
};
pub use reachability::ReachabilityChecker;
pub use stats::SearchStatistics;
pub use successor::{ColoredSuccessorGenerator, Cursor, Step};
