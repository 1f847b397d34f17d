//! Checker error taxonomy.
//!
//! Timeouts are not errors; a deadline that expires yields
//! [`crate::config::Verdict::Unknown`]. Errors here are strictly
//! "the request cannot be checked as posed".

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CheckError {
    /// The query shape is outside the supported fragment.
    #[error("unsupported query: {0}")]
    UnsupportedQuery(String),
    #[error("unknown place {0:?}")]
    UnknownPlace(String),
    #[error("unknown transition {0:?}")]
    UnknownTransition(String),
    #[error("unsupported search strategy {0:?}")]
    UnsupportedStrategy(String),
    #[error("unsupported successor generator {0:?}")]
    UnsupportedGenerator(String),
}
