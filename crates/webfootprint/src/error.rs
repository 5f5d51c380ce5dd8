//! Error types for the analysis surface.

use crate::store::StoreError;

/// Errors the orchestration surface reports to callers.
///
/// Soft failures inside a run (a domain that will not resolve, a probe that
/// times out, a renderer crash) never surface here; they become record
/// status transitions and dropped entries. Only intake validation and store
/// contract violations reach the caller.
#[derive(thiserror::Error, Debug)]
pub enum FootprintError {
    #[error("missing or empty target URL")]
    MissingUrl,

    #[error("record store error: {0}")]
    Store(#[from] StoreError),
}

/// Convenience result type.
pub type FootprintResult<T> = Result<T, FootprintError>;
