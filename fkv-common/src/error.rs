//! # Shared Error Types
//!
//! The error surface the storage engine and evaluator agree on. Kept small
//! and closed (a fixed enum, not a boxed `dyn Error`) so callers can match on
//! it directly when deciding how to encode a RESP reply.

use thiserror::Error;

/// Errors returned by the storage engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FkvError {
    /// The key holds an Item of a different type than the operation expects.
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,
}

/// Result alias used throughout the engine.
pub type FkvResult<T> = Result<T, FkvError>;
