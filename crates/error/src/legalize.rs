//! Error types and utilities to do with the legalization of graph units into
//! opaque operations.

use thiserror::Error;

/// The result type for use in the legalizer.
pub type Result<T> = std::result::Result<T, Error>;

/// This error type is for use during the process of legalizing a graph unit
/// from its source dialect into opaque operations.
///
/// Note that per-attribute and per-node encoding failures are deliberately
/// *not* represented here. Those are recoverable and reported through the
/// diagnostic sink instead, so that a single unencodable attribute cannot
/// abort the legalization of a whole unit.
#[derive(Debug, Error)]
pub enum Error {
    /// An error when doing IO while reading or writing unit files.
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Emitted when code tries to construct an invalid ordering of compiler
    /// passes.
    #[error("Invalid Pass Ordering: {_0}")]
    InvalidPassOrdering(String),

    /// A generic legalization failure with a string message, used as a
    /// catch-all for cases that are uncommon enough to not have specific
    /// error variants for them.
    #[error("Legalization failed: {_0}")]
    LegalizationFailure(String),

    /// Emitted when a unit file cannot be serialized or deserialized.
    #[error("Malformed unit file: {_0}")]
    UnitFormat(#[from] serde_sexpr::Error),
}
