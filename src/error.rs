//! Error types.
//!
//! Only two conditions ever abort a run: [`GpError::Unsatisfiable`] and
//! configuration errors. Structural operator faults ([`OperatorError`]) and
//! evaluation faults ([`EvalError`]) are absorbed by the search engine.

use thiserror::Error;

/// Fatal errors surfaced to callers of the search engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GpError {
    /// No tree could be built that meets the type and input requirements.
    #[error("unsatisfiable: {0}")]
    Unsatisfiable(String),

    /// An objective function declares a signature other than exactly one
    /// parameter type.
    #[error("scoring function must accept a single parameter, found {found}")]
    InvalidSignature {
        /// Number of parameter types the objective declared.
        found: usize,
    },

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Failure of a structural tree operation (build, copy, crossover, mutation).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperatorError {
    /// The requested return type cannot be produced at all.
    #[error("unsatisfiable type: {0}")]
    Unsatisfiable(String),

    /// The operation produced a tree that violates a structural constraint.
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// The operation needed more recursion depth than the active limit allows.
    #[error("recursion depth {depth} exceeds limit {limit}")]
    StackExhausted {
        /// Depth the operation required.
        depth: usize,
        /// Limit in force when it failed.
        limit: usize,
    },
}

/// Failure while evaluating a tree to a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("evaluation failed: {0}")]
pub struct EvalError(pub String);

impl EvalError {
    /// Creates an evaluation error from any displayable message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, GpError>;
