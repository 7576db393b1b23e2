//! Evolutionary search over typed program trees.
//!
//! The [`gp`] module holds the search engine: objective adapters,
//! requirement-driven tree synthesis, parsimony-aware tournament selection,
//! the generation step and the optimization driver. It is generic over the
//! tree representation, which callers supply through the
//! [`gp::Program`] and [`gp::GpProblem`] traits.
//!
//! Supporting modules:
//!
//! - [`error`]: error types shared by every stage
//! - [`recursion`]: scoped, thread-local recursion-depth limits consulted by
//!   recursive tree operations
//! - [`retry`]: bounded retry helper
//!
//! # Features
//!
//! - `parallel`: score populations with rayon when
//!   [`gp::TournamentConfig::parallel`] is set
//! - `serde`: `Serialize`/`Deserialize` for configuration and score types

pub mod error;
pub mod gp;
pub mod recursion;
pub mod retry;
