//! Core types for the GP search engine.
//!
//! [`Score`] is the fitness value. [`Program`] and [`GpProblem`] form the
//! contract between the search engine and the tree module that owns the
//! actual program representation and its structural operators.

use crate::error::{EvalError, OperatorError};
use crate::recursion;
use rand::Rng;
use std::cmp::Ordering;
use std::fmt;

/// Fitness of a tree. Higher is better.
///
/// `Disqualified` marks a tree that may not win any comparison: it failed
/// to evaluate, lacks required inputs, or was rejected by parsimony
/// pressure. It orders below every `Valid` score, including
/// `Valid(f64::NEG_INFINITY)`.
///
/// Valid scores are ordered with [`f64::total_cmp`]. NaN never reaches a
/// comparison inside the engine: [`Score::sanitize`] turns it into
/// `Disqualified` wherever objective scores enter.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Score {
    /// A score produced by the objective function.
    Valid(f64),
    /// The tree is excluded from selection.
    Disqualified,
}

impl Score {
    /// Returns the numeric value, or `None` when disqualified.
    pub fn value(self) -> Option<f64> {
        match self {
            Score::Valid(v) => Some(v),
            Score::Disqualified => None,
        }
    }

    /// Whether this score is [`Score::Disqualified`].
    pub fn is_disqualified(self) -> bool {
        matches!(self, Score::Disqualified)
    }

    /// Negates a valid score. `Disqualified` stays disqualified.
    pub fn negate(self) -> Self {
        self.map(|v| -v)
    }

    /// Disqualifies a NaN score; every other score is returned unchanged.
    ///
    /// NaN would otherwise outrank every finite score under `total_cmp`.
    pub fn sanitize(self) -> Self {
        match self {
            Score::Valid(v) if v.is_nan() => Score::Disqualified,
            other => other,
        }
    }

    /// Applies `f` to a valid score.
    pub fn map(self, f: impl FnOnce(f64) -> f64) -> Self {
        match self {
            Score::Valid(v) => Score::Valid(f(v)),
            Score::Disqualified => Score::Disqualified,
        }
    }

    /// Mean of the valid scores, or `Disqualified` if there are none.
    pub fn mean_of<I: IntoIterator<Item = Score>>(scores: I) -> Self {
        let (sum, count) = scores
            .into_iter()
            .filter_map(Score::value)
            .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
        if count == 0 {
            Score::Disqualified
        } else {
            Score::Valid(sum / count as f64)
        }
    }
}

impl From<f64> for Score {
    fn from(v: f64) -> Self {
        Score::Valid(v).sanitize()
    }
}

impl Ord for Score {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Score::Valid(a), Score::Valid(b)) => a.total_cmp(b),
            (Score::Valid(_), Score::Disqualified) => Ordering::Greater,
            (Score::Disqualified, Score::Valid(_)) => Ordering::Less,
            (Score::Disqualified, Score::Disqualified) => Ordering::Equal,
        }
    }
}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Score {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Score {}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Score::Valid(v) => match f.precision() {
                Some(p) => write!(f, "{v:.p$}"),
                None => write!(f, "{v}"),
            },
            Score::Disqualified => f.write_str("disqualified"),
        }
    }
}

/// A typed program tree owned by the population.
///
/// The search engine never looks inside a tree. It only needs its size,
/// whether it mentions a named input, a way to evaluate it, and a deep copy.
///
/// # Implementing
///
/// ```ignore
/// #[derive(Clone)]
/// enum Expr { Const(f64), Input(String), Add(Box<Expr>, Box<Expr>) }
///
/// impl Program for Expr {
///     type Kind = ();
///     type Value = f64;
///     fn kind(&self) {}
///     fn size(&self) -> usize { /* node count */ }
///     fn depth(&self) -> usize { /* longest root-to-leaf path */ }
///     fn contains_input(&self, name: &str) -> bool { /* ... */ }
///     fn evaluate(&self) -> Result<f64, EvalError> { /* ... */ }
/// }
/// ```
pub trait Program: Clone + Send + Sync {
    /// Return-type tag of a tree.
    type Kind: Clone + PartialEq + fmt::Debug + Send + Sync;

    /// Result of evaluating a tree.
    type Value;

    /// The type this tree returns.
    fn kind(&self) -> Self::Kind;

    /// Number of nodes.
    fn size(&self) -> usize;

    /// Length of the longest root-to-leaf path.
    fn depth(&self) -> usize;

    /// Whether the tree references the named input symbol.
    fn contains_input(&self, name: &str) -> bool;

    /// Evaluates the tree.
    fn evaluate(&self) -> Result<Self::Value, EvalError>;

    /// Deep structural copy.
    ///
    /// Fails with [`OperatorError::StackExhausted`] when the tree is deeper
    /// than the active [`recursion::limit`].
    fn duplicate(&self) -> Result<Self, OperatorError> {
        recursion::check_depth(self.depth())?;
        Ok(self.clone())
    }
}

/// Structural operators supplied by the tree module.
///
/// Every operator may fail; the search engine retries or falls back to
/// fresh synthesis, so implementations should report failure rather than
/// panic.
pub trait GpProblem: Send + Sync {
    /// The tree representation.
    type Tree: Program;

    /// Builds a random tree returning exactly `kind`, with no implicit
    /// type conversion.
    ///
    /// Recursion should be bounded by [`recursion::limit`].
    fn build_tree<R: Rng + ?Sized>(
        &self,
        kind: &<Self::Tree as Program>::Kind,
        rng: &mut R,
    ) -> Result<Self::Tree, OperatorError>;

    /// Recombines two parents into one child.
    fn crossover<R: Rng + ?Sized>(
        &self,
        parent1: Self::Tree,
        parent2: Self::Tree,
        rng: &mut R,
    ) -> Result<Self::Tree, OperatorError>;

    /// Produces a mutated variant of `tree`.
    fn mutate<R: Rng + ?Sized>(
        &self,
        tree: Self::Tree,
        rng: &mut R,
    ) -> Result<Self::Tree, OperatorError>;
}
