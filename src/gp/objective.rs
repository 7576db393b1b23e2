//! Objective functions and adapters.
//!
//! An [`Objective`] scores a tree and declares the single return type the
//! trees it accepts must have. The selection pipeline always **maximizes**;
//! wrap a cost function in [`minimize`] to optimize the other way.
//!
//! Adapters compose:
//!
//! ```
//! use u_gpsearch::gp::{minimize, pre_evaluate, require};
//!
//! // Minimize squared error of the evaluated value, but only for trees
//! // that actually read input "x".
//! let objective = require(["x"], minimize(pre_evaluate("number", |v: f64| (v - 3.0).powi(2))));
//! ```

use super::types::{Program, Score};

/// Scorer produced by [`Objective::bind`] for one selection round.
pub type BoundScorer<'a, T> = Box<dyn Fn(&T) -> Score + Send + Sync + 'a>;

/// A scoring function over trees.
pub trait Objective<T: Program>: Send + Sync {
    /// Scores one tree. Higher is better.
    fn score(&self, tree: &T) -> Score;

    /// Declared parameter types.
    ///
    /// Tree synthesis requires exactly one entry: the return type every
    /// candidate tree must have.
    fn signature(&self) -> &[T::Kind];

    /// Input symbols every candidate tree must reference.
    fn required_inputs(&self) -> &[String] {
        &[]
    }

    /// Prepares a scorer for one selection round over `population`.
    ///
    /// The default ignores the population. Objectives that normalize
    /// against the whole population override this.
    fn bind<'a>(&'a self, _population: &'a [T]) -> BoundScorer<'a, T> {
        Box::new(move |tree| self.score(tree))
    }
}

impl<T: Program, O: Objective<T> + ?Sized> Objective<T> for &O {
    fn score(&self, tree: &T) -> Score {
        (**self).score(tree)
    }

    fn signature(&self) -> &[T::Kind] {
        (**self).signature()
    }

    fn required_inputs(&self) -> &[String] {
        (**self).required_inputs()
    }

    fn bind<'a>(&'a self, population: &'a [T]) -> BoundScorer<'a, T> {
        (**self).bind(population)
    }
}

// ============================================================================
// Plain scoring functions
// ============================================================================

/// Objective backed by a closure over the tree.
///
/// Created with [`scoring`].
#[derive(Debug, Clone)]
pub struct Scoring<K, F> {
    signature: Vec<K>,
    f: F,
}

impl<K, F> Scoring<K, F> {
    /// Declares an arbitrary parameter list.
    ///
    /// Only a single-entry signature can drive tree synthesis; anything
    /// else is rejected with [`GpError::InvalidSignature`](crate::error::GpError::InvalidSignature).
    pub fn with_signature(signature: Vec<K>, f: F) -> Self {
        Self { signature, f }
    }
}

/// Wraps `f` as an objective over trees returning `kind`.
pub fn scoring<K, F>(kind: K, f: F) -> Scoring<K, F> {
    Scoring::with_signature(vec![kind], f)
}

impl<T, F, S> Objective<T> for Scoring<T::Kind, F>
where
    T: Program,
    F: Fn(&T) -> S + Send + Sync,
    S: Into<Score>,
{
    fn score(&self, tree: &T) -> Score {
        (self.f)(tree).into()
    }

    fn signature(&self) -> &[T::Kind] {
        &self.signature
    }
}

// ============================================================================
// Evaluation-fault tolerance
// ============================================================================

/// Objective that evaluates the tree first and scores the resulting value.
///
/// Created with [`pre_evaluate`].
#[derive(Debug, Clone)]
pub struct PreEvaluate<K, F> {
    signature: Vec<K>,
    f: F,
}

/// Scores the *evaluated value* of a tree.
///
/// If evaluation fails for any reason the tree is
/// [`Disqualified`](Score::Disqualified) and `f` is not called.
pub fn pre_evaluate<K, F>(kind: K, f: F) -> PreEvaluate<K, F> {
    PreEvaluate {
        signature: vec![kind],
        f,
    }
}

impl<T, F, S> Objective<T> for PreEvaluate<T::Kind, F>
where
    T: Program,
    F: Fn(T::Value) -> S + Send + Sync,
    S: Into<Score>,
{
    fn score(&self, tree: &T) -> Score {
        match tree.evaluate() {
            Ok(value) => (self.f)(value).into(),
            Err(err) => {
                log::trace!("disqualifying tree: {err}");
                Score::Disqualified
            }
        }
    }

    fn signature(&self) -> &[T::Kind] {
        &self.signature
    }
}

// ============================================================================
// Minimization
// ============================================================================

/// Negates the wrapped objective. Created with [`minimize`].
#[derive(Debug, Clone)]
pub struct Minimize<O> {
    inner: O,
}

/// Turns a cost into a score: `minimize(f)(t) == -f(t)`.
pub fn minimize<O>(inner: O) -> Minimize<O> {
    Minimize { inner }
}

impl<T: Program, O: Objective<T>> Objective<T> for Minimize<O> {
    fn score(&self, tree: &T) -> Score {
        self.inner.score(tree).negate()
    }

    fn signature(&self) -> &[T::Kind] {
        self.inner.signature()
    }

    fn required_inputs(&self) -> &[String] {
        self.inner.required_inputs()
    }

    fn bind<'a>(&'a self, population: &'a [T]) -> BoundScorer<'a, T> {
        let inner = self.inner.bind(population);
        Box::new(move |tree| inner(tree).negate())
    }
}

// ============================================================================
// Input requirements
// ============================================================================

/// Gates the wrapped objective on input symbols. Created with [`require`].
#[derive(Debug, Clone)]
pub struct Require<O> {
    inputs: Vec<String>,
    inner: O,
}

/// Disqualifies trees that do not reference every name in `inputs`.
///
/// The wrapped objective is not called for such trees. The requirement is
/// also reported through [`Objective::required_inputs`], so synthesis only
/// produces trees that pass the gate. Requirements of nested `require`
/// adapters accumulate.
pub fn require<I, S, O>(inputs: I, inner: O) -> Require<O>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Require {
        inputs: inputs.into_iter().map(Into::into).collect(),
        inner,
    }
}

impl<O> Require<O> {
    fn admits<T: Program>(inputs: &[String], tree: &T) -> bool {
        inputs.iter().all(|name| tree.contains_input(name))
    }
}

impl<T: Program, O: Objective<T>> Objective<T> for Require<O> {
    fn score(&self, tree: &T) -> Score {
        if Self::admits(&self.inputs, tree) {
            self.inner.score(tree)
        } else {
            Score::Disqualified
        }
    }

    fn signature(&self) -> &[T::Kind] {
        self.inner.signature()
    }

    fn required_inputs(&self) -> &[String] {
        &self.inputs
    }

    fn bind<'a>(&'a self, population: &'a [T]) -> BoundScorer<'a, T> {
        let inner = self.inner.bind(population);
        Box::new(move |tree| {
            if Self::admits(&self.inputs, tree) {
                inner(tree)
            } else {
                Score::Disqualified
            }
        })
    }
}

impl<O> Require<O> {
    /// Merges the inner objective's requirements into this gate.
    fn merged<T: Program>(mut self) -> Self
    where
        O: Objective<T>,
    {
        for name in self.inner.required_inputs() {
            if !self.inputs.contains(name) {
                self.inputs.push(name.clone());
            }
        }
        self
    }
}

/// Like [`require`], but also folds in requirements already declared by
/// `inner` so [`Objective::required_inputs`] reports the full set.
pub fn require_all<T, I, S, O>(inputs: I, inner: O) -> Require<O>
where
    T: Program,
    O: Objective<T>,
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    require(inputs, inner).merged::<T>()
}

// ============================================================================
// Population-level objectives
// ============================================================================

/// Objective whose scorer depends on the whole population.
///
/// Created with [`population_scoring`].
#[derive(Debug, Clone)]
pub struct PopulationScoring<K, F> {
    signature: Vec<K>,
    f: F,
}

/// Builds a per-round scorer from the population, e.g. to normalize raw
/// values against the population's range.
///
/// `f` is called once per selection round. Scoring a single tree outside a
/// round treats it as a population of one.
///
/// ```
/// use u_gpsearch::gp::population_scoring;
///
/// # #[derive(Clone)] struct T(f64);
/// let objective = population_scoring("number", |population: &[T]| {
///     let max = population.iter().map(|t| t.0).fold(f64::MIN, f64::max);
///     move |t: &T| t.0 / max
/// });
/// ```
pub fn population_scoring<K, F>(kind: K, f: F) -> PopulationScoring<K, F> {
    PopulationScoring {
        signature: vec![kind],
        f,
    }
}

impl<T, F, G, S> Objective<T> for PopulationScoring<T::Kind, F>
where
    T: Program,
    F: Fn(&[T]) -> G + Send + Sync,
    G: Fn(&T) -> S + Send + Sync + 'static,
    S: Into<Score>,
{
    fn score(&self, tree: &T) -> Score {
        (self.f)(std::slice::from_ref(tree))(tree).into()
    }

    fn signature(&self) -> &[T::Kind] {
        &self.signature
    }

    fn bind<'a>(&'a self, population: &'a [T]) -> BoundScorer<'a, T> {
        let scorer = (self.f)(population);
        Box::new(move |tree| scorer(tree).into())
    }
}
