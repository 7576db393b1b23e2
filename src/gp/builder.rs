//! Type-directed tree synthesis.
//!
//! Builds random trees of the return type an objective declares, keeping
//! only candidates that reference every input the objective requires.

use super::objective::Objective;
use super::types::{GpProblem, Program};
use crate::error::{GpError, OperatorError, Result};
use crate::recursion;
use crate::retry::attempt;
use rand::RngCore;

/// Produces a tree that satisfies an objective's type and input
/// requirements.
///
/// Implemented by [`RequirementBuilder`] and by any closure
/// `Fn(&P, &O, &mut dyn RngCore) -> Result<P::Tree>`.
pub trait TreeBuilder<P: GpProblem, O: Objective<P::Tree>> {
    /// Builds one tree.
    fn build(&self, problem: &P, objective: &O, rng: &mut dyn RngCore) -> Result<P::Tree>;
}

impl<P, O, F> TreeBuilder<P, O> for F
where
    P: GpProblem,
    O: Objective<P::Tree>,
    F: Fn(&P, &O, &mut dyn RngCore) -> Result<P::Tree>,
{
    fn build(&self, problem: &P, objective: &O, rng: &mut dyn RngCore) -> Result<P::Tree> {
        self(problem, objective, rng)
    }
}

/// Rejection-sampling tree builder.
///
/// Draws up to `max_attempts` random trees of the objective's return type,
/// each under a recursion limit of `depth_limit`, and returns the first one
/// that contains every required input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RequirementBuilder {
    /// Candidates drawn before giving up with [`GpError::Unsatisfiable`].
    pub max_attempts: usize,
    /// Recursion limit while a candidate is constructed.
    pub depth_limit: usize,
}

impl Default for RequirementBuilder {
    fn default() -> Self {
        Self {
            max_attempts: 9_999,
            depth_limit: 500,
        }
    }
}

impl RequirementBuilder {
    /// Sets the attempt budget.
    pub fn with_max_attempts(mut self, n: usize) -> Self {
        self.max_attempts = n;
        self
    }

    /// Sets the construction recursion limit.
    pub fn with_depth_limit(mut self, limit: usize) -> Self {
        self.depth_limit = limit;
        self
    }
}

impl<P: GpProblem, O: Objective<P::Tree>> TreeBuilder<P, O> for RequirementBuilder {
    fn build(&self, problem: &P, objective: &O, rng: &mut dyn RngCore) -> Result<P::Tree> {
        let kind = return_kind::<P::Tree, O>(objective)?;
        let required = objective.required_inputs();

        let found = attempt(self.max_attempts, |_| {
            let built = recursion::with_limit(self.depth_limit, || problem.build_tree(kind, rng));
            let tree = match built {
                Ok(tree) => tree,
                Err(OperatorError::Unsatisfiable(msg)) => return Err(GpError::Unsatisfiable(msg)),
                Err(err) => {
                    log::trace!("tree construction failed: {err}");
                    return Ok(None);
                }
            };
            if tree.kind() != *kind {
                log::trace!("discarding tree of kind {:?}, wanted {kind:?}", tree.kind());
                return Ok(None);
            }
            Ok(required
                .iter()
                .all(|name| tree.contains_input(name))
                .then_some(tree))
        })?;

        found.ok_or_else(|| GpError::Unsatisfiable("could not meet input requirements".into()))
    }
}

/// Returns the single return type declared by `objective`.
///
/// # Errors
///
/// [`GpError::InvalidSignature`] unless exactly one type is declared.
pub fn return_kind<T: Program, O: Objective<T>>(objective: &O) -> Result<&T::Kind> {
    match objective.signature() {
        [kind] => Ok(kind),
        other => Err(GpError::InvalidSignature { found: other.len() }),
    }
}

/// Builds a tree with the default [`RequirementBuilder`].
pub fn build_tree_to_requirements<P, O>(
    problem: &P,
    objective: &O,
    rng: &mut dyn RngCore,
) -> Result<P::Tree>
where
    P: GpProblem,
    O: Objective<P::Tree>,
{
    RequirementBuilder::default().build(problem, objective, rng)
}
