//! Generational optimization loop.
//!
//! [`Optimizer`] builds the initial population, runs a fixed number of
//! generation steps and returns the best tree seen, judged by the
//! objective's true score rather than the parsimony-adjusted one.

use super::builder::{RequirementBuilder, TreeBuilder};
use super::config::OptimizeConfig;
use super::evolution::{Evolution, GenerationStep};
use super::objective::Objective;
use super::selection::{first_best, ScoreMap, TournamentSelector};
use super::types::{GpProblem, Program, Score};
use crate::error::{GpError, Result};
use crate::recursion::RecursionGuard;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;

/// Per-generation progress record.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GenerationStats {
    /// Zero-based generation index (logged one-based).
    pub iteration: usize,
    /// Best raw score of the population the generation was bred from.
    pub best_score: Score,
    /// Mean raw score, ignoring disqualified trees.
    pub mean_score: Score,
}

impl fmt::Display for GenerationStats {
    /// Progress line, numbering generations from one.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Iteration {}:\tBest: {:.2}\tAverage: {:.2}",
            self.iteration + 1,
            self.best_score,
            self.mean_score
        )
    }
}

/// Result of an optimization run.
#[derive(Debug, Clone)]
pub struct OptimizeResult<T: Program> {
    /// Best tree found.
    pub best: T,

    /// Unadjusted score of `best`, bound over every tracked tree.
    pub best_score: Score,

    /// Number of generations executed.
    pub generations: usize,

    /// One entry per generation, in order.
    pub history: Vec<GenerationStats>,
}

/// Runs the GP search.
///
/// # Usage
///
/// ```ignore
/// let objective = require(["x"], minimize(pre_evaluate(Kind::Number, |v: f64| (v - 42.0).abs())));
/// let config = OptimizeConfig::default().with_population_size(100).with_seed(42);
/// let result = Optimizer::run(&problem, &objective, &config)?;
/// println!("best: {:?} ({:.3})", result.best, result.best_score);
/// ```
pub struct Optimizer;

impl Optimizer {
    /// Runs with the default [`RequirementBuilder`] and [`Evolution`] step.
    ///
    /// # Errors
    ///
    /// - [`GpError::InvalidConfig`] for an invalid `config`.
    /// - [`GpError::InvalidSignature`] if the objective does not declare
    ///   exactly one return type.
    /// - [`GpError::Unsatisfiable`] if the initial population cannot be
    ///   built, or a replacement tree cannot be synthesized later.
    pub fn run<P, O>(
        problem: &P,
        objective: &O,
        config: &OptimizeConfig,
    ) -> Result<OptimizeResult<P::Tree>>
    where
        P: GpProblem,
        O: Objective<P::Tree>,
    {
        Self::run_with(
            problem,
            objective,
            config,
            &RequirementBuilder::default(),
            &Evolution::<TournamentSelector>::default(),
        )
    }

    /// Runs with a custom tree builder and generation step.
    ///
    /// The step receives an observer and should forward it to its selection
    /// round; the driver records progress and tracks the best tree of each
    /// generation through it.
    pub fn run_with<P, O, B, S>(
        problem: &P,
        objective: &O,
        config: &OptimizeConfig,
        builder: &B,
        step: &S,
    ) -> Result<OptimizeResult<P::Tree>>
    where
        P: GpProblem,
        O: Objective<P::Tree>,
        B: TreeBuilder<P, O>,
        S: GenerationStep<P, O>,
    {
        config.validate()?;

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::seed_from_u64(rand::random()),
        };

        // 1. Initial population
        log::info!("Creating initial population of {}.", config.population_size);
        let mut population: Vec<P::Tree> = Vec::with_capacity(config.population_size);
        while population.len() < config.population_size {
            match builder.build(problem, objective, &mut rng) {
                Ok(tree) => population.push(tree),
                Err(GpError::Unsatisfiable(reason)) => {
                    return Err(GpError::Unsatisfiable(format!(
                        "{reason}; found only {} satisfying trees",
                        population.len()
                    )));
                }
                Err(err) => return Err(err),
            }
        }

        // 2. Seed the tracking list with an arbitrary individual
        let mut tracked = vec![population[rng.random_range(0..population.len())].clone()];
        let mut history = Vec::with_capacity(config.iterations);

        // 3. Generational loop
        log::info!("Optimizing...");
        for iteration in 0..config.iterations {
            let mut observer = |scores: &ScoreMap<'_, P::Tree>| {
                let best = scores.best_raw();
                let stats = GenerationStats {
                    iteration,
                    best_score: best.map_or(Score::Disqualified, |i| scores.raw(i)),
                    mean_score: scores.mean_raw(),
                };
                if config.show_scores {
                    log::info!("{stats}");
                }
                if let Some(i) = best {
                    tracked.push(scores.population()[i].clone());
                }
                history.push(stats);
            };

            let _guard = RecursionGuard::acquire(config.generation_depth_limit);
            population =
                step.next_generation(&population, problem, objective, &mut rng, Some(&mut observer))?;
        }

        // 4. Best of everything tracked, by true score. Population-level
        // objectives are bound to the tracked set as a whole.
        let scores: Vec<Score> = {
            let scorer = objective.bind(&tracked);
            tracked.iter().map(|tree| scorer(tree).sanitize()).collect()
        };
        let best_idx = first_best(scores.iter().copied()).unwrap_or(0);
        let best_score = scores[best_idx];
        let best = tracked.swap_remove(best_idx);

        Ok(OptimizeResult {
            best,
            best_score,
            generations: config.iterations,
            history,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
