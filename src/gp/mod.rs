//! Genetic programming search engine.
//!
//! Evolves a population of typed program trees toward higher scores under
//! parsimony pressure. The tree representation itself lives outside this
//! module: callers implement [`Program`] for their tree type and
//! [`GpProblem`] for the structural operators (random construction,
//! crossover, mutation).
//!
//! # Core Traits
//!
//! - [`Program`]: a typed tree with size, input lookup and evaluation
//! - [`GpProblem`]: tree construction and structural operators
//! - [`Objective`]: scoring function with a declared return type
//!
//! # Pipeline
//!
//! 1. [`RequirementBuilder`] synthesizes trees of the objective's return
//!    type that reference every required input.
//! 2. [`TournamentSelector`] scores a population, applies bloat control
//!    (random parsimony, covariant parsimony, pseudo-pareto demotion) and
//!    yields a [`SelectionStream`] of tournament winners.
//! 3. [`Evolution`] keeps the elite and fills the rest of the next
//!    generation by crossover, mutation or reproduction.
//! 4. [`Optimizer`] runs the whole loop for a fixed number of generations.
//!
//! # Objective adapters
//!
//! - [`scoring`]: plain function over the tree
//! - [`pre_evaluate`]: function over the evaluated value; evaluation faults
//!   disqualify the tree
//! - [`minimize`]: negates the inner score
//! - [`require`]: disqualifies trees lacking named inputs
//! - [`population_scoring`]: scorer prepared once per round from the whole
//!   population
//!
//! # References
//!
//! - Koza (1992), *Genetic Programming*
//! - Poli (2003), random parsimony ("Tarpeian" bloat control)
//! - Poli & McPhee (2008), covariant parsimony pressure

mod builder;
mod config;
mod evolution;
mod objective;
mod runner;
mod selection;
#[cfg(test)]
pub(crate) mod test_support;
mod types;

pub use builder::{build_tree_to_requirements, return_kind, RequirementBuilder, TreeBuilder};
pub use config::{EvolutionConfig, OptimizeConfig, TournamentConfig};
pub use evolution::{next_generation, Evolution, GenerationStep};
pub use objective::{
    minimize, population_scoring, pre_evaluate, require, require_all, scoring, BoundScorer,
    Minimize, Objective, PopulationScoring, PreEvaluate, Require, Scoring,
};
pub use runner::{GenerationStats, OptimizeResult, Optimizer};
pub use selection::{
    covariance_coefficient, pseudo_pareto, score_population, Observer, ScoreMap,
    SelectionStrategy, SelectionStream, TournamentSelector, TournamentStream,
};
pub use types::{GpProblem, Program, Score};
