//! Breeding one generation.
//!
//! Slot 0 of the new population is always a copy of the best tree of the
//! current one (elitism). Every other slot is filled by crossover, mutation
//! or plain reproduction of individuals pulled fresh from the selection
//! stream.

use super::builder::{RequirementBuilder, TreeBuilder};
use super::config::EvolutionConfig;
use super::objective::Objective;
use super::selection::{first_best, Observer, SelectionStrategy, SelectionStream, TournamentSelector};
use super::types::GpProblem;
use crate::error::Result;
use crate::retry::attempt;
use rand::{Rng, RngCore};

/// Produces the next population from the current one.
///
/// [`Evolution`] is the standard implementation; the optimizer accepts any
/// other.
pub trait GenerationStep<P: GpProblem, O: Objective<P::Tree>> {
    /// Breeds a population of the same size as `population`.
    fn next_generation(
        &self,
        population: &[P::Tree],
        problem: &P,
        objective: &O,
        rng: &mut dyn RngCore,
        observer: Option<Observer<'_, P::Tree>>,
    ) -> Result<Vec<P::Tree>>;
}

/// Standard generation step: elitism plus crossover, mutation and
/// reproduction driven by a [`SelectionStrategy`].
///
/// # Examples
///
/// ```
/// use u_gpsearch::gp::{Evolution, EvolutionConfig, TournamentConfig, TournamentSelector};
///
/// let step = Evolution::new(
///     TournamentSelector::new(TournamentConfig::default().with_tournament_size(7)),
///     EvolutionConfig::default().with_crossover_rate(0.9),
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct Evolution<S = TournamentSelector> {
    /// Selection strategy feeding every slot.
    pub selection: S,
    /// Operator rates.
    pub config: EvolutionConfig,
    /// Builder used when an operator keeps failing.
    pub builder: RequirementBuilder,
}

impl<S> Evolution<S> {
    /// Creates a generation step with the default fallback builder.
    pub fn new(selection: S, config: EvolutionConfig) -> Self {
        Self {
            selection,
            config,
            builder: RequirementBuilder::default(),
        }
    }

    /// Sets the fallback builder.
    pub fn with_builder(mut self, builder: RequirementBuilder) -> Self {
        self.builder = builder;
        self
    }

    fn crossover<P, O>(
        &self,
        stream: &mut dyn SelectionStream<P::Tree>,
        problem: &P,
        objective: &O,
        rng: &mut dyn RngCore,
    ) -> Result<P::Tree>
    where
        P: GpProblem,
        O: Objective<P::Tree>,
    {
        let child = attempt(self.config.operator_attempts, |_| -> Result<Option<P::Tree>> {
            let parent1 = stream.pull(rng)?;
            let parent2 = stream.pull(rng)?;
            match problem.crossover(parent1, parent2, rng) {
                Ok(child) => Ok(Some(child)),
                Err(err) => {
                    log::trace!("crossover failed: {err}");
                    Ok(None)
                }
            }
        })?;

        match child {
            Some(child) => Ok(child),
            None => {
                log::debug!(
                    "crossover failed {} times; synthesizing a fresh tree",
                    self.config.operator_attempts
                );
                self.builder.build(problem, objective, rng)
            }
        }
    }

    fn mutation<P, O>(
        &self,
        stream: &mut dyn SelectionStream<P::Tree>,
        problem: &P,
        objective: &O,
        rng: &mut dyn RngCore,
    ) -> Result<P::Tree>
    where
        P: GpProblem,
        O: Objective<P::Tree>,
    {
        let mutant = attempt(self.config.operator_attempts, |_| -> Result<Option<P::Tree>> {
            let parent = stream.pull(rng)?;
            match problem.mutate(parent, rng) {
                Ok(mutant) => Ok(Some(mutant)),
                Err(err) => {
                    log::trace!("mutation failed: {err}");
                    Ok(None)
                }
            }
        })?;

        match mutant {
            Some(mutant) => Ok(mutant),
            None => {
                log::debug!(
                    "mutation failed {} times; synthesizing a fresh tree",
                    self.config.operator_attempts
                );
                self.builder.build(problem, objective, rng)
            }
        }
    }
}

impl<P, O, S> GenerationStep<P, O> for Evolution<S>
where
    P: GpProblem,
    O: Objective<P::Tree>,
    S: SelectionStrategy<P, O>,
{
    fn next_generation(
        &self,
        population: &[P::Tree],
        problem: &P,
        objective: &O,
        rng: &mut dyn RngCore,
        observer: Option<Observer<'_, P::Tree>>,
    ) -> Result<Vec<P::Tree>> {
        self.config.validate()?;

        let scorer = objective.bind(population);
        let elite = first_best(population.iter().map(|tree| scorer(tree).sanitize()));
        let Some(elite) = elite else {
            return Ok(Vec::new());
        };
        drop(scorer);

        let mut stream = self
            .selection
            .begin(population, problem, objective, rng, observer)?;

        let mut next = Vec::with_capacity(population.len());
        next.push(population[elite].clone());

        let crossover_rate = self.config.crossover_rate;
        let mutation_rate = self.config.mutation_rate;
        while next.len() < population.len() {
            let roll: f64 = rng.random();
            let child = if roll < crossover_rate {
                self.crossover(stream.as_mut(), problem, objective, rng)?
            } else if roll < crossover_rate + mutation_rate {
                self.mutation(stream.as_mut(), problem, objective, rng)?
            } else {
                stream.pull(rng)?
            };
            next.push(child);
        }

        Ok(next)
    }
}

/// Breeds the next generation with the default [`Evolution`] settings:
/// tournament size 25, crossover rate 0.8, mutation rate 0.01.
pub fn next_generation<P, O>(
    population: &[P::Tree],
    problem: &P,
    objective: &O,
    rng: &mut dyn RngCore,
) -> Result<Vec<P::Tree>>
where
    P: GpProblem,
    O: Objective<P::Tree>,
{
    Evolution::<TournamentSelector>::default().next_generation(population, problem, objective, rng, None)
}
