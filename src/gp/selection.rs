//! Parsimony-adjusted tournament selection.
//!
//! A selection round scores the population once, applies bloat control,
//! then serves an unbounded stream of selected individuals. Each pull runs
//! one tournament and returns an owned copy of the winner, never an alias
//! into the population.
//!
//! # Bloat control
//!
//! - **Random parsimony** (Poli 2003): trees larger than the average size
//!   are scored only with probability `1 - p`, otherwise disqualified.
//! - **Covariant parsimony** (Poli & McPhee 2008): every valid score is
//!   shifted by a size-proportional term derived from
//!   `Cov(size, score) / Var(size)`.
//! - **Pseudo-Pareto demotion**: a tree that is both below the mean score
//!   and above the average size is disqualified. This always runs when
//!   sizes are known (i.e. when either technique above is enabled).
//!
//! # References
//!
//! - Poli (2003), "A Simple but Theoretically-Motivated Method to Control
//!   Bloat in Genetic Programming"
//! - Poli & McPhee (2008), "Covariant Parsimony Pressure in Genetic
//!   Programming"

use super::builder::{RequirementBuilder, TreeBuilder};
use super::config::TournamentConfig;
use super::objective::{BoundScorer, Objective};
use super::types::{GpProblem, Program, Score};
use crate::error::{GpError, Result};
use crate::recursion;
use rand::seq::index;
use rand::{Rng, RngCore};

/// Callback that receives the scores of a selection round.
pub type Observer<'o, T> = &'o mut dyn FnMut(&ScoreMap<'_, T>);

/// Scores of one selection round, indexed by population position.
///
/// `raw` holds what the objective returned (or `Disqualified` for trees
/// random parsimony skipped); `adjusted` holds the scores tournaments are
/// decided on. Rebuilt from scratch every round.
#[derive(Debug, Clone)]
pub struct ScoreMap<'a, T> {
    population: &'a [T],
    sizes: Vec<usize>,
    average_size: f64,
    raw: Vec<Score>,
    adjusted: Vec<Score>,
}

impl<'a, T> ScoreMap<'a, T> {
    /// The scored population.
    pub fn population(&self) -> &'a [T] {
        self.population
    }

    /// Number of scored trees.
    pub fn len(&self) -> usize {
        self.population.len()
    }

    /// Whether the population is empty.
    pub fn is_empty(&self) -> bool {
        self.population.is_empty()
    }

    /// Objective score of tree `i`.
    pub fn raw(&self, i: usize) -> Score {
        self.raw[i]
    }

    /// Parsimony-adjusted score of tree `i`.
    pub fn adjusted(&self, i: usize) -> Score {
        self.adjusted[i]
    }

    /// All objective scores.
    pub fn raw_scores(&self) -> &[Score] {
        &self.raw
    }

    /// All adjusted scores.
    pub fn adjusted_scores(&self) -> &[Score] {
        &self.adjusted
    }

    /// Node count of tree `i`, if sizes were computed this round.
    pub fn size(&self, i: usize) -> Option<usize> {
        self.sizes.get(i).copied()
    }

    /// Average node count, or 0.0 if sizes were not computed.
    pub fn average_size(&self) -> f64 {
        self.average_size
    }

    /// Index of the best objective score (first one on ties).
    pub fn best_raw(&self) -> Option<usize> {
        first_best(self.raw.iter().copied())
    }

    /// Mean objective score over trees that were not disqualified.
    pub fn mean_raw(&self) -> Score {
        Score::mean_of(self.raw.iter().copied())
    }

    /// Pairs every tree with its adjusted score.
    pub fn iter(&self) -> impl Iterator<Item = (&'a T, Score)> + '_ {
        self.population.iter().zip(self.adjusted.iter().copied())
    }
}

/// Index of the maximum score; the earliest one wins ties.
pub(crate) fn first_best<I: IntoIterator<Item = Score>>(scores: I) -> Option<usize> {
    let mut best: Option<(usize, Score)> = None;
    for (i, score) in scores.into_iter().enumerate() {
        if best.map_or(true, |(_, b)| score > b) {
            best = Some((i, score));
        }
    }
    best.map(|(i, _)| i)
}

// ============================================================================
// Scoring a round
// ============================================================================

/// Scores `population` and applies the bloat control enabled in `config`.
pub fn score_population<'a, T, O, R>(
    population: &'a [T],
    objective: &O,
    config: &TournamentConfig,
    rng: &mut R,
) -> ScoreMap<'a, T>
where
    T: Program,
    O: Objective<T>,
    R: Rng + ?Sized,
{
    let scorer = objective.bind(population);

    let (sizes, average_size) = if config.uses_sizes() {
        let sizes: Vec<usize> = population.iter().map(Program::size).collect();
        let average = if sizes.is_empty() {
            0.0
        } else {
            sizes.iter().sum::<usize>() as f64 / sizes.len() as f64
        };
        (sizes, average)
    } else {
        (Vec::new(), 0.0)
    };

    let scored: Vec<bool> = if config.random_parsimony {
        sizes
            .iter()
            .map(|&size| {
                (size as f64) <= average_size
                    || rng.random::<f64>() >= config.random_parsimony_prob
            })
            .collect()
    } else {
        vec![true; population.len()]
    };

    let raw = evaluate(population, &scored, &scorer, config.parallel);
    let mut adjusted = raw.clone();

    if config.cov_parsimony {
        let c = covariance_coefficient(&sizes, &raw);
        for (score, &size) in adjusted.iter_mut().zip(&sizes) {
            *score = score.map(|v| v - c * size as f64);
        }
    }

    if !sizes.is_empty() {
        pseudo_pareto(&mut adjusted, &sizes, average_size);
    }

    ScoreMap {
        population,
        sizes,
        average_size,
        raw,
        adjusted,
    }
}

fn evaluate<T: Program>(
    population: &[T],
    scored: &[bool],
    scorer: &BoundScorer<'_, T>,
    parallel: bool,
) -> Vec<Score> {
    let score_one = |tree: &T, scored: bool| {
        if scored {
            scorer(tree).sanitize()
        } else {
            Score::Disqualified
        }
    };

    #[cfg(feature = "parallel")]
    {
        if parallel {
            use rayon::prelude::*;
            return population
                .par_iter()
                .zip(scored.par_iter())
                .map(|(tree, &s)| score_one(tree, s))
                .collect();
        }
    }
    #[cfg(not(feature = "parallel"))]
    let _ = parallel;

    population
        .iter()
        .zip(scored)
        .map(|(tree, &s)| score_one(tree, s))
        .collect()
}

/// Covariant parsimony coefficient over the trees with valid scores.
///
/// Returns `-(cov / var)` where `cov` is the sample covariance of size and
/// score (n - 1 denominator) and `var` the population variance of size
/// (n denominator). The adjusted score is `score - c * size`.
///
/// Returns 0.0 with fewer than two valid scores, when every size is equal,
/// or when infinite scores make the ratio undefined.
pub fn covariance_coefficient(sizes: &[usize], scores: &[Score]) -> f64 {
    let pairs: Vec<(f64, f64)> = sizes
        .iter()
        .zip(scores)
        .filter_map(|(&size, score)| score.value().map(|v| (size as f64, v)))
        .collect();
    let n = pairs.len();
    if n < 2 {
        return 0.0;
    }

    let nf = n as f64;
    let mean_size = pairs.iter().map(|p| p.0).sum::<f64>() / nf;
    let mean_score = pairs.iter().map(|p| p.1).sum::<f64>() / nf;

    let covariance = pairs
        .iter()
        .map(|(l, f)| (l - mean_size) * (f - mean_score))
        .sum::<f64>()
        / (nf - 1.0);
    let variance = pairs
        .iter()
        .map(|(l, _)| (l - mean_size).powi(2))
        .sum::<f64>()
        / nf;

    let c = -(covariance / variance);
    if variance == 0.0 || !c.is_finite() {
        return 0.0;
    }
    c
}

/// Disqualifies trees that are below the mean score and above the average
/// size.
///
/// The mean is taken over valid scores only; with none, nothing changes.
pub fn pseudo_pareto(scores: &mut [Score], sizes: &[usize], average_size: f64) {
    let mean = Score::mean_of(scores.iter().copied());
    for (score, &size) in scores.iter_mut().zip(sizes) {
        if *score < mean && (size as f64) > average_size {
            *score = Score::Disqualified;
        }
    }
}

// ============================================================================
// Selection strategies
// ============================================================================

/// A pull-based, never-ending stream of selected individuals.
///
/// Bound to one population and one round of scores; it must not outlive the
/// generation it was created for.
pub trait SelectionStream<T> {
    /// Selects the next individual.
    ///
    /// # Errors
    ///
    /// [`GpError::Unsatisfiable`] if a replacement tree had to be
    /// synthesized and no satisfying tree could be built.
    fn pull(&mut self, rng: &mut dyn RngCore) -> Result<T>;
}

/// Starts a selection round over a population.
pub trait SelectionStrategy<P: GpProblem, O: Objective<P::Tree>> {
    /// Scores `population` and returns the stream of selected individuals.
    ///
    /// `observer`, if given, sees the round's scores once before the first
    /// pull.
    fn begin<'a>(
        &'a self,
        population: &'a [P::Tree],
        problem: &'a P,
        objective: &'a O,
        rng: &mut dyn RngCore,
        observer: Option<Observer<'_, P::Tree>>,
    ) -> Result<Box<dyn SelectionStream<P::Tree> + 'a>>;
}

/// Tournament selection with parsimony pressure.
///
/// # Examples
///
/// ```
/// use u_gpsearch::gp::{TournamentConfig, TournamentSelector};
///
/// let selector = TournamentSelector::new(
///     TournamentConfig::default()
///         .with_tournament_size(7)
///         .with_cov_parsimony(true),
/// );
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TournamentSelector {
    /// Tournament and parsimony settings.
    pub config: TournamentConfig,
    /// Builder used to replace disqualified winners and failed copies.
    pub builder: RequirementBuilder,
}

impl TournamentSelector {
    /// Creates a selector with the default replacement builder.
    pub fn new(config: TournamentConfig) -> Self {
        Self {
            config,
            builder: RequirementBuilder::default(),
        }
    }

    /// Sets the builder used for replacements.
    pub fn with_builder(mut self, builder: RequirementBuilder) -> Self {
        self.builder = builder;
        self
    }

    /// Scores `population` and returns the concrete stream.
    pub fn stream<'a, P, O>(
        &self,
        population: &'a [P::Tree],
        problem: &'a P,
        objective: &'a O,
        rng: &mut dyn RngCore,
        observer: Option<Observer<'_, P::Tree>>,
    ) -> Result<TournamentStream<'a, P, O>>
    where
        P: GpProblem,
        O: Objective<P::Tree>,
    {
        self.config.validate()?;
        if population.is_empty() {
            return Err(GpError::InvalidConfig(
                "cannot select from an empty population".into(),
            ));
        }

        let scores = score_population(population, objective, &self.config, rng);
        if let Some(observer) = observer {
            observer(&scores);
        }

        Ok(TournamentStream {
            scores,
            problem,
            objective,
            tournament_size: self.config.tournament_size,
            copy_depth_limit: self.config.copy_depth_limit,
            builder: self.builder,
        })
    }
}

impl<P: GpProblem, O: Objective<P::Tree>> SelectionStrategy<P, O> for TournamentSelector {
    fn begin<'a>(
        &'a self,
        population: &'a [P::Tree],
        problem: &'a P,
        objective: &'a O,
        rng: &mut dyn RngCore,
        observer: Option<Observer<'_, P::Tree>>,
    ) -> Result<Box<dyn SelectionStream<P::Tree> + 'a>> {
        let stream = self.stream(population, problem, objective, rng, observer)?;
        Ok(Box::new(stream))
    }
}

/// Selection stream produced by [`TournamentSelector`].
pub struct TournamentStream<'a, P: GpProblem, O> {
    scores: ScoreMap<'a, P::Tree>,
    problem: &'a P,
    objective: &'a O,
    tournament_size: usize,
    copy_depth_limit: usize,
    builder: RequirementBuilder,
}

impl<'a, P: GpProblem, O: Objective<P::Tree>> TournamentStream<'a, P, O> {
    /// Scores this stream selects on.
    pub fn scores(&self) -> &ScoreMap<'a, P::Tree> {
        &self.scores
    }

    /// Runs one tournament and returns the winner's index.
    ///
    /// Draws `k` distinct individuals uniformly; the highest adjusted score
    /// wins and ties go to whichever was drawn first.
    pub fn tournament<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        let n = self.scores.len();
        let k = self.tournament_size.clamp(1, n);
        let sample = index::sample(rng, n, k);

        let mut winner = sample.index(0);
        for idx in sample.iter().skip(1) {
            if self.scores.adjusted(idx) > self.scores.adjusted(winner) {
                winner = idx;
            }
        }
        winner
    }

    fn synthesize(&self, rng: &mut dyn RngCore) -> Result<P::Tree> {
        self.builder.build(self.problem, self.objective, rng)
    }
}

impl<P: GpProblem, O: Objective<P::Tree>> SelectionStream<P::Tree> for TournamentStream<'_, P, O> {
    fn pull(&mut self, rng: &mut dyn RngCore) -> Result<P::Tree> {
        let winner = self.tournament(rng);
        if self.scores.adjusted(winner).is_disqualified() {
            return self.synthesize(rng);
        }

        let tree = &self.scores.population()[winner];
        match recursion::with_limit(self.copy_depth_limit, || tree.duplicate()) {
            Ok(copy) => Ok(copy),
            Err(err) => {
                log::debug!("copying tournament winner failed ({err}); synthesizing a replacement");
                self.synthesize(rng)
            }
        }
    }
}
