//! Search configuration.
//!
//! [`TournamentConfig`] controls selection and bloat control,
//! [`EvolutionConfig`] controls how a generation is bred, and
//! [`OptimizeConfig`] controls the whole run.

use crate::error::GpError;

/// Configuration for parsimony-adjusted tournament selection.
///
/// # Defaults
///
/// ```
/// use u_gpsearch::gp::TournamentConfig;
///
/// let config = TournamentConfig::default();
/// assert_eq!(config.tournament_size, 25);
/// assert!(config.random_parsimony);
/// assert!(!config.cov_parsimony);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TournamentConfig {
    /// Number of distinct individuals drawn per tournament.
    ///
    /// Clamped to the population size when larger.
    pub tournament_size: usize,

    /// Random parsimony pressure (Poli 2003).
    ///
    /// Trees larger than the population average are scored only with
    /// probability `1 - random_parsimony_prob`; otherwise they are
    /// disqualified for the round.
    pub random_parsimony: bool,

    /// Probability of disqualifying an above-average-size tree (0.0–1.0).
    pub random_parsimony_prob: f64,

    /// Covariant parsimony pressure (Poli & McPhee 2008).
    pub cov_parsimony: bool,

    /// Recursion limit in force while copying a tournament winner.
    pub copy_depth_limit: usize,

    /// Score the population in parallel (requires the `parallel` feature).
    pub parallel: bool,
}

impl Default for TournamentConfig {
    fn default() -> Self {
        Self {
            tournament_size: 25,
            random_parsimony: true,
            random_parsimony_prob: 0.33,
            cov_parsimony: false,
            copy_depth_limit: 1500,
            parallel: false,
        }
    }
}

impl TournamentConfig {
    /// Sets the tournament size.
    pub fn with_tournament_size(mut self, k: usize) -> Self {
        self.tournament_size = k;
        self
    }

    /// Enables or disables random parsimony.
    pub fn with_random_parsimony(mut self, enabled: bool) -> Self {
        self.random_parsimony = enabled;
        self
    }

    /// Sets the random parsimony probability.
    pub fn with_random_parsimony_prob(mut self, prob: f64) -> Self {
        self.random_parsimony_prob = prob.clamp(0.0, 1.0);
        self
    }

    /// Enables or disables covariant parsimony.
    pub fn with_cov_parsimony(mut self, enabled: bool) -> Self {
        self.cov_parsimony = enabled;
        self
    }

    /// Sets the recursion limit used while copying winners.
    pub fn with_copy_depth_limit(mut self, limit: usize) -> Self {
        self.copy_depth_limit = limit;
        self
    }

    /// Enables or disables parallel scoring.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Whether either parsimony technique needs tree sizes.
    pub fn uses_sizes(&self) -> bool {
        self.random_parsimony || self.cov_parsimony
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), GpError> {
        if self.tournament_size == 0 {
            return Err(GpError::InvalidConfig(
                "tournament_size must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.random_parsimony_prob) {
            return Err(GpError::InvalidConfig(
                "random_parsimony_prob must be within [0, 1]".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration for breeding one generation.
///
/// Each non-elite slot draws one uniform value `u`: crossover when
/// `u < crossover_rate`, mutation when `u < crossover_rate + mutation_rate`,
/// plain reproduction otherwise. Given that crossover did not fire, mutation
/// therefore happens with probability `mutation_rate / (1 - crossover_rate)`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EvolutionConfig {
    /// Probability that a slot is filled by crossover (0.0–1.0).
    pub crossover_rate: f64,

    /// Probability that a slot is filled by mutation (0.0–1.0).
    pub mutation_rate: f64,

    /// Attempts at a failing crossover or mutation before a fresh tree is
    /// synthesized instead.
    pub operator_attempts: usize,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            crossover_rate: 0.80,
            mutation_rate: 0.01,
            operator_attempts: 99_999,
        }
    }
}

impl EvolutionConfig {
    /// Sets the crossover rate.
    pub fn with_crossover_rate(mut self, rate: f64) -> Self {
        self.crossover_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Sets the mutation rate.
    pub fn with_mutation_rate(mut self, rate: f64) -> Self {
        self.mutation_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Sets the operator retry budget.
    pub fn with_operator_attempts(mut self, attempts: usize) -> Self {
        self.operator_attempts = attempts;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), GpError> {
        if !(0.0..=1.0).contains(&self.crossover_rate) {
            return Err(GpError::InvalidConfig(
                "crossover_rate must be within [0, 1]".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err(GpError::InvalidConfig(
                "mutation_rate must be within [0, 1]".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration for an optimization run.
///
/// # Builder Pattern
///
/// ```
/// use u_gpsearch::gp::OptimizeConfig;
///
/// let config = OptimizeConfig::default()
///     .with_population_size(100)
///     .with_iterations(10)
///     .with_show_scores(false)
///     .with_seed(7);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OptimizeConfig {
    /// Number of trees in every generation.
    pub population_size: usize,

    /// Number of generations to run.
    pub iterations: usize,

    /// Log best and mean score after every generation.
    pub show_scores: bool,

    /// Random seed for reproducibility. `None` uses a random seed.
    pub seed: Option<u64>,

    /// Recursion limit in force while a generation is bred.
    pub generation_depth_limit: usize,
}

impl Default for OptimizeConfig {
    fn default() -> Self {
        Self {
            population_size: 250,
            iterations: 25,
            show_scores: true,
            seed: None,
            generation_depth_limit: 600,
        }
    }
}

impl OptimizeConfig {
    /// Sets the population size.
    pub fn with_population_size(mut self, n: usize) -> Self {
        self.population_size = n;
        self
    }

    /// Sets the number of generations.
    pub fn with_iterations(mut self, n: usize) -> Self {
        self.iterations = n;
        self
    }

    /// Enables or disables progress logging.
    pub fn with_show_scores(mut self, show: bool) -> Self {
        self.show_scores = show;
        self
    }

    /// Sets the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets the recursion limit used while breeding.
    pub fn with_generation_depth_limit(mut self, limit: usize) -> Self {
        self.generation_depth_limit = limit;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), GpError> {
        if self.population_size == 0 {
            return Err(GpError::InvalidConfig(
                "population_size must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
