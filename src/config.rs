//! Optimization configuration and per-algorithm tuning knobs.

use crate::error::{Error, Result};
use std::str::FromStr;
use std::time::Duration;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// Maximum number of pieces one order is expanded into.
///
/// Large quantities would otherwise blow up the search space; truncation is
/// reported through `ResultMetadata::expansion_capped` and the residual
/// quantity stays on the unfulfilled order.
pub(crate) const EXPANSION_CAP: u32 = 50;

/// Which placement algorithm to run.
#[cfg_attr(feature = "serialize", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "snake_case"))]
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub enum AlgorithmKind {
    /// Let the dispatcher pick from problem complexity.
    Auto,
    /// Greedy first-fit over a coarse grid.
    FirstFit,
    /// Greedy best-fit scored by residual waste.
    BestFit,
    /// Greedy bottom-left fill grouped by material.
    BottomLeft,
    /// Genetic algorithm with auto-scaled parameters.
    Genetic,
    /// Simulated annealing with auto-scaled schedule.
    SimulatedAnnealing,
    /// Island-model genetic algorithm with tabu refinement.
    HybridGenetic,
}

impl Default for AlgorithmKind {
    fn default() -> Self {
        AlgorithmKind::Auto
    }
}

impl FromStr for AlgorithmKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(AlgorithmKind::Auto),
            "first_fit" => Ok(AlgorithmKind::FirstFit),
            "best_fit" => Ok(AlgorithmKind::BestFit),
            "bottom_left" => Ok(AlgorithmKind::BottomLeft),
            "genetic" => Ok(AlgorithmKind::Genetic),
            "simulated_annealing" => Ok(AlgorithmKind::SimulatedAnnealing),
            "hybrid_genetic" => Ok(AlgorithmKind::HybridGenetic),
            other => Err(Error::Validation(format!("unknown algorithm: {}", other))),
        }
    }
}

/// Genetic-algorithm knobs. With `auto_scale` on (the default), population,
/// generation, and elite sizes are derived from problem complexity and the
/// explicit values are ignored.
#[cfg_attr(feature = "serialize", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
#[derive(Clone, Debug, PartialEq)]
pub struct GeneticParams {
    /// Derive population/generations/elite from complexity.
    pub auto_scale: bool,
    /// Population size when not auto-scaling.
    pub population_size: usize,
    /// Generation budget when not auto-scaling.
    pub generations: usize,
    /// Probability that an individual is mutated.
    pub mutation_rate: f64,
    /// Probability that a selected pair is crossed over.
    pub crossover_rate: f64,
    /// Number of top individuals carried unchanged when not auto-scaling.
    pub elite_size: usize,
    /// Tournament size for parent selection.
    pub tournament_size: usize,
    /// Generations without improvement before stopping early.
    pub early_stop_patience: usize,
}

impl Default for GeneticParams {
    fn default() -> Self {
        GeneticParams {
            auto_scale: true,
            population_size: 30,
            generations: 60,
            mutation_rate: 0.1,
            crossover_rate: 0.8,
            elite_size: 3,
            tournament_size: 3,
            early_stop_patience: 15,
        }
    }
}

/// Simulated-annealing knobs. With `auto_scale` on, the schedule is derived
/// from problem complexity.
#[cfg_attr(feature = "serialize", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
#[derive(Clone, Debug, PartialEq)]
pub struct AnnealingParams {
    /// Derive the schedule from complexity.
    pub auto_scale: bool,
    /// Starting temperature when not auto-scaling.
    pub initial_temperature: f64,
    /// Temperature at which annealing stops when not auto-scaling.
    pub min_temperature: f64,
    /// Geometric cooling factor in `(0, 1)`.
    pub cooling_rate: f64,
    /// Iteration cap when not auto-scaling.
    pub max_iterations: usize,
    /// Moves tried per temperature block when not auto-scaling.
    pub iterations_per_temperature: usize,
}

impl Default for AnnealingParams {
    fn default() -> Self {
        AnnealingParams {
            auto_scale: true,
            initial_temperature: 1000.0,
            min_temperature: 0.1,
            cooling_rate: 0.95,
            max_iterations: 1000,
            iterations_per_temperature: 50,
        }
    }
}

/// Hybrid genetic + tabu knobs.
#[cfg_attr(feature = "serialize", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
#[derive(Clone, Debug, PartialEq)]
pub struct HybridParams {
    /// Number of islands; 0 derives 2–4 from complexity.
    pub islands: usize,
    /// Individuals per island; 0 derives from complexity.
    pub population_per_island: usize,
    /// Generations between migrations.
    pub migration_interval: usize,
    /// Generations between tabu refinements of the elites.
    pub local_search_interval: usize,
    /// Length of the tabu list.
    pub tabu_tenure: usize,
    /// Iteration cap of one tabu trajectory.
    pub tabu_iterations: usize,
}

impl Default for HybridParams {
    fn default() -> Self {
        HybridParams {
            islands: 0,
            population_per_island: 0,
            migration_interval: 10,
            local_search_interval: 5,
            tabu_tenure: 10,
            tabu_iterations: 50,
        }
    }
}

/// Configuration for one optimization run.
///
/// Passed by value and immutable for the duration of the run.
#[cfg_attr(feature = "serialize", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
#[derive(Clone, Debug, PartialEq)]
pub struct OptimizationConfig {
    /// Permit 90° rotation of rectangular pieces.
    pub allow_rotation: bool,
    /// Kerf: clearance enforced between cuts.
    pub cutting_width: f64,
    /// Residual areas below this threshold are ignored for reporting.
    pub min_waste_size: f64,
    /// Soft wall-clock deadline for the whole run.
    pub max_computation_time: Duration,
    /// Process orders by (priority, area) instead of input order.
    pub prioritize_orders: bool,
    /// Algorithm override; `Auto` lets the dispatcher choose.
    pub algorithm: AlgorithmKind,
    /// Grid step for coarse placement search.
    pub placement_precision: f64,
    /// Partition work by material.
    pub group_by_material: bool,
    /// Partition work by thickness.
    pub group_by_thickness: bool,
    /// Master RNG seed. Metaheuristic results are bit-reproducible given the
    /// same seed; with `None` a seed is drawn from entropy and recorded in
    /// the result metadata.
    pub seed: Option<u64>,
    /// Genetic-algorithm knobs.
    pub genetic: GeneticParams,
    /// Simulated-annealing knobs.
    pub annealing: AnnealingParams,
    /// Hybrid genetic + tabu knobs.
    pub hybrid: HybridParams,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        OptimizationConfig {
            allow_rotation: true,
            cutting_width: 0.0,
            min_waste_size: 0.0,
            max_computation_time: Duration::from_secs(60),
            prioritize_orders: true,
            algorithm: AlgorithmKind::Auto,
            placement_precision: 10.0,
            group_by_material: true,
            group_by_thickness: true,
            seed: None,
            genetic: GeneticParams::default(),
            annealing: AnnealingParams::default(),
            hybrid: HybridParams::default(),
        }
    }
}

impl OptimizationConfig {
    /// Checks the configuration for out-of-range values.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::InvalidDimensions`] for non-positive precision or
    /// timeout and negative kerf, and with [`Error::Validation`] for rates
    /// outside their ranges.
    pub fn validate(&self) -> Result<()> {
        if self.cutting_width < 0.0 {
            return Err(Error::InvalidDimensions(format!(
                "cutting width must not be negative: {}",
                self.cutting_width
            )));
        }
        if self.min_waste_size < 0.0 {
            return Err(Error::InvalidDimensions(format!(
                "min waste size must not be negative: {}",
                self.min_waste_size
            )));
        }
        if self.placement_precision <= 0.0 {
            return Err(Error::InvalidDimensions(format!(
                "placement precision must be positive: {}",
                self.placement_precision
            )));
        }
        if self.max_computation_time.is_zero() {
            return Err(Error::InvalidDimensions(
                "max computation time must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.genetic.mutation_rate) {
            return Err(Error::Validation(format!(
                "mutation rate must be in [0, 1]: {}",
                self.genetic.mutation_rate
            )));
        }
        if !(0.0..=1.0).contains(&self.genetic.crossover_rate) {
            return Err(Error::Validation(format!(
                "crossover rate must be in [0, 1]: {}",
                self.genetic.crossover_rate
            )));
        }
        if self.genetic.tournament_size == 0 {
            return Err(Error::Validation(
                "tournament size must be at least 1".to_string(),
            ));
        }
        if !self.genetic.auto_scale
            && (self.genetic.population_size == 0 || self.genetic.generations == 0)
        {
            return Err(Error::Validation(
                "explicit genetic parameters must be positive".to_string(),
            ));
        }
        if !(self.annealing.cooling_rate > 0.0 && self.annealing.cooling_rate < 1.0) {
            return Err(Error::Validation(format!(
                "cooling rate must be in (0, 1): {}",
                self.annealing.cooling_rate
            )));
        }
        if !self.annealing.auto_scale
            && (self.annealing.initial_temperature <= 0.0
                || self.annealing.min_temperature <= 0.0
                || self.annealing.initial_temperature <= self.annealing.min_temperature)
        {
            return Err(Error::Validation(
                "explicit annealing temperatures must satisfy 0 < min < initial".to_string(),
            ));
        }
        if self.hybrid.migration_interval == 0 || self.hybrid.local_search_interval == 0 {
            return Err(Error::Validation(
                "hybrid intervals must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
