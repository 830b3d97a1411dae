//! The optimizer facade: validation, complexity classification, strategy
//! selection, deadline handling, fallback, and result assembly.

use crate::config::{AlgorithmKind, OptimizationConfig};
use crate::error::{Error, Result};
use crate::evaluate::metrics;
use crate::model::{CuttingResult, Order, PlacedShape, ResultMetadata, Stock};
use crate::solvers::{annealing, genetic, greedy, hybrid, Deadline, Layout, Problem, Solver};
use crate::validate::{validate_inputs, validate_result};
use fnv::FnvHashMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Instant;
use tracing::{debug, debug_span, warn};

/// Problem size class driving automatic strategy selection.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Complexity {
    /// At most 50 expanded pieces.
    Simple,
    /// At most 500 expanded pieces.
    Medium,
    /// Everything larger.
    Complex,
}

fn classify(pieces: usize) -> Complexity {
    if pieces <= 50 {
        Complexity::Simple
    } else if pieces <= 500 {
        Complexity::Medium
    } else {
        Complexity::Complex
    }
}

/// Maps the configured algorithm (or the complexity class, for `Auto`) to
/// a solver. The auto policy is deterministic: simple problems get the
/// genetic solver, everything else the island hybrid, whose island count
/// scales with complexity.
fn select_solver(kind: AlgorithmKind, complexity: Complexity) -> Box<dyn Solver> {
    match kind {
        AlgorithmKind::FirstFit => Box::new(greedy::FirstFit),
        AlgorithmKind::BestFit => Box::new(greedy::BestFit),
        AlgorithmKind::BottomLeft => Box::new(greedy::BottomLeft),
        AlgorithmKind::Genetic => Box::new(genetic::Genetic),
        AlgorithmKind::SimulatedAnnealing => Box::new(annealing::Annealing),
        AlgorithmKind::HybridGenetic => Box::new(hybrid::HybridGenetic),
        AlgorithmKind::Auto => match complexity {
            Complexity::Simple => Box::new(genetic::Genetic),
            Complexity::Medium | Complexity::Complex => Box::new(hybrid::HybridGenetic),
        },
    }
}

/// Runs one optimization: validates inputs, selects and runs an algorithm
/// under the configured deadline, validates the result, and falls back to
/// a conservative first-fit if the primary algorithm produced an invalid
/// layout.
///
/// # Errors
///
/// Input problems surface as [`Error::InvalidDimensions`],
/// [`Error::InsufficientStock`], or [`Error::Validation`]. A post-run
/// invariant violation that survives the fallback attempt surfaces as
/// [`Error::Optimization`]. Pieces that simply do not fit are never an
/// error; they are reported in `unfulfilled_orders`.
pub fn optimize(
    stocks: &[Stock],
    orders: &[Order],
    config: &OptimizationConfig,
) -> Result<CuttingResult> {
    let started = Instant::now();
    let span = debug_span!("optimize", stocks = stocks.len(), orders = orders.len());
    let _guard = span.enter();

    config.validate()?;

    // No orders means there is nothing to do, not an error.
    if orders.is_empty() {
        return Ok(CuttingResult {
            placed: Vec::new(),
            unfulfilled_orders: Vec::new(),
            total_stock_used: 0,
            total_orders_fulfilled: 0,
            efficiency: 0.0,
            total_cost: 0.0,
            computation_time: started.elapsed(),
            algorithm: "none".to_string(),
            metadata: ResultMetadata::default(),
        });
    }

    validate_inputs(stocks, orders, config)?;

    let problem = Problem::expand(stocks, orders);
    let complexity = classify(problem.pieces.len());
    let solver = select_solver(config.algorithm, complexity);
    debug!(
        algorithm = solver.name(),
        pieces = problem.pieces.len(),
        ?complexity,
        "strategy selected"
    );

    let mut notes = Vec::new();
    let seed = match config.seed {
        Some(seed) => seed,
        None => {
            let seed = rand::thread_rng().gen();
            notes.push(format!("seed drawn from entropy: {}", seed));
            seed
        }
    };

    let deadline = Deadline::starting_now(config.max_computation_time);
    let mut rng = StdRng::seed_from_u64(seed);
    let layout = solver.solve(&problem, config, &deadline, &mut rng);

    let result = assemble(
        &problem,
        config,
        layout,
        solver.name(),
        started,
        notes.clone(),
        false,
    );

    match validate_result(&result, stocks, orders, config) {
        Ok(()) => Ok(result),
        Err(violation) => {
            warn!(%violation, "result validation failed, retrying with first-fit");
            notes.push(format!("primary algorithm invalidated: {}", violation));
            let fallback = greedy::FirstFit;
            let layout = fallback.solve(&problem, config, &deadline, &mut rng);
            let result = assemble(
                &problem,
                config,
                layout,
                fallback.name(),
                started,
                notes,
                true,
            );
            validate_result(&result, stocks, orders, config).map_err(|err| {
                Error::Optimization(format!(
                    "fallback first-fit also produced an invalid result: {}",
                    err
                ))
            })?;
            Ok(result)
        }
    }
}

/// Turns a solver layout into the public result record.
fn assemble(
    problem: &Problem<'_>,
    config: &OptimizationConfig,
    layout: Layout,
    algorithm: &'static str,
    started: Instant,
    mut notes: Vec<String>,
    degraded: bool,
) -> CuttingResult {
    let m = metrics(problem, &layout.placements);

    let mut placed_per_order: FnvHashMap<usize, u32> = FnvHashMap::default();
    let placed: Vec<PlacedShape> = layout
        .placements
        .iter()
        .enumerate()
        .map(|(sequence, placement)| {
            let piece = &problem.pieces[placement.piece];
            *placed_per_order.entry(piece.order).or_insert(0) += 1;
            PlacedShape {
                order_id: problem.orders[piece.order].id.clone(),
                stock_id: problem.stocks[placement.stock].id.clone(),
                shape: piece.shape,
                x: placement.x,
                y: placement.y,
                rotation: placement.rotation,
                cutting_sequence: sequence,
            }
        })
        .collect();

    // Orders with residual quantity, including anything the expansion cap
    // never turned into pieces.
    let mut unfulfilled_orders = Vec::new();
    for (order_index, order) in problem.orders.iter().enumerate() {
        let placed_count = placed_per_order.get(&order_index).copied().unwrap_or(0);
        if placed_count < order.quantity {
            let mut residual = order.clone();
            residual.quantity = order.quantity - placed_count;
            unfulfilled_orders.push(residual);
        }
    }

    if problem.expansion_capped {
        notes.push(format!(
            "order quantities capped at {} pieces per order",
            crate::config::EXPANSION_CAP
        ));
    }

    // Reporting hint only: offcuts below the threshold are not worth
    // keeping, so tell the caller how many sheets leave a usable residual.
    if config.min_waste_size > 0.0 && !layout.placements.is_empty() {
        let mut used_per_stock: FnvHashMap<usize, f64> = FnvHashMap::default();
        for placement in &layout.placements {
            *used_per_stock.entry(placement.stock).or_insert(0.0) +=
                problem.pieces[placement.piece].area();
        }
        let usable = used_per_stock
            .iter()
            .filter(|&(&stock, &used)| {
                problem.stocks[stock].area() - used >= config.min_waste_size
            })
            .count();
        notes.push(format!(
            "{} of {} used stocks leave a residual at or above the usable-waste threshold",
            usable,
            used_per_stock.len()
        ));
    }

    CuttingResult {
        total_orders_fulfilled: placed_per_order.len(),
        total_stock_used: m.stocks_used,
        efficiency: m.efficiency,
        total_cost: m.cost,
        computation_time: started.elapsed(),
        algorithm: algorithm.to_string(),
        metadata: ResultMetadata {
            early_terminated: layout.early_terminated,
            degraded,
            expansion_capped: problem.expansion_capped,
            generations_run: layout.generations_run,
            iterations_run: layout.iterations_run,
            notes,
        },
        placed,
        unfulfilled_orders,
    }
}

/// Builder-style facade over [`optimize`].
///
/// ```
/// use cut_planner_2d::{Material, OptimizationConfig, Optimizer, Order, Priority, Shape, Stock};
///
/// let result = Optimizer::new()
///     .add_stock(Stock::new("sheet-1", 1000.0, 1000.0, 5.0, Material::Metal, 12.5)?)
///     .add_order(Order::new(
///         "o-1",
///         Shape::rect(500.0, 500.0)?,
///         2,
///         Priority::High,
///         Material::Metal,
///         5.0,
///         0.0,
///     )?)
///     .optimize()?;
/// assert_eq!(result.placed.len(), 2);
/// # Ok::<(), cut_planner_2d::Error>(())
/// ```
#[derive(Clone, Debug, Default)]
pub struct Optimizer {
    stocks: Vec<Stock>,
    orders: Vec<Order>,
    config: OptimizationConfig,
}

impl Optimizer {
    /// Creates an empty optimizer with the default configuration.
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds a stock sheet the optimizer may cut from.
    pub fn add_stock(&mut self, stock: Stock) -> &mut Self {
        self.stocks.push(stock);
        self
    }

    /// Adds stock sheets the optimizer may cut from.
    pub fn add_stocks<I>(&mut self, stocks: I) -> &mut Self
    where
        I: IntoIterator<Item = Stock>,
    {
        self.stocks.extend(stocks);
        self
    }

    /// Adds an order to fulfill.
    pub fn add_order(&mut self, order: Order) -> &mut Self {
        self.orders.push(order);
        self
    }

    /// Adds orders to fulfill.
    pub fn add_orders<I>(&mut self, orders: I) -> &mut Self
    where
        I: IntoIterator<Item = Order>,
    {
        self.orders.extend(orders);
        self
    }

    /// Replaces the configuration.
    pub fn set_config(&mut self, config: OptimizationConfig) -> &mut Self {
        self.config = config;
        self
    }

    /// Overrides the algorithm choice.
    pub fn set_algorithm(&mut self, algorithm: AlgorithmKind) -> &mut Self {
        self.config.algorithm = algorithm;
        self
    }

    /// Sets the master RNG seed so metaheuristic runs are reproducible.
    pub fn set_seed(&mut self, seed: u64) -> &mut Self {
        self.config.seed = Some(seed);
        self
    }

    /// Runs the optimization.
    ///
    /// # Errors
    ///
    /// See [`optimize`].
    pub fn optimize(&self) -> Result<CuttingResult> {
        optimize(&self.stocks, &self.orders, &self.config)
    }

    /// Runs the same problem through several algorithms and returns each
    /// outcome, in the order the kinds were given.
    ///
    /// Useful for picking a strategy empirically; a failing algorithm does
    /// not abort the comparison.
    pub fn compare_algorithms(
        &self,
        kinds: &[AlgorithmKind],
    ) -> Vec<(AlgorithmKind, Result<CuttingResult>)> {
        kinds
            .iter()
            .map(|&kind| {
                let config = OptimizationConfig {
                    algorithm: kind,
                    ..self.config.clone()
                };
                (kind, optimize(&self.stocks, &self.orders, &config))
            })
            .collect()
    }
}
