//! Genetic algorithm over placement chromosomes with auto-scaled
//! parameters, mixed-strategy initialization, and early stopping.
//!
//! A chromosome is an ordered list of placement genes, one gene per placed
//! piece. Feasibility is decided by the evaluator, not the operators:
//! mutation may produce overlapping layouts, which simply score zero and
//! are selected against. Every piece appears at most once in a chromosome;
//! pieces without a gene are unplaced.

use crate::config::{GeneticParams, OptimizationConfig};
use crate::evaluate::{feasible_fast, ga_fitness};
use crate::placement::rotations_for;
use crate::solvers::greedy::{best_fit_layout, occupancies_for};
use crate::solvers::{Deadline, Layout, Placement, Problem, Solver};
use rand::prelude::*;
use rand::rngs::StdRng;
use rayon::prelude::*;
use tracing::{debug, trace};

/// Population size at which fitness evaluation switches to rayon.
const PARALLEL_THRESHOLD: usize = 16;

/// Best-fitness improvements below this do not reset the early-stop
/// counter.
const IMPROVEMENT_EPSILON: f64 = 1e-6;

/// Probability that a single gene mutates once an individual is selected
/// for mutation.
const GENE_MUTATION_RATE: f64 = 0.1;

/// Attempts when searching for a random feasible placement.
const RANDOM_PLACEMENT_ATTEMPTS: usize = 50;

/// The genetic solver.
pub(crate) struct Genetic;

/// Population, generation, and elite sizes resolved for one run.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct ScaledGeneticParams {
    pub population: usize,
    pub generations: usize,
    pub elite: usize,
}

/// Derives population/generation/elite sizes from problem complexity
/// `C = stocks × pieces`.
///
/// Small problems get a small, fast population; large problems scale with
/// `√C` under hard caps that bound memory.
pub(crate) fn scale_parameters(complexity: usize, params: &GeneticParams) -> ScaledGeneticParams {
    if !params.auto_scale {
        return ScaledGeneticParams {
            population: params.population_size,
            generations: params.generations,
            elite: params.elite_size.max(1).min(params.population_size),
        };
    }

    let c = complexity.max(1);
    if c <= 50 {
        let population = (c / 3).clamp(10, 20);
        ScaledGeneticParams {
            population,
            generations: c.clamp(20, 50),
            elite: (population / 10).max(2),
        }
    } else if c <= 200 {
        let population = (c / 5).clamp(20, 40);
        ScaledGeneticParams {
            population,
            generations: (c / 2).clamp(30, 100),
            elite: (population / 8).max(3),
        }
    } else {
        let sqrt_c = (c as f64).sqrt();
        let population = ((5.0 * sqrt_c) as usize).clamp(30, 100);
        ScaledGeneticParams {
            population,
            generations: ((10.0 * sqrt_c) as usize).clamp(50, 200),
            elite: (population / 6).max(5),
        }
    }
}

/// One candidate solution with a lazily computed fitness.
#[derive(Clone, Debug)]
pub(super) struct Individual {
    pub genes: Vec<Placement>,
    pub fitness: Option<f64>,
}

impl Individual {
    pub(super) fn new(genes: Vec<Placement>) -> Individual {
        Individual {
            genes,
            fitness: None,
        }
    }

    pub(super) fn fitness_value(&self) -> f64 {
        self.fitness.unwrap_or(0.0)
    }
}

impl Solver for Genetic {
    fn name(&self) -> &'static str {
        "genetic"
    }

    fn solve(
        &self,
        problem: &Problem<'_>,
        config: &OptimizationConfig,
        deadline: &Deadline,
        rng: &mut StdRng,
    ) -> Layout {
        if problem.pieces.is_empty() {
            return Layout::new();
        }

        let scaled = scale_parameters(problem.complexity(), &config.genetic);
        debug!(
            population = scaled.population,
            generations = scaled.generations,
            elite = scaled.elite,
            complexity = problem.complexity(),
            "genetic parameters scaled"
        );

        let mut population = initial_population(problem, config, scaled.population, rng);
        evaluate_population(problem, config, &mut population);

        let mut best = best_feasible(problem, config, &population);
        let mut best_fitness = best.as_ref().map(Individual::fitness_value).unwrap_or(0.0);
        let mut stagnant = 0usize;
        let mut generations_run = 0usize;
        let mut early_terminated = false;

        for generation in 0..scaled.generations {
            if deadline.expired() {
                early_terminated = true;
                break;
            }
            generations_run = generation + 1;

            population = next_generation(problem, config, scaled, population, rng);
            evaluate_population(problem, config, &mut population);

            let generation_best = best_feasible(problem, config, &population);
            if let Some(candidate) = generation_best {
                let fitness = candidate.fitness_value();
                let placed = candidate.genes.len();
                let best_placed = best.as_ref().map(|b| b.genes.len()).unwrap_or(0);
                // Prefer layouts that place more pieces; fitness breaks
                // ties among equally complete layouts.
                let improved = placed > best_placed
                    || (placed == best_placed && fitness > best_fitness + IMPROVEMENT_EPSILON);
                if improved {
                    best = Some(candidate);
                    best_fitness = fitness;
                    stagnant = 0;
                } else {
                    stagnant += 1;
                }
            } else {
                stagnant += 1;
            }

            trace!(
                generation,
                best_fitness,
                stagnant,
                "generation finished"
            );

            if stagnant >= config.genetic.early_stop_patience {
                debug!(generation, "early stop: fitness stagnated");
                break;
            }
        }

        let mut layout = match best {
            Some(individual) => layout_from_genes(problem, individual.genes),
            // Every generation was infeasible; fall back to the greedy
            // seed so the dispatcher still gets a valid layout.
            None => best_fit_layout(problem, config, &problem.processing_order(true)),
        };
        layout.early_terminated = early_terminated;
        layout.generations_run = Some(generations_run);
        layout
    }
}

/// Builds a layout from genes, deriving the unplaced set.
pub(super) fn layout_from_genes(problem: &Problem<'_>, genes: Vec<Placement>) -> Layout {
    let mut placed = vec![false; problem.pieces.len()];
    for gene in &genes {
        placed[gene.piece] = true;
    }
    Layout {
        unplaced: (0..problem.pieces.len()).filter(|&p| !placed[p]).collect(),
        placements: genes,
        early_terminated: false,
        generations_run: None,
        iterations_run: None,
    }
}

/// Computes missing fitness values, in parallel for large populations.
///
/// Fitness is a pure function of the genes, so evaluation order cannot
/// perturb results; all randomness stays on the sequential master path.
pub(super) fn evaluate_population(
    problem: &Problem<'_>,
    config: &OptimizationConfig,
    population: &mut [Individual],
) {
    let kerf = config.cutting_width;
    if population.len() >= PARALLEL_THRESHOLD {
        population.par_iter_mut().for_each(|individual| {
            if individual.fitness.is_none() {
                individual.fitness = Some(ga_fitness(problem, &individual.genes, kerf));
            }
        });
    } else {
        for individual in population {
            if individual.fitness.is_none() {
                individual.fitness = Some(ga_fitness(problem, &individual.genes, kerf));
            }
        }
    }
}

/// Best individual that passes the fast feasibility check, by
/// (placed count, fitness).
fn best_feasible(
    problem: &Problem<'_>,
    config: &OptimizationConfig,
    population: &[Individual],
) -> Option<Individual> {
    population
        .iter()
        .filter(|ind| {
            !ind.genes.is_empty() && feasible_fast(problem, &ind.genes, config.cutting_width)
        })
        .max_by(|a, b| {
            (a.genes.len(), a.fitness_value())
                .partial_cmp(&(b.genes.len(), b.fitness_value()))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .cloned()
}

/// Diverse initial population: one third greedy, one third semi-random,
/// one third fully random.
pub(super) fn initial_population(
    problem: &Problem<'_>,
    config: &OptimizationConfig,
    size: usize,
    rng: &mut StdRng,
) -> Vec<Individual> {
    let mut population = Vec::with_capacity(size);
    let greedy_count = (size / 3).max(1);
    let semi_count = (size / 3).max(1);

    // Greedy seeds: the first follows the priority order, the rest work on
    // shuffled piece orders for diversity.
    let base_order = problem.processing_order(config.prioritize_orders);
    for i in 0..greedy_count.min(size) {
        let order = if i == 0 {
            base_order.clone()
        } else {
            let mut shuffled = base_order.clone();
            shuffled.shuffle(rng);
            shuffled
        };
        let layout = best_fit_layout(problem, config, &order);
        population.push(Individual::new(layout.placements));
    }

    while population.len() < (greedy_count + semi_count).min(size) {
        population.push(semi_random_individual(problem, config, rng));
    }
    while population.len() < size {
        population.push(random_individual(problem, config, rng));
    }
    population
}

/// Semi-random construction: shuffled piece order, greedy bottom-left
/// position on a random compatible stock, random feasible fallback.
fn semi_random_individual(
    problem: &Problem<'_>,
    config: &OptimizationConfig,
    rng: &mut StdRng,
) -> Individual {
    let mut order: Vec<usize> = (0..problem.pieces.len()).collect();
    order.shuffle(rng);

    let mut occupancies = occupancies_for(problem);
    let mut genes = Vec::with_capacity(order.len());

    for piece_index in order {
        let piece = &problem.pieces[piece_index];
        let compatible = problem.compatible_stocks(piece_index);
        if compatible.is_empty() {
            continue;
        }
        let &stock_index = compatible.choose(rng).expect("non-empty");
        let placed = occupancies[stock_index]
            .best_bottom_left(piece.shape, config.allow_rotation, config.cutting_width)
            .or_else(|| {
                random_feasible_position(
                    problem,
                    &occupancies,
                    piece_index,
                    stock_index,
                    config,
                    rng,
                )
            });
        if let Some((x, y, rotation)) = placed {
            occupancies[stock_index]
                .place(crate::geom::Footprint::new(piece.shape, x, y, rotation));
            genes.push(Placement {
                piece: piece_index,
                stock: stock_index,
                x,
                y,
                rotation,
            });
        }
    }
    Individual::new(genes)
}

/// Fully random construction: shuffled order, random compatible stock,
/// random feasible position.
fn random_individual(
    problem: &Problem<'_>,
    config: &OptimizationConfig,
    rng: &mut StdRng,
) -> Individual {
    let mut order: Vec<usize> = (0..problem.pieces.len()).collect();
    order.shuffle(rng);

    let mut occupancies = occupancies_for(problem);
    let mut genes = Vec::with_capacity(order.len());

    for piece_index in order {
        let piece = &problem.pieces[piece_index];
        let compatible = problem.compatible_stocks(piece_index);
        if compatible.is_empty() {
            continue;
        }
        let &stock_index = compatible.choose(rng).expect("non-empty");
        if let Some((x, y, rotation)) =
            random_feasible_position(problem, &occupancies, piece_index, stock_index, config, rng)
        {
            occupancies[stock_index]
                .place(crate::geom::Footprint::new(piece.shape, x, y, rotation));
            genes.push(Placement {
                piece: piece_index,
                stock: stock_index,
                x,
                y,
                rotation,
            });
        }
    }
    Individual::new(genes)
}

/// Draws random in-bounds positions on one stock until one is feasible.
fn random_feasible_position(
    problem: &Problem<'_>,
    occupancies: &[crate::placement::Occupancy],
    piece_index: usize,
    stock_index: usize,
    config: &OptimizationConfig,
    rng: &mut StdRng,
) -> Option<(f64, f64, crate::geom::Rotation)> {
    let piece = &problem.pieces[piece_index];
    let stock = &problem.stocks[stock_index];
    let rotations = rotations_for(piece.shape, config.allow_rotation);

    for _ in 0..RANDOM_PLACEMENT_ATTEMPTS {
        let &rotation = rotations.as_slice().choose(rng).expect("non-empty");
        let (w, h) = piece.shape.oriented_dims(rotation);
        if w > stock.width || h > stock.height {
            continue;
        }
        let x = rng.gen_range(0.0..=stock.width - w);
        let y = rng.gen_range(0.0..=stock.height - h);
        if occupancies[stock_index].is_feasible(piece.shape, x, y, rotation, config.cutting_width)
        {
            return Some((x, y, rotation));
        }
    }
    None
}

/// Builds the next generation: elites unchanged, the rest bred by
/// tournament selection, single-point crossover, and mutation.
fn next_generation(
    problem: &Problem<'_>,
    config: &OptimizationConfig,
    scaled: ScaledGeneticParams,
    mut population: Vec<Individual>,
    rng: &mut StdRng,
) -> Vec<Individual> {
    population.sort_by(|a, b| {
        b.fitness_value()
            .partial_cmp(&a.fitness_value())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut next = Vec::with_capacity(scaled.population);
    for elite in population.iter().take(scaled.elite) {
        next.push(elite.clone());
    }

    while next.len() < scaled.population {
        let parent_a = tournament(&population, config.genetic.tournament_size, rng);
        let parent_b = tournament(&population, config.genetic.tournament_size, rng);

        let mut child = if rng.gen_bool(config.genetic.crossover_rate) {
            crossover(problem, parent_a, parent_b, rng)
        } else {
            parent_a.clone()
        };

        if rng.gen_bool(config.genetic.mutation_rate) {
            mutate(problem, config, &mut child, rng);
        }
        next.push(child);
    }
    next
}

/// Tournament selection with replacement.
fn tournament<'p>(
    population: &'p [Individual],
    size: usize,
    rng: &mut StdRng,
) -> &'p Individual {
    let mut best: Option<&Individual> = None;
    for _ in 0..size.max(1) {
        let contender = &population[rng.gen_range(0..population.len())];
        let better = match best {
            None => true,
            Some(current) => contender.fitness_value() > current.fitness_value(),
        };
        if better {
            best = Some(contender);
        }
    }
    best.expect("tournament ran at least once")
}

/// Single-point crossover with duplicate repair: each piece keeps its
/// first gene, so no chromosome ever places a piece twice.
fn crossover(
    problem: &Problem<'_>,
    parent_a: &Individual,
    parent_b: &Individual,
    rng: &mut StdRng,
) -> Individual {
    if parent_a.genes.is_empty() || parent_b.genes.is_empty() {
        return parent_a.clone();
    }
    let shortest = parent_a.genes.len().min(parent_b.genes.len());
    if shortest < 2 {
        return parent_a.clone();
    }
    let point = rng.gen_range(1..shortest);

    let mut seen = vec![false; problem.pieces.len()];
    let mut genes = Vec::with_capacity(parent_a.genes.len().max(parent_b.genes.len()));
    for gene in parent_a.genes[..point]
        .iter()
        .chain(parent_b.genes[point..].iter())
    {
        if !seen[gene.piece] {
            seen[gene.piece] = true;
            genes.push(*gene);
        }
    }
    Individual::new(genes)
}

/// Mutates genes in place: reposition on the same stock, reassign to
/// another compatible stock, or toggle rotation.
fn mutate(
    problem: &Problem<'_>,
    config: &OptimizationConfig,
    individual: &mut Individual,
    rng: &mut StdRng,
) {
    individual.fitness = None;
    for gene_index in 0..individual.genes.len() {
        if !rng.gen_bool(GENE_MUTATION_RATE) {
            continue;
        }
        let gene = individual.genes[gene_index];
        let piece = &problem.pieces[gene.piece];

        match rng.gen_range(0..3u8) {
            // Reposition within the current stock's feasible rectangle.
            0 => {
                let stock = &problem.stocks[gene.stock];
                let (w, h) = piece.shape.oriented_dims(gene.rotation);
                if w <= stock.width && h <= stock.height {
                    let gene = &mut individual.genes[gene_index];
                    gene.x = rng.gen_range(0.0..=stock.width - w);
                    gene.y = rng.gen_range(0.0..=stock.height - h);
                }
            }
            // Reassign to another compatible stock.
            1 => {
                let compatible = problem.compatible_stocks(gene.piece);
                if let Some(&stock_index) = compatible.as_slice().choose(rng) {
                    let stock = &problem.stocks[stock_index];
                    let (w, h) = piece.shape.oriented_dims(gene.rotation);
                    if w <= stock.width && h <= stock.height {
                        let gene = &mut individual.genes[gene_index];
                        gene.stock = stock_index;
                        gene.x = rng.gen_range(0.0..=stock.width - w);
                        gene.y = rng.gen_range(0.0..=stock.height - h);
                    }
                }
            }
            // Toggle rotation when it changes anything.
            _ => {
                if config.allow_rotation && piece.shape.rotation_matters() {
                    let stock = &problem.stocks[gene.stock];
                    let rotated = gene.rotation.quarter_turned();
                    let (w, h) = piece.shape.oriented_dims(rotated);
                    if gene.x + w <= stock.width && gene.y + h <= stock.height {
                        individual.genes[gene_index].rotation = rotated;
                    }
                }
            }
        }
    }
}
