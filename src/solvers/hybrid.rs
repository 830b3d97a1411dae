//! Hybrid genetic algorithm: parallel islands with specialized seeding,
//! periodic tabu-search refinement of the elites, and a per-call pattern
//! memory that biases later seeding toward layouts that worked.
//!
//! Chromosomes are multi-level: placement genes, an explicit
//! cutting-sequence permutation, a rotation vector, and a provenance
//! pattern tag per gene. Each island evolves independently on its own
//! seeded RNG; islands exchange their best individuals over a ring every
//! few generations. Shared state (pattern memory, global best) is read
//! during the parallel phase and merged sequentially between generations,
//! so runs are reproducible for a fixed master seed.

use crate::config::OptimizationConfig;
use crate::evaluate::{feasible_fast, ga_fitness, metrics};
use crate::geom::Rotation;
use crate::solvers::genetic::{initial_population, scale_parameters};
use crate::solvers::greedy::best_fit_layout;
use crate::solvers::{Deadline, Layout, Placement, Problem, Solver};
use fnv::FnvHashMap;
use rand::prelude::*;
use rand::rngs::StdRng;
use rayon::prelude::*;
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::{debug, trace};

/// Individuals copied to the neighbouring island at each migration.
const MIGRANTS: usize = 2;

/// Fitness above which a layout's pattern is recorded.
const PATTERN_RECORD_THRESHOLD: f64 = 0.8;

/// Mixing constant for deriving per-island RNG seeds from the master seed.
const ISLAND_SEED_MIX: u64 = 0x9e37_79b9_7f4a_7c15;

/// The hybrid genetic + tabu solver.
pub(crate) struct HybridGenetic;

/// What an island optimizes for; decides how its population is seeded and
/// which tag its genes carry.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum PatternTag {
    /// Greedy best-fit seeds, largest pieces first.
    Efficiency,
    /// Fully shuffled random seeds.
    Diversity,
    /// Mixed greedy/random seeds, built for speed.
    Greedy,
    /// Seeds biased toward remembered high-efficiency patterns.
    Quality,
}

const SPECIALIZATIONS: [PatternTag; 4] = [
    PatternTag::Efficiency,
    PatternTag::Diversity,
    PatternTag::Greedy,
    PatternTag::Quality,
];

/// Multi-level chromosome: genes carry positions; the sequence permutation
/// fixes the cutting order; the rotation vector mirrors the genes'
/// rotations; pattern tags record which seeding strategy produced each
/// gene.
#[derive(Clone, Debug)]
struct HybridIndividual {
    genes: Vec<Placement>,
    sequence: Vec<usize>,
    rotations: Vec<Rotation>,
    patterns: Vec<PatternTag>,
    fitness: Option<f64>,
}

impl HybridIndividual {
    fn from_genes(genes: Vec<Placement>, tag: PatternTag) -> HybridIndividual {
        let sequence = (0..genes.len()).collect();
        let rotations = genes.iter().map(|g| g.rotation).collect();
        let patterns = vec![tag; genes.len()];
        HybridIndividual {
            genes,
            sequence,
            rotations,
            patterns,
            fitness: None,
        }
    }

    fn fitness_value(&self) -> f64 {
        self.fitness.unwrap_or(0.0)
    }

    /// Restores the derived vectors after gene edits.
    fn resync(&mut self) {
        if self.sequence.len() != self.genes.len() {
            self.sequence = (0..self.genes.len()).collect();
        }
        self.rotations = self.genes.iter().map(|g| g.rotation).collect();
        self.patterns.resize(self.genes.len(), PatternTag::Greedy);
        self.fitness = None;
    }

    /// Genes in cutting order, following the sequence permutation.
    fn ordered_genes(&self) -> Vec<Placement> {
        self.sequence.iter().map(|&i| self.genes[i]).collect()
    }
}

/// Signature of a layout's shape: how many pieces each used stock holds,
/// as a descending count vector.
fn pattern_signature(genes: &[Placement]) -> Vec<u32> {
    let mut per_stock: FnvHashMap<usize, u32> = FnvHashMap::default();
    for gene in genes {
        *per_stock.entry(gene.stock).or_insert(0) += 1;
    }
    let mut counts: Vec<u32> = per_stock.values().copied().collect();
    counts.sort_unstable_by(|a, b| b.cmp(a));
    counts
}

/// Remembered efficiencies of layout patterns, per optimization call.
#[derive(Debug, Default)]
struct PatternMemory {
    records: FnvHashMap<Vec<u32>, (f64, u32)>,
}

impl PatternMemory {
    fn record(&mut self, signature: Vec<u32>, efficiency: f64) {
        let entry = self.records.entry(signature).or_insert((0.0, 0));
        entry.0 += efficiency;
        entry.1 += 1;
    }

    /// The stock count of the pattern with the best average efficiency.
    fn preferred_stock_count(&self) -> Option<usize> {
        self.records
            .iter()
            .map(|(signature, &(sum, count))| (signature.len(), sum / f64::from(count)))
            .max_by(|a, b| {
                a.1.partial_cmp(&b.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(b.0.cmp(&a.0))
            })
            .map(|(stocks, _)| stocks)
    }
}

struct Island {
    individuals: Vec<HybridIndividual>,
    tag: PatternTag,
    rng: StdRng,
    /// Pattern observations made this generation, merged after the
    /// parallel phase.
    pattern_outbox: Vec<(Vec<u32>, f64)>,
}

impl Solver for HybridGenetic {
    fn name(&self) -> &'static str {
        "hybrid_genetic"
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

        let complexity = problem.complexity();
        let island_count = if config.hybrid.islands > 0 {
            config.hybrid.islands.min(SPECIALIZATIONS.len())
        } else if complexity <= 100 {
            2
        } else if complexity <= 500 {
            3
        } else {
            4
        };
        let per_island = if config.hybrid.population_per_island > 0 {
            config.hybrid.population_per_island
        } else if complexity <= 100 {
            15
        } else if complexity <= 500 {
            25
        } else {
            35
        };
        let scaled = scale_parameters(complexity, &config.genetic);

        debug!(
            islands = island_count,
            per_island,
            generations = scaled.generations,
            "hybrid islands initialized"
        );

        let master_seed: u64 = rng.gen();
        let pattern_memory = Mutex::new(PatternMemory::default());

        let mut islands: Vec<Island> = (0..island_count)
            .map(|index| {
                let mut island_rng = StdRng::seed_from_u64(
                    master_seed ^ (index as u64).wrapping_mul(ISLAND_SEED_MIX),
                );
                let tag = SPECIALIZATIONS[index % SPECIALIZATIONS.len()];
                let mut individuals = seed_island(
                    problem,
                    config,
                    tag,
                    per_island,
                    &pattern_memory,
                    &mut island_rng,
                );
                evaluate_island(problem, config, &mut individuals);
                Island {
                    individuals,
                    tag,
                    rng: island_rng,
                    pattern_outbox: Vec::new(),
                }
            })
            .collect();

        let mut global_best: Option<HybridIndividual> = None;
        let mut global_best_fitness = 0.0_f64;
        let mut stagnant = 0usize;
        let mut generations_run = 0usize;
        let mut early_terminated = false;

        for generation in 0..scaled.generations {
            if deadline.expired() {
                early_terminated = true;
                break;
            }
            generations_run = generation + 1;

            let refine = generation > 0 && generation % config.hybrid.local_search_interval == 0;
            let aspiration = global_best_fitness;

            // Parallel phase: each island evolves on its own RNG. Shared
            // state is only read here; writes are merged below.
            islands.par_iter_mut().for_each(|island| {
                island_generation(problem, config, scaled.elite, island);
                if refine {
                    refine_elites(problem, config, island, aspiration);
                }
            });

            // Sequential merge, in island order, so results do not depend
            // on thread scheduling.
            {
                let mut memory = pattern_memory.lock().expect("pattern memory poisoned");
                for island in islands.iter_mut() {
                    for (signature, efficiency) in island.pattern_outbox.drain(..) {
                        memory.record(signature, efficiency);
                    }
                }
            }

            let mut improved = false;
            for island in islands.iter() {
                if let Some(best) = island_best(problem, config, island) {
                    let fitness = best.fitness_value();
                    let placed = best.genes.len();
                    let best_placed = global_best.as_ref().map(|b| b.genes.len()).unwrap_or(0);
                    if placed > best_placed
                        || (placed == best_placed && fitness > global_best_fitness + 1e-6)
                    {
                        global_best_fitness = fitness;
                        global_best = Some(best);
                        improved = true;
                    }
                }
            }
            if improved {
                stagnant = 0;
            } else {
                stagnant += 1;
            }

            if generation > 0 && generation % config.hybrid.migration_interval == 0 {
                migrate(&mut islands);

                // Feed learned structure back into the search: the quality
                // island's stragglers are reseeded from the best pattern
                // recorded so far.
                let preferred = pattern_memory
                    .lock()
                    .expect("pattern memory poisoned")
                    .preferred_stock_count();
                for island in islands
                    .iter_mut()
                    .filter(|island| island.tag == PatternTag::Quality)
                {
                    sort_by_fitness(&mut island.individuals);
                    let len = island.individuals.len();
                    for slot in len.saturating_sub(2)..len {
                        island.individuals[slot] =
                            pattern_guided_individual(problem, config, preferred, &mut island.rng);
                    }
                    evaluate_island(problem, config, &mut island.individuals);
                }
            }

            trace!(generation, global_best_fitness, "hybrid generation done");

            if stagnant > config.genetic.early_stop_patience {
                debug!(generation, "early stop: global best stagnated");
                break;
            }
        }

        let mut layout = match global_best {
            Some(individual) => {
                // Emit placements in cutting order.
                layout_from_ordered(problem, individual.ordered_genes())
            }
            None => best_fit_layout(problem, config, &problem.processing_order(true)),
        };
        layout.early_terminated = early_terminated;
        layout.generations_run = Some(generations_run);
        layout
    }
}

fn layout_from_ordered(problem: &Problem<'_>, genes: Vec<Placement>) -> Layout {
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

fn evaluate_island(
    problem: &Problem<'_>,
    config: &OptimizationConfig,
    individuals: &mut [HybridIndividual],
) {
    for individual in individuals {
        if individual.fitness.is_none() {
            individual.fitness = Some(ga_fitness(
                problem,
                &individual.genes,
                config.cutting_width,
            ));
        }
    }
}

/// Seeds one island according to its specialization.
fn seed_island(
    problem: &Problem<'_>,
    config: &OptimizationConfig,
    tag: PatternTag,
    size: usize,
    pattern_memory: &Mutex<PatternMemory>,
    rng: &mut StdRng,
) -> Vec<HybridIndividual> {
    match tag {
        PatternTag::Efficiency => {
            // Best-fit over area-descending order, plus shuffled variants.
            let mut individuals = Vec::with_capacity(size);
            let order = problem.processing_order(true);
            individuals.push(HybridIndividual::from_genes(
                best_fit_layout(problem, config, &order).placements,
                tag,
            ));
            while individuals.len() < size {
                let mut shuffled = order.clone();
                shuffled.shuffle(rng);
                individuals.push(HybridIndividual::from_genes(
                    best_fit_layout(problem, config, &shuffled).placements,
                    tag,
                ));
            }
            individuals
        }
        PatternTag::Diversity | PatternTag::Greedy => {
            initial_population(problem, config, size, rng)
                .into_iter()
                .map(|individual| HybridIndividual::from_genes(individual.genes, tag))
                .collect()
        }
        PatternTag::Quality => {
            let preferred = pattern_memory
                .lock()
                .expect("pattern memory poisoned")
                .preferred_stock_count();
            let mut individuals = Vec::with_capacity(size);
            while individuals.len() < size {
                individuals.push(pattern_guided_individual(problem, config, preferred, rng));
            }
            individuals
        }
    }
}

/// Builds an individual biased toward a remembered stock count: greedy
/// best-fit, then trimmed to the fullest stocks when a pattern says fewer
/// sheets suffice. Evolution reinserts the trimmed pieces.
fn pattern_guided_individual(
    problem: &Problem<'_>,
    config: &OptimizationConfig,
    preferred_stock_count: Option<usize>,
    rng: &mut StdRng,
) -> HybridIndividual {
    let mut order = problem.processing_order(true);
    order.shuffle(rng);
    let layout = best_fit_layout(problem, config, &order);

    let genes = match preferred_stock_count {
        Some(limit) if limit > 0 => {
            let mut per_stock: FnvHashMap<usize, u32> = FnvHashMap::default();
            for gene in &layout.placements {
                *per_stock.entry(gene.stock).or_insert(0) += 1;
            }
            let mut stocks: Vec<(usize, u32)> = per_stock.into_iter().collect();
            stocks.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
            let keep: Vec<usize> = stocks.iter().take(limit).map(|&(s, _)| s).collect();
            layout
                .placements
                .into_iter()
                .filter(|gene| keep.contains(&gene.stock))
                .collect()
        }
        _ => layout.placements,
    };
    HybridIndividual::from_genes(genes, PatternTag::Quality)
}

/// One generation of one island: elitism, tournament selection, crossover,
/// mutation, then pattern recording for the strong individuals.
fn island_generation(
    problem: &Problem<'_>,
    config: &OptimizationConfig,
    elite: usize,
    island: &mut Island,
) {
    let size = island.individuals.len();
    sort_by_fitness(&mut island.individuals);

    let mut next: Vec<HybridIndividual> =
        island.individuals.iter().take(elite).cloned().collect();
    while next.len() < size {
        let a = tournament(&island.individuals, config.genetic.tournament_size, &mut island.rng);
        let b = tournament(&island.individuals, config.genetic.tournament_size, &mut island.rng);
        let mut child = if island.rng.gen_bool(config.genetic.crossover_rate) {
            crossover(problem, a, b, &mut island.rng)
        } else {
            a.clone()
        };
        if island.rng.gen_bool(config.genetic.mutation_rate) {
            mutate(problem, config, &mut child, &mut island.rng);
        }
        next.push(child);
    }
    island.individuals = next;
    evaluate_island(problem, config, &mut island.individuals);

    // Remember the shape of strong layouts for quality seeding.
    for individual in &island.individuals {
        if individual.fitness_value() > PATTERN_RECORD_THRESHOLD {
            let m = metrics(problem, &individual.genes);
            island
                .pattern_outbox
                .push((pattern_signature(&individual.genes), m.efficiency / 100.0));
        }
    }
    trace!(
        specialization = ?island.tag,
        recorded = island.pattern_outbox.len(),
        "island generation evolved"
    );
}

fn sort_by_fitness(individuals: &mut [HybridIndividual]) {
    individuals.sort_by(|a, b| {
        b.fitness_value()
            .partial_cmp(&a.fitness_value())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

fn tournament<'p>(
    population: &'p [HybridIndividual],
    size: usize,
    rng: &mut StdRng,
) -> &'p HybridIndividual {
    let mut best: Option<&HybridIndividual> = None;
    for _ in 0..size.max(1) {
        let contender = &population[rng.gen_range(0..population.len())];
        if best
            .map(|b| contender.fitness_value() > b.fitness_value())
            .unwrap_or(true)
        {
            best = Some(contender);
        }
    }
    best.expect("tournament ran at least once")
}

/// Single-point crossover over genes with duplicate repair; the child's
/// pattern tags follow the contributing parent and its sequence resets to
/// identity.
fn crossover(
    problem: &Problem<'_>,
    parent_a: &HybridIndividual,
    parent_b: &HybridIndividual,
    rng: &mut StdRng,
) -> HybridIndividual {
    let shortest = parent_a.genes.len().min(parent_b.genes.len());
    if shortest < 2 {
        return parent_a.clone();
    }
    let point = rng.gen_range(1..shortest);

    let mut seen = vec![false; problem.pieces.len()];
    let mut genes = Vec::with_capacity(parent_a.genes.len().max(parent_b.genes.len()));
    let mut patterns = Vec::with_capacity(genes.capacity());
    let contributions = parent_a.genes[..point]
        .iter()
        .zip(parent_a.patterns[..point].iter())
        .chain(parent_b.genes[point..].iter().zip(parent_b.patterns[point..].iter()));
    for (gene, &tag) in contributions {
        if !seen[gene.piece] {
            seen[gene.piece] = true;
            genes.push(*gene);
            patterns.push(tag);
        }
    }

    let mut child = HybridIndividual::from_genes(genes, PatternTag::Greedy);
    child.patterns = patterns;
    child
}

/// Mutates genes (reposition, reassign, rotate) and occasionally the
/// cutting sequence; the rotation vector is resynced afterwards.
fn mutate(
    problem: &Problem<'_>,
    config: &OptimizationConfig,
    individual: &mut HybridIndividual,
    rng: &mut StdRng,
) {
    for index in 0..individual.genes.len() {
        if !rng.gen_bool(0.1) {
            continue;
        }
        let gene = individual.genes[index];
        let piece = &problem.pieces[gene.piece];
        match rng.gen_range(0..3u8) {
            0 => {
                let stock = &problem.stocks[gene.stock];
                let (w, h) = piece.shape.oriented_dims(gene.rotation);
                if w <= stock.width && h <= stock.height {
                    let gene = &mut individual.genes[index];
                    gene.x = rng.gen_range(0.0..=stock.width - w);
                    gene.y = rng.gen_range(0.0..=stock.height - h);
                }
            }
            1 => {
                let compatible = problem.compatible_stocks(gene.piece);
                if let Some(&stock_index) = compatible.as_slice().choose(rng) {
                    let stock = &problem.stocks[stock_index];
                    let (w, h) = piece.shape.oriented_dims(gene.rotation);
                    if w <= stock.width && h <= stock.height {
                        let gene = &mut individual.genes[index];
                        gene.stock = stock_index;
                        gene.x = rng.gen_range(0.0..=stock.width - w);
                        gene.y = rng.gen_range(0.0..=stock.height - h);
                    }
                }
            }
            _ => {
                if config.allow_rotation && piece.shape.rotation_matters() {
                    let stock = &problem.stocks[gene.stock];
                    let rotated = gene.rotation.quarter_turned();
                    let (w, h) = piece.shape.oriented_dims(rotated);
                    if gene.x + w <= stock.width && gene.y + h <= stock.height {
                        individual.genes[index].rotation = rotated;
                    }
                }
            }
        }
    }

    // Occasionally reorder the cutting sequence; fitness is unaffected but
    // downstream consumers see a different cut order.
    if individual.sequence.len() >= 2 && rng.gen_bool(0.2) {
        let a = rng.gen_range(0..individual.sequence.len());
        let b = rng.gen_range(0..individual.sequence.len());
        individual.sequence.swap(a, b);
    }

    individual.resync();
}

/// Best fast-feasible individual of an island.
fn island_best(
    problem: &Problem<'_>,
    config: &OptimizationConfig,
    island: &Island,
) -> Option<HybridIndividual> {
    island
        .individuals
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

/// Ring migration: each island sends copies of its best individuals to the
/// next island, where they replace the worst.
fn migrate(islands: &mut [Island]) {
    if islands.len() < 2 {
        return;
    }
    let migrants: Vec<Vec<HybridIndividual>> = islands
        .iter_mut()
        .map(|island| {
            sort_by_fitness(&mut island.individuals);
            island.individuals.iter().take(MIGRANTS).cloned().collect()
        })
        .collect();

    let count = islands.len();
    for (source, migrant_group) in migrants.into_iter().enumerate() {
        let target = (source + 1) % count;
        let island = &mut islands[target];
        sort_by_fitness(&mut island.individuals);
        let len = island.individuals.len();
        for (offset, migrant) in migrant_group.into_iter().enumerate() {
            if offset < len {
                island.individuals[len - 1 - offset] = migrant;
            }
        }
    }
}

/// A tabu move signature: operation kind, gene index, and the coordinates
/// left behind, discretized so floating error cannot split signatures.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct MoveSignature {
    kind: u8,
    gene: usize,
    from: (i64, i64),
}

fn signature(kind: u8, gene: usize, x: f64, y: f64) -> MoveSignature {
    MoveSignature {
        kind,
        gene,
        from: ((x * 1000.0) as i64, (y * 1000.0) as i64),
    }
}

/// Short tabu-search trajectory applied to an island's elites.
fn refine_elites(
    problem: &Problem<'_>,
    config: &OptimizationConfig,
    island: &mut Island,
    aspiration: f64,
) {
    sort_by_fitness(&mut island.individuals);
    let elites = island.individuals.len().min(2);
    for index in 0..elites {
        let refined = tabu_search(problem, config, &island.individuals[index], aspiration);
        if refined.fitness_value() > island.individuals[index].fitness_value() {
            island.individuals[index] = refined;
        }
    }
}

/// Best-improvement trajectory over a move/swap/rotate neighbourhood with
/// a FIFO tabu list; tabu moves break only when they beat the aspiration
/// fitness (the global best at the start of the generation).
fn tabu_search(
    problem: &Problem<'_>,
    config: &OptimizationConfig,
    start: &HybridIndividual,
    aspiration: f64,
) -> HybridIndividual {
    let kerf = config.cutting_width;
    let mut current = start.clone();
    let mut best = current.clone();
    let mut best_fitness = ga_fitness(problem, &current.genes, kerf);

    let mut tabu: VecDeque<MoveSignature> = VecDeque::with_capacity(config.hybrid.tabu_tenure);

    for _ in 0..config.hybrid.tabu_iterations {
        let neighbours = neighbourhood(problem, config, &current);
        if neighbours.is_empty() {
            break;
        }

        let mut chosen: Option<(HybridIndividual, f64, MoveSignature)> = None;
        for (candidate, move_signature) in neighbours {
            let fitness = ga_fitness(problem, &candidate.genes, kerf);
            let is_tabu = tabu.contains(&move_signature);
            if is_tabu && fitness <= aspiration.max(best_fitness) {
                continue;
            }
            if chosen.as_ref().map(|&(_, f, _)| fitness > f).unwrap_or(true) {
                chosen = Some((candidate, fitness, move_signature));
            }
        }

        let (mut candidate, fitness, move_signature) = match chosen {
            Some(step) => step,
            None => break,
        };
        candidate.fitness = Some(fitness);

        tabu.push_back(move_signature);
        while tabu.len() > config.hybrid.tabu_tenure {
            tabu.pop_front();
        }

        if fitness > best_fitness {
            best_fitness = fitness;
            best = candidate.clone();
        }
        current = candidate;
    }

    best.fitness = Some(best_fitness);
    best
}

/// Deterministic move/swap/rotate neighbourhood of an individual.
fn neighbourhood(
    problem: &Problem<'_>,
    config: &OptimizationConfig,
    individual: &HybridIndividual,
) -> Vec<(HybridIndividual, MoveSignature)> {
    let mut neighbours = Vec::new();
    let genes = &individual.genes;

    // Nudge the first few genes around their current position.
    for index in 0..genes.len().min(5) {
        let gene = genes[index];
        let stock = &problem.stocks[gene.stock];
        let piece = &problem.pieces[gene.piece];
        let (w, h) = piece.shape.oriented_dims(gene.rotation);
        for (dx, dy) in [(-20.0, 0.0), (20.0, 0.0), (0.0, -20.0), (0.0, 20.0)] {
            let x = (gene.x + dx).max(0.0);
            let y = (gene.y + dy).max(0.0);
            if x + w > stock.width || y + h > stock.height {
                continue;
            }
            let mut candidate = individual.clone();
            candidate.genes[index].x = x;
            candidate.genes[index].y = y;
            candidate.resync();
            neighbours.push((candidate, signature(0, index, gene.x, gene.y)));
        }
    }

    // Swap the placements of adjacent genes.
    for index in 0..genes.len().saturating_sub(1).min(3) {
        let mut candidate = individual.clone();
        let (a, b) = (candidate.genes[index], candidate.genes[index + 1]);
        candidate.genes[index] = Placement {
            piece: a.piece,
            stock: b.stock,
            x: b.x,
            y: b.y,
            rotation: b.rotation,
        };
        candidate.genes[index + 1] = Placement {
            piece: b.piece,
            stock: a.stock,
            x: a.x,
            y: a.y,
            rotation: a.rotation,
        };
        candidate.resync();
        neighbours.push((candidate, signature(1, index, a.x, a.y)));
    }

    // Toggle rotations, reading the chromosome's explicit rotation vector.
    if config.allow_rotation {
        for index in 0..genes.len().min(3) {
            let gene = genes[index];
            if !problem.pieces[gene.piece].shape.rotation_matters() {
                continue;
            }
            let mut candidate = individual.clone();
            candidate.genes[index].rotation = individual.rotations[index].quarter_turned();
            candidate.resync();
            neighbours.push((candidate, signature(2, index, gene.x, gene.y)));
        }
    }

    neighbours
}
