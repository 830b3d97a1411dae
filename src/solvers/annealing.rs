//! Simulated annealing over complete assignments with an auto-scaled
//! geometric cooling schedule.
//!
//! The state is a piece sequence plus the layout greedily built from it.
//! Neighbour moves perturb either the layout directly (relocate, swap,
//! rotate) or the sequence (reorder, which triggers a greedy rebuild and
//! can recover previously unplaced pieces).

use crate::config::{AnnealingParams, OptimizationConfig};
use crate::evaluate::sa_cost;
use crate::geom::Footprint;
use crate::solvers::greedy::{bottom_left_layout, occupancies_for};
use crate::solvers::{Deadline, Layout, Placement, Problem, Solver};
use rand::distributions::{Distribution, Standard};
use rand::prelude::*;
use rand::rngs::StdRng;
use tracing::{debug, trace};

/// The simulated-annealing solver.
pub(crate) struct Annealing;

/// Cooling schedule resolved for one run.
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) struct Schedule {
    pub initial_temperature: f64,
    pub min_temperature: f64,
    pub max_iterations: usize,
    pub iterations_per_temperature: usize,
}

/// Derives the schedule from problem complexity `C = stocks × pieces`.
pub(crate) fn scale_schedule(complexity: usize, params: &AnnealingParams) -> Schedule {
    if !params.auto_scale {
        return Schedule {
            initial_temperature: params.initial_temperature,
            min_temperature: params.min_temperature,
            max_iterations: params.max_iterations,
            iterations_per_temperature: params.iterations_per_temperature,
        };
    }

    let c = complexity.max(1);
    if c <= 50 {
        Schedule {
            initial_temperature: 100.0,
            min_temperature: 0.01,
            max_iterations: (c * 10).max(100),
            iterations_per_temperature: (c / 2).max(10),
        }
    } else if c <= 200 {
        Schedule {
            initial_temperature: 500.0,
            min_temperature: 0.05,
            max_iterations: (c * 5).max(300),
            iterations_per_temperature: (c / 5).max(20),
        }
    } else {
        let sqrt_c = (c as f64).sqrt();
        Schedule {
            initial_temperature: 1000.0,
            min_temperature: 0.1,
            max_iterations: ((sqrt_c * 50.0) as usize).max(500),
            iterations_per_temperature: ((sqrt_c * 5.0) as usize).max(30),
        }
    }
}

/// Neighbour move kinds, sampled uniformly.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Move {
    Relocate,
    Swap,
    Rotate,
    Reorder,
}

impl Distribution<Move> for Standard {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Move {
        match rng.gen_range(0..4) {
            0 => Move::Relocate,
            1 => Move::Swap,
            2 => Move::Rotate,
            _ => Move::Reorder,
        }
    }
}

/// Mutable annealing state: the sequence the greedy rebuild uses, and the
/// current layout.
#[derive(Clone, Debug)]
struct State {
    sequence: Vec<usize>,
    placements: Vec<Placement>,
    unplaced: Vec<usize>,
}

impl State {
    fn cost(&self, problem: &Problem<'_>) -> f64 {
        sa_cost(problem, &self.placements, self.unplaced.len())
    }
}

impl Solver for Annealing {
    fn name(&self) -> &'static str {
        "simulated_annealing"
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

        let schedule = scale_schedule(problem.complexity(), &config.annealing);
        debug!(
            t0 = schedule.initial_temperature,
            t_min = schedule.min_temperature,
            max_iterations = schedule.max_iterations,
            "annealing schedule scaled"
        );

        let sequence = problem.processing_order(config.prioritize_orders);
        let seed_layout = bottom_left_layout(problem, config, &sequence);
        let mut current = State {
            sequence,
            placements: seed_layout.placements,
            unplaced: seed_layout.unplaced,
        };
        let mut current_cost = current.cost(problem);

        let mut best = current.clone();
        let mut best_cost = current_cost;

        let mut temperature = schedule.initial_temperature;
        let mut iterations = 0usize;
        let mut early_terminated = false;

        while temperature > schedule.min_temperature && iterations < schedule.max_iterations {
            if deadline.expired() {
                early_terminated = true;
                break;
            }

            let mut accepted = 0usize;
            for _ in 0..schedule.iterations_per_temperature {
                if iterations >= schedule.max_iterations {
                    break;
                }
                iterations += 1;

                let mut neighbour = current.clone();
                if !apply_move(problem, config, &mut neighbour, rng) {
                    continue;
                }
                let neighbour_cost = neighbour.cost(problem);

                if accept(current_cost, neighbour_cost, temperature, rng) {
                    current = neighbour;
                    current_cost = neighbour_cost;
                    accepted += 1;
                    if current_cost < best_cost {
                        best = current.clone();
                        best_cost = current_cost;
                    }
                }
            }

            trace!(
                temperature,
                current_cost,
                best_cost,
                accepted,
                "temperature block finished"
            );
            temperature *= config.annealing.cooling_rate;
        }

        Layout {
            placements: best.placements,
            unplaced: best.unplaced,
            early_terminated,
            generations_run: None,
            iterations_run: Some(iterations),
        }
    }
}

/// Metropolis acceptance: improving moves always, worsening moves with
/// probability `exp(−Δ/T)`.
fn accept(current: f64, neighbour: f64, temperature: f64, rng: &mut StdRng) -> bool {
    if neighbour < current {
        return true;
    }
    let delta = neighbour - current;
    rng.gen_bool(((-delta / temperature).exp()).clamp(0.0, 1.0))
}

/// Applies one random move. Returns false when the move could not produce
/// a changed, feasible neighbour.
fn apply_move(
    problem: &Problem<'_>,
    config: &OptimizationConfig,
    state: &mut State,
    rng: &mut StdRng,
) -> bool {
    match rng.gen::<Move>() {
        Move::Relocate => relocate(problem, config, state, rng),
        Move::Swap => swap(problem, config, state, rng),
        Move::Rotate => rotate(problem, config, state, rng),
        Move::Reorder => reorder(problem, config, state, rng),
    }
}

/// Exact clearance check of one placement against every other on the same
/// stock, with half-kerf inflation on both sides.
fn placement_clear(
    problem: &Problem<'_>,
    placements: &[Placement],
    index: usize,
    kerf: f64,
) -> bool {
    let placement = &placements[index];
    let stock = &problem.stocks[placement.stock];
    let fp = Footprint::new(
        problem.pieces[placement.piece].shape,
        placement.x,
        placement.y,
        placement.rotation,
    );
    if !fp.contained_in(stock.width, stock.height) {
        return false;
    }
    let margin = kerf / 2.0;
    let inflated = fp.inflate(margin);
    placements.iter().enumerate().all(|(other_index, other)| {
        if other_index == index || other.stock != placement.stock {
            return true;
        }
        let other_fp = Footprint::new(
            problem.pieces[other.piece].shape,
            other.x,
            other.y,
            other.rotation,
        );
        !other_fp.inflate(margin).overlaps(&inflated)
    })
}

/// Removes one placement and re-inserts its piece at the first feasible
/// bottom-left position on a compatible stock, scanning from a random
/// starting stock. The placement stays put when no stock can take it.
fn relocate(
    problem: &Problem<'_>,
    config: &OptimizationConfig,
    state: &mut State,
    rng: &mut StdRng,
) -> bool {
    if state.placements.is_empty() {
        return false;
    }
    let victim = rng.gen_range(0..state.placements.len());
    let old = state.placements[victim];

    let compatible = problem.compatible_stocks(old.piece);
    if compatible.is_empty() {
        return false;
    }

    // Rebuild every stock's occupancy, then pull the victim back out of
    // its sheet so its old slot is free for re-insertion.
    let mut occupancies = occupancies_for(problem);
    let mut victim_slot = 0usize;
    for (index, placement) in state.placements.iter().enumerate() {
        if placement.stock == old.stock && index < victim {
            victim_slot += 1;
        }
        occupancies[placement.stock].place(Footprint::new(
            problem.pieces[placement.piece].shape,
            placement.x,
            placement.y,
            placement.rotation,
        ));
    }
    let _ = occupancies[old.stock].remove(victim_slot);

    let piece = &problem.pieces[old.piece];
    let offset = rng.gen_range(0..compatible.len());
    for i in 0..compatible.len() {
        let stock_index = compatible[(offset + i) % compatible.len()];
        if let Some((x, y, rotation)) = occupancies[stock_index].best_bottom_left(
            piece.shape,
            config.allow_rotation,
            config.cutting_width,
        ) {
            state.placements[victim] = Placement {
                piece: old.piece,
                stock: stock_index,
                x,
                y,
                rotation,
            };
            return true;
        }
    }
    false
}

/// Exchanges the (stock, position, rotation) of two placements; rejected
/// when either piece ends up infeasible.
fn swap(
    problem: &Problem<'_>,
    config: &OptimizationConfig,
    state: &mut State,
    rng: &mut StdRng,
) -> bool {
    if state.placements.len() < 2 {
        return false;
    }
    let a = rng.gen_range(0..state.placements.len());
    let mut b = rng.gen_range(0..state.placements.len() - 1);
    if b >= a {
        b += 1;
    }

    let (pa, pb) = (state.placements[a], state.placements[b]);
    state.placements[a] = Placement {
        piece: pa.piece,
        stock: pb.stock,
        x: pb.x,
        y: pb.y,
        rotation: pb.rotation,
    };
    state.placements[b] = Placement {
        piece: pb.piece,
        stock: pa.stock,
        x: pa.x,
        y: pa.y,
        rotation: pa.rotation,
    };

    let kerf = config.cutting_width;
    if placement_clear(problem, &state.placements, a, kerf)
        && placement_clear(problem, &state.placements, b, kerf)
    {
        true
    } else {
        state.placements[a] = pa;
        state.placements[b] = pb;
        false
    }
}

/// Toggles the rotation of one rectangular placement; rejected when the
/// rotated piece no longer fits.
fn rotate(
    problem: &Problem<'_>,
    config: &OptimizationConfig,
    state: &mut State,
    rng: &mut StdRng,
) -> bool {
    if !config.allow_rotation {
        return false;
    }
    let rotatable: Vec<usize> = state
        .placements
        .iter()
        .enumerate()
        .filter(|(_, p)| problem.pieces[p.piece].shape.rotation_matters())
        .map(|(i, _)| i)
        .collect();
    let index = match rotatable.as_slice().choose(rng) {
        Some(&index) => index,
        None => return false,
    };

    let previous = state.placements[index].rotation;
    state.placements[index].rotation = previous.quarter_turned();
    if placement_clear(problem, &state.placements, index, config.cutting_width) {
        true
    } else {
        state.placements[index].rotation = previous;
        false
    }
}

/// Swaps two positions of the piece sequence and rebuilds the layout
/// greedily. This is the move that can recover unplaced pieces.
fn reorder(
    problem: &Problem<'_>,
    config: &OptimizationConfig,
    state: &mut State,
    rng: &mut StdRng,
) -> bool {
    if state.sequence.len() < 2 {
        return false;
    }
    let a = rng.gen_range(0..state.sequence.len());
    let mut b = rng.gen_range(0..state.sequence.len() - 1);
    if b >= a {
        b += 1;
    }
    state.sequence.swap(a, b);

    let layout = bottom_left_layout(problem, config, &state.sequence);
    state.placements = layout.placements;
    state.unplaced = layout.unplaced;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluate::feasible_strict;
    use crate::geom::Shape;
    use crate::model::{Material, Order, Priority, Stock};
    use std::time::Duration;

    fn stock(id: &str, w: f64, h: f64) -> Stock {
        Stock::new(id, w, h, 5.0, Material::Metal, 1.0).unwrap()
    }

    fn rect_order(id: &str, w: f64, h: f64, quantity: u32) -> Order {
        Order::new(
            id,
            Shape::rect(w, h).unwrap(),
            quantity,
            Priority::Medium,
            Material::Metal,
            5.0,
            0.0,
        )
        .unwrap()
    }

    fn config() -> OptimizationConfig {
        OptimizationConfig::default()
    }

    #[test]
    fn schedule_scales_with_complexity() {
        let params = AnnealingParams::default();

        let small = scale_schedule(40, &params);
        assert_eq!(small.initial_temperature, 100.0);
        assert!(small.max_iterations >= 400);
        assert!(small.iterations_per_temperature >= 20);

        let medium = scale_schedule(100, &params);
        assert_eq!(medium.initial_temperature, 500.0);
        assert!(medium.max_iterations >= 500);

        let large = scale_schedule(400, &params);
        assert_eq!(large.initial_temperature, 1000.0);
        assert!(large.max_iterations >= 1000);
        assert!(large.iterations_per_temperature >= 100);
    }

    #[test]
    fn explicit_schedule_bypasses_scaling() {
        let params = AnnealingParams {
            auto_scale: false,
            initial_temperature: 77.0,
            min_temperature: 0.5,
            max_iterations: 123,
            iterations_per_temperature: 9,
            ..AnnealingParams::default()
        };
        let schedule = scale_schedule(100_000, &params);
        assert_eq!(schedule.initial_temperature, 77.0);
        assert_eq!(schedule.max_iterations, 123);
    }

    #[test]
    fn solves_and_keeps_strict_feasibility() {
        let stocks = vec![stock("s1", 1000.0, 1000.0)];
        let orders = vec![rect_order("o1", 500.0, 500.0, 4)];
        let problem = Problem::expand(&stocks, &orders);
        let deadline = Deadline::starting_now(Duration::from_secs(30));
        let mut rng = StdRng::seed_from_u64(11);

        let layout = Annealing.solve(&problem, &config(), &deadline, &mut rng);
        assert_eq!(layout.placements.len(), 4);
        assert!(feasible_strict(&problem, &layout.placements, 0.0));
        assert!(layout.iterations_run.is_some());
    }

    #[test]
    fn swap_rejects_infeasible_exchanges() {
        let stocks = vec![stock("s1", 1000.0, 600.0)];
        let orders = vec![
            rect_order("big", 900.0, 500.0, 1),
            rect_order("small", 100.0, 100.0, 1),
        ];
        let problem = Problem::expand(&stocks, &orders);
        let mut state = State {
            sequence: vec![0, 1],
            placements: vec![
                Placement {
                    piece: 0,
                    stock: 0,
                    x: 0.0,
                    y: 0.0,
                    rotation: crate::geom::Rotation::R0,
                },
                Placement {
                    piece: 1,
                    stock: 0,
                    x: 900.0,
                    y: 0.0,
                    rotation: crate::geom::Rotation::R0,
                },
            ],
            unplaced: vec![],
        };
        let snapshot = state.placements.clone();
        let mut rng = StdRng::seed_from_u64(2);
        // Swapping positions puts the 900-wide piece at x=900: out of
        // bounds, so the move must be rejected and the state restored.
        for _ in 0..10 {
            let _ = swap(&problem, &config(), &mut state, &mut rng);
            assert!(feasible_strict(&problem, &state.placements, 0.0));
        }
        assert_eq!(state.placements.len(), snapshot.len());
    }

    #[test]
    fn best_solution_is_never_worse_than_the_greedy_seed() {
        let stocks = vec![stock("s1", 1000.0, 500.0), stock("s2", 600.0, 600.0)];
        let orders = vec![
            rect_order("a", 400.0, 300.0, 2),
            rect_order("b", 500.0, 250.0, 2),
            rect_order("c", 200.0, 200.0, 3),
        ];
        let problem = Problem::expand(&stocks, &orders);
        let deadline = Deadline::starting_now(Duration::from_secs(30));
        let mut rng = StdRng::seed_from_u64(21);

        let sequence = problem.processing_order(true);
        let seed = bottom_left_layout(&problem, &config(), &sequence);
        let seed_cost = sa_cost(&problem, &seed.placements, seed.unplaced.len());

        let layout = Annealing.solve(&problem, &config(), &deadline, &mut rng);
        let final_cost = sa_cost(&problem, &layout.placements, layout.unplaced.len());
        assert!(final_cost <= seed_cost + 1e-9);
        assert!(feasible_strict(&problem, &layout.placements, 0.0));
    }

    #[test]
    fn identical_seeds_are_reproducible() {
        let stocks = vec![stock("s1", 1200.0, 800.0)];
        let orders = vec![rect_order("o1", 300.0, 200.0, 5)];
        let problem = Problem::expand(&stocks, &orders);
        let deadline = Deadline::starting_now(Duration::from_secs(30));

        let mut rng_a = StdRng::seed_from_u64(99);
        let layout_a = Annealing.solve(&problem, &config(), &deadline, &mut rng_a);
        let mut rng_b = StdRng::seed_from_u64(99);
        let layout_b = Annealing.solve(&problem, &config(), &deadline, &mut rng_b);

        assert_eq!(layout_a.placements, layout_b.placements);
    }
}
