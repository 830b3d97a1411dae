//! Greedy placement: first-fit, best-fit, and bottom-left fill.
//!
//! Greedy solvers are deterministic, ignore the RNG, and never fail; pieces
//! with no feasible position are reported unplaced.

use crate::config::OptimizationConfig;
use crate::geom::{Footprint, Rotation};
use crate::placement::{rotations_for, Occupancy};
use crate::solvers::{Deadline, Layout, Placement, Problem, Solver};
use rand::rngs::StdRng;

/// First-fit over a coarse grid: the first feasible position on the first
/// compatible stock wins.
pub(crate) struct FirstFit;

/// Best-fit: every feasible candidate across all stocks is scored and the
/// one leaving the least residual area wins.
pub(crate) struct BestFit;

/// Bottom-left fill: per material group, the lowest-then-leftmost feasible
/// position on the first compatible stock that has one.
pub(crate) struct BottomLeft;

impl Solver for FirstFit {
    fn name(&self) -> &'static str {
        "first_fit"
    }

    fn solve(
        &self,
        problem: &Problem<'_>,
        config: &OptimizationConfig,
        _deadline: &Deadline,
        _rng: &mut StdRng,
    ) -> Layout {
        let order = problem.processing_order(config.prioritize_orders);
        first_fit_layout(problem, config, &order)
    }
}

impl Solver for BestFit {
    fn name(&self) -> &'static str {
        "best_fit"
    }

    fn solve(
        &self,
        problem: &Problem<'_>,
        config: &OptimizationConfig,
        _deadline: &Deadline,
        _rng: &mut StdRng,
    ) -> Layout {
        let order = problem.processing_order(config.prioritize_orders);
        best_fit_layout(problem, config, &order)
    }
}

impl Solver for BottomLeft {
    fn name(&self) -> &'static str {
        "bottom_left"
    }

    fn solve(
        &self,
        problem: &Problem<'_>,
        config: &OptimizationConfig,
        _deadline: &Deadline,
        _rng: &mut StdRng,
    ) -> Layout {
        let mut order = problem.processing_order(config.prioritize_orders);
        // Grouping hints: process pieces of the same thickness and
        // material as contiguous blocks, keeping the priority/area order
        // within each block (the sorts are stable).
        if config.group_by_thickness {
            order.sort_by(|&a, &b| {
                problem.pieces[a]
                    .thickness
                    .partial_cmp(&problem.pieces[b].thickness)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }
        if config.group_by_material {
            order.sort_by_key(|&p| problem.pieces[p].material);
        }
        bottom_left_layout(problem, config, &order)
    }
}

pub(crate) fn occupancies_for(problem: &Problem<'_>) -> Vec<Occupancy> {
    problem
        .stocks
        .iter()
        .map(|stock| Occupancy::new(stock.width, stock.height))
        .collect()
}

/// Places pieces in the given order, scanning each compatible stock's
/// coarse grid and accepting the first feasible position.
pub(crate) fn first_fit_layout(
    problem: &Problem<'_>,
    config: &OptimizationConfig,
    piece_order: &[usize],
) -> Layout {
    let mut occupancies = occupancies_for(problem);
    let mut layout = Layout::new();

    for &piece_index in piece_order {
        let piece = &problem.pieces[piece_index];
        let mut placed = false;
        for stock_index in 0..problem.stocks.len() {
            if !problem.compatible(piece_index, stock_index) {
                continue;
            }
            if let Some((x, y, rotation)) = occupancies[stock_index].first_fit_grid(
                piece.shape,
                config.allow_rotation,
                config.cutting_width,
                config.placement_precision,
            ) {
                occupancies[stock_index].place(
                    Footprint::new(piece.shape, x, y, rotation),
                );
                layout.placements.push(Placement {
                    piece: piece_index,
                    stock: stock_index,
                    x,
                    y,
                    rotation,
                });
                placed = true;
                break;
            }
        }
        if !placed {
            layout.unplaced.push(piece_index);
        }
    }
    layout
}

/// Places pieces in the given order, scoring every feasible bottom-left
/// candidate across all compatible stocks and keeping the one that leaves
/// the smallest residual area, breaking ties by lower y, then lower x,
/// then stock index, then candidate index.
pub(crate) fn best_fit_layout(
    problem: &Problem<'_>,
    config: &OptimizationConfig,
    piece_order: &[usize],
) -> Layout {
    let mut occupancies = occupancies_for(problem);
    let mut used_area: Vec<f64> = vec![0.0; problem.stocks.len()];
    let mut layout = Layout::new();

    for &piece_index in piece_order {
        let piece = &problem.pieces[piece_index];
        let mut best: Option<(f64, f64, f64, usize, usize, Rotation)> = None;

        for stock_index in 0..problem.stocks.len() {
            if !problem.compatible(piece_index, stock_index) {
                continue;
            }
            let stock = &problem.stocks[stock_index];
            let residual = stock.area() - used_area[stock_index] - piece.area();
            if residual < 0.0 {
                continue;
            }
            let occupancy = &occupancies[stock_index];
            for rotation in rotations_for(piece.shape, config.allow_rotation) {
                let (w, h) = piece.shape.oriented_dims(rotation);
                for (candidate_index, (x, y)) in
                    occupancy.bottom_left_candidates(w, h).into_iter().enumerate()
                {
                    if !occupancy.is_feasible(piece.shape, x, y, rotation, config.cutting_width)
                    {
                        continue;
                    }
                    let better = match best {
                        None => true,
                        Some((best_residual, best_y, best_x, best_stock, best_candidate, _)) => {
                            (residual, y, x, stock_index, candidate_index)
                                < (best_residual, best_y, best_x, best_stock, best_candidate)
                        }
                    };
                    if better {
                        best = Some((residual, y, x, stock_index, candidate_index, rotation));
                    }
                    // Candidates are (y, x) sorted, so later candidates for
                    // this rotation cannot improve the positional tie-break.
                    break;
                }
            }
        }

        match best {
            Some((_, y, x, stock_index, _, rotation)) => {
                occupancies[stock_index].place(Footprint::new(
                    piece.shape,
                    x,
                    y,
                    rotation,
                ));
                used_area[stock_index] += piece.area();
                layout.placements.push(Placement {
                    piece: piece_index,
                    stock: stock_index,
                    x,
                    y,
                    rotation,
                });
            }
            None => layout.unplaced.push(piece_index),
        }
    }
    layout
}

/// Places pieces in the given order at the lowest-then-leftmost feasible
/// position on the first compatible stock that has one. Material grouping
/// falls out of compatibility: a stock only ever sees pieces it can cut.
pub(crate) fn bottom_left_layout(
    problem: &Problem<'_>,
    config: &OptimizationConfig,
    piece_order: &[usize],
) -> Layout {
    let mut occupancies = occupancies_for(problem);
    let mut layout = Layout::new();

    for &piece_index in piece_order {
        let piece = &problem.pieces[piece_index];
        let mut placed = false;
        for stock_index in 0..problem.stocks.len() {
            if !problem.compatible(piece_index, stock_index) {
                continue;
            }
            if let Some((x, y, rotation)) = occupancies[stock_index].best_bottom_left(
                piece.shape,
                config.allow_rotation,
                config.cutting_width,
            ) {
                occupancies[stock_index].place(Footprint::new(
                    piece.shape,
                    x,
                    y,
                    rotation,
                ));
                layout.placements.push(Placement {
                    piece: piece_index,
                    stock: stock_index,
                    x,
                    y,
                    rotation,
                });
                placed = true;
                break;
            }
        }
        if !placed {
            layout.unplaced.push(piece_index);
        }
    }
    layout
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluate::{feasible_strict, metrics};
    use crate::geom::Shape;
    use crate::model::{Material, Order, Priority, Stock};
    use rand::SeedableRng;
    use std::time::Duration;

    fn config() -> OptimizationConfig {
        OptimizationConfig::default()
    }

    fn deadline() -> Deadline {
        Deadline::starting_now(Duration::from_secs(60))
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn stock(id: &str, w: f64, h: f64, material: Material) -> Stock {
        Stock::new(id, w, h, 5.0, material, 1.0).unwrap()
    }

    fn rect_order(id: &str, w: f64, h: f64, quantity: u32, material: Material) -> Order {
        Order::new(
            id,
            Shape::rect(w, h).unwrap(),
            quantity,
            Priority::Medium,
            material,
            5.0,
            0.0,
        )
        .unwrap()
    }

    #[test]
    fn first_fit_places_two_halves() {
        let stocks = vec![stock("s1", 1000.0, 1000.0, Material::Metal)];
        let orders = vec![rect_order("o1", 500.0, 500.0, 2, Material::Metal)];
        let problem = Problem::expand(&stocks, &orders);
        let layout = FirstFit.solve(&problem, &config(), &deadline(), &mut rng());
        assert_eq!(layout.placements.len(), 2);
        assert!(layout.unplaced.is_empty());
        assert!(feasible_strict(&problem, &layout.placements, 0.0));
    }

    #[test]
    fn bottom_left_fills_one_stock_completely() {
        let stocks = vec![stock("s1", 1000.0, 1000.0, Material::Metal)];
        let orders = vec![rect_order("o1", 500.0, 500.0, 4, Material::Metal)];
        let problem = Problem::expand(&stocks, &orders);
        let layout = BottomLeft.solve(&problem, &config(), &deadline(), &mut rng());
        assert_eq!(layout.placements.len(), 4);
        let m = metrics(&problem, &layout.placements);
        assert!((m.efficiency - 100.0).abs() < 1e-9);
        assert!(feasible_strict(&problem, &layout.placements, 0.0));
    }

    #[test]
    fn best_fit_prefers_the_tighter_stock() {
        // Both stocks are compatible; the small one leaves less residual.
        let stocks = vec![
            stock("big", 2000.0, 2000.0, Material::Wood),
            stock("snug", 600.0, 600.0, Material::Wood),
        ];
        let orders = vec![rect_order("o1", 500.0, 500.0, 1, Material::Wood)];
        let problem = Problem::expand(&stocks, &orders);
        let layout = BestFit.solve(&problem, &config(), &deadline(), &mut rng());
        assert_eq!(layout.placements.len(), 1);
        assert_eq!(layout.placements[0].stock, 1);
    }

    #[test]
    fn greedy_reports_unplaceable_pieces_instead_of_failing() {
        let stocks = vec![stock("s1", 400.0, 400.0, Material::Metal)];
        let orders = vec![
            rect_order("fits", 300.0, 300.0, 1, Material::Metal),
            rect_order("too-big", 350.0, 350.0, 1, Material::Metal),
        ];
        let problem = Problem::expand(&stocks, &orders);
        let layout = BottomLeft.solve(&problem, &config(), &deadline(), &mut rng());
        assert_eq!(layout.placements.len(), 1);
        assert_eq!(layout.unplaced.len(), 1);
    }

    #[test]
    fn rotation_unlocks_placements() {
        let stocks = vec![stock("s1", 1000.0, 600.0, Material::Metal)];
        let orders = vec![
            rect_order("wide", 800.0, 400.0, 1, Material::Metal),
            rect_order("tall", 400.0, 500.0, 1, Material::Metal),
        ];
        let problem = Problem::expand(&stocks, &orders);

        let with_rotation = BottomLeft.solve(&problem, &config(), &deadline(), &mut rng());
        assert_eq!(with_rotation.placements.len(), 2);

        let no_rotation_config = OptimizationConfig {
            allow_rotation: false,
            ..config()
        };
        let without =
            BottomLeft.solve(&problem, &no_rotation_config, &deadline(), &mut rng());
        assert_eq!(without.placements.len(), 1);
        assert_eq!(without.unplaced.len(), 1);
    }

    #[test]
    fn material_grouping_keeps_pieces_off_foreign_stocks() {
        let stocks = vec![
            stock("glass", 2000.0, 1000.0, Material::Glass),
            stock("metal", 1500.0, 1200.0, Material::Metal),
        ];
        let orders = vec![
            rect_order("g1", 800.0, 600.0, 1, Material::Glass),
            rect_order("m1", 600.0, 400.0, 1, Material::Metal),
            rect_order("g2", 400.0, 300.0, 2, Material::Glass),
        ];
        let problem = Problem::expand(&stocks, &orders);
        let layout = BottomLeft.solve(&problem, &config(), &deadline(), &mut rng());
        assert_eq!(layout.placements.len(), 4);
        for placement in &layout.placements {
            assert!(problem.compatible(placement.piece, placement.stock));
        }
        assert!(feasible_strict(&problem, &layout.placements, 0.0));
    }

    #[test]
    fn priority_order_places_urgent_first_when_space_is_scarce() {
        let stocks = vec![stock("s1", 1000.0, 600.0, Material::Metal)];
        let orders = vec![
            Order::new(
                "low",
                Shape::rect(800.0, 500.0).unwrap(),
                1,
                Priority::Low,
                Material::Metal,
                5.0,
                0.0,
            )
            .unwrap(),
            Order::new(
                "urgent",
                Shape::rect(900.0, 550.0).unwrap(),
                1,
                Priority::Urgent,
                Material::Metal,
                5.0,
                0.0,
            )
            .unwrap(),
        ];
        let problem = Problem::expand(&stocks, &orders);
        let layout = BottomLeft.solve(&problem, &config(), &deadline(), &mut rng());
        // Only one of the two fits; prioritization places the urgent one.
        assert_eq!(layout.placements.len(), 1);
        assert_eq!(problem.pieces[layout.placements[0].piece].order, 1);
    }

    #[test]
    fn kerf_blocks_the_second_half() {
        let stocks = vec![stock("s1", 1000.0, 1000.0, Material::Metal)];
        let orders = vec![rect_order("o1", 500.0, 500.0, 2, Material::Metal)];
        let problem = Problem::expand(&stocks, &orders);
        let kerf_config = OptimizationConfig {
            cutting_width: 3.0,
            ..config()
        };
        let layout = BottomLeft.solve(&problem, &kerf_config, &deadline(), &mut rng());
        // 500 + 3 + 500 exceeds the sheet in both directions.
        assert_eq!(layout.placements.len(), 1);
        assert_eq!(layout.unplaced.len(), 1);
    }

    #[test]
    fn circle_and_rectangle_share_a_stock() {
        let stocks = vec![stock("s1", 1000.0, 800.0, Material::Metal)];
        let orders = vec![
            rect_order("r", 600.0, 400.0, 1, Material::Metal),
            Order::new(
                "c",
                Shape::circle(200.0).unwrap(),
                1,
                Priority::Medium,
                Material::Metal,
                5.0,
                0.0,
            )
            .unwrap(),
        ];
        let problem = Problem::expand(&stocks, &orders);
        let layout = BottomLeft.solve(&problem, &config(), &deadline(), &mut rng());
        assert_eq!(layout.placements.len(), 2);
        assert!(feasible_strict(&problem, &layout.placements, 0.0));
    }
}
