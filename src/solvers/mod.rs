//! Placement algorithms and the shared problem representation they run on.

pub(crate) mod annealing;
pub(crate) mod genetic;
pub(crate) mod greedy;
pub(crate) mod hybrid;

use crate::config::{OptimizationConfig, EXPANSION_CAP};
use crate::geom::{Rotation, Shape};
use crate::model::{Material, Order, Priority, Stock};
use rand::rngs::StdRng;
use std::time::{Duration, Instant};

/// One concrete piece to place: a single unit of an order's quantity.
#[derive(Clone, Debug)]
pub(crate) struct Piece {
    /// Index of the originating order.
    pub order: usize,
    pub shape: Shape,
    pub material: Material,
    pub thickness: f64,
    pub tolerance: f64,
    pub priority: Priority,
}

impl Piece {
    pub(crate) fn area(&self) -> f64 {
        self.shape.area()
    }
}

/// The expanded problem an algorithm works on. Stocks and orders are
/// borrowed read-only; the piece list and index maps are owned.
#[derive(Debug)]
pub(crate) struct Problem<'a> {
    pub stocks: &'a [Stock],
    pub orders: &'a [Order],
    pub pieces: Vec<Piece>,
    /// Whether any order's quantity was truncated by the expansion cap.
    pub expansion_capped: bool,
}

impl<'a> Problem<'a> {
    /// Expands order quantities into individual pieces, capping each order
    /// at [`EXPANSION_CAP`] units.
    pub(crate) fn expand(stocks: &'a [Stock], orders: &'a [Order]) -> Problem<'a> {
        let mut pieces = Vec::new();
        let mut expansion_capped = false;
        for (order_index, order) in orders.iter().enumerate() {
            let expanded = order.quantity.min(EXPANSION_CAP);
            if expanded < order.quantity {
                expansion_capped = true;
            }
            for _ in 0..expanded {
                pieces.push(Piece {
                    order: order_index,
                    shape: order.shape,
                    material: order.material,
                    thickness: order.thickness,
                    tolerance: order.tolerance,
                    priority: order.priority,
                });
            }
        }
        Problem {
            stocks,
            orders,
            pieces,
            expansion_capped,
        }
    }

    /// Problem complexity used for parameter auto-scaling.
    pub(crate) fn complexity(&self) -> usize {
        self.stocks.len() * self.pieces.len()
    }

    /// Piece indices in processing order: (priority weight descending, area
    /// descending) when prioritizing, input order otherwise. The sort is
    /// stable so equal pieces keep their input order.
    pub(crate) fn processing_order(&self, prioritize: bool) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.pieces.len()).collect();
        if prioritize {
            order.sort_by(|&a, &b| {
                let pa = &self.pieces[a];
                let pb = &self.pieces[b];
                pb.priority
                    .weight()
                    .cmp(&pa.priority.weight())
                    .then_with(|| {
                        pb.area()
                            .partial_cmp(&pa.area())
                            .unwrap_or(std::cmp::Ordering::Equal)
                    })
            });
        }
        order
    }

    /// Whether a piece may be cut from a stock: same material, thickness
    /// within the order's tolerance.
    pub(crate) fn compatible(&self, piece: usize, stock: usize) -> bool {
        let piece = &self.pieces[piece];
        let stock = &self.stocks[stock];
        piece.material == stock.material
            && (piece.thickness - stock.thickness).abs() <= piece.tolerance
    }

    /// Indices of the stocks a piece is compatible with, in input order.
    pub(crate) fn compatible_stocks(&self, piece: usize) -> Vec<usize> {
        (0..self.stocks.len())
            .filter(|&s| self.compatible(piece, s))
            .collect()
    }
}

/// One piece assigned to a position on a stock.
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) struct Placement {
    pub piece: usize,
    pub stock: usize,
    pub x: f64,
    pub y: f64,
    pub rotation: Rotation,
}

/// A complete candidate solution: placed pieces plus the pieces that found
/// no position.
#[derive(Clone, Debug, Default)]
pub(crate) struct Layout {
    pub placements: Vec<Placement>,
    pub unplaced: Vec<usize>,
    /// The soft deadline cut the search short.
    pub early_terminated: bool,
    pub generations_run: Option<usize>,
    pub iterations_run: Option<usize>,
}

impl Layout {
    pub(crate) fn new() -> Layout {
        Layout::default()
    }
}

/// Soft wall-clock deadline checked at algorithm-specific boundaries
/// (generations, temperature blocks).
#[derive(Copy, Clone, Debug)]
pub(crate) struct Deadline {
    started: Instant,
    limit: Duration,
}

impl Deadline {
    pub(crate) fn starting_now(limit: Duration) -> Deadline {
        Deadline {
            started: Instant::now(),
            limit,
        }
    }

    pub(crate) fn expired(&self) -> bool {
        self.started.elapsed() >= self.limit
    }
}

/// A placement algorithm.
///
/// Solvers never fail: pieces that cannot be placed are reported through
/// [`Layout::unplaced`], and the dispatcher validates the layout before it
/// becomes a result.
pub(crate) trait Solver {
    /// Stable name recorded on the result.
    fn name(&self) -> &'static str;

    /// Produces a layout for the problem, honouring the deadline.
    fn solve(
        &self,
        problem: &Problem<'_>,
        config: &OptimizationConfig,
        deadline: &Deadline,
        rng: &mut StdRng,
    ) -> Layout;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Material, Order, Priority, Stock};

    fn stock(id: &str, material: Material) -> Stock {
        Stock::new(id, 1000.0, 1000.0, 6.0, material, 10.0).unwrap()
    }

    fn order(id: &str, quantity: u32, priority: Priority, area_side: f64) -> Order {
        Order::new(
            id,
            Shape::rect(area_side, area_side).unwrap(),
            quantity,
            priority,
            Material::Glass,
            6.0,
            0.5,
        )
        .unwrap()
    }

    #[test]
    fn expansion_creates_one_piece_per_unit() {
        let stocks = vec![stock("s1", Material::Glass)];
        let orders = vec![order("o1", 3, Priority::Medium, 100.0)];
        let problem = Problem::expand(&stocks, &orders);
        assert_eq!(problem.pieces.len(), 3);
        assert!(!problem.expansion_capped);
        assert!(problem.pieces.iter().all(|p| p.order == 0));
    }

    #[test]
    fn expansion_caps_runaway_quantities() {
        let stocks = vec![stock("s1", Material::Glass)];
        let orders = vec![order("o1", 500, Priority::Medium, 10.0)];
        let problem = Problem::expand(&stocks, &orders);
        assert_eq!(problem.pieces.len(), EXPANSION_CAP as usize);
        assert!(problem.expansion_capped);
    }

    #[test]
    fn processing_order_ranks_priority_then_area() {
        let stocks = vec![stock("s1", Material::Glass)];
        let orders = vec![
            order("small-urgent", 1, Priority::Urgent, 10.0),
            order("big-low", 1, Priority::Low, 500.0),
            order("big-urgent", 1, Priority::Urgent, 400.0),
        ];
        let problem = Problem::expand(&stocks, &orders);
        let ranked = problem.processing_order(true);
        // Urgent before low regardless of area; larger urgent first.
        assert_eq!(ranked, vec![2, 0, 1]);

        let unranked = problem.processing_order(false);
        assert_eq!(unranked, vec![0, 1, 2]);
    }

    #[test]
    fn compatibility_filters_by_material_and_thickness() {
        let stocks = vec![stock("glass", Material::Glass), stock("metal", Material::Metal)];
        let orders = vec![order("o1", 1, Priority::Medium, 100.0)];
        let problem = Problem::expand(&stocks, &orders);
        assert_eq!(problem.compatible_stocks(0), vec![0]);
        assert!(problem.compatible(0, 0));
        assert!(!problem.compatible(0, 1));
    }

    #[test]
    fn complexity_is_stocks_times_pieces() {
        let stocks = vec![stock("a", Material::Glass), stock("b", Material::Glass)];
        let orders = vec![order("o1", 5, Priority::Medium, 10.0)];
        let problem = Problem::expand(&stocks, &orders);
        assert_eq!(problem.complexity(), 10);
    }
}
