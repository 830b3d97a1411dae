//! Solution evaluation: efficiency, cost, fitness, and the fast and strict
//! feasibility predicates.
//!
//! The fast predicate checks only bounds and per-stock bounding-box
//! overlaps and is meant for metaheuristic inner loops. The strict
//! predicate applies the exact geometry rules plus material and thickness
//! compatibility and must pass before a layout may become a result.

use crate::geom::Footprint;
use crate::solvers::{Placement, Problem};
use fnv::FnvHashSet;

/// Aggregate quality numbers for a set of placements.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) struct Metrics {
    /// Total area of the placed pieces.
    pub used_area: f64,
    /// Total area of the stocks holding at least one piece.
    pub used_stock_area: f64,
    /// `100 · used_area / used_stock_area`, 0 when nothing is placed.
    pub efficiency: f64,
    /// Sum of the unit costs of the used stocks.
    pub cost: f64,
    /// Number of distinct used stocks.
    pub stocks_used: usize,
}

/// Computes the aggregate metrics of a set of placements.
///
/// Efficiency divides by the *used* stock area, not the total stock area;
/// unused sheets do not dilute the number.
pub(crate) fn metrics(problem: &Problem<'_>, placements: &[Placement]) -> Metrics {
    let mut used_area = 0.0;
    let mut used_stocks: FnvHashSet<usize> = FnvHashSet::default();
    for placement in placements {
        used_area += problem.pieces[placement.piece].area();
        used_stocks.insert(placement.stock);
    }

    let mut used_stock_area = 0.0;
    let mut cost = 0.0;
    for &stock in &used_stocks {
        used_stock_area += problem.stocks[stock].area();
        cost += problem.stocks[stock].cost;
    }

    let efficiency = if used_stock_area > 0.0 {
        100.0 * used_area / used_stock_area
    } else {
        0.0
    };

    Metrics {
        used_area,
        used_stock_area,
        efficiency,
        cost,
        stocks_used: used_stocks.len(),
    }
}

fn footprint_of(problem: &Problem<'_>, placement: &Placement) -> Footprint {
    Footprint::new(
        problem.pieces[placement.piece].shape,
        placement.x,
        placement.y,
        placement.rotation,
    )
}

/// Weak feasibility: every placement inside its stock, and no two
/// kerf-inflated bounding boxes on the same stock overlap.
///
/// Circles are approximated by their bounding boxes, which over-constrains:
/// every fast-feasible set of placements is strictly pairwise clear, but a
/// layout that packs circles into corner gaps can fail here while passing
/// the strict predicate. That trade keeps metaheuristic inner loops cheap.
pub(crate) fn feasible_fast(problem: &Problem<'_>, placements: &[Placement], kerf: f64) -> bool {
    let margin = kerf / 2.0;
    let mut by_stock: Vec<Vec<(f64, f64, f64, f64)>> = vec![Vec::new(); problem.stocks.len()];

    for placement in placements {
        if placement.stock >= problem.stocks.len() {
            return false;
        }
        let stock = &problem.stocks[placement.stock];
        let fp = footprint_of(problem, placement);
        if !fp.contained_in(stock.width, stock.height) {
            return false;
        }
        let (xmin, ymin, xmax, ymax) = fp.bounding_box();
        by_stock[placement.stock].push((
            xmin - margin,
            ymin - margin,
            xmax + margin,
            ymax + margin,
        ));
    }

    for boxes in &by_stock {
        for i in 0..boxes.len() {
            for j in i + 1..boxes.len() {
                let a = boxes[i];
                let b = boxes[j];
                if a.2 > b.0 && b.2 > a.0 && a.3 > b.1 && b.3 > a.1 {
                    return false;
                }
            }
        }
    }
    true
}

/// Strict feasibility: containment, exact pairwise non-overlap with kerf
/// inflation, and material/thickness compatibility for every placement.
pub(crate) fn feasible_strict(
    problem: &Problem<'_>,
    placements: &[Placement],
    kerf: f64,
) -> bool {
    let margin = kerf / 2.0;
    let mut by_stock: Vec<Vec<Footprint>> = vec![Vec::new(); problem.stocks.len()];

    for placement in placements {
        if placement.stock >= problem.stocks.len() || placement.piece >= problem.pieces.len() {
            return false;
        }
        if !problem.compatible(placement.piece, placement.stock) {
            return false;
        }
        let stock = &problem.stocks[placement.stock];
        let fp = footprint_of(problem, placement);
        if !fp.contained_in(stock.width, stock.height) {
            return false;
        }
        by_stock[placement.stock].push(fp);
    }

    for footprints in &by_stock {
        for i in 0..footprints.len() {
            for j in i + 1..footprints.len() {
                let a = footprints[i].inflate(margin);
                let b = footprints[j].inflate(margin);
                if a.overlaps(&b) {
                    return false;
                }
            }
        }
    }
    true
}

/// Genetic fitness in `[0, 1]`: `0.8 · efficiency + 0.2 · (1 − waste)`,
/// zero for infeasible placements.
pub(crate) fn ga_fitness(problem: &Problem<'_>, placements: &[Placement], kerf: f64) -> f64 {
    if placements.is_empty() {
        return 0.0;
    }
    if !feasible_fast(problem, placements, kerf) {
        return 0.0;
    }
    let metrics = metrics(problem, placements);
    let efficiency = metrics.efficiency / 100.0;
    let waste = 1.0 - efficiency;
    0.8 * efficiency + 0.2 * (1.0 - waste)
}

/// Annealing cost, lower is better:
/// `waste_fraction + 0.5 · unplaced + 0.1 · stocks_used`.
pub(crate) fn sa_cost(problem: &Problem<'_>, placements: &[Placement], unplaced: usize) -> f64 {
    let metrics = metrics(problem, placements);
    let waste_fraction = if metrics.stocks_used > 0 {
        1.0 - metrics.efficiency / 100.0
    } else {
        1.0
    };
    waste_fraction + 0.5 * unplaced as f64 + 0.1 * metrics.stocks_used as f64
}
