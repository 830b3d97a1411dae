//! Input and result validation.
//!
//! Tier 1 runs before any placement and rejects malformed or unsatisfiable
//! inputs. Tier 2 runs after an algorithm returns and checks every
//! invariant a [`CuttingResult`] promises. Validators report structured
//! errors and never repair anything.

use crate::config::OptimizationConfig;
use crate::error::{Error, Result};
use crate::model::{CuttingResult, Material, Order, Stock};
use fnv::{FnvHashMap, FnvHashSet};

/// Validates stocks, orders, and configuration before placement.
///
/// # Errors
///
/// - [`Error::InvalidDimensions`] for non-positive dimensions, thickness,
///   or shape areas.
/// - [`Error::InsufficientStock`] when the aggregate ordered area of a
///   material exceeds the aggregate stock area, or no stock exists at all.
/// - [`Error::Validation`] for duplicate stock identifiers, empty inputs,
///   or a material with orders but no stock.
pub fn validate_inputs(
    stocks: &[Stock],
    orders: &[Order],
    config: &OptimizationConfig,
) -> Result<()> {
    config.validate()?;

    if orders.is_empty() {
        return Err(Error::Validation(
            "at least one order must be provided".to_string(),
        ));
    }
    if stocks.is_empty() {
        // No stock at all cannot satisfy any order.
        return Err(Error::InsufficientStock {
            material: orders[0].material,
            stock_area: 0.0,
            order_area: orders.iter().map(Order::total_area).sum(),
        });
    }

    let mut seen_ids: FnvHashSet<&str> = FnvHashSet::default();
    for stock in stocks {
        if stock.width <= 0.0 || stock.height <= 0.0 {
            return Err(Error::InvalidDimensions(format!(
                "stock `{}` has invalid dimensions: {}x{}",
                stock.id, stock.width, stock.height
            )));
        }
        if stock.thickness <= 0.0 {
            return Err(Error::InvalidDimensions(format!(
                "stock `{}` has invalid thickness: {}",
                stock.id, stock.thickness
            )));
        }
        if !seen_ids.insert(&stock.id) {
            return Err(Error::Validation(format!(
                "duplicate stock id `{}`",
                stock.id
            )));
        }
    }

    for order in orders {
        if order.quantity == 0 {
            return Err(Error::InvalidDimensions(format!(
                "order `{}` has zero quantity",
                order.id
            )));
        }
        if order.piece_area() <= 0.0 {
            return Err(Error::InvalidDimensions(format!(
                "order `{}` has non-positive shape area",
                order.id
            )));
        }
        if order.tolerance < 0.0 {
            return Err(Error::InvalidDimensions(format!(
                "order `{}` has negative tolerance: {}",
                order.id, order.tolerance
            )));
        }
    }

    check_material_capacity(stocks, orders)
}

/// For every material present in the orders, the ordered area must not
/// exceed the stock area available for that material.
fn check_material_capacity(stocks: &[Stock], orders: &[Order]) -> Result<()> {
    let mut stock_area: FnvHashMap<Material, f64> = FnvHashMap::default();
    for stock in stocks {
        *stock_area.entry(stock.material).or_insert(0.0) += stock.area();
    }

    let mut order_area: FnvHashMap<Material, f64> = FnvHashMap::default();
    for order in orders {
        *order_area.entry(order.material).or_insert(0.0) += order.total_area();
    }

    let mut materials: Vec<Material> = order_area.keys().copied().collect();
    materials.sort();
    for material in materials {
        let ordered = order_area[&material];
        match stock_area.get(&material) {
            None => {
                return Err(Error::Validation(format!(
                    "no stocks available for material {}",
                    material
                )))
            }
            Some(&available) if ordered > available => {
                return Err(Error::InsufficientStock {
                    material,
                    stock_area: available,
                    order_area: ordered,
                })
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Validates every invariant of a returned result.
///
/// Checks efficiency bounds, stock references, containment, pairwise
/// non-overlap (with kerf clearance), material and thickness compatibility,
/// and count consistency. Read-only and idempotent: validating a valid
/// result any number of times succeeds and changes nothing.
///
/// # Errors
///
/// [`Error::Optimization`] describing the first violated invariant.
pub fn validate_result(
    result: &CuttingResult,
    stocks: &[Stock],
    orders: &[Order],
    config: &OptimizationConfig,
) -> Result<()> {
    if !(0.0..=100.0).contains(&result.efficiency) {
        return Err(Error::Optimization(format!(
            "efficiency out of range: {}",
            result.efficiency
        )));
    }

    let stock_by_id: FnvHashMap<&str, &Stock> =
        stocks.iter().map(|s| (s.id.as_str(), s)).collect();
    let order_by_id: FnvHashMap<&str, &Order> =
        orders.iter().map(|o| (o.id.as_str(), o)).collect();

    for placed in &result.placed {
        let stock = stock_by_id.get(placed.stock_id.as_str()).ok_or_else(|| {
            Error::Optimization(format!(
                "placed shape references unknown stock `{}`",
                placed.stock_id
            ))
        })?;
        let order = order_by_id.get(placed.order_id.as_str()).ok_or_else(|| {
            Error::Optimization(format!(
                "placed shape references unknown order `{}`",
                placed.order_id
            ))
        })?;

        if !placed.footprint().contained_in(stock.width, stock.height) {
            return Err(Error::Optimization(format!(
                "piece of order `{}` exceeds stock `{}` bounds",
                placed.order_id, placed.stock_id
            )));
        }
        if order.material != stock.material {
            return Err(Error::Optimization(format!(
                "order `{}` material {} placed on {} stock `{}`",
                placed.order_id, order.material, stock.material, placed.stock_id
            )));
        }
        if (order.thickness - stock.thickness).abs() > order.tolerance {
            return Err(Error::Optimization(format!(
                "order `{}` thickness {} incompatible with stock `{}` thickness {}",
                placed.order_id, order.thickness, placed.stock_id, stock.thickness
            )));
        }
    }

    // Pairwise overlap per stock, with half-kerf inflation on both sides.
    let margin = config.cutting_width / 2.0;
    for i in 0..result.placed.len() {
        for j in i + 1..result.placed.len() {
            let a = &result.placed[i];
            let b = &result.placed[j];
            if a.stock_id != b.stock_id {
                continue;
            }
            if a.footprint()
                .inflate(margin)
                .overlaps(&b.footprint().inflate(margin))
            {
                return Err(Error::Optimization(format!(
                    "pieces of orders `{}` and `{}` overlap on stock `{}`",
                    a.order_id, b.order_id, a.stock_id
                )));
            }
        }
    }

    check_counts(result, orders)
}

fn check_counts(result: &CuttingResult, orders: &[Order]) -> Result<()> {
    let used_stocks: FnvHashSet<&str> = result
        .placed
        .iter()
        .map(|p| p.stock_id.as_str())
        .collect();
    if used_stocks.len() != result.total_stock_used {
        return Err(Error::Optimization(format!(
            "stock count mismatch: {} reported, {} used",
            result.total_stock_used,
            used_stocks.len()
        )));
    }

    let mut placed_per_order: FnvHashMap<&str, u32> = FnvHashMap::default();
    for placed in &result.placed {
        *placed_per_order.entry(placed.order_id.as_str()).or_insert(0) += 1;
    }

    let fulfilled = placed_per_order.len();
    if fulfilled != result.total_orders_fulfilled {
        return Err(Error::Optimization(format!(
            "fulfilled count mismatch: {} reported, {} orders have placements",
            result.total_orders_fulfilled, fulfilled
        )));
    }

    let unfulfilled_ids: FnvHashSet<&str> = result
        .unfulfilled_orders
        .iter()
        .map(|o| o.id.as_str())
        .collect();
    for order in orders {
        let placed = placed_per_order.get(order.id.as_str()).copied().unwrap_or(0);
        if placed > order.quantity {
            return Err(Error::Optimization(format!(
                "order `{}` has {} placements for quantity {}",
                order.id, placed, order.quantity
            )));
        }
        if placed == 0 && !unfulfilled_ids.contains(order.id.as_str()) {
            return Err(Error::Optimization(format!(
                "order `{}` is neither placed nor reported unfulfilled",
                order.id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{Rotation, Shape};
    use crate::model::{PlacedShape, Priority, ResultMetadata};
    use std::time::Duration;

    fn stock(id: &str, w: f64, h: f64, material: Material) -> Stock {
        Stock::new(id, w, h, 5.0, material, 0.0).unwrap()
    }

    fn order(id: &str, w: f64, h: f64, quantity: u32, material: Material) -> Order {
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

    fn result_with(placed: Vec<PlacedShape>, unfulfilled: Vec<Order>) -> CuttingResult {
        let used: FnvHashSet<&str> = placed.iter().map(|p| p.stock_id.as_str()).collect();
        let fulfilled: FnvHashSet<&str> = placed.iter().map(|p| p.order_id.as_str()).collect();
        CuttingResult {
            total_stock_used: used.len(),
            total_orders_fulfilled: fulfilled.len(),
            placed,
            unfulfilled_orders: unfulfilled,
            efficiency: 50.0,
            total_cost: 0.0,
            computation_time: Duration::default(),
            algorithm: "test".to_string(),
            metadata: ResultMetadata::default(),
        }
    }

    fn placed(order_id: &str, stock_id: &str, w: f64, h: f64, x: f64, y: f64) -> PlacedShape {
        PlacedShape {
            order_id: order_id.to_string(),
            stock_id: stock_id.to_string(),
            shape: Shape::rect(w, h).unwrap(),
            x,
            y,
            rotation: Rotation::R0,
            cutting_sequence: 0,
        }
    }

    #[test]
    fn accepts_well_formed_inputs() {
        let stocks = vec![stock("s1", 1000.0, 1000.0, Material::Glass)];
        let orders = vec![order("o1", 100.0, 100.0, 2, Material::Glass)];
        assert!(validate_inputs(&stocks, &orders, &OptimizationConfig::default()).is_ok());
    }

    #[test]
    fn empty_stocks_fail_with_insufficient_stock() {
        let orders = vec![order("o1", 100.0, 100.0, 1, Material::Glass)];
        let err = validate_inputs(&[], &orders, &OptimizationConfig::default()).unwrap_err();
        assert!(matches!(err, Error::InsufficientStock { .. }));
    }

    #[test]
    fn empty_orders_fail_validation() {
        let stocks = vec![stock("s1", 1000.0, 1000.0, Material::Glass)];
        let err = validate_inputs(&stocks, &[], &OptimizationConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn duplicate_stock_ids_rejected() {
        let stocks = vec![
            stock("s1", 1000.0, 1000.0, Material::Glass),
            stock("s1", 500.0, 500.0, Material::Glass),
        ];
        let orders = vec![order("o1", 100.0, 100.0, 1, Material::Glass)];
        let err = validate_inputs(&stocks, &orders, &OptimizationConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn over_ordered_material_fails_with_areas() {
        let stocks = vec![stock("s1", 100.0, 100.0, Material::Metal)];
        let orders = vec![order("o1", 90.0, 90.0, 2, Material::Metal)];
        match validate_inputs(&stocks, &orders, &OptimizationConfig::default()).unwrap_err() {
            Error::InsufficientStock {
                material,
                stock_area,
                order_area,
            } => {
                assert_eq!(material, Material::Metal);
                assert_eq!(stock_area, 10_000.0);
                assert_eq!(order_area, 16_200.0);
            }
            other => panic!("expected InsufficientStock, got {:?}", other),
        }
    }

    #[test]
    fn missing_material_is_a_validation_error() {
        let stocks = vec![stock("s1", 1000.0, 1000.0, Material::Glass)];
        let orders = vec![order("o1", 100.0, 100.0, 1, Material::Wood)];
        let err = validate_inputs(&stocks, &orders, &OptimizationConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn result_validation_accepts_disjoint_layout() {
        let stocks = vec![stock("s1", 1000.0, 1000.0, Material::Glass)];
        let orders = vec![order("o1", 500.0, 500.0, 2, Material::Glass)];
        let result = result_with(
            vec![
                placed("o1", "s1", 500.0, 500.0, 0.0, 0.0),
                placed("o1", "s1", 500.0, 500.0, 500.0, 0.0),
            ],
            vec![],
        );
        assert!(
            validate_result(&result, &stocks, &orders, &OptimizationConfig::default()).is_ok()
        );
    }

    #[test]
    fn result_validation_rejects_overlap() {
        let stocks = vec![stock("s1", 1000.0, 1000.0, Material::Glass)];
        let orders = vec![order("o1", 500.0, 500.0, 2, Material::Glass)];
        let result = result_with(
            vec![
                placed("o1", "s1", 500.0, 500.0, 0.0, 0.0),
                placed("o1", "s1", 500.0, 500.0, 400.0, 0.0),
            ],
            vec![],
        );
        let err =
            validate_result(&result, &stocks, &orders, &OptimizationConfig::default())
                .unwrap_err();
        assert!(matches!(err, Error::Optimization(_)));
    }

    #[test]
    fn result_validation_enforces_kerf_clearance() {
        let stocks = vec![stock("s1", 1000.0, 1000.0, Material::Glass)];
        let orders = vec![order("o1", 500.0, 500.0, 2, Material::Glass)];
        let result = result_with(
            vec![
                placed("o1", "s1", 500.0, 500.0, 0.0, 0.0),
                placed("o1", "s1", 500.0, 500.0, 500.0, 0.0),
            ],
            vec![],
        );
        let kerf_config = OptimizationConfig {
            cutting_width: 3.0,
            ..OptimizationConfig::default()
        };
        assert!(validate_result(&result, &stocks, &orders, &kerf_config).is_err());
        assert!(
            validate_result(&result, &stocks, &orders, &OptimizationConfig::default()).is_ok()
        );
    }

    #[test]
    fn result_validation_rejects_unknown_order_reference() {
        let stocks = vec![stock("s1", 1000.0, 1000.0, Material::Glass)];
        let orders = vec![order("o1", 500.0, 500.0, 1, Material::Glass)];
        let mut result = result_with(vec![placed("o1", "s1", 500.0, 500.0, 0.0, 0.0)], vec![]);
        // Forge a placement for an order the input set does not know.
        result.placed[0].order_id = "ghost".to_string();
        let err =
            validate_result(&result, &stocks, &orders, &OptimizationConfig::default())
                .unwrap_err();
        assert!(matches!(err, Error::Optimization(_)));
    }

    #[test]
    fn result_validation_rejects_material_mismatch() {
        let stocks = vec![
            stock("glass", 1000.0, 1000.0, Material::Glass),
            stock("metal", 1000.0, 1000.0, Material::Metal),
        ];
        let orders = vec![
            order("o1", 500.0, 500.0, 1, Material::Glass),
            order("om", 100.0, 100.0, 1, Material::Metal),
        ];
        // Glass order landed on the metal sheet.
        let result = result_with(
            vec![placed("o1", "metal", 500.0, 500.0, 0.0, 0.0)],
            vec![orders[1].clone()],
        );
        let err =
            validate_result(&result, &stocks, &orders, &OptimizationConfig::default())
                .unwrap_err();
        assert!(matches!(err, Error::Optimization(_)));
    }

    #[test]
    fn result_validation_requires_unplaced_orders_to_be_reported() {
        let stocks = vec![stock("s1", 1000.0, 1000.0, Material::Glass)];
        let orders = vec![
            order("o1", 500.0, 500.0, 1, Material::Glass),
            order("o2", 100.0, 100.0, 1, Material::Glass),
        ];
        // o2 is neither placed nor listed as unfulfilled.
        let result = result_with(vec![placed("o1", "s1", 500.0, 500.0, 0.0, 0.0)], vec![]);
        let err =
            validate_result(&result, &stocks, &orders, &OptimizationConfig::default())
                .unwrap_err();
        assert!(matches!(err, Error::Optimization(_)));
    }

    #[test]
    fn result_validation_is_idempotent() {
        let stocks = vec![stock("s1", 1000.0, 1000.0, Material::Glass)];
        let orders = vec![order("o1", 500.0, 500.0, 1, Material::Glass)];
        let result = result_with(vec![placed("o1", "s1", 500.0, 500.0, 0.0, 0.0)], vec![]);
        let snapshot = result.clone();
        for _ in 0..3 {
            assert!(validate_result(&result, &stocks, &orders, &OptimizationConfig::default())
                .is_ok());
        }
        assert_eq!(result, snapshot);
    }
}
