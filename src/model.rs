//! Domain model: materials, priorities, stocks, orders, and results.

use crate::error::{Error, Result};
use crate::geom::{Footprint, Rotation, Shape};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime};

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// Material a stock sheet is made of and an order must be cut from.
///
/// Orders are only ever placed on stocks of the same material.
#[cfg_attr(feature = "serialize", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum Material {
    /// Glass sheet.
    Glass,
    /// Metal sheet.
    Metal,
    /// Wood board.
    Wood,
    /// Plastic sheet.
    Plastic,
    /// Fabric roll.
    Fabric,
    /// Leather hide.
    Leather,
    /// Paper or cardboard.
    Paper,
    /// Ceramic slab.
    Ceramic,
    /// Composite panel.
    Composite,
}

impl Material {
    /// The lowercase name of the material.
    pub fn as_str(self) -> &'static str {
        match self {
            Material::Glass => "glass",
            Material::Metal => "metal",
            Material::Wood => "wood",
            Material::Plastic => "plastic",
            Material::Fabric => "fabric",
            Material::Leather => "leather",
            Material::Paper => "paper",
            Material::Ceramic => "ceramic",
            Material::Composite => "composite",
        }
    }
}

impl fmt::Display for Material {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Material {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "glass" => Ok(Material::Glass),
            "metal" => Ok(Material::Metal),
            "wood" => Ok(Material::Wood),
            "plastic" => Ok(Material::Plastic),
            "fabric" => Ok(Material::Fabric),
            "leather" => Ok(Material::Leather),
            "paper" => Ok(Material::Paper),
            "ceramic" => Ok(Material::Ceramic),
            "composite" => Ok(Material::Composite),
            other => Err(Error::Validation(format!("unknown material: {}", other))),
        }
    }
}

/// Physical and commercial characteristics of a material, used by the
/// reporting helpers on [`Stock`]. Placement itself only ever compares
/// material tags.
#[cfg_attr(feature = "serialize", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MaterialProperties {
    /// Density in kg per m² per mm of thickness.
    pub density: f64,
    /// Cost per m² when a sheet carries no explicit unit cost.
    pub cost_per_area: f64,
    /// Relative cutting speed, 1.0 being the baseline.
    pub cutting_speed: f64,
    /// Typical waste fraction for the material.
    pub waste_factor: f64,
}

impl MaterialProperties {
    /// Typical properties for a material.
    pub fn defaults_for(material: Material) -> MaterialProperties {
        match material {
            Material::Glass => MaterialProperties {
                density: 2.5,
                cost_per_area: 15.0,
                cutting_speed: 0.8,
                waste_factor: 0.08,
            },
            Material::Metal => MaterialProperties {
                density: 7.8,
                cost_per_area: 25.0,
                cutting_speed: 0.6,
                waste_factor: 0.05,
            },
            Material::Wood => MaterialProperties {
                density: 0.6,
                cost_per_area: 10.0,
                cutting_speed: 1.2,
                waste_factor: 0.10,
            },
            Material::Plastic => MaterialProperties {
                density: 1.4,
                cost_per_area: 8.0,
                cutting_speed: 1.0,
                waste_factor: 0.06,
            },
            Material::Fabric => MaterialProperties {
                density: 0.3,
                cost_per_area: 20.0,
                cutting_speed: 1.5,
                waste_factor: 0.15,
            },
            _ => MaterialProperties {
                density: 1.0,
                cost_per_area: 0.0,
                cutting_speed: 1.0,
                waste_factor: 0.05,
            },
        }
    }
}

/// Processing priority of an order. Higher weight wins when ordering work.
#[cfg_attr(feature = "serialize", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub enum Priority {
    /// Weight 1.
    Low,
    /// Weight 2.
    Medium,
    /// Weight 3.
    High,
    /// Weight 4.
    Urgent,
}

impl Priority {
    /// Integer weight used for stable ordering; higher is more urgent.
    pub fn weight(self) -> u8 {
        match self {
            Priority::Low => 1,
            Priority::Medium => 2,
            Priority::High => 3,
            Priority::Urgent => 4,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.weight().cmp(&other.weight())
    }
}

/// Optional provenance metadata carried by a stock sheet.
///
/// None of these fields affect placement; they exist so callers can round-
/// trip inventory data through the optimizer.
#[cfg_attr(feature = "serialize", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StockDetails {
    /// Warehouse location.
    pub location: Option<String>,
    /// Supplier name.
    pub supplier: Option<String>,
    /// Supplier batch number.
    pub batch: Option<String>,
    /// Quality grade.
    pub grade: Option<String>,
    /// When the sheet was purchased.
    pub purchase_date: Option<SystemTime>,
    /// When the sheet expires (adhesives, coatings).
    pub expiry_date: Option<SystemTime>,
}

/// A rectangular stock sheet that pieces are cut from.
#[cfg_attr(feature = "serialize", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
#[derive(Clone, Debug, PartialEq)]
pub struct Stock {
    /// Identifier, unique within one optimization run.
    pub id: String,
    /// Width of the sheet.
    pub width: f64,
    /// Height of the sheet.
    pub height: f64,
    /// Thickness of the sheet.
    pub thickness: f64,
    /// Material of the sheet.
    pub material: Material,
    /// Cost of using this sheet.
    pub cost: f64,
    /// Optional provenance metadata.
    pub details: StockDetails,
}

impl Stock {
    /// Creates a stock sheet with validated dimensions.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::InvalidDimensions`] when width, height, or
    /// thickness is not strictly positive, or the cost is negative.
    pub fn new(
        id: impl Into<String>,
        width: f64,
        height: f64,
        thickness: f64,
        material: Material,
        cost: f64,
    ) -> Result<Stock> {
        let id = id.into();
        if width <= 0.0 || height <= 0.0 {
            return Err(Error::InvalidDimensions(format!(
                "stock `{}` dimensions must be positive: {}x{}",
                id, width, height
            )));
        }
        if thickness <= 0.0 {
            return Err(Error::InvalidDimensions(format!(
                "stock `{}` thickness must be positive: {}",
                id, thickness
            )));
        }
        if cost < 0.0 {
            return Err(Error::InvalidDimensions(format!(
                "stock `{}` cost must not be negative: {}",
                id, cost
            )));
        }
        Ok(Stock {
            id,
            width,
            height,
            thickness,
            material,
            cost,
            details: StockDetails::default(),
        })
    }

    /// Area of the sheet in squared input units.
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Area of the sheet in square metres, assuming millimetre input units.
    pub fn area_m2(&self) -> f64 {
        self.area() / 1_000_000.0
    }

    /// Whether the sheet's expiry date has passed. `false` when no expiry
    /// date is set.
    pub fn is_expired(&self) -> bool {
        match self.details.expiry_date {
            Some(expiry) => expiry < SystemTime::now(),
            None => false,
        }
    }

    /// Estimated weight in kilograms, from the material's typical density
    /// and millimetre input units.
    pub fn weight_kg(&self) -> f64 {
        let density = MaterialProperties::defaults_for(self.material).density;
        self.area_m2() * self.thickness * density / 1000.0
    }

    /// The sheet's explicit cost, or an estimate from the material's
    /// typical cost per area when none was given.
    pub fn estimated_cost(&self) -> f64 {
        if self.cost > 0.0 {
            self.cost
        } else {
            self.area_m2() * MaterialProperties::defaults_for(self.material).cost_per_area
        }
    }
}

/// Optional commercial metadata carried by an order.
#[cfg_attr(feature = "serialize", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OrderDetails {
    /// Customer identifier.
    pub customer: Option<String>,
    /// Price per cut piece.
    pub unit_price: Option<f64>,
    /// When the order was placed.
    pub order_date: Option<SystemTime>,
    /// When the order is due.
    pub due_date: Option<SystemTime>,
}

/// An order for a number of identical pieces.
#[cfg_attr(feature = "serialize", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
#[derive(Clone, Debug, PartialEq)]
pub struct Order {
    /// Identifier, unique within one optimization run.
    pub id: String,
    /// Shape template; the position is resolved at placement time.
    pub shape: Shape,
    /// Number of identical pieces required.
    pub quantity: u32,
    /// Processing priority.
    pub priority: Priority,
    /// Required material.
    pub material: Material,
    /// Required thickness.
    pub thickness: f64,
    /// Allowed deviation between the order's and a stock's thickness.
    pub tolerance: f64,
    /// Optional commercial metadata.
    pub details: OrderDetails,
}

impl Order {
    /// Creates an order with validated quantity and tolerance.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::InvalidDimensions`] when the quantity is zero,
    /// the thickness is not strictly positive, or the tolerance is negative.
    pub fn new(
        id: impl Into<String>,
        shape: Shape,
        quantity: u32,
        priority: Priority,
        material: Material,
        thickness: f64,
        tolerance: f64,
    ) -> Result<Order> {
        let id = id.into();
        if quantity == 0 {
            return Err(Error::InvalidDimensions(format!(
                "order `{}` quantity must be positive",
                id
            )));
        }
        if thickness <= 0.0 {
            return Err(Error::InvalidDimensions(format!(
                "order `{}` thickness must be positive: {}",
                id, thickness
            )));
        }
        if tolerance < 0.0 {
            return Err(Error::InvalidDimensions(format!(
                "order `{}` tolerance must not be negative: {}",
                id, tolerance
            )));
        }
        Ok(Order {
            id,
            shape,
            quantity,
            priority,
            material,
            thickness,
            tolerance,
            details: OrderDetails::default(),
        })
    }

    /// Area of a single piece.
    pub fn piece_area(&self) -> f64 {
        self.shape.area()
    }

    /// Area of all pieces combined.
    pub fn total_area(&self) -> f64 {
        self.piece_area() * f64::from(self.quantity)
    }

    /// Total value of the order, if a unit price is known.
    pub fn total_value(&self) -> Option<f64> {
        self.details
            .unit_price
            .map(|price| price * f64::from(self.quantity))
    }

    /// Whether this order may be cut from the given stock: same material
    /// and thickness within tolerance.
    pub fn is_compatible_with(&self, stock: &Stock) -> bool {
        self.material == stock.material
            && (self.thickness - stock.thickness).abs() <= self.tolerance
    }

    /// Whole days until the due date, negative when overdue. `None` when
    /// no due date is set.
    pub fn days_until_due(&self) -> Option<i64> {
        let due = self.details.due_date?;
        const DAY: u64 = 24 * 60 * 60;
        let now = SystemTime::now();
        match due.duration_since(now) {
            Ok(remaining) => Some((remaining.as_secs() / DAY) as i64),
            Err(elapsed) => Some(-((elapsed.duration().as_secs() / DAY) as i64)),
        }
    }
}

/// One piece placed on a stock sheet by the optimizer.
#[cfg_attr(feature = "serialize", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
#[derive(Clone, Debug, PartialEq)]
pub struct PlacedShape {
    /// Identifier of the originating order.
    pub order_id: String,
    /// Identifier of the stock the piece was placed on.
    pub stock_id: String,
    /// Shape template of the piece.
    pub shape: Shape,
    /// X coordinate of the bounding-box origin within the stock.
    pub x: f64,
    /// Y coordinate of the bounding-box origin within the stock.
    pub y: f64,
    /// Applied rotation.
    pub rotation: Rotation,
    /// Position of this piece in the cutting sequence.
    pub cutting_sequence: usize,
}

impl PlacedShape {
    /// Position of the piece as `(x, y)`.
    pub fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    /// Area of the piece.
    pub fn area(&self) -> f64 {
        self.shape.area()
    }

    /// The piece's resolved geometry.
    pub fn footprint(&self) -> Footprint {
        Footprint::new(self.shape, self.x, self.y, self.rotation)
    }
}

/// Diagnostic metadata attached to a [`CuttingResult`].
#[cfg_attr(feature = "serialize", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResultMetadata {
    /// The soft deadline expired and the best solution found so far was
    /// finalized early.
    pub early_terminated: bool,
    /// The primary algorithm produced an invalid layout and the result came
    /// from the conservative first-fit fallback instead.
    pub degraded: bool,
    /// At least one order's quantity was truncated by the per-order
    /// expansion cap.
    pub expansion_capped: bool,
    /// Generations run by a genetic solver, when one was used.
    pub generations_run: Option<usize>,
    /// Iterations run by the annealing solver, when it was used.
    pub iterations_run: Option<usize>,
    /// Free-form diagnostic notes.
    pub notes: Vec<String>,
}

/// The outcome of one optimization run.
#[cfg_attr(feature = "serialize", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
#[derive(Clone, Debug, PartialEq)]
pub struct CuttingResult {
    /// Every piece that was placed, in cutting-sequence order.
    pub placed: Vec<PlacedShape>,
    /// Orders (with residual quantities) that could not be fully placed.
    pub unfulfilled_orders: Vec<Order>,
    /// Number of distinct stocks holding at least one piece.
    pub total_stock_used: usize,
    /// Number of original orders with every piece placed.
    pub total_orders_fulfilled: usize,
    /// Placed area as a percentage of the used stocks' area, in `[0, 100]`.
    pub efficiency: f64,
    /// Sum of the unit costs of the used stocks.
    pub total_cost: f64,
    /// Wall-clock time the optimization took.
    pub computation_time: Duration,
    /// Name of the algorithm that produced the layout.
    pub algorithm: String,
    /// Diagnostic metadata.
    pub metadata: ResultMetadata,
}

impl CuttingResult {
    /// Waste percentage, the complement of [`efficiency`](Self::efficiency).
    pub fn waste(&self) -> f64 {
        100.0 - self.efficiency
    }

    /// Total area of all placed pieces.
    pub fn used_area(&self) -> f64 {
        self.placed.iter().map(PlacedShape::area).sum()
    }

    /// Fulfilled orders as a percentage of all orders. 100 when there were
    /// no orders at all.
    pub fn fulfillment_rate(&self) -> f64 {
        let total = self.total_orders_fulfilled + self.unfulfilled_orders.len();
        if total == 0 {
            return 100.0;
        }
        self.total_orders_fulfilled as f64 / total as f64 * 100.0
    }

    /// Pieces placed on one specific stock.
    pub fn shapes_on<'a>(&'a self, stock_id: &'a str) -> impl Iterator<Item = &'a PlacedShape> {
        self.placed.iter().filter(move |ps| ps.stock_id == stock_id)
    }

    /// Percentage of one stock's area covered by its placements.
    pub fn stock_efficiency(&self, stock: &Stock) -> f64 {
        if stock.area() <= 0.0 {
            return 0.0;
        }
        let used: f64 = self.shapes_on(&stock.id).map(PlacedShape::area).sum();
        used / stock.area() * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(thickness: f64, tolerance: f64, material: Material) -> Order {
        Order::new(
            "o1",
            Shape::rect(100.0, 50.0).unwrap(),
            2,
            Priority::High,
            material,
            thickness,
            tolerance,
        )
        .unwrap()
    }

    #[test]
    fn priority_orders_by_weight() {
        assert!(Priority::Urgent > Priority::High);
        assert!(Priority::High > Priority::Medium);
        assert!(Priority::Medium > Priority::Low);
        assert_eq!(Priority::Urgent.weight(), 4);
    }

    #[test]
    fn material_round_trips_through_str() {
        for material in [
            Material::Glass,
            Material::Metal,
            Material::Wood,
            Material::Plastic,
            Material::Fabric,
            Material::Leather,
            Material::Paper,
            Material::Ceramic,
            Material::Composite,
        ] {
            assert_eq!(material.as_str().parse::<Material>().unwrap(), material);
        }
        assert!("granite".parse::<Material>().is_err());
    }

    #[test]
    fn stock_constructor_validates() {
        assert!(Stock::new("s", 0.0, 10.0, 1.0, Material::Wood, 0.0).is_err());
        assert!(Stock::new("s", 10.0, 10.0, 0.0, Material::Wood, 0.0).is_err());
        assert!(Stock::new("s", 10.0, 10.0, 1.0, Material::Wood, -5.0).is_err());
        let stock = Stock::new("s", 2000.0, 1000.0, 6.0, Material::Glass, 40.0).unwrap();
        assert_eq!(stock.area(), 2_000_000.0);
        assert!((stock.area_m2() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn order_constructor_validates() {
        let shape = Shape::rect(10.0, 10.0).unwrap();
        assert!(Order::new("o", shape, 0, Priority::Low, Material::Wood, 6.0, 0.0).is_err());
        assert!(Order::new("o", shape, 1, Priority::Low, Material::Wood, 0.0, 0.0).is_err());
        assert!(Order::new("o", shape, 1, Priority::Low, Material::Wood, 6.0, -1.0).is_err());
    }

    #[test]
    fn compatibility_needs_material_and_thickness() {
        let stock = Stock::new("s", 1000.0, 1000.0, 6.0, Material::Glass, 0.0).unwrap();
        assert!(order(6.0, 0.0, Material::Glass).is_compatible_with(&stock));
        assert!(order(6.5, 0.5, Material::Glass).is_compatible_with(&stock));
        assert!(!order(6.6, 0.5, Material::Glass).is_compatible_with(&stock));
        assert!(!order(6.0, 0.0, Material::Metal).is_compatible_with(&stock));
    }

    #[test]
    fn order_areas_scale_with_quantity() {
        let order = order(6.0, 0.0, Material::Glass);
        assert_eq!(order.piece_area(), 5000.0);
        assert_eq!(order.total_area(), 10_000.0);
        assert_eq!(order.total_value(), None);
    }

    #[test]
    fn material_properties_feed_stock_reporters() {
        // 1 m² of 10 mm metal: 7.8 kg/m²/mm · 10 mm = 78 kg.
        let stock = Stock::new("m", 1000.0, 1000.0, 10.0, Material::Metal, 0.0).unwrap();
        assert!((stock.weight_kg() - 78.0).abs() < 1e-9);
        // No explicit cost, so the material's cost per area applies.
        assert!((stock.estimated_cost() - 25.0).abs() < 1e-9);

        let priced = Stock::new("p", 1000.0, 1000.0, 10.0, Material::Metal, 99.0).unwrap();
        assert_eq!(priced.estimated_cost(), 99.0);

        // Materials without tabulated costs estimate zero.
        let ceramic = Stock::new("c", 1000.0, 1000.0, 10.0, Material::Ceramic, 0.0).unwrap();
        assert_eq!(ceramic.estimated_cost(), 0.0);
    }

    #[test]
    fn stock_efficiency_measures_one_sheet() {
        let stock = Stock::new("s1", 1000.0, 1000.0, 5.0, Material::Wood, 0.0).unwrap();
        let result = CuttingResult {
            placed: vec![PlacedShape {
                order_id: "o".to_string(),
                stock_id: "s1".to_string(),
                shape: Shape::rect(500.0, 500.0).unwrap(),
                x: 0.0,
                y: 0.0,
                rotation: Rotation::R0,
                cutting_sequence: 0,
            }],
            unfulfilled_orders: Vec::new(),
            total_stock_used: 1,
            total_orders_fulfilled: 1,
            efficiency: 25.0,
            total_cost: 0.0,
            computation_time: Duration::default(),
            algorithm: "test".to_string(),
            metadata: ResultMetadata::default(),
        };
        assert!((result.stock_efficiency(&stock) - 25.0).abs() < 1e-9);

        let other = Stock::new("s2", 1000.0, 1000.0, 5.0, Material::Wood, 0.0).unwrap();
        assert_eq!(result.stock_efficiency(&other), 0.0);
    }

    #[test]
    fn due_dates_report_whole_days() {
        const DAY: u64 = 24 * 60 * 60;
        let mut order = order(6.0, 0.0, Material::Glass);
        assert_eq!(order.days_until_due(), None);

        order.details.due_date = Some(SystemTime::now() + Duration::from_secs(3 * DAY + 60));
        assert_eq!(order.days_until_due(), Some(3));

        order.details.due_date = Some(SystemTime::now() - Duration::from_secs(2 * DAY + 60));
        assert_eq!(order.days_until_due(), Some(-2));
    }

    #[test]
    fn expiry_is_checked_against_now() {
        let mut stock = Stock::new("s", 100.0, 100.0, 1.0, Material::Leather, 0.0).unwrap();
        assert!(!stock.is_expired());
        stock.details.expiry_date = Some(SystemTime::now() - Duration::from_secs(60));
        assert!(stock.is_expired());
        stock.details.expiry_date = Some(SystemTime::now() + Duration::from_secs(3600));
        assert!(!stock.is_expired());
    }

    #[test]
    fn fulfillment_rate_handles_empty_result() {
        let result = CuttingResult {
            placed: Vec::new(),
            unfulfilled_orders: Vec::new(),
            total_stock_used: 0,
            total_orders_fulfilled: 0,
            efficiency: 0.0,
            total_cost: 0.0,
            computation_time: Duration::default(),
            algorithm: "none".to_string(),
            metadata: ResultMetadata::default(),
        };
        assert_eq!(result.fulfillment_rate(), 100.0);
        assert_eq!(result.waste(), 100.0);
    }
}
