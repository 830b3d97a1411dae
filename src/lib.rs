//! cut-planner-2d solves the two-dimensional cutting-stock problem: given
//! rectangular stock sheets and ordered shapes (rectangles and circles)
//! with quantities and priorities, it produces a cutting plan in which no
//! two pieces overlap, every piece lies inside its sheet, material and
//! thickness match, and material utilization is maximized subject to order
//! priority.
//!
//! The optimizer offers greedy strategies (first-fit, best-fit,
//! bottom-left fill) and metaheuristics (a genetic algorithm, simulated
//! annealing, and an island-model hybrid with tabu refinement), selected
//! automatically from problem complexity or pinned through
//! [`OptimizationConfig::algorithm`]. Runs are reproducible when a master
//! seed is supplied.
//!
//! ```
//! use cut_planner_2d::{Material, Optimizer, Order, Priority, Shape, Stock};
//!
//! let result = Optimizer::new()
//!     .add_stock(Stock::new("sheet", 2000.0, 1000.0, 6.0, Material::Glass, 40.0)?)
//!     .add_order(Order::new(
//!         "tabletop",
//!         Shape::rect(800.0, 600.0)?,
//!         1,
//!         Priority::Urgent,
//!         Material::Glass,
//!         6.0,
//!         0.5,
//!     )?)
//!     .set_seed(1)
//!     .optimize()?;
//!
//! assert_eq!(result.placed.len(), 1);
//! assert!(result.efficiency > 0.0);
//! # Ok::<(), cut_planner_2d::Error>(())
//! ```

#![deny(missing_docs)]

mod config;
mod error;
mod evaluate;
mod geom;
mod model;
mod optimizer;
mod placement;
mod solvers;

pub mod validate;


pub use config::{
    AlgorithmKind, AnnealingParams, GeneticParams, HybridParams, OptimizationConfig,
};
pub use error::{Error, Result};
pub use geom::{Footprint, Rotation, Shape};
pub use model::{
    CuttingResult, Material, MaterialProperties, Order, OrderDetails, PlacedShape, Priority,
    ResultMetadata, Stock, StockDetails,
};
pub use optimizer::{optimize, Optimizer};
