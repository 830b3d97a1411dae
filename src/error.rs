//! Error types returned by validation and optimization.

use crate::model::Material;
use thiserror::Error;

/// Error while validating inputs or optimizing.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A dimension, radius, thickness, precision, or timeout was zero or
    /// negative.
    #[error("invalid dimensions: {0}")]
    InvalidDimensions(String),

    /// A shape was malformed, such as a polygon with fewer than three
    /// vertices or a rotation that is not a multiple of 90 degrees.
    #[error("invalid shape: {0}")]
    InvalidShape(String),

    /// The aggregate ordered area for a material exceeds the aggregate stock
    /// area available for that material.
    #[error(
        "insufficient {material} stock: {stock_area} available for {order_area} ordered"
    )]
    InsufficientStock {
        /// Material with too little stock.
        material: Material,
        /// Total stock area available for the material.
        stock_area: f64,
        /// Total area ordered for the material.
        order_area: f64,
    },

    /// Any other input inconsistency, such as a duplicate stock identifier
    /// or an order with no compatible material.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The optimizer produced a result that violates an invariant and the
    /// conservative fallback could not repair the run.
    #[error("optimization failed: {0}")]
    Optimization(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
