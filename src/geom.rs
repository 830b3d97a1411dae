//! Geometry kernel: shapes, bounding boxes, overlap and containment tests.
//!
//! All overlap tests are exact with zero tolerance. Touching edges do not
//! count as overlap, so two pieces may share a cut line when no kerf is
//! configured.

use crate::error::{Error, Result};

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// A quarter-turn rotation applied to a placed shape.
///
/// Circles ignore rotation. For axis-aligned rectangles 180° and 270° are
/// symmetries of 0° and 90°, but all four values are representable so
/// externally produced layouts round-trip.
#[cfg_attr(feature = "serialize", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub enum Rotation {
    /// No rotation.
    R0,
    /// Rotated 90 degrees.
    R90,
    /// Rotated 180 degrees.
    R180,
    /// Rotated 270 degrees.
    R270,
}

impl Default for Rotation {
    fn default() -> Self {
        Rotation::R0
    }
}

impl Rotation {
    /// Creates a rotation from a degree value, normalizing modulo 360.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::InvalidShape`] when the angle is not a multiple
    /// of 90 degrees.
    pub fn from_degrees(degrees: i32) -> Result<Rotation> {
        let normalized = degrees.rem_euclid(360);
        match normalized {
            0 => Ok(Rotation::R0),
            90 => Ok(Rotation::R90),
            180 => Ok(Rotation::R180),
            270 => Ok(Rotation::R270),
            other => Err(Error::InvalidShape(format!(
                "rotation must be a multiple of 90 degrees, got {}",
                other
            ))),
        }
    }

    /// Returns the rotation as degrees in `{0, 90, 180, 270}`.
    pub fn degrees(self) -> i32 {
        match self {
            Rotation::R0 => 0,
            Rotation::R90 => 90,
            Rotation::R180 => 180,
            Rotation::R270 => 270,
        }
    }

    /// Returns this rotation advanced by a quarter turn.
    pub fn quarter_turned(self) -> Rotation {
        match self {
            Rotation::R0 => Rotation::R90,
            Rotation::R90 => Rotation::R180,
            Rotation::R180 => Rotation::R270,
            Rotation::R270 => Rotation::R0,
        }
    }

    /// Whether this rotation swaps a rectangle's width and height.
    pub fn swaps_axes(self) -> bool {
        matches!(self, Rotation::R90 | Rotation::R270)
    }
}

/// A shape template: dimensions without a position.
///
/// Positions and rotations are resolved when a shape is placed on a stock;
/// see [`Footprint`].
#[cfg_attr(feature = "serialize", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Shape {
    /// An axis-aligned rectangle.
    Rect {
        /// Width of the rectangle.
        width: f64,
        /// Height of the rectangle.
        height: f64,
    },
    /// A circle, placed by its bounding-box origin.
    Circle {
        /// Radius of the circle.
        radius: f64,
    },
}

impl Shape {
    /// Creates a rectangle template.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::InvalidDimensions`] when either dimension is not
    /// strictly positive.
    pub fn rect(width: f64, height: f64) -> Result<Shape> {
        if width <= 0.0 || height <= 0.0 || !width.is_finite() || !height.is_finite() {
            return Err(Error::InvalidDimensions(format!(
                "rectangle dimensions must be positive: {}x{}",
                width, height
            )));
        }
        Ok(Shape::Rect { width, height })
    }

    /// Creates a circle template.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::InvalidDimensions`] when the radius is not
    /// strictly positive.
    pub fn circle(radius: f64) -> Result<Shape> {
        if radius <= 0.0 || !radius.is_finite() {
            return Err(Error::InvalidDimensions(format!(
                "circle radius must be positive: {}",
                radius
            )));
        }
        Ok(Shape::Circle { radius })
    }

    /// Area of the shape.
    pub fn area(&self) -> f64 {
        match *self {
            Shape::Rect { width, height } => width * height,
            Shape::Circle { radius } => std::f64::consts::PI * radius * radius,
        }
    }

    /// Bounding-box dimensions after applying a rotation.
    ///
    /// Circles are rotation-invariant; rectangles swap axes on quarter
    /// turns.
    pub fn oriented_dims(&self, rotation: Rotation) -> (f64, f64) {
        match *self {
            Shape::Rect { width, height } => {
                if rotation.swaps_axes() {
                    (height, width)
                } else {
                    (width, height)
                }
            }
            Shape::Circle { radius } => (2.0 * radius, 2.0 * radius),
        }
    }

    /// Whether the shape fits inside a `width` × `height` rectangle without
    /// rotation.
    pub fn fits_within(&self, width: f64, height: f64) -> bool {
        let (w, h) = self.oriented_dims(Rotation::R0);
        w <= width && h <= height
    }

    /// Whether the shape is a rectangle with distinct side lengths, i.e.
    /// rotating it actually changes its footprint.
    pub fn rotation_matters(&self) -> bool {
        match *self {
            Shape::Rect { width, height } => width != height,
            Shape::Circle { .. } => false,
        }
    }
}

/// A shape resolved to a concrete position and rotation.
///
/// The position is the bounding-box origin (bottom-left corner) for both
/// rectangles and circles.
#[cfg_attr(feature = "serialize", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Footprint {
    /// The shape template.
    pub shape: Shape,
    /// X coordinate of the bounding-box origin.
    pub x: f64,
    /// Y coordinate of the bounding-box origin.
    pub y: f64,
    /// Applied rotation.
    pub rotation: Rotation,
}

impl Footprint {
    /// Places a shape at a position with a rotation.
    pub fn new(shape: Shape, x: f64, y: f64, rotation: Rotation) -> Footprint {
        Footprint {
            shape,
            x,
            y,
            rotation,
        }
    }

    /// Area of the underlying shape.
    pub fn area(&self) -> f64 {
        self.shape.area()
    }

    /// Bounding box as `(xmin, ymin, xmax, ymax)`.
    pub fn bounding_box(&self) -> (f64, f64, f64, f64) {
        let (w, h) = self.shape.oriented_dims(self.rotation);
        (self.x, self.y, self.x + w, self.y + h)
    }

    /// Moves the footprint by `(dx, dy)`.
    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.x += dx;
        self.y += dy;
    }

    /// Rotates the footprint by a number of degrees.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::InvalidShape`] when the angle is not a multiple
    /// of 90 degrees.
    pub fn rotate(&mut self, degrees: i32) -> Result<()> {
        let delta = Rotation::from_degrees(degrees)?;
        let mut rotation = self.rotation;
        for _ in 0..delta.degrees() / 90 {
            rotation = rotation.quarter_turned();
        }
        self.rotation = rotation;
        Ok(())
    }

    /// Whether the point `(px, py)` lies inside the shape (boundary
    /// inclusive).
    pub fn contains_point(&self, px: f64, py: f64) -> bool {
        match self.shape {
            Shape::Rect { .. } => {
                let (xmin, ymin, xmax, ymax) = self.bounding_box();
                px >= xmin && px <= xmax && py >= ymin && py <= ymax
            }
            Shape::Circle { radius } => {
                let (cx, cy) = self.center();
                let dx = px - cx;
                let dy = py - cy;
                dx * dx + dy * dy <= radius * radius
            }
        }
    }

    /// Whether the footprint lies entirely inside a stock rectangle of the
    /// given dimensions whose origin is at `(0, 0)`.
    pub fn contained_in(&self, stock_width: f64, stock_height: f64) -> bool {
        let (xmin, ymin, xmax, ymax) = self.bounding_box();
        xmin >= 0.0 && ymin >= 0.0 && xmax <= stock_width && ymax <= stock_height
    }

    /// Returns a copy grown by `margin` on every side.
    ///
    /// Used to enforce kerf clearance: inflating every occupied shape by
    /// half the cutting width keeps cuts at least one kerf apart. The
    /// bounding-box origin shifts so the shape's center is preserved.
    pub fn inflate(&self, margin: f64) -> Footprint {
        if margin <= 0.0 {
            return *self;
        }
        let shape = match self.shape {
            Shape::Rect { width, height } => Shape::Rect {
                width: width + 2.0 * margin,
                height: height + 2.0 * margin,
            },
            Shape::Circle { radius } => Shape::Circle {
                radius: radius + margin,
            },
        };
        Footprint {
            shape,
            x: self.x - margin,
            y: self.y - margin,
            rotation: self.rotation,
        }
    }

    /// Center point of the footprint.
    pub fn center(&self) -> (f64, f64) {
        let (xmin, ymin, xmax, ymax) = self.bounding_box();
        ((xmin + xmax) / 2.0, (ymin + ymax) / 2.0)
    }

    /// Corner points of the oriented bounding box, counter-clockwise from
    /// the origin corner.
    fn corners(&self) -> [(f64, f64); 4] {
        let (xmin, ymin, xmax, ymax) = self.bounding_box();
        [(xmin, ymin), (xmax, ymin), (xmax, ymax), (xmin, ymax)]
    }

    /// Whether this footprint overlaps another.
    ///
    /// Touching boundaries are not overlap. Dispatches on the shape pair:
    /// rectangle/rectangle uses interval tests (quarter-turn rectangles stay
    /// axis-aligned; the general separating-axis test backs the same
    /// answer), circle/circle compares center distance to the radius sum,
    /// and circle/rectangle measures the center's distance to the
    /// rectangle's edges.
    pub fn overlaps(&self, other: &Footprint) -> bool {
        match (self.shape, other.shape) {
            (Shape::Rect { .. }, Shape::Rect { .. }) => {
                // Quarter-turn rectangles stay axis-aligned, so the strict
                // interval test is exact; the general separating-axis test
                // must agree with it.
                let (axmin, aymin, axmax, aymax) = self.bounding_box();
                let (bxmin, bymin, bxmax, bymax) = other.bounding_box();
                let overlap =
                    axmax > bxmin && bxmax > axmin && aymax > bymin && bymax > aymin;
                debug_assert_eq!(overlap, sat_overlap(&self.corners(), &other.corners()));
                overlap
            }
            (Shape::Circle { radius: r1 }, Shape::Circle { radius: r2 }) => {
                let (ax, ay) = self.center();
                let (bx, by) = other.center();
                let dx = bx - ax;
                let dy = by - ay;
                let reach = r1 + r2;
                dx * dx + dy * dy < reach * reach
            }
            (Shape::Circle { radius }, Shape::Rect { .. }) => {
                circle_overlaps_rect(self.center(), radius, other)
            }
            (Shape::Rect { .. }, Shape::Circle { radius }) => {
                circle_overlaps_rect(other.center(), radius, self)
            }
        }
    }
}

fn circle_overlaps_rect(center: (f64, f64), radius: f64, rect: &Footprint) -> bool {
    let (cx, cy) = center;
    if rect.contains_point(cx, cy) {
        return true;
    }
    let corners = rect.corners();
    for i in 0..4 {
        let a = corners[i];
        let b = corners[(i + 1) % 4];
        if point_segment_distance(cx, cy, a, b) < radius {
            return true;
        }
    }
    false
}

/// Distance from a point to a line segment.
fn point_segment_distance(px: f64, py: f64, a: (f64, f64), b: (f64, f64)) -> f64 {
    let (x1, y1) = a;
    let (x2, y2) = b;
    let dx = x2 - x1;
    let dy = y2 - y1;
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return ((px - x1).powi(2) + (py - y1).powi(2)).sqrt();
    }
    let t = ((px - x1) * dx + (py - y1) * dy) / len_sq;
    let (nx, ny) = if t < 0.0 {
        (x1, y1)
    } else if t > 1.0 {
        (x2, y2)
    } else {
        (x1 + t * dx, y1 + t * dy)
    };
    ((px - nx).powi(2) + (py - ny).powi(2)).sqrt()
}

/// Separating Axis Theorem overlap test for two convex polygons given as
/// corner lists.
///
/// The polygons do not overlap iff some edge normal of either polygon
/// separates their projections. Projections that merely touch are treated
/// as separated, matching the strict interval rule for axis-aligned
/// rectangles.
pub(crate) fn sat_overlap(a: &[(f64, f64)], b: &[(f64, f64)]) -> bool {
    !has_separating_axis(a, b) && !has_separating_axis(b, a)
}

fn has_separating_axis(edges_of: &[(f64, f64)], other: &[(f64, f64)]) -> bool {
    let n = edges_of.len();
    for i in 0..n {
        let (x1, y1) = edges_of[i];
        let (x2, y2) = edges_of[(i + 1) % n];
        // Normal to the edge; no need to normalize for interval comparison.
        let axis = (y1 - y2, x2 - x1);
        if axis.0 == 0.0 && axis.1 == 0.0 {
            continue;
        }
        let (min_a, max_a) = project(edges_of, axis);
        let (min_b, max_b) = project(other, axis);
        if max_a <= min_b || max_b <= min_a {
            return true;
        }
    }
    false
}

fn project(points: &[(f64, f64)], axis: (f64, f64)) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &(x, y) in points {
        let d = x * axis.0 + y * axis.1;
        if d < min {
            min = d;
        }
        if d > max {
            max = d;
        }
    }
    (min, max)
}
