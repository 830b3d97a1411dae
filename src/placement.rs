//! Placement primitives shared by every algorithm: per-stock occupancy,
//! skyline-pruned bottom-left search, coarse-grid search, and feasibility
//! tests with kerf clearance.
//!
//! These services are pure with respect to stocks and orders; they only
//! mutate the [`Occupancy`] owned by the calling algorithm.

use crate::geom::{Footprint, Rotation, Shape};
use smallvec::SmallVec;

/// One piecewise-constant segment of the skyline.
#[derive(Copy, Clone, Debug, PartialEq)]
struct SkySegment {
    x: f64,
    width: f64,
    top: f64,
}

/// Upper envelope of occupied heights indexed by x.
///
/// Built from bounding boxes, so circles contribute their bounding square.
/// The skyline is a pruning structure for bottom-left search; exact overlap
/// tests always run on the real shapes afterwards.
#[derive(Clone, Debug)]
pub(crate) struct Skyline {
    width: f64,
    segments: SmallVec<[SkySegment; 8]>,
}

impl Skyline {
    fn new(width: f64) -> Skyline {
        let mut segments = SmallVec::new();
        segments.push(SkySegment {
            x: 0.0,
            width,
            top: 0.0,
        });
        Skyline { width, segments }
    }

    /// Raises the envelope to at least `top` over `[xmin, xmax]`.
    fn raise(&mut self, xmin: f64, xmax: f64, top: f64) {
        let xmin = xmin.max(0.0);
        let xmax = xmax.min(self.width);
        if xmax <= xmin {
            return;
        }

        let mut rebuilt: SmallVec<[SkySegment; 8]> = SmallVec::new();
        for seg in self.segments.iter() {
            let seg_end = seg.x + seg.width;
            let lo = seg.x.max(xmin);
            let hi = seg_end.min(xmax);
            if hi <= lo || seg.top >= top {
                rebuilt.push(*seg);
                continue;
            }
            if lo > seg.x {
                rebuilt.push(SkySegment {
                    x: seg.x,
                    width: lo - seg.x,
                    top: seg.top,
                });
            }
            rebuilt.push(SkySegment {
                x: lo,
                width: hi - lo,
                top,
            });
            if seg_end > hi {
                rebuilt.push(SkySegment {
                    x: hi,
                    width: seg_end - hi,
                    top: seg.top,
                });
            }
        }

        // Merge equal-height neighbours to keep the segment count down.
        let mut merged: SmallVec<[SkySegment; 8]> = SmallVec::new();
        for seg in rebuilt {
            match merged.last_mut() {
                Some(last) if last.top == seg.top => last.width += seg.width,
                _ => merged.push(seg),
            }
        }
        self.segments = merged;
    }

    /// Maximum envelope height over `[xmin, xmax]`: a lower bound on the y
    /// at which a shape spanning that x range can sit without crossing any
    /// occupied bounding box.
    pub(crate) fn height_over(&self, xmin: f64, xmax: f64) -> f64 {
        let mut top: f64 = 0.0;
        for seg in self.segments.iter() {
            let seg_end = seg.x + seg.width;
            if seg_end > xmin && seg.x < xmax {
                top = top.max(seg.top);
            }
        }
        top
    }
}

/// Shapes already placed on one stock, with the stock's dimensions.
#[derive(Clone, Debug)]
pub(crate) struct Occupancy {
    width: f64,
    height: f64,
    placed: Vec<Footprint>,
    skyline: Skyline,
}

impl Occupancy {
    pub(crate) fn new(width: f64, height: f64) -> Occupancy {
        Occupancy {
            width,
            height,
            placed: Vec::new(),
            skyline: Skyline::new(width),
        }
    }

    /// Records a placed shape. The caller is responsible for feasibility.
    pub(crate) fn place(&mut self, footprint: Footprint) {
        let (xmin, _, xmax, ymax) = footprint.bounding_box();
        self.skyline.raise(xmin, xmax, ymax);
        self.placed.push(footprint);
    }

    /// Removes the shape at `index` and rebuilds the skyline.
    pub(crate) fn remove(&mut self, index: usize) -> Footprint {
        let removed = self.placed.remove(index);
        let mut skyline = Skyline::new(self.width);
        for fp in &self.placed {
            let (xmin, _, xmax, ymax) = fp.bounding_box();
            skyline.raise(xmin, xmax, ymax);
        }
        self.skyline = skyline;
        removed
    }

    /// Whether `shape` at `(x, y, rotation)` is contained in the stock and
    /// clear of every occupied shape, each inflated by half the kerf.
    pub(crate) fn is_feasible(
        &self,
        shape: Shape,
        x: f64,
        y: f64,
        rotation: Rotation,
        kerf: f64,
    ) -> bool {
        let candidate = Footprint::new(shape, x, y, rotation);
        if !candidate.contained_in(self.width, self.height) {
            return false;
        }
        // Both sides grow by half the kerf, enforcing a full kerf of
        // clearance between cuts. Containment stays on the raw shape.
        let margin = kerf / 2.0;
        let inflated = candidate.inflate(margin);
        // Fast accept: a candidate that starts above the skyline over its
        // (kerf-widened) x range cannot touch any occupied bounding box.
        let (xmin, ymin, xmax, _) = candidate.bounding_box();
        if ymin
            >= self
                .skyline
                .height_over(xmin - 2.0 * margin, xmax + 2.0 * margin)
                + 2.0 * margin
        {
            return true;
        }
        self.placed
            .iter()
            .all(|occupied| !occupied.inflate(margin).overlaps(&inflated))
    }

    /// Candidate positions for a `w` × `h` bounding box in bottom-left
    /// order: x from `{0}` ∪ right extents, y from `{0}` ∪ top extents,
    /// filtered by fit and sorted by (y ascending, x ascending).
    pub(crate) fn bottom_left_candidates(&self, w: f64, h: f64) -> Vec<(f64, f64)> {
        let mut xs: SmallVec<[f64; 16]> = SmallVec::new();
        let mut ys: SmallVec<[f64; 16]> = SmallVec::new();
        xs.push(0.0);
        ys.push(0.0);
        for fp in &self.placed {
            let (_, _, xmax, ymax) = fp.bounding_box();
            xs.push(xmax);
            ys.push(ymax);
        }
        sort_dedup(&mut xs);
        sort_dedup(&mut ys);

        let mut candidates = Vec::with_capacity(xs.len() * ys.len());
        for &y in ys.iter() {
            if y + h > self.height {
                continue;
            }
            for &x in xs.iter() {
                if x + w > self.width {
                    continue;
                }
                candidates.push((x, y));
            }
        }
        candidates
    }

    /// First feasible position scanning a regular grid row by row from the
    /// bottom-left, trying each allowed rotation at every grid point.
    pub(crate) fn first_fit_grid(
        &self,
        shape: Shape,
        allow_rotation: bool,
        kerf: f64,
        step: f64,
    ) -> Option<(f64, f64, Rotation)> {
        let rotations = rotations_for(shape, allow_rotation);
        let mut y = 0.0;
        while y <= self.height {
            let mut x = 0.0;
            while x <= self.width {
                for &rotation in rotations.iter() {
                    if self.is_feasible(shape, x, y, rotation, kerf) {
                        return Some((x, y, rotation));
                    }
                }
                x += step;
            }
            y += step;
        }
        None
    }

    /// Lowest-then-leftmost feasible position over the bottom-left
    /// candidate set, considering each allowed rotation.
    pub(crate) fn best_bottom_left(
        &self,
        shape: Shape,
        allow_rotation: bool,
        kerf: f64,
    ) -> Option<(f64, f64, Rotation)> {
        let mut best: Option<(f64, f64, Rotation)> = None;
        for rotation in rotations_for(shape, allow_rotation) {
            let (w, h) = shape.oriented_dims(rotation);
            for (x, y) in self.bottom_left_candidates(w, h) {
                if self.is_feasible(shape, x, y, rotation, kerf) {
                    let better = match best {
                        None => true,
                        Some((bx, by, _)) => y < by || (y == by && x < bx),
                    };
                    if better {
                        best = Some((x, y, rotation));
                    }
                    // Candidates are (y, x) sorted, so the first feasible
                    // one is the minimum for this rotation.
                    break;
                }
            }
        }
        best
    }
}

/// Rotations worth trying for a shape: circles and squares are rotation-
/// invariant, rectangles add a quarter turn when rotation is allowed.
/// 180°/270° are axis-aligned symmetries and never enumerated.
pub(crate) fn rotations_for(shape: Shape, allow_rotation: bool) -> SmallVec<[Rotation; 2]> {
    let mut rotations: SmallVec<[Rotation; 2]> = SmallVec::new();
    rotations.push(Rotation::R0);
    if allow_rotation && shape.rotation_matters() {
        rotations.push(Rotation::R90);
    }
    rotations
}

fn sort_dedup(values: &mut SmallVec<[f64; 16]>) {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    values.dedup();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(w: f64, h: f64) -> Shape {
        Shape::rect(w, h).unwrap()
    }

    #[test]
    fn skyline_starts_flat_and_raises() {
        let mut skyline = Skyline::new(100.0);
        assert_eq!(skyline.height_over(0.0, 100.0), 0.0);

        skyline.raise(0.0, 40.0, 30.0);
        assert_eq!(skyline.height_over(0.0, 40.0), 30.0);
        assert_eq!(skyline.height_over(40.0, 100.0), 0.0);
        assert_eq!(skyline.height_over(30.0, 50.0), 30.0);
    }

    #[test]
    fn skyline_keeps_higher_segments() {
        let mut skyline = Skyline::new(100.0);
        skyline.raise(0.0, 60.0, 50.0);
        skyline.raise(20.0, 80.0, 20.0);
        assert_eq!(skyline.height_over(0.0, 60.0), 50.0);
        assert_eq!(skyline.height_over(60.0, 80.0), 20.0);
    }

    #[test]
    fn place_updates_skyline() {
        let mut occ = Occupancy::new(100.0, 100.0);
        occ.place(Footprint::new(rect(40.0, 30.0), 0.0, 0.0, Rotation::R0));
        assert_eq!(occ.skyline.height_over(0.0, 40.0), 30.0);
        assert!(occ.is_feasible(rect(40.0, 30.0), 0.0, 30.0, Rotation::R0, 0.0));
        assert!(!occ.is_feasible(rect(40.0, 30.0), 0.0, 29.0, Rotation::R0, 0.0));
    }

    #[test]
    fn remove_rebuilds_skyline() {
        let mut occ = Occupancy::new(100.0, 100.0);
        occ.place(Footprint::new(rect(40.0, 30.0), 0.0, 0.0, Rotation::R0));
        occ.place(Footprint::new(rect(20.0, 10.0), 50.0, 0.0, Rotation::R0));
        let removed = occ.remove(0);
        assert_eq!(removed.bounding_box(), (0.0, 0.0, 40.0, 30.0));
        assert_eq!(occ.skyline.height_over(0.0, 40.0), 0.0);
        assert_eq!(occ.skyline.height_over(50.0, 70.0), 10.0);
    }

    #[test]
    fn bottom_left_candidates_are_sorted_by_y_then_x() {
        let mut occ = Occupancy::new(100.0, 100.0);
        occ.place(Footprint::new(rect(30.0, 20.0), 0.0, 0.0, Rotation::R0));
        let candidates = occ.bottom_left_candidates(30.0, 20.0);
        assert!(!candidates.is_empty());
        for pair in candidates.windows(2) {
            let (x0, y0) = pair[0];
            let (x1, y1) = pair[1];
            assert!(y0 < y1 || (y0 == y1 && x0 < x1));
        }
        // Candidates are positions to try, not yet feasibility-filtered.
        assert_eq!(candidates[0], (0.0, 0.0));
        assert!(candidates.contains(&(30.0, 0.0)));
        assert!(candidates.contains(&(0.0, 20.0)));
    }

    #[test]
    fn best_bottom_left_prefers_lowest_position() {
        let mut occ = Occupancy::new(100.0, 100.0);
        occ.place(Footprint::new(rect(60.0, 20.0), 0.0, 0.0, Rotation::R0));
        let (x, y, rotation) = occ.best_bottom_left(rect(40.0, 40.0), false, 0.0).unwrap();
        assert_eq!((x, y), (60.0, 0.0));
        assert_eq!(rotation, Rotation::R0);
    }

    #[test]
    fn best_bottom_left_uses_rotation_when_needed() {
        let occ = Occupancy::new(50.0, 100.0);
        // 80x40 only fits the 50x100 sheet rotated.
        assert!(occ.best_bottom_left(rect(80.0, 40.0), false, 0.0).is_none());
        let (x, y, rotation) = occ.best_bottom_left(rect(80.0, 40.0), true, 0.0).unwrap();
        assert_eq!((x, y), (0.0, 0.0));
        assert_eq!(rotation, Rotation::R90);
    }

    #[test]
    fn first_fit_grid_scans_rows_bottom_up() {
        let mut occ = Occupancy::new(100.0, 100.0);
        occ.place(Footprint::new(rect(100.0, 10.0), 0.0, 0.0, Rotation::R0));
        let (x, y, _) = occ
            .first_fit_grid(rect(20.0, 20.0), false, 0.0, 10.0)
            .unwrap();
        assert_eq!((x, y), (0.0, 10.0));
    }

    #[test]
    fn kerf_inflation_blocks_tight_neighbours() {
        let mut occ = Occupancy::new(1000.0, 1000.0);
        occ.place(Footprint::new(rect(500.0, 500.0), 0.0, 0.0, Rotation::R0));
        // Without kerf the twin fits flush; with a 3-wide kerf it does not.
        assert!(occ.is_feasible(rect(500.0, 500.0), 500.0, 0.0, Rotation::R0, 0.0));
        assert!(!occ.is_feasible(rect(500.0, 500.0), 500.0, 0.0, Rotation::R0, 3.0));
        assert!(occ.is_feasible(rect(490.0, 490.0), 503.0, 0.0, Rotation::R0, 3.0));
    }

    #[test]
    fn circles_use_exact_overlap_not_bounding_box() {
        let mut occ = Occupancy::new(100.0, 100.0);
        occ.place(Footprint::new(Shape::circle(20.0).unwrap(), 0.0, 0.0, Rotation::R0));
        // A small circle tucked into the corner gap beyond the quarter
        // circle: bounding boxes overlap but the shapes do not.
        let small = Shape::circle(2.0).unwrap();
        assert!(occ.is_feasible(small, 36.0, 0.0, Rotation::R0, 0.0));
        assert!(!occ.is_feasible(small, 20.0, 20.0, Rotation::R0, 0.0));
    }

    #[test]
    fn rotations_for_skips_squares_and_circles() {
        assert_eq!(rotations_for(rect(10.0, 10.0), true).len(), 1);
        assert_eq!(rotations_for(Shape::circle(5.0).unwrap(), true).len(), 1);
        assert_eq!(rotations_for(rect(10.0, 20.0), true).len(), 2);
        assert_eq!(rotations_for(rect(10.0, 20.0), false).len(), 1);
    }
}
