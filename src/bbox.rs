use kurbo::{Affine, Point, Rect};

/// Axis-aligned device-space bounding box with an explicit empty state.
///
/// Empty is the inverted sentinel (min = +inf, max = -inf), distinguishable
/// from a zero-area box at a real position. Used to accumulate the pixel
/// extent of a filtered subtree.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DeviceBounds {
    pub min: Point,
    pub max: Point,
}

impl DeviceBounds {
    pub const EMPTY: DeviceBounds = DeviceBounds {
        min: Point::new(f64::INFINITY, f64::INFINITY),
        max: Point::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
    };

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y
    }

    pub fn insert_point(&mut self, p: Point) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
    }

    /// Componentwise min/max union. An empty side adopts the other verbatim.
    pub fn union(&mut self, other: &DeviceBounds) {
        if other.is_empty() {
            return;
        }
        self.insert_point(other.min);
        self.insert_point(other.max);
    }

    /// Union in the box of a user-space rect mapped through `transform`.
    /// All four corners are mapped so rotation and skew are covered.
    pub fn union_rect(&mut self, transform: Affine, rect: Rect) {
        for corner in [
            Point::new(rect.x0, rect.y0),
            Point::new(rect.x1, rect.y0),
            Point::new(rect.x1, rect.y1),
            Point::new(rect.x0, rect.y1),
        ] {
            self.insert_point(transform * corner);
        }
    }

    pub fn width(&self) -> f64 {
        (self.max.x - self.min.x).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.max.y - self.min.y).max(0.0)
    }
}

impl Default for DeviceBounds {
    fn default() -> Self {
        Self::EMPTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxed(x0: f64, y0: f64, x1: f64, y1: f64) -> DeviceBounds {
        let mut b = DeviceBounds::EMPTY;
        b.insert_point(Point::new(x0, y0));
        b.insert_point(Point::new(x1, y1));
        b
    }

    #[test]
    fn empty_is_distinguishable_from_zero_area() {
        assert!(DeviceBounds::EMPTY.is_empty());
        let zero = boxed(3.0, 3.0, 3.0, 3.0);
        assert!(!zero.is_empty());
        assert_eq!(zero.width(), 0.0);
    }

    #[test]
    fn empty_adopts_first_box_verbatim() {
        let mut b = DeviceBounds::EMPTY;
        let a = boxed(1.0, 2.0, 3.0, 4.0);
        b.union(&a);
        assert_eq!(b, a);
    }

    #[test]
    fn union_is_commutative_and_minimal() {
        let a = boxed(0.0, 0.0, 2.0, 2.0);
        let b = boxed(1.0, -1.0, 5.0, 1.0);

        let mut ab = a;
        ab.union(&b);
        let mut ba = b;
        ba.union(&a);
        assert_eq!(ab, ba);
        assert_eq!(ab, boxed(0.0, -1.0, 5.0, 2.0));
    }

    #[test]
    fn union_with_empty_is_identity() {
        let a = boxed(0.0, 0.0, 2.0, 2.0);
        let mut u = a;
        u.union(&DeviceBounds::EMPTY);
        assert_eq!(u, a);
    }

    #[test]
    fn union_rect_maps_all_corners() {
        let mut b = DeviceBounds::EMPTY;
        let rot = Affine::rotate(std::f64::consts::FRAC_PI_2);
        b.union_rect(rot, Rect::new(0.0, 0.0, 2.0, 1.0));
        // Rotating 90 degrees about the origin lands the rect at x in [-1, 0], y in [0, 2].
        assert!((b.min.x + 1.0).abs() < 1e-9);
        assert!((b.min.y - 0.0).abs() < 1e-9);
        assert!((b.max.x - 0.0).abs() < 1e-9);
        assert!((b.max.y - 2.0).abs() < 1e-9);
    }
}
