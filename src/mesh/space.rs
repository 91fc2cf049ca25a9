use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Div, Mul, Sub};

/// Coordinates closer than this (after rounding) are considered to be the same location
const POINT_UNIQUENESS_ACCURACY: f64 = 1e-9;

#[derive(Clone, Copy, Debug, PartialEq)]
/// Point in the (planar, projected) model coordinate system
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn between(a: &Self, b: &Self) -> Self {
        Self::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0)
    }

    pub fn dist(&self, other: &Self) -> f64 {
        self.dist_sq(other).sqrt()
    }

    pub fn dist_sq(&self, other: &Self) -> f64 {
        (other.x - self.x).powi(2) + (other.y - self.y).powi(2)
    }

    /// z-component of the cross product of two vectors
    #[inline]
    pub fn cross(&self, other: &Self) -> f64 {
        self.x * other.y - self.y * other.x
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn as_array(&self) -> [f64; 2] {
        [self.x, self.y]
    }

    /// A hashable key which identifies Points sharing (almost) the same location
    pub(crate) fn key(&self) -> PointKey {
        PointKey {
            x: FloatRep::from(self.x),
            y: FloatRep::from(self.y),
        }
    }
}

impl Default for Point {
    fn default() -> Self {
        Self { x: 0.0, y: 0.0 }
    }
}

impl Add for Point {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y)
    }
}

impl Sub for Point {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y)
    }
}

impl Mul<f64> for Point {
    type Output = Self;

    fn mul(self, coefficient: f64) -> Self {
        Self::new(self.x * coefficient, self.y * coefficient)
    }
}

impl Div<f64> for Point {
    type Output = Self;

    fn div(self, divis: f64) -> Self {
        Self::new(self.x / divis, self.y / divis)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "(x: {:.4}, y: {:.4})", self.x, self.y)
    }
}

/// Axis aligned rectangle enclosing a set of Points
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub min: Point,
    pub max: Point,
}

impl BoundingBox {
    /// The smallest box containing every point; `None` for an empty iterator
    pub fn around<'a>(points: impl IntoIterator<Item = &'a Point>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = *points.next()?;

        Some(points.fold(
            Self {
                min: first,
                max: first,
            },
            |bb, p| Self {
                min: Point::new(bb.min.x.min(p.x), bb.min.y.min(p.y)),
                max: Point::new(bb.max.x.max(p.x), bb.max.y.max(p.y)),
            },
        ))
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> Point {
        Point::between(&self.min, &self.max)
    }

    pub fn contains(&self, p: &Point) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }
}

#[derive(Hash, PartialEq, Eq, Clone, Copy, Debug)]
pub(crate) struct PointKey {
    x: FloatRep,
    y: FloatRep,
}

#[derive(Hash, PartialEq, Eq, Clone, Copy, Debug)]
struct FloatRep {
    sign: bool,
    bits: u64,
}

impl FloatRep {
    fn from(value: f64) -> Self {
        let integer_part = value.abs().trunc();
        let fractional_rounded =
            (value.abs().fract() / POINT_UNIQUENESS_ACCURACY).round() * POINT_UNIQUENESS_ACCURACY;
        let total_rounded = integer_part + fractional_rounded;

        Self {
            sign: value.is_sign_positive() || total_rounded == 0.0,
            bits: total_rounded.to_bits(),
        }
    }
}

impl Ord for FloatRep {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.sign, other.sign) {
            (true, true) => self.bits.cmp(&other.bits),
            (false, true) => Ordering::Less,
            (true, false) => Ordering::Greater,
            (false, false) => self.bits.cmp(&other.bits).reverse(),
        }
    }
}

impl PartialOrd for FloatRep {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounding_box() {
        let pts = [
            Point::new(1.0, -2.0),
            Point::new(-3.0, 4.0),
            Point::new(0.5, 0.5),
        ];
        let bb = BoundingBox::around(pts.iter()).unwrap();
        assert_eq!(bb.min, Point::new(-3.0, -2.0));
        assert_eq!(bb.max, Point::new(1.0, 4.0));
        assert!(bb.contains(&Point::new(0.0, 0.0)));
        assert!(!bb.contains(&Point::new(2.0, 0.0)));
        assert!(BoundingBox::around(std::iter::empty::<&Point>()).is_none());
    }

    #[test]
    fn nearly_coincident_points_share_keys() {
        let a = Point::new(10.0, 20.0);
        let b = Point::new(10.0 + 1e-12, 20.0 - 1e-12);
        let c = Point::new(10.001, 20.0);
        assert_eq!(a.key(), b.key());
        assert_ne!(a.key(), c.key());
        assert_eq!(Point::new(-0.0, 0.0).key(), Point::new(0.0, 0.0).key());
    }

    #[test]
    fn vector_ops() {
        let a = Point::new(1.0, 0.0);
        let b = Point::new(0.0, 1.0);
        assert_eq!(a.cross(&b), 1.0);
        assert_eq!(b.cross(&a), -1.0);
        assert_eq!((a - b) * 2.0, Point::new(2.0, -2.0));
        assert!((a.dist(&b) - 2f64.sqrt()).abs() < 1e-15);
    }
}
