use super::Point;
use smallvec::{smallvec, SmallVec};

/// Relative area below which an element is considered to have collapsed
pub const MIN_RELATIVE_AREA: f64 = 1e-12;

/// The resolved connectivity of an element: indices into the Mesh's node list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementShape {
    Triangle([usize; 3]),
    /// vertices are ordered around the 4-cycle of the quadrilateral
    Quad([usize; 4]),
}

impl ElementShape {
    pub fn node_indices(&self) -> &[usize] {
        match self {
            Self::Triangle(idx) => idx,
            Self::Quad(idx) => idx,
        }
    }

    /// Split into triangles. Quads are cut along the diagonal joining their 1st and 3rd vertices
    pub fn split(&self) -> SmallVec<[[usize; 3]; 2]> {
        match *self {
            Self::Triangle(idx) => smallvec![idx],
            Self::Quad([a, b, c, d]) => smallvec![[a, b, c], [a, c, d]],
        }
    }
}

/// A mesh cell (triangle or quadrilateral)
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub id: u32,
    pub shape: ElementShape,
}

impl Element {
    pub fn new(id: u32, shape: ElementShape) -> Self {
        Self { id, shape }
    }

    pub fn is_quad(&self) -> bool {
        matches!(self.shape, ElementShape::Quad(_))
    }
}

/// A triangle of the (quad-split) mesh, remembering which Element it came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Triangle {
    pub element: usize,
    pub nodes: [usize; 3],
}

/// Twice the signed area of a polygon (positive when counter-clockwise)
pub fn signed_double_area(points: &[Point]) -> f64 {
    let n = points.len();
    (0..n)
        .map(|i| points[i].cross(&points[(i + 1) % n]))
        .sum()
}

/// Whether a polygon's area is negligible relative to its size
pub fn is_collapsed(points: &[Point]) -> bool {
    let n = points.len();
    let max_edge_sq = (0..n)
        .map(|i| points[i].dist_sq(&points[(i + 1) % n]))
        .fold(0.0, f64::max);

    if max_edge_sq == 0.0 || !max_edge_sq.is_finite() {
        return true;
    }

    // twice the area of each fan triangle must be non-negligible; a quad with a folded corner
    // still has non-zero total area, but one of its halves will collapse
    let fan_collapsed = (1..n - 1).any(|i| {
        let a = points[i] - points[0];
        let b = points[i + 1] - points[0];
        a.cross(&b).abs() <= MIN_RELATIVE_AREA * max_edge_sq
    });

    fan_collapsed || signed_double_area(points).abs() <= MIN_RELATIVE_AREA * max_edge_sq
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_split_uses_first_diagonal() {
        let quad = ElementShape::Quad([4, 5, 6, 7]);
        let tris = quad.split();
        assert_eq!(tris.len(), 2);
        assert_eq!(tris[0], [4, 5, 6]);
        assert_eq!(tris[1], [4, 6, 7]);

        let tri = ElementShape::Triangle([0, 1, 2]);
        assert_eq!(tri.split().as_slice(), &[[0, 1, 2]]);
    }

    #[test]
    fn polygon_area() {
        let square = [
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(0.0, 1.0),
        ];
        assert!((signed_double_area(&square) - 2.0).abs() < 1e-15);
        assert!(!is_collapsed(&square));

        let line = [
            Point::new(0.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(2.0, 2.0),
        ];
        assert!(is_collapsed(&line));
    }
}
