use crate::basis;
use crate::mesh::Point;

use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{RTree, AABB};

/// Strategy for finding the triangle which contains a point
///
/// Implementations must be deterministic: when a point lies on an edge shared by several triangles,
/// the triangle with the lowest index is reported.
pub trait PointLocator: Send + Sync {
    /// Index of the first triangle whose closure contains `point`; `None` if it is outside every triangle
    fn locate(&self, point: &Point) -> Option<usize>;

    /// Vertex coordinates of a triangle
    fn triangle(&self, idx: usize) -> &[Point; 3];

    fn num_triangles(&self) -> usize;
}

/// Which [PointLocator] to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocatorKind {
    /// Linear scan over all triangles
    BruteForce,
    /// R-tree over the triangles' bounding boxes
    #[default]
    Indexed,
}

impl LocatorKind {
    pub fn build(&self, triangles: Vec<[Point; 3]>) -> Box<dyn PointLocator> {
        match self {
            Self::BruteForce => Box::new(BruteForceLocator::new(triangles)),
            Self::Indexed => Box::new(IndexedLocator::new(triangles)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::BruteForce => "brute_force",
            Self::Indexed => "indexed",
        }
    }
}

/// Tests every triangle in order
pub struct BruteForceLocator {
    triangles: Vec<[Point; 3]>,
}

impl BruteForceLocator {
    pub fn new(triangles: Vec<[Point; 3]>) -> Self {
        Self { triangles }
    }
}

impl PointLocator for BruteForceLocator {
    fn locate(&self, point: &Point) -> Option<usize> {
        self.triangles
            .iter()
            .position(|tri| basis::triangle_contains(tri, point))
    }

    fn triangle(&self, idx: usize) -> &[Point; 3] {
        &self.triangles[idx]
    }

    fn num_triangles(&self) -> usize {
        self.triangles.len()
    }
}

type IndexedRect = GeomWithData<Rectangle<[f64; 2]>, usize>;

/// Queries an R-tree of triangle bounding boxes, then tests the candidates in index order
pub struct IndexedLocator {
    triangles: Vec<[Point; 3]>,
    tree: RTree<IndexedRect>,
}

impl IndexedLocator {
    pub fn new(triangles: Vec<[Point; 3]>) -> Self {
        let rects = triangles
            .iter()
            .enumerate()
            .map(|(idx, [a, b, c])| {
                // pad the boxes slightly so that points on an edge still hit them after rounding
                let pad = 1e-9 * (1.0 + a.x.abs().max(a.y.abs()));
                let min = [
                    a.x.min(b.x).min(c.x) - pad,
                    a.y.min(b.y).min(c.y) - pad,
                ];
                let max = [
                    a.x.max(b.x).max(c.x) + pad,
                    a.y.max(b.y).max(c.y) + pad,
                ];
                GeomWithData::new(Rectangle::from_corners(min, max), idx)
            })
            .collect();

        Self {
            triangles,
            tree: RTree::bulk_load(rects),
        }
    }
}

impl PointLocator for IndexedLocator {
    fn locate(&self, point: &Point) -> Option<usize> {
        let envelope = AABB::from_point(point.as_array());

        let mut candidates: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|item| item.data)
            .collect();
        candidates.sort_unstable();

        candidates
            .into_iter()
            .find(|&idx| basis::triangle_contains(&self.triangles[idx], point))
    }

    fn triangle(&self, idx: usize) -> &[Point; 3] {
        &self.triangles[idx]
    }

    fn num_triangles(&self) -> usize {
        self.triangles.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::tests::{quad_strip_mesh, two_triangle_mesh};
    use proptest::prelude::*;

    #[test]
    fn locate_in_two_triangles() {
        let mesh = two_triangle_mesh();
        for kind in [LocatorKind::BruteForce, LocatorKind::Indexed] {
            let locator = kind.build(mesh.triangle_geometry());
            assert_eq!(locator.num_triangles(), 2);
            assert_eq!(locator.locate(&Point::new(0.25, 0.25)), Some(0));
            assert_eq!(locator.locate(&Point::new(0.5, 0.75)), Some(1));
            assert_eq!(locator.locate(&Point::new(1.5, 0.5)), None);
        }
    }

    #[test]
    fn shared_edge_resolves_to_first_triangle() {
        let mesh = two_triangle_mesh();
        for kind in [LocatorKind::BruteForce, LocatorKind::Indexed] {
            let locator = kind.build(mesh.triangle_geometry());
            // (0.75, 0.25) is on the diagonal shared by both triangles
            assert_eq!(locator.locate(&Point::new(0.75, 0.25)), Some(0));
            // shared vertex
            assert_eq!(locator.locate(&Point::new(1.0, 0.0)), Some(0));
            // vertex that belongs only to the second triangle
            assert_eq!(locator.locate(&Point::new(1.0, 1.0)), Some(1));
        }
    }

    proptest! {
        #[test]
        fn indexed_matches_brute_force(x in -0.5..2.5f64, y in -0.5..1.5f64) {
            let mesh = quad_strip_mesh();
            let brute = BruteForceLocator::new(mesh.triangle_geometry());
            let indexed = IndexedLocator::new(mesh.triangle_geometry());
            let p = Point::new(x, y);
            prop_assert_eq!(brute.locate(&p), indexed.locate(&p));
        }
    }
}
