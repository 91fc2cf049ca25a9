/// Bowyer-Watson Delaunay triangulation
pub mod delaunay;

pub use delaunay::Triangulation;

use crate::basis;
use crate::driver::SpatialInterpolator;
use crate::error::{InterpolationError, Result};
use crate::locate::{IndexedLocator, PointLocator};
use crate::mesh::{Mesh, Point};

use rstar::primitives::GeomWithData;
use rstar::RTree;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Minimum number of distinct observations needed to interpolate
pub const MIN_SCATTERED_OBSERVATIONS: usize = 3;

type IndexedPoint = GeomWithData<[f64; 2], usize>;

/// Piecewise-linear interpolation over a Delaunay triangulation of the observations
/// (rather than of the model mesh), evaluated at a fixed set of target points
///
/// Targets outside the convex hull of the observations take the value of the nearest observation,
/// so every target receives a value whenever at least 3 distinct observations are available. If the
/// observations cannot be triangulated (co-linear points), every target falls back to its nearest
/// observation.
pub struct ScatteredInterpolator {
    targets: Vec<Point>,
}

/// Interpolant built for one set of observations
struct Interpolant {
    points: Vec<Point>,
    values: Vec<f64>,
    nearest: RTree<IndexedPoint>,
    /// Delaunay triangles (vertex indices) and a locator over their geometry
    linear: Option<(Vec<[usize; 3]>, IndexedLocator)>,
}

impl ScatteredInterpolator {
    /// Interpolate onto the nodes of a Mesh
    pub fn new(mesh: &Mesh) -> Self {
        Self::with_targets(mesh.node_points())
    }

    pub fn with_targets(targets: Vec<Point>) -> Self {
        Self { targets }
    }

    pub fn targets(&self) -> &[Point] {
        &self.targets
    }

    /// One value per target, in target order
    ///
    /// Observations with a non-finite value or location are ignored. When several observations
    /// share a location, the first one is used.
    pub fn interpolate_at_targets(&self, observations: &[(Point, f64)]) -> Result<Vec<f64>> {
        let interpolant = Interpolant::new(observations)?;
        Ok(self
            .targets
            .iter()
            .map(|target| interpolant.evaluate(target))
            .collect())
    }
}

impl SpatialInterpolator for ScatteredInterpolator {
    fn interpolate(&self, observations: &[(Point, f64)]) -> Result<Vec<f64>> {
        self.interpolate_at_targets(observations)
    }

    fn name(&self) -> &'static str {
        "delaunay"
    }
}

impl Interpolant {
    fn new(observations: &[(Point, f64)]) -> Result<Self> {
        let mut seen = HashSet::new();
        let (points, values): (Vec<Point>, Vec<f64>) = observations
            .iter()
            .filter(|(p, v)| v.is_finite() && p.is_finite())
            .filter(|(p, _)| seen.insert(p.key()))
            .copied()
            .unzip();

        if points.len() < MIN_SCATTERED_OBSERVATIONS {
            return Err(InterpolationError::InsufficientObservations {
                found: points.len(),
                required: MIN_SCATTERED_OBSERVATIONS,
            });
        }

        let nearest = RTree::bulk_load(
            points
                .iter()
                .enumerate()
                .map(|(idx, p)| GeomWithData::new(p.as_array(), idx))
                .collect(),
        );

        let linear = match Triangulation::new(points.clone()) {
            Ok(triangulation) => {
                debug!(
                    observations = points.len(),
                    triangles = triangulation.triangles().len(),
                    "triangulated observations"
                );
                let locator = IndexedLocator::new(triangulation.triangle_geometry());
                Some((triangulation.triangles().to_vec(), locator))
            }
            Err(err) => {
                warn!(%err, "falling back to nearest-neighbour interpolation");
                None
            }
        };

        Ok(Self {
            points,
            values,
            nearest,
            linear,
        })
    }

    fn evaluate(&self, target: &Point) -> f64 {
        let nearest = match self.nearest.nearest_neighbor(&target.as_array()) {
            Some(item) => item.data,
            None => return f64::NAN,
        };

        // coincident with an observation: reproduce it exactly
        if self.points[nearest].key() == target.key() {
            return self.values[nearest];
        }

        self.linear
            .as_ref()
            .and_then(|(triangles, locator)| {
                let tri_idx = locator.locate(target)?;
                let weights = basis::barycentric(locator.triangle(tri_idx), target).ok()?;
                Some(
                    triangles[tri_idx]
                        .iter()
                        .zip(weights)
                        .map(|(&v, w)| w * self.values[v])
                        .sum(),
                )
            })
            .unwrap_or(self.values[nearest])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::tests::quad_strip_mesh;
    use proptest::prelude::*;

    fn corner_observations() -> Vec<(Point, f64)> {
        vec![
            (Point::new(0.0, 0.0), 1.0),
            (Point::new(1.0, 0.0), 2.0),
            (Point::new(0.0, 1.0), 3.0),
        ]
    }

    #[test]
    fn linear_inside_nearest_outside() {
        let interp = ScatteredInterpolator::with_targets(vec![
            Point::new(0.25, 0.25),
            Point::new(10.0, 0.1),
            Point::new(-5.0, 4.0),
        ]);
        let values = interp.interpolate_at_targets(&corner_observations()).unwrap();

        assert!((values[0] - 1.75).abs() < 1e-12);
        assert_eq!(values[1], 2.0);
        assert_eq!(values[2], 3.0);
    }

    #[test]
    fn linear_field_under_shallow_arc() {
        let field = |p: &Point| 2.0 + 0.01 * p.x + 3.0 * p.y;
        let mut wells: Vec<Point> = (0..12)
            .map(|k| {
                let t = k as f64 / 11.0;
                Point::new(1000.0 * t, 5.0 * t * (1.0 - t))
            })
            .collect();
        wells.push(Point::new(500.0, -0.5));
        let observations: Vec<(Point, f64)> = wells.iter().map(|p| (*p, field(p))).collect();

        let targets: Vec<Point> = (1..10).map(|i| Point::new(100.0 * i as f64, 0.3)).collect();
        let interp = ScatteredInterpolator::with_targets(targets.clone());
        let values = interp.interpolate_at_targets(&observations).unwrap();

        for (target, v) in targets.iter().zip(values) {
            assert!((v - field(target)).abs() < 1e-8, "{} at {}", v, target);
        }
    }

    #[test]
    fn reproduces_observations_exactly() {
        let observations = vec![
            (Point::new(0.0, 0.0), 1.3),
            (Point::new(2.0, 0.0), -0.7),
            (Point::new(2.0, 1.0), 5.1),
            (Point::new(0.0, 1.0), 2.9),
            (Point::new(1.1, 0.4), 0.123456789),
        ];
        let interp =
            ScatteredInterpolator::with_targets(observations.iter().map(|(p, _)| *p).collect());
        let values = interp.interpolate_at_targets(&observations).unwrap();

        for ((_, expected), v) in observations.iter().zip(values) {
            assert_eq!(*expected, v);
        }
    }

    #[test]
    fn colinear_observations_use_nearest_neighbour() {
        let interp = ScatteredInterpolator::with_targets(vec![
            Point::new(0.9, 1.2),
            Point::new(2.0, 2.0),
            Point::new(-1.0, -3.0),
        ]);
        let values = interp
            .interpolate_at_targets(&[
                (Point::new(0.0, 0.0), 1.0),
                (Point::new(1.0, 1.0), 2.0),
                (Point::new(2.0, 2.0), 3.0),
            ])
            .unwrap();

        assert_eq!(values, vec![2.0, 3.0, 1.0]);
    }

    #[test]
    fn invalid_and_duplicate_observations() {
        let interp = ScatteredInterpolator::with_targets(vec![Point::new(0.0, 0.0)]);

        let mut observations = corner_observations();
        observations.insert(0, (Point::new(0.5, 0.5), f64::NAN));
        observations.push((Point::new(0.0, 0.0), 99.0));
        assert_eq!(interp.interpolate_at_targets(&observations).unwrap(), vec![1.0]);

        let err = interp
            .interpolate_at_targets(&[
                (Point::new(0.0, 0.0), 1.0),
                (Point::new(0.0, 0.0), 2.0),
                (Point::new(1.0, 0.0), f64::NAN),
                (Point::new(0.0, 1.0), 3.0),
            ])
            .unwrap_err();
        assert_eq!(
            err,
            InterpolationError::InsufficientObservations {
                found: 2,
                required: 3
            }
        );
    }

    #[test]
    fn every_mesh_node_is_defined() {
        let mesh = quad_strip_mesh();
        let interp = ScatteredInterpolator::new(&mesh);
        let values = interp
            .interpolate_at_targets(&[
                (Point::new(0.4, 0.4), 1.0),
                (Point::new(0.6, 0.4), 2.0),
                (Point::new(0.5, 0.6), 3.0),
            ])
            .unwrap();

        assert_eq!(values.len(), mesh.num_nodes());
        assert!(values.iter().all(|v| v.is_finite()));
    }

    proptest! {
        #[test]
        fn linear_field_inside_hull(x in 0.05..0.95f64, y in 0.05..0.95f64) {
            let f = |p: &Point| 4.0 - 2.0 * p.x + 0.5 * p.y;
            let observations: Vec<(Point, f64)> = [
                Point::new(0.0, 0.0),
                Point::new(1.0, 0.0),
                Point::new(1.0, 1.0),
                Point::new(0.0, 1.0),
                Point::new(0.3, 0.6),
            ]
            .iter()
            .map(|p| (*p, f(p)))
            .collect();

            let target = Point::new(x, y);
            let interp = ScatteredInterpolator::with_targets(vec![target]);
            let values = interp.interpolate_at_targets(&observations).unwrap();
            prop_assert!((values[0] - f(&target)).abs() < 1e-9);
        }
    }
}
