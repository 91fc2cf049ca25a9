use crate::basis;
use crate::driver::SpatialInterpolator;
use crate::error::{InterpolationError, Result};
use crate::linalg::{LeastSquaresSystem, LsqrSettings};
use crate::locate::{LocatorKind, PointLocator};
use crate::mesh::{Mesh, Point, Triangle};

use tracing::{debug, warn};

/// Minimum number of located observations needed to orient a plane
pub const MIN_FIT_OBSERVATIONS: usize = 3;

/// Infers nodal values from scattered observations by regularized least squares
///
/// Each observation contributes one equation: the barycentric combination of the three nodes of
/// the triangle which contains it must equal the observed value. `reg_weight · I` is stacked under
/// those equations (Tikhonov regularization), and the system is solved with LSQR.
///
/// Nodes which are far from every observation are pulled toward **zero** (the regularization
/// target), not toward an extrapolated value. Callers that need defined values everywhere should
/// prefer the [ScatteredInterpolator](crate::scattered::ScatteredInterpolator), or keep
/// `reg_weight` small and the observation network dense.
pub struct LeastSquaresFitter {
    num_nodes: usize,
    triangles: Vec<Triangle>,
    locator: Box<dyn PointLocator>,
    reg_weight: f64,
    settings: LsqrSettings,
}

impl LeastSquaresFitter {
    pub fn new(mesh: &Mesh, locator: LocatorKind, reg_weight: f64, settings: LsqrSettings) -> Self {
        Self {
            num_nodes: mesh.num_nodes(),
            triangles: mesh.triangles().to_vec(),
            locator: locator.build(mesh.triangle_geometry()),
            reg_weight,
            settings,
        }
    }

    pub fn reg_weight(&self) -> f64 {
        self.reg_weight
    }

    /// Node indices and barycentric weights of the triangle containing `point`
    ///
    /// # Returns
    /// * A `PointNotLocated` Error if the point is outside the mesh
    /// * A `DegenerateGeometry` Error if its triangle has collapsed
    pub fn observation_row(&self, point: &Point) -> Result<([usize; 3], [f64; 3])> {
        let tri_idx = self
            .locator
            .locate(point)
            .ok_or(InterpolationError::PointNotLocated {
                x: point.x,
                y: point.y,
            })?;
        let triangle = &self.triangles[tri_idx];

        let weights = basis::barycentric(self.locator.triangle(tri_idx), point)
            .map_err(|err| err.at(triangle.element, point))?;
        Ok((triangle.nodes, weights))
    }

    /// Build the un-regularized observation equations
    ///
    /// Observations which cannot be weighted are dropped with a warning, NaN values silently.
    /// Returns the system and the number of observations which were kept.
    pub fn observation_system(&self, observations: &[(Point, f64)]) -> (LeastSquaresSystem, usize) {
        let mut system = LeastSquaresSystem::new(self.num_nodes);

        for (point, value) in observations {
            if !value.is_finite() {
                continue;
            }

            match self.observation_row(point) {
                Ok((nodes, weights)) => system.push_row(nodes.into_iter().zip(weights), *value),
                Err(err) => warn!(%err, "observation dropped"),
            }
        }

        let located = system.num_rows();
        (system, located)
    }

    /// Fit one value per mesh node (in node order)
    pub fn fit(&self, observations: &[(Point, f64)]) -> Result<Vec<f64>> {
        let (mut system, located) = self.observation_system(observations);
        if located < MIN_FIT_OBSERVATIONS {
            return Err(InterpolationError::InsufficientObservations {
                found: located,
                required: MIN_FIT_OBSERVATIONS,
            });
        }

        system.regularize(self.reg_weight);
        let solution = system.solve(&self.settings)?;

        debug!(
            observations = located,
            iterations = solution.iterations,
            residual = solution.residual_norm,
            "least squares fit converged"
        );

        Ok(solution.x)
    }
}

impl SpatialInterpolator for LeastSquaresFitter {
    fn interpolate(&self, observations: &[(Point, f64)]) -> Result<Vec<f64>> {
        self.fit(observations)
    }

    fn name(&self) -> &'static str {
        "least_squares"
    }
}
