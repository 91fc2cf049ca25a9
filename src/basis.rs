//! Interpolation weights for points inside a single element
//!
//! Triangles use barycentric weights. Quadrilaterals use the bilinear basis of the reference
//! square `[-1, 1]²` with corners ordered around the element:
//!
//! ```text
//!     3 ------------- 2        (-1, 1) ------ (1, 1)
//!     |               |           |              |
//!     |       p       |    <->    |  (xt, yt)    |
//!     |               |           |              |
//!     0 ------------- 1        (-1,-1) ------ (1,-1)
//! ```

use crate::error::InterpolationError;
use crate::mesh::{element, Point};

use nalgebra::{Matrix3, Vector3};
use smallvec::{smallvec, SmallVec};
use thiserror::Error;

/// Barycentric weights more negative than this put the point outside the triangle
pub const BARYCENTRIC_TOLERANCE: f64 = 1e-9;

/// Quadratic and linear coefficients below this magnitude (in normalized element coordinates) are treated as zero
const COEFF_EPSILON: f64 = 1e-12;

/// Local coordinates within this distance of ±1 are snapped onto the element boundary
const SNAP_TOLERANCE: f64 = 1e-12;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasisError {
    #[error("element geometry is a point or a line")]
    Degenerate,
    #[error("point lies outside the element")]
    Outside,
}

impl BasisError {
    /// The crate-level error for a failure to weight `point` within element `element`
    pub fn at(self, element: usize, point: &Point) -> InterpolationError {
        match self {
            Self::Degenerate => InterpolationError::DegenerateGeometry { element },
            Self::Outside => InterpolationError::PointNotLocated {
                x: point.x,
                y: point.y,
            },
        }
    }
}

/// Barycentric weights of `p` within a triangle, in vertex order
///
/// Solves the affine system `[x_i, y_i, 1]ᵀ λ = [x_p, y_p, 1]` (in coordinates relative to the first vertex).
/// Negative weights within [BARYCENTRIC_TOLERANCE] are clamped to zero and the weights renormalized.
///
/// # Returns
/// * `Degenerate` if the triangle has (nearly) zero area
/// * `Outside` if any weight is below `-BARYCENTRIC_TOLERANCE`
/// * Three non-negative weights summing to one otherwise
pub fn barycentric(tri: &[Point; 3], p: &Point) -> Result<[f64; 3], BasisError> {
    if element::is_collapsed(tri) {
        return Err(BasisError::Degenerate);
    }

    let origin = tri[0];
    let [a, b, c] = [tri[0] - origin, tri[1] - origin, tri[2] - origin];
    let q = *p - origin;

    let system = Matrix3::new(a.x, b.x, c.x, a.y, b.y, c.y, 1.0, 1.0, 1.0);
    let lambda = system
        .lu()
        .solve(&Vector3::new(q.x, q.y, 1.0))
        .ok_or(BasisError::Degenerate)?;

    if lambda.iter().any(|l| !l.is_finite()) {
        return Err(BasisError::Degenerate);
    }
    if lambda.iter().any(|&l| l < -BARYCENTRIC_TOLERANCE) {
        return Err(BasisError::Outside);
    }

    let mut weights = [lambda[0].max(0.0), lambda[1].max(0.0), lambda[2].max(0.0)];
    let total: f64 = weights.iter().sum();
    weights.iter_mut().for_each(|w| *w /= total);

    Ok(weights)
}

/// Whether the closed triangle contains `p`
pub fn triangle_contains(tri: &[Point; 3], p: &Point) -> bool {
    barycentric(tri, p).is_ok()
}

/// Bilinear weights of `p` within a quadrilateral, in vertex order
///
/// The local coordinates `(xt, yt)` are found from the two quadratics obtained by eliminating the other
/// coordinate from the bilinear map, then clamped onto `[-1, 1]`.
///
/// # Returns
/// * `Degenerate` if the quadrilateral is collapsed or the mapping cannot be inverted
/// * Four non-negative weights `0.25·(1∓xt)(1∓yt)` summing to one otherwise
pub fn bilinear(quad: &[Point; 4], p: &Point) -> Result<[f64; 4], BasisError> {
    let [xt, yt] = quad_local_coords(quad, p)?;

    Ok([
        0.25 * (1.0 - xt) * (1.0 - yt),
        0.25 * (1.0 + xt) * (1.0 - yt),
        0.25 * (1.0 + xt) * (1.0 + yt),
        0.25 * (1.0 - xt) * (1.0 + yt),
    ])
}

/// Interpolation weights for a triangle (3 points) or quadrilateral (4 points)
pub fn element_weights(vertices: &[Point], p: &Point) -> Result<SmallVec<[f64; 4]>, BasisError> {
    match vertices {
        [a, b, c] => Ok(SmallVec::from_slice(&barycentric(&[*a, *b, *c], p)?)),
        [a, b, c, d] => Ok(SmallVec::from_slice(&bilinear(&[*a, *b, *c, *d], p)?)),
        _ => panic!(
            "Elements must have 3 or 4 vertices (found {}); Cannot compute weights!",
            vertices.len()
        ),
    }
}

/// Local coordinates `(xt, yt)` ∈ `[-1, 1]²` of a point within a quadrilateral
pub fn quad_local_coords(quad: &[Point; 4], p: &Point) -> Result<[f64; 2], BasisError> {
    if element::is_collapsed(quad) {
        return Err(BasisError::Degenerate);
    }

    // normalize so that tolerances are scale independent
    let center = (quad[0] + quad[1] + quad[2] + quad[3]) / 4.0;
    let scale = quad
        .iter()
        .map(|q| (q.x - center.x).abs().max((q.y - center.y).abs()))
        .fold(0.0, f64::max);
    let local: SmallVec<[Point; 4]> = quad.iter().map(|&q| (q - center) / scale).collect();
    let d = (*p - center) / scale;

    // P(xt, yt) = a0 + a1·xt + a2·yt + a3·xt·yt, where a0 = 0 after centering
    let a1 = (local[1] + local[2] - local[0] - local[3]) / 4.0;
    let a2 = (local[2] + local[3] - local[0] - local[1]) / 4.0;
    let a3 = (local[0] + local[2] - local[1] - local[3]) / 4.0;

    // eliminating yt: (a1×a3)·xt² + (a1×a2 − d×a3)·xt − d×a2 = 0
    let xt_roots = quadratic_roots(a1.cross(&a3), a1.cross(&a2) - d.cross(&a3), -d.cross(&a2))?;
    // eliminating xt: (a2×a3)·yt² + (a2×a1 − d×a3)·yt − d×a1 = 0
    let yt_roots = quadratic_roots(a2.cross(&a3), a2.cross(&a1) - d.cross(&a3), -d.cross(&a1))?;

    // each quadratic has up to two roots; keep the pairing that maps back onto the point,
    // preferring the preimage inside the reference square
    let out_of_range = |t: f64| (t.abs() - 1.0).max(0.0);
    let score = |xt: f64, yt: f64| {
        let mapped = a1 * xt + a2 * yt + a3 * (xt * yt);
        mapped.dist(&d) + out_of_range(xt) + out_of_range(yt)
    };

    let (xt, yt) = xt_roots
        .iter()
        .flat_map(|&xt| yt_roots.iter().map(move |&yt| (xt, yt)))
        .min_by(|&(x0, y0), &(x1, y1)| score(x0, y0).total_cmp(&score(x1, y1)))
        .ok_or(BasisError::Degenerate)?;

    Ok([snap_to_reference(xt), snap_to_reference(yt)])
}

// Real roots of a·t² + b·t + c = 0 (a single root in the linear case)
fn quadratic_roots(a: f64, b: f64, c: f64) -> Result<SmallVec<[f64; 2]>, BasisError> {
    let roots: SmallVec<[f64; 2]> = if a.abs() <= COEFF_EPSILON {
        if b.abs() <= COEFF_EPSILON {
            return Err(BasisError::Degenerate);
        }
        smallvec![-c / b]
    } else {
        let mut disc = b * b - 4.0 * a * c;
        if disc < 0.0 {
            if disc < -COEFF_EPSILON * (b * b + (4.0 * a * c).abs()).max(1.0) {
                return Err(BasisError::Degenerate);
            }
            disc = 0.0;
        }

        // numerically stable pair of roots
        let q = -0.5 * (b + b.signum() * disc.sqrt());
        if q == 0.0 {
            smallvec![0.0]
        } else {
            smallvec![q / a, c / q]
        }
    };

    if roots.iter().all(|t| t.is_finite()) {
        Ok(roots)
    } else {
        Err(BasisError::Degenerate)
    }
}

fn snap_to_reference(t: f64) -> f64 {
    if (t.abs() - 1.0).abs() <= SNAP_TOLERANCE {
        t.signum()
    } else {
        t.clamp(-1.0, 1.0)
    }
}
