use super::{norm, CsrMatrix};
use crate::error::{InterpolationError, Result};

/// Stopping criteria for [lsqr]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LsqrSettings {
    /// Relative error tolerance on the matrix
    pub atol: f64,
    /// Relative error tolerance on the right hand side
    pub btol: f64,
    /// Iteration cap (defaults to `max(4·n, 100)` for `n` unknowns)
    pub max_iterations: Option<usize>,
}

impl Default for LsqrSettings {
    fn default() -> Self {
        Self {
            atol: 1e-10,
            btol: 1e-10,
            max_iterations: None,
        }
    }
}

impl LsqrSettings {
    pub fn iteration_cap(&self, num_unknowns: usize) -> usize {
        self.max_iterations
            .unwrap_or_else(|| (4 * num_unknowns).max(100))
    }
}

#[derive(Debug, Clone)]
pub struct LsqrSolution {
    pub x: Vec<f64>,
    pub iterations: usize,
    /// Estimate of `||b - Ax||`
    pub residual_norm: f64,
}

/// Solve `min ||Ax - b||₂` with the LSQR algorithm of Paige & Saunders (1982)
///
/// Golub-Kahan bidiagonalization of A with the bidiagonal least-squares problem solved
/// incrementally by Givens rotations. Only `A·v` and `Aᵀ·u` products are needed.
///
/// Iteration stops when either
/// * `||r|| <= btol·||b|| + atol·||A||·||x||` (compatible system), or
/// * `||Aᵀr|| <= atol·||A||·||r||` (least-squares solution)
///
/// # Returns
/// * `SolverDidNotConverge` if neither test is satisfied within the iteration cap
/// * `NumericalSingularity` if the iterate stops being finite
pub fn lsqr(a: &CsrMatrix, b: &[f64], settings: &LsqrSettings) -> Result<LsqrSolution> {
    assert_eq!(
        b.len(),
        a.num_rows,
        "Right hand side length != number of rows; Cannot solve system!"
    );

    let n = a.num_cols;
    let mut x = vec![0.0; n];

    let bnorm = norm(b);
    if !bnorm.is_finite() {
        return Err(InterpolationError::NumericalSingularity);
    }
    if bnorm == 0.0 {
        return Ok(LsqrSolution {
            x,
            iterations: 0,
            residual_norm: 0.0,
        });
    }

    // u = b / β
    let mut beta = bnorm;
    let mut u: Vec<f64> = b.iter().map(|bi| bi / beta).collect();

    // v = Aᵀu / α
    let mut v = a.transpose_mul_vec(&u);
    let mut alpha = norm(&v);
    if alpha == 0.0 {
        // b is orthogonal to the range of A
        return Ok(LsqrSolution {
            x,
            iterations: 0,
            residual_norm: bnorm,
        });
    }
    scale(&mut v, 1.0 / alpha);

    let mut w = v.clone();
    let mut phibar = beta;
    let mut rhobar = alpha;
    let mut anorm_sq = 0.0;

    let cap = settings.iteration_cap(n);

    for itn in 1..=cap {
        // continue the bidiagonalization
        //   βu = Av - αu
        //   αv = Aᵀu - βv
        let av = a.mul_vec(&v);
        u.iter_mut().zip(av).for_each(|(ui, avi)| *ui = avi - alpha * *ui);
        beta = norm(&u);

        if beta > 0.0 {
            scale(&mut u, 1.0 / beta);
            anorm_sq += alpha * alpha + beta * beta;

            let atu = a.transpose_mul_vec(&u);
            v.iter_mut().zip(atu).for_each(|(vi, atui)| *vi = atui - beta * *vi);
            alpha = norm(&v);
            if alpha > 0.0 {
                scale(&mut v, 1.0 / alpha);
            }
        } else {
            anorm_sq += alpha * alpha;
        }

        // eliminate the subdiagonal element β with a plane rotation
        let rho = rhobar.hypot(beta);
        let c = rhobar / rho;
        let s = beta / rho;
        let theta = s * alpha;
        rhobar = -c * alpha;
        let phi = c * phibar;
        phibar *= s;

        // update x and the search direction w
        let t1 = phi / rho;
        let t2 = -theta / rho;
        for ((xi, wi), vi) in x.iter_mut().zip(w.iter_mut()).zip(v.iter()) {
            *xi += t1 * *wi;
            *wi = vi + t2 * *wi;
        }

        let xnorm = norm(&x);
        if !xnorm.is_finite() {
            return Err(InterpolationError::NumericalSingularity);
        }

        let anorm = anorm_sq.sqrt();
        let rnorm = phibar;
        let arnorm = alpha * c.abs() * phibar;

        let compatible = rnorm <= settings.btol * bnorm + settings.atol * anorm * xnorm;
        let least_squares = arnorm <= settings.atol * anorm * rnorm;

        if compatible || least_squares {
            return Ok(LsqrSolution {
                x,
                iterations: itn,
                residual_norm: rnorm,
            });
        }
    }

    Err(InterpolationError::SolverDidNotConverge { iterations: cap })
}

fn scale(v: &mut [f64], factor: f64) {
    v.iter_mut().for_each(|vi| *vi *= factor);
}
