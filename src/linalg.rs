/// Iterative sparse least-squares solver
pub mod lsqr;
/// Sparsely Packed Matrix
pub mod sparse_matrix;

pub use lsqr::{lsqr, LsqrSettings, LsqrSolution};
pub use sparse_matrix::{CsrMatrix, SparseMatrix};

/// Euclidean norm of a vector
pub(crate) fn norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Overdetermined (or regularized) linear system `min ||Ax - b||`
#[derive(Clone, Debug)]
pub struct LeastSquaresSystem {
    /// A Matrix
    pub a: SparseMatrix,
    /// Right hand side
    pub b: Vec<f64>,
}

impl LeastSquaresSystem {
    pub fn new(num_unknowns: usize) -> Self {
        Self {
            a: SparseMatrix::new(0, num_unknowns),
            b: Vec::new(),
        }
    }

    pub fn num_rows(&self) -> usize {
        self.b.len()
    }

    /// Append one equation `Σ w_j x_j = rhs`
    pub fn push_row(&mut self, entries: impl IntoIterator<Item = (usize, f64)>, rhs: f64) {
        let row = self.a.num_rows;
        self.a.num_rows += 1;
        self.a
            .insert_group(entries.into_iter().map(|(col, w)| ([row, col], w)));
        self.b.push(rhs);
    }

    /// Stack `weight · I` under the existing equations with a zero right hand side
    pub fn regularize(&mut self, weight: f64) {
        let num_unknowns = self.a.num_cols;
        self.a.append_scaled_identity(weight);
        self.b.extend(std::iter::repeat(0.0).take(num_unknowns));
    }

    pub fn solve(self, settings: &LsqrSettings) -> crate::error::Result<LsqrSolution> {
        let a: CsrMatrix = self.a.into();
        lsqr(&a, &self.b, settings)
    }
}
