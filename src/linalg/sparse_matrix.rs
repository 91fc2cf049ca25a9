use std::collections::BTreeMap;

use nalgebra::DMatrix;

/// Wrapper around a BTreeMap to assemble rectangular matrices in a sparse data structure
///
/// Entries inserted at the same location are summed. Once assembled, the matrix is converted
/// into a [CsrMatrix] for fast products.
#[derive(Clone, Debug)]
pub struct SparseMatrix {
    pub num_rows: usize,
    pub num_cols: usize,
    /// Matrix Entries ([row, col] -> value)
    entries: BTreeMap<[u32; 2], f64>,
}

impl SparseMatrix {
    pub fn new(num_rows: usize, num_cols: usize) -> Self {
        assert!(
            num_rows <= (u32::MAX as usize) && num_cols <= (u32::MAX as usize),
            "Matrix Dimensions cannot exceed the size of a u32!"
        );

        Self {
            num_rows,
            num_cols,
            entries: BTreeMap::new(),
        }
    }

    /// Add a value into the matrix at `[row_idx, col_idx]`
    pub fn insert(&mut self, [row_idx, col_idx]: [usize; 2], value: f64) {
        assert!(
            row_idx < self.num_rows,
            "row_idx exceeded matrix dimension; cannot insert value!"
        );
        assert!(
            col_idx < self.num_cols,
            "col_idx exceeded matrix dimension; cannot insert value!"
        );

        *self
            .entries
            .entry([row_idx as u32, col_idx as u32])
            .or_insert(0.0) += value;
    }

    /// Insert a group of entries
    pub fn insert_group(&mut self, entry_group: impl IntoIterator<Item = ([usize; 2], f64)>) {
        for (rc, value) in entry_group {
            self.insert(rc, value);
        }
    }

    /// Append `weight · I` below the current rows (the matrix gains `num_cols` rows)
    pub fn append_scaled_identity(&mut self, weight: f64) {
        let first_row = self.num_rows;
        self.num_rows += self.num_cols;
        assert!(
            self.num_rows <= (u32::MAX as usize),
            "Matrix Dimensions cannot exceed the size of a u32!"
        );

        if weight != 0.0 {
            for col in 0..self.num_cols {
                self.insert([first_row + col, col], weight);
            }
        }
    }

    // Remove the entries from the matrix, replacing them with an empty BTreeMap.
    fn take_entries(&mut self) -> BTreeMap<[u32; 2], f64> {
        std::mem::take(&mut self.entries)
    }

    /// Iterate over the stored entries, sorted by row then column
    pub fn iter(&self) -> impl Iterator<Item = ([usize; 2], f64)> + '_ {
        self.entries
            .iter()
            .map(|(coords, value)| ([coords[0] as usize, coords[1] as usize], *value))
    }
}

impl From<SparseMatrix> for DMatrix<f64> {
    fn from(sm: SparseMatrix) -> Self {
        let mut dense = DMatrix::zeros(sm.num_rows, sm.num_cols);
        for ([r, c], v) in sm.iter() {
            dense[(r, c)] = v;
        }
        dense
    }
}

/// Compressed Sparse Row matrix
#[derive(Clone, Debug)]
pub struct CsrMatrix {
    pub num_rows: usize,
    pub num_cols: usize,
    /// Start of each row in `col_idx`/`values` (length `num_rows + 1`)
    row_ptr: Vec<usize>,
    col_idx: Vec<u32>,
    values: Vec<f64>,
}

impl CsrMatrix {
    /// A · x
    pub fn mul_vec(&self, x: &[f64]) -> Vec<f64> {
        assert_eq!(x.len(), self.num_cols, "Vector length != number of columns!");

        (0..self.num_rows)
            .map(|r| {
                let span = self.row_ptr[r]..self.row_ptr[r + 1];
                self.col_idx[span.clone()]
                    .iter()
                    .zip(self.values[span].iter())
                    .map(|(&c, v)| v * x[c as usize])
                    .sum()
            })
            .collect()
    }

    /// Aᵀ · y
    pub fn transpose_mul_vec(&self, y: &[f64]) -> Vec<f64> {
        assert_eq!(y.len(), self.num_rows, "Vector length != number of rows!");

        let mut out = vec![0.0; self.num_cols];
        for (r, &yr) in y.iter().enumerate() {
            if yr == 0.0 {
                continue;
            }
            for k in self.row_ptr[r]..self.row_ptr[r + 1] {
                out[self.col_idx[k] as usize] += self.values[k] * yr;
            }
        }
        out
    }
}

impl From<SparseMatrix> for CsrMatrix {
    fn from(mut sm: SparseMatrix) -> Self {
        let entries = sm.take_entries();

        let mut row_ptr = vec![0; sm.num_rows + 1];
        let mut col_idx = Vec::with_capacity(entries.len());
        let mut values = Vec::with_capacity(entries.len());

        // entries are sorted by row then column
        for ([r, c], v) in entries {
            row_ptr[r as usize + 1] += 1;
            col_idx.push(c);
            values.push(v);
        }
        for r in 0..sm.num_rows {
            row_ptr[r + 1] += row_ptr[r];
        }

        Self {
            num_rows: sm.num_rows,
            num_cols: sm.num_cols,
            row_ptr,
            col_idx,
            values,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_insertion() {
        let mut sm = SparseMatrix::new(10, 4);

        sm.insert([0, 0], 1.0);
        sm.insert([0, 0], 1.0);
        sm.insert([9, 3], 10.0);
        sm.insert([4, 3], 0.25);
        sm.insert_group(vec![([0, 2], 0.125), ([0, 2], 0.125)]);

        let raw_entries = sm.take_entries();

        assert!((raw_entries.get(&[0, 0]).unwrap() - 2.0).abs() < 1e-15);
        assert!((raw_entries.get(&[9, 3]).unwrap() - 10.0).abs() < 1e-15);
        assert!((raw_entries.get(&[4, 3]).unwrap() - 0.25).abs() < 1e-15);
        assert!((raw_entries.get(&[0, 2]).unwrap() - 0.25).abs() < 1e-15);

        // not symmetric
        assert!(raw_entries.get(&[3, 4]).is_none());
    }

    #[test]
    #[should_panic]
    fn out_of_bounds_insertion() {
        let mut sm = SparseMatrix::new(10, 2);
        sm.insert([3, 2], 1.0);
    }

    #[test]
    fn stacked_identity() {
        let mut sm = SparseMatrix::new(1, 3);
        sm.insert([0, 1], 2.0);
        sm.append_scaled_identity(0.5);

        assert_eq!(sm.num_rows, 4);
        let dense: DMatrix<f64> = sm.into();
        assert_eq!(dense[(0, 1)], 2.0);
        assert_eq!(dense[(1, 0)], 0.5);
        assert_eq!(dense[(2, 1)], 0.5);
        assert_eq!(dense[(3, 2)], 0.5);
        assert_eq!(dense[(3, 0)], 0.0);
    }

    #[test]
    fn csr_products_match_dense() {
        let mut sm = SparseMatrix::new(3, 4);
        sm.insert_group(vec![
            ([0, 0], 1.0),
            ([0, 3], 2.0),
            ([2, 1], -1.0),
            ([2, 2], 4.0),
        ]);
        let dense: DMatrix<f64> = sm.clone().into();
        let csr: CsrMatrix = sm.into();

        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [1.0, -1.0, 0.5];

        let ax = csr.mul_vec(&x);
        let atx = csr.transpose_mul_vec(&y);
        let ax_dense = &dense * nalgebra::DVector::from_column_slice(&x);
        let aty_dense = dense.transpose() * nalgebra::DVector::from_column_slice(&y);

        for (a, b) in ax.iter().zip(ax_dense.iter()) {
            assert!((a - b).abs() < 1e-15);
        }
        for (a, b) in atx.iter().zip(aty_dense.iter()) {
            assert!((a - b).abs() < 1e-15);
        }
    }
}
