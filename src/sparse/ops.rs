//! products between sparse matrices and dense vectors

use super::SparseColMatRef;
use crate::assert;

/// computes `dst := A * rhs`
#[track_caller]
pub fn sparse_dense_matvec(dst: &mut [f64], A: SparseColMatRef<'_>, rhs: &[f64]) {
	assert!(all(dst.len() == A.nrows(), rhs.len() == A.ncols()));

	dst.fill(0.0);
	for j in 0..A.ncols() {
		let x = rhs[j];
		for (&i, &a) in A.row_idx_of_col_raw(j).iter().zip(A.val_of_col(j)) {
			dst[i] += a * x;
		}
	}
}

/// computes `dst := A^T * rhs`
#[track_caller]
pub fn sparse_transpose_dense_matvec(dst: &mut [f64], A: SparseColMatRef<'_>, rhs: &[f64]) {
	assert!(all(dst.len() == A.ncols(), rhs.len() == A.nrows()));

	for j in 0..A.ncols() {
		let mut acc = 0.0;
		for (&i, &a) in A.row_idx_of_col_raw(j).iter().zip(A.val_of_col(j)) {
			acc += a * rhs[i];
		}
		dst[j] = acc;
	}
}
