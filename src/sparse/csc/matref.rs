use super::*;
use crate::assert;

/// sparse matrix view in column-compressed format: a pattern together with one value per
/// structurally nonzero entry
#[derive(Copy, Clone, Debug)]
pub struct SparseColMatRef<'a> {
	pub(crate) symbolic: SymbolicSparseColMatRef<'a>,
	pub(crate) val: &'a [f64],
}

impl<'a> SparseColMatRef<'a> {
	/// creates a new sparse matrix view
	///
	/// # panics
	/// panics if the length of `val` is not the number of structurally nonzero entries of
	/// `symbolic`
	#[inline]
	#[track_caller]
	pub fn new(symbolic: SymbolicSparseColMatRef<'a>, val: &'a [f64]) -> Self {
		assert!(symbolic.compute_nnz() == val.len());
		Self { symbolic, val }
	}

	/// returns the pattern of the matrix
	#[inline]
	pub fn symbolic(&self) -> SymbolicSparseColMatRef<'a> {
		self.symbolic
	}

	/// returns the number of rows of the matrix
	#[inline]
	pub fn nrows(&self) -> usize {
		self.symbolic.nrows
	}

	/// returns the number of columns of the matrix
	#[inline]
	pub fn ncols(&self) -> usize {
		self.symbolic.ncols
	}

	/// returns the values of the matrix
	#[inline]
	pub fn val(&self) -> &'a [f64] {
		self.val
	}

	/// returns the row indices of column `j`
	#[inline]
	#[track_caller]
	pub fn row_idx_of_col_raw(&self, j: usize) -> &'a [usize] {
		self.symbolic.row_idx_of_col_raw(j)
	}

	/// returns the values of column `j`
	#[inline]
	#[track_caller]
	pub fn val_of_col(&self, j: usize) -> &'a [f64] {
		&self.val[self.symbolic.col_range(j)]
	}

	/// returns the matrix as a dense column-major array
	pub fn to_dense(&self) -> Vec<f64> {
		let m = self.nrows();
		let mut out = vec![0.0; m * self.ncols()];
		for j in 0..self.ncols() {
			for (&i, &v) in self.row_idx_of_col_raw(j).iter().zip(self.val_of_col(j)) {
				out[i + j * m] = v;
			}
		}
		out
	}
}
