use super::*;
use core::ops::Range;
use reborrow::*;

/// symbolic view of a sparse matrix in column-compressed format
///
/// requires:
/// * `col_ptr` has length `ncols + 1` and starts at zero
/// * `col_ptr` is nondecreasing and `col_ptr[ncols] == row_idx.len()`
/// * within each column, row indices are strictly increasing and less than `nrows`
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SymbolicSparseColMatRef<'a> {
	pub(crate) nrows: usize,
	pub(crate) ncols: usize,
	pub(crate) col_ptr: &'a [usize],
	pub(crate) row_idx: &'a [usize],
}

impl<'short> Reborrow<'short> for SymbolicSparseColMatRef<'_> {
	type Target = SymbolicSparseColMatRef<'short>;

	#[inline]
	fn rb(&'short self) -> Self::Target {
		*self
	}
}

impl<'short> ReborrowMut<'short> for SymbolicSparseColMatRef<'_> {
	type Target = SymbolicSparseColMatRef<'short>;

	#[inline]
	fn rb_mut(&'short mut self) -> Self::Target {
		*self
	}
}

impl<'a> SymbolicSparseColMatRef<'a> {
	/// creates a new symbolic matrix view after checking its invariants
	#[inline]
	pub fn try_new(nrows: usize, ncols: usize, col_ptr: &'a [usize], row_idx: &'a [usize]) -> Result<Self, SparseError> {
		check_structure(nrows, ncols, col_ptr, row_idx)?;
		Ok(Self {
			nrows,
			ncols,
			col_ptr,
			row_idx,
		})
	}

	/// returns the number of rows of the matrix
	#[inline]
	pub fn nrows(&self) -> usize {
		self.nrows
	}

	/// returns the number of columns of the matrix
	#[inline]
	pub fn ncols(&self) -> usize {
		self.ncols
	}

	/// returns the column pointers
	#[inline]
	pub fn col_ptr(&self) -> &'a [usize] {
		self.col_ptr
	}

	/// returns the row indices
	#[inline]
	pub fn row_idx(&self) -> &'a [usize] {
		self.row_idx
	}

	/// returns the number of structurally nonzero entries
	#[inline]
	pub fn compute_nnz(&self) -> usize {
		self.col_ptr[self.ncols]
	}

	/// returns the range that the column `j` occupies in `self.row_idx()`
	#[inline]
	#[track_caller]
	pub fn col_range(&self, j: usize) -> Range<usize> {
		self.col_ptr[j]..self.col_ptr[j + 1]
	}

	/// returns the row indices of column `j`
	#[inline]
	#[track_caller]
	pub fn row_idx_of_col_raw(&self, j: usize) -> &'a [usize] {
		&self.row_idx[self.col_range(j)]
	}

	/// returns an iterator over the row indices of column `j`
	#[inline]
	#[track_caller]
	pub fn row_idx_of_col(&self, j: usize) -> impl 'a + ExactSizeIterator<Item = usize> + DoubleEndedIterator {
		self.row_idx_of_col_raw(j).iter().copied()
	}

	/// copies `self` into a newly allocated pattern
	#[inline]
	pub fn to_owned(&self) -> SymbolicSparseColMat {
		SymbolicSparseColMat {
			nrows: self.nrows,
			ncols: self.ncols,
			col_ptr: self.col_ptr.to_vec(),
			row_idx: self.row_idx.to_vec(),
		}
	}
}
