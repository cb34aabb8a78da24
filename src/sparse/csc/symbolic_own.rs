use super::*;
use crate::sparse::Pair;
use reborrow::*;
use serde::{Deserialize, Serialize};

/// owning symbolic structure of a sparse matrix in column-compressed format
///
/// see [`SymbolicSparseColMatRef`] for the invariants, which are checked on construction and on
/// deserialization.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSymbolicSparseColMat")]
pub struct SymbolicSparseColMat {
	pub(crate) nrows: usize,
	pub(crate) ncols: usize,
	pub(crate) col_ptr: Vec<usize>,
	pub(crate) row_idx: Vec<usize>,
}

#[derive(Deserialize)]
#[serde(rename = "SymbolicSparseColMat")]
struct RawSymbolicSparseColMat {
	nrows: usize,
	ncols: usize,
	col_ptr: Vec<usize>,
	row_idx: Vec<usize>,
}

impl TryFrom<RawSymbolicSparseColMat> for SymbolicSparseColMat {
	type Error = SparseError;

	#[inline]
	fn try_from(raw: RawSymbolicSparseColMat) -> Result<Self, Self::Error> {
		Self::try_new(raw.nrows, raw.ncols, raw.col_ptr, raw.row_idx)
	}
}

impl<'short> Reborrow<'short> for SymbolicSparseColMat {
	type Target = SymbolicSparseColMatRef<'short>;

	#[inline]
	fn rb(&'short self) -> Self::Target {
		self.as_ref()
	}
}

impl SymbolicSparseColMat {
	/// creates a new symbolic matrix after checking its invariants
	#[inline]
	pub fn try_new(nrows: usize, ncols: usize, col_ptr: Vec<usize>, row_idx: Vec<usize>) -> Result<Self, SparseError> {
		check_structure(nrows, ncols, &col_ptr, &row_idx)?;
		Ok(Self {
			nrows,
			ncols,
			col_ptr,
			row_idx,
		})
	}

	/// creates a new symbolic matrix from a list of `(row, col)` pairs, in any order
	///
	/// duplicate pairs are merged.
	pub fn try_new_from_indices(nrows: usize, ncols: usize, indices: &[Pair]) -> Result<Self, SparseError> {
		let mut col_ptr = Vec::new();
		col_ptr
			.try_reserve_exact(ncols.checked_add(1).ok_or(SparseError::IndexOverflow)?)
			.map_err(|_| SparseError::OutOfMemory)?;
		col_ptr.resize(ncols + 1, 0usize);

		for &Pair { row, col } in indices {
			if col >= ncols {
				return Err(SparseError::InvalidColIdx { col, ncols });
			}
			if row >= nrows {
				return Err(SparseError::InvalidRowIdx {
					col,
					reason: "row index out of bounds",
				});
			}
		}

		let mut sorted = indices.to_vec();
		sorted.sort_unstable_by_key(|p| (p.col, p.row));
		sorted.dedup();

		let mut row_idx = Vec::new();
		row_idx.try_reserve_exact(sorted.len()).map_err(|_| SparseError::OutOfMemory)?;
		for &Pair { row, col } in &sorted {
			col_ptr[col + 1] += 1;
			row_idx.push(row);
		}
		for j in 0..ncols {
			col_ptr[j + 1] += col_ptr[j];
		}

		Self::try_new(nrows, ncols, col_ptr, row_idx)
	}

	/// creates the pattern of the `n x n` identity matrix
	pub fn identity(n: usize) -> Self {
		Self {
			nrows: n,
			ncols: n,
			col_ptr: (0..n + 1).collect(),
			row_idx: (0..n).collect(),
		}
	}

	/// returns a view over `self`
	#[inline]
	pub fn as_ref(&self) -> SymbolicSparseColMatRef<'_> {
		SymbolicSparseColMatRef {
			nrows: self.nrows,
			ncols: self.ncols,
			col_ptr: &self.col_ptr,
			row_idx: &self.row_idx,
		}
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
	pub fn col_ptr(&self) -> &[usize] {
		&self.col_ptr
	}

	/// returns the row indices
	#[inline]
	pub fn row_idx(&self) -> &[usize] {
		&self.row_idx
	}

	/// returns the number of structurally nonzero entries
	#[inline]
	pub fn compute_nnz(&self) -> usize {
		self.row_idx.len()
	}

	/// returns an iterator over the row indices of column `j`
	#[inline]
	#[track_caller]
	pub fn row_idx_of_col(&self, j: usize) -> impl '_ + ExactSizeIterator<Item = usize> + DoubleEndedIterator {
		self.as_ref().row_idx_of_col(j)
	}

	/// decomposes `self` into `(nrows, ncols, col_ptr, row_idx)`
	#[inline]
	pub fn into_parts(self) -> (usize, usize, Vec<usize>, Vec<usize>) {
		(self.nrows, self.ncols, self.col_ptr, self.row_idx)
	}
}
