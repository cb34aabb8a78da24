//! sparse matrix patterns and views in column-compressed form, together with the sparse
//! factorization algorithms built on them.
//!
//! a sparse matrix is described by its dimensions, its column pointers and the row indices of its
//! structurally nonzero entries. the row indices of column `j` are stored in
//! `row_idx[col_ptr[j]..col_ptr[j + 1]]` in strictly increasing order.
//!
//! for example, the matrix
//! ```notcode
//! [[1.0, 0.0, 3.0]
//!  [2.0, 0.0, 0.0]
//!  [0.0, 0.0, 4.0]]
//! ```
//! has the column pointers `[0, 2, 2, 4]`, the row indices `[0, 1, 0, 2]` and the values
//! `[1.0, 2.0, 3.0, 4.0]`.
//!
//! patterns ([`SymbolicSparseColMat`]) are validated once on construction and can then be shared
//! freely, while the values of a matrix are paired with a pattern on the fly through
//! [`SparseColMatRef`].

use core::fmt;

mod csc;

pub mod linalg;
pub mod ops;

pub use csc::*;

/// sentinel used for "no index", such as the parent of an elimination tree root
pub const NONE: usize = usize::MAX;

/// pair of indices with `row` and `col` fields
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pair {
	/// row index
	pub row: usize,
	/// column index
	pub col: usize,
}

impl Pair {
	/// creates a new pair of indices
	#[inline]
	pub const fn new(row: usize, col: usize) -> Self {
		Pair { row, col }
	}
}

/// errors that can occur while building or validating sparse structures
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum SparseError {
	/// an index or a size could not be represented
	IndexOverflow,
	/// memory allocation failed
	OutOfMemory,
	/// the column pointers are malformed
	InvalidColPtr {
		/// description of the violated constraint
		reason: &'static str,
	},
	/// the row indices of a column are malformed
	InvalidRowIdx {
		/// column containing the offending indices
		col: usize,
		/// description of the violated constraint
		reason: &'static str,
	},
	/// an index pair refers to a column past the end of the matrix
	InvalidColIdx {
		/// offending column index
		col: usize,
		/// number of columns of the matrix
		ncols: usize,
	},
	/// the matrix was expected to be square
	NotSquare {
		/// number of rows
		nrows: usize,
		/// number of columns
		ncols: usize,
	},
	/// the index array is not a permutation
	InvalidPerm {
		/// description of the violated constraint
		reason: &'static str,
	},
	/// the factor patterns are inconsistent with each other or with the factorized matrix
	InvalidFactor {
		/// description of the violated constraint
		reason: &'static str,
	},
}

impl fmt::Display for SparseError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match *self {
			SparseError::IndexOverflow => f.write_str("index overflow"),
			SparseError::OutOfMemory => f.write_str("out of memory"),
			SparseError::InvalidColPtr { reason } => write!(f, "invalid column pointers: {reason}"),
			SparseError::InvalidRowIdx { col, reason } => {
				write!(f, "invalid row indices in column {col}: {reason}")
			},
			SparseError::InvalidColIdx { col, ncols } => {
				write!(f, "column index {col} out of bounds for a matrix with {ncols} columns")
			},
			SparseError::NotSquare { nrows, ncols } => {
				write!(f, "expected a square matrix, found {nrows}x{ncols}")
			},
			SparseError::InvalidPerm { reason } => write!(f, "invalid permutation: {reason}"),
			SparseError::InvalidFactor { reason } => write!(f, "invalid factor structure: {reason}"),
		}
	}
}

impl core::error::Error for SparseError {}
