use super::SparseError;

mod matref;
mod symbolic_own;
mod symbolic_ref;

pub use matref::SparseColMatRef;
pub use symbolic_own::SymbolicSparseColMat;
pub use symbolic_ref::SymbolicSparseColMatRef;

/// checks that `col_ptr` and `row_idx` describe a valid `nrows x ncols` pattern with strictly
/// increasing row indices in each column
pub(crate) fn check_structure(nrows: usize, ncols: usize, col_ptr: &[usize], row_idx: &[usize]) -> Result<(), SparseError> {
	let len = ncols.checked_add(1).ok_or(SparseError::IndexOverflow)?;
	if col_ptr.len() != len {
		return Err(SparseError::InvalidColPtr {
			reason: "the length of the column pointers must be ncols + 1",
		});
	}
	if col_ptr[0] != 0 {
		return Err(SparseError::InvalidColPtr {
			reason: "the first column pointer must be zero",
		});
	}
	for w in col_ptr.windows(2) {
		if w[0] > w[1] {
			return Err(SparseError::InvalidColPtr {
				reason: "the column pointers must be nondecreasing",
			});
		}
	}
	if col_ptr[ncols] != row_idx.len() {
		return Err(SparseError::InvalidColPtr {
			reason: "the last column pointer must equal the number of stored entries",
		});
	}

	for j in 0..ncols {
		let col = &row_idx[col_ptr[j]..col_ptr[j + 1]];
		for w in col.windows(2) {
			if w[0] >= w[1] {
				return Err(SparseError::InvalidRowIdx {
					col: j,
					reason: "row indices must be strictly increasing",
				});
			}
		}
		if let Some(&last) = col.last() {
			if last >= nrows {
				return Err(SparseError::InvalidRowIdx {
					col: j,
					reason: "row index out of bounds",
				});
			}
		}
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::assert;
	use crate::sparse::Pair;
	use reborrow::*;

	#[test]
	fn test_check_structure() {
		assert!(check_structure(3, 3, &[0, 2, 2, 4], &[0, 1, 0, 2]) == Ok(()));
		assert!(check_structure(0, 0, &[0], &[]) == Ok(()));

		assert!(matches!(
			check_structure(3, 3, &[0, 2, 4], &[0, 1, 0, 2]),
			Err(SparseError::InvalidColPtr { .. })
		));
		assert!(matches!(
			check_structure(3, 3, &[1, 2, 2, 4], &[0, 1, 0, 2]),
			Err(SparseError::InvalidColPtr { .. })
		));
		assert!(matches!(
			check_structure(3, 3, &[0, 3, 2, 4], &[0, 1, 0, 2]),
			Err(SparseError::InvalidColPtr { .. })
		));
		assert!(matches!(
			check_structure(3, 3, &[0, 2, 2, 3], &[0, 1, 0, 2]),
			Err(SparseError::InvalidColPtr { .. })
		));
		assert!(check_structure(3, 3, &[0, 2, 2, 4], &[1, 0, 0, 2]) == Err(SparseError::InvalidRowIdx { col: 0, reason: "row indices must be strictly increasing" }));
		assert!(matches!(
			check_structure(3, 3, &[0, 2, 2, 4], &[0, 0, 0, 2]),
			Err(SparseError::InvalidRowIdx { col: 0, .. })
		));
		assert!(matches!(
			check_structure(3, 3, &[0, 2, 2, 4], &[0, 1, 0, 3]),
			Err(SparseError::InvalidRowIdx { col: 2, .. })
		));
		assert!(check_structure(3, usize::MAX, &[0], &[]) == Err(SparseError::IndexOverflow));
	}

	#[test]
	fn test_from_indices() {
		let A = SymbolicSparseColMat::try_new_from_indices(
			3,
			3,
			&[Pair::new(2, 2), Pair::new(0, 0), Pair::new(1, 0), Pair::new(0, 2), Pair::new(1, 0)],
		)
		.unwrap();
		assert!(all(
			A.nrows() == 3,
			A.ncols() == 3,
			A.col_ptr() == &[0, 2, 2, 4],
			A.row_idx() == &[0, 1, 0, 2],
			A.compute_nnz() == 4,
		));

		assert!(
			SymbolicSparseColMat::try_new_from_indices(2, 2, &[Pair::new(2, 0)])
				== Err(SparseError::InvalidRowIdx {
					col: 0,
					reason: "row index out of bounds",
				})
		);

		let err = SymbolicSparseColMat::try_new_from_indices(2, 2, &[Pair::new(0, 0), Pair::new(1, 3)]).unwrap_err();
		assert!(err == SparseError::InvalidColIdx { col: 3, ncols: 2 });
		assert!(err.to_string() == "column index 3 out of bounds for a matrix with 2 columns");
	}

	#[test]
	fn test_views() {
		let A = SymbolicSparseColMat::try_new(3, 3, vec![0, 2, 2, 4], vec![0, 1, 0, 2]).unwrap();
		let A_ref = A.as_ref();
		assert!(A_ref.col_range(0) == (0..2));
		assert!(A_ref.col_range(1) == (2..2));
		assert!(A_ref.row_idx_of_col_raw(2) == &[0, 2]);
		assert!(A_ref.row_idx_of_col(0).collect::<Vec<_>>() == vec![0, 1]);
		assert!(A_ref.to_owned() == A);

		let mut view = A.rb();
		assert!(view == A_ref);
		assert!(view.rb() == A_ref);
		let view_mut = view.rb_mut();
		assert!(view_mut == A_ref);

		let vals = [1.0, 2.0, 3.0, 4.0];
		let M = SparseColMatRef::new(A_ref, &vals);
		assert!(M.val_of_col(2) == &[3.0, 4.0]);
		assert!(M.to_dense() == vec![1.0, 2.0, 0.0, 0.0, 0.0, 0.0, 3.0, 0.0, 4.0]);
	}

	#[test]
	fn test_serde() {
		use serde_test::{assert_de_tokens_error, assert_tokens, Token};

		let A = SymbolicSparseColMat::try_new(2, 2, vec![0, 1, 2], vec![1, 0]).unwrap();
		assert_tokens(
			&A,
			&[
				Token::Struct {
					name: "SymbolicSparseColMat",
					len: 4,
				},
				Token::Str("nrows"),
				Token::U64(2),
				Token::Str("ncols"),
				Token::U64(2),
				Token::Str("col_ptr"),
				Token::Seq { len: Some(3) },
				Token::U64(0),
				Token::U64(1),
				Token::U64(2),
				Token::SeqEnd,
				Token::Str("row_idx"),
				Token::Seq { len: Some(2) },
				Token::U64(1),
				Token::U64(0),
				Token::SeqEnd,
				Token::StructEnd,
			],
		);

		assert_de_tokens_error::<SymbolicSparseColMat>(
			&[
				Token::Struct {
					name: "SymbolicSparseColMat",
					len: 4,
				},
				Token::Str("nrows"),
				Token::U64(1),
				Token::Str("ncols"),
				Token::U64(1),
				Token::Str("col_ptr"),
				Token::Seq { len: Some(2) },
				Token::U64(0),
				Token::U64(1),
				Token::SeqEnd,
				Token::Str("row_idx"),
				Token::Seq { len: Some(1) },
				Token::U64(3),
				Token::SeqEnd,
				Token::StructEnd,
			],
			"invalid row indices in column 0: row index out of bounds",
		);
	}
}
