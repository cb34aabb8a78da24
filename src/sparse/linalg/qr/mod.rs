//! sparse householder $QR$ factorization of square matrices
//!
//! the factorization computes
//! $$ P_r A P_c = Q R $$
//! where $P_c$ is a fill-reducing column permutation, $P_r$ a row permutation that gives every
//! column a pivot row, $Q = H_0 H_1 \dots H_{n-1}$ a product of householder reflections
//! $H_k = I - \beta_k v_k v_k^\top$, and $R$ an upper triangular matrix.
//!
//! the householder vectors are stored as the columns of a sparse matrix $V$. when $A$ is
//! structurally rank deficient, some columns have no row to pivot on. they receive fictitious
//! rows, so that $V$ may have up to $2n$ rows while $R$ is always $n \times n$.
//!
//! the structure of $V$ and $R$ only depends on the pattern of $A$ and is computed once by
//! [`factorize_symbolic_qr`]. the numerical values are then computed by
//! [`factor::factorize_numeric_qr`] for every set of values sharing that pattern.

use crate::assert;
use crate::perm::{Perm, PermRef};
use crate::sparse::linalg::ordering::{self, ColumnOrdering};
use crate::sparse::{SparseError, SymbolicSparseColMat, SymbolicSparseColMatRef, NONE};
use dyn_stack::{MemBuffer, MemStack, StackReq};
use reborrow::*;
use serde::{Deserialize, Serialize};

pub mod factor;
pub mod singular;
pub mod solve;
pub mod symbolic;

/// tuning parameters for the symbolic $QR$ factorization
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QrSymbolicParams {
	/// column ordering used to reduce the fill of the factors
	pub ordering: ColumnOrdering,
}

/// symbolic structure of the $QR$ factorization of a square sparse matrix
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SymbolicQr {
	nrows: usize,
	row_perm: Perm,
	col_perm: Perm,
	V: SymbolicSparseColMat,
	R: SymbolicSparseColMat,
}

impl SymbolicQr {
	/// assembles a symbolic factorization from its parts, after checking that they are consistent
	///
	/// `nrows` is the number of rows of the factorized matrix. `V` and `R` are the patterns of
	/// the householder vectors and of the triangular factor, in factorization order.
	pub fn try_from_parts(nrows: usize, row_perm: Perm, col_perm: Perm, V: SymbolicSparseColMat, R: SymbolicSparseColMat) -> Result<Self, SparseError> {
		let n = col_perm.len();
		let nrow_ext = row_perm.len();

		if nrows != n {
			return Err(SparseError::NotSquare { nrows, ncols: n });
		}
		if nrow_ext < nrows || nrow_ext - nrows > n {
			return Err(SparseError::InvalidFactor {
				reason: "the number of fictitious rows must be at most the number of columns",
			});
		}
		if V.nrows() != nrow_ext || V.ncols() != n {
			return Err(SparseError::InvalidFactor {
				reason: "the householder pattern must have dimensions (nrow_ext, ncols)",
			});
		}
		if R.nrows() != n || R.ncols() != n {
			return Err(SparseError::InvalidFactor {
				reason: "the triangular pattern must have dimensions (ncols, ncols)",
			});
		}
		for k in 0..n {
			if V.as_ref().row_idx_of_col_raw(k).first() != Some(&k) {
				return Err(SparseError::InvalidFactor {
					reason: "every householder vector must start at its pivot row",
				});
			}
			if R.as_ref().row_idx_of_col_raw(k).last() != Some(&k) {
				return Err(SparseError::InvalidFactor {
					reason: "the triangular factor must be upper triangular with a structurally nonzero diagonal",
				});
			}
		}

		Ok(Self {
			nrows,
			row_perm,
			col_perm,
			V,
			R,
		})
	}

	/// returns the number of rows of the factorized matrix
	#[inline]
	pub fn nrows(&self) -> usize {
		self.nrows
	}

	/// returns the number of columns of the factorized matrix
	#[inline]
	pub fn ncols(&self) -> usize {
		self.col_perm.len()
	}

	/// returns the number of rows of the householder factor, including fictitious rows
	#[inline]
	pub fn nrow_ext(&self) -> usize {
		self.row_perm.len()
	}

	/// returns the row permutation
	///
	/// the forward array maps a position in factorization order to a row index, and the inverse
	/// array maps a row index to its position. indices `nrows..nrow_ext` are fictitious rows.
	#[inline]
	pub fn row_perm(&self) -> PermRef<'_> {
		self.row_perm.as_ref()
	}

	/// returns the column permutation
	///
	/// the forward array maps a position in factorization order to a column index, and the
	/// inverse array maps a column index to its position.
	#[inline]
	pub fn col_perm(&self) -> PermRef<'_> {
		self.col_perm.as_ref()
	}

	/// returns the pattern of the householder vectors
	#[inline]
	pub fn V(&self) -> SymbolicSparseColMatRef<'_> {
		self.V.as_ref()
	}

	/// returns the pattern of the triangular factor
	#[inline]
	pub fn R(&self) -> SymbolicSparseColMatRef<'_> {
		self.R.as_ref()
	}

	/// returns the length of the slice that can be used to contain the householder values
	#[inline]
	pub fn len_v(&self) -> usize {
		self.V.compute_nnz()
	}

	/// returns the length of the slice that can be used to contain the triangular values
	#[inline]
	pub fn len_r(&self) -> usize {
		self.R.compute_nnz()
	}

	/// returns the length of the slice that can be used to contain the householder scalars
	#[inline]
	pub fn len_beta(&self) -> usize {
		self.ncols()
	}

	/// returns the number of fictitious rows
	#[inline]
	pub fn n_fictitious(&self) -> usize {
		self.nrow_ext() - self.nrows
	}

	/// decomposes `self` into `(nrows, row_perm, col_perm, V, R)`
	#[inline]
	pub fn into_parts(self) -> (usize, Perm, Perm, SymbolicSparseColMat, SymbolicSparseColMat) {
		(self.nrows, self.row_perm, self.col_perm, self.V, self.R)
	}
}

/// computes the size and alignment of the workspace required by [`factorize_symbolic_qr`] for a
/// matrix with dimensions `(nrows, ncols)` and `A_nnz` structurally nonzero entries
pub fn factorize_symbolic_qr_scratch(nrows: usize, ncols: usize, A_nnz: usize, params: QrSymbolicParams) -> StackReq {
	let ordering = match params.ordering {
		ColumnOrdering::Natural => StackReq::EMPTY,
		ColumnOrdering::MinimumDegree(_) => ordering::order_scratch(nrows, ncols, A_nnz),
	};
	StackReq::any_of(&[
		ordering,
		symbolic::col_etree_scratch(nrows, ncols),
		symbolic::postorder_scratch(ncols),
		symbolic::assign_rows_scratch(nrows, ncols),
		symbolic::qr_patterns_scratch(nrows + ncols, ncols),
	])
}

/// computes the symbolic $QR$ factorization of the square matrix with pattern `A`
///
/// the result is a deterministic function of the pattern and of `params`.
pub fn factorize_symbolic_qr(A: SymbolicSparseColMatRef<'_>, params: QrSymbolicParams) -> Result<SymbolicQr, SparseError> {
	let m = A.nrows();
	let n = A.ncols();
	if m != n {
		return Err(SparseError::NotSquare { nrows: m, ncols: n });
	}
	let ext = m.checked_add(n).ok_or(SparseError::IndexOverflow)?;

	let mut mem = MemBuffer::try_new(factorize_symbolic_qr_scratch(m, n, A.compute_nnz(), params)).map_err(|_| SparseError::OutOfMemory)?;
	let stack = MemStack::new(&mut mem);

	let mut etree = vec![NONE; n];
	let col_perm = match params.ordering {
		ColumnOrdering::Natural => Perm::identity(n),
		ColumnOrdering::MinimumDegree(control) => {
			let mut fwd = vec![0usize; n];
			let mut inv = vec![0usize; n];
			ordering::order(&mut fwd, &mut inv, A, control, stack)?;
			let perm = Perm::try_from_forward(fwd)?;

			// relabel along a postorder of the column elimination tree, which keeps the fill
			symbolic::col_etree(&mut etree, A, Some(perm.rb()), stack);
			let mut post = vec![0usize; n];
			symbolic::postorder(&mut post, &etree, stack);
			let (fwd, _) = perm.rb().arrays();
			Perm::try_from_forward(post.iter().map(|&k| fwd[k]).collect())?
		},
	};

	symbolic::col_etree(&mut etree, A, Some(col_perm.rb()), stack);

	let mut leftmost = vec![NONE; m];
	symbolic::leftmost_col(&mut leftmost, A, col_perm.rb());

	let mut row_perm_inv = vec![NONE; ext];
	let nrow_ext = symbolic::assign_rows(&mut row_perm_inv, &leftmost, &etree, stack);
	row_perm_inv.truncate(nrow_ext);

	let (V, R) = symbolic::qr_patterns(A, col_perm.rb(), &row_perm_inv, &leftmost, &etree, stack);
	let row_perm = Perm::try_from_inverse(row_perm_inv)?;

	log::debug!(
		target: "linsol_qr",
		"symbolic qr of a {n}x{n} matrix: nnz(A) = {}, nnz(V) = {}, nnz(R) = {}, {} fictitious rows",
		A.compute_nnz(),
		V.compute_nnz(),
		R.compute_nnz(),
		nrow_ext - m,
	);

	SymbolicQr::try_from_parts(m, row_perm, col_perm, V, R)
}

/// numerical $QR$ factors, borrowed together with their symbolic structure
#[derive(Copy, Clone, Debug)]
pub struct QrRef<'a> {
	symbolic: &'a SymbolicQr,
	v_val: &'a [f64],
	r_val: &'a [f64],
	beta: &'a [f64],
}

impl<'a> QrRef<'a> {
	/// creates a view over the numerical factors computed by
	/// [`factor::factorize_numeric_qr`]
	///
	/// # panics
	/// panics if the lengths of the slices do not match `symbolic`
	#[inline]
	#[track_caller]
	pub fn new(symbolic: &'a SymbolicQr, v_val: &'a [f64], r_val: &'a [f64], beta: &'a [f64]) -> Self {
		assert!(all(
			v_val.len() == symbolic.len_v(),
			r_val.len() == symbolic.len_r(),
			beta.len() == symbolic.len_beta(),
		));
		Self {
			symbolic,
			v_val,
			r_val,
			beta,
		}
	}

	/// returns the symbolic structure of the factorization
	#[inline]
	pub fn symbolic(self) -> &'a SymbolicQr {
		self.symbolic
	}

	/// returns the values of the householder vectors
	#[inline]
	pub fn v_val(self) -> &'a [f64] {
		self.v_val
	}

	/// returns the values of the triangular factor
	#[inline]
	pub fn r_val(self) -> &'a [f64] {
		self.r_val
	}

	/// returns the householder scalars
	#[inline]
	pub fn beta(self) -> &'a [f64] {
		self.beta
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::assert;
	use crate::sparse::testing::random_nonsingular;
	use crate::sparse::Pair;
	use rand::prelude::*;

	fn check_invariants(A: SymbolicSparseColMatRef<'_>, qr: &SymbolicQr) {
		let n = A.ncols();
		assert!(all(qr.nrows() == n, qr.ncols() == n, qr.nrow_ext() >= n, qr.nrow_ext() <= 2 * n));
		assert!(PermRef::try_new(qr.row_perm().arrays().0, qr.row_perm().arrays().1).is_ok());
		assert!(PermRef::try_new(qr.col_perm().arrays().0, qr.col_perm().arrays().1).is_ok());

		let R = qr.R();
		let V = qr.V();
		for k in 0..n {
			assert!(R.row_idx_of_col_raw(k).last() == Some(&k));
			assert!(R.row_idx_of_col(k).all(|i| i <= k));
			assert!(V.row_idx_of_col_raw(k).first() == Some(&k));
		}

		// every entry of A lands in the V column of its factorization column or in a column of R
		let (col_fwd, _) = qr.col_perm().arrays();
		let (_, row_inv) = qr.row_perm().arrays();
		for k in 0..n {
			for i in A.row_idx_of_col(col_fwd[k]) {
				let i = row_inv[i];
				assert!(R.row_idx_of_col_raw(k).contains(&i) || V.row_idx_of_col_raw(k).contains(&i));
			}
		}
	}

	#[test]
	fn test_symbolic_random() {
		let rng = &mut StdRng::seed_from_u64(0);
		for n in [0, 1, 2, 7, 30, 64] {
			for ordering in [ColumnOrdering::Natural, ColumnOrdering::default()] {
				let (A, _) = random_nonsingular(rng, n, 0.08);
				let qr = factorize_symbolic_qr(A.as_ref(), QrSymbolicParams { ordering }).unwrap();
				check_invariants(A.as_ref(), &qr);
				assert!(qr.n_fictitious() == 0);

				if ordering == ColumnOrdering::Natural {
					assert!(qr.col_perm().arrays().0 == (0..n).collect::<Vec<_>>());
				}

				// deterministic
				let qr2 = factorize_symbolic_qr(A.as_ref(), QrSymbolicParams { ordering }).unwrap();
				assert!(qr == qr2);
			}
		}
	}

	#[test]
	fn test_structurally_singular() {
		// column 1 and row 2 are empty
		let A = SymbolicSparseColMat::try_new_from_indices(3, 3, &[Pair::new(0, 0), Pair::new(1, 0), Pair::new(1, 2)]).unwrap();
		let qr = factorize_symbolic_qr(A.as_ref(), QrSymbolicParams::default()).unwrap();
		check_invariants(A.as_ref(), &qr);
		assert!(all(qr.nrow_ext() == 4, qr.n_fictitious() == 1));
	}

	#[test]
	fn test_not_square() {
		let A = SymbolicSparseColMat::try_new(2, 3, vec![0, 0, 0, 0], vec![]).unwrap();
		assert!(factorize_symbolic_qr(A.as_ref(), QrSymbolicParams::default()) == Err(SparseError::NotSquare { nrows: 2, ncols: 3 }));
	}

	#[test]
	fn test_try_from_parts() {
		let A = SymbolicSparseColMat::try_new_from_indices(2, 2, &[Pair::new(0, 0), Pair::new(1, 0), Pair::new(0, 1), Pair::new(1, 1)]).unwrap();
		let qr = factorize_symbolic_qr(A.as_ref(), QrSymbolicParams::default()).unwrap();
		let (nrows, row_perm, col_perm, V, R) = qr.clone().into_parts();

		assert!(SymbolicQr::try_from_parts(nrows, row_perm.clone(), col_perm.clone(), V.clone(), R.clone()).unwrap() == qr);

		// lower triangular R
		let bad_R = SymbolicSparseColMat::try_new(2, 2, vec![0, 2, 3], vec![0, 1, 1]).unwrap();
		assert!(matches!(
			SymbolicQr::try_from_parts(nrows, row_perm.clone(), col_perm.clone(), V.clone(), bad_R),
			Err(SparseError::InvalidFactor { .. })
		));

		// householder vector that does not start at its pivot
		let bad_V = SymbolicSparseColMat::try_new(2, 2, vec![0, 1, 2], vec![1, 1]).unwrap();
		assert!(matches!(
			SymbolicQr::try_from_parts(nrows, row_perm.clone(), col_perm.clone(), bad_V, R.clone()),
			Err(SparseError::InvalidFactor { .. })
		));

		assert!(matches!(
			SymbolicQr::try_from_parts(nrows, Perm::identity(5), col_perm, V, R),
			Err(SparseError::InvalidFactor { .. })
		));
	}
}
