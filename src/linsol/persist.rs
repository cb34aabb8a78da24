//! saving and restoring the symbolic state of a solver
//!
//! only the pattern, the permutations and the factor patterns are stored. restoring validates the
//! record instead of rerunning the analysis.

use super::{check_eps, LinsolError, LinsolQr, QrOptions};
use crate::perm::Perm;
use crate::sparse::linalg::qr::SymbolicQr;
use crate::sparse::{SparseError, SymbolicSparseColMat};
use serde::{Deserialize, Serialize};

/// persisted symbolic state of a [`LinsolQr`]
///
/// restoring a solver from this record validates it but does not rerun the symbolic analysis.
/// numerical factors are never persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename = "LinsolQr")]
pub struct QrState {
	/// format version, see [`QrState::VERSION`]
	pub version: u32,
	/// pattern of the factorized matrix
	pub sparsity: SymbolicSparseColMat,
	/// forward array of the row permutation, including fictitious rows
	pub row_perm: Vec<usize>,
	/// forward array of the column permutation
	pub col_perm: Vec<usize>,
	/// pattern of the householder vectors
	pub sp_v: SymbolicSparseColMat,
	/// pattern of the triangular factor
	pub sp_r: SymbolicSparseColMat,
	/// singularity threshold
	pub eps: f64,
}

impl QrState {
	/// format version written by this crate, and the only one it reads
	pub const VERSION: u32 = 1;
}

impl From<LinsolQr> for QrState {
	fn from(solver: LinsolQr) -> Self {
		let (sparsity, symbolic, options) = solver.into_parts();
		let (_, row_perm, col_perm, sp_v, sp_r) = symbolic.into_parts();
		Self {
			version: Self::VERSION,
			sparsity,
			row_perm: row_perm.into_arrays().0.into_vec(),
			col_perm: col_perm.into_arrays().0.into_vec(),
			sp_v,
			sp_r,
			eps: options.eps,
		}
	}
}

fn restore_symbolic(
	sparsity: &SymbolicSparseColMat,
	row_perm: Vec<usize>,
	col_perm: Vec<usize>,
	sp_v: SymbolicSparseColMat,
	sp_r: SymbolicSparseColMat,
) -> Result<SymbolicQr, SparseError> {
	let (nrows, ncols) = (sparsity.nrows(), sparsity.ncols());
	if nrows != ncols {
		return Err(SparseError::NotSquare { nrows, ncols });
	}
	let row_perm = Perm::try_from_forward(row_perm)?;
	let col_perm = Perm::try_from_forward(col_perm)?;
	SymbolicQr::try_from_parts(nrows, row_perm, col_perm, sp_v, sp_r)
}

impl TryFrom<QrState> for LinsolQr {
	type Error = LinsolError;

	fn try_from(state: QrState) -> Result<Self, Self::Error> {
		if state.version != QrState::VERSION {
			return Err(LinsolError::UnsupportedVersion {
				found: state.version,
				supported: QrState::VERSION,
			});
		}
		check_eps(state.eps)?;

		let QrState {
			sparsity,
			row_perm,
			col_perm,
			sp_v,
			sp_r,
			eps,
			..
		} = state;

		let n = sparsity.ncols();
		let symbolic = restore_symbolic(&sparsity, row_perm, col_perm, sp_v, sp_r).map_err(LinsolError::InvalidState)?;

		log::debug!(
			target: "linsol_qr",
			"restored symbolic qr of a {n}x{n} matrix: nnz(V) = {}, nnz(R) = {}, {} fictitious rows",
			symbolic.len_v(),
			symbolic.len_r(),
			symbolic.n_fictitious(),
		);

		Ok(LinsolQr::from_parts(sparsity, symbolic, QrOptions { eps }))
	}
}
