//! numeric householder $QR$ factorization

use super::SymbolicQr;
use crate::assert;
use crate::sparse::SparseColMatRef;
use dyn_stack::{MemStack, StackReq};

/// overwrites `v` with the householder vector that maps it to a multiple of the first unit
/// vector, and returns `(beta, norm)` such that $(I - \beta v v^\top) v_{\text{old}} =
/// \text{norm} \cdot e_0$
///
/// the first component of the vector is normalized so that `norm` is nonnegative. when `v` is
/// already a nonnegative multiple of $e_0$, `beta` is zero and the reflection is the identity.
#[track_caller]
pub fn make_householder_in_place(v: &mut [f64]) -> (f64, f64) {
	assert!(!v.is_empty());

	let v0 = v[0];
	let mut sigma = 0.0;
	for &x in &v[1..] {
		sigma += x * x;
	}
	let s = (v0 * v0 + sigma).sqrt();

	let beta;
	if sigma == 0.0 {
		beta = if v0 <= 0.0 { 2.0 } else { 0.0 };
		v[0] = 1.0;
	} else {
		v[0] = if v0 <= 0.0 { v0 - s } else { -sigma / (v0 + s) };
		beta = -1.0 / (s * v[0]);
	}
	(beta, s)
}

/// applies $I - \beta v v^\top$ to `x`, where `v` is given by its nonzero rows and values
#[inline]
pub fn apply_householder(x: &mut [f64], v_row_idx: &[usize], v_val: &[f64], beta: f64) {
	let mut alpha = 0.0;
	for (&i, &v) in v_row_idx.iter().zip(v_val) {
		alpha += v * x[i];
	}
	alpha *= beta;
	for (&i, &v) in v_row_idx.iter().zip(v_val) {
		x[i] -= alpha * v;
	}
}

/// computes the size and alignment of the workspace required by [`factorize_numeric_qr`]
#[inline]
pub fn factorize_numeric_qr_scratch(symbolic: &SymbolicQr) -> StackReq {
	StackReq::new::<f64>(symbolic.nrow_ext())
}

/// computes the numerical values of the $QR$ factors of `A`, whose pattern must be the one
/// `symbolic` was computed from
///
/// column `k` is processed left to right: the values of the original column `col_perm[k]` are
/// scattered into a dense work vector indexed by position, the reflectors listed in the strictly
/// upper part of `R(:, k)` are applied in increasing order, and the remaining rows form the next
/// householder vector. the values of `R(:, k)` are read off the work vector as the reflectors are
/// applied.
///
/// # panics
/// panics if the dimensions of `A` or the lengths of the output slices do not match `symbolic`
#[track_caller]
pub fn factorize_numeric_qr(v_val: &mut [f64], r_val: &mut [f64], beta: &mut [f64], A: SparseColMatRef<'_>, symbolic: &SymbolicQr, stack: &mut MemStack) {
	let n = symbolic.ncols();
	assert!(all(
		A.nrows() == symbolic.nrows(),
		A.ncols() == n,
		v_val.len() == symbolic.len_v(),
		r_val.len() == symbolic.len_r(),
		beta.len() == symbolic.len_beta(),
	));

	let (x, _) = unsafe { stack.make_raw::<f64>(symbolic.nrow_ext()) };
	x.fill(0.0);

	let (col_fwd, _) = symbolic.col_perm().arrays();
	let (_, row_inv) = symbolic.row_perm().arrays();
	let V = symbolic.V();
	let R = symbolic.R();

	for k in 0..n {
		let pk = col_fwd[k];
		for (&i, &a) in A.row_idx_of_col_raw(pk).iter().zip(A.val_of_col(pk)) {
			x[row_inv[i]] = a;
		}

		let r_range = R.col_range(k);
		let r_diag = r_range.end - 1;
		for p in r_range.start..r_diag {
			let j = R.row_idx()[p];
			let v_range = V.col_range(j);
			apply_householder(x, &V.row_idx()[v_range.clone()], &v_val[v_range], beta[j]);
			r_val[p] = x[j];
			x[j] = 0.0;
		}

		let v_range = V.col_range(k);
		for p in v_range.clone() {
			let i = V.row_idx()[p];
			v_val[p] = x[i];
			x[i] = 0.0;
		}

		let (b, norm) = make_householder_in_place(&mut v_val[v_range]);
		beta[k] = b;
		r_val[r_diag] = norm;
	}
}
