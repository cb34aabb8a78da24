//! solving linear systems with the $QR$ factors

use super::factor::apply_householder;
use super::{QrRef, SymbolicQr};
use crate::{assert, Par};
use dyn_stack::{MemStack, StackReq};

/// applies $Q^\top = H_{n-1} \dots H_0$ to `x` if `transpose` is true, and $Q = H_0 \dots H_{n-1}$
/// otherwise
///
/// `x` is indexed by position in factorization order and has length `nrow_ext`.
#[track_caller]
pub fn apply_householder_sequence_in_place(qr: QrRef<'_>, x: &mut [f64], transpose: bool) {
	let symbolic = qr.symbolic();
	let n = symbolic.ncols();
	assert!(x.len() == symbolic.nrow_ext());

	let V = symbolic.V();
	let v_val = qr.v_val();
	let beta = qr.beta();

	for k1 in 0..n {
		let k = if transpose { k1 } else { n - 1 - k1 };
		let range = V.col_range(k);
		apply_householder(x, &V.row_idx()[range.clone()], &v_val[range], beta[k]);
	}
}

/// solves $R y = x$ if `transpose` is false, or $R^\top y = x$ otherwise, and stores the result
/// in `x`
///
/// `x` has length `ncols`. zero diagonal entries are not checked.
#[track_caller]
pub fn solve_triangular_in_place(qr: QrRef<'_>, x: &mut [f64], transpose: bool) {
	let symbolic = qr.symbolic();
	let n = symbolic.ncols();
	assert!(x.len() == n);

	let R = symbolic.R();
	let r_row = R.row_idx();
	let r_val = qr.r_val();

	if transpose {
		for c in 0..n {
			for p in R.col_range(c) {
				let r = r_row[p];
				if r == c {
					x[c] /= r_val[p];
				} else {
					x[c] -= r_val[p] * x[r];
				}
			}
		}
	} else {
		for c in (0..n).rev() {
			for p in R.col_range(c).rev() {
				let r = r_row[p];
				if r == c {
					x[r] /= r_val[p];
				} else {
					x[r] -= r_val[p] * x[c];
				}
			}
		}
	}
}

fn n_groups(nrhs: usize, par: Par) -> usize {
	Ord::max(1, Ord::min(par.degree(), nrhs))
}

/// computes the size and alignment of the workspace required by [`QrRef::solve_in_place`] with
/// `nrhs` right hand sides
#[inline]
pub fn solve_in_place_scratch(symbolic: &SymbolicQr, nrhs: usize, par: Par) -> StackReq {
	StackReq::new::<f64>(symbolic.nrow_ext()).array(n_groups(nrhs, par))
}

fn solve_one(qr: QrRef<'_>, x: &mut [f64], transpose: bool, w: &mut [f64]) {
	let symbolic = qr.symbolic();
	let n = symbolic.ncols();
	let (col_fwd, _) = symbolic.col_perm().arrays();
	let (_, row_inv) = symbolic.row_perm().arrays();

	if transpose {
		for k in 0..n {
			w[k] = x[col_fwd[k]];
		}
		solve_triangular_in_place(qr, &mut w[..n], true);
		w[n..].fill(0.0);
		apply_householder_sequence_in_place(qr, w, false);
		for i in 0..n {
			x[i] = w[row_inv[i]];
		}
	} else {
		w.fill(0.0);
		for i in 0..n {
			w[row_inv[i]] = x[i];
		}
		apply_householder_sequence_in_place(qr, w, true);
		solve_triangular_in_place(qr, &mut w[..n], false);
		for k in 0..n {
			x[col_fwd[k]] = w[k];
		}
	}
}

impl QrRef<'_> {
	/// solves $A x = b$, or $A^\top x = b$ if `transpose` is true, for `nrhs` right hand sides
	/// stored one after the other in `rhs`, and overwrites them with the solutions
	///
	/// singular factors are not checked and lead to non finite values.
	/// with [`Par::Rayon`], the right hand sides are split into disjoint groups solved in
	/// parallel. every right hand side goes through the same operations in both cases, so the
	/// results do not depend on `par`.
	///
	/// # panics
	/// panics if `rhs.len() != nrhs * ncols`
	#[track_caller]
	pub fn solve_in_place(self, rhs: &mut [f64], nrhs: usize, transpose: bool, par: Par, stack: &mut MemStack) {
		let symbolic = self.symbolic();
		let n = symbolic.ncols();
		let nrow_ext = symbolic.nrow_ext();
		assert!(Some(rhs.len()) == n.checked_mul(nrhs));

		if n == 0 || nrhs == 0 {
			return;
		}

		let ngroups = n_groups(nrhs, par);
		let (w, _) = unsafe { stack.make_raw::<f64>(ngroups * nrow_ext) };

		#[cfg(feature = "rayon")]
		if ngroups > 1 {
			use rayon::prelude::*;

			let per_group = nrhs.div_ceil(ngroups);
			rhs.par_chunks_mut(per_group * n).zip(w.par_chunks_mut(nrow_ext)).for_each(|(rhs, w)| {
				for x in rhs.chunks_exact_mut(n) {
					solve_one(self, x, transpose, w);
				}
			});
			return;
		}

		let w = &mut w[..nrow_ext];
		for x in rhs.chunks_exact_mut(n) {
			solve_one(self, x, transpose, w);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::assert;
	use crate::sparse::linalg::ordering::ColumnOrdering;
	use crate::sparse::linalg::qr::factor::{factorize_numeric_qr, factorize_numeric_qr_scratch};
	use crate::sparse::linalg::qr::{factorize_symbolic_qr, QrSymbolicParams};
	use crate::sparse::ops::{sparse_dense_matvec, sparse_transpose_dense_matvec};
	use crate::sparse::testing::{max_abs_diff, random_nonsingular};
	use crate::sparse::{Pair, SparseColMatRef, SymbolicSparseColMat};
	use dyn_stack::MemBuffer;
	use rand::prelude::*;

	struct Factors {
		symbolic: SymbolicQr,
		v_val: Vec<f64>,
		r_val: Vec<f64>,
		beta: Vec<f64>,
	}

	impl Factors {
		fn new(A: SparseColMatRef<'_>, ordering: ColumnOrdering) -> Self {
			let symbolic = factorize_symbolic_qr(A.symbolic(), QrSymbolicParams { ordering }).unwrap();
			let mut v_val = vec![0.0; symbolic.len_v()];
			let mut r_val = vec![0.0; symbolic.len_r()];
			let mut beta = vec![0.0; symbolic.len_beta()];
			factorize_numeric_qr(
				&mut v_val,
				&mut r_val,
				&mut beta,
				A,
				&symbolic,
				MemStack::new(&mut MemBuffer::new(factorize_numeric_qr_scratch(&symbolic))),
			);
			Self {
				symbolic,
				v_val,
				r_val,
				beta,
			}
		}

		fn qr(&self) -> QrRef<'_> {
			QrRef::new(&self.symbolic, &self.v_val, &self.r_val, &self.beta)
		}

		fn solve(&self, rhs: &mut [f64], nrhs: usize, transpose: bool, par: Par) {
			self.qr().solve_in_place(
				rhs,
				nrhs,
				transpose,
				par,
				MemStack::new(&mut MemBuffer::new(solve_in_place_scratch(&self.symbolic, nrhs, par))),
			);
		}
	}

	#[test]
	fn test_solve() {
		let rng = &mut StdRng::seed_from_u64(0);
		for n in [1, 2, 3, 10, 33, 80] {
			for ordering in [ColumnOrdering::Natural, ColumnOrdering::default()] {
				let (A, val) = random_nonsingular(rng, n, 0.06);
				let A = SparseColMatRef::new(A.as_ref(), &val);
				let factors = Factors::new(A, ordering);

				let x0: Vec<f64> = (0..n).map(|_| rng.gen::<f64>()).collect();

				for transpose in [false, true] {
					let mut b = vec![0.0; n];
					if transpose {
						sparse_transpose_dense_matvec(&mut b, A, &x0);
					} else {
						sparse_dense_matvec(&mut b, A, &x0);
					}
					factors.solve(&mut b, 1, transpose, Par::Seq);
					assert!(max_abs_diff(&b, &x0) < 1e-10);
				}
			}
		}
	}

	#[test]
	fn test_solve_batched_matches_individual() {
		let rng = &mut StdRng::seed_from_u64(1);
		let n = 25;
		let nrhs = 7;
		let (A, val) = random_nonsingular(rng, n, 0.1);
		let factors = Factors::new(SparseColMatRef::new(A.as_ref(), &val), ColumnOrdering::default());

		let b: Vec<f64> = (0..n * nrhs).map(|_| rng.gen::<f64>()).collect();
		for transpose in [false, true] {
			let mut batched = b.clone();
			factors.solve(&mut batched, nrhs, transpose, Par::Seq);

			for (j, expected) in batched.chunks_exact(n).enumerate() {
				let mut single = b[j * n..][..n].to_vec();
				factors.solve(&mut single, 1, transpose, Par::Seq);
				assert!(single.iter().zip(expected).all(|(a, b)| a.to_bits() == b.to_bits()));
			}

			#[cfg(feature = "rayon")]
			for nthreads in [1, 2, 3, 16] {
				let mut parallel = b.clone();
				factors.solve(&mut parallel, nrhs, transpose, Par::rayon(nthreads));
				assert!(parallel.iter().zip(&batched).all(|(a, b)| a.to_bits() == b.to_bits()));
			}
		}
	}

	#[test]
	fn test_solve_with_fictitious_rows() {
		// [[1 0 0 2]
		//  [0 0 0 3]
		//  [4 0 5 0]
		//  [0 0 0 0]]
		// column 1 has no entry, so it pivots on a fictitious row with a zero diagonal in R
		let A = SymbolicSparseColMat::try_new_from_indices(4, 4, &[Pair::new(0, 0), Pair::new(2, 0), Pair::new(2, 2), Pair::new(0, 3), Pair::new(1, 3)]).unwrap();
		let val = [1.0, 4.0, 5.0, 2.0, 3.0];
		let factors = Factors::new(SparseColMatRef::new(A.as_ref(), &val), ColumnOrdering::Natural);
		assert!(all(factors.symbolic.nrow_ext() == 5, factors.symbolic.n_fictitious() == 1));

		// b = A * [1, *, 1, 1] is in the image of A, the other components are still recovered
		let mut x = vec![3.0, 3.0, 9.0, 0.0];
		factors.solve(&mut x, 1, false, Par::Seq);
		assert!(x[1].is_nan());
		assert!(max_abs_diff(&[x[0], x[2], x[3]], &[1.0, 1.0, 1.0]) < 1e-12);
	}

	#[test]
	fn test_empty() {
		let A = SymbolicSparseColMat::try_new(0, 0, vec![0], vec![]).unwrap();
		let factors = Factors::new(SparseColMatRef::new(A.as_ref(), &[]), ColumnOrdering::default());
		let mut rhs: [f64; 0] = [];
		factors.solve(&mut rhs, 3, false, Par::Seq);
		factors.solve(&mut rhs, 0, true, Par::Seq);
	}
}
