//! rank deficiency diagnostics from the diagonal of $R$

use super::QrRef;
use crate::assert;
use serde::{Deserialize, Serialize};

/// summary of the small diagonal entries of $R$
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SingularityReport {
	/// number of diagonal entries of $R$ whose magnitude is below the threshold
	pub nullity: usize,
	/// smallest magnitude of a diagonal entry of $R$, `+inf` for an empty matrix
	pub r_min: f64,
	/// position in factorization order of the first diagonal entry reaching `r_min`
	pub i_r_min: usize,
	/// original column index of the same entry
	pub col_r_min: usize,
	/// number of columns of the factorized matrix
	pub ncols: usize,
}

impl SingularityReport {
	/// returns the numerical rank, `ncols - nullity`
	#[inline]
	pub fn rank(&self) -> usize {
		self.ncols - self.nullity
	}

	/// checks whether any diagonal entry of $R$ fell below the threshold
	#[inline]
	pub fn is_singular(&self) -> bool {
		self.nullity > 0
	}
}

impl QrRef<'_> {
	/// counts the diagonal entries of $R$ with magnitude below `eps` and locates the smallest one
	///
	/// for an empty matrix, both indices of the report are zero.
	pub fn singularity(self, eps: f64) -> SingularityReport {
		let symbolic = self.symbolic();
		let n = symbolic.ncols();
		let R = symbolic.R();
		let r_val = self.r_val();

		let mut nullity = 0usize;
		let mut r_min = f64::INFINITY;
		let mut i_r_min = 0usize;
		for c in 0..n {
			let rd = r_val[R.col_range(c).end - 1].abs();
			if rd < eps {
				nullity += 1;
			}
			if c == 0 || rd < r_min {
				r_min = rd;
				i_r_min = c;
			}
		}

		SingularityReport {
			nullity,
			r_min,
			i_r_min,
			col_r_min: if n == 0 { 0 } else { symbolic.col_perm().arrays().0[i_r_min] },
			ncols: n,
		}
	}

	/// computes a unit vector `v` in the approximate null space of $A$, associated with the
	/// `ind`-th diagonal entry of $R$ (in factorization order) whose magnitude is below `eps`
	///
	/// `v` is indexed by original column. the components for the columns after that entry are
	/// zero, and diagonal entries below `eps` met during the back substitution zero their
	/// component. returns `false` and leaves `v` untouched if there are not `ind + 1` such
	/// entries.
	///
	/// # panics
	/// panics if `v.len() != ncols`
	#[track_caller]
	pub fn column_combination_in_place(self, eps: f64, ind: usize, v: &mut [f64]) -> bool {
		let symbolic = self.symbolic();
		let n = symbolic.ncols();
		assert!(v.len() == n);

		let R = symbolic.R();
		let r_row = R.row_idx();
		let r_val = self.r_val();
		let (pc, _) = symbolic.col_perm().arrays();
		let diag = |c: usize| r_val[R.col_range(c).end - 1];

		let Some(col) = (0..n).filter(|&c| diag(c).abs() < eps).nth(ind) else {
			return false;
		};

		v.fill(0.0);
		v[pc[col]] = 1.0;
		let range = R.col_range(col);
		for p in range.start..range.end - 1 {
			v[pc[r_row[p]]] = -r_val[p];
		}

		for c in (0..col).rev() {
			for p in R.col_range(c).rev() {
				let r = r_row[p];
				if r == c {
					if r_val[p].abs() < eps {
						v[pc[r]] = 0.0;
					} else {
						v[pc[r]] /= r_val[p];
					}
				} else {
					v[pc[r]] -= r_val[p] * v[pc[c]];
				}
			}
		}

		let mut norm2 = 0.0;
		for &x in v.iter() {
			norm2 += x * x;
		}
		let scale = 1.0 / norm2.sqrt();
		for x in v.iter_mut() {
			*x *= scale;
		}
		true
	}
}
