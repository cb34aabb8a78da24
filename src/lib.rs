//! `linsol-qr` solves square sparse linear systems $A x = b$ and $A^\top x = b$ through a
//! householder $QR$ factorization whose structure is computed once per sparsity pattern.
//!
//! the work is split the usual way for sparse direct solvers:
//!
//! - a symbolic analysis ([`sparse::linalg::qr::factorize_symbolic_qr`]) picks a fill reducing
//!   column ordering, a row assignment and the sparsity patterns of the householder vectors $V$
//!   and of the triangular factor $R$,
//! - a numeric factorization fills the values of $V$, $R$ and the householder scalars $\beta$ for
//!   every new set of matrix values sharing that pattern,
//! - the factors are then used to detect rank deficiency and to solve for any number of right
//!   hand sides.
//!
//! [`linsol::LinsolQr`] bundles these steps behind a small solver interface, together with C code
//! generation ([`codegen`]) and persistence of the symbolic state through `serde`.
//!
//! # example
//!
//! ```
//! use linsol_qr::linsol::{LinsolQr, QrOptions};
//! use linsol_qr::sparse::{Pair, SymbolicSparseColMat};
//! use linsol_qr::Par;
//!
//! // [[4.0, 1.0, 0.0]
//! //  [1.0, 3.0, 0.0]
//! //  [0.0, 2.0, 5.0]]
//! let pattern = SymbolicSparseColMat::try_new_from_indices(
//! 	3,
//! 	3,
//! 	&[Pair::new(0, 0), Pair::new(1, 0), Pair::new(0, 1), Pair::new(1, 1), Pair::new(2, 1), Pair::new(2, 2)],
//! )
//! .unwrap();
//! let values = [4.0, 1.0, 1.0, 3.0, 2.0, 5.0];
//!
//! let solver = LinsolQr::new(pattern, QrOptions::default()).unwrap();
//! let mut mem = solver.alloc_memory();
//! solver.factorize(&mut mem, &values).unwrap();
//!
//! // b = A * [1, 2, 3]
//! let mut x = [6.0, 7.0, 19.0];
//! solver.solve(&mut mem, &mut x, 1, false, Par::Seq);
//! for (x, expected) in x.iter().zip([1.0, 2.0, 3.0]) {
//! 	assert!((x - expected).abs() < 1e-12);
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(non_snake_case)]
#![warn(missing_docs)]

extern crate alloc;

use core::num::NonZeroUsize;

pub use dyn_stack;
#[doc(hidden)]
pub use equator::{assert, debug_assert};

pub mod codegen;
pub mod linsol;
pub mod perm;
pub mod sparse;

/// parallelism strategy that can be passed to the solve routines
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Par {
	/// sequential, the work runs on the calling thread
	Seq,
	/// rayon parallelism. only available with the `rayon` feature
	///
	/// the value is the maximum number of independent work groups that are handed to the current
	/// rayon thread pool
	#[cfg(feature = "rayon")]
	#[cfg_attr(docsrs, doc(cfg(feature = "rayon")))]
	Rayon(NonZeroUsize),
}

impl Par {
	/// rayon parallelism with `nthreads` groups, or one group per thread of the current rayon
	/// pool if `nthreads` is zero
	#[cfg(feature = "rayon")]
	#[cfg_attr(docsrs, doc(cfg(feature = "rayon")))]
	#[inline]
	pub fn rayon(nthreads: usize) -> Self {
		let nthreads = if nthreads == 0 { rayon::current_num_threads() } else { nthreads };
		Self::Rayon(NonZeroUsize::new(nthreads).unwrap_or(NonZeroUsize::MIN))
	}

	/// number of independent work groups this strategy may use
	#[inline]
	pub fn degree(&self) -> usize {
		match *self {
			Par::Seq => 1,
			#[cfg(feature = "rayon")]
			Par::Rayon(n) => n.get(),
		}
	}
}

impl Default for Par {
	#[inline]
	fn default() -> Self {
		Par::Seq
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::assert;

	#[test]
	fn test_par_degree() {
		assert!(Par::Seq.degree() == 1);
		assert!(Par::default() == Par::Seq);

		#[cfg(feature = "rayon")]
		{
			assert!(Par::rayon(3).degree() == 3);
			assert!(Par::rayon(0).degree() >= 1);
		}
	}
}
