//! permutations stored with both their forward and inverse index arrays
//!
//! a permutation of length `n` is a bijection on `[0, n)`. `forward[k]` is the index that lands at
//! position `k`, and `inverse` is the inverse map, so that `inverse[forward[k]] == k`.

use crate::sparse::{SparseError, NONE};
use reborrow::*;

mod permown;
mod permref;

pub use permown::Perm;
pub use permref::PermRef;

/// fills `inverse` with the inverse of `forward`, failing if `forward` is not a permutation
pub(crate) fn invert(inverse: &mut [usize], forward: &[usize]) -> Result<(), SparseError> {
	let n = forward.len();
	if inverse.len() != n {
		return Err(SparseError::InvalidPerm {
			reason: "forward and inverse arrays must have the same length",
		});
	}
	inverse.fill(NONE);
	for (k, &p) in forward.iter().enumerate() {
		if p >= n {
			return Err(SparseError::InvalidPerm { reason: "index out of bounds" });
		}
		if inverse[p] != NONE {
			return Err(SparseError::InvalidPerm { reason: "duplicate index" });
		}
		inverse[p] = k;
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::assert;

	#[test]
	fn test_perm() {
		let p = Perm::try_from_forward(vec![2, 0, 1]).unwrap();
		let (fwd, inv) = p.as_ref().arrays();
		assert!(all(fwd == &[2, 0, 1], inv == &[1, 2, 0], p.len() == 3));

		let q = p.as_ref().inverse().to_owned();
		assert!(q.as_ref().arrays().0 == &[1, 2, 0]);
		assert!(Perm::try_from_inverse(vec![1, 2, 0]).unwrap() == p);

		assert!(Perm::identity(3).as_ref().arrays().0 == &[0, 1, 2]);
		assert!(Perm::identity(0).len() == 0);

		assert!(Perm::try_from_forward(vec![0, 0, 1]) == Err(SparseError::InvalidPerm { reason: "duplicate index" }));
		assert!(Perm::try_from_forward(vec![0, 3, 1]) == Err(SparseError::InvalidPerm { reason: "index out of bounds" }));
		assert!(PermRef::try_new(&[0, 1], &[1, 0]).is_err());
		assert!(PermRef::try_new(&[1, 0], &[1, 0]).is_ok());
	}

	#[test]
	fn test_serde() {
		use serde_test::{assert_de_tokens_error, assert_tokens, Token};

		let p = Perm::try_from_forward(vec![1, 0]).unwrap();
		assert_tokens(&p, &[Token::Seq { len: Some(2) }, Token::U64(1), Token::U64(0), Token::SeqEnd]);
		assert_de_tokens_error::<Perm>(
			&[Token::Seq { len: Some(2) }, Token::U64(1), Token::U64(1), Token::SeqEnd],
			"invalid permutation: duplicate index",
		);
	}
}
