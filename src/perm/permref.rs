use super::*;

/// immutable permutation view
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PermRef<'a> {
	pub(super) forward: &'a [usize],
	pub(super) inverse: &'a [usize],
}

impl<'short> Reborrow<'short> for PermRef<'_> {
	type Target = PermRef<'short>;

	#[inline]
	fn rb(&'short self) -> Self::Target {
		*self
	}
}

impl<'a> PermRef<'a> {
	/// creates a new permutation view after checking that `forward` and `inverse` are inverse
	/// permutations of each other
	pub fn try_new(forward: &'a [usize], inverse: &'a [usize]) -> Result<Self, SparseError> {
		let n = forward.len();
		if inverse.len() != n {
			return Err(SparseError::InvalidPerm {
				reason: "forward and inverse arrays must have the same length",
			});
		}
		for (k, &p) in forward.iter().enumerate() {
			if p >= n || inverse[p] != k {
				return Err(SparseError::InvalidPerm {
					reason: "forward and inverse arrays are not inverse of each other",
				});
			}
		}
		Ok(Self { forward, inverse })
	}

	/// returns the forward and inverse arrays
	#[inline]
	pub fn arrays(self) -> (&'a [usize], &'a [usize]) {
		(self.forward, self.inverse)
	}

	/// returns the length of the permutation
	#[inline]
	pub fn len(&self) -> usize {
		self.forward.len()
	}

	/// checks whether the permutation is empty
	#[inline]
	pub fn is_empty(&self) -> bool {
		self.forward.is_empty()
	}

	/// returns the inverse permutation
	#[inline]
	pub fn inverse(self) -> Self {
		Self {
			forward: self.inverse,
			inverse: self.forward,
		}
	}

	/// copies `self` into a newly allocated permutation
	#[inline]
	pub fn to_owned(self) -> Perm {
		Perm {
			forward: self.forward.into(),
			inverse: self.inverse.into(),
		}
	}
}
