use super::*;
use serde::{Deserialize, Serialize};

/// owning permutation
///
/// serialized as its forward array.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "Vec<usize>", try_from = "Vec<usize>")]
pub struct Perm {
	pub(super) forward: Box<[usize]>,
	pub(super) inverse: Box<[usize]>,
}

impl<'short> Reborrow<'short> for Perm {
	type Target = PermRef<'short>;

	#[inline]
	fn rb(&'short self) -> Self::Target {
		self.as_ref()
	}
}

impl Perm {
	/// creates the identity permutation of length `n`
	pub fn identity(n: usize) -> Self {
		let forward: Box<[usize]> = (0..n).collect();
		Self {
			inverse: forward.clone(),
			forward,
		}
	}

	/// creates a permutation from its forward array, computing the inverse
	pub fn try_from_forward(forward: Vec<usize>) -> Result<Self, SparseError> {
		let mut inverse = vec![0usize; forward.len()];
		invert(&mut inverse, &forward)?;
		Ok(Self {
			forward: forward.into_boxed_slice(),
			inverse: inverse.into_boxed_slice(),
		})
	}

	/// creates a permutation from its inverse array, computing the forward array
	pub fn try_from_inverse(inverse: Vec<usize>) -> Result<Self, SparseError> {
		Ok(Self::try_from_forward(inverse)?.into_inverse())
	}

	/// returns a view over `self`
	#[inline]
	pub fn as_ref(&self) -> PermRef<'_> {
		PermRef {
			forward: &self.forward,
			inverse: &self.inverse,
		}
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
	pub fn into_inverse(self) -> Self {
		Self {
			forward: self.inverse,
			inverse: self.forward,
		}
	}

	/// decomposes `self` into its forward and inverse arrays
	#[inline]
	pub fn into_arrays(self) -> (Box<[usize]>, Box<[usize]>) {
		(self.forward, self.inverse)
	}
}

impl From<Perm> for Vec<usize> {
	#[inline]
	fn from(perm: Perm) -> Self {
		perm.forward.into_vec()
	}
}

impl TryFrom<Vec<usize>> for Perm {
	type Error = SparseError;

	#[inline]
	fn try_from(forward: Vec<usize>) -> Result<Self, Self::Error> {
		Self::try_from_forward(forward)
	}
}
