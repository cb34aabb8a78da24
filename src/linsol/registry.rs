//! lookup of linear solvers by name

use super::{LinsolError, LinsolQr, QrMemory, QrOptions};
use crate::codegen::{CodeGenerator, CodegenOptions};
use crate::sparse::SymbolicSparseColMat;
use crate::Par;
use serde::{Deserialize, Serialize};

/// description of a solver option
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OptionInfo {
	/// name of the option
	pub name: &'static str,
	/// kind of value the option takes
	pub kind: &'static str,
	/// what the option controls
	pub description: &'static str,
}

/// registry entry of a linear solver kind
#[derive(Copy, Clone, Debug)]
pub struct LinsolPlugin {
	/// name the solver is looked up by
	pub name: &'static str,
	/// short description
	pub doc: &'static str,
	/// options accepted by `construct`
	pub options: &'static [OptionInfo],
	/// binds a solver to a sparsity pattern, with options given as `(name, value)` pairs
	pub construct: fn(SymbolicSparseColMat, &[(&str, f64)]) -> Result<Linsol, LinsolError>,
}

fn construct_qr(sparsity: SymbolicSparseColMat, options: &[(&str, f64)]) -> Result<Linsol, LinsolError> {
	Ok(Linsol::Qr(LinsolQr::new(sparsity, QrOptions::try_from_pairs(options)?)?))
}

/// registered linear solvers
pub static PLUGINS: &[LinsolPlugin] = &[LinsolPlugin {
	name: "qr",
	doc: "sparse householder qr factorization with fill reducing column ordering",
	options: QrOptions::OPTIONS,
	construct: construct_qr,
}];

/// looks up the solver registered under `name`
pub fn plugin(name: &str) -> Result<&'static LinsolPlugin, LinsolError> {
	PLUGINS
		.iter()
		.find(|p| p.name == name)
		.ok_or_else(|| LinsolError::UnknownSolver { name: name.into() })
}

/// linear solver of any registered kind
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Linsol {
	/// householder $QR$
	Qr(LinsolQr),
}

/// numerical state matching a [`Linsol`]
#[derive(Debug)]
pub enum LinsolMemory {
	/// state of a [`Linsol::Qr`]
	Qr(QrMemory),
}

impl Linsol {
	/// binds the solver registered under `name` to `sparsity`
	pub fn new(name: &str, sparsity: SymbolicSparseColMat, options: &[(&str, f64)]) -> Result<Self, LinsolError> {
		(plugin(name)?.construct)(sparsity, options)
	}

	/// returns the registered name of the solver kind
	pub fn name(&self) -> &'static str {
		match self {
			Linsol::Qr(_) => "qr",
		}
	}

	/// returns the dimension of the system
	pub fn ncols(&self) -> usize {
		match self {
			Linsol::Qr(solver) => solver.ncols(),
		}
	}

	/// allocates the numerical state of a factorization
	pub fn alloc_memory(&self) -> LinsolMemory {
		match self {
			Linsol::Qr(solver) => LinsolMemory::Qr(solver.alloc_memory()),
		}
	}

	/// see [`LinsolQr::factorize`]
	#[track_caller]
	pub fn factorize(&self, mem: &mut LinsolMemory, values: &[f64]) -> Result<(), LinsolError> {
		match (self, mem) {
			(Linsol::Qr(solver), LinsolMemory::Qr(mem)) => solver.factorize(mem, values),
		}
	}

	/// see [`LinsolQr::solve`]
	#[track_caller]
	pub fn solve(&self, mem: &mut LinsolMemory, rhs: &mut [f64], nrhs: usize, transpose: bool, par: Par) {
		match (self, mem) {
			(Linsol::Qr(solver), LinsolMemory::Qr(mem)) => solver.solve(mem, rhs, nrhs, transpose, par),
		}
	}

	/// see [`LinsolQr::generate`]
	pub fn generate(&self, g: &mut CodeGenerator, a: &str, x: &str, nrhs: usize, tr: bool) {
		match self {
			Linsol::Qr(solver) => solver.generate(g, a, x, nrhs, tr),
		}
	}

	/// see [`LinsolQr::codegen_function`]
	pub fn codegen_function(&self, name: &str, nrhs: usize, tr: bool, options: CodegenOptions) -> String {
		match self {
			Linsol::Qr(solver) => solver.codegen_function(name, nrhs, tr, options),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::assert;
	use crate::sparse::testing::{max_abs_diff, random_nonsingular};
	use rand::prelude::*;

	#[test]
	fn test_lookup() {
		let qr = plugin("qr").unwrap();
		assert!(all(qr.name == "qr", qr.options.len() == 1, qr.options[0].name == "eps"));

		let err = plugin("ma27").unwrap_err();
		assert!(err == LinsolError::UnknownSolver { name: "ma27".into() });
		assert!(err.to_string() == "unknown linear solver: \"ma27\"");
	}

	#[test]
	fn test_construct_and_solve() {
		let rng = &mut StdRng::seed_from_u64(0);
		let n = 15;
		let (A, val) = random_nonsingular(rng, n, 0.2);

		let solver = Linsol::new("qr", A.clone(), &[("eps", 1e-9)]).unwrap();
		assert!(all(solver.name() == "qr", solver.ncols() == n));
		let Linsol::Qr(inner) = &solver;
		assert!(inner.options().eps == 1e-9);

		let mut mem = solver.alloc_memory();
		solver.factorize(&mut mem, &val).unwrap();

		let b: Vec<f64> = (0..n).map(|_| rng.gen::<f64>()).collect();
		let mut x = b.clone();
		solver.solve(&mut mem, &mut x, 1, true, Par::Seq);

		let direct = LinsolQr::new(A, QrOptions { eps: 1e-9 }).unwrap();
		let mut direct_mem = direct.alloc_memory();
		direct.factorize(&mut direct_mem, &val).unwrap();
		let mut y = b;
		direct.solve(&mut direct_mem, &mut y, 1, true, Par::Seq);
		assert!(max_abs_diff(&x, &y) == 0.0);

		let json = serde_json::to_string(&solver).unwrap();
		assert!(serde_json::from_str::<Linsol>(&json).unwrap() == solver);
	}

	#[test]
	fn test_construct_errors() {
		let A = SymbolicSparseColMat::identity(2);
		assert!(matches!(Linsol::new("qr", A.clone(), &[("pivot", 1.0)]), Err(LinsolError::InvalidOption { .. })));
		assert!(matches!(Linsol::new("lu", A, &[]), Err(LinsolError::UnknownSolver { .. })));
	}
}
