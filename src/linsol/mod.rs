//! linear solver interface built on the sparse householder $QR$ factorization
//!
//! a [`LinsolQr`] is bound to a sparsity pattern on construction, which runs the symbolic
//! analysis once. the numerical state of a factorization lives in a separate [`QrMemory`], so
//! that one solver can be shared between threads while each thread factorizes and solves with its
//! own memory.
//!
//! solvers can also be looked up by name through [`plugin`], and their symbolic state can be
//! saved and restored through `serde` (see [`QrState`]).

use crate::assert;
use crate::codegen::{Auxiliary, CodeGenerator, CodegenOptions};
use crate::sparse::linalg::qr::factor::{factorize_numeric_qr, factorize_numeric_qr_scratch};
use crate::sparse::linalg::qr::singular::SingularityReport;
use crate::sparse::linalg::qr::solve::solve_in_place_scratch;
use crate::sparse::linalg::qr::{factorize_symbolic_qr, QrRef, QrSymbolicParams, SymbolicQr};
use crate::sparse::{SparseColMatRef, SparseError, SymbolicSparseColMat, SymbolicSparseColMatRef};
use crate::Par;
use alloc::sync::Arc;
use core::fmt;
use dyn_stack::{MemBuffer, MemStack, StackReq};
use serde::{Deserialize, Serialize};

mod persist;
mod registry;

pub use persist::QrState;
pub use registry::{plugin, Linsol, LinsolMemory, LinsolPlugin, OptionInfo, PLUGINS};

/// errors reported by the solver interface
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum LinsolError {
	/// the sparsity pattern is malformed or not square
	Sparse(SparseError),
	/// no solver is registered under the requested name
	UnknownSolver {
		/// requested name
		name: String,
	},
	/// an option is unknown or has an invalid value
	InvalidOption {
		/// name of the option
		name: String,
		/// description of the problem
		reason: &'static str,
	},
	/// the persisted state was written with an unsupported format version
	UnsupportedVersion {
		/// version found in the persisted state
		found: u32,
		/// version this crate reads and writes
		supported: u32,
	},
	/// the persisted state is inconsistent
	InvalidState(SparseError),
	/// the factorization is numerically rank deficient
	Singular(SingularityReport),
}

impl fmt::Display for LinsolError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			LinsolError::Sparse(err) => write!(f, "{err}"),
			LinsolError::UnknownSolver { name } => write!(f, "unknown linear solver: {name:?}"),
			LinsolError::InvalidOption { name, reason } => write!(f, "invalid option {name:?}: {reason}"),
			LinsolError::UnsupportedVersion { found, supported } => {
				write!(f, "unsupported state version {found}, expected {supported}")
			},
			LinsolError::InvalidState(err) => write!(f, "invalid persisted state: {err}"),
			LinsolError::Singular(report) => write!(
				f,
				"singular factorization: rank {} < {}, smallest diagonal entry of R is {:e} at position {}",
				report.rank(),
				report.ncols,
				report.r_min,
				report.i_r_min,
			),
		}
	}
}

impl core::error::Error for LinsolError {
	fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
		match self {
			LinsolError::Sparse(err) | LinsolError::InvalidState(err) => Some(err),
			_ => None,
		}
	}
}

impl From<SparseError> for LinsolError {
	#[inline]
	fn from(value: SparseError) -> Self {
		LinsolError::Sparse(value)
	}
}

/// options of [`LinsolQr`]
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QrOptions {
	/// minimum magnitude of a diagonal entry of $R$ before singularity is declared
	pub eps: f64,
}

impl Default for QrOptions {
	#[inline]
	fn default() -> Self {
		Self { eps: 1e-12 }
	}
}

impl QrOptions {
	/// options recognized by [`QrOptions::set`]
	pub const OPTIONS: &'static [OptionInfo] = &[OptionInfo {
		name: "eps",
		kind: "real",
		description: "minimum magnitude of a diagonal entry of R before singularity is declared",
	}];

	/// sets the option called `name`
	pub fn set(&mut self, name: &str, value: f64) -> Result<(), LinsolError> {
		match name {
			"eps" => {
				check_eps(value)?;
				self.eps = value;
				Ok(())
			},
			_ => Err(LinsolError::InvalidOption {
				name: name.into(),
				reason: "unknown option",
			}),
		}
	}

	/// builds options from `(name, value)` pairs applied in order over the defaults
	pub fn try_from_pairs(pairs: &[(&str, f64)]) -> Result<Self, LinsolError> {
		let mut options = Self::default();
		for &(name, value) in pairs {
			options.set(name, value)?;
		}
		Ok(options)
	}
}

pub(crate) fn check_eps(eps: f64) -> Result<(), LinsolError> {
	if eps.is_finite() && eps >= 0.0 {
		Ok(())
	} else {
		Err(LinsolError::InvalidOption {
			name: "eps".into(),
			reason: "must be finite and nonnegative",
		})
	}
}

/// state of the factorization held by a [`QrMemory`]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FactorStatus {
	/// no factorization was computed yet
	Empty,
	/// the last factorization succeeded
	Factorized,
	/// the last factorization was numerically rank deficient
	Singular,
}

/// numerical state of a factorization, created by [`LinsolQr::alloc_memory`]
pub struct QrMemory {
	v_val: Vec<f64>,
	r_val: Vec<f64>,
	beta: Vec<f64>,
	work: MemBuffer,
	work_req: StackReq,
	status: FactorStatus,
	report: Option<SingularityReport>,
}

impl fmt::Debug for QrMemory {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("QrMemory")
			.field("v_val", &self.v_val)
			.field("r_val", &self.r_val)
			.field("beta", &self.beta)
			.field("work_req", &self.work_req)
			.field("status", &self.status)
			.field("report", &self.report)
			.finish()
	}
}

impl QrMemory {
	/// returns the state of the last factorization
	#[inline]
	pub fn status(&self) -> FactorStatus {
		self.status
	}

	/// returns the singularity report of the last factorization
	#[inline]
	pub fn report(&self) -> Option<&SingularityReport> {
		self.report.as_ref()
	}

	/// returns the values of the householder vectors
	#[inline]
	pub fn v_val(&self) -> &[f64] {
		&self.v_val
	}

	/// returns the values of the triangular factor
	#[inline]
	pub fn r_val(&self) -> &[f64] {
		&self.r_val
	}

	/// returns the householder scalars
	#[inline]
	pub fn beta(&self) -> &[f64] {
		&self.beta
	}
}

// grows the buffer when `req` does not fit
fn workspace<'a>(work: &'a mut MemBuffer, work_req: &mut StackReq, req: StackReq) -> &'a mut MemStack {
	let combined = work_req.or(req);
	if combined.size_bytes() > work_req.size_bytes() || combined.align_bytes() > work_req.align_bytes() {
		*work = MemBuffer::new(combined);
		*work_req = combined;
	}
	MemStack::new(work)
}

/// sparse linear solver based on a householder $QR$ factorization
///
/// the symbolic state is immutable and reference counted, so cloning a solver is cheap.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(into = "QrState", try_from = "QrState")]
pub struct LinsolQr {
	sparsity: Arc<SymbolicSparseColMat>,
	symbolic: Arc<SymbolicQr>,
	options: QrOptions,
}

impl LinsolQr {
	/// binds a solver to `sparsity` with the default symbolic parameters
	pub fn new(sparsity: SymbolicSparseColMat, options: QrOptions) -> Result<Self, LinsolError> {
		Self::with_params(sparsity, options, QrSymbolicParams::default())
	}

	/// binds a solver to `sparsity`, and runs the symbolic analysis with `params`
	pub fn with_params(sparsity: SymbolicSparseColMat, options: QrOptions, params: QrSymbolicParams) -> Result<Self, LinsolError> {
		check_eps(options.eps)?;
		let symbolic = factorize_symbolic_qr(sparsity.as_ref(), params)?;
		Ok(Self {
			sparsity: Arc::new(sparsity),
			symbolic: Arc::new(symbolic),
			options,
		})
	}

	pub(crate) fn from_parts(sparsity: SymbolicSparseColMat, symbolic: SymbolicQr, options: QrOptions) -> Self {
		Self {
			sparsity: Arc::new(sparsity),
			symbolic: Arc::new(symbolic),
			options,
		}
	}

	pub(crate) fn into_parts(self) -> (SymbolicSparseColMat, SymbolicQr, QrOptions) {
		(Arc::unwrap_or_clone(self.sparsity), Arc::unwrap_or_clone(self.symbolic), self.options)
	}

	/// returns the sparsity pattern the solver is bound to
	#[inline]
	pub fn sparsity(&self) -> SymbolicSparseColMatRef<'_> {
		(*self.sparsity).as_ref()
	}

	/// returns the symbolic factorization
	#[inline]
	pub fn symbolic(&self) -> &SymbolicQr {
		&self.symbolic
	}

	/// returns the options of the solver
	#[inline]
	pub fn options(&self) -> &QrOptions {
		&self.options
	}

	/// returns the dimension of the system
	#[inline]
	pub fn ncols(&self) -> usize {
		self.symbolic.ncols()
	}

	/// allocates the numerical state of a factorization
	pub fn alloc_memory(&self) -> QrMemory {
		let symbolic = &*self.symbolic;
		let work_req = StackReq::any_of(&[
			factorize_numeric_qr_scratch(symbolic),
			solve_in_place_scratch(symbolic, 1, Par::Seq),
			StackReq::new::<f64>(symbolic.nrows() + symbolic.ncols()),
		]);
		QrMemory {
			v_val: vec![0.0; symbolic.len_v()],
			r_val: vec![0.0; symbolic.len_r()],
			beta: vec![0.0; symbolic.len_beta()],
			work: MemBuffer::new(work_req),
			work_req,
			status: FactorStatus::Empty,
			report: None,
		}
	}

	/// factorizes the matrix with the bound pattern and the nonzero values `values`
	///
	/// the factors are computed in full even when the matrix is rank deficient, in which case
	/// [`LinsolError::Singular`] is returned and a warning is logged.
	///
	/// # panics
	/// panics if `values.len()` differs from the number of nonzeros of the pattern, or if `mem`
	/// was allocated by a solver with a different structure
	#[track_caller]
	pub fn factorize(&self, mem: &mut QrMemory, values: &[f64]) -> Result<(), LinsolError> {
		let symbolic = &*self.symbolic;
		assert!(all(
			values.len() == self.sparsity.compute_nnz(),
			mem.v_val.len() == symbolic.len_v(),
			mem.r_val.len() == symbolic.len_r(),
			mem.beta.len() == symbolic.len_beta(),
		));

		let A = SparseColMatRef::new(self.sparsity(), values);
		let stack = workspace(&mut mem.work, &mut mem.work_req, factorize_numeric_qr_scratch(symbolic));
		factorize_numeric_qr(&mut mem.v_val, &mut mem.r_val, &mut mem.beta, A, symbolic, stack);

		let qr = QrRef::new(symbolic, &mem.v_val, &mem.r_val, &mem.beta);
		let eps = self.options.eps;
		let report = qr.singularity(eps);
		mem.report = Some(report);

		if !report.is_singular() {
			mem.status = FactorStatus::Factorized;
			return Ok(());
		}
		mem.status = FactorStatus::Singular;

		log::warn!(target: "linsol_qr", "singular factorization: rank {} < {}", report.rank(), report.ncols);
		log::warn!(
			target: "linsol_qr",
			"first singular R entry: {:e} < {eps:e}, at position {}, corresponding to column {}",
			report.r_min,
			report.i_r_min,
			report.col_r_min,
		);
		if log::log_enabled!(target: "linsol_qr", log::Level::Debug) {
			let mut v = vec![0.0; symbolic.ncols()];
			if qr.column_combination_in_place(eps, 0, &mut v) {
				log::debug!(target: "linsol_qr", "linearly dependent column combination: {v:?}");
			}
		}
		Err(LinsolError::Singular(report))
	}

	/// solves $A x = b$, or $A^\top x = b$ if `transpose` is true, with the factors held by `mem`
	///
	/// `rhs` holds `nrhs` right hand sides one after the other and is overwritten with the
	/// solutions. the factorization is not checked: solving after a failed or missing
	/// factorization gives meaningless values.
	///
	/// # panics
	/// panics if `rhs.len() != nrhs * ncols`
	#[track_caller]
	pub fn solve(&self, mem: &mut QrMemory, rhs: &mut [f64], nrhs: usize, transpose: bool, par: Par) {
		let symbolic = &*self.symbolic;
		let stack = workspace(&mut mem.work, &mut mem.work_req, solve_in_place_scratch(symbolic, nrhs, par));
		QrRef::new(symbolic, &mem.v_val, &mem.r_val, &mem.beta).solve_in_place(rhs, nrhs, transpose, par, stack);
	}

	/// recomputes the singularity report of the factors held by `mem` with the threshold `eps`
	#[track_caller]
	pub fn singularity(&self, mem: &QrMemory, eps: f64) -> SingularityReport {
		QrRef::new(&self.symbolic, &mem.v_val, &mem.r_val, &mem.beta).singularity(eps)
	}

	/// returns the unit vector explaining the `ind`-th singular direction of the factors held by
	/// `mem`, indexed by original column, or `None` if there are not `ind + 1` diagonal entries of
	/// $R$ below the threshold of the solver
	#[track_caller]
	pub fn column_combination(&self, mem: &QrMemory, ind: usize) -> Option<Vec<f64>> {
		let mut v = vec![0.0; self.ncols()];
		QrRef::new(&self.symbolic, &mem.v_val, &mem.r_val, &mem.beta)
			.column_combination_in_place(self.options.eps, ind, &mut v)
			.then_some(v)
	}

	/// appends to `g` a block that factorizes the matrix whose nonzero values are in the C array
	/// `a` and solves in place for the `nrhs` right hand sides stored in the C array `x`
	///
	/// the symbolic data is embedded as constant tables. when
	/// [`CodegenOptions::check_singular`] is set, the block returns `1` from the enclosing
	/// function if the factorization is rank deficient.
	pub fn generate(&self, g: &mut CodeGenerator, a: &str, x: &str, nrhs: usize, tr: bool) {
		let symbolic = &*self.symbolic;
		let n = symbolic.ncols();
		let real = g.real();

		let sp_a = g.sparsity(self.sparsity());
		let sp_v = g.sparsity(symbolic.V());
		let sp_r = g.sparsity(symbolic.R());
		let prinv = g.constant(symbolic.row_perm().arrays().1);
		let pc = g.constant(symbolic.col_perm().arrays().0);

		let qr = g.auxiliary(Auxiliary::Qr);
		let qr_solve = g.auxiliary(Auxiliary::QrSolve);

		g.open_block("");
		g.comment(&format!("sparse qr: {n}x{n}, nnz(V) = {}, nnz(R) = {}", symbolic.len_v(), symbolic.len_r()));
		g.line(&format!(
			"{real} v[{}], r[{}], beta[{}], w[{}];",
			Ord::max(1, symbolic.len_v()),
			Ord::max(1, symbolic.len_r()),
			Ord::max(1, n),
			Ord::max(1, symbolic.nrows() + n),
		));
		g.line(&format!("{qr}({sp_a}, {a}, w, {sp_v}, v, {sp_r}, r, beta, {prinv}, {pc});"));
		if g.options().check_singular {
			let qr_singular = g.auxiliary(Auxiliary::QrSingular);
			let eps = g.real_literal(self.options.eps);
			g.line(&format!("if ({qr_singular}(r, {sp_r}, {eps}) > 0) return 1;"));
		}
		g.line(&format!("{qr_solve}({x}, {nrhs}, {}, {sp_v}, v, {sp_r}, r, beta, {prinv}, {pc}, w);", tr as u8));
		g.close_block();
	}

	/// returns a C translation unit defining `int name(const real* a, real* x)`, which factorizes
	/// the matrix with nonzero values `a` and solves in place for the `nrhs` right hand sides in
	/// `x`
	///
	/// the function returns `0`, or `1` if [`CodegenOptions::check_singular`] is set and the
	/// factorization is rank deficient.
	pub fn codegen_function(&self, name: &str, nrhs: usize, tr: bool, options: CodegenOptions) -> String {
		let mut g = CodeGenerator::new(options);
		let real = g.real();
		g.open_block(&format!("int {name}(const {real}* a, {real}* x)"));
		self.generate(&mut g, "a", "x", nrhs, tr);
		g.line("return 0;");
		g.close_block();
		g.finish()
	}
}
