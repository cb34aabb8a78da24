//! C code generation
//!
//! a [`CodeGenerator`] collects the pieces of a C99 translation unit: integer constant tables,
//! the runtime helper functions that the generated code calls, and a body. the helpers perform
//! the same sequence of floating point operations as the kernels of
//! [`crate::sparse::linalg::qr`], so the emitted code reproduces the results of this crate bit for
//! bit when compiled without floating point contraction (`-ffp-contract=off`).
//!
//! sparsity patterns are emitted in the compact layout
//! `[nrows, ncols, col_ptr[0], ..., col_ptr[ncols], row_idx[0], ...]`.

use crate::sparse::SymbolicSparseColMatRef;
use alloc::collections::BTreeSet;
use core::fmt::Write;
use serde::{Deserialize, Serialize};

/// options controlling the emitted code
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodegenOptions {
	/// C type of real numbers
	pub real_type: String,
	/// C type of integers, must be signed
	pub int_type: String,
	/// prefix of every emitted symbol
	pub prefix: String,
	/// make the generated solve return `1` without solving when the factorization is rank
	/// deficient
	pub check_singular: bool,
}

impl Default for CodegenOptions {
	fn default() -> Self {
		Self {
			real_type: "double".into(),
			int_type: "long long int".into(),
			prefix: "lsqr_".into(),
			check_singular: false,
		}
	}
}

/// runtime helper functions that can be emitted
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Auxiliary {
	/// householder reflection of a dense vector
	House,
	/// numeric $QR$ factorization
	Qr,
	/// application of the householder sequence
	QrMv,
	/// triangular solve with $R$ or $R^\top$
	QrTrs,
	/// solve with the $QR$ factors
	QrSolve,
	/// count of the small diagonal entries of $R$
	QrSingular,
}

impl Auxiliary {
	fn dependencies(self) -> &'static [Auxiliary] {
		match self {
			Auxiliary::Qr => &[Auxiliary::House],
			Auxiliary::QrSolve => &[Auxiliary::QrMv, Auxiliary::QrTrs],
			_ => &[],
		}
	}

	fn source(self) -> &'static str {
		match self {
			Auxiliary::House => HOUSE,
			Auxiliary::Qr => QR,
			Auxiliary::QrMv => QR_MV,
			Auxiliary::QrTrs => QR_TRS,
			Auxiliary::QrSolve => QR_SOLVE,
			Auxiliary::QrSingular => QR_SINGULAR,
		}
	}
}

const HOUSE: &str = "\
/* householder reflection, returns the norm of v */
static $R $Phouse($R* v, $R* beta, $I nv) {
  $I i;
  $R v0, sigma, s;
  v0 = v[0];
  sigma = 0;
  for (i = 1; i < nv; ++i) sigma += v[i] * v[i];
  s = sqrt(v0 * v0 + sigma);
  if (sigma == 0) {
    *beta = v0 <= 0 ? 2 : 0;
    v[0] = 1;
  } else {
    v[0] = v0 <= 0 ? v0 - s : -sigma / (v0 + s);
    *beta = -1 / (s * v[0]);
  }
  return s;
}
";

const QR: &str = "\
/* numeric householder qr, x is a work vector of length nrow_ext */
static void $Pqr(const $I* sp_a, const $R* nz_a, $R* x, const $I* sp_v, $R* nz_v, const $I* sp_r, $R* nz_r, $R* beta, const $I* prinv, const $I* pc) {
  $I ncol, nrow_ext, c, j, k, k1, r;
  const $I *a_colind, *a_row, *v_colind, *v_row, *r_colind, *r_row;
  $R alpha;
  ncol = sp_a[1];
  a_colind = sp_a + 2;
  a_row = a_colind + ncol + 1;
  nrow_ext = sp_v[0];
  v_colind = sp_v + 2;
  v_row = v_colind + ncol + 1;
  r_colind = sp_r + 2;
  r_row = r_colind + ncol + 1;
  for (r = 0; r < nrow_ext; ++r) x[r] = 0;
  for (c = 0; c < ncol; ++c) {
    j = pc[c];
    for (k = a_colind[j]; k < a_colind[j + 1]; ++k) x[prinv[a_row[k]]] = nz_a[k];
    for (k = r_colind[c]; k < r_colind[c + 1] - 1; ++k) {
      r = r_row[k];
      alpha = 0;
      for (k1 = v_colind[r]; k1 < v_colind[r + 1]; ++k1) alpha += nz_v[k1] * x[v_row[k1]];
      alpha *= beta[r];
      for (k1 = v_colind[r]; k1 < v_colind[r + 1]; ++k1) x[v_row[k1]] -= alpha * nz_v[k1];
      nz_r[k] = x[r];
      x[r] = 0;
    }
    for (k = v_colind[c]; k < v_colind[c + 1]; ++k) {
      nz_v[k] = x[v_row[k]];
      x[v_row[k]] = 0;
    }
    nz_r[r_colind[c + 1] - 1] = $Phouse(nz_v + v_colind[c], beta + c, v_colind[c + 1] - v_colind[c]);
  }
}
";

const QR_MV: &str = "\
/* x <- Q' x if tr, x <- Q x otherwise */
static void $Pqr_mv(const $I* sp_v, const $R* v, const $R* beta, $R* x, $I tr) {
  $I ncol, c, c1, k;
  const $I *colind, *row;
  $R alpha;
  ncol = sp_v[1];
  colind = sp_v + 2;
  row = colind + ncol + 1;
  for (c1 = 0; c1 < ncol; ++c1) {
    c = tr ? c1 : ncol - 1 - c1;
    alpha = 0;
    for (k = colind[c]; k < colind[c + 1]; ++k) alpha += v[k] * x[row[k]];
    alpha *= beta[c];
    for (k = colind[c]; k < colind[c + 1]; ++k) x[row[k]] -= alpha * v[k];
  }
}
";

const QR_TRS: &str = "\
/* x <- R' \\ x if tr, x <- R \\ x otherwise */
static void $Pqr_trs(const $I* sp_r, const $R* nz_r, $R* x, $I tr) {
  $I ncol, c, k, r;
  const $I *colind, *row;
  ncol = sp_r[1];
  colind = sp_r + 2;
  row = colind + ncol + 1;
  if (tr) {
    for (c = 0; c < ncol; ++c) {
      for (k = colind[c]; k < colind[c + 1]; ++k) {
        r = row[k];
        if (r == c) {
          x[c] /= nz_r[k];
        } else {
          x[c] -= nz_r[k] * x[r];
        }
      }
    }
  } else {
    for (c = ncol - 1; c >= 0; --c) {
      for (k = colind[c + 1] - 1; k >= colind[c]; --k) {
        r = row[k];
        if (r == c) {
          x[r] /= nz_r[k];
        } else {
          x[r] -= nz_r[k] * x[c];
        }
      }
    }
  }
}
";

const QR_SOLVE: &str = "\
/* solves nrhs systems stored one after the other in x, w has length nrow_ext */
static void $Pqr_solve($R* x, $I nrhs, $I tr, const $I* sp_v, const $R* v, const $I* sp_r, const $R* r, const $R* beta, const $I* prinv, const $I* pc, $R* w) {
  $I k, c, nrow_ext, ncol;
  nrow_ext = sp_v[0];
  ncol = sp_v[1];
  for (k = 0; k < nrhs; ++k) {
    if (tr) {
      for (c = 0; c < ncol; ++c) w[c] = x[pc[c]];
      $Pqr_trs(sp_r, r, w, 1);
      for (c = ncol; c < nrow_ext; ++c) w[c] = 0;
      $Pqr_mv(sp_v, v, beta, w, 0);
      for (c = 0; c < ncol; ++c) x[c] = w[prinv[c]];
    } else {
      for (c = 0; c < nrow_ext; ++c) w[c] = 0;
      for (c = 0; c < ncol; ++c) w[prinv[c]] = x[c];
      $Pqr_mv(sp_v, v, beta, w, 1);
      $Pqr_trs(sp_r, r, w, 0);
      for (c = 0; c < ncol; ++c) x[pc[c]] = w[c];
    }
    x += ncol;
  }
}
";

const QR_SINGULAR: &str = "\
/* number of diagonal entries of R with magnitude below eps */
static $I $Pqr_singular(const $R* nz_r, const $I* sp_r, $R eps) {
  $I ncol, c, nullity;
  const $I* colind;
  ncol = sp_r[1];
  colind = sp_r + 2;
  nullity = 0;
  for (c = 0; c < ncol; ++c) {
    if (fabs(nz_r[colind[c + 1] - 1]) < eps) ++nullity;
  }
  return nullity;
}
";

/// builder of a C translation unit
#[derive(Clone, Debug)]
pub struct CodeGenerator {
	options: CodegenOptions,
	constants: Vec<Vec<usize>>,
	auxiliaries: BTreeSet<Auxiliary>,
	body: String,
	indent: usize,
}

impl CodeGenerator {
	/// creates an empty translation unit
	pub fn new(options: CodegenOptions) -> Self {
		Self {
			options,
			constants: Vec::new(),
			auxiliaries: BTreeSet::new(),
			body: String::new(),
			indent: 0,
		}
	}

	/// returns the options of the generator
	#[inline]
	pub fn options(&self) -> &CodegenOptions {
		&self.options
	}

	/// returns the name of the emitted real type
	pub fn real(&self) -> String {
		format!("{}real", self.options.prefix)
	}

	/// returns the name of the emitted integer type
	pub fn int(&self) -> String {
		format!("{}int", self.options.prefix)
	}

	/// returns the name of the function emitted for `aux`, and schedules its emission
	pub fn auxiliary(&mut self, aux: Auxiliary) -> String {
		self.add_auxiliary(aux);
		let name = match aux {
			Auxiliary::House => "house",
			Auxiliary::Qr => "qr",
			Auxiliary::QrMv => "qr_mv",
			Auxiliary::QrTrs => "qr_trs",
			Auxiliary::QrSolve => "qr_solve",
			Auxiliary::QrSingular => "qr_singular",
		};
		format!("{}{name}", self.options.prefix)
	}

	/// schedules the emission of `aux` and of the helpers it calls
	pub fn add_auxiliary(&mut self, aux: Auxiliary) {
		if self.auxiliaries.insert(aux) {
			for &dep in aux.dependencies() {
				self.add_auxiliary(dep);
			}
		}
	}

	/// returns the name of a constant integer table holding `values`
	///
	/// identical tables are emitted once.
	pub fn constant(&mut self, values: &[usize]) -> String {
		let idx = match self.constants.iter().position(|c| c == values) {
			Some(idx) => idx,
			None => {
				self.constants.push(values.to_vec());
				self.constants.len() - 1
			},
		};
		format!("{}s{idx}", self.options.prefix)
	}

	/// returns the name of a constant table holding `pattern` in compact layout
	pub fn sparsity(&mut self, pattern: SymbolicSparseColMatRef<'_>) -> String {
		let mut values = Vec::with_capacity(2 + pattern.ncols() + 1 + pattern.compute_nnz());
		values.push(pattern.nrows());
		values.push(pattern.ncols());
		values.extend_from_slice(pattern.col_ptr());
		values.extend_from_slice(pattern.row_idx());
		self.constant(&values)
	}

	/// returns a C expression for the real value `value`
	pub fn real_literal(&self, value: f64) -> String {
		if value.is_nan() {
			"NAN".into()
		} else if value.is_infinite() {
			if value > 0.0 { "INFINITY".into() } else { "-INFINITY".into() }
		} else {
			format!("{value:e}")
		}
	}

	/// appends a line to the body at the current indentation
	pub fn line(&mut self, line: &str) {
		for _ in 0..self.indent {
			self.body.push_str("  ");
		}
		self.body.push_str(line);
		self.body.push('\n');
	}

	/// appends a comment line to the body
	pub fn comment(&mut self, text: &str) {
		self.line(&format!("/* {text} */"));
	}

	/// opens a block in the body
	pub fn open_block(&mut self, header: &str) {
		if header.is_empty() {
			self.line("{");
		} else {
			self.line(&format!("{header} {{"));
		}
		self.indent += 1;
	}

	/// closes the innermost block of the body
	pub fn close_block(&mut self) {
		self.indent = self.indent.saturating_sub(1);
		self.line("}");
	}

	/// returns the body emitted so far
	#[inline]
	pub fn body(&self) -> &str {
		&self.body
	}

	/// assembles the translation unit
	pub fn finish(&self) -> String {
		let prefix = &self.options.prefix;
		let real = self.real();
		let int = self.int();

		let mut out = String::new();
		let _ = writeln!(out, "/* generated by linsol-qr */");
		let _ = writeln!(out, "#include <math.h>");
		let _ = writeln!(out);
		let _ = writeln!(out, "typedef {} {real};", self.options.real_type);
		let _ = writeln!(out, "typedef {} {int};", self.options.int_type);
		let _ = writeln!(out);

		for (idx, values) in self.constants.iter().enumerate() {
			let _ = write!(out, "static const {int} {prefix}s{idx}[{}] = {{", Ord::max(1, values.len()));
			if values.is_empty() {
				out.push('0');
			}
			for (i, v) in values.iter().enumerate() {
				if i > 0 {
					out.push_str(", ");
				}
				let _ = write!(out, "{v}");
			}
			out.push_str("};\n");
		}
		if !self.constants.is_empty() {
			out.push('\n');
		}

		for aux in &self.auxiliaries {
			out.push_str(&aux.source().replace("$P", prefix).replace("$R", &real).replace("$I", &int));
			out.push('\n');
		}

		out.push_str(&self.body);
		out
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::assert;
	use crate::sparse::SymbolicSparseColMat;

	#[test]
	fn test_constants() {
		let mut g = CodeGenerator::new(CodegenOptions::default());
		let a = g.constant(&[1, 2, 3]);
		let b = g.constant(&[4]);
		let c = g.constant(&[1, 2, 3]);
		assert!(all(a == "lsqr_s0", b == "lsqr_s1", c == a));

		let sp = SymbolicSparseColMat::try_new(3, 2, vec![0, 2, 3], vec![0, 2, 1]).unwrap();
		let name = g.sparsity(sp.as_ref());
		assert!(name == "lsqr_s2");

		let empty = g.constant(&[]);
		let out = g.finish();
		assert!(out.contains("static const lsqr_int lsqr_s0[3] = {1, 2, 3};"));
		assert!(out.contains("static const lsqr_int lsqr_s2[8] = {3, 2, 0, 2, 3, 0, 2, 1};"));
		assert!(out.contains(&format!("static const lsqr_int {empty}[1] = {{0}};")));
		assert!(out.contains("typedef double lsqr_real;"));
		assert!(out.contains("typedef long long int lsqr_int;"));
	}

	#[test]
	fn test_auxiliaries() {
		let mut g = CodeGenerator::new(CodegenOptions {
			prefix: "my_".into(),
			..Default::default()
		});
		assert!(g.auxiliary(Auxiliary::QrSolve) == "my_qr_solve");
		let out = g.finish();
		assert!(all(
			out.contains("static void my_qr_solve("),
			out.contains("static void my_qr_mv("),
			out.contains("static void my_qr_trs("),
			!out.contains("my_house"),
			!out.contains("$P"),
			!out.contains("$R"),
			!out.contains("$I"),
		));
		// helpers are defined before their callers
		assert!(out.find("static void my_qr_mv(") < out.find("static void my_qr_solve("));

		g.add_auxiliary(Auxiliary::Qr);
		let out = g.finish();
		assert!(out.find("static my_real my_house(") < out.find("static void my_qr("));
	}

	#[test]
	fn test_literals_and_body() {
		let mut g = CodeGenerator::new(CodegenOptions::default());
		assert!(all(
			g.real_literal(1e-12) == "1e-12",
			g.real_literal(0.5) == "5e-1",
			g.real_literal(-0.0) == "-0e0",
			g.real_literal(f64::INFINITY) == "INFINITY",
		));
		assert!(g.real_literal(0.1).parse::<f64>() == Ok(0.1));

		g.open_block("int f(void)");
		g.comment("hello");
		g.line("return 0;");
		g.close_block();
		assert!(g.body() == "int f(void) {\n  /* hello */\n  return 0;\n}\n");
	}
}
