//! fill-reducing column orderings for the $QR$ factorization
//!
//! the fill of the $R$ factor of $AP$ is the fill of the cholesky factor of $P^\top A^\top A P$, so
//! the orderings here work on the column intersection graph of $A$, where two columns are adjacent
//! when they have a structurally nonzero entry in a common row. the graph is never formed
//! explicitly: the approximate minimum degree ordering keeps the rows of $A$ as elements and
//! merges them as columns are eliminated.

// COLAMD, Copyright (c) 1998-2022, Timothy A. Davis and Stefan Larimore,
// All Rights Reserved.
// SPDX-License-Identifier: BSD-3-clause
//
//     Redistribution and use in source and binary forms, with or without
//     modification, are permitted provided that the following conditions are met:
//         * Redistributions of source code must retain the above copyright notice, this list of
//           conditions and the following disclaimer.
//         * Redistributions in binary form must reproduce the above copyright notice, this list of
//           conditions and the following disclaimer in the documentation and/or other materials
//           provided with the distribution.
//         * Neither the name of the organizations to which the authors are affiliated, nor the
//           names of its contributors may be used to endorse or promote products derived from this
//           software without specific prior written permission.
//
//     THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS "AS IS"
//     AND ANY EXPRESS OR IMPLIED WARRANTIES, INCLUDING, BUT NOT LIMITED TO, THE
//     IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR PURPOSE
//     ARE DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT HOLDERS BE LIABLE FOR ANY
//     DIRECT, INDIRECT, INCIDENTAL, SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES
//     (INCLUDING, BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR
//     SERVICES; LOSS OF USE, DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER
//     CAUSED AND ON ANY THEORY OF LIABILITY, WHETHER IN CONTRACT, STRICT
//     LIABILITY, OR TORT (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY
//     OUT OF THE USE OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH
//     DAMAGE.

use crate::sparse::{SparseError, SymbolicSparseColMatRef, NONE};
use crate::{assert, debug_assert};
use core::ops::Range;
use dyn_stack::{MemStack, StackReq};
use serde::{Deserialize, Serialize};

const EMPTY: isize = -1;

/// tuning parameters for the approximate minimum degree ordering
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Control {
	/// a row is "dense" if its number of entries exceeds
	/// `max(16, 10 * dense_row * sqrt(ncols))`. dense rows are ignored when building the column
	/// intersection graph. a negative value disables the detection
	pub dense_row: f64,
	/// a column is "dense" if its number of entries exceeds
	/// `max(16, 10 * dense_col * sqrt(min(nrows, ncols)))`. dense columns are ordered last. a
	/// negative value disables the detection
	pub dense_col: f64,
	/// whether elements that become a subset of the new element are absorbed into it
	pub aggressive: bool,
}

impl Default for Control {
	#[inline]
	fn default() -> Self {
		Self {
			dense_row: 0.5,
			dense_col: 0.5,
			aggressive: true,
		}
	}
}

/// column ordering strategy
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ColumnOrdering {
	/// keep the columns in their original order
	Natural,
	/// approximate minimum degree on the column intersection graph
	MinimumDegree(Control),
}

impl Default for ColumnOrdering {
	#[inline]
	fn default() -> Self {
		Self::MinimumDegree(Control::default())
	}
}

/// returns the number of entries above which a row is considered dense
pub fn dense_row_threshold(ncols: usize, control: Control) -> usize {
	if control.dense_row < 0.0 {
		return NONE;
	}
	let t = 10.0 * control.dense_row * (ncols as f64).sqrt();
	Ord::max(16, t as usize)
}

/// returns the number of entries above which a column is considered dense
pub fn dense_col_threshold(nrows: usize, ncols: usize, control: Control) -> usize {
	if control.dense_col < 0.0 {
		return NONE;
	}
	let t = 10.0 * control.dense_col * (Ord::min(nrows, ncols) as f64).sqrt();
	Ord::max(16, t as usize)
}

// `degree` doubles as the insertion pointer while the row form is built
#[derive(Copy, Clone, Debug)]
#[repr(C)]
struct ColamdRow {
	start: isize,
	length: isize,
	degree: isize,
	mark: isize,
}

// for a non-principal column, `thickness` holds its parent. `score` becomes the elimination
// order once the column is dead. while the pivot row is hashed, `prev` holds the hash and `next`
// links the hash bucket
#[derive(Copy, Clone, Debug)]
#[repr(C)]
struct ColamdCol {
	start: isize,
	length: isize,
	thickness: isize,
	score: isize,
	prev: isize,
	next: isize,
}

unsafe impl bytemuck::Zeroable for ColamdRow {}
unsafe impl bytemuck::Pod for ColamdRow {}
unsafe impl bytemuck::Zeroable for ColamdCol {}
unsafe impl bytemuck::Pod for ColamdCol {}

impl ColamdRow {
	const SENTINEL: Self = Self {
		start: EMPTY,
		length: EMPTY,
		degree: EMPTY,
		mark: EMPTY,
	};

	#[inline]
	fn range(&self) -> Range<usize> {
		self.start as usize..(self.start + self.length) as usize
	}

	#[inline]
	fn is_dead(&self) -> bool {
		self.mark < 0
	}

	#[inline]
	fn is_alive(&self) -> bool {
		!self.is_dead()
	}

	#[inline]
	fn kill(&mut self) {
		self.mark = EMPTY;
	}
}

impl ColamdCol {
	const SENTINEL: Self = Self {
		start: EMPTY,
		length: EMPTY,
		thickness: EMPTY,
		score: EMPTY,
		prev: EMPTY,
		next: EMPTY,
	};

	#[inline]
	fn range(&self) -> Range<usize> {
		self.start as usize..(self.start + self.length) as usize
	}

	#[inline]
	fn is_dead_principal(&self) -> bool {
		self.start == EMPTY
	}

	#[inline]
	fn is_dead(&self) -> bool {
		self.start < 0
	}

	#[inline]
	fn is_alive(&self) -> bool {
		!self.is_dead()
	}

	#[inline]
	fn kill_principal(&mut self) {
		self.start = EMPTY;
	}

	#[inline]
	fn kill_non_principal(&mut self) {
		self.start = EMPTY - 1;
	}
}

fn clear_mark(tag_mark: isize, max_mark: isize, row: &mut [ColamdRow]) -> isize {
	if tag_mark == 0 || tag_mark >= max_mark {
		for r in row {
			if r.is_alive() {
				r.mark = 0;
			}
		}
		1
	} else {
		tag_mark
	}
}

fn workspace_len(ncols: usize, A_nnz: usize) -> Option<usize> {
	A_nnz.checked_mul(2)?.checked_add(A_nnz / 5)?.checked_add(ncols)
}

/// computes the size and alignment of the workspace required by [`order`] for a matrix with
/// dimensions `(nrows, ncols)` and `A_nnz` structurally nonzero entries
pub fn order_scratch(nrows: usize, ncols: usize, A_nnz: usize) -> StackReq {
	StackReq::all_of(&[
		StackReq::new::<ColamdCol>(ncols + 1),
		StackReq::new::<ColamdRow>(nrows + 1),
		StackReq::new::<isize>(ncols + 1),
		StackReq::new::<isize>(workspace_len(ncols, A_nnz).unwrap_or(usize::MAX)),
	])
}

/// computes an approximate minimum degree ordering of the columns of `A`
///
/// `perm[k]` is set to the column that is eliminated at step `k` and `perm_inv` to its inverse.
/// the result only depends on the pattern of `A` and on `control`.
#[track_caller]
pub fn order(
	perm: &mut [usize],
	perm_inv: &mut [usize],
	A: SymbolicSparseColMatRef<'_>,
	control: Control,
	stack: &mut MemStack,
) -> Result<(), SparseError> {
	let m = A.nrows();
	let n = A.ncols();
	assert!(all(perm.len() == n, perm_inv.len() == n));

	let nnz = A.compute_nnz();
	let len = workspace_len(n, nnz).ok_or(SparseError::IndexOverflow)?;

	let (col, stack) = unsafe { stack.make_raw::<ColamdCol>(n + 1) };
	let (row, stack) = unsafe { stack.make_raw::<ColamdRow>(m + 1) };
	let (head, stack) = unsafe { stack.make_raw::<isize>(n + 1) };
	let (idx, _) = unsafe { stack.make_raw::<isize>(len) };

	// column form first, then row form, then elbow room for the new elements
	for (dst, &i) in idx.iter_mut().zip(A.row_idx()) {
		*dst = i as isize;
	}
	for c in 0..n {
		let range = A.col_range(c);
		col[c] = ColamdCol {
			start: range.start as isize,
			length: range.len() as isize,
			thickness: 1,
			score: 0,
			prev: EMPTY,
			next: EMPTY,
		};
	}
	col[n] = ColamdCol::SENTINEL;

	for r in 0..m {
		row[r] = ColamdRow {
			start: 0,
			length: 0,
			degree: 0,
			mark: 0,
		};
	}
	row[m] = ColamdRow::SENTINEL;

	for &i in A.row_idx() {
		row[i].length += 1;
	}
	let mut start = nnz as isize;
	for r in 0..m {
		row[r].start = start;
		row[r].degree = start;
		start += row[r].length;
	}
	for c in 0..n {
		for i in A.row_idx_of_col(c) {
			idx[row[i].degree as usize] = c as isize;
			row[i].degree += 1;
		}
	}
	for r in &mut row[..m] {
		r.degree = r.length;
	}

	let dense_row_count = dense_row_threshold(n, control);
	let dense_col_count = dense_col_threshold(m, n, control);
	let mut ndense_rows = 0usize;
	let mut ndense_cols = 0usize;

	let mut max_deg = 0usize;
	let mut ncol2 = n;

	// empty columns go last, dense columns right before them
	for c in (0..n).rev() {
		if col[c].length == 0 {
			ncol2 -= 1;
			col[c].score = ncol2 as isize;
			col[c].kill_principal();
		}
	}
	for c in (0..n).rev() {
		if col[c].is_dead() {
			continue;
		}
		if col[c].length as usize > dense_col_count {
			ncol2 -= 1;
			ndense_cols += 1;
			col[c].score = ncol2 as isize;
			for cp in col[c].range() {
				row[idx[cp] as usize].degree -= 1;
			}
			col[c].kill_principal();
		}
	}

	for r in 0..m {
		let deg = row[r].degree as usize;
		debug_assert!(deg <= n);
		if deg > dense_row_count || deg == 0 {
			if deg > 0 {
				ndense_rows += 1;
			}
			row[r].kill();
		} else {
			max_deg = Ord::max(max_deg, deg);
		}
	}

	for c in (0..n).rev() {
		if col[c].is_dead() {
			continue;
		}

		let start = col[c].start as usize;
		let mut new_cp = start;
		let mut score = 0usize;
		for cp in col[c].range() {
			let r = idx[cp] as usize;
			if row[r].is_dead() {
				continue;
			}
			idx[new_cp] = r as isize;
			new_cp += 1;

			score += row[r].degree as usize - 1;
			score = Ord::min(score, n);
		}

		if new_cp == start {
			ncol2 -= 1;
			col[c].score = ncol2 as isize;
			col[c].kill_principal();
		} else {
			col[c].length = (new_cp - start) as isize;
			col[c].score = score as isize;
		}
	}

	// degree lists, the smallest column index at the front of each list
	head.fill(EMPTY);
	for c in (0..n).rev() {
		if col[c].is_alive() {
			let score = col[c].score as usize;
			let next = head[score];
			col[c].prev = EMPTY;
			col[c].next = next;
			if next != EMPTY {
				col[next as usize].prev = c as isize;
			}
			head[score] = c as isize;
		}
	}

	let max_mark = isize::MAX - n as isize;
	let mut tag_mark = clear_mark(0, max_mark, row);
	let mut min_score = 0usize;
	let mut pfree = 2 * nnz;

	let mut k = 0usize;
	while k < ncol2 {
		while head[min_score] == EMPTY && min_score < n {
			min_score += 1;
		}

		let pivot_col = head[min_score] as usize;
		let next = col[pivot_col].next;
		head[min_score] = next;
		if next != EMPTY {
			col[next as usize].prev = EMPTY;
		}
		debug_assert!(col[pivot_col].is_alive());

		let pivot_col_score = col[pivot_col].score;
		col[pivot_col].score = k as isize;

		let pivot_col_thickness = col[pivot_col].thickness;
		debug_assert!(pivot_col_thickness > 0);
		k += pivot_col_thickness as usize;

		let needed_memory = Ord::min(pivot_col_score, (n - k) as isize);
		if pfree as isize + needed_memory >= idx.len() as isize {
			pfree = garbage_collection(row, col, idx, pfree);
			assert!((pfree as isize + needed_memory) < idx.len() as isize);
			tag_mark = clear_mark(0, max_mark, row);
		}

		// the new element is the union of the rows of the pivot column
		let pivot_row_start = pfree;
		let mut pivot_row_degree = 0usize;
		col[pivot_col].thickness = -pivot_col_thickness;
		for cp in col[pivot_col].range() {
			let r = idx[cp] as usize;
			if row[r].is_dead() {
				continue;
			}
			for rp in row[r].range() {
				let c = idx[rp] as usize;
				let thickness = col[c].thickness;
				if thickness > 0 && col[c].is_alive() {
					col[c].thickness = -thickness;
					idx[pfree] = c as isize;
					pfree += 1;
					pivot_row_degree += thickness as usize;
				}
			}
		}
		col[pivot_col].thickness = pivot_col_thickness;
		max_deg = Ord::max(max_deg, pivot_row_degree);

		for cp in col[pivot_col].range() {
			row[idx[cp] as usize].kill();
		}

		let pivot_row_end = pfree;
		let pivot_row = if pivot_row_end > pivot_row_start {
			idx[col[pivot_col].start as usize]
		} else {
			EMPTY
		};

		// external degrees of the elements touching the pivot row
		for rp in pivot_row_start..pivot_row_end {
			let c = idx[rp] as usize;
			debug_assert!(col[c].is_alive());

			let thickness = -col[c].thickness;
			debug_assert!(thickness > 0);
			col[c].thickness = thickness;

			let score = col[c].score as usize;
			let (prev, next) = (col[c].prev, col[c].next);
			if prev == EMPTY {
				head[score] = next;
			} else {
				col[prev as usize].next = next;
			}
			if next != EMPTY {
				col[next as usize].prev = prev;
			}

			for cp in col[c].range() {
				let r = idx[cp] as usize;
				if row[r].is_dead() {
					continue;
				}
				debug_assert!(r as isize != pivot_row);

				let mut set_difference = row[r].mark - tag_mark;
				if set_difference < 0 {
					set_difference = row[r].degree;
				}
				set_difference -= thickness;
				debug_assert!(set_difference >= 0);

				if set_difference == 0 && control.aggressive {
					row[r].kill();
				} else {
					row[r].mark = set_difference + tag_mark;
				}
			}
		}

		// approximate degrees of the pivot row columns, and their hash buckets
		for rp in pivot_row_start..pivot_row_end {
			let c = idx[rp] as usize;

			let start = col[c].start as usize;
			let mut new_cp = start;
			let mut hash = 0usize;
			let mut cur_score = 0usize;
			for cp in col[c].range() {
				let r = idx[cp] as usize;
				if row[r].is_dead() {
					continue;
				}
				debug_assert!(row[r].mark >= tag_mark);
				idx[new_cp] = r as isize;
				new_cp += 1;
				hash = hash.wrapping_add(r);

				cur_score += (row[r].mark - tag_mark) as usize;
				cur_score = Ord::min(cur_score, n);
			}
			col[c].length = (new_cp - start) as isize;

			if new_cp == start {
				// mass elimination
				col[c].kill_principal();
				let thickness = col[c].thickness as usize;
				pivot_row_degree -= thickness;
				col[c].score = k as isize;
				k += thickness;
			} else {
				col[c].score = cur_score as isize;
				let hash = hash % (n + 1);

				let head_column = head[hash];
				let first_col;
				if head_column > EMPTY {
					first_col = col[head_column as usize].prev;
					col[head_column as usize].prev = c as isize;
				} else {
					first_col = -(head_column + 2);
					head[hash] = -(c as isize + 2);
				}
				col[c].next = first_col;
				col[c].prev = hash as isize;
			}
		}

		detect_super_cols(col, idx, head, pivot_row_start..pivot_row_end);

		col[pivot_col].kill_principal();
		tag_mark = clear_mark(tag_mark + max_deg as isize + 1, max_mark, row);

		// compact the pivot row and put its columns back in the degree lists
		let mut new_rp = pivot_row_start;
		for rp in pivot_row_start..pivot_row_end {
			let c = idx[rp] as usize;
			if col[c].is_dead() {
				continue;
			}
			idx[new_rp] = c as isize;
			new_rp += 1;

			let end = (col[c].start + col[c].length) as usize;
			idx[end] = pivot_row;
			col[c].length += 1;

			let thickness = col[c].thickness as usize;
			let max_score = n - k - thickness;
			let cur_score = Ord::min(col[c].score as usize + pivot_row_degree - thickness, max_score);
			col[c].score = cur_score as isize;

			let next = head[cur_score];
			col[c].next = next;
			col[c].prev = EMPTY;
			if next != EMPTY {
				col[next as usize].prev = c as isize;
			}
			head[cur_score] = c as isize;

			min_score = Ord::min(min_score, cur_score);
		}

		if pivot_row_degree > 0 {
			let r = pivot_row as usize;
			row[r] = ColamdRow {
				start: pivot_row_start as isize,
				length: (new_rp - pivot_row_start) as isize,
				degree: pivot_row_degree as isize,
				mark: 0,
			};
		}
	}

	// non-principal columns are ordered right before their principal column
	for i in 0..n {
		debug_assert!(col[i].is_dead());
		if !col[i].is_dead_principal() && col[i].score == EMPTY {
			let mut parent = i;
			loop {
				parent = col[parent].thickness as usize;
				if col[parent].is_dead_principal() {
					break;
				}
			}

			let order = col[parent].score;
			col[i].score = order;
			col[i].thickness = parent as isize;
			col[parent].score = order + 1;
		}
	}

	for c in 0..n {
		perm[col[c].score as usize] = c;
	}
	for (k, &c) in perm.iter().enumerate() {
		perm_inv[c] = k;
	}

	log::trace!(
		target: "linsol_qr",
		"approximate minimum degree ordering of {n} columns: {ndense_rows} dense rows, {ndense_cols} dense columns",
	);

	Ok(())
}

fn detect_super_cols(col: &mut [ColamdCol], idx: &[isize], head: &mut [isize], pivot_row: Range<usize>) {
	for rp in pivot_row {
		let c = idx[rp] as usize;
		if col[c].is_dead() {
			continue;
		}

		let hash = col[c].prev as usize;
		let head_column = head[hash];
		let first_col = if head_column > EMPTY {
			col[head_column as usize].prev
		} else {
			-(head_column + 2)
		};

		let mut super_c = first_col;
		while super_c != EMPTY {
			let s = super_c as usize;
			let mut prev_c = s;

			let mut c = col[s].next;
			while c != EMPTY {
				let j = c as usize;
				let same = col[j].length == col[s].length && col[j].score == col[s].score && idx[col[j].range()] == idx[col[s].range()];
				if !same {
					prev_c = j;
					c = col[j].next;
					continue;
				}

				// `j` is indistinguishable from `s`, merge it into the supercolumn
				col[s].thickness += col[j].thickness;
				col[j].thickness = s as isize;
				col[j].kill_non_principal();
				col[j].score = EMPTY;
				col[prev_c].next = col[j].next;

				c = col[j].next;
			}
			super_c = col[s].next;
		}

		if head_column > EMPTY {
			col[head_column as usize].prev = EMPTY;
		} else {
			head[hash] = EMPTY;
		}
	}
}

fn garbage_collection(row: &mut [ColamdRow], col: &mut [ColamdCol], idx: &mut [isize], pfree: usize) -> usize {
	let m = row.len() - 1;
	let n = col.len() - 1;

	let mut pdest = 0usize;
	for c in 0..n {
		if col[c].is_dead() {
			continue;
		}
		let range = col[c].range();
		col[c].start = pdest as isize;
		for psrc in range {
			let r = idx[psrc] as usize;
			if row[r].is_alive() {
				idx[pdest] = r as isize;
				pdest += 1;
			}
		}
		col[c].length = pdest as isize - col[c].start;
	}

	// the first entry of every live row is replaced by the complement of the row index, so that
	// the rows can be found by scanning
	for r in 0..m {
		if row[r].is_dead() || row[r].length == 0 {
			row[r].kill();
		} else {
			let psrc = row[r].start as usize;
			row[r].mark = idx[psrc];
			idx[psrc] = !(r as isize);
		}
	}

	let mut psrc = pdest;
	while psrc < pfree {
		if idx[psrc] >= 0 {
			psrc += 1;
			continue;
		}
		let r = !idx[psrc] as usize;
		idx[psrc] = row[r].mark;
		row[r].start = pdest as isize;
		for _ in 0..row[r].length {
			let c = idx[psrc] as usize;
			psrc += 1;
			if col[c].is_alive() {
				idx[pdest] = c as isize;
				pdest += 1;
			}
		}
		row[r].length = pdest as isize - row[r].start;
	}

	pdest
}
