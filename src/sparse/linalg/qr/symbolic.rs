//! symbolic building blocks of the $QR$ analysis
//!
//! every function works in factorization order: column `k` is the original column
//! `col_perm.arrays().0[k]`, and rows are relabeled so that row `k` is the pivot of column `k`.

use crate::assert;
use crate::perm::PermRef;
use crate::sparse::{SymbolicSparseColMat, SymbolicSparseColMatRef, NONE};
use dyn_stack::{MemStack, StackReq};

/// computes the size and alignment of the workspace required to compute the column elimination
/// tree of a matrix with dimensions `(nrows, ncols)`
#[inline]
pub fn col_etree_scratch(nrows: usize, ncols: usize) -> StackReq {
	StackReq::all_of(&[StackReq::new::<usize>(nrows), StackReq::new::<usize>(ncols)])
}

/// computes the column elimination tree of $A$, that is the elimination tree of $A^\top A$,
/// with the columns taken in the order given by `col_perm`
///
/// `etree[j]` is set to the parent of column `j`, or [`NONE`] if `j` is a root.
#[track_caller]
pub fn col_etree(etree: &mut [usize], A: SymbolicSparseColMatRef<'_>, col_perm: Option<PermRef<'_>>, stack: &mut MemStack) {
	let m = A.nrows();
	let n = A.ncols();
	assert!(etree.len() == n);

	let (ancestor, stack) = unsafe { stack.make_raw::<usize>(n) };
	let (prev, _) = unsafe { stack.make_raw::<usize>(m) };

	ancestor.fill(NONE);
	prev.fill(NONE);
	etree.fill(NONE);

	for j in 0..n {
		let pj = col_perm.map(|perm| perm.arrays().0[j]).unwrap_or(j);
		for row in A.row_idx_of_col(pj) {
			let mut i = prev[row];
			while i != NONE && i != j {
				let next_i = ancestor[i];
				ancestor[i] = j;
				if next_i == NONE {
					etree[i] = j;
					break;
				}
				i = next_i;
			}
			prev[row] = j;
		}
	}
}

/// computes the size and alignment of the workspace required to postorder an elimination tree of
/// size `n`
#[inline]
pub fn postorder_scratch(n: usize) -> StackReq {
	StackReq::new::<usize>(n).array(3)
}

fn postorder_depth_first_search(post: &mut [usize], root: usize, mut start_index: usize, dfs: &mut [usize], first_child: &mut [usize], next_child: &[usize]) -> usize {
	let mut top = 1usize;
	dfs[0] = root;

	while top != 0 {
		let current_node = dfs[top - 1];
		let current_child = first_child[current_node];

		if current_child != NONE {
			dfs[top] = current_child;
			top += 1;
			first_child[current_node] = next_child[current_child];
		} else {
			post[start_index] = current_node;
			start_index += 1;
			top -= 1;
		}
	}
	start_index
}

/// computes a postordering of the elimination tree `etree`
///
/// `post[k]` is set to the node visited at step `k`. children are visited in increasing order and
/// every subtree occupies a contiguous range that ends at its root.
#[track_caller]
pub fn postorder(post: &mut [usize], etree: &[usize], stack: &mut MemStack) {
	let n = etree.len();
	assert!(post.len() == n);
	if n == 0 {
		return;
	}

	let (dfs, stack) = unsafe { stack.make_raw::<usize>(n) };
	let (first_child, stack) = unsafe { stack.make_raw::<usize>(n) };
	let (next_child, _) = unsafe { stack.make_raw::<usize>(n) };

	first_child.fill(NONE);
	next_child.fill(NONE);

	for j in (0..n).rev() {
		let parent = etree[j];
		if parent != NONE {
			next_child[j] = first_child[parent];
			first_child[parent] = j;
		}
	}

	let mut start_index = 0usize;
	for (root, &parent) in etree.iter().enumerate() {
		if parent == NONE {
			start_index = postorder_depth_first_search(post, root, start_index, dfs, first_child, next_child);
		}
	}
}

/// computes, for every row of $A$, the first column in factorization order that contains it
///
/// rows without entries are set to [`NONE`].
#[track_caller]
pub fn leftmost_col(leftmost: &mut [usize], A: SymbolicSparseColMatRef<'_>, col_perm: PermRef<'_>) {
	assert!(all(leftmost.len() == A.nrows(), col_perm.len() == A.ncols()));

	let (fwd, _) = col_perm.arrays();
	leftmost.fill(NONE);
	for k in (0..A.ncols()).rev() {
		for row in A.row_idx_of_col(fwd[k]) {
			leftmost[row] = k;
		}
	}
}

/// computes the size and alignment of the workspace required by [`assign_rows`]
#[inline]
pub fn assign_rows_scratch(nrows: usize, ncols: usize) -> StackReq {
	StackReq::all_of(&[StackReq::new::<usize>(nrows), StackReq::new::<usize>(ncols).array(3)])
}

/// assigns a pivot row to every column
///
/// each column `k` takes the lowest numbered row whose leftmost column is `k` among the rows that
/// are still available, and passes the others on to its parent in the column elimination tree. a
/// column that is left without a row receives a fictitious row, numbered from `nrows` upwards.
/// the remaining rows are placed after the `ncols` pivots.
///
/// `row_perm_inv` must have length `nrows + ncols`. its first `nrow_ext` entries are set to the
/// position of each (possibly fictitious) row, and `nrow_ext` is returned.
#[track_caller]
pub fn assign_rows(row_perm_inv: &mut [usize], leftmost: &[usize], etree: &[usize], stack: &mut MemStack) -> usize {
	let m = leftmost.len();
	let n = etree.len();
	assert!(row_perm_inv.len() == m + n);

	let (next, stack) = unsafe { stack.make_raw::<usize>(m) };
	let (head, stack) = unsafe { stack.make_raw::<usize>(n) };
	let (tail, stack) = unsafe { stack.make_raw::<usize>(n) };
	let (nque, _) = unsafe { stack.make_raw::<usize>(n) };

	next.fill(NONE);
	head.fill(NONE);
	tail.fill(NONE);
	nque.fill(0);
	row_perm_inv.fill(NONE);

	for i in (0..m).rev() {
		let k = leftmost[i];
		if k == NONE {
			continue;
		}
		if nque[k] == 0 {
			tail[k] = i;
		}
		nque[k] += 1;
		next[i] = head[k];
		head[k] = i;
	}

	let mut nrow_ext = m;
	for k in 0..n {
		let i = head[k];
		if i == NONE {
			row_perm_inv[nrow_ext] = k;
			nrow_ext += 1;
			continue;
		}

		row_perm_inv[i] = k;
		nque[k] -= 1;
		if nque[k] == 0 {
			continue;
		}

		let parent = etree[k];
		if parent != NONE {
			if nque[parent] == 0 {
				tail[parent] = tail[k];
			}
			next[tail[k]] = head[parent];
			head[parent] = next[i];
			nque[parent] += nque[k];
		}
	}

	let mut pos = n;
	for i in 0..m {
		if row_perm_inv[i] == NONE {
			row_perm_inv[i] = pos;
			pos += 1;
		}
	}
	debug_assert!(pos == nrow_ext);

	nrow_ext
}

/// computes the size and alignment of the workspace required by [`qr_patterns`]
#[inline]
pub fn qr_patterns_scratch(nrow_ext: usize, ncols: usize) -> StackReq {
	StackReq::all_of(&[StackReq::new::<usize>(nrow_ext), StackReq::new::<usize>(ncols).array(2)])
}

/// computes the patterns of the householder vectors $V$ and of the triangular factor $R$ by
/// replaying the left-looking householder $QR$ without numerical values
///
/// column `k` of $R$ is the reach of the rows of `A(:, col_perm[k])` in the column elimination
/// tree, followed by the diagonal. column `k` of $V$ starts with the pivot row `k`, followed by the
/// rows of `A(:, col_perm[k])` and of the $V$ columns of the children of `k` that lie below `k`.
#[track_caller]
pub fn qr_patterns(
	A: SymbolicSparseColMatRef<'_>,
	col_perm: PermRef<'_>,
	row_perm_inv: &[usize],
	leftmost: &[usize],
	etree: &[usize],
	stack: &mut MemStack,
) -> (SymbolicSparseColMat, SymbolicSparseColMat) {
	let n = A.ncols();
	let nrow_ext = row_perm_inv.len();
	assert!(all(
		col_perm.len() == n,
		leftmost.len() == A.nrows(),
		etree.len() == n,
		nrow_ext >= A.nrows(),
		nrow_ext >= n,
	));

	let (row_mark, stack) = unsafe { stack.make_raw::<usize>(nrow_ext) };
	let (col_mark, stack) = unsafe { stack.make_raw::<usize>(n) };
	let (reach, _) = unsafe { stack.make_raw::<usize>(n) };
	row_mark.fill(NONE);
	col_mark.fill(NONE);

	let (fwd, _) = col_perm.arrays();

	let mut v_col_ptr = Vec::with_capacity(n + 1);
	let mut v_row_idx = Vec::new();
	let mut r_col_ptr = Vec::with_capacity(n + 1);
	let mut r_row_idx = Vec::new();
	v_col_ptr.push(0usize);
	r_col_ptr.push(0usize);

	for k in 0..n {
		let v_start = v_row_idx.len();
		let r_start = r_row_idx.len();

		col_mark[k] = k;
		row_mark[k] = k;
		v_row_idx.push(k);

		let mut top = n;
		for row in A.row_idx_of_col(fwd[k]) {
			let mut i = leftmost[row];
			let mut len = 0usize;
			while col_mark[i] != k {
				reach[len] = i;
				len += 1;
				col_mark[i] = k;
				i = etree[i];
			}
			while len > 0 {
				top -= 1;
				len -= 1;
				reach[top] = reach[len];
			}

			let i = row_perm_inv[row];
			if i > k && row_mark[i] != k {
				row_mark[i] = k;
				v_row_idx.push(i);
			}
		}

		for &i in &reach[top..n] {
			r_row_idx.push(i);
			if etree[i] == k {
				for p in v_col_ptr[i]..v_col_ptr[i + 1] {
					let row = v_row_idx[p];
					if row > k && row_mark[row] != k {
						row_mark[row] = k;
						v_row_idx.push(row);
					}
				}
			}
		}

		r_row_idx[r_start..].sort_unstable();
		r_row_idx.push(k);
		v_row_idx[v_start..].sort_unstable();

		v_col_ptr.push(v_row_idx.len());
		r_col_ptr.push(r_row_idx.len());
	}

	let V = SymbolicSparseColMat {
		nrows: nrow_ext,
		ncols: n,
		col_ptr: v_col_ptr,
		row_idx: v_row_idx,
	};
	let R = SymbolicSparseColMat {
		nrows: n,
		ncols: n,
		col_ptr: r_col_ptr,
		row_idx: r_row_idx,
	};
	debug_assert!(crate::sparse::csc::check_structure(V.nrows, V.ncols, &V.col_ptr, &V.row_idx).is_ok());
	debug_assert!(crate::sparse::csc::check_structure(R.nrows, R.ncols, &R.col_ptr, &R.row_idx).is_ok());

	(V, R)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::assert;
	use crate::perm::Perm;
	use crate::sparse::{Pair, SymbolicSparseColMat};
	use dyn_stack::MemBuffer;

	fn pattern(n: usize, pairs: &[(usize, usize)]) -> SymbolicSparseColMat {
		let pairs: Vec<_> = pairs.iter().map(|&(i, j)| Pair::new(i, j)).collect();
		SymbolicSparseColMat::try_new_from_indices(n, n, &pairs).unwrap()
	}

	#[test]
	fn test_col_etree() {
		// [[x . x]
		//  [x x .]
		//  [. x x]]
		// A^T A is full, so the tree is a chain
		let A = pattern(3, &[(0, 0), (1, 0), (1, 1), (2, 1), (0, 2), (2, 2)]);
		let mut etree = vec![0; 3];
		col_etree(&mut etree, A.as_ref(), None, MemStack::new(&mut MemBuffer::new(col_etree_scratch(3, 3))));
		assert!(etree == [1, 2, NONE]);

		// diagonal matrix: every column is a root
		let D = SymbolicSparseColMat::identity(4);
		let mut etree = vec![0; 4];
		col_etree(&mut etree, D.as_ref(), None, MemStack::new(&mut MemBuffer::new(col_etree_scratch(4, 4))));
		assert!(etree == [NONE; 4]);

		// columns 0 and 2 share row 1, column 1 is alone
		let A = pattern(3, &[(0, 0), (1, 0), (2, 1), (1, 2)]);
		let mut etree = vec![0; 3];
		col_etree(&mut etree, A.as_ref(), None, MemStack::new(&mut MemBuffer::new(col_etree_scratch(3, 3))));
		assert!(etree == [2, NONE, NONE]);

		// same matrix with the last two columns swapped
		let perm = Perm::try_from_forward(vec![0, 2, 1]).unwrap();
		col_etree(&mut etree, A.as_ref(), Some(perm.as_ref()), MemStack::new(&mut MemBuffer::new(col_etree_scratch(3, 3))));
		assert!(etree == [1, NONE, NONE]);
	}

	#[test]
	fn test_postorder() {
		//     4
		//    / \
		//   1   3
		//  /   /
		// 2   0
		let etree = [3, 4, 1, 4, NONE];
		let mut post = vec![0; 5];
		postorder(&mut post, &etree, MemStack::new(&mut MemBuffer::new(postorder_scratch(5))));
		assert!(post == [2, 1, 0, 3, 4]);

		let mut post = vec![];
		postorder(&mut post, &[], MemStack::new(&mut MemBuffer::new(postorder_scratch(0))));
		assert!(post.is_empty());
	}

	#[test]
	fn test_assign_rows() {
		// row 2 is empty and column 1 has no entry, so it gets a fictitious row
		let A = pattern(3, &[(0, 0), (1, 0), (1, 2)]);
		let perm = Perm::identity(3);

		let mut etree = vec![0; 3];
		col_etree(&mut etree, A.as_ref(), None, MemStack::new(&mut MemBuffer::new(col_etree_scratch(3, 3))));
		assert!(etree == [2, NONE, NONE]);

		let mut leftmost = vec![0; 3];
		leftmost_col(&mut leftmost, A.as_ref(), perm.as_ref());
		assert!(leftmost == [0, 0, NONE]);

		let mut row_perm_inv = vec![0; 6];
		let nrow_ext = assign_rows(&mut row_perm_inv, &leftmost, &etree, MemStack::new(&mut MemBuffer::new(assign_rows_scratch(3, 3))));
		// row 0 is the pivot of column 0, row 1 is passed on to column 2, the fictitious row 3
		// pivots column 1 and the empty row 2 goes last
		assert!(nrow_ext == 4);
		assert!(row_perm_inv[..4] == [0, 2, 3, 1]);
		assert!(Perm::try_from_inverse(row_perm_inv[..4].to_vec()).is_ok());
	}

	#[test]
	fn test_qr_patterns() {
		let A = pattern(3, &[(0, 0), (1, 0), (1, 1), (2, 1), (0, 2), (2, 2)]);
		let perm = Perm::identity(3);
		let stack = &mut MemBuffer::new(StackReq::any_of(&[
			col_etree_scratch(3, 3),
			assign_rows_scratch(3, 3),
			qr_patterns_scratch(6, 3),
		]));
		let stack = MemStack::new(stack);

		let mut etree = vec![0; 3];
		col_etree(&mut etree, A.as_ref(), None, stack);
		let mut leftmost = vec![0; 3];
		leftmost_col(&mut leftmost, A.as_ref(), perm.as_ref());
		let mut row_perm_inv = vec![0; 6];
		let nrow_ext = assign_rows(&mut row_perm_inv, &leftmost, &etree, stack);
		assert!(nrow_ext == 3);
		assert!(row_perm_inv[..3] == [0, 1, 2]);

		let (V, R) = qr_patterns(A.as_ref(), perm.as_ref(), &row_perm_inv[..3], &leftmost, &etree, stack);
		// V = [[x . .]
		//      [x x .]
		//      [. x x]]
		assert!(all(V.col_ptr() == &[0, 2, 4, 5], V.row_idx() == &[0, 1, 1, 2, 2]));
		// R is full upper triangular
		assert!(all(R.col_ptr() == &[0, 1, 3, 6], R.row_idx() == &[0, 0, 1, 0, 1, 2]));
	}
}
