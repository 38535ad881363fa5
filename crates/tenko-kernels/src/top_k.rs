//! Top-K selection kernel.
//!
//! Selects the `k` largest values of each row of a `[..., col]` input,
//! together with their original column indices. Selection runs a size-`k`
//! binary min-heap directly in the caller-owned output rows: the heap root
//! is always the entry to evict next, ordered by value ascending and, among
//! equal values, by original index descending — so of several equal-valued
//! candidates the one with the smallest original index is retained. Rows
//! are independent and partitioned across the thread pool one row per unit.

use std::cmp::Ordering;

use tenko_core::{
    global_executor, DataType, KernelContext, KernelError, RealElement, Result, Tensor,
};
use tracing::debug;

use crate::dispatch::dispatch_real;
use crate::registry::Kernel;

/// Per-row selection of the `k` largest values and their indices.
pub struct TopKKernel;

struct TopKParams {
    dtype: DataType,
    row: usize,
    col: usize,
    k: usize,
    sorted: bool,
}

fn check_and_init(ctx: &KernelContext) -> Result<TopKParams> {
    if ctx.input_count() != 2 {
        return Err(KernelError::InvalidParameter(format!(
            "expected 2 inputs (input, k), got {}",
            ctx.input_count()
        )));
    }
    let input = ctx.input(0)?;
    if input.rank() < 1 {
        return Err(KernelError::InvalidParameter(format!(
            "input must be at least rank 1, got shape {:?}",
            input.shape()
        )));
    }
    let col = input.shape()[input.rank() - 1];
    let row = if col == 0 { 0 } else { input.numel() / col };

    let k_input = ctx.input(1)?;
    if k_input.rank() != 0 {
        return Err(KernelError::InvalidParameter(format!(
            "k must be a rank-0 scalar, got shape {:?}",
            k_input.shape()
        )));
    }
    let k = k_input.scalar_i64()?;
    if k <= 0 {
        return Err(KernelError::InvalidParameter(format!(
            "k must be positive, got {}",
            k
        )));
    }
    if (col as i64) < k {
        return Err(KernelError::InvalidParameter(format!(
            "k {} exceeds the row length {}",
            k, col
        )));
    }
    let k = k as usize;

    let sorted = ctx.attr_bool("sorted")?;

    let values = ctx.output(0)?;
    if values.dtype() != input.dtype() {
        return Err(KernelError::InvalidParameter(format!(
            "values output has data type {:?}, expected {:?}",
            values.dtype(),
            input.dtype()
        )));
    }
    if values.numel() != row * k {
        return Err(KernelError::InvalidParameter(format!(
            "values output holds {} elements, expected {}",
            values.numel(),
            row * k
        )));
    }
    let indices = ctx.output(1)?;
    if indices.dtype() != DataType::I32 {
        return Err(KernelError::InvalidParameter(format!(
            "indices output must be int32, got {:?}",
            indices.dtype()
        )));
    }
    if indices.numel() != row * k {
        return Err(KernelError::InvalidParameter(format!(
            "indices output holds {} elements, expected {}",
            indices.numel(),
            row * k
        )));
    }

    Ok(TopKParams {
        dtype: input.dtype(),
        row,
        col,
        k,
        sorted,
    })
}

impl Kernel for TopKKernel {
    fn op_type(&self) -> &str {
        "TopK"
    }

    fn compute(&self, ctx: &mut KernelContext) -> Result<()> {
        let params = check_and_init(ctx)?;
        debug!(
            rows = params.row,
            cols = params.col,
            k = params.k,
            sorted = params.sorted,
            "top-k dispatch"
        );
        let (inputs, outputs) = ctx.io_mut();
        let (values, indices) = outputs.split_at_mut(1);
        dispatch_real!("TopK", params.dtype, T => {
            do_compute::<T>(&inputs[0], &mut values[0], &mut indices[0], &params)
        })
    }
}

fn do_compute<T: RealElement>(
    input: &Tensor,
    values: &mut Tensor,
    indices: &mut Tensor,
    params: &TopKParams,
) -> Result<()> {
    if params.row == 0 {
        return Ok(());
    }
    let src = input.as_slice::<T>()?;
    let vals = values.as_slice_mut::<T>()?;
    let idxs = indices.as_slice_mut::<i32>()?;
    let col = params.col;
    let k = params.k;
    let sorted = params.sorted;

    global_executor().parallel_for_rows(vals, idxs, k, k, |first_row, vshard, ishard| {
        for (local, (vrow, irow)) in vshard.chunks_mut(k).zip(ishard.chunks_mut(k)).enumerate() {
            let r = first_row + local;
            let row = src.get(r * col..(r + 1) * col).ok_or_else(|| {
                KernelError::Inner(format!("row {} out of bounds for input", r))
            })?;
            select_row(row, vrow, irow, sorted);
        }
        Ok(())
    })
}

/// Whether result `(av, ai)` ranks below `(bv, bi)`: smaller value first,
/// and among equal values the larger original index first. The heap root is
/// therefore always the entry that should be evicted next, which keeps the
/// smallest original index among equal-valued survivors.
fn ranks_below<T: RealElement>(av: T, ai: i32, bv: T, bi: i32) -> bool {
    av < bv || (av == bv && ai > bi)
}

/// Select the top `vals.len()` elements of `row` into `vals`/`idxs`.
fn select_row<T: RealElement>(row: &[T], vals: &mut [T], idxs: &mut [i32], sorted: bool) {
    let k = vals.len();

    // Seed the heap with the first k elements, sifting each up.
    for n in 0..k {
        vals[n] = row[n];
        idxs[n] = n as i32;
        let mut child = n;
        while child > 0 {
            let parent = (child - 1) / 2;
            if ranks_below(vals[child], idxs[child], vals[parent], idxs[parent]) {
                vals.swap(child, parent);
                idxs.swap(child, parent);
                child = parent;
            } else {
                break;
            }
        }
    }

    // Scan the remainder; a candidate displaces the root only when the root
    // ranks below it, so an equal-valued later element never evicts an
    // earlier one.
    for n in k..row.len() {
        let v = row[n];
        if ranks_below(vals[0], idxs[0], v, n as i32) {
            vals[0] = v;
            idxs[0] = n as i32;
            sift_down(vals, idxs);
        }
    }

    if sorted {
        let mut pairs: Vec<(T, i32)> = vals
            .iter()
            .copied()
            .zip(idxs.iter().copied())
            .collect();
        pairs.sort_by(|a, b| match b.0.partial_cmp(&a.0) {
            Some(Ordering::Equal) | None => a.1.cmp(&b.1),
            Some(order) => order,
        });
        for (slot, (v, i)) in pairs.into_iter().enumerate() {
            vals[slot] = v;
            idxs[slot] = i;
        }
    }
}

/// Restore the heap property after replacing the root.
fn sift_down<T: RealElement>(vals: &mut [T], idxs: &mut [i32]) {
    let k = vals.len();
    let mut node = 0;
    loop {
        let left = 2 * node + 1;
        let right = left + 1;
        let mut lowest = node;
        if left < k && ranks_below(vals[left], idxs[left], vals[lowest], idxs[lowest]) {
            lowest = left;
        }
        if right < k && ranks_below(vals[right], idxs[right], vals[lowest], idxs[lowest]) {
            lowest = right;
        }
        if lowest == node {
            break;
        }
        vals.swap(node, lowest);
        idxs.swap(node, lowest);
        node = lowest;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_select(row: &[f32], k: usize, sorted: bool) -> (Vec<f32>, Vec<i32>) {
        let mut vals = vec![0.0; k];
        let mut idxs = vec![0; k];
        select_row(row, &mut vals, &mut idxs, sorted);
        (vals, idxs)
    }

    #[test]
    fn test_select_row_example() {
        let (vals, idxs) = run_select(&[3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0], 3, true);
        assert_eq!(vals, vec![9.0, 6.0, 5.0]);
        assert_eq!(idxs, vec![5, 7, 4]);
    }

    #[test]
    fn test_ties_keep_smallest_index() {
        // Three equal maxima; the two smallest indices must survive.
        let (vals, idxs) = run_select(&[7.0, 7.0, 0.0, 7.0], 2, true);
        assert_eq!(vals, vec![7.0, 7.0]);
        assert_eq!(idxs, vec![0, 1]);

        // Equal values straddling the seed/scan boundary.
        let (vals, idxs) = run_select(&[5.0, 3.0, 3.0], 2, true);
        assert_eq!(vals, vec![5.0, 3.0]);
        assert_eq!(idxs, vec![0, 1]);
    }

    #[test]
    fn test_full_row_is_sorted_permutation() {
        let (vals, idxs) = run_select(&[2.0, 9.0, 4.0, 4.0], 4, true);
        assert_eq!(vals, vec![9.0, 4.0, 4.0, 2.0]);
        assert_eq!(idxs, vec![1, 2, 3, 0]);
    }

    #[test]
    fn test_k_one_returns_row_maximum() {
        let (vals, idxs) = run_select(&[-3.0, -1.0, -7.0], 1, false);
        assert_eq!(vals, vec![-1.0]);
        assert_eq!(idxs, vec![1]);
    }
}
