//! Concatenation kernel.
//!
//! Joins `N` tensors of identical rank and identical shape except along one
//! axis into a single output. Every tensor is reinterpreted as a
//! `(flat_dim0 x cols)` matrix by flattening the dimensions before the axis,
//! which turns the operation into a stable columnar interleave: for each row,
//! output columns come from the inputs in input order. The output buffer is
//! partitioned into contiguous element ranges across the thread pool, and a
//! shard that starts or ends mid-row copies the overlapping segment tails.

use tenko_core::{
    global_executor, DataType, Element, KernelContext, KernelError, Result, Tensor,
};
use tracing::debug;

use crate::dispatch::dispatch_all_types;
use crate::registry::Kernel;

/// Concatenation of `N` tensors along an axis given as a trailing scalar
/// input.
pub struct ConcatKernel;

/// One non-empty input viewed as a column segment of the output matrix.
struct Segment {
    /// Index of the backing tensor in the context's input list.
    input: usize,
    /// Column width of this input.
    cols: usize,
    /// First output column covered by this input.
    start_col: usize,
}

struct ConcatParams {
    dtype: DataType,
    flat_dim0: usize,
    total_cols: usize,
    segments: Vec<Segment>,
}

/// Output shape for a concatenation: the first shape with the axis dimension
/// replaced by the sum of all axis dimensions. Rank-0 inputs concatenate to
/// a rank-1 tensor with one element per input.
pub fn concat_output_shape(shapes: &[&[usize]], axis: i64) -> Result<Vec<usize>> {
    let first = *shapes.first().ok_or_else(|| {
        KernelError::InvalidParameter("concat requires at least one input shape".to_string())
    })?;
    if first.is_empty() {
        return Ok(vec![shapes.len()]);
    }
    let axis = normalize_axis(axis, first.len())?;
    let mut out = first.to_vec();
    out[axis] = shapes.iter().map(|s| s.get(axis).copied().unwrap_or(0)).sum();
    Ok(out)
}

fn normalize_axis(axis: i64, rank: usize) -> Result<usize> {
    let normalized = if axis < 0 { axis + rank as i64 } else { axis };
    if normalized < 0 || (rank > 0 && normalized >= rank as i64) || (rank == 0 && normalized != 0) {
        return Err(KernelError::InvalidParameter(format!(
            "axis {} out of range for rank {}",
            axis, rank
        )));
    }
    Ok(normalized as usize)
}

fn check_and_init(ctx: &KernelContext) -> Result<ConcatParams> {
    let n = ctx.attr_int("N")?;
    if n < 2 {
        return Err(KernelError::InvalidParameter(format!(
            "attribute N must be at least 2, got {}",
            n
        )));
    }
    let n = n as usize;
    if ctx.input_count() != n + 1 {
        return Err(KernelError::InvalidParameter(format!(
            "expected {} inputs (N tensors plus the axis scalar), got {}",
            n + 1,
            ctx.input_count()
        )));
    }

    let axis_input = ctx.input(n)?;
    if axis_input.rank() != 0 {
        return Err(KernelError::InvalidParameter(format!(
            "axis input must be a rank-0 scalar, got shape {:?}",
            axis_input.shape()
        )));
    }
    if !axis_input.dtype().is_integer() {
        return Err(KernelError::InvalidParameter(format!(
            "axis input must be an integer scalar, got {:?}",
            axis_input.dtype()
        )));
    }

    let first = ctx.input(0)?;
    let rank = first.rank();
    let axis = normalize_axis(axis_input.scalar_i64()?, rank)?;
    let dtype = first.dtype();
    let flat_dim0: usize = first.shape()[..axis].iter().product();

    let mut segments = Vec::with_capacity(n);
    let mut total_cols = 0usize;
    for i in 0..n {
        let t = ctx.input(i)?;
        if t.dtype() != dtype {
            return Err(KernelError::InvalidParameter(format!(
                "input {} has data type {:?}, expected {:?}",
                i,
                t.dtype(),
                dtype
            )));
        }
        // Empty inputs contribute nothing, not even a dimension check.
        if t.numel() == 0 {
            continue;
        }
        if t.rank() != rank {
            return Err(KernelError::InvalidParameter(format!(
                "input {} has rank {}, expected {}",
                i,
                t.rank(),
                rank
            )));
        }
        for d in 0..rank {
            if d != axis && t.shape()[d] != first.shape()[d] {
                return Err(KernelError::InvalidParameter(format!(
                    "input {} has size {} in dimension {}, expected {}",
                    i,
                    t.shape()[d],
                    d,
                    first.shape()[d]
                )));
            }
        }
        let cols = t.numel() / flat_dim0;
        segments.push(Segment {
            input: i,
            cols,
            start_col: total_cols,
        });
        total_cols += cols;
    }

    let output = ctx.output(0)?;
    if output.dtype() != dtype {
        return Err(KernelError::InvalidParameter(format!(
            "output has data type {:?}, expected {:?}",
            output.dtype(),
            dtype
        )));
    }
    if output.numel() != flat_dim0 * total_cols {
        return Err(KernelError::InvalidParameter(format!(
            "output holds {} elements, expected {}",
            output.numel(),
            flat_dim0 * total_cols
        )));
    }

    Ok(ConcatParams {
        dtype,
        flat_dim0,
        total_cols,
        segments,
    })
}

impl Kernel for ConcatKernel {
    fn op_type(&self) -> &str {
        "Concat"
    }

    fn compute(&self, ctx: &mut KernelContext) -> Result<()> {
        let params = check_and_init(ctx)?;
        debug!(
            segments = params.segments.len(),
            rows = params.flat_dim0,
            cols = params.total_cols,
            "concat dispatch"
        );
        let (inputs, outputs) = ctx.io_mut();
        let output = &mut outputs[0];
        dispatch_all_types!("Concat", params.dtype, T => do_compute::<T>(inputs, output, &params))
    }
}

fn do_compute<T: Element>(
    inputs: &[Tensor],
    output: &mut Tensor,
    params: &ConcatParams,
) -> Result<()> {
    if params.flat_dim0 * params.total_cols == 0 {
        return Ok(());
    }
    let sources: Vec<&[T]> = params
        .segments
        .iter()
        .map(|s| inputs[s.input].as_slice::<T>())
        .collect::<Result<_>>()?;
    let out = output.as_slice_mut::<T>()?;

    global_executor().parallel_for(out, 1, |offset, shard| {
        copy_shard(&sources, params, offset, shard)
    })
}

/// Copy the output elements `[offset, offset + shard.len())`. The shard may
/// begin or end mid-row; each iteration copies the longest run that stays
/// within one input's row segment.
fn copy_shard<T: Element>(
    sources: &[&[T]],
    params: &ConcatParams,
    offset: usize,
    shard: &mut [T],
) -> Result<()> {
    let total_cols = params.total_cols;
    let mut written = 0;
    while written < shard.len() {
        let pos = offset + written;
        let row = pos / total_cols;
        let col = pos % total_cols;
        let seg_index = locate_segment(&params.segments, col);
        let segment = &params.segments[seg_index];
        let in_col = col - segment.start_col;
        let take = (segment.cols - in_col).min(shard.len() - written);
        let src_base = row * segment.cols + in_col;
        let src = sources[seg_index]
            .get(src_base..src_base + take)
            .ok_or_else(|| {
                KernelError::Inner(format!(
                    "source range {}..{} out of bounds for input {}",
                    src_base,
                    src_base + take,
                    segment.input
                ))
            })?;
        shard[written..written + take].copy_from_slice(src);
        written += take;
    }
    Ok(())
}

/// Index of the segment whose column range contains `col`.
fn locate_segment(segments: &[Segment], col: usize) -> usize {
    segments.partition_point(|s| s.start_col + s.cols <= col)
}
