//! Batched matrix diagonal kernels.
//!
//! [`MatrixDiagPartKernel`] reads a band of diagonals out of batched
//! matrices into a packed `[..., num_diags, max_diag_len]` tensor;
//! [`MatrixDiagKernel`] is its inverse, scattering a band into a
//! padding-filled batched matrix. Both share the same diagonal-length and
//! alignment arithmetic, so extraction followed by construction round-trips
//! whenever the band covers every non-trivial diagonal.
//!
//! Diagonal `d` of an `rows x cols` matrix holds the elements at
//! `(n + max(0, -d), n + max(0, d))`; superdiagonals have `d > 0`,
//! subdiagonals `d < 0`. A diagonal shorter than the longest one in the band
//! is packed at the start or end of its storage row according to the
//! alignment policy, with the padding value filling the other side.

use std::str::FromStr;

use tenko_core::{
    global_executor, DataType, Element, KernelContext, KernelError, Result, Tensor,
};
use tracing::debug;

use crate::dispatch::dispatch_numeric;
use crate::registry::Kernel;

/// Minimum output element count before the extraction kernel fans out over
/// the batch dimension; below this the thread-pool overhead dominates.
pub const DIAG_PARALLEL_THRESHOLD: usize = 2048;

/// Packing policy for diagonals shorter than the band's storage row.
///
/// The two halves govern superdiagonals and subdiagonals independently; the
/// main diagonal is always full-length so both halves agree on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagAlign {
    /// Left-align superdiagonals and subdiagonals.
    LeftLeft,
    /// Left-align superdiagonals, right-align subdiagonals.
    LeftRight,
    /// Right-align superdiagonals, left-align subdiagonals.
    RightLeft,
    /// Right-align superdiagonals and subdiagonals.
    RightRight,
}

impl DiagAlign {
    /// Whether superdiagonals are packed at the start of their storage row.
    pub fn left_aligns_superdiagonal(&self) -> bool {
        matches!(self, DiagAlign::LeftLeft | DiagAlign::LeftRight)
    }

    /// Whether subdiagonals are packed at the start of their storage row.
    pub fn left_aligns_subdiagonal(&self) -> bool {
        matches!(self, DiagAlign::LeftLeft | DiagAlign::RightLeft)
    }
}

impl FromStr for DiagAlign {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "LEFT_LEFT" => Ok(DiagAlign::LeftLeft),
            "LEFT_RIGHT" => Ok(DiagAlign::LeftRight),
            "RIGHT_LEFT" => Ok(DiagAlign::RightLeft),
            "RIGHT_RIGHT" => Ok(DiagAlign::RightRight),
            other => Err(KernelError::InvalidParameter(format!(
                "unknown alignment {:?}, expected LEFT_LEFT, LEFT_RIGHT, RIGHT_LEFT or RIGHT_RIGHT",
                other
            ))),
        }
    }
}

/// Length of diagonal `d` in an `rows x cols` matrix. Non-positive when the
/// diagonal lies outside the matrix.
fn diag_len(d: i64, rows: i64, cols: i64) -> i64 {
    (rows + d.min(0)).min(cols - d.max(0))
}

/// Offset of diagonal `d`'s first element within its storage row.
fn content_offset(align: DiagAlign, d: i64, len: usize, max_diag_len: usize) -> usize {
    let left = (d >= 0 && align.left_aligns_superdiagonal())
        || (d <= 0 && align.left_aligns_subdiagonal());
    if left {
        0
    } else {
        max_diag_len - len
    }
}

/// Read the `[lower, upper]` diagonal index range from a one- or two-element
/// integer tensor.
fn read_k(k: &Tensor) -> Result<(i64, i64)> {
    if k.rank() > 1 || k.numel() == 0 || k.numel() > 2 {
        return Err(KernelError::InvalidParameter(format!(
            "k must hold one or two diagonal indices, got shape {:?}",
            k.shape()
        )));
    }
    // Accept either common index width.
    let values: Vec<i64> = if let Ok(v) = k.as_slice::<i32>() {
        v.iter().map(|&x| i64::from(x)).collect()
    } else if let Ok(v) = k.as_slice::<i64>() {
        v.to_vec()
    } else {
        return Err(KernelError::InvalidParameter(format!(
            "k must be an int32 or int64 tensor, got {:?}",
            k.dtype()
        )));
    };
    let lower = values[0];
    let upper = *values.last().unwrap_or(&lower);
    if lower > upper {
        return Err(KernelError::InvalidParameter(format!(
            "diagonal range is inverted: lower {} > upper {}",
            lower, upper
        )));
    }
    Ok((lower, upper))
}

fn check_padding(padding: &Tensor, dtype: DataType) -> Result<()> {
    if padding.numel() != 1 {
        return Err(KernelError::InvalidParameter(format!(
            "padding value must be a single element, got shape {:?}",
            padding.shape()
        )));
    }
    if padding.dtype() != dtype {
        return Err(KernelError::InvalidParameter(format!(
            "padding value has data type {:?}, expected {:?}",
            padding.dtype(),
            dtype
        )));
    }
    Ok(())
}

/// Geometry shared by a batch of band rows and matrices.
#[derive(Debug, Clone, Copy)]
struct BandGeometry {
    lower: i64,
    upper: i64,
    rows: usize,
    cols: usize,
    batch: usize,
    num_diags: usize,
    max_diag_len: usize,
    align: DiagAlign,
}

/// Output shape for diagonal extraction: the batch dimensions followed by
/// `[num_diags, max_diag_len]`.
pub fn diag_part_output_shape(
    input_shape: &[usize],
    lower: i64,
    upper: i64,
) -> Result<Vec<usize>> {
    if input_shape.len() < 2 {
        return Err(KernelError::InvalidParameter(format!(
            "input must be at least rank 2, got shape {:?}",
            input_shape
        )));
    }
    if lower > upper {
        return Err(KernelError::InvalidParameter(format!(
            "diagonal range is inverted: lower {} > upper {}",
            lower, upper
        )));
    }
    let rows = input_shape[input_shape.len() - 2] as i64;
    let cols = input_shape[input_shape.len() - 1] as i64;
    if lower <= -rows || upper >= cols {
        return Err(KernelError::InvalidParameter(format!(
            "diagonal range [{}, {}] out of bounds for a {}x{} matrix",
            lower, upper, rows, cols
        )));
    }
    let max_diag_len = ((rows + upper.min(0)).min(cols - lower.max(0))) as usize;
    let num_diags = (upper - lower + 1) as usize;
    let mut out = input_shape[..input_shape.len() - 2].to_vec();
    out.push(num_diags);
    out.push(max_diag_len);
    Ok(out)
}

/// Extraction of one or more diagonals from batched matrices.
pub struct MatrixDiagPartKernel;

fn check_part(ctx: &KernelContext) -> Result<BandGeometry> {
    if ctx.input_count() != 3 {
        return Err(KernelError::InvalidParameter(format!(
            "expected 3 inputs (input, k, padding_value), got {}",
            ctx.input_count()
        )));
    }
    let input = ctx.input(0)?;
    if input.rank() < 2 {
        return Err(KernelError::InvalidParameter(format!(
            "input must be at least rank 2, got shape {:?}",
            input.shape()
        )));
    }
    let (lower, upper) = read_k(ctx.input(1)?)?;
    let rows = input.shape()[input.rank() - 2];
    let cols = input.shape()[input.rank() - 1];
    if lower <= -(rows as i64) || upper >= cols as i64 {
        return Err(KernelError::InvalidParameter(format!(
            "diagonal range [{}, {}] out of bounds for a {}x{} matrix",
            lower, upper, rows, cols
        )));
    }
    check_padding(ctx.input(2)?, input.dtype())?;
    let align = DiagAlign::from_str(ctx.attr_str_or("align", "RIGHT_LEFT")?)?;

    let num_diags = (upper - lower + 1) as usize;
    let max_diag_len = ((rows as i64 + upper.min(0)).min(cols as i64 - lower.max(0))) as usize;
    let batch = input.numel() / (rows * cols);

    let output = ctx.output(0)?;
    if output.dtype() != input.dtype() {
        return Err(KernelError::InvalidParameter(format!(
            "output has data type {:?}, expected {:?}",
            output.dtype(),
            input.dtype()
        )));
    }
    if output.numel() != batch * num_diags * max_diag_len {
        return Err(KernelError::InvalidParameter(format!(
            "output holds {} elements, expected {}",
            output.numel(),
            batch * num_diags * max_diag_len
        )));
    }

    Ok(BandGeometry {
        lower,
        upper,
        rows,
        cols,
        batch,
        num_diags,
        max_diag_len,
        align,
    })
}

impl Kernel for MatrixDiagPartKernel {
    fn op_type(&self) -> &str {
        "MatrixDiagPart"
    }

    fn compute(&self, ctx: &mut KernelContext) -> Result<()> {
        let geometry = check_part(ctx)?;
        debug!(
            batch = geometry.batch,
            num_diags = geometry.num_diags,
            max_diag_len = geometry.max_diag_len,
            "matrix-diag-part dispatch"
        );
        let (inputs, outputs) = ctx.io_mut();
        let output = &mut outputs[0];
        let dtype = inputs[0].dtype();
        dispatch_numeric!("MatrixDiagPart", dtype, T => {
            do_part::<T>(&inputs[0], &inputs[2], output, &geometry)
        })
    }
}

fn do_part<T: Element>(
    input: &Tensor,
    padding: &Tensor,
    output: &mut Tensor,
    g: &BandGeometry,
) -> Result<()> {
    let src = input.as_slice::<T>()?;
    let pad = padding.as_slice::<T>()?[0];
    let out = output.as_slice_mut::<T>()?;
    let in_stride = g.rows * g.cols;
    let out_stride = g.num_diags * g.max_diag_len;
    if out.is_empty() {
        return Ok(());
    }

    if g.batch * out_stride >= DIAG_PARALLEL_THRESHOLD {
        let geometry = *g;
        global_executor().parallel_for(out, out_stride, move |offset, shard| {
            let first_batch = offset / out_stride;
            for (local, dst) in shard.chunks_mut(out_stride).enumerate() {
                let base = (first_batch + local) * in_stride;
                let matrix = src.get(base..base + in_stride).ok_or_else(|| {
                    KernelError::Inner(format!(
                        "batch {} out of bounds for input",
                        first_batch + local
                    ))
                })?;
                extract_band(matrix, dst, &geometry, pad);
            }
            Ok(())
        })
    } else {
        for b in 0..g.batch {
            extract_band(
                &src[b * in_stride..][..in_stride],
                &mut out[b * out_stride..][..out_stride],
                g,
                pad,
            );
        }
        Ok(())
    }
}

/// Extract every diagonal of one matrix into its band rows.
fn extract_band<T: Element>(matrix: &[T], band: &mut [T], g: &BandGeometry, pad: T) {
    let rows = g.rows as i64;
    let cols = g.cols as i64;
    for m in 0..g.num_diags {
        let d = g.upper - m as i64;
        let len = diag_len(d, rows, cols) as usize;
        let offset = content_offset(g.align, d, len, g.max_diag_len);
        let band_row = &mut band[m * g.max_diag_len..][..g.max_diag_len];
        band_row.fill(pad);
        let row0 = (-d).max(0) as usize;
        let col0 = d.max(0) as usize;
        for n in 0..len {
            band_row[offset + n] = matrix[(row0 + n) * g.cols + col0 + n];
        }
    }
}

/// Construction of batched matrices from a band of diagonals.
pub struct MatrixDiagKernel;

/// Resolve the matrix dimensions for construction: `-1` means unspecified.
///
/// Both unspecified yields the smallest square that fits the band; one
/// specified pins that dimension (it must cover its minimum) and the other
/// defaults to its minimum; both specified must each cover their minimum and
/// at least one must equal it exactly, otherwise the geometry is under- or
/// over-determined.
fn infer_matrix_dims(
    max_diag_len: usize,
    lower: i64,
    upper: i64,
    num_rows: i64,
    num_cols: i64,
) -> Result<(usize, usize)> {
    let min_rows = max_diag_len as i64 - upper.min(0);
    let min_cols = max_diag_len as i64 + lower.max(0);
    for (name, value) in [("num_rows", num_rows), ("num_cols", num_cols)] {
        if value != -1 && value < 1 {
            return Err(KernelError::InvalidParameter(format!(
                "{} must be -1 or positive, got {}",
                name, value
            )));
        }
    }
    let (rows, cols) = match (num_rows, num_cols) {
        (-1, -1) => {
            let side = min_rows.max(min_cols);
            (side, side)
        }
        (r, -1) => (r, min_cols),
        (-1, c) => (min_rows, c),
        (r, c) => {
            if r != min_rows && c != min_cols {
                return Err(KernelError::InvalidParameter(format!(
                    "num_rows {} and num_cols {} leave the band underdetermined; \
                     one must equal its minimum ({} or {})",
                    r, c, min_rows, min_cols
                )));
            }
            (r, c)
        }
    };
    if rows < min_rows || cols < min_cols {
        return Err(KernelError::InvalidParameter(format!(
            "matrix {}x{} cannot hold diagonals of length {} (needs at least {}x{})",
            rows, cols, max_diag_len, min_rows, min_cols
        )));
    }
    Ok((rows as usize, cols as usize))
}

/// Output shape for diagonal construction: the band's batch dimensions
/// followed by the resolved `[num_rows, num_cols]`.
pub fn diag_output_shape(
    band_shape: &[usize],
    lower: i64,
    upper: i64,
    num_rows: i64,
    num_cols: i64,
) -> Result<Vec<usize>> {
    if band_shape.len() < 2 {
        return Err(KernelError::InvalidParameter(format!(
            "band must be at least rank 2, got shape {:?}",
            band_shape
        )));
    }
    let max_diag_len = band_shape[band_shape.len() - 1];
    let (rows, cols) = infer_matrix_dims(max_diag_len, lower, upper, num_rows, num_cols)?;
    let mut out = band_shape[..band_shape.len() - 2].to_vec();
    out.push(rows);
    out.push(cols);
    Ok(out)
}

fn check_diag(ctx: &KernelContext) -> Result<BandGeometry> {
    if ctx.input_count() != 5 {
        return Err(KernelError::InvalidParameter(format!(
            "expected 5 inputs (diagonal, k, num_rows, num_cols, padding_value), got {}",
            ctx.input_count()
        )));
    }
    let band = ctx.input(0)?;
    if band.rank() < 2 {
        return Err(KernelError::InvalidParameter(format!(
            "diagonal band must be at least rank 2, got shape {:?}",
            band.shape()
        )));
    }
    let (lower, upper) = read_k(ctx.input(1)?)?;
    let num_diags = (upper - lower + 1) as usize;
    if band.shape()[band.rank() - 2] != num_diags {
        return Err(KernelError::InvalidParameter(format!(
            "band holds {} diagonal rows but k [{}, {}] describes {}",
            band.shape()[band.rank() - 2],
            lower,
            upper,
            num_diags
        )));
    }
    let max_diag_len = band.shape()[band.rank() - 1];
    if max_diag_len == 0 {
        return Err(KernelError::InvalidParameter(
            "diagonal band rows must hold at least one element".to_string(),
        ));
    }

    let num_rows = ctx.input(2)?.scalar_i64()?;
    let num_cols = ctx.input(3)?.scalar_i64()?;
    let (rows, cols) = infer_matrix_dims(max_diag_len, lower, upper, num_rows, num_cols)?;
    check_padding(ctx.input(4)?, band.dtype())?;
    let align = DiagAlign::from_str(ctx.attr_str_or("align", "RIGHT_LEFT")?)?;

    let batch = band.numel() / (num_diags * max_diag_len);

    let output = ctx.output(0)?;
    if output.dtype() != band.dtype() {
        return Err(KernelError::InvalidParameter(format!(
            "output has data type {:?}, expected {:?}",
            output.dtype(),
            band.dtype()
        )));
    }
    if output.numel() != batch * rows * cols {
        return Err(KernelError::InvalidParameter(format!(
            "output holds {} elements, expected {}",
            output.numel(),
            batch * rows * cols
        )));
    }

    Ok(BandGeometry {
        lower,
        upper,
        rows,
        cols,
        batch,
        num_diags,
        max_diag_len,
        align,
    })
}

impl Kernel for MatrixDiagKernel {
    fn op_type(&self) -> &str {
        "MatrixDiag"
    }

    fn compute(&self, ctx: &mut KernelContext) -> Result<()> {
        let geometry = check_diag(ctx)?;
        debug!(
            batch = geometry.batch,
            rows = geometry.rows,
            cols = geometry.cols,
            "matrix-diag dispatch"
        );
        let (inputs, outputs) = ctx.io_mut();
        let output = &mut outputs[0];
        let dtype = inputs[0].dtype();
        dispatch_numeric!("MatrixDiag", dtype, T => {
            do_diag::<T>(&inputs[0], &inputs[4], output, &geometry)
        })
    }
}

fn do_diag<T: Element>(
    band: &Tensor,
    padding: &Tensor,
    output: &mut Tensor,
    g: &BandGeometry,
) -> Result<()> {
    let src = band.as_slice::<T>()?;
    let pad = padding.as_slice::<T>()?[0];
    let out = output.as_slice_mut::<T>()?;
    let band_stride = g.num_diags * g.max_diag_len;
    let matrix_stride = g.rows * g.cols;
    let rows_i = g.rows as i64;
    let cols_i = g.cols as i64;

    for b in 0..g.batch {
        let band_b = &src[b * band_stride..][..band_stride];
        let matrix = &mut out[b * matrix_stride..][..matrix_stride];
        for i in 0..g.rows {
            for j in 0..g.cols {
                let d = j as i64 - i as i64;
                matrix[i * g.cols + j] = if d >= g.lower && d <= g.upper {
                    let m = (g.upper - d) as usize;
                    let len = diag_len(d, rows_i, cols_i) as usize;
                    let offset = content_offset(g.align, d, len, g.max_diag_len);
                    band_b[m * g.max_diag_len + offset + i.min(j)]
                } else {
                    pad
                };
            }
        }
    }
    Ok(())
}
