//! Non-max-suppression kernel.
//!
//! Greedy IoU-based box filtering: candidates scoring above the score
//! threshold enter a max-priority queue; the highest-scoring remaining
//! candidate is accepted unless it overlaps an already-accepted box with
//! IoU at or above the threshold. Box coordinates are order-independent per
//! box, and degenerate (zero-area) boxes never suppress anything.
//!
//! The accepted count is data-dependent, so this is the one kernel that
//! re-describes its output shape after compute: selection runs into a
//! scratch buffer bounded by `max_output_size`, then the output tensor is
//! resized to `[count]` and the indices committed.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tenko_core::{
    DataType, FloatElement, KernelContext, KernelError, Result, Tensor,
};
use tracing::debug;

use crate::dispatch::dispatch_float;
use crate::registry::Kernel;

/// Greedy IoU-based selection of box indices.
pub struct NonMaxSuppressionKernel;

struct NmsParams {
    dtype: DataType,
    num_boxes: usize,
    max_output_size: usize,
    iou_threshold: f32,
    score_threshold: f32,
}

fn check_and_init(ctx: &KernelContext) -> Result<NmsParams> {
    if ctx.input_count() != 5 {
        return Err(KernelError::InvalidParameter(format!(
            "expected 5 inputs (boxes, scores, max_output_size, iou_threshold, score_threshold), got {}",
            ctx.input_count()
        )));
    }
    let boxes = ctx.input(0)?;
    if boxes.rank() != 2 || boxes.shape()[1] != 4 {
        return Err(KernelError::InvalidParameter(format!(
            "boxes must have shape [num_boxes, 4], got {:?}",
            boxes.shape()
        )));
    }
    let num_boxes = boxes.shape()[0];

    let scores = ctx.input(1)?;
    if scores.rank() != 1 || scores.shape()[0] != num_boxes {
        return Err(KernelError::InvalidParameter(format!(
            "scores must have shape [{}], got {:?}",
            num_boxes,
            scores.shape()
        )));
    }
    if scores.dtype() != boxes.dtype() {
        return Err(KernelError::InvalidParameter(format!(
            "boxes are {:?} but scores are {:?}",
            boxes.dtype(),
            scores.dtype()
        )));
    }

    let max_output = ctx.input(2)?;
    if max_output.numel() != 1 || !max_output.dtype().is_integer() {
        return Err(KernelError::InvalidParameter(
            "max_output_size must be an integer scalar".to_string(),
        ));
    }
    let max_output_size = max_output.scalar_i64()?;
    if max_output_size < 0 {
        return Err(KernelError::InvalidParameter(format!(
            "max_output_size must be non-negative, got {}",
            max_output_size
        )));
    }

    let iou_input = ctx.input(3)?;
    let score_input = ctx.input(4)?;
    // Thresholds share one float width, independently of the box width.
    for (name, t) in [("iou_threshold", iou_input), ("score_threshold", score_input)] {
        if t.numel() != 1 || !matches!(t.dtype(), DataType::F16 | DataType::F32) {
            return Err(KernelError::InvalidParameter(format!(
                "{} must be a half or float scalar, got {:?} with shape {:?}",
                name,
                t.dtype(),
                t.shape()
            )));
        }
    }
    if iou_input.dtype() != score_input.dtype() {
        return Err(KernelError::InvalidParameter(format!(
            "iou_threshold is {:?} but score_threshold is {:?}",
            iou_input.dtype(),
            score_input.dtype()
        )));
    }
    let iou_threshold = iou_input.scalar_f32()?;
    if !(0.0..=1.0).contains(&iou_threshold) {
        return Err(KernelError::InvalidParameter(format!(
            "iou_threshold must lie in [0, 1], got {}",
            iou_threshold
        )));
    }
    let score_threshold = score_input.scalar_f32()?;

    let output = ctx.output(0)?;
    if output.dtype() != DataType::I32 {
        return Err(KernelError::InvalidParameter(format!(
            "selected-indices output must be int32, got {:?}",
            output.dtype()
        )));
    }

    Ok(NmsParams {
        dtype: boxes.dtype(),
        num_boxes,
        max_output_size: max_output_size as usize,
        iou_threshold,
        score_threshold,
    })
}

impl Kernel for NonMaxSuppressionKernel {
    fn op_type(&self) -> &str {
        "NonMaxSuppression"
    }

    fn compute(&self, ctx: &mut KernelContext) -> Result<()> {
        let params = check_and_init(ctx)?;
        debug!(
            num_boxes = params.num_boxes,
            max_output_size = params.max_output_size,
            iou_threshold = params.iou_threshold,
            "non-max-suppression dispatch"
        );

        // Phase one: select into scratch bounded by max_output_size.
        let selected = {
            let boxes = ctx.input(0)?;
            let scores = ctx.input(1)?;
            dispatch_float!("NonMaxSuppression", params.dtype, T => {
                select_boxes::<T>(boxes, scores, &params)
            })?
        };

        // Phase two: commit the data-dependent shape, then the indices.
        ctx.resize_output(0, vec![selected.len()])?;
        ctx.output_mut(0)?
            .as_slice_mut::<i32>()?
            .copy_from_slice(&selected);
        Ok(())
    }
}

/// A scored box waiting for the greedy pass.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    score: f32,
    index: i32,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // Highest score pops first; among equal scores the smaller box
        // index pops first, keeping the selection deterministic.
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.index.cmp(&self.index))
    }
}

fn select_boxes<T: FloatElement>(
    boxes: &Tensor,
    scores: &Tensor,
    params: &NmsParams,
) -> Result<Vec<i32>> {
    let boxes = boxes.as_slice::<T>()?;
    let scores = scores.as_slice::<T>()?;

    let mut queue: BinaryHeap<Candidate> = BinaryHeap::with_capacity(params.num_boxes);
    for (index, score) in scores.iter().enumerate() {
        let score = score.to_f32();
        if score > params.score_threshold {
            queue.push(Candidate {
                score,
                index: index as i32,
            });
        }
    }

    let mut selected: Vec<i32> = Vec::with_capacity(params.max_output_size.min(queue.len()));
    while selected.len() < params.max_output_size {
        let candidate = match queue.pop() {
            Some(c) => c,
            None => break,
        };
        // Compare against accepted boxes in reverse acceptance order; recent
        // survivors are the most likely to overlap the next candidate.
        let suppressed = selected.iter().rev().any(|&accepted| {
            iou(boxes, candidate.index as usize, accepted as usize) >= params.iou_threshold
        });
        if !suppressed {
            selected.push(candidate.index);
        }
    }
    Ok(selected)
}

/// Intersection-over-union of two boxes, 0 for disjoint or degenerate boxes.
fn iou<T: FloatElement>(boxes: &[T], a: usize, b: usize) -> f32 {
    let (a_min_y, a_min_x, a_max_y, a_max_x) = corners(boxes, a);
    let (b_min_y, b_min_x, b_max_y, b_max_x) = corners(boxes, b);

    let area_a = (a_max_y - a_min_y) * (a_max_x - a_min_x);
    let area_b = (b_max_y - b_min_y) * (b_max_x - b_min_x);
    if area_a <= 0.0 || area_b <= 0.0 {
        return 0.0;
    }

    let inter_h = (a_max_y.min(b_max_y) - a_min_y.max(b_min_y)).max(0.0);
    let inter_w = (a_max_x.min(b_max_x) - a_min_x.max(b_min_x)).max(0.0);
    let intersection = inter_h * inter_w;
    intersection / (area_a + area_b - intersection)
}

/// Normalized corners of box `i`; coordinates within a box may come in
/// either order.
fn corners<T: FloatElement>(boxes: &[T], i: usize) -> (f32, f32, f32, f32) {
    let y1 = boxes[4 * i].to_f32();
    let x1 = boxes[4 * i + 1].to_f32();
    let y2 = boxes[4 * i + 2].to_f32();
    let x2 = boxes[4 * i + 3].to_f32();
    (y1.min(y2), x1.min(x2), y1.max(y2), x1.max(x2))
}
