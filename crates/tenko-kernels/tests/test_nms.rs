//! Unit tests for the non-max-suppression kernel.

use half::f16;
use tenko_core::{DataType, KernelContext, KernelError, Tensor};
use tenko_kernels::{Kernel, NonMaxSuppressionKernel};

fn run_nms(
    boxes: Tensor,
    scores: Tensor,
    max_output_size: i64,
    iou_threshold: f32,
    score_threshold: f32,
) -> tenko_core::Result<Vec<i32>> {
    let capacity = max_output_size.max(0) as usize;
    let output = Tensor::zeros(vec![capacity], DataType::I32);
    let mut ctx = KernelContext::new(
        vec![
            boxes,
            scores,
            Tensor::scalar(max_output_size as i32),
            Tensor::scalar(iou_threshold),
            Tensor::scalar(score_threshold),
        ],
        vec![output],
    );
    NonMaxSuppressionKernel.compute(&mut ctx)?;
    let out = ctx.into_outputs().remove(0);
    assert_eq!(out.rank(), 1);
    Ok(out.as_slice::<i32>()?.to_vec())
}

fn f32_boxes(data: Vec<f32>) -> Tensor {
    let n = data.len() / 4;
    Tensor::from_vec(data, vec![n, 4]).unwrap()
}

// ============ Correctness ============

#[test]
fn test_nms_concrete_scenario() {
    let boxes = f32_boxes(vec![
        0.0, 0.0, 1.0, 1.0, //
        0.0, 0.0, 0.9, 0.9, //
        10.0, 10.0, 11.0, 11.0,
    ]);
    let scores = Tensor::from_vec(vec![0.9f32, 0.8, 0.7], vec![3]).unwrap();

    let selected = run_nms(boxes, scores, 3, 0.5, f32::MIN).unwrap();
    assert_eq!(selected, vec![0, 2]);
}

#[test]
fn test_nms_selection_order_is_score_descending() {
    let boxes = f32_boxes(vec![
        0.0, 0.0, 1.0, 1.0, //
        5.0, 5.0, 6.0, 6.0, //
        10.0, 10.0, 11.0, 11.0,
    ]);
    let scores = Tensor::from_vec(vec![0.1f32, 0.9, 0.5], vec![3]).unwrap();
    let selected = run_nms(boxes, scores, 3, 0.5, f32::MIN).unwrap();
    assert_eq!(selected, vec![1, 2, 0]);
}

#[test]
fn test_nms_max_output_size_bounds_result() {
    let boxes = f32_boxes(vec![
        0.0, 0.0, 1.0, 1.0, //
        5.0, 5.0, 6.0, 6.0, //
        10.0, 10.0, 11.0, 11.0,
    ]);
    let scores = Tensor::from_vec(vec![0.9f32, 0.8, 0.7], vec![3]).unwrap();
    let selected = run_nms(boxes, scores, 2, 0.5, f32::MIN).unwrap();
    assert_eq!(selected, vec![0, 1]);

    let boxes = f32_boxes(vec![0.0, 0.0, 1.0, 1.0]);
    let scores = Tensor::from_vec(vec![0.9f32], vec![1]).unwrap();
    let selected = run_nms(boxes, scores, 0, 0.5, f32::MIN).unwrap();
    assert!(selected.is_empty());
}

#[test]
fn test_nms_score_threshold_filters_everything() {
    let boxes = f32_boxes(vec![
        0.0, 0.0, 1.0, 1.0, //
        5.0, 5.0, 6.0, 6.0,
    ]);
    let scores = Tensor::from_vec(vec![0.4f32, 0.3], vec![2]).unwrap();
    let selected = run_nms(boxes, scores, 2, 0.5, 0.9).unwrap();
    assert!(selected.is_empty());
}

#[test]
fn test_nms_iou_threshold_monotonicity() {
    let boxes = f32_boxes(vec![
        0.0, 0.0, 2.0, 2.0, //
        1.0, 1.0, 3.0, 3.0, //
        0.5, 0.5, 2.5, 2.5, //
        4.0, 4.0, 5.0, 5.0,
    ]);
    let scores = Tensor::from_vec(vec![0.9f32, 0.8, 0.7, 0.6], vec![4]).unwrap();

    let mut last = 0;
    for threshold in [0.0, 0.1, 0.3, 0.6, 1.0] {
        let count = run_nms(boxes.clone(), scores.clone(), 4, threshold, f32::MIN)
            .unwrap()
            .len();
        assert!(count >= last, "count dropped at threshold {}", threshold);
        last = count;
    }
}

#[test]
fn test_nms_accepted_boxes_are_pairwise_below_threshold() {
    let boxes = f32_boxes(vec![
        0.0, 0.0, 2.0, 2.0, //
        1.0, 1.0, 3.0, 3.0, //
        0.5, 0.5, 2.5, 2.5, //
        2.0, 2.0, 4.0, 4.0, //
        4.0, 4.0, 5.0, 5.0,
    ]);
    let scores = Tensor::from_vec(vec![0.9f32, 0.85, 0.8, 0.75, 0.7], vec![5]).unwrap();
    let threshold = 0.2;
    let selected = run_nms(boxes.clone(), scores, 5, threshold, f32::MIN).unwrap();

    let data = boxes.as_slice::<f32>().unwrap();
    let area = |i: usize| -> f32 {
        let (y1, x1, y2, x2) = (
            data[4 * i],
            data[4 * i + 1],
            data[4 * i + 2],
            data[4 * i + 3],
        );
        (y2 - y1).abs() * (x2 - x1).abs()
    };
    for (p, &i) in selected.iter().enumerate() {
        for &j in &selected[p + 1..] {
            let (i, j) = (i as usize, j as usize);
            let ih = (data[4 * i + 2].min(data[4 * j + 2])
                - data[4 * i].max(data[4 * j]))
            .max(0.0);
            let iw = (data[4 * i + 3].min(data[4 * j + 3])
                - data[4 * i + 1].max(data[4 * j + 1]))
            .max(0.0);
            let inter = ih * iw;
            let iou = inter / (area(i) + area(j) - inter);
            assert!(iou < threshold, "boxes {} and {} overlap too much", i, j);
        }
    }
}

#[test]
fn test_nms_degenerate_boxes_never_suppress() {
    let boxes = f32_boxes(vec![
        1.0, 1.0, 1.0, 1.0, // zero area, highest score
        0.0, 0.0, 2.0, 2.0,
    ]);
    let scores = Tensor::from_vec(vec![0.9f32, 0.8], vec![2]).unwrap();
    let selected = run_nms(boxes, scores, 2, 0.1, f32::MIN).unwrap();
    assert_eq!(selected, vec![0, 1]);
}

#[test]
fn test_nms_equal_scores_prefer_smaller_index() {
    let boxes = f32_boxes(vec![
        0.0, 0.0, 1.0, 1.0, //
        5.0, 5.0, 6.0, 6.0,
    ]);
    let scores = Tensor::from_vec(vec![0.5f32, 0.5], vec![2]).unwrap();
    let selected = run_nms(boxes, scores, 2, 0.5, f32::MIN).unwrap();
    assert_eq!(selected, vec![0, 1]);
}

#[test]
fn test_nms_half_precision_boxes_and_thresholds() {
    let to_f16 = |v: Vec<f32>| -> Vec<f16> { v.into_iter().map(f16::from_f32).collect() };
    let boxes = Tensor::from_vec(
        to_f16(vec![
            0.0, 0.0, 1.0, 1.0, //
            0.0, 0.0, 0.9, 0.9, //
            10.0, 10.0, 11.0, 11.0,
        ]),
        vec![3, 4],
    )
    .unwrap();
    let scores = Tensor::from_vec(to_f16(vec![0.9, 0.8, 0.7]), vec![3]).unwrap();

    // Half boxes with float thresholds: the two widths are independent.
    let output = Tensor::zeros(vec![3], DataType::I32);
    let mut ctx = KernelContext::new(
        vec![
            boxes,
            scores,
            Tensor::scalar(3i32),
            Tensor::scalar(0.5f32),
            Tensor::scalar(-1000.0f32),
        ],
        vec![output],
    );
    NonMaxSuppressionKernel.compute(&mut ctx).unwrap();
    let out = ctx.into_outputs().remove(0);
    assert_eq!(out.as_slice::<i32>().unwrap(), &[0, 2]);
}

#[test]
fn test_nms_output_resized_to_count() {
    let boxes = f32_boxes(vec![
        0.0, 0.0, 1.0, 1.0, //
        0.0, 0.0, 1.0, 1.0,
    ]);
    let scores = Tensor::from_vec(vec![0.9f32, 0.8], vec![2]).unwrap();
    let output = Tensor::zeros(vec![2], DataType::I32);
    let mut ctx = KernelContext::new(
        vec![
            boxes,
            scores,
            Tensor::scalar(2i32),
            Tensor::scalar(0.5f32),
            Tensor::scalar(0.0f32),
        ],
        vec![output],
    );
    NonMaxSuppressionKernel.compute(&mut ctx).unwrap();
    // Identical boxes: the second is suppressed and the output shrinks.
    assert_eq!(ctx.output(0).unwrap().shape(), &[1]);
}

// ============ Validation ============

#[test]
fn test_nms_rejects_bad_box_shape() {
    let boxes = Tensor::from_vec(vec![0.0f32, 0.0, 1.0], vec![1, 3]).unwrap();
    let scores = Tensor::from_vec(vec![0.9f32], vec![1]).unwrap();
    let result = run_nms(boxes, scores, 1, 0.5, 0.0);
    assert!(matches!(result, Err(KernelError::InvalidParameter(_))));
}

#[test]
fn test_nms_rejects_score_count_mismatch() {
    let boxes = f32_boxes(vec![0.0, 0.0, 1.0, 1.0]);
    let scores = Tensor::from_vec(vec![0.9f32, 0.8], vec![2]).unwrap();
    assert!(run_nms(boxes, scores, 1, 0.5, 0.0).is_err());
}

#[test]
fn test_nms_rejects_mixed_box_score_dtypes() {
    let boxes = f32_boxes(vec![0.0, 0.0, 1.0, 1.0]);
    let scores = Tensor::from_vec(vec![f16::from_f32(0.9)], vec![1]).unwrap();
    assert!(run_nms(boxes, scores, 1, 0.5, 0.0).is_err());
}

#[test]
fn test_nms_rejects_mixed_threshold_dtypes() {
    let boxes = f32_boxes(vec![0.0, 0.0, 1.0, 1.0]);
    let scores = Tensor::from_vec(vec![0.9f32], vec![1]).unwrap();
    let output = Tensor::zeros(vec![1], DataType::I32);
    let mut ctx = KernelContext::new(
        vec![
            boxes,
            scores,
            Tensor::scalar(1i32),
            Tensor::scalar(f16::from_f32(0.5)),
            Tensor::scalar(0.0f32),
        ],
        vec![output],
    );
    assert!(NonMaxSuppressionKernel.compute(&mut ctx).is_err());
}

#[test]
fn test_nms_rejects_out_of_range_iou_threshold() {
    let boxes = f32_boxes(vec![0.0, 0.0, 1.0, 1.0]);
    let scores = Tensor::from_vec(vec![0.9f32], vec![1]).unwrap();
    assert!(run_nms(boxes.clone(), scores.clone(), 1, 1.5, 0.0).is_err());
    assert!(run_nms(boxes, scores, 1, -0.1, 0.0).is_err());
}

#[test]
fn test_nms_rejects_negative_max_output_size() {
    let boxes = f32_boxes(vec![0.0, 0.0, 1.0, 1.0]);
    let scores = Tensor::from_vec(vec![0.9f32], vec![1]).unwrap();
    assert!(run_nms(boxes, scores, -1, 0.5, 0.0).is_err());
}

#[test]
fn test_nms_rejects_double_precision_boxes() {
    let boxes = Tensor::from_vec(vec![0.0f64, 0.0, 1.0, 1.0], vec![1, 4]).unwrap();
    let scores = Tensor::from_vec(vec![0.9f64], vec![1]).unwrap();
    let result = run_nms(boxes, scores, 1, 0.5, 0.0);
    assert!(matches!(result, Err(KernelError::UnsupportedType { .. })));
}
