//! Benchmarks for the fallback kernels.
//!
//! Run with: cargo bench --package tenko-kernels

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tenko_core::{AttributeValue, DataType, KernelContext, Tensor};
use tenko_kernels::{
    concat_output_shape, diag_part_output_shape, ConcatKernel, Kernel, MatrixDiagPartKernel,
    TopKKernel,
};

fn bench_concat(c: &mut Criterion) {
    let mut group = c.benchmark_group("concat");

    for size in [64usize, 256, 1024].iter() {
        let a = Tensor::full(vec![*size, *size], 1.0f32);
        let b = Tensor::full(vec![*size, *size], 2.0f32);
        let shapes: Vec<&[usize]> = vec![a.shape(), b.shape()];
        let out_shape = concat_output_shape(&shapes, 1).unwrap();

        group.bench_with_input(BenchmarkId::new("axis1", size), size, |bencher, _| {
            bencher.iter(|| {
                let output = Tensor::zeros(out_shape.clone(), DataType::F32);
                let mut ctx = KernelContext::new(
                    vec![a.clone(), b.clone(), Tensor::scalar(1i32)],
                    vec![output],
                );
                ctx.set_attribute("N", AttributeValue::Int(2));
                ConcatKernel.compute(&mut ctx).unwrap();
                black_box(ctx.into_outputs());
            });
        });
    }

    group.finish();
}

fn bench_top_k(c: &mut Criterion) {
    let mut group = c.benchmark_group("top_k");

    for rows in [8usize, 128].iter() {
        let cols = 1024;
        let k = 16;
        let data: Vec<f32> = (0..rows * cols).map(|x| (x % 8191) as f32).collect();
        let input = Tensor::from_vec(data, vec![*rows, cols]).unwrap();

        group.bench_with_input(BenchmarkId::new("k16", rows), rows, |bencher, _| {
            bencher.iter(|| {
                let values = Tensor::zeros(vec![*rows, k], DataType::F32);
                let indices = Tensor::zeros(vec![*rows, k], DataType::I32);
                let mut ctx = KernelContext::new(
                    vec![input.clone(), Tensor::scalar(k as i32)],
                    vec![values, indices],
                );
                ctx.set_attribute("sorted", AttributeValue::Bool(true));
                TopKKernel.compute(&mut ctx).unwrap();
                black_box(ctx.into_outputs());
            });
        });
    }

    group.finish();
}

fn bench_diag_part(c: &mut Criterion) {
    let mut group = c.benchmark_group("matrix_diag_part");

    // Batch sizes straddling the parallel threshold.
    for batch in [16usize, 1024].iter() {
        let input = Tensor::full(vec![*batch, 8, 8], 1.0f32);
        let out_shape = diag_part_output_shape(input.shape(), -1, 1).unwrap();

        group.bench_with_input(BenchmarkId::new("band3", batch), batch, |bencher, _| {
            bencher.iter(|| {
                let output = Tensor::zeros(out_shape.clone(), DataType::F32);
                let k = Tensor::from_vec(vec![-1i32, 1], vec![2]).unwrap();
                let mut ctx = KernelContext::new(
                    vec![input.clone(), k, Tensor::scalar(0.0f32)],
                    vec![output],
                );
                MatrixDiagPartKernel.compute(&mut ctx).unwrap();
                black_box(ctx.into_outputs());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_concat, bench_top_k, bench_diag_part);
criterion_main!(benches);
