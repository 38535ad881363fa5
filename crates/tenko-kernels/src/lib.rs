//! Tenko CPU fallback kernels.
//!
//! A small library of parallelized CPU operators over dynamically typed
//! tensor buffers: concatenation, batched matrix-diagonal extraction and
//! construction, top-k selection, and non-max suppression. Each kernel
//! validates its inputs and attributes against the operator contract,
//! dispatches once on the runtime element type, and writes results directly
//! into caller-owned output buffers, fanning row or batch ranges out across
//! the shared thread pool where the workload warrants it.
//!
//! ## Example
//!
//! ```rust
//! use tenko_core::{AttributeValue, DataType, KernelContext, Tensor};
//! use tenko_kernels::KernelRegistry;
//!
//! let a = Tensor::from_vec(vec![1.0f32, 2.0, 3.0, 4.0], vec![2, 2])?;
//! let b = Tensor::from_vec(vec![5.0f32, 6.0, 7.0, 8.0], vec![2, 2])?;
//! let axis = Tensor::scalar(1i32);
//! let out = Tensor::zeros(vec![2, 4], DataType::F32);
//!
//! let mut ctx = KernelContext::new(vec![a, b, axis], vec![out]);
//! ctx.set_attribute("N", AttributeValue::Int(2));
//!
//! KernelRegistry::new().compute("Concat", &mut ctx)?;
//! assert_eq!(
//!     ctx.output(0)?.as_slice::<f32>()?,
//!     &[1.0, 2.0, 5.0, 6.0, 3.0, 4.0, 7.0, 8.0]
//! );
//! # Ok::<(), tenko_core::KernelError>(())
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

mod dispatch;

pub mod concat;
pub mod diag;
pub mod non_max_suppression;
pub mod registry;
pub mod top_k;

pub use concat::{concat_output_shape, ConcatKernel};
pub use diag::{
    diag_output_shape, diag_part_output_shape, DiagAlign, MatrixDiagKernel, MatrixDiagPartKernel,
    DIAG_PARALLEL_THRESHOLD,
};
pub use non_max_suppression::NonMaxSuppressionKernel;
pub use registry::{Kernel, KernelRegistry};
pub use top_k::TopKKernel;
