//! Tenko core runtime.
//!
//! This crate provides the foundations consumed by the Tenko CPU fallback
//! kernels: dynamically typed tensor buffers, a per-invocation kernel
//! context with attribute plumbing, a fork-join parallel executor, and the
//! closed error taxonomy shared by every operator.
//!
//! ## Architecture
//!
//! - **Types**: runtime element tags and attribute values
//! - **Tensor**: shape plus typed storage, accessed through checked slices
//! - **Context**: ordered inputs/outputs and named attributes for one call
//! - **Parallel**: `[start, end)` shard fan-out over a rayon thread pool
//!
//! ## Example
//!
//! ```rust
//! use tenko_core::{DataType, Tensor};
//!
//! let tensor = Tensor::zeros(vec![2, 3], DataType::F32);
//! assert_eq!(tensor.shape(), &[2, 3]);
//! assert_eq!(tensor.numel(), 6);
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod context;
pub mod error;
pub mod logging;
pub mod parallel;
pub mod tensor;
pub mod types;

pub use context::KernelContext;
pub use error::{KernelError, Result};
pub use logging::{init_default_logging, init_logging, LoggingConfig};
pub use parallel::{global_executor, init_executor, ExecutorConfig, ParallelExecutor};
pub use tensor::{Element, FloatElement, RealElement, Tensor, TensorData};
pub use types::{AttributeValue, DataType};
