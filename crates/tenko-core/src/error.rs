//! Error types for the Tenko kernel engine.
//!
//! Kernels report failures through a small closed set of statuses: a request
//! is either malformed (`InvalidParameter`, `UnsupportedType`), or a resource
//! operation failed mid-compute (`Inner`). Validation errors are always
//! raised before any compute work starts; inner errors may surface from
//! worker partitions after the fork-join barrier.

use thiserror::Error;

use crate::types::DataType;

/// Result type for kernel operations.
pub type Result<T> = std::result::Result<T, KernelError>;

/// Errors that can occur while validating or executing a kernel.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KernelError {
    /// Malformed shapes, out-of-range attributes, or mismatched inputs.
    /// Detected during the check phase, never retried.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A structurally valid request whose element type has no compute
    /// specialization for the given operator.
    #[error("operator {op} has no kernel for data type {dtype:?}")]
    UnsupportedType {
        /// Operator that rejected the request.
        op: String,
        /// Element type with no specialization.
        dtype: DataType,
    },

    /// A resource failure encountered mid-computation (failed copy, failed
    /// output reallocation). Surfaced to the caller, which owns retry policy.
    #[error("inner error: {0}")]
    Inner(String),

    /// Lookup of an operator name that has no registered kernel.
    #[error("unknown operator: {0}")]
    UnknownOperator(String),
}

impl KernelError {
    /// Whether this error was produced by input validation rather than by
    /// the compute phase.
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            KernelError::InvalidParameter(_) | KernelError::UnsupportedType { .. }
        )
    }
}
