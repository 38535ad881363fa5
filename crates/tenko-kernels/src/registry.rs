//! Kernel trait and registry.

use std::collections::HashMap;

use tenko_core::{KernelContext, KernelError, Result};
use tracing::{debug, warn};

use crate::concat::ConcatKernel;
use crate::diag::{MatrixDiagKernel, MatrixDiagPartKernel};
use crate::non_max_suppression::NonMaxSuppressionKernel;
use crate::top_k::TopKKernel;

/// A CPU fallback kernel.
///
/// `compute` validates the context's inputs and attributes against the
/// operator's contract, dispatches to a type-specialized routine, and writes
/// results into the context's pre-allocated outputs. On a non-ok status the
/// output contents are unspecified.
pub trait Kernel: Send + Sync {
    /// Operator name this kernel implements.
    fn op_type(&self) -> &str;

    /// Run the kernel against a context.
    fn compute(&self, ctx: &mut KernelContext) -> Result<()>;
}

/// Registry of the built-in fallback kernels.
pub struct KernelRegistry {
    kernels: HashMap<String, Box<dyn Kernel>>,
}

impl KernelRegistry {
    /// Create a registry with all built-in kernels registered.
    pub fn new() -> Self {
        let mut registry = Self {
            kernels: HashMap::new(),
        };
        registry.register(Box::new(ConcatKernel));
        registry.register(Box::new(MatrixDiagKernel));
        registry.register(Box::new(MatrixDiagPartKernel));
        registry.register(Box::new(TopKKernel));
        registry.register(Box::new(NonMaxSuppressionKernel));
        registry
    }

    /// Register a kernel, replacing any previous one for the same operator.
    pub fn register(&mut self, kernel: Box<dyn Kernel>) {
        self.kernels.insert(kernel.op_type().to_string(), kernel);
    }

    /// Look up a kernel by operator name.
    pub fn get(&self, op_type: &str) -> Result<&dyn Kernel> {
        self.kernels
            .get(op_type)
            .map(|k| k.as_ref())
            .ok_or_else(|| KernelError::UnknownOperator(op_type.to_string()))
    }

    /// Whether an operator has a registered kernel.
    pub fn is_supported(&self, op_type: &str) -> bool {
        self.kernels.contains_key(op_type)
    }

    /// Names of all registered operators.
    pub fn supported_ops(&self) -> Vec<String> {
        self.kernels.keys().cloned().collect()
    }

    /// Look up and run the kernel for `op_type` against `ctx`.
    pub fn compute(&self, op_type: &str, ctx: &mut KernelContext) -> Result<()> {
        let kernel = self.get(op_type)?;
        debug!(op = op_type, inputs = ctx.input_count(), "dispatching kernel");
        let result = kernel.compute(ctx);
        if let Err(err) = &result {
            warn!(op = op_type, %err, "kernel failed");
        }
        result
    }
}

impl Default for KernelRegistry {
    fn default() -> Self {
        Self::new()
    }
}
