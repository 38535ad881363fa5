//! Kernel execution context.
//!
//! A [`KernelContext`] carries everything one `compute` invocation needs:
//! ordered input tensors, pre-allocated output tensors, and a named
//! attribute map parsed from an external graph description. The context is
//! created fresh per call and discarded when compute returns; kernels keep
//! no state across calls.

use std::collections::HashMap;

use crate::error::{KernelError, Result};
use crate::tensor::Tensor;
use crate::types::AttributeValue;

/// Inputs, outputs, and attributes for a single kernel invocation.
#[derive(Debug, Default)]
pub struct KernelContext {
    inputs: Vec<Tensor>,
    outputs: Vec<Tensor>,
    attributes: HashMap<String, AttributeValue>,
}

impl KernelContext {
    /// Create a context over the given inputs and pre-allocated outputs.
    pub fn new(inputs: Vec<Tensor>, outputs: Vec<Tensor>) -> Self {
        Self {
            inputs,
            outputs,
            attributes: HashMap::new(),
        }
    }

    /// Attach a named attribute, replacing any previous value.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: AttributeValue) {
        self.attributes.insert(name.into(), value);
    }

    /// Number of input tensors.
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    /// Number of output tensors.
    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    /// Borrow input `index`.
    pub fn input(&self, index: usize) -> Result<&Tensor> {
        self.inputs.get(index).ok_or_else(|| {
            KernelError::InvalidParameter(format!(
                "input {} out of range ({} inputs)",
                index,
                self.inputs.len()
            ))
        })
    }

    /// Borrow output `index`.
    pub fn output(&self, index: usize) -> Result<&Tensor> {
        self.outputs.get(index).ok_or_else(|| {
            KernelError::InvalidParameter(format!(
                "output {} out of range ({} outputs)",
                index,
                self.outputs.len()
            ))
        })
    }

    /// Mutably borrow output `index`.
    pub fn output_mut(&mut self, index: usize) -> Result<&mut Tensor> {
        let count = self.outputs.len();
        self.outputs.get_mut(index).ok_or_else(|| {
            KernelError::InvalidParameter(format!(
                "output {} out of range ({} outputs)",
                index, count
            ))
        })
    }

    /// Borrow all inputs and all outputs at once, so a kernel can read the
    /// former while writing the latter.
    pub fn io_mut(&mut self) -> (&[Tensor], &mut [Tensor]) {
        (&self.inputs, &mut self.outputs)
    }

    /// Re-describe output `index` with a new shape, resizing its buffer.
    ///
    /// This is the commit half of the two-phase protocol used by kernels
    /// whose output length is data-dependent: compute into scratch first,
    /// then resize and write.
    pub fn resize_output(&mut self, index: usize, shape: Vec<usize>) -> Result<()> {
        self.output_mut(index)?.resize(shape);
        Ok(())
    }

    /// Consume the context and return its output tensors.
    pub fn into_outputs(self) -> Vec<Tensor> {
        self.outputs
    }

    /// Look up a raw attribute value.
    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    /// Required integer attribute.
    pub fn attr_int(&self, name: &str) -> Result<i64> {
        match self.attributes.get(name) {
            Some(AttributeValue::Int(v)) => Ok(*v),
            Some(other) => Err(KernelError::InvalidParameter(format!(
                "attribute {} must be an integer, got {:?}",
                name, other
            ))),
            None => Err(KernelError::InvalidParameter(format!(
                "missing required attribute {}",
                name
            ))),
        }
    }

    /// Required boolean attribute.
    pub fn attr_bool(&self, name: &str) -> Result<bool> {
        match self.attributes.get(name) {
            Some(AttributeValue::Bool(v)) => Ok(*v),
            Some(other) => Err(KernelError::InvalidParameter(format!(
                "attribute {} must be a boolean, got {:?}",
                name, other
            ))),
            None => Err(KernelError::InvalidParameter(format!(
                "missing required attribute {}",
                name
            ))),
        }
    }

    /// String attribute with a fallback default.
    pub fn attr_str_or<'a>(&'a self, name: &str, default: &'a str) -> Result<&'a str> {
        match self.attributes.get(name) {
            Some(AttributeValue::String(v)) => Ok(v),
            Some(other) => Err(KernelError::InvalidParameter(format!(
                "attribute {} must be a string, got {:?}",
                name, other
            ))),
            None => Ok(default),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataType;

    fn sample_context() -> KernelContext {
        let a = Tensor::from_vec(vec![1.0f32, 2.0], vec![2]).unwrap();
        let out = Tensor::zeros(vec![2], DataType::F32);
        KernelContext::new(vec![a], vec![out])
    }

    #[test]
    fn test_io_access() -> Result<()> {
        let mut ctx = sample_context();
        assert_eq!(ctx.input_count(), 1);
        assert_eq!(ctx.output_count(), 1);
        assert_eq!(ctx.input(0)?.numel(), 2);
        assert!(ctx.input(1).is_err());
        assert!(ctx.output_mut(3).is_err());

        let (inputs, outputs) = ctx.io_mut();
        let src = inputs[0].as_slice::<f32>()?.to_vec();
        outputs[0].as_slice_mut::<f32>()?.copy_from_slice(&src);
        assert_eq!(ctx.output(0)?.as_slice::<f32>()?, &[1.0, 2.0]);
        Ok(())
    }

    #[test]
    fn test_attributes() -> Result<()> {
        let mut ctx = sample_context();
        ctx.set_attribute("N", AttributeValue::Int(4));
        ctx.set_attribute("sorted", AttributeValue::Bool(true));
        ctx.set_attribute("align", AttributeValue::String("LEFT_RIGHT".to_string()));

        assert_eq!(ctx.attr_int("N")?, 4);
        assert!(ctx.attr_bool("sorted")?);
        assert_eq!(ctx.attr_str_or("align", "RIGHT_LEFT")?, "LEFT_RIGHT");
        assert_eq!(ctx.attr_str_or("missing", "RIGHT_LEFT")?, "RIGHT_LEFT");

        assert!(ctx.attr_int("sorted").is_err());
        assert!(ctx.attr_bool("absent").is_err());
        Ok(())
    }

    #[test]
    fn test_resize_output() -> Result<()> {
        let mut ctx = sample_context();
        ctx.resize_output(0, vec![1])?;
        assert_eq!(ctx.output(0)?.shape(), &[1]);
        assert!(ctx.resize_output(5, vec![1]).is_err());
        Ok(())
    }
}
