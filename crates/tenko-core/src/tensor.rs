//! Dynamically typed tensor buffers.
//!
//! A [`Tensor`] pairs a shape with a [`TensorData`] payload, a closed sum
//! type with one variant per supported element kind. Kernels inspect the
//! runtime [`DataType`] tag once per call and then work on plain typed
//! slices; the enum replaces an open-coded switch over a type tag at every
//! call site.
//!
//! Storage is contiguous row-major. Tensors are owned by the kernel context
//! and only read or written through these accessors; kernels never free or
//! reallocate them except through the explicit [`Tensor::resize`] path used
//! for data-dependent output shapes.

use half::{bf16, f16};
use num_complex::{Complex32, Complex64};

use crate::error::{KernelError, Result};
use crate::types::DataType;

/// Typed element storage for a tensor.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    /// 8-bit signed integer elements.
    I8(Vec<i8>),
    /// 16-bit signed integer elements.
    I16(Vec<i16>),
    /// 32-bit signed integer elements.
    I32(Vec<i32>),
    /// 64-bit signed integer elements.
    I64(Vec<i64>),
    /// 8-bit unsigned integer elements.
    U8(Vec<u8>),
    /// 16-bit unsigned integer elements.
    U16(Vec<u16>),
    /// 32-bit unsigned integer elements.
    U32(Vec<u32>),
    /// 64-bit unsigned integer elements.
    U64(Vec<u64>),
    /// 16-bit IEEE float elements.
    F16(Vec<f16>),
    /// 16-bit brain float elements.
    BF16(Vec<bf16>),
    /// 32-bit float elements.
    F32(Vec<f32>),
    /// 64-bit float elements.
    F64(Vec<f64>),
    /// 64-bit complex elements.
    C64(Vec<Complex32>),
    /// 128-bit complex elements.
    C128(Vec<Complex64>),
    /// Boolean elements.
    Bool(Vec<bool>),
}

macro_rules! with_data_vec {
    ($data:expr, $v:ident => $body:expr) => {
        match $data {
            TensorData::I8($v) => $body,
            TensorData::I16($v) => $body,
            TensorData::I32($v) => $body,
            TensorData::I64($v) => $body,
            TensorData::U8($v) => $body,
            TensorData::U16($v) => $body,
            TensorData::U32($v) => $body,
            TensorData::U64($v) => $body,
            TensorData::F16($v) => $body,
            TensorData::BF16($v) => $body,
            TensorData::F32($v) => $body,
            TensorData::F64($v) => $body,
            TensorData::C64($v) => $body,
            TensorData::C128($v) => $body,
            TensorData::Bool($v) => $body,
        }
    };
}

impl TensorData {
    /// Runtime type tag of the stored elements.
    pub fn dtype(&self) -> DataType {
        match self {
            TensorData::I8(_) => DataType::I8,
            TensorData::I16(_) => DataType::I16,
            TensorData::I32(_) => DataType::I32,
            TensorData::I64(_) => DataType::I64,
            TensorData::U8(_) => DataType::U8,
            TensorData::U16(_) => DataType::U16,
            TensorData::U32(_) => DataType::U32,
            TensorData::U64(_) => DataType::U64,
            TensorData::F16(_) => DataType::F16,
            TensorData::BF16(_) => DataType::BF16,
            TensorData::F32(_) => DataType::F32,
            TensorData::F64(_) => DataType::F64,
            TensorData::C64(_) => DataType::C64,
            TensorData::C128(_) => DataType::C128,
            TensorData::Bool(_) => DataType::Bool,
        }
    }

    /// Number of stored elements.
    pub fn len(&self) -> usize {
        with_data_vec!(self, v => v.len())
    }

    /// Whether the buffer holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Allocate a zero-initialized buffer of `numel` elements of `dtype`.
    pub fn zeros(dtype: DataType, numel: usize) -> Self {
        match dtype {
            DataType::I8 => TensorData::I8(vec![0; numel]),
            DataType::I16 => TensorData::I16(vec![0; numel]),
            DataType::I32 => TensorData::I32(vec![0; numel]),
            DataType::I64 => TensorData::I64(vec![0; numel]),
            DataType::U8 => TensorData::U8(vec![0; numel]),
            DataType::U16 => TensorData::U16(vec![0; numel]),
            DataType::U32 => TensorData::U32(vec![0; numel]),
            DataType::U64 => TensorData::U64(vec![0; numel]),
            DataType::F16 => TensorData::F16(vec![f16::ZERO; numel]),
            DataType::BF16 => TensorData::BF16(vec![bf16::ZERO; numel]),
            DataType::F32 => TensorData::F32(vec![0.0; numel]),
            DataType::F64 => TensorData::F64(vec![0.0; numel]),
            DataType::C64 => TensorData::C64(vec![Complex32::new(0.0, 0.0); numel]),
            DataType::C128 => TensorData::C128(vec![Complex64::new(0.0, 0.0); numel]),
            DataType::Bool => TensorData::Bool(vec![false; numel]),
        }
    }

    fn resize_elems(&mut self, numel: usize) {
        match self {
            TensorData::I8(v) => v.resize(numel, 0),
            TensorData::I16(v) => v.resize(numel, 0),
            TensorData::I32(v) => v.resize(numel, 0),
            TensorData::I64(v) => v.resize(numel, 0),
            TensorData::U8(v) => v.resize(numel, 0),
            TensorData::U16(v) => v.resize(numel, 0),
            TensorData::U32(v) => v.resize(numel, 0),
            TensorData::U64(v) => v.resize(numel, 0),
            TensorData::F16(v) => v.resize(numel, f16::ZERO),
            TensorData::BF16(v) => v.resize(numel, bf16::ZERO),
            TensorData::F32(v) => v.resize(numel, 0.0),
            TensorData::F64(v) => v.resize(numel, 0.0),
            TensorData::C64(v) => v.resize(numel, Complex32::new(0.0, 0.0)),
            TensorData::C128(v) => v.resize(numel, Complex64::new(0.0, 0.0)),
            TensorData::Bool(v) => v.resize(numel, false),
        }
    }
}

/// A Rust element type with a tensor [`DataType`] tag.
///
/// The trait ties each supported element kind to its [`TensorData`] variant
/// so that generic compute paths can extract typed slices after a single
/// runtime dispatch on the tag.
pub trait Element: Copy + Send + Sync + 'static {
    /// Runtime tag corresponding to this element type.
    const DATA_TYPE: DataType;

    /// Additive identity for this element type.
    fn zero() -> Self;

    /// Borrow the typed slice if `data` holds this element type.
    fn slice(data: &TensorData) -> Option<&[Self]>;

    /// Mutably borrow the typed slice if `data` holds this element type.
    fn slice_mut(data: &mut TensorData) -> Option<&mut [Self]>;

    /// Wrap a typed vector into the matching [`TensorData`] variant.
    fn into_data(vec: Vec<Self>) -> TensorData;
}

macro_rules! impl_element {
    ($t:ty, $variant:ident, $zero:expr) => {
        impl Element for $t {
            const DATA_TYPE: DataType = DataType::$variant;

            fn zero() -> Self {
                $zero
            }

            fn slice(data: &TensorData) -> Option<&[Self]> {
                match data {
                    TensorData::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn slice_mut(data: &mut TensorData) -> Option<&mut [Self]> {
                match data {
                    TensorData::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn into_data(vec: Vec<Self>) -> TensorData {
                TensorData::$variant(vec)
            }
        }
    };
}

impl_element!(i8, I8, 0);
impl_element!(i16, I16, 0);
impl_element!(i32, I32, 0);
impl_element!(i64, I64, 0);
impl_element!(u8, U8, 0);
impl_element!(u16, U16, 0);
impl_element!(u32, U32, 0);
impl_element!(u64, U64, 0);
impl_element!(f16, F16, f16::ZERO);
impl_element!(bf16, BF16, bf16::ZERO);
impl_element!(f32, F32, 0.0);
impl_element!(f64, F64, 0.0);
impl_element!(Complex32, C64, Complex32::new(0.0, 0.0));
impl_element!(Complex64, C128, Complex64::new(0.0, 0.0));
impl_element!(bool, Bool, false);

/// Element types with a total left-to-right value ordering usable for
/// selection kernels. Complex and boolean elements are excluded.
pub trait RealElement: Element + PartialOrd {}

impl RealElement for i8 {}
impl RealElement for i16 {}
impl RealElement for i32 {}
impl RealElement for i64 {}
impl RealElement for u8 {}
impl RealElement for u16 {}
impl RealElement for u32 {}
impl RealElement for u64 {}
impl RealElement for f16 {}
impl RealElement for bf16 {}
impl RealElement for f32 {}
impl RealElement for f64 {}

/// Real floating-point element types, convertible through `f32` for kernels
/// that do scalar arithmetic in single precision.
pub trait FloatElement: RealElement {
    /// Widen (or pass through) to `f32`.
    fn to_f32(self) -> f32;

    /// Narrow (or pass through) from `f32`.
    fn from_f32(value: f32) -> Self;
}

impl FloatElement for f16 {
    fn to_f32(self) -> f32 {
        f16::to_f32(self)
    }

    fn from_f32(value: f32) -> Self {
        f16::from_f32(value)
    }
}

impl FloatElement for bf16 {
    fn to_f32(self) -> f32 {
        bf16::to_f32(self)
    }

    fn from_f32(value: f32) -> Self {
        bf16::from_f32(value)
    }
}

impl FloatElement for f32 {
    fn to_f32(self) -> f32 {
        self
    }

    fn from_f32(value: f32) -> Self {
        value
    }
}

impl FloatElement for f64 {
    fn to_f32(self) -> f32 {
        self as f32
    }

    fn from_f32(value: f32) -> Self {
        f64::from(value)
    }
}

/// An N-dimensional tensor view over contiguous row-major storage.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    data: TensorData,
    shape: Vec<usize>,
}

impl Tensor {
    /// Create a tensor from a typed vector and a shape.
    ///
    /// Fails if the shape's element count does not match the vector length.
    pub fn from_vec<T: Element>(data: Vec<T>, shape: Vec<usize>) -> Result<Self> {
        let numel: usize = shape.iter().product();
        if numel != data.len() {
            return Err(KernelError::InvalidParameter(format!(
                "shape {:?} implies {} elements but buffer holds {}",
                shape,
                numel,
                data.len()
            )));
        }
        Ok(Self {
            data: T::into_data(data),
            shape,
        })
    }

    /// Create a rank-0 tensor holding a single value.
    pub fn scalar<T: Element>(value: T) -> Self {
        Self {
            data: T::into_data(vec![value]),
            shape: Vec::new(),
        }
    }

    /// Create a zero-filled tensor of the given shape and element type.
    pub fn zeros(shape: Vec<usize>, dtype: DataType) -> Self {
        let numel = shape.iter().product();
        Self {
            data: TensorData::zeros(dtype, numel),
            shape,
        }
    }

    /// Create a tensor of the given shape with every element set to `value`.
    pub fn full<T: Element>(shape: Vec<usize>, value: T) -> Self {
        let numel = shape.iter().product();
        Self {
            data: T::into_data(vec![value; numel]),
            shape,
        }
    }

    /// Dimension sizes, outermost first.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of dimensions.
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Total number of elements.
    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Runtime element type tag.
    pub fn dtype(&self) -> DataType {
        self.data.dtype()
    }

    /// Borrow the elements as a typed slice.
    ///
    /// Fails with an inner error when the requested type does not match the
    /// runtime tag; kernels are expected to dispatch on [`Tensor::dtype`]
    /// before calling this.
    pub fn as_slice<T: Element>(&self) -> Result<&[T]> {
        T::slice(&self.data).ok_or_else(|| {
            KernelError::Inner(format!(
                "tensor holds {:?} but {:?} was requested",
                self.dtype(),
                T::DATA_TYPE
            ))
        })
    }

    /// Mutably borrow the elements as a typed slice.
    pub fn as_slice_mut<T: Element>(&mut self) -> Result<&mut [T]> {
        let dtype = self.dtype();
        T::slice_mut(&mut self.data).ok_or_else(|| {
            KernelError::Inner(format!(
                "tensor holds {:?} but {:?} was requested",
                dtype,
                T::DATA_TYPE
            ))
        })
    }

    /// Set every element to `value`.
    pub fn fill<T: Element>(&mut self, value: T) -> Result<()> {
        self.as_slice_mut::<T>()?.fill(value);
        Ok(())
    }

    /// Read a single-element integer tensor as `i64`.
    pub fn scalar_i64(&self) -> Result<i64> {
        if self.numel() != 1 {
            return Err(KernelError::InvalidParameter(format!(
                "expected a single-element scalar, got shape {:?}",
                self.shape
            )));
        }
        match &self.data {
            TensorData::I8(v) => Ok(i64::from(v[0])),
            TensorData::I16(v) => Ok(i64::from(v[0])),
            TensorData::I32(v) => Ok(i64::from(v[0])),
            TensorData::I64(v) => Ok(v[0]),
            TensorData::U8(v) => Ok(i64::from(v[0])),
            TensorData::U16(v) => Ok(i64::from(v[0])),
            TensorData::U32(v) => Ok(i64::from(v[0])),
            TensorData::U64(v) => i64::try_from(v[0]).map_err(|_| {
                KernelError::InvalidParameter(format!("scalar {} overflows i64", v[0]))
            }),
            other => Err(KernelError::InvalidParameter(format!(
                "expected an integer scalar, got {:?}",
                other.dtype()
            ))),
        }
    }

    /// Read a single-element real floating-point tensor as `f32`.
    pub fn scalar_f32(&self) -> Result<f32> {
        if self.numel() != 1 {
            return Err(KernelError::InvalidParameter(format!(
                "expected a single-element scalar, got shape {:?}",
                self.shape
            )));
        }
        match &self.data {
            TensorData::F16(v) => Ok(v[0].to_f32()),
            TensorData::BF16(v) => Ok(v[0].to_f32()),
            TensorData::F32(v) => Ok(v[0]),
            TensorData::F64(v) => Ok(v[0] as f32),
            other => Err(KernelError::InvalidParameter(format!(
                "expected a floating-point scalar, got {:?}",
                other.dtype()
            ))),
        }
    }

    /// Re-describe this tensor with a new shape, growing or shrinking the
    /// backing buffer to match. Used for outputs whose final size is only
    /// known after compute.
    pub fn resize(&mut self, shape: Vec<usize>) {
        let numel = shape.iter().product();
        self.data.resize_elems(numel);
        self.shape = shape;
    }
}
