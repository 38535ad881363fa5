//! Runtime element-type dispatch.
//!
//! Each kernel inspects its input's [`tenko_core::DataType`] tag once per
//! call and selects a type-specialized compute path through one of these
//! macros. The macros are closed over the supported element kinds of each
//! kernel family; a tag outside the set produces an `UnsupportedType` error,
//! logged distinctly from other validation failures.

/// Dispatch over every supported element kind, including booleans.
///
/// Used by kernels that move bytes without interpreting them (concat).
macro_rules! dispatch_all_types {
    ($op:expr, $dtype:expr, $t:ident => $body:expr) => {
        match $dtype {
            tenko_core::DataType::I8 => {
                type $t = i8;
                $body
            }
            tenko_core::DataType::I16 => {
                type $t = i16;
                $body
            }
            tenko_core::DataType::I32 => {
                type $t = i32;
                $body
            }
            tenko_core::DataType::I64 => {
                type $t = i64;
                $body
            }
            tenko_core::DataType::U8 => {
                type $t = u8;
                $body
            }
            tenko_core::DataType::U16 => {
                type $t = u16;
                $body
            }
            tenko_core::DataType::U32 => {
                type $t = u32;
                $body
            }
            tenko_core::DataType::U64 => {
                type $t = u64;
                $body
            }
            tenko_core::DataType::F16 => {
                type $t = half::f16;
                $body
            }
            tenko_core::DataType::BF16 => {
                type $t = half::bf16;
                $body
            }
            tenko_core::DataType::F32 => {
                type $t = f32;
                $body
            }
            tenko_core::DataType::F64 => {
                type $t = f64;
                $body
            }
            tenko_core::DataType::C64 => {
                type $t = num_complex::Complex32;
                $body
            }
            tenko_core::DataType::C128 => {
                type $t = num_complex::Complex64;
                $body
            }
            tenko_core::DataType::Bool => {
                type $t = bool;
                $body
            }
        }
    };
}

/// Dispatch over the numeric element kinds: integers, floats, and complex.
macro_rules! dispatch_numeric {
    ($op:expr, $dtype:expr, $t:ident => $body:expr) => {
        match $dtype {
            tenko_core::DataType::I8 => {
                type $t = i8;
                $body
            }
            tenko_core::DataType::I16 => {
                type $t = i16;
                $body
            }
            tenko_core::DataType::I32 => {
                type $t = i32;
                $body
            }
            tenko_core::DataType::I64 => {
                type $t = i64;
                $body
            }
            tenko_core::DataType::U8 => {
                type $t = u8;
                $body
            }
            tenko_core::DataType::U16 => {
                type $t = u16;
                $body
            }
            tenko_core::DataType::U32 => {
                type $t = u32;
                $body
            }
            tenko_core::DataType::U64 => {
                type $t = u64;
                $body
            }
            tenko_core::DataType::F16 => {
                type $t = half::f16;
                $body
            }
            tenko_core::DataType::BF16 => {
                type $t = half::bf16;
                $body
            }
            tenko_core::DataType::F32 => {
                type $t = f32;
                $body
            }
            tenko_core::DataType::F64 => {
                type $t = f64;
                $body
            }
            tenko_core::DataType::C64 => {
                type $t = num_complex::Complex32;
                $body
            }
            tenko_core::DataType::C128 => {
                type $t = num_complex::Complex64;
                $body
            }
            other => {
                tracing::warn!(op = $op, dtype = ?other, "no kernel specialization for data type");
                Err(tenko_core::KernelError::UnsupportedType {
                    op: $op.to_string(),
                    dtype: other,
                })
            }
        }
    };
}

/// Dispatch over the totally ordered element kinds: integers and floats.
macro_rules! dispatch_real {
    ($op:expr, $dtype:expr, $t:ident => $body:expr) => {
        match $dtype {
            tenko_core::DataType::I8 => {
                type $t = i8;
                $body
            }
            tenko_core::DataType::I16 => {
                type $t = i16;
                $body
            }
            tenko_core::DataType::I32 => {
                type $t = i32;
                $body
            }
            tenko_core::DataType::I64 => {
                type $t = i64;
                $body
            }
            tenko_core::DataType::U8 => {
                type $t = u8;
                $body
            }
            tenko_core::DataType::U16 => {
                type $t = u16;
                $body
            }
            tenko_core::DataType::U32 => {
                type $t = u32;
                $body
            }
            tenko_core::DataType::U64 => {
                type $t = u64;
                $body
            }
            tenko_core::DataType::F16 => {
                type $t = half::f16;
                $body
            }
            tenko_core::DataType::BF16 => {
                type $t = half::bf16;
                $body
            }
            tenko_core::DataType::F32 => {
                type $t = f32;
                $body
            }
            tenko_core::DataType::F64 => {
                type $t = f64;
                $body
            }
            other => {
                tracing::warn!(op = $op, dtype = ?other, "no kernel specialization for data type");
                Err(tenko_core::KernelError::UnsupportedType {
                    op: $op.to_string(),
                    dtype: other,
                })
            }
        }
    };
}

/// Dispatch over the half- and single-precision float kinds.
macro_rules! dispatch_float {
    ($op:expr, $dtype:expr, $t:ident => $body:expr) => {
        match $dtype {
            tenko_core::DataType::F16 => {
                type $t = half::f16;
                $body
            }
            tenko_core::DataType::F32 => {
                type $t = f32;
                $body
            }
            other => {
                tracing::warn!(op = $op, dtype = ?other, "no kernel specialization for data type");
                Err(tenko_core::KernelError::UnsupportedType {
                    op: $op.to_string(),
                    dtype: other,
                })
            }
        }
    };
}

pub(crate) use {dispatch_all_types, dispatch_float, dispatch_numeric, dispatch_real};
