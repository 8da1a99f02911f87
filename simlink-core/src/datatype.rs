//! Native type table for generated model data
//!
//! Generated models describe every value with the C type name used in the generated
//! source (`"double"`, `"unsigned char"`, ...).
//! This module maps those names onto a small set of abstract element types with a
//! fixed byte width.
//! The table is closed: names outside of it are either rejected
//! ([`Strictness::Strict`]) or reported as an opaque `"void"` type
//! ([`Strictness::Permissive`]) when building debug listings.

use crate::errors::{SimlinkError, SimlinkResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Element type of a value stored in model memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AbstractType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Float32,
    Float64,
}

impl AbstractType {
    /// Name used when reporting the type to a host (`"int8"`, `"float64"`, ...)
    pub fn name(&self) -> &'static str {
        match self {
            AbstractType::Int8 => "int8",
            AbstractType::UInt8 => "uint8",
            AbstractType::Int16 => "int16",
            AbstractType::UInt16 => "uint16",
            AbstractType::Int32 => "int32",
            AbstractType::UInt32 => "uint32",
            AbstractType::Float32 => "float32",
            AbstractType::Float64 => "float64",
        }
    }

    /// Width of a single element in bytes
    pub fn size(&self) -> usize {
        match self {
            AbstractType::Int8 | AbstractType::UInt8 => 1,
            AbstractType::Int16 | AbstractType::UInt16 => 2,
            AbstractType::Int32 | AbstractType::UInt32 | AbstractType::Float32 => 4,
            AbstractType::Float64 => 8,
        }
    }

    /// Native (C) type name generated models use for this element type
    pub fn native_name(&self) -> &'static str {
        match self {
            AbstractType::Int8 => "char",
            AbstractType::UInt8 => "unsigned char",
            AbstractType::Int16 => "short",
            AbstractType::UInt16 => "unsigned short",
            AbstractType::Int32 => "int",
            AbstractType::UInt32 => "unsigned int",
            AbstractType::Float32 => "float",
            AbstractType::Float64 => "double",
        }
    }

    /// Buffer-protocol format character for this element type
    pub fn format(&self) -> &'static str {
        match self {
            AbstractType::Int8 => "b",
            AbstractType::UInt8 => "B",
            AbstractType::Int16 => "h",
            AbstractType::UInt16 => "H",
            AbstractType::Int32 => "i",
            AbstractType::UInt32 => "I",
            AbstractType::Float32 => "f",
            AbstractType::Float64 => "d",
        }
    }
}

impl fmt::Display for AbstractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A row of the native type table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeDescriptor {
    pub native: &'static str,
    pub abstract_type: AbstractType,
    pub size: usize,
}

/// Every native type name a generated model may use for a value we can describe.
pub static TYPE_TABLE: [TypeDescriptor; 8] = [
    TypeDescriptor {
        native: "char",
        abstract_type: AbstractType::Int8,
        size: 1,
    },
    TypeDescriptor {
        native: "unsigned char",
        abstract_type: AbstractType::UInt8,
        size: 1,
    },
    TypeDescriptor {
        native: "short",
        abstract_type: AbstractType::Int16,
        size: 2,
    },
    TypeDescriptor {
        native: "unsigned short",
        abstract_type: AbstractType::UInt16,
        size: 2,
    },
    TypeDescriptor {
        native: "int",
        abstract_type: AbstractType::Int32,
        size: 4,
    },
    TypeDescriptor {
        native: "unsigned int",
        abstract_type: AbstractType::UInt32,
        size: 4,
    },
    TypeDescriptor {
        native: "float",
        abstract_type: AbstractType::Float32,
        size: 4,
    },
    TypeDescriptor {
        native: "double",
        abstract_type: AbstractType::Float64,
        size: 8,
    },
];

/// Name reported for native types outside of [`TYPE_TABLE`] in permissive mode
pub const OPAQUE_TYPE_NAME: &str = "void";

/// How to treat native type names that are not in the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strictness {
    /// Unknown names fail with [`SimlinkError::Datatype`]
    Strict,
    /// Unknown names degrade to [`OPAQUE_TYPE_NAME`]
    Permissive,
}

/// Find the table row for a native type name
pub fn lookup(native: &str) -> Option<&'static TypeDescriptor> {
    TYPE_TABLE.iter().find(|d| d.native == native)
}

/// Find the table row for a native type name, failing for unknown names
pub fn lookup_strict(native: &str) -> SimlinkResult<&'static TypeDescriptor> {
    lookup(native).ok_or_else(|| SimlinkError::Datatype(native.to_string()))
}

/// Abstract type name for a native type name
pub fn abstract_type_name(native: &str, strictness: Strictness) -> SimlinkResult<&'static str> {
    match (lookup(native), strictness) {
        (Some(descriptor), _) => Ok(descriptor.abstract_type.name()),
        (None, Strictness::Permissive) => Ok(OPAQUE_TYPE_NAME),
        (None, Strictness::Strict) => Err(SimlinkError::Datatype(native.to_string())),
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Rust scalar types that have a row in the native type table.
///
/// Implemented for exactly the eight element types of [`AbstractType`].
pub trait NativeScalar: sealed::Sealed + Copy + Default + fmt::Debug + PartialEq + 'static {
    const TYPE: AbstractType;

    fn into_value(self) -> ScalarValue;
}

/// A single value of any of the supported element types
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum ScalarValue {
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Float32(f32),
    Float64(f64),
}

macro_rules! impl_native_scalar {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}

            impl NativeScalar for $ty {
                const TYPE: AbstractType = AbstractType::$variant;

                fn into_value(self) -> ScalarValue {
                    ScalarValue::$variant(self)
                }
            }
        )*
    };
}

impl_native_scalar!(
    i8 => Int8,
    u8 => UInt8,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    f32 => Float32,
    f64 => Float64,
);

impl ScalarValue {
    /// Element type of the held value
    pub fn abstract_type(&self) -> AbstractType {
        match self {
            ScalarValue::Int8(_) => AbstractType::Int8,
            ScalarValue::UInt8(_) => AbstractType::UInt8,
            ScalarValue::Int16(_) => AbstractType::Int16,
            ScalarValue::UInt16(_) => AbstractType::UInt16,
            ScalarValue::Int32(_) => AbstractType::Int32,
            ScalarValue::UInt32(_) => AbstractType::UInt32,
            ScalarValue::Float32(_) => AbstractType::Float32,
            ScalarValue::Float64(_) => AbstractType::Float64,
        }
    }

    /// Widen the value to a double
    pub fn to_f64(&self) -> f64 {
        match *self {
            ScalarValue::Int8(v) => v as f64,
            ScalarValue::UInt8(v) => v as f64,
            ScalarValue::Int16(v) => v as f64,
            ScalarValue::UInt16(v) => v as f64,
            ScalarValue::Int32(v) => v as f64,
            ScalarValue::UInt32(v) => v as f64,
            ScalarValue::Float32(v) => v as f64,
            ScalarValue::Float64(v) => v,
        }
    }

    /// Host-native bytes of the value
    pub fn to_ne_bytes(&self) -> Vec<u8> {
        match *self {
            ScalarValue::Int8(v) => v.to_ne_bytes().to_vec(),
            ScalarValue::UInt8(v) => v.to_ne_bytes().to_vec(),
            ScalarValue::Int16(v) => v.to_ne_bytes().to_vec(),
            ScalarValue::UInt16(v) => v.to_ne_bytes().to_vec(),
            ScalarValue::Int32(v) => v.to_ne_bytes().to_vec(),
            ScalarValue::UInt32(v) => v.to_ne_bytes().to_vec(),
            ScalarValue::Float32(v) => v.to_ne_bytes().to_vec(),
            ScalarValue::Float64(v) => v.to_ne_bytes().to_vec(),
        }
    }

    /// Read a value of the given element type from model memory.
    ///
    /// # Safety
    /// `ptr` must be valid for reads of `abstract_type.size()` bytes.
    /// No alignment is required.
    pub unsafe fn read(abstract_type: AbstractType, ptr: *const u8) -> Self {
        match abstract_type {
            AbstractType::Int8 => ScalarValue::Int8((ptr as *const i8).read_unaligned()),
            AbstractType::UInt8 => ScalarValue::UInt8(ptr.read_unaligned()),
            AbstractType::Int16 => ScalarValue::Int16((ptr as *const i16).read_unaligned()),
            AbstractType::UInt16 => ScalarValue::UInt16((ptr as *const u16).read_unaligned()),
            AbstractType::Int32 => ScalarValue::Int32((ptr as *const i32).read_unaligned()),
            AbstractType::UInt32 => ScalarValue::UInt32((ptr as *const u32).read_unaligned()),
            AbstractType::Float32 => ScalarValue::Float32((ptr as *const f32).read_unaligned()),
            AbstractType::Float64 => ScalarValue::Float64((ptr as *const f64).read_unaligned()),
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Int8(v) => write!(f, "{}", v),
            ScalarValue::UInt8(v) => write!(f, "{}", v),
            ScalarValue::Int16(v) => write!(f, "{}", v),
            ScalarValue::UInt16(v) => write!(f, "{}", v),
            ScalarValue::Int32(v) => write!(f, "{}", v),
            ScalarValue::UInt32(v) => write!(f, "{}", v),
            ScalarValue::Float32(v) => write!(f, "{}", v),
            ScalarValue::Float64(v) => write!(f, "{}", v),
        }
    }
}

/// View a slice of native scalars as host-native bytes
pub(crate) fn as_bytes<T: NativeScalar>(values: &[T]) -> &[u8] {
    // SAFETY: NativeScalar is sealed to primitive integer and float types, which have no
    // padding and no invalid bit patterns.
    unsafe {
        std::slice::from_raw_parts(values.as_ptr() as *const u8, std::mem::size_of_val(values))
    }
}
