//! Conversions between model buffers and numpy arrays

use crate::buffer::{memory_order_values, BufferView, SourceArray};
use crate::datatype::{AbstractType, NativeScalar};
use crate::errors::SimlinkResult;
use numpy::{Element, PyArray, PyArrayDyn, PyArrayMethods, PyUntypedArrayMethods};
use pyo3::exceptions::PyTypeError;
use pyo3::prelude::*;

/// Wrap a view in a read-only numpy array that keeps `owner` alive.
///
/// # Safety
/// The memory behind `view` must stay valid for as long as `owner` does.
pub(crate) unsafe fn view_to_numpy<'py>(
    view: &BufferView,
    owner: Bound<'py, PyAny>,
) -> PyResult<Bound<'py, PyAny>> {
    let array = match view.element() {
        AbstractType::Int8 => borrow::<i8>(view, owner)?,
        AbstractType::UInt8 => borrow::<u8>(view, owner)?,
        AbstractType::Int16 => borrow::<i16>(view, owner)?,
        AbstractType::UInt16 => borrow::<u16>(view, owner)?,
        AbstractType::Int32 => borrow::<i32>(view, owner)?,
        AbstractType::UInt32 => borrow::<u32>(view, owner)?,
        AbstractType::Float32 => borrow::<f32>(view, owner)?,
        AbstractType::Float64 => borrow::<f64>(view, owner)?,
    };
    if view.readonly() {
        array.getattr("flags")?.setattr("writeable", false)?;
    }
    Ok(array)
}

unsafe fn borrow<'py, T: NativeScalar + Element>(
    view: &BufferView,
    owner: Bound<'py, PyAny>,
) -> SimlinkResult<Bound<'py, PyAny>> {
    let array = view.as_array::<T>()?;
    Ok(PyArray::borrow_from_array_bound(&array, owner).into_any())
}

/// Values copied out of a numpy array in memory order
pub(crate) struct HostArray {
    shape: Vec<usize>,
    values: HostValues,
}

enum HostValues {
    Int8(Vec<i8>),
    UInt8(Vec<u8>),
    Int16(Vec<i16>),
    UInt16(Vec<u16>),
    Int32(Vec<i32>),
    UInt32(Vec<u32>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
}

impl HostArray {
    pub(crate) fn extract(value: &Bound<'_, PyAny>) -> PyResult<Self> {
        macro_rules! try_extract {
            ($($ty:ty => $variant:ident),+ $(,)?) => {
                $(
                    if let Ok(array) = value.downcast::<PyArrayDyn<$ty>>() {
                        let (shape, values) = copy_out(array)?;
                        return Ok(Self { shape, values: HostValues::$variant(values) });
                    }
                )+
            };
        }

        try_extract!(
            i8 => Int8,
            u8 => UInt8,
            i16 => Int16,
            u16 => UInt16,
            i32 => Int32,
            u32 => UInt32,
            f32 => Float32,
            f64 => Float64,
        );

        Err(PyTypeError::new_err(format!(
            "Expected a numpy array of int8, uint8, int16, uint16, int32, uint32, float32 or float64 (got {})",
            value.get_type().name()?
        )))
    }

    pub(crate) fn as_source(&self) -> SourceArray<'_> {
        match &self.values {
            HostValues::Int8(v) => SourceArray::from_slice(v, &self.shape),
            HostValues::UInt8(v) => SourceArray::from_slice(v, &self.shape),
            HostValues::Int16(v) => SourceArray::from_slice(v, &self.shape),
            HostValues::UInt16(v) => SourceArray::from_slice(v, &self.shape),
            HostValues::Int32(v) => SourceArray::from_slice(v, &self.shape),
            HostValues::UInt32(v) => SourceArray::from_slice(v, &self.shape),
            HostValues::Float32(v) => SourceArray::from_slice(v, &self.shape),
            HostValues::Float64(v) => SourceArray::from_slice(v, &self.shape),
        }
    }
}

fn copy_out<T: NativeScalar + Element>(
    array: &Bound<'_, PyArrayDyn<T>>,
) -> PyResult<(Vec<usize>, Vec<T>)> {
    let shape = array.shape().to_vec();
    let readonly = array.try_readonly()?;
    let values = memory_order_values(&readonly.as_array());
    Ok((shape, values))
}
