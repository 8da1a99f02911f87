//! Strided views over live model memory
//!
//! [`describe`] turns a resolved table row into a [`BufferView`]: a non-owning
//! description (pointer, element size, shape, byte strides) of the value in model
//! memory, in the shape of the buffer protocol.
//! [`write`] is the inverse: it validates an external array against the declared type
//! and dimensions of a value and copies it into model memory.
//!
//! Only values with at most three dimensions are supported.

use crate::datatype::{
    as_bytes, lookup_strict, AbstractType, NativeScalar, ScalarValue, TypeDescriptor,
};
use crate::errors::{SimlinkError, SimlinkResult};
use crate::mapping::{DataTypeRecord, DimensionDescriptor, Orientation};
use ndarray::{ArrayViewD, IxDyn, ShapeBuilder};

/// Largest number of dimensions a value may have to be viewed or written
pub const MAX_DIMS: usize = 3;

/// A read-only strided view over a value in model memory.
///
/// The view does not own or copy the data.
/// It is only valid until the model is reset or terminated; after that the address
/// may point at freed or re-purposed memory.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferView {
    ptr: *mut u8,
    element: AbstractType,
    item_size: usize,
    shape: Vec<usize>,
    strides: Vec<isize>,
    readonly: bool,
}

impl BufferView {
    pub fn ptr(&self) -> *mut u8 {
        self.ptr
    }

    pub fn element(&self) -> AbstractType {
        self.element
    }

    pub fn item_size(&self) -> usize {
        self.item_size
    }

    /// Buffer-protocol format character of the elements
    pub fn format(&self) -> &'static str {
        self.element.format()
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Byte strides, one per axis.
    ///
    /// Scalars have no axes but still report the stride of a single element.
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    pub fn readonly(&self) -> bool {
        self.readonly
    }

    /// Number of elements addressed by the view
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_element<T: NativeScalar>(&self) -> SimlinkResult<()> {
        if T::TYPE != self.element {
            return Err(SimlinkError::TypeMismatch(format!(
                "buffer holds {} values, requested {}",
                self.element,
                T::TYPE
            )));
        }
        Ok(())
    }

    /// Borrow the viewed memory as an n-dimensional array.
    ///
    /// # Safety
    /// The model the view was taken from must not have been reset or terminated since,
    /// and nothing may write to the viewed memory while the array is alive.
    pub unsafe fn as_array<T: NativeScalar>(&self) -> SimlinkResult<ArrayViewD<'_, T>> {
        self.check_element::<T>()?;

        let strides: Vec<usize> = if self.shape.is_empty() {
            vec![]
        } else {
            self.strides
                .iter()
                .map(|s| *s as usize / self.item_size)
                .collect()
        };
        let shape = IxDyn(&self.shape).strides(IxDyn(&strides));
        Ok(ArrayViewD::from_shape_ptr(shape, self.ptr as *const T))
    }

    /// Copy the viewed values out in logical (row-major) order.
    ///
    /// # Safety
    /// Same requirements as [`BufferView::as_array`].
    pub unsafe fn to_vec<T: NativeScalar>(&self) -> SimlinkResult<Vec<T>> {
        Ok(self.as_array::<T>()?.iter().copied().collect())
    }

    /// Read the first element of the view.
    ///
    /// # Safety
    /// The model the view was taken from must not have been reset or terminated since.
    pub unsafe fn first(&self) -> SimlinkResult<ScalarValue> {
        if self.is_empty() {
            return Err(SimlinkError::InvalidArgument(
                "cannot read from an empty buffer".to_string(),
            ));
        }
        Ok(ScalarValue::read(self.element, self.ptr))
    }
}

/// An external, contiguous array to be copied into model memory
#[derive(Debug, Clone, Copy)]
pub struct SourceArray<'a> {
    element: AbstractType,
    item_size: usize,
    shape: &'a [usize],
    bytes: &'a [u8],
}

impl<'a> SourceArray<'a> {
    /// Build from raw host-native bytes with a known element type
    pub fn from_bytes(
        element: AbstractType,
        item_size: usize,
        shape: &'a [usize],
        bytes: &'a [u8],
    ) -> Self {
        Self {
            element,
            item_size,
            shape,
            bytes,
        }
    }

    /// Build from a slice of native scalars laid out in the order they should be copied
    pub fn from_slice<T: NativeScalar>(values: &'a [T], shape: &'a [usize]) -> Self {
        Self::from_bytes(T::TYPE, std::mem::size_of::<T>(), shape, as_bytes(values))
    }

    pub fn element(&self) -> AbstractType {
        self.element
    }

    pub fn shape(&self) -> &[usize] {
        self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }
}

/// Values of `array` in the order they are laid out in memory.
///
/// Contiguous arrays, C or Fortran ordered, are copied as stored; anything else is
/// gathered in logical (row-major) order.
pub fn memory_order_values<T: Copy>(array: &ArrayViewD<'_, T>) -> Vec<T> {
    match array.as_slice_memory_order() {
        Some(values) => values.to_vec(),
        None => array.iter().copied().collect(),
    }
}

fn check_dims(dimensions: &DimensionDescriptor) -> SimlinkResult<()> {
    if dimensions.num_dims() > MAX_DIMS {
        return Err(SimlinkError::Unsupported(format!(
            "Cannot handle values with more than {} dimensions (got {})",
            MAX_DIMS,
            dimensions.num_dims()
        )));
    }
    Ok(())
}

fn check_item_size(
    data_type: &DataTypeRecord<'_>,
    descriptor: &TypeDescriptor,
) -> SimlinkResult<()> {
    if data_type.size != descriptor.size {
        return Err(SimlinkError::TypeMismatch(format!(
            "Table declares {} bytes for '{}', expected {}",
            data_type.size, data_type.c_name, descriptor.size
        )));
    }
    Ok(())
}

/// Matrix layouts need exactly the extents their strides are computed from
fn check_extents(dimensions: &DimensionDescriptor) -> SimlinkResult<()> {
    let expected = match dimensions.orientation {
        Orientation::MatrixColMajor | Orientation::MatrixRowMajor => 2,
        Orientation::MatrixColMajorNd => 3,
        _ => return Ok(()),
    };
    if dimensions.num_dims() != expected {
        return Err(SimlinkError::InvalidArgument(format!(
            "Orientation {} needs {} dimensions (got {:?})",
            dimensions.orientation, expected, dimensions.extents
        )));
    }
    Ok(())
}

/// Byte stride of `axis` for a value with the given layout.
///
/// Strides follow the declared layout so that non-square matrices stay inside their
/// buffer, rather than the extent pairing of the generated-model buffer formatting.
/// Column-major values step through their leading extent first.
/// Column-major N-D values keep their outermost axis on the largest stride and their
/// middle axis contiguous.
fn stride(
    orientation: Orientation,
    extents: &[usize],
    axis: usize,
    item_size: usize,
) -> SimlinkResult<usize> {
    let stride = match orientation {
        Orientation::Scalar | Orientation::Vector => item_size,
        Orientation::MatrixColMajor => match axis {
            1 => item_size * extents[0],
            _ => item_size,
        },
        Orientation::MatrixColMajorNd => match axis {
            0 => item_size * extents[1..].iter().product::<usize>(),
            1 => item_size,
            _ => item_size * extents[1],
        },
        Orientation::MatrixRowMajor => match axis {
            0 => item_size * extents[1],
            _ => item_size,
        },
        Orientation::MatrixRowMajorNd => {
            return Err(SimlinkError::Unsupported(
                "ND matrices not supported in row major orientation. Use column major for 3-dim matrices".to_string(),
            ))
        }
        Orientation::Unknown(code) => {
            return Err(SimlinkError::Unsupported(format!(
                "Invalid/Unknown orientation ({})",
                code
            )))
        }
    };
    Ok(stride)
}

/// Build a read-only strided view over the value at `address`.
///
/// No memory is read; the view only describes where the value lives.
pub fn describe(
    data_type: &DataTypeRecord<'_>,
    dimensions: &DimensionDescriptor,
    address: *mut u8,
) -> SimlinkResult<BufferView> {
    let descriptor = lookup_strict(&data_type.c_name)?;
    check_item_size(data_type, descriptor)?;
    check_dims(dimensions)?;
    check_extents(dimensions)?;
    if address.is_null() {
        return Err(SimlinkError::Unsupported(
            "value has no data address in this model build".to_string(),
        ));
    }

    let item_size = data_type.size;
    let (shape, strides) = if dimensions.orientation == Orientation::Scalar {
        (vec![], vec![item_size as isize])
    } else {
        let extents = &dimensions.extents;
        let strides = (0..extents.len())
            .map(|axis| {
                stride(dimensions.orientation, extents, axis, item_size).map(|s| s as isize)
            })
            .collect::<SimlinkResult<Vec<_>>>()?;
        (extents.clone(), strides)
    };

    Ok(BufferView {
        ptr: address,
        element: descriptor.abstract_type,
        item_size,
        shape,
        strides,
        readonly: true,
    })
}

/// Validate `source` against the declared type and dimensions of a value and copy it
/// into model memory.
///
/// The copy is a raw host-native byte copy of the destination's element count; no
/// element conversion or reordering takes place.
/// Model memory is untouched unless every check passes.
///
/// # Safety
/// `address` must be valid for writes of the value's full size.
pub unsafe fn write(
    data_type: &DataTypeRecord<'_>,
    dimensions: &DimensionDescriptor,
    address: *mut u8,
    source: &SourceArray<'_>,
) -> SimlinkResult<()> {
    let descriptor = lookup_strict(&data_type.c_name)?;
    check_item_size(data_type, descriptor)?;
    if data_type.is_pointer {
        return Err(SimlinkError::TypeMismatch(format!(
            "Cannot write through a pointer-typed value ({})",
            data_type.c_name
        )));
    }
    if source.element != descriptor.abstract_type || source.item_size != data_type.size {
        return Err(SimlinkError::TypeMismatch(format!(
            "Datatype of array does not match datatype of parameter. Expected {} got {}",
            descriptor.abstract_type, source.element
        )));
    }
    if source.ndim() != dimensions.num_dims() {
        return Err(SimlinkError::InvalidArgument(format!(
            "Dimension mismatch. Expected {} got {}",
            dimensions.num_dims(),
            source.ndim()
        )));
    }
    match dimensions.orientation {
        Orientation::MatrixRowMajorNd => {
            return Err(SimlinkError::Unsupported(
                "Row major orientation for nd matrices not supported".to_string(),
            ))
        }
        Orientation::Unknown(code) => {
            return Err(SimlinkError::Unsupported(format!(
                "Invalid/Unknown orientation ({})",
                code
            )))
        }
        _ => check_dims(dimensions)?,
    }
    if source.shape != dimensions.extents.as_slice() {
        return Err(SimlinkError::InvalidArgument(format!(
            "Shape mismatch. Expected {:?} got {:?}",
            dimensions.extents, source.shape
        )));
    }

    let n_bytes = dimensions.element_count() * data_type.size;
    if source.bytes.len() != n_bytes {
        return Err(SimlinkError::InvalidArgument(format!(
            "Array holds {} bytes, expected {}",
            source.bytes.len(),
            n_bytes
        )));
    }
    if address.is_null() {
        return Err(SimlinkError::Unsupported(
            "value has no data address in this model build".to_string(),
        ));
    }

    std::ptr::copy_nonoverlapping(source.bytes.as_ptr(), address, n_bytes);
    Ok(())
}

fn check_scalar(
    data_type: &DataTypeRecord<'_>,
    dimensions: &DimensionDescriptor,
) -> SimlinkResult<()> {
    if data_type.is_pointer {
        return Err(SimlinkError::TypeMismatch(format!(
            "Value is pointer-typed ({}); only plain scalars can be accessed directly",
            data_type.c_name
        )));
    }
    if dimensions.orientation != Orientation::Scalar {
        return Err(SimlinkError::TypeMismatch(format!(
            "Value is not a scalar (orientation {}, dims {:?})",
            dimensions.orientation, dimensions.extents
        )));
    }
    Ok(())
}

/// Read a scalar value out of model memory.
///
/// # Safety
/// `address` must be valid for reads of the value's size.
pub unsafe fn read_scalar(
    data_type: &DataTypeRecord<'_>,
    dimensions: &DimensionDescriptor,
    address: *mut u8,
) -> SimlinkResult<ScalarValue> {
    check_scalar(data_type, dimensions)?;
    let descriptor = lookup_strict(&data_type.c_name)?;
    check_item_size(data_type, descriptor)?;
    if address.is_null() {
        return Err(SimlinkError::Unsupported(
            "value has no data address in this model build".to_string(),
        ));
    }
    Ok(ScalarValue::read(descriptor.abstract_type, address))
}

/// Write a scalar value into model memory.
///
/// The value must already have the element type of the destination.
///
/// # Safety
/// `address` must be valid for writes of the value's size.
pub unsafe fn write_scalar(
    data_type: &DataTypeRecord<'_>,
    dimensions: &DimensionDescriptor,
    address: *mut u8,
    value: ScalarValue,
) -> SimlinkResult<()> {
    check_scalar(data_type, dimensions)?;
    let bytes = value.to_ne_bytes();
    let element = value.abstract_type();
    let source = SourceArray::from_bytes(element, element.size(), &dimensions.extents, &bytes);
    write(data_type, dimensions, address, &source)
}
