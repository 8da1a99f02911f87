//! Contracts consumed from the generated model
//!
//! A generated model exposes two things:
//!
//! - a tree of [`ModelMapping`] descriptors, one per model instance, that list the
//!   model parameters, block parameters and signals of that instance together with the
//!   data-type, dimension and address tables needed to reach their live values
//! - an [`ExecutionContract`] that initialises, steps and terminates the model
//!
//! Both are owned by the generated code.
//! Mapping handles are cheap, non-owning references into that data and become invalid
//! once the model is terminated or re-initialised.

use crate::errors::SimlinkResult;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Identity of a mapping descriptor.
///
/// Two handles compare equal only if they refer to the same descriptor, even if both
/// describe models with identical tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MappingId(pub usize);

impl MappingId {
    pub fn from_ptr<T: ?Sized>(ptr: *const T) -> Self {
        MappingId(ptr as *const () as usize)
    }
}

/// Declared memory layout of a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Scalar,
    Vector,
    MatrixRowMajor,
    MatrixColMajor,
    MatrixRowMajorNd,
    MatrixColMajorNd,
    /// A layout code the generated tables use but that is not known here
    Unknown(i32),
}

impl Orientation {
    /// Decode the enumeration value used by the generated C tables
    pub fn from_raw(code: i32) -> Self {
        match code {
            0 => Orientation::Scalar,
            1 => Orientation::Vector,
            2 => Orientation::MatrixRowMajor,
            3 => Orientation::MatrixColMajor,
            4 => Orientation::MatrixRowMajorNd,
            5 => Orientation::MatrixColMajorNd,
            other => Orientation::Unknown(other),
        }
    }

    pub fn to_raw(&self) -> i32 {
        match self {
            Orientation::Scalar => 0,
            Orientation::Vector => 1,
            Orientation::MatrixRowMajor => 2,
            Orientation::MatrixColMajor => 3,
            Orientation::MatrixRowMajorNd => 4,
            Orientation::MatrixColMajorNd => 5,
            Orientation::Unknown(code) => *code,
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Orientation::Scalar => f.write_str("scalar"),
            Orientation::Vector => f.write_str("vector"),
            Orientation::MatrixRowMajor => f.write_str("matrix_row_major"),
            Orientation::MatrixColMajor => f.write_str("matrix_col_major"),
            Orientation::MatrixRowMajorNd => f.write_str("matrix_row_major_nd"),
            Orientation::MatrixColMajorNd => f.write_str("matrix_col_major_nd"),
            Orientation::Unknown(code) => write!(f, "unknown({})", code),
        }
    }
}

/// Indices of a table row into the shared data-type, dimension and address tables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableLocation {
    pub data_type_index: usize,
    pub dimension_index: usize,
    pub address_index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelParameterRecord<'a> {
    pub name: Cow<'a, str>,
    pub location: TableLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockParameterRecord<'a> {
    pub block_path: Cow<'a, str>,
    pub param_name: Cow<'a, str>,
    pub location: TableLocation,
}

/// A signal row.
///
/// Generated tables leave the name of unnamed signals null.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalRecord<'a> {
    pub block_path: Option<Cow<'a, str>>,
    pub signal_name: Option<Cow<'a, str>>,
    pub location: TableLocation,
}

/// A row of the data-type table
#[derive(Debug, Clone, PartialEq)]
pub struct DataTypeRecord<'a> {
    /// Native (C) type name, e.g. `"double"`
    pub c_name: Cow<'a, str>,
    /// Modelling-tool type name, e.g. `"real_T"`
    pub mw_name: Cow<'a, str>,
    /// Element size in bytes
    pub size: usize,
    pub is_pointer: bool,
}

/// A row of the dimension table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimensionRecord {
    pub orientation: Orientation,
    /// Offset of the first extent in the dimension array
    pub dim_array_index: usize,
    pub num_dims: usize,
}

/// Orientation plus the per-axis extents of a value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionDescriptor {
    pub orientation: Orientation,
    pub extents: Vec<usize>,
}

impl DimensionDescriptor {
    pub fn new(orientation: Orientation, extents: Vec<usize>) -> Self {
        Self {
            orientation,
            extents,
        }
    }

    pub fn num_dims(&self) -> usize {
        self.extents.len()
    }

    /// Number of elements stored for the value
    pub fn element_count(&self) -> usize {
        self.extents.iter().product()
    }
}

/// Everything needed to describe or access a resolved table row
#[derive(Debug, Clone, PartialEq)]
pub struct Entry<'a> {
    pub data_type: DataTypeRecord<'a>,
    pub dimensions: DimensionDescriptor,
    pub address: *mut u8,
}

/// Metadata and live data addresses of one model instance.
///
/// Implementations are handles: cloning one must not copy the underlying tables, and
/// [`ModelMapping::id`] must be stable for the lifetime of the descriptor.
/// The counts and indexed accessors mirror the generated tables; indices passed to the
/// accessors are always below the matching count or taken from another row of the same
/// mapping.
pub trait ModelMapping: Clone {
    fn id(&self) -> MappingId;

    /// Declared instance path; the root model usually has none
    fn path(&self) -> Option<Cow<'_, str>>;

    /// Directly referenced sub-model instances
    fn children(&self) -> Vec<Self>;

    fn num_model_parameters(&self) -> usize;
    fn model_parameter(&self, index: usize) -> ModelParameterRecord<'_>;

    fn num_block_parameters(&self) -> usize;
    fn block_parameter(&self, index: usize) -> BlockParameterRecord<'_>;

    fn num_signals(&self) -> usize;
    fn signal(&self, index: usize) -> SignalRecord<'_>;

    fn data_type(&self, index: usize) -> DataTypeRecord<'_>;
    fn dimension(&self, index: usize) -> DimensionRecord;
    /// Extent stored at `index` of the dimension array
    fn dimension_extent(&self, index: usize) -> usize;
    /// Live data address stored at `index` of the address table
    fn data_address(&self, index: usize) -> *mut u8;

    /// Resolve the data type, dimensions and address a row points at
    fn entry(&self, location: TableLocation) -> Entry<'_> {
        let dimension = self.dimension(location.dimension_index);
        let extents = (0..dimension.num_dims)
            .map(|axis| self.dimension_extent(dimension.dim_array_index + axis))
            .collect();

        Entry {
            data_type: self.data_type(location.data_type_index),
            dimensions: DimensionDescriptor::new(dimension.orientation, extents),
            address: self.data_address(location.address_index),
        }
    }
}

/// Lifecycle and timing interface of a generated model.
///
/// The generated code usually keeps its state in process-wide globals, so only one
/// contract per compiled model should be driven at a time.
pub trait ExecutionContract {
    type Mapping: ModelMapping;

    fn initialize(&mut self);

    /// Advance the model by a single base-rate step
    fn step(&mut self);

    fn terminate(&mut self);

    /// Error status set by the model, if any
    fn error_status(&self) -> Option<String>;

    /// Root mapping of the (initialised) model
    fn root_mapping(&self) -> SimlinkResult<Self::Mapping>;

    /// Fixed base step size in seconds
    fn step_size(&self) -> f64;

    /// Whether the model was built with a configurable final time
    fn supports_final_time(&self) -> bool {
        false
    }

    /// Final simulation time.
    ///
    /// Only meaningful when [`ExecutionContract::supports_final_time`] is true.
    fn final_time(&self) -> f64 {
        f64::NAN
    }

    fn set_final_time(&mut self, _final_time: f64) {}
}
