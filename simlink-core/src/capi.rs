//! Bindings to the C API tables emitted by the code generator
//!
//! The `Raw*` structs mirror the layout of the generated C structs closely enough to
//! walk them: only the fields read here are declared, and structs that are only ever
//! accessed through pointers stop after the last field used.
//!
//! A compiled model is driven through a [`ModelEntryPoints`] table, a small C shim
//! compiled next to the generated sources that exports the model's lifecycle
//! functions and its root mapping.

use crate::errors::{SimlinkError, SimlinkResult};
use crate::mapping::{
    BlockParameterRecord, DataTypeRecord, DimensionRecord, ExecutionContract, MappingId,
    ModelMapping, ModelParameterRecord, Orientation, SignalRecord, TableLocation,
};
use std::borrow::Cow;
use std::ffi::{c_char, c_int, c_uint, c_void, CStr};
use std::ptr::NonNull;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawSignal {
    pub addr_map_index: c_uint,
    pub sys_num: c_uint,
    pub block_path: *const c_char,
    pub signal_name: *const c_char,
    pub port_number: u16,
    pub data_type_index: u16,
    pub dim_index: u16,
    pub fxp_index: u16,
    pub s_time_index: u8,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawBlockParameter {
    pub addr_map_index: c_uint,
    pub block_path: *const c_char,
    pub param_name: *const c_char,
    pub data_type_index: u16,
    pub dim_index: u16,
    pub fxp_index: u16,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawModelParameter {
    pub addr_map_index: c_uint,
    pub var_name: *const c_char,
    pub data_type_index: u16,
    pub dim_index: u16,
    pub fxp_index: u16,
}

/// Bit of [`RawDataType::flags`] set for complex types
pub const DATA_TYPE_COMPLEX: u8 = 0b01;
/// Bit of [`RawDataType::flags`] set for pointer types
pub const DATA_TYPE_POINTER: u8 = 0b10;

/// A row of the data-type map.
///
/// The generated struct stores its complex and pointer flags as one-bit bitfields
/// right after `sl_data_id`; `flags` covers the byte they occupy with GCC and Clang.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawDataType {
    pub c_data_name: *const c_char,
    pub mw_data_name: *const c_char,
    pub num_elements: u16,
    pub elem_map_index: u16,
    pub data_size: u16,
    pub sl_data_id: u8,
    pub flags: u8,
    pub enum_storage_type: u8,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawDimensionMap {
    pub orientation: c_int,
    pub dim_array_index: c_uint,
    pub num_dims: u8,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawSignalTables {
    pub signals: *const RawSignal,
    pub num_signals: c_uint,
    pub root_inputs: *const RawSignal,
    pub num_root_inputs: c_uint,
    pub root_outputs: *const RawSignal,
    pub num_root_outputs: c_uint,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawParameterTables {
    pub block_parameters: *const RawBlockParameter,
    pub num_block_parameters: c_uint,
    pub model_parameters: *const RawModelParameter,
    pub num_model_parameters: c_uint,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawStateTables {
    pub states: *const c_void,
    pub num_states: c_uint,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawMaps {
    pub data_type_map: *const RawDataType,
    pub dimension_map: *const RawDimensionMap,
    pub fix_pt_map: *const c_void,
    pub element_map: *const c_void,
    pub sample_time_map: *const c_void,
    pub dimension_array: *const c_uint,
}

/// Tables shared by every instance of a model
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawStaticMap {
    pub signals: RawSignalTables,
    pub params: RawParameterTables,
    pub states: RawStateTables,
    pub maps: RawMaps,
}

/// Per-instance mapping information; only the leading fields are declared
#[repr(C)]
#[derive(Debug)]
pub struct RawModelMappingInfo {
    pub version: u8,
    pub static_map: *const RawStaticMap,
    pub path: *const c_char,
    pub full_path: *const c_char,
    pub data_addr_map: *const *mut c_void,
    pub child_mmi_array: *const *mut RawModelMappingInfo,
    pub child_mmi_array_len: c_uint,
}

/// A [`ModelMapping`] over generated C tables.
///
/// The handle does not own the tables; it is valid while the model that produced it
/// stays initialised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawMapping(NonNull<RawModelMappingInfo>);

unsafe fn c_str<'a>(ptr: *const c_char) -> Option<Cow<'a, str>> {
    if ptr.is_null() {
        None
    } else {
        Some(CStr::from_ptr(ptr).to_string_lossy())
    }
}

impl RawMapping {
    /// Wrap a mapping-info pointer; `None` if it is null.
    ///
    /// # Safety
    /// `ptr` must point at a complete, initialised mapping whose static tables,
    /// address map and child array stay valid for as long as the handle or any of its
    /// clones are used.
    pub unsafe fn from_ptr(ptr: *mut RawModelMappingInfo) -> Option<Self> {
        NonNull::new(ptr).map(RawMapping)
    }

    pub fn as_ptr(&self) -> *mut RawModelMappingInfo {
        self.0.as_ptr()
    }

    fn info(&self) -> &RawModelMappingInfo {
        // SAFETY: guaranteed by the contract of `from_ptr`
        unsafe { self.0.as_ref() }
    }

    fn static_map(&self) -> &RawStaticMap {
        // SAFETY: guaranteed by the contract of `from_ptr`
        unsafe { &*self.info().static_map }
    }
}

impl ModelMapping for RawMapping {
    fn id(&self) -> MappingId {
        MappingId::from_ptr(self.0.as_ptr())
    }

    fn path(&self) -> Option<Cow<'_, str>> {
        unsafe { c_str(self.info().path) }
    }

    fn children(&self) -> Vec<Self> {
        let info = self.info();
        if info.child_mmi_array.is_null() {
            return Vec::new();
        }
        (0..info.child_mmi_array_len as usize)
            .filter_map(|i| unsafe { RawMapping::from_ptr(*info.child_mmi_array.add(i)) })
            .collect()
    }

    fn num_model_parameters(&self) -> usize {
        self.static_map().params.num_model_parameters as usize
    }

    fn model_parameter(&self, index: usize) -> ModelParameterRecord<'_> {
        let row = unsafe { &*self.static_map().params.model_parameters.add(index) };
        ModelParameterRecord {
            name: unsafe { c_str(row.var_name) }.unwrap_or_default(),
            location: TableLocation {
                data_type_index: row.data_type_index as usize,
                dimension_index: row.dim_index as usize,
                address_index: row.addr_map_index as usize,
            },
        }
    }

    fn num_block_parameters(&self) -> usize {
        self.static_map().params.num_block_parameters as usize
    }

    fn block_parameter(&self, index: usize) -> BlockParameterRecord<'_> {
        let row = unsafe { &*self.static_map().params.block_parameters.add(index) };
        BlockParameterRecord {
            block_path: unsafe { c_str(row.block_path) }.unwrap_or_default(),
            param_name: unsafe { c_str(row.param_name) }.unwrap_or_default(),
            location: TableLocation {
                data_type_index: row.data_type_index as usize,
                dimension_index: row.dim_index as usize,
                address_index: row.addr_map_index as usize,
            },
        }
    }

    fn num_signals(&self) -> usize {
        self.static_map().signals.num_signals as usize
    }

    fn signal(&self, index: usize) -> SignalRecord<'_> {
        let row = unsafe { &*self.static_map().signals.signals.add(index) };
        SignalRecord {
            block_path: unsafe { c_str(row.block_path) },
            signal_name: unsafe { c_str(row.signal_name) },
            location: TableLocation {
                data_type_index: row.data_type_index as usize,
                dimension_index: row.dim_index as usize,
                address_index: row.addr_map_index as usize,
            },
        }
    }

    fn data_type(&self, index: usize) -> DataTypeRecord<'_> {
        let row = unsafe { &*self.static_map().maps.data_type_map.add(index) };
        DataTypeRecord {
            c_name: unsafe { c_str(row.c_data_name) }.unwrap_or_default(),
            mw_name: unsafe { c_str(row.mw_data_name) }.unwrap_or_default(),
            size: row.data_size as usize,
            is_pointer: row.flags & DATA_TYPE_POINTER != 0,
        }
    }

    fn dimension(&self, index: usize) -> DimensionRecord {
        let row = unsafe { &*self.static_map().maps.dimension_map.add(index) };
        DimensionRecord {
            orientation: Orientation::from_raw(row.orientation),
            dim_array_index: row.dim_array_index as usize,
            num_dims: row.num_dims as usize,
        }
    }

    fn dimension_extent(&self, index: usize) -> usize {
        unsafe { *self.static_map().maps.dimension_array.add(index) as usize }
    }

    fn data_address(&self, index: usize) -> *mut u8 {
        let map = self.info().data_addr_map;
        if map.is_null() {
            return std::ptr::null_mut();
        }
        unsafe { *map.add(index) as *mut u8 }
    }
}

/// Lifecycle functions exported by a compiled model
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ModelEntryPoints {
    pub initialize: unsafe extern "C" fn(),
    pub step: unsafe extern "C" fn(),
    pub terminate: unsafe extern "C" fn(),
    /// Null while the model is healthy
    pub error_status: unsafe extern "C" fn() -> *const c_char,
    pub mapping_info: unsafe extern "C" fn() -> *mut RawModelMappingInfo,
    pub step_size: unsafe extern "C" fn() -> f64,
    /// Only present for models built with a configurable final time
    pub final_time: Option<unsafe extern "C" fn() -> f64>,
    pub set_final_time: Option<unsafe extern "C" fn(f64)>,
}

/// An [`ExecutionContract`] that calls into a compiled model
#[derive(Debug)]
pub struct RawModel {
    entry_points: ModelEntryPoints,
}

impl RawModel {
    /// Copy the entry-point table at `entry_points`.
    ///
    /// # Safety
    /// `entry_points` must be null or point at a table whose functions stay callable
    /// for the lifetime of the returned value.
    /// The functions must follow the usual generated-model contract: the mapping is
    /// only valid between initialise and terminate.
    pub unsafe fn from_entry_points(entry_points: *const ModelEntryPoints) -> SimlinkResult<Self> {
        if entry_points.is_null() {
            return Err(SimlinkError::InvalidArgument(
                "model entry point table is null".to_string(),
            ));
        }
        Ok(Self {
            entry_points: *entry_points,
        })
    }
}

impl ExecutionContract for RawModel {
    type Mapping = RawMapping;

    fn initialize(&mut self) {
        unsafe { (self.entry_points.initialize)() }
    }

    fn step(&mut self) {
        unsafe { (self.entry_points.step)() }
    }

    fn terminate(&mut self) {
        unsafe { (self.entry_points.terminate)() }
    }

    fn error_status(&self) -> Option<String> {
        unsafe { c_str((self.entry_points.error_status)()) }.map(|s| s.into_owned())
    }

    fn root_mapping(&self) -> SimlinkResult<RawMapping> {
        unsafe { RawMapping::from_ptr((self.entry_points.mapping_info)()) }.ok_or_else(|| {
            SimlinkError::Execution("model returned no mapping information".to_string())
        })
    }

    fn step_size(&self) -> f64 {
        unsafe { (self.entry_points.step_size)() }
    }

    fn supports_final_time(&self) -> bool {
        self.entry_points.final_time.is_some() && self.entry_points.set_final_time.is_some()
    }

    fn final_time(&self) -> f64 {
        match self.entry_points.final_time {
            Some(final_time) => unsafe { final_time() },
            None => f64::NAN,
        }
    }

    fn set_final_time(&mut self, final_time: f64) {
        if let Some(set_final_time) = self.entry_points.set_final_time {
            unsafe { set_final_time(final_time) }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::describe;
    use crate::hierarchy::{discover, PathTable};
    use crate::resolver::{resolve_model_parameter, resolve_signal, LookupCache};
    use crate::session::{ModelSession, SessionConfig};
    use std::sync::atomic::{AtomicPtr, AtomicU32, Ordering};

    fn leak<T>(values: Vec<T>) -> *const T {
        Box::leak(values.into_boxed_slice()).as_ptr()
    }

    /// Root with a scalar parameter, a 2x2 column-major signal, an unnamed signal and
    /// one child instance.
    fn fixture() -> *mut RawModelMappingInfo {
        let data_types = leak(vec![
            RawDataType {
                c_data_name: c"double".as_ptr(),
                mw_data_name: c"real_T".as_ptr(),
                num_elements: 0,
                elem_map_index: 0,
                data_size: 8,
                sl_data_id: 0,
                flags: 0,
                enum_storage_type: 0,
            },
            RawDataType {
                c_data_name: c"unsigned char".as_ptr(),
                mw_data_name: c"uint8_T".as_ptr(),
                num_elements: 0,
                elem_map_index: 0,
                data_size: 1,
                sl_data_id: 3,
                flags: DATA_TYPE_POINTER,
                enum_storage_type: 0,
            },
        ]);
        let dimensions = leak(vec![
            RawDimensionMap {
                orientation: 0,
                dim_array_index: 0,
                num_dims: 2,
            },
            RawDimensionMap {
                orientation: 3,
                dim_array_index: 2,
                num_dims: 2,
            },
        ]);
        let dimension_array = leak(vec![1 as c_uint, 1, 2, 2]);

        let gain: &'static mut f64 = Box::leak(Box::new(2.5));
        let matrix: &'static mut [f64; 4] = Box::leak(Box::new([1.0, 2.0, 3.0, 4.0]));
        let flag: &'static mut u8 = Box::leak(Box::new(1));
        let addresses = leak(vec![
            gain as *mut f64 as *mut c_void,
            matrix.as_mut_ptr() as *mut c_void,
            flag as *mut u8 as *mut c_void,
        ]);

        let model_parameters = leak(vec![RawModelParameter {
            addr_map_index: 0,
            var_name: c"gain".as_ptr(),
            data_type_index: 0,
            dim_index: 0,
            fxp_index: 0,
        }]);
        let signals = leak(vec![
            RawSignal {
                addr_map_index: 1,
                sys_num: 0,
                block_path: c"top/Matrix".as_ptr(),
                signal_name: c"m".as_ptr(),
                port_number: 0,
                data_type_index: 0,
                dim_index: 1,
                fxp_index: 0,
                s_time_index: 0,
            },
            RawSignal {
                addr_map_index: 2,
                sys_num: 0,
                block_path: c"top/Flag".as_ptr(),
                signal_name: std::ptr::null(),
                port_number: 0,
                data_type_index: 1,
                dim_index: 0,
                fxp_index: 0,
                s_time_index: 0,
            },
        ]);

        let static_map = |model_parameters: *const RawModelParameter,
                          num_model_parameters: c_uint,
                          signals: *const RawSignal,
                          num_signals: c_uint| {
            Box::leak(Box::new(RawStaticMap {
                signals: RawSignalTables {
                    signals,
                    num_signals,
                    root_inputs: std::ptr::null(),
                    num_root_inputs: 0,
                    root_outputs: std::ptr::null(),
                    num_root_outputs: 0,
                },
                params: RawParameterTables {
                    block_parameters: std::ptr::null(),
                    num_block_parameters: 0,
                    model_parameters,
                    num_model_parameters,
                },
                states: RawStateTables {
                    states: std::ptr::null(),
                    num_states: 0,
                },
                maps: RawMaps {
                    data_type_map: data_types,
                    dimension_map: dimensions,
                    fix_pt_map: std::ptr::null(),
                    element_map: std::ptr::null(),
                    sample_time_map: std::ptr::null(),
                    dimension_array,
                },
            })) as *const RawStaticMap
        };

        let child: &'static mut RawModelMappingInfo = Box::leak(Box::new(RawModelMappingInfo {
            version: 1,
            static_map: static_map(model_parameters, 1, std::ptr::null(), 0),
            path: c"top/Sub".as_ptr(),
            full_path: c"top/Sub".as_ptr(),
            data_addr_map: addresses,
            child_mmi_array: std::ptr::null(),
            child_mmi_array_len: 0,
        }));
        let children = leak(vec![child as *mut RawModelMappingInfo]);

        let root: &'static mut RawModelMappingInfo = Box::leak(Box::new(RawModelMappingInfo {
            version: 1,
            static_map: static_map(model_parameters, 1, signals, 2),
            path: std::ptr::null(),
            full_path: std::ptr::null(),
            data_addr_map: addresses,
            child_mmi_array: children,
            child_mmi_array_len: 1,
        }));
        root
    }

    #[test]
    fn walk_generated_tables() {
        let root = unsafe { RawMapping::from_ptr(fixture()) }.unwrap();
        assert_eq!(root.path(), None);
        assert_eq!(root.num_model_parameters(), 1);
        assert_eq!(root.num_signals(), 2);

        let mut table = PathTable::new();
        table.insert("top", root);
        discover(&root, &mut table);
        assert_eq!(table.paths().collect::<Vec<_>>(), vec!["top", "top/Sub"]);
        assert_ne!(table.get("top/Sub").unwrap().id(), root.id());

        let mut cache = LookupCache::new();
        let index = resolve_signal(&root, &mut cache, None, Some("m")).unwrap();
        let entry = root.entry(root.signal(index).location);
        assert_eq!(entry.dimensions.orientation, Orientation::MatrixColMajor);
        let view = describe(&entry.data_type, &entry.dimensions, entry.address).unwrap();
        assert_eq!(view.strides(), &[8, 16]);
        assert_eq!(
            unsafe { view.to_vec::<f64>() }.unwrap(),
            vec![1.0, 3.0, 2.0, 4.0]
        );

        let unnamed = root.signal(1);
        assert_eq!(unnamed.signal_name, None);
        assert!(root.data_type(unnamed.location.data_type_index).is_pointer);

        let index = resolve_model_parameter(&root, &mut cache, "gain").unwrap();
        let entry = root.entry(root.model_parameter(index).location);
        assert_eq!(entry.data_type.mw_name, "real_T");
        assert_eq!(unsafe { *(entry.address as *const f64) }, 2.5);
    }

    #[test]
    fn null_pointers_are_rejected() {
        assert!(unsafe { RawMapping::from_ptr(std::ptr::null_mut()) }.is_none());
        assert!(matches!(
            unsafe { RawModel::from_entry_points(std::ptr::null()) },
            Err(SimlinkError::InvalidArgument(_))
        ));
    }

    static ROOT: AtomicPtr<RawModelMappingInfo> = AtomicPtr::new(std::ptr::null_mut());
    static STEPS: AtomicU32 = AtomicU32::new(0);

    unsafe extern "C" fn initialize() {
        ROOT.store(fixture(), Ordering::SeqCst);
        STEPS.store(0, Ordering::SeqCst);
    }

    unsafe extern "C" fn step() {
        STEPS.fetch_add(1, Ordering::SeqCst);
    }

    unsafe extern "C" fn terminate() {
        ROOT.store(std::ptr::null_mut(), Ordering::SeqCst);
    }

    unsafe extern "C" fn error_status() -> *const c_char {
        if STEPS.load(Ordering::SeqCst) >= 3 {
            c"Overrun".as_ptr()
        } else {
            std::ptr::null()
        }
    }

    unsafe extern "C" fn mapping_info() -> *mut RawModelMappingInfo {
        ROOT.load(Ordering::SeqCst)
    }

    unsafe extern "C" fn step_size() -> f64 {
        0.1
    }

    #[test]
    fn session_over_entry_points() {
        let entry_points = ModelEntryPoints {
            initialize,
            step,
            terminate,
            error_status,
            mapping_info,
            step_size,
            final_time: None,
            set_final_time: None,
        };
        let model = unsafe { RawModel::from_entry_points(&entry_points) }.unwrap();
        assert!(matches!(
            model.root_mapping(),
            Err(SimlinkError::Execution(_))
        ));

        let mut session = ModelSession::new(model, SessionConfig::new("top")).unwrap();
        session.reset().unwrap();
        assert_eq!(session.models().unwrap(), vec!["top", "top/Sub"]);
        assert_eq!(session.step_size().unwrap(), 0.1);
        assert!(session.final_time().is_err());

        session.step(2).unwrap();
        assert_eq!(
            session.step(1).unwrap_err(),
            SimlinkError::Execution("Overrun".to_string())
        );

        let info = session.describe_model_param("top/Sub", "gain").unwrap();
        assert_eq!(info.to_string(), "float64 (double) dims: [1, 1] order: scalar");

        session.terminate();
        assert!(ROOT.load(Ordering::SeqCst).is_null());
    }
}
