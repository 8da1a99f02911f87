//! Host-side model mappings and a scripted execution contract
//!
//! [`InMemoryMapping`] owns its tables and data storage, which makes it possible to
//! drive a [`crate::session::ModelSession`] without a generated model.
//! [`InMemoryModel`] rebuilds a mapping tree on every initialisation and counts the
//! lifecycle calls it receives.

use crate::datatype::{as_bytes, AbstractType, NativeScalar};
use crate::errors::{SimlinkError, SimlinkResult};
use crate::mapping::{
    BlockParameterRecord, DataTypeRecord, DimensionRecord, ExecutionContract, MappingId,
    ModelMapping, ModelParameterRecord, Orientation, SignalRecord, TableLocation,
};
use std::borrow::Cow;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

fn mw_name(abstract_type: AbstractType) -> &'static str {
    match abstract_type {
        AbstractType::Int8 => "int8_T",
        AbstractType::UInt8 => "uint8_T",
        AbstractType::Int16 => "int16_T",
        AbstractType::UInt16 => "uint16_T",
        AbstractType::Int32 => "int32_T",
        AbstractType::UInt32 => "uint32_T",
        AbstractType::Float32 => "real32_T",
        AbstractType::Float64 => "real_T",
    }
}

/// Declared type, layout and initial contents of a single entry
#[derive(Debug, Clone, PartialEq)]
pub struct EntrySpec {
    c_name: String,
    mw_name: String,
    size: usize,
    is_pointer: bool,
    orientation: Orientation,
    extents: Vec<usize>,
    bytes: Vec<u8>,
}

impl EntrySpec {
    fn from_values<T: NativeScalar>(
        orientation: Orientation,
        extents: Vec<usize>,
        values: &[T],
    ) -> Self {
        Self {
            c_name: T::TYPE.native_name().to_string(),
            mw_name: mw_name(T::TYPE).to_string(),
            size: T::TYPE.size(),
            is_pointer: false,
            orientation,
            extents,
            bytes: as_bytes(values).to_vec(),
        }
    }

    /// A scalar, declared with the 1x1 extents generated tables use
    pub fn scalar<T: NativeScalar>(value: T) -> Self {
        Self::from_values(Orientation::Scalar, vec![1, 1], &[value])
    }

    /// A column vector of `values.len()` elements
    pub fn vector<T: NativeScalar>(values: &[T]) -> Self {
        Self::from_values(Orientation::Vector, vec![values.len(), 1], values)
    }

    /// A value with an arbitrary layout.
    ///
    /// `values` are stored as given, so they must already be in the order implied by
    /// `orientation`.
    pub fn matrix<T: NativeScalar>(
        orientation: Orientation,
        extents: &[usize],
        values: &[T],
    ) -> Self {
        Self::from_values(orientation, extents.to_vec(), values)
    }

    /// An entry whose native type is not part of the type table
    pub fn opaque(c_name: &str, size: usize, extents: &[usize]) -> Self {
        Self {
            c_name: c_name.to_string(),
            mw_name: c_name.to_string(),
            size,
            is_pointer: false,
            orientation: if extents.iter().product::<usize>() == 1 {
                Orientation::Scalar
            } else {
                Orientation::Vector
            },
            extents: extents.to_vec(),
            bytes: vec![0; size * extents.iter().product::<usize>()],
        }
    }

    /// Mark the entry as pointer-typed
    pub fn pointer(mut self) -> Self {
        self.is_pointer = true;
        self
    }
}

struct MappingNode {
    path: Option<String>,
    model_params: Vec<(String, TableLocation)>,
    block_params: Vec<(String, String, TableLocation)>,
    signals: Vec<(Option<String>, Option<String>, TableLocation)>,
    data_types: Vec<(String, String, usize, bool)>,
    dimensions: Vec<DimensionRecord>,
    dimension_array: Vec<usize>,
    // u64 cells keep every entry 8-byte aligned and writable through a shared handle
    storage: Vec<Box<[Cell<u64>]>>,
    children: Vec<InMemoryMapping>,
}

/// A mapping that owns its tables and the memory its entries live in.
///
/// Cloning is cheap and yields a handle to the same node.
#[derive(Clone)]
pub struct InMemoryMapping(Rc<MappingNode>);

impl fmt::Debug for InMemoryMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryMapping")
            .field("path", &self.0.path)
            .field("model_params", &self.0.model_params.len())
            .field("block_params", &self.0.block_params.len())
            .field("signals", &self.0.signals.len())
            .field("children", &self.0.children)
            .finish()
    }
}

impl InMemoryMapping {
    pub fn builder(path: Option<&str>) -> MappingBuilder {
        MappingBuilder {
            node: MappingNode {
                path: path.map(str::to_string),
                model_params: Vec::new(),
                block_params: Vec::new(),
                signals: Vec::new(),
                data_types: Vec::new(),
                dimensions: Vec::new(),
                dimension_array: Vec::new(),
                storage: Vec::new(),
                children: Vec::new(),
            },
        }
    }

    /// Overwrite the leading elements of the first signal matching the given names.
    ///
    /// Returns false if no signal matches or the values do not fit.
    /// Intended for step hooks that emulate model outputs.
    pub fn store_signal<T: NativeScalar>(
        &self,
        block_path: Option<&str>,
        signal_name: Option<&str>,
        values: &[T],
    ) -> bool {
        let found = self.0.signals.iter().find(|(block, name, _)| {
            block_path.map_or(true, |b| block.as_deref() == Some(b))
                && signal_name.map_or(true, |n| name.as_deref() == Some(n))
        });
        let Some((_, _, location)) = found else {
            return false;
        };

        let bytes = as_bytes(values);
        let storage = &self.0.storage[location.address_index];
        if bytes.len() > storage.len() * std::mem::size_of::<u64>() {
            return false;
        }
        // SAFETY: the storage is made of cells, so writing through a shared handle is
        // allowed, and the length was checked above.
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), storage.as_ptr() as *mut u8, bytes.len());
        }
        true
    }
}

impl ModelMapping for InMemoryMapping {
    fn id(&self) -> MappingId {
        MappingId::from_ptr(Rc::as_ptr(&self.0))
    }

    fn path(&self) -> Option<Cow<'_, str>> {
        self.0.path.as_deref().map(Cow::Borrowed)
    }

    fn children(&self) -> Vec<Self> {
        self.0.children.clone()
    }

    fn num_model_parameters(&self) -> usize {
        self.0.model_params.len()
    }

    fn model_parameter(&self, index: usize) -> ModelParameterRecord<'_> {
        let (name, location) = &self.0.model_params[index];
        ModelParameterRecord {
            name: Cow::Borrowed(name),
            location: *location,
        }
    }

    fn num_block_parameters(&self) -> usize {
        self.0.block_params.len()
    }

    fn block_parameter(&self, index: usize) -> BlockParameterRecord<'_> {
        let (block_path, param_name, location) = &self.0.block_params[index];
        BlockParameterRecord {
            block_path: Cow::Borrowed(block_path),
            param_name: Cow::Borrowed(param_name),
            location: *location,
        }
    }

    fn num_signals(&self) -> usize {
        self.0.signals.len()
    }

    fn signal(&self, index: usize) -> SignalRecord<'_> {
        let (block_path, signal_name, location) = &self.0.signals[index];
        SignalRecord {
            block_path: block_path.as_deref().map(Cow::Borrowed),
            signal_name: signal_name.as_deref().map(Cow::Borrowed),
            location: *location,
        }
    }

    fn data_type(&self, index: usize) -> DataTypeRecord<'_> {
        let (c_name, mw_name, size, is_pointer) = &self.0.data_types[index];
        DataTypeRecord {
            c_name: Cow::Borrowed(c_name),
            mw_name: Cow::Borrowed(mw_name),
            size: *size,
            is_pointer: *is_pointer,
        }
    }

    fn dimension(&self, index: usize) -> DimensionRecord {
        self.0.dimensions[index]
    }

    fn dimension_extent(&self, index: usize) -> usize {
        self.0.dimension_array[index]
    }

    fn data_address(&self, index: usize) -> *mut u8 {
        self.0.storage[index].as_ptr() as *mut u8
    }
}

/// Builds an [`InMemoryMapping`] one row at a time.
///
/// Every entry gets its own data-type, dimension and address rows.
pub struct MappingBuilder {
    node: MappingNode,
}

impl MappingBuilder {
    fn add_entry(&mut self, spec: EntrySpec) -> TableLocation {
        let node = &mut self.node;

        node.data_types
            .push((spec.c_name, spec.mw_name, spec.size, spec.is_pointer));
        node.dimensions.push(DimensionRecord {
            orientation: spec.orientation,
            dim_array_index: node.dimension_array.len(),
            num_dims: spec.extents.len(),
        });

        let n_bytes = spec
            .bytes
            .len()
            .max(spec.size * spec.extents.iter().product::<usize>());
        let n_words = n_bytes.div_ceil(std::mem::size_of::<u64>()).max(1);
        let storage: Box<[Cell<u64>]> = (0..n_words).map(|_| Cell::new(0)).collect();
        // SAFETY: the storage was just allocated with at least `bytes.len()` bytes.
        unsafe {
            std::ptr::copy_nonoverlapping(
                spec.bytes.as_ptr(),
                storage.as_ptr() as *mut u8,
                spec.bytes.len(),
            );
        }
        node.dimension_array.extend(spec.extents);
        node.storage.push(storage);

        TableLocation {
            data_type_index: node.data_types.len() - 1,
            dimension_index: node.dimensions.len() - 1,
            address_index: node.storage.len() - 1,
        }
    }

    pub fn model_param(mut self, name: &str, spec: EntrySpec) -> Self {
        let location = self.add_entry(spec);
        self.node.model_params.push((name.to_string(), location));
        self
    }

    pub fn block_param(mut self, block_path: &str, param_name: &str, spec: EntrySpec) -> Self {
        let location = self.add_entry(spec);
        self.node
            .block_params
            .push((block_path.to_string(), param_name.to_string(), location));
        self
    }

    pub fn signal(
        mut self,
        block_path: Option<&str>,
        signal_name: Option<&str>,
        spec: EntrySpec,
    ) -> Self {
        let location = self.add_entry(spec);
        self.node.signals.push((
            block_path.map(str::to_string),
            signal_name.map(str::to_string),
            location,
        ));
        self
    }

    pub fn child(mut self, child: InMemoryMapping) -> Self {
        self.node.children.push(child);
        self
    }

    pub fn build(self) -> InMemoryMapping {
        InMemoryMapping(Rc::new(self.node))
    }
}

type StepHook = Box<dyn FnMut(&InMemoryMapping, u64)>;

/// A scripted execution contract over freshly built [`InMemoryMapping`] trees.
///
/// Every `initialize` builds a new tree from the factory, so addresses change across
/// resets the way they do for a generated model.
pub struct InMemoryModel {
    factory: Box<dyn Fn() -> InMemoryMapping>,
    root: Option<InMemoryMapping>,
    step_size: f64,
    final_time: Option<f64>,
    fail_at: Option<(u64, String)>,
    error_status: Option<String>,
    step_hook: Option<StepHook>,
    steps: u64,
    initializations: u64,
    terminations: u64,
}

impl fmt::Debug for InMemoryModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryModel")
            .field("root", &self.root)
            .field("step_size", &self.step_size)
            .field("final_time", &self.final_time)
            .field("error_status", &self.error_status)
            .field("steps", &self.steps)
            .field("initializations", &self.initializations)
            .field("terminations", &self.terminations)
            .finish()
    }
}

impl InMemoryModel {
    pub fn new(step_size: f64, factory: impl Fn() -> InMemoryMapping + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            root: None,
            step_size,
            final_time: None,
            fail_at: None,
            error_status: None,
            step_hook: None,
            steps: 0,
            initializations: 0,
            terminations: 0,
        }
    }

    /// Build the model with a configurable final time
    pub fn with_final_time(mut self, final_time: f64) -> Self {
        self.final_time = Some(final_time);
        self
    }

    /// Report `message` as the error status once `step` has been called `step` times
    /// since the last initialisation
    pub fn fail_at_step(mut self, step: u64, message: &str) -> Self {
        self.fail_at = Some((step, message.to_string()));
        self
    }

    /// Run `hook` with the root mapping and the step number after every step
    pub fn on_step(mut self, hook: impl FnMut(&InMemoryMapping, u64) + 'static) -> Self {
        self.step_hook = Some(Box::new(hook));
        self
    }

    /// Set the error status directly, as a model would from inside a step
    pub fn set_error_status(&mut self, message: Option<&str>) {
        self.error_status = message.map(str::to_string);
    }

    /// Steps taken since the last initialisation
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn initializations(&self) -> u64 {
        self.initializations
    }

    pub fn terminations(&self) -> u64 {
        self.terminations
    }

    pub fn is_initialized(&self) -> bool {
        self.root.is_some()
    }
}

impl ExecutionContract for InMemoryModel {
    type Mapping = InMemoryMapping;

    fn initialize(&mut self) {
        self.root = Some((self.factory)());
        self.error_status = None;
        self.steps = 0;
        self.initializations += 1;
    }

    fn step(&mut self) {
        self.steps += 1;
        if let Some((step, message)) = &self.fail_at {
            if *step == self.steps {
                self.error_status = Some(message.clone());
            }
        }
        if let (Some(hook), Some(root)) = (self.step_hook.as_mut(), self.root.as_ref()) {
            hook(root, self.steps);
        }
    }

    fn terminate(&mut self) {
        self.root = None;
        self.terminations += 1;
    }

    fn error_status(&self) -> Option<String> {
        self.error_status.clone()
    }

    fn root_mapping(&self) -> SimlinkResult<InMemoryMapping> {
        self.root
            .clone()
            .ok_or_else(|| SimlinkError::Execution("model has not been initialized".to_string()))
    }

    fn step_size(&self) -> f64 {
        self.step_size
    }

    fn supports_final_time(&self) -> bool {
        self.final_time.is_some()
    }

    fn final_time(&self) -> f64 {
        self.final_time.unwrap_or(f64::NAN)
    }

    fn set_final_time(&mut self, final_time: f64) {
        if self.final_time.is_some() {
            self.final_time = Some(final_time);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::describe;

    #[test]
    fn builder_lays_out_tables() {
        let mapping = InMemoryMapping::builder(Some("plant"))
            .model_param("k", EntrySpec::scalar(2.0f64))
            .block_param("plant/Gain", "Gain", EntrySpec::vector(&[1i16, 2, 3]))
            .signal(None, Some("y"), EntrySpec::scalar(0u32))
            .build();

        assert_eq!(mapping.path().unwrap(), "plant");
        assert_eq!(mapping.num_model_parameters(), 1);
        assert_eq!(mapping.num_block_parameters(), 1);
        assert_eq!(mapping.num_signals(), 1);

        let location = mapping.block_parameter(0).location;
        let entry = mapping.entry(location);
        assert_eq!(entry.data_type.c_name, "short");
        assert_eq!(entry.data_type.mw_name, "int16_T");
        assert_eq!(entry.dimensions.orientation, Orientation::Vector);
        assert_eq!(entry.dimensions.extents, vec![3, 1]);
        assert_eq!(entry.address as usize % 8, 0);

        let view = describe(&entry.data_type, &entry.dimensions, entry.address).unwrap();
        assert_eq!(unsafe { view.to_vec::<i16>() }.unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn clones_share_identity() {
        let a = InMemoryMapping::builder(None).build();
        let b = InMemoryMapping::builder(None).build();
        assert_eq!(a.id(), a.clone().id());
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn store_signal_updates_memory() {
        let mapping = InMemoryMapping::builder(None)
            .signal(Some("blk"), Some("y"), EntrySpec::vector(&[0.0f32, 0.0]))
            .build();
        assert!(mapping.store_signal(Some("blk"), Some("y"), &[1.5f32, 2.5]));
        assert!(!mapping.store_signal(Some("blk"), Some("z"), &[1.5f32]));
        assert!(!mapping.store_signal(None, Some("y"), &[0.0f64; 4]));

        let entry = mapping.entry(mapping.signal(0).location);
        let view = describe(&entry.data_type, &entry.dimensions, entry.address).unwrap();
        assert_eq!(unsafe { view.to_vec::<f32>() }.unwrap(), vec![1.5, 2.5]);
    }

    #[test]
    fn scripted_contract_lifecycle() {
        let mut model = InMemoryModel::new(0.01, || InMemoryMapping::builder(None).build())
            .fail_at_step(2, "boom");
        assert!(model.root_mapping().is_err());
        assert!(!model.supports_final_time());
        assert!(model.final_time().is_nan());

        model.initialize();
        let first = model.root_mapping().unwrap();
        model.step();
        assert_eq!(model.error_status(), None);
        model.step();
        assert_eq!(model.error_status().as_deref(), Some("boom"));
        model.terminate();
        assert!(!model.is_initialized());

        model.initialize();
        assert_eq!(model.steps(), 0);
        assert_eq!(model.error_status(), None);
        assert_ne!(model.root_mapping().unwrap().id(), first.id());
        assert_eq!(model.initializations(), 2);
        assert_eq!(model.terminations(), 1);
    }
}
