use crate::buffer::{self, BufferView, SourceArray};
use crate::datatype::{ScalarValue, Strictness};
use crate::errors::{SimlinkError, SimlinkResult};
use crate::hierarchy::{discover, discover_checked, PathTable};
use crate::info::{DataTypeInfo, ModelInfo};
use crate::mapping::{ExecutionContract, ModelMapping, TableLocation};
use crate::resolver::{
    require_name, resolve_block_parameter, resolve_model_parameter, resolve_signal, LookupCache,
};
use log::{debug, error};
use std::fmt;

use super::config::{SessionConfig, Traversal};

/// Lifecycle state of a [`ModelSession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Constructed, `reset` has not been called yet
    Uninitialized,
    /// Initialised and idle
    Ready,
    /// Inside `step`.
    ///
    /// A session is left in this state when a step fails and needs a reset.
    Stepping,
    /// Terminated; `reset` re-initialises the model
    Terminated,
}

impl SessionState {
    /// Whether the execution contract is currently initialised
    pub fn is_initialized(&self) -> bool {
        matches!(self, SessionState::Ready | SessionState::Stepping)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Uninitialized => f.write_str("uninitialized"),
            SessionState::Ready => f.write_str("ready"),
            SessionState::Stepping => f.write_str("stepping"),
            SessionState::Terminated => f.write_str("terminated"),
        }
    }
}

fn find_model<'a, M: ModelMapping>(
    models: &'a PathTable<M>,
    model: &str,
    root_name: &str,
) -> SimlinkResult<&'a M> {
    models
        .get(model)
        .ok_or_else(|| SimlinkError::not_found("Model", model, root_name))
}

/// A generated model together with its discovered hierarchy and lookup caches.
///
/// The session drives the execution contract through its lifecycle and resolves named
/// parameters and signals of any model instance in the hierarchy to views over their
/// live memory.
///
/// Nothing is available until [`ModelSession::reset`] has been called.
/// Views returned by the session point into model memory and must not be used after
/// the next reset or terminate.
pub struct ModelSession<C: ExecutionContract> {
    config: SessionConfig,
    contract: C,
    state: SessionState,
    /// Every known model instance, the root registered under the configured model name
    models: PathTable<C::Mapping>,
    cache: LookupCache,
    /// Incremented before and decremented after every step; must be zero between steps
    overrun_counter: u32,
}

impl<C: ExecutionContract> fmt::Debug for ModelSession<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSession")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("models", &self.models.paths().collect::<Vec<_>>())
            .field("cached_lookups", &self.cache.len())
            .field("overrun_counter", &self.overrun_counter)
            .finish()
    }
}

impl<C: ExecutionContract> ModelSession<C> {
    pub fn new(contract: C, config: SessionConfig) -> SimlinkResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            contract,
            state: SessionState::Uninitialized,
            models: PathTable::new(),
            cache: LookupCache::new(),
            overrun_counter: 0,
        })
    }

    /// Create a session with the default configuration and the given root model name
    pub fn with_model_name(contract: C, model_name: &str) -> SimlinkResult<Self> {
        Self::new(contract, SessionConfig::new(model_name))
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_initialized()
    }

    pub fn contract(&self) -> &C {
        &self.contract
    }

    pub fn contract_mut(&mut self) -> &mut C {
        &mut self.contract
    }

    /// Number of lookups currently cached across all kinds
    pub fn cached_lookups(&self) -> usize {
        self.cache.len()
    }

    fn require_initialized(&self, operation: &'static str) -> SimlinkResult<()> {
        if !self.state.is_initialized() {
            return Err(SimlinkError::NotReady {
                operation,
                state: self.state.to_string(),
            });
        }
        Ok(())
    }

    /// (Re-)initialise the model and rediscover its hierarchy.
    ///
    /// Terminates the model first if it is running.
    /// Every lookup cache is dropped, as the tables may differ between runs.
    pub fn reset(&mut self) -> SimlinkResult<()> {
        if self.state.is_initialized() {
            debug!("Terminating model before re-initialising");
            self.contract.terminate();
            self.state = SessionState::Terminated;
        }
        self.cache.clear();
        self.models.clear();
        self.overrun_counter = 0;

        self.contract.initialize();
        let root = match self.contract.root_mapping() {
            Ok(root) => root,
            Err(e) => {
                self.contract.terminate();
                self.state = SessionState::Terminated;
                return Err(e);
            }
        };

        self.models.insert(self.config.model_name.clone(), root.clone());
        match self.config.traversal {
            Traversal::Recursive => discover(&root, &mut self.models),
            Traversal::Checked => discover_checked(&root, &mut self.models),
        }
        debug!(
            "Model '{}' initialised with {} model instance(s)",
            self.config.model_name,
            self.models.len()
        );

        self.state = SessionState::Ready;
        Ok(())
    }

    /// Advance the model by `count` base-rate steps.
    ///
    /// Fails without touching the model if `count` is not positive.
    /// A step that starts while the previous one never completed is a scheduling
    /// overrun.
    /// The error status of the model is checked before and after every step.
    pub fn step(&mut self, count: i64) -> SimlinkResult<()> {
        if count <= 0 {
            return Err(SimlinkError::InvalidArgument(format!(
                "number of steps must be a positive number (got {})",
                count
            )));
        }
        self.require_initialized("step")?;

        self.state = SessionState::Stepping;
        for _ in 0..count {
            if self.overrun_counter != 0 {
                error!(
                    "Step started before the previous step completed (overrun counter {})",
                    self.overrun_counter
                );
                return Err(SimlinkError::SchedulingOverrun(
                    "a step started before the previous step completed".to_string(),
                ));
            }
            self.overrun_counter += 1;

            if let Some(status) = self.contract.error_status() {
                error!("Model is in errored state: {}", status);
                return Err(SimlinkError::Execution(status));
            }
            self.contract.step();
            self.overrun_counter -= 1;

            if let Some(status) = self.contract.error_status() {
                error!("Model reported an error while stepping: {}", status);
                return Err(SimlinkError::Execution(status));
            }
        }
        self.state = SessionState::Ready;
        Ok(())
    }

    /// Terminate the model.
    ///
    /// Does nothing if the model is not initialised.
    pub fn terminate(&mut self) {
        if self.state.is_initialized() {
            self.contract.terminate();
            self.state = SessionState::Terminated;
        }
        self.cache.clear();
        self.models.clear();
        self.overrun_counter = 0;
    }

    /// Fixed base step size in seconds
    pub fn step_size(&self) -> SimlinkResult<f64> {
        self.require_initialized("step_size")?;
        Ok(self.contract.step_size())
    }

    fn require_final_time(&self, operation: &'static str) -> SimlinkResult<()> {
        self.require_initialized(operation)?;
        if !self.contract.supports_final_time() {
            return Err(SimlinkError::Unsupported(
                "this model was not built with a configurable final time".to_string(),
            ));
        }
        Ok(())
    }

    pub fn final_time(&self) -> SimlinkResult<f64> {
        self.require_final_time("final_time")?;
        Ok(self.contract.final_time())
    }

    /// Set the final simulation time; it must be positive and finite
    pub fn set_final_time(&mut self, final_time: f64) -> SimlinkResult<()> {
        if !(final_time.is_finite() && final_time > 0.0) {
            return Err(SimlinkError::InvalidArgument(format!(
                "final time must be a positive number (got {})",
                final_time
            )));
        }
        self.require_final_time("set_final_time")?;
        self.contract.set_final_time(final_time);
        Ok(())
    }

    /// Paths of every known model instance, root first
    pub fn models(&self) -> SimlinkResult<Vec<String>> {
        self.require_initialized("models")?;
        Ok(self.models.paths().map(str::to_string).collect())
    }

    fn model_param_location(
        &mut self,
        model: &str,
        param: &str,
    ) -> SimlinkResult<TableLocation> {
        require_name(model, "model name")?;
        require_name(param, "parameter name")?;
        let mapping = find_model(&self.models, model, &self.config.model_name)?;
        let index = resolve_model_parameter(mapping, &mut self.cache, param)?;
        Ok(mapping.model_parameter(index).location)
    }

    fn block_param_location(
        &mut self,
        model: &str,
        block_path: &str,
        param: &str,
    ) -> SimlinkResult<TableLocation> {
        require_name(model, "model name")?;
        require_name(block_path, "block path")?;
        require_name(param, "parameter name")?;
        let mapping = find_model(&self.models, model, &self.config.model_name)?;
        let index = resolve_block_parameter(mapping, &mut self.cache, block_path, param)?;
        Ok(mapping.block_parameter(index).location)
    }

    fn signal_location(
        &mut self,
        model: &str,
        block_path: Option<&str>,
        signal_name: Option<&str>,
    ) -> SimlinkResult<TableLocation> {
        require_name(model, "model name")?;
        if block_path.is_none() && signal_name.is_none() {
            return Err(SimlinkError::InvalidArgument(
                "Must specify signal name or origin block to search for signal".to_string(),
            ));
        }
        if let Some(block_path) = block_path {
            require_name(block_path, "block path")?;
        }
        if let Some(signal_name) = signal_name {
            require_name(signal_name, "signal name")?;
        }
        let mapping = find_model(&self.models, model, &self.config.model_name)?;
        let index = resolve_signal(mapping, &mut self.cache, block_path, signal_name)?;
        Ok(mapping.signal(index).location)
    }

    fn view(&self, model: &str, location: TableLocation) -> SimlinkResult<BufferView> {
        let mapping = find_model(&self.models, model, &self.config.model_name)?;
        let entry = mapping.entry(location);
        buffer::describe(&entry.data_type, &entry.dimensions, entry.address)
    }

    fn store(
        &self,
        model: &str,
        location: TableLocation,
        source: &SourceArray<'_>,
    ) -> SimlinkResult<()> {
        let mapping = find_model(&self.models, model, &self.config.model_name)?;
        let entry = mapping.entry(location);
        // SAFETY: the address comes from the address table of an initialised model
        unsafe { buffer::write(&entry.data_type, &entry.dimensions, entry.address, source) }
    }

    fn describe_location(
        &self,
        model: &str,
        location: TableLocation,
    ) -> SimlinkResult<DataTypeInfo> {
        let mapping = find_model(&self.models, model, &self.config.model_name)?;
        DataTypeInfo::from_location(mapping, location, Strictness::Strict)
    }

    fn load_scalar(&self, model: &str, location: TableLocation) -> SimlinkResult<ScalarValue> {
        let mapping = find_model(&self.models, model, &self.config.model_name)?;
        let entry = mapping.entry(location);
        // SAFETY: the address comes from the address table of an initialised model
        unsafe { buffer::read_scalar(&entry.data_type, &entry.dimensions, entry.address) }
    }

    fn store_scalar(
        &self,
        model: &str,
        location: TableLocation,
        value: ScalarValue,
    ) -> SimlinkResult<()> {
        let mapping = find_model(&self.models, model, &self.config.model_name)?;
        let entry = mapping.entry(location);
        // SAFETY: the address comes from the address table of an initialised model
        unsafe { buffer::write_scalar(&entry.data_type, &entry.dimensions, entry.address, value) }
    }

    /// View of a signal, found by its source block, its name, or both
    pub fn signal(
        &mut self,
        model: &str,
        block_path: Option<&str>,
        signal_name: Option<&str>,
    ) -> SimlinkResult<BufferView> {
        self.require_initialized("signal")?;
        let location = self.signal_location(model, block_path, signal_name)?;
        self.view(model, location)
    }

    pub fn block_param(
        &mut self,
        model: &str,
        block_path: &str,
        param: &str,
    ) -> SimlinkResult<BufferView> {
        self.require_initialized("block_param")?;
        let location = self.block_param_location(model, block_path, param)?;
        self.view(model, location)
    }

    pub fn model_param(&mut self, model: &str, param: &str) -> SimlinkResult<BufferView> {
        self.require_initialized("model_param")?;
        let location = self.model_param_location(model, param)?;
        self.view(model, location)
    }

    /// Copy `source` into a block parameter.
    ///
    /// The source must match the declared element type and shape exactly.
    pub fn set_block_param(
        &mut self,
        model: &str,
        block_path: &str,
        param: &str,
        source: &SourceArray<'_>,
    ) -> SimlinkResult<()> {
        self.require_initialized("set_block_param")?;
        let location = self.block_param_location(model, block_path, param)?;
        self.store(model, location, source)
    }

    /// Copy `source` into a model parameter.
    ///
    /// The source must match the declared element type and shape exactly.
    pub fn set_model_param(
        &mut self,
        model: &str,
        param: &str,
        source: &SourceArray<'_>,
    ) -> SimlinkResult<()> {
        self.require_initialized("set_model_param")?;
        let location = self.model_param_location(model, param)?;
        self.store(model, location, source)
    }

    pub fn describe_signal(
        &mut self,
        model: &str,
        block_path: Option<&str>,
        signal_name: Option<&str>,
    ) -> SimlinkResult<DataTypeInfo> {
        self.require_initialized("describe_signal")?;
        let location = self.signal_location(model, block_path, signal_name)?;
        self.describe_location(model, location)
    }

    pub fn describe_block_param(
        &mut self,
        model: &str,
        block_path: &str,
        param: &str,
    ) -> SimlinkResult<DataTypeInfo> {
        self.require_initialized("describe_block_param")?;
        let location = self.block_param_location(model, block_path, param)?;
        self.describe_location(model, location)
    }

    pub fn describe_model_param(
        &mut self,
        model: &str,
        param: &str,
    ) -> SimlinkResult<DataTypeInfo> {
        self.require_initialized("describe_model_param")?;
        let location = self.model_param_location(model, param)?;
        self.describe_location(model, location)
    }

    /// Current value of a scalar model parameter
    pub fn model_param_value(
        &mut self,
        model: &str,
        param: &str,
    ) -> SimlinkResult<ScalarValue> {
        self.require_initialized("model_param_value")?;
        let location = self.model_param_location(model, param)?;
        self.load_scalar(model, location)
    }

    /// Current value of a scalar block parameter
    pub fn block_param_value(
        &mut self,
        model: &str,
        block_path: &str,
        param: &str,
    ) -> SimlinkResult<ScalarValue> {
        self.require_initialized("block_param_value")?;
        let location = self.block_param_location(model, block_path, param)?;
        self.load_scalar(model, location)
    }

    /// Overwrite a scalar model parameter with a value of the same element type
    pub fn set_model_param_value(
        &mut self,
        model: &str,
        param: &str,
        value: ScalarValue,
    ) -> SimlinkResult<()> {
        self.require_initialized("set_model_param_value")?;
        let location = self.model_param_location(model, param)?;
        self.store_scalar(model, location, value)
    }

    /// Overwrite a scalar block parameter with a value of the same element type
    pub fn set_block_param_value(
        &mut self,
        model: &str,
        block_path: &str,
        param: &str,
        value: ScalarValue,
    ) -> SimlinkResult<()> {
        self.require_initialized("set_block_param_value")?;
        let location = self.block_param_location(model, block_path, param)?;
        self.store_scalar(model, location, value)
    }

    /// Snapshot the parameters and signals of every known model instance
    pub fn params(&self) -> SimlinkResult<Vec<ModelInfo>> {
        self.require_initialized("params")?;
        self.models
            .iter()
            .map(|(path, mapping)| ModelInfo::collect(path, mapping))
            .collect()
    }

    /// Human readable listing of [`ModelSession::params`]
    pub fn params_report(&self) -> SimlinkResult<String> {
        Ok(self
            .params()?
            .iter()
            .map(|info| info.to_string())
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

impl<C: ExecutionContract> Drop for ModelSession<C> {
    fn drop(&mut self) {
        if self.state.is_initialized() {
            self.contract.terminate();
        }
    }
}
