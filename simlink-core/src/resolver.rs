//! Name to table-row resolution with per-kind caches
//!
//! Looking a name up in a mapping is a linear scan over the generated tables.
//! Simulation loops tend to read the same handful of signals on every step, so the
//! first successful lookup of every key is cached.
//! Keys include the identity of the owning mapping: two sub-models can declare a
//! parameter with the same name and those must never share a cache entry.
//!
//! Caches are only ever cleared wholesale, when the model is reset.

use crate::errors::{SimlinkError, SimlinkResult};
use crate::mapping::{MappingId, ModelMapping};
use log::{debug, warn};
use std::collections::HashMap;

/// Cache key for model parameters
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParamKey {
    pub name: String,
    pub mapping: MappingId,
}

/// Cache key for rows identified by a block path and a name.
///
/// Block parameters always carry both names; signals may be looked up by either one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockKey {
    pub block_path: Option<String>,
    pub name: Option<String>,
    pub mapping: MappingId,
}

/// Resolved row indices for the three kinds of named entries
#[derive(Debug, Default, Clone)]
pub struct LookupCache {
    model_params: HashMap<ParamKey, usize>,
    block_params: HashMap<BlockKey, usize>,
    signals: HashMap<BlockKey, usize>,
}

impl LookupCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.model_params.clear();
        self.block_params.clear();
        self.signals.clear();
    }

    /// Total number of cached lookups across all kinds
    pub fn len(&self) -> usize {
        self.model_params.len() + self.block_params.len() + self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn model_param(&self, key: &ParamKey) -> Option<usize> {
        self.model_params.get(key).copied()
    }

    pub fn block_param(&self, key: &BlockKey) -> Option<usize> {
        self.block_params.get(key).copied()
    }

    pub fn signal(&self, key: &BlockKey) -> Option<usize> {
        self.signals.get(key).copied()
    }
}

/// Fail with `InvalidArgument` if a required name is empty
pub(crate) fn require_name(value: &str, what: &str) -> SimlinkResult<()> {
    if value.is_empty() {
        return Err(SimlinkError::InvalidArgument(format!(
            "{} must be a non-empty string",
            what
        )));
    }
    Ok(())
}

fn display_path<M: ModelMapping>(mapping: &M) -> String {
    mapping
        .path()
        .map(|p| p.into_owned())
        .unwrap_or_else(|| "root".to_string())
}

/// Find the row index of the model parameter `name`
pub fn resolve_model_parameter<M: ModelMapping>(
    mapping: &M,
    cache: &mut LookupCache,
    name: &str,
) -> SimlinkResult<usize> {
    require_name(name, "parameter name")?;

    let key = ParamKey {
        name: name.to_string(),
        mapping: mapping.id(),
    };
    if let Some(index) = cache.model_param(&key) {
        return Ok(index);
    }

    let index = (0..mapping.num_model_parameters())
        .find(|&i| mapping.model_parameter(i).name == name)
        .ok_or_else(|| SimlinkError::not_found("Model parameter", name, &display_path(mapping)))?;

    debug!("Cached model parameter {} at index {}", name, index);
    cache.model_params.insert(key, index);
    Ok(index)
}

/// Find the row index of the parameter `param` of block `block_path`
pub fn resolve_block_parameter<M: ModelMapping>(
    mapping: &M,
    cache: &mut LookupCache,
    block_path: &str,
    param: &str,
) -> SimlinkResult<usize> {
    require_name(block_path, "block path")?;
    require_name(param, "parameter name")?;

    let key = BlockKey {
        block_path: Some(block_path.to_string()),
        name: Some(param.to_string()),
        mapping: mapping.id(),
    };
    if let Some(index) = cache.block_param(&key) {
        return Ok(index);
    }

    let index = (0..mapping.num_block_parameters())
        .find(|&i| {
            let record = mapping.block_parameter(i);
            record.block_path == block_path && record.param_name == param
        })
        .ok_or_else(|| {
            SimlinkError::not_found(
                "Block parameter",
                format!("{},{}", block_path, param),
                &display_path(mapping),
            )
        })?;

    debug!(
        "Cached block parameter {}/{} at index {}",
        block_path, param, index
    );
    cache.block_params.insert(key, index);
    Ok(index)
}

/// Find the row index of a signal by its source block, its name, or both.
///
/// At least one of the two must be given.
/// When only one is given the first row in table order that matches it wins; signal
/// names are not guaranteed to be unique, so name-only lookups may be ambiguous.
pub fn resolve_signal<M: ModelMapping>(
    mapping: &M,
    cache: &mut LookupCache,
    block_path: Option<&str>,
    signal_name: Option<&str>,
) -> SimlinkResult<usize> {
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

    let key = BlockKey {
        block_path: block_path.map(str::to_string),
        name: signal_name.map(str::to_string),
        mapping: mapping.id(),
    };
    if let Some(index) = cache.signal(&key) {
        return Ok(index);
    }

    let matches = |i: usize| {
        let record = mapping.signal(i);
        let block_matches = match block_path {
            Some(wanted) => record.block_path.as_deref() == Some(wanted),
            None => true,
        };
        let name_matches = match signal_name {
            Some(wanted) => record.signal_name.as_deref() == Some(wanted),
            None => true,
        };
        block_matches && name_matches
    };

    let num_signals = mapping.num_signals();
    let index = (0..num_signals).find(|&i| matches(i)).ok_or_else(|| {
        SimlinkError::not_found(
            "Signal",
            format!("{},{}", block_path.unwrap_or(""), signal_name.unwrap_or("")),
            &display_path(mapping),
        )
    })?;

    if block_path.is_none() && ((index + 1)..num_signals).any(matches) {
        warn!(
            "Signal name '{}' is not unique in model '{}'; using the first match (index {})",
            signal_name.unwrap_or(""),
            display_path(mapping),
            index
        );
    }

    debug!(
        "Cached signal {:?}/{:?} at index {}",
        block_path, signal_name, index
    );
    cache.signals.insert(key, index);
    Ok(index)
}
