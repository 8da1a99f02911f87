//! Owned snapshots of model metadata for diagnostics
//!
//! Snapshots copy every name they contain, so they stay valid after the model they
//! were taken from is reset or terminated.

use crate::datatype::{abstract_type_name, Strictness};
use crate::errors::SimlinkResult;
use crate::mapping::{Entry, ModelMapping, Orientation, TableLocation};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Name reported for names the generated tables leave null
pub const NULL_NAME: &str = "Null";

/// Declared type and layout of a single entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataTypeInfo {
    /// Native (C) type name
    pub c_type: String,
    /// Abstract element type, or `"void"` for types outside of the type table
    pub abstract_type: String,
    /// Modelling-tool type name
    pub mw_type: String,
    pub dims: Vec<usize>,
    pub orientation: Orientation,
}

impl DataTypeInfo {
    /// Snapshot the type of the row at `location`.
    ///
    /// With [`Strictness::Strict`] native types outside of the type table are an error.
    pub fn from_location<M: ModelMapping>(
        mapping: &M,
        location: TableLocation,
        strictness: Strictness,
    ) -> SimlinkResult<Self> {
        let entry = mapping.entry(location);
        let abstract_type = abstract_type_name(&entry.data_type.c_name, strictness)?;
        Ok(Self::from_entry(entry, abstract_type))
    }

    fn from_entry(entry: Entry<'_>, abstract_type: &str) -> Self {
        Self {
            c_type: entry.data_type.c_name.into_owned(),
            abstract_type: abstract_type.to_string(),
            mw_type: entry.data_type.mw_name.into_owned(),
            dims: entry.dimensions.extents,
            orientation: entry.dimensions.orientation,
        }
    }
}

impl fmt::Display for DataTypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) dims: {:?} order: {}",
            self.abstract_type, self.c_type, self.dims, self.orientation
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParamInfo {
    pub name: String,
    pub data_type: DataTypeInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockParamInfo {
    pub block_path: String,
    pub param_name: String,
    pub data_type: DataTypeInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalInfo {
    pub block_path: String,
    pub signal_name: String,
    pub data_type: DataTypeInfo,
}

/// Every parameter and signal of one model instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_name: String,
    pub model_params: Vec<ModelParamInfo>,
    pub block_params: Vec<BlockParamInfo>,
    pub signals: Vec<SignalInfo>,
}

fn or_null(name: Option<Cow<'_, str>>) -> String {
    name.map(|n| n.into_owned())
        .unwrap_or_else(|| NULL_NAME.to_string())
}

impl ModelInfo {
    /// Snapshot all tables of `mapping`.
    ///
    /// Types outside of the type table are reported as opaque rather than failing.
    pub fn collect<M: ModelMapping>(model_name: &str, mapping: &M) -> SimlinkResult<Self> {
        let data_type = |location| {
            DataTypeInfo::from_location(mapping, location, Strictness::Permissive)
        };

        let model_params = (0..mapping.num_model_parameters())
            .map(|i| {
                let record = mapping.model_parameter(i);
                Ok(ModelParamInfo {
                    data_type: data_type(record.location)?,
                    name: record.name.into_owned(),
                })
            })
            .collect::<SimlinkResult<Vec<_>>>()?;

        let block_params = (0..mapping.num_block_parameters())
            .map(|i| {
                let record = mapping.block_parameter(i);
                Ok(BlockParamInfo {
                    data_type: data_type(record.location)?,
                    block_path: record.block_path.into_owned(),
                    param_name: record.param_name.into_owned(),
                })
            })
            .collect::<SimlinkResult<Vec<_>>>()?;

        let signals = (0..mapping.num_signals())
            .map(|i| {
                let record = mapping.signal(i);
                Ok(SignalInfo {
                    data_type: data_type(record.location)?,
                    block_path: or_null(record.block_path),
                    signal_name: or_null(record.signal_name),
                })
            })
            .collect::<SimlinkResult<Vec<_>>>()?;

        Ok(Self {
            model_name: model_name.to_string(),
            model_params,
            block_params,
            signals,
        })
    }
}

impl fmt::Display for ModelInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Parameters for model at '{}'", self.model_name)?;
        writeln!(f, "  model parameters:")?;
        for param in &self.model_params {
            writeln!(
                f,
                "    param: '{}' | data_type: '{}'",
                param.name, param.data_type
            )?;
        }
        writeln!(f, "  block parameters:")?;
        for param in &self.block_params {
            writeln!(
                f,
                "    Block: '{}' | Parameter: '{}' | data_type: '{}'",
                param.block_path, param.param_name, param.data_type
            )?;
        }
        writeln!(f, "  signals:")?;
        for signal in &self.signals {
            writeln!(
                f,
                "    Block: '{}' | Signal Name: '{}' | data_type: '{}'",
                signal.block_path, signal.signal_name, signal.data_type
            )?;
        }
        write!(f, "{}", "-".repeat(80))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory::{EntrySpec, InMemoryMapping};

    fn mapping() -> InMemoryMapping {
        InMemoryMapping::builder(None)
            .model_param("Kp", EntrySpec::scalar(1.0f64))
            .block_param(
                "ctrl/Lookup",
                "Table",
                EntrySpec::matrix(Orientation::MatrixColMajor, &[2, 2], &[1.0f32, 2.0, 3.0, 4.0]),
            )
            .signal(Some("ctrl/Bus"), None, EntrySpec::opaque("struct_T", 16, &[1, 1]))
            .build()
    }

    #[test]
    fn data_type_rendering() {
        let mapping = mapping();
        let info = DataTypeInfo::from_location(
            &mapping,
            mapping.block_parameter(0).location,
            Strictness::Strict,
        )
        .unwrap();
        assert_eq!(info.abstract_type, "float32");
        assert_eq!(info.mw_type, "real32_T");
        assert_eq!(
            info.to_string(),
            "float32 (float) dims: [2, 2] order: matrix_col_major"
        );
    }

    #[test]
    fn strict_rejects_opaque_types() {
        let mapping = mapping();
        let location = mapping.signal(0).location;
        assert!(DataTypeInfo::from_location(&mapping, location, Strictness::Strict).is_err());
        let info =
            DataTypeInfo::from_location(&mapping, location, Strictness::Permissive).unwrap();
        assert_eq!(info.abstract_type, "void");
    }

    #[test]
    fn collect_snapshots_every_table() {
        let info = ModelInfo::collect("ctrl", &mapping()).unwrap();

        assert_eq!(info.model_name, "ctrl");
        assert_eq!(info.model_params.len(), 1);
        assert_eq!(info.block_params[0].param_name, "Table");
        assert_eq!(info.signals[0].signal_name, NULL_NAME);
        assert_eq!(info.signals[0].data_type.abstract_type, "void");

        let report = info.to_string();
        assert!(report.starts_with("Parameters for model at 'ctrl'"));
        assert!(report.contains("param: 'Kp' | data_type: 'float64 (double) dims: [1, 1] order: scalar'"));
        assert!(report.contains("Signal Name: 'Null'"));
    }

    #[test]
    fn snapshot_serialises() {
        let info = ModelInfo::collect("ctrl", &mapping()).unwrap();
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["model_params"][0]["name"], "Kp");
        assert_eq!(json["block_params"][0]["data_type"]["orientation"], "matrix_col_major");
    }
}
