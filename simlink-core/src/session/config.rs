use crate::errors::{SimlinkError, SimlinkResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Name the root model is registered under unless configured otherwise
pub const DEFAULT_MODEL_NAME: &str = "root";

/// How sub-model instances are discovered on reset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Traversal {
    /// Depth-first recursion that trusts the mapping graph to be a tree
    #[default]
    Recursive,
    /// Explicit stack with visited tracking, for mapping graphs that may share nodes
    Checked,
}

impl FromStr for Traversal {
    type Err = SimlinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "recursive" => Ok(Traversal::Recursive),
            "checked" => Ok(Traversal::Checked),
            other => Err(SimlinkError::InvalidArgument(format!(
                "traversal must be 'recursive' or 'checked' (got '{}')",
                other
            ))),
        }
    }
}

/// Options for a [`crate::session::ModelSession`]
///
/// ```toml
/// model_name = "controller"
/// traversal = "checked"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Name the root model is registered under in the path table
    pub model_name: String,
    pub traversal: Traversal,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL_NAME.to_string(),
            traversal: Traversal::default(),
        }
    }
}

impl SessionConfig {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            ..Self::default()
        }
    }

    pub fn with_traversal(mut self, traversal: Traversal) -> Self {
        self.traversal = traversal;
        self
    }

    /// Parse a configuration from TOML.
    ///
    /// Missing keys take their default values.
    pub fn from_toml_str(source: &str) -> SimlinkResult<Self> {
        let config: Self = toml::from_str(source).map_err(|e| {
            SimlinkError::InvalidArgument(format!("Invalid session configuration: {}", e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> SimlinkResult<String> {
        toml::to_string(self).map_err(|e| {
            SimlinkError::InvalidArgument(format!("Cannot serialise session configuration: {}", e))
        })
    }

    pub fn validate(&self) -> SimlinkResult<()> {
        if self.model_name.is_empty() {
            return Err(SimlinkError::InvalidArgument(
                "model_name must be a non-empty string".to_string(),
            ));
        }
        Ok(())
    }
}
