use thiserror::Error;

/// Error type for every fallible operation on a model session.
///
/// All errors are raised synchronously to the immediate caller and are never retried
/// internally.
/// After a [`SimlinkError::SchedulingOverrun`] or [`SimlinkError::Execution`] the session
/// must be reset before it is used again.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimlinkError {
    /// A required identifier was missing or empty, or an argument was out of range.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// A model, parameter, block parameter or signal is absent from the current tables.
    #[error("{kind} ({name}) does not exist in model '{model}'")]
    NotFound {
        kind: &'static str,
        name: String,
        model: String,
    },
    /// The entry exists but cannot be used by the requested operation.
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),
    #[error("Unsupported: {0}")]
    Unsupported(String),
    /// A native type name is not part of the known type table.
    #[error("Unknown native datatype '{0}'. Can only handle [char, unsigned char, short, unsigned short, int, unsigned int, float, double]")]
    Datatype(String),
    #[error("Scheduling overrun: {0}")]
    SchedulingOverrun(String),
    /// The execution contract reported a non-null error status.
    #[error("Model is in errored state: {0}")]
    Execution(String),
    #[error("Cannot call `{operation}` while the model is {state}. Call `reset()` first!")]
    NotReady {
        operation: &'static str,
        state: String,
    },
}

impl SimlinkError {
    pub(crate) fn not_found(kind: &'static str, name: impl Into<String>, model: &str) -> Self {
        SimlinkError::NotFound {
            kind,
            name: name.into(),
            model: model.to_string(),
        }
    }
}

/// Convenience type for `Result<T, SimlinkError>`.
pub type SimlinkResult<T> = Result<T, SimlinkError>;
