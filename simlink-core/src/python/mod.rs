//! Python bindings
//!
//! Exposes a [`ModelSession`](crate::session::ModelSession) over a generated model's
//! C entry points as `simlink._lib.core.Model`.

use crate::errors::SimlinkError;
use pyo3::exceptions::{
    PyKeyError, PyNotImplementedError, PyRuntimeError, PyTypeError, PyValueError,
};
use pyo3::prelude::*;

mod buffer;
mod info;
mod session;

pub use info::PyDataType;
pub use session::PyModel;

impl From<SimlinkError> for PyErr {
    fn from(err: SimlinkError) -> PyErr {
        let message = err.to_string();
        match err {
            SimlinkError::InvalidArgument(_) => PyValueError::new_err(message),
            SimlinkError::NotFound { .. } => PyKeyError::new_err(message),
            SimlinkError::TypeMismatch(_) | SimlinkError::Datatype(_) => {
                PyTypeError::new_err(message)
            }
            SimlinkError::Unsupported(_) => PyNotImplementedError::new_err(message),
            SimlinkError::SchedulingOverrun(_)
            | SimlinkError::Execution(_)
            | SimlinkError::NotReady { .. } => PyRuntimeError::new_err(message),
        }
    }
}

#[pymodule]
pub fn core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyModel>()?;
    m.add_class::<PyDataType>()?;
    Ok(())
}
