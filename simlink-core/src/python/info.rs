use crate::info::DataTypeInfo;
use pyo3::prelude::*;

/// Declared type and layout of a model entry
#[pyclass(frozen)]
#[pyo3(name = "DataType")]
#[derive(Debug, Clone)]
pub struct PyDataType(pub DataTypeInfo);

#[pymethods]
impl PyDataType {
    /// Native (C) type name
    #[getter]
    fn c_type(&self) -> &str {
        &self.0.c_type
    }

    /// Abstract element type such as `"float64"`, or `"void"`
    #[getter]
    fn abstract_type(&self) -> &str {
        &self.0.abstract_type
    }

    #[getter]
    fn mw_type(&self) -> &str {
        &self.0.mw_type
    }

    #[getter]
    fn dims(&self) -> Vec<usize> {
        self.0.dims.clone()
    }

    #[getter]
    fn orientation(&self) -> String {
        self.0.orientation.to_string()
    }

    fn __repr__(&self) -> String {
        format!("<DataType {}>", self.0)
    }

    fn __str__(&self) -> String {
        self.0.to_string()
    }
}
