use super::buffer::{view_to_numpy, HostArray};
use super::info::PyDataType;
use crate::capi::{ModelEntryPoints, RawModel};
use crate::session::{ModelSession, SessionConfig, Traversal};
use pyo3::prelude::*;

/// A generated model loaded in the current process
///
/// The model is driven through the entry-point table at `entry_points`, the address
/// of a `ModelEntryPoints` struct exported by the model library.
/// Arrays returned by the getters borrow model memory directly and are read-only;
/// they are only meaningful until the next `reset()` or `terminate()`.
#[pyclass(unsendable)]
#[pyo3(name = "Model")]
pub struct PyModel {
    session: ModelSession<RawModel>,
}

#[pymethods]
impl PyModel {
    #[new]
    #[pyo3(signature = (model_name, entry_points, traversal=None))]
    fn new(model_name: &str, entry_points: usize, traversal: Option<&str>) -> PyResult<Self> {
        let mut config = SessionConfig::new(model_name);
        if let Some(traversal) = traversal {
            config = config.with_traversal(traversal.parse::<Traversal>()?);
        }
        // SAFETY: the caller hands over the address of an entry-point table exported
        // by a loaded model library, which outlives this object.
        let contract =
            unsafe { RawModel::from_entry_points(entry_points as *const ModelEntryPoints) }?;
        Ok(Self {
            session: ModelSession::new(contract, config)?,
        })
    }

    /// (Re-)initialise the model and rediscover its referenced models
    fn reset(&mut self) -> PyResult<()> {
        Ok(self.session.reset()?)
    }

    #[pyo3(signature = (count=1))]
    fn step(&mut self, count: i64) -> PyResult<()> {
        Ok(self.session.step(count)?)
    }

    fn terminate(&mut self) {
        self.session.terminate()
    }

    #[getter]
    fn state(&self) -> String {
        self.session.state().to_string()
    }

    fn step_size(&self) -> PyResult<f64> {
        Ok(self.session.step_size()?)
    }

    fn final_time(&self) -> PyResult<f64> {
        Ok(self.session.final_time()?)
    }

    fn set_final_time(&mut self, final_time: f64) -> PyResult<()> {
        Ok(self.session.set_final_time(final_time)?)
    }

    fn get_models(&self) -> PyResult<Vec<String>> {
        Ok(self.session.models()?)
    }

    #[pyo3(signature = (model_name, block_path=None, signal_name=None))]
    fn get_signal<'py>(
        slf: Bound<'py, Self>,
        model_name: &str,
        block_path: Option<&str>,
        signal_name: Option<&str>,
    ) -> PyResult<Bound<'py, PyAny>> {
        let view = slf
            .borrow_mut()
            .session
            .signal(model_name, block_path, signal_name)?;
        // SAFETY: the array keeps the model alive and the session just resolved the view.
        unsafe { view_to_numpy(&view, slf.into_any()) }
    }

    fn get_block_param<'py>(
        slf: Bound<'py, Self>,
        model_name: &str,
        block_path: &str,
        param: &str,
    ) -> PyResult<Bound<'py, PyAny>> {
        let view = slf
            .borrow_mut()
            .session
            .block_param(model_name, block_path, param)?;
        // SAFETY: as in `get_signal`
        unsafe { view_to_numpy(&view, slf.into_any()) }
    }

    fn get_model_param<'py>(
        slf: Bound<'py, Self>,
        model_name: &str,
        param: &str,
    ) -> PyResult<Bound<'py, PyAny>> {
        let view = slf.borrow_mut().session.model_param(model_name, param)?;
        // SAFETY: as in `get_signal`
        unsafe { view_to_numpy(&view, slf.into_any()) }
    }

    /// Copy `value` into a block parameter.
    ///
    /// `value` must be a numpy array with the parameter's element type and shape.
    /// Its bytes are copied in memory order: a Fortran-ordered array fills a
    /// column-major parameter element for element, a C-ordered one lands transposed.
    /// Non-contiguous arrays are copied in row-major order.
    fn set_block_param(
        &mut self,
        model_name: &str,
        block_path: &str,
        param: &str,
        value: &Bound<'_, PyAny>,
    ) -> PyResult<()> {
        let host = HostArray::extract(value)?;
        Ok(self
            .session
            .set_block_param(model_name, block_path, param, &host.as_source())?)
    }

    /// Copy `value` into a model parameter; see `set_block_param`
    fn set_model_param(
        &mut self,
        model_name: &str,
        param: &str,
        value: &Bound<'_, PyAny>,
    ) -> PyResult<()> {
        let host = HostArray::extract(value)?;
        Ok(self
            .session
            .set_model_param(model_name, param, &host.as_source())?)
    }

    #[pyo3(signature = (model_name, block_path=None, signal_name=None))]
    fn describe_signal(
        &mut self,
        model_name: &str,
        block_path: Option<&str>,
        signal_name: Option<&str>,
    ) -> PyResult<PyDataType> {
        Ok(PyDataType(self.session.describe_signal(
            model_name,
            block_path,
            signal_name,
        )?))
    }

    fn describe_block_param(
        &mut self,
        model_name: &str,
        block_path: &str,
        param: &str,
    ) -> PyResult<PyDataType> {
        Ok(PyDataType(self.session.describe_block_param(
            model_name, block_path, param,
        )?))
    }

    fn describe_model_param(&mut self, model_name: &str, param: &str) -> PyResult<PyDataType> {
        Ok(PyDataType(
            self.session.describe_model_param(model_name, param)?,
        ))
    }

    /// Every model's parameters and signals as a list of dicts
    fn get_params(&self, py: Python<'_>) -> PyResult<PyObject> {
        let params = self.session.params()?;
        Ok(pythonize::pythonize(py, &params)?)
    }

    fn params_report(&self) -> PyResult<String> {
        Ok(self.session.params_report()?)
    }

    fn __repr__(&self) -> String {
        format!(
            "<Model '{}' ({})>",
            self.session.config().model_name,
            self.session.state()
        )
    }
}
