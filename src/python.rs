//! Python bindings

use crate::io::dimap;
use crate::pipeline::{CoherencePipeline, PipelineConfig};
use crate::types::SarError;
use crate::AcquisitionFile;
use numpy::{IntoPyArray, PyArray2};
use pyo3::prelude::*;
use std::path::Path;

fn to_py_err(e: SarError) -> PyErr {
    match e.root_cause() {
        SarError::InvalidParameter(_) | SarError::MissingParameter(_) | SarError::Config(_) => {
            PyErr::new::<pyo3::exceptions::PyValueError, _>(format!("{}", e))
        }
        SarError::Io(_) => PyErr::new::<pyo3::exceptions::PyIOError, _>(format!("{}", e)),
        _ => PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(format!("{}", e)),
    }
}

/// Python module definition
#[pymodule]
fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<PyAcquisition>()?;
    m.add_function(wrap_pyfunction!(parse_acquisition, m)?)?;
    m.add_function(wrap_pyfunction!(run_pipeline, m)?)?;
    m.add_function(wrap_pyfunction!(read_band, m)?)?;
    Ok(())
}

/// Python wrapper for AcquisitionFile
#[pyclass(name = "Acquisition")]
struct PyAcquisition {
    inner: AcquisitionFile,
}

#[pymethods]
impl PyAcquisition {
    #[getter]
    fn product_name(&self) -> String {
        self.inner.product_name.clone()
    }

    #[getter]
    fn mission(&self) -> String {
        self.inner.mission.clone()
    }

    #[getter]
    fn mode(&self) -> String {
        self.inner.mode.to_string()
    }

    #[getter]
    fn start_time(&self) -> String {
        self.inner.start_time.to_rfc3339()
    }

    #[getter]
    fn absolute_orbit(&self) -> u32 {
        self.inner.absolute_orbit
    }

    #[getter]
    fn relative_orbit(&self) -> u32 {
        self.inner.relative_orbit()
    }

    #[getter]
    fn polarizations(&self) -> Vec<String> {
        self.inner.polarizations().iter().map(|p| p.to_string()).collect()
    }

    fn __repr__(&self) -> String {
        format!(
            "Acquisition(product_name='{}', mission='{}', orbit={})",
            self.inner.product_name, self.inner.mission, self.inner.absolute_orbit
        )
    }
}

#[pyfunction]
fn parse_acquisition(path: String) -> PyResult<PyAcquisition> {
    let inner = AcquisitionFile::parse(&path).map_err(to_py_err)?;
    Ok(PyAcquisition { inner })
}

/// Run the pipeline from a JSON configuration file; returns the report as JSON
#[pyfunction]
fn run_pipeline(py: Python, config_path: String) -> PyResult<String> {
    let config = PipelineConfig::from_file(Path::new(&config_path)).map_err(to_py_err)?;
    let report = py
        .allow_threads(|| CoherencePipeline::new(config)?.run())
        .map_err(to_py_err)?;
    serde_json::to_string(&report).map_err(|e| PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(e.to_string()))
}

/// Read one band of a persisted artifact as a 2D float32 array
#[pyfunction]
fn read_band<'py>(py: Python<'py>, artifact: String, band: String) -> PyResult<&'py PyArray2<f32>> {
    let product = dimap::read_product(Path::new(&artifact)).map_err(to_py_err)?;
    let data = product
        .band(&band)
        .ok_or_else(|| {
            PyErr::new::<pyo3::exceptions::PyKeyError, _>(format!(
                "{} has no band {} (available: {:?})",
                artifact,
                band,
                product.band_names()
            ))
        })?
        .data
        .clone();
    Ok(data.into_pyarray(py))
}
