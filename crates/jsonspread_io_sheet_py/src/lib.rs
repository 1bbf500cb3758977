use std::path::{Path, PathBuf};

use jsonspread_io_sheet::{
    EnumCellValue, EnumValue, JsonParser, SpecDownloadBuffer, SpecSpreadReport, Spread,
    SpreadError, derive_default_spread_options, is_json,
};
use pyo3::exceptions::{PyIOError, PyIndexError, PyKeyError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyAny, PyBool, PyBytes};

const N_BRIDGE_ABI_VERSION: u64 = 1;
const C_BRIDGE_CONTRACT_VERSION: &str = "jsonspread.io.sheet.v1";
const C_BRIDGE_TRANSPORT: &str = "rust_native";

////////////////////////////////////////////////////////////////////////////////
// #region Report

#[pyclass(name = "SpreadReport")]
#[derive(Debug, Clone)]
struct PySpreadReport {
    #[pyo3(get)]
    file_name: String,
    #[pyo3(get)]
    file_format: String,
    #[pyo3(get)]
    n_bytes: usize,
    #[pyo3(get)]
    sheets: Vec<(String, usize, usize)>,
    #[pyo3(get)]
    warnings: Vec<String>,
}

impl From<SpecSpreadReport> for PySpreadReport {
    fn from(report: SpecSpreadReport) -> Self {
        Self {
            file_name: report.file_name,
            file_format: report.format.to_string(),
            n_bytes: report.n_bytes,
            sheets: report
                .sheets
                .into_iter()
                .map(|sheet| (sheet.sheet_name, sheet.n_rows, sheet.n_cols))
                .collect(),
            warnings: report.warnings,
        }
    }
}

#[pymethods]
impl PySpreadReport {
    #[getter]
    fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    #[pyo3(signature = (prefix = "[SPREAD]"))]
    fn format(&self, prefix: &str) -> String {
        format!(
            "{prefix} file={} format={} sheets={} bytes={} warnings={}",
            self.file_name,
            self.file_format,
            self.sheets.len(),
            self.n_bytes,
            self.warning_count()
        )
    }

    fn __str__(&self) -> String {
        self.format("[SPREAD]")
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Spread

#[pyclass(name = "Spread")]
struct PySpread {
    inner: Spread,
}

#[pymethods]
impl PySpread {
    #[new]
    #[pyo3(signature = (json, default_sheet_title = None, if_strict_content_type = false))]
    fn new(
        json: &str,
        default_sheet_title: Option<String>,
        if_strict_content_type: bool,
    ) -> PyResult<Self> {
        let data = EnumValue::from_json_str(json).map_err(map_spread_error)?;
        let mut options = derive_default_spread_options();
        if let Some(c_title) = default_sheet_title {
            options.default_sheet_title = c_title;
        }
        options.if_strict_content_type = if_strict_content_type;
        Ok(Self {
            inner: Spread::with_options(data, options),
        })
    }

    #[pyo3(signature = (title, index = None))]
    fn add_sheet(&mut self, title: &str, index: Option<usize>) -> PyResult<()> {
        self.inner
            .add_sheet(title, index)
            .map(|_| ())
            .map_err(map_spread_error)
    }

    #[getter]
    fn sheet_count(&self) -> usize {
        self.inner.sheet_count()
    }

    #[getter]
    fn sheet_names(&self) -> Vec<String> {
        self.inner.sheet_names()
    }

    #[getter]
    fn active_sheet_index(&self) -> usize {
        self.inner.active_sheet_index()
    }

    fn set_active_sheet(&mut self, index: usize) -> PyResult<()> {
        self.inner.set_active_sheet(index).map_err(map_spread_error)
    }

    fn set_active_sheet_by_name(&mut self, name: &str) -> PyResult<()> {
        self.inner
            .set_active_sheet_by_name(name)
            .map_err(map_spread_error)
    }

    fn set_sheet_name(&mut self, name: &str) {
        self.inner.set_sheet_name(name);
    }

    fn set_data(&mut self, json: &str) -> PyResult<()> {
        let data = EnumValue::from_json_str(json).map_err(map_spread_error)?;
        self.inner.set_data(data);
        Ok(())
    }

    fn set_keys(&mut self, labels: Vec<String>) {
        self.inner.set_keys(labels);
    }

    #[getter]
    fn keys(&self) -> Vec<String> {
        self.inner.keys().to_vec()
    }

    #[getter]
    fn display_keys(&self) -> Vec<String> {
        self.inner.display_keys()
    }

    fn set_cell_value(&mut self, cell_ref: &str, value: &Bound<'_, PyAny>) -> PyResult<()> {
        let cell_value = derive_cell_value(value)?;
        self.inner
            .set_cell_value(cell_ref, cell_value)
            .map_err(map_spread_error)
    }

    #[getter]
    fn file_name(&self) -> String {
        self.inner.file_name().to_string()
    }

    fn set_file_name(&mut self, name: &str) {
        self.inner.set_file_name(name);
    }

    #[getter]
    fn extension(&self) -> String {
        self.inner.extension().to_string()
    }

    fn set_extension(&mut self, extension: &str) {
        self.inner.set_extension(extension);
    }

    fn set_type_file(&mut self, extension: &str) {
        self.inner.set_type_file(extension);
    }

    #[getter]
    fn full_file_name(&self) -> String {
        self.inner.full_file_name()
    }

    #[getter]
    fn path(&self) -> Option<String> {
        self.inner
            .path()
            .map(|path| path.to_string_lossy().to_string())
    }

    #[pyo3(signature = (path = None))]
    fn set_path(&mut self, path: Option<String>) {
        self.inner.set_path(path.map(PathBuf::from));
    }

    #[pyo3(signature = (path = None))]
    fn save(&self, py: Python<'_>, path: Option<String>) -> PyResult<PySpreadReport> {
        let spread = &self.inner;
        let report = py.allow_threads(|| spread.save(path.as_deref().map(Path::new)));
        let report = report.map_err(map_spread_error)?;
        Ok(PySpreadReport::from(report))
    }

    /// Return `(headers, body)` for an attachment download.
    fn get_file(&self, py: Python<'_>) -> PyResult<(Vec<(String, String)>, Py<PyBytes>)> {
        let spread = &self.inner;
        let res_download = py.allow_threads(|| {
            let mut buffer = SpecDownloadBuffer::default();
            spread.get_file(&mut buffer).map(|_| buffer)
        });
        let buffer = res_download.map_err(map_spread_error)?;
        let bytes = PyBytes::new(py, &buffer.body).unbind();
        Ok((buffer.headers, bytes))
    }

    fn __repr__(&self) -> String {
        format!(
            "Spread(file={:?}, sheets={:?})",
            self.inner.full_file_name(),
            self.inner.sheet_names()
        )
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Parser

#[pyclass(name = "Parser")]
struct PyParser {
    inner: JsonParser,
}

#[pymethods]
impl PyParser {
    #[new]
    #[pyo3(signature = (json = None))]
    fn new(json: Option<&str>) -> PyResult<Self> {
        let inner = match json {
            Some(text) => JsonParser::parse(text).map_err(map_spread_error)?,
            None => JsonParser::new(EnumValue::Null),
        };
        Ok(Self { inner })
    }

    #[staticmethod]
    fn is_json(text: &str) -> bool {
        JsonParser::is_json(text)
    }

    fn set(&mut self, json: &str) -> PyResult<()> {
        let data = EnumValue::from_json_str(json).map_err(map_spread_error)?;
        self.inner.set(data);
        Ok(())
    }

    /// Current data as compact JSON text.
    fn get(&self) -> String {
        self.inner.get().to_json()
    }

    fn to_json(&self) -> String {
        self.inner.to_json()
    }

    fn to_spread(&self) -> PySpread {
        PySpread {
            inner: JsonParser::new(self.inner.get().clone()).to_spread(),
        }
    }

    fn __str__(&self) -> String {
        self.inner.to_string()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Helpers

fn derive_cell_value(value: &Bound<'_, PyAny>) -> PyResult<EnumCellValue> {
    if value.is_none() {
        return Ok(EnumCellValue::None);
    }
    if value.is_instance_of::<PyBool>() {
        return Ok(EnumCellValue::Boolean(value.extract::<bool>()?));
    }
    if let Ok(val) = value.extract::<f64>() {
        return Ok(EnumCellValue::Number(val));
    }
    if let Ok(val) = value.extract::<String>() {
        return Ok(EnumCellValue::String(val));
    }
    Ok(EnumCellValue::String(value.str()?.to_string()))
}

fn map_spread_error(exception: SpreadError) -> PyErr {
    match exception {
        SpreadError::IndexOutOfRange { .. } => PyIndexError::new_err(exception.to_string()),
        SpreadError::NotFound(_) => PyKeyError::new_err(exception.to_string()),
        SpreadError::Io { .. } => PyIOError::new_err(exception.to_string()),
        SpreadError::Decode(_)
        | SpreadError::DuplicateTitle(_)
        | SpreadError::InvalidCellRef(_)
        | SpreadError::Encode { .. } => PyValueError::new_err(exception.to_string()),
    }
}

#[pyfunction(name = "is_json")]
fn is_json_py(text: &str) -> bool {
    is_json(text)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[pymodule]
fn _jsonspread_io_sheet_rs(module: &Bound<'_, PyModule>) -> PyResult<()> {
    module.add_class::<PySpread>()?;
    module.add_class::<PyParser>()?;
    module.add_class::<PySpreadReport>()?;
    module.add_function(wrap_pyfunction!(is_json_py, module)?)?;
    module.add("__bridge_abi__", N_BRIDGE_ABI_VERSION)?;
    module.add("__bridge_contract__", C_BRIDGE_CONTRACT_VERSION)?;
    module.add("__bridge_transport__", C_BRIDGE_TRANSPORT)?;
    Ok(())
}
