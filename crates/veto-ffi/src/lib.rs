// ─────────────────────────────────────────────────────────────────────
// IceVeto Kernel — PyO3 FFI Bindings
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
// Note: #[deny(unsafe_code)] not applied; PyO3 proc macros generate
// unsafe blocks internally. All hand-written code in this crate is safe.
//! Python-callable wrappers around the Rust veto kernel.
//!
//! Exposes `VetoConfig`, `VetoEvent`, `VetoProcessor`, `VetoOutcome` and
//! `VetoEvaluation` to Python via PyO3.
//!
//! # FFI Conventions
//!
//! - Registry configuration errors raise `ValueError`; the registry is left
//!   unchanged and the error is also logged.
//! - `activate_preset` speaks the sentinel convention: negative values keep
//!   the preset default, `tresmin == tresmax` disables residual filtering.
//! - The optional hit callback is queued during a pass and invoked after
//!   it returns, so it may reconfigure the processor. Python exceptions
//!   raised in it are logged and swallowed.
//!
//! Install: `maturin develop -m crates/veto-ffi/Cargo.toml --features extension-module`
//!
//! Usage from Python:
//! ```python
//! from veto_kernel import VetoProcessor, VetoEvent
//!
//! proc = VetoProcessor()
//! proc.activate_preset("HESE86")
//! event = VetoEvent()
//! event.add_sensor(36, 1, 46.3, -34.9, 500.0)
//! event.add_hit(36, 1, amplitude=2.5, time=9800.0)
//! outcome = proc.process(event)
//! ```

use std::sync::Arc;

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyDict;

use veto_core::{
    BufferedObserver, ExternalConstants, InMemoryEvent, PresetOverrides, ReportDetail,
    ResidualObserver, SensorRange, VetoEvent, VetoProcessor,
};
use veto_types::{
    CentralValue, Hit, SensorClass, SensorId, Vec3, VetoConfig, VetoError, VetoEvaluation,
    VetoOutcome, VetoParameter, VetoParams,
};

fn value_error(e: VetoError) -> PyErr {
    PyValueError::new_err(e.to_string())
}

fn params_dict<'py>(py: Python<'py>, params: &VetoParams) -> PyResult<Bound<'py, PyDict>> {
    let dict = PyDict::new(py);
    for param in VetoParameter::ALL {
        dict.set_item(param.label(), params.get(param))?;
    }
    Ok(dict)
}

// ─── PyVetoConfig ───────────────────────────────────────────────────

/// Python-visible configuration of the veto processor.
#[pyclass(name = "VetoConfig")]
#[derive(Clone)]
struct PyVetoConfig {
    inner: VetoConfig,
}

#[pymethods]
impl PyVetoConfig {
    #[new]
    #[pyo3(signature = (
        processor_name = "IceVeto".to_string(),
        start_window = 3000.0,
        start_threshold_fraction = 0.05,
        start_threshold_floor = 3.0,
        central_value = "weighted_median",
        selection_threshold = 0.1,
    ))]
    fn new(
        processor_name: String,
        start_window: f64,
        start_threshold_fraction: f64,
        start_threshold_floor: f64,
        central_value: &str,
        selection_threshold: f64,
    ) -> PyResult<Self> {
        let config = VetoConfig {
            processor_name,
            start_window,
            start_threshold_fraction,
            start_threshold_floor,
            central_value: central_value.parse::<CentralValue>().map_err(value_error)?,
            selection_threshold,
        };
        config.validate().map_err(value_error)?;
        Ok(Self { inner: config })
    }

    /// Construct from JSON string.
    #[staticmethod]
    fn from_json(json: &str) -> PyResult<Self> {
        let config = VetoConfig::from_json(json).map_err(value_error)?;
        Ok(Self { inner: config })
    }

    #[getter]
    fn processor_name(&self) -> &str {
        &self.inner.processor_name
    }

    #[getter]
    fn start_window(&self) -> f64 {
        self.inner.start_window
    }

    #[getter]
    fn selection_threshold(&self) -> f64 {
        self.inner.selection_threshold
    }

    fn __repr__(&self) -> String {
        format!(
            "VetoConfig(name={}, start_window={}, central_value={:?})",
            self.inner.processor_name, self.inner.start_window, self.inner.central_value
        )
    }
}

// ─── PyVetoEvaluation ───────────────────────────────────────────────

/// Python-visible record of one region on one event.
#[pyclass(name = "VetoEvaluation")]
#[derive(Clone)]
struct PyVetoEvaluation {
    inner: VetoEvaluation,
}

#[pymethods]
impl PyVetoEvaluation {
    #[getter]
    fn region(&self) -> &str {
        &self.inner.region
    }

    #[getter]
    fn region_id(&self) -> u32 {
        self.inner.region_id
    }

    #[getter]
    fn title(&self) -> &str {
        &self.inner.title
    }

    #[getter]
    fn firing_sensor_count(&self) -> u32 {
        self.inner.firing_sensor_count
    }

    #[getter]
    fn hit_count(&self) -> u32 {
        self.inner.hit_count
    }

    #[getter]
    fn total_amplitude(&self) -> f64 {
        self.inner.total_amplitude
    }

    #[getter]
    fn fired(&self) -> bool {
        self.inner.fired
    }

    /// Valid veto hits as `(sensor_id, amplitude, time, slc)` tuples.
    #[getter]
    fn evidence(&self) -> Vec<(i32, f64, f64, bool)> {
        self.inner
            .evidence
            .iter()
            .map(|h| (h.sensor.raw(), h.amplitude, h.time, h.slc))
            .collect()
    }

    fn params<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyDict>> {
        params_dict(py, &self.inner.params)
    }

    fn to_dict<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyDict>> {
        let dict = PyDict::new(py);
        dict.set_item("region", &self.inner.region)?;
        dict.set_item("region_id", self.inner.region_id)?;
        dict.set_item("title", &self.inner.title)?;
        dict.set_item("params", params_dict(py, &self.inner.params)?)?;
        dict.set_item("ndom", self.inner.firing_sensor_count)?;
        dict.set_item("nhit", self.inner.hit_count)?;
        dict.set_item("qtot", self.inner.total_amplitude)?;
        dict.set_item("fired", self.inner.fired)?;
        dict.set_item("evidence", self.evidence())?;
        Ok(dict)
    }

    fn __repr__(&self) -> String {
        format!("VetoEvaluation({})", self.inner)
    }
}

// ─── PyVetoOutcome ──────────────────────────────────────────────────

/// Python-visible result of one veto pass.
#[pyclass(name = "VetoOutcome")]
#[derive(Clone)]
struct PyVetoOutcome {
    inner: VetoOutcome,
}

#[pymethods]
impl PyVetoOutcome {
    #[getter]
    fn level(&self) -> u32 {
        self.inner.level
    }

    #[getter]
    fn evaluations(&self) -> Vec<PyVetoEvaluation> {
        self.inner
            .evaluations
            .iter()
            .cloned()
            .map(|inner| PyVetoEvaluation { inner })
            .collect()
    }

    fn evaluation(&self, region: &str) -> Option<PyVetoEvaluation> {
        self.inner
            .evaluation(region)
            .cloned()
            .map(|inner| PyVetoEvaluation { inner })
    }

    fn fired_regions(&self) -> Vec<String> {
        self.inner.fired_regions().map(str::to_string).collect()
    }

    fn is_vetoed(&self) -> bool {
        self.inner.is_vetoed()
    }

    fn __repr__(&self) -> String {
        format!(
            "VetoOutcome(level={}, regions={})",
            self.inner.level,
            self.inner.evaluations.len()
        )
    }
}

// ─── PyVetoEvent ────────────────────────────────────────────────────

/// In-memory event: sensors with positions, hits and an optional
/// upstream selection signal.
#[pyclass(name = "VetoEvent")]
struct PyVetoEvent {
    inner: InMemoryEvent,
}

#[pymethods]
impl PyVetoEvent {
    #[new]
    #[pyo3(signature = (selection = None))]
    fn new(selection: Option<f64>) -> Self {
        let mut inner = InMemoryEvent::new();
        inner.set_selection(selection);
        Self { inner }
    }

    /// Register a sensor. Without `sensor_class` the IC86 numbering
    /// decides the class.
    #[pyo3(signature = (string, module, x, y, z, sensor_class = None))]
    fn add_sensor(
        &mut self,
        string: i32,
        module: i32,
        x: f64,
        y: f64,
        z: f64,
        sensor_class: Option<&str>,
    ) -> PyResult<()> {
        let id = SensorId::try_new(string, module).map_err(value_error)?;
        let position = Vec3::new(x, y, z);
        match sensor_class {
            Some(name) => {
                let class = name.parse::<SensorClass>().map_err(value_error)?;
                self.inner.add_sensor(id, position, class);
            }
            None => {
                self.inner
                    .add_ic86_sensor(id, position)
                    .map_err(value_error)?;
            }
        }
        Ok(())
    }

    #[pyo3(signature = (string, module, amplitude, time, slc = false))]
    fn add_hit(
        &mut self,
        string: i32,
        module: i32,
        amplitude: f64,
        time: f64,
        slc: bool,
    ) -> PyResult<()> {
        let id = SensorId::try_new(string, module).map_err(value_error)?;
        self.inner
            .add_hit(Hit::new(id, amplitude, time).with_slc(slc))
            .map_err(value_error)
    }

    #[getter]
    fn selection(&self) -> Option<f64> {
        self.inner.selection()
    }

    #[setter]
    fn set_selection(&mut self, value: Option<f64>) {
        self.inner.set_selection(value);
    }

    #[getter]
    fn veto_level(&self) -> Option<u32> {
        self.inner.veto_level()
    }

    /// Keys of the attached region records.
    fn result_keys(&self) -> Vec<String> {
        self.inner.results().iter().map(|(k, _)| k.clone()).collect()
    }

    fn result(&self, key: &str) -> Option<PyVetoEvaluation> {
        self.inner
            .result(key)
            .cloned()
            .map(|inner| PyVetoEvaluation { inner })
    }

    fn __repr__(&self) -> String {
        format!(
            "VetoEvent(sensors={}, selection={:?}, veto_level={:?})",
            self.inner.sensor_count(),
            self.inner.selection(),
            self.inner.veto_level()
        )
    }
}

// ─── PyVetoProcessor ────────────────────────────────────────────────

/// Veto region registry plus per-event evaluation.
#[pyclass(name = "VetoProcessor")]
struct PyVetoProcessor {
    inner: VetoProcessor,
    hit_callback: Option<(Arc<BufferedObserver>, PyObject)>,
}

#[pymethods]
impl PyVetoProcessor {
    /// Create a processor.
    ///
    /// Args:
    ///     config: Optional VetoConfig (defaults if None).
    ///     speed_of_light: Propagation speed in position/time units
    ///                     (vacuum m/ns if None).
    ///     hit_callback: Optional Callable[[str, int, float, float, float], None]
    ///                   called with (region, sensor_id, amplitude, time, tres0)
    ///                   for every valid veto hit, once the pass has
    ///                   finished. It may call back into this processor.
    ///
    /// Raises:
    ///     ValueError: if `config` fails validation.
    #[new]
    #[pyo3(signature = (config = None, speed_of_light = None, hit_callback = None))]
    fn new(
        config: Option<PyVetoConfig>,
        speed_of_light: Option<f64>,
        hit_callback: Option<PyObject>,
    ) -> PyResult<Self> {
        let cfg = config.map(|c| c.inner).unwrap_or_default();
        let mut inner = VetoProcessor::new(cfg).map_err(value_error)?;
        if let Some(c) = speed_of_light {
            inner = inner.with_constants(Arc::new(ExternalConstants::fixed(c)));
        }
        let hit_callback = hit_callback.map(|cb| {
            let buffer = Arc::new(BufferedObserver::new());
            (buffer, cb)
        });
        if let Some((buffer, _)) = &hit_callback {
            inner = inner.with_observer(Arc::clone(buffer) as Arc<dyn ResidualObserver>);
        }
        Ok(Self {
            inner,
            hit_callback,
        })
    }

    /// Define an empty region. Returns its id.
    #[pyo3(signature = (
        name,
        qtot = 0.0,
        amp = 0.0,
        ndom = 1,
        nhit = 1,
        slc = true,
        tresmin = 1.0,
        tresmax = 0.0,
    ))]
    #[allow(clippy::too_many_arguments)]
    fn define(
        &self,
        name: &str,
        qtot: f64,
        amp: f64,
        ndom: i64,
        nhit: i64,
        slc: bool,
        tresmin: f64,
        tresmax: f64,
    ) -> PyResult<u32> {
        let params = VetoParams::new(qtot, amp, ndom, nhit, slc, tresmin, tresmax);
        self.inner
            .registry_mut()
            .define(name, params)
            .map_err(value_error)
    }

    /// Add strings `[string_lo, string_hi]` × modules `[module_lo, module_hi]`.
    fn add_range(
        &self,
        name: &str,
        string_lo: i32,
        string_hi: i32,
        module_lo: i32,
        module_hi: i32,
    ) -> PyResult<usize> {
        let range = SensorRange::new(string_lo, string_hi, module_lo, module_hi);
        self.inner
            .registry_mut()
            .add_range(name, range)
            .map_err(value_error)
    }

    fn remove_range(
        &self,
        name: &str,
        string_lo: i32,
        string_hi: i32,
        module_lo: i32,
        module_hi: i32,
    ) -> PyResult<usize> {
        let range = SensorRange::new(string_lo, string_hi, module_lo, module_hi);
        self.inner
            .registry_mut()
            .remove_range(name, range)
            .map_err(value_error)
    }

    /// Set one parameter by label (`"QtotVetoMin"`) or name
    /// (`"min_total_amplitude"`).
    fn set_parameter(&self, name: &str, param: &str, value: f64) -> PyResult<()> {
        let param = param.parse::<VetoParameter>().map_err(value_error)?;
        self.inner
            .registry_mut()
            .set_parameter(name, param, value)
            .map_err(value_error)
    }

    /// Activate a standard IC86 preset. Returns the new region id.
    #[pyo3(signature = (
        preset,
        qtot = -1.0,
        amp = -1.0,
        ndom = -1,
        nhit = -1,
        slc = -1,
        tresmin = 0.0,
        tresmax = 0.0,
    ))]
    #[allow(clippy::too_many_arguments)]
    fn activate_preset(
        &self,
        preset: &str,
        qtot: f64,
        amp: f64,
        ndom: i64,
        nhit: i64,
        slc: i64,
        tresmin: f64,
        tresmax: f64,
    ) -> PyResult<u32> {
        let overrides = PresetOverrides::from_raw(qtot, amp, ndom, nhit, slc, tresmin, tresmax);
        self.inner
            .registry_mut()
            .activate_preset(preset, overrides)
            .map_err(value_error)
    }

    fn region_names(&self) -> Vec<String> {
        self.inner
            .registry()
            .regions()
            .iter()
            .map(|r| r.name().to_string())
            .collect()
    }

    /// Member sensor ids of region `name`, or None if unknown.
    fn sensors(&self, name: &str) -> Option<Vec<i32>> {
        self.inner
            .registry()
            .lookup(name)
            .map(|r| r.members().map(SensorId::raw).collect())
    }

    fn params<'py>(&self, py: Python<'py>, name: &str) -> PyResult<Option<Bound<'py, PyDict>>> {
        let registry = self.inner.registry();
        registry
            .lookup(name)
            .map(|r| params_dict(py, r.params()))
            .transpose()
    }

    /// Registry listing: detail is "summary", "parameters" or "sensors".
    #[pyo3(signature = (detail = "summary"))]
    fn report(&self, detail: &str) -> PyResult<String> {
        let detail = detail.parse::<ReportDetail>().map_err(value_error)?;
        Ok(self.inner.registry().report(detail))
    }

    /// Run one veto pass and attach the results to `event`.
    ///
    /// Returns None if the event was rejected upstream.
    fn process(&self, py: Python<'_>, event: &mut PyVetoEvent) -> Option<PyVetoOutcome> {
        let outcome = self.inner.process(&mut event.inner);
        self.flush_hits(py);
        outcome.map(|inner| PyVetoOutcome { inner })
    }

    /// Evaluate without writing to `event`.
    fn evaluate(&self, py: Python<'_>, event: &PyVetoEvent) -> Option<PyVetoOutcome> {
        let event: &dyn VetoEvent = &event.inner;
        let outcome = self.inner.evaluate(event);
        self.flush_hits(py);
        outcome.map(|inner| PyVetoOutcome { inner })
    }

    #[getter]
    fn config(&self) -> PyVetoConfig {
        PyVetoConfig {
            inner: self.inner.config().clone(),
        }
    }

    fn __len__(&self) -> usize {
        self.inner.registry().len()
    }

    fn __repr__(&self) -> String {
        format!(
            "VetoProcessor(name={}, regions={})",
            self.inner.config().processor_name,
            self.inner.registry().len()
        )
    }
}

impl PyVetoProcessor {
    /// Hand the hits queued during the last pass to the Python callback.
    /// Runs with the registry lock released.
    fn flush_hits(&self, py: Python<'_>) {
        let Some((buffer, cb)) = &self.hit_callback else {
            return;
        };
        for o in buffer.drain() {
            let args = (
                o.region.as_str(),
                o.hit.sensor.raw(),
                o.hit.amplitude,
                o.hit.time,
                o.residuals.t_res_ref,
            );
            if let Err(e) = cb.call1(py, args) {
                log::warn!("hit callback raised: {e}");
            }
        }
    }
}

// ─── Module ─────────────────────────────────────────────────────────

#[pymodule]
fn veto_kernel(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyVetoConfig>()?;
    m.add_class::<PyVetoEvaluation>()?;
    m.add_class::<PyVetoOutcome>()?;
    m.add_class::<PyVetoEvent>()?;
    m.add_class::<PyVetoProcessor>()?;
    Ok(())
}
