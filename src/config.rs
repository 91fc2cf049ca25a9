use crate::linalg::LsqrSettings;
use crate::locate::LocatorKind;
use crate::observations::{Aggregation, TemporalWindow};

use json::{object, JsonValue};
use std::path::Path;
use thiserror::Error;

/// Problems with a configuration document
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Configuration is not valid JSON: {0}")]
    Parse(String),
    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
    #[error("Unable to read configuration: {0}")]
    Io(String),
}

impl ConfigError {
    fn invalid(key: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

/// Spatial interpolation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    /// Regularized least-squares fit of nodal values
    LeastSquares,
    /// Linear interpolation over a Delaunay triangulation of the observations
    #[default]
    Delaunay,
}

impl Method {
    pub fn name(&self) -> &'static str {
        match self {
            Self::LeastSquares => "least_squares",
            Self::Delaunay => "delaunay",
        }
    }
}

/// What the observed values measure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObservedQuantity {
    /// Groundwater elevation
    #[default]
    Head,
    /// Depth from the ground surface down to the water table (`head = gse - depth`)
    DepthBelowSurface,
}

impl ObservedQuantity {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Head => "head",
            Self::DepthBelowSurface => "depth_below_surface",
        }
    }
}

/// Every setting of an interpolation run
#[derive(Debug, Clone, PartialEq)]
pub struct InterpolationConfig {
    pub method: Method,
    /// Tikhonov weight of the least-squares fitter
    pub reg_weight: f64,
    pub window: TemporalWindow,
    /// Dates with fewer valid stations are skipped
    pub min_observations: usize,
    pub aggregation: Aggregation,
    pub quantity: ObservedQuantity,
    pub locator: LocatorKind,
    /// Process dates on the rayon thread pool
    pub parallel: bool,
    pub solver: LsqrSettings,
}

impl Default for InterpolationConfig {
    fn default() -> Self {
        Self {
            method: Method::default(),
            reg_weight: 1e-3,
            window: TemporalWindow::default(),
            min_observations: 3,
            aggregation: Aggregation::default(),
            quantity: ObservedQuantity::default(),
            locator: LocatorKind::default(),
            parallel: true,
            solver: LsqrSettings::default(),
        }
    }
}

impl InterpolationConfig {
    /// Parse a JSON configuration document
    ///
    /// Every key is optional (missing keys keep their default) and unknown keys are ignored:
    ///
    /// ```json
    /// {
    ///     "method": "least_squares",
    ///     "reg_weight": 0.001,
    ///     "window_months_before": 12,
    ///     "window_months_after": 1,
    ///     "min_observations": 3,
    ///     "aggregation": "window_mean",
    ///     "quantity": "depth_below_surface",
    ///     "locator": "indexed",
    ///     "parallel": true,
    ///     "solver": { "atol": 1e-10, "btol": 1e-10, "max_iterations": 500 }
    /// }
    /// ```
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let doc = json::parse(text).map_err(|err| ConfigError::Parse(err.to_string()))?;
        if !doc.is_object() {
            return Err(ConfigError::Parse(
                "expected a JSON object at the top level".to_string(),
            ));
        }

        let mut config = Self::default();

        if let Some(method) = named(&doc, "method", &METHOD_NAMES)? {
            config.method = method;
        }
        if let Some(aggregation) = named(&doc, "aggregation", &AGGREGATION_NAMES)? {
            config.aggregation = aggregation;
        }
        if let Some(quantity) = named(&doc, "quantity", &QUANTITY_NAMES)? {
            config.quantity = quantity;
        }
        if let Some(locator) = named(&doc, "locator", &LOCATOR_NAMES)? {
            config.locator = locator;
        }

        if let Some(w) = number(&doc, "reg_weight")? {
            config.reg_weight = w;
        }
        if let Some(m) = count(&doc, "window_months_before")? {
            config.window.months_before = m as u32;
        }
        if let Some(m) = count(&doc, "window_months_after")? {
            config.window.months_after = m as u32;
        }
        if let Some(n) = count(&doc, "min_observations")? {
            config.min_observations = n;
        }
        if !doc["parallel"].is_null() {
            config.parallel = doc["parallel"]
                .as_bool()
                .ok_or_else(|| ConfigError::invalid("parallel", "expected true or false"))?;
        }

        let solver = &doc["solver"];
        if !solver.is_null() {
            if !solver.is_object() {
                return Err(ConfigError::invalid("solver", "expected an object"));
            }
            if let Some(atol) = number(solver, "atol")? {
                config.solver.atol = atol;
            }
            if let Some(btol) = number(solver, "btol")? {
                config.solver.btol = btol;
            }
            if let Some(cap) = count(solver, "max_iterations")? {
                config.solver.max_iterations = Some(cap);
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|err| ConfigError::Io(format!("{}: {}", path.as_ref().display(), err)))?;
        Self::from_json_str(&text)
    }

    /// Check that every setting is usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.reg_weight.is_finite() && self.reg_weight >= 0.0) {
            return Err(ConfigError::invalid(
                "reg_weight",
                format!("{} is not a finite, non-negative number", self.reg_weight),
            ));
        }
        if self.min_observations < 3 {
            return Err(ConfigError::invalid(
                "min_observations",
                "at least 3 observations are needed to orient a plane",
            ));
        }
        for (key, tol) in [("solver.atol", self.solver.atol), ("solver.btol", self.solver.btol)] {
            if !(tol.is_finite() && tol > 0.0) {
                return Err(ConfigError::invalid(key, "tolerance must be positive"));
            }
        }
        if self.solver.max_iterations == Some(0) {
            return Err(ConfigError::invalid(
                "solver.max_iterations",
                "must be at least 1",
            ));
        }
        Ok(())
    }

    pub fn to_json(&self) -> JsonValue {
        let mut solver = object! {
            "atol": self.solver.atol,
            "btol": self.solver.btol,
        };
        if let Some(cap) = self.solver.max_iterations {
            solver["max_iterations"] = cap.into();
        }

        object! {
            "method": self.method.name(),
            "reg_weight": self.reg_weight,
            "window_months_before": self.window.months_before,
            "window_months_after": self.window.months_after,
            "min_observations": self.min_observations,
            "aggregation": self.aggregation.name(),
            "quantity": self.quantity.name(),
            "locator": self.locator.name(),
            "parallel": self.parallel,
            "solver": solver,
        }
    }
}

const METHOD_NAMES: [(&str, Method); 2] = [
    ("least_squares", Method::LeastSquares),
    ("delaunay", Method::Delaunay),
];

const AGGREGATION_NAMES: [(&str, Aggregation); 2] = [
    ("window_mean", Aggregation::WindowMean),
    ("at_target_date", Aggregation::AtTargetDate),
];

const QUANTITY_NAMES: [(&str, ObservedQuantity); 2] = [
    ("head", ObservedQuantity::Head),
    ("depth_below_surface", ObservedQuantity::DepthBelowSurface),
];

const LOCATOR_NAMES: [(&str, LocatorKind); 2] = [
    ("brute_force", LocatorKind::BruteForce),
    ("indexed", LocatorKind::Indexed),
];

fn named<T: Copy>(
    doc: &JsonValue,
    key: &str,
    options: &[(&str, T)],
) -> Result<Option<T>, ConfigError> {
    let value = &doc[key];
    if value.is_null() {
        return Ok(None);
    }

    let name = value
        .as_str()
        .ok_or_else(|| ConfigError::invalid(key, "expected a string"))?;
    options
        .iter()
        .find(|(option, _)| option.eq_ignore_ascii_case(name))
        .map(|(_, v)| Some(*v))
        .ok_or_else(|| {
            let choices: Vec<&str> = options.iter().map(|(o, _)| *o).collect();
            ConfigError::invalid(key, format!("'{}' is not one of {:?}", name, choices))
        })
}

fn number(doc: &JsonValue, key: &str) -> Result<Option<f64>, ConfigError> {
    let value = &doc[key];
    if value.is_null() {
        return Ok(None);
    }
    value
        .as_f64()
        .map(Some)
        .ok_or_else(|| ConfigError::invalid(key, "expected a number"))
}

fn count(doc: &JsonValue, key: &str) -> Result<Option<usize>, ConfigError> {
    let value = &doc[key];
    if value.is_null() {
        return Ok(None);
    }
    value
        .as_u32()
        .map(|n| Some(n as usize))
        .ok_or_else(|| ConfigError::invalid(key, "expected a non-negative integer"))
}
