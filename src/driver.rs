use crate::config::{InterpolationConfig, Method, ObservedQuantity};
use crate::error::{DateFailure, InterpolationError, Result};
use crate::fit::LeastSquaresFitter;
use crate::mesh::{Mesh, Point};
use crate::observations::ObservationSet;
use crate::result::InterpolationResult;
use crate::scattered::ScatteredInterpolator;

use chrono::NaiveDate;
use rayon::prelude::*;
use tracing::{debug, info, warn};

/// Maps scattered `(location, value)` observations for one instant onto every mesh node
pub trait SpatialInterpolator: Send + Sync {
    /// One value per mesh node, in node order
    fn interpolate(&self, observations: &[(Point, f64)]) -> Result<Vec<f64>>;

    fn name(&self) -> &'static str;
}

/// Interpolates an [ObservationSet] onto a Mesh for a sequence of target dates
///
/// For every date, the observations inside the configured window are reduced to one value per
/// station, handed to the spatial interpolator, and (for depth observations) converted to heads.
/// Dates are independent of each other, and are processed in parallel when configured to.
pub struct TemporalDriver<'m> {
    mesh: &'m Mesh,
    config: InterpolationConfig,
    interpolator: Box<dyn SpatialInterpolator + 'm>,
}

impl<'m> TemporalDriver<'m> {
    /// Build a driver with the interpolator selected by `config.method`
    ///
    /// Returns a `Config` Error if the configuration is invalid
    pub fn new(mesh: &'m Mesh, config: InterpolationConfig) -> Result<Self> {
        config.validate()?;

        let interpolator: Box<dyn SpatialInterpolator> = match config.method {
            Method::LeastSquares => Box::new(LeastSquaresFitter::new(
                mesh,
                config.locator,
                config.reg_weight,
                config.solver,
            )),
            Method::Delaunay => Box::new(ScatteredInterpolator::new(mesh)),
        };

        Ok(Self {
            mesh,
            config,
            interpolator,
        })
    }

    /// Build a driver around a custom interpolator (`config.method` is ignored)
    pub fn with_interpolator(
        mesh: &'m Mesh,
        config: InterpolationConfig,
        interpolator: Box<dyn SpatialInterpolator + 'm>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            mesh,
            config,
            interpolator,
        })
    }

    pub fn config(&self) -> &InterpolationConfig {
        &self.config
    }

    /// Interpolate every month between the first and last measurement
    pub fn run_monthly(&self, observations: &ObservationSet) -> Result<InterpolationResult> {
        self.run(observations, &observations.monthly_dates())
    }

    /// Interpolate each target date
    ///
    /// Rows of the result are sorted by date (duplicate dates are computed once). A date that cannot
    /// be interpolated (too few stations, solver failure, ...) is logged, recorded as a
    /// [DateFailure], and left as a row of NaN.
    pub fn run(
        &self,
        observations: &ObservationSet,
        dates: &[NaiveDate],
    ) -> Result<InterpolationResult> {
        let mut dates = dates.to_vec();
        dates.sort_unstable();
        dates.dedup();

        info!(
            dates = dates.len(),
            method = self.interpolator.name(),
            stations = observations.num_stations(),
            nodes = self.mesh.num_nodes(),
            "starting interpolation run"
        );

        let outcomes: Vec<Result<Vec<f64>>> = if self.config.parallel {
            dates
                .par_iter()
                .map(|date| self.interpolate_date(observations, *date))
                .collect()
        } else {
            dates
                .iter()
                .map(|date| self.interpolate_date(observations, *date))
                .collect()
        };

        let mut result = InterpolationResult::new(dates.clone(), self.mesh.node_ids().collect());
        for (idx, (date, outcome)) in dates.into_iter().zip(outcomes).enumerate() {
            match outcome {
                Ok(values) => result.set_row(idx, &values),
                Err(error) if error.is_fatal() => return Err(error),
                Err(error) => {
                    warn!(%date, %error, "date skipped");
                    result.record_failure(DateFailure { date, error });
                }
            }
        }

        info!(
            filled = result.filled_rows(),
            skipped = result.failures().len(),
            "finished interpolation run"
        );
        Ok(result)
    }

    /// Nodal values for a single target date
    pub fn interpolate_date(
        &self,
        observations: &ObservationSet,
        date: NaiveDate,
    ) -> Result<Vec<f64>> {
        let station_values =
            observations.values_at(date, &self.config.window, self.config.aggregation);

        if station_values.len() < self.config.min_observations {
            return Err(InterpolationError::InsufficientObservations {
                found: station_values.len(),
                required: self.config.min_observations,
            });
        }

        let mut values = self.interpolator.interpolate(&station_values)?;
        if values.len() != self.mesh.num_nodes() {
            return Err(InterpolationError::InvalidGeometry(format!(
                "interpolator produced {} values for {} nodes",
                values.len(),
                self.mesh.num_nodes()
            )));
        }

        if self.config.quantity == ObservedQuantity::DepthBelowSurface {
            for (value, node) in values.iter_mut().zip(self.mesh.nodes()) {
                *value = node.gse - *value;
            }
        }

        debug!(%date, stations = station_values.len(), "interpolated date");
        Ok(values)
    }
}

/// Interpolate every month of an observation record onto a Mesh
pub fn interpolate_observations(
    mesh: &Mesh,
    observations: &ObservationSet,
    config: InterpolationConfig,
) -> Result<InterpolationResult> {
    TemporalDriver::new(mesh, config)?.run_monthly(observations)
}
