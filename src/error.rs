use chrono::NaiveDate;
use thiserror::Error;

use crate::config::ConfigError;

/// The Error Type for mesh interpolation
///
/// `InvalidGeometry`, `EmptyObservations` and `Config` are fatal and abort a run before any
/// date is processed. The remaining variants describe failures that are recovered locally
/// (a dropped observation, a degraded interpolator, or a missing result row).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InterpolationError {
    #[error("Invalid mesh geometry: {0}; Cannot construct Mesh!")]
    InvalidGeometry(String),

    #[error("Element {element} collapses to a point or line; Cannot evaluate basis weights!")]
    DegenerateGeometry { element: usize },

    #[error("Point ({x}, {y}) is not inside any mesh element")]
    PointNotLocated { x: f64, y: f64 },

    #[error("Only {found} valid observations (minimum {required}); Cannot interpolate!")]
    InsufficientObservations { found: usize, required: usize },

    #[error("Delaunay triangulation failed: {0}")]
    TriangulationFailure(String),

    #[error("LSQR did not converge after {iterations} iterations")]
    SolverDidNotConverge { iterations: usize },

    #[error("Least squares solution is not finite; system is numerically singular")]
    NumericalSingularity,

    #[error("No usable observations were supplied; Cannot interpolate!")]
    EmptyObservations,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for InterpolationError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl InterpolationError {
    /// Fatal errors abort the whole run; everything else only affects a single date or observation
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidGeometry(_) | Self::EmptyObservations | Self::Config(_) | Self::Io(_)
        )
    }
}

/// A date whose row could not be computed, along with the reason
#[derive(Debug, Clone, PartialEq)]
pub struct DateFailure {
    pub date: NaiveDate,
    pub error: InterpolationError,
}

pub type Result<T> = std::result::Result<T, InterpolationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_classification() {
        assert!(InterpolationError::InvalidGeometry("x".into()).is_fatal());
        assert!(InterpolationError::EmptyObservations.is_fatal());
        assert!(!InterpolationError::NumericalSingularity.is_fatal());
        assert!(!InterpolationError::InsufficientObservations {
            found: 2,
            required: 3
        }
        .is_fatal());
    }

    #[test]
    fn io_errors_convert() {
        let err: InterpolationError =
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing").into();
        assert!(matches!(err, InterpolationError::Io(_)));
    }
}
