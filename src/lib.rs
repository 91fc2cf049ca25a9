/// Barycentric and bilinear basis weights
pub mod basis;
/// Run configuration and JSON loading
pub mod config;
/// Per-date interpolation over a sequence of target dates
pub mod driver;
/// Error taxonomy
pub mod error;
/// Regularized least-squares fit of nodal values
pub mod fit;
/// Sparse matrices and the LSQR solver
pub mod linalg;
/// Finding the mesh triangle which contains a point
pub mod locate;
/// 2D finite element mesh with triangles and quadrilaterals
pub mod mesh;
/// Observation wells, measurements and temporal windows
pub mod observations;
/// Interpolated (date x node) tables
pub mod result;
/// Delaunay-based interpolation of scattered observations
pub mod scattered;

pub use config::{ConfigError, InterpolationConfig, Method, ObservedQuantity};
pub use driver::{interpolate_observations, SpatialInterpolator, TemporalDriver};
pub use error::{DateFailure, InterpolationError};
pub use fit::LeastSquaresFitter;
pub use locate::{LocatorKind, PointLocator};
pub use mesh::{Mesh, Node, Point};
pub use observations::{Aggregation, Measurement, ObservationSet, Station, TemporalWindow};
pub use result::InterpolationResult;
pub use scattered::ScatteredInterpolator;
