use super::Point;

/// A vertex of the finite element mesh
///
/// `gse` is the ground surface elevation at the node (NaN when unknown). It is only needed
/// to convert depth-to-water observations into heads.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: u32,
    pub coords: Point,
    pub gse: f64,
}

impl Node {
    pub fn new(id: u32, coords: Point, gse: f64) -> Self {
        Self { id, coords, gse }
    }

    /// A node without ground surface information
    pub fn at(id: u32, x: f64, y: f64) -> Self {
        Self::new(id, Point::new(x, y), f64::NAN)
    }
}
