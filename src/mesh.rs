/// Mesh cells (triangles and quadrilaterals)
pub mod element;
/// Mesh vertices
pub mod node;
/// Points and rectangles in the model's planar coordinate system
pub mod space;

pub use element::{Element, ElementShape, Triangle};
pub use node::Node;
pub use space::{BoundingBox, Point};

use crate::basis;
use crate::error::{InterpolationError, Result};
use crate::locate::PointLocator;

use smallvec::SmallVec;
use std::collections::BTreeMap;
use tracing::warn;

/// Immutable description of a 2D finite element mesh
///
/// Elements are triangles or quadrilaterals. Connectivity is supplied as IWFM-style vertex id
/// quadruples where a `0` in the 4th slot marks a triangle:
///
/// ```text
///     4 --------- 3
///     |         / |
///     |  (1)  /   |        quad [1, 2, 3, 4] is split along the 1-3 diagonal into
///     |     /     |        triangles [1, 2, 3] and [1, 3, 4]
///     |   /  (0)  |
///     | /         |
///     1 --------- 2
/// ```
#[derive(Debug, Clone)]
pub struct Mesh {
    nodes: Vec<Node>,
    elements: Vec<Element>,
    triangles: Vec<Triangle>,
    node_lookup: BTreeMap<u32, usize>,
}

impl Mesh {
    /// Construct a Mesh from a list of Nodes and element connectivity `(element_id, [v1, v2, v3, v4])`
    ///
    /// # Returns
    /// * An `InvalidGeometry` Error if a node id is repeated, a coordinate is not finite, an element
    /// references an unknown node, resolves to fewer than 3 distinct vertices, or has (nearly) zero area
    /// * A Mesh otherwise
    pub fn new(nodes: Vec<Node>, connectivity: Vec<(u32, [u32; 4])>) -> Result<Self> {
        if nodes.is_empty() {
            return Err(InterpolationError::InvalidGeometry(
                "mesh has no nodes".to_string(),
            ));
        }

        let mut node_lookup = BTreeMap::new();
        for (idx, node) in nodes.iter().enumerate() {
            if !node.coords.is_finite() {
                return Err(InterpolationError::InvalidGeometry(format!(
                    "node {} has non-finite coordinates {}",
                    node.id, node.coords
                )));
            }
            if node_lookup.insert(node.id, idx).is_some() {
                return Err(InterpolationError::InvalidGeometry(format!(
                    "node id {} is used more than once",
                    node.id
                )));
            }
        }

        let mut elements = Vec::with_capacity(connectivity.len());
        let mut triangles = Vec::with_capacity(connectivity.len() * 2);

        for (element_id, vertex_ids) in connectivity {
            let shape = resolve_shape(element_id, vertex_ids, &node_lookup)?;

            let points: SmallVec<[_; 4]> = shape
                .node_indices()
                .iter()
                .map(|&idx| nodes[idx].coords)
                .collect();
            if element::is_collapsed(&points) {
                return Err(InterpolationError::InvalidGeometry(format!(
                    "element {} has (nearly) zero area",
                    element_id
                )));
            }

            let element_idx = elements.len();
            triangles.extend(shape.split().into_iter().map(|tri| Triangle {
                element: element_idx,
                nodes: tri,
            }));
            elements.push(Element::new(element_id, shape));
        }

        Ok(Self {
            nodes,
            elements,
            triangles,
            node_lookup,
        })
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_elements(&self) -> usize {
        self.elements.len()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Triangles of the mesh (quads pre-split)
    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    /// Position of a node in the node list
    pub fn node_index(&self, node_id: u32) -> Option<usize> {
        self.node_lookup.get(&node_id).copied()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.nodes.iter().map(|n| n.id)
    }

    pub fn node_points(&self) -> Vec<Point> {
        self.nodes.iter().map(|n| n.coords).collect()
    }

    pub fn element_points(&self, element_idx: usize) -> SmallVec<[Point; 4]> {
        self.elements[element_idx]
            .shape
            .node_indices()
            .iter()
            .map(|&idx| self.nodes[idx].coords)
            .collect()
    }

    pub fn triangle_points(&self, triangle_idx: usize) -> [Point; 3] {
        let [a, b, c] = self.triangles[triangle_idx].nodes;
        [
            self.nodes[a].coords,
            self.nodes[b].coords,
            self.nodes[c].coords,
        ]
    }

    /// Vertex coordinates of every triangle, in triangle order (the input for a [PointLocator])
    pub fn triangle_geometry(&self) -> Vec<[Point; 3]> {
        (0..self.triangles.len())
            .map(|idx| self.triangle_points(idx))
            .collect()
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        BoundingBox::around(self.nodes.iter().map(|n| &n.coords))
    }

    /// Evaluate a nodal field at an arbitrary point using the native element's basis
    /// (barycentric for triangles, bilinear for quadrilaterals)
    ///
    /// * `locator`: must have been built from this Mesh's [triangle_geometry](Self::triangle_geometry)
    /// * `node_values`: one value per node, in node order
    ///
    /// Returns `None` if the point is outside the mesh
    pub fn sample(
        &self,
        locator: &dyn PointLocator,
        point: &Point,
        node_values: &[f64],
    ) -> Option<f64> {
        assert_eq!(
            node_values.len(),
            self.nodes.len(),
            "Expected one value per node; Cannot sample nodal field!"
        );

        let triangle_idx = locator.locate(point)?;
        let triangle = &self.triangles[triangle_idx];
        let element = &self.elements[triangle.element];

        let weights: SmallVec<[(usize, f64); 4]> =
            match basis::element_weights(&self.element_points(triangle.element), point) {
                Ok(weights) => element
                    .shape
                    .node_indices()
                    .iter()
                    .copied()
                    .zip(weights)
                    .collect(),
                Err(err) => {
                    let err = err.at(triangle.element, point);
                    warn!(%err, "using the triangle's barycentric weights");
                    let weights =
                        basis::barycentric(&self.triangle_points(triangle_idx), point).ok()?;
                    triangle.nodes.iter().copied().zip(weights).collect()
                }
            };

        Some(
            weights
                .iter()
                .map(|&(node_idx, w)| w * node_values[node_idx])
                .sum(),
        )
    }
}

fn resolve_shape(
    element_id: u32,
    vertex_ids: [u32; 4],
    node_lookup: &BTreeMap<u32, usize>,
) -> Result<ElementShape> {
    let num_listed = if vertex_ids[3] == 0 { 3 } else { 4 };

    let mut indices: SmallVec<[usize; 4]> = SmallVec::new();
    for &vertex_id in vertex_ids.iter().take(num_listed) {
        let idx = node_lookup.get(&vertex_id).copied().ok_or_else(|| {
            InterpolationError::InvalidGeometry(format!(
                "element {} references unknown node {}",
                element_id, vertex_id
            ))
        })?;
        if !indices.contains(&idx) {
            indices.push(idx);
        }
    }

    match indices.as_slice() {
        &[a, b, c] => Ok(ElementShape::Triangle([a, b, c])),
        &[a, b, c, d] => Ok(ElementShape::Quad([a, b, c, d])),
        _ => Err(InterpolationError::InvalidGeometry(format!(
            "element {} has fewer than 3 distinct vertices",
            element_id
        ))),
    }
}
