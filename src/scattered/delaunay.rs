use crate::error::{InterpolationError, Result};
use crate::mesh::element::MIN_RELATIVE_AREA;
use crate::mesh::{BoundingBox, Point};

use std::collections::HashSet;

/// Delaunay triangulation of a planar point set
///
/// Triangles reference `points` by index and are counter-clockwise.
#[derive(Debug, Clone)]
pub struct Triangulation {
    points: Vec<Point>,
    triangles: Vec<[usize; 3]>,
}

/// Vertex at infinity closing every hull edge into a triangle
const GHOST: usize = usize::MAX;

/// Twice the signed area of `abc`; positive for counter-clockwise
fn orient(a: &Point, b: &Point, c: &Point) -> f64 {
    (*b - *a).cross(&(*c - *a))
}

/// Positive when `p` lies strictly inside the circle through the counter-clockwise triangle `abc`
fn in_circle(a: &Point, b: &Point, c: &Point, p: &Point) -> f64 {
    let ad = *a - *p;
    let bd = *b - *p;
    let cd = *c - *p;

    (ad.x * ad.x + ad.y * ad.y) * bd.cross(&cd)
        + (bd.x * bd.x + bd.y * bd.y) * cd.cross(&ad)
        + (cd.x * cd.x + cd.y * cd.y) * ad.cross(&bd)
}

/// Whether inserting `p` destroys `tri`
///
/// A ghost triangle `[u, v, GHOST]` stands for the half-plane left of the hull edge `u -> v`; its
/// "circumcircle" also contains the open edge itself.
fn conflicts(vertices: &[Point], [a, b, c]: [usize; 3], p: &Point) -> bool {
    if c == GHOST {
        let (u, v) = (&vertices[a], &vertices[b]);
        let side = orient(u, v, p);
        if side != 0.0 {
            return side > 0.0;
        }
        let (pu, vu) = (*p - *u, *v - *u);
        let (pv, uv) = (*p - *v, *u - *v);
        pu.x * vu.x + pu.y * vu.y > 0.0 && pv.x * uv.x + pv.y * uv.y > 0.0
    } else {
        in_circle(&vertices[a], &vertices[b], &vertices[c], p) > 0.0
    }
}

impl Triangulation {
    /// Bowyer-Watson incremental construction
    ///
    /// Starts from the best-conditioned triangle of the set, closed by ghost triangles which join
    /// each hull edge to a vertex at infinity. Every triangle in conflict with a new point is
    /// removed and the resulting cavity is re-triangulated from that point. Points outside the
    /// current hull only conflict with the ghosts of the hull edges they can see, so the final
    /// triangles cover the whole convex hull.
    ///
    /// `points` must be free of duplicates.
    ///
    /// # Returns
    /// * A `TriangulationFailure` Error if there are fewer than 3 points, or all points are co-linear
    pub fn new(points: Vec<Point>) -> Result<Self> {
        if points.len() < 3 {
            return Err(InterpolationError::TriangulationFailure(format!(
                "{} points cannot be triangulated",
                points.len()
            )));
        }

        let bb = BoundingBox::around(points.iter()).ok_or_else(|| {
            InterpolationError::TriangulationFailure("no points to triangulate".to_string())
        })?;
        let size = bb.width().max(bb.height());
        if size == 0.0 || !size.is_finite() {
            return Err(InterpolationError::TriangulationFailure(
                "points do not span a region".to_string(),
            ));
        }

        let [a, mut b, mut c] = seed_triangle(&points);
        let seed_area = orient(&points[a], &points[b], &points[c]);
        if seed_area.abs() <= MIN_RELATIVE_AREA * size * size {
            return Err(InterpolationError::TriangulationFailure(
                "points are co-linear".to_string(),
            ));
        }
        if seed_area < 0.0 {
            std::mem::swap(&mut b, &mut c);
        }

        let mut triangles = vec![[a, b, c], [b, a, GHOST], [c, b, GHOST], [a, c, GHOST]];

        for (p_idx, p) in points.iter().enumerate() {
            if p_idx == a || p_idx == b || p_idx == c {
                continue;
            }

            let (bad, good): (Vec<_>, Vec<_>) = triangles
                .into_iter()
                .partition(|tri| conflicts(&points, *tri, p));
            triangles = good;

            // edges of the cavity are those which are not shared by two removed triangles
            let cavity_edges: HashSet<[usize; 2]> = bad
                .iter()
                .flat_map(|&[x, y, z]| [[x, y], [y, z], [z, x]])
                .collect();

            for &[u, v] in cavity_edges.iter() {
                if cavity_edges.contains(&[v, u]) {
                    continue;
                }
                triangles.push(if u == GHOST {
                    [v, p_idx, GHOST]
                } else if v == GHOST {
                    [p_idx, u, GHOST]
                } else {
                    [u, v, p_idx]
                });
            }
        }

        let mut triangles: Vec<[usize; 3]> = triangles
            .into_iter()
            .filter(|tri| !tri.contains(&GHOST))
            .filter(|&[x, y, z]| orient(&points[x], &points[y], &points[z]) > 0.0)
            .collect();
        // deterministic triangle order independent of hash iteration
        triangles.sort_unstable();

        Ok(Self { points, triangles })
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn triangles(&self) -> &[[usize; 3]] {
        &self.triangles
    }

    /// Vertex coordinates of each triangle
    pub fn triangle_geometry(&self) -> Vec<[Point; 3]> {
        self.triangles
            .iter()
            .map(|&[a, b, c]| [self.points[a], self.points[b], self.points[c]])
            .collect()
    }
}

/// Index of the point with the largest score (the first one on ties)
fn argmax(points: &[Point], score: impl Fn(&Point) -> f64) -> usize {
    let mut best = (0, f64::NEG_INFINITY);
    for (idx, p) in points.iter().enumerate() {
        let s = score(p);
        if s > best.1 {
            best = (idx, s);
        }
    }
    best.0
}

/// First point, the point farthest from it, and the point farthest from the line through both
fn seed_triangle(points: &[Point]) -> [usize; 3] {
    let a = 0;
    let b = argmax(points, |p| points[a].dist_sq(p));
    let c = argmax(points, |p| orient(&points[a], &points[b], p).abs());
    [a, b, c]
}
