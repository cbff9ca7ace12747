// Copyright (c) 2019-present Dmitry Stepanov and Fyrox Engine contributors.
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! Brushes: convex polyhedra given as intersections of face half-spaces. The
//! vertex/polygon mesh is derived from the faces and rebuilt after every
//! mutation; a brush whose mesh degenerates is invalid and the mutation that
//! produced it fails.

pub mod face;
pub mod uv;

pub use face::{BrushFace, FaceAttributes, UvAxis, EMPTY_MATERIAL_SENTINEL};

use crate::error::MapError;
use redoubt_core::{
    algebra::{Matrix4, Point3, Vector3},
    math::{is_rigid, plane::Plane, Bounds3},
};

/// Distance tolerance for point-in-brush and plane agreement tests.
pub const GEOMETRY_EPSILON: f64 = 1e-4;

/// A convex polyhedron with per-face material data.
#[derive(Clone, Debug)]
pub struct Brush {
    faces: Vec<BrushFace>,
    vertices: Vec<Vector3<f64>>,
    bounds: Bounds3,
}

impl Brush {
    /// Builds a brush from its faces, deriving the mesh. Fails if the
    /// half-space intersection has fewer than four vertices or any face
    /// polygon drifts off its generating plane.
    pub fn new(faces: Vec<BrushFace>) -> Result<Self, MapError> {
        let mut brush = Self {
            faces,
            vertices: Vec::new(),
            bounds: Bounds3::default(),
        };
        brush.rebuild_geometry()?;
        Ok(brush)
    }

    /// An axis-aligned cuboid, mostly used by tests and by brush-creation
    /// tools.
    pub fn cuboid(
        min: Vector3<f64>,
        max: Vector3<f64>,
        material: &str,
    ) -> Result<Self, MapError> {
        if min.x >= max.x || min.y >= max.y || min.z >= max.z {
            return Err(MapError::Geometry(format!(
                "degenerate cuboid extents {min:?}..{max:?}"
            )));
        }
        // For each axis-aligned plane, pick generators (a, a + v, a + u) such
        // that u x v points out of the cuboid.
        let face = |a: Vector3<f64>, u: Vector3<f64>, v: Vector3<f64>| {
            BrushFace::new([a, a + v, a + u], FaceAttributes::with_material(material))
                .expect("cuboid generators are never collinear")
        };
        let (x, y, z) = (Vector3::x(), Vector3::y(), Vector3::z());
        Self::new(vec![
            face(Vector3::new(max.x, min.y, min.z), y, z), // +x
            face(Vector3::new(min.x, min.y, min.z), z, y), // -x
            face(Vector3::new(min.x, max.y, min.z), z, x), // +y
            face(Vector3::new(min.x, min.y, min.z), x, z), // -y
            face(Vector3::new(min.x, min.y, max.z), y, x), // +z
            face(Vector3::new(min.x, min.y, min.z), x, y), // -z
        ])
    }

    #[inline]
    pub fn faces(&self) -> &[BrushFace] {
        &self.faces
    }

    #[inline]
    pub fn faces_mut(&mut self) -> &mut [BrushFace] {
        &mut self.faces
    }

    /// Deduplicated mesh vertices.
    #[inline]
    pub fn vertices(&self) -> &[Vector3<f64>] {
        &self.vertices
    }

    #[inline]
    pub fn bounds(&self) -> Bounds3 {
        self.bounds
    }

    pub fn contains_point(&self, point: Vector3<f64>) -> bool {
        self.faces
            .iter()
            .all(|face| face.plane().signed_distance(&point) < GEOMETRY_EPSILON)
    }

    /// True if every vertex of `other` lies inside this brush.
    pub fn contains_brush(&self, other: &Brush) -> bool {
        other.vertices.iter().all(|v| self.contains_point(*v))
    }

    /// Convex overlap test via face-plane separation, the test the selection
    /// volume queries use.
    pub fn intersects_brush(&self, other: &Brush) -> bool {
        if !self.bounds.intersects(&other.bounds) {
            return false;
        }
        let separated_by = |faces: &[BrushFace], vertices: &[Vector3<f64>]| {
            faces.iter().any(|face| {
                vertices
                    .iter()
                    .all(|v| face.plane().signed_distance(v) > GEOMETRY_EPSILON)
            })
        };
        !separated_by(&self.faces, &other.vertices) && !separated_by(&other.faces, &self.vertices)
    }

    /// Recomputes vertices and per-face polygons from the half-spaces.
    fn rebuild_geometry(&mut self) -> Result<(), MapError> {
        let planes: Vec<Plane> = self.faces.iter().map(|f| *f.plane()).collect();
        let mut face_vertices: Vec<Vec<Vector3<f64>>> = vec![Vec::new(); planes.len()];
        let mut vertices: Vec<Vector3<f64>> = Vec::new();

        for i in 0..planes.len() {
            for j in i + 1..planes.len() {
                for k in j + 1..planes.len() {
                    let Some(point) = planes[i].intersection_point(&planes[j], &planes[k]) else {
                        continue;
                    };
                    // Discard intersections outside the hull.
                    if planes
                        .iter()
                        .any(|p| p.signed_distance(&point) > GEOMETRY_EPSILON)
                    {
                        continue;
                    }
                    for index in [i, j, k] {
                        push_unique(&mut face_vertices[index], point);
                    }
                    push_unique(&mut vertices, point);
                }
            }
        }

        if vertices.len() < 4 {
            return Err(MapError::Geometry(format!(
                "brush collapses to {} vertices",
                vertices.len()
            )));
        }

        // Every face polygon must agree with the plane of its generators.
        for (face, polygon) in self.faces.iter().zip(&face_vertices) {
            for vertex in polygon {
                if face.plane().distance(vertex) > GEOMETRY_EPSILON {
                    return Err(MapError::Geometry(format!(
                        "face \"{}\" drifts off its generating plane",
                        face.attributes.material_name
                    )));
                }
            }
        }

        // Drop faces clipped away entirely (redundant half-spaces), then order
        // each remaining polygon counterclockwise around the face normal.
        let mut faces = std::mem::take(&mut self.faces);
        let mut kept = Vec::with_capacity(faces.len());
        for (mut face, polygon) in faces.drain(..).zip(face_vertices) {
            if polygon.len() < 3 {
                continue;
            }
            face.polygon = sort_winding(polygon, face.plane().normal);
            kept.push(face);
        }

        if kept.len() < 4 {
            return Err(MapError::Geometry(format!(
                "brush has only {} contributing faces",
                kept.len()
            )));
        }

        self.faces = kept;
        self.bounds = Bounds3::from_points(vertices.iter().copied());
        self.vertices = vertices;
        Ok(())
    }

    /// Applies a transform to the brush, remapping generating points and
    /// rebuilding the mesh. Rigid transforms snap the mapped points back to
    /// the integer grid; the failure is atomic (`self` is untouched on error).
    pub fn transformed(
        &self,
        m: &Matrix4<f64>,
        uv_lock: bool,
    ) -> Result<Self, MapError> {
        let rigid = is_rigid(m, 1e-9);
        let mut faces = Vec::with_capacity(self.faces.len());
        for face in &self.faces {
            let mut mapped = face
                .map_points(|p| m.transform_point(&Point3::from(p)).coords, rigid)
                .ok_or_else(|| {
                    MapError::Geometry("transform collapses face generators".to_owned())
                })?;
            if uv_lock {
                uv::lock_face_uv(face, &mut mapped, m);
            }
            faces.push(mapped);
        }
        Self::new(faces)
    }

    /// Cuts away everything in front of the plane. Returns `None` if nothing
    /// remains behind it.
    pub fn clipped(&self, plane: Plane, attributes: FaceAttributes) -> Option<Self> {
        // Quick outs: the plane does not cut the hull at all.
        let distances: Vec<f64> = self
            .vertices
            .iter()
            .map(|v| plane.signed_distance(v))
            .collect();
        if distances.iter().all(|d| *d >= -GEOMETRY_EPSILON) {
            return None;
        }
        if distances.iter().all(|d| *d <= GEOMETRY_EPSILON) {
            return Some(self.clone());
        }

        let mut faces = self.faces.clone();
        faces.push(BrushFace::on_plane(plane, attributes));
        Self::new(faces).ok()
    }

    /// Subtracts `other` from this brush, returning the convex fragments of
    /// the remainder. A brush entirely inside `other` yields no fragments.
    pub fn subtract(&self, other: &Brush) -> Vec<Brush> {
        if !self.intersects_brush(other) {
            return vec![self.clone()];
        }

        let mut fragments = Vec::new();
        let mut remainder = Some(self.clone());

        for face in &other.faces {
            let Some(current) = remainder.as_ref() else {
                break;
            };
            // The part in front of this face is outside `other`; keep it.
            if let Some(outside) =
                current.clipped(face.plane().flipped(), face.attributes.clone())
            {
                fragments.push(outside);
            }
            // Continue subdividing the part behind the face.
            remainder = current.clipped(*face.plane(), face.attributes.clone());
        }

        fragments
    }
}

fn push_unique(list: &mut Vec<Vector3<f64>>, point: Vector3<f64>) {
    if !list
        .iter()
        .any(|existing| (existing - point).norm() < GEOMETRY_EPSILON)
    {
        list.push(point);
    }
}

/// Orders polygon vertices by angle around their center within the face plane.
fn sort_winding(mut polygon: Vec<Vector3<f64>>, normal: Vector3<f64>) -> Vec<Vector3<f64>> {
    let center = polygon.iter().sum::<Vector3<f64>>() / polygon.len() as f64;
    let reference = polygon[0] - center;
    polygon.sort_by(|a, b| {
        let angle = |p: &Vector3<f64>| {
            let v = p - center;
            v.cross(&reference).dot(&normal).atan2(reference.dot(&v))
        };
        angle(a).partial_cmp(&angle(b)).unwrap_or(std::cmp::Ordering::Equal)
    });
    polygon
}
