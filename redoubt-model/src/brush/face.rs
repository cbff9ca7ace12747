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

use redoubt_core::{
    algebra::Vector3,
    math::{plane::Plane, snap_to_integer},
};

/// The name a face with no material is written as.
pub const EMPTY_MATERIAL_SENTINEL: &str = "__TB_empty";

/// One texture-space axis of a Valve 220 face: a direction and an offset along
/// it.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct UvAxis {
    pub axis: Vector3<f64>,
    pub offset: f64,
}

impl UvAxis {
    pub fn new(axis: Vector3<f64>, offset: f64) -> Self {
        Self { axis, offset }
    }
}

/// Material and UV metadata of a face. Fields beyond the five standard ones
/// are populated only for the formats that carry them.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceAttributes {
    /// Material name; empty for faces loaded as `__TB_empty`.
    pub material_name: String,
    pub x_offset: f64,
    pub y_offset: f64,
    pub rotation: f64,
    pub x_scale: f64,
    pub y_scale: f64,
    /// `contents flags value` triple of the Quake 2 family.
    pub surface_contents: Option<i32>,
    pub surface_flags: Option<i32>,
    pub surface_value: Option<f64>,
    /// Per-face color triple of Daikatana.
    pub color: Option<[i32; 3]>,
    /// Bracketed texture axes of the Valve 220 family.
    pub uv_axes: Option<[UvAxis; 2]>,
    /// Texture matrix rows of the Quake 3 `brushDef` primitive form. A brush
    /// with this set on its faces is written back in primitive form.
    pub primitive_matrix: Option<[[f64; 3]; 2]>,
}

impl Default for FaceAttributes {
    fn default() -> Self {
        Self {
            material_name: String::new(),
            x_offset: 0.0,
            y_offset: 0.0,
            rotation: 0.0,
            x_scale: 1.0,
            y_scale: 1.0,
            surface_contents: None,
            surface_flags: None,
            surface_value: None,
            color: None,
            uv_axes: None,
            primitive_matrix: None,
        }
    }
}

impl FaceAttributes {
    pub fn with_material<S: Into<String>>(material_name: S) -> Self {
        Self {
            material_name: material_name.into(),
            ..Default::default()
        }
    }
}

/// One half-space of a brush: three generating points (the `.map`
/// representation), the plane derived from them, and the attribute block. The
/// polygon is filled in when the owning brush rebuilds its geometry.
#[derive(Clone, Debug)]
pub struct BrushFace {
    points: [Vector3<f64>; 3],
    plane: Plane,
    pub attributes: FaceAttributes,
    pub(crate) polygon: Vec<Vector3<f64>>,
}

impl BrushFace {
    /// Fails on collinear points.
    pub fn new(points: [Vector3<f64>; 3], attributes: FaceAttributes) -> Option<Self> {
        let plane = Plane::from_points(&points[0], &points[1], &points[2])?;
        Some(Self {
            points,
            plane,
            attributes,
            polygon: Vec::new(),
        })
    }

    /// A face lying on the given plane with synthesized generating points, used
    /// by clipping where no three integral points are available.
    pub fn on_plane(plane: Plane, attributes: FaceAttributes) -> Self {
        // Any orthonormal in-plane basis yields valid generators; winding must
        // reproduce the plane normal.
        let origin = plane.project(&Vector3::zeros());
        let reference = if plane.normal.x.abs() < 0.9 {
            Vector3::x()
        } else {
            Vector3::y()
        };
        let u = plane.normal.cross(&reference).normalize();
        let v = plane.normal.cross(&u);
        let points = [origin, origin + v, origin + u];
        debug_assert!(
            Plane::from_points(&points[0], &points[1], &points[2])
                .map(|p| p.normal.dot(&plane.normal) > 0.99)
                .unwrap_or(false)
        );
        Self {
            points,
            plane,
            attributes,
            polygon: Vec::new(),
        }
    }

    #[inline]
    pub fn points(&self) -> &[Vector3<f64>; 3] {
        &self.points
    }

    #[inline]
    pub fn plane(&self) -> &Plane {
        &self.plane
    }

    /// The face polygon computed by the last geometry rebuild, ordered around
    /// the face.
    #[inline]
    pub fn polygon(&self) -> &[Vector3<f64>] {
        &self.polygon
    }

    pub fn center(&self) -> Vector3<f64> {
        if self.polygon.is_empty() {
            (self.points[0] + self.points[1] + self.points[2]) / 3.0
        } else {
            self.polygon.iter().sum::<Vector3<f64>>() / self.polygon.len() as f64
        }
    }

    /// Maps the generating points through a transform, optionally snapping the
    /// results to the integer grid (valid for rigid transforms only). Fails if
    /// the mapped points collapse.
    pub fn map_points<F: Fn(Vector3<f64>) -> Vector3<f64>>(&self, f: F, snap: bool) -> Option<Self> {
        let mut points = self.points.map(f);
        if snap {
            points = points.map(snap_to_integer);
        }
        let plane = Plane::from_points(&points[0], &points[1], &points[2])?;
        Some(Self {
            points,
            plane,
            attributes: self.attributes.clone(),
            polygon: Vec::new(),
        })
    }
}
