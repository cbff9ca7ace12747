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

//! Bézier patches of the Quake 3 family: a control-point grid with odd row and
//! column counts, evaluated as quadratic Bézier spans.

use crate::error::MapError;
use redoubt_core::{
    algebra::{Matrix4, Point3, Vector2, Vector3},
    math::Bounds3,
};

/// One control point: a position and its UV coordinates.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PatchControlPoint {
    pub position: Vector3<f64>,
    pub uv: Vector2<f64>,
}

impl PatchControlPoint {
    pub fn new(position: Vector3<f64>, uv: Vector2<f64>) -> Self {
        Self { position, uv }
    }
}

/// Payload of a patch node.
#[derive(Clone, Debug, PartialEq)]
pub struct Patch {
    rows: usize,
    columns: usize,
    control_points: Vec<PatchControlPoint>,
    material_name: String,
}

impl Patch {
    /// Validates the grid: both dimensions must be odd and at least three, and
    /// the point count must match.
    pub fn new<S: Into<String>>(
        rows: usize,
        columns: usize,
        control_points: Vec<PatchControlPoint>,
        material_name: S,
    ) -> Result<Self, MapError> {
        if rows < 3 || columns < 3 || rows % 2 == 0 || columns % 2 == 0 {
            return Err(MapError::Geometry(format!(
                "invalid patch grid {rows}x{columns}: dimensions must be odd and >= 3"
            )));
        }
        if control_points.len() != rows * columns {
            return Err(MapError::Geometry(format!(
                "patch grid {rows}x{columns} requires {} control points, got {}",
                rows * columns,
                control_points.len()
            )));
        }
        Ok(Self {
            rows,
            columns,
            control_points,
            material_name: material_name.into(),
        })
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn columns(&self) -> usize {
        self.columns
    }

    #[inline]
    pub fn control_points(&self) -> &[PatchControlPoint] {
        &self.control_points
    }

    #[inline]
    pub fn control_point(&self, row: usize, column: usize) -> &PatchControlPoint {
        &self.control_points[row * self.columns + column]
    }

    #[inline]
    pub fn material_name(&self) -> &str {
        &self.material_name
    }

    pub fn set_material_name<S: Into<String>>(&mut self, name: S) -> String {
        std::mem::replace(&mut self.material_name, name.into())
    }

    /// Bounds of the control hull; the surface never leaves it.
    pub fn hull_bounds(&self) -> Bounds3 {
        Bounds3::from_points(self.control_points.iter().map(|p| p.position))
    }

    /// Bounds of the evaluated surface, sampled per quadratic span.
    pub fn surface_bounds(&self) -> Bounds3 {
        const SAMPLES: usize = 4;
        let mut bounds = Bounds3::default();
        for si in 0..=(self.rows - 3) / 2 {
            for sj in 0..=(self.columns - 3) / 2 {
                for u in 0..=SAMPLES {
                    for v in 0..=SAMPLES {
                        bounds.add_point(self.evaluate_span(
                            si * 2,
                            sj * 2,
                            u as f64 / SAMPLES as f64,
                            v as f64 / SAMPLES as f64,
                        ));
                    }
                }
            }
        }
        bounds
    }

    /// Evaluates one 3x3 quadratic Bézier span anchored at `(row, column)`.
    fn evaluate_span(&self, row: usize, column: usize, u: f64, v: f64) -> Vector3<f64> {
        let basis = |t: f64| {
            let s = 1.0 - t;
            [s * s, 2.0 * s * t, t * t]
        };
        let bu = basis(u);
        let bv = basis(v);
        let mut result = Vector3::zeros();
        for (i, bu) in bu.iter().enumerate() {
            for (j, bv) in bv.iter().enumerate() {
                result += self
                    .control_point(row + i, column + j)
                    .position
                    .scale(bu * bv);
            }
        }
        result
    }

    /// Maps every control point through the transform. Patches cannot become
    /// invalid under affine maps, so this never fails.
    #[must_use]
    pub fn transformed(&self, m: &Matrix4<f64>) -> Self {
        let mut patch = self.clone();
        for point in &mut patch.control_points {
            point.position = m.transform_point(&Point3::from(point.position)).coords;
        }
        patch
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn flat_grid(rows: usize, columns: usize) -> Vec<PatchControlPoint> {
        let mut points = Vec::new();
        for row in 0..rows {
            for column in 0..columns {
                points.push(PatchControlPoint::new(
                    Vector3::new(column as f64 * 16.0, row as f64 * 16.0, 0.0),
                    Vector2::new(column as f64, row as f64),
                ));
            }
        }
        points
    }

    #[test]
    fn grid_validation() {
        assert!(Patch::new(3, 3, flat_grid(3, 3), "common/caulk").is_ok());
        assert!(Patch::new(5, 3, flat_grid(5, 3), "m").is_ok());
        // Even dimensions are rejected.
        assert!(Patch::new(4, 3, flat_grid(4, 3), "m").is_err());
        assert!(Patch::new(3, 2, flat_grid(3, 2), "m").is_err());
        // Too small.
        assert!(Patch::new(1, 3, flat_grid(1, 3), "m").is_err());
        // Point count mismatch.
        assert!(Patch::new(3, 3, flat_grid(3, 4), "m").is_err());
    }

    #[test]
    fn flat_patch_surface_stays_in_hull() {
        let patch = Patch::new(3, 3, flat_grid(3, 3), "m").unwrap();
        let hull = patch.hull_bounds();
        let surface = patch.surface_bounds();
        assert!(hull.contains_bounds(&surface));
        // A flat grid evaluates to the flat rectangle.
        assert_eq!(surface.min.z, 0.0);
        assert_eq!(surface.max.z, 0.0);
    }

    #[test]
    fn curved_patch_bows_inside_hull() {
        let mut points = flat_grid(3, 3);
        // Raise the central control point; the surface bows upward but stays
        // below the control point.
        points[4].position.z = 16.0;
        let patch = Patch::new(3, 3, points, "m").unwrap();
        let surface = patch.surface_bounds();
        assert!(surface.max.z > 0.0);
        assert!(surface.max.z < 16.0);
    }

    #[test]
    fn transform_moves_control_points() {
        let patch = Patch::new(3, 3, flat_grid(3, 3), "m").unwrap();
        let moved = patch.transformed(&Matrix4::new_translation(&Vector3::new(0.0, 0.0, 64.0)));
        assert_eq!(moved.control_point(0, 0).position, Vector3::new(0.0, 0.0, 64.0));
        assert_eq!(moved.control_point(0, 0).uv, Vector2::new(0.0, 0.0));
    }
}
