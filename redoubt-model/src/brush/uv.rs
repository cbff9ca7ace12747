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

//! UV locking: keeping a face's material placement fixed in world space while
//! the face moves. Valve-style faces carry explicit texture axes that can be
//! mapped through the transform exactly; standard paraxial faces are locked by
//! preserving the UV coordinates of the face center.

use crate::brush::face::BrushFace;
use redoubt_core::algebra::{Matrix3, Matrix4, Vector2, Vector3};

/// The classic paraxial base-axis table: texture axes are chosen by the
/// dominant axis of the face normal.
const BASE_AXES: [(Vector3<f64>, Vector3<f64>, Vector3<f64>); 6] = [
    (
        Vector3::new(0.0, 0.0, 1.0),
        Vector3::new(1.0, 0.0, 0.0),
        Vector3::new(0.0, -1.0, 0.0),
    ),
    (
        Vector3::new(0.0, 0.0, -1.0),
        Vector3::new(1.0, 0.0, 0.0),
        Vector3::new(0.0, -1.0, 0.0),
    ),
    (
        Vector3::new(1.0, 0.0, 0.0),
        Vector3::new(0.0, 1.0, 0.0),
        Vector3::new(0.0, 0.0, -1.0),
    ),
    (
        Vector3::new(-1.0, 0.0, 0.0),
        Vector3::new(0.0, 1.0, 0.0),
        Vector3::new(0.0, 0.0, -1.0),
    ),
    (
        Vector3::new(0.0, 1.0, 0.0),
        Vector3::new(1.0, 0.0, 0.0),
        Vector3::new(0.0, 0.0, -1.0),
    ),
    (
        Vector3::new(0.0, -1.0, 0.0),
        Vector3::new(1.0, 0.0, 0.0),
        Vector3::new(0.0, 0.0, -1.0),
    ),
];

/// Unrotated paraxial texture axes for a face normal.
pub fn paraxial_axes(normal: &Vector3<f64>) -> (Vector3<f64>, Vector3<f64>) {
    let mut best = 0;
    let mut best_dot = f64::NEG_INFINITY;
    for (index, (axis, _, _)) in BASE_AXES.iter().enumerate() {
        let dot = normal.dot(axis);
        if dot > best_dot {
            best_dot = dot;
            best = index;
        }
    }
    (BASE_AXES[best].1, BASE_AXES[best].2)
}

/// Paraxial axes with the face's rotation attribute applied in the UV plane.
fn rotated_paraxial_axes(
    normal: &Vector3<f64>,
    rotation_degrees: f64,
) -> (Vector3<f64>, Vector3<f64>) {
    let (u, v) = paraxial_axes(normal);
    let (sin, cos) = rotation_degrees.to_radians().sin_cos();
    (u.scale(cos) + v.scale(sin), v.scale(cos) - u.scale(sin))
}

/// The UV coordinates of a world-space point on a standard-format face.
pub fn paraxial_uv(face: &BrushFace, point: &Vector3<f64>) -> Vector2<f64> {
    let attributes = &face.attributes;
    let (u, v) = rotated_paraxial_axes(&face.plane().normal, attributes.rotation);
    let x_scale = nonzero(attributes.x_scale);
    let y_scale = nonzero(attributes.y_scale);
    Vector2::new(
        point.dot(&u) / x_scale + attributes.x_offset,
        point.dot(&v) / y_scale + attributes.y_offset,
    )
}

/// Adjusts `new_face`'s attributes so its material keeps its world-space
/// placement across the transform that produced it from `face`.
pub fn lock_face_uv(face: &BrushFace, new_face: &mut BrushFace, m: &Matrix4<f64>) {
    let linear: Matrix3<f64> = m.fixed_view::<3, 3>(0, 0).into_owned();
    let translation = Vector3::new(m[(0, 3)], m[(1, 3)], m[(2, 3)]);

    if let Some(axes) = face.attributes.uv_axes {
        // Valve-style: the axes transform exactly. A scaling transform changes
        // the axis length; fold it into the scale attribute.
        let x_scale = nonzero(face.attributes.x_scale);
        let y_scale = nonzero(face.attributes.y_scale);
        let mapped_x = linear * axes[0].axis;
        let mapped_y = linear * axes[1].axis;
        let (len_x, len_y) = (mapped_x.norm(), mapped_y.norm());
        if len_x < f64::EPSILON || len_y < f64::EPSILON {
            return;
        }
        let new_x_scale = x_scale * len_x;
        let new_y_scale = y_scale * len_y;
        let new_x_axis = mapped_x.unscale(len_x);
        let new_y_axis = mapped_y.unscale(len_y);

        let attributes = &mut new_face.attributes;
        attributes.x_scale = new_x_scale;
        attributes.y_scale = new_y_scale;
        attributes.uv_axes = Some([
            super::UvAxis::new(
                new_x_axis,
                axes[0].offset - new_x_axis.dot(&translation) / new_x_scale,
            ),
            super::UvAxis::new(
                new_y_axis,
                axes[1].offset - new_y_axis.dot(&translation) / new_y_scale,
            ),
        ]);
    } else {
        // Standard paraxial: preserve the UV of the face center. Exact for
        // translations and for rotations that keep the dominant axis.
        let old_center = face.center();
        let target_uv = paraxial_uv(face, &old_center);
        let new_center = m
            .transform_point(&redoubt_core::algebra::Point3::from(old_center))
            .coords;

        let normal = new_face.plane().normal;
        let attributes = &mut new_face.attributes;
        let (u, v) = rotated_paraxial_axes(&normal, attributes.rotation);
        let x_scale = nonzero(attributes.x_scale);
        let y_scale = nonzero(attributes.y_scale);
        attributes.x_offset = target_uv.x - new_center.dot(&u) / x_scale;
        attributes.y_offset = target_uv.y - new_center.dot(&v) / y_scale;
    }
}

fn nonzero(scale: f64) -> f64 {
    if scale.abs() < f64::EPSILON {
        1.0
    } else {
        scale
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::brush::{Brush, FaceAttributes, UvAxis};

    fn floor_face(brush: &Brush) -> &BrushFace {
        brush
            .faces()
            .iter()
            .find(|f| f.plane().normal.z > 0.9)
            .unwrap()
    }

    #[test]
    fn dominant_axis_selection() {
        let (u, v) = paraxial_axes(&Vector3::new(0.1, -0.2, 0.95));
        assert_eq!(u, Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(v, Vector3::new(0.0, -1.0, 0.0));

        let (u, _) = paraxial_axes(&Vector3::new(-0.9, 0.1, 0.1));
        assert_eq!(u, Vector3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn paraxial_lock_survives_translation() {
        let brush = Brush::cuboid(
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(32.0, 32.0, 32.0),
            "wall",
        )
        .unwrap();
        let translation = Matrix4::new_translation(&Vector3::new(16.0, 8.0, 0.0));
        let moved = brush.transformed(&translation, true).unwrap();

        let old_face = floor_face(&brush);
        let new_face = floor_face(&moved);
        // A point of the face and its image must keep the same UV.
        let p = Vector3::new(4.0, 4.0, 32.0);
        let p_moved = p + Vector3::new(16.0, 8.0, 0.0);
        let uv_before = paraxial_uv(old_face, &p);
        let uv_after = paraxial_uv(new_face, &p_moved);
        assert!((uv_before - uv_after).norm() < 1e-9);
    }

    #[test]
    fn unlocked_translation_keeps_offsets() {
        let brush = Brush::cuboid(
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(32.0, 32.0, 32.0),
            "wall",
        )
        .unwrap();
        let translation = Matrix4::new_translation(&Vector3::new(16.0, 8.0, 0.0));
        let moved = brush.transformed(&translation, false).unwrap();
        let old_face = floor_face(&brush);
        let new_face = floor_face(&moved);
        assert_eq!(
            old_face.attributes.x_offset,
            new_face.attributes.x_offset
        );
        assert_eq!(
            old_face.attributes.y_offset,
            new_face.attributes.y_offset
        );
    }

    #[test]
    fn valve_axes_compensate_translation() {
        let mut faces = Brush::cuboid(
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(32.0, 32.0, 32.0),
            "wall",
        )
        .unwrap()
        .faces()
        .to_vec();
        for face in &mut faces {
            face.attributes.uv_axes = Some([
                UvAxis::new(Vector3::new(1.0, 0.0, 0.0), 0.0),
                UvAxis::new(Vector3::new(0.0, -1.0, 0.0), 0.0),
            ]);
        }
        let brush = Brush::new(faces).unwrap();
        let moved = brush
            .transformed(&Matrix4::new_translation(&Vector3::new(16.0, 0.0, 0.0)), true)
            .unwrap();
        let axes = moved.faces()[0].attributes.uv_axes.unwrap();
        assert_eq!(axes[0].axis, Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(axes[0].offset, -16.0);
        assert_eq!(axes[1].offset, 0.0);
    }

    #[test]
    fn default_attributes_have_unit_scale() {
        let attributes = FaceAttributes::default();
        assert_eq!(attributes.x_scale, 1.0);
        assert_eq!(attributes.y_scale, 1.0);
    }
}
