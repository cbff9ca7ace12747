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

//! Double-precision geometric primitives used throughout the editor core.

pub mod aabb;
pub mod plane;
pub mod ray;

pub use aabb::Bounds3;
pub use plane::Plane;
pub use ray::Ray;

use nalgebra::{Matrix3, Matrix4, Vector3};

/// True if the upper-left 3x3 block of the matrix is orthonormal, i.e. the
/// transform is a rotation (possibly improper, determinant -1) plus translation.
/// Such transforms preserve distances, so integral plane points can be snapped
/// back to the grid after applying them.
pub fn is_rigid(m: &Matrix4<f64>, epsilon: f64) -> bool {
    let linear: Matrix3<f64> = m.fixed_view::<3, 3>(0, 0).into_owned();
    let product = linear * linear.transpose();
    (product - Matrix3::identity()).abs().max() <= epsilon
}

/// Rounds each component to the nearest integer.
#[inline]
pub fn snap_to_integer(v: Vector3<f64>) -> Vector3<f64> {
    Vector3::new(v.x.round(), v.y.round(), v.z.round())
}

/// Componentwise approximate comparison.
#[inline]
pub fn vec3_approx_eq(a: &Vector3<f64>, b: &Vector3<f64>, epsilon: f64) -> bool {
    (a - b).abs().max() <= epsilon
}

#[cfg(test)]
mod test {
    use super::*;
    use nalgebra::Unit;

    #[test]
    fn rigid_detection() {
        assert!(is_rigid(&Matrix4::identity(), 1e-9));
        assert!(is_rigid(
            &Matrix4::new_translation(&Vector3::new(4.0, 5.0, 6.0)),
            1e-9
        ));
        assert!(is_rigid(
            &Matrix4::from_axis_angle(
                &Unit::new_normalize(Vector3::new(0.0, 0.0, 1.0)),
                std::f64::consts::FRAC_PI_3
            ),
            1e-9
        ));
        // Reflections are rigid too.
        assert!(is_rigid(
            &Matrix4::new_nonuniform_scaling(&Vector3::new(-1.0, 1.0, 1.0)),
            1e-9
        ));
        assert!(!is_rigid(
            &Matrix4::new_nonuniform_scaling(&Vector3::new(2.0, 1.0, 1.0)),
            1e-9
        ));
    }

    #[test]
    fn snapping() {
        assert_eq!(
            snap_to_integer(Vector3::new(0.9999999, -1.0000001, 16.49)),
            Vector3::new(1.0, -1.0, 16.0)
        );
    }
}
