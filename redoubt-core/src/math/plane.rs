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

use nalgebra::Vector3;

/// A plane in Hessian normal form: `normal · p + d = 0`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Plane {
    pub normal: Vector3<f64>,
    pub d: f64,
}

impl Default for Plane {
    #[inline]
    fn default() -> Self {
        Plane {
            normal: Vector3::new(0.0, 1.0, 0.0),
            d: 0.0,
        }
    }
}

impl Plane {
    /// Creates a plane from a point and the normal vector at that point.
    /// May fail if the normal is a degenerated vector.
    #[inline]
    pub fn from_normal_and_point(normal: &Vector3<f64>, point: &Vector3<f64>) -> Option<Self> {
        normal
            .try_normalize(f64::EPSILON)
            .map(|normalized_normal| Self {
                normal: normalized_normal,
                d: -point.dot(&normalized_normal),
            })
    }

    /// Tries to create a plane from three points. May fail if the triangle is
    /// degenerated (collapsed into a point or a line).
    ///
    /// Winding follows the `.map` convention: the three generating points are
    /// given clockwise when looking at the visible side of the face, so the
    /// normal of `(a, b, c)` is `(c - a) × (b - a)`, pointing out of the brush.
    #[inline]
    pub fn from_points(a: &Vector3<f64>, b: &Vector3<f64>, c: &Vector3<f64>) -> Option<Self> {
        let normal = (c - a).cross(&(b - a));
        Self::from_normal_and_point(&normal, a)
    }

    /// Signed distance of a point to the plane; positive in front of the plane.
    #[inline]
    pub fn signed_distance(&self, point: &Vector3<f64>) -> f64 {
        self.normal.dot(point) + self.d
    }

    #[inline]
    pub fn distance(&self, point: &Vector3<f64>) -> f64 {
        self.signed_distance(point).abs()
    }

    /// Projects the given point onto the plane along the plane normal.
    #[inline]
    pub fn project(&self, point: &Vector3<f64>) -> Vector3<f64> {
        point - self.normal.scale(self.signed_distance(point))
    }

    /// The intersection point of three planes. Returns `None` if any pair of
    /// planes is (nearly) parallel.
    pub fn intersection_point(&self, b: &Plane, c: &Plane) -> Option<Vector3<f64>> {
        let denom = self.normal.dot(&b.normal.cross(&c.normal));
        if denom.abs() < 1e-9 {
            return None;
        }
        let f = -1.0 / denom;

        let v1 = b.normal.cross(&c.normal).scale(self.d);
        let v2 = c.normal.cross(&self.normal).scale(b.d);
        let v3 = self.normal.cross(&b.normal).scale(c.d);

        Some((v1 + v2 + v3).scale(f))
    }

    #[inline]
    #[must_use]
    pub fn flipped(&self) -> Self {
        Self {
            normal: -self.normal,
            d: -self.d,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn from_points_winding() {
        // The floor face of an axis-aligned brush as written in a .map file:
        // ( 0 0 0 ) ( 1 0 0 ) ( 0 1 0 ) has its normal pointing down.
        let plane = Plane::from_points(
            &Vector3::new(0.0, 0.0, 0.0),
            &Vector3::new(1.0, 0.0, 0.0),
            &Vector3::new(0.0, 1.0, 0.0),
        )
        .unwrap();
        assert_eq!(plane.normal, Vector3::new(0.0, 0.0, -1.0));
        assert_eq!(plane.d, 0.0);
    }

    #[test]
    fn degenerate_points() {
        let p = Vector3::new(1.0, 1.0, 1.0);
        assert!(Plane::from_points(&p, &p, &Vector3::new(2.0, 2.0, 2.0)).is_none());
    }

    #[test]
    fn signed_distance_sides() {
        let plane = Plane::from_normal_and_point(
            &Vector3::new(0.0, 0.0, 1.0),
            &Vector3::new(0.0, 0.0, 8.0),
        )
        .unwrap();
        assert!(plane.signed_distance(&Vector3::new(0.0, 0.0, 10.0)) > 0.0);
        assert!(plane.signed_distance(&Vector3::new(0.0, 0.0, 6.0)) < 0.0);
        assert_eq!(plane.signed_distance(&Vector3::new(5.0, 5.0, 8.0)), 0.0);
    }

    #[test]
    fn three_plane_intersection() {
        let x = Plane::from_normal_and_point(
            &Vector3::new(1.0, 0.0, 0.0),
            &Vector3::new(16.0, 0.0, 0.0),
        )
        .unwrap();
        let y = Plane::from_normal_and_point(
            &Vector3::new(0.0, 1.0, 0.0),
            &Vector3::new(0.0, 32.0, 0.0),
        )
        .unwrap();
        let z = Plane::from_normal_and_point(
            &Vector3::new(0.0, 0.0, 1.0),
            &Vector3::new(0.0, 0.0, 64.0),
        )
        .unwrap();
        assert_eq!(
            x.intersection_point(&y, &z),
            Some(Vector3::new(16.0, 32.0, 64.0))
        );

        // Parallel planes have no intersection point.
        let x2 = Plane::from_normal_and_point(
            &Vector3::new(1.0, 0.0, 0.0),
            &Vector3::new(32.0, 0.0, 0.0),
        )
        .unwrap();
        assert_eq!(x.intersection_point(&x2, &z), None);
    }
}
