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

use nalgebra::{Matrix4, Point3, Vector3};

/// A double-precision axis-aligned bounding box. The default box is inverted
/// (min > max), which lets [`Bounds3::add_point`] work without a special first
/// case; an inverted box reports itself as invalid.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Bounds3 {
    pub min: Vector3<f64>,
    pub max: Vector3<f64>,
}

impl Default for Bounds3 {
    #[inline]
    fn default() -> Self {
        Self {
            min: Vector3::new(f64::MAX, f64::MAX, f64::MAX),
            max: Vector3::new(-f64::MAX, -f64::MAX, -f64::MAX),
        }
    }
}

impl Bounds3 {
    #[inline]
    pub const fn from_min_max(min: Vector3<f64>, max: Vector3<f64>) -> Self {
        Self { min, max }
    }

    /// A cube of the given half extent centered at the origin.
    #[inline]
    pub fn from_radius(radius: f64) -> Self {
        Self {
            min: Vector3::new(-radius, -radius, -radius),
            max: Vector3::new(radius, radius, radius),
        }
    }

    #[inline]
    pub fn from_point(point: Vector3<f64>) -> Self {
        Self {
            min: point,
            max: point,
        }
    }

    #[inline]
    pub fn from_points<I: IntoIterator<Item = Vector3<f64>>>(points: I) -> Self {
        let mut bounds = Bounds3::default();
        for pt in points {
            bounds.add_point(pt);
        }
        bounds
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    #[inline]
    pub fn add_point(&mut self, p: Vector3<f64>) {
        self.min = self.min.inf(&p);
        self.max = self.max.sup(&p);
    }

    /// Merges the other box into this one.
    #[inline]
    pub fn add_box(&mut self, other: Self) {
        self.add_point(other.min);
        self.add_point(other.max);
    }

    #[inline]
    #[must_use]
    pub fn merged(mut self, other: Self) -> Self {
        self.add_box(other);
        self
    }

    /// Grows the box by the given amount on every side.
    #[inline]
    pub fn expand(&mut self, amount: f64) {
        let delta = Vector3::new(amount, amount, amount);
        self.min -= delta;
        self.max += delta;
    }

    #[inline]
    pub fn contains_point(&self, point: Vector3<f64>) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }

    #[inline]
    pub fn contains_bounds(&self, other: &Self) -> bool {
        self.contains_point(other.min) && self.contains_point(other.max)
    }

    #[inline]
    pub fn intersects(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    #[inline]
    pub fn center(&self) -> Vector3<f64> {
        (self.min + self.max).scale(0.5)
    }

    #[inline]
    pub fn size(&self) -> Vector3<f64> {
        self.max - self.min
    }

    #[inline]
    pub fn corners(&self) -> [Vector3<f64>; 8] {
        [
            Vector3::new(self.min.x, self.min.y, self.min.z),
            Vector3::new(self.min.x, self.min.y, self.max.z),
            Vector3::new(self.max.x, self.min.y, self.max.z),
            Vector3::new(self.max.x, self.min.y, self.min.z),
            Vector3::new(self.min.x, self.max.y, self.min.z),
            Vector3::new(self.min.x, self.max.y, self.max.z),
            Vector3::new(self.max.x, self.max.y, self.max.z),
            Vector3::new(self.max.x, self.max.y, self.min.z),
        ]
    }

    /// Axis-aligned box of the transformed corners.
    #[inline]
    #[must_use]
    pub fn transform(&self, m: &Matrix4<f64>) -> Self {
        let mut result = Bounds3::default();
        for corner in self.corners() {
            result.add_point(m.transform_point(&Point3::from(corner)).coords);
        }
        result
    }

    /// True if any extent collapses to (nearly) zero.
    #[inline]
    pub fn is_degenerate(&self, epsilon: f64) -> bool {
        let size = self.size();
        size.x.abs() <= epsilon || size.y.abs() <= epsilon || size.z.abs() <= epsilon
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_is_invalid() {
        assert!(!Bounds3::default().is_valid());
        assert!(Bounds3::from_radius(1.0).is_valid());
    }

    #[test]
    fn contains_and_intersects() {
        let outer = Bounds3::from_radius(8.0);
        let inner = Bounds3::from_radius(2.0);
        assert!(outer.contains_bounds(&inner));
        assert!(!inner.contains_bounds(&outer));
        assert!(outer.intersects(&inner));

        let disjoint = Bounds3::from_min_max(
            Vector3::new(10.0, 10.0, 10.0),
            Vector3::new(12.0, 12.0, 12.0),
        );
        assert!(!outer.intersects(&disjoint));

        // Touching boxes count as intersecting.
        let touching =
            Bounds3::from_min_max(Vector3::new(8.0, -1.0, -1.0), Vector3::new(9.0, 1.0, 1.0));
        assert!(outer.intersects(&touching));
    }

    #[test]
    fn merge_and_expand() {
        let mut bounds = Bounds3::from_point(Vector3::new(1.0, 2.0, 3.0));
        bounds.add_box(Bounds3::from_point(Vector3::new(-1.0, 0.0, 5.0)));
        assert_eq!(bounds.min, Vector3::new(-1.0, 0.0, 3.0));
        assert_eq!(bounds.max, Vector3::new(1.0, 2.0, 5.0));

        bounds.expand(1.0);
        assert_eq!(bounds.min, Vector3::new(-2.0, -1.0, 2.0));
        assert_eq!(bounds.max, Vector3::new(2.0, 3.0, 6.0));
    }

    #[test]
    fn transform_translation() {
        let bounds = Bounds3::from_radius(1.0);
        let moved = bounds.transform(&Matrix4::new_translation(&Vector3::new(4.0, 0.0, 0.0)));
        assert_eq!(moved.center(), Vector3::new(4.0, 0.0, 0.0));
        assert_eq!(moved.size(), Vector3::new(2.0, 2.0, 2.0));
    }

    #[test]
    fn degenerate_detection() {
        let flat =
            Bounds3::from_min_max(Vector3::new(0.0, 0.0, 0.0), Vector3::new(4.0, 0.0, 4.0));
        assert!(flat.is_degenerate(1e-9));
        assert!(!Bounds3::from_radius(1.0).is_degenerate(1e-9));
    }
}
