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

use redoubt_core::algebra::Matrix4;

/// Payload of a group node. A group that is a member of a linked family
/// carries the transformation that maps the family's reference space into the
/// group's own placement; propagation between two members `s` and `t` applies
/// `T_t ∘ T_s⁻¹`.
#[derive(Clone, Debug, PartialEq)]
pub struct Group {
    name: String,
    transformation: Option<Matrix4<f64>>,
}

impl Group {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            transformation: None,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name<S: Into<String>>(&mut self, name: S) -> String {
        std::mem::replace(&mut self.name, name.into())
    }

    #[inline]
    pub fn transformation(&self) -> Option<&Matrix4<f64>> {
        self.transformation.as_ref()
    }

    /// The transformation, defaulting to identity for groups that never moved.
    pub fn effective_transformation(&self) -> Matrix4<f64> {
        self.transformation.unwrap_or_else(Matrix4::identity)
    }

    pub fn set_transformation(&mut self, m: Option<Matrix4<f64>>) -> Option<Matrix4<f64>> {
        std::mem::replace(&mut self.transformation, m)
    }

    /// Left-composes a transform onto the group's own transformation.
    pub fn prepend_transformation(&mut self, m: &Matrix4<f64>) {
        self.transformation = Some(m * self.effective_transformation());
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use redoubt_core::algebra::Vector3;

    #[test]
    fn transformation_composition() {
        let mut group = Group::new("g");
        assert_eq!(group.effective_transformation(), Matrix4::identity());

        let a = Matrix4::new_translation(&Vector3::new(1.0, 0.0, 0.0));
        let b = Matrix4::new_translation(&Vector3::new(0.0, 2.0, 0.0));
        group.prepend_transformation(&a);
        group.prepend_transformation(&b);
        assert_eq!(group.effective_transformation(), b * a);
    }
}
