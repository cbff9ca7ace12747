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

/// An RGB color in `[0, 1]` channels, as stored in layer bookkeeping
/// properties (`"r g b"`).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.split_whitespace();
        let r = parts.next()?.parse().ok()?;
        let g = parts.next()?.parse().ok()?;
        let b = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self { r, g, b })
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.r, self.g, self.b)
    }
}

/// Sort index reserved for the default layer; it always orders first and is
/// never written to the file.
pub const DEFAULT_LAYER_SORT_INDEX: i32 = i32::MIN;

/// Payload of a layer node. Exactly one layer per world is the default layer;
/// it cannot be removed, renamed or reordered.
#[derive(Clone, Debug, PartialEq)]
pub struct Layer {
    name: String,
    color: Option<Color>,
    sort_index: i32,
    omit_from_export: bool,
    default_layer: bool,
}

impl Layer {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            color: None,
            sort_index: 0,
            omit_from_export: false,
            default_layer: false,
        }
    }

    pub fn default_layer() -> Self {
        Self {
            name: "Default Layer".to_owned(),
            color: None,
            sort_index: DEFAULT_LAYER_SORT_INDEX,
            omit_from_export: false,
            default_layer: true,
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
    pub fn color(&self) -> Option<Color> {
        self.color
    }

    pub fn set_color(&mut self, color: Option<Color>) -> Option<Color> {
        std::mem::replace(&mut self.color, color)
    }

    #[inline]
    pub fn sort_index(&self) -> i32 {
        self.sort_index
    }

    pub fn set_sort_index(&mut self, sort_index: i32) -> i32 {
        std::mem::replace(&mut self.sort_index, sort_index)
    }

    #[inline]
    pub fn omit_from_export(&self) -> bool {
        self.omit_from_export
    }

    pub fn set_omit_from_export(&mut self, omit: bool) -> bool {
        std::mem::replace(&mut self.omit_from_export, omit)
    }

    #[inline]
    pub fn is_default_layer(&self) -> bool {
        self.default_layer
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn color_round_trip() {
        let color = Color::parse("0.5 0.25 1").unwrap();
        assert_eq!(color, Color::new(0.5, 0.25, 1.0));
        assert_eq!(Color::parse(&color.to_string()), Some(color));
        assert_eq!(Color::parse("1 2"), None);
        assert_eq!(Color::parse("1 2 3 4"), None);
    }

    #[test]
    fn default_layer_orders_first() {
        let default = Layer::default_layer();
        let custom = Layer::new("custom");
        assert!(default.is_default_layer());
        assert!(default.sort_index() < custom.sort_index());
    }
}
