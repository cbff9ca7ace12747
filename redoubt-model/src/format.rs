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

use strum_macros::{Display, EnumIter, EnumString};

/// Dialect of the `.map` text format. The variants differ in how a brush face
/// spells its UV alignment and per-face flags; see the reader for the details.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, Default, Display, EnumString, EnumIter,
)]
pub enum MapFormat {
    #[strum(serialize = "Standard")]
    Standard,
    #[strum(serialize = "Valve")]
    Valve220,
    #[strum(serialize = "Quake2")]
    Quake2,
    #[strum(serialize = "Quake2 (Valve)")]
    Quake2Valve,
    #[strum(serialize = "Quake3 (legacy)")]
    Quake3Legacy,
    #[strum(serialize = "Quake3")]
    Quake3,
    #[strum(serialize = "Quake3 (Valve)")]
    Quake3Valve,
    #[strum(serialize = "Daikatana")]
    Daikatana,
    #[strum(serialize = "Hexen2")]
    Hexen2,
    #[default]
    #[strum(serialize = "Unknown")]
    Unknown,
}

impl MapFormat {
    /// Formats whose faces carry the bracketed Valve 220 UV axes.
    pub fn has_valve_uv(self) -> bool {
        matches!(
            self,
            MapFormat::Valve220 | MapFormat::Quake2Valve | MapFormat::Quake3Valve
        )
    }

    /// Formats whose faces append the `contents flags value` surface triple.
    pub fn has_surface_attributes(self) -> bool {
        matches!(
            self,
            MapFormat::Quake2 | MapFormat::Quake2Valve | MapFormat::Daikatana
        )
    }

    /// Formats that admit `patchDef2` patches and `brushDef` brushes.
    pub fn has_patches(self) -> bool {
        matches!(
            self,
            MapFormat::Quake3 | MapFormat::Quake3Legacy | MapFormat::Quake3Valve
        )
    }

    /// Parses the format from its serialized name, yielding [`MapFormat::Unknown`]
    /// for unrecognized input.
    pub fn from_name(name: &str) -> Self {
        name.parse().unwrap_or(MapFormat::Unknown)
    }
}

/// The slice of a game configuration the core needs: the game name and the map
/// formats it supports, in priority order. The first listed format is the
/// fallback for an empty map that cannot be disambiguated.
#[derive(Clone, Debug, PartialEq)]
pub struct GameConfig {
    pub name: String,
    pub formats: Vec<MapFormat>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            name: "Generic".to_owned(),
            formats: vec![MapFormat::Standard],
        }
    }
}

impl GameConfig {
    pub fn new<S: Into<String>>(name: S, formats: Vec<MapFormat>) -> Self {
        Self {
            name: name.into(),
            formats,
        }
    }

    pub fn default_format(&self) -> MapFormat {
        self.formats.first().copied().unwrap_or(MapFormat::Standard)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn name_round_trip() {
        for format in MapFormat::iter() {
            assert_eq!(MapFormat::from_name(&format.to_string()), format);
        }
        assert_eq!(MapFormat::from_name("Valve"), MapFormat::Valve220);
        assert_eq!(MapFormat::from_name("garbage"), MapFormat::Unknown);
    }

    #[test]
    fn capability_flags() {
        assert!(MapFormat::Valve220.has_valve_uv());
        assert!(!MapFormat::Standard.has_valve_uv());
        assert!(MapFormat::Quake2Valve.has_valve_uv());
        assert!(MapFormat::Daikatana.has_surface_attributes());
        assert!(MapFormat::Quake3.has_patches());
        assert!(!MapFormat::Quake2.has_patches());
    }
}
