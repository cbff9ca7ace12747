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

use crate::{definition::EntityPropertyConfig, format::MapFormat, node::entity::Entity};
use redoubt_core::math::Bounds3;

/// Half extent of the symmetric world cube.
pub const WORLD_BOUNDS_RADIUS: f64 = 8192.0;

/// Payload of the root world node. The world doubles as the `worldspawn`
/// entity and carries its properties.
#[derive(Clone, Debug)]
pub struct World {
    pub entity: Entity,
    format: MapFormat,
    bounds: Bounds3,
    property_config: EntityPropertyConfig,
}

impl Default for World {
    fn default() -> Self {
        Self::new(MapFormat::Standard)
    }
}

impl World {
    pub fn new(format: MapFormat) -> Self {
        let mut entity = Entity::with_classname("worldspawn");
        entity.set_brush_entity(true);
        Self {
            entity,
            format,
            bounds: Bounds3::from_radius(WORLD_BOUNDS_RADIUS),
            property_config: EntityPropertyConfig::default(),
        }
    }

    #[inline]
    pub fn format(&self) -> MapFormat {
        self.format
    }

    pub fn set_format(&mut self, format: MapFormat) -> MapFormat {
        std::mem::replace(&mut self.format, format)
    }

    /// The symmetric cube every node must stay inside.
    #[inline]
    pub fn bounds(&self) -> Bounds3 {
        self.bounds
    }

    pub fn set_bounds(&mut self, bounds: Bounds3) -> Bounds3 {
        std::mem::replace(&mut self.bounds, bounds)
    }

    #[inline]
    pub fn property_config(&self) -> &EntityPropertyConfig {
        &self.property_config
    }

    pub fn set_property_config(&mut self, config: EntityPropertyConfig) {
        self.property_config = config;
    }
}
