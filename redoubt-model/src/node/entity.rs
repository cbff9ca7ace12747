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

use crate::definition::{EntityDefinition, EntityDefinitionKind};
use redoubt_core::algebra::Vector3;
use std::sync::Arc;

/// One key/value pair of an entity. Values are stored verbatim, including any
/// whitespace and backslashes the map file carried.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityProperty {
    pub key: String,
    pub value: String,
}

impl EntityProperty {
    pub fn new<K: Into<String>, V: Into<String>>(key: K, value: V) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Payload of an entity node (and of the world node, which doubles as the
/// `worldspawn` entity). Properties keep insertion order and have unique keys.
#[derive(Clone, Debug, Default)]
pub struct Entity {
    properties: Vec<EntityProperty>,
    protected_properties: Vec<String>,
    definition: Option<Arc<EntityDefinition>>,
    brush_entity: bool,
}

impl Entity {
    pub fn with_classname<S: Into<String>>(classname: S) -> Self {
        let mut entity = Self::default();
        entity.set_property("classname", classname);
        entity
    }

    #[inline]
    pub fn properties(&self) -> &[EntityProperty] {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|p| p.key == key)
            .map(|p| p.value.as_str())
    }

    pub fn has_property(&self, key: &str) -> bool {
        self.property(key).is_some()
    }

    /// Inserts or updates a property, preserving insertion order on update.
    /// Returns the previous value if the key existed.
    pub fn set_property<K: Into<String>, V: Into<String>>(
        &mut self,
        key: K,
        value: V,
    ) -> Option<String> {
        let key = key.into();
        let value = value.into();
        if let Some(existing) = self.properties.iter_mut().find(|p| p.key == key) {
            Some(std::mem::replace(&mut existing.value, value))
        } else {
            self.properties.push(EntityProperty { key, value });
            None
        }
    }

    pub fn remove_property(&mut self, key: &str) -> Option<String> {
        let index = self.properties.iter().position(|p| p.key == key)?;
        Some(self.properties.remove(index).value)
    }

    /// Renames a key in place. Fails if the new key already exists.
    pub fn rename_property(&mut self, old_key: &str, new_key: &str) -> bool {
        if old_key == new_key {
            return true;
        }
        if self.has_property(new_key) {
            return false;
        }
        if let Some(property) = self.properties.iter_mut().find(|p| p.key == old_key) {
            property.key = new_key.to_owned();
            true
        } else {
            false
        }
    }

    /// Replaces the whole property list. Used by propagation, which rebuilds
    /// the list from the link source.
    pub fn set_properties(&mut self, properties: Vec<EntityProperty>) -> Vec<EntityProperty> {
        std::mem::replace(&mut self.properties, properties)
    }

    pub fn classname(&self) -> Option<&str> {
        self.property("classname")
    }

    /// Parses the `origin` property; absent or malformed yields `None`.
    pub fn origin(&self) -> Option<Vector3<f64>> {
        parse_vec3(self.property("origin")?)
    }

    pub fn set_origin(&mut self, origin: Vector3<f64>) {
        self.set_property("origin", format_vec3(origin));
    }

    #[inline]
    pub fn protected_properties(&self) -> &[String] {
        &self.protected_properties
    }

    pub fn is_protected(&self, key: &str) -> bool {
        self.protected_properties.iter().any(|k| k == key)
    }

    pub fn set_protected_properties(&mut self, keys: Vec<String>) -> Vec<String> {
        std::mem::replace(&mut self.protected_properties, keys)
    }

    #[inline]
    pub fn definition(&self) -> Option<&Arc<EntityDefinition>> {
        self.definition.as_ref()
    }

    pub fn set_definition(&mut self, definition: Option<Arc<EntityDefinition>>) {
        if let Some(definition) = &definition {
            self.brush_entity = !definition.is_point();
        }
        self.definition = definition;
    }

    /// Marks an undefined classname as a brush entity; used by the reader when
    /// an entity without a definition arrives with brush children.
    pub fn set_brush_entity(&mut self, brush_entity: bool) {
        self.brush_entity = brush_entity;
    }

    /// A point entity may not have children; a brush entity may contain
    /// brushes and patches. With a definition the definition decides,
    /// otherwise the classification assigned at creation holds.
    pub fn is_point_entity(&self) -> bool {
        match &self.definition {
            Some(definition) => matches!(definition.kind, EntityDefinitionKind::Point { .. }),
            None => !self.brush_entity,
        }
    }
}

pub(crate) fn parse_vec3(text: &str) -> Option<Vector3<f64>> {
    let mut parts = text.split_whitespace();
    let x = parts.next()?.parse().ok()?;
    let y = parts.next()?.parse().ok()?;
    let z = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(Vector3::new(x, y, z))
}

pub(crate) fn format_vec3(v: Vector3<f64>) -> String {
    format!(
        "{} {} {}",
        format_coord(v.x),
        format_coord(v.y),
        format_coord(v.z)
    )
}

/// Formats a coordinate the way map files spell them: integral values without
/// a decimal point.
pub(crate) fn format_coord(v: f64) -> String {
    if v == v.trunc() && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn properties_keep_insertion_order() {
        let mut entity = Entity::default();
        entity.set_property("classname", "light");
        entity.set_property("origin", "0 0 0");
        entity.set_property("light", "300");
        // Updating must not reorder.
        entity.set_property("origin", "16 0 0");
        let keys: Vec<_> = entity.properties().iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["classname", "origin", "light"]);
        assert_eq!(entity.property("origin"), Some("16 0 0"));
    }

    #[test]
    fn set_property_returns_old_value() {
        let mut entity = Entity::default();
        assert_eq!(entity.set_property("light", "200"), None);
        assert_eq!(entity.set_property("light", "300"), Some("200".to_owned()));
    }

    #[test]
    fn rename_rejects_duplicates() {
        let mut entity = Entity::default();
        entity.set_property("a", "1");
        entity.set_property("b", "2");
        assert!(!entity.rename_property("a", "b"));
        assert!(entity.rename_property("a", "c"));
        assert_eq!(entity.property("c"), Some("1"));
        assert!(!entity.has_property("a"));
    }

    #[test]
    fn origin_parsing() {
        let mut entity = Entity::default();
        entity.set_property("origin", "1 22 -3");
        assert_eq!(entity.origin(), Some(Vector3::new(1.0, 22.0, -3.0)));

        entity.set_property("origin", "not a vector");
        assert_eq!(entity.origin(), None);

        entity.set_origin(Vector3::new(8.0, -16.5, 0.0));
        assert_eq!(entity.property("origin"), Some("8 -16.5 0"));
    }

    #[test]
    fn value_whitespace_is_preserved() {
        let mut entity = Entity::default();
        entity.set_property("angle", " -1 ");
        assert_eq!(entity.property("angle"), Some(" -1 "));
    }
}
