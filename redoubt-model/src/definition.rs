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

//! Entity definitions: the typed schema an entity classname may be bound to.
//! Definitions are owned by the world; entity nodes hold non-owning `Arc`
//! handles that are dropped en masse when definitions are reloaded.

use fxhash::FxHashMap;
use redoubt_core::math::Bounds3;
use std::sync::Arc;

/// The type a property key is declared to have in an entity definition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PropertyType {
    String,
    Integer,
    Float,
    Choice(Vec<String>),
    Flags,
    /// The value names other entities; the key participates in the link graph
    /// as an outgoing edge (`target`-style).
    LinkSource,
    /// The value is a link name other entities may point at
    /// (`targetname`-style).
    LinkTarget,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PropertyDefinition {
    pub key: String,
    pub property_type: PropertyType,
    pub default_value: Option<String>,
}

impl PropertyDefinition {
    pub fn new<S: Into<String>>(key: S, property_type: PropertyType) -> Self {
        Self {
            key: key.into(),
            property_type,
            default_value: None,
        }
    }

    pub fn with_default<S: Into<String>>(mut self, value: S) -> Self {
        self.default_value = Some(value.into());
        self
    }
}

/// Whether entities of a class are free-standing points or contain brushes.
#[derive(Clone, Debug, PartialEq)]
pub enum EntityDefinitionKind {
    /// A point entity; `bounds` is the box the editor shows at the origin.
    Point { bounds: Bounds3 },
    /// A brush entity; its geometry is the union of its brush children.
    Brush,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EntityDefinition {
    pub classname: String,
    pub kind: EntityDefinitionKind,
    pub description: String,
    pub properties: Vec<PropertyDefinition>,
}

impl EntityDefinition {
    pub fn point<S: Into<String>>(classname: S, bounds: Bounds3) -> Self {
        Self {
            classname: classname.into(),
            kind: EntityDefinitionKind::Point { bounds },
            description: String::new(),
            properties: Vec::new(),
        }
    }

    pub fn brush<S: Into<String>>(classname: S) -> Self {
        Self {
            classname: classname.into(),
            kind: EntityDefinitionKind::Brush,
            description: String::new(),
            properties: Vec::new(),
        }
    }

    pub fn with_properties(mut self, properties: Vec<PropertyDefinition>) -> Self {
        self.properties = properties;
        self
    }

    pub fn is_point(&self) -> bool {
        matches!(self.kind, EntityDefinitionKind::Point { .. })
    }

    pub fn property(&self, key: &str) -> Option<&PropertyDefinition> {
        self.properties.iter().find(|p| p.key == key)
    }

    /// Keys declared as outgoing link sources, base names only (numbered
    /// variants such as `target2` are normalized by the link manager).
    pub fn source_link_keys(&self) -> impl Iterator<Item = &str> {
        self.properties
            .iter()
            .filter(|p| p.property_type == PropertyType::LinkSource)
            .map(|p| p.key.as_str())
    }

    pub fn target_link_keys(&self) -> impl Iterator<Item = &str> {
        self.properties
            .iter()
            .filter(|p| p.property_type == PropertyType::LinkTarget)
            .map(|p| p.key.as_str())
    }
}

/// Per-world policy for entity properties.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EntityPropertyConfig {
    /// Whether newly created entities receive the default values from their
    /// definition.
    pub set_default_properties: bool,
    /// When present, restricts the keys an entity may carry.
    pub allowed_keys: Option<Vec<String>>,
}

/// The set of definitions loaded for the current game, keyed by classname.
#[derive(Clone, Debug, Default)]
pub struct EntityDefinitionCatalog {
    definitions: FxHashMap<String, Arc<EntityDefinition>>,
}

impl EntityDefinitionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, definition: EntityDefinition) -> Arc<EntityDefinition> {
        let definition = Arc::new(definition);
        self.definitions
            .insert(definition.classname.clone(), definition.clone());
        definition
    }

    pub fn find(&self, classname: &str) -> Option<Arc<EntityDefinition>> {
        self.definitions.get(classname).cloned()
    }

    pub fn contains(&self, classname: &str) -> bool {
        self.definitions.contains_key(classname)
    }

    pub fn clear(&mut self) {
        self.definitions.clear();
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// A minimal catalog with the classic id-tech classes used by tests and by
    /// games without a loaded definition file.
    pub fn with_builtin_classes() -> Self {
        let mut catalog = Self::new();
        catalog.insert(EntityDefinition::brush("worldspawn").with_properties(vec![
            PropertyDefinition::new("message", PropertyType::String),
        ]));
        catalog.insert(EntityDefinition::brush("func_door").with_properties(vec![
            PropertyDefinition::new("targetname", PropertyType::LinkTarget),
            PropertyDefinition::new("target", PropertyType::LinkSource),
        ]));
        catalog.insert(
            EntityDefinition::point("info_player_deathmatch", Bounds3::from_radius(16.0))
                .with_properties(vec![PropertyDefinition::new(
                    "angle",
                    PropertyType::Float,
                )]),
        );
        catalog.insert(
            EntityDefinition::point("trigger_relay", Bounds3::from_radius(8.0)).with_properties(
                vec![
                    PropertyDefinition::new("target", PropertyType::LinkSource),
                    PropertyDefinition::new("killtarget", PropertyType::LinkSource),
                    PropertyDefinition::new("targetname", PropertyType::LinkTarget),
                ],
            ),
        );
        catalog.insert(
            EntityDefinition::point("light", Bounds3::from_radius(8.0)).with_properties(vec![
                PropertyDefinition::new("light", PropertyType::Float).with_default("300"),
                PropertyDefinition::new("targetname", PropertyType::LinkTarget),
            ]),
        );
        catalog
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn link_key_extraction() {
        let definition = EntityDefinition::point("trigger_relay", Bounds3::from_radius(8.0))
            .with_properties(vec![
                PropertyDefinition::new("target", PropertyType::LinkSource),
                PropertyDefinition::new("killtarget", PropertyType::LinkSource),
                PropertyDefinition::new("targetname", PropertyType::LinkTarget),
                PropertyDefinition::new("delay", PropertyType::Float),
            ]);
        let sources: Vec<_> = definition.source_link_keys().collect();
        assert_eq!(sources, vec!["target", "killtarget"]);
        let targets: Vec<_> = definition.target_link_keys().collect();
        assert_eq!(targets, vec!["targetname"]);
    }

    #[test]
    fn catalog_lookup() {
        let catalog = EntityDefinitionCatalog::with_builtin_classes();
        assert!(catalog.contains("worldspawn"));
        let light = catalog.find("light").unwrap();
        assert!(light.is_point());
        assert_eq!(
            light.property("light").unwrap().default_value.as_deref(),
            Some("300")
        );
        assert!(catalog.find("func_unknown").is_none());
    }
}
