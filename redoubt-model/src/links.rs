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

//! The entity link graph: `target`-style properties pointing at
//! `targetname`-style properties. Which keys participate is decided purely by
//! the entity definitions; an entity without a definition contributes no
//! edges. Numbered source keys (`target1`, `target2`, ...) share the logical
//! bucket of their base key.
//!
//! Removing an endpoint deletes its edges but leaves the emptied per-key
//! entries on the surviving endpoints; an empty entry is exactly what the
//! missing-source/missing-target queries look for.

use crate::node::{entity::Entity, Node, NodeKind};
use fxhash::FxHashMap;
use redoubt_core::pool::Handle;

/// Edges grouped by the property key on the queried node's side.
pub type LinkEndsForKey = FxHashMap<String, Vec<(Handle<Node>, String)>>;

#[derive(Debug, Default)]
pub struct EntityLinkManager {
    /// node -> source bucket key -> [(target node, target key)]
    links_from: FxHashMap<Handle<Node>, LinkEndsForKey>,
    /// node -> target key -> [(source node, source bucket key)]
    links_to: FxHashMap<Handle<Node>, LinkEndsForKey>,
    /// link name -> [(source node, source bucket key)] of indexed sources
    sources_by_name: FxHashMap<String, Vec<(Handle<Node>, String)>>,
    /// link name -> [(target node, target key)] of indexed targets
    targets_by_name: FxHashMap<String, Vec<(Handle<Node>, String)>>,
}

impl EntityLinkManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes an entity (or world) node, creating edges in both directions.
    /// Adding a target retroactively connects already-indexed sources.
    pub fn add_entity_node(&mut self, handle: Handle<Node>, node: &Node) {
        let Some(entity) = entity_of(node) else {
            return;
        };

        for (bucket, value) in declared_source_values(entity) {
            self.sources_by_name
                .entry(value.to_owned())
                .or_default()
                .push((handle, bucket.clone()));

            let entry = self
                .links_from
                .entry(handle)
                .or_default()
                .entry(bucket.clone())
                .or_default();
            if let Some(targets) = self.targets_by_name.get(value) {
                for (target, target_key) in targets {
                    entry.push((*target, target_key.clone()));
                    self.links_to
                        .entry(*target)
                        .or_default()
                        .entry(target_key.clone())
                        .or_default()
                        .push((handle, bucket.clone()));
                }
            }
        }

        for (key, value) in declared_target_values(entity) {
            self.targets_by_name
                .entry(value.to_owned())
                .or_default()
                .push((handle, key.clone()));

            let entry = self
                .links_to
                .entry(handle)
                .or_default()
                .entry(key.clone())
                .or_default();
            if let Some(sources) = self.sources_by_name.get(value) {
                for (source, bucket) in sources.clone() {
                    entry.push((source, bucket.clone()));
                    self.links_from
                        .entry(source)
                        .or_default()
                        .entry(bucket)
                        .or_default()
                        .push((handle, key.clone()));
                }
            }
        }
    }

    /// Removes a node from the graph. Edge lists on surviving endpoints are
    /// emptied but their per-key entries are kept, so that missing-endpoint
    /// detection keeps firing for them.
    pub fn remove_entity_node(&mut self, handle: Handle<Node>) {
        for lists in self.sources_by_name.values_mut() {
            lists.retain(|(node, _)| *node != handle);
        }
        for lists in self.targets_by_name.values_mut() {
            lists.retain(|(node, _)| *node != handle);
        }
        if let Some(outgoing) = self.links_from.remove(&handle) {
            for ends in outgoing.values() {
                for (target, target_key) in ends {
                    if let Some(entry) = self
                        .links_to
                        .get_mut(target)
                        .and_then(|m| m.get_mut(target_key))
                    {
                        entry.retain(|(node, _)| *node != handle);
                    }
                }
            }
        }
        if let Some(incoming) = self.links_to.remove(&handle) {
            for ends in incoming.values() {
                for (source, bucket) in ends {
                    if let Some(entry) = self
                        .links_from
                        .get_mut(source)
                        .and_then(|m| m.get_mut(bucket))
                    {
                        entry.retain(|(node, _)| *node != handle);
                    }
                }
            }
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Outgoing edges of a node, grouped by source bucket key.
    pub fn links_from(&self, handle: Handle<Node>) -> LinkEndsForKey {
        self.links_from.get(&handle).cloned().unwrap_or_default()
    }

    /// Incoming edges of a node, grouped by target key.
    pub fn links_to(&self, handle: Handle<Node>) -> LinkEndsForKey {
        self.links_to.get(&handle).cloned().unwrap_or_default()
    }

    pub fn has_link(&self, source: Handle<Node>, target: Handle<Node>, source_key: &str) -> bool {
        self.links_from
            .get(&source)
            .and_then(|m| m.get(source_key))
            .is_some_and(|ends| ends.iter().any(|(node, _)| *node == target))
    }

    /// True if the node declares a source value under this bucket whose
    /// matching targets are all gone.
    pub fn has_missing_target(&self, handle: Handle<Node>, source_key: &str) -> bool {
        self.links_from
            .get(&handle)
            .and_then(|m| m.get(source_key))
            .is_some_and(|ends| ends.is_empty())
    }

    /// Dual of [`EntityLinkManager::has_missing_target`].
    pub fn has_missing_source(&self, handle: Handle<Node>, target_key: &str) -> bool {
        self.links_to
            .get(&handle)
            .and_then(|m| m.get(target_key))
            .is_some_and(|ends| ends.is_empty())
    }
}

fn entity_of(node: &Node) -> Option<&Entity> {
    match node.kind() {
        NodeKind::Entity(entity) => Some(entity),
        NodeKind::World(world) => Some(&world.entity),
        _ => None,
    }
}

/// Folds a numbered key onto its base: `target2` -> `target` if `target` is a
/// declared source key.
fn source_bucket<'a>(key: &'a str, declared: &[&'a str]) -> Option<&'a str> {
    if let Some(exact) = declared.iter().find(|d| **d == key) {
        return Some(exact);
    }
    declared
        .iter()
        .find(|d| {
            key.strip_prefix(**d)
                .is_some_and(|suffix| !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()))
        })
        .copied()
}

/// `(bucket, value)` pairs of every schema-declared source property.
fn declared_source_values(entity: &Entity) -> Vec<(String, &str)> {
    let Some(definition) = entity.definition() else {
        return Vec::new();
    };
    let declared: Vec<&str> = definition.source_link_keys().collect();
    entity
        .properties()
        .iter()
        .filter_map(|p| {
            source_bucket(&p.key, &declared).map(|bucket| (bucket.to_owned(), p.value.as_str()))
        })
        .collect()
}

fn declared_target_values(entity: &Entity) -> Vec<(String, &str)> {
    let Some(definition) = entity.definition() else {
        return Vec::new();
    };
    let declared: Vec<&str> = definition.target_link_keys().collect();
    entity
        .properties()
        .iter()
        .filter_map(|p| {
            declared
                .iter()
                .find(|d| **d == p.key)
                .map(|key| (key.to_string(), p.value.as_str()))
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::definition::{
        EntityDefinition, PropertyDefinition, PropertyType,
    };
    use redoubt_core::math::Bounds3;
    use std::sync::Arc;

    fn source_definition() -> Arc<EntityDefinition> {
        Arc::new(
            EntityDefinition::point("source_definition", Bounds3::from_radius(8.0))
                .with_properties(vec![
                    PropertyDefinition::new("target", PropertyType::LinkSource),
                    PropertyDefinition::new("alt_target", PropertyType::LinkSource),
                ]),
        )
    }

    fn target_definition() -> Arc<EntityDefinition> {
        Arc::new(
            EntityDefinition::point("target_definition", Bounds3::from_radius(8.0))
                .with_properties(vec![
                    PropertyDefinition::new("targetname", PropertyType::LinkTarget),
                ]),
        )
    }

    fn source_target_definition() -> Arc<EntityDefinition> {
        Arc::new(
            EntityDefinition::point("source_target_definition", Bounds3::from_radius(8.0))
                .with_properties(vec![
                    PropertyDefinition::new("target", PropertyType::LinkSource),
                    PropertyDefinition::new("targetname", PropertyType::LinkTarget),
                ]),
        )
    }

    fn entity_node(pairs: &[(&str, &str)], definition: Option<Arc<EntityDefinition>>) -> Node {
        let mut entity = Entity::default();
        for (key, value) in pairs {
            entity.set_property(*key, *value);
        }
        entity.set_definition(definition);
        Node::new(NodeKind::Entity(entity))
    }

    #[test]
    fn add_and_remove_endpoints() {
        let mut m = EntityLinkManager::new();
        let source = Handle::new(1, 1);
        let target = Handle::new(2, 1);
        let source_node = entity_node(&[("target", "some_name")], Some(source_definition()));
        let target_node = entity_node(&[("targetname", "some_name")], Some(target_definition()));

        // Source first: the edge appears as soon as the target is known.
        m.add_entity_node(source, &source_node);
        assert!(m.has_missing_target(source, "target"));
        m.add_entity_node(target, &target_node);
        assert!(m.has_link(source, target, "target"));
        assert!(!m.has_missing_target(source, "target"));
        assert!(!m.has_missing_source(target, "targetname"));

        let from = m.links_from(source);
        assert_eq!(from["target"], vec![(target, "targetname".to_owned())]);
        assert!(m.links_to(source).is_empty());
        let to = m.links_to(target);
        assert_eq!(to["targetname"], vec![(source, "target".to_owned())]);

        // Removing the source leaves an emptied entry on the target.
        m.remove_entity_node(source);
        assert!(m.links_from(source).is_empty());
        let to = m.links_to(target);
        assert!(to["targetname"].is_empty());
        assert!(m.has_missing_source(target, "targetname"));
        assert!(!m.has_missing_target(target, "target"));
    }

    #[test]
    fn undefined_entities_contribute_nothing() {
        let mut m = EntityLinkManager::new();
        let n1 = Handle::new(1, 1);
        let n2 = Handle::new(2, 1);
        m.add_entity_node(n1, &entity_node(&[("target", "name")], None));
        m.add_entity_node(n2, &entity_node(&[("targetname", "name")], None));
        assert!(m.links_from(n1).is_empty());
        assert!(m.links_to(n2).is_empty());
        assert!(!m.has_missing_target(n1, "target"));
        assert!(!m.has_missing_source(n2, "targetname"));
    }

    #[test]
    fn numbered_source_keys_share_a_bucket() {
        let mut m = EntityLinkManager::new();
        let n1 = Handle::new(1, 1);
        let n2 = Handle::new(2, 1);
        let n3 = Handle::new(3, 1);
        m.add_entity_node(
            n1,
            &entity_node(
                &[("target1", "some_name"), ("target2", "some_other_name")],
                Some(source_definition()),
            ),
        );
        m.add_entity_node(
            n2,
            &entity_node(&[("targetname", "some_name")], Some(target_definition())),
        );
        m.add_entity_node(
            n3,
            &entity_node(&[("targetname", "some_other_name")], Some(target_definition())),
        );

        assert!(m.has_link(n1, n2, "target"));
        assert!(m.has_link(n1, n3, "target"));
        let from = m.links_from(n1);
        assert_eq!(from.len(), 1);
        assert_eq!(from["target"].len(), 2);
        // `targetfoo` is not a numbered variant.
        let n4 = Handle::new(4, 1);
        m.add_entity_node(
            n4,
            &entity_node(&[("targetfoo", "some_name")], Some(source_definition())),
        );
        assert!(m.links_from(n4).is_empty());
    }

    #[test]
    fn self_loop_is_admitted() {
        let mut m = EntityLinkManager::new();
        let n = Handle::new(1, 1);
        m.add_entity_node(
            n,
            &entity_node(
                &[("target", "loop"), ("targetname", "loop")],
                Some(source_target_definition()),
            ),
        );
        assert!(m.has_link(n, n, "target"));
        assert!(!m.has_missing_target(n, "target"));
        assert!(!m.has_missing_source(n, "targetname"));
    }
}
