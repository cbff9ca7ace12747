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

//! The linked-group engine. Groups sharing a link id form a family of
//! structurally congruent instances; editing one member propagates to the
//! others by cloning the edited member's children into each target, mapped
//! through `T_target ∘ T_source⁻¹`. Descendants carry per-position link ids so
//! that the property merge can match a source child to its counterpart.

use crate::{
    error::MapError,
    graph::MapGraph,
    node::{entity::Entity, entity::EntityProperty, Node, NodeKind},
    transform::{transformed_kind, TransformOptions},
};
use fxhash::FxHashMap;
use redoubt_core::{algebra::Matrix4, math::Bounds3, pool::Handle};
use uuid::Uuid;

/// A new identity for a link family member.
pub fn fresh_link_id() -> String {
    Uuid::new_v4().to_string()
}

/// All groups of the graph sharing the given link id, in pre-order.
pub fn collect_linked_groups(graph: &MapGraph, link_id: &str) -> Vec<Handle<Node>> {
    graph.collect_nodes(&[graph.root()], &|n| n.is_group() && n.link_id() == link_id)
}

/// Link id -> group members, for families with at least two members.
pub fn linked_families(graph: &MapGraph) -> FxHashMap<String, Vec<Handle<Node>>> {
    let mut families: FxHashMap<String, Vec<Handle<Node>>> = FxHashMap::default();
    for handle in graph.traverse(graph.root()) {
        let node = &graph[handle];
        if node.is_group() && !node.link_id().is_empty() {
            families
                .entry(node.link_id().to_owned())
                .or_default()
                .push(handle);
        }
    }
    families.retain(|_, members| members.len() > 1);
    families
}

/// Lockstep congruence walk: both subtrees must present the same variant
/// sequence at every depth.
pub fn congruent(graph: &MapGraph, a: Handle<Node>, b: Handle<Node>) -> bool {
    let (node_a, node_b) = (&graph[a], &graph[b]);
    if !node_a.kind().same_variant(node_b.kind()) {
        return false;
    }
    if node_a.children().len() != node_b.children().len() {
        return false;
    }
    node_a
        .children()
        .iter()
        .zip(node_b.children())
        .all(|(&ca, &cb)| congruent(graph, ca, cb))
}

/// Establishes per-position link ids across every linked family of the graph,
/// called once after load. A member that is not congruent with the family's
/// first member is cut loose: it gets a fresh link id and an error is
/// reported, while its descendants keep their own ids.
pub fn initialize_link_ids(graph: &mut MapGraph) -> Vec<MapError> {
    let mut errors = Vec::new();
    for (link_id, members) in linked_families(graph) {
        let representative = members[0];
        let mut congruent_members = vec![representative];
        for &member in &members[1..] {
            if congruent(graph, representative, member) {
                congruent_members.push(member);
            } else {
                errors.push(MapError::LinkedGroup(format!(
                    "inconsistent structure in linked group family \"{link_id}\""
                )));
                let fresh = fresh_link_id();
                graph[member].set_link_id(fresh);
            }
        }
        if congruent_members.len() > 1 {
            assign_descendant_link_ids(graph, &congruent_members);
        }
    }
    errors
}

/// Gives the corresponding descendants of every member the same link id. The
/// representative's existing ids are kept where present; nested groups retain
/// their own ids (they have their own families).
fn assign_descendant_link_ids(graph: &mut MapGraph, members: &[Handle<Node>]) {
    let representative = members[0];
    let child_count = graph[representative].children().len();
    for position in 0..child_count {
        let rep_child = graph[representative].children()[position];
        if !graph[rep_child].is_group() {
            let id = if graph[rep_child].link_id().is_empty() {
                let id = fresh_link_id();
                graph[rep_child].set_link_id(id.clone());
                id
            } else {
                graph[rep_child].link_id().to_owned()
            };
            for &member in &members[1..] {
                let member_child = graph[member].children()[position];
                graph[member_child].set_link_id(id.clone());
            }
        }
        let column: Vec<Handle<Node>> = members
            .iter()
            .map(|&m| graph[m].children()[position])
            .collect();
        assign_descendant_link_ids(graph, &column);
    }
}

/// Regenerates the link ids of the given groups and their descendants, cutting
/// them loose from their families. Nested groups keep their identity unless
/// they are listed themselves.
pub fn reset_link_ids(graph: &mut MapGraph, groups: &[Handle<Node>]) {
    for &group in groups {
        graph[group].set_link_id(fresh_link_id());
        reset_descendants(graph, group);
    }
}

fn reset_descendants(graph: &mut MapGraph, node: Handle<Node>) {
    let children: Vec<_> = graph[node].children().to_vec();
    for child in children {
        if graph[child].is_group() {
            continue;
        }
        if !graph[child].link_id().is_empty() {
            graph[child].set_link_id(fresh_link_id());
        }
        reset_descendants(graph, child);
    }
}

/// Clones a whole subtree into detached nodes, keeping link ids. The clone of
/// a linked group is a new family member; attach it and the family has grown.
pub fn clone_subtree(
    graph: &mut MapGraph,
    source: Handle<Node>,
    transform: &Matrix4<f64>,
) -> Result<Handle<Node>, MapError> {
    clone_onto(graph, source, None, transform)
}

/// The result of one propagation step: for each target, the detached subtrees
/// that must replace the target's children. The caller swaps them in as part
/// of the surrounding undoable unit.
pub struct LinkedGroupUpdate {
    pub target: Handle<Node>,
    pub new_children: Vec<Handle<Node>>,
}

/// Produces replacement children for every target of a linked family from the
/// source member's current children. Fails without touching the tree if a
/// target is not congruent, a transform cannot be computed, or a produced node
/// leaves the world bounds.
pub fn update_linked_groups(
    graph: &mut MapGraph,
    source: Handle<Node>,
    targets: &[Handle<Node>],
    world_bounds: &Bounds3,
) -> Result<Vec<LinkedGroupUpdate>, MapError> {
    let source_transform = graph[source].as_group().effective_transformation();
    let source_inverse = source_transform.try_inverse().ok_or_else(|| {
        MapError::LinkedGroup(format!(
            "transformation of source group \"{}\" is singular",
            graph[source].as_group().name()
        ))
    })?;

    let mut updates = Vec::new();
    let mut spawned = Vec::new();
    let mut fail = None;

    'targets: for &target in targets {
        if target == source {
            continue;
        }
        let target_name = graph[target].as_group().name().to_owned();
        if !congruent(graph, source, target) {
            fail = Some(MapError::LinkedGroup(format!(
                "linked group \"{target_name}\" is not congruent with the edited group"
            )));
            break;
        }
        let transform = graph[target].as_group().effective_transformation() * source_inverse;

        let mut new_children = Vec::new();
        let source_children: Vec<_> = graph[source].children().to_vec();
        let target_children: Vec<_> = graph[target].children().to_vec();
        for (&source_child, &target_child) in source_children.iter().zip(&target_children) {
            match clone_onto(graph, source_child, Some(target_child), &transform) {
                Ok(clone) => {
                    spawned.push(clone);
                    new_children.push(clone);
                }
                Err(error) => {
                    fail = Some(error);
                    break 'targets;
                }
            }
        }

        for &clone in &new_children {
            if let Some(error) = check_world_bounds(graph, clone, world_bounds, &target_name) {
                fail = Some(error);
                break 'targets;
            }
        }

        updates.push(LinkedGroupUpdate {
            target,
            new_children,
        });
    }

    if let Some(error) = fail {
        for clone in spawned {
            graph.free_subtree(clone);
        }
        return Err(error);
    }
    Ok(updates)
}

/// Clones one source node (and its subtree) mapped through `transform`,
/// merging per-instance state from the positionally corresponding target node.
fn clone_onto(
    graph: &mut MapGraph,
    source: Handle<Node>,
    target: Option<Handle<Node>>,
    transform: &Matrix4<f64>,
) -> Result<Handle<Node>, MapError> {
    let mut node = graph[source].clone();
    node.parent = Handle::NONE;
    node.children.clear();
    node.selected = false;
    node.invalidate_bounds();

    if let Some(kind) = transformed_kind(&node, transform, TransformOptions { uv_lock: true })? {
        node.replace_kind(kind);
    }

    if let Some(target) = target {
        let target_node = &graph[target];
        node.set_link_id(target_node.link_id().to_owned());
        node.set_visibility(target_node.visibility());
        node.set_lock_state(target_node.lock_state());
        node.set_persistent_id(target_node.persistent_id());
        node.set_file_position(target_node.file_position());

        match (node.kind_mut(), target_node.kind()) {
            (NodeKind::Group(clone_group), NodeKind::Group(target_group)) => {
                // Instances keep their own names.
                clone_group.set_name(target_group.name().to_owned());
            }
            (NodeKind::Entity(clone_entity), NodeKind::Entity(target_entity)) => {
                merge_protected_properties(clone_entity, target_entity);
            }
            _ => {}
        }
    }

    let clone = graph.spawn_detached(node);
    let source_children: Vec<_> = graph[source].children().to_vec();
    let target_children: Vec<_> = target
        .map(|t| graph[t].children().to_vec())
        .unwrap_or_default();
    for (position, &source_child) in source_children.iter().enumerate() {
        let target_child = target_children.get(position).copied();
        match clone_onto(graph, source_child, target_child, transform) {
            Ok(child_clone) => {
                graph[child_clone].parent = clone;
                graph[clone].children.push(child_clone);
            }
            Err(error) => {
                graph.free_subtree(clone);
                return Err(error);
            }
        }
    }
    Ok(clone)
}

/// Applies the protected-property rules: a key protected on either side keeps
/// the target's state (its value, or its absence); everything else follows the
/// source. The target's own protected list survives.
fn merge_protected_properties(clone: &mut Entity, target: &Entity) {
    let source_protected: Vec<String> = clone.protected_properties().to_vec();
    let target_protected: Vec<String> = target.protected_properties().to_vec();
    let is_protected = |key: &str| {
        source_protected.iter().any(|k| k == key) || target_protected.iter().any(|k| k == key)
    };

    let mut merged: Vec<EntityProperty> = Vec::new();
    for property in clone.properties() {
        if is_protected(&property.key) {
            if let Some(value) = target.property(&property.key) {
                merged.push(EntityProperty::new(property.key.clone(), value.to_owned()));
            }
            // Protected and absent on the target: the target opted out.
        } else {
            merged.push(property.clone());
        }
    }
    for property in target.properties() {
        if is_protected(&property.key) && !merged.iter().any(|p| p.key == property.key) {
            merged.push(property.clone());
        }
    }

    clone.set_properties(merged);
    clone.set_protected_properties(target_protected);
}

fn check_world_bounds(
    graph: &MapGraph,
    node: Handle<Node>,
    world_bounds: &Bounds3,
    target_name: &str,
) -> Option<MapError> {
    for handle in graph.traverse(node) {
        let bounds = graph.logical_bounds(handle);
        if bounds.is_valid() && !world_bounds.contains_bounds(&bounds) {
            return Some(MapError::WorldBounds(format!(
                "updating linked group \"{target_name}\" would exceed the world bounds"
            )));
        }
    }
    None
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        brush::Brush,
        node::{group::Group, world::World, Node, NodeKind},
    };
    use redoubt_core::algebra::Vector3;

    fn world_graph() -> MapGraph {
        MapGraph::new(World::default())
    }

    fn group_node(name: &str, link_id: &str) -> Node {
        let mut node = Node::new(NodeKind::Group(Group::new(name)));
        node.set_link_id(link_id);
        node
    }

    fn entity_node(pairs: &[(&str, &str)]) -> Node {
        let mut entity = Entity::default();
        for (key, value) in pairs {
            entity.set_property(*key, *value);
        }
        Node::new(NodeKind::Entity(entity))
    }

    fn brush_node(min: f64, max: f64) -> Node {
        Node::new(NodeKind::Brush(
            Brush::cuboid(
                Vector3::new(min, min, min),
                Vector3::new(max, max, max),
                "m",
            )
            .unwrap(),
        ))
    }

    #[test]
    fn initialize_assigns_matching_descendant_ids() {
        let mut graph = world_graph();
        let layer = graph.default_layer();
        let a = graph.add_node(group_node("outer", "family"), layer).unwrap();
        let a_entity = graph.add_node(entity_node(&[]), a).unwrap();
        let a_brush = graph.add_node(brush_node(0.0, 32.0), a).unwrap();
        let b = graph.add_node(group_node("outer", "family"), layer).unwrap();
        let b_entity = graph.add_node(entity_node(&[]), b).unwrap();
        let b_brush = graph.add_node(brush_node(0.0, 32.0), b).unwrap();

        assert!(initialize_link_ids(&mut graph).is_empty());
        assert_eq!(graph[a_entity].link_id(), graph[b_entity].link_id());
        assert_eq!(graph[a_brush].link_id(), graph[b_brush].link_id());
        assert_ne!(graph[a_entity].link_id(), graph[a_brush].link_id());
    }

    #[test]
    fn initialize_cuts_incongruent_members_loose() {
        let mut graph = world_graph();
        let layer = graph.default_layer();
        let a = graph.add_node(group_node("outer", "family"), layer).unwrap();
        let _a_entity = graph.add_node(entity_node(&[]), a).unwrap();
        // The second member lacks the entity child.
        let b = graph.add_node(group_node("outer", "family"), layer).unwrap();

        let errors = initialize_link_ids(&mut graph);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], MapError::LinkedGroup(_)));
        assert_ne!(graph[a].link_id(), graph[b].link_id());
    }

    #[test]
    fn propagation_applies_relative_transform() {
        // A linked pair: the source at identity with its entity moved to
        // (1, 2, 3); the copy translated by (0, 2, 0). After propagation the
        // copy's entity sits at (1, 4, 3): the source state mapped through
        // T_copy.
        let mut graph = world_graph();
        let layer = graph.default_layer();
        let source = graph.add_node(group_node("g", "family"), layer).unwrap();
        let source_entity = graph
            .add_node(entity_node(&[("classname", "light"), ("origin", "1 2 3")]), source)
            .unwrap();
        let copy = graph.add_node(group_node("g", "family"), layer).unwrap();
        let _copy_entity = graph
            .add_node(entity_node(&[("classname", "light"), ("origin", "0 2 0")]), copy)
            .unwrap();
        graph[copy].as_group_mut().set_transformation(Some(
            Matrix4::new_translation(&Vector3::new(0.0, 2.0, 0.0)),
        ));
        assert!(initialize_link_ids(&mut graph).is_empty());

        let world_bounds = Bounds3::from_radius(8192.0);
        let updates = update_linked_groups(&mut graph, source, &[copy], &world_bounds).unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].target, copy);
        assert_eq!(updates[0].new_children.len(), 1);
        let new_entity = updates[0].new_children[0];
        assert_eq!(
            graph[new_entity].as_entity().property("origin"),
            Some("1 4 3")
        );
        // The clone carries the target-side link id.
        assert_eq!(
            graph[new_entity].link_id(),
            graph[source_entity].link_id()
        );
    }

    #[test]
    fn propagation_respects_world_bounds() {
        let mut graph = world_graph();
        let layer = graph.default_layer();
        let source = graph.add_node(group_node("g", "family"), layer).unwrap();
        let _brush = graph.add_node(brush_node(0.0, 64.0), source).unwrap();
        let copy = graph.add_node(group_node("g", "family"), layer).unwrap();
        let _copy_brush = graph.add_node(brush_node(0.0, 64.0), copy).unwrap();
        graph[copy].as_group_mut().set_transformation(Some(
            Matrix4::new_translation(&Vector3::new(8180.0, 0.0, 0.0)),
        ));
        assert!(initialize_link_ids(&mut graph).is_empty());

        let node_count = graph.node_count();
        let world_bounds = Bounds3::from_radius(8192.0);
        let result = update_linked_groups(&mut graph, source, &[copy], &world_bounds);
        assert!(matches!(result, Err(MapError::WorldBounds(_))));
        // The failed attempt must not leak clones.
        assert_eq!(graph.node_count(), node_count);
    }

    #[test]
    fn protected_properties_keep_target_values() {
        let mut source = Entity::default();
        source.set_property("classname", "light");
        source.set_property("light", "400");
        source.set_property("added", "yes");

        let mut target = Entity::default();
        target.set_property("classname", "light");
        target.set_property("light", "100");
        target.set_protected_properties(vec!["light".to_owned()]);

        let mut clone = source.clone();
        merge_protected_properties(&mut clone, &target);
        // The protected key keeps the target's value, everything else follows
        // the source.
        assert_eq!(clone.property("light"), Some("100"));
        assert_eq!(clone.property("added"), Some("yes"));
        assert_eq!(clone.protected_properties(), &["light".to_owned()]);
    }

    #[test]
    fn protected_key_absent_on_target_is_not_added() {
        let mut source = Entity::default();
        source.set_property("some_key", "some_value");

        let mut target = Entity::default();
        target.set_protected_properties(vec!["some_key".to_owned()]);

        let mut clone = source.clone();
        merge_protected_properties(&mut clone, &target);
        assert_eq!(clone.property("some_key"), None);
    }

    #[test]
    fn source_protected_key_keeps_target_value() {
        let mut source = Entity::default();
        source.set_property("some_key", "other_value");
        source.set_protected_properties(vec!["some_key".to_owned()]);

        let mut target = Entity::default();
        target.set_property("some_key", "some_value");

        let mut clone = source.clone();
        merge_protected_properties(&mut clone, &target);
        assert_eq!(clone.property("some_key"), Some("some_value"));
        // The target's (empty) protected list wins.
        assert!(clone.protected_properties().is_empty());
    }
}
