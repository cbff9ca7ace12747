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

//! A trie over the text a node exposes: entity property keys and values, group
//! names, face material names. Insertions are reference counted per
//! `(key, node)` pair, so a brush with six identically textured faces is
//! indexed once per face and survives five removals.

use crate::node::{Node, NodeKind};
use fxhash::FxHashMap;
use redoubt_core::pool::Handle;

#[derive(Debug, Default)]
struct TrieNode {
    children: FxHashMap<u8, TrieNode>,
    values: FxHashMap<Handle<Node>, usize>,
}

impl TrieNode {
    fn insert(&mut self, key: &[u8], node: Handle<Node>) {
        match key.split_first() {
            None => {
                *self.values.entry(node).or_insert(0) += 1;
            }
            Some((first, rest)) => self.children.entry(*first).or_default().insert(rest, node),
        }
    }

    /// Returns true if this trie node became empty and can be pruned.
    fn remove(&mut self, key: &[u8], node: Handle<Node>) -> bool {
        match key.split_first() {
            None => {
                if let Some(count) = self.values.get_mut(&node) {
                    *count -= 1;
                    if *count == 0 {
                        self.values.remove(&node);
                    }
                }
            }
            Some((first, rest)) => {
                if let Some(child) = self.children.get_mut(first) {
                    if child.remove(rest, node) {
                        self.children.remove(first);
                    }
                }
            }
        }
        self.values.is_empty() && self.children.is_empty()
    }

    fn descend(&self, key: &[u8]) -> Option<&TrieNode> {
        match key.split_first() {
            None => Some(self),
            Some((first, rest)) => self.children.get(first)?.descend(rest),
        }
    }

    fn collect(&self, out: &mut Vec<Handle<Node>>) {
        out.extend(self.values.keys().copied());
        for child in self.children.values() {
            child.collect(out);
        }
    }
}

/// See module docs.
#[derive(Debug, Default)]
pub struct NodeIndex {
    root: TrieNode,
}

impl NodeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes every key the node exposes. Idempotent with respect to
    /// [`NodeIndex::remove_node`] thanks to reference counting.
    pub fn add_node(&mut self, handle: Handle<Node>, node: &Node) {
        with_node_keys(node, &mut |key| self.root.insert(key.as_bytes(), handle));
    }

    pub fn remove_node(&mut self, handle: Handle<Node>, node: &Node) {
        with_node_keys(node, &mut |key| {
            self.root.remove(key.as_bytes(), handle);
        });
    }

    pub fn clear(&mut self) {
        self.root = TrieNode::default();
    }

    /// Finds nodes whose indexed text matches the pattern: an exact literal,
    /// or a prefix ending in `*`. Results are sorted and deduplicated.
    pub fn find_nodes(&self, pattern: &str) -> Vec<Handle<Node>> {
        let mut result = Vec::new();
        if let Some(prefix) = pattern.strip_suffix('*') {
            if let Some(node) = self.root.descend(prefix.as_bytes()) {
                node.collect(&mut result);
            }
        } else if let Some(node) = self.root.descend(pattern.as_bytes()) {
            result.extend(node.values.keys().copied());
        }
        result.sort();
        result.dedup();
        result
    }
}

/// Applies `f` to every string a node contributes to the index.
fn with_node_keys(node: &Node, f: &mut impl FnMut(&str)) {
    match node.kind() {
        NodeKind::World(world) => {
            for property in world.entity.properties() {
                f(&property.key);
                f(&property.value);
            }
        }
        NodeKind::Layer(_) => {}
        NodeKind::Group(group) => f(group.name()),
        NodeKind::Entity(entity) => {
            for property in entity.properties() {
                f(&property.key);
                f(&property.value);
            }
        }
        NodeKind::Brush(brush) => {
            for face in brush.faces() {
                f(&face.attributes.material_name);
            }
        }
        NodeKind::Patch(patch) => f(patch.material_name()),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        brush::Brush,
        node::{entity::Entity, group::Group},
    };
    use redoubt_core::algebra::Vector3;

    fn entity_node(pairs: &[(&str, &str)]) -> Node {
        let mut entity = Entity::default();
        for (key, value) in pairs {
            entity.set_property(*key, *value);
        }
        Node::new(NodeKind::Entity(entity))
    }

    #[test]
    fn literal_and_prefix_queries() {
        let mut index = NodeIndex::new();
        let a = Handle::new(1, 1);
        let b = Handle::new(2, 1);
        index.add_node(a, &entity_node(&[("classname", "light"), ("spawnflags", "1")]));
        index.add_node(b, &entity_node(&[("classname", "light_flame")]));

        assert_eq!(index.find_nodes("classname"), vec![a, b]);
        assert_eq!(index.find_nodes("light"), vec![a]);
        assert_eq!(index.find_nodes("light*"), vec![a, b]);
        assert_eq!(index.find_nodes("spawn*"), vec![a]);
        assert!(index.find_nodes("missing").is_empty());
    }

    #[test]
    fn removal_unindexes() {
        let mut index = NodeIndex::new();
        let a = Handle::new(1, 1);
        let node = entity_node(&[("classname", "light")]);
        index.add_node(a, &node);
        index.remove_node(a, &node);
        assert!(index.find_nodes("classname").is_empty());
        assert!(index.find_nodes("light*").is_empty());
    }

    #[test]
    fn duplicate_keys_are_reference_counted() {
        let mut index = NodeIndex::new();
        let handle = Handle::new(3, 1);
        let brush = Brush::cuboid(
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(16.0, 16.0, 16.0),
            "city2_3",
        )
        .unwrap();
        let node = Node::new(NodeKind::Brush(brush));
        // All six faces contribute the same material name.
        index.add_node(handle, &node);
        assert_eq!(index.find_nodes("city2_3"), vec![handle]);
        // A full removal drops all six references.
        index.remove_node(handle, &node);
        assert!(index.find_nodes("city2_3").is_empty());
    }

    #[test]
    fn group_names_are_indexed() {
        let mut index = NodeIndex::new();
        let handle = Handle::new(4, 1);
        index.add_node(handle, &Node::new(NodeKind::Group(Group::new("staircase"))));
        assert_eq!(index.find_nodes("stair*"), vec![handle]);
    }
}
