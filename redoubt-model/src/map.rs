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

//! The map: the scene graph together with the derived structures that must
//! stay coherent with it (string index, entity link graph, selection state,
//! editing focus, entity definitions). All mutations of indexed node state go
//! through this type so the derived structures never drift.

use crate::{
    definition::EntityDefinitionCatalog,
    error::MapError,
    format::GameConfig,
    graph::{MapGraph, SubGraph},
    index::NodeIndex,
    links::EntityLinkManager,
    node::{entity::Entity, world::World, Node},
    selection::{Focus, Selection},
};
use redoubt_core::pool::Handle;

/// See module docs.
#[derive(Debug)]
pub struct Map {
    pub graph: MapGraph,
    pub index: NodeIndex,
    pub links: EntityLinkManager,
    pub selection: Selection,
    pub focus: Focus,
    pub definitions: EntityDefinitionCatalog,
    pub game: GameConfig,
}

impl Map {
    pub fn new(world: World, game: GameConfig) -> Self {
        let graph = MapGraph::new(world);
        let focus = Focus::new(graph.default_layer());
        let mut map = Self {
            graph,
            index: NodeIndex::new(),
            links: EntityLinkManager::new(),
            selection: Selection::default(),
            focus,
            definitions: EntityDefinitionCatalog::new(),
            game,
        };
        map.index_node(map.graph.root());
        map
    }

    #[inline]
    pub fn world(&self) -> &World {
        self.graph[self.graph.root()].as_world()
    }

    pub fn world_bounds(&self) -> redoubt_core::math::Bounds3 {
        self.world().bounds()
    }

    // --- Index maintenance ------------------------------------------------

    fn index_node(&mut self, handle: Handle<Node>) {
        let node = &self.graph[handle];
        self.index.add_node(handle, node);
        self.links.add_entity_node(handle, node);
    }

    fn deindex_node(&mut self, handle: Handle<Node>) {
        let node = &self.graph[handle];
        self.index.remove_node(handle, node);
        self.links.remove_entity_node(handle);
    }

    fn index_subtree(&mut self, root: Handle<Node>) {
        let handles: Vec<_> = self.graph.traverse(root).collect();
        for handle in handles {
            self.index_node(handle);
        }
    }

    fn deindex_subtree(&mut self, root: Handle<Node>) {
        let handles: Vec<_> = self.graph.traverse(root).collect();
        for handle in handles {
            self.deindex_node(handle);
        }
    }

    // --- Structural mutation ----------------------------------------------

    /// Adds a new node under `parent` and indexes it.
    pub fn attach_new_node(
        &mut self,
        node: Node,
        parent: Handle<Node>,
    ) -> Result<Handle<Node>, MapError> {
        let handle = self.graph.add_node(node, parent)?;
        self.index_node(handle);
        Ok(handle)
    }

    /// Attaches an already-spawned detached subtree (produced by cloning) and
    /// indexes it.
    pub fn attach_detached_subtree(
        &mut self,
        root: Handle<Node>,
        parent: Handle<Node>,
        position: Option<usize>,
    ) -> Result<(), MapError> {
        self.graph.link_nodes_at(root, parent, position)?;
        self.index_subtree(root);
        Ok(())
    }

    /// Removes a branch, deindexing it and pruning it from the selection.
    pub fn remove_subtree(&mut self, root: Handle<Node>) -> SubGraph {
        let removed: Vec<_> = self.graph.traverse(root).collect();
        for &handle in &removed {
            self.deindex_node(handle);
            self.graph[handle].selected = false;
        }
        self.selection.nodes.retain(|n| !removed.contains(n));
        self.selection.brush_faces.retain(|(n, _)| !removed.contains(n));
        self.focus.open_groups.retain(|g| !removed.contains(g));
        self.graph.take_reserve_sub_graph(root)
    }

    /// Puts a removed branch back and reindexes it.
    pub fn restore_subtree(&mut self, sub_graph: SubGraph) -> Handle<Node> {
        let root = self.graph.put_sub_graph_back(sub_graph);
        self.index_subtree(root);
        root
    }

    /// Drops a removed branch permanently.
    pub fn forget_subtree(&mut self, sub_graph: SubGraph) {
        self.graph.forget_sub_graph(sub_graph);
    }

    /// Frees a detached subtree (never indexed, e.g. a discarded clone).
    pub fn free_detached_subtree(&mut self, root: Handle<Node>) {
        self.graph.free_subtree(root);
    }

    /// Detaches a branch but keeps it alive and deindexed, for a swap.
    pub fn detach_subtree(&mut self, root: Handle<Node>) -> (Handle<Node>, usize) {
        let parent = self.graph[root].parent();
        let position = self
            .graph
            .try_node(parent)
            .and_then(|p| p.children().iter().position(|&c| c == root))
            .unwrap_or(0);
        self.deindex_subtree(root);
        let removed: Vec<_> = self.graph.traverse(root).collect();
        for &handle in &removed {
            self.graph[handle].selected = false;
        }
        self.selection.nodes.retain(|n| !removed.contains(n));
        self.selection.brush_faces.retain(|(n, _)| !removed.contains(n));
        self.graph.isolate_node(root);
        if parent.is_some() {
            self.graph.invalidate_bounds_upward(parent);
        }
        (parent, position)
    }

    // --- Node payload mutation --------------------------------------------

    /// Mutates a node while keeping the index and link graph in sync and the
    /// bounds caches invalidated.
    pub fn update_node<R>(
        &mut self,
        handle: Handle<Node>,
        f: impl FnOnce(&mut Node) -> R,
    ) -> R {
        self.deindex_node(handle);
        let result = f(&mut self.graph[handle]);
        self.graph.invalidate_bounds_upward(handle);
        self.index_node(handle);
        result
    }

    /// Mutates an entity payload (of an entity node or the world).
    pub fn update_entity<R>(
        &mut self,
        handle: Handle<Node>,
        f: impl FnOnce(&mut Entity) -> R,
    ) -> R {
        self.update_node(handle, |node| {
            if node.is_world() {
                f(&mut node.as_world_mut().entity)
            } else {
                f(node.as_entity_mut())
            }
        })
    }

    /// Re-resolves every entity's definition pointer against the current
    /// catalog, dropping handles that no longer resolve. Called after
    /// definitions are (re)loaded.
    pub fn refresh_entity_definitions(&mut self) {
        let handles: Vec<_> = self
            .graph
            .traverse(self.graph.root())
            .filter(|&h| self.graph[h].is_entity() || self.graph[h].is_world())
            .collect();
        for handle in handles {
            let classname = {
                let node = &self.graph[handle];
                let entity = if node.is_world() {
                    &node.as_world().entity
                } else {
                    node.as_entity()
                };
                entity.classname().map(str::to_owned)
            };
            let definition = classname.and_then(|c| self.definitions.find(&c));
            self.update_entity(handle, |entity| entity.set_definition(definition));
        }
    }

    // --- Selection --------------------------------------------------------

    /// Replaces the selection wholesale, maintaining the per-node flags.
    /// Returns the previous selection.
    pub fn set_selection(&mut self, selection: Selection) -> Selection {
        for &node in &self.selection.nodes {
            if let Some(node) = self.graph.try_node_mut(node) {
                node.selected = false;
            }
        }
        for &node in &selection.nodes {
            self.graph[node].selected = true;
        }
        std::mem::replace(&mut self.selection, selection)
    }

    /// Finds nodes via the string index; `pattern` is a literal or a prefix
    /// ending in `*`. Dangling handles (never expected) are filtered out.
    pub fn find_nodes(&self, pattern: &str) -> Vec<Handle<Node>> {
        self.index
            .find_nodes(pattern)
            .into_iter()
            .filter(|&h| self.graph.is_valid_handle(h))
            .collect()
    }

    /// Typed variant of [`Map::find_nodes`].
    pub fn find_nodes_of(
        &self,
        pattern: &str,
        filter: impl Fn(&Node) -> bool,
    ) -> Vec<Handle<Node>> {
        self.find_nodes(pattern)
            .into_iter()
            .filter(|&h| filter(&self.graph[h]))
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::node::{group::Group, NodeKind};

    fn light(origin: &str) -> Node {
        let mut entity = Entity::with_classname("light");
        entity.set_property("origin", origin.to_owned());
        Node::new(NodeKind::Entity(entity))
    }

    #[test]
    fn index_follows_structural_changes() {
        let mut map = Map::new(World::default(), GameConfig::default());
        let layer = map.graph.default_layer();
        let handle = map.attach_new_node(light("0 0 0"), layer).unwrap();
        assert_eq!(map.find_nodes("light"), vec![handle]);

        let sub_graph = map.remove_subtree(handle);
        assert!(map.find_nodes("light").is_empty());

        let restored = map.restore_subtree(sub_graph);
        assert_eq!(restored, handle);
        assert_eq!(map.find_nodes("light"), vec![handle]);
    }

    #[test]
    fn update_entity_reindexes() {
        let mut map = Map::new(World::default(), GameConfig::default());
        let layer = map.graph.default_layer();
        let handle = map.attach_new_node(light("0 0 0"), layer).unwrap();
        map.update_entity(handle, |entity| {
            entity.set_property("classname", "light_flame");
        });
        assert!(map.find_nodes_of("light", |n| n.is_entity()).is_empty());
        assert_eq!(map.find_nodes("light_flame"), vec![handle]);
    }

    #[test]
    fn removal_prunes_selection() {
        let mut map = Map::new(World::default(), GameConfig::default());
        let layer = map.graph.default_layer();
        let group = map
            .attach_new_node(Node::new(NodeKind::Group(Group::new("g"))), layer)
            .unwrap();
        let child = map.attach_new_node(light("0 0 0"), group).unwrap();
        map.set_selection(Selection::of_nodes(vec![child]));
        assert!(map.graph[child].is_selected());

        let sub_graph = map.remove_subtree(group);
        assert!(map.selection.is_empty());
        map.restore_subtree(sub_graph);
        // Restoring the subtree does not resurrect the selection; undo of the
        // owning command does that explicitly.
        assert!(map.selection.is_empty());
    }

    #[test]
    fn world_properties_are_indexed() {
        let mut map = Map::new(World::default(), GameConfig::default());
        let root = map.graph.root();
        assert_eq!(map.find_nodes("worldspawn"), vec![root]);
        map.update_entity(root, |entity| {
            entity.set_property("message", "Welcome to e1m1");
        });
        assert_eq!(map.find_nodes("message"), vec![root]);
    }
}
