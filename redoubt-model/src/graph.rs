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

//! The scene tree. Nodes live in a generational arena; parent and child edges
//! are handles. Removing a subtree parks its nodes on tickets so that undo can
//! restore them at the same handles, keeping every recorded handle stable.

use crate::{
    error::MapError,
    node::{world::World, LockState, Node, NodeKind, Visibility},
};
use redoubt_core::{
    math::Bounds3,
    pool::{Handle, Pool, Ticket},
};

/// A detached subtree: the nodes of a removed branch together with the tickets
/// that reserve their arena records, plus enough placement information to put
/// the branch back exactly where it was.
#[derive(Debug)]
pub struct SubGraph {
    /// The branch root and its ticket.
    pub root: (Ticket<Node>, Node),
    /// All descendants of the root with their tickets, pre-order.
    pub descendants: Vec<(Ticket<Node>, Node)>,
    /// The node the branch hung off.
    pub parent: Handle<Node>,
    /// The child slot the branch root occupied in `parent`.
    pub position: usize,
}

/// See module docs.
#[derive(Debug, Default)]
pub struct MapGraph {
    pool: Pool<Node>,
    root: Handle<Node>,
}

impl MapGraph {
    /// Creates a graph holding the given world as root with its default layer.
    pub fn new(world: World) -> Self {
        let mut pool = Pool::new();
        let root = pool.spawn(Node::new(NodeKind::World(world)));
        let mut graph = Self { pool, root };
        let default_layer = graph.pool.spawn(Node::new(NodeKind::Layer(
            crate::node::layer::Layer::default_layer(),
        )));
        graph.pool[default_layer].parent = root;
        graph.pool[root].children.push(default_layer);
        graph
    }

    #[inline]
    pub fn root(&self) -> Handle<Node> {
        self.root
    }

    /// The default layer is always the first layer child of the world.
    pub fn default_layer(&self) -> Handle<Node> {
        self.pool[self.root]
            .children
            .iter()
            .copied()
            .find(|&c| self.pool[c].is_layer() && self.pool[c].as_layer().is_default_layer())
            .expect("a world always has its default layer")
    }

    /// Custom layers in child order (the default layer excluded).
    pub fn custom_layers(&self) -> Vec<Handle<Node>> {
        self.pool[self.root]
            .children
            .iter()
            .copied()
            .filter(|&c| self.pool[c].is_layer() && !self.pool[c].as_layer().is_default_layer())
            .collect()
    }

    #[inline]
    pub fn try_node(&self, handle: Handle<Node>) -> Option<&Node> {
        self.pool.try_borrow(handle)
    }

    #[inline]
    pub fn try_node_mut(&mut self, handle: Handle<Node>) -> Option<&mut Node> {
        self.pool.try_borrow_mut(handle)
    }

    #[inline]
    pub fn is_valid_handle(&self, handle: Handle<Node>) -> bool {
        self.pool.is_valid_handle(handle)
    }

    #[inline]
    pub fn node_count(&self) -> u32 {
        self.pool.alive_count()
    }

    /// Iterates over `(handle, node)` pairs of every node in the graph.
    pub fn pair_iter(&self) -> impl Iterator<Item = (Handle<Node>, &Node)> {
        self.pool.pair_iter()
    }

    /// Spawns a node without linking it anywhere. The caller must link it (or
    /// free it) before the graph is observed again.
    pub fn spawn_detached(&mut self, node: Node) -> Handle<Node> {
        self.pool.spawn(node)
    }

    /// Spawns a node and links it as the last child of `parent`, enforcing the
    /// containment rules.
    pub fn add_node(&mut self, node: Node, parent: Handle<Node>) -> Result<Handle<Node>, MapError> {
        self.check_containment(parent, node.kind())?;
        let handle = self.pool.spawn(node);
        self.link_internal(handle, parent, None);
        self.invalidate_bounds_upward(parent);
        Ok(handle)
    }

    fn check_containment(&self, parent: Handle<Node>, child: &NodeKind) -> Result<(), MapError> {
        let parent_node = self
            .try_node(parent)
            .ok_or_else(|| MapError::Structural("parent handle is dangling".to_owned()))?;
        if !parent_node.can_contain(child) {
            return Err(MapError::Structural(format!(
                "a {} cannot contain a {}",
                parent_node.kind().kind_name(),
                child.kind_name()
            )));
        }
        Ok(())
    }

    /// Moves `child` under `parent`, appending it to the child list.
    pub fn link_nodes(&mut self, child: Handle<Node>, parent: Handle<Node>) -> Result<(), MapError> {
        self.link_nodes_at(child, parent, None)
    }

    /// Moves `child` under `parent` at the given child slot (or at the end).
    pub fn link_nodes_at(
        &mut self,
        child: Handle<Node>,
        parent: Handle<Node>,
        position: Option<usize>,
    ) -> Result<(), MapError> {
        {
            let parent_node = self
                .try_node(parent)
                .ok_or_else(|| MapError::Structural("parent handle is dangling".to_owned()))?;
            if !parent_node.can_contain(self.pool[child].kind()) {
                return Err(MapError::Structural(format!(
                    "a {} cannot contain a {}",
                    parent_node.kind().kind_name(),
                    self.pool[child].kind().kind_name()
                )));
            }
        }
        if child == parent || self.is_descendant_of(parent, child) {
            return Err(MapError::Structural(
                "cannot link a node below itself".to_owned(),
            ));
        }
        let old_parent = self.pool[child].parent;
        self.isolate_node(child);
        self.link_internal(child, parent, position);
        if old_parent.is_some() {
            self.invalidate_bounds_upward(old_parent);
        }
        self.invalidate_bounds_upward(parent);
        Ok(())
    }

    fn link_internal(&mut self, child: Handle<Node>, parent: Handle<Node>, position: Option<usize>) {
        self.pool[child].parent = parent;
        let children = &mut self.pool[parent].children;
        match position {
            Some(position) if position <= children.len() => children.insert(position, child),
            _ => children.push(child),
        }
    }

    /// Detaches `child` from its parent, leaving it parentless but alive.
    pub fn isolate_node(&mut self, child: Handle<Node>) {
        let parent = self.pool[child].parent;
        if let Some(parent_node) = self.pool.try_borrow_mut(parent) {
            parent_node.children.retain(|&c| c != child);
        }
        self.pool[child].parent = Handle::NONE;
    }

    /// Removes the branch rooted at `handle`, reserving every arena record for
    /// a later [`MapGraph::put_sub_graph_back`].
    pub fn take_reserve_sub_graph(&mut self, handle: Handle<Node>) -> SubGraph {
        let parent = self.pool[handle].parent;
        let position = self
            .try_node(parent)
            .and_then(|p| p.children.iter().position(|&c| c == handle))
            .unwrap_or(0);
        self.isolate_node(handle);
        if parent.is_some() {
            self.invalidate_bounds_upward(parent);
        }

        let mut descendants = Vec::new();
        let child_handles: Vec<_> = self.pool[handle].children.clone();
        for child in child_handles {
            self.take_descendants(child, &mut descendants);
        }
        let root = self.pool.take_reserve(handle);
        SubGraph {
            root,
            descendants,
            parent,
            position,
        }
    }

    fn take_descendants(&mut self, handle: Handle<Node>, out: &mut Vec<(Ticket<Node>, Node)>) {
        let child_handles: Vec<_> = self.pool[handle].children.clone();
        out.push(self.pool.take_reserve(handle));
        for child in child_handles {
            self.take_descendants(child, out);
        }
    }

    /// Returns a removed branch to the graph, at its original parent and child
    /// slot. Handles recorded anywhere else become valid again.
    pub fn put_sub_graph_back(&mut self, sub_graph: SubGraph) -> Handle<Node> {
        let SubGraph {
            root: (root_ticket, root_node),
            descendants,
            parent,
            position,
        } = sub_graph;
        let root = self.pool.put_back(root_ticket, root_node);
        for (ticket, node) in descendants {
            let _ = self.pool.put_back(ticket, node);
        }
        if parent.is_some() {
            self.link_internal(root, parent, Some(position));
            self.invalidate_bounds_upward(parent);
        }
        root
    }

    /// Drops a removed branch for good, releasing its arena records.
    pub fn forget_sub_graph(&mut self, sub_graph: SubGraph) {
        let SubGraph {
            root: (root_ticket, _),
            descendants,
            ..
        } = sub_graph;
        self.pool.forget_ticket(root_ticket);
        for (ticket, _) in descendants {
            self.pool.forget_ticket(ticket);
        }
    }

    /// Frees a detached branch immediately (used to discard failed clones).
    pub fn free_subtree(&mut self, handle: Handle<Node>) {
        let children: Vec<_> = self.pool[handle].children.clone();
        for child in children {
            self.free_subtree(child);
        }
        let _ = self.pool.free(handle);
    }

    // --- Traversal -------------------------------------------------------

    /// Pre-order traversal of the branch rooted at `from`, including `from`.
    pub fn traverse(&self, from: Handle<Node>) -> GraphTraverseIterator<'_> {
        GraphTraverseIterator {
            graph: self,
            stack: vec![from],
        }
    }

    /// Post-order traversal: children before their parent.
    pub fn traverse_post(&self, from: Handle<Node>, visit: &mut impl FnMut(Handle<Node>, &Node)) {
        for &child in &self.pool[from].children {
            self.traverse_post(child, visit);
        }
        visit(from, &self.pool[from]);
    }

    #[inline]
    pub fn children(&self, handle: Handle<Node>) -> &[Handle<Node>] {
        &self.pool[handle].children
    }

    /// Ancestors from the immediate parent to the root, in that order.
    pub fn collect_ancestors(&self, handle: Handle<Node>) -> Vec<Handle<Node>> {
        let mut result = Vec::new();
        let mut current = self.pool[handle].parent;
        while let Some(node) = self.try_node(current) {
            result.push(current);
            current = node.parent;
        }
        result
    }

    /// All descendants of `handle` in pre-order, excluding `handle` itself.
    pub fn collect_descendants(&self, handle: Handle<Node>) -> Vec<Handle<Node>> {
        self.traverse(handle).skip(1).collect()
    }

    /// Deduplicated pre-order collection over multiple branches, filtered by a
    /// predicate over the node.
    pub fn collect_nodes(
        &self,
        roots: &[Handle<Node>],
        filter: &impl Fn(&Node) -> bool,
    ) -> Vec<Handle<Node>> {
        let mut seen = fxhash::FxHashSet::default();
        let mut result = Vec::new();
        for &root in roots {
            for handle in self.traverse(root) {
                if seen.insert(handle) && filter(&self.pool[handle]) {
                    result.push(handle);
                }
            }
        }
        result
    }

    /// All brush faces below the given branches as `(brush, face index)` pairs.
    pub fn collect_brush_faces(&self, roots: &[Handle<Node>]) -> Vec<(Handle<Node>, usize)> {
        let mut result = Vec::new();
        for brush in self.collect_nodes(roots, &|n| n.is_brush()) {
            for face_index in 0..self.pool[brush].as_brush().faces().len() {
                result.push((brush, face_index));
            }
        }
        result
    }

    pub fn is_descendant_of(&self, node: Handle<Node>, ancestor: Handle<Node>) -> bool {
        let mut current = self.pool[node].parent;
        while let Some(n) = self.try_node(current) {
            if current == ancestor {
                return true;
            }
            current = n.parent;
        }
        false
    }

    /// The layer a node lives in (the node itself if it is a layer).
    pub fn containing_layer(&self, handle: Handle<Node>) -> Handle<Node> {
        let mut current = handle;
        while let Some(node) = self.try_node(current) {
            if node.is_layer() {
                return current;
            }
            current = node.parent;
        }
        Handle::NONE
    }

    /// The closest group ancestor, or none.
    pub fn containing_group(&self, handle: Handle<Node>) -> Handle<Node> {
        let mut current = self.pool[handle].parent;
        while let Some(node) = self.try_node(current) {
            if node.is_group() {
                return current;
            }
            current = node.parent;
        }
        Handle::NONE
    }

    // --- Visibility and locking ------------------------------------------

    /// Resolves the tri-state: the nearest explicit ancestor state wins,
    /// defaulting to shown.
    pub fn effective_visibility(&self, handle: Handle<Node>) -> Visibility {
        let mut current = handle;
        while let Some(node) = self.try_node(current) {
            match node.visibility() {
                Visibility::Inherited => current = node.parent(),
                explicit => return explicit,
            }
        }
        Visibility::Shown
    }

    pub fn effective_lock(&self, handle: Handle<Node>) -> LockState {
        let mut current = handle;
        while let Some(node) = self.try_node(current) {
            match node.lock_state() {
                LockState::Inherited => current = node.parent(),
                explicit => return explicit,
            }
        }
        LockState::Unlocked
    }

    #[inline]
    pub fn is_visible(&self, handle: Handle<Node>) -> bool {
        self.effective_visibility(handle) != Visibility::Hidden
    }

    #[inline]
    pub fn is_locked(&self, handle: Handle<Node>) -> bool {
        self.effective_lock(handle) == LockState::Locked
    }

    /// A node can be selected and edited if it is shown and not locked.
    #[inline]
    pub fn is_editable(&self, handle: Handle<Node>) -> bool {
        self.is_visible(handle) && !self.is_locked(handle)
    }

    // --- Bounds ----------------------------------------------------------

    /// Clears cached bounds of the node and all its ancestors.
    pub fn invalidate_bounds_upward(&mut self, handle: Handle<Node>) {
        let mut current = handle;
        while let Some(node) = self.try_node(current) {
            node.invalidate_bounds();
            current = node.parent();
        }
    }

    /// Cached logical bounds: geometry hulls for leaves, recursive merges for
    /// containers, definition boxes for point entities. The returned box is
    /// invalid (default) for empty containers.
    pub fn logical_bounds(&self, handle: Handle<Node>) -> Bounds3 {
        let node = &self.pool[handle];
        if let Some(bounds) = node.logical_bounds.get() {
            return bounds;
        }
        let bounds = self.compute_bounds(handle, false);
        node.logical_bounds.set(Some(bounds));
        bounds
    }

    /// Cached physical bounds: like logical bounds, but patches use their
    /// evaluated surface instead of the control hull.
    pub fn physical_bounds(&self, handle: Handle<Node>) -> Bounds3 {
        let node = &self.pool[handle];
        if let Some(bounds) = node.physical_bounds.get() {
            return bounds;
        }
        let bounds = self.compute_bounds(handle, true);
        node.physical_bounds.set(Some(bounds));
        bounds
    }

    fn compute_bounds(&self, handle: Handle<Node>, physical: bool) -> Bounds3 {
        let node = &self.pool[handle];
        match node.kind() {
            NodeKind::Brush(brush) => brush.bounds(),
            NodeKind::Patch(patch) => {
                if physical {
                    patch.surface_bounds()
                } else {
                    patch.hull_bounds()
                }
            }
            NodeKind::Entity(entity) if entity.is_point_entity() => {
                let origin = entity.origin().unwrap_or_default();
                let local = entity
                    .definition()
                    .and_then(|d| match &d.kind {
                        crate::definition::EntityDefinitionKind::Point { bounds } => Some(*bounds),
                        crate::definition::EntityDefinitionKind::Brush => None,
                    })
                    .unwrap_or_else(|| Bounds3::from_radius(8.0));
                Bounds3::from_min_max(local.min + origin, local.max + origin)
            }
            _ => {
                let mut bounds = Bounds3::default();
                for &child in &node.children {
                    let child_bounds = if physical {
                        self.physical_bounds(child)
                    } else {
                        self.logical_bounds(child)
                    };
                    if child_bounds.is_valid() {
                        bounds.add_box(child_bounds);
                    }
                }
                bounds
            }
        }
    }
}

impl std::ops::Index<Handle<Node>> for MapGraph {
    type Output = Node;

    fn index(&self, index: Handle<Node>) -> &Self::Output {
        &self.pool[index]
    }
}

impl std::ops::IndexMut<Handle<Node>> for MapGraph {
    fn index_mut(&mut self, index: Handle<Node>) -> &mut Self::Output {
        &mut self.pool[index]
    }
}

/// Pre-order iterator over a branch.
pub struct GraphTraverseIterator<'a> {
    graph: &'a MapGraph,
    stack: Vec<Handle<Node>>,
}

impl<'a> Iterator for GraphTraverseIterator<'a> {
    type Item = Handle<Node>;

    fn next(&mut self) -> Option<Self::Item> {
        let handle = self.stack.pop()?;
        let node = &self.graph.pool[handle];
        for &child in node.children.iter().rev() {
            self.stack.push(child);
        }
        Some(handle)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        brush::Brush,
        node::{entity::Entity, group::Group, layer::Layer},
    };
    use redoubt_core::algebra::Vector3;

    fn test_graph() -> (MapGraph, Handle<Node>, Handle<Node>, Handle<Node>) {
        let mut graph = MapGraph::new(World::default());
        let layer = graph.default_layer();
        let group = graph
            .add_node(Node::new(NodeKind::Group(Group::new("g"))), layer)
            .unwrap();
        let brush = graph
            .add_node(
                Node::new(NodeKind::Brush(
                    Brush::cuboid(
                        Vector3::new(0.0, 0.0, 0.0),
                        Vector3::new(32.0, 32.0, 32.0),
                        "m",
                    )
                    .unwrap(),
                )),
                group,
            )
            .unwrap();
        (graph, layer, group, brush)
    }

    #[test]
    fn world_has_default_layer() {
        let graph = MapGraph::new(World::default());
        let layer = graph.default_layer();
        assert!(graph[layer].as_layer().is_default_layer());
        assert_eq!(graph[layer].parent(), graph.root());
    }

    #[test]
    fn containment_is_enforced() {
        let mut graph = MapGraph::new(World::default());
        let layer = graph.default_layer();
        // A group cannot live directly under the world.
        assert!(graph
            .add_node(Node::new(NodeKind::Group(Group::new("g"))), graph.root())
            .is_err());
        // A layer cannot live inside a layer.
        assert!(graph
            .add_node(Node::new(NodeKind::Layer(Layer::new("l"))), layer)
            .is_err());
        // A point entity rejects children.
        let point = graph
            .add_node(Node::new(NodeKind::Entity(Entity::with_classname("light"))), layer)
            .unwrap();
        let brush = Brush::cuboid(
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(8.0, 8.0, 8.0),
            "m",
        )
        .unwrap();
        assert!(graph
            .add_node(Node::new(NodeKind::Brush(brush)), point)
            .is_err());
    }

    #[test]
    fn reparent_cycle_rejected() {
        let (mut graph, layer, group, _) = test_graph();
        let inner = graph
            .add_node(Node::new(NodeKind::Group(Group::new("inner"))), group)
            .unwrap();
        assert!(graph.link_nodes(group, inner).is_err());
        assert!(graph.link_nodes(group, group).is_err());
        assert!(graph.link_nodes(inner, layer).is_ok());
        assert_eq!(graph[inner].parent(), layer);
    }

    #[test]
    fn take_and_put_sub_graph_restores_layout() {
        let (mut graph, layer, group, brush) = test_graph();
        let sibling = graph
            .add_node(Node::new(NodeKind::Group(Group::new("after"))), layer)
            .unwrap();
        assert_eq!(graph.children(layer), &[group, sibling]);

        let sub_graph = graph.take_reserve_sub_graph(group);
        assert!(!graph.is_valid_handle(group));
        assert!(!graph.is_valid_handle(brush));
        assert_eq!(graph.children(layer), &[sibling]);

        let restored = graph.put_sub_graph_back(sub_graph);
        assert_eq!(restored, group);
        assert!(graph.is_valid_handle(brush));
        // Restored at the original child slot, before `sibling`.
        assert_eq!(graph.children(layer), &[group, sibling]);
        assert_eq!(graph[brush].parent(), group);
    }

    #[test]
    fn traversal_orders() {
        let (graph, layer, group, brush) = test_graph();
        let pre: Vec<_> = graph.traverse(layer).collect();
        assert_eq!(pre, vec![layer, group, brush]);

        let mut post = Vec::new();
        graph.traverse_post(layer, &mut |handle, _| post.push(handle));
        assert_eq!(post, vec![brush, group, layer]);

        assert_eq!(graph.collect_ancestors(brush), vec![group, layer, graph.root()]);
        assert_eq!(graph.collect_descendants(layer), vec![group, brush]);
    }

    #[test]
    fn collect_nodes_dedups() {
        let (graph, layer, group, brush) = test_graph();
        let nodes = graph.collect_nodes(&[layer, group], &|n| n.is_brush());
        assert_eq!(nodes, vec![brush]);
        let faces = graph.collect_brush_faces(&[layer]);
        assert_eq!(faces.len(), 6);
        assert!(faces.iter().all(|(h, _)| *h == brush));
    }

    #[test]
    fn bounds_propagate_and_cache() {
        let (mut graph, layer, group, brush) = test_graph();
        let expected = Bounds3::from_min_max(
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(32.0, 32.0, 32.0),
        );
        assert_eq!(graph.logical_bounds(brush), expected);
        assert_eq!(graph.logical_bounds(group), expected);
        assert_eq!(graph.logical_bounds(layer), expected);

        // Mutating geometry invalidates upward; the merge follows the change.
        let moved = graph[brush]
            .as_brush()
            .transformed(
                &redoubt_core::algebra::Matrix4::new_translation(&Vector3::new(32.0, 0.0, 0.0)),
                false,
            )
            .unwrap();
        *graph[brush].as_brush_mut() = moved;
        graph.invalidate_bounds_upward(brush);
        assert_eq!(
            graph.logical_bounds(layer),
            Bounds3::from_min_max(Vector3::new(32.0, 0.0, 0.0), Vector3::new(64.0, 32.0, 32.0))
        );
    }

    #[test]
    fn effective_tri_states() {
        let (mut graph, layer, group, brush) = test_graph();
        assert!(graph.is_visible(brush));
        assert!(!graph.is_locked(brush));

        graph[layer].set_visibility(Visibility::Hidden);
        assert!(!graph.is_visible(brush));
        // An explicit Shown below a hidden ancestor wins.
        graph[group].set_visibility(Visibility::Shown);
        assert!(graph.is_visible(brush));

        graph[layer].set_lock_state(LockState::Locked);
        assert!(graph.is_locked(brush));
        graph[group].set_lock_state(LockState::Unlocked);
        assert!(!graph.is_locked(brush));
    }

    #[test]
    fn point_entity_bounds_follow_origin() {
        let mut graph = MapGraph::new(World::default());
        let layer = graph.default_layer();
        let mut entity = Entity::with_classname("light");
        entity.set_property("origin", "100 200 300");
        let handle = graph
            .add_node(Node::new(NodeKind::Entity(entity)), layer)
            .unwrap();
        let bounds = graph.logical_bounds(handle);
        assert_eq!(bounds.center(), Vector3::new(100.0, 200.0, 300.0));
    }
}
