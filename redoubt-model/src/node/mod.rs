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

//! Scene node: a common base shared by all variants plus a tagged payload.
//! Parent and child links are arena handles; the tree itself lives in
//! [`crate::graph::MapGraph`].

pub mod entity;
pub mod group;
pub mod layer;
pub mod world;

pub use entity::{Entity, EntityProperty};
pub use group::Group;
pub use layer::{Color, Layer};
pub use world::World;

use crate::{brush::Brush, patch::Patch};
use bitflags::bitflags;
use redoubt_core::{math::Bounds3, pool::Handle};
use std::cell::Cell;
use std::ops::{Deref, DerefMut};

bitflags! {
    /// Smart-tag matcher results. Bits are allocated at runtime by the tag
    /// registry; sixteen are reserved per node.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct TagMask: u16 {}
}

/// Explicit visibility stored on a node. The effective state of a node is the
/// nearest non-inherited ancestor state, defaulting to shown.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Visibility {
    #[default]
    Inherited,
    Shown,
    Hidden,
}

/// Explicit lock state stored on a node; resolved like [`Visibility`],
/// defaulting to unlocked.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum LockState {
    #[default]
    Inherited,
    Unlocked,
    Locked,
}

/// The line span a node occupied in the source file, recorded by the reader
/// and used to select nodes by line number.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FilePosition {
    /// First line of the node's definition, 1-based.
    pub first_line: usize,
    /// Number of lines the definition spans.
    pub line_count: usize,
}

impl FilePosition {
    pub fn new(first_line: usize, line_count: usize) -> Self {
        Self {
            first_line,
            line_count,
        }
    }

    pub fn contains(&self, line: usize) -> bool {
        line >= self.first_line && line < self.first_line + self.line_count
    }
}

/// State shared by every node variant.
#[derive(Clone, Debug)]
pub struct NodeBase {
    pub(crate) parent: Handle<Node>,
    pub(crate) children: Vec<Handle<Node>>,
    persistent_id: Option<u64>,
    link_id: String,
    visibility: Visibility,
    lock_state: LockState,
    pub(crate) selected: bool,
    file_position: Option<FilePosition>,
    pub(crate) logical_bounds: Cell<Option<Bounds3>>,
    pub(crate) physical_bounds: Cell<Option<Bounds3>>,
    tags: TagMask,
}

impl Default for NodeBase {
    fn default() -> Self {
        Self {
            parent: Handle::NONE,
            children: Vec::new(),
            persistent_id: None,
            link_id: String::new(),
            visibility: Visibility::Inherited,
            lock_state: LockState::Inherited,
            selected: false,
            file_position: None,
            logical_bounds: Cell::new(None),
            physical_bounds: Cell::new(None),
            tags: TagMask::empty(),
        }
    }
}

impl NodeBase {
    #[inline]
    pub fn parent(&self) -> Handle<Node> {
        self.parent
    }

    #[inline]
    pub fn children(&self) -> &[Handle<Node>] {
        &self.children
    }

    #[inline]
    pub fn persistent_id(&self) -> Option<u64> {
        self.persistent_id
    }

    #[inline]
    pub fn set_persistent_id(&mut self, id: Option<u64>) {
        self.persistent_id = id;
    }

    /// The identity used by the linked-group engine; empty for nodes that do
    /// not participate in any linked family.
    #[inline]
    pub fn link_id(&self) -> &str {
        &self.link_id
    }

    #[inline]
    pub fn set_link_id<S: Into<String>>(&mut self, link_id: S) {
        self.link_id = link_id.into();
    }

    #[inline]
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    #[inline]
    pub fn set_visibility(&mut self, visibility: Visibility) -> Visibility {
        std::mem::replace(&mut self.visibility, visibility)
    }

    #[inline]
    pub fn lock_state(&self) -> LockState {
        self.lock_state
    }

    #[inline]
    pub fn set_lock_state(&mut self, lock_state: LockState) -> LockState {
        std::mem::replace(&mut self.lock_state, lock_state)
    }

    #[inline]
    pub fn is_selected(&self) -> bool {
        self.selected
    }

    #[inline]
    pub fn file_position(&self) -> Option<FilePosition> {
        self.file_position
    }

    #[inline]
    pub fn set_file_position(&mut self, position: Option<FilePosition>) {
        self.file_position = position;
    }

    #[inline]
    pub fn tags(&self) -> TagMask {
        self.tags
    }

    #[inline]
    pub fn set_tags(&mut self, tags: TagMask) {
        self.tags = tags;
    }

    /// Drops both cached bounds of this node. The graph propagates the
    /// invalidation to ancestors.
    #[inline]
    pub fn invalidate_bounds(&self) {
        self.logical_bounds.set(None);
        self.physical_bounds.set(None);
    }
}

/// Payload of a node.
#[derive(Clone, Debug)]
pub enum NodeKind {
    World(World),
    Layer(Layer),
    Group(Group),
    Entity(Entity),
    Brush(Brush),
    Patch(Patch),
}

impl NodeKind {
    /// A stable name for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            NodeKind::World(_) => "World",
            NodeKind::Layer(_) => "Layer",
            NodeKind::Group(_) => "Group",
            NodeKind::Entity(_) => "Entity",
            NodeKind::Brush(_) => "Brush",
            NodeKind::Patch(_) => "Patch",
        }
    }

    /// Structural equality of variants, the unit of the linked-group
    /// congruence walk.
    pub fn same_variant(&self, other: &NodeKind) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// Defines `is_`, `as_` and `as_mut_` casts for one node variant.
macro_rules! define_is_as {
    ($kind:ident -> $result:path => fn $is:ident, fn $as_ref:ident, fn $as_mut:ident) => {
        pub fn $is(&self) -> bool {
            matches!(self.kind, NodeKind::$kind(_))
        }

        /// Panics if the node is of a different variant.
        pub fn $as_ref(&self) -> &$result {
            match self.kind {
                NodeKind::$kind(ref val) => val,
                _ => panic!("Cast to {} failed!", stringify!($kind)),
            }
        }

        /// Panics if the node is of a different variant.
        pub fn $as_mut(&mut self) -> &mut $result {
            match self.kind {
                NodeKind::$kind(ref mut val) => val,
                _ => panic!("Cast to {} failed!", stringify!($kind)),
            }
        }
    };
}

/// A scene node: base state plus the variant payload.
#[derive(Clone, Debug)]
pub struct Node {
    base: NodeBase,
    kind: NodeKind,
}

impl Deref for Node {
    type Target = NodeBase;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

impl DerefMut for Node {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.base
    }
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        let mut base = NodeBase::default();
        // Groups and entities always participate in link identity.
        if matches!(kind, NodeKind::Group(_) | NodeKind::Entity(_)) {
            base.link_id = crate::linked::fresh_link_id();
        }
        Self { base, kind }
    }

    #[inline]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    #[inline]
    pub fn kind_mut(&mut self) -> &mut NodeKind {
        &mut self.kind
    }

    /// Replaces the payload, returning the old one. The base (hierarchy and
    /// state) is untouched.
    #[inline]
    pub fn replace_kind(&mut self, kind: NodeKind) -> NodeKind {
        std::mem::replace(&mut self.kind, kind)
    }

    define_is_as!(World -> World => fn is_world, fn as_world, fn as_world_mut);
    define_is_as!(Layer -> Layer => fn is_layer, fn as_layer, fn as_layer_mut);
    define_is_as!(Group -> Group => fn is_group, fn as_group, fn as_group_mut);
    define_is_as!(Entity -> Entity => fn is_entity, fn as_entity, fn as_entity_mut);
    define_is_as!(Brush -> Brush => fn is_brush, fn as_brush, fn as_brush_mut);
    define_is_as!(Patch -> Patch => fn is_patch, fn as_patch, fn as_patch_mut);

    /// A short human-readable label: group and layer names, entity classnames,
    /// variant names otherwise.
    pub fn name(&self) -> &str {
        match &self.kind {
            NodeKind::World(_) => "worldspawn",
            NodeKind::Layer(layer) => layer.name(),
            NodeKind::Group(group) => group.name(),
            NodeKind::Entity(entity) => entity.classname().unwrap_or("undefined"),
            NodeKind::Brush(_) => "brush",
            NodeKind::Patch(_) => "patch",
        }
    }

    /// Containment rules of the tree: what this node may hold directly.
    pub fn can_contain(&self, child: &NodeKind) -> bool {
        match &self.kind {
            NodeKind::World(_) => matches!(child, NodeKind::Layer(_)),
            NodeKind::Layer(_) | NodeKind::Group(_) => matches!(
                child,
                NodeKind::Group(_) | NodeKind::Entity(_) | NodeKind::Brush(_) | NodeKind::Patch(_)
            ),
            NodeKind::Entity(entity) => {
                !entity.is_point_entity()
                    && matches!(child, NodeKind::Brush(_) | NodeKind::Patch(_))
            }
            NodeKind::Brush(_) | NodeKind::Patch(_) => false,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::brush::Brush;
    use redoubt_core::algebra::Vector3;

    fn cube() -> Brush {
        Brush::cuboid(Vector3::new(0.0, 0.0, 0.0), Vector3::new(32.0, 32.0, 32.0), "none")
            .unwrap()
    }

    #[test]
    fn containment_rules() {
        let world = Node::new(NodeKind::World(World::default()));
        let layer = Node::new(NodeKind::Layer(Layer::new("custom")));
        let group = Node::new(NodeKind::Group(Group::new("g")));
        let brush = Node::new(NodeKind::Brush(cube()));

        assert!(world.can_contain(layer.kind()));
        assert!(!world.can_contain(group.kind()));
        assert!(layer.can_contain(group.kind()));
        assert!(layer.can_contain(brush.kind()));
        assert!(group.can_contain(brush.kind()));
        assert!(!brush.can_contain(group.kind()));

        let mut point = Entity::default();
        point.set_property("classname", "light");
        let point = Node::new(NodeKind::Entity(point));
        assert!(!point.can_contain(brush.kind()));

        let mut door = Entity::default();
        door.set_property("classname", "func_door");
        door.set_brush_entity(true);
        let door = Node::new(NodeKind::Entity(door));
        assert!(door.can_contain(brush.kind()));
        assert!(!door.can_contain(group.kind()));
    }

    #[test]
    fn groups_and_entities_get_link_ids() {
        let group = Node::new(NodeKind::Group(Group::new("g")));
        assert!(!group.link_id().is_empty());
        let entity = Node::new(NodeKind::Entity(Entity::default()));
        assert!(!entity.link_id().is_empty());
        let brush = Node::new(NodeKind::Brush(cube()));
        assert!(brush.link_id().is_empty());
    }

    #[test]
    fn tag_mask_round_trip() {
        let mut node = Node::new(NodeKind::Group(Group::new("g")));
        assert!(node.tags().is_empty());
        let bit = TagMask::from_bits_retain(1 << 3);
        let new_tags = node.tags() | bit;
        node.set_tags(new_tags);
        assert!(node.tags().contains(bit));
    }

    #[test]
    fn file_position_spans() {
        let position = FilePosition::new(4, 2);
        assert!(position.contains(4));
        assert!(position.contains(5));
        assert!(!position.contains(6));
        assert!(!position.contains(3));
    }
}
