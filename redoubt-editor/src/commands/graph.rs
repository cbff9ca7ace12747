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

//! Structural commands: adding, deleting and reparenting nodes. Deletion
//! parks the removed branch on arena tickets, so undo restores it at the same
//! handles and the same child slot.

use crate::command::{CommandTrait, ModelContext};
use redoubt_core::pool::Handle;
use redoubt_model::{graph::SubGraph, linked, node::Node, MapError};

/// Adds one node (with no children) under a parent.
#[derive(Debug)]
pub struct AddNodeCommand {
    node: Option<Node>,
    parent: Handle<Node>,
    handle: Handle<Node>,
    sub_graph: Option<SubGraph>,
    cached_name: String,
}

impl AddNodeCommand {
    pub fn new(node: Node, parent: Handle<Node>) -> Self {
        Self {
            cached_name: format!("Add {}", node.name()),
            node: Some(node),
            parent,
            handle: Handle::NONE,
            sub_graph: None,
        }
    }

    /// The handle of the added node; valid after the first execution.
    pub fn handle(&self) -> Handle<Node> {
        self.handle
    }
}

impl CommandTrait for AddNodeCommand {
    fn name(&self) -> String {
        self.cached_name.clone()
    }

    fn execute(&mut self, ctx: &mut ModelContext) -> Result<(), MapError> {
        match self.sub_graph.take() {
            // First execution inserts the payload; every redo restores the
            // reserved records, keeping the handle stable.
            None => {
                self.handle = ctx
                    .map
                    .attach_new_node(self.node.take().expect("command executed twice"), self.parent)?;
            }
            Some(sub_graph) => {
                let handle = ctx.map.restore_subtree(sub_graph);
                assert_eq!(handle, self.handle);
            }
        }
        ctx.touch(self.parent);
        ctx.touch(self.handle);
        Ok(())
    }

    fn revert(&mut self, ctx: &mut ModelContext) {
        self.sub_graph = Some(ctx.map.remove_subtree(self.handle));
        ctx.touch(self.parent);
    }

    fn finalize(&mut self, ctx: &mut ModelContext) {
        if let Some(sub_graph) = self.sub_graph.take() {
            ctx.map.forget_subtree(sub_graph);
        }
    }
}

/// Removes a whole branch.
#[derive(Debug)]
pub struct DeleteSubtreeCommand {
    handle: Handle<Node>,
    parent: Handle<Node>,
    sub_graph: Option<SubGraph>,
    cached_name: String,
}

impl DeleteSubtreeCommand {
    pub fn new(handle: Handle<Node>) -> Self {
        Self {
            handle,
            parent: Handle::NONE,
            sub_graph: None,
            cached_name: "Delete Objects".to_owned(),
        }
    }
}

impl CommandTrait for DeleteSubtreeCommand {
    fn name(&self) -> String {
        self.cached_name.clone()
    }

    fn execute(&mut self, ctx: &mut ModelContext) -> Result<(), MapError> {
        self.parent = ctx.map.graph[self.handle].parent();
        self.sub_graph = Some(ctx.map.remove_subtree(self.handle));
        ctx.touch(self.parent);
        Ok(())
    }

    fn revert(&mut self, ctx: &mut ModelContext) {
        let sub_graph = self.sub_graph.take().expect("revert without execute");
        let handle = ctx.map.restore_subtree(sub_graph);
        assert_eq!(handle, self.handle);
        ctx.touch(self.parent);
        ctx.touch(self.handle);
    }

    fn finalize(&mut self, ctx: &mut ModelContext) {
        if let Some(sub_graph) = self.sub_graph.take() {
            ctx.map.forget_subtree(sub_graph);
        }
    }
}

/// Moves a node under a new parent, applying the link-id reset rules: a node
/// leaving a linked group becomes independent, and a brush entity moved out of
/// any group resets its whole subtree.
#[derive(Debug)]
pub struct ReparentNodeCommand {
    node: Handle<Node>,
    new_parent: Handle<Node>,
    old_parent: Handle<Node>,
    old_position: usize,
    old_link_ids: Vec<(Handle<Node>, String)>,
}

impl ReparentNodeCommand {
    pub fn new(node: Handle<Node>, new_parent: Handle<Node>) -> Self {
        Self {
            node,
            new_parent,
            old_parent: Handle::NONE,
            old_position: 0,
            old_link_ids: Vec::new(),
        }
    }
}

impl CommandTrait for ReparentNodeCommand {
    fn name(&self) -> String {
        "Reparent Objects".to_owned()
    }

    fn execute(&mut self, ctx: &mut ModelContext) -> Result<(), MapError> {
        let graph = &ctx.map.graph;
        self.old_parent = graph[self.node].parent();
        self.old_position = graph
            .try_node(self.old_parent)
            .and_then(|p| p.children().iter().position(|&c| c == self.node))
            .unwrap_or(0);

        let old_group = graph.containing_group(self.node);
        let old_group_is_linked = old_group.is_some()
            && linked::collect_linked_groups(graph, graph[old_group].link_id()).len() > 1;
        let left_linked_group = old_group_is_linked
            && self.new_parent != old_group
            && !graph.is_descendant_of(self.new_parent, old_group);
        let brush_entity_to_world = old_group.is_some() && {
            let node = &graph[self.node];
            node.is_entity()
                && !node.as_entity().is_point_entity()
                && graph[self.new_parent].is_layer()
        };

        ctx.map.graph.link_nodes(self.node, self.new_parent)?;

        // Snapshot and reset link identities where the move demands it.
        self.old_link_ids.clear();
        if brush_entity_to_world {
            let subtree: Vec<_> = ctx.map.graph.traverse(self.node).collect();
            for handle in subtree {
                let old = ctx.map.graph[handle].link_id().to_owned();
                if !old.is_empty() {
                    self.old_link_ids.push((handle, old));
                    let fresh = linked::fresh_link_id();
                    ctx.map.graph[handle].set_link_id(fresh);
                }
            }
        } else if left_linked_group {
            let old = ctx.map.graph[self.node].link_id().to_owned();
            if !old.is_empty() {
                self.old_link_ids.push((self.node, old));
                let fresh = linked::fresh_link_id();
                ctx.map.graph[self.node].set_link_id(fresh);
            }
        }

        ctx.touch(self.old_parent);
        ctx.touch(self.new_parent);
        ctx.touch(self.node);
        Ok(())
    }

    fn revert(&mut self, ctx: &mut ModelContext) {
        for (handle, link_id) in self.old_link_ids.drain(..) {
            ctx.map.graph[handle].set_link_id(link_id);
        }
        let _ = ctx
            .map
            .graph
            .link_nodes_at(self.node, self.old_parent, Some(self.old_position));
        ctx.touch(self.old_parent);
        ctx.touch(self.new_parent);
    }
}

/// Swaps a linked-group target's children for freshly propagated clones. Built
/// by the engine after the user-visible commands of a unit have run; never
/// triggers propagation itself.
#[derive(Debug)]
pub struct ReplaceLinkedChildrenCommand {
    target: Handle<Node>,
    new_children: Vec<Handle<Node>>,
    old_children: Vec<SubGraph>,
    executed: bool,
}

impl ReplaceLinkedChildrenCommand {
    /// `new_children` must be detached subtrees already spawned in the arena.
    pub fn new(target: Handle<Node>, new_children: Vec<Handle<Node>>) -> Self {
        Self {
            target,
            new_children,
            old_children: Vec::new(),
            executed: false,
        }
    }
}

impl CommandTrait for ReplaceLinkedChildrenCommand {
    fn name(&self) -> String {
        "Update Linked Groups".to_owned()
    }

    fn execute(&mut self, ctx: &mut ModelContext) -> Result<(), MapError> {
        let current: Vec<_> = ctx.map.graph.children(self.target).to_vec();
        self.old_children = current
            .into_iter()
            .map(|child| ctx.map.remove_subtree(child))
            .collect();
        for &child in &self.new_children {
            ctx.map
                .attach_detached_subtree(child, self.target, None)?;
        }
        self.executed = true;
        ctx.touch(self.target);
        Ok(())
    }

    fn revert(&mut self, ctx: &mut ModelContext) {
        for &child in self.new_children.iter().rev() {
            ctx.map.detach_subtree(child);
        }
        // The old children were taken front to back, so they go back in
        // reverse to land at their recorded slots.
        for sub_graph in self.old_children.drain(..).rev() {
            ctx.map.restore_subtree(sub_graph);
        }
        self.executed = false;
        ctx.touch(self.target);
    }

    fn finalize(&mut self, ctx: &mut ModelContext) {
        if self.executed {
            // The old children will never come back.
            for sub_graph in self.old_children.drain(..) {
                ctx.map.forget_subtree(sub_graph);
            }
        } else {
            // The clones were rolled out again and are still parked detached.
            for child in self.new_children.drain(..) {
                ctx.map.free_detached_subtree(child);
            }
        }
    }
}

/// Attaches an already-spawned detached subtree (a clone) under a parent.
#[derive(Debug)]
pub struct AddSubtreeCommand {
    root: Handle<Node>,
    parent: Handle<Node>,
    executed: bool,
    cached_name: String,
}

impl AddSubtreeCommand {
    pub fn new(root: Handle<Node>, parent: Handle<Node>, name: &str) -> Self {
        Self {
            root,
            parent,
            executed: false,
            cached_name: name.to_owned(),
        }
    }

    pub fn handle(&self) -> Handle<Node> {
        self.root
    }
}

impl CommandTrait for AddSubtreeCommand {
    fn name(&self) -> String {
        self.cached_name.clone()
    }

    fn execute(&mut self, ctx: &mut ModelContext) -> Result<(), MapError> {
        ctx.map
            .attach_detached_subtree(self.root, self.parent, None)?;
        self.executed = true;
        ctx.touch(self.parent);
        ctx.touch(self.root);
        Ok(())
    }

    fn revert(&mut self, ctx: &mut ModelContext) {
        ctx.map.detach_subtree(self.root);
        self.executed = false;
        ctx.touch(self.parent);
    }

    fn finalize(&mut self, ctx: &mut ModelContext) {
        if !self.executed {
            ctx.map.free_detached_subtree(self.root);
        }
    }
}

/// Cuts groups loose from their link families by regenerating their link ids
/// (and their descendants', nested groups excepted).
#[derive(Debug)]
pub struct ResetLinkIdsCommand {
    groups: Vec<Handle<Node>>,
    old_ids: Vec<(Handle<Node>, String)>,
}

impl ResetLinkIdsCommand {
    pub fn new(groups: Vec<Handle<Node>>) -> Self {
        Self {
            groups,
            old_ids: Vec::new(),
        }
    }
}

impl CommandTrait for ResetLinkIdsCommand {
    fn name(&self) -> String {
        "Separate Linked Groups".to_owned()
    }

    fn execute(&mut self, ctx: &mut ModelContext) -> Result<(), MapError> {
        self.old_ids.clear();
        for &group in &self.groups {
            for handle in ctx.map.graph.traverse(group).collect::<Vec<_>>() {
                let link_id = ctx.map.graph[handle].link_id().to_owned();
                if !link_id.is_empty() {
                    self.old_ids.push((handle, link_id));
                }
            }
            ctx.touch(group);
        }
        linked::reset_link_ids(&mut ctx.map.graph, &self.groups);
        Ok(())
    }

    fn revert(&mut self, ctx: &mut ModelContext) {
        for (handle, link_id) in self.old_ids.drain(..) {
            ctx.map.graph[handle].set_link_id(link_id);
        }
        for &group in &self.groups {
            ctx.touch(group);
        }
    }
}

