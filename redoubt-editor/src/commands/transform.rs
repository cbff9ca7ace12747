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

//! The transform command: applies a matrix to the subtrees of the given
//! nodes. Replacement payloads are computed and validated up front, so a
//! failing transform leaves the map untouched. Members of linked groups are
//! transformed with UV lock forced on, whatever the user preference says.

use crate::command::{Command, CommandTrait, ModelContext};
use redoubt_core::{algebra::Matrix4, pool::Handle};
use redoubt_model::{
    linked, node::{Node, NodeKind},
    transform::{transformed_kind, TransformOptions},
    Map, MapError,
};

#[derive(Debug)]
pub struct TransformNodesCommand {
    nodes: Vec<Handle<Node>>,
    transform: Matrix4<f64>,
    options: TransformOptions,
    old_kinds: Vec<(Handle<Node>, NodeKind)>,
    /// A pure translation may collate with a directly following one.
    translation_only: bool,
}

impl TransformNodesCommand {
    pub fn new(nodes: Vec<Handle<Node>>, transform: Matrix4<f64>, options: TransformOptions) -> Self {
        let translation_only = {
            let linear = transform.fixed_view::<3, 3>(0, 0).into_owned();
            (linear - redoubt_core::algebra::Matrix3::identity()).abs().max() < 1e-12
        };
        Self {
            nodes,
            transform,
            options,
            old_kinds: Vec::new(),
            translation_only,
        }
    }

    fn apply(&self, ctx: &mut ModelContext) -> Result<Vec<(Handle<Node>, NodeKind)>, MapError> {
        let world_bounds = ctx.map.world_bounds();
        let mut replacements = Vec::new();
        for &root in &self.nodes {
            let in_linked_group = member_of_linked_group(ctx.map, root);
            let options = TransformOptions {
                uv_lock: self.options.uv_lock || in_linked_group,
            };
            let handles: Vec<_> = ctx.map.graph.traverse(root).collect();
            for handle in handles {
                if let Some(kind) = transformed_kind(&ctx.map.graph[handle], &self.transform, options)? {
                    let bounds = match &kind {
                        NodeKind::Brush(brush) => Some(brush.bounds()),
                        NodeKind::Patch(patch) => Some(patch.hull_bounds()),
                        NodeKind::Entity(entity) => {
                            entity.origin().map(redoubt_core::math::Bounds3::from_point)
                        }
                        _ => None,
                    };
                    if let Some(bounds) = bounds {
                        if bounds.is_valid() && !world_bounds.contains_bounds(&bounds) {
                            return Err(MapError::WorldBounds(format!(
                                "transform moves \"{}\" outside the world bounds",
                                ctx.map.graph[handle].name()
                            )));
                        }
                    }
                    replacements.push((handle, kind));
                }
            }
        }
        Ok(replacements)
    }

    fn commit(&mut self, ctx: &mut ModelContext, replacements: Vec<(Handle<Node>, NodeKind)>) {
        self.old_kinds.clear();
        for (handle, kind) in replacements {
            let old = ctx.map.update_node(handle, |node| node.replace_kind(kind));
            self.old_kinds.push((handle, old));
            ctx.touch(handle);
        }
    }
}

impl CommandTrait for TransformNodesCommand {
    fn name(&self) -> String {
        "Transform Objects".to_owned()
    }

    fn execute(&mut self, ctx: &mut ModelContext) -> Result<(), MapError> {
        let replacements = self.apply(ctx)?;
        self.commit(ctx, replacements);
        Ok(())
    }

    fn revert(&mut self, ctx: &mut ModelContext) {
        for (handle, kind) in self.old_kinds.drain(..).rev() {
            ctx.map.update_node(handle, |node| node.replace_kind(kind));
            ctx.touch(handle);
        }
    }

    fn try_merge(&mut self, other: Command) -> Result<(), Command> {
        let incoming = other.downcast::<TransformNodesCommand>()?;
        // Only consecutive nudges of the same node set coalesce; the incoming
        // command has already executed, so composing the matrices and keeping
        // our original payload snapshots is sufficient.
        if self.translation_only && incoming.translation_only && incoming.nodes == self.nodes {
            self.transform = incoming.transform * self.transform;
            Ok(())
        } else {
            Err(Command(incoming))
        }
    }
}

/// True if the node sits inside (or is) a group whose link family has other
/// members.
pub fn member_of_linked_group(map: &Map, node: Handle<Node>) -> bool {
    let graph = &map.graph;
    let mut current = node;
    while graph.is_valid_handle(current) {
        if graph[current].is_group() {
            let link_id = graph[current].link_id().to_owned();
            if !link_id.is_empty() && linked::collect_linked_groups(graph, &link_id).len() > 1 {
                return true;
            }
        }
        current = graph[current].parent();
    }
    false
}
