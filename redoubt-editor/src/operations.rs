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

//! High-level editing operations on the document: the selection commands, node
//! creation and deletion, grouping and linked duplicates, visibility and lock
//! changes with their selection side effects, and CSG subtraction. Each
//! operation is one transaction; everything it does comes back with one undo.

use crate::{
    command::Command,
    commands::{
        graph::{
            AddNodeCommand, AddSubtreeCommand, DeleteSubtreeCommand, ReparentNodeCommand,
            ResetLinkIdsCommand,
        },
        selection::{
            ChangeSelectionCommand, CloseGroupCommand, OpenGroupCommand, SetCurrentLayerCommand,
        },
        visibility::{SetLockStateCommand, SetVisibilityCommand},
    },
    document::MapDocument,
};
use redoubt_core::{algebra::Matrix4, pool::Handle};
use redoubt_model::{
    linked,
    node::{group::Group, LockState, Node, NodeKind, Visibility},
    selection::{self, Selection},
    MapError,
};

impl MapDocument {
    // --- Selection operations ---------------------------------------------

    /// Selects exactly the given nodes; unselectable ones are dropped.
    pub fn select_nodes(&mut self, nodes: &[Handle<Node>]) -> Result<(), MapError> {
        let map = self.map();
        let filtered: Vec<Handle<Node>> = nodes
            .iter()
            .copied()
            .filter(|&n| selection::selectable(&map.graph, &map.focus, n))
            .collect();
        self.change_selection(Selection::of_nodes(filtered))
    }

    pub fn select_all(&mut self) -> Result<(), MapError> {
        let map = self.map();
        let nodes = selection::collect_selectable(&map.graph, &map.focus, &[map.graph.root()]);
        self.change_selection(Selection::of_nodes(nodes))
    }

    pub fn deselect_all(&mut self) -> Result<(), MapError> {
        self.change_selection(Selection::default())
    }

    pub fn deselect_nodes(&mut self, nodes: &[Handle<Node>]) -> Result<(), MapError> {
        let mut selection = self.selection().clone();
        selection.nodes.retain(|n| !nodes.contains(n));
        self.change_selection(selection)
    }

    /// Selects all selectable siblings of the currently selected nodes.
    pub fn select_siblings(&mut self) -> Result<(), MapError> {
        let map = self.map();
        let mut parents: Vec<Handle<Node>> = Vec::new();
        for &node in &map.selection.nodes {
            let parent = map.graph[node].parent();
            if !parents.contains(&parent) {
                parents.push(parent);
            }
        }
        let mut nodes = Vec::new();
        for parent in parents {
            for &child in map.graph.children(parent) {
                if selection::selectable(&map.graph, &map.focus, child) && !nodes.contains(&child) {
                    nodes.push(child);
                }
            }
        }
        self.change_selection(Selection::of_nodes(nodes))
    }

    /// Selects the nodes touched by the selected brushes, optionally deleting
    /// the query brushes.
    pub fn select_touching(&mut self, delete_query: bool) -> Result<(), MapError> {
        self.select_by_volume(delete_query, false)
    }

    /// Selects the nodes fully contained in the selected brushes.
    pub fn select_containing(&mut self, delete_query: bool) -> Result<(), MapError> {
        self.select_by_volume(delete_query, true)
    }

    fn select_by_volume(
        &mut self,
        delete_query: bool,
        require_containment: bool,
    ) -> Result<(), MapError> {
        let map = self.map();
        let query = map.selection.brushes(&map.graph);
        let nodes =
            selection::collect_touching(&map.graph, &map.focus, &query, require_containment);
        let name = if require_containment {
            "Select Inside"
        } else {
            "Select Touching"
        };
        self.in_transaction(name, |document| {
            if delete_query {
                document.delete_nodes(&query)?;
            }
            document.change_selection(Selection::of_nodes(
                nodes
                    .into_iter()
                    .filter(|&n| document.map().graph.is_valid_handle(n))
                    .collect(),
            ))
        })
    }

    /// Selects the nodes recorded at the given source lines.
    pub fn select_by_line_positions(&mut self, positions: &[usize]) -> Result<(), MapError> {
        let map = self.map();
        let nodes = selection::nodes_with_file_positions(&map.graph, &map.focus, positions);
        self.change_selection(Selection::of_nodes(nodes))
    }

    /// Selects all selectable brushes carrying the given material on any face.
    pub fn select_by_material(&mut self, material: &str) -> Result<(), MapError> {
        let map = self.map();
        let nodes: Vec<Handle<Node>> = map
            .find_nodes(material)
            .into_iter()
            .filter(|&n| {
                let node = &map.graph[n];
                let carries = match node.kind() {
                    NodeKind::Brush(brush) => brush
                        .faces()
                        .iter()
                        .any(|f| f.attributes.material_name == material),
                    NodeKind::Patch(patch) => patch.material_name() == material,
                    _ => false,
                };
                carries && selection::selectable(&map.graph, &map.focus, n)
            })
            .collect();
        self.change_selection(Selection::of_nodes(nodes))
    }

    /// Selects the unselected remainder of the current container.
    pub fn invert_selection(&mut self) -> Result<(), MapError> {
        let map = self.map();
        let nodes = selection::invert_candidates(&map.graph, &map.focus);
        self.change_selection(Selection::of_nodes(nodes))
    }

    pub fn select_all_in_layers(&mut self, layers: &[Handle<Node>]) -> Result<(), MapError> {
        let map = self.map();
        let nodes = selection::collect_selectable(&map.graph, &map.focus, layers);
        self.change_selection(Selection::of_nodes(nodes))
    }

    /// Extends the selection to every member of the selected groups' link
    /// families.
    pub fn select_linked_groups(&mut self) -> Result<(), MapError> {
        let map = self.map();
        if !map.selection.only_groups(&map.graph) {
            return Err(MapError::Structural(
                "only groups can have linked members selected".to_owned(),
            ));
        }
        let mut nodes = Vec::new();
        for &group in &map.selection.nodes {
            for member in linked::collect_linked_groups(&map.graph, map.graph[group].link_id()) {
                if selection::selectable(&map.graph, &map.focus, member)
                    && !nodes.contains(&member)
                {
                    nodes.push(member);
                }
            }
        }
        self.change_selection(Selection::of_nodes(nodes))
    }

    pub fn select_brush_faces(
        &mut self,
        faces: Vec<(Handle<Node>, usize)>,
    ) -> Result<(), MapError> {
        self.change_selection(Selection::of_faces(faces))
    }

    /// Turns a node selection of brushes into the selection of all their
    /// faces.
    pub fn convert_to_face_selection(&mut self) -> Result<(), MapError> {
        let map = self.map();
        let brushes = map.selection.brushes(&map.graph);
        let faces = map.graph.collect_brush_faces(&brushes);
        self.change_selection(Selection::of_faces(faces))
    }

    fn change_selection(&mut self, selection: Selection) -> Result<(), MapError> {
        self.execute(Command::new(ChangeSelectionCommand::new(selection)))
    }

    // --- Focus ------------------------------------------------------------

    pub fn set_current_layer(&mut self, layer: Handle<Node>) -> Result<(), MapError> {
        self.execute(Command::new(SetCurrentLayerCommand::new(layer)))
    }

    /// Opens a group for granular editing; the group's content becomes
    /// selectable, the group itself does not.
    pub fn open_group(&mut self, group: Handle<Node>) -> Result<(), MapError> {
        self.in_transaction("Open Group", |document| {
            document.deselect_all()?;
            document.execute(Command::new(OpenGroupCommand::new(group)))
        })
    }

    pub fn close_group(&mut self) -> Result<(), MapError> {
        self.in_transaction("Close Group", |document| {
            document.deselect_all()?;
            document.execute(Command::new(CloseGroupCommand::new()))
        })
    }

    // --- Structure --------------------------------------------------------

    /// Adds a node under the given parent (or the focused insertion point).
    /// A node created inside a hidden or locked container gets an explicit
    /// shown/unlocked state so it stays workable.
    pub fn add_node(
        &mut self,
        mut node: Node,
        parent: Option<Handle<Node>>,
    ) -> Result<Handle<Node>, MapError> {
        let parent = parent.unwrap_or_else(|| self.map().focus.insertion_parent());
        if self.map().graph.effective_visibility(parent) == Visibility::Hidden {
            node.set_visibility(Visibility::Shown);
        }
        if self.map().graph.effective_lock(parent) == LockState::Locked {
            node.set_lock_state(LockState::Unlocked);
        }
        self.execute_returning(AddNodeCommand::new(node, parent), |command| {
            command.handle()
        })
    }

    /// Deletes the given nodes (with their subtrees) in one unit, fixing the
    /// selection first so that undo restores it.
    pub fn delete_nodes(&mut self, nodes: &[Handle<Node>]) -> Result<(), MapError> {
        // Only subtree roots need deleting: a node whose ancestor is also
        // listed goes away with it.
        let map = self.map();
        let roots: Vec<Handle<Node>> = nodes
            .iter()
            .copied()
            .filter(|&n| map.graph.is_valid_handle(n))
            .filter(|&n| {
                !nodes
                    .iter()
                    .any(|&other| other != n && map.graph.is_descendant_of(n, other))
            })
            .collect();

        let mut remaining = map.selection.clone();
        remaining.nodes.retain(|&n| {
            !roots
                .iter()
                .any(|&root| n == root || map.graph.is_descendant_of(n, root))
        });
        remaining.brush_faces.retain(|&(n, _)| {
            !roots
                .iter()
                .any(|&root| n == root || map.graph.is_descendant_of(n, root))
        });

        self.in_transaction("Delete Objects", |document| {
            document.change_selection(remaining)?;
            for root in roots {
                document.execute(Command::new(DeleteSubtreeCommand::new(root)))?;
            }
            Ok(())
        })
    }

    pub fn delete_selected(&mut self) -> Result<(), MapError> {
        let nodes = self.selection().nodes.clone();
        self.delete_nodes(&nodes)
    }

    /// Moves nodes under a new parent in one unit.
    pub fn reparent_nodes(
        &mut self,
        nodes: &[Handle<Node>],
        new_parent: Handle<Node>,
    ) -> Result<(), MapError> {
        let nodes = nodes.to_vec();
        self.in_transaction("Reparent Objects", |document| {
            for node in nodes {
                document.execute(Command::new(ReparentNodeCommand::new(node, new_parent)))?;
            }
            Ok(())
        })
    }

    // --- Visibility and locking -------------------------------------------

    /// Hides nodes, deselecting everything the hide covers in the same unit.
    pub fn hide_nodes(&mut self, nodes: &[Handle<Node>]) -> Result<(), MapError> {
        let remaining = self.selection_outside(nodes);
        let nodes = nodes.to_vec();
        self.in_transaction("Hide Objects", |document| {
            document.change_selection(remaining)?;
            document.execute(Command::new(SetVisibilityCommand::new(
                nodes,
                Visibility::Hidden,
            )))
        })
    }

    pub fn show_nodes(&mut self, nodes: &[Handle<Node>]) -> Result<(), MapError> {
        self.execute(Command::new(SetVisibilityCommand::new(
            nodes.to_vec(),
            Visibility::Shown,
        )))
    }

    pub fn reset_visibility(&mut self, nodes: &[Handle<Node>]) -> Result<(), MapError> {
        self.execute(Command::new(SetVisibilityCommand::new(
            nodes.to_vec(),
            Visibility::Inherited,
        )))
    }

    /// Locks nodes, deselecting the locked subtrees in the same unit.
    pub fn lock_nodes(&mut self, nodes: &[Handle<Node>]) -> Result<(), MapError> {
        let remaining = self.selection_outside(nodes);
        let nodes = nodes.to_vec();
        self.in_transaction("Lock Objects", |document| {
            document.change_selection(remaining)?;
            document.execute(Command::new(SetLockStateCommand::new(
                nodes,
                LockState::Locked,
            )))
        })
    }

    pub fn unlock_nodes(&mut self, nodes: &[Handle<Node>]) -> Result<(), MapError> {
        self.execute(Command::new(SetLockStateCommand::new(
            nodes.to_vec(),
            LockState::Unlocked,
        )))
    }

    /// The current selection minus the given subtrees.
    fn selection_outside(&self, roots: &[Handle<Node>]) -> Selection {
        let map = self.map();
        let mut selection = map.selection.clone();
        let covered = |n: Handle<Node>| {
            roots
                .iter()
                .any(|&root| n == root || map.graph.is_descendant_of(n, root))
        };
        selection.nodes.retain(|&n| !covered(n));
        selection.brush_faces.retain(|&(n, _)| !covered(n));
        selection
    }

    // --- Grouping ---------------------------------------------------------

    /// Wraps the selected nodes into a new group and selects it. Inner link
    /// ids are preserved.
    pub fn group_selection(&mut self, name: &str) -> Result<Handle<Node>, MapError> {
        let nodes = self.selection().nodes.clone();
        if nodes.is_empty() {
            return Err(MapError::Structural("nothing selected to group".to_owned()));
        }
        let parent = self.map().graph[nodes[0]].parent();
        let name = name.to_owned();
        let mut group_handle = Handle::NONE;
        self.in_transaction("Group Objects", |document| {
            let group = Node::new(NodeKind::Group(Group::new(name.clone())));
            group_handle =
                document.execute_returning(AddNodeCommand::new(group, parent), |c| c.handle())?;
            for &node in &nodes {
                document.execute(Command::new(ReparentNodeCommand::new(node, group_handle)))?;
            }
            document.change_selection(Selection::of_nodes(vec![group_handle]))
        })?;
        Ok(group_handle)
    }

    /// Dissolves the selected groups, reselecting their former content. The
    /// emptied groups are removed by the post-command sweep.
    pub fn ungroup_selection(&mut self) -> Result<(), MapError> {
        let map = self.map();
        if !map.selection.only_groups(&map.graph) {
            return Err(MapError::Structural("only groups can be ungrouped".to_owned()));
        }
        let groups = map.selection.nodes.clone();
        self.in_transaction("Ungroup Objects", |document| {
            let mut freed = Vec::new();
            for &group in &groups {
                let parent = document.map().graph[group].parent();
                let children: Vec<Handle<Node>> =
                    document.map().graph.children(group).to_vec();
                for child in children {
                    document.execute(Command::new(ReparentNodeCommand::new(child, parent)))?;
                    freed.push(child);
                }
            }
            document.change_selection(Selection::of_nodes(freed))
        })
    }

    /// Creates a linked duplicate of a group: a new family member sharing the
    /// group's link id, with all descendant ids preserved per position.
    pub fn create_linked_duplicate(
        &mut self,
        group: Handle<Node>,
    ) -> Result<Handle<Node>, MapError> {
        if !self.map().graph[group].is_group() {
            return Err(MapError::Structural(
                "only groups can be linked-duplicated".to_owned(),
            ));
        }
        let parent = self.map().graph[group].parent();
        let mut duplicate = Handle::NONE;
        self.in_transaction("Create Linked Duplicate", |document| {
            let clone = document.clone_subtree_for_duplicate(group)?;
            duplicate = document.execute_returning(
                AddSubtreeCommand::new(clone, parent, "Create Linked Duplicate"),
                |c| c.handle(),
            )?;
            document.change_selection(Selection::of_nodes(vec![duplicate]))
        })?;
        Ok(duplicate)
    }

    fn clone_subtree_for_duplicate(
        &mut self,
        group: Handle<Node>,
    ) -> Result<Handle<Node>, MapError> {
        self.with_map_graph(|graph| {
            linked::clone_subtree(graph, group, &Matrix4::identity())
        })
    }

    /// Detaches the selected groups from their link families.
    pub fn separate_linked_groups(&mut self, groups: &[Handle<Node>]) -> Result<(), MapError> {
        self.execute(Command::new(ResetLinkIdsCommand::new(groups.to_vec())))
    }

    // --- CSG ---------------------------------------------------------------

    /// Subtracts the selected brushes from every other brush they intersect.
    /// The subtrahends are consumed, the minuends are replaced by their
    /// remainders, and the remainders become the selection.
    pub fn csg_subtract(&mut self) -> Result<(), MapError> {
        let map = self.map();
        let subtrahends = map.selection.brushes(&map.graph);
        if subtrahends.is_empty() {
            return Err(MapError::Structural(
                "CSG subtract requires selected brushes".to_owned(),
            ));
        }

        // Plan the fragments before mutating anything.
        let mut replacements: Vec<(Handle<Node>, Handle<Node>, Vec<redoubt_model::brush::Brush>)> =
            Vec::new();
        for handle in map.graph.collect_descendants(map.graph.root()) {
            if !map.graph[handle].is_brush() || subtrahends.contains(&handle) {
                continue;
            }
            let minuend = map.graph[handle].as_brush();
            if !subtrahends
                .iter()
                .any(|&s| map.graph[s].as_brush().intersects_brush(minuend))
            {
                continue;
            }
            let mut fragments = vec![minuend.clone()];
            for &subtrahend in &subtrahends {
                let cutter = map.graph[subtrahend].as_brush();
                fragments = fragments
                    .into_iter()
                    .flat_map(|fragment| fragment.subtract(cutter))
                    .collect();
            }
            replacements.push((handle, map.graph[handle].parent(), fragments));
        }

        self.in_transaction("CSG Subtract", |document| {
            document.change_selection(Selection::default())?;
            let to_delete: Vec<Handle<Node>> = subtrahends
                .iter()
                .chain(replacements.iter().map(|(minuend, _, _)| minuend))
                .copied()
                .collect();
            for handle in to_delete {
                document.execute(Command::new(DeleteSubtreeCommand::new(handle)))?;
            }
            let mut created = Vec::new();
            for (_, parent, fragments) in replacements {
                for fragment in fragments {
                    let node = Node::new(NodeKind::Brush(fragment));
                    let handle = document
                        .execute_returning(AddNodeCommand::new(node, parent), |c| c.handle())?;
                    created.push(handle);
                }
            }
            document.change_selection(Selection::of_nodes(created))
        })
    }
}
