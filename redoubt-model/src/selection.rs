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

//! Selection state: the ordered unique sets of selected nodes and brush faces,
//! and the focus stack (current layer plus the chain of opened groups that the
//! user descended into for granular editing).

use crate::{graph::MapGraph, node::Node};
use redoubt_core::pool::Handle;

/// A reference to one face of a brush node.
pub type BrushFaceHandle = (Handle<Node>, usize);

/// The selection value carried by the map. Node and face selection are
/// mutually exclusive in practice; both lists keep selection order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    pub nodes: Vec<Handle<Node>>,
    pub brush_faces: Vec<BrushFaceHandle>,
}

impl Selection {
    pub fn of_nodes(nodes: Vec<Handle<Node>>) -> Self {
        Self {
            nodes,
            brush_faces: Vec::new(),
        }
    }

    pub fn of_faces(brush_faces: Vec<BrushFaceHandle>) -> Self {
        Self {
            nodes: Vec::new(),
            brush_faces,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.brush_faces.is_empty()
    }

    pub fn has_nodes(&self) -> bool {
        !self.nodes.is_empty()
    }

    pub fn has_brush_faces(&self) -> bool {
        !self.brush_faces.is_empty()
    }

    /// True if the selection consists of nodes and every one of them is a
    /// group.
    pub fn only_groups(&self, graph: &MapGraph) -> bool {
        self.has_nodes() && self.nodes.iter().all(|&n| graph[n].is_group())
    }

    pub fn only_brushes(&self, graph: &MapGraph) -> bool {
        self.has_nodes() && self.nodes.iter().all(|&n| graph[n].is_brush())
    }

    /// Selected brush nodes, in selection order.
    pub fn brushes(&self, graph: &MapGraph) -> Vec<Handle<Node>> {
        self.nodes
            .iter()
            .copied()
            .filter(|&n| graph[n].is_brush())
            .collect()
    }

    /// The material of the most recently selected face, the material new
    /// brushes pick up. Face selection wins over node selection.
    pub fn current_material<'a>(&self, graph: &'a MapGraph) -> Option<&'a str> {
        if let Some(&(brush, face_index)) = self.brush_faces.last() {
            return Some(
                graph[brush].as_brush().faces()[face_index]
                    .attributes
                    .material_name
                    .as_str(),
            );
        }
        self.nodes
            .iter()
            .rev()
            .find(|&&n| graph[n].is_brush())
            .and_then(|&n| graph[n].as_brush().faces().first())
            .map(|face| face.attributes.material_name.as_str())
    }
}

/// The editing focus: exactly one current layer, and the chain of groups the
/// user has opened. New nodes land in the innermost open group, or the current
/// layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Focus {
    pub current_layer: Handle<Node>,
    pub open_groups: Vec<Handle<Node>>,
}

impl Focus {
    pub fn new(current_layer: Handle<Node>) -> Self {
        Self {
            current_layer,
            open_groups: Vec::new(),
        }
    }

    /// The innermost open group, if any.
    pub fn open_group(&self) -> Handle<Node> {
        self.open_groups.last().copied().unwrap_or_default()
    }

    pub fn is_open(&self, group: Handle<Node>) -> bool {
        self.open_groups.contains(&group)
    }

    /// Where newly created nodes go.
    pub fn insertion_parent(&self) -> Handle<Node> {
        if let Some(&group) = self.open_groups.last() {
            group
        } else {
            self.current_layer
        }
    }
}

/// The container granular operations work within: the innermost open group,
/// or the whole world.
pub fn current_container(graph: &MapGraph, focus: &Focus) -> Handle<Node> {
    let open = focus.open_group();
    if graph.is_valid_handle(open) {
        open
    } else {
        graph.root()
    }
}

/// Whether a node can be put into the selection: it must be a group, entity,
/// brush or patch, effectively shown and unlocked, and not buried inside a
/// closed group (the closed group is what gets selected instead). An open
/// group itself is not selectable while it is open.
pub fn selectable(graph: &MapGraph, focus: &Focus, handle: Handle<Node>) -> bool {
    let node = &graph[handle];
    if node.is_world() || node.is_layer() {
        return false;
    }
    if !graph.is_editable(handle) {
        return false;
    }
    if node.is_group() && focus.is_open(handle) {
        return false;
    }
    // Every group ancestor must be opened for this node to be reachable.
    let mut current = node.parent();
    while let Some(ancestor) = graph.try_node(current) {
        if ancestor.is_group() && !focus.is_open(current) {
            return false;
        }
        current = ancestor.parent();
    }
    true
}

/// Selectable nodes below the given roots, in pre-order.
pub fn collect_selectable(
    graph: &MapGraph,
    focus: &Focus,
    roots: &[Handle<Node>],
) -> Vec<Handle<Node>> {
    graph.collect_nodes(roots, &|_| true)
        .into_iter()
        .filter(|&handle| selectable(graph, focus, handle))
        .collect()
}

/// True if the node itself or any ancestor is selected.
pub fn transitively_selected(graph: &MapGraph, handle: Handle<Node>) -> bool {
    let mut current = handle;
    while let Some(node) = graph.try_node(current) {
        if node.is_selected() {
            return true;
        }
        current = node.parent();
    }
    false
}

/// True if any descendant of the node is selected.
pub fn descendant_selected(graph: &MapGraph, handle: Handle<Node>) -> bool {
    graph
        .collect_descendants(handle)
        .iter()
        .any(|&d| graph[d].is_selected())
}

/// The candidates of `invertSelection`: selectable nodes within the current
/// container that are neither selected themselves, under a selected ancestor,
/// nor above a selected descendant.
pub fn invert_candidates(graph: &MapGraph, focus: &Focus) -> Vec<Handle<Node>> {
    let container = current_container(graph, focus);
    graph
        .collect_descendants(container)
        .into_iter()
        .filter(|&handle| {
            selectable(graph, focus, handle)
                && !transitively_selected(graph, handle)
                && !descendant_selected(graph, handle)
        })
        .collect()
}

/// Nodes matching `selectByLinePositions`: a closed group containing a line is
/// selected whole; an open group is descended into; an entity whose span
/// matches but whose children do not selects all its children.
pub fn nodes_with_file_positions(
    graph: &MapGraph,
    focus: &Focus,
    positions: &[usize],
) -> Vec<Handle<Node>> {
    let has_position = |handle: Handle<Node>| {
        graph[handle]
            .file_position()
            .is_some_and(|span| positions.iter().any(|&line| span.contains(line)))
    };

    let mut result = Vec::new();
    collect_with_file_positions(graph, focus, graph.root(), &has_position, &mut result);
    result
}

fn collect_with_file_positions(
    graph: &MapGraph,
    focus: &Focus,
    handle: Handle<Node>,
    has_position: &impl Fn(Handle<Node>) -> bool,
    out: &mut Vec<Handle<Node>>,
) {
    let node = &graph[handle];
    if node.is_world() || node.is_layer() {
        for &child in node.children() {
            collect_with_file_positions(graph, focus, child, has_position, out);
        }
    } else if node.is_group() {
        if has_position(handle) {
            if selectable(graph, focus, handle) {
                out.push(handle);
            } else {
                for &child in node.children() {
                    collect_with_file_positions(graph, focus, child, has_position, out);
                }
            }
        }
    } else if node.is_entity() {
        if has_position(handle) {
            if selectable(graph, focus, handle) {
                out.push(handle);
            } else {
                let before = out.len();
                for &child in node.children() {
                    collect_with_file_positions(graph, focus, child, has_position, out);
                }
                if out.len() == before {
                    // No child span matched: the whole content is meant.
                    out.extend(
                        node.children()
                            .iter()
                            .copied()
                            .filter(|&c| selectable(graph, focus, c)),
                    );
                }
            }
        }
    } else if has_position(handle) && selectable(graph, focus, handle) {
        out.push(handle);
    }
}

/// Brushes and patches touching (or contained in) any of the query brushes.
pub fn collect_touching(
    graph: &MapGraph,
    focus: &Focus,
    query_brushes: &[Handle<Node>],
    require_containment: bool,
) -> Vec<Handle<Node>> {
    let mut result = Vec::new();
    for handle in graph.collect_descendants(graph.root()) {
        if query_brushes.contains(&handle) {
            continue;
        }
        if !selectable(graph, focus, handle) {
            continue;
        }
        let node = &graph[handle];
        let hit = if node.is_brush() {
            let brush = node.as_brush();
            query_brushes.iter().any(|&q| {
                let query = graph[q].as_brush();
                if require_containment {
                    query.contains_brush(brush)
                } else {
                    query.intersects_brush(brush)
                }
            })
        } else if node.is_entity() && node.as_entity().is_point_entity() || node.is_patch() {
            let bounds = graph.logical_bounds(handle);
            query_brushes.iter().any(|&q| {
                let query_bounds = graph.logical_bounds(q);
                if require_containment {
                    query_bounds.contains_bounds(&bounds)
                } else {
                    query_bounds.intersects(&bounds)
                }
            })
        } else {
            false
        };
        if hit {
            result.push(handle);
        }
    }
    result
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        brush::Brush,
        node::{entity::Entity, group::Group, world::World, Node, NodeKind, Visibility},
    };
    use redoubt_core::algebra::Vector3;

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
    fn selectable_respects_closed_groups() {
        let mut graph = MapGraph::new(World::default());
        let layer = graph.default_layer();
        let group = graph
            .add_node(Node::new(NodeKind::Group(Group::new("g"))), layer)
            .unwrap();
        let brush = graph.add_node(brush_node(0.0, 32.0), group).unwrap();
        let focus = Focus::new(layer);

        // The closed group is selectable, its content is not.
        assert!(selectable(&graph, &focus, group));
        assert!(!selectable(&graph, &focus, brush));

        // Opening the group flips both.
        let mut open = focus.clone();
        open.open_groups.push(group);
        assert!(!selectable(&graph, &open, group));
        assert!(selectable(&graph, &open, brush));
    }

    #[test]
    fn selectable_excludes_hidden_and_locked() {
        let mut graph = MapGraph::new(World::default());
        let layer = graph.default_layer();
        let brush = graph.add_node(brush_node(0.0, 32.0), layer).unwrap();
        let focus = Focus::new(layer);
        assert!(selectable(&graph, &focus, brush));

        graph[layer].set_visibility(Visibility::Hidden);
        assert!(!selectable(&graph, &focus, brush));
        graph[layer].set_visibility(Visibility::Inherited);

        graph[brush].set_lock_state(crate::node::LockState::Locked);
        assert!(!selectable(&graph, &focus, brush));
    }

    #[test]
    fn current_material_prefers_faces() {
        let mut graph = MapGraph::new(World::default());
        let layer = graph.default_layer();
        let a = graph.add_node(brush_node(0.0, 16.0), layer).unwrap();
        let selection = Selection {
            nodes: vec![a],
            brush_faces: vec![(a, 2)],
        };
        assert_eq!(selection.current_material(&graph), Some("m"));
        assert!(selection.has_brush_faces());
        assert!(selection.only_brushes(&graph));
        assert!(!selection.only_groups(&graph));
    }

    #[test]
    fn touching_and_containment_queries() {
        let mut graph = MapGraph::new(World::default());
        let layer = graph.default_layer();
        let query = graph.add_node(brush_node(0.0, 64.0), layer).unwrap();
        let inside = graph.add_node(brush_node(8.0, 24.0), layer).unwrap();
        let overlapping = graph
            .add_node(
                Node::new(NodeKind::Brush(
                    Brush::cuboid(
                        Vector3::new(32.0, 32.0, 32.0),
                        Vector3::new(96.0, 96.0, 96.0),
                        "m",
                    )
                    .unwrap(),
                )),
                layer,
            )
            .unwrap();
        let outside = graph
            .add_node(
                Node::new(NodeKind::Brush(
                    Brush::cuboid(
                        Vector3::new(200.0, 200.0, 200.0),
                        Vector3::new(232.0, 232.0, 232.0),
                        "m",
                    )
                    .unwrap(),
                )),
                layer,
            )
            .unwrap();
        let focus = Focus::new(layer);

        let touching = collect_touching(&graph, &focus, &[query], false);
        assert!(touching.contains(&inside));
        assert!(touching.contains(&overlapping));
        assert!(!touching.contains(&outside));
        assert!(!touching.contains(&query));

        let contained = collect_touching(&graph, &focus, &[query], true);
        assert!(contained.contains(&inside));
        assert!(!contained.contains(&overlapping));
    }

    #[test]
    fn invert_skips_partially_selected_containers() {
        let mut graph = MapGraph::new(World::default());
        let layer = graph.default_layer();
        let mut door = Entity::with_classname("func_door");
        door.set_brush_entity(true);
        let entity = graph
            .add_node(Node::new(NodeKind::Entity(door)), layer)
            .unwrap();
        let selected_child = graph.add_node(brush_node(0.0, 16.0), entity).unwrap();
        let other_child = graph.add_node(brush_node(16.0, 32.0), entity).unwrap();
        let lone = graph.add_node(brush_node(64.0, 96.0), layer).unwrap();

        graph[selected_child].selected = true;
        let focus = Focus::new(layer);
        let candidates = invert_candidates(&graph, &focus);
        // The entity has a selected descendant, so it must not be selected
        // whole; its unselected child and the lone brush qualify.
        assert!(!candidates.contains(&entity));
        assert!(!candidates.contains(&selected_child));
        assert!(candidates.contains(&other_child));
        assert!(candidates.contains(&lone));
    }
}
