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

//! The map writer: a [`Map`] back to `.map` text. Groups and layers are
//! persisted as `func_group` bookkeeping entities carrying `_tb_*` properties;
//! a face with an empty material name is written as `__TB_empty`.

use crate::{
    brush::{face::EMPTY_MATERIAL_SENTINEL, Brush, BrushFace},
    error::MapError,
    format::MapFormat,
    map::Map,
    node::{entity::format_coord, entity::Entity, Node, NodeKind, Visibility},
    patch::Patch,
};
use fxhash::FxHashMap;
use redoubt_core::pool::Handle;
use std::io::Write;

pub fn write_map_header(
    out: &mut impl Write,
    game_name: &str,
    format: MapFormat,
) -> Result<(), MapError> {
    writeln!(out, "// Game: {game_name}")?;
    writeln!(out, "// Format: {format}")?;
    Ok(())
}

/// Serializes the whole map. The inverse of the reader up to property order
/// within entities and face order within brushes, both of which are preserved.
pub fn write_map(map: &Map, out: &mut impl Write) -> Result<(), MapError> {
    let mut writer = MapWriter::new(map);
    writer.write(out)
}

struct MapWriter<'a> {
    map: &'a Map,
    format: MapFormat,
    /// Persistent ids, existing ones first, fresh ones for unsaved nodes.
    ids: FxHashMap<Handle<Node>, u64>,
    /// Members per link id; singleton families do not persist their id.
    family_sizes: FxHashMap<String, usize>,
    entity_count: usize,
    brush_count: usize,
}

impl<'a> MapWriter<'a> {
    fn new(map: &'a Map) -> Self {
        let graph = &map.graph;
        let mut ids = FxHashMap::default();
        let mut next_id = 1u64;
        for (handle, node) in graph.pair_iter() {
            if let Some(id) = node.persistent_id() {
                ids.insert(handle, id);
                next_id = next_id.max(id + 1);
            }
        }
        for handle in graph.traverse(graph.root()) {
            let node = &graph[handle];
            let needs_id = (node.is_layer() && !node.as_layer().is_default_layer())
                || node.is_group();
            if needs_id && !ids.contains_key(&handle) {
                ids.insert(handle, next_id);
                next_id += 1;
            }
        }

        let mut family_sizes: FxHashMap<String, usize> = FxHashMap::default();
        for (_, node) in graph.pair_iter() {
            if node.is_group() && !node.link_id().is_empty() {
                *family_sizes.entry(node.link_id().to_owned()).or_default() += 1;
            }
        }

        Self {
            map,
            format: map.world().format(),
            ids,
            family_sizes,
            entity_count: 0,
            brush_count: 0,
        }
    }

    fn write(&mut self, out: &mut impl Write) -> Result<(), MapError> {
        write_map_header(out, &self.map.game.name, self.format)?;

        let graph = &self.map.graph;
        let root = graph.root();
        let default_layer = graph.default_layer();

        // Worldspawn: the world's properties plus the default layer's direct
        // brushes and patches.
        writeln!(out, "// entity {}", self.entity_count)?;
        self.entity_count += 1;
        writeln!(out, "{{")?;
        self.write_properties(out, &self.map.world().entity)?;
        self.brush_count = 0;
        let default_children: Vec<_> = graph.children(default_layer).to_vec();
        for &child in &default_children {
            if graph[child].is_brush() || graph[child].is_patch() {
                self.write_primitive(out, child)?;
            }
        }
        writeln!(out, "}}")?;

        // Default layer containers and entities, then the custom layers in
        // child order.
        for &child in &default_children {
            self.write_node_blocks(out, child, None)?;
        }
        for &layer in graph.children(root) {
            if layer != default_layer {
                self.write_layer(out, layer)?;
            }
        }
        Ok(())
    }

    fn write_layer(&mut self, out: &mut impl Write, layer: Handle<Node>) -> Result<(), MapError> {
        let graph = &self.map.graph;
        let node = &graph[layer];
        let data = node.as_layer();

        writeln!(out, "// entity {}", self.entity_count)?;
        self.entity_count += 1;
        writeln!(out, "{{")?;
        write_property(out, "classname", "func_group")?;
        write_property(out, "_tb_type", "_tb_layer")?;
        write_property(out, "_tb_name", data.name())?;
        write_property(out, "_tb_id", &self.ids[&layer].to_string())?;
        write_property(out, "_tb_layer_sort_index", &data.sort_index().to_string())?;
        if let Some(color) = data.color() {
            write_property(out, "_tb_layer_color", &color.to_string())?;
        }
        if node.lock_state() == crate::node::LockState::Locked {
            write_property(out, "_tb_layer_locked", "1")?;
        }
        if node.visibility() == Visibility::Hidden {
            write_property(out, "_tb_layer_hidden", "1")?;
        }
        if data.omit_from_export() {
            write_property(out, "_tb_layer_omit_from_export", "1")?;
        }
        self.brush_count = 0;
        let children: Vec<_> = graph.children(layer).to_vec();
        for &child in &children {
            if graph[child].is_brush() || graph[child].is_patch() {
                self.write_primitive(out, child)?;
            }
        }
        writeln!(out, "}}")?;

        for &child in &children {
            self.write_node_blocks(out, child, Some(layer))?;
        }
        Ok(())
    }

    /// Emits the blocks of a group or entity child (primitives are handled by
    /// their container's own block).
    fn write_node_blocks(
        &mut self,
        out: &mut impl Write,
        handle: Handle<Node>,
        containing_layer: Option<Handle<Node>>,
    ) -> Result<(), MapError> {
        match self.map.graph[handle].kind() {
            NodeKind::Group(_) => self.write_group(out, handle, containing_layer),
            NodeKind::Entity(_) => self.write_entity(out, handle, containing_layer),
            _ => Ok(()),
        }
    }

    fn write_placement(
        &self,
        out: &mut impl Write,
        handle: Handle<Node>,
        containing_layer: Option<Handle<Node>>,
    ) -> Result<(), MapError> {
        let parent = self.map.graph[handle].parent();
        if self.map.graph[parent].is_group() {
            write_property(out, "_tb_group", &self.ids[&parent].to_string())?;
        } else if let Some(layer) = containing_layer {
            write_property(out, "_tb_layer", &self.ids[&layer].to_string())?;
        }
        Ok(())
    }

    fn write_group(
        &mut self,
        out: &mut impl Write,
        handle: Handle<Node>,
        containing_layer: Option<Handle<Node>>,
    ) -> Result<(), MapError> {
        let graph = &self.map.graph;
        let node = &graph[handle];
        let data = node.as_group();

        writeln!(out, "// entity {}", self.entity_count)?;
        self.entity_count += 1;
        writeln!(out, "{{")?;
        write_property(out, "classname", "func_group")?;
        write_property(out, "_tb_type", "_tb_group")?;
        write_property(out, "_tb_name", data.name())?;
        write_property(out, "_tb_id", &self.ids[&handle].to_string())?;
        self.write_placement(out, handle, containing_layer)?;

        let linked = self
            .family_sizes
            .get(node.link_id())
            .is_some_and(|&count| count > 1);
        if linked || data.transformation().is_some() {
            write_property(out, "_tb_linked_group_id", node.link_id())?;
            let m = data.effective_transformation();
            let cells: Vec<String> = m
                .row_iter()
                .flat_map(|row| row.iter().map(|v| format_coord(*v)).collect::<Vec<_>>())
                .collect();
            write_property(out, "_tb_transformation", &cells.join(" "))?;
        }

        self.brush_count = 0;
        let children: Vec<_> = graph.children(handle).to_vec();
        for &child in &children {
            if graph[child].is_brush() || graph[child].is_patch() {
                self.write_primitive(out, child)?;
            }
        }
        writeln!(out, "}}")?;

        for &child in &children {
            self.write_node_blocks(out, child, containing_layer)?;
        }
        Ok(())
    }

    fn write_entity(
        &mut self,
        out: &mut impl Write,
        handle: Handle<Node>,
        containing_layer: Option<Handle<Node>>,
    ) -> Result<(), MapError> {
        let graph = &self.map.graph;
        let data = graph[handle].as_entity();

        writeln!(out, "// entity {}", self.entity_count)?;
        self.entity_count += 1;
        writeln!(out, "{{")?;
        self.write_properties(out, data)?;
        self.write_placement(out, handle, containing_layer)?;
        if !data.protected_properties().is_empty() {
            let escaped: Vec<String> = data
                .protected_properties()
                .iter()
                .map(|key| key.replace(';', "\\;"))
                .collect();
            write_property(out, "_tb_protected_properties", &escaped.join(";"))?;
        }
        self.brush_count = 0;
        for &child in graph.children(handle) {
            self.write_primitive(out, child)?;
        }
        writeln!(out, "}}")?;
        Ok(())
    }

    fn write_properties(&self, out: &mut impl Write, entity: &Entity) -> Result<(), MapError> {
        for property in entity.properties() {
            write_property(out, &property.key, &property.value)?;
        }
        Ok(())
    }

    fn write_primitive(&mut self, out: &mut impl Write, handle: Handle<Node>) -> Result<(), MapError> {
        writeln!(out, "// brush {}", self.brush_count)?;
        self.brush_count += 1;
        match self.map.graph[handle].kind() {
            NodeKind::Brush(brush) => self.write_brush(out, brush),
            NodeKind::Patch(patch) => write_patch(out, patch),
            _ => Ok(()),
        }
    }

    fn write_brush(&self, out: &mut impl Write, brush: &Brush) -> Result<(), MapError> {
        let primitive_form = brush
            .faces()
            .iter()
            .any(|f| f.attributes.primitive_matrix.is_some());
        writeln!(out, "{{")?;
        if primitive_form {
            writeln!(out, "brushDef")?;
            writeln!(out, "{{")?;
        }
        for face in brush.faces() {
            self.write_face(out, face, primitive_form)?;
        }
        if primitive_form {
            writeln!(out, "}}")?;
        }
        writeln!(out, "}}")?;
        Ok(())
    }

    fn write_face(
        &self,
        out: &mut impl Write,
        face: &BrushFace,
        primitive_form: bool,
    ) -> Result<(), MapError> {
        for point in face.points() {
            write!(
                out,
                "( {} {} {} ) ",
                format_coord(point.x),
                format_coord(point.y),
                format_coord(point.z)
            )?;
        }

        let attributes = &face.attributes;
        if primitive_form {
            let m = attributes
                .primitive_matrix
                .unwrap_or([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
            write!(
                out,
                "( ( {} {} {} ) ( {} {} {} ) ) {}",
                format_coord(m[0][0]),
                format_coord(m[0][1]),
                format_coord(m[0][2]),
                format_coord(m[1][0]),
                format_coord(m[1][1]),
                format_coord(m[1][2]),
                material_name(&attributes.material_name),
            )?;
            if let (Some(contents), Some(flags)) =
                (attributes.surface_contents, attributes.surface_flags)
            {
                write!(
                    out,
                    " {} {} {}",
                    contents,
                    flags,
                    format_coord(attributes.surface_value.unwrap_or(0.0))
                )?;
            }
            writeln!(out)?;
            return Ok(());
        }

        write!(out, "{} ", material_name(&attributes.material_name))?;
        if let Some(axes) = attributes.uv_axes {
            write!(
                out,
                "[ {} {} {} {} ] [ {} {} {} {} ] ",
                format_coord(axes[0].axis.x),
                format_coord(axes[0].axis.y),
                format_coord(axes[0].axis.z),
                format_coord(axes[0].offset),
                format_coord(axes[1].axis.x),
                format_coord(axes[1].axis.y),
                format_coord(axes[1].axis.z),
                format_coord(axes[1].offset),
            )?;
        } else {
            write!(
                out,
                "{} {} ",
                format_coord(attributes.x_offset),
                format_coord(attributes.y_offset)
            )?;
        }
        write!(
            out,
            "{} {} {}",
            format_coord(attributes.rotation),
            format_coord(attributes.x_scale),
            format_coord(attributes.y_scale)
        )?;

        let has_surface = self.format.has_surface_attributes()
            && (attributes.surface_contents.is_some()
                || attributes.surface_flags.is_some()
                || attributes.surface_value.is_some());
        if has_surface {
            write!(
                out,
                " {} {} {}",
                attributes.surface_contents.unwrap_or(0),
                attributes.surface_flags.unwrap_or(0),
                format_coord(attributes.surface_value.unwrap_or(0.0))
            )?;
        }
        if self.format == MapFormat::Daikatana {
            if let Some([r, g, b]) = attributes.color {
                write!(out, " {r} {g} {b}")?;
            }
        }
        writeln!(out)?;
        Ok(())
    }
}

fn write_patch(out: &mut impl Write, patch: &Patch) -> Result<(), MapError> {
    writeln!(out, "{{")?;
    writeln!(out, "patchDef2")?;
    writeln!(out, "{{")?;
    writeln!(out, "{}", material_name(patch.material_name()))?;
    writeln!(out, "( {} {} 0 0 0 )", patch.rows(), patch.columns())?;
    writeln!(out, "(")?;
    for row in 0..patch.rows() {
        write!(out, "( ")?;
        for column in 0..patch.columns() {
            let point = patch.control_point(row, column);
            write!(
                out,
                "( {} {} {} {} {} ) ",
                format_coord(point.position.x),
                format_coord(point.position.y),
                format_coord(point.position.z),
                format_coord(point.uv.x),
                format_coord(point.uv.y),
            )?;
        }
        writeln!(out, ")")?;
    }
    writeln!(out, ")")?;
    writeln!(out, "}}")?;
    writeln!(out, "}}")?;
    Ok(())
}

fn write_property(out: &mut impl Write, key: &str, value: &str) -> Result<(), MapError> {
    writeln!(out, "\"{key}\" \"{value}\"")?;
    Ok(())
}

/// Empty names use the sentinel; names with whitespace or quotes are quoted
/// with escapes.
fn material_name(name: &str) -> String {
    if name.is_empty() {
        EMPTY_MATERIAL_SENTINEL.to_owned()
    } else if name.contains(char::is_whitespace) || name.contains('"') {
        format!("\"{}\"", name.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        name.to_owned()
    }
}
