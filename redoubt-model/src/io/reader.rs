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

//! The map reader: byte stream to populated [`Map`]. Entity blocks are
//! independent, so they are parsed in parallel and joined in source order;
//! malformed brushes are skipped with a logged warning and the reader still
//! returns a valid world.

use crate::{
    brush::{face::EMPTY_MATERIAL_SENTINEL, Brush, BrushFace, FaceAttributes, UvAxis},
    error::{MapError, SourceLocation},
    format::{GameConfig, MapFormat},
    io::tokenizer::{Token, Tokenizer},
    linked::initialize_link_ids,
    map::Map,
    node::{
        entity::Entity,
        group::Group,
        layer::{Color, Layer},
        world::World,
        FilePosition, LockState, Node, NodeKind, Visibility,
    },
    patch::{Patch, PatchControlPoint},
};
use fxhash::FxHashMap;
use rayon::prelude::*;
use redoubt_core::{
    algebra::{Matrix4, Vector2, Vector3},
    log::Log,
    pool::Handle,
};

/// Accumulated non-fatal findings of a read. The reader never aborts on a
/// malformed primitive; it records the problem here and moves on.
#[derive(Debug, Default)]
pub struct ParserStatus {
    pub warnings: Vec<(Option<SourceLocation>, String)>,
}

impl ParserStatus {
    pub fn warn(&mut self, location: Option<SourceLocation>, message: impl Into<String>) {
        let message = message.into();
        match location {
            Some(location) => Log::warn(format!("{location}: {message}")),
            None => Log::warn(&message),
        }
        self.warnings.push((location, message));
    }
}

/// Reads the optional `// Game: <name>` / `// Format: <format>` comment pair.
/// A missing header yields `(None, MapFormat::Unknown)`.
pub fn read_map_header(text: &str) -> (Option<String>, MapFormat) {
    let mut lines = text.lines();
    let game = lines
        .next()
        .and_then(|line| line.strip_prefix("// Game: "))
        .map(|name| name.trim_end_matches('\r').to_owned());
    if game.is_none() {
        return (None, MapFormat::Unknown);
    }
    let format = lines
        .next()
        .and_then(|line| line.strip_prefix("// Format: "))
        .map(|name| MapFormat::from_name(name.trim_end_matches('\r')))
        .unwrap_or(MapFormat::Unknown);
    (game, format)
}

// --- Intermediate representation -----------------------------------------

#[derive(Debug)]
enum ParsedPrimitive {
    Brush {
        faces: Vec<BrushFace>,
        primitive_form: bool,
        position: FilePosition,
    },
    Patch {
        patch: Patch,
        position: FilePosition,
    },
}

#[derive(Debug)]
struct ParsedEntity {
    properties: Vec<(String, String)>,
    primitives: Vec<ParsedPrimitive>,
    position: FilePosition,
    warnings: Vec<(Option<SourceLocation>, String)>,
}

impl ParsedEntity {
    fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn classname(&self) -> Option<&str> {
        self.property("classname")
    }
}

// --- Entry point ----------------------------------------------------------

/// Parses map text into a [`Map`]. The format priority is: the explicit
/// `format` argument, the `// Format:` header, disambiguation from the first
/// brush face, and finally the game configuration's first listed format.
pub fn read_map(
    text: &str,
    format: MapFormat,
    game: &GameConfig,
) -> Result<(Map, ParserStatus), MapError> {
    let mut status = ParserStatus::default();

    let (_, header_format) = read_map_header(text);
    let mut format = if format != MapFormat::Unknown {
        format
    } else {
        header_format
    };
    if format == MapFormat::Unknown {
        format = detect_format(text)?.unwrap_or_else(|| game.default_format());
    }

    let blocks = split_entity_blocks(text)?;
    let parsed: Vec<Result<ParsedEntity, MapError>> = blocks
        .par_iter()
        .map(|block| parse_entity_block(block.text, block.first_line, format))
        .collect();

    let mut entities = Vec::new();
    for result in parsed {
        match result {
            Ok(mut entity) => {
                status.warnings.append(&mut entity.warnings);
                entities.push(entity);
            }
            Err(error) => return Err(error),
        }
    }

    assemble(entities, format, game, &mut status)
}

// --- Block splitting -------------------------------------------------------

struct EntityBlock<'a> {
    text: &'a str,
    first_line: usize,
}

/// Finds the top-level `{ ... }` spans. Uses the tokenizer so that braces in
/// quoted strings and comments do not confuse the bracket count.
fn split_entity_blocks(text: &str) -> Result<Vec<EntityBlock<'_>>, MapError> {
    let mut tokenizer = Tokenizer::new(text);
    let mut blocks = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut start_line = 0usize;

    while let Some((token, location)) = tokenizer.next_token() {
        match token {
            Token::OBrace => {
                if depth == 0 {
                    start = tokenizer.byte_offset() - 1;
                    start_line = location.line;
                }
                depth += 1;
            }
            Token::CBrace => {
                if depth == 0 {
                    return Err(MapError::parse_at("unmatched '}'", location));
                }
                depth -= 1;
                if depth == 0 {
                    blocks.push(EntityBlock {
                        text: &text[start..tokenizer.byte_offset()],
                        first_line: start_line,
                    });
                }
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(MapError::parse("unexpected end of file inside an entity"));
    }
    Ok(blocks)
}

// --- Format detection ------------------------------------------------------

/// Inspects the first brush face (and the worldspawn `mapversion` tag) to pick
/// a format. Returns `None` for an empty or faceless map. A `mapversion 220`
/// tag combined with standard-form faces is a hard error.
fn detect_format(text: &str) -> Result<Option<MapFormat>, MapError> {
    let mut tokenizer = Tokenizer::new(text);
    let mut depth = 0usize;
    let mut mapversion_220 = false;
    let mut previous_quoted: Option<String> = None;

    while let Some((token, location)) = tokenizer.next_token() {
        match token {
            Token::OBrace => {
                depth += 1;
                if depth == 2 {
                    // Inside a primitive; its first token decides.
                    match tokenizer.peek() {
                        Some((Token::Word(word), _)) if word == "brushDef" => {
                            return Ok(Some(MapFormat::Quake3));
                        }
                        Some((Token::Word(word), _)) if word == "patchDef2" => {
                            return Ok(Some(MapFormat::Quake3));
                        }
                        Some((Token::OParen, _)) => {
                            let detected = detect_face_format(&mut tokenizer)?;
                            if mapversion_220 && !detected.has_valve_uv() {
                                return Err(MapError::parse_at(
                                    "map declares \"mapversion\" \"220\" but faces are in standard form",
                                    location,
                                ));
                            }
                            return Ok(Some(detected));
                        }
                        _ => {}
                    }
                }
            }
            Token::CBrace => depth = depth.saturating_sub(1),
            Token::Quoted(value) => {
                if depth == 1 {
                    if let Some(key) = previous_quoted.take() {
                        if key == "mapversion" && value.trim() == "220" {
                            mapversion_220 = true;
                        }
                    } else {
                        previous_quoted = Some(value);
                    }
                } else {
                    previous_quoted = None;
                }
            }
            _ => previous_quoted = None,
        }
    }

    Ok(if mapversion_220 {
        Some(MapFormat::Valve220)
    } else {
        None
    })
}

/// Looks at the shape of one face after its three point groups.
fn detect_face_format(tokenizer: &mut Tokenizer<'_>) -> Result<MapFormat, MapError> {
    for _ in 0..3 {
        skip_point_group(tokenizer)?;
    }
    let _material = tokenizer
        .next_material()
        .ok_or_else(|| MapError::parse("unexpected end of file in face"))?;

    if matches!(tokenizer.peek(), Some((Token::OBracket, _))) {
        // Valve 220 axes; a trailing surface triple marks the Quake 2 variant.
        skip_bracket_group(tokenizer)?;
        skip_bracket_group(tokenizer)?;
        let trailing = count_trailing_numbers(tokenizer);
        return Ok(if trailing > 3 {
            MapFormat::Quake2Valve
        } else {
            MapFormat::Valve220
        });
    }

    let trailing = count_trailing_numbers(tokenizer);
    Ok(match trailing {
        0..=5 => MapFormat::Standard,
        6 => MapFormat::Hexen2,
        7 | 8 => MapFormat::Quake2,
        _ => MapFormat::Daikatana,
    })
}

fn skip_point_group(tokenizer: &mut Tokenizer<'_>) -> Result<(), MapError> {
    expect(tokenizer, &Token::OParen)?;
    while let Some((token, _)) = tokenizer.next_token() {
        if token == Token::CParen {
            return Ok(());
        }
    }
    Err(MapError::parse("unexpected end of file in point group"))
}

fn skip_bracket_group(tokenizer: &mut Tokenizer<'_>) -> Result<(), MapError> {
    expect(tokenizer, &Token::OBracket)?;
    while let Some((token, _)) = tokenizer.next_token() {
        if token == Token::CBracket {
            return Ok(());
        }
    }
    Err(MapError::parse("unexpected end of file in axis group"))
}

fn count_trailing_numbers(tokenizer: &mut Tokenizer<'_>) -> usize {
    let mut count = 0;
    while let Some((Token::Word(word), _)) = tokenizer.peek() {
        if word.parse::<f64>().is_err() {
            break;
        }
        tokenizer.next_token();
        count += 1;
    }
    count
}

fn expect(tokenizer: &mut Tokenizer<'_>, expected: &Token) -> Result<SourceLocation, MapError> {
    match tokenizer.next_token() {
        Some((token, location)) if token == *expected => Ok(location),
        Some((token, location)) => Err(MapError::parse_at(
            format!("expected {} but found {}", expected.describe(), token.describe()),
            location,
        )),
        None => Err(MapError::parse(format!(
            "expected {} but found end of file",
            expected.describe()
        ))),
    }
}

// --- Entity block parsing --------------------------------------------------

fn parse_entity_block(
    text: &str,
    first_line: usize,
    format: MapFormat,
) -> Result<ParsedEntity, MapError> {
    let mut tokenizer = Tokenizer::with_start_line(text, first_line);
    let mut entity = ParsedEntity {
        properties: Vec::new(),
        primitives: Vec::new(),
        position: FilePosition::new(first_line, 1),
        warnings: Vec::new(),
    };

    expect(&mut tokenizer, &Token::OBrace)?;
    loop {
        match tokenizer.next_token() {
            Some((Token::CBrace, location)) => {
                entity.position = FilePosition::new(first_line, location.line - first_line + 1);
                return Ok(entity);
            }
            Some((Token::Quoted(key), location)) => {
                let value = match tokenizer.next_token() {
                    Some((Token::Quoted(value), _)) => value,
                    Some((Token::Word(value), _)) => value,
                    other => {
                        return Err(MapError::parse_at(
                            format!(
                                "expected a property value but found {}",
                                other.map_or("end of file".to_owned(), |(t, _)| t.describe())
                            ),
                            location,
                        ));
                    }
                };
                // Later duplicates (including extra classnames) are dropped.
                if entity.properties.iter().any(|(k, _)| *k == key) {
                    entity.warnings.push((
                        Some(location),
                        format!("ignoring duplicate property \"{key}\""),
                    ));
                } else {
                    entity.properties.push((key, value));
                }
            }
            Some((Token::OBrace, location)) => {
                parse_primitive(&mut tokenizer, location, format, &mut entity)?;
            }
            Some((token, location)) => {
                return Err(MapError::parse_at(
                    format!("unexpected {} in entity", token.describe()),
                    location,
                ));
            }
            None => return Err(MapError::parse("unexpected end of file in entity")),
        }
    }
}

fn parse_primitive(
    tokenizer: &mut Tokenizer<'_>,
    open: SourceLocation,
    format: MapFormat,
    entity: &mut ParsedEntity,
) -> Result<(), MapError> {
    match tokenizer.peek() {
        Some((Token::Word(word), _)) if word == "patchDef2" => {
            tokenizer.next_token();
            let patch = parse_patch(tokenizer, open, entity)?;
            // The patchDef2 block is followed by the primitive's own '}'.
            let close = expect(tokenizer, &Token::CBrace)?;
            if let Some(patch) = patch {
                entity.primitives.push(ParsedPrimitive::Patch {
                    patch,
                    position: FilePosition::new(open.line, close.line - open.line + 1),
                });
            }
            Ok(())
        }
        Some((Token::Word(word), _)) if word == "brushDef" => {
            tokenizer.next_token();
            expect(tokenizer, &Token::OBrace)?;
            let mut faces = Vec::new();
            loop {
                match tokenizer.peek() {
                    Some((Token::CBrace, _)) => {
                        tokenizer.next_token();
                        break;
                    }
                    _ => parse_face(tokenizer, format, true, &mut faces, entity)?,
                }
            }
            let close = expect(tokenizer, &Token::CBrace)?;
            entity.primitives.push(ParsedPrimitive::Brush {
                faces,
                primitive_form: true,
                position: FilePosition::new(open.line, close.line - open.line + 1),
            });
            Ok(())
        }
        _ => {
            let mut faces = Vec::new();
            let close = loop {
                match tokenizer.peek() {
                    Some((Token::CBrace, _)) => {
                        let (_, location) = tokenizer.next_token().unwrap();
                        break location;
                    }
                    Some((Token::OParen, _)) => {
                        parse_face(tokenizer, format, false, &mut faces, entity)?;
                    }
                    Some((token, location)) => {
                        return Err(MapError::parse_at(
                            format!("unexpected {} in brush", token.describe()),
                            location,
                        ));
                    }
                    None => return Err(MapError::parse("unexpected end of file in brush")),
                }
            };
            entity.primitives.push(ParsedPrimitive::Brush {
                faces,
                primitive_form: false,
                position: FilePosition::new(open.line, close.line - open.line + 1),
            });
            Ok(())
        }
    }
}

fn parse_face(
    tokenizer: &mut Tokenizer<'_>,
    format: MapFormat,
    primitive_form: bool,
    faces: &mut Vec<BrushFace>,
    entity: &mut ParsedEntity,
) -> Result<(), MapError> {
    let location = tokenizer.location();
    let points = [
        parse_point(tokenizer)?,
        parse_point(tokenizer)?,
        parse_point(tokenizer)?,
    ];

    let mut attributes = FaceAttributes::default();

    if primitive_form {
        // ( ( xx xy xoff ) ( yx yy yoff ) ) material [contents flags value]
        expect(tokenizer, &Token::OParen)?;
        let row_x = parse_triple(tokenizer)?;
        let row_y = parse_triple(tokenizer)?;
        expect(tokenizer, &Token::CParen)?;
        attributes.primitive_matrix = Some([row_x, row_y]);
        attributes.material_name = read_material(tokenizer)?;
        let mut trailing = Vec::new();
        while let Some(number) = try_parse_number(tokenizer) {
            trailing.push(number);
        }
        if trailing.len() >= 3 {
            attributes.surface_contents = Some(trailing[0] as i32);
            attributes.surface_flags = Some(trailing[1] as i32);
            attributes.surface_value = Some(trailing[2]);
        }
    } else {
        attributes.material_name = read_material(tokenizer)?;
        if format.has_valve_uv() {
            attributes.uv_axes = Some([parse_uv_axis(tokenizer)?, parse_uv_axis(tokenizer)?]);
        } else {
            attributes.x_offset = parse_number(tokenizer)?;
            attributes.y_offset = parse_number(tokenizer)?;
        }
        attributes.rotation = parse_number(tokenizer)?;
        attributes.x_scale = parse_number(tokenizer)?;
        attributes.y_scale = parse_number(tokenizer)?;

        match format {
            MapFormat::Hexen2 => {
                // One meaningless trailing number.
                try_parse_number(tokenizer);
            }
            MapFormat::Quake2 | MapFormat::Quake2Valve | MapFormat::Quake3Valve => {
                if let Some(contents) = try_parse_number(tokenizer) {
                    attributes.surface_contents = Some(contents as i32);
                    attributes.surface_flags = try_parse_number(tokenizer).map(|n| n as i32);
                    attributes.surface_value = try_parse_number(tokenizer);
                }
            }
            MapFormat::Daikatana => {
                if let Some(contents) = try_parse_number(tokenizer) {
                    attributes.surface_contents = Some(contents as i32);
                    attributes.surface_flags = try_parse_number(tokenizer).map(|n| n as i32);
                    attributes.surface_value = try_parse_number(tokenizer);
                    if let Some(r) = try_parse_number(tokenizer) {
                        let g = try_parse_number(tokenizer).unwrap_or(0.0);
                        let b = try_parse_number(tokenizer).unwrap_or(0.0);
                        attributes.color = Some([r as i32, g as i32, b as i32]);
                    }
                }
            }
            MapFormat::Quake3 | MapFormat::Quake3Legacy => {
                // Legacy Quake 3 faces may carry a surface triple as well.
                if let Some(contents) = try_parse_number(tokenizer) {
                    attributes.surface_contents = Some(contents as i32);
                    attributes.surface_flags = try_parse_number(tokenizer).map(|n| n as i32);
                    attributes.surface_value = try_parse_number(tokenizer);
                }
            }
            _ => {}
        }
    }

    if attributes.material_name == EMPTY_MATERIAL_SENTINEL {
        attributes.material_name = String::new();
    }

    match BrushFace::new(points, attributes) {
        Some(face) => faces.push(face),
        None => entity.warnings.push((
            Some(location),
            "skipping face with collinear points".to_owned(),
        )),
    }
    Ok(())
}

fn read_material(tokenizer: &mut Tokenizer<'_>) -> Result<String, MapError> {
    tokenizer
        .next_material()
        .map(|(name, _)| name)
        .ok_or_else(|| MapError::parse("unexpected end of file reading a material name"))
}

fn parse_point(tokenizer: &mut Tokenizer<'_>) -> Result<Vector3<f64>, MapError> {
    let [x, y, z] = parse_triple(tokenizer)?;
    Ok(Vector3::new(x, y, z))
}

fn parse_triple(tokenizer: &mut Tokenizer<'_>) -> Result<[f64; 3], MapError> {
    expect(tokenizer, &Token::OParen)?;
    let x = parse_number(tokenizer)?;
    let y = parse_number(tokenizer)?;
    let z = parse_number(tokenizer)?;
    expect(tokenizer, &Token::CParen)?;
    Ok([x, y, z])
}

fn parse_uv_axis(tokenizer: &mut Tokenizer<'_>) -> Result<UvAxis, MapError> {
    expect(tokenizer, &Token::OBracket)?;
    let x = parse_number(tokenizer)?;
    let y = parse_number(tokenizer)?;
    let z = parse_number(tokenizer)?;
    let offset = parse_number(tokenizer)?;
    expect(tokenizer, &Token::CBracket)?;
    Ok(UvAxis::new(Vector3::new(x, y, z), offset))
}

fn parse_number(tokenizer: &mut Tokenizer<'_>) -> Result<f64, MapError> {
    match tokenizer.next_token() {
        Some((Token::Word(word), location)) => word.parse().map_err(|_| {
            MapError::parse_at(format!("expected a number but found '{word}'"), location)
        }),
        Some((token, location)) => Err(MapError::parse_at(
            format!("expected a number but found {}", token.describe()),
            location,
        )),
        None => Err(MapError::parse("expected a number but found end of file")),
    }
}

fn try_parse_number(tokenizer: &mut Tokenizer<'_>) -> Option<f64> {
    match tokenizer.peek() {
        Some((Token::Word(word), _)) if word.parse::<f64>().is_ok() => {
            let Some((Token::Word(word), _)) = tokenizer.next_token() else {
                unreachable!()
            };
            word.parse().ok()
        }
        _ => None,
    }
}

fn parse_patch(
    tokenizer: &mut Tokenizer<'_>,
    open: SourceLocation,
    entity: &mut ParsedEntity,
) -> Result<Option<Patch>, MapError> {
    expect(tokenizer, &Token::OBrace)?;
    let material = read_material(tokenizer)?;
    let material = if material == EMPTY_MATERIAL_SENTINEL {
        String::new()
    } else {
        material
    };

    expect(tokenizer, &Token::OParen)?;
    let rows = parse_number(tokenizer)? as usize;
    let columns = parse_number(tokenizer)? as usize;
    // contents, flags, value; ignored but part of the grid header.
    while try_parse_number(tokenizer).is_some() {}
    expect(tokenizer, &Token::CParen)?;

    expect(tokenizer, &Token::OParen)?;
    let mut control_points = Vec::new();
    loop {
        match tokenizer.peek() {
            Some((Token::CParen, _)) => {
                tokenizer.next_token();
                break;
            }
            Some((Token::OParen, _)) => {
                // One row: ( ( x y z u v ) ... )
                tokenizer.next_token();
                loop {
                    match tokenizer.peek() {
                        Some((Token::CParen, _)) => {
                            tokenizer.next_token();
                            break;
                        }
                        _ => {
                            expect(tokenizer, &Token::OParen)?;
                            let x = parse_number(tokenizer)?;
                            let y = parse_number(tokenizer)?;
                            let z = parse_number(tokenizer)?;
                            let u = parse_number(tokenizer)?;
                            let v = parse_number(tokenizer)?;
                            expect(tokenizer, &Token::CParen)?;
                            control_points.push(PatchControlPoint::new(
                                Vector3::new(x, y, z),
                                Vector2::new(u, v),
                            ));
                        }
                    }
                }
            }
            Some((token, location)) => {
                return Err(MapError::parse_at(
                    format!("unexpected {} in patch grid", token.describe()),
                    location,
                ));
            }
            None => return Err(MapError::parse("unexpected end of file in patch")),
        }
    }
    expect(tokenizer, &Token::CBrace)?;

    match Patch::new(rows, columns, control_points, material) {
        Ok(patch) => Ok(Some(patch)),
        Err(error) => {
            entity
                .warnings
                .push((Some(open), format!("skipping invalid patch: {error}")));
            Ok(None)
        }
    }
}

// --- Assembly --------------------------------------------------------------

const TB_TYPE: &str = "_tb_type";
const TB_TYPE_LAYER: &str = "_tb_layer";
const TB_TYPE_GROUP: &str = "_tb_group";
const TB_NAME: &str = "_tb_name";
const TB_ID: &str = "_tb_id";
const TB_LAYER: &str = "_tb_layer";
const TB_GROUP: &str = "_tb_group";
const TB_LAYER_SORT_INDEX: &str = "_tb_layer_sort_index";
const TB_LAYER_COLOR: &str = "_tb_layer_color";
const TB_LAYER_LOCKED: &str = "_tb_layer_locked";
const TB_LAYER_HIDDEN: &str = "_tb_layer_hidden";
const TB_LAYER_OMIT_FROM_EXPORT: &str = "_tb_layer_omit_from_export";
const TB_LINKED_GROUP_ID: &str = "_tb_linked_group_id";
const TB_TRANSFORMATION: &str = "_tb_transformation";
const TB_PROTECTED_PROPERTIES: &str = "_tb_protected_properties";

fn assemble(
    entities: Vec<ParsedEntity>,
    format: MapFormat,
    game: &GameConfig,
    status: &mut ParserStatus,
) -> Result<(Map, ParserStatus), MapError> {
    let mut map = Map::new(World::new(format), game.clone());
    let default_layer = map.graph.default_layer();

    // Pass one: create layer and group nodes so that forward references
    // resolve regardless of file order.
    let mut layers_by_id: FxHashMap<u64, Handle<Node>> = FxHashMap::default();
    let mut groups_by_id: FxHashMap<u64, Handle<Node>> = FxHashMap::default();
    for parsed in &entities {
        match parsed.property(TB_TYPE) {
            Some(TB_TYPE_LAYER) => {
                let name = parsed.property(TB_NAME).unwrap_or("Unnamed").to_owned();
                let mut layer = Layer::new(name);
                if let Some(index) = parsed
                    .property(TB_LAYER_SORT_INDEX)
                    .and_then(|v| v.parse().ok())
                {
                    layer.set_sort_index(index);
                } else {
                    layer.set_sort_index(-1);
                }
                if let Some(color) = parsed.property(TB_LAYER_COLOR).and_then(Color::parse) {
                    layer.set_color(Some(color));
                }
                layer.set_omit_from_export(parsed.property(TB_LAYER_OMIT_FROM_EXPORT) == Some("1"));
                let mut node = Node::new(NodeKind::Layer(layer));
                if parsed.property(TB_LAYER_LOCKED) == Some("1") {
                    node.set_lock_state(LockState::Locked);
                }
                if parsed.property(TB_LAYER_HIDDEN) == Some("1") {
                    node.set_visibility(Visibility::Hidden);
                }
                node.set_file_position(Some(parsed.position));
                let id = parsed.property(TB_ID).and_then(|v| v.parse().ok());
                node.set_persistent_id(id);
                let handle = map.graph.spawn_detached(node);
                if let Some(id) = id {
                    layers_by_id.insert(id, handle);
                }
            }
            Some(TB_TYPE_GROUP) => {
                let name = parsed.property(TB_NAME).unwrap_or("Unnamed").to_owned();
                let mut node = Node::new(NodeKind::Group(Group::new(name)));
                if let Some(link_id) = parsed.property(TB_LINKED_GROUP_ID) {
                    node.set_link_id(link_id.to_owned());
                }
                if let Some(text) = parsed.property(TB_TRANSFORMATION) {
                    match parse_transformation(text) {
                        Some(m) => {
                            node.as_group_mut().set_transformation(Some(m));
                        }
                        None => status.warn(
                            Some(SourceLocation {
                                line: parsed.position.first_line,
                                column: 1,
                            }),
                            "ignoring malformed group transformation",
                        ),
                    }
                }
                node.set_file_position(Some(parsed.position));
                let id = parsed.property(TB_ID).and_then(|v| v.parse().ok());
                node.set_persistent_id(id);
                let handle = map.graph.spawn_detached(node);
                if let Some(id) = id {
                    groups_by_id.insert(id, handle);
                }
            }
            _ => {}
        }
    }

    // Pass two: attach everything in file order.
    let mut seen_worldspawn = false;
    for parsed in entities {
        let is_worldspawn = parsed.classname() == Some("worldspawn") && !seen_worldspawn;
        let container = resolve_container(
            &parsed,
            &layers_by_id,
            &groups_by_id,
            default_layer,
            status,
        );

        let target = match parsed.property(TB_TYPE) {
            Some(TB_TYPE_LAYER) => {
                let id = parsed.property(TB_ID).and_then(|v| v.parse::<u64>().ok());
                let handle = id.and_then(|id| layers_by_id.get(&id).copied());
                match handle {
                    Some(handle) => {
                        map.attach_detached_subtree(handle, map.graph.root(), None)?;
                        handle
                    }
                    None => {
                        status.warn(None, "skipping layer without a valid id");
                        continue;
                    }
                }
            }
            Some(TB_TYPE_GROUP) => {
                let id = parsed.property(TB_ID).and_then(|v| v.parse::<u64>().ok());
                let handle = id.and_then(|id| groups_by_id.get(&id).copied());
                match handle {
                    Some(handle) => {
                        map.attach_detached_subtree(handle, container, None)?;
                        handle
                    }
                    None => {
                        status.warn(None, "skipping group without a valid id");
                        continue;
                    }
                }
            }
            _ if is_worldspawn => {
                seen_worldspawn = true;
                let root = map.graph.root();
                let properties = strip_bookkeeping(parsed.properties.clone());
                map.update_entity(root, |entity| {
                    for (key, value) in properties {
                        entity.set_property(key, value);
                    }
                });
                map.graph[root].set_file_position(Some(parsed.position));
                // Worldspawn primitives live in the default layer.
                attach_primitives(&mut map, parsed, default_layer, status)?;
                continue;
            }
            _ => {
                let mut entity = Entity::default();
                for (key, value) in strip_bookkeeping(parsed.properties.clone()) {
                    entity.set_property(key, value);
                }
                if let Some(text) = parsed.property(TB_PROTECTED_PROPERTIES) {
                    entity.set_protected_properties(parse_protected_properties(text));
                }
                if !parsed.primitives.is_empty() {
                    entity.set_brush_entity(true);
                }
                let mut node = Node::new(NodeKind::Entity(entity));
                node.set_file_position(Some(parsed.position));
                map.attach_new_node(node, container)?
            }
        };

        attach_primitives(&mut map, parsed, target, status)?;
    }

    normalize_layer_sort_indices(&mut map);

    for error in initialize_link_ids(&mut map.graph) {
        status.warn(None, error.to_string());
    }

    let status = std::mem::take(status);
    Ok((map, status))
}

fn resolve_container(
    parsed: &ParsedEntity,
    layers_by_id: &FxHashMap<u64, Handle<Node>>,
    groups_by_id: &FxHashMap<u64, Handle<Node>>,
    default_layer: Handle<Node>,
    status: &mut ParserStatus,
) -> Handle<Node> {
    // Group membership wins over layer membership. Note that for group
    // bookkeeping entities the parent group key collides with the type key.
    let group_id = if parsed.property(TB_TYPE) == Some(TB_TYPE_GROUP) {
        parsed.property(TB_GROUP).and_then(|v| v.parse().ok())
    } else {
        parsed
            .property(TB_GROUP)
            .filter(|_| parsed.property(TB_TYPE) != Some(TB_TYPE_LAYER))
            .and_then(|v| v.parse().ok())
    };
    if let Some(group_id) = group_id {
        if let Some(&handle) = groups_by_id.get(&group_id) {
            return handle;
        }
        status.warn(
            None,
            format!("entity refers to unknown group {group_id}; placing it in the default layer"),
        );
    }
    if let Some(layer_id) = parsed
        .property(TB_LAYER)
        .filter(|_| parsed.property(TB_TYPE) != Some(TB_TYPE_LAYER))
        .and_then(|v| v.parse::<u64>().ok())
    {
        if let Some(&handle) = layers_by_id.get(&layer_id) {
            return handle;
        }
        status.warn(
            None,
            format!("entity refers to unknown layer {layer_id}; placing it in the default layer"),
        );
    }
    default_layer
}

fn attach_primitives(
    map: &mut Map,
    parsed: ParsedEntity,
    parent: Handle<Node>,
    status: &mut ParserStatus,
) -> Result<(), MapError> {
    for primitive in parsed.primitives {
        match primitive {
            ParsedPrimitive::Brush {
                faces,
                primitive_form,
                position,
            } => {
                let mut faces = faces;
                if primitive_form {
                    for face in &mut faces {
                        if face.attributes.primitive_matrix.is_none() {
                            face.attributes.primitive_matrix = Some([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
                        }
                    }
                }
                match Brush::new(faces) {
                    Ok(brush) => {
                        let mut node = Node::new(NodeKind::Brush(brush));
                        node.set_file_position(Some(position));
                        map.attach_new_node(node, parent)?;
                    }
                    Err(error) => {
                        status.warn(
                            Some(SourceLocation {
                                line: position.first_line,
                                column: 1,
                            }),
                            format!("skipping invalid brush: {error}"),
                        );
                    }
                }
            }
            ParsedPrimitive::Patch { patch, position } => {
                let mut node = Node::new(NodeKind::Patch(patch));
                node.set_file_position(Some(position));
                map.attach_new_node(node, parent)?;
            }
        }
    }
    Ok(())
}

fn strip_bookkeeping(properties: Vec<(String, String)>) -> Vec<(String, String)> {
    properties
        .into_iter()
        .filter(|(key, _)| {
            !matches!(
                key.as_str(),
                TB_TYPE
                    | TB_NAME
                    | TB_ID
                    | TB_LAYER
                    | TB_GROUP
                    | TB_LAYER_SORT_INDEX
                    | TB_LAYER_COLOR
                    | TB_LAYER_LOCKED
                    | TB_LAYER_HIDDEN
                    | TB_LAYER_OMIT_FROM_EXPORT
                    | TB_LINKED_GROUP_ID
                    | TB_TRANSFORMATION
                    | TB_PROTECTED_PROPERTIES
            )
        })
        .collect()
}

/// A space-separated row-major 4x4 matrix.
fn parse_transformation(text: &str) -> Option<Matrix4<f64>> {
    let values: Vec<f64> = text
        .split_whitespace()
        .map(|v| v.parse().ok())
        .collect::<Option<_>>()?;
    if values.len() != 16 {
        return None;
    }
    Some(Matrix4::from_row_slice(&values))
}

/// `;`-separated keys with `\;` escapes.
pub(crate) fn parse_protected_properties(text: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(';') => current.push(';'),
                Some(other) => {
                    current.push('\\');
                    current.push(other);
                }
                None => current.push('\\'),
            },
            ';' => {
                result.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        result.push(current);
    }
    result
}

/// Duplicate and negative sort indices are reassigned past the maximum valid
/// index, in file order, so that explicit valid indices always win.
fn normalize_layer_sort_indices(map: &mut Map) {
    let layers = map.graph.custom_layers();
    let mut seen = Vec::new();
    let mut invalid = Vec::new();
    let mut max_valid = -1;
    for &layer in &layers {
        let index = map.graph[layer].as_layer().sort_index();
        if index >= 0 && !seen.contains(&index) {
            seen.push(index);
            max_valid = max_valid.max(index);
        } else {
            invalid.push(layer);
        }
    }
    let mut next = max_valid + 1;
    for layer in invalid {
        map.graph[layer].as_layer_mut().set_sort_index(next);
        next += 1;
    }
}
