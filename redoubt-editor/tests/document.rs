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

//! End-to-end tests of the command engine against whole documents.

use redoubt_core::algebra::{Matrix4, Vector3};
use redoubt_editor::{standard_validators, validate, Command, MapDocument};
use redoubt_editor::commands::{entity::SetPropertyCommand, transform::TransformNodesCommand};
use redoubt_model::{
    brush::Brush,
    definition::EntityDefinitionCatalog,
    node::{Node, NodeKind},
    transform::TransformOptions,
    GameConfig, MapFormat,
};

fn quake_config() -> GameConfig {
    GameConfig::new("Quake", vec![MapFormat::Standard, MapFormat::Valve220])
}

fn load(text: &str) -> MapDocument {
    let (document, status) = MapDocument::load(text, MapFormat::Standard, &quake_config()).unwrap();
    assert!(status.warnings.is_empty(), "unexpected warnings: {:?}", status.warnings);
    document
}

fn save(document: &mut MapDocument) -> String {
    let mut bytes = Vec::new();
    document.save(&mut bytes).unwrap();
    String::from_utf8(bytes).unwrap()
}

fn cuboid_node(min: f64, max: f64) -> Node {
    Node::new(NodeKind::Brush(
        Brush::cuboid(
            Vector3::new(min, min, min),
            Vector3::new(max, max, max),
            "ground1_1",
        )
        .unwrap(),
    ))
}

const SIMPLE_MAP: &str = r#"{
"classname" "worldspawn"
{
( 0 0 0 ) ( 0 1 0 ) ( 0 0 1 ) mat1 0 0 0 1 1
( 64 0 0 ) ( 64 0 1 ) ( 64 1 0 ) mat1 0 0 0 1 1
( 0 0 0 ) ( 0 0 1 ) ( 1 0 0 ) mat1 0 0 0 1 1
( 0 64 0 ) ( 1 64 0 ) ( 0 64 1 ) mat1 0 0 0 1 1
( 0 0 0 ) ( 1 0 0 ) ( 0 1 0 ) mat1 0 0 0 1 1
( 0 0 64 ) ( 0 1 64 ) ( 1 0 64 ) mat1 0 0 0 1 1
}
}
{
"classname" "light"
"origin" "128 128 32"
}"#;

#[test]
fn execute_then_undo_restores_serialization() {
    let mut document = load(SIMPLE_MAP);
    let before = save(&mut document);

    let layer = document.map().graph.default_layer();
    let brush = document.map().graph.children(layer)[0];
    document
        .execute(Command::new(TransformNodesCommand::new(
            vec![brush],
            Matrix4::new_translation(&Vector3::new(64.0, 0.0, 0.0)),
            TransformOptions::default(),
        )))
        .unwrap();

    let moved = save(&mut document);
    assert_ne!(before, moved);

    assert!(document.undo());
    assert_eq!(save(&mut document), before);
    assert!(!document.undo());
}

#[test]
fn modification_count_tracks_undo_redo() {
    let mut document = load(SIMPLE_MAP);
    assert_eq!(document.modification_count(), 0);

    let layer = document.map().graph.default_layer();
    let light = document.map().graph.children(layer)[1];
    document
        .execute(Command::new(SetPropertyCommand::new(light, "light", "300")))
        .unwrap();
    assert_eq!(document.modification_count(), 1);

    assert!(document.undo());
    assert_eq!(document.modification_count(), 0);
    assert!(document.redo().unwrap());
    assert_eq!(document.modification_count(), 1);
    assert_eq!(
        document.map().graph[light].as_entity().property("light"),
        Some("300")
    );

    // Selection changes are navigational and leave the count alone.
    document.select_nodes(&[light]).unwrap();
    assert_eq!(document.modification_count(), 1);
}

#[test]
fn transaction_rollback_leaves_no_trace() {
    let mut document = load(SIMPLE_MAP);
    let before = save(&mut document);

    let layer = document.map().graph.default_layer();
    let light = document.map().graph.children(layer)[1];
    document.begin_transaction("Doomed Edit");
    document
        .execute(Command::new(SetPropertyCommand::new(light, "light", "300")))
        .unwrap();
    document
        .execute(Command::new(SetPropertyCommand::new(light, "style", "2")))
        .unwrap();
    document.rollback_transaction();

    assert_eq!(save(&mut document), before);
    assert_eq!(document.modification_count(), 0);
    assert!(!document.can_undo());
}

#[test]
fn failed_command_rolls_back_whole_unit() {
    let mut document = load(SIMPLE_MAP);
    let before = save(&mut document);

    let layer = document.map().graph.default_layer();
    let light = document.map().graph.children(layer)[1];
    let brush = document.map().graph.children(layer)[0];

    let result = document.in_transaction("Partial Failure", |document| {
        document.execute(Command::new(SetPropertyCommand::new(light, "light", "300")))?;
        // Pushing the brush out of the world fails the whole unit.
        document.execute(Command::new(TransformNodesCommand::new(
            vec![brush],
            Matrix4::new_translation(&Vector3::new(9000.0, 0.0, 0.0)),
            TransformOptions::default(),
        )))
    });
    assert!(result.is_err());
    assert_eq!(save(&mut document), before);
    assert!(!document.can_undo());
}

#[test]
fn consecutive_translations_collate() {
    let mut document = load(SIMPLE_MAP);
    let layer = document.map().graph.default_layer();
    let brush = document.map().graph.children(layer)[0];
    let original = document.map().graph.logical_bounds(brush);

    for _ in 0..2 {
        document
            .execute(Command::new(TransformNodesCommand::new(
                vec![brush],
                Matrix4::new_translation(&Vector3::new(16.0, 0.0, 0.0)),
                TransformOptions::default(),
            )))
            .unwrap();
    }
    assert_eq!(
        document.map().graph.logical_bounds(brush).min,
        original.min + Vector3::new(32.0, 0.0, 0.0)
    );

    // Both nudges merged into one undo entry.
    assert!(document.undo());
    assert_eq!(document.map().graph.logical_bounds(brush), original);
    assert!(!document.can_undo());
}

#[test]
fn empty_brush_entity_collapses_and_returns_on_undo() {
    let text = r#"{
"classname" "worldspawn"
}
{
"classname" "func_door"
{
( 0 0 0 ) ( 0 1 0 ) ( 0 0 1 ) door1 0 0 0 1 1
( 64 0 0 ) ( 64 0 1 ) ( 64 1 0 ) door1 0 0 0 1 1
( 0 0 0 ) ( 0 0 1 ) ( 1 0 0 ) door1 0 0 0 1 1
( 0 64 0 ) ( 1 64 0 ) ( 0 64 1 ) door1 0 0 0 1 1
( 0 0 0 ) ( 1 0 0 ) ( 0 1 0 ) door1 0 0 0 1 1
( 0 0 64 ) ( 0 1 64 ) ( 1 0 64 ) door1 0 0 0 1 1
}
}"#;
    let mut document = load(text);
    let before = save(&mut document);
    let layer = document.map().graph.default_layer();
    let entity = document.map().graph.children(layer)[0];
    let brush = document.map().graph.children(entity)[0];

    document.select_nodes(&[brush]).unwrap();
    document.delete_selected().unwrap();

    // Deleting the last brush removed the now-empty brush entity too.
    assert!(document.map().graph.children(layer).is_empty());
    assert!(!document.map().graph.is_valid_handle(entity));

    assert!(document.undo());
    assert!(document.map().graph.is_valid_handle(entity));
    assert!(document.map().graph.is_valid_handle(brush));
    assert_eq!(save(&mut document), before);
    // The pre-delete selection is back as well.
    assert_eq!(document.selection().nodes, vec![brush]);
}

#[test]
fn locking_deselects_and_undo_restores_selection() {
    let mut document = load(SIMPLE_MAP);
    let layer = document.map().graph.default_layer();
    let brush = document.map().graph.children(layer)[0];
    let light = document.map().graph.children(layer)[1];

    document.select_nodes(&[brush, light]).unwrap();
    assert_eq!(document.selection().nodes.len(), 2);

    document.lock_nodes(&[brush]).unwrap();
    // The locked node fell out of the selection and cannot come back in.
    assert_eq!(document.selection().nodes, vec![light]);
    assert!(document.map().graph.is_locked(brush));
    document.select_nodes(&[brush, light]).unwrap();
    assert_eq!(document.selection().nodes, vec![light]);

    // Undoing the selection change and then the lock restores everything.
    assert!(document.undo());
    assert!(document.undo());
    assert!(!document.map().graph.is_locked(brush));
    assert_eq!(document.selection().nodes, vec![brush, light]);
}

#[test]
fn hiding_layer_rehomes_explicitly_shown_descendants() {
    let mut document = load(SIMPLE_MAP);
    let layer = document.map().graph.default_layer();
    let brush = document.map().graph.children(layer)[0];

    document.show_nodes(&[brush]).unwrap();
    document.hide_nodes(&[layer]).unwrap();
    // The explicit Shown was re-homed to Inherited, so the hide covers it.
    assert!(!document.map().graph.is_visible(brush));

    assert!(document.undo());
    assert!(document.map().graph.is_visible(brush));
}

#[test]
fn select_by_line_positions_resolves_containers() {
    // Line numbers: worldspawn block 1..=11 with its brush at 3..=10, the
    // light block at 12..=15, the group block at 16..=29 with its brush at
    // 21..=28.
    let text = r#"{
"classname" "worldspawn"
{
( 0 0 0 ) ( 0 1 0 ) ( 0 0 1 ) mat1 0 0 0 1 1
( 64 0 0 ) ( 64 0 1 ) ( 64 1 0 ) mat1 0 0 0 1 1
( 0 0 0 ) ( 0 0 1 ) ( 1 0 0 ) mat1 0 0 0 1 1
( 0 64 0 ) ( 1 64 0 ) ( 0 64 1 ) mat1 0 0 0 1 1
( 0 0 0 ) ( 1 0 0 ) ( 0 1 0 ) mat1 0 0 0 1 1
( 0 0 64 ) ( 0 1 64 ) ( 1 0 64 ) mat1 0 0 0 1 1
}
}
{
"classname" "light"
"origin" "128 128 32"
}
{
"classname" "func_group"
"_tb_type" "_tb_group"
"_tb_name" "cage"
"_tb_id" "1"
{
( 200 0 0 ) ( 200 1 0 ) ( 200 0 1 ) mat2 0 0 0 1 1
( 264 0 0 ) ( 264 0 1 ) ( 264 1 0 ) mat2 0 0 0 1 1
( 200 0 0 ) ( 200 0 1 ) ( 201 0 0 ) mat2 0 0 0 1 1
( 200 64 0 ) ( 201 64 0 ) ( 200 64 1 ) mat2 0 0 0 1 1
( 200 0 0 ) ( 201 0 0 ) ( 200 1 0 ) mat2 0 0 0 1 1
( 200 0 64 ) ( 200 1 64 ) ( 201 0 64 ) mat2 0 0 0 1 1
}
}"#;
    let mut document = load(text);
    let layer = document.map().graph.default_layer();
    let brush = document.map().graph.children(layer)[0];
    let light = document.map().graph.children(layer)[1];
    let group = document.map().graph.children(layer)[2];
    assert!(document.map().graph[group].is_group());

    // A line inside the worldspawn brush selects that brush.
    document.select_by_line_positions(&[4]).unwrap();
    assert_eq!(document.selection().nodes, vec![brush]);

    // A line inside the light block selects the entity.
    document.select_by_line_positions(&[14]).unwrap();
    assert_eq!(document.selection().nodes, vec![light]);

    // A line inside the closed group selects the whole group.
    document.select_by_line_positions(&[23]).unwrap();
    assert_eq!(document.selection().nodes, vec![group]);

    // With the group open, the inner brush is selected granularly.
    document.open_group(group).unwrap();
    document.select_by_line_positions(&[23]).unwrap();
    let inner = document.map().graph.children(group)[0];
    assert_eq!(document.selection().nodes, vec![inner]);
}

#[test]
fn csg_subtract_fully_covered_clears_and_undo_reselects() {
    let mut document = load("{ \"classname\" \"worldspawn\" }");
    let minuend = document.add_node(cuboid_node(0.0, 32.0), None).unwrap();
    let subtrahend = document.add_node(cuboid_node(-16.0, 48.0), None).unwrap();
    let layer = document.map().graph.default_layer();
    assert_eq!(document.map().graph.children(layer).len(), 2);

    document.select_nodes(&[subtrahend]).unwrap();
    document.csg_subtract().unwrap();

    // The minuend was fully covered: nothing remains, nothing is selected.
    assert!(document.map().graph.children(layer).is_empty());
    assert!(document.selection().is_empty());

    assert!(document.undo());
    assert!(document.map().graph.is_valid_handle(minuend));
    assert!(document.map().graph.is_valid_handle(subtrahend));
    assert_eq!(document.selection().nodes, vec![subtrahend]);
}

#[test]
fn csg_subtract_carves_and_selects_fragments() {
    let mut document = load("{ \"classname\" \"worldspawn\" }");
    let _minuend = document.add_node(cuboid_node(0.0, 64.0), None).unwrap();
    let subtrahend = document
        .add_node(
            Node::new(NodeKind::Brush(
                Brush::cuboid(
                    Vector3::new(0.0, 0.0, 0.0),
                    Vector3::new(32.0, 64.0, 64.0),
                    "clip",
                )
                .unwrap(),
            )),
            None,
        )
        .unwrap();

    document.select_nodes(&[subtrahend]).unwrap();
    document.csg_subtract().unwrap();

    let layer = document.map().graph.default_layer();
    let children = document.map().graph.children(layer).to_vec();
    assert_eq!(children.len(), 1);
    let remainder = children[0];
    assert_eq!(
        document.map().graph.logical_bounds(remainder),
        redoubt_core::math::Bounds3::from_min_max(
            Vector3::new(32.0, 0.0, 0.0),
            Vector3::new(64.0, 64.0, 64.0)
        )
    );
    assert_eq!(document.selection().nodes, vec![remainder]);
}

#[test]
fn select_touching_with_delete_consumes_query() {
    let mut document = load("{ \"classname\" \"worldspawn\" }");
    let target = document.add_node(cuboid_node(0.0, 32.0), None).unwrap();
    let far = document.add_node(cuboid_node(200.0, 232.0), None).unwrap();
    let query = document.add_node(cuboid_node(-16.0, 16.0), None).unwrap();

    document.select_nodes(&[query]).unwrap();
    document.select_touching(true).unwrap();

    assert!(!document.map().graph.is_valid_handle(query));
    assert_eq!(document.selection().nodes, vec![target]);
    assert!(document.map().graph.is_valid_handle(far));
}

#[test]
fn grouping_and_ungrouping_round_trip() {
    let mut document = load("{ \"classname\" \"worldspawn\" }");
    let a = document.add_node(cuboid_node(0.0, 32.0), None).unwrap();
    let b = document.add_node(cuboid_node(64.0, 96.0), None).unwrap();

    document.select_nodes(&[a, b]).unwrap();
    let group = document.group_selection("walls").unwrap();
    assert!(document.map().graph[group].is_group());
    assert_eq!(document.map().graph.children(group), &[a, b]);
    assert_eq!(document.selection().nodes, vec![group]);

    document.ungroup_selection().unwrap();
    let layer = document.map().graph.default_layer();
    assert!(document.map().graph.children(layer).contains(&a));
    // The emptied group was collapsed.
    assert!(!document.map().graph.is_valid_handle(group));
    assert_eq!(document.selection().nodes, vec![a, b]);

    // One undo brings the group back, another removes it again.
    assert!(document.undo());
    assert!(document.map().graph.is_valid_handle(group));
    assert_eq!(document.map().graph.children(group), &[a, b]);
}

#[test]
fn quick_fix_replaces_quotes_in_values() {
    let text = "{\n\"classname\" \"worldspawn\"\n\"message\" \"say \\\"hi\\\" twice\"\n}";
    let mut document = load(text);
    let validators = standard_validators();
    let issues = validate(document.map(), &[document.map().graph.root()], &validators);

    let offending: Vec<_> = issues
        .iter()
        .filter(|issue| issue.description.contains("quotation"))
        .cloned()
        .collect();
    assert_eq!(offending.len(), 1);

    let validator = validators
        .iter()
        .find(|v| v.issue_type() == offending[0].issue_type)
        .unwrap();
    let fixes = validator.quick_fixes();
    fixes[0].apply(&mut document, &offending).unwrap();

    assert_eq!(
        document.map().world().entity.property("message"),
        Some("say \\'hi\\' twice")
    );

    // The fix is an ordinary command: undo brings the quotes back.
    assert!(document.undo());
    assert_eq!(
        document.map().world().entity.property("message"),
        Some("say \\\"hi\\\" twice")
    );
}

#[test]
fn definition_reload_resolves_classnames() {
    let mut document = load(SIMPLE_MAP);
    let validators = standard_validators();
    let issues = validate(document.map(), &[document.map().graph.root()], &validators);
    // Without a catalog, the light entity's classname is undefined.
    assert!(issues.iter().any(|i| i.description.contains("not defined")));

    document.set_entity_definitions(EntityDefinitionCatalog::with_builtin_classes());
    let issues = validate(document.map(), &[document.map().graph.root()], &validators);
    assert!(!issues.iter().any(|i| i.description.contains("not defined")));

    let layer = document.map().graph.default_layer();
    let light = document.map().graph.children(layer)[1];
    assert!(document.map().graph[light].as_entity().definition().is_some());
}

#[test]
fn validators_flag_missing_classname_and_empty_entities() {
    let text = r#"{
"classname" "worldspawn"
}
{
"origin" "0 0 0"
}"#;
    let mut document = load(text);
    // An undefined-classname entity is also an empty brush entity candidate
    // only if it is classified as one; this one has no children and no
    // classname.
    let validators = standard_validators();
    let issues = validate(document.map(), &[document.map().graph.root()], &validators);
    assert!(issues
        .iter()
        .any(|issue| issue.description.contains("no classname")));

    // The delete quick fix removes the offender through the engine.
    let offending: Vec<_> = issues
        .iter()
        .filter(|issue| issue.description.contains("no classname"))
        .cloned()
        .collect();
    let validator = validators
        .iter()
        .find(|v| v.issue_type() == offending[0].issue_type)
        .unwrap();
    validator.quick_fixes()[0]
        .apply(&mut document, &offending)
        .unwrap();
    let layer = document.map().graph.default_layer();
    assert!(document.map().graph.children(layer).is_empty());
}
