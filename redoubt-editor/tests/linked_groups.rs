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

//! End-to-end tests of linked-group propagation through the command engine.

use redoubt_core::algebra::{Matrix4, Vector3};
use redoubt_editor::{Command, MapDocument};
use redoubt_editor::commands::{entity::SetPropertyCommand, transform::TransformNodesCommand};
use redoubt_model::{
    node::{entity::Entity, Node, NodeKind},
    transform::TransformOptions,
    GameConfig, MapError, MapFormat,
};

fn quake_config() -> GameConfig {
    GameConfig::new("Quake", vec![MapFormat::Standard])
}

fn load(text: &str) -> MapDocument {
    let (document, _status) =
        MapDocument::load(text, MapFormat::Standard, &quake_config()).unwrap();
    document
}

fn save(document: &mut MapDocument) -> String {
    let mut bytes = Vec::new();
    document.save(&mut bytes).unwrap();
    String::from_utf8(bytes).unwrap()
}

const LINKED_PAIR: &str = r#"{
"classname" "worldspawn"
}
{
"classname" "func_group"
"_tb_type" "_tb_group"
"_tb_name" "inst"
"_tb_id" "1"
"_tb_linked_group_id" "family"
"_tb_transformation" "1 0 0 0 0 1 0 0 0 0 1 0 0 0 0 1"
}
{
"classname" "light"
"origin" "0 0 0"
"_tb_group" "1"
}
{
"classname" "func_group"
"_tb_type" "_tb_group"
"_tb_name" "inst"
"_tb_id" "2"
"_tb_linked_group_id" "family"
"_tb_transformation" "1 0 0 64 0 1 0 0 0 0 1 0 0 0 0 1"
}
{
"classname" "light"
"origin" "64 0 0"
"light" "100"
"_tb_protected_properties" "light"
"_tb_group" "2"
}"#;

fn family(document: &MapDocument) -> (redoubt_core::pool::Handle<redoubt_model::node::Node>, redoubt_core::pool::Handle<redoubt_model::node::Node>) {
    let layer = document.map().graph.default_layer();
    let groups = document.map().graph.children(layer);
    (groups[0], groups[1])
}

#[test]
fn property_edit_propagates_through_relative_transform() {
    let mut document = load(LINKED_PAIR);
    let before = save(&mut document);
    let (source, copy) = family(&document);
    let source_light = document.map().graph.children(source)[0];

    document
        .execute(Command::new(SetPropertyCommand::new(
            source_light,
            "style",
            "3",
        )))
        .unwrap();

    // The copy received a fresh child: the source state mapped through
    // T_copy ∘ T_source⁻¹, with the new property on board.
    let copy_light = document.map().graph.children(copy)[0];
    let entity = document.map().graph[copy_light].as_entity();
    assert_eq!(entity.property("style"), Some("3"));
    assert_eq!(entity.property("origin"), Some("64 0 0"));

    // One undo takes the edit and the propagation back together.
    assert!(document.undo());
    assert_eq!(save(&mut document), before);
}

#[test]
fn protected_properties_survive_propagation() {
    let mut document = load(LINKED_PAIR);
    let (source, copy) = family(&document);
    let source_light = document.map().graph.children(source)[0];

    document
        .execute(Command::new(SetPropertyCommand::new(
            source_light,
            "light",
            "400",
        )))
        .unwrap();

    let copy_light = document.map().graph.children(copy)[0];
    let entity = document.map().graph[copy_light].as_entity();
    // The copy protects "light": its own value survives the update.
    assert_eq!(entity.property("light"), Some("100"));
    assert_eq!(entity.protected_properties(), &["light".to_owned()]);
    // The source keeps what was set.
    assert_eq!(
        document.map().graph[source_light]
            .as_entity()
            .property("light"),
        Some("400")
    );
}

#[test]
fn geometry_edits_propagate_with_transform() {
    let mut document = load(LINKED_PAIR);
    let (source, copy) = family(&document);
    let source_light = document.map().graph.children(source)[0];

    document
        .execute(Command::new(TransformNodesCommand::new(
            vec![source_light],
            Matrix4::new_translation(&Vector3::new(0.0, 32.0, 0.0)),
            TransformOptions::default(),
        )))
        .unwrap();

    assert_eq!(
        document.map().graph[document.map().graph.children(source)[0]]
            .as_entity()
            .property("origin"),
        Some("0 32 0")
    );
    assert_eq!(
        document.map().graph[document.map().graph.children(copy)[0]]
            .as_entity()
            .property("origin"),
        Some("64 32 0")
    );
}

#[test]
fn propagation_failure_fails_the_whole_command() {
    let text = r#"{
"classname" "worldspawn"
}
{
"classname" "func_group"
"_tb_type" "_tb_group"
"_tb_name" "inst"
"_tb_id" "1"
"_tb_linked_group_id" "family"
"_tb_transformation" "1 0 0 0 0 1 0 0 0 0 1 0 0 0 0 1"
}
{
"classname" "light"
"origin" "0 0 0"
"_tb_group" "1"
}
{
"classname" "func_group"
"_tb_type" "_tb_group"
"_tb_name" "inst"
"_tb_id" "2"
"_tb_linked_group_id" "family"
"_tb_transformation" "1 0 0 8150 0 1 0 0 0 0 1 0 0 0 0 1"
}
{
"classname" "light"
"origin" "8150 0 0"
"_tb_group" "2"
}"#;
    let mut document = load(text);
    let before = save(&mut document);
    let (source, _) = family(&document);
    let source_light = document.map().graph.children(source)[0];

    // Moving the source light is fine locally, but the propagated copy would
    // land outside the world cube.
    let result = document.execute(Command::new(TransformNodesCommand::new(
        vec![source_light],
        Matrix4::new_translation(&Vector3::new(100.0, 0.0, 0.0)),
        TransformOptions::default(),
    )));
    assert!(matches!(result, Err(MapError::WorldBounds(_))));
    assert_eq!(save(&mut document), before);
    assert!(!document.can_undo());
}

#[test]
fn linked_duplicate_forms_a_family() {
    let mut document = load("{ \"classname\" \"worldspawn\" }");
    let mut light = Entity::with_classname("light");
    light.set_property("origin", "0 0 0");
    let light = document
        .add_node(Node::new(NodeKind::Entity(light)), None)
        .unwrap();

    document.select_nodes(&[light]).unwrap();
    let group = document.group_selection("inst").unwrap();
    let duplicate = document.create_linked_duplicate(group).unwrap();

    assert_ne!(duplicate, group);
    assert_eq!(
        document.map().graph[group].link_id(),
        document.map().graph[duplicate].link_id()
    );
    // Per-position descendant ids match, so propagation can pair children.
    let group_light = document.map().graph.children(group)[0];
    let duplicate_light = document.map().graph.children(duplicate)[0];
    assert_eq!(
        document.map().graph[group_light].link_id(),
        document.map().graph[duplicate_light].link_id()
    );

    // An edit in the original reaches the duplicate.
    document
        .execute(Command::new(SetPropertyCommand::new(
            group_light,
            "light",
            "250",
        )))
        .unwrap();
    let duplicate_light = document.map().graph.children(duplicate)[0];
    assert_eq!(
        document.map().graph[duplicate_light]
            .as_entity()
            .property("light"),
        Some("250")
    );
}

#[test]
fn separated_groups_stop_propagating() {
    let mut document = load(LINKED_PAIR);
    let (source, copy) = family(&document);

    document.separate_linked_groups(&[copy]).unwrap();
    assert_ne!(
        document.map().graph[source].link_id(),
        document.map().graph[copy].link_id()
    );

    let source_light = document.map().graph.children(source)[0];
    document
        .execute(Command::new(SetPropertyCommand::new(
            source_light,
            "style",
            "5",
        )))
        .unwrap();

    let copy_light = document.map().graph.children(copy)[0];
    assert_eq!(
        document.map().graph[copy_light].as_entity().property("style"),
        None
    );
}
