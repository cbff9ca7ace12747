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

//! The built-in validators.

use super::{
    DeleteNodesQuickFix, Issue, IssueType, IssueTypeAllocator, QuickFix, RemovePropertyQuickFix,
    TransformPropertyValueQuickFix, Validator,
};
use redoubt_core::pool::Handle;
use redoubt_model::{
    node::{entity::Entity, Node, NodeKind},
    Map,
};

/// The standard validators with freshly allocated issue types.
pub fn standard_validators() -> Vec<Box<dyn Validator>> {
    let mut allocator = IssueTypeAllocator::new();
    vec![
        Box::new(EmptyPropertyKeyValidator::new(&mut allocator)),
        Box::new(EmptyPropertyValueValidator::new(&mut allocator)),
        Box::new(LongPropertyKeyValidator::new(&mut allocator, 64)),
        Box::new(PropertyKeyWithDoubleQuotesValidator::new(&mut allocator)),
        Box::new(PropertyValueWithDoubleQuotesValidator::new(&mut allocator)),
        Box::new(MissingClassnameValidator::new(&mut allocator)),
        Box::new(MissingDefinitionValidator::new(&mut allocator)),
        Box::new(EmptyBrushEntityValidator::new(&mut allocator)),
        Box::new(WorldBoundsValidator::new(&mut allocator)),
    ]
}

fn entity_of(node: &Node) -> Option<&Entity> {
    match node.kind() {
        NodeKind::Entity(entity) => Some(entity),
        NodeKind::World(world) => Some(&world.entity),
        _ => None,
    }
}

macro_rules! define_validator {
    ($name:ident) => {
        pub struct $name {
            issue_type: IssueType,
        }

        impl $name {
            pub fn new(allocator: &mut IssueTypeAllocator) -> Self {
                Self {
                    issue_type: allocator.allocate(),
                }
            }
        }
    };
}

define_validator!(EmptyPropertyKeyValidator);

impl Validator for EmptyPropertyKeyValidator {
    fn issue_type(&self) -> IssueType {
        self.issue_type
    }

    fn description(&self) -> &str {
        "Empty property key"
    }

    fn validate(&self, map: &Map, handle: Handle<Node>, issues: &mut Vec<Issue>) {
        let Some(entity) = entity_of(&map.graph[handle]) else {
            return;
        };
        for property in entity.properties() {
            if property.key.is_empty() {
                issues.push(Issue {
                    node: handle,
                    issue_type: self.issue_type,
                    description: "Entity has a property with an empty key".to_owned(),
                    payload: Some(String::new()),
                });
            }
        }
    }

    fn quick_fixes(&self) -> Vec<Box<dyn QuickFix>> {
        vec![Box::new(RemovePropertyQuickFix)]
    }
}

define_validator!(EmptyPropertyValueValidator);

impl Validator for EmptyPropertyValueValidator {
    fn issue_type(&self) -> IssueType {
        self.issue_type
    }

    fn description(&self) -> &str {
        "Empty property value"
    }

    fn validate(&self, map: &Map, handle: Handle<Node>, issues: &mut Vec<Issue>) {
        let Some(entity) = entity_of(&map.graph[handle]) else {
            return;
        };
        for property in entity.properties() {
            if property.value.is_empty() {
                issues.push(Issue {
                    node: handle,
                    issue_type: self.issue_type,
                    description: format!(
                        "Property \"{}\" has an empty value",
                        property.key
                    ),
                    payload: Some(property.key.clone()),
                });
            }
        }
    }

    fn quick_fixes(&self) -> Vec<Box<dyn QuickFix>> {
        vec![Box::new(RemovePropertyQuickFix)]
    }
}

pub struct LongPropertyKeyValidator {
    issue_type: IssueType,
    max_length: usize,
}

impl LongPropertyKeyValidator {
    pub fn new(allocator: &mut IssueTypeAllocator, max_length: usize) -> Self {
        Self {
            issue_type: allocator.allocate(),
            max_length,
        }
    }
}

impl Validator for LongPropertyKeyValidator {
    fn issue_type(&self) -> IssueType {
        self.issue_type
    }

    fn description(&self) -> &str {
        "Property key too long"
    }

    fn validate(&self, map: &Map, handle: Handle<Node>, issues: &mut Vec<Issue>) {
        let Some(entity) = entity_of(&map.graph[handle]) else {
            return;
        };
        for property in entity.properties() {
            if property.key.len() >= self.max_length {
                issues.push(Issue {
                    node: handle,
                    issue_type: self.issue_type,
                    description: format!(
                        "Property key \"{}...\" is too long",
                        property.key.chars().take(8).collect::<String>()
                    ),
                    payload: Some(property.key.clone()),
                });
            }
        }
    }

    fn quick_fixes(&self) -> Vec<Box<dyn QuickFix>> {
        vec![Box::new(RemovePropertyQuickFix)]
    }
}

define_validator!(PropertyKeyWithDoubleQuotesValidator);

impl Validator for PropertyKeyWithDoubleQuotesValidator {
    fn issue_type(&self) -> IssueType {
        self.issue_type
    }

    fn description(&self) -> &str {
        "Property key contains double quotation marks"
    }

    fn validate(&self, map: &Map, handle: Handle<Node>, issues: &mut Vec<Issue>) {
        let Some(entity) = entity_of(&map.graph[handle]) else {
            return;
        };
        for property in entity.properties() {
            if property.key.contains('"') {
                issues.push(Issue {
                    node: handle,
                    issue_type: self.issue_type,
                    description: format!(
                        "Property key \"{}\" contains double quotation marks",
                        property.key
                    ),
                    payload: Some(property.key.clone()),
                });
            }
        }
    }

    fn quick_fixes(&self) -> Vec<Box<dyn QuickFix>> {
        vec![Box::new(RemovePropertyQuickFix)]
    }
}

define_validator!(PropertyValueWithDoubleQuotesValidator);

impl Validator for PropertyValueWithDoubleQuotesValidator {
    fn issue_type(&self) -> IssueType {
        self.issue_type
    }

    fn description(&self) -> &str {
        "Property value contains double quotation marks"
    }

    fn validate(&self, map: &Map, handle: Handle<Node>, issues: &mut Vec<Issue>) {
        let Some(entity) = entity_of(&map.graph[handle]) else {
            return;
        };
        for property in entity.properties() {
            if property.value.contains('"') {
                issues.push(Issue {
                    node: handle,
                    issue_type: self.issue_type,
                    description: format!(
                        "The value of property \"{}\" contains double quotation marks",
                        property.key
                    ),
                    payload: Some(property.key.clone()),
                });
            }
        }
    }

    fn quick_fixes(&self) -> Vec<Box<dyn QuickFix>> {
        vec![Box::new(TransformPropertyValueQuickFix::new(
            "Replace Quotation Marks",
            |value| value.replace('"', "'"),
        ))]
    }
}

define_validator!(MissingClassnameValidator);

impl Validator for MissingClassnameValidator {
    fn issue_type(&self) -> IssueType {
        self.issue_type
    }

    fn description(&self) -> &str {
        "Missing entity classname"
    }

    fn validate(&self, map: &Map, handle: Handle<Node>, issues: &mut Vec<Issue>) {
        let node = &map.graph[handle];
        if !node.is_entity() {
            return;
        }
        if node.as_entity().classname().is_none() {
            issues.push(Issue {
                node: handle,
                issue_type: self.issue_type,
                description: "Entity has no classname property".to_owned(),
                payload: None,
            });
        }
    }

    fn quick_fixes(&self) -> Vec<Box<dyn QuickFix>> {
        vec![Box::new(DeleteNodesQuickFix)]
    }
}

define_validator!(MissingDefinitionValidator);

impl Validator for MissingDefinitionValidator {
    fn issue_type(&self) -> IssueType {
        self.issue_type
    }

    fn description(&self) -> &str {
        "Missing entity definition"
    }

    fn validate(&self, map: &Map, handle: Handle<Node>, issues: &mut Vec<Issue>) {
        let node = &map.graph[handle];
        if !node.is_entity() {
            return;
        }
        let entity = node.as_entity();
        if let Some(classname) = entity.classname() {
            if !map.definitions.contains(classname) {
                issues.push(Issue {
                    node: handle,
                    issue_type: self.issue_type,
                    description: format!("Entity classname \"{classname}\" is not defined"),
                    payload: None,
                });
            }
        }
    }

    fn quick_fixes(&self) -> Vec<Box<dyn QuickFix>> {
        vec![Box::new(DeleteNodesQuickFix)]
    }
}

define_validator!(EmptyBrushEntityValidator);

impl Validator for EmptyBrushEntityValidator {
    fn issue_type(&self) -> IssueType {
        self.issue_type
    }

    fn description(&self) -> &str {
        "Empty brush entity"
    }

    fn validate(&self, map: &Map, handle: Handle<Node>, issues: &mut Vec<Issue>) {
        let node = &map.graph[handle];
        if node.is_entity()
            && !node.as_entity().is_point_entity()
            && node.children().is_empty()
        {
            issues.push(Issue {
                node: handle,
                issue_type: self.issue_type,
                description: format!(
                    "Brush entity \"{}\" has no brushes",
                    node.as_entity().classname().unwrap_or("undefined")
                ),
                payload: None,
            });
        }
    }

    fn quick_fixes(&self) -> Vec<Box<dyn QuickFix>> {
        vec![Box::new(DeleteNodesQuickFix)]
    }
}

define_validator!(WorldBoundsValidator);

impl Validator for WorldBoundsValidator {
    fn issue_type(&self) -> IssueType {
        self.issue_type
    }

    fn description(&self) -> &str {
        "Object out of world bounds"
    }

    fn validate(&self, map: &Map, handle: Handle<Node>, issues: &mut Vec<Issue>) {
        let node = &map.graph[handle];
        if !(node.is_brush() || node.is_patch() || node.is_entity()) {
            return;
        }
        let bounds = map.graph.logical_bounds(handle);
        if bounds.is_valid() && !map.world_bounds().contains_bounds(&bounds) {
            issues.push(Issue {
                node: handle,
                issue_type: self.issue_type,
                description: format!("\"{}\" is out of world bounds", node.name()),
                payload: None,
            });
        }
    }

    fn quick_fixes(&self) -> Vec<Box<dyn QuickFix>> {
        vec![Box::new(DeleteNodesQuickFix)]
    }
}
