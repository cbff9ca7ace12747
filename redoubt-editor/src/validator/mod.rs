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

//! The validator pipeline. Validators are pure: they look at nodes and emit
//! issues; nothing is revalidated automatically. Quick-fixes resolve issues by
//! executing commands through the document, so every fix is undoable and may
//! fail like any other command.

pub mod builtin;

pub use builtin::standard_validators;

use crate::document::MapDocument;
use redoubt_core::pool::Handle;
use redoubt_model::{node::Node, Map, MapError};

/// The identity of one validator: a freshly allocated bit.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct IssueType(u64);

impl IssueType {
    pub fn bit(self) -> u64 {
        self.0
    }
}

/// Hands out fresh issue-type bits.
#[derive(Debug, Default)]
pub struct IssueTypeAllocator {
    next: u32,
}

impl IssueTypeAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self) -> IssueType {
        let bit = 1u64
            .checked_shl(self.next)
            .expect("too many registered validators");
        self.next += 1;
        IssueType(bit)
    }
}

/// One finding, pointing at the node that produced it. The payload carries
/// whatever the quick fix needs, typically the offending property key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Issue {
    pub node: Handle<Node>,
    pub issue_type: IssueType,
    pub description: String,
    pub payload: Option<String>,
}

/// A registered validator over one or more node variants.
pub trait Validator {
    fn issue_type(&self) -> IssueType;

    /// Human-readable description of what this validator finds.
    fn description(&self) -> &str;

    fn validate(&self, map: &Map, node: Handle<Node>, issues: &mut Vec<Issue>);

    /// The fixes applicable to this validator's issues.
    fn quick_fixes(&self) -> Vec<Box<dyn QuickFix>> {
        Vec::new()
    }
}

/// A strategy resolving a batch of issues by executing commands.
pub trait QuickFix {
    fn name(&self) -> &str;

    fn apply(&self, document: &mut MapDocument, issues: &[Issue]) -> Result<(), MapError>;
}

/// Runs the given validators over a node set (pre-order per root). The
/// pipeline is pull-based: callers decide what to validate and when.
pub fn validate(
    map: &Map,
    roots: &[Handle<Node>],
    validators: &[Box<dyn Validator>],
) -> Vec<Issue> {
    let mut issues = Vec::new();
    let nodes = map.graph.collect_nodes(roots, &|_| true);
    for node in nodes {
        for validator in validators {
            validator.validate(map, node, &mut issues);
        }
    }
    issues
}

// --- Shared quick-fix strategies -------------------------------------------

/// Deletes every node an issue points at.
pub struct DeleteNodesQuickFix;

impl QuickFix for DeleteNodesQuickFix {
    fn name(&self) -> &str {
        "Delete Objects"
    }

    fn apply(&self, document: &mut MapDocument, issues: &[Issue]) -> Result<(), MapError> {
        let mut nodes: Vec<Handle<Node>> = issues.iter().map(|issue| issue.node).collect();
        nodes.sort();
        nodes.dedup();
        document.delete_nodes(&nodes)
    }
}

/// Removes the property named by each issue's payload.
pub struct RemovePropertyQuickFix;

impl QuickFix for RemovePropertyQuickFix {
    fn name(&self) -> &str {
        "Remove Property"
    }

    fn apply(&self, document: &mut MapDocument, issues: &[Issue]) -> Result<(), MapError> {
        document.in_transaction("Remove Properties", |document| {
            for issue in issues {
                if let Some(key) = &issue.payload {
                    document.execute(crate::command::Command::new(
                        crate::commands::entity::RemovePropertyCommand::new(issue.node, key),
                    ))?;
                }
            }
            Ok(())
        })
    }
}

/// Rewrites the value of the property named by each issue's payload.
pub struct TransformPropertyValueQuickFix {
    name: String,
    transform: fn(&str) -> String,
}

impl TransformPropertyValueQuickFix {
    pub fn new<S: Into<String>>(name: S, transform: fn(&str) -> String) -> Self {
        Self {
            name: name.into(),
            transform,
        }
    }
}

impl QuickFix for TransformPropertyValueQuickFix {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, document: &mut MapDocument, issues: &[Issue]) -> Result<(), MapError> {
        document.in_transaction("Transform Property Values", |document| {
            for issue in issues {
                let Some(key) = &issue.payload else {
                    continue;
                };
                let Some(value) = entity_property(document.map(), issue.node, key) else {
                    continue;
                };
                let new_value = (self.transform)(&value);
                document.execute(crate::command::Command::new(
                    crate::commands::entity::SetPropertyCommand::new(issue.node, key, &new_value),
                ))?;
            }
            Ok(())
        })
    }
}

pub(crate) fn entity_property(map: &Map, node: Handle<Node>, key: &str) -> Option<String> {
    let node = map.graph.try_node(node)?;
    let entity = if node.is_world() {
        &node.as_world().entity
    } else if node.is_entity() {
        node.as_entity()
    } else {
        return None;
    };
    entity.property(key).map(str::to_owned)
}
