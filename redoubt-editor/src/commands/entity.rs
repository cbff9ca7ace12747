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

//! Entity property commands. All of them go through [`Map::update_entity`] so
//! the string index and the link graph follow every change.

use crate::command::{Command, CommandTrait, ModelContext};
use redoubt_core::pool::Handle;
use redoubt_model::{node::Node, MapError};

/// Sets or updates one property; consecutive edits of the same key on the
/// same entity collate into one undo entry.
#[derive(Debug)]
pub struct SetPropertyCommand {
    node: Handle<Node>,
    key: String,
    /// The incoming value before execution, the displaced value after; the
    /// swap makes execute and revert symmetric.
    value: Option<String>,
    cached_name: String,
}

impl SetPropertyCommand {
    pub fn new(node: Handle<Node>, key: &str, value: &str) -> Self {
        Self {
            node,
            key: key.to_owned(),
            value: Some(value.to_owned()),
            cached_name: format!("Set Property \"{key}\""),
        }
    }

    fn swap(&mut self, ctx: &mut ModelContext) {
        let value = self.value.take();
        let node = self.node;
        let key = &self.key;
        self.value = ctx.map.update_entity(node, |entity| match value {
            Some(value) => entity.set_property(key.clone(), value),
            None => entity.remove_property(key),
        });
        ctx.touch(self.node);
    }
}

impl CommandTrait for SetPropertyCommand {
    fn name(&self) -> String {
        self.cached_name.clone()
    }

    fn execute(&mut self, ctx: &mut ModelContext) -> Result<(), MapError> {
        self.swap(ctx);
        Ok(())
    }

    fn revert(&mut self, ctx: &mut ModelContext) {
        self.swap(ctx);
    }

    fn try_merge(&mut self, other: Command) -> Result<(), Command> {
        let incoming = other.downcast::<SetPropertyCommand>()?;
        if incoming.node == self.node && incoming.key == self.key {
            // The incoming edit has already executed and the swap is
            // symmetric, so keeping our displaced original is all the merge
            // needs; the intermediate value is simply dropped.
            Ok(())
        } else {
            Err(Command(incoming))
        }
    }
}

/// Removes one property, remembering the displaced value for undo.
#[derive(Debug)]
pub struct RemovePropertyCommand {
    node: Handle<Node>,
    key: String,
    old_value: Option<String>,
    cached_name: String,
}

impl RemovePropertyCommand {
    pub fn new(node: Handle<Node>, key: &str) -> Self {
        Self {
            node,
            key: key.to_owned(),
            old_value: None,
            cached_name: format!("Remove Property \"{key}\""),
        }
    }
}

impl CommandTrait for RemovePropertyCommand {
    fn name(&self) -> String {
        self.cached_name.clone()
    }

    fn execute(&mut self, ctx: &mut ModelContext) -> Result<(), MapError> {
        let key = self.key.clone();
        self.old_value = ctx
            .map
            .update_entity(self.node, |entity| entity.remove_property(&key));
        ctx.touch(self.node);
        Ok(())
    }

    fn revert(&mut self, ctx: &mut ModelContext) {
        if let Some(value) = self.old_value.take() {
            let key = self.key.clone();
            ctx.map.update_entity(self.node, |entity| {
                entity.set_property(key, value);
            });
        }
        ctx.touch(self.node);
    }
}

/// Renames a property key in place. Fails if the new key is already taken.
#[derive(Debug)]
pub struct RenamePropertyCommand {
    node: Handle<Node>,
    old_key: String,
    new_key: String,
}

impl RenamePropertyCommand {
    pub fn new(node: Handle<Node>, old_key: &str, new_key: &str) -> Self {
        Self {
            node,
            old_key: old_key.to_owned(),
            new_key: new_key.to_owned(),
        }
    }
}

impl CommandTrait for RenamePropertyCommand {
    fn name(&self) -> String {
        format!("Rename Property \"{}\"", self.old_key)
    }

    fn execute(&mut self, ctx: &mut ModelContext) -> Result<(), MapError> {
        let (old_key, new_key) = (self.old_key.clone(), self.new_key.clone());
        let renamed = ctx
            .map
            .update_entity(self.node, |entity| entity.rename_property(&old_key, &new_key));
        if !renamed {
            return Err(MapError::Structural(format!(
                "cannot rename \"{}\" to \"{}\": the key is taken",
                self.old_key, self.new_key
            )));
        }
        ctx.touch(self.node);
        Ok(())
    }

    fn revert(&mut self, ctx: &mut ModelContext) {
        let (old_key, new_key) = (self.old_key.clone(), self.new_key.clone());
        ctx.map
            .update_entity(self.node, |entity| entity.rename_property(&new_key, &old_key));
        ctx.touch(self.node);
    }
}

/// Replaces the protected-property key list of an entity.
#[derive(Debug)]
pub struct SetProtectedPropertiesCommand {
    node: Handle<Node>,
    keys: Vec<String>,
}

impl SetProtectedPropertiesCommand {
    pub fn new(node: Handle<Node>, keys: Vec<String>) -> Self {
        Self { node, keys }
    }

    fn swap(&mut self, ctx: &mut ModelContext) {
        let keys = std::mem::take(&mut self.keys);
        self.keys = ctx
            .map
            .update_entity(self.node, |entity| entity.set_protected_properties(keys));
        ctx.touch(self.node);
    }
}

impl CommandTrait for SetProtectedPropertiesCommand {
    fn name(&self) -> String {
        "Set Protected Properties".to_owned()
    }

    fn execute(&mut self, ctx: &mut ModelContext) -> Result<(), MapError> {
        self.swap(ctx);
        Ok(())
    }

    fn revert(&mut self, ctx: &mut ModelContext) {
        self.swap(ctx);
    }
}
