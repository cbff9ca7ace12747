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

//! Selection and focus commands. They are undoable but insignificant: they do
//! not raise the document's dirty state.

use crate::command::{CommandTrait, ModelContext};
use redoubt_core::pool::Handle;
use redoubt_model::{node::Node, selection::Selection, MapError};

/// Replaces the selection wholesale; the swap idiom makes undo symmetric.
#[derive(Debug)]
pub struct ChangeSelectionCommand {
    selection: Selection,
}

impl ChangeSelectionCommand {
    pub fn new(selection: Selection) -> Self {
        Self { selection }
    }

    fn swap(&mut self, ctx: &mut ModelContext) {
        let selection = std::mem::take(&mut self.selection);
        self.selection = ctx.map.set_selection(selection);
    }
}

impl CommandTrait for ChangeSelectionCommand {
    fn name(&self) -> String {
        "Change Selection".to_owned()
    }

    fn is_significant(&self) -> bool {
        false
    }

    fn execute(&mut self, ctx: &mut ModelContext) -> Result<(), MapError> {
        self.swap(ctx);
        Ok(())
    }

    fn revert(&mut self, ctx: &mut ModelContext) {
        self.swap(ctx);
    }
}

/// Switches the current layer.
#[derive(Debug)]
pub struct SetCurrentLayerCommand {
    layer: Handle<Node>,
}

impl SetCurrentLayerCommand {
    pub fn new(layer: Handle<Node>) -> Self {
        Self { layer }
    }

    fn swap(&mut self, ctx: &mut ModelContext) {
        self.layer = std::mem::replace(&mut ctx.map.focus.current_layer, self.layer);
    }
}

impl CommandTrait for SetCurrentLayerCommand {
    fn name(&self) -> String {
        "Set Current Layer".to_owned()
    }

    fn is_significant(&self) -> bool {
        false
    }

    fn execute(&mut self, ctx: &mut ModelContext) -> Result<(), MapError> {
        if !ctx.map.graph.is_valid_handle(self.layer) || !ctx.map.graph[self.layer].is_layer() {
            return Err(MapError::Structural(
                "the current layer must be a layer node".to_owned(),
            ));
        }
        self.swap(ctx);
        Ok(())
    }

    fn revert(&mut self, ctx: &mut ModelContext) {
        self.swap(ctx);
    }
}

/// Descends into a group for granular editing.
#[derive(Debug)]
pub struct OpenGroupCommand {
    group: Handle<Node>,
}

impl OpenGroupCommand {
    pub fn new(group: Handle<Node>) -> Self {
        Self { group }
    }
}

impl CommandTrait for OpenGroupCommand {
    fn name(&self) -> String {
        "Open Group".to_owned()
    }

    fn is_significant(&self) -> bool {
        false
    }

    fn execute(&mut self, ctx: &mut ModelContext) -> Result<(), MapError> {
        if !ctx.map.graph.is_valid_handle(self.group) || !ctx.map.graph[self.group].is_group() {
            return Err(MapError::Structural("only groups can be opened".to_owned()));
        }
        ctx.map.focus.open_groups.push(self.group);
        Ok(())
    }

    fn revert(&mut self, ctx: &mut ModelContext) {
        ctx.map.focus.open_groups.pop();
    }
}

/// Pops the innermost open group.
#[derive(Debug)]
pub struct CloseGroupCommand {
    group: Handle<Node>,
}

impl CloseGroupCommand {
    pub fn new() -> Self {
        Self {
            group: Handle::NONE,
        }
    }
}

impl Default for CloseGroupCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandTrait for CloseGroupCommand {
    fn name(&self) -> String {
        "Close Group".to_owned()
    }

    fn is_significant(&self) -> bool {
        false
    }

    fn execute(&mut self, ctx: &mut ModelContext) -> Result<(), MapError> {
        self.group = ctx
            .map
            .focus
            .open_groups
            .pop()
            .ok_or_else(|| MapError::Structural("no group is open".to_owned()))?;
        Ok(())
    }

    fn revert(&mut self, ctx: &mut ModelContext) {
        ctx.map.focus.open_groups.push(self.group);
    }
}
