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

//! The command abstraction. A command mutates the map in `execute`, knows how
//! to take the mutation back in `revert`, and may be asked to merge a
//! follow-up command into itself (collation of consecutive text edits or
//! nudges). `execute` is fallible; a failed command must leave the map
//! untouched, and the engine reverts any executed predecessors of the same
//! unit, so no half-state is ever observable.

use fxhash::FxHashSet;
use redoubt_core::pool::Handle;
use redoubt_model::{node::Node, Map, MapError};
use std::fmt::Debug;
use std::ops::{Deref, DerefMut};

/// Mutable state handed to every command.
pub struct ModelContext<'a> {
    pub map: &'a mut Map,
    /// Nodes touched by the current undoable unit; drives linked-group
    /// propagation and the empty-container sweep after the unit completes.
    pub changed: &'a mut FxHashSet<Handle<Node>>,
}

impl ModelContext<'_> {
    pub fn touch(&mut self, handle: Handle<Node>) {
        self.changed.insert(handle);
    }
}

/// An object that can be executed and reverted by the command stack.
pub trait CommandTrait: std::any::Any + Debug {
    /// The name shown in the undo menu.
    fn name(&self) -> String;

    /// False for purely navigational commands (selection, current layer) that
    /// must not raise the document's dirty state.
    fn is_significant(&self) -> bool {
        true
    }

    /// Performs the mutation. Called both on first execution and on redo.
    fn execute(&mut self, ctx: &mut ModelContext) -> Result<(), MapError>;

    /// Takes the mutation back. Only called after a successful `execute`.
    fn revert(&mut self, ctx: &mut ModelContext);

    /// The command is leaving the stack and will never run again; release
    /// reserved arena records here.
    fn finalize(&mut self, _ctx: &mut ModelContext) {}

    /// Offers a follow-up command for collation. Absorb it and return `Ok`,
    /// or give it back unchanged.
    fn try_merge(&mut self, other: Command) -> Result<(), Command> {
        Err(other)
    }
}

/// An untyped command.
#[derive(Debug)]
pub struct Command(pub Box<dyn CommandTrait>);

impl Command {
    pub fn new<C: CommandTrait>(command: C) -> Self {
        Self(Box::new(command))
    }

    /// Recovers the concrete command type, giving the command back unchanged
    /// on a mismatch. Used by [`CommandTrait::try_merge`] implementations.
    pub fn downcast<C: CommandTrait>(self) -> Result<Box<C>, Command> {
        if (*self.0).type_id() == std::any::TypeId::of::<C>() {
            let boxed: Box<dyn std::any::Any> = self.0;
            Ok(boxed.downcast::<C>().expect("type id was checked"))
        } else {
            Err(self)
        }
    }
}

impl Deref for Command {
    type Target = dyn CommandTrait;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

impl DerefMut for Command {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.0
    }
}

/// A list of commands executed in order and reverted in reverse order as one
/// unit. If a member fails, the executed prefix is reverted before the error
/// propagates.
#[derive(Debug, Default)]
pub struct CommandGroup {
    commands: Vec<Command>,
    custom_name: String,
}

impl From<Vec<Command>> for CommandGroup {
    fn from(commands: Vec<Command>) -> Self {
        Self {
            commands,
            custom_name: Default::default(),
        }
    }
}

impl CommandGroup {
    pub fn push<C: CommandTrait>(&mut self, command: C) {
        self.commands.push(Command::new(command));
    }

    pub fn push_command(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub fn with_custom_name<S: AsRef<str>>(mut self, name: S) -> Self {
        self.custom_name = name.as_ref().to_string();
        self
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }
}

impl CommandTrait for CommandGroup {
    fn name(&self) -> String {
        if self.custom_name.is_empty() {
            let mut name = String::from("Command group: ");
            for command in &self.commands {
                name.push_str(&command.name());
                name.push_str(", ");
            }
            name
        } else {
            self.custom_name.clone()
        }
    }

    fn is_significant(&self) -> bool {
        self.commands.iter().any(|c| c.is_significant())
    }

    fn execute(&mut self, ctx: &mut ModelContext) -> Result<(), MapError> {
        for index in 0..self.commands.len() {
            if let Err(error) = self.commands[index].execute(ctx) {
                // Roll the executed prefix back in reverse order.
                for executed in self.commands[..index].iter_mut().rev() {
                    executed.revert(ctx);
                }
                return Err(error);
            }
        }
        Ok(())
    }

    fn revert(&mut self, ctx: &mut ModelContext) {
        for command in self.commands.iter_mut().rev() {
            command.revert(ctx);
        }
    }

    fn finalize(&mut self, ctx: &mut ModelContext) {
        for mut command in self.commands.drain(..) {
            command.finalize(ctx);
        }
    }
}

/// One entry of the undo or redo stack.
#[derive(Debug)]
pub struct UndoEntry {
    pub command: Command,
}

/// The undo and redo stacks. Execution policy (transactions, propagation, the
/// empty-container sweep) lives in the document; the stack only stores
/// executed units and replays them.
#[derive(Debug, Default)]
pub struct CommandStack {
    undo_stack: Vec<UndoEntry>,
    redo_stack: Vec<UndoEntry>,
}

impl CommandStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes an already-executed unit, dropping the redo stack.
    pub fn push_executed(&mut self, command: Command, ctx: &mut ModelContext) {
        for mut entry in self.redo_stack.drain(..) {
            entry.command.finalize(ctx);
        }
        self.undo_stack.push(UndoEntry { command });
    }

    /// Attempts to collate the unit into the top of the undo stack instead of
    /// pushing it. The redo stack is dropped either way.
    pub fn push_executed_collated(&mut self, command: Command, ctx: &mut ModelContext) {
        for mut entry in self.redo_stack.drain(..) {
            entry.command.finalize(ctx);
        }
        let command = match self.undo_stack.last_mut() {
            Some(top) => match top.command.try_merge(command) {
                Ok(()) => return,
                Err(command) => command,
            },
            None => command,
        };
        self.undo_stack.push(UndoEntry { command });
    }

    /// Reverts the top entry; returns whether it was significant.
    pub fn undo(&mut self, ctx: &mut ModelContext) -> Option<bool> {
        let mut entry = self.undo_stack.pop()?;
        entry.command.revert(ctx);
        let significant = entry.command.is_significant();
        self.redo_stack.push(entry);
        Some(significant)
    }

    /// Re-executes the most recently undone entry.
    pub fn redo(&mut self, ctx: &mut ModelContext) -> Option<Result<bool, MapError>> {
        let mut entry = self.redo_stack.pop()?;
        match entry.command.execute(ctx) {
            Ok(()) => {
                let significant = entry.command.is_significant();
                self.undo_stack.push(entry);
                Some(Ok(significant))
            }
            Err(error) => {
                // Replaying recorded state must not fail; if it does, the
                // entry is dropped rather than left half-applied.
                entry.command.finalize(ctx);
                Some(Err(error))
            }
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_name(&self) -> Option<String> {
        self.undo_stack.last().map(|e| e.command.name())
    }

    pub fn redo_name(&self) -> Option<String> {
        self.redo_stack.last().map(|e| e.command.name())
    }

    pub fn clear(&mut self, ctx: &mut ModelContext) {
        for mut entry in self.undo_stack.drain(..) {
            entry.command.finalize(ctx);
        }
        for mut entry in self.redo_stack.drain(..) {
            entry.command.finalize(ctx);
        }
    }
}
