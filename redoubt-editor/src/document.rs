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

//! The map document: the map plus the transactional command engine. Every
//! mutation runs inside a transaction (an implicit one for standalone
//! commands). When the outermost transaction commits, linked-group propagation
//! runs over the touched nodes, empty containers are collapsed, and the whole
//! unit lands on the undo stack as one entry. A failure anywhere reverts the
//! unit completely; no observer ever sees half a command.

use crate::{
    command::{Command, CommandGroup, CommandStack, CommandTrait, ModelContext},
    commands::graph::{DeleteSubtreeCommand, ReplaceLinkedChildrenCommand},
};
use fxhash::FxHashSet;
use redoubt_core::pool::Handle;
use redoubt_model::{
    io::{read_map, write_map, ParserStatus},
    linked,
    map::Map,
    node::{world::World, Node},
    selection::Selection,
    GameConfig, MapError, MapFormat,
};
use std::io::Write;

/// What a committed unit changed, handed back to the embedding application so
/// it can refresh its views without the core holding callbacks.
#[derive(Clone, Debug, Default)]
pub struct CommitEvent {
    /// Touched nodes that are still alive after the commit.
    pub changed_nodes: Vec<Handle<Node>>,
    pub selection_changed: bool,
}

#[derive(Debug)]
struct TransactionFrame {
    name: String,
    commands: Vec<Command>,
    changed: FxHashSet<Handle<Node>>,
    selection_before: Selection,
}

/// See module docs.
pub struct MapDocument {
    map: Map,
    stack: CommandStack,
    transactions: Vec<TransactionFrame>,
    modification_count: i64,
    saved_modification_count: i64,
}

impl MapDocument {
    pub fn new(game: GameConfig, format: MapFormat) -> Self {
        Self::with_map(Map::new(World::new(format), game))
    }

    pub fn with_map(map: Map) -> Self {
        Self {
            map,
            stack: CommandStack::new(),
            transactions: Vec::new(),
            modification_count: 0,
            saved_modification_count: 0,
        }
    }

    /// Parses map text into a fresh document.
    pub fn load(
        text: &str,
        format: MapFormat,
        game: &GameConfig,
    ) -> Result<(Self, ParserStatus), MapError> {
        let (map, status) = read_map(text, format, game)?;
        Ok((Self::with_map(map), status))
    }

    /// Serializes the document and records the clean state.
    pub fn save(&mut self, out: &mut impl Write) -> Result<(), MapError> {
        write_map(&self.map, out)?;
        self.saved_modification_count = self.modification_count;
        Ok(())
    }

    #[inline]
    pub fn map(&self) -> &Map {
        &self.map
    }

    /// Installs (or reloads) the entity definition catalog and re-resolves
    /// every entity's definition pointer, dropping handles that no longer
    /// resolve. Not a command: definitions are a shared resource, not map
    /// state, and reloading them is not undoable.
    pub fn set_entity_definitions(
        &mut self,
        definitions: redoubt_model::definition::EntityDefinitionCatalog,
    ) {
        self.map.definitions = definitions;
        self.map.refresh_entity_definitions();
    }

    /// Read access for tools that must not mutate; mutation goes through
    /// commands only.
    #[inline]
    pub fn selection(&self) -> &Selection {
        &self.map.selection
    }

    pub fn current_layer(&self) -> Handle<Node> {
        self.map.focus.current_layer
    }

    pub fn modification_count(&self) -> i64 {
        self.modification_count
    }

    pub fn is_modified(&self) -> bool {
        self.modification_count != self.saved_modification_count
    }

    pub fn can_undo(&self) -> bool {
        self.stack.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.stack.can_redo()
    }

    pub fn undo_name(&self) -> Option<String> {
        self.stack.undo_name()
    }

    // --- Transactions -----------------------------------------------------

    pub fn begin_transaction<S: Into<String>>(&mut self, name: S) {
        self.transactions.push(TransactionFrame {
            name: name.into(),
            commands: Vec::new(),
            changed: FxHashSet::default(),
            selection_before: self.map.selection.clone(),
        });
    }

    /// Commits the innermost transaction. An inner commit folds into the
    /// enclosing frame; the outermost commit triggers propagation and the
    /// empty-container sweep and pushes the unit onto the undo stack.
    pub fn commit_transaction(&mut self) -> Result<CommitEvent, MapError> {
        let frame = self
            .transactions
            .pop()
            .expect("commit without a transaction");

        if let Some(parent) = self.transactions.last_mut() {
            parent.changed.extend(frame.changed.iter().copied());
            parent.commands.extend(frame.commands);
            return Ok(CommitEvent::default());
        }

        self.finish_unit(frame)
    }

    /// Reverts and discards the innermost transaction.
    pub fn rollback_transaction(&mut self) {
        let mut frame = self
            .transactions
            .pop()
            .expect("rollback without a transaction");
        let mut scratch = FxHashSet::default();
        let mut ctx = ModelContext {
            map: &mut self.map,
            changed: &mut scratch,
        };
        for command in frame.commands.iter_mut().rev() {
            command.revert(&mut ctx);
        }
        for mut command in frame.commands.drain(..) {
            command.finalize(&mut ctx);
        }
    }

    /// Runs `f` inside a transaction, committing on success and rolling back
    /// on error.
    pub fn in_transaction<S: Into<String>>(
        &mut self,
        name: S,
        f: impl FnOnce(&mut Self) -> Result<(), MapError>,
    ) -> Result<(), MapError> {
        self.begin_transaction(name);
        match f(self) {
            Ok(()) => self.commit_transaction().map(|_| ()),
            Err(error) => {
                self.rollback_transaction();
                Err(error)
            }
        }
    }

    // --- Execution --------------------------------------------------------

    /// Executes a command. Inside a transaction the command joins the open
    /// frame; otherwise it forms a unit of its own.
    pub fn execute(&mut self, mut command: Command) -> Result<(), MapError> {
        if let Some(frame) = self.transactions.last_mut() {
            let mut ctx = ModelContext {
                map: &mut self.map,
                changed: &mut frame.changed,
            };
            command.execute(&mut ctx)?;
            frame.commands.push(command);
            return Ok(());
        }

        self.begin_transaction(command.name());
        let result = self.execute(command);
        match result {
            Ok(()) => self.commit_transaction().map(|_| ()),
            Err(error) => {
                self.rollback_transaction();
                Err(error)
            }
        }
    }

    /// Direct graph access for operations that spawn detached clones before
    /// handing them to a command. Attached tree state must only change through
    /// commands.
    pub(crate) fn with_map_graph<R>(
        &mut self,
        f: impl FnOnce(&mut redoubt_model::graph::MapGraph) -> R,
    ) -> R {
        f(&mut self.map.graph)
    }

    /// Executes a typed command and extracts a value from it (typically the
    /// handle of a node it created) before it disappears into the stack.
    pub fn execute_returning<C: CommandTrait, R>(
        &mut self,
        mut command: C,
        extract: impl FnOnce(&C) -> R,
    ) -> Result<R, MapError> {
        if self.transactions.is_empty() {
            self.begin_transaction(command.name());
            let result = self.execute_returning(command, extract);
            return match result {
                Ok(value) => {
                    self.commit_transaction()?;
                    Ok(value)
                }
                Err(error) => {
                    self.rollback_transaction();
                    Err(error)
                }
            };
        }
        let frame = self.transactions.last_mut().expect("frame is open");
        let mut ctx = ModelContext {
            map: &mut self.map,
            changed: &mut frame.changed,
        };
        command.execute(&mut ctx)?;
        let value = extract(&command);
        frame.commands.push(Command::new(command));
        Ok(value)
    }

    /// Finishes an outermost unit: propagation, collapse, undo-stack push.
    fn finish_unit(&mut self, mut frame: TransactionFrame) -> Result<CommitEvent, MapError> {
        if frame.commands.is_empty() {
            return Ok(CommitEvent::default());
        }

        if let Err(error) = self.propagate_linked_groups(&mut frame) {
            self.revert_frame(&mut frame);
            return Err(error);
        }
        self.collapse_empty_containers(&mut frame);

        let selection_changed = frame.selection_before != self.map.selection;
        let changed_nodes: Vec<Handle<Node>> = frame
            .changed
            .iter()
            .copied()
            .filter(|&h| self.map.graph.is_valid_handle(h))
            .collect();

        let single = frame.commands.len() == 1;
        let unit = if single {
            frame.commands.pop().expect("one command")
        } else {
            Command::new(CommandGroup::from(frame.commands).with_custom_name(frame.name))
        };
        let significant = unit.is_significant();

        let mut scratch = FxHashSet::default();
        let mut ctx = ModelContext {
            map: &mut self.map,
            changed: &mut scratch,
        };
        if single {
            self.stack.push_executed_collated(unit, &mut ctx);
        } else {
            self.stack.push_executed(unit, &mut ctx);
        }

        if significant {
            self.modification_count += 1;
        }
        Ok(CommitEvent {
            changed_nodes,
            selection_changed,
        })
    }

    fn revert_frame(&mut self, frame: &mut TransactionFrame) {
        let mut scratch = FxHashSet::default();
        let mut ctx = ModelContext {
            map: &mut self.map,
            changed: &mut scratch,
        };
        for command in frame.commands.iter_mut().rev() {
            command.revert(&mut ctx);
        }
        for mut command in frame.commands.drain(..) {
            command.finalize(&mut ctx);
        }
    }

    /// Propagates every linked family touched by the unit, innermost families
    /// first, exactly once per family. The replacement commands join the unit
    /// so one undo takes the propagation back together with its cause.
    fn propagate_linked_groups(&mut self, frame: &mut TransactionFrame) -> Result<(), MapError> {
        let mut done: FxHashSet<String> = FxHashSet::default();
        let changed: Vec<Handle<Node>> = frame.changed.iter().copied().collect();

        for node in changed {
            let mut current = node;
            while self.map.graph.is_valid_handle(current) {
                if self.map.graph[current].is_group() {
                    let link_id = self.map.graph[current].link_id().to_owned();
                    if !link_id.is_empty() && !done.contains(&link_id) {
                        let members = linked::collect_linked_groups(&self.map.graph, &link_id);
                        if members.len() > 1 {
                            done.insert(link_id);
                            self.propagate_family(frame, current, &members)?;
                        }
                    }
                }
                current = self.map.graph[current].parent();
            }
        }
        Ok(())
    }

    fn propagate_family(
        &mut self,
        frame: &mut TransactionFrame,
        source: Handle<Node>,
        members: &[Handle<Node>],
    ) -> Result<(), MapError> {
        let targets: Vec<Handle<Node>> =
            members.iter().copied().filter(|&m| m != source).collect();
        let world_bounds = self.map.world_bounds();
        let updates = linked::update_linked_groups(
            &mut self.map.graph,
            source,
            &targets,
            &world_bounds,
        )?;

        let mut updates = updates.into_iter();
        while let Some(update) = updates.next() {
            let mut command = Command::new(ReplaceLinkedChildrenCommand::new(
                update.target,
                update.new_children,
            ));
            let mut ctx = ModelContext {
                map: &mut self.map,
                changed: &mut frame.changed,
            };
            if let Err(error) = command.execute(&mut ctx) {
                // Clones of the remaining targets never made it into a
                // command; free them before bailing out.
                for update in updates {
                    for clone in update.new_children {
                        self.map.free_detached_subtree(clone);
                    }
                }
                return Err(error);
            }
            frame.commands.push(command);
        }
        Ok(())
    }

    /// Removes empty groups and childless brush entities until none remain.
    /// The removals join the unit, so undo restores the containers.
    fn collapse_empty_containers(&mut self, frame: &mut TransactionFrame) {
        loop {
            let empty: Vec<Handle<Node>> = self
                .map
                .graph
                .collect_descendants(self.map.graph.root())
                .into_iter()
                .filter(|&handle| {
                    let node = &self.map.graph[handle];
                    let is_empty_group = node.is_group() && node.children().is_empty();
                    let is_empty_brush_entity = node.is_entity()
                        && !node.as_entity().is_point_entity()
                        && node.children().is_empty();
                    is_empty_group || is_empty_brush_entity
                })
                .collect();
            if empty.is_empty() {
                return;
            }
            for handle in empty {
                let mut command = Command::new(DeleteSubtreeCommand::new(handle));
                let mut ctx = ModelContext {
                    map: &mut self.map,
                    changed: &mut frame.changed,
                };
                command
                    .execute(&mut ctx)
                    .expect("removing a subtree cannot fail");
                frame.commands.push(command);
            }
        }
    }

    // --- Undo / redo ------------------------------------------------------

    /// Takes back the most recent unit. Returns false if there is nothing to
    /// undo.
    pub fn undo(&mut self) -> bool {
        assert!(
            self.transactions.is_empty(),
            "cannot undo while a transaction is open"
        );
        let mut scratch = FxHashSet::default();
        let mut ctx = ModelContext {
            map: &mut self.map,
            changed: &mut scratch,
        };
        match self.stack.undo(&mut ctx) {
            Some(significant) => {
                if significant {
                    self.modification_count -= 1;
                }
                true
            }
            None => false,
        }
    }

    /// Replays the most recently undone unit.
    pub fn redo(&mut self) -> Result<bool, MapError> {
        assert!(
            self.transactions.is_empty(),
            "cannot redo while a transaction is open"
        );
        let mut scratch = FxHashSet::default();
        let mut ctx = ModelContext {
            map: &mut self.map,
            changed: &mut scratch,
        };
        match self.stack.redo(&mut ctx) {
            Some(Ok(significant)) => {
                if significant {
                    self.modification_count += 1;
                }
                Ok(true)
            }
            Some(Err(error)) => Err(error),
            None => Ok(false),
        }
    }
}
