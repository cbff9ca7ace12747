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

//! Visibility and lock commands. Hiding a container re-homes descendants with
//! an explicit Shown state to Inherited, so that re-showing the container
//! later takes effect for them too; the document wraps these commands in a
//! transaction that also deselects the affected subtree.

use crate::command::{CommandTrait, ModelContext};
use redoubt_core::pool::Handle;
use redoubt_model::{
    node::{LockState, Node, Visibility},
    MapError,
};

#[derive(Debug)]
pub struct SetVisibilityCommand {
    nodes: Vec<Handle<Node>>,
    visibility: Visibility,
    old_states: Vec<(Handle<Node>, Visibility)>,
}

impl SetVisibilityCommand {
    pub fn new(nodes: Vec<Handle<Node>>, visibility: Visibility) -> Self {
        Self {
            nodes,
            visibility,
            old_states: Vec::new(),
        }
    }
}

impl CommandTrait for SetVisibilityCommand {
    fn name(&self) -> String {
        match self.visibility {
            Visibility::Hidden => "Hide Objects".to_owned(),
            Visibility::Shown => "Show Objects".to_owned(),
            Visibility::Inherited => "Reset Visibility".to_owned(),
        }
    }

    fn execute(&mut self, ctx: &mut ModelContext) -> Result<(), MapError> {
        self.old_states.clear();
        for &node in &self.nodes {
            let old = ctx.map.graph[node].set_visibility(self.visibility);
            self.old_states.push((node, old));
            if self.visibility == Visibility::Hidden {
                // Descendants that were explicitly shown fall back to
                // inheriting, so the hide actually covers them.
                for descendant in ctx.map.graph.collect_descendants(node) {
                    if ctx.map.graph[descendant].visibility() == Visibility::Shown {
                        let old = ctx.map.graph[descendant].set_visibility(Visibility::Inherited);
                        self.old_states.push((descendant, old));
                    }
                }
            }
            ctx.touch(node);
        }
        Ok(())
    }

    fn revert(&mut self, ctx: &mut ModelContext) {
        for (node, old) in self.old_states.drain(..).rev() {
            ctx.map.graph[node].set_visibility(old);
            ctx.touch(node);
        }
    }
}

#[derive(Debug)]
pub struct SetLockStateCommand {
    nodes: Vec<Handle<Node>>,
    lock_state: LockState,
    old_states: Vec<(Handle<Node>, LockState)>,
}

impl SetLockStateCommand {
    pub fn new(nodes: Vec<Handle<Node>>, lock_state: LockState) -> Self {
        Self {
            nodes,
            lock_state,
            old_states: Vec::new(),
        }
    }
}

impl CommandTrait for SetLockStateCommand {
    fn name(&self) -> String {
        match self.lock_state {
            LockState::Locked => "Lock Objects".to_owned(),
            LockState::Unlocked => "Unlock Objects".to_owned(),
            LockState::Inherited => "Reset Lock State".to_owned(),
        }
    }

    fn execute(&mut self, ctx: &mut ModelContext) -> Result<(), MapError> {
        self.old_states.clear();
        for &node in &self.nodes {
            let old = ctx.map.graph[node].set_lock_state(self.lock_state);
            self.old_states.push((node, old));
            ctx.touch(node);
        }
        Ok(())
    }

    fn revert(&mut self, ctx: &mut ModelContext) {
        for (node, old) in self.old_states.drain(..).rev() {
            ctx.map.graph[node].set_lock_state(old);
            ctx.touch(node);
        }
    }
}
