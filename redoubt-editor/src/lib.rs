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

//! The editor core of Redoubt: the transactional command engine that owns all
//! scene mutation, the concrete editing commands and operations built on it,
//! and the validator pipeline with its quick fixes.
//!
//! The core is single-threaded cooperative: all mutation happens through a
//! [`document::MapDocument`] on one logical thread, and command effects become
//! visible atomically when `execute` returns.

pub mod command;
pub mod commands;
pub mod document;
pub mod operations;
pub mod validator;

pub use command::{Command, CommandTrait};
pub use document::{CommitEvent, MapDocument};
pub use validator::{standard_validators, validate, Issue, IssueType, QuickFix, Validator};
