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

//! All possible errors that can happen in the editor core.

use std::fmt::{Display, Formatter};

/// A location in the source map text, 1-based.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl Display for SourceLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// See module docs.
#[derive(Debug, Clone, PartialEq)]
pub enum MapError {
    /// Malformed map text; the location is captured where known.
    Parse {
        message: String,
        location: Option<SourceLocation>,
    },
    /// A command would violate a containment invariant (for example, reparent a
    /// layer under a group).
    Structural(String),
    /// A brush became invalid after a transform, or a patch grid is malformed.
    Geometry(String),
    /// A node would end up outside the world bounds.
    WorldBounds(String),
    /// Linked-group congruence is broken and a target cannot be updated. The
    /// message names the offending target.
    LinkedGroup(String),
    /// Bubbled up from the filesystem collaborator.
    FileSystem(String),
}

impl MapError {
    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse {
            message: message.into(),
            location: None,
        }
    }

    pub fn parse_at<S: Into<String>>(message: S, location: SourceLocation) -> Self {
        Self::Parse {
            message: message.into(),
            location: Some(location),
        }
    }
}

impl Display for MapError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MapError::Parse { message, location } => match location {
                Some(location) => write!(f, "Parse error at {location}: {message}"),
                None => write!(f, "Parse error: {message}"),
            },
            MapError::Structural(v) => write!(f, "Structural error: {v}"),
            MapError::Geometry(v) => write!(f, "Geometry error: {v}"),
            MapError::WorldBounds(v) => write!(f, "World bounds error: {v}"),
            MapError::LinkedGroup(v) => write!(f, "Linked group error: {v}"),
            MapError::FileSystem(v) => write!(f, "File system error: {v}"),
        }
    }
}

impl std::error::Error for MapError {}

impl From<std::io::Error> for MapError {
    fn from(e: std::io::Error) -> Self {
        Self::FileSystem(e.to_string())
    }
}
