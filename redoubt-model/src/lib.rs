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

//! The scene model of the Redoubt level editor: the node tree and its arena
//! graph, brush and patch geometry, the string index, the entity link graph,
//! selection and visibility state, the transformation core, the linked-group
//! engine, and the `.map` reader and writer.
//!
//! Everything here is passive data and pure operations on it; the undoable
//! mutation layer lives in `redoubt-editor`.

pub mod brush;
pub mod definition;
pub mod error;
pub mod format;
pub mod graph;
pub mod index;
pub mod io;
pub mod linked;
pub mod links;
pub mod map;
pub mod node;
pub mod patch;
pub mod selection;
pub mod transform;

pub use error::MapError;
pub use format::{GameConfig, MapFormat};
pub use map::Map;
