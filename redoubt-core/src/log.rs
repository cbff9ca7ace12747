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

//! Simple logger. It writes to stdout and broadcasts every message to the
//! registered listeners; an embedding application subscribes a channel and
//! routes messages into its own console.

use lazy_static::lazy_static;
use parking_lot::Mutex;
use std::{
    io::{self, Write},
    sync::mpsc::Sender,
};

lazy_static! {
    static ref LOG: Mutex<Log> = Mutex::new(Log {
        verbosity: MessageKind::Information,
        listeners: Default::default(),
    });
}

/// A message that could be sent by the logger to all listeners.
pub struct LogMessage {
    /// Kind of the message: information, warning or error.
    pub kind: MessageKind,
    /// The source message without logger prefixes.
    pub content: String,
}

/// A kind of message.
#[derive(Copy, Clone, PartialOrd, PartialEq, Eq, Ord, Hash, Debug)]
#[repr(u32)]
pub enum MessageKind {
    /// Some useful information.
    Information = 0,
    /// A warning.
    Warning = 1,
    /// An error of some kind.
    Error = 2,
}

impl MessageKind {
    fn as_str(self) -> &'static str {
        match self {
            MessageKind::Information => "[INFO]: ",
            MessageKind::Warning => "[WARNING]: ",
            MessageKind::Error => "[ERROR]: ",
        }
    }
}

/// See module docs.
pub struct Log {
    verbosity: MessageKind,
    listeners: Vec<Sender<LogMessage>>,
}

impl Log {
    fn writeln_internal<S: AsRef<str>>(&mut self, kind: MessageKind, message: S) {
        if kind as u32 >= self.verbosity as u32 {
            let content = message.as_ref();

            // Notify listeners about the message and remove all disconnected listeners.
            self.listeners.retain(|listener| {
                listener
                    .send(LogMessage {
                        kind,
                        content: content.to_owned(),
                    })
                    .is_ok()
            });

            let mut line = String::with_capacity(content.len() + 16);
            line.push_str(kind.as_str());
            line.push_str(content);
            line.push('\n');
            let _ = io::stdout().write_all(line.as_bytes());
        }
    }

    /// Writes a message of the given kind.
    pub fn writeln<S: AsRef<str>>(kind: MessageKind, msg: S) {
        LOG.lock().writeln_internal(kind, msg);
    }

    pub fn info<S: AsRef<str>>(msg: S) {
        Self::writeln(MessageKind::Information, msg);
    }

    pub fn warn<S: AsRef<str>>(msg: S) {
        Self::writeln(MessageKind::Warning, msg);
    }

    pub fn err<S: AsRef<str>>(msg: S) {
        Self::writeln(MessageKind::Error, msg);
    }

    /// Sets the logger verbosity; messages of lower kinds are dropped.
    pub fn set_verbosity(kind: MessageKind) {
        LOG.lock().verbosity = kind;
    }

    /// Adds a listener that receives every accepted message.
    pub fn add_listener(listener: Sender<LogMessage>) {
        LOG.lock().listeners.push(listener);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::mpsc::channel;

    #[test]
    fn listeners_receive_messages() {
        let (tx, rx) = channel();
        Log::add_listener(tx);
        Log::warn("a warning");
        let received = rx.recv().unwrap();
        assert_eq!(received.kind, MessageKind::Warning);
        assert_eq!(received.content, "a warning");
    }
}
