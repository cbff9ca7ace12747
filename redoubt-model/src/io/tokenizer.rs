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

//! Tokenizer for the id-tech `.map` dialects. Comments run to end of line;
//! quoted strings keep their backslashes verbatim (the dialect never processes
//! escape sequences), and a `\"` inside a quoted string is treated as an
//! escaped quote only when another quote follows on the same line, matching
//! how maps with unescaped Windows paths survive in the wild.

use crate::error::SourceLocation;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    OBrace,
    CBrace,
    OParen,
    CParen,
    OBracket,
    CBracket,
    /// A quoted string, quotes stripped, content verbatim.
    Quoted(String),
    /// A bare word: numbers, material names, keywords.
    Word(String),
}

impl Token {
    pub fn describe(&self) -> String {
        match self {
            Token::OBrace => "'{'".to_owned(),
            Token::CBrace => "'}'".to_owned(),
            Token::OParen => "'('".to_owned(),
            Token::CParen => "')'".to_owned(),
            Token::OBracket => "'['".to_owned(),
            Token::CBracket => "']'".to_owned(),
            Token::Quoted(text) => format!("\"{text}\""),
            Token::Word(text) => format!("'{text}'"),
        }
    }
}

pub struct Tokenizer<'a> {
    bytes: &'a [u8],
    position: usize,
    line: usize,
    column: usize,
    peeked: Option<Option<(Token, SourceLocation)>>,
}

impl<'a> Tokenizer<'a> {
    pub fn new(text: &'a str) -> Self {
        Self::with_start_line(text, 1)
    }

    /// A tokenizer over a slice of a larger file, reporting line numbers
    /// relative to that file.
    pub fn with_start_line(text: &'a str, first_line: usize) -> Self {
        Self {
            bytes: text.as_bytes(),
            position: 0,
            line: first_line,
            column: 1,
            peeked: None,
        }
    }

    /// Byte position after the most recently consumed token. Unreliable while
    /// a token is peeked.
    pub fn byte_offset(&self) -> usize {
        self.position
    }

    /// Line of the token most recently returned, 1-based.
    pub fn location(&self) -> SourceLocation {
        SourceLocation {
            line: self.line,
            column: self.column,
        }
    }

    fn advance(&mut self) -> Option<u8> {
        let byte = *self.bytes.get(self.position)?;
        self.position += 1;
        if byte == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(byte)
    }

    fn peek_byte(&self) -> Option<u8> {
        self.bytes.get(self.position).copied()
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek_byte() {
                Some(b) if b.is_ascii_whitespace() => {
                    self.advance();
                }
                Some(b'/') if self.bytes.get(self.position + 1) == Some(&b'/') => {
                    while let Some(b) = self.peek_byte() {
                        if b == b'\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => return,
            }
        }
    }

    /// True if another quote occurs on the current line starting at `from`.
    fn quote_follows_on_line(&self, from: usize) -> bool {
        self.bytes[from..]
            .iter()
            .take_while(|&&b| b != b'\n')
            .any(|&b| b == b'"')
    }

    fn read_quoted(&mut self) -> Token {
        let mut buffer = Vec::new();
        while let Some(byte) = self.peek_byte() {
            match byte {
                b'"' => {
                    self.advance();
                    break;
                }
                b'\\' if self.bytes.get(self.position + 1) == Some(&b'"') => {
                    // Keep the backslash; swallow the quote only if the string
                    // still has a terminator on this line.
                    if self.quote_follows_on_line(self.position + 2) {
                        buffer.push(b'\\');
                        buffer.push(b'"');
                        self.advance();
                        self.advance();
                    } else {
                        buffer.push(b'\\');
                        self.advance();
                    }
                }
                b'\n' => break,
                _ => {
                    self.advance();
                    buffer.push(byte);
                }
            }
        }
        Token::Quoted(String::from_utf8_lossy(&buffer).into_owned())
    }

    fn read_word(&mut self, first: u8) -> Token {
        let mut buffer = vec![first];
        while let Some(byte) = self.peek_byte() {
            if byte.is_ascii_whitespace() || matches!(byte, b'(' | b')' | b'{' | b'}' | b'[' | b']' | b'"')
            {
                break;
            }
            self.advance();
            buffer.push(byte);
        }
        Token::Word(String::from_utf8_lossy(&buffer).into_owned())
    }

    pub fn next_token(&mut self) -> Option<(Token, SourceLocation)> {
        if let Some(peeked) = self.peeked.take() {
            return peeked;
        }
        self.next_token_uncached()
    }

    fn next_token_uncached(&mut self) -> Option<(Token, SourceLocation)> {
        self.skip_whitespace_and_comments();
        let location = self.location();
        let byte = self.advance()?;
        let token = match byte {
            b'{' => Token::OBrace,
            b'}' => Token::CBrace,
            b'(' => Token::OParen,
            b')' => Token::CParen,
            b'[' => Token::OBracket,
            b']' => Token::CBracket,
            b'"' => self.read_quoted(),
            other => self.read_word(other),
        };
        Some((token, location))
    }

    /// Returns a copy of the next token without consuming it.
    pub fn peek(&mut self) -> Option<(Token, SourceLocation)> {
        if self.peeked.is_none() {
            let token = self.next_token_uncached();
            self.peeked = Some(token);
        }
        self.peeked.clone().flatten()
    }

    /// Reads a material name. Unquoted names end at whitespace and may begin
    /// with `{` (transparent decal materials); quoted names process `\\` and
    /// `\"` escapes.
    pub fn next_material(&mut self) -> Option<(String, SourceLocation)> {
        // A pending peek would bypass material mode.
        if let Some(peeked) = self.peeked.take() {
            return match peeked {
                Some((Token::Quoted(text), location)) => Some((unescape(&text), location)),
                Some((Token::Word(text), location)) => Some((text, location)),
                Some((Token::OBrace, location)) => {
                    let rest = match self.read_word(b'{') {
                        Token::Word(text) => text,
                        _ => unreachable!(),
                    };
                    Some((rest, location))
                }
                _ => None,
            };
        }

        self.skip_whitespace_and_comments();
        let location = self.location();
        let byte = self.advance()?;
        match byte {
            b'"' => {
                let Token::Quoted(text) = self.read_quoted() else {
                    unreachable!()
                };
                Some((unescape(&text), location))
            }
            other => {
                // A leading '{' is part of the name.
                let Token::Word(text) = self.read_word(other) else {
                    unreachable!()
                };
                Some((text, location))
            }
        }
    }
}

/// Processes `\\` and `\"` escapes of quoted material names.
fn unescape(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('\\') => result.push('\\'),
                Some('"') => result.push('"'),
                Some(other) => {
                    result.push('\\');
                    result.push(other);
                }
                None => result.push('\\'),
            }
        } else {
            result.push(c);
        }
    }
    result
}

#[cfg(test)]
mod test {
    use super::*;

    fn tokens(text: &str) -> Vec<Token> {
        let mut tokenizer = Tokenizer::new(text);
        let mut result = Vec::new();
        while let Some((token, _)) = tokenizer.next_token() {
            result.push(token);
        }
        result
    }

    #[test]
    fn braces_and_words() {
        assert_eq!(
            tokens("{ ( 1 -2.5 3 ) }"),
            vec![
                Token::OBrace,
                Token::OParen,
                Token::Word("1".to_owned()),
                Token::Word("-2.5".to_owned()),
                Token::Word("3".to_owned()),
                Token::CParen,
                Token::CBrace,
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            tokens("// Game: Quake\n{ } // trailing\n"),
            vec![Token::OBrace, Token::CBrace]
        );
    }

    #[test]
    fn quoted_strings_keep_backslashes() {
        assert_eq!(
            tokens(r#""message" "yay \"Mr. Robot!\"""#),
            vec![
                Token::Quoted("message".to_owned()),
                Token::Quoted(r#"yay \"Mr. Robot!\""#.to_owned()),
            ]
        );
    }

    #[test]
    fn trailing_backslash_terminates() {
        // No further quote on the line: the final quote is the terminator and
        // the backslash stays in the value.
        assert_eq!(
            tokens(concat!(r#""path" "c:\a\b\c\""#, "\n")),
            vec![
                Token::Quoted("path".to_owned()),
                Token::Quoted(r"c:\a\b\c\".to_owned()),
            ]
        );
        assert_eq!(
            tokens(concat!(r#""message" "test\\""#, "\n")),
            vec![
                Token::Quoted("message".to_owned()),
                Token::Quoted(r"test\\".to_owned()),
            ]
        );
    }

    #[test]
    fn newline_escape_is_preserved() {
        assert_eq!(
            tokens(r#""message" "line1\nline2""#),
            vec![
                Token::Quoted("message".to_owned()),
                Token::Quoted(r"line1\nline2".to_owned()),
            ]
        );
    }

    #[test]
    fn material_names() {
        let mut tokenizer = Tokenizer::new("{decal1 rest");
        let (material, _) = tokenizer.next_material().unwrap();
        assert_eq!(material, "{decal1");
        let (rest, _) = tokenizer.next_material().unwrap();
        assert_eq!(rest, "rest");

        let mut tokenizer = Tokenizer::new(r#""some \"material\" name""#);
        let (material, _) = tokenizer.next_material().unwrap();
        assert_eq!(material, r#"some "material" name"#);
    }

    #[test]
    fn token_positions() {
        let mut tokenizer = Tokenizer::new("{\n\"a\" \"b\"\n}");
        let (_, l1) = tokenizer.next_token().unwrap();
        assert_eq!(l1.line, 1);
        let (_, l2) = tokenizer.next_token().unwrap();
        assert_eq!(l2.line, 2);
        let (_, _) = tokenizer.next_token().unwrap();
        let (_, l4) = tokenizer.next_token().unwrap();
        assert_eq!(l4.line, 3);
    }
}
