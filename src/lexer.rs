/*
 * decoder-gen: generate instruction decoders from bit-pattern specifications.
 * Copyright (C) 2021  Ruifeng Xie
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

//! Lexical analysis for decoder specifications.

use std::fmt::{Display, Formatter};
use derivative::Derivative;
use displaydoc::Display as DisplayDoc;
use parse_display::{Display, FromStr};
use thiserror::Error;

/// Kinds of [`Token`]s.
#[derive(Debug, Display, Copy, Clone, Eq, PartialEq, Hash)]
#[display(style = "lowercase")]
pub enum TokenKind {
    /// One of the [`Keyword`]s.
    Keyword,
    /// `=`, `:` or `;`.
    Separator,
    /// `[`, `]`, `{` or `}`.
    Bracket,
    /// The `_` placeholder for padding bits.
    Void,
    /// Numeric literal: decimal, `0b`-prefixed binary, or `0x`-prefixed hexadecimal.
    Literal,
    /// Identifiers.
    Label,
    /// End of a source line.
    Newline,
}

/// Reserved words.
#[derive(Debug, Display, FromStr, Copy, Clone, Eq, PartialEq)]
#[display(style = "lowercase")]
#[allow(missing_docs)]
pub enum Keyword {
    Decoder,
    Category,
    Or,
}

/// Position of a token in the source text, both 1-based. Columns count characters, not bytes.
#[derive(Debug, Display, Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash)]
#[display("L{line}:{column}")]
pub struct Location {
    /// Line number.
    pub line: usize,
    /// Column number.
    pub column: usize,
}

/// Tokens. Two tokens compare equal if they have the same kind and text, wherever they are.
#[derive(Debug, Clone, Derivative)]
#[derivative(PartialEq, Eq)]
pub struct Token {
    /// Kind of this token.
    pub kind: TokenKind,
    /// Source text of this token, empty for [`TokenKind::Newline`].
    pub text: String,
    /// Where this token starts.
    #[derivative(PartialEq = "ignore")]
    pub location: Location,
}

impl Token {
    /// Whether or not this token has the given kind and text.
    pub fn is(&self, kind: TokenKind, text: &str) -> bool {
        self.kind == kind && self.text == text
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            TokenKind::Newline => write!(f, "end of line at {}", self.location),
            kind => write!(f, "{} `{}` at {}", kind, self.text, self.location),
        }
    }
}

/// unexpected `{text}` at {location}
#[derive(Debug, DisplayDoc, Error, Clone, Eq, PartialEq)]
pub struct LexError {
    /// The offending source text.
    pub text: String,
    /// Where the offending text starts.
    pub location: Location,
}

/// Split a numeric literal into its digits and radix.
pub(crate) fn split_radix(text: &str) -> (&str, u32) {
    if let Some(digits) = text.strip_prefix("0b") {
        (digits, 2)
    } else if let Some(digits) = text.strip_prefix("0x") {
        (digits, 16)
    } else {
        (text, 10)
    }
}

fn is_numeric_literal(text: &str) -> bool {
    let (digits, radix) = split_radix(text);
    !digits.is_empty() && digits.chars().all(|c| c.is_digit(radix))
}

fn is_word_char(c: char) -> bool { c.is_ascii_alphanumeric() || c == '_' }

struct LineScanner<'a> {
    chars: &'a [char],
    line: usize,
    pos: usize,
}

impl<'a> LineScanner<'a> {
    fn location(&self, pos: usize) -> Location {
        Location { line: self.line, column: pos + 1 }
    }
    fn text_from(&self, start: usize) -> String {
        self.chars[start..self.pos].iter().collect()
    }
    fn eat_while(&mut self, p: impl Fn(char) -> bool) {
        while self.chars.get(self.pos).map_or(false, |&c| p(c)) {
            self.pos += 1;
        }
    }
    fn error(&self, start: usize) -> LexError {
        LexError { text: self.text_from(start), location: self.location(start) }
    }

    /// Produce the next token on this line, or `None` if the rest of the line is blank.
    fn next_token(&mut self) -> Result<Option<Token>, LexError> {
        loop {
            let start = self.pos;
            let c = match self.chars.get(start) {
                Some(&c) => c,
                None => return Ok(None),
            };
            let kind = match c {
                ' ' | '\t' | '\r' => {
                    self.pos += 1;
                    continue;
                }
                '/' if self.chars.get(start + 1) == Some(&'/') => return Ok(None),
                '=' | ':' | ';' => {
                    self.pos += 1;
                    TokenKind::Separator
                }
                '[' | ']' | '{' | '}' => {
                    self.pos += 1;
                    TokenKind::Bracket
                }
                c if c.is_ascii_digit() => {
                    self.eat_while(is_word_char);
                    if !is_numeric_literal(&self.text_from(start)) {
                        return Err(self.error(start));
                    }
                    TokenKind::Literal
                }
                c if is_word_char(c) => {
                    self.eat_while(is_word_char);
                    let text = self.text_from(start);
                    if text == "_" {
                        TokenKind::Void
                    } else if text.parse::<Keyword>().is_ok() {
                        TokenKind::Keyword
                    } else {
                        TokenKind::Label
                    }
                }
                _ => {
                    self.eat_while(|c| !c.is_whitespace());
                    return Err(self.error(start));
                }
            };
            return Ok(Some(Token { kind, text: self.text_from(start), location: self.location(start) }));
        }
    }
}

/// Split the source text into [`Token`]s. Every line, including the last one, is terminated by a
/// [`TokenKind::Newline`] token.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    let mut tokens = Vec::new();
    for (line, text) in (1..).zip(source.lines()) {
        let chars = text.chars().collect::<Vec<_>>();
        let mut scanner = LineScanner { chars: &chars, line, pos: 0 };
        while let Some(token) = scanner.next_token()? {
            tokens.push(token);
        }
        tokens.push(Token {
            kind: TokenKind::Newline,
            text: String::new(),
            location: Location { line, column: chars.len() + 1 },
        });
    }
    Ok(tokens)
}

/// Print the tokens back as source text, one source line per [`TokenKind::Newline`].
pub fn display_tokens(tokens: &[Token]) -> String {
    let mut result = String::new();
    let mut line_start = true;
    for token in tokens {
        if token.kind == TokenKind::Newline {
            result.push('\n');
            line_start = true;
        } else {
            if !line_start { result.push(' '); }
            result.push_str(&token.text);
            line_start = false;
        }
    }
    result
}
