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

//! Recursive descent parser for decoder specifications.
//!
//! Grammar, with newlines insignificant except at the end of instructions:
//!
//! ```text
//! Decoder     := 'decoder' WORD_TYPE NAME '{' Category* '}'
//! Category    := 'category' Definition ('or' Definition)* '{' Instruction* '}'
//! Instruction := NAME '=' Definition (NEWLINE | <before '}'>)
//! Definition  := '[' BitGroup (';' BitGroup)* ']'
//! BitGroup    := (LABEL | LITERAL | '_') ':' LITERAL
//! ```

use std::iter::Peekable;
use std::slice;
use displaydoc::Display as DisplayDoc;
use parse_display::Display;
use smallvec::SmallVec;
use thiserror::Error;

use crate::decoder::{BitGroup, Category, Decoder, Definition, Instruction, Literal};
use crate::lexer::{tokenize, LexError, Token, TokenKind};

/// What the parser was looking for when it failed.
#[derive(Debug, Display, Copy, Clone, Eq, PartialEq)]
pub enum Expected {
    /// One specific token.
    #[display("{0} `{1}`")]
    Exact(TokenKind, &'static str),
    /// Any token of the given kind.
    #[display("{0}")]
    Kind(TokenKind),
    /// One of two specific tokens.
    #[display("{0} `{1}` or {2} `{3}`")]
    Either(TokenKind, &'static str, TokenKind, &'static str),
    /// Start of a bit group.
    #[display("label, literal or `_`")]
    BitGroup,
    /// End of an instruction declaration.
    #[display("end of line")]
    EndOfLine,
}

/// Parse error for [`Decoder`]s.
#[derive(Debug, DisplayDoc, Error, Clone, Eq, PartialEq)]
pub enum ParseError {
    /// expected {expected}, found {found}
    #[allow(missing_docs)]
    UnexpectedToken { expected: Expected, found: Token },
    /// expected {expected}, found end of input
    #[allow(missing_docs)]
    UnexpectedEnd { expected: Expected },
    /// unexpected {0} after the end of the decoder
    TrailingToken(Token),
}

/// Error reading a [`Decoder`] from source text.
#[derive(Debug, DisplayDoc, Error, Clone, Eq, PartialEq)]
pub enum ReadError {
    /// lexing error: {0}
    Lex(#[from] LexError),
    /// parse error: {0}
    Parse(#[from] ParseError),
}

fn unexpected(expected: Expected, found: &Token) -> ParseError {
    ParseError::UnexpectedToken { expected, found: found.clone() }
}

/// Token stream with a one-token lookahead buffer.
struct Cursor<'a> {
    tokens: Peekable<slice::Iter<'a, Token>>,
}

impl<'a> Cursor<'a> {
    fn skip_newlines(&mut self) {
        while self.tokens.next_if(|t| t.kind == TokenKind::Newline).is_some() {}
    }

    /// Look at the next significant token without consuming it.
    fn peek(&mut self) -> Option<&'a Token> {
        self.skip_newlines();
        self.tokens.peek().copied()
    }

    fn next_token(&mut self, expected: Expected) -> Result<&'a Token, ParseError> {
        self.skip_newlines();
        self.tokens.next().ok_or(ParseError::UnexpectedEnd { expected })
    }

    /// Consume the next significant token if it is exactly the given one.
    fn eat(&mut self, kind: TokenKind, text: &str) -> bool {
        let matched = self.peek().map_or(false, |t| t.is(kind, text));
        if matched { self.tokens.next(); }
        matched
    }

    fn expect(&mut self, kind: TokenKind, text: &'static str) -> Result<&'a Token, ParseError> {
        let expected = Expected::Exact(kind, text);
        let token = self.next_token(expected)?;
        if token.is(kind, text) { Ok(token) } else { Err(unexpected(expected, token)) }
    }

    fn expect_kind(&mut self, kind: TokenKind) -> Result<&'a Token, ParseError> {
        let expected = Expected::Kind(kind);
        let token = self.next_token(expected)?;
        if token.kind == kind { Ok(token) } else { Err(unexpected(expected, token)) }
    }

    fn literal(&mut self) -> Result<Literal, ParseError> {
        let token = self.expect_kind(TokenKind::Literal)?;
        Ok(Literal { text: token.text.clone(), location: token.location })
    }

    fn decoder(&mut self) -> Result<Decoder, ParseError> {
        self.expect(TokenKind::Keyword, "decoder")?;
        let word_type = self.expect_kind(TokenKind::Label)?.text.clone();
        let name = self.expect_kind(TokenKind::Label)?.text.clone();
        self.expect(TokenKind::Bracket, "{")?;
        let mut categories = Vec::new();
        while !self.eat(TokenKind::Bracket, "}") {
            categories.push(self.category()?);
        }
        Ok(Decoder { word_type, name, categories })
    }

    fn category(&mut self) -> Result<Category, ParseError> {
        self.expect(TokenKind::Keyword, "category")?;
        let mut definitions = SmallVec::new();
        loop {
            definitions.push(self.definition()?);
            if !self.eat(TokenKind::Keyword, "or") { break; }
        }
        let expected = Expected::Either(TokenKind::Keyword, "or", TokenKind::Bracket, "{");
        let token = self.next_token(expected)?;
        if !token.is(TokenKind::Bracket, "{") {
            return Err(unexpected(expected, token));
        }
        let mut instructions = Vec::new();
        while !self.eat(TokenKind::Bracket, "}") {
            instructions.push(self.instruction()?);
        }
        Ok(Category { definitions, instructions })
    }

    fn instruction(&mut self) -> Result<Instruction, ParseError> {
        let name = self.expect_kind(TokenKind::Label)?.text.clone();
        self.expect(TokenKind::Separator, "=")?;
        let defn = self.definition()?;
        // newlines are significant here: an instruction ends its line, unless the category closes
        match self.tokens.peek().copied() {
            Some(token) if token.kind == TokenKind::Newline => { self.tokens.next(); }
            Some(token) if token.is(TokenKind::Bracket, "}") => {}
            Some(token) => return Err(unexpected(Expected::EndOfLine, token)),
            None => return Err(ParseError::UnexpectedEnd { expected: Expected::EndOfLine }),
        }
        Ok(Instruction { name, defn })
    }

    fn definition(&mut self) -> Result<Definition, ParseError> {
        let location = self.expect(TokenKind::Bracket, "[")?.location;
        let mut bitgroups = Vec::new();
        loop {
            bitgroups.push(self.bitgroup()?);
            let expected = Expected::Either(TokenKind::Separator, ";", TokenKind::Bracket, "]");
            let token = self.next_token(expected)?;
            if token.is(TokenKind::Bracket, "]") {
                break;
            } else if !token.is(TokenKind::Separator, ";") {
                return Err(unexpected(expected, token));
            }
        }
        Ok(Definition { bitgroups, location })
    }

    fn bitgroup(&mut self) -> Result<BitGroup, ParseError> {
        let head = self.next_token(Expected::BitGroup)?;
        if !matches!(head.kind, TokenKind::Label | TokenKind::Literal | TokenKind::Void) {
            return Err(unexpected(Expected::BitGroup, head));
        }
        self.expect(TokenKind::Separator, ":")?;
        let size = self.literal()?;
        Ok(match head.kind {
            TokenKind::Label => BitGroup::Labeled { name: head.text.clone(), size },
            TokenKind::Literal => BitGroup::Literal {
                value: Literal { text: head.text.clone(), location: head.location },
                size,
            },
            _ => BitGroup::Void { size },
        })
    }
}

/// Parse a token stream (as produced by [`tokenize`]) into a [`Decoder`].
pub fn parse(tokens: &[Token]) -> Result<Decoder, ParseError> {
    let mut cursor = Cursor { tokens: tokens.iter().peekable() };
    let decoder = cursor.decoder()?;
    match cursor.peek() {
        Some(token) => Err(ParseError::TrailingToken(token.clone())),
        None => Ok(decoder),
    }
}

/// Read from source text to a [`Decoder`].
pub fn read_decoder(source: &str) -> Result<Decoder, ReadError> {
    let tokens = tokenize(source)?;
    Ok(parse(&tokens)?)
}
