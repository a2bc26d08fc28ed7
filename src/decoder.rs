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

//! Syntax tree of decoder specifications.
//!
//! A specification reads as follows:
//!
//! ```text
//! decoder u32 Arm {
//!   category [cond:4; 0b000:3; _:25] or [cond:4; 0b001:3; _:25] {
//!     and = [cond:4; 0b00:2; i:1; 0b0000:4; s:1; rn:4; rd:4; shifter_operand:12]
//!   }
//! }
//! ```

use std::fmt::{Arguments, Display, Formatter, Write};
use derivative::Derivative;
use itertools::Itertools;
use parse_display::Display;
use smallvec::SmallVec;

use crate::lexer::{split_radix, Location};

/// Numeric literals, kept as source text until their values are actually needed.
#[derive(Debug, Display, Clone, Derivative)]
#[derivative(PartialEq, Eq)]
#[display("{text}")]
pub struct Literal {
    /// Source text: decimal, `0b`-prefixed binary, or `0x`-prefixed hexadecimal.
    pub text: String,
    /// Where this literal appears in the source.
    #[derivative(PartialEq = "ignore")]
    pub location: Location,
}

impl Literal {
    /// Value of this literal, or `None` if it does not fit in 128 bits.
    pub fn value(&self) -> Option<u128> {
        let (digits, radix) = split_radix(&self.text);
        u128::from_str_radix(digits, radix).ok()
    }
}

/// Fields in a [`Definition`].
#[derive(Debug, Display, Clone, Eq, PartialEq)]
pub enum BitGroup {
    /// Operand field, with an accessor generated for it.
    #[display("{name}:{size}")]
    Labeled {
        /// Name of the operand.
        name: String,
        /// Width in bits.
        size: Literal,
    },
    /// Fixed bits, must match exactly.
    #[display("{value}:{size}")]
    Literal {
        /// Required bit pattern.
        value: Literal,
        /// Width in bits.
        size: Literal,
    },
    /// Padding, neither constrained nor accessible.
    #[display("_:{size}")]
    Void {
        /// Width in bits.
        size: Literal,
    },
}

impl BitGroup {
    /// Width of this bit group, as written in the source.
    pub fn size(&self) -> &Literal {
        match self {
            BitGroup::Labeled { size, .. }
            | BitGroup::Literal { size, .. }
            | BitGroup::Void { size } => size,
        }
    }
}

/// A bit pattern, most significant [`BitGroup`] first.
#[derive(Debug, Clone, Derivative)]
#[derivative(PartialEq, Eq)]
pub struct Definition {
    /// Bit groups in this definition.
    pub bitgroups: Vec<BitGroup>,
    /// Location of the opening bracket.
    #[derivative(PartialEq = "ignore")]
    pub location: Location,
}

impl Display for Definition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.bitgroups.iter().format("; "))
    }
}

/// An instruction, with its exact encoding and the name of its handler.
#[derive(Debug, Display, Clone, Eq, PartialEq)]
#[display("{name} = {defn}")]
pub struct Instruction {
    /// Name of the handler routine.
    pub name: String,
    /// Encoding of this instruction.
    pub defn: Definition,
}

/// A group of instructions selected by one or more alternative coarse bit patterns.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Category {
    /// Alternative patterns, any of which selects this category. Never empty.
    pub definitions: SmallVec<[Definition; 2]>,
    /// Instructions in this category, in declaration order.
    pub instructions: Vec<Instruction>,
}

pub(crate) fn write_indented<W>(f: &mut W, v: Arguments, buffer: &mut String) -> std::fmt::Result
    where W: Write + ?Sized {
    buffer.clear();
    writeln!(buffer, "{}", v)?;
    for line in buffer.lines() {
        writeln!(f, "  {}", line)?;
    }
    Ok(())
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "category {} {{", self.definitions.iter().format(" or "))?;
        let mut buffer = String::new();
        for instr in &self.instructions {
            write_indented(f, format_args!("{}", instr), &mut buffer)?;
        }
        write!(f, "}}")
    }
}

/// A complete decoder specification.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Decoder {
    /// Type of encoded instruction words, e.g. `u32`.
    pub word_type: String,
    /// Name of this decoder.
    pub name: String,
    /// Categories, in declaration order.
    pub categories: Vec<Category>,
}

impl Decoder {
    /// All instructions, in declaration order.
    pub fn instructions(&self) -> impl Iterator<Item=&Instruction> {
        self.categories.iter().flat_map(|c| c.instructions.iter())
    }

    /// Width of [`Decoder::word_type`] in bits, if it is one of the primitive integer types.
    pub fn word_width(&self) -> Option<u32> {
        let bits = self.word_type.strip_prefix('u')
            .or_else(|| self.word_type.strip_prefix('i'))?;
        match bits.parse::<u32>() {
            Ok(width @ (8 | 16 | 32 | 64 | 128)) => Some(width),
            _ => None,
        }
    }

    /// The unsigned counterpart of [`Decoder::word_type`], if it is a signed primitive integer.
    pub fn unsigned_word_type(&self) -> Option<String> {
        match self.word_type.strip_prefix('i') {
            Some(bits) if self.word_width().is_some() => Some(format!("u{bits}")),
            _ => None,
        }
    }
}

impl Display for Decoder {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "decoder {} {} {{", self.word_type, self.name)?;
        let mut buffer = String::new();
        for category in &self.categories {
            write_indented(f, format_args!("{}", category), &mut buffer)?;
        }
        writeln!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;
    use crate::lexer::Location;
    use crate::parser::read_decoder;
    use crate::samples;
    use super::Literal;

    fn literal(text: &str) -> Literal {
        Literal { text: text.to_string(), location: Location { line: 1, column: 1 } }
    }

    #[test]
    fn test_literal_value() {
        assert_eq!(literal("42").value(), Some(42));
        assert_eq!(literal("0b0110").value(), Some(6));
        assert_eq!(literal("0x1F").value(), Some(31));
        assert_eq!(literal("0").value(), Some(0));
        assert_eq!(literal("340282366920938463463374607431768211456").value(), None);
    }

    #[test]
    fn test_word_width() {
        let width = |ty: &str| {
            let source = format!("decoder {} Test {{\n}}\n", ty);
            read_decoder(&source).unwrap().word_width()
        };
        assert_eq!(width("u16"), Some(16));
        assert_eq!(width("u32"), Some(32));
        assert_eq!(width("i64"), Some(64));
        assert_eq!(width("u24"), None);
        assert_eq!(width("Word"), None);

        let unsigned = |ty: &str| {
            let source = format!("decoder {} Test {{\n}}\n", ty);
            read_decoder(&source).unwrap().unsigned_word_type()
        };
        assert_eq!(unsigned("i32"), Some("u32".to_string()));
        assert_eq!(unsigned("i128"), Some("u128".to_string()));
        assert_eq!(unsigned("u32"), None);
        assert_eq!(unsigned("i24"), None);
    }

    #[test]
    fn test_echo_roundtrip() {
        for input in samples::ALL_SAMPLES {
            let decoder = read_decoder(input).unwrap();
            let printed = decoder.to_string();
            assert_eq!(read_decoder(&printed).unwrap(), decoder);
            assert_eq!(read_decoder(&printed).unwrap().to_string(), printed);
        }
    }

    #[test]
    fn test_echo_format() {
        let decoder = read_decoder(samples::SINGLE_LINE).unwrap();
        assert_eq!(decoder.to_string(), indoc::indoc! {"
            decoder u32 Test {
              category [opc:4; _:28] {
                foo = [0b0001:4; rd:4; _:24]
              }
            }
        "});
        assert_eq!(decoder.instructions().map(|i| i.name.as_str()).collect_vec(), vec!["foo"]);
    }
}
