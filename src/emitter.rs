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

//! Emission of decoder source code.
//!
//! The generated code consists of a dispatch function `decode`, mapping an encoded word to the
//! handler of the first matching instruction, followed by one accessor block per instruction.

use std::fmt::{Display, Formatter};
use displaydoc::Display as DisplayDoc;
use parse_display::{Display, FromStr};
use smallvec::SmallVec;
use thiserror::Error;

use crate::constraint::{bit_size, ones, Constraint, ConstraintError, MAX_WIDTH};
use crate::decoder::{write_indented, BitGroup, Decoder, Definition};
use crate::lexer::Location;

/// Supported forms of accessor blocks.
#[derive(Debug, Display, FromStr, Copy, Clone, Eq, PartialEq)]
#[display(style = "lowercase")]
pub enum AccessorStyle {
    /// Invocations of a `bitfield!` macro supplied by the consumer of the generated code.
    Bitfield,
    /// Self-contained newtype structs with one getter per field.
    Struct,
}

/// Options for code generation.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Options {
    /// Module providing the handler routines, empty if they are in scope already.
    pub handler_module: String,
    /// The uniform function pointer type all handlers are coerced to.
    pub handler_type: String,
    /// Handler returned for words no instruction matches.
    pub undefined_handler: String,
    /// Form of the accessor blocks.
    pub accessor_style: AccessorStyle,
    /// Whether or not every definition must cover the whole instruction word.
    pub check_widths: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            handler_module: "interpreter".to_string(),
            handler_type: "InstFn".to_string(),
            undefined_handler: "undef".to_string(),
            accessor_style: AccessorStyle::Bitfield,
            check_widths: true,
        }
    }
}

/// Definitions not covering exactly the instruction word.
#[derive(Debug, DisplayDoc, Error, Clone, Eq, PartialEq)]
pub enum WidthError {
    /// definition at {location} covers {actual} bits, but `{word_type}` has {expected} bits
    #[allow(missing_docs)]
    Mismatch { location: Location, actual: u32, expected: u32, word_type: String },
    /// cannot determine the bit width of word type `{0}`, pass `--allow-width-mismatch` to skip this check
    UnknownWordType(String),
}

/// Errors during code generation.
#[derive(Debug, DisplayDoc, Error, Clone, Eq, PartialEq)]
pub enum GenerateError {
    /// invalid bit group: {0}
    Constraint(#[from] ConstraintError),
    /// invalid definition: {0}
    Width(#[from] WidthError),
}

/// A named bit range of an instruction word, inclusive on both ends.
#[derive(Debug, Display, Clone, Eq, PartialEq)]
#[display("{name}: {low}usize => {high}usize")]
pub struct Accessor {
    /// Name of the operand field.
    pub name: String,
    /// Least significant bit.
    pub low: u32,
    /// Most significant bit.
    pub high: u32,
}

impl Accessor {
    /// Width of this field in bits.
    pub fn width(&self) -> u32 { self.high - self.low + 1 }
}

impl Definition {
    /// Accessors for all the labeled bit groups, starting from the least significant one.
    pub fn accessors(&self) -> Result<Vec<Accessor>, ConstraintError> {
        let mut pos = 0u32;
        let mut result = Vec::new();
        for group in self.bitgroups.iter().rev() {
            let end = pos.checked_add(bit_size(group.size())?)
                .filter(|&end| end <= MAX_WIDTH)
                .ok_or(ConstraintError::TooWide { location: self.location })?;
            if let BitGroup::Labeled { name, .. } = group {
                result.push(Accessor { name: name.clone(), low: pos, high: end - 1 });
            }
            pos = end;
        }
        Ok(result)
    }
}

/// Convert `snake_case` instruction names to `CamelCase` identifiers.
pub fn to_camel_case(name: &str) -> String {
    name.split('_')
        .filter_map(|part| {
            let mut chars = part.chars();
            let first = chars.next()?;
            Some(first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect::<String>())
        })
        .collect()
}

/// Accessors for one instruction.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct AccessorBlock {
    /// Identifier of this block, derived from the instruction name.
    pub name: String,
    /// Type of encoded instruction words.
    pub word_type: String,
    /// Unsigned type the word is reinterpreted as before extracting fields, for signed words.
    pub unsigned_type: Option<String>,
    /// Accessors, least significant field first.
    pub accessors: Vec<Accessor>,
    /// Form of this block.
    pub style: AccessorStyle,
}

impl AccessorBlock {
    fn fmt_bitfield(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "bitfield!({}: {}, {{", self.name, self.word_type)?;
        let n = self.accessors.len();
        for (k, accessor) in self.accessors.iter().enumerate() {
            let comma = if k + 1 != n { "," } else { "" };
            writeln!(f, "  {}{}", accessor, comma)?;
        }
        write!(f, "}});")
    }

    fn fmt_struct(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let AccessorBlock { name, word_type, .. } = self;
        writeln!(f, "#[derive(Debug, Copy, Clone, Eq, PartialEq)]")?;
        write!(f, "pub struct {name}(pub {word_type});")?;
        if self.accessors.is_empty() { return Ok(()); }
        writeln!(f, "\n\nimpl {name} {{")?;
        for (k, accessor) in self.accessors.iter().enumerate() {
            if k != 0 { writeln!(f)?; }
            let mask = ones(accessor.width());
            writeln!(f, "  #[inline(always)]")?;
            writeln!(f, "  pub fn {}(&self) -> {word_type} {{", accessor.name)?;
            match (&self.unsigned_type, accessor.low) {
                (None, 0) => writeln!(f, "    self.0 & 0x{mask:X}")?,
                (None, low) => writeln!(f, "    (self.0 >> {low}) & 0x{mask:X}")?,
                (Some(unsigned), 0) =>
                    writeln!(f, "    ((self.0 as {unsigned}) & 0x{mask:X}) as {word_type}")?,
                (Some(unsigned), low) =>
                    writeln!(f, "    (((self.0 as {unsigned}) >> {low}) & 0x{mask:X}) as {word_type}")?,
            }
            writeln!(f, "  }}")?;
        }
        write!(f, "}}")
    }
}

impl Display for AccessorBlock {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.style {
            AccessorStyle::Bitfield => self.fmt_bitfield(f),
            AccessorStyle::Struct => self.fmt_struct(f),
        }
    }
}

/// An instruction test inside a [`Guard`].
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Case {
    /// Name of the handler routine.
    pub handler: String,
    /// Exact constraint of the instruction.
    pub constraint: Constraint,
}

/// Coarse test for a category, guarding the tests for its instructions.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Guard {
    /// The category matches if any of these does.
    pub alternatives: SmallVec<[Constraint; 2]>,
    /// Instruction tests, in declaration order.
    pub cases: Vec<Case>,
}

/// The dispatch function.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Dispatch {
    /// Name of the decoder.
    pub decoder_name: String,
    /// Type of encoded instruction words.
    pub word_type: String,
    /// Expression the masks are applied to: `enc`, or `enc` cast to unsigned for signed words.
    pub subject: String,
    /// Number of hexadecimal digits for masks and patterns.
    pub digits: usize,
    /// Module providing the handler routines.
    pub handler_module: String,
    /// The uniform handler type.
    pub handler_type: String,
    /// Handler for unmatched words.
    pub undefined_handler: String,
    /// Category guards, in declaration order.
    pub guards: Vec<Guard>,
}

impl Dispatch {
    /// Name of the handler the generated function selects for this word: the first matching
    /// instruction inside the first matching category that has one.
    pub fn resolve(&self, word: u128) -> &str {
        self.guards.iter()
            .filter(|guard| guard.alternatives.iter().any(|c| c.matches(word)))
            .flat_map(|guard| guard.cases.iter())
            .find(|case| case.constraint.matches(word))
            .map_or(&self.undefined_handler, |case| &case.handler)
    }

    fn handler_path(&self, handler: &str) -> String {
        if self.handler_module.is_empty() {
            format!("{} as {}", handler, self.handler_type)
        } else {
            format!("{}::{} as {}", self.handler_module, handler, self.handler_type)
        }
    }
}

impl Display for Dispatch {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        use std::fmt::Write;
        writeln!(f, "/// Decode an instruction word of `{}`.", self.decoder_name)?;
        writeln!(f, "pub fn decode(enc: {}) -> {} {{", self.word_type, self.handler_type)?;
        let mut body = String::new();
        for guard in &self.guards {
            let tests = guard.alternatives.iter().map(|c| c.test(&self.subject, self.digits).to_string());
            writeln!(body, "if {} {{", itertools::join(tests, " || "))?;
            for case in &guard.cases {
                writeln!(body, "  if {} {{", case.constraint.test(&self.subject, self.digits))?;
                writeln!(body, "    return {};", self.handler_path(&case.handler))?;
                writeln!(body, "  }}")?;
            }
            writeln!(body, "}}")?;
        }
        writeln!(body, "{}", self.handler_path(&self.undefined_handler))?;
        let mut buffer = String::new();
        write_indented(f, format_args!("{}", body.trim_end()), &mut buffer)?;
        writeln!(f, "}}")
    }
}

/// Generated decoder source.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Generated {
    /// The dispatch function.
    pub dispatch: Dispatch,
    /// Accessor blocks, one per instruction in declaration order.
    pub accessors: Vec<AccessorBlock>,
}

impl Display for Generated {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "// Generated by decoder-gen from decoder `{}`. Do not edit.",
                 self.dispatch.decoder_name)?;
        writeln!(f)?;
        write!(f, "{}", self.dispatch)?;
        for block in &self.accessors {
            writeln!(f)?;
            writeln!(f, "{}", block)?;
        }
        Ok(())
    }
}

impl Decoder {
    fn check_width(&self, defn: &Definition, constraint: &Constraint) -> Result<(), WidthError> {
        let expected = self.word_width()
            .ok_or_else(|| WidthError::UnknownWordType(self.word_type.clone()))?;
        if constraint.width == expected { return Ok(()); }
        Err(WidthError::Mismatch {
            location: defn.location,
            actual: constraint.width,
            expected,
            word_type: self.word_type.clone(),
        })
    }

    /// Generate the decoder source code.
    pub fn generate(&self, options: &Options) -> Result<Generated, GenerateError> {
        let mut guards = Vec::with_capacity(self.categories.len());
        for category in &self.categories {
            let alternatives = category.definitions.iter()
                .map(Definition::constraint)
                .collect::<Result<SmallVec<_>, _>>()?;
            let cases = category.instructions.iter()
                .map(|instr| Ok(Case {
                    handler: instr.name.clone(),
                    constraint: instr.defn.constraint()?,
                }))
                .collect::<Result<Vec<_>, ConstraintError>>()?;
            guards.push(Guard { alternatives, cases });
        }
        let unsigned_type = self.unsigned_word_type();
        let accessors = self.instructions()
            .map(|instr| Ok(AccessorBlock {
                name: to_camel_case(&instr.name),
                word_type: self.word_type.clone(),
                unsigned_type: unsigned_type.clone(),
                accessors: instr.defn.accessors()?,
                style: options.accessor_style,
            }))
            .collect::<Result<Vec<_>, ConstraintError>>()?;
        if options.check_widths {
            for (category, guard) in self.categories.iter().zip(&guards) {
                for (defn, constraint) in category.definitions.iter().zip(&guard.alternatives) {
                    self.check_width(defn, constraint)?;
                }
                for (instr, case) in category.instructions.iter().zip(&guard.cases) {
                    self.check_width(&instr.defn, &case.constraint)?;
                }
            }
        }
        let width = self.word_width().unwrap_or_else(|| guards.iter()
            .flat_map(|g| g.alternatives.iter().chain(g.cases.iter().map(|c| &c.constraint)))
            .map(|c| c.width)
            .max()
            .unwrap_or(0));
        let dispatch = Dispatch {
            decoder_name: self.name.clone(),
            word_type: self.word_type.clone(),
            subject: unsigned_type.map_or_else(|| "enc".to_string(), |ty| format!("(enc as {ty})")),
            digits: ((width + 3) / 4).max(1) as usize,
            handler_module: options.handler_module.clone(),
            handler_type: options.handler_type.clone(),
            undefined_handler: options.undefined_handler.clone(),
            guards,
        };
        Ok(Generated { dispatch, accessors })
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;
    use crate::constraint::ConstraintError;
    use crate::decoder::Decoder;
    use crate::parser::read_decoder;
    use crate::samples;
    use super::{to_camel_case, Accessor, AccessorStyle, GenerateError, Generated, Options, WidthError};

    fn generate(source: &str, options: &Options) -> Result<Generated, GenerateError> {
        read_decoder(source).unwrap().generate(options)
    }

    fn accessor(name: &str, low: u32, high: u32) -> Accessor {
        Accessor { name: name.to_string(), low, high }
    }

    #[test]
    fn test_single_line() {
        let generated = generate(samples::SINGLE_LINE, &Options::default()).unwrap();
        assert_eq!(generated.to_string(), indoc::indoc! {"
            // Generated by decoder-gen from decoder `Test`. Do not edit.

            /// Decode an instruction word of `Test`.
            pub fn decode(enc: u32) -> InstFn {
              if (enc & 0x00000000) == 0x00000000 {
                if (enc & 0xF0000000) == 0x10000000 {
                  return interpreter::foo as InstFn;
                }
              }
              interpreter::undef as InstFn
            }

            bitfield!(Foo: u32, {
              rd: 24usize => 27usize
            });
        "});
        let dispatch = &generated.dispatch;
        for word in (0..=0xFFu128).map(|k| k * 0x0123_4567 % (1 << 32)) {
            let expected = if word & 0xF000_0000 == 0x1000_0000 { "foo" } else { "undef" };
            assert_eq!(dispatch.resolve(word), expected, "{:#010X}", word);
        }
        assert_eq!(dispatch.resolve(0x1FFF_FFFF), "foo");
    }

    #[test]
    fn test_category_alternatives() {
        let generated = generate(samples::THUMB, &Options::default()).unwrap();
        let text = generated.to_string();
        assert!(text.contains("  if (enc & 0xE000) == 0x2000 || (enc & 0xFC00) == 0x4000 {\n"));
        assert!(text.contains("      return interpreter::and as InstFn;\n"));
        let dispatch = &generated.dispatch;
        assert_eq!(dispatch.resolve(0b00100_011_00000001), "mov_1");
        assert_eq!(dispatch.resolve(0b0100000001_010_001), "eor");
        assert_eq!(dispatch.resolve(0b11011111_00000010), "swi");
        assert_eq!(dispatch.resolve(0b1101_0001_00000010), "b_1");
        assert_eq!(dispatch.resolve(0b000_11_00000000000), "undef");
        assert_eq!(dispatch.resolve(0b111_00_00000000000), "undef");
        let names = generated.accessors.iter().map(|b| b.name.as_str()).collect_vec();
        assert_eq!(names, vec!["Lsl1", "Lsr1", "Asr1", "Mov1", "Cmp1", "And", "Eor", "Swi", "B1"]);
    }

    #[test]
    fn test_first_match_wins() {
        let generated = generate(samples::OVERLAP, &Options::default()).unwrap();
        assert_eq!(generated.dispatch.resolve(0xC0), "first");
        assert_eq!(generated.dispatch.resolve(0x80), "first");
        assert_eq!(generated.dispatch.resolve(0x40), "undef");
        let text = generated.to_string();
        assert!(text.find("interpreter::first").unwrap() < text.find("interpreter::second").unwrap());
    }

    #[test]
    fn test_category_fallthrough() {
        let dispatch = generate(samples::FALLTHROUGH, &Options::default()).unwrap().dispatch;
        assert_eq!(dispatch.resolve(0xF3), "high_nibble");
        assert_eq!(dispatch.resolve(0x80), "any_high");
        assert_eq!(dispatch.resolve(0x00), "zero");
        assert_eq!(dispatch.resolve(0x01), "undef");
    }

    #[test]
    fn test_accessors() {
        let source = "decoder u16 T {\ncategory [_:16] {\nabc = [a:4; b:4; c:8]\n}\n}";
        let generated = generate(source, &Options::default()).unwrap();
        assert_eq!(generated.accessors[0].accessors,
                   vec![accessor("c", 0, 7), accessor("b", 8, 11), accessor("a", 12, 15)]);

        let decoder = read_decoder(samples::ARM).unwrap();
        let ldr = decoder.instructions().find(|i| i.name == "ldr").unwrap();
        assert_eq!(ldr.defn.accessors().unwrap(), vec![
            accessor("addr_mode", 0, 11), accessor("rd", 12, 15), accessor("rn", 16, 19),
            accessor("w", 21, 21), accessor("u", 23, 23), accessor("p", 24, 24),
            accessor("i", 25, 25), accessor("cond", 28, 31),
        ]);
    }

    #[test]
    fn test_camel_case() {
        assert_eq!(to_camel_case("load_store_multiple"), "LoadStoreMultiple");
        assert_eq!(to_camel_case("mod_blx"), "ModBlx");
        assert_eq!(to_camel_case("b_1"), "B1");
        assert_eq!(to_camel_case("LDR_imm"), "LdrImm");
        assert_eq!(to_camel_case("_and_"), "And");
    }

    #[test]
    fn test_struct_accessors() {
        let options = Options {
            handler_module: String::new(),
            handler_type: "Handler".to_string(),
            undefined_handler: "unknown".to_string(),
            accessor_style: AccessorStyle::Struct,
            check_widths: true,
        };
        let source = "decoder u16 T {\ncategory [_:16] {\nmov_1 = [0b00100:5; rd:3; immed_8:8]\nnop = [0:16]\n}\n}";
        let generated = generate(source, &options).unwrap();
        assert_eq!(generated.to_string(), indoc::indoc! {"
            // Generated by decoder-gen from decoder `T`. Do not edit.

            /// Decode an instruction word of `T`.
            pub fn decode(enc: u16) -> Handler {
              if (enc & 0x0000) == 0x0000 {
                if (enc & 0xF800) == 0x2000 {
                  return mov_1 as Handler;
                }
                if (enc & 0xFFFF) == 0x0000 {
                  return nop as Handler;
                }
              }
              unknown as Handler
            }

            #[derive(Debug, Copy, Clone, Eq, PartialEq)]
            pub struct Mov1(pub u16);

            impl Mov1 {
              #[inline(always)]
              pub fn immed_8(&self) -> u16 {
                self.0 & 0xFF
              }

              #[inline(always)]
              pub fn rd(&self) -> u16 {
                (self.0 >> 8) & 0x7
              }
            }

            #[derive(Debug, Copy, Clone, Eq, PartialEq)]
            pub struct Nop(pub u16);
        "});
    }

    #[test]
    fn test_constraint_error() {
        let source = "decoder u8 T {\ncategory [_:8] {\nbad = [5:2; _:6]\n}\n}";
        let err = generate(source, &Options::default()).unwrap_err();
        assert!(matches!(err, GenerateError::Constraint(ConstraintError::LiteralTooWide { size: 2, .. })));
        assert_eq!(err.to_string(), "invalid bit group: literal `5` at L3:8 does not fit in 2 bits");
    }

    #[test]
    fn test_width_check() {
        let source = "decoder u32 T {\ncategory [op:4; _:28] {\nshort = [0b0001:4; rd:4]\n}\n}";
        let err = generate(source, &Options::default()).unwrap_err();
        assert_eq!(err.to_string(),
                   "invalid definition: definition at L3:9 covers 8 bits, but `u32` has 32 bits");
        let lenient = Options { check_widths: false, ..Options::default() };
        let generated = generate(source, &lenient).unwrap();
        assert_eq!(generated.dispatch.resolve(0x10), "short");

        let source = "decoder Word T {\ncategory [_:12] {\n}\n}";
        assert_eq!(generate(source, &Options::default()).unwrap_err(),
                   GenerateError::Width(WidthError::UnknownWordType("Word".to_string())));
        assert_eq!(generate(source, &Options::default()).unwrap_err().to_string(),
                   "invalid definition: cannot determine the bit width of word type `Word`, \
                    pass `--allow-width-mismatch` to skip this check");
        let generated = generate(source, &lenient).unwrap();
        assert_eq!(generated.dispatch.digits, 3);
    }

    #[test]
    fn test_signed_word() {
        let source = "decoder i32 T {\ncategory [_:32] {\nfoo = [0b1111:4; rd:28]\n}\n}";
        let generated = generate(source, &Options::default()).unwrap();
        let text = generated.to_string();
        assert!(text.contains("pub fn decode(enc: i32) -> InstFn {\n"));
        assert!(text.contains("    if ((enc as u32) & 0xF0000000) == 0xF0000000 {\n"));
        assert!(!text.contains("(enc & "));
        assert_eq!(generated.dispatch.resolve(0xF000_0001), "foo");

        let options = Options { accessor_style: AccessorStyle::Struct, ..Options::default() };
        let text = generate(source, &options).unwrap().to_string();
        assert!(text.contains("pub struct Foo(pub i32);"));
        assert!(text.contains("    ((self.0 as u32) & 0xFFFFFFF) as i32\n"));
    }

    #[test]
    fn test_all_samples() {
        for input in samples::ALL_SAMPLES {
            let decoder: Decoder = read_decoder(input).unwrap();
            let generated = decoder.generate(&Options::default()).unwrap();
            assert_eq!(generated.dispatch.guards.len(), decoder.categories.len());
            assert_eq!(generated.accessors.len(), decoder.instructions().count());
        }
    }
}
