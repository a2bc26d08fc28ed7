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

//! Generate instruction decoders from bit-pattern specifications.
//!
//! A specification declares the encoding of every instruction as a list of bit groups, and groups
//! instructions into categories sharing a coarse bit pattern. The pipeline consists of
//! - [`lexer`]: source text to [`lexer::Token`]s;
//! - [`parser`]: tokens to a [`Decoder`];
//! - [`constraint`] and [`emitter`]: a [`Decoder`] to the source code of a dispatch function and
//!   per-instruction operand accessors.

#![warn(missing_docs)]

use std::path::Path;
use displaydoc::Display as DisplayDoc;
use thiserror::Error;

pub mod lexer;
pub mod decoder;
pub mod parser;
pub mod constraint;
pub mod emitter;

#[cfg(feature = "cli")]
pub mod cli;

#[cfg(feature = "cli")]
pub use cli::Cli;

#[cfg(test)]
mod samples;

pub use decoder::{BitGroup, Category, Decoder, Definition, Instruction};
pub use constraint::Constraint;
pub use emitter::{AccessorStyle, Generated, Options};
pub use parser::read_decoder;

/// All kinds of errors that might happen while compiling a specification.
#[derive(Debug, DisplayDoc, Error)]
pub enum Error {
    /// {0}
    Read(#[from] parser::ReadError),
    /// {0}
    Generate(#[from] emitter::GenerateError),
    /// failed to read file: {0}
    Io(#[from] std::io::Error),
}

/// Compile a specification to decoder source code.
pub fn compile(source: &str, options: &Options) -> Result<Generated, Error> {
    let decoder = read_decoder(source)?;
    Ok(decoder.generate(options)?)
}

/// Compile a specification file, e.g. from a build script:
///
/// ```no_run
/// let generated = decoder_gen::compile_file("src/cpu/arm.decoder", &Default::default()).unwrap();
/// let out_dir = std::env::var("OUT_DIR").unwrap();
/// std::fs::write(format!("{}/arm.decoder.rs", out_dir), generated.to_string()).unwrap();
/// ```
pub fn compile_file(path: impl AsRef<Path>, options: &Options) -> Result<Generated, Error> {
    let source = std::fs::read_to_string(path)?;
    compile(&source, options)
}
