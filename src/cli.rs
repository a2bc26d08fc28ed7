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

//! Command line interface support.

use std::path::PathBuf;
use displaydoc::Display as DisplayDoc;
use parse_display::{Display, FromStr};
use thiserror::Error;
use clap::{AppSettings, Parser};

use crate::emitter::{AccessorStyle, GenerateError, Options};
use crate::parser::{read_decoder, ReadError};

/// Entry to the command line interface.
#[derive(Parser, Debug)]
#[clap(setting(AppSettings::ArgRequiredElseHelp))]
#[clap(author, version, about)]
pub struct Cli {
    /// The decoder specification file.
    input: PathBuf,
    /// What to generate from the specification.
    #[clap(short, long, default_value = "rust")]
    target_format: TargetFormat,
    /// Write to this file instead of the standard output.
    #[clap(short, long)]
    output: Option<PathBuf>,
    /// Module providing the instruction handlers, empty if they are already in scope.
    #[clap(long, default_value = "interpreter")]
    handler_module: String,
    /// Function pointer type every handler is coerced to.
    #[clap(long, default_value = "InstFn")]
    handler_type: String,
    /// Handler for undefined instructions.
    #[clap(long = "undefined", default_value = "undef")]
    undefined_handler: String,
    /// Form of the generated operand accessors.
    #[clap(long, default_value = "bitfield")]
    accessor_style: AccessorStyle,
    /// Accept definitions not covering exactly the instruction word.
    #[clap(long)]
    allow_width_mismatch: bool,
}

/// Supported target formats.
#[derive(Debug, Display, FromStr, Copy, Clone, Eq, PartialEq)]
#[display(style = "lowercase")]
pub enum TargetFormat {
    /// Print out the parsed specification in canonical form.
    Echo,
    /// Generate the Rust decoder.
    Rust,
}

/// All kinds of errors that might happen during command line execution.
#[derive(Debug, DisplayDoc, Error)]
pub enum Error {
    /// "errors" from [`clap`], including requests such as `--version` or `--help`.
    #[displaydoc("{0}")]
    InvalidArguments(#[from] clap::Error),
    /// {0}
    InvalidInput(#[from] ReadError),
    /// {0}
    InvalidDecoder(#[from] GenerateError),
    /// failed to access file: {0}
    Io(#[from] std::io::Error),
}

/// Result type for the command line interface.
pub type Result = std::result::Result<(), Error>;

impl Cli {
    /// Run the command line interface.
    pub fn run() -> Result {
        let options: Cli = Cli::try_parse()?;
        options.execute()
    }

    /// Options for code generation.
    pub fn generate_options(&self) -> Options {
        Options {
            handler_module: self.handler_module.clone(),
            handler_type: self.handler_type.clone(),
            undefined_handler: self.undefined_handler.clone(),
            accessor_style: self.accessor_style,
            check_widths: !self.allow_width_mismatch,
        }
    }

    /// Execute with already parsed arguments. Nothing is written unless all stages succeed.
    pub fn execute(&self) -> Result {
        let contents = std::fs::read_to_string(&self.input)?;
        let decoder = read_decoder(&contents)?;
        let output = match self.target_format {
            TargetFormat::Echo => decoder.to_string(),
            TargetFormat::Rust => decoder.generate(&self.generate_options())?.to_string(),
        };
        match &self.output {
            Some(path) => std::fs::write(path, output)?,
            None => print!("{}", output),
        }
        Ok(())
    }
}
