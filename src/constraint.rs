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

//! Bit constraints derived from [`Definition`]s.

use std::fmt::{Display, Formatter};
use displaydoc::Display as DisplayDoc;
use thiserror::Error;

use crate::decoder::{BitGroup, Definition, Literal};
use crate::lexer::Location;

/// Widest supported definition, in bits.
pub const MAX_WIDTH: u32 = u128::BITS;

/// An encoded word `w` matches iff `w & mask == equals`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub struct Constraint {
    /// Bits fixed by literal bit groups.
    pub mask: u128,
    /// Required values for the bits in `mask`.
    pub equals: u128,
    /// Total width of the definition this constraint is derived from.
    pub width: u32,
}

impl Constraint {
    /// Whether or not the word satisfies this constraint.
    pub fn matches(&self, word: u128) -> bool {
        word & self.mask == self.equals
    }

    /// Render this constraint as a test on the variable `var`, with `digits` hexadecimal digits.
    pub fn test<'a>(&'a self, var: &'a str, digits: usize) -> Test<'a> {
        Test { constraint: self, var, digits }
    }
}

impl Display for Constraint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let digits = ((self.width + 3) / 4).max(1) as usize;
        write!(f, "{}", self.test("word", digits))
    }
}

/// A [`Constraint`] rendered as a Rust boolean expression.
pub struct Test<'a> {
    constraint: &'a Constraint,
    var: &'a str,
    digits: usize,
}

impl<'a> Display for Test<'a> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let Constraint { mask, equals, .. } = self.constraint;
        let (var, digits) = (self.var, self.digits);
        write!(f, "({var} & 0x{mask:0digits$X}) == 0x{equals:0digits$X}")
    }
}

/// Errors in bit groups, detected while deriving [`Constraint`]s.
#[derive(Debug, DisplayDoc, Error, Clone, Eq, PartialEq)]
#[allow(missing_docs)]
pub enum ConstraintError {
    /// literal `{value}` at {location} does not fit in {size} bits
    LiteralTooWide { value: String, size: u32, location: Location },
    /// bit group size at {location} is zero
    ZeroSize { location: Location },
    /// literal `{text}` at {location} is out of range
    OutOfRange { text: String, location: Location },
    /// definition at {location} is wider than 128 bits
    TooWide { location: Location },
}

/// Mask with the lowest `size` bits set.
pub(crate) fn ones(size: u32) -> u128 {
    u128::MAX.checked_shr(MAX_WIDTH.saturating_sub(size)).unwrap_or(0)
}

/// Width of a bit group, in bits.
pub(crate) fn bit_size(size: &Literal) -> Result<u32, ConstraintError> {
    let out_of_range = || ConstraintError::OutOfRange {
        text: size.text.clone(),
        location: size.location,
    };
    match size.value() {
        Some(0) => Err(ConstraintError::ZeroSize { location: size.location }),
        Some(n) => u32::try_from(n).map_err(|_| out_of_range()),
        None => Err(out_of_range()),
    }
}

impl Definition {
    /// Derive the [`Constraint`] for this definition, folding its bit groups from the most
    /// significant one.
    pub fn constraint(&self) -> Result<Constraint, ConstraintError> {
        let mut result = Constraint::default();
        for group in &self.bitgroups {
            let size = bit_size(group.size())?;
            result.width = result.width.checked_add(size)
                .filter(|&width| width <= MAX_WIDTH)
                .ok_or(ConstraintError::TooWide { location: self.location })?;
            result.mask = result.mask.checked_shl(size).unwrap_or(0);
            result.equals = result.equals.checked_shl(size).unwrap_or(0);
            if let BitGroup::Literal { value, .. } = group {
                let binary = value.value().ok_or_else(|| ConstraintError::OutOfRange {
                    text: value.text.clone(),
                    location: value.location,
                })?;
                if binary > ones(size) {
                    return Err(ConstraintError::LiteralTooWide {
                        value: value.text.clone(),
                        size,
                        location: value.location,
                    });
                }
                result.mask |= ones(size);
                result.equals |= binary;
            }
        }
        Ok(result)
    }
}
