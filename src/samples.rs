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

//! Sample specifications for tests.

/// The whole decoder on a single line.
pub const SINGLE_LINE: &str =
    "decoder u32 Test { category [opc:4; _:28] { foo = [0b0001:4; rd:4; _:24] } }";

/// Part of the Thumb instruction set.
pub const THUMB: &str = indoc::indoc! {"
    // shift by immediate, move, compare, data processing, branches
    decoder u16 Thumb {
      category [0b000:3; _:13] {
        lsl_1 = [0b000:3; 0b00:2; immed_5:5; rm:3; rd:3]
        lsr_1 = [0b000:3; 0b01:2; immed_5:5; rm:3; rd:3]
        asr_1 = [0b000:3; 0b10:2; immed_5:5; rm:3; rd:3]
      }
      category [0b001:3; _:13] or [0b010000:6; _:10] {
        mov_1 = [0b00100:5; rd:3; immed_8:8]
        cmp_1 = [0b00101:5; rn:3; immed_8:8]
        and = [0b0100000000:10; rm:3; rd:3] // rd := rd & rm
        eor = [0b0100000001:10; rm:3; rd:3]
      }
      category [0b1101:4; _:12] {
        swi = [0b11011111:8; immed_8:8]
        b_1 = [0b1101:4; cond:4; signed_imm_8:8]
      }
      category [0b111:3; _:13] {
        // long branches are not supported yet
      }
    }
"};

/// Part of the ARM instruction set.
pub const ARM: &str = indoc::indoc! {"
    decoder u32 Arm {
      category [cond:4; 0b00:2; _:26] {
        and = [cond:4; 0b00:2; i:1; 0b0000:4; s:1; rn:4; rd:4; shifter_operand:12]
        eor = [cond:4; 0b00:2; i:1; 0b0001:4; s:1; rn:4; rd:4; shifter_operand:12]
        mov = [cond:4; 0b00:2; i:1; 0b1101:4; s:1; _:4; rd:4; shifter_operand:12]
      }
      category [cond:4; 0b010:3; _:25] or [cond:4; 0b011:3; _:25] {
        ldr = [cond:4; 0b01:2; i:1; p:1; u:1; 0:1; w:1; 1:1; rn:4; rd:4; addr_mode:12]
        str = [cond:4; 0b01:2; i:1; p:1; u:1; 0:1; w:1; 0:1; rn:4; rd:4; addr_mode:12]
      }
      category [0xF:4; 0b101:3; _:25] {
        mod_blx = [0xF:4; 0b101:3; h:1; signed_immed_24:24]
      }
      category [cond:4; 0b101:3; _:25] {
        b_bl = [cond:4; 0b101:3; link:1; signed_immed_24:24]
      }
    }
"};

/// Categories that match but contain no matching instruction.
pub const FALLTHROUGH: &str = indoc::indoc! {"
    decoder u8 Fall {
      category [0b1:1; _:7] {
        high_nibble = [0b1111:4; x:4]
      }
      category [_:8] {
        any_high = [0b1:1; y:7]
        zero = [0:8]
      }
    }
"};

/// Overlapping instructions in one category.
pub const OVERLAP: &str = indoc::indoc! {"
    decoder u8 Overlap {
      category [_:8] {
        first = [0b1:1; _:7]
        second = [0b11:2; _:6]
      }
    }
"};

/// All the samples.
pub const ALL_SAMPLES: &[&str] = &[SINGLE_LINE, THUMB, ARM, FALLTHROUGH, OVERLAP];
