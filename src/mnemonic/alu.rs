/*
Copyright 2025 Connor Nolan

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

//! The shared 6-row shape used by every classic single-digit ALU mnemonic
//! (`add`, `sub`, `cmp`, `and`, `or`, `xor`): `r/m, imm32` (sign-extended),
//! `r/m, imm8` (sign-extended), `r/m, r` both directions, at 8/16/32/64 bits.
//! One instance of this grid, parameterized only by the ModR/M digit and the
//! register-direction opcode base, replaces six near-duplicate mnemonic
//! tables — the same grid `instructions.py` repeats verbatim per mnemonic.

use crate::operand::{imm, r, rm};
use crate::recipe::{OperandRole, Recipe};

/// `mr_base` is the 8-bit `r/m8, r8` opcode (e.g. `0x00` for add, `0x28` for
/// sub); `mr_base + 1` is the wide form, `+2`/`+3` give the `r, r/m` direction.
pub fn recipes(digit: u8, mr_base: u8) -> Vec<Recipe> {
    let mut out = Vec::new();

    // r/m, imm32 (sign-extended into 16/32/64-bit destination)
    for bits in [16u16, 32, 64] {
        let rex_w = bits == 64;
        out.push(Recipe::new(
            vec![rm(bits), imm(32)],
            &[0x81],
            Some(digit),
            rex_w,
            &[OperandRole::ModrmRm(0), OperandRole::Immediate(1)],
        ));
    }
    out.push(Recipe::new(
        vec![rm(8), imm(8)],
        &[0x80],
        Some(digit),
        false,
        &[OperandRole::ModrmRm(0), OperandRole::Immediate(1)],
    ));

    // r/m, imm8 (sign-extended), 16/32/64-bit destination only
    for bits in [16u16, 32, 64] {
        let rex_w = bits == 64;
        out.push(Recipe::new(
            vec![rm(bits), imm(8)],
            &[0x83],
            Some(digit),
            rex_w,
            &[OperandRole::ModrmRm(0), OperandRole::Immediate(1)],
        ));
    }

    // r/m, r (mr direction): opcode mr_base (8-bit) / mr_base+1 (wide)
    for bits in [8u16, 16, 32, 64] {
        let rex_w = bits == 64;
        let opcode: &'static [u8] = opcode_byte(if bits == 8 { mr_base } else { mr_base + 1 });
        out.push(Recipe::new(
            vec![rm(bits), r(bits)],
            opcode,
            None,
            rex_w,
            &[OperandRole::ModrmRm(0), OperandRole::ModrmReg(1)],
        ));
    }

    // r, r/m (rm direction): opcode mr_base+2 (8-bit) / mr_base+3 (wide)
    for bits in [8u16, 16, 32, 64] {
        let rex_w = bits == 64;
        let opcode: &'static [u8] = opcode_byte(if bits == 8 { mr_base + 2 } else { mr_base + 3 });
        out.push(Recipe::new(
            vec![r(bits), rm(bits)],
            opcode,
            None,
            rex_w,
            &[OperandRole::ModrmReg(0), OperandRole::ModrmRm(1)],
        ));
    }

    out
}

/// Leaks a single opcode byte to a `'static` one-element slice. Recipe
/// tables are built once at process start and live for the process
/// lifetime, so this is not a meaningful leak.
fn opcode_byte(b: u8) -> &'static [u8] {
    Box::leak(vec![b].into_boxed_slice())
}
