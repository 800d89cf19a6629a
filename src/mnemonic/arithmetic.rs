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

//! `add`, `sub`, `cmp` (the ALU grid from `src/mnemonic/alu.rs`), plus
//! `inc`/`dec`/`imul`/`idiv`, grounded on their respective tables in
//! `instructions.py`.

use super::alu;
use crate::operand::{imm, r, rm};
use crate::recipe::{Mnemonic, OperandRole, Recipe};

pub fn add() -> Mnemonic {
    Mnemonic { name: "add", recipes: alu::recipes(0, 0x00) }
}

/// The `sub r/m64, imm8` row is `REX.W + 83 /5` here; the donor table
/// transcribed it as `REX.W + 85 /0`, which collides with `test`'s opcode
/// and digit — corrected per the design ledger's resolved erratum.
pub fn sub() -> Mnemonic {
    Mnemonic { name: "sub", recipes: alu::recipes(5, 0x28) }
}

pub fn cmp() -> Mnemonic {
    Mnemonic { name: "cmp", recipes: alu::recipes(7, 0x38) }
}

/// `inc`/`dec` r/m forms (`fe/ff /0` and `fe/ff /1`). The 32-bit-only
/// single-byte `40+rd`/`48+rd` opcode forms are not available in 64-bit
/// mode (the opcode space was reclaimed for REX prefixes), so only the
/// ModR/M forms are offered here.
fn inc_dec(digit: u8) -> Vec<Recipe> {
    let mut recipes = Vec::new();
    for bits in [8u16, 16, 32, 64] {
        let opcode: &'static [u8] = if bits == 8 { &[0xfe] } else { &[0xff] };
        recipes.push(Recipe::new(vec![rm(bits)], opcode, Some(digit), bits == 64, &[OperandRole::ModrmRm(0)]));
    }
    recipes
}

pub fn inc() -> Mnemonic {
    Mnemonic { name: "inc", recipes: inc_dec(0) }
}

pub fn dec() -> Mnemonic {
    Mnemonic { name: "dec", recipes: inc_dec(1) }
}

/// Two- and three-operand `imul` forms: `r, r/m` (`0f af /r`) and
/// `r, r/m, imm8`/`r, r/m, imm32` (`6b /r ib` / `69 /r iw/id`).
pub fn imul() -> Mnemonic {
    let mut recipes = Vec::new();
    for bits in [16u16, 32, 64] {
        recipes.push(Recipe::new(
            vec![r(bits), rm(bits)],
            &[0x0f, 0xaf],
            None,
            bits == 64,
            &[OperandRole::ModrmReg(0), OperandRole::ModrmRm(1)],
        ));
    }
    for bits in [16u16, 32, 64] {
        recipes.push(Recipe::new(
            vec![r(bits), rm(bits), imm(8)],
            &[0x6b],
            None,
            bits == 64,
            &[OperandRole::ModrmReg(0), OperandRole::ModrmRm(1), OperandRole::Immediate(2)],
        ));
    }
    for bits in [16u16, 32, 64] {
        let imm_bits = if bits == 16 { 16 } else { 32 };
        recipes.push(Recipe::new(
            vec![r(bits), rm(bits), imm(imm_bits)],
            &[0x69],
            None,
            bits == 64,
            &[OperandRole::ModrmReg(0), OperandRole::ModrmRm(1), OperandRole::Immediate(2)],
        ));
    }
    Mnemonic { name: "imul", recipes }
}

/// Unsigned divide, single r/m operand (`f6/7`, `f7/7`, `REX.W+f7/7`).
pub fn idiv() -> Mnemonic {
    let mut recipes = Vec::new();
    recipes.push(Recipe::new(vec![rm(8)], &[0xf6], Some(7), false, &[OperandRole::ModrmRm(0)]));
    for bits in [16u16, 32, 64] {
        recipes.push(Recipe::new(vec![rm(bits)], &[0xf7], Some(7), bits == 64, &[OperandRole::ModrmRm(0)]));
    }
    Mnemonic { name: "idiv", recipes }
}
