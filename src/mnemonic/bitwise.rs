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

//! `and`/`or`/`xor` (the ALU grid), plus `not`/`neg` (single r/m, `f6/7 /2`
//! `/3`), `shl`/`shr`/`sar` (shift-by-`cl`/shift-by-`imm8`), `test`, and
//! `nop`. `instructions.py` never modelled a bitwise category; these follow
//! the same opcode grid already transcribed for `add`/`sub`/`cmp`, per the
//! design ledger's supplement note.

use super::alu;
use crate::operand::{imm, r, rm};
use crate::recipe::{Mnemonic, OperandRole, Recipe};
use crate::register::gp8::cl;

pub fn and() -> Mnemonic {
    Mnemonic { name: "and", recipes: alu::recipes(4, 0x20) }
}

pub fn or() -> Mnemonic {
    Mnemonic { name: "or", recipes: alu::recipes(1, 0x08) }
}

pub fn xor() -> Mnemonic {
    Mnemonic { name: "xor", recipes: alu::recipes(6, 0x30) }
}

fn unary_digit(digit: u8) -> Vec<Recipe> {
    let mut recipes = Vec::new();
    recipes.push(Recipe::new(vec![rm(8)], &[0xf6], Some(digit), false, &[OperandRole::ModrmRm(0)]));
    for bits in [16u16, 32, 64] {
        recipes.push(Recipe::new(vec![rm(bits)], &[0xf7], Some(digit), bits == 64, &[OperandRole::ModrmRm(0)]));
    }
    recipes
}

pub fn not() -> Mnemonic {
    Mnemonic { name: "not", recipes: unary_digit(2) }
}

pub fn neg() -> Mnemonic {
    Mnemonic { name: "neg", recipes: unary_digit(3) }
}

/// Shift-group opcode grid shared by `shl`/`shr`/`sar`: `/digit, 1` (bare
/// single-bit shift, `d0`/`d1`), `/digit, cl` (`d2`/`d3`), and
/// `/digit, imm8` (`c0`/`c1`). The bare-`1` form is intentionally omitted —
/// it is subsumed by the `cl` and `imm8` forms for a JIT that always
/// supplies an explicit shift count.
/// `d2`/`d3` have no field to record which register was named as the count
/// source — the hardware always reads `cl` — so the count slot carries a
/// `FixedRegister` role rejecting anything else at encode time, rather than
/// silently encoding "shift by cl" for whatever 8-bit register was supplied.
fn shift_digit(digit: u8) -> Vec<Recipe> {
    let mut recipes = Vec::new();
    recipes.push(Recipe::new(
        vec![rm(8), r(8)],
        &[0xd2],
        Some(digit),
        false,
        &[OperandRole::ModrmRm(0), OperandRole::FixedRegister(1, cl)],
    ));
    for bits in [16u16, 32, 64] {
        recipes.push(Recipe::new(
            vec![rm(bits), r(8)],
            &[0xd3],
            Some(digit),
            bits == 64,
            &[OperandRole::ModrmRm(0), OperandRole::FixedRegister(1, cl)],
        ));
    }
    recipes.push(Recipe::new(
        vec![rm(8), imm(8)],
        &[0xc0],
        Some(digit),
        false,
        &[OperandRole::ModrmRm(0), OperandRole::Immediate(1)],
    ));
    for bits in [16u16, 32, 64] {
        recipes.push(Recipe::new(
            vec![rm(bits), imm(8)],
            &[0xc1],
            Some(digit),
            bits == 64,
            &[OperandRole::ModrmRm(0), OperandRole::Immediate(1)],
        ));
    }
    recipes
}

pub fn shl() -> Mnemonic {
    Mnemonic { name: "shl", recipes: shift_digit(4) }
}

pub fn shr() -> Mnemonic {
    Mnemonic { name: "shr", recipes: shift_digit(5) }
}

pub fn sar() -> Mnemonic {
    Mnemonic { name: "sar", recipes: shift_digit(7) }
}

/// `test r/m, imm` (`f6/0`, `f7/0`, `REX.W+f7/0`) and `test r/m, r`
/// (`84/85`, `REX.W+85`).
pub fn test() -> Mnemonic {
    let mut recipes = Vec::new();
    recipes.push(Recipe::new(
        vec![rm(8), imm(8)],
        &[0xf6],
        Some(0),
        false,
        &[OperandRole::ModrmRm(0), OperandRole::Immediate(1)],
    ));
    for bits in [16u16, 32, 64] {
        let imm_bits = if bits == 16 { 16 } else { 32 };
        recipes.push(Recipe::new(
            vec![rm(bits), imm(imm_bits)],
            &[0xf7],
            Some(0),
            bits == 64,
            &[OperandRole::ModrmRm(0), OperandRole::Immediate(1)],
        ));
    }
    recipes.push(Recipe::new(
        vec![rm(8), r(8)],
        &[0x84],
        None,
        false,
        &[OperandRole::ModrmRm(0), OperandRole::ModrmReg(1)],
    ));
    for bits in [16u16, 32, 64] {
        recipes.push(Recipe::new(
            vec![rm(bits), r(bits)],
            &[0x85],
            None,
            bits == 64,
            &[OperandRole::ModrmRm(0), OperandRole::ModrmReg(1)],
        ));
    }
    Mnemonic { name: "test", recipes }
}

pub fn nop() -> Mnemonic {
    Mnemonic { name: "nop", recipes: vec![Recipe::new(vec![], &[0x90], None, false, &[])] }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::{assemble, Encoded};
    use crate::operand::Operand;
    use crate::register::gp32::eax;
    use crate::register::gp8::dl;

    #[test]
    fn shift_by_cl_uses_cl_register_slot() {
        let shl = shl();
        assert!(shl.recipes.iter().any(|r| r.signature.len() == 2 && r.opcode == [0xd3]));
    }

    #[test]
    fn shift_by_cl_assembles() {
        match assemble("shl", vec![Operand::Register(eax), Operand::Register(cl)], 64).unwrap() {
            Encoded::Bytes(b) => assert_eq!(b, vec![0xd3, 0xe0]),
            Encoded::Deferred(_) => panic!("expected fully resolved bytes"),
        }
    }

    #[test]
    fn shift_by_non_cl_register_is_rejected() {
        assert!(assemble("shl", vec![Operand::Register(eax), Operand::Register(dl)], 64).is_err());
    }
}
