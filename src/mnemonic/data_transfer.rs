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

//! `mov`, `movsd`, and `lea`, grounded on `instructions.py`'s `mov`/`movsd`/
//! `lea` tables.

use crate::operand::{imm, m, r, rm, xmm, xmm_or_mem};
use crate::recipe::{Mnemonic, OperandRole, Recipe};

pub fn mov() -> Mnemonic {
    let mut recipes = Vec::new();

    // mr: r/m, r
    for bits in [8u16, 16, 32, 64] {
        let opcode: &'static [u8] = if bits == 8 { &[0x88] } else { &[0x89] };
        recipes.push(Recipe::new(
            vec![rm(bits), r(bits)],
            opcode,
            None,
            bits == 64,
            &[OperandRole::ModrmRm(0), OperandRole::ModrmReg(1)],
        ));
    }
    // rm: r, r/m
    for bits in [8u16, 16, 32, 64] {
        let opcode: &'static [u8] = if bits == 8 { &[0x8a] } else { &[0x8b] };
        recipes.push(Recipe::new(
            vec![r(bits), rm(bits)],
            opcode,
            None,
            bits == 64,
            &[OperandRole::ModrmReg(0), OperandRole::ModrmRm(1)],
        ));
    }
    // oi: r, imm (register folded into opcode)
    for bits in [8u16, 16, 32, 64] {
        let opcode: &'static [u8] = if bits == 8 { &[0xb0] } else { &[0xb8] };
        let imm_bits = if bits == 64 { 64 } else { bits };
        recipes.push(Recipe::new(
            vec![r(bits), imm(imm_bits)],
            opcode,
            None,
            bits == 64,
            &[OperandRole::OpcodeReg(0), OperandRole::Immediate(1)],
        ));
    }
    // mi: r/m, imm (imm32 sign-extended for wide forms)
    for bits in [8u16, 16, 32, 64] {
        let opcode: &'static [u8] = if bits == 8 { &[0xc6] } else { &[0xc7] };
        let imm_bits = if bits == 8 { 8 } else if bits == 16 { 16 } else { 32 };
        recipes.push(Recipe::new(
            vec![rm(bits), imm(imm_bits)],
            opcode,
            Some(0),
            bits == 64,
            &[OperandRole::ModrmRm(0), OperandRole::Immediate(1)],
        ));
    }

    Mnemonic { name: "mov", recipes }
}

/// Scalar double-precision move (SSE2 subset): `movsd xmm1, xmm2/m64` and
/// `movsd xmm2/m64, xmm1`. Tagged `sse2` in the reference table; this crate
/// has no feature-tag concept, so both forms are simply always available.
pub fn movsd() -> Mnemonic {
    let recipes = vec![
        Recipe::new(
            vec![xmm(64), xmm_or_mem(64)],
            &[0xf2, 0x0f, 0x10],
            None,
            false,
            &[OperandRole::ModrmReg(0), OperandRole::ModrmRm(1)],
        ),
        Recipe::new(
            vec![xmm_or_mem(64), xmm(64)],
            &[0xf2, 0x0f, 0x11],
            None,
            false,
            &[OperandRole::ModrmRm(0), OperandRole::ModrmReg(1)],
        ),
    ];
    Mnemonic { name: "movsd", recipes }
}

/// `lea r, m`: the destination is always a GP register and the bracketed
/// operand is address arithmetic, never a data access, so the recipe opts
/// out of the automatic 0x66 prefix a 16-bit destination would otherwise
/// trigger (the corrected erratum noted in the design ledger).
pub fn lea() -> Mnemonic {
    let recipes = vec![
        Recipe::new(
            vec![r(16), m(0)],
            &[0x8d],
            None,
            false,
            &[OperandRole::ModrmReg(0), OperandRole::ModrmRm(1)],
        )
        .without_operand_size_prefix(),
        Recipe::new(
            vec![r(32), m(0)],
            &[0x8d],
            None,
            false,
            &[OperandRole::ModrmReg(0), OperandRole::ModrmRm(1)],
        )
        .without_operand_size_prefix(),
        Recipe::new(
            vec![r(64), m(0)],
            &[0x8d],
            None,
            true,
            &[OperandRole::ModrmReg(0), OperandRole::ModrmRm(1)],
        )
        .without_operand_size_prefix(),
    ];
    Mnemonic { name: "lea", recipes }
}
