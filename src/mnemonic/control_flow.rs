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

//! `jmp`, the 27-mnemonic `jcc` family, `call`, `int`, and `syscall`,
//! grounded on `instructions.py`'s `RelBranchInstruction` subclasses, the
//! `_jcc` factory, `int_`, and `syscall` entries. Only the `rel8`/`rel32`
//! near forms are offered; far jumps/calls and `rel16` (32-bit-only) are
//! out of scope for a 64-bit-hosted JIT.

use crate::operand::rel;
use crate::recipe::{Mnemonic, OperandRole, Recipe};

fn rel_recipes(short_opcode: &'static [u8], near_opcode: &'static [u8]) -> Vec<Recipe> {
    vec![
        Recipe::new(vec![rel(8)], short_opcode, None, false, &[OperandRole::Rel(0)]),
        Recipe::new(vec![rel(32)], near_opcode, None, false, &[OperandRole::Rel(0)]),
    ]
}

pub fn jmp() -> Mnemonic {
    Mnemonic { name: "jmp", recipes: rel_recipes(&[0xeb], &[0xe9]) }
}

pub fn call() -> Mnemonic {
    Mnemonic { name: "call", recipes: vec![Recipe::new(vec![rel(32)], &[0xe8], None, false, &[OperandRole::Rel(0)])] }
}

/// One named condition-code jump, matching the `_jcc` factory: `rel8` via
/// the one-byte `7x` opcode, `rel32` via the two-byte `0f 8x` opcode.
fn jcc(short: u8, near_low: u8) -> Vec<Recipe> {
    vec![
        Recipe::new(vec![rel(8)], opcode_byte(short), None, false, &[OperandRole::Rel(0)]),
        Recipe::new(vec![rel(32)], opcode_pair(0x0f, near_low), None, false, &[OperandRole::Rel(0)]),
    ]
}

fn opcode_byte(b: u8) -> &'static [u8] {
    Box::leak(vec![b].into_boxed_slice())
}

fn opcode_pair(a: u8, b: u8) -> &'static [u8] {
    Box::leak(vec![a, b].into_boxed_slice())
}

/// All 27 condition-code mnemonics `instructions.py`'s `_jcc` factory
/// generates, short opcode `0x70 + cc`, near opcode `0x0f 0x80 + cc`, plus
/// the documented aliases that map to the same condition code.
pub fn jcc_family() -> Vec<Mnemonic> {
    const CONDITIONS: &[(&str, u8)] = &[
        ("ja", 0x7), ("jae", 0x3), ("jb", 0x2), ("jbe", 0x6), ("jc", 0x2),
        ("je", 0x4), ("jz", 0x4), ("jg", 0xf), ("jge", 0xd), ("jl", 0xc),
        ("jle", 0xe), ("jna", 0x6), ("jnae", 0x2), ("jnb", 0x3), ("jnbe", 0x7),
        ("jnc", 0x3), ("jne", 0x5), ("jng", 0xe), ("jnge", 0xc), ("jnl", 0xd),
        ("jnle", 0xf), ("jno", 0x1), ("jnp", 0xb), ("jns", 0x9), ("jnz", 0x5),
        ("jo", 0x0), ("jp", 0xa), ("jpe", 0xa), ("jpo", 0xb), ("js", 0x8),
    ];
    CONDITIONS
        .iter()
        .map(|&(name, cc)| Mnemonic { name, recipes: jcc(0x70 | cc, 0x80 | cc) })
        .collect()
}

/// Software interrupt, `cd ib`.
pub fn int_() -> Mnemonic {
    Mnemonic {
        name: "int",
        recipes: vec![Recipe::new(
            vec![crate::operand::imm(8)],
            &[0xcd],
            None,
            false,
            &[OperandRole::Immediate(0)],
        )],
    }
}

/// Fast system call, bare `0f 05`.
pub fn syscall() -> Mnemonic {
    Mnemonic { name: "syscall", recipes: vec![Recipe::new(vec![], &[0x0f, 0x05], None, false, &[])] }
}
