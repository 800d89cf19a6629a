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

//! `push`/`pop`/`ret`/`leave`, grounded on their tables in `instructions.py`.
//! 32-bit-only `pusha`/`popa` forms and far `ret`/`call` are out of scope.

use crate::operand::{imm, r, rm};
use crate::recipe::{Mnemonic, OperandRole, Recipe};

pub fn push() -> Mnemonic {
    let recipes = vec![
        Recipe::new(vec![rm(16)], &[0xff], Some(6), false, &[OperandRole::ModrmRm(0)]),
        Recipe::new(vec![rm(64)], &[0xff], Some(6), false, &[OperandRole::ModrmRm(0)]),
        Recipe::new(vec![r(16)], &[0x50], None, false, &[OperandRole::OpcodeReg(0)]),
        Recipe::new(vec![r(64)], &[0x50], None, false, &[OperandRole::OpcodeReg(0)]),
        Recipe::new(vec![imm(8)], &[0x6a], None, false, &[OperandRole::Immediate(0)]),
        Recipe::new(vec![imm(32)], &[0x68], None, false, &[OperandRole::Immediate(0)]),
    ];
    Mnemonic { name: "push", recipes }
}

pub fn pop() -> Mnemonic {
    let recipes = vec![
        Recipe::new(vec![rm(16)], &[0x8f], Some(0), false, &[OperandRole::ModrmRm(0)]),
        Recipe::new(vec![rm(64)], &[0x8f], Some(0), false, &[OperandRole::ModrmRm(0)]),
        Recipe::new(vec![r(16)], &[0x58], None, false, &[OperandRole::OpcodeReg(0)]),
        Recipe::new(vec![r(64)], &[0x58], None, false, &[OperandRole::OpcodeReg(0)]),
    ];
    Mnemonic { name: "pop", recipes }
}

pub fn ret() -> Mnemonic {
    let recipes = vec![
        Recipe::new(vec![], &[0xc3], None, false, &[]),
        Recipe::new(vec![imm(16)], &[0xc2], None, false, &[OperandRole::Immediate(0)]),
    ];
    Mnemonic { name: "ret", recipes }
}

pub fn leave() -> Mnemonic {
    Mnemonic { name: "leave", recipes: vec![Recipe::new(vec![], &[0xc9], None, false, &[])] }
}
