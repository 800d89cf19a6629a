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

//! Recipe tables (component 4.3). A [`Recipe`] is structured Rust data, not
//! a string parsed at runtime: opcode bytes, an optional `/digit` ModR/M
//! extension, whether a register is folded into the opcode's low 3 bits,
//! whether `REX.W` is forced, and the per-operand encoding roles that drive
//! [`crate::instruction::assemble`].

/// Which operand slot (by index into the caller's argument list) each
/// encoding role consumes, and how.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandRole {
    /// Folded into the low 3 bits of the last opcode byte (`+rb`/`+rw`/`+rd`/`+rq`).
    OpcodeReg(usize),
    /// Placed in ModR/M.r/m (register or memory).
    ModrmRm(usize),
    /// Placed in ModR/M.reg.
    ModrmReg(usize),
    /// Immediate trailing bytes, packed to the given declared width.
    Immediate(usize),
    /// Relative branch displacement, patched once the target is known.
    Rel(usize),
    /// Asserts operand `idx` is exactly the given register. Used where the
    /// opcode has no ModR/M or opcode-reg field to record which register was
    /// actually supplied (e.g. `d2`/`d3` shift-by-`cl`, which hardcodes `cl`
    /// as the count source) — `matches_slot` only checks width and class, so
    /// without this the wrong register would silently encode as `cl`.
    FixedRegister(usize, crate::register::Register),
}

/// A single per-mode row: the exact operand shape this row accepts plus how
/// to emit it. `required_operand_size` forces the 0x66 prefix only when the
/// destination register reads 16-bit; it is a property of the recipe, not
/// inferred afterward, so mnemonics like `lea` can opt out (§9 erratum fix).
#[derive(Debug, Clone)]
pub struct Recipe {
    pub signature: Vec<crate::operand::SigEntry>,
    pub opcode: &'static [u8],
    pub opcode_extension: Option<u8>,
    pub rex_w: bool,
    pub roles: &'static [OperandRole],
    /// False only for `lea`: suppresses the automatic 0x66 prefix that a
    /// 16-bit ModRM.reg destination would otherwise attach, since `lea`'s
    /// "memory" operand is address arithmetic, never a data access.
    pub emits_operand_size_prefix: bool,
}

impl Recipe {
    pub fn new(
        signature: Vec<crate::operand::SigEntry>,
        opcode: &'static [u8],
        opcode_extension: Option<u8>,
        rex_w: bool,
        roles: &'static [OperandRole],
    ) -> Self {
        Recipe { signature, opcode, opcode_extension, rex_w, roles, emits_operand_size_prefix: true }
    }

    pub fn without_operand_size_prefix(mut self) -> Self {
        self.emits_operand_size_prefix = false;
        self
    }
}

/// A mnemonic's full set of candidate rows, tried in declaration order.
pub struct Mnemonic {
    pub name: &'static str,
    pub recipes: Vec<Recipe>,
}
