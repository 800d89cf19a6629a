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

//! Instruction mode selection and byte-level assembly (components 4.5-4.7).
//! [`Encoder`] is constructed once per instruction (mnemonic + operands) and
//! drives a single method, [`Encoder::assemble`], that either returns the
//! complete machine-code bytes or a [`crate::deferred::Deferred`] buffer
//! carrying an unresolved relative-branch fixup.

use crate::deferred::Deferred;
use crate::errors::AssemblyError;
use crate::modrm::{self, RexBits};
use crate::operand::{matches_slot, signature, Kind, Operand};
use crate::recipe::{OperandRole, Recipe};
use crate::register::Register;

pub struct Encoder<'a> {
    pub mnemonic: &'a str,
    pub operands: Vec<Operand>,
    pub arch_bits: u16,
}

/// Either a fully resolved instruction, or one still carrying a pending
/// label fixup.
pub enum Encoded {
    Bytes(Vec<u8>),
    Deferred(Deferred),
}

impl<'a> Encoder<'a> {
    pub fn new(mnemonic: &'a str, operands: Vec<Operand>, arch_bits: u16) -> Self {
        Encoder { mnemonic, operands, arch_bits }
    }

    fn describe_operands(&self) -> String {
        signature(&self.operands)
            .iter()
            .map(|e| format!("{:?}{}", e.kind, e.bits))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Picks the best-matching [`Recipe`] for the supplied operands: an
    /// exact-kind-and-width match wins outright; otherwise every recipe is
    /// scored with [`matches_slot`] and the first strong (non-degraded)
    /// full match in declaration order is taken, falling back to the first
    /// degraded (unsigned-immediate-fit) match if no strong match exists.
    fn select_recipe(&self, recipes: &'a [Recipe]) -> Result<&'a Recipe, AssemblyError> {
        let sig = signature(&self.operands);

        let mut backup: Option<&Recipe> = None;
        for recipe in recipes {
            if recipe.signature.len() != sig.len() {
                continue;
            }
            let mut strong = true;
            let mut ok = true;
            for (supplied, slot) in sig.iter().zip(recipe.signature.iter()) {
                match matches_slot(*supplied, *slot) {
                    Some(true) => {}
                    Some(false) => strong = false,
                    None => {
                        ok = false;
                        break;
                    }
                }
            }
            if !ok {
                continue;
            }
            if strong {
                return Ok(recipe);
            }
            if backup.is_none() {
                backup = Some(recipe);
            }
        }

        backup.ok_or_else(|| AssemblyError::NoMatchingSignature {
            mnemonic: self.mnemonic.to_string(),
            operands: self.describe_operands(),
        })
    }

    fn operand_register(&self, idx: usize) -> Result<Register, AssemblyError> {
        match &self.operands[idx] {
            Operand::Register(r) => Ok(*r),
            other => Err(AssemblyError::Syntax { reason: format!("expected a register operand, got {other:?}") }),
        }
    }

    fn immediate_bytes(&self, idx: usize, declared_bits: u16) -> Result<Vec<u8>, AssemblyError> {
        let value = match &self.operands[idx] {
            Operand::Immediate(v) => *v,
            other => return Err(AssemblyError::Syntax { reason: format!("expected an immediate, got {other:?}") }),
        };
        let bytes: Vec<u8> = match declared_bits {
            8 => i8::try_from(value)
                .map(|v| vec![v as u8])
                .or_else(|_| u8::try_from(value).map(|v| vec![v]))
                .map_err(|_| AssemblyError::ImmediateOutOfRange { value, width: 8 })?,
            16 => i16::try_from(value)
                .map(|v| v.to_le_bytes().to_vec())
                .or_else(|_| u16::try_from(value).map(|v| v.to_le_bytes().to_vec()))
                .map_err(|_| AssemblyError::ImmediateOutOfRange { value, width: 16 })?,
            32 => i32::try_from(value)
                .map(|v| v.to_le_bytes().to_vec())
                .or_else(|_| u32::try_from(value).map(|v| v.to_le_bytes().to_vec()))
                .map_err(|_| AssemblyError::ImmediateOutOfRange { value, width: 32 })?,
            64 => value.to_le_bytes().to_vec(),
            other => return Err(AssemblyError::Syntax { reason: format!("invalid immediate width {other}") }),
        };
        Ok(bytes)
    }

    /// Assembles the instruction against the best-matching recipe, returning
    /// complete bytes for everything except relative branches, whose
    /// displacement depends on a label that may not be defined yet.
    pub fn assemble(&self, recipes: &'a [Recipe]) -> Result<Encoded, AssemblyError> {
        let recipe = self.select_recipe(recipes)?;

        let mut prefixes: Vec<u8> = Vec::new();
        let mut rex = RexBits { w: recipe.rex_w, ..Default::default() };
        let mut opcode = recipe.opcode.to_vec();
        let mut modrm_reg: Option<u8> = None;
        let mut rm_bytes: Option<(RexBits, Vec<u8>)> = None;
        let mut mem_fixup: Option<modrm::LabelFixup> = None;
        let mut trailing: Vec<u8> = Vec::new();
        let mut rel_fixup: Option<(usize, usize, String)> = None; // (offset into trailing region, width bytes, label name)
        let mut saw_rex_required_8bit = false;
        let mut saw_rex_forbidding_8bit = false;

        for role in recipe.roles {
            match *role {
                OperandRole::OpcodeReg(i) => {
                    let reg = self.operand_register(i)?;
                    if reg.width == 16 && !prefixes.contains(&0x66) {
                        prefixes.push(0x66);
                    }
                    if reg.requires_rex() {
                        saw_rex_required_8bit = true;
                    }
                    if reg.is_legacy_high_byte() {
                        saw_rex_forbidding_8bit = true;
                    }
                    rex.b = rex.b || reg.needs_rex_extension();
                    *opcode.last_mut().expect("recipe opcode must be non-empty for +r forms") |= reg.field();
                }
                OperandRole::ModrmRm(i) => {
                    let (bits, bytes, fixup) = self.encode_rm(i, recipe)?;
                    mem_fixup = fixup;
                    if let Operand::Register(reg) = &self.operands[i] {
                        if reg.requires_rex() {
                            saw_rex_required_8bit = true;
                        }
                        if reg.is_legacy_high_byte() {
                            saw_rex_forbidding_8bit = true;
                        }
                        if reg.width == 16 && recipe.emits_operand_size_prefix && !prefixes.contains(&0x66) {
                            prefixes.push(0x66);
                        }
                    }
                    if let Operand::Memory(p) = &self.operands[i] {
                        if let Some(pfx) = p.size_override_prefix(self.arch_bits) {
                            if !prefixes.contains(&pfx) {
                                prefixes.push(pfx);
                            }
                        }
                    }
                    rex = rex.merge(bits);
                    rm_bytes = Some((bits, bytes));
                }
                OperandRole::ModrmReg(i) => {
                    let reg = self.operand_register(i)?;
                    if reg.requires_rex() {
                        saw_rex_required_8bit = true;
                    }
                    if reg.is_legacy_high_byte() {
                        saw_rex_forbidding_8bit = true;
                    }
                    if reg.width == 16 && recipe.emits_operand_size_prefix && !prefixes.contains(&0x66) {
                        prefixes.push(0x66);
                    }
                    rex.r = rex.r || reg.needs_rex_extension();
                    modrm_reg = Some(reg.field());
                }
                OperandRole::Immediate(i) => {
                    let declared = recipe.signature[i].bits;
                    trailing.extend(self.immediate_bytes(i, declared)?);
                }
                OperandRole::FixedRegister(i, expected) => {
                    let reg = self.operand_register(i)?;
                    if reg != expected {
                        return Err(AssemblyError::Syntax {
                            reason: format!(
                                "operand {i} to `{}` must be `{expected}` (this opcode has no field to encode a different register)",
                                self.mnemonic
                            ),
                        });
                    }
                }
                OperandRole::Rel(i) => {
                    let declared = recipe.signature[i].bits as usize;
                    match &self.operands[i] {
                        Operand::Label(name) => {
                            rel_fixup = Some((trailing.len(), declared / 8, name.clone()));
                            trailing.extend(std::iter::repeat(0u8).take(declared / 8));
                        }
                        Operand::Immediate(offset) => {
                            trailing.extend(self.immediate_bytes(i, declared as u16)?);
                            let _ = offset;
                        }
                        other => {
                            return Err(AssemblyError::Syntax {
                                reason: format!("operand {other:?} cannot fill a relative-branch slot"),
                            })
                        }
                    }
                }
            }
        }

        if saw_rex_required_8bit && saw_rex_forbidding_8bit {
            return Err(AssemblyError::Syntax {
                reason: "cannot mix ah/ch/dh/bh with spl/bpl/sil/dil or a REX-requiring register in one instruction"
                    .into(),
            });
        }
        if saw_rex_forbidding_8bit && rex.any() {
            return Err(AssemblyError::Syntax {
                reason: "ah/ch/dh/bh cannot be encoded when a REX prefix is otherwise required".into(),
            });
        }

        let reg_field = modrm_reg.or(recipe.opcode_extension);
        let modrm_rm_bytes = match (reg_field, rm_bytes) {
            (Some(field), Some((_, bytes))) => {
                let mut out = vec![(bytes[0] & 0b00_111_111) | ((field & 0b111) << 3)];
                out.extend(&bytes[1..]);
                out
            }
            (None, Some((_, bytes))) => bytes,
            (Some(_), None) | (None, None) => Vec::new(),
        };

        let force_rex = saw_rex_required_8bit;
        prefixes.sort_by(|a, b| b.cmp(a));
        let mut code = prefixes;
        if rex.any() || force_rex {
            code.push(rex.byte());
        }
        code.extend(opcode);
        let modrm_start = code.len();
        code.extend(modrm_rm_bytes);

        if let (Some(_), Some(_)) = (&rel_fixup, &mem_fixup) {
            return Err(AssemblyError::Syntax {
                reason: "an instruction cannot carry both a relative-branch and a memory-operand label fixup".into(),
            });
        }

        if let Some((offset, width_bytes, label)) = rel_fixup {
            let prefix_len = code.len();
            code.extend(trailing);
            return Ok(Encoded::Deferred(Deferred::new_relative_branch(code, prefix_len + offset, width_bytes, label)));
        }

        if let Some(fixup) = mem_fixup {
            code.extend(trailing);
            return Ok(Encoded::Deferred(Deferred::new_label_address(
                code,
                modrm_start + fixup.offset,
                fixup.label,
                fixup.extra_disp,
                fixup.rip_relative,
            )));
        }

        code.extend(trailing);
        Ok(Encoded::Bytes(code))
    }

    fn encode_rm(&self, i: usize, recipe: &Recipe) -> Result<(RexBits, Vec<u8>, Option<modrm::LabelFixup>), AssemblyError> {
        match &self.operands[i] {
            Operand::Register(reg) => {
                let mut b = false;
                let field = {
                    b = reg.needs_rex_extension();
                    reg.field()
                };
                Ok((RexBits { b, ..Default::default() }, vec![0b11_000_000 | field], None))
            }
            Operand::Memory(ptr) => {
                if ptr.reg1.map(|r| r.width) == Some(16) || ptr.reg2.map(|r| r.width) == Some(16) {
                    let (bytes, fixup) = modrm::encode16(ptr, 0)?;
                    Ok((RexBits::default(), bytes, fixup))
                } else {
                    modrm::encode(ptr, 0, self.arch_bits)
                }
            }
            other => Err(AssemblyError::Syntax {
                reason: format!("operand {other:?} cannot fill a ModR/M r/m slot (recipe for `{}`)", self.mnemonic),
            }),
        }
    }
}

/// Assembles a single instruction by mnemonic, looking its recipe table up
/// in the registry and delegating to [`Encoder::assemble`].
pub fn assemble(mnemonic: &str, operands: Vec<Operand>, arch_bits: u16) -> Result<Encoded, AssemblyError> {
    let table = crate::mnemonic::lookup(mnemonic)
        .ok_or_else(|| AssemblyError::UnknownMnemonic(mnemonic.to_string()))?;
    Encoder::new(mnemonic, operands, arch_bits).assemble(&table.recipes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register::gp32::{eax, ebx};
    use crate::register::gp64::{rax, rdi};

    fn bytes(mnemonic: &str, ops: Vec<Operand>) -> Vec<u8> {
        match assemble(mnemonic, ops, 64).unwrap() {
            Encoded::Bytes(b) => b,
            Encoded::Deferred(_) => panic!("expected fully resolved bytes"),
        }
    }

    #[test]
    fn mov_reg_reg_32() {
        // mov eax, ebx -> 89 D8
        assert_eq!(bytes("mov", vec![Operand::Register(eax), Operand::Register(ebx)]), vec![0x89, 0xd8]);
    }

    #[test]
    fn mov_reg_imm_64_needs_rex_w() {
        let code = bytes("mov", vec![Operand::Register(rax), Operand::Immediate(1)]);
        assert_eq!(code[0], 0x48);
        assert_eq!(code[1], 0xb8);
    }

    #[test]
    fn push_register_64() {
        assert_eq!(bytes("push", vec![Operand::Register(rdi)]), vec![0x57]);
    }

    #[test]
    fn ret_bare() {
        assert_eq!(bytes("ret", vec![]), vec![0xc3]);
    }

    #[test]
    fn unknown_mnemonic_errors() {
        assert!(assemble("frobnicate", vec![], 64).is_err());
    }

    #[test]
    fn label_operand_defers() {
        match assemble("jmp", vec![Operand::Label("done".into())], 64).unwrap() {
            Encoded::Deferred(_) => {}
            Encoded::Bytes(_) => panic!("expected a deferred fixup"),
        }
    }
}
