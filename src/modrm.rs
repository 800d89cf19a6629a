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

//! ModR/M and SIB byte construction (component 3). These are the bytes that
//! turn a [`Pointer`](crate::pointer::Pointer) or a bare register into the
//! `r/m` half of an instruction, tracking which REX extension bits each
//! field needs along the way.

use crate::errors::AssemblyError;
use crate::pointer::Pointer;
use crate::register::Register;

/// The REX.W/R/X/B bits accumulated while building a ModR/M+SIB sequence.
/// Combine two of these with `|` before folding into the final REX byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RexBits {
    pub w: bool,
    pub r: bool,
    pub x: bool,
    pub b: bool,
}

impl RexBits {
    pub fn merge(self, other: RexBits) -> RexBits {
        RexBits {
            w: self.w || other.w,
            r: self.r || other.r,
            x: self.x || other.x,
            b: self.b || other.b,
        }
    }

    pub fn any(self) -> bool {
        self.w || self.r || self.x || self.b
    }

    /// `0100WRXB`, only meaningful when at least one bit is set or an 8-bit
    /// REX-requiring register forces the prefix to appear anyway.
    pub fn byte(self) -> u8 {
        0b0100_0000
            | (self.w as u8) << 3
            | (self.r as u8) << 2
            | (self.x as u8) << 1
            | (self.b as u8)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mod {
    Ind,
    Ind8,
    Ind32,
    Direct,
}

impl Mod {
    fn bits(self) -> u8 {
        match self {
            Mod::Ind => 0b00,
            Mod::Ind8 => 0b01,
            Mod::Ind32 => 0b10,
            Mod::Direct => 0b11,
        }
    }
}

/// `reg`'s 3-bit field plus its REX.R/B contribution, for either the
/// ModR/M.reg slot or a direct-register ModR/M.r/m slot.
fn reg_rex(reg: Register, bit: &mut bool) -> u8 {
    *bit = reg.needs_rex_extension();
    reg.field()
}

fn mod_reg_rm(mod_: Mod, reg_field: u8, rm_field: u8) -> u8 {
    (mod_.bits() << 6) | (reg_field << 3) | rm_field
}

/// Builds a direct-register ModR/M byte (`mod == 11`), as used for
/// register-to-register forms.
pub fn direct(reg: Register, rm: Register) -> (RexBits, u8) {
    let mut rex = RexBits::default();
    let mut r = false;
    let reg_field = reg_rex(reg, &mut r);
    rex.r = r;
    let mut b = false;
    let rm_field = reg_rex(rm, &mut b);
    rex.b = b;
    (rex, mod_reg_rm(Mod::Direct, reg_field, rm_field))
}

/// Builds a ModR/M byte whose reg field carries an opcode-extension digit
/// (`/0`..`/7`) rather than a register, with a direct-register r/m.
pub fn direct_digit(digit: u8, rm: Register) -> (RexBits, u8) {
    let mut rex = RexBits::default();
    let mut b = false;
    let rm_field = reg_rex(rm, &mut b);
    rex.b = b;
    (rex, mod_reg_rm(Mod::Direct, digit, rm_field))
}

fn sib(scale_pow: u8, index: Register, base: Register) -> (RexBits, u8) {
    let mut rex = RexBits::default();
    rex.x = index.needs_rex_extension();
    rex.b = base.needs_rex_extension();
    (rex, (scale_pow << 6) | (index.field() << 3) | base.field())
}

fn pack_disp8(disp: i64) -> Option<[u8; 1]> {
    i8::try_from(disp).ok().map(|d| [d as u8])
}

fn pack_disp32(disp: i64) -> Option<[u8; 4]> {
    i32::try_from(disp).ok().map(|d| d.to_le_bytes())
}

/// A still-unresolved label reference inside a memory operand's
/// displacement, reported alongside the placeholder bytes `encode`/
/// `encode16` already emitted for it. `offset` is the index into the bytes
/// vec returned alongside this fixup (stable regardless of any later
/// ModR/M.reg field getting OR'd into byte 0).
#[derive(Debug, Clone)]
pub struct LabelFixup {
    pub label: String,
    pub offset: usize,
    pub width: usize,
    pub extra_disp: i64,
    /// 64-bit code addresses the label RIP-relative (displacement from the
    /// byte following this instruction); 32-bit/16-bit code has no RIP-
    /// relative form and addresses it as an absolute displacement.
    pub rip_relative: bool,
}

/// Encodes `ptr` as the r/m operand with `reg_field` (either a register's
/// field or an opcode-extension digit) in ModR/M.reg. Mirrors the reference
/// `Pointer.modrm_sib` special cases: `*sp` forces a SIB byte, `*bp`/`rbp`
/// forces an explicit zero displacement, and a register-free pointer is
/// RIP-relative-shaped (SIB base=101 on 64-bit, disp32 directly on 32-bit).
pub fn encode(
    ptr: &Pointer,
    reg_field: u8,
    arch_bits: u16,
) -> Result<(RexBits, Vec<u8>, Option<LabelFixup>), AssemblyError> {
    if let (Some(r1), Some(r2)) = (ptr.reg1, ptr.reg2) {
        if r1.width != r2.width {
            return Err(AssemblyError::Pointer {
                reason: "effective address registers must share a width".into(),
            });
        }
    }

    if let Some(label) = &ptr.label {
        // `Pointer::label` guarantees reg1/reg2/scale are all None whenever
        // label is set, so this is the only case that needs handling. `rm =
        // 101` with `mod = 00` is the RIP-relative encoding on 64-bit and the
        // flat-disp32 encoding on 32-bit; 16-bit code has no such form.
        if arch_bits == 16 {
            return Err(AssemblyError::Pointer {
                reason: "label-addressed memory operands are not supported in 16-bit addressing".into(),
            });
        }
        let extra_disp = ptr.disp.unwrap_or(0);
        let rip_relative = arch_bits == 64;
        let modrm = mod_reg_rm(Mod::Ind, reg_field, 0b101);
        let fixup = LabelFixup { label: label.clone(), offset: 1, width: 4, extra_disp, rip_relative };
        return Ok((RexBits::default(), vec![modrm, 0, 0, 0, 0], Some(fixup)));
    }

    let disp8 = ptr.disp.filter(|&d| d != 0).and_then(pack_disp8);
    let disp32 = ptr.disp.filter(|&d| d != 0).and_then(pack_disp32);

    if let Some(scale) = ptr.scale {
        let scale_pow = match scale {
            1 => 0u8,
            2 => 1,
            4 => 2,
            8 => 3,
            _ => return Err(AssemblyError::Pointer { reason: format!("invalid SIB scale {scale}") }),
        };
        let index = ptr.reg1.ok_or_else(|| AssemblyError::Pointer {
            reason: "a scaled effective address needs an index register".into(),
        })?;
        let (mut mod_, disp_bytes): (Mod, Vec<u8>) = match (ptr.reg2, &disp8, &disp32) {
            (Some(base), _, _) if base.is_bp_family() && disp8.is_none() && disp32.is_none() => {
                (Mod::Ind8, vec![0])
            }
            (_, Some(d), _) => (Mod::Ind8, d.to_vec()),
            (_, None, Some(d)) => (Mod::Ind32, d.to_vec()),
            _ => (Mod::Ind, vec![]),
        };
        let base = match ptr.reg2 {
            Some(base) => base,
            None => {
                mod_ = Mod::Ind;
                crate::register::gp64::rbp
            }
        };
        let disp_bytes = if ptr.reg2.is_none() {
            let mut v = disp_bytes;
            v.resize(4, 0);
            v
        } else {
            disp_bytes
        };
        let (mrex, modrm) = (RexBits::default(), mod_reg_rm(mod_, reg_field, 0b100));
        let (srex, sib_byte) = sib(scale_pow, index, base);
        let mut out = vec![modrm, sib_byte];
        out.extend(disp_bytes);
        return Ok((mrex.merge(srex), out, None));
    }

    match (ptr.reg1, ptr.reg2) {
        (None, None) => {
            let disp = ptr.disp.unwrap_or(0);
            if arch_bits == 32 {
                let modrm = mod_reg_rm(Mod::Ind, reg_field, 0b101);
                Ok((RexBits::default(), {
                    let mut v = vec![modrm];
                    v.extend((disp as i32).to_le_bytes());
                    v
                }, None))
            } else {
                let modrm = mod_reg_rm(Mod::Ind, reg_field, 0b100);
                let (srex, sib_byte) = sib(0, crate::register::gp64::rsp, crate::register::gp64::rbp);
                let mut v = vec![modrm, sib_byte];
                v.extend((disp as i32).to_le_bytes());
                Ok((srex, v, None))
            }
        }
        (Some(single), None) => {
            if single.is_sp_family() {
                let (mod_, disp_bytes) = match (&disp8, &disp32) {
                    (Some(d), _) => (Mod::Ind8, d.to_vec()),
                    (None, Some(d)) => (Mod::Ind32, d.to_vec()),
                    (None, None) => (Mod::Ind, vec![]),
                };
                let (mrex, modrm) = (RexBits::default(), mod_reg_rm(mod_, reg_field, 0b100));
                let (srex, sib_byte) = sib(0, crate::register::gp64::rsp, single);
                let mut v = vec![modrm, sib_byte];
                v.extend(disp_bytes);
                Ok((mrex.merge(srex), v, None))
            } else if single.is_bp_family() && disp8.is_none() && disp32.is_none() {
                let modrm = mod_reg_rm(Mod::Ind8, reg_field, single.field());
                let mut b = false;
                let _ = reg_rex(single, &mut b);
                Ok((RexBits { b, ..Default::default() }, vec![modrm, 0], None))
            } else {
                let (mut b, mod_, disp_bytes) = match (&disp8, &disp32) {
                    (Some(d), _) => (false, Mod::Ind8, d.to_vec()),
                    (None, Some(d)) => (false, Mod::Ind32, d.to_vec()),
                    (None, None) => (false, Mod::Ind, vec![]),
                };
                let field = reg_rex(single, &mut b);
                let modrm = mod_reg_rm(mod_, reg_field, field);
                let mut v = vec![modrm];
                v.extend(disp_bytes);
                Ok((RexBits { b, ..Default::default() }, v, None))
            }
        }
        (Some(r1), Some(r2)) => {
            let mut regs = [r2, r1];
            if regs[0].is_sp_family() {
                if regs[1].is_sp_family() {
                    return Err(AssemblyError::Pointer {
                        reason: "cannot encode two stack-pointer registers in one SIB address".into(),
                    });
                }
                regs.swap(0, 1);
            }
            let (mod_, disp_bytes) = if regs[1].is_bp_family() && disp8.is_none() && disp32.is_none() {
                (Mod::Ind8, vec![0])
            } else {
                match (&disp8, &disp32) {
                    (Some(d), _) => (Mod::Ind8, d.to_vec()),
                    (None, Some(d)) => (Mod::Ind32, d.to_vec()),
                    (None, None) => (Mod::Ind, vec![]),
                }
            };
            let modrm = mod_reg_rm(mod_, reg_field, 0b100);
            let (srex, sib_byte) = sib(0, regs[0], regs[1]);
            let mut v = vec![modrm, sib_byte];
            v.extend(disp_bytes);
            Ok((srex, v, None))
        }
    }
}

/// 16-bit addressing mode has its own fixed r/m table and never uses SIB or
/// REX; grounded on the reference `Pointer.modrm16`. Label-addressed operands
/// have no disp16-sized encoding this JIT emits, so they're rejected here
/// rather than silently truncated.
pub fn encode16(ptr: &Pointer, reg_field: u8) -> Result<(Vec<u8>, Option<LabelFixup>), AssemblyError> {
    use crate::register::gp16::{bp, bx, di, si};
    if ptr.scale.is_some() {
        return Err(AssemblyError::Pointer { reason: "SIB scale is not valid in 16-bit addressing".into() });
    }
    if ptr.label.is_some() {
        return Err(AssemblyError::Pointer {
            reason: "label-addressed memory operands are not supported in 16-bit addressing".into(),
        });
    }
    let mut regs: Vec<Register> = [ptr.reg1, ptr.reg2].into_iter().flatten().collect();
    regs.sort_by_key(|r| r.name);
    let rm = match regs.as_slice() {
        [a, b] if *a == bx && *b == si => 0b000,
        [a, b] if *a == bx && *b == di => 0b001,
        [a, b] if *a == bp && *b == si => 0b010,
        [a, b] if *a == bp && *b == di => 0b011,
        [r] if *r == si => 0b100,
        [r] if *r == di => 0b101,
        [r] if *r == bp => 0b110,
        [r] if *r == bx => 0b111,
        [] => 0b110,
        _ => return Err(AssemblyError::Pointer { reason: "invalid 16-bit effective address".into() }),
    };

    let (mod_bits, disp): (u8, Vec<u8>) = match ptr.disp {
        None | Some(0) if regs == [bp] => (0b01, vec![0]),
        None | Some(0) => (0b00, vec![]),
        Some(d) if regs.is_empty() => (0b00, (d as i16).to_le_bytes().to_vec()),
        Some(d) => match pack_disp8(d) {
            Some(b) => (0b01, b.to_vec()),
            None => (0b10, (d as i16).to_le_bytes().to_vec()),
        },
    };

    let modrm = (mod_bits << 6) | (reg_field << 3) | rm;
    let mut out = vec![modrm];
    out.extend(disp);
    Ok((out, None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register::gp32::{eax, ebx};
    use crate::register::gp64::{r12, rax, rbp, rbx, rsp};

    #[test]
    fn direct_register_to_register() {
        let (rex, byte) = direct(rax, rbx);
        assert!(!rex.any());
        assert_eq!(byte, 0b11_000_011);
    }

    #[test]
    fn single_register_no_disp() {
        let ptr = Pointer::reg(rax);
        let (rex, bytes, fixup) = encode(&ptr, 0, 64).unwrap();
        assert!(!rex.any());
        assert_eq!(bytes, vec![0b00_000_000]);
        assert!(fixup.is_none());
    }

    #[test]
    fn sp_family_forces_sib() {
        let ptr = Pointer::reg(rsp);
        let (_, bytes, _) = encode(&ptr, 0, 64).unwrap();
        assert_eq!(bytes[0] & 0b111, 0b100);
        assert_eq!(bytes[0] >> 6, 0b00);
    }

    #[test]
    fn sp_family_with_disp8_uses_ind8_mod() {
        let ptr = (Pointer::reg(rsp) + 0x10i64).unwrap();
        let (_, bytes, _) = encode(&ptr, 0, 64).unwrap();
        // mov eax, [rsp+0x10] -> modrm=44, sib=24, disp8=10
        assert_eq!(bytes, vec![0b01_000_100, 0b00_100_100, 0x10]);
    }

    #[test]
    fn r12_with_disp8_uses_ind8_mod() {
        let ptr = (Pointer::reg(r12) + 0x10i64).unwrap();
        let (rex, bytes, _) = encode(&ptr, 0, 64).unwrap();
        assert!(rex.b);
        assert_eq!(bytes[0] >> 6, 0b01);
        assert_eq!(bytes.last().copied(), Some(0x10));
    }

    #[test]
    fn bp_family_needs_explicit_disp8() {
        let ptr = Pointer::reg(rbp);
        let (_, bytes, _) = encode(&ptr, 0, 64).unwrap();
        assert_eq!(bytes, vec![0b01_000_101, 0]);
    }

    #[test]
    fn extended_register_sets_rex_b() {
        let ptr = Pointer::reg(r12);
        let (rex, _, _) = encode(&ptr, 0, 64).unwrap();
        assert!(rex.b || rex.any());
    }

    #[test]
    fn two_stack_pointers_rejected() {
        let ptr = Pointer { reg1: Some(rsp), reg2: Some(rsp), ..Default::default() };
        assert!(encode(&ptr, 0, 64).is_err());
    }

    #[test]
    fn sixteen_bit_bx_si() {
        use crate::register::gp16::{bx, si};
        let ptr = Pointer { reg1: Some(bx), reg2: Some(si), ..Default::default() };
        let (bytes, _) = encode16(&ptr, 0).unwrap();
        assert_eq!(bytes, vec![0b00_000_000]);
    }

    #[test]
    fn mismatched_width_regs_rejected() {
        let ptr = Pointer { reg1: Some(rax), reg2: Some(ebx), ..Default::default() };
        let _ = eax;
        assert!(encode(&ptr, 0, 64).is_err());
        let _ = rbx;
    }

    #[test]
    fn label_address_produces_fixup() {
        let ptr = Pointer::label("counter");
        let (rex, bytes, fixup) = encode(&ptr, 0, 64).unwrap();
        assert!(!rex.any());
        assert_eq!(bytes[0] & 0b111, 0b101);
        assert_eq!(bytes[0] >> 6, 0b00);
        let fixup = fixup.expect("label operand must report a fixup");
        assert_eq!(fixup.label, "counter");
        assert_eq!(fixup.offset, 1);
        assert_eq!(fixup.width, 4);
        assert!(fixup.rip_relative);
    }

    #[test]
    fn label_address_disp32_on_32bit() {
        let ptr = Pointer::label("counter");
        let (_, _, fixup) = encode(&ptr, 0, 32).unwrap();
        assert!(!fixup.unwrap().rip_relative);
    }

    #[test]
    fn label_with_sixteen_bit_address_rejected() {
        let ptr = Pointer::label("counter");
        assert!(encode(&ptr, 0, 16).is_err());
        assert!(encode16(&ptr, 0).is_err());
    }
}
