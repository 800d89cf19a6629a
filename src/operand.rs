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

//! Operand values and their classification into a recipe-matching signature
//! (component 4). An [`Operand`] is whatever the textual front-end or a
//! caller assembled an instruction with; a [`Signature`] is the compact
//! shape (`r32`, `m`, `imm8`, `rel32`, ...) used to pick a [`crate::recipe::Recipe`].

use crate::pointer::Pointer;
use crate::register::{Register, RegisterClass};

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Register(Register),
    Memory(Pointer),
    Immediate(i64),
    /// An as-yet-unresolved symbolic address, used by relative branches.
    Label(String),
}

/// The operand-kind half of a [`Signature`] entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Gp,
    Mem,
    /// Recipe-only: accepts either a GP register or memory of the same width.
    GpOrMem,
    Imm,
    /// Hint: this immediate also fits in half the stated width unsigned.
    ImmUnsignedFit,
    Rel,
    Xmm,
    /// Recipe-only: accepts either an xmm register or memory of the same width.
    XmmOrMem,
    Mmx,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SigEntry {
    pub kind: Kind,
    pub bits: u16,
}

pub type Signature = Vec<SigEntry>;

/// Smallest signed width (8/16/32/64) that can hold `value`.
fn smallest_signed_width(value: i64) -> u16 {
    if i8::try_from(value).is_ok() {
        8
    } else if i16::try_from(value).is_ok() {
        16
    } else if i32::try_from(value).is_ok() {
        32
    } else {
        64
    }
}

fn smallest_unsigned_width(value: i64) -> Option<u16> {
    if value < 0 {
        return None;
    }
    let v = value as u64;
    if u8::try_from(v).is_ok() {
        Some(8)
    } else if u16::try_from(v).is_ok() {
        Some(16)
    } else if u32::try_from(v).is_ok() {
        Some(32)
    } else {
        Some(64)
    }
}

impl Operand {
    /// Classifies a single operand the way the reference `read_signature`
    /// does: registers become `r{width}` (or `xmm`/`mm`), memory becomes
    /// `m{width}` (bare `m` when the pointer carries no declared width),
    /// immediates become the smallest signed width with an unsigned-fit
    /// hint when a smaller unsigned encoding also exists, and labels become
    /// `rel32` placeholders pending resolution.
    pub fn classify(&self) -> SigEntry {
        match self {
            Operand::Register(r) => match r.class {
                RegisterClass::Xmm => SigEntry { kind: Kind::Xmm, bits: r.width },
                RegisterClass::Mmx => SigEntry { kind: Kind::Mmx, bits: r.width },
                RegisterClass::Gp | RegisterClass::St => SigEntry { kind: Kind::Gp, bits: r.width },
            },
            Operand::Memory(p) => SigEntry { kind: Kind::Mem, bits: p.bits.map(|b| b.bits()).unwrap_or(0) },
            Operand::Immediate(v) => {
                let signed = smallest_signed_width(*v);
                match smallest_unsigned_width(*v) {
                    Some(u) if u < signed => SigEntry { kind: Kind::ImmUnsignedFit, bits: signed },
                    _ => SigEntry { kind: Kind::Imm, bits: signed },
                }
            }
            Operand::Label(_) => SigEntry { kind: Kind::Rel, bits: 32 },
        }
    }
}

pub fn signature(operands: &[Operand]) -> Signature {
    operands.iter().map(Operand::classify).collect()
}

/// Terse constructors used by the recipe tables in `src/mnemonic/`.
pub fn r(bits: u16) -> SigEntry {
    SigEntry { kind: Kind::Gp, bits }
}
pub fn m(bits: u16) -> SigEntry {
    SigEntry { kind: Kind::Mem, bits }
}
pub fn imm(bits: u16) -> SigEntry {
    SigEntry { kind: Kind::Imm, bits }
}
pub fn rel(bits: u16) -> SigEntry {
    SigEntry { kind: Kind::Rel, bits }
}
pub fn xmm(bits: u16) -> SigEntry {
    SigEntry { kind: Kind::Xmm, bits }
}
pub fn rm(bits: u16) -> SigEntry {
    SigEntry { kind: Kind::GpOrMem, bits }
}
pub fn xmm_or_mem(bits: u16) -> SigEntry {
    SigEntry { kind: Kind::XmmOrMem, bits }
}

/// Match quality of a supplied operand against a recipe's declared slot.
/// `Some(true)` is a fully preferred match; `Some(false)` is encodable but
/// only chosen when no better mode exists (narrower unsigned-immediate
/// fit); `None` rejects the mode outright.
pub fn matches_slot(supplied: SigEntry, slot: SigEntry) -> Option<bool> {
    match slot.kind {
        Kind::Gp => (supplied.kind == Kind::Gp && supplied.bits == slot.bits).then_some(true),
        Kind::Mem => {
            (supplied.kind == Kind::Mem && (slot.bits == 0 || supplied.bits == slot.bits)).then_some(true)
        }
        Kind::GpOrMem => match supplied.kind {
            Kind::Gp if supplied.bits == slot.bits => Some(true),
            Kind::Mem if slot.bits == 0 || supplied.bits == slot.bits => Some(true),
            _ => None,
        },
        Kind::Xmm => (supplied.kind == Kind::Xmm).then_some(true),
        Kind::XmmOrMem => match supplied.kind {
            Kind::Xmm => Some(true),
            Kind::Mem if slot.bits == 0 || supplied.bits == slot.bits => Some(true),
            _ => None,
        },
        Kind::Mmx => (supplied.kind == Kind::Mmx).then_some(true),
        // A label's true displacement isn't known until the code page's
        // label pass runs, so it is always classified as the widest `rel32`
        // placeholder and only matches a recipe row that can hold that.
        Kind::Rel => (supplied.kind == Kind::Rel && slot.bits >= supplied.bits).then_some(true),
        Kind::Imm | Kind::ImmUnsignedFit => {
            if supplied.kind != Kind::Imm && supplied.kind != Kind::ImmUnsignedFit {
                return None;
            }
            if slot.bits >= supplied.bits {
                Some(true)
            } else if supplied.kind == Kind::ImmUnsignedFit && slot.bits >= supplied.bits / 2 {
                Some(false)
            } else {
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register::gp32::eax;

    #[test]
    fn register_operand_classifies_by_width() {
        assert_eq!(Operand::Register(eax).classify(), SigEntry { kind: Kind::Gp, bits: 32 });
    }

    #[test]
    fn small_immediate_prefers_unsigned_hint() {
        // 200 doesn't fit in i8 but fits in u8; smallest signed width is 16.
        let e = Operand::Immediate(200).classify();
        assert_eq!(e.kind, Kind::ImmUnsignedFit);
        assert_eq!(e.bits, 16);
    }

    #[test]
    fn negative_immediate_has_no_unsigned_hint() {
        let e = Operand::Immediate(-5).classify();
        assert_eq!(e.kind, Kind::Imm);
        assert_eq!(e.bits, 8);
    }

    #[test]
    fn bare_pointer_is_width_zero_memory() {
        let e = Operand::Memory(Pointer::reg(eax)).classify();
        assert_eq!(e, SigEntry { kind: Kind::Mem, bits: 0 });
    }
}
