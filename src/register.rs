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

//! The fixed register catalogue (component 1). Every register is plain
//! immutable data: a class, a bit width, a 3-bit ModR/M/SIB field value, an
//! extension flag (REX.R/X/B required), a REX-compatibility constraint, and
//! a diagnostic name. Two `Register` values with the same name compare
//! equal.

use std::fmt;

/// The broad family a register belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterClass {
    Gp,
    Mmx,
    Xmm,
    St,
}

/// Only the 8-bit GP registers are REX-ambiguous: `ah/ch/dh/bh` occupy the
/// same 3-bit field as `spl/bpl/sil/dil` but the two sets are mutually
/// exclusive depending on whether the instruction also carries a REX
/// prefix. Every other width has no such constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RexConstraint {
    /// No constraint: encodable with or without a REX prefix present.
    Any,
    /// Encodable only when the instruction carries no REX prefix at all
    /// (`ah`, `ch`, `dh`, `bh`).
    ForbidsRex,
    /// Encodable only when the instruction carries a REX prefix, even if
    /// no extension bit is set (`spl`, `bpl`, `sil`, `dil`, and trivially
    /// `r8b..r15b` which also set the extension bit).
    RequiresRex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Register {
    pub class: RegisterClass,
    pub width: u16,
    /// 3-bit ModR/M/SIB/opcode-embedded field value.
    field: u8,
    /// True iff this register needs REX.R/REX.X/REX.B set when it occupies
    /// the corresponding slot.
    ext: bool,
    rex: RexConstraint,
    pub name: &'static str,
}

impl Register {
    const fn new(class: RegisterClass, field: u8, ext: bool, rex: RexConstraint, width: u16, name: &'static str) -> Self {
        Register { class, width, field, ext, rex, name }
    }

    pub fn field(&self) -> u8 {
        self.field
    }

    pub fn needs_rex_extension(&self) -> bool {
        self.ext
    }

    pub fn is_legacy_high_byte(&self) -> bool {
        self.rex == RexConstraint::ForbidsRex
    }

    pub fn requires_rex(&self) -> bool {
        self.rex == RexConstraint::RequiresRex
    }

    /// True for members of the *sp family (esp/rsp/r12 low bits == 0b100).
    pub fn is_sp_family(&self) -> bool {
        self.class == RegisterClass::Gp && self.field == 0b100
    }

    /// True for members of the *bp family (ebp/rbp/r13 low bits == 0b101).
    pub fn is_bp_family(&self) -> bool {
        self.class == RegisterClass::Gp && self.field == 0b101
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

macro_rules! plain_row {
    ($class:ident, $width:expr, [$($field:expr => $name:ident),+ $(,)?]) => {
        $(
            pub const $name: Register = Register::new(RegisterClass::$class, $field, false, RexConstraint::Any, $width, stringify!($name));
        )+
    };
}

macro_rules! ext_row {
    ($class:ident, $width:expr, [$($field:expr => $name:ident),+ $(,)?]) => {
        $(
            pub const $name: Register = Register::new(RegisterClass::$class, $field, true, RexConstraint::RequiresRex, $width, stringify!($name));
        )+
    };
}

pub mod gp8 {
    use super::*;
    plain_row!(Gp, 8, [0 => al, 1 => cl, 2 => dl, 3 => bl]);
    pub const ah: Register = Register::new(RegisterClass::Gp, 4, false, RexConstraint::ForbidsRex, 8, "ah");
    pub const ch: Register = Register::new(RegisterClass::Gp, 5, false, RexConstraint::ForbidsRex, 8, "ch");
    pub const dh: Register = Register::new(RegisterClass::Gp, 6, false, RexConstraint::ForbidsRex, 8, "dh");
    pub const bh: Register = Register::new(RegisterClass::Gp, 7, false, RexConstraint::ForbidsRex, 8, "bh");
    pub const spl: Register = Register::new(RegisterClass::Gp, 4, false, RexConstraint::RequiresRex, 8, "spl");
    pub const bpl: Register = Register::new(RegisterClass::Gp, 5, false, RexConstraint::RequiresRex, 8, "bpl");
    pub const sil: Register = Register::new(RegisterClass::Gp, 6, false, RexConstraint::RequiresRex, 8, "sil");
    pub const dil: Register = Register::new(RegisterClass::Gp, 7, false, RexConstraint::RequiresRex, 8, "dil");
    ext_row!(Gp, 8, [
        0 => r8b, 1 => r9b, 2 => r10b, 3 => r11b, 4 => r12b, 5 => r13b, 6 => r14b, 7 => r15b,
    ]);
}

pub mod gp16 {
    use super::*;
    plain_row!(Gp, 16, [0 => ax, 1 => cx, 2 => dx, 3 => bx, 4 => sp, 5 => bp, 6 => si, 7 => di]);
    ext_row!(Gp, 16, [
        0 => r8w, 1 => r9w, 2 => r10w, 3 => r11w, 4 => r12w, 5 => r13w, 6 => r14w, 7 => r15w,
    ]);
}

pub mod gp32 {
    use super::*;
    plain_row!(Gp, 32, [0 => eax, 1 => ecx, 2 => edx, 3 => ebx, 4 => esp, 5 => ebp, 6 => esi, 7 => edi]);
    ext_row!(Gp, 32, [
        0 => r8d, 1 => r9d, 2 => r10d, 3 => r11d, 4 => r12d, 5 => r13d, 6 => r14d, 7 => r15d,
    ]);
}

pub mod gp64 {
    use super::*;
    plain_row!(Gp, 64, [0 => rax, 1 => rcx, 2 => rdx, 3 => rbx, 4 => rsp, 5 => rbp, 6 => rsi, 7 => rdi]);
    ext_row!(Gp, 64, [
        0 => r8, 1 => r9, 2 => r10, 3 => r11, 4 => r12, 5 => r13, 6 => r14, 7 => r15,
    ]);
}

pub mod mmx {
    use super::*;
    plain_row!(Mmx, 64, [0 => mm0, 1 => mm1, 2 => mm2, 3 => mm3, 4 => mm4, 5 => mm5, 6 => mm6, 7 => mm7]);
}

/// xmm0-xmm15: the original_source reference catalogue this crate is
/// grounded on only modelled xmm0-xmm7; xmm8-xmm15 are supplied here as a
/// direct supplement (they need REX.R/REX.B the same way r8-r15 do).
pub mod xmm {
    use super::*;
    plain_row!(Xmm, 128, [0 => xmm0, 1 => xmm1, 2 => xmm2, 3 => xmm3, 4 => xmm4, 5 => xmm5, 6 => xmm6, 7 => xmm7]);
    ext_row!(Xmm, 128, [
        0 => xmm8, 1 => xmm9, 2 => xmm10, 3 => xmm11, 4 => xmm12, 5 => xmm13, 6 => xmm14, 7 => xmm15,
    ]);
}

pub mod st {
    use super::*;
    plain_row!(St, 80, [0 => st0, 1 => st1, 2 => st2, 3 => st3, 4 => st4, 5 => st5, 6 => st6, 7 => st7]);
}

/// The calling-convention register aliases exposed by the textual front-end
/// (§6). Empty slices mean the platform is stack-based for that kind of
/// argument (32-bit has no register-argument lists at all).
pub struct CallingConvention {
    pub int_args: &'static [Register],
    pub float_args: &'static [Register],
}

pub const UNIX_X64_CC: CallingConvention = CallingConvention {
    int_args: &[gp64::rdi, gp64::rsi, gp64::rdx, gp64::rcx, gp64::r8, gp64::r9],
    float_args: &[
        xmm::xmm0, xmm::xmm1, xmm::xmm2, xmm::xmm3,
        xmm::xmm4, xmm::xmm5, xmm::xmm6, xmm::xmm7,
    ],
};

pub const WINDOWS_X64_CC: CallingConvention = CallingConvention {
    int_args: &[gp64::rcx, gp64::rdx, gp64::r8, gp64::r9],
    float_args: &[xmm::xmm0, xmm::xmm1, xmm::xmm2, xmm::xmm3],
};

pub const X86_CC: CallingConvention = CallingConvention { int_args: &[], float_args: &[] };

/// Looks a register up by its textual-front-end name (lower-case).
pub fn by_name(name: &str) -> Option<Register> {
    const ALL: &[&[Register]] = &[
        &[
            gp8::al, gp8::cl, gp8::dl, gp8::bl, gp8::ah, gp8::ch, gp8::dh, gp8::bh,
            gp8::spl, gp8::bpl, gp8::sil, gp8::dil,
            gp8::r8b, gp8::r9b, gp8::r10b, gp8::r11b, gp8::r12b, gp8::r13b, gp8::r14b, gp8::r15b,
        ],
        &[
            gp16::ax, gp16::cx, gp16::dx, gp16::bx, gp16::sp, gp16::bp, gp16::si, gp16::di,
            gp16::r8w, gp16::r9w, gp16::r10w, gp16::r11w, gp16::r12w, gp16::r13w, gp16::r14w, gp16::r15w,
        ],
        &[
            gp32::eax, gp32::ecx, gp32::edx, gp32::ebx, gp32::esp, gp32::ebp, gp32::esi, gp32::edi,
            gp32::r8d, gp32::r9d, gp32::r10d, gp32::r11d, gp32::r12d, gp32::r13d, gp32::r14d, gp32::r15d,
        ],
        &[
            gp64::rax, gp64::rcx, gp64::rdx, gp64::rbx, gp64::rsp, gp64::rbp, gp64::rsi, gp64::rdi,
            gp64::r8, gp64::r9, gp64::r10, gp64::r11, gp64::r12, gp64::r13, gp64::r14, gp64::r15,
        ],
        &[mmx::mm0, mmx::mm1, mmx::mm2, mmx::mm3, mmx::mm4, mmx::mm5, mmx::mm6, mmx::mm7],
        &[
            xmm::xmm0, xmm::xmm1, xmm::xmm2, xmm::xmm3, xmm::xmm4, xmm::xmm5, xmm::xmm6, xmm::xmm7,
            xmm::xmm8, xmm::xmm9, xmm::xmm10, xmm::xmm11, xmm::xmm12, xmm::xmm13, xmm::xmm14, xmm::xmm15,
        ],
        &[st::st0, st::st1, st::st2, st::st3, st::st4, st::st5, st::st6, st::st7],
    ];
    for row in ALL {
        for reg in *row {
            if reg.name == name {
                return Some(*reg);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_names_are_equal() {
        assert_eq!(gp32::eax, gp32::eax);
        assert_ne!(gp32::eax, gp32::ecx);
    }

    #[test]
    fn extended_registers_need_rex() {
        assert!(gp64::r8.needs_rex_extension());
        assert!(!gp64::rax.needs_rex_extension());
    }

    #[test]
    fn field_masks_to_three_bits() {
        assert_eq!(gp64::r12.field(), 0b100);
        assert!(gp64::r12.is_sp_family());
    }

    #[test]
    fn eight_bit_rex_ambiguity_is_disambiguated() {
        assert_eq!(gp8::ah.field(), gp8::spl.field());
        assert!(gp8::ah.is_legacy_high_byte());
        assert!(gp8::spl.requires_rex());
        assert!(!gp8::al.requires_rex() && !gp8::al.is_legacy_high_byte());
    }

    #[test]
    fn by_name_round_trips() {
        assert_eq!(by_name("rdi"), Some(gp64::rdi));
        assert_eq!(by_name("xmm9"), Some(xmm::xmm9));
        assert_eq!(by_name("nope"), None);
    }
}
