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

//! Effective-address values (component 2): `[reg1 + scale*reg2 + disp]`, or
//! a label reference in place of the registers. Built up with `+`/`-`/`*`,
//! each operator fallible since not every combination of operands is a
//! legal address; `src/parser/operand_builder.rs` folds a bracketed
//! expression down to a `Pointer` with exactly these operators.

use std::ops::{Add, Mul, Sub};

use crate::errors::AssemblyError;
use crate::register::{Register, RegisterClass};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataWidth {
    Byte,
    Word,
    Dword,
    Qword,
}

impl DataWidth {
    pub fn bits(self) -> u16 {
        match self {
            DataWidth::Byte => 8,
            DataWidth::Word => 16,
            DataWidth::Dword => 32,
            DataWidth::Qword => 64,
        }
    }
}

/// An effective address: up to two GP registers (one optionally scaled) plus
/// a constant displacement, and/or a symbolic label. A bare `Pointer` with no
/// registers at all is a pure absolute/rip-relative-style displacement; a
/// `Pointer` carrying a `label` addresses that label's resolved offset
/// within this same code page instead of (or in addition to, via `disp`) a
/// literal displacement — see `label` below for why it cannot combine with a
/// base/index register.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Pointer {
    pub reg1: Option<Register>,
    pub scale: Option<u8>,
    pub reg2: Option<Register>,
    pub disp: Option<i64>,
    pub bits: Option<DataWidth>,
    pub label: Option<String>,
}

impl Pointer {
    pub fn disp(disp: i64) -> Self {
        Pointer { disp: Some(disp), ..Default::default() }
    }

    pub fn reg(reg: Register) -> Self {
        Pointer { reg1: Some(reg), ..Default::default() }
    }

    /// A symbolic address (`[some_label]`, optionally `+ disp`): resolved
    /// once the code page's label pass runs, the same way a relative
    /// branch's target is. Every label lives in the page being assembled, so
    /// unlike a register base this can only ever mean "this label's own
    /// address" — combining it with a base/index register has no coherent
    /// encoding here and is rejected in `merge`/`add_register`.
    pub fn label(name: impl Into<String>) -> Self {
        Pointer { label: Some(name.into()), ..Default::default() }
    }

    pub fn with_width(mut self, bits: DataWidth) -> Self {
        self.bits = Some(bits);
        self
    }

    fn check_gp(reg: Register) -> Result<(), AssemblyError> {
        if reg.class != RegisterClass::Gp {
            return Err(AssemblyError::Pointer {
                reason: format!("register `{}` cannot appear in an effective address", reg),
            });
        }
        if reg.width < 16 {
            return Err(AssemblyError::Pointer {
                reason: format!("register `{}` is too narrow for address arithmetic", reg),
            });
        }
        Ok(())
    }

    /// Appends a bare (unscaled) register, filling `reg1` then `reg2`.
    fn add_register(mut self, reg: Register) -> Result<Self, AssemblyError> {
        Pointer::check_gp(reg)?;
        if self.label.is_some() {
            return Err(AssemblyError::Pointer {
                reason: "a label-addressed effective address cannot also carry a base/index register".into(),
            });
        }
        if let Some(existing) = self.reg1.or(self.reg2) {
            if existing.width != reg.width {
                return Err(AssemblyError::Pointer {
                    reason: format!(
                        "cannot mix `{existing}` and `{reg}` of different widths in an effective address"
                    ),
                });
            }
        }
        if self.reg1.is_none() {
            self.reg1 = Some(reg);
        } else if self.reg2.is_none() {
            self.reg2 = Some(reg);
        } else {
            return Err(AssemblyError::Pointer {
                reason: "an effective address cannot incorporate more than two registers".into(),
            });
        }
        Ok(self)
    }

    fn add_disp(mut self, disp: i64) -> Self {
        self.disp = Some(self.disp.unwrap_or(0) + disp);
        self
    }

    fn merge(mut self, other: Pointer) -> Result<Self, AssemblyError> {
        if other.label.is_some() && (self.reg1.is_some() || self.reg2.is_some()) {
            return Err(AssemblyError::Pointer {
                reason: "a label-addressed effective address cannot also carry a base/index register".into(),
            });
        }
        if self.label.is_some() && (other.reg1.is_some() || other.reg2.is_some() || other.scale.is_some()) {
            return Err(AssemblyError::Pointer {
                reason: "a label-addressed effective address cannot also carry a base/index register".into(),
            });
        }
        if other.label.is_some() && self.label.is_some() {
            return Err(AssemblyError::Pointer { reason: "an effective address cannot carry two labels".into() });
        }
        if let Some(d) = other.disp {
            self = self.add_disp(d);
        }
        if let Some(lbl) = other.label {
            self.label = Some(lbl);
        }
        if let Some(r2) = other.reg2 {
            self = self.add_register(r2)?;
        }
        match (other.reg1, other.scale) {
            (Some(r1), None) => {
                self = self.add_register(r1)?;
            }
            (Some(r1), Some(scale)) => {
                Pointer::check_gp(r1)?;
                if self.scale.is_some() {
                    return Err(AssemblyError::Pointer {
                        reason: "an effective address can only hold one scaled register".into(),
                    });
                }
                if self.reg1.is_some() {
                    if self.reg2.is_some() {
                        return Err(AssemblyError::Pointer {
                            reason: "an effective address cannot incorporate more than two registers".into(),
                        });
                    }
                    self.reg2 = self.reg1;
                }
                self.reg1 = Some(r1);
                self.scale = Some(scale);
            }
            (None, _) => {}
        }
        Ok(self)
    }

    /// `0x67` address-size override, required when the address registers are
    /// the narrower of the two widths legal on this architecture (e.g. 32-bit
    /// registers inside 64-bit code).
    pub fn size_override_prefix(&self, arch_bits: u16) -> Option<u8> {
        let widths: Vec<u16> = [self.reg1, self.reg2].into_iter().flatten().map(|r| r.width).collect();
        let max = widths.into_iter().max()?;
        if max == arch_bits / 2 {
            Some(0x67)
        } else {
            None
        }
    }
}

impl Add<Register> for Pointer {
    type Output = Result<Pointer, AssemblyError>;
    fn add(self, rhs: Register) -> Self::Output {
        self.add_register(rhs)
    }
}

impl Add<i64> for Pointer {
    type Output = Result<Pointer, AssemblyError>;
    fn add(self, rhs: i64) -> Self::Output {
        Ok(self.add_disp(rhs))
    }
}

impl Sub<i64> for Pointer {
    type Output = Result<Pointer, AssemblyError>;
    fn sub(self, rhs: i64) -> Self::Output {
        Ok(self.add_disp(-rhs))
    }
}

impl Add<Pointer> for Pointer {
    type Output = Result<Pointer, AssemblyError>;
    fn add(self, rhs: Pointer) -> Self::Output {
        self.merge(rhs)
    }
}

impl Add<Pointer> for Register {
    type Output = Result<Pointer, AssemblyError>;
    fn add(self, rhs: Pointer) -> Self::Output {
        Pointer::reg(self).merge(rhs)
    }
}

impl Add<Register> for Register {
    type Output = Result<Pointer, AssemblyError>;
    fn add(self, rhs: Register) -> Self::Output {
        Pointer::reg(self).add_register(rhs)
    }
}

impl Add<i64> for Register {
    type Output = Result<Pointer, AssemblyError>;
    fn add(self, rhs: i64) -> Self::Output {
        Ok(Pointer::reg(self).add_disp(rhs))
    }
}

/// `Pointer + label -> attach label; two labels -> error` (also rejects
/// attaching a label onto a pointer that already carries a base/index
/// register, per [`Pointer::label`]'s doc comment).
impl Add<String> for Pointer {
    type Output = Result<Pointer, AssemblyError>;
    fn add(self, rhs: String) -> Self::Output {
        self.merge(Pointer::label(rhs))
    }
}

impl Add<String> for Register {
    type Output = Result<Pointer, AssemblyError>;
    fn add(self, rhs: String) -> Self::Output {
        Pointer::reg(self).merge(Pointer::label(rhs))
    }
}

/// `reg * scale`, the entry point for building a SIB-scaled address term.
/// Only 1, 2, 4, and 8 are legal scale factors.
impl Mul<u8> for Register {
    type Output = Result<Pointer, AssemblyError>;
    fn mul(self, scale: u8) -> Self::Output {
        Pointer::check_gp(self)?;
        if ![1, 2, 4, 8].contains(&scale) {
            return Err(AssemblyError::Pointer { reason: format!("invalid SIB scale factor {scale}") });
        }
        Ok(Pointer { reg1: Some(self), scale: Some(scale), ..Default::default() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register::gp64;

    #[test]
    fn disp_plus_register() {
        let p = (Pointer::disp(0x10) + gp64::rax).unwrap();
        assert_eq!(p.reg1, Some(gp64::rax));
        assert_eq!(p.disp, Some(0x10));
    }

    #[test]
    fn scaled_index_plus_base() {
        let p = ((gp64::rbx * 4).unwrap() + gp64::rax).unwrap();
        assert_eq!(p.reg1, Some(gp64::rbx));
        assert_eq!(p.scale, Some(4));
        assert_eq!(p.reg2, Some(gp64::rax));
    }

    #[test]
    fn three_registers_rejected() {
        let p = (gp64::rax + gp64::rbx).unwrap();
        assert!((p + gp64::rcx).is_err());
    }

    #[test]
    fn mismatched_width_rejected() {
        assert!((gp64::rax + crate::register::gp32::ebx).is_err());
    }

    #[test]
    fn label_attaches_to_bare_pointer() {
        let p = (Pointer::disp(0) + "counter".to_string()).unwrap();
        assert_eq!(p.label.as_deref(), Some("counter"));
    }

    #[test]
    fn label_plus_displacement_composes() {
        let p = (Pointer::label("counter") + 4i64).unwrap();
        assert_eq!(p.label.as_deref(), Some("counter"));
        assert_eq!(p.disp, Some(4));
    }

    #[test]
    fn two_labels_rejected() {
        let p = Pointer::label("a");
        assert!((p + "b".to_string()).is_err());
    }

    #[test]
    fn label_with_base_register_rejected() {
        assert!((gp64::rax + "counter".to_string()).is_err());
        assert!((Pointer::label("counter") + gp64::rax).is_err());
    }
}
