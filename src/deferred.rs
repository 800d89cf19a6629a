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

//! Deferred buffer (component 4.8): machine code with one pending label
//! fixup, resolved once the code page's label pass has located every symbol.
//! Grounded on the reference `Code` class, but closed over exactly the two
//! expression shapes this assembler ever needs — `label - next_instr_addr`
//! for a relative branch, `target [- next_instr_addr] + extra_disp` for a
//! label-addressed memory operand — rather than the reference's arbitrary
//! `eval()` over the whole symbol table.

use std::collections::HashMap;

use crate::errors::AssemblyError;

/// The one evaluation a pending fixup ever needs: either a relative branch's
/// `label - next_instr_addr`, or a label-addressed operand's resolved
/// address, optionally RIP-relative and/or offset by a constant.
#[derive(Debug, Clone)]
enum FillExpr {
    RelativeBranch { label: String },
    LabelAddress { label: String, extra_disp: i64, rip_relative: bool },
}

fn pack_signed(value: i64, width: usize) -> Result<Vec<u8>, AssemblyError> {
    match width {
        1 => i8::try_from(value)
            .map(|v| vec![v as u8])
            .map_err(|_| AssemblyError::ImmediateOutOfRange { value, width: 8 }),
        2 => i16::try_from(value)
            .map(|v| v.to_le_bytes().to_vec())
            .map_err(|_| AssemblyError::ImmediateOutOfRange { value, width: 16 }),
        4 => i32::try_from(value)
            .map(|v| v.to_le_bytes().to_vec())
            .map_err(|_| AssemblyError::ImmediateOutOfRange { value, width: 32 }),
        other => Err(AssemblyError::Syntax { reason: format!("invalid fixup width {other}") }),
    }
}

/// Partially-assembled machine code for one instruction, with exactly one
/// byte range still waiting on a label's resolved address.
#[derive(Debug, Clone)]
pub struct Deferred {
    code: Vec<u8>,
    fixup_offset: usize,
    fixup_width: usize,
    expr: FillExpr,
}

impl Deferred {
    pub fn new_relative_branch(code: Vec<u8>, fixup_offset: usize, fixup_width: usize, label: String) -> Self {
        Deferred { code, fixup_offset, fixup_width, expr: FillExpr::RelativeBranch { label } }
    }

    /// `fixup_offset` is the byte offset of the operand's (always 4-byte,
    /// per [`crate::modrm::LabelFixup`]) placeholder displacement within
    /// `code`; `rip_relative` selects `target - next_instr_addr` (64-bit)
    /// over a flat `target` (32-bit).
    pub fn new_label_address(
        code: Vec<u8>,
        fixup_offset: usize,
        label: String,
        extra_disp: i64,
        rip_relative: bool,
    ) -> Self {
        Deferred { code, fixup_offset, fixup_width: 4, expr: FillExpr::LabelAddress { label, extra_disp, rip_relative } }
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Resolves the pending fixup given the code page's label table and the
    /// address immediately following this instruction, returning the
    /// completed bytes.
    pub fn compile(&self, labels: &HashMap<String, usize>, next_instr_addr: usize) -> Result<Vec<u8>, AssemblyError> {
        let value = match &self.expr {
            FillExpr::RelativeBranch { label } => {
                let target = *resolve(labels, label)?;
                target as i64 - next_instr_addr as i64
            }
            FillExpr::LabelAddress { label, extra_disp, rip_relative } => {
                let target = *resolve(labels, label)?;
                let addr = if *rip_relative { target as i64 - next_instr_addr as i64 } else { target as i64 };
                addr + extra_disp
            }
        };

        let patched = pack_signed(value, self.fixup_width)?;
        let mut out = self.code.clone();
        out[self.fixup_offset..self.fixup_offset + patched.len()].copy_from_slice(&patched);
        Ok(out)
    }
}

fn resolve<'a>(labels: &'a HashMap<String, usize>, label: &str) -> Result<&'a usize, AssemblyError> {
    labels.get(label).ok_or_else(|| AssemblyError::UndefinedSymbol(label.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_forward_label() {
        let code = vec![0xeb, 0x00];
        let d = Deferred::new_relative_branch(code, 1, 1, "done".into());
        let mut labels = HashMap::new();
        labels.insert("done".to_string(), 10);
        let out = d.compile(&labels, 2).unwrap();
        assert_eq!(out, vec![0xeb, 0x08]);
    }

    #[test]
    fn undefined_label_errors() {
        let d = Deferred::new_relative_branch(vec![0xeb, 0x00], 1, 1, "nope".into());
        assert!(d.compile(&HashMap::new(), 2).is_err());
    }

    #[test]
    fn out_of_range_displacement_errors() {
        let d = Deferred::new_relative_branch(vec![0xeb, 0x00], 1, 1, "far".into());
        let mut labels = HashMap::new();
        labels.insert("far".to_string(), 1000);
        assert!(d.compile(&labels, 2).is_err());
    }

    #[test]
    fn rip_relative_label_address_resolves() {
        // modrm byte + 4-byte disp32 placeholder, offset 1
        let code = vec![0x05, 0, 0, 0, 0];
        let d = Deferred::new_label_address(code, 1, "counter".into(), 0, true);
        let mut labels = HashMap::new();
        labels.insert("counter".to_string(), 0x1000);
        // next_instr_addr = 5 (this instruction is 5 bytes), target = 0x1000
        let out = d.compile(&labels, 5).unwrap();
        let disp = i32::from_le_bytes(out[1..5].try_into().unwrap());
        assert_eq!(disp, 0x1000 - 5);
    }

    #[test]
    fn absolute_label_address_ignores_next_instr_addr() {
        let code = vec![0x05, 0, 0, 0, 0];
        let d = Deferred::new_label_address(code, 1, "counter".into(), 4, false);
        let mut labels = HashMap::new();
        labels.insert("counter".to_string(), 0x2000);
        let out = d.compile(&labels, 999).unwrap();
        let disp = i32::from_le_bytes(out[1..5].try_into().unwrap());
        assert_eq!(disp, 0x2000 + 4);
    }
}
