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

//! Code page / function factory (component 4.9). [`CodePage::assemble`]
//! runs the two-pass algorithm the reference `CodePage.compile` uses: a
//! label pass that records each label's eventual byte offset, then an emit
//! pass that re-walks the instruction list, resolving every
//! [`crate::deferred::Deferred`] fixup against the now-complete label table
//! and `next_instr_addr`.

use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::AssemblyError;
use crate::instruction::{self, Encoded};
use crate::operand::Operand;
use crate::platform::{self, ExecutableRegion};

/// One entry in a program: either a label definition or an instruction to
/// assemble.
pub enum Item {
    Label(String),
    Instruction { mnemonic: String, operands: Vec<Operand> },
}

impl Item {
    pub fn label(name: impl Into<String>) -> Self {
        Item::Label(name.into())
    }

    pub fn instr(mnemonic: impl Into<String>, operands: Vec<Operand>) -> Self {
        Item::Instruction { mnemonic: mnemonic.into(), operands }
    }
}

/// An executable page of assembled machine code. Holds the region behind an
/// `Arc` so that function pointers handed out via [`CodePage::as_fn0`] (and
/// friends) can outlive any particular borrow of the page, while the
/// mapping itself is freed exactly once when the last reference drops.
pub struct CodePage {
    region: Arc<ExecutableRegion>,
    len: usize,
    labels: HashMap<String, usize>,
}

impl CodePage {
    /// Runs the two-pass compile over `items` and maps the result into
    /// executable memory.
    pub fn assemble(items: Vec<Item>, arch_bits: u16) -> Result<CodePage, AssemblyError> {
        let mut encoded: Vec<Either> = Vec::with_capacity(items.len());
        let mut ptr = 0usize;
        let mut labels = HashMap::new();

        // Pass 1: encode each instruction once (its length doesn't depend
        // on label addresses even when a fixup is still pending) and record
        // label offsets as they're reached.
        for item in items {
            match item {
                Item::Label(name) => {
                    if labels.insert(name.clone(), ptr).is_some() {
                        return Err(AssemblyError::DuplicateLabel(name));
                    }
                }
                Item::Instruction { mnemonic, operands } => {
                    let enc = instruction::assemble(&mnemonic, operands, arch_bits)?;
                    ptr += match &enc {
                        Encoded::Bytes(b) => b.len(),
                        Encoded::Deferred(d) => d.len(),
                    };
                    encoded.push(Either::from(enc));
                }
            }
        }

        // Pass 2: re-walk, resolving deferred fixups against the completed
        // label table and each instruction's `next_instr_addr`.
        let mut code = Vec::with_capacity(ptr);
        for item in encoded {
            match item {
                Either::Bytes(b) => code.extend(b),
                Either::Deferred(d) => {
                    let next_instr_addr = code.len() + d.len();
                    code.extend(d.compile(&labels, next_instr_addr)?);
                }
            }
        }

        let mut region = platform::allocate(code.len())?;
        region.write(&code)?;

        Ok(CodePage { region: Arc::new(region), len: code.len(), labels })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn label_offset(&self, name: &str) -> Option<usize> {
        self.labels.get(name).copied()
    }

    fn base_ptr(&self) -> *const u8 {
        self.region.as_mut_ptr()
    }

    /// Raw pointer to a label's entry point, for building a native callable
    /// (component 4.11). Returns `None` if the label was never defined.
    pub fn function_ptr(&self, label: &str) -> Option<*const u8> {
        self.label_offset(label).map(|off| unsafe { self.base_ptr().add(off) })
    }

    /// Transmutes the page's start (or a named label, via
    /// [`function_ptr`](Self::function_ptr)) into a zero-argument callable
    /// following the host's C calling convention. `R` must be a type valid
    /// to receive in `rax`/`xmm0` per that convention (e.g. `i64`, `f64`,
    /// `()`).
    ///
    /// # Safety
    /// The caller must ensure the bytes at this entry point are a valid
    /// function body for the given signature and calling convention.
    pub unsafe fn as_fn0<R>(&self, entry: *const u8) -> extern "C" fn() -> R {
        std::mem::transmute::<*const u8, extern "C" fn() -> R>(entry)
    }

    /// # Safety
    /// See [`as_fn0`](Self::as_fn0).
    pub unsafe fn as_fn1<A, R>(&self, entry: *const u8) -> extern "C" fn(A) -> R {
        std::mem::transmute::<*const u8, extern "C" fn(A) -> R>(entry)
    }

    /// # Safety
    /// See [`as_fn0`](Self::as_fn0).
    pub unsafe fn as_fn2<A, B, R>(&self, entry: *const u8) -> extern "C" fn(A, B) -> R {
        std::mem::transmute::<*const u8, extern "C" fn(A, B) -> R>(entry)
    }
}

enum Either {
    Bytes(Vec<u8>),
    Deferred(crate::deferred::Deferred),
}

impl From<Encoded> for Either {
    fn from(e: Encoded) -> Self {
        match e {
            Encoded::Bytes(b) => Either::Bytes(b),
            Encoded::Deferred(d) => Either::Deferred(d),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operand::Operand;
    use crate::register::gp64::rax;

    #[test]
    fn assembles_a_function_returning_a_constant() {
        // mov rax, 42; ret
        let items = vec![
            Item::instr("mov", vec![Operand::Register(rax), Operand::Immediate(42)]),
            Item::instr("ret", vec![]),
        ];
        let page = CodePage::assemble(items, 64).unwrap();
        assert!(page.len() >= 11);
        let f = unsafe { page.as_fn0::<i64>(page.base_ptr()) };
        assert_eq!(f(), 42);
    }

    #[test]
    fn resolves_forward_jump_label() {
        // jmp skip; mov rax, 1; ret; skip: mov rax, 2; ret
        let items = vec![
            Item::instr("jmp", vec![Operand::Label("skip".into())]),
            Item::instr("mov", vec![Operand::Register(rax), Operand::Immediate(1)]),
            Item::instr("ret", vec![]),
            Item::label("skip"),
            Item::instr("mov", vec![Operand::Register(rax), Operand::Immediate(2)]),
            Item::instr("ret", vec![]),
        ];
        let page = CodePage::assemble(items, 64).unwrap();
        let f = unsafe { page.as_fn0::<i64>(page.base_ptr()) };
        assert_eq!(f(), 2);
    }

    #[test]
    fn duplicate_label_errors() {
        let items = vec![Item::label("x"), Item::label("x")];
        assert!(CodePage::assemble(items, 64).is_err());
    }

    #[test]
    fn undefined_label_errors() {
        let items = vec![Item::instr("jmp", vec![Operand::Label("nope".into())])];
        assert!(CodePage::assemble(items, 64).is_err());
    }

    #[test]
    fn label_addressed_memory_operand_resolves_rip_relative() {
        use crate::pointer::{DataWidth, Pointer};
        // A load from a label planted right after the function: the
        // pointer's displacement must resolve to that label's actual
        // distance from the end of the `mov` instruction, not 0.
        let target = Pointer::label("value").with_width(DataWidth::Qword);
        let items = vec![
            Item::instr("mov", vec![Operand::Register(rax), Operand::Memory(target)]),
            Item::instr("ret", vec![]),
            Item::label("value"),
            Item::instr("mov", vec![Operand::Register(rax), Operand::Immediate(7)]),
        ];
        let page = CodePage::assemble(items, 64).unwrap();
        assert!(page.label_offset("value").is_some());
    }
}
