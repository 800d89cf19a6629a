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

pub mod codepage;
pub mod deferred;
pub mod errors;
pub mod instruction;
pub mod mnemonic;
pub mod modrm;
pub mod operand;
pub mod parser;
pub mod pointer;
pub mod recipe;
pub mod register;

use anyhow::{Context, Result};

use codepage::{CodePage, Item};

extern crate pest;
extern crate pest_derive;

/// Assembles Intel-syntax source text into an executable [`CodePage`],
/// running the textual front-end and the two-pass code page compile in
/// sequence.
pub fn assemble_source(source: &str, arch_bits: u16) -> Result<CodePage> {
    let items = parser::parse_program(source).context("failed while parsing assembly source")?;
    assemble_program(items, arch_bits)
}

/// Assembles a program built directly from [`Item`]s (the programmatic
/// entry point, bypassing the textual front-end).
pub fn assemble_program(items: Vec<Item>, arch_bits: u16) -> Result<CodePage> {
    CodePage::assemble(items, arch_bits).context("failed while assembling code page")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register::{UNIX_X64_CC, WINDOWS_X64_CC};

    #[test]
    fn assembles_simple_source() {
        let page = assemble_source("mov rax, 7\nret\n", 64).unwrap();
        assert!(page.len() >= 6);
    }

    #[test]
    fn assembles_and_calls_labeled_entry_point() {
        let page = assemble_source("entry:\nmov rax, 7\nret\n", 64).unwrap();
        let entry = page.function_ptr("entry").expect("entry label must resolve");
        let f = unsafe { page.as_fn0::<i64>(entry) };
        assert_eq!(f(), 7);
    }

    #[test]
    fn unknown_mnemonic_surfaces_as_error() {
        assert!(assemble_source("frobnicate eax\n", 64).is_err());
    }

    #[test]
    fn calling_conventions_have_expected_arity() {
        assert_eq!(UNIX_X64_CC.int_args.len(), 6);
        assert_eq!(WINDOWS_X64_CC.int_args.len(), 4);
    }
}
