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

//! The mnemonic registry: every recipe table, collected and indexed by
//! name. Built once on first use and cached for the process lifetime.

mod alu;
mod arithmetic;
mod bitwise;
mod control_flow;
mod data_transfer;
mod stack;

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::recipe::Mnemonic;

fn build_registry() -> HashMap<&'static str, Mnemonic> {
    let mut all = vec![
        data_transfer::mov(),
        data_transfer::movsd(),
        data_transfer::lea(),
        arithmetic::add(),
        arithmetic::sub(),
        arithmetic::cmp(),
        arithmetic::inc(),
        arithmetic::dec(),
        arithmetic::imul(),
        arithmetic::idiv(),
        bitwise::and(),
        bitwise::or(),
        bitwise::xor(),
        bitwise::not(),
        bitwise::neg(),
        bitwise::shl(),
        bitwise::shr(),
        bitwise::sar(),
        bitwise::test(),
        bitwise::nop(),
        control_flow::jmp(),
        control_flow::call(),
        control_flow::int_(),
        control_flow::syscall(),
        stack::push(),
        stack::pop(),
        stack::ret(),
        stack::leave(),
    ];
    all.extend(control_flow::jcc_family());

    all.into_iter().map(|m| (m.name, m)).collect()
}

static REGISTRY: OnceLock<HashMap<&'static str, Mnemonic>> = OnceLock::new();

/// Looks up a mnemonic's recipe table by its textual name (e.g. `"mov"`,
/// `"jne"`). Case-sensitive; the textual front-end lower-cases first.
pub fn lookup(name: &str) -> Option<&'static Mnemonic> {
    REGISTRY.get_or_init(build_registry).get(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_mnemonic_has_recipes() {
        assert!(lookup("mov").unwrap().recipes.len() > 0);
        assert!(lookup("jne").is_some());
        assert!(lookup("syscall").unwrap().recipes.len() == 1);
    }

    #[test]
    fn unknown_mnemonic_is_none() {
        assert!(lookup("frobnicate").is_none());
    }
}
