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

use runasm::assemble_source;
use runasm::codepage::{CodePage, Item};
use runasm::operand::Operand;
use runasm::register::gp32::eax;
use runasm::register::gp8::{ah, spl};

#[test]
fn labeled_entry_point_is_directly_callable() {
    // add_one(x) = x + 1, Unix x86-64 calling convention (arg 0 in edi,
    // return value in eax).
    let items = vec![
        Item::label("add_one"),
        Item::instr("mov", vec![Operand::Register(eax), Operand::Register(runasm::register::gp32::edi)]),
        Item::instr("add", vec![Operand::Register(eax), Operand::Immediate(1)]),
        Item::instr("ret", vec![]),
    ];
    let page = CodePage::assemble(items, 64).unwrap();
    let entry = page.function_ptr("add_one").unwrap();
    let f = unsafe { page.as_fn1::<i32, i32>(entry) };
    assert_eq!(f(41), 42);
}

#[test]
fn forward_jump_skips_over_dead_code_to_a_working_return() {
    let items = vec![
        Item::label("entry"),
        Item::instr("jmp", vec![Operand::Label("good".into())]),
        Item::instr("mov", vec![Operand::Register(eax), Operand::Immediate(0)]),
        Item::instr("ret", vec![]),
        Item::label("good"),
        Item::instr("mov", vec![Operand::Register(eax), Operand::Immediate(7)]),
        Item::instr("ret", vec![]),
    ];
    let page = CodePage::assemble(items, 64).unwrap();
    let entry = page.function_ptr("entry").unwrap();
    let f = unsafe { page.as_fn0::<i32>(entry) };
    assert_eq!(f(), 7);
}

#[test]
fn mixing_high_byte_and_rex_required_byte_register_is_rejected() {
    // mov ah, spl -- ah forbids a REX prefix, spl requires one; no single
    // legal encoding exists for this instruction.
    let items = vec![Item::instr("mov", vec![Operand::Register(ah), Operand::Register(spl)])];
    assert!(CodePage::assemble(items, 64).is_err());
}

#[test]
fn memory_operand_round_trips_through_the_textual_front_end() {
    let page = assemble_source("mov eax, [ebx + 4*ecx + 8]\nret\n", 32).unwrap();
    assert!(page.len() > 0);
}

#[test]
fn unresolved_label_is_an_assembly_error() {
    let items = vec![Item::instr("jmp", vec![Operand::Label("nowhere".into())])];
    assert!(CodePage::assemble(items, 64).is_err());
}

#[test]
fn duplicate_label_definition_is_an_assembly_error() {
    let items = vec![Item::label("here"), Item::label("here")];
    assert!(CodePage::assemble(items, 64).is_err());
}

#[test]
fn parser_rejects_unknown_mnemonic() {
    assert!(assemble_source("mov eax, 1\nbogus eax\n", 32).is_err());
}

#[test]
fn stack_push_pop_round_trip_assembles() {
    let page = assemble_source("push rax\npush rbx\npop rbx\npop rax\nret\n", 64).unwrap();
    assert!(page.len() >= 5);
}

#[test]
fn scalar_double_move_assembles() {
    let page = assemble_source("movsd xmm0, xmm1\nret\n", 64).unwrap();
    assert!(page.len() >= 5);
}

#[test]
fn label_addressed_memory_operand_assembles_through_the_textual_front_end() {
    let page = assemble_source("mov eax, dword ptr [value]\nret\nvalue:\nmov eax, 9\n", 64).unwrap();
    assert!(page.label_offset("value").is_some());
}
