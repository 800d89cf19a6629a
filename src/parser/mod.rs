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

//! Textual front-end (component 4.10): Intel-syntax source text to
//! [`crate::codepage::Item`]s. One `pest`-derived grammar, one operand
//! builder (`operand_builder.rs`) shared by every mnemonic.

mod operand_builder;

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

use crate::codepage::Item;
use crate::errors::AssemblyError;

#[derive(Parser)]
#[grammar = "parser/grammar.pest"]
pub struct AsmParser;

fn line_number(pair: &Pair<Rule>) -> usize {
    pair.as_span().start_pos().line_col().0
}

/// Parses a complete source string into the program's item list, in source
/// order. Each parse error is tagged with the offending line number.
pub fn parse_program(source: &str) -> Result<Vec<Item>, AssemblyError> {
    let pairs = AsmParser::parse(Rule::program, source)?;
    let mut items = Vec::new();

    for line_pair in pairs {
        if line_pair.as_rule() != Rule::program {
            continue;
        }
        for inner in line_pair.into_inner() {
            if inner.as_rule() != Rule::line {
                continue;
            }
            let line_no = line_number(&inner);
            let Some(content) = inner.into_inner().next() else { continue };
            match content.as_rule() {
                Rule::label_def => {
                    let name = content.into_inner().next().unwrap().as_str().to_string();
                    items.push(Item::label(name));
                }
                Rule::instruction => {
                    let item = build_instruction(content).map_err(|e| e.at_line(line_no))?;
                    items.push(item);
                }
                other => {
                    return Err(AssemblyError::Syntax { reason: format!("unexpected line content {other:?}") }
                        .at_line(line_no))
                }
            }
        }
    }

    Ok(items)
}

fn build_instruction(pair: Pair<Rule>) -> Result<Item, AssemblyError> {
    let mut inner = pair.into_inner();
    let mnemonic = inner.next().expect("instruction always starts with a mnemonic").as_str().to_lowercase();
    let mut operands = Vec::new();
    for operand_pair in inner {
        operands.push(operand_builder::build(operand_pair)?);
    }
    Ok(Item::instr(mnemonic, operands))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operand::Operand;

    #[test]
    fn parses_register_to_register_mov() {
        let items = parse_program("mov eax, ebx\n").unwrap();
        assert_eq!(items.len(), 1);
        match &items[0] {
            Item::Instruction { mnemonic, operands } => {
                assert_eq!(mnemonic, "mov");
                assert_eq!(operands.len(), 2);
            }
            Item::Label(_) => panic!("expected an instruction"),
        }
    }

    #[test]
    fn parses_label_definition_and_reference() {
        let items = parse_program("jmp done\ndone:\nret\n").unwrap();
        assert!(matches!(items[0], Item::Instruction { .. }));
        assert!(matches!(items[1], Item::Label(_)));
        match &items[0] {
            Item::Instruction { operands, .. } => assert_eq!(operands[0], Operand::Label("done".into())),
            _ => unreachable!(),
        }
    }

    #[test]
    fn parses_bracketed_memory_operand() {
        let items = parse_program("mov eax, [ebx + 4*ecx + 8]\n").unwrap();
        match &items[0] {
            Item::Instruction { operands, .. } => {
                assert!(matches!(operands[1], Operand::Memory(_)));
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn rejects_malformed_source() {
        assert!(parse_program("mov , ,\n").is_err());
    }

    #[test]
    fn parses_label_addressed_memory_operand() {
        let items = parse_program("mov eax, [counter + 4]\n").unwrap();
        match &items[0] {
            Item::Instruction { operands, .. } => match &operands[1] {
                Operand::Memory(p) => {
                    assert_eq!(p.label.as_deref(), Some("counter"));
                    assert_eq!(p.disp, Some(4));
                }
                other => panic!("expected a memory operand, got {other:?}"),
            },
            _ => unreachable!(),
        }
    }
}
