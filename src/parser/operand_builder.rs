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

//! Builds an [`Operand`] from a single `Rule::operand` parse tree. The
//! reference project and the teacher both split instruction-building out by
//! category because each target ISA gave every instruction its own AST
//! variant; the x86 model here routes every mnemonic through the same
//! `Item::Instruction { mnemonic, operands }` shape; so operand parsing
//! needs exactly one builder; (see the design ledger's trimming note).

use pest::iterators::Pair;

use crate::errors::AssemblyError;
use crate::operand::Operand;
use crate::pointer::{DataWidth, Pointer};
use crate::register::{self, Register};

use super::Rule;

fn parse_number(s: &str) -> Result<i64, AssemblyError> {
    let (neg, s) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let value = if let Some(hex) = s.strip_prefix("0x") {
        i64::from_str_radix(hex, 16).map_err(|e| AssemblyError::Syntax { reason: e.to_string() })?
    } else {
        s.parse::<i64>().map_err(|e| AssemblyError::Syntax { reason: e.to_string() })?
    };
    Ok(if neg { -value } else { value })
}

fn parse_register(name: &str) -> Result<Register, AssemblyError> {
    register::by_name(name).ok_or_else(|| AssemblyError::Syntax { reason: format!("unknown register `{name}`") })
}

fn width_from_hint(hint: &str) -> Option<DataWidth> {
    match hint.trim_end_matches("ptr").trim() {
        "byte" => Some(DataWidth::Byte),
        "word" => Some(DataWidth::Word),
        "dword" => Some(DataWidth::Dword),
        "qword" => Some(DataWidth::Qword),
        _ => None,
    }
}

fn build_memory(pair: Pair<Rule>) -> Result<Pointer, AssemblyError> {
    let addr_expr = pair.into_inner().next().expect("memory always wraps addr_expr");
    let mut inner = addr_expr.into_inner();

    let first = build_addr_term(inner.next().expect("addr_expr always has one term"))?;
    let mut ptr = start_pointer(first)?;

    let mut pending = inner.next();
    while let Some(op_pair) = pending {
        let op = op_pair.as_str();
        let term = build_addr_term(inner.next().expect("addr_op always followed by a term"))?;
        ptr = match op {
            "+" => apply_term(ptr, term)?,
            "-" => apply_term(ptr, negate_term(term))?,
            other => return Err(AssemblyError::Syntax { reason: format!("unknown address operator `{other}`") }),
        };
        pending = inner.next();
    }
    Ok(ptr)
}

enum AddrTerm {
    Disp(i64),
    Reg(Register),
    ScaledReg(Register, u8),
    /// A bare identifier inside brackets that isn't a known register name —
    /// a symbolic address (`[counter]`, `[counter + 4]`).
    Label(String),
}

fn negate_term(term: AddrTerm) -> AddrTerm {
    match term {
        AddrTerm::Disp(d) => AddrTerm::Disp(-d),
        // Negating a symbolic address or a register doesn't mean anything;
        // `[label - 4]` negates the displacement term, not the label itself,
        // so a bare label/register term passes through unchanged here too.
        other => other,
    }
}

fn build_addr_term(pair: Pair<Rule>) -> Result<AddrTerm, AssemblyError> {
    match pair.as_rule() {
        Rule::addr_term => build_addr_term(pair.into_inner().next().expect("addr_term always wraps one child")),
        Rule::scaled_register => {
            let mut inner = pair.into_inner();
            let first = inner.next().unwrap();
            let second = inner.next().unwrap();
            let (reg_pair, num_pair) =
                if first.as_rule() == Rule::register { (first, second) } else { (second, first) };
            let reg = parse_register(reg_pair.as_str())?;
            let scale = parse_number(num_pair.as_str())? as u8;
            Ok(AddrTerm::ScaledReg(reg, scale))
        }
        // A bare identifier is ambiguous between a register and a label
        // reference the same way a top-level operand is; disambiguate by
        // the closed register-name set.
        Rule::register => match register::by_name(pair.as_str()) {
            Some(reg) => Ok(AddrTerm::Reg(reg)),
            None => Ok(AddrTerm::Label(pair.as_str().to_string())),
        },
        Rule::number => Ok(AddrTerm::Disp(parse_number(pair.as_str())?)),
        other => Err(AssemblyError::Syntax { reason: format!("unexpected address term {other:?}") }),
    }
}

fn apply_term(ptr: Pointer, term: AddrTerm) -> Result<Pointer, AssemblyError> {
    match term {
        AddrTerm::Disp(d) => ptr + d,
        AddrTerm::Reg(r) => ptr + r,
        AddrTerm::ScaledReg(r, scale) => {
            let scaled = (r * scale)?;
            ptr + scaled
        }
        AddrTerm::Label(name) => ptr + name,
    }
}

/// Turns the first address term into a starting [`Pointer`] (handles the
/// bare-displacement and bare-register starting cases uniformly).
fn start_pointer(term: AddrTerm) -> Result<Pointer, AssemblyError> {
    match term {
        AddrTerm::Disp(d) => Ok(Pointer::disp(d)),
        AddrTerm::Reg(r) => Ok(Pointer::reg(r)),
        AddrTerm::ScaledReg(r, scale) => r * scale,
        AddrTerm::Label(name) => Ok(Pointer::label(name)),
    }
}

pub fn build(pair: Pair<Rule>) -> Result<Operand, AssemblyError> {
    let mut width = None;
    let mut inner = pair.into_inner().peekable();
    if let Some(p) = inner.peek() {
        if p.as_rule() == Rule::width_hint {
            width = width_from_hint(inner.next().unwrap().as_str());
        }
    }
    let operand_pair = inner.next().expect("operand always has a value after an optional width hint");

    match operand_pair.as_rule() {
        Rule::memory => {
            let mut ptr = build_memory(operand_pair)?;
            if let Some(w) = width {
                ptr = ptr.with_width(w);
            }
            Ok(Operand::Memory(ptr))
        }
        // `register` and `label_ref` share one identifier-shaped grammar
        // rule (registers are a closed set the grammar can't enumerate), so
        // bare identifiers are classified here: a known register name wins,
        // anything else is a label reference.
        Rule::register => match register::by_name(operand_pair.as_str()) {
            Some(reg) => Ok(Operand::Register(reg)),
            None => Ok(Operand::Label(operand_pair.as_str().to_string())),
        },
        Rule::immediate => Ok(Operand::Immediate(parse_number(operand_pair.as_str())?)),
        other => Err(AssemblyError::Syntax { reason: format!("unexpected operand kind {other:?}") }),
    }
}
