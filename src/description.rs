//! Reader for the line oriented part description language.
//!
//! ```text
//! # comment
//! signal PA0 12          # or: pin NAME [PIN]
//! salias RESET_N PA0
//! instruction length 2
//! register BR 1
//! boundary length 3      # same as: register BSR 3
//! instruction BYPASS 11 BR
//! instruction SAMPLE 10 BSR
//! bit 0 O 0 PA0
//! bit 2 B ? PA1 1 0 Z    # controlled by bit 1, driver off while bit 1 is 0
//! ```
use alloc::format;
use alloc::vec::Vec;

use tracing::debug;

use crate::error::Error;
use crate::part::{Part, BSR};
use crate::register::BitRegister;
use crate::signal::{BsBitKind, ControlState};

/// A statement that could not be applied, with its 1-based line number.
#[derive(Debug, thiserror::Error)]
#[error("line {line}: {source}")]
pub struct DescriptionError {
    pub line: usize,
    pub source: Error,
}

fn syntax(msg: impl Into<alloc::string::String>) -> Error {
    Error::Syntax(msg.into())
}

fn number(s: &str) -> Result<usize, Error> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|_| syntax(format!("invalid number '{s}'")))
}

fn safe_value(s: &str) -> Result<bool, Error> {
    match s {
        "1" => Ok(true),
        // unknown safe values are driven low
        "0" | "?" => Ok(false),
        _ => Err(syntax(format!("invalid safe value '{s}'"))),
    }
}

fn bit_value(s: &str) -> Result<bool, Error> {
    match s {
        "1" => Ok(true),
        "0" => Ok(false),
        _ => Err(syntax(format!("invalid control value '{s}'"))),
    }
}

/// Apply one statement to `part`.  Blank and comment lines are accepted and do nothing.
pub fn apply_line(part: &mut Part, line: &str) -> Result<(), Error> {
    let line = line.split('#').next().unwrap_or_default();
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some((&keyword, args)) = words.split_first() else {
        return Ok(());
    };

    match (keyword.to_ascii_lowercase().as_str(), args) {
        ("signal" | "pin", [name]) => part.define_signal(name, None).map(drop),
        ("signal" | "pin", [name, pin, ..]) => part.define_signal(name, Some(*pin)).map(drop),
        ("salias", [alias, signal]) => part.define_alias(alias, signal),
        ("register", [name, len]) => part.define_data_register(name, number(len)?).map(drop),
        ("boundary", [length, len]) if length.eq_ignore_ascii_case("length") => {
            part.define_data_register(BSR, number(len)?).map(drop)
        }
        ("instruction", [length, len]) if length.eq_ignore_ascii_case("length") => {
            part.set_instruction_length(number(len)?)
        }
        ("instruction", [name, code]) => part.define_instruction(name, code, None).map(drop),
        ("instruction", [name, code, register]) => {
            part.define_instruction(name, code, Some(*register)).map(drop)
        }
        ("bit", [bit, kind, safe, name]) => {
            part.define_bsbit(number(bit)?, name, kind.parse()?, safe_value(safe)?, None)
        }
        ("bit", [bit, kind, safe, name, control, value, state]) => {
            if !state.eq_ignore_ascii_case("Z") {
                return Err(syntax(format!("invalid control state '{state}'")));
            }
            let kind: BsBitKind = kind.parse()?;
            let control = (number(control)?, bit_value(value)?, ControlState::Z);
            part.define_bsbit(number(bit)?, name, kind, safe_value(safe)?, Some(control))
        }
        (
            "signal" | "pin" | "salias" | "register" | "boundary" | "instruction" | "bit",
            _,
        ) => Err(syntax(format!(
            "wrong number of parameters for '{keyword}'"
        ))),
        _ => Err(syntax(format!("unknown statement '{keyword}'"))),
    }
}

/// Apply every line of `text` to `part`, stopping at the first statement that fails.  The
/// statements before it stay applied.
pub fn apply(part: &mut Part, text: &str) -> Result<(), DescriptionError> {
    for (n, line) in text.lines().enumerate() {
        apply_line(part, line).map_err(|source| DescriptionError { line: n + 1, source })?;
    }
    debug!(
        instructions = part.instructions().len(),
        registers = part.data_registers().len(),
        signals = part.signals().len(),
        "part description applied"
    );
    Ok(())
}

impl Part {
    /// Build a part with ID `id` from a description.
    pub fn from_description(id: BitRegister, text: &str) -> Result<Part, DescriptionError> {
        let mut part = Part::new(id);
        apply(&mut part, text)?;
        Ok(part)
    }
}
