//! Pins of a part and the boundary scan cells attached to them.
//!
//! Signals and boundary scan bits refer to each other by index into the arrays owned by the
//! `Part`; neither owns the other.
use alloc::string::String;
use core::fmt;
use core::str::FromStr;

use crate::error::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signal {
    pub name: String,
    /// Package pin, if known.
    pub pin: Option<String>,
    /// BSR bit sampled when the signal is read.
    pub input: Option<usize>,
    /// BSR bit driven when the signal is written.
    pub output: Option<usize>,
}

impl Signal {
    pub fn new(name: &str, pin: Option<&str>) -> Self {
        Self {
            name: name.into(),
            pin: pin.map(Into::into),
            input: None,
            output: None,
        }
    }
}

/// Another name for the signal at `signal`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignalAlias {
    pub name: String,
    pub signal: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BsBitKind {
    Input,
    Output,
    Bidir,
    Control,
    Internal,
}

impl BsBitKind {
    pub fn is_input(self) -> bool {
        matches!(self, BsBitKind::Input | BsBitKind::Bidir)
    }

    pub fn is_output(self) -> bool {
        matches!(self, BsBitKind::Output | BsBitKind::Bidir)
    }
}

impl FromStr for BsBitKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "I" | "i" => Ok(BsBitKind::Input),
            "O" | "o" => Ok(BsBitKind::Output),
            "B" | "b" => Ok(BsBitKind::Bidir),
            "C" | "c" => Ok(BsBitKind::Control),
            "X" | "x" => Ok(BsBitKind::Internal),
            _ => Err(Error::Syntax(alloc::format!("invalid bit type '{s}'"))),
        }
    }
}

impl fmt::Display for BsBitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BsBitKind::Input => "I",
            BsBitKind::Output => "O",
            BsBitKind::Bidir => "B",
            BsBitKind::Control => "C",
            BsBitKind::Internal => "X",
        })
    }
}

/// State of an output while its control cell holds the disabling value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlState {
    /// High impedance.
    Z,
}

/// Link from an output cell to the cell enabling its driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BsControl {
    pub bit: usize,
    /// Value of the control cell that disables the driver.
    pub value: bool,
    pub state: ControlState,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BsBit {
    pub bit: usize,
    pub name: String,
    pub kind: BsBitKind,
    /// Value loaded into the cell before any signal is driven.
    pub safe: bool,
    /// Index of the signal the cell belongs to, when `name` names one.
    pub signal: Option<usize>,
    pub control: Option<BsControl>,
}
