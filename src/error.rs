//! Errors reported by the register, part and chain layers.
use alloc::string::String;

use crate::cable::CableError;

/// Every fallible operation in this crate returns this error.  An operation that fails leaves the
/// `Part` or `Chain` it was called on exactly as it was before the call.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("out of memory")]
    OutOfMemory,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("{kind} '{name}' already defined")]
    AlreadyDefined { kind: &'static str, name: String },
    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },
    #[error("part {part} without active instruction")]
    NoActiveInstruction { part: usize },
    #[error("part {part} without data register for instruction '{instruction}'")]
    NoDataRegister { part: usize, instruction: String },
    #[error("illegal state: {0}")]
    IllegalState(String),
    #[error("{what} does not fit: {len} bits available, {needed} needed")]
    OutOfBounds {
        what: &'static str,
        len: usize,
        needed: usize,
    },
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error(transparent)]
    Cable(#[from] CableError),
}

pub type Result<T> = core::result::Result<T, Error>;

impl Error {
    pub(crate) fn not_found(kind: &'static str, name: &str) -> Self {
        Error::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub(crate) fn already_defined(kind: &'static str, name: &str) -> Self {
        Error::AlreadyDefined {
            kind,
            name: name.into(),
        }
    }
}
