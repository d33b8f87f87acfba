//! `BitRegister` is the fixed length bit vector used for every instruction register, data
//! register and shift operand.  Index 0 is the first bit shifted into the chain (and the first bit
//! captured from it).  When displayed as a string the register is written most significant bit
//! first, so the last character of the string is bit 0.
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use core::str::FromStr;

use bitvec::prelude::*;

use crate::error::{Error, Result};

#[derive(Clone, PartialEq, Eq)]
pub struct BitRegister {
    bits: BitVec<u8, Lsb0>,
}

impl BitRegister {
    /// Allocate a zero filled register of `len` bits.
    pub fn new(len: usize) -> Result<Self> {
        if len < 1 {
            return Err(Error::InvalidArgument(alloc::format!(
                "register length must be at least 1, got {len}"
            )));
        }

        let bytes = len.div_ceil(8);
        let mut storage = Vec::new();
        storage
            .try_reserve_exact(bytes)
            .map_err(|_| Error::OutOfMemory)?;
        storage.resize(bytes, 0u8);

        let mut bits = BitVec::from_vec(storage);
        bits.truncate(len);
        Ok(Self { bits })
    }

    /// Build a register whose length is the length of `s`.  See `set_from_bitstring`.
    pub fn from_bitstring(s: &str) -> Result<Self> {
        let mut reg = Self::new(s.len())?;
        reg.set_from_bitstring(s)?;
        Ok(reg)
    }

    /// Build a `len` bit register holding `value`.
    pub fn from_integer(len: usize, value: u64) -> Result<Self> {
        let mut reg = Self::new(len)?;
        reg.set_from_integer(value)?;
        Ok(reg)
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    /// Always false; a register holds at least one bit.
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Grow or shrink the register.  Bits added at the top are zero, bits beyond the new length
    /// are discarded.
    pub fn resize(&mut self, len: usize) -> Result<()> {
        if len < 1 {
            return Err(Error::InvalidArgument(alloc::format!(
                "register length must be at least 1, got {len}"
            )));
        }
        self.bits.resize(len, false);
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<bool> {
        self.bits.get(index).map(|b| *b)
    }

    pub fn set(&mut self, index: usize, bit: bool) -> Result<()> {
        if index >= self.bits.len() {
            return Err(Error::OutOfBounds {
                what: "bit index",
                len: self.bits.len(),
                needed: index + 1,
            });
        }
        self.bits.set(index, bit);
        Ok(())
    }

    pub fn fill(&mut self, bit: bool) -> &mut Self {
        self.bits.fill(bit);
        self
    }

    /// `Some(bit)` when every bit of the register has the value `bit`.
    pub fn all_bits_same(&self) -> Option<bool> {
        let first = self.bits[0];
        if self.bits.iter().by_vals().all(|b| b == first) {
            Some(first)
        } else {
            None
        }
    }

    /// Load the register from a string of '0' and '1' characters, written most significant bit
    /// first.  The string must be exactly as long as the register.
    pub fn set_from_bitstring(&mut self, s: &str) -> Result<()> {
        if let Some(c) = s.chars().find(|c| *c != '0' && *c != '1') {
            return Err(Error::Syntax(alloc::format!(
                "invalid character '{c}' in bit string \"{s}\""
            )));
        }
        if s.len() != self.bits.len() {
            return Err(Error::OutOfBounds {
                what: "bit string",
                len: self.bits.len(),
                needed: s.len(),
            });
        }

        let len = self.bits.len();
        for (i, c) in s.bytes().enumerate() {
            self.bits.set(len - 1 - i, c == b'1');
        }
        Ok(())
    }

    pub fn to_bitstring(&self) -> String {
        self.bits
            .iter()
            .by_vals()
            .rev()
            .map(|b| if b { '1' } else { '0' })
            .collect()
    }

    /// Store `value` with bit 0 of the value in register index 0.
    pub fn set_from_integer(&mut self, value: u64) -> Result<()> {
        let needed = (u64::BITS - value.leading_zeros()) as usize;
        if needed > self.bits.len() {
            return Err(Error::OutOfBounds {
                what: "integer value",
                len: self.bits.len(),
                needed,
            });
        }

        self.bits.fill(false);
        for i in 0..needed {
            self.bits.set(i, (value >> i) & 1 == 1);
        }
        Ok(())
    }

    /// The low 64 bits of the register as an integer.
    pub fn to_integer(&self) -> u64 {
        self.bits
            .iter()
            .by_vals()
            .take(64)
            .enumerate()
            .fold(0, |acc, (i, b)| acc | ((b as u64) << i))
    }

    /// Match against a pattern written like `to_bitstring`, where '?' matches either value.
    pub fn matches(&self, pattern: &str) -> bool {
        if pattern.len() != self.bits.len() {
            return false;
        }
        pattern
            .bytes()
            .zip(self.bits.iter().by_vals().rev())
            .all(|(p, b)| match p {
                b'?' => true,
                b'0' => !b,
                b'1' => b,
                _ => false,
            })
    }

    /// Add one, wrapping around at the register width.
    pub fn increment(&mut self) -> &mut Self {
        for i in 0..self.bits.len() {
            let bit = !self.bits[i];
            self.bits.set(i, bit);
            if bit {
                break;
            }
        }
        self
    }

    /// Subtract one, wrapping around at the register width.
    pub fn decrement(&mut self) -> &mut Self {
        for i in 0..self.bits.len() {
            let bit = !self.bits[i];
            self.bits.set(i, bit);
            if !bit {
                break;
            }
        }
        self
    }

    /// Move every bit `n` places towards the top, filling the bottom with zeros.
    pub fn shift_left(&mut self, n: usize) -> &mut Self {
        if n < 1 {
            return self;
        }
        for i in (0..self.bits.len()).rev() {
            let bit = i >= n && self.bits[i - n];
            self.bits.set(i, bit);
        }
        self
    }

    /// Move every bit `n` places towards index 0, filling the top with zeros.
    pub fn shift_right(&mut self, n: usize) -> &mut Self {
        if n < 1 {
            return self;
        }
        let len = self.bits.len();
        for i in 0..len {
            let bit = i + n < len && self.bits[i + n];
            self.bits.set(i, bit);
        }
        self
    }

    /// Copy `src` into this register starting at bit 0.  Bits of `src` that do not fit are
    /// dropped, bits of `self` that `src` does not cover are cleared.
    pub fn assign_truncated(&mut self, src: &BitSlice<u8>) {
        let n = src.len().min(self.bits.len());
        self.bits.fill(false);
        self.bits[..n].copy_from_bitslice(&src[..n]);
    }

    pub fn as_bitslice(&self) -> &BitSlice<u8> {
        &self.bits
    }

    pub fn as_mut_bitslice(&mut self) -> &mut BitSlice<u8> {
        &mut self.bits
    }
}

impl FromStr for BitRegister {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_bitstring(s)
    }
}

impl fmt::Display for BitRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.bits.iter().by_vals().rev() {
            f.write_str(if b { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl fmt::Debug for BitRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BitRegister({}: {})", self.bits.len(), self)
    }
}
