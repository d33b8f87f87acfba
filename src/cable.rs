//! Implementations for different JTAG hardware adapters live here.  Hardware adapters should
//! implement the `Cable` trait; the rest of the crate only talks to a cable through it.
//!
//! Bits are passed as `BitSlice`s with index 0 being the first bit clocked onto TDI (and the
//! first bit sampled from TDO).
use alloc::boxed::Box;
use alloc::string::String;

use bitflags::bitflags;
use bitvec::prelude::*;

pub mod gpio;
pub mod sim;

#[cfg(feature = "std")]
pub mod jlink;
#[cfg(feature = "std")]
pub mod mpsse;

bitflags! {
    /// Lines of the cable that can be read or driven outside of the TAP clocking.  A set flag
    /// means the line is high; TRST and SRST are active low.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct PodSignal: u8 {
        const TCK = 1 << 0;
        const TDI = 1 << 1;
        const TDO = 1 << 2;
        const TMS = 1 << 3;
        const TRST = 1 << 4;
        const SRST = 1 << 5;
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CableError {
    #[error("GPIO pin access failed")]
    Pin,
    #[error("USB transfer failed: {0}")]
    Usb(String),
    #[error("FTDI device error: {0}")]
    Ftdi(String),
    #[error("adapter protocol error: {0}")]
    Protocol(String),
    #[error("operation not supported by this cable: {0}")]
    Unsupported(&'static str),
    #[error("unknown cable '{0}'")]
    UnknownCable(String),
}

pub trait Cable {
    /// Pulse TCK `n` times with TMS and TDI held at the given levels.  TDO is ignored.
    fn clock(&mut self, tms: bool, tdi: bool, n: usize) -> Result<(), CableError>;

    /// Sample TDO without clocking.
    fn get_tdo(&mut self) -> Result<bool, CableError>;

    /// Pulse TCK once and return the TDO level that was sampled on that edge.  Cables which can
    /// not sample TDO outside of a clock should override this.
    fn clock_capture(&mut self, tms: bool, tdi: bool) -> Result<bool, CableError> {
        let tdo = self.get_tdo()?;
        self.clock(tms, tdi, 1)?;
        Ok(tdo)
    }

    /// Clock every bit of `input` onto TDI with TMS held low.  When `output` is given it receives
    /// the TDO level sampled on each edge and is at least as long as `input`.
    fn transfer(
        &mut self,
        input: &BitSlice<u8>,
        output: Option<&mut BitSlice<u8>>,
    ) -> Result<(), CableError>;

    /// Drive the lines selected by `mask` to the levels in `value`.  Returns the levels of all
    /// lines before the change.
    fn set_signal(&mut self, mask: PodSignal, value: PodSignal) -> Result<PodSignal, CableError>;

    /// Read back a single line.
    fn get_signal(&mut self, signal: PodSignal) -> Result<bool, CableError>;

    /// Push any commands the adapter has buffered onto the wire.
    fn flush(&mut self) -> Result<(), CableError> {
        Ok(())
    }
}

impl<C: Cable + ?Sized> Cable for Box<C> {
    fn clock(&mut self, tms: bool, tdi: bool, n: usize) -> Result<(), CableError> {
        (**self).clock(tms, tdi, n)
    }

    fn get_tdo(&mut self) -> Result<bool, CableError> {
        (**self).get_tdo()
    }

    fn clock_capture(&mut self, tms: bool, tdi: bool) -> Result<bool, CableError> {
        (**self).clock_capture(tms, tdi)
    }

    fn transfer(
        &mut self,
        input: &BitSlice<u8>,
        output: Option<&mut BitSlice<u8>>,
    ) -> Result<(), CableError> {
        (**self).transfer(input, output)
    }

    fn set_signal(&mut self, mask: PodSignal, value: PodSignal) -> Result<PodSignal, CableError> {
        (**self).set_signal(mask, value)
    }

    fn get_signal(&mut self, signal: PodSignal) -> Result<bool, CableError> {
        (**self).get_signal(signal)
    }

    fn flush(&mut self) -> Result<(), CableError> {
        (**self).flush()
    }
}

/// Pack the first `bits.len()` bits into bytes, bit 0 in the LSB of the first byte.
pub(crate) fn pack_bytes(bits: &BitSlice<u8>) -> alloc::vec::Vec<u8> {
    bits.chunks(8).map(|c| c.load_le::<u8>()).collect()
}

/// Open a cable by name.  `clock` is the TCK frequency in hertz.
#[cfg(feature = "std")]
pub fn new_from_string(name: &str, clock: u32) -> Result<Box<dyn Cable>, CableError> {
    match name {
        "jtagkey" => Ok(Box::new(mpsse::JtagKey::new(clock, true)?)),
        "jtagkey-b" => Ok(Box::new(mpsse::JtagKey::new(clock, false)?)),
        "jlink" => Ok(Box::new(jlink::JLink::new(clock)?)),
        _ => Err(CableError::UnknownCable(name.into())),
    }
}

#[cfg(feature = "std")]
impl From<rusb::Error> for CableError {
    fn from(e: rusb::Error) -> Self {
        use alloc::string::ToString;
        CableError::Usb(e.to_string())
    }
}
