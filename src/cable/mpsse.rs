//! Implement the `Cable` trait for FTDI MPSSE adapters, and "jtagkey" compatible hardware like the
//! Bus Blaster built on them
use crate::cable::{pack_bytes, Cable, CableError, PodSignal};

use std::fmt::Debug;
use std::format;
use std::time::Duration;
use std::vec;
use std::vec::Vec;

use bitvec::prelude::*;
use ftdi_mpsse::{ClockTMS, ClockTMSOut};
use libftd2xx::{ClockBits, ClockBitsOut, ClockData, ClockDataOut};
use libftd2xx::{Ft2232h, Ftdi, FtdiCommon, FtdiMpsse, MpsseCmdBuilder, MpsseCmdExecutor};
use tracing::{debug, trace};

// Lower pins
const PIN_TCK: u8 = 1;
const PIN_TDI: u8 = 1 << 1;
const PIN_TDO: u8 = 1 << 2;
const PIN_TMS: u8 = 1 << 3;
const PIN_N_OE: u8 = 1 << 4;
const LOWER_OUTPUT_PINS: u8 = PIN_TCK | PIN_TDI | PIN_TMS | PIN_N_OE;

// Upper pins
const PIN_N_TRST: u8 = 1;
const PIN_N_SRST: u8 = 1 << 1;
const PIN_N_TRST_OE: u8 = 1 << 2;
const PIN_N_SRST_OE: u8 = 1 << 3;
const UPPER_OUTPUT_PINS: u8 = PIN_N_TRST | PIN_N_SRST | PIN_N_TRST_OE | PIN_N_SRST_OE;

/// Size of the adapter's command buffer
const BUFFER_SIZE: usize = 4096;
/// Bytes clocked per read command, so that the answer fits the adapter's buffer
const READ_CHUNK: usize = 2048;

fn ftdi_error<E: Debug>(e: E) -> CableError {
    CableError::Ftdi(format!("{e:?}"))
}

/// Upper GPIO pins wired to the reset lines.
#[derive(Clone, Copy, Debug)]
pub struct ResetPins {
    pub trst: u8,
    pub srst: u8,
    pub direction: u8,
}

pub struct Mpsse<T> {
    ft: T,
    // Commands not yet sent to the adapter
    buffer: Vec<u8>,
    signals: PodSignal,
    reset_pins: Option<ResetPins>,
}

impl<T: FtdiMpsse + MpsseCmdExecutor> Mpsse<T>
    where <T as MpsseCmdExecutor>::Error: Debug
{
    /// Put `ft` into MPSSE mode with TCK running at `clock` hertz.  With `reset_pins` the upper
    /// GPIO byte drives TRST and SRST.
    pub fn new(mut ft: T, clock: u32, reset_pins: Option<ResetPins>) -> Result<Self, CableError>
    {
        ft.initialize_mpsse_default().map_err(ftdi_error)?;
        ft.set_clock(clock).map_err(ftdi_error)?;

        let builder = MpsseCmdBuilder::new()
            .disable_3phase_data_clocking()
            .disable_adaptive_data_clocking()
            .set_gpio_lower(PIN_TMS, LOWER_OUTPUT_PINS);
        ft.send(builder.as_slice()).map_err(ftdi_error)?;

        let mut mpsse = Self {
            ft,
            buffer: vec![],
            signals: PodSignal::TMS | PodSignal::TRST | PodSignal::SRST,
            reset_pins,
        };
        mpsse.write_upper()?;
        debug!(clock, "MPSSE cable ready");
        Ok(mpsse)
    }

    fn queue(&mut self, builder: MpsseCmdBuilder) -> Result<(), CableError> {
        if builder.as_slice().len() + self.buffer.len() > BUFFER_SIZE {
            self.flush()?;
        }
        self.buffer.extend_from_slice(builder.as_slice());
        Ok(())
    }

    /// Send the buffer followed by `builder` and read `out.len()` bytes of answer.
    fn xfer(&mut self, builder: MpsseCmdBuilder, out: &mut [u8]) -> Result<(), CableError> {
        let builder = builder.send_immediate();
        self.buffer.extend_from_slice(builder.as_slice());
        let result = self.ft.xfer(&self.buffer, out).map_err(ftdi_error);
        self.buffer.clear();
        result
    }

    fn write_upper(&mut self) -> Result<(), CableError> {
        let Some(pins) = self.reset_pins else {
            return Ok(());
        };
        let mut value = 0;
        if self.signals.contains(PodSignal::TRST) {
            value |= pins.trst;
        }
        if self.signals.contains(PodSignal::SRST) {
            value |= pins.srst;
        }
        self.queue(MpsseCmdBuilder::new().set_gpio_upper(value, pins.direction))?;
        self.flush()
    }

    fn write_lower(&mut self) -> Result<(), CableError> {
        let mut value = 0;
        if self.signals.contains(PodSignal::TCK) {
            value |= PIN_TCK;
        }
        if self.signals.contains(PodSignal::TDI) {
            value |= PIN_TDI;
        }
        if self.signals.contains(PodSignal::TMS) {
            value |= PIN_TMS;
        }
        self.queue(MpsseCmdBuilder::new().set_gpio_lower(value, LOWER_OUTPUT_PINS))
    }
}

impl<T: FtdiMpsse + MpsseCmdExecutor> Cable for Mpsse<T>
    where <T as MpsseCmdExecutor>::Error: Debug
{
    fn clock(&mut self, tms: bool, tdi: bool, mut n: usize) -> Result<(), CableError> {
        let mut builder = MpsseCmdBuilder::new();
        let pattern = if tms { 0x7f } else { 0 };
        while n > 0 {
            // clock_tms_out takes at most 7 bits
            let count = n.min(7);
            builder = builder.clock_tms_out(ClockTMSOut::NegEdge, pattern, tdi, count as u8);
            n -= count;
        }
        self.signals.set(PodSignal::TMS, tms);
        self.signals.set(PodSignal::TDI, tdi);
        self.queue(builder)
    }

    fn get_tdo(&mut self) -> Result<bool, CableError> {
        let mut buf = [0u8; 1];
        self.xfer(MpsseCmdBuilder::new().gpio_lower(), &mut buf)?;
        Ok(buf[0] & PIN_TDO != 0)
    }

    fn clock_capture(&mut self, tms: bool, tdi: bool) -> Result<bool, CableError> {
        let mut buf = [0u8; 1];
        let builder = MpsseCmdBuilder::new().clock_tms(ClockTMS::NegTMSPosTDO, tms as u8, tdi, 1);
        self.xfer(builder, &mut buf)?;
        self.signals.set(PodSignal::TMS, tms);
        self.signals.set(PodSignal::TDI, tdi);
        // The sampled bit arrives in the top of the byte
        Ok(buf[0] & 0x80 != 0)
    }

    fn transfer(
        &mut self,
        input: &BitSlice<u8>,
        mut output: Option<&mut BitSlice<u8>>,
    ) -> Result<(), CableError> {
        trace!(bits = input.len(), capture = output.is_some(), "mpsse transfer");
        for (n, chunk) in input.chunks(READ_CHUNK * 8).enumerate() {
            let data = pack_bytes(chunk);
            let full = chunk.len() / 8;
            let bits = (chunk.len() % 8) as u8;

            let Some(out) = output.as_deref_mut() else {
                let mut builder = MpsseCmdBuilder::new();
                if full > 0 {
                    builder = builder.clock_data_out(ClockDataOut::LsbNeg, &data[..full]);
                }
                if bits > 0 {
                    builder = builder.clock_bits_out(ClockBitsOut::LsbNeg, data[full], bits);
                }
                self.queue(builder)?;
                continue;
            };

            let mut builder = MpsseCmdBuilder::new();
            if full > 0 {
                builder = builder.clock_data(ClockData::LsbPosIn, &data[..full]);
            }
            if bits > 0 {
                builder = builder.clock_bits(ClockBits::LsbPosIn, data[full], bits);
            }
            let mut buf = vec![0u8; data.len()];
            self.xfer(builder, &mut buf)?;
            if bits > 0 {
                // Partial bytes are shifted in from the top
                buf[full] >>= 8 - bits;
            }

            let start = n * READ_CHUNK * 8;
            let received = buf.view_bits::<Lsb0>();
            out[start..start + chunk.len()].copy_from_bitslice(&received[..chunk.len()]);
        }
        if let Some(last) = input.last() {
            self.signals.set(PodSignal::TDI, *last);
        }
        self.signals.remove(PodSignal::TMS);
        Ok(())
    }

    fn set_signal(&mut self, mask: PodSignal, value: PodSignal) -> Result<PodSignal, CableError> {
        let old = self.signals;
        self.signals = (old & !mask) | (value & mask);
        let changed = old ^ self.signals;

        if changed.intersects(PodSignal::TRST | PodSignal::SRST) {
            if self.reset_pins.is_none() {
                self.signals = old;
                return Err(CableError::Unsupported("TRST/SRST without reset pins"));
            }
            self.write_upper()?;
        }
        if changed.intersects(PodSignal::TCK | PodSignal::TDI | PodSignal::TMS) {
            self.write_lower()?;
            self.flush()?;
        }
        Ok(old)
    }

    fn get_signal(&mut self, signal: PodSignal) -> Result<bool, CableError> {
        if signal == PodSignal::TDO {
            return self.get_tdo();
        }
        Ok(self.signals.contains(signal))
    }

    fn flush(&mut self) -> Result<(), CableError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let result = self.ft.send(&self.buffer).map_err(ftdi_error);
        self.buffer.clear();
        result
    }
}

pub struct JtagKey {
    ft: Mpsse<Ft2232h>,
}

impl JtagKey {
    /// Create a new JtagKey.  FT2232-based adapters like JtagKey have both an "A" interface and a
    /// "B" interface.  `primary` controls which to use. `clock` controls the speed of TCLK in hertz.
    pub fn new(clock: u32, primary: bool) -> Result<Self, CableError> {
        let description = if primary {
            "Dual RS232-HS A"
        } else {
            "Dual RS232-HS B"
        };
        let ft = Ftdi::with_description(description).map_err(ftdi_error)?;
        let mut ft = Ft2232h::try_from(ft).map_err(ftdi_error)?;
        ft.set_latency_timer(Duration::from_millis(1)).map_err(ftdi_error)?;

        let pins = ResetPins {
            trst: PIN_N_TRST,
            srst: PIN_N_SRST,
            direction: UPPER_OUTPUT_PINS,
        };
        let ft = Mpsse::new(ft, clock, Some(pins))?;
        debug!(description, "opened jtagkey");
        Ok(JtagKey { ft })
    }

    /// JtagKey adapters implement the optional SRST signal.  This function puts the system in
    /// reset.
    pub fn assert_srst(&mut self) -> Result<(), CableError> {
        self.ft.set_signal(PodSignal::SRST, PodSignal::empty()).map(drop)
    }

    /// Take the system out of reset.
    pub fn deassert_srst(&mut self) -> Result<(), CableError> {
        self.ft.set_signal(PodSignal::SRST, PodSignal::SRST).map(drop)
    }
}

impl Cable for JtagKey {
    fn clock(&mut self, tms: bool, tdi: bool, n: usize) -> Result<(), CableError> {
        self.ft.clock(tms, tdi, n)
    }

    fn get_tdo(&mut self) -> Result<bool, CableError> {
        self.ft.get_tdo()
    }

    fn clock_capture(&mut self, tms: bool, tdi: bool) -> Result<bool, CableError> {
        self.ft.clock_capture(tms, tdi)
    }

    fn transfer(
        &mut self,
        input: &BitSlice<u8>,
        output: Option<&mut BitSlice<u8>>,
    ) -> Result<(), CableError> {
        self.ft.transfer(input, output)
    }

    fn set_signal(&mut self, mask: PodSignal, value: PodSignal) -> Result<PodSignal, CableError> {
        self.ft.set_signal(mask, value)
    }

    fn get_signal(&mut self, signal: PodSignal) -> Result<bool, CableError> {
        self.ft.get_signal(signal)
    }

    fn flush(&mut self) -> Result<(), CableError> {
        self.ft.flush()
    }
}
