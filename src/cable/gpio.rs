//! Bit-banged cable on top of `embedded-hal` pins, for running the chain from a microcontroller.
use bitvec::prelude::*;
use embedded_hal::{delay::DelayNs, digital::{InputPin, OutputPin, PinState}};

use crate::cable::{Cable, CableError, PodSignal};

pub struct Gpio<Clk, Tdi, Tdo, Tms, Delay> where Clk: OutputPin, Tdi: OutputPin, Tdo: InputPin, Tms: OutputPin, Delay: DelayNs {
    half_period: u32,
    delay: Delay,
    clock: Clk,
    tdi: Tdi,
    tdo: Tdo,
    tms: Tms,
    signals: PodSignal,
}

impl<Clk, Tdi, Tdo, Tms, Delay> Gpio<Clk, Tdi, Tdo, Tms, Delay> where Clk: OutputPin, Tdi: OutputPin, Tdo: InputPin, Tms: OutputPin, Delay: DelayNs {
    pub fn new(freq_khz: u32, clock: Clk, tdi: Tdi, tdo: Tdo, tms: Tms, delay: Delay) -> Gpio<Clk, Tdi, Tdo, Tms, Delay> {
        let period_ns = 1_000_000 / freq_khz.max(1);
        let half_period = period_ns / 2;
        Gpio { half_period, clock, tdi, tdo, tms, delay, signals: PodSignal::empty() }
    }

    fn drive(&mut self, tms: bool, tdi: bool) -> Result<(), CableError> {
        self.tms.set_state(PinState::from(tms)).map_err(|_| CableError::Pin)?;
        self.tdi.set_state(PinState::from(tdi)).map_err(|_| CableError::Pin)?;
        self.signals.set(PodSignal::TMS, tms);
        self.signals.set(PodSignal::TDI, tdi);
        Ok(())
    }

    /// One full TCK period.  Returns TDO as sampled on the rising edge.
    fn pulse(&mut self) -> Result<bool, CableError> {
        // clock starts low
        self.clock.set_high().map_err(|_| CableError::Pin)?;
        let tdo = self.tdo.is_high().map_err(|_| CableError::Pin)?;

        self.delay.delay_ns(self.half_period);
        self.clock.set_low().map_err(|_| CableError::Pin)?;
        self.delay.delay_ns(self.half_period);
        Ok(tdo)
    }
}

impl<Clk, Tdi, Tdo, Tms, Delay> Cable for Gpio<Clk, Tdi, Tdo, Tms, Delay> where Clk: OutputPin, Tdi: OutputPin, Tdo: InputPin, Tms: OutputPin, Delay: DelayNs {
    fn clock(&mut self, tms: bool, tdi: bool, n: usize) -> Result<(), CableError> {
        self.drive(tms, tdi)?;
        for _ in 0..n {
            self.pulse()?;
        }
        Ok(())
    }

    fn get_tdo(&mut self) -> Result<bool, CableError> {
        self.tdo.is_high().map_err(|_| CableError::Pin)
    }

    fn clock_capture(&mut self, tms: bool, tdi: bool) -> Result<bool, CableError> {
        self.drive(tms, tdi)?;
        self.pulse()
    }

    fn transfer(
        &mut self,
        input: &BitSlice<u8>,
        mut output: Option<&mut BitSlice<u8>>,
    ) -> Result<(), CableError> {
        for (i, bit) in input.iter().by_vals().enumerate() {
            self.drive(false, bit)?;
            let tdo = self.pulse()?;
            if let Some(out) = output.as_deref_mut() {
                out.set(i, tdo);
            }
        }
        Ok(())
    }

    fn set_signal(&mut self, mask: PodSignal, value: PodSignal) -> Result<PodSignal, CableError> {
        if mask.intersects(PodSignal::TRST | PodSignal::SRST | PodSignal::TDO) {
            return Err(CableError::Unsupported("gpio cable has no reset lines"));
        }
        let old = self.signals;
        let new = (old & !mask) | (value & mask);
        if mask.contains(PodSignal::TCK) {
            self.clock
                .set_state(PinState::from(new.contains(PodSignal::TCK)))
                .map_err(|_| CableError::Pin)?;
        }
        self.drive(new.contains(PodSignal::TMS), new.contains(PodSignal::TDI))?;
        self.signals = new;
        Ok(old)
    }

    fn get_signal(&mut self, signal: PodSignal) -> Result<bool, CableError> {
        if signal == PodSignal::TDO {
            return self.get_tdo();
        }
        Ok(self.signals.contains(signal))
    }
}
