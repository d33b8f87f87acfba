//! An in-memory scan chain that implements `Cable`.  Each `SimTap` models one IEEE 1149.1 TAP
//! controller with an instruction register, BYPASS and any number of data registers, which is
//! enough to exercise the whole shift protocol without hardware.
//!
//! `taps[0]` is the controller whose TDO drives the cable; TDI feeds the last one.
use alloc::vec::Vec;

use bitvec::prelude::*;
use tracing::trace;

use crate::cable::{Cable, CableError, PodSignal};
use crate::state::JtagState;

#[derive(Clone, Debug)]
struct SimRegister {
    code: BitVec<u8>,
    value: BitVec<u8>,
    writable: bool,
}

#[derive(Clone, Debug)]
pub struct SimTap {
    ir_len: usize,
    ir: BitVec<u8>,
    ir_capture: BitVec<u8>,
    reset_ir: BitVec<u8>,
    registers: Vec<SimRegister>,
    /// Contents of the register currently between TDI and TDO.
    shift: BitVec<u8>,
}

fn code_bits(len: usize, code: u64) -> BitVec<u8> {
    (0..len).map(|i| i < 64 && (code >> i) & 1 == 1).collect()
}

impl SimTap {
    /// A controller with an `ir_len` bit instruction register.  Every opcode selects BYPASS until
    /// registers are added; the IR captures `...01`.
    pub fn new(ir_len: usize) -> Self {
        let ir_len = ir_len.max(2);
        let ones = BitVec::repeat(true, ir_len);
        let mut ir_capture = BitVec::repeat(false, ir_len);
        ir_capture.set(0, true);
        Self {
            ir_len,
            ir: ones.clone(),
            ir_capture,
            reset_ir: ones,
            registers: Vec::new(),
            shift: BitVec::repeat(false, 1),
        }
    }

    /// Add a 32 bit read-only IDCODE register selected by `code`, which also becomes the
    /// instruction loaded on reset.
    pub fn with_idcode(mut self, code: u64, idcode: u32) -> Self {
        let code = code_bits(self.ir_len, code);
        self.registers.push(SimRegister {
            code: code.clone(),
            value: (0..32).map(|i| (idcode >> i) & 1 == 1).collect(),
            writable: false,
        });
        self.ir = code.clone();
        self.reset_ir = code;
        self
    }

    /// Add a `len` bit register selected by `code`.  It captures whatever was last updated into
    /// it, so a second shift reads back the first.
    pub fn with_register(mut self, code: u64, len: usize) -> Self {
        self.registers.push(SimRegister {
            code: code_bits(self.ir_len, code),
            value: BitVec::repeat(false, len.max(1)),
            writable: true,
        });
        self
    }

    pub fn ir_len(&self) -> usize {
        self.ir_len
    }

    /// The instruction currently latched, as an integer.
    pub fn instruction(&self) -> u64 {
        self.ir
            .iter()
            .by_vals()
            .take(64)
            .enumerate()
            .fold(0, |acc, (i, b)| acc | ((b as u64) << i))
    }

    /// The last value updated into the register selected by `code`.
    pub fn register(&self, code: u64) -> Option<&BitSlice<u8>> {
        let code = code_bits(self.ir_len, code);
        self.registers
            .iter()
            .find(|r| r.code == code)
            .map(|r| r.value.as_bitslice())
    }

    fn selected(&self) -> Option<usize> {
        self.registers.iter().position(|r| r.code == self.ir)
    }

    fn reset(&mut self) {
        self.ir = self.reset_ir.clone();
    }

    fn capture_dr(&mut self) {
        self.shift = match self.selected() {
            Some(i) => self.registers[i].value.clone(),
            None => BitVec::repeat(false, 1),
        };
    }

    fn capture_ir(&mut self) {
        self.shift = self.ir_capture.clone();
    }

    fn update_dr(&mut self) {
        if let Some(i) = self.selected() {
            let reg = &mut self.registers[i];
            if reg.writable && reg.value.len() == self.shift.len() {
                reg.value.copy_from_bitslice(&self.shift);
            }
        }
    }

    fn update_ir(&mut self) {
        if self.shift.len() == self.ir_len {
            self.ir = self.shift.clone();
        }
    }

    /// Shift one bit in at the top, return the bit falling out at index 0.
    fn shift_bit(&mut self, tdi: bool) -> bool {
        let out = self.shift[0];
        self.shift.shift_left(1);
        let top = self.shift.len() - 1;
        self.shift.set(top, tdi);
        out
    }
}

pub struct SimCable {
    taps: Vec<SimTap>,
    state: JtagState,
    signals: PodSignal,
    clocks: usize,
    transfers: usize,
}

impl SimCable {
    /// A chain of `taps`, powered up in Test-Logic-Reset with TRST and SRST released.
    pub fn new(taps: Vec<SimTap>) -> Self {
        let mut taps = taps;
        for t in taps.iter_mut() {
            t.reset();
        }
        Self {
            taps,
            state: JtagState::Reset,
            signals: PodSignal::TRST | PodSignal::SRST | PodSignal::TMS,
            clocks: 0,
            transfers: 0,
        }
    }

    pub fn taps(&self) -> &[SimTap] {
        &self.taps
    }

    /// The state the simulated controllers are actually in.
    pub fn state(&self) -> JtagState {
        self.state
    }

    /// Total TCK pulses so far.
    pub fn clocks(&self) -> usize {
        self.clocks
    }

    /// Number of `transfer` calls so far.
    pub fn transfers(&self) -> usize {
        self.transfers
    }

    fn tdo(&self) -> bool {
        match (self.state, self.taps.first()) {
            (JtagState::ShiftDR | JtagState::ShiftIR, Some(tap)) => tap.shift[0],
            (JtagState::ShiftDR | JtagState::ShiftIR, None) => self.signals.contains(PodSignal::TDI),
            // undriven, pulled up
            _ => true,
        }
    }

    /// One TCK pulse.  Returns TDO as sampled on the rising edge.
    fn edge(&mut self, tms: bool, tdi: bool) -> bool {
        self.signals.set(PodSignal::TMS, tms);
        self.signals.set(PodSignal::TDI, tdi);
        self.clocks += 1;
        let tdo = self.tdo();

        if !self.signals.contains(PodSignal::TRST) {
            self.state = JtagState::Reset;
            return tdo;
        }

        match self.state {
            JtagState::CaptureDR => self.taps.iter_mut().for_each(SimTap::capture_dr),
            JtagState::CaptureIR => self.taps.iter_mut().for_each(SimTap::capture_ir),
            JtagState::ShiftDR | JtagState::ShiftIR => {
                let mut bit = tdi;
                for tap in self.taps.iter_mut().rev() {
                    bit = tap.shift_bit(bit);
                }
            }
            _ => {}
        }

        self.state = self.state.next(tms);
        match self.state {
            JtagState::UpdateDR => self.taps.iter_mut().for_each(SimTap::update_dr),
            JtagState::UpdateIR => self.taps.iter_mut().for_each(SimTap::update_ir),
            JtagState::Reset => self.taps.iter_mut().for_each(SimTap::reset),
            _ => {}
        }
        tdo
    }
}

impl Cable for SimCable {
    fn clock(&mut self, tms: bool, tdi: bool, n: usize) -> Result<(), CableError> {
        for _ in 0..n {
            self.edge(tms, tdi);
        }
        Ok(())
    }

    fn get_tdo(&mut self) -> Result<bool, CableError> {
        Ok(self.tdo())
    }

    fn transfer(
        &mut self,
        input: &BitSlice<u8>,
        mut output: Option<&mut BitSlice<u8>>,
    ) -> Result<(), CableError> {
        self.transfers += 1;
        trace!(bits = input.len(), capture = output.is_some(), "sim transfer");
        for (i, tdi) in input.iter().by_vals().enumerate() {
            let tdo = self.edge(false, tdi);
            if let Some(out) = output.as_deref_mut() {
                out.set(i, tdo);
            }
        }
        Ok(())
    }

    fn set_signal(&mut self, mask: PodSignal, value: PodSignal) -> Result<PodSignal, CableError> {
        let old = self.signals;
        self.signals = (old & !mask) | (value & mask);
        if old.contains(PodSignal::TRST) && !self.signals.contains(PodSignal::TRST) {
            self.state = JtagState::Reset;
            self.taps.iter_mut().for_each(SimTap::reset);
        }
        Ok(old)
    }

    fn get_signal(&mut self, signal: PodSignal) -> Result<bool, CableError> {
        Ok(self.signals.contains(signal))
    }
}
