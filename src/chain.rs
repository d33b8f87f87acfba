//! A JTAG scan chain made of several parts.  `Chain` shifts the instruction registers of all parts
//! in one IR scan and their selected data registers in one DR scan, keeping every part's input
//! and captured output in its own `Part`.
//!
//! Part 0 is the part nearest TDO: its bits are the first to be shifted in and the first to come
//! out.
use alloc::format;
use alloc::vec::Vec;

use tracing::debug;

use crate::cable::{Cable, PodSignal};
use crate::error::{Error, Result};
use crate::part::Part;
use crate::queue::{FlushAmount, QueueConfig};
use crate::register::BitRegister;
use crate::state::JtagState;
use crate::statemachine::{ExitMode, JtagSM, PendingShift};

pub struct Chain<T> {
    pub sm: JtagSM<T>,
    parts: Vec<Part>,
    active: Option<usize>,
}

#[derive(Clone, Copy, PartialEq)]
enum Scan {
    Instruction,
    Data,
}

impl<T, U> Chain<T>
    where T: core::ops::DerefMut<Target=U>,
          U: Cable + ?Sized
{
    /// Create an empty chain using an existing `JtagSM` object
    pub fn new(sm: JtagSM<T>) -> Self {
        Self {
            sm,
            parts: Vec::new(),
            active: None,
        }
    }

    pub fn with_config(cable: T, config: QueueConfig) -> Self {
        Self::new(JtagSM::with_config(cable, config))
    }

    /// Append a part.  Parts are added in chain order, starting nearest TDO.
    pub fn add_part(&mut self, part: Part) -> usize {
        debug!(index = self.parts.len(), part = %part.part, "add part");
        self.parts.push(part);
        self.parts.len() - 1
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn parts_mut(&mut self) -> &mut [Part] {
        &mut self.parts
    }

    pub fn part(&self, index: usize) -> Option<&Part> {
        self.parts.get(index)
    }

    pub fn part_mut(&mut self, index: usize) -> Option<&mut Part> {
        self.parts.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Select the part that single part operations and `wait_ready` refer to.
    pub fn set_active_part(&mut self, index: usize) -> Result<()> {
        if index >= self.parts.len() {
            return Err(Error::InvalidArgument(format!(
                "part {index} out of range, chain has {} parts",
                self.parts.len()
            )));
        }
        self.active = Some(index);
        Ok(())
    }

    pub fn active_part(&self) -> Option<usize> {
        self.active
    }

    /// Sum of the instruction register lengths of all parts.
    pub fn total_instr_len(&self) -> usize {
        self.parts.iter().map(Part::instruction_length).sum()
    }

    /// The tracked controller state.
    pub fn state(&self) -> JtagState {
        self.sm.state()
    }

    /// Select the instruction called `name` in every part.  Parts without it end up with no
    /// active instruction.
    pub fn set_instruction(&mut self, name: &str) {
        for p in self.parts.iter_mut() {
            p.set_active_instruction(name);
        }
    }

    pub fn clock(&mut self, tms: bool, tdi: bool, n: usize) -> Result<()> {
        self.sm.clock(tms, tdi, n)
    }

    pub fn defer_clock(&mut self, tms: bool, tdi: bool, n: usize) -> Result<()> {
        self.sm.defer_clock(tms, tdi, n)
    }

    /// Send everything queued, including what the cable buffers itself.
    pub fn flush(&mut self) -> Result<()> {
        self.sm.flush(FlushAmount::Completely)
    }

    pub fn set_trst(&mut self, trst: bool) -> Result<()> {
        self.sm.set_trst(trst)
    }

    pub fn get_trst(&mut self) -> Result<bool> {
        self.sm.get_trst()
    }

    pub fn set_pod_signal(&mut self, mask: PodSignal, value: PodSignal) -> Result<PodSignal> {
        self.sm.set_pod_signal(mask, value)
    }

    pub fn get_pod_signal(&mut self, signal: PodSignal) -> Result<bool> {
        self.sm.get_pod_signal(signal)
    }

    pub fn reset(&mut self) -> Result<()> {
        self.sm.reset()
    }

    pub fn trst_reset(&mut self) -> Result<()> {
        self.sm.trst_reset()
    }

    /// Reset, then load all ones into every instruction register and select BYPASS in every
    /// part.
    pub fn reset_bypass(&mut self) -> Result<()> {
        self.reset()?;
        let total = self.total_instr_len();
        if total > 0 {
            let mut ir = BitRegister::new(total)?;
            ir.fill(true);
            self.sm.capture_ir()?;
            self.sm.shift_register(&ir, None, ExitMode::Idle)?;
            self.set_instruction("BYPASS");
        }
        Ok(())
    }

    /// Extra idle clocks requested by the active part.
    fn wait_ready(&self) -> usize {
        self.active
            .and_then(|a| self.parts.get(a))
            .map_or(0, Part::wait_ready)
    }

    fn check(&self, scan: Scan) -> Result<()> {
        if self.parts.is_empty() {
            return Err(Error::IllegalState("chain has no parts".into()));
        }
        for (i, p) in self.parts.iter().enumerate() {
            let ins = p
                .active_instruction()
                .ok_or(Error::NoActiveInstruction { part: i })?;
            if scan == Scan::Data && ins.data_register().is_none() {
                return Err(Error::NoDataRegister {
                    part: i,
                    instruction: ins.name().into(),
                });
            }
        }
        Ok(())
    }

    fn scan(
        &mut self,
        scan: Scan,
        capture_output: bool,
        capture: bool,
        exit: ExitMode,
    ) -> Result<()> {
        self.check(scan)?;
        if capture {
            match scan {
                Scan::Instruction => self.sm.capture_ir()?,
                Scan::Data => self.sm.capture_dr()?,
            }
        }

        let idle_clocks = self.wait_ready();
        let count = self.parts.len();
        let mut pending: Vec<PendingShift> = Vec::with_capacity(count);
        for (i, part) in self.parts.iter_mut().enumerate() {
            let (input, output) = match scan {
                Scan::Instruction => part.instruction_registers(i)?,
                Scan::Data => part.data_registers_of_active(i)?,
            };
            let part_exit = if i + 1 == count { exit } else { ExitMode::Shift };
            let capture_len = capture_output.then(|| output.len());
            pending.push(self.sm.defer_shift(input, capture_len, part_exit, idle_clocks)?);
        }

        if !capture_output {
            drop(pending);
            return self.sm.flush(FlushAmount::ToOutput);
        }
        for (i, (part, shift)) in self.parts.iter_mut().zip(pending).enumerate() {
            let (_, output) = match scan {
                Scan::Instruction => part.instruction_registers(i)?,
                Scan::Data => part.data_registers_of_active(i)?,
            };
            self.sm.retrieve_output(shift, output)?;
        }
        Ok(())
    }

    /// Shift the active instruction of every part into the chain.  With `capture` the scan starts
    /// from Run-Test/Idle through Capture-IR; with `capture_output` each instruction's `out`
    /// receives what its part shifted out.  `exit` applies to the end of the last part.
    pub fn shift_instructions(
        &mut self,
        capture_output: bool,
        capture: bool,
        exit: ExitMode,
    ) -> Result<()> {
        self.scan(Scan::Instruction, capture_output, capture, exit)
    }

    /// Shift the data register selected by every part's active instruction.  Inputs come from
    /// each register's `input`; with `capture_output` the captured bits land in its `output`.
    pub fn shift_data_registers(
        &mut self,
        capture_output: bool,
        capture: bool,
        exit: ExitMode,
    ) -> Result<()> {
        self.scan(Scan::Data, capture_output, capture, exit)
    }
}
