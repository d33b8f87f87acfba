//! This provides a higher-level interface than the `Cable` trait.  Specifically, it keeps track of
//! the state of the JTAG state machine, queues clocks and transfers, and shifts whole registers
//! using the two phase defer/retrieve protocol.
use bitvec::prelude::*;
use tracing::{trace, warn};

use crate::cable::{Cable, PodSignal};
use crate::error::Result;
use crate::queue::{FlushAmount, Queue, QueueConfig, Ticket};
use crate::register::BitRegister;
use crate::state::{JtagState, TapTracker};

/// Where a register shift leaves the TAP controllers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitMode {
    /// Stay in Shift-DR/Shift-IR so another register can follow.
    Shift,
    /// Leave through Update-DR/Update-IR into Run-Test/Idle.
    Idle,
    /// Stop in Exit1-DR/Exit1-IR.
    Exit1,
    /// Stop in Update-DR/Update-IR.
    Update,
}

impl ExitMode {
    fn leaves_shift(self) -> bool {
        self != ExitMode::Shift
    }
}

/// Handle for the output of a deferred shift.  It has to be passed to
/// [`JtagSM::retrieve_output`] to get the captured bits back.
#[must_use = "the captured bits are lost unless the shift is retrieved"]
#[derive(Debug)]
pub struct PendingShift {
    bulk: Option<Ticket>,
    tdo: alloc::vec::Vec<Ticket>,
    len: usize,
}

impl PendingShift {
    /// Number of bits that will be retrieved.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

pub struct JtagSM<T> {
    pub cable: T,
    queue: Queue,
    tap: TapTracker,
}

impl<T, U> JtagSM<T>
    where T: core::ops::DerefMut<Target=U>,
          U: Cable + ?Sized
{
    /// Create a JTAG state machine using an existing `Cable`.  The controller state is unknown
    /// until the first `reset`.
    pub fn new(cable: T) -> Self {
        Self::with_config(cable, QueueConfig::default())
    }

    pub fn with_config(cable: T, config: QueueConfig) -> Self {
        Self {
            cable,
            queue: Queue::new(config),
            tap: TapTracker::new(),
        }
    }

    /// The tracked controller state.
    pub fn state(&self) -> JtagState {
        self.tap.state()
    }

    /// Number of actions not yet sent to the cable.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn flush(&mut self, amount: FlushAmount) -> Result<()> {
        self.queue.flush(&mut *self.cable, amount)
    }

    /// Pulse TCK `n` times right away.  Anything queued is sent first.
    pub fn clock(&mut self, tms: bool, tdi: bool, n: usize) -> Result<()> {
        self.flush(FlushAmount::Completely)?;
        self.cable.clock(tms, tdi, n)?;
        for _ in 0..n {
            self.tap.clock(tms);
        }
        Ok(())
    }

    /// Queue `n` TCK pulses.
    pub fn defer_clock(&mut self, tms: bool, tdi: bool, n: usize) -> Result<()> {
        self.queue.push_clock(tms, tdi, n);
        for _ in 0..n {
            self.tap.clock(tms);
        }
        self.flush(FlushAmount::Optionally)
    }

    /// Drive TRST; `true` releases it.  Releasing TRST leaves the controllers in Test-Logic-Reset.
    pub fn set_trst(&mut self, trst: bool) -> Result<()> {
        let value = if trst { PodSignal::TRST } else { PodSignal::empty() };
        self.set_pod_signal(PodSignal::TRST, value)?;
        Ok(())
    }

    pub fn get_trst(&mut self) -> Result<bool> {
        self.get_pod_signal(PodSignal::TRST)
    }

    /// Drive the cable lines in `mask` to `value`, returning the previous levels.  A change of
    /// TRST updates the tracked state.
    pub fn set_pod_signal(&mut self, mask: PodSignal, value: PodSignal) -> Result<PodSignal> {
        self.flush(FlushAmount::Completely)?;
        let old = self.cable.set_signal(mask, value)?;
        let new = (old & !mask) | (value & mask);
        self.tap
            .set_trst(old.contains(PodSignal::TRST), new.contains(PodSignal::TRST));
        Ok(old)
    }

    pub fn get_pod_signal(&mut self, signal: PodSignal) -> Result<bool> {
        self.flush(FlushAmount::Completely)?;
        Ok(self.cable.get_signal(signal)?)
    }

    /// Reset the scan chain by driving TMS high for 5 clocks, then move to Run-Test/Idle.
    pub fn reset(&mut self) -> Result<()> {
        self.tap.reset();
        self.clock(true, false, 5)?;
        self.clock(false, false, 1)
    }

    /// Pulse TRST, then `reset`.
    pub fn trst_reset(&mut self) -> Result<()> {
        self.set_trst(false)?;
        self.set_trst(true)?;
        self.reset()
    }

    /// Queue the move from Run-Test/Idle (or an Update state) into Capture-DR.
    pub fn capture_dr(&mut self) -> Result<()> {
        if !self.state().is_idle_like() {
            warn!(state = ?self.state(), "capture_dr: invalid state");
        }
        self.defer_clock(true, false, 1)?;
        self.defer_clock(false, false, 1)
    }

    /// Queue the move from Run-Test/Idle (or an Update state) into Capture-IR.
    pub fn capture_ir(&mut self) -> Result<()> {
        if !self.state().is_idle_like() {
            warn!(state = ?self.state(), "capture_ir: invalid state");
        }
        self.defer_clock(true, false, 2)?;
        self.defer_clock(false, false, 1)
    }

    /// Use TMS to get into `state` by the most efficient path.  An unknown state is left through
    /// Test-Logic-Reset.
    pub fn move_to(&mut self, state: JtagState) -> Result<()> {
        if self.state() == JtagState::Unknown {
            self.queue.push_clock(true, false, 5);
            self.tap.reset();
        }
        let path = self.state().path_to(state);
        trace!(from = ?self.state(), to = ?state, clocks = path.len(), "move");
        for tms in path {
            self.defer_clock(tms, false, 1)?;
        }
        Ok(())
    }

    /// Queue the shift of `input` through the register selected by the current state.
    ///
    /// The controllers must be in Capture, Shift or Exit2 of either register; a Capture or Exit2
    /// state is first left with one TMS=0 clock.  When `capture` is set the TDO bits are kept,
    /// at most `capture` of them, and can be fetched with `retrieve_output`.  With
    /// `ExitMode::Idle` the shift ends with `idle_clocks` extra clocks in Run-Test/Idle.
    pub fn defer_shift(
        &mut self,
        input: &BitRegister,
        capture: Option<usize>,
        exit: ExitMode,
        idle_clocks: usize,
    ) -> Result<PendingShift> {
        let state = self.state();
        if !state.is_shift_entry() {
            warn!(?state, "defer_shift: invalid state");
        }
        if state.enters_shift() {
            self.defer_clock(false, false, 1)?;
        }

        let bits = input.as_bitslice();
        let mut bulk_len = bits.len() - exit.leaves_shift() as usize;
        if let Some(limit) = capture {
            bulk_len = bulk_len.min(limit);
        }

        let bulk = self.queue.push_transfer(&bits[..bulk_len], capture.is_some());
        for _ in 0..bulk_len {
            self.tap.clock(false);
        }

        let mut pending = PendingShift {
            bulk,
            tdo: alloc::vec::Vec::new(),
            len: capture.map_or(0, |limit| bits.len().min(limit)),
        };
        for i in bulk_len..bits.len() {
            if capture.is_some_and(|limit| i < limit) {
                pending.tdo.push(self.queue.push_get_tdo());
            }
            let last = i + 1 == bits.len();
            self.defer_clock(exit.leaves_shift() && last, bits[i], 1)?;
        }

        match exit {
            ExitMode::Idle => {
                self.defer_clock(true, false, 1)?;
                self.defer_clock(false, false, 1)?;
                if idle_clocks > 0 {
                    self.defer_clock(false, false, idle_clocks)?;
                }
            }
            ExitMode::Update => self.defer_clock(true, false, 1)?,
            ExitMode::Shift | ExitMode::Exit1 => {}
        }
        Ok(pending)
    }

    /// Flush the queue and copy the bits captured by `pending` into `output`.  Bits beyond the
    /// end of `output` are dropped.
    pub fn retrieve_output(
        &mut self,
        pending: PendingShift,
        output: &mut BitRegister,
    ) -> Result<()> {
        self.flush(FlushAmount::ToOutput)?;

        let mut captured: BitVec<u8> = match pending.bulk {
            Some(ticket) => self.queue.take_transfer(ticket)?,
            None => BitVec::new(),
        };
        for ticket in pending.tdo {
            captured.push(self.queue.take_tdo(ticket)?);
        }
        output.assign_truncated(&captured);
        Ok(())
    }

    /// Shift `input` and, when `output` is given, read back what the register held.
    pub fn shift_register(
        &mut self,
        input: &BitRegister,
        output: Option<&mut BitRegister>,
        exit: ExitMode,
    ) -> Result<()> {
        match output {
            Some(out) => {
                let pending = self.defer_shift(input, Some(out.len()), exit, 0)?;
                self.retrieve_output(pending, out)
            }
            None => {
                let pending = self.defer_shift(input, None, exit, 0)?;
                drop(pending);
                self.flush(FlushAmount::ToOutput)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cable::sim::{SimCable, SimTap};
    use alloc::boxed::Box;

    fn sm() -> JtagSM<Box<SimCable>> {
        let cable = SimCable::new(alloc::vec![SimTap::new(4).with_idcode(0b0010, 0x1234_5677)]);
        JtagSM::new(Box::new(cable))
    }

    #[test]
    fn reset_lands_in_idle() {
        let mut sm = sm();
        assert_eq!(sm.state(), JtagState::Unknown);
        sm.reset().unwrap();
        assert_eq!(sm.state(), JtagState::Idle);
        assert_eq!(sm.cable.state(), JtagState::Idle);
    }

    #[test]
    fn idcode_after_reset() {
        let mut sm = sm();
        sm.reset().unwrap();
        sm.capture_dr().unwrap();
        let input = BitRegister::new(32).unwrap();
        let mut id = BitRegister::new(32).unwrap();
        sm.shift_register(&input, Some(&mut id), ExitMode::Idle).unwrap();
        assert_eq!(id.to_integer(), 0x1234_5677);
        assert_eq!(sm.state(), JtagState::Idle);
        assert_eq!(sm.cable.state(), JtagState::Idle);
    }

    #[test]
    fn ir_capture_pattern_and_exit_modes() {
        let mut sm = sm();
        sm.reset().unwrap();
        sm.capture_ir().unwrap();
        let ones = BitRegister::from_bitstring("1111").unwrap();
        let mut out = BitRegister::new(4).unwrap();
        sm.shift_register(&ones, Some(&mut out), ExitMode::Exit1).unwrap();
        assert_eq!(out.to_bitstring(), "0001");
        assert_eq!(sm.state(), JtagState::Exit1IR);
        assert_eq!(sm.cable.state(), JtagState::Exit1IR);

        sm.move_to(JtagState::UpdateIR).unwrap();
        sm.flush(FlushAmount::Completely).unwrap();
        assert_eq!(sm.cable.state(), JtagState::UpdateIR);
    }

    #[test]
    fn move_from_unknown_resets_first() {
        let mut sm = sm();
        sm.move_to(JtagState::ShiftDR).unwrap();
        assert_eq!(sm.state(), JtagState::ShiftDR);
        sm.flush(FlushAmount::Completely).unwrap();
        assert_eq!(sm.cable.state(), JtagState::ShiftDR);
    }

    #[test]
    fn trst_updates_tracked_state() {
        let mut sm = sm();
        sm.reset().unwrap();
        sm.set_trst(false).unwrap();
        assert_eq!(sm.state(), JtagState::Unknown);
        assert!(!sm.get_trst().unwrap());
        sm.set_trst(true).unwrap();
        assert_eq!(sm.state(), JtagState::Reset);

        let old = sm
            .set_pod_signal(PodSignal::TRST | PodSignal::SRST, PodSignal::SRST)
            .unwrap();
        assert!(old.contains(PodSignal::TRST));
        assert_eq!(sm.state(), JtagState::Unknown);
    }

    #[test]
    fn partial_capture_uses_trailing_samples() {
        let mut sm = sm();
        sm.reset().unwrap();
        sm.capture_dr().unwrap();
        let input = BitRegister::new(32).unwrap();
        let mut low = BitRegister::new(4).unwrap();
        let pending = sm.defer_shift(&input, Some(4), ExitMode::Update, 0).unwrap();
        assert_eq!(pending.len(), 4);
        sm.retrieve_output(pending, &mut low).unwrap();
        assert_eq!(low.to_integer(), 0x7);
        assert_eq!(sm.state(), JtagState::UpdateDR);
    }
}
