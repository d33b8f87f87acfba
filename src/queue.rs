//! A FIFO of TAP actions waiting to be sent to a cable.
//!
//! Shifting is bound by the latency of the link to the adapter, so clocks and transfers are queued
//! here and executed in one go.  Actions which produce TDO data are ticketed; their results are
//! kept in enqueue order until they are taken with the same ticket.
use alloc::collections::VecDeque;
use alloc::format;

use bitvec::prelude::*;
use tracing::{trace, warn};

use crate::cable::Cable;
use crate::error::{Error, Result};

/// Queue tunables.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueConfig {
    /// Number of queued actions after which an `Optionally` flush executes the queue.
    pub flush_threshold: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            flush_threshold: 4096,
        }
    }
}

/// How much of the queue a flush has to execute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlushAmount {
    /// Only when the queue has grown past the configured threshold.
    Optionally,
    /// Everything queued, so that every pending result becomes available.
    ToOutput,
    /// Everything queued, then whatever the adapter itself has buffered.
    Completely,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    /// `n` TCK pulses with TMS and TDI held.
    Clock { tms: bool, tdi: bool, n: usize },
    /// One TCK pulse per bit with TMS low.
    Transfer { bits: BitVec<u8>, capture: bool },
    /// Sample TDO before the next clock.
    GetTdo,
}

/// Identifies the result of a capturing action.  Tickets increase monotonically.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(u64);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Transfer(BitVec<u8>),
    Tdo(bool),
}

#[derive(Debug, Default)]
pub struct Queue {
    config: QueueConfig,
    actions: VecDeque<(Action, Option<Ticket>)>,
    results: VecDeque<(Ticket, Outcome)>,
    next_ticket: u64,
}

impl Queue {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Number of actions waiting to be executed.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Number of results waiting to be taken.
    pub fn pending_results(&self) -> usize {
        self.results.len()
    }

    fn ticket(&mut self) -> Ticket {
        let t = Ticket(self.next_ticket);
        self.next_ticket += 1;
        t
    }

    pub fn push_clock(&mut self, tms: bool, tdi: bool, n: usize) {
        if n > 0 {
            self.actions.push_back((Action::Clock { tms, tdi, n }, None));
        }
    }

    /// Queue a transfer of `bits`.  Returns a ticket when `capture` is set and `bits` is not
    /// empty; an empty transfer queues nothing.
    pub fn push_transfer(&mut self, bits: &BitSlice<u8>, capture: bool) -> Option<Ticket> {
        if bits.is_empty() {
            return None;
        }
        let ticket = capture.then(|| self.ticket());
        self.actions.push_back((
            Action::Transfer {
                bits: bits.to_bitvec(),
                capture,
            },
            ticket,
        ));
        ticket
    }

    pub fn push_get_tdo(&mut self) -> Ticket {
        let ticket = self.ticket();
        self.actions.push_back((Action::GetTdo, Some(ticket)));
        ticket
    }

    /// Execute queued actions on `cable` as far as `amount` asks for.  If the cable fails, the
    /// rest of the queue and every pending result are dropped.
    pub fn flush<C: Cable + ?Sized>(&mut self, cable: &mut C, amount: FlushAmount) -> Result<()> {
        if amount == FlushAmount::Optionally && self.actions.len() < self.config.flush_threshold {
            return Ok(());
        }

        if !self.actions.is_empty() {
            trace!(actions = self.actions.len(), ?amount, "flushing queue");
        }
        if let Err(e) = self.execute(cable) {
            self.actions.clear();
            self.results.clear();
            return Err(e);
        }

        if amount == FlushAmount::Completely {
            cable.flush()?;
        }
        Ok(())
    }

    fn execute<C: Cable + ?Sized>(&mut self, cable: &mut C) -> Result<()> {
        // Runs of TMS=0 clocks, transfers and TDO samples become one cable transfer.
        let mut run: BitVec<u8> = BitVec::new();
        let mut captures: VecDeque<(Ticket, usize, Option<usize>)> = VecDeque::new();

        while let Some((action, ticket)) = self.actions.pop_front() {
            match action {
                Action::Clock { tms: false, tdi, n } => {
                    run.resize(run.len() + n, tdi);
                }
                Action::Transfer { bits, capture } => {
                    if let (true, Some(t)) = (capture, ticket) {
                        captures.push_back((t, run.len(), Some(bits.len())));
                    }
                    run.extend_from_bitslice(&bits);
                }
                Action::GetTdo => {
                    if let Some(t) = ticket {
                        captures.push_back((t, run.len(), None));
                    }
                }
                Action::Clock { tms: true, tdi, n } => {
                    let trailing = self.run_transfer(cable, &run, &mut captures)?;
                    run.clear();
                    if trailing.is_empty() {
                        cable.clock(true, tdi, n)?;
                    } else {
                        let tdo = cable.clock_capture(true, tdi)?;
                        self.resolve_tdo(trailing, tdo);
                        if n > 1 {
                            cable.clock(true, tdi, n - 1)?;
                        }
                    }
                }
            }
        }

        let trailing = self.run_transfer(cable, &run, &mut captures)?;
        if !trailing.is_empty() {
            let tdo = cable.get_tdo()?;
            self.resolve_tdo(trailing, tdo);
        }
        Ok(())
    }

    /// Send `run` to the cable and store the captured results.  Returns the TDO samples taken at
    /// the very end of the run, which need a further clock (or a plain read) to resolve.
    fn run_transfer<C: Cable + ?Sized>(
        &mut self,
        cable: &mut C,
        run: &BitSlice<u8>,
        captures: &mut VecDeque<(Ticket, usize, Option<usize>)>,
    ) -> Result<VecDeque<Ticket>> {
        let mut trailing = VecDeque::new();
        if run.is_empty() {
            trailing.extend(captures.drain(..).map(|(t, _, _)| t));
            return Ok(trailing);
        }

        if captures.is_empty() {
            cable.transfer(run, None)?;
            return Ok(trailing);
        }

        let mut out: BitVec<u8> = BitVec::repeat(false, run.len());
        cable.transfer(run, Some(out.as_mut_bitslice()))?;
        for (ticket, start, len) in captures.drain(..) {
            match len {
                Some(len) => self
                    .results
                    .push_back((ticket, Outcome::Transfer(out[start..start + len].to_bitvec()))),
                None if start < out.len() => {
                    self.results.push_back((ticket, Outcome::Tdo(out[start])))
                }
                None => trailing.push_back(ticket),
            }
        }
        Ok(trailing)
    }

    fn resolve_tdo(&mut self, tickets: VecDeque<Ticket>, tdo: bool) {
        for t in tickets {
            self.results.push_back((t, Outcome::Tdo(tdo)));
        }
        // results must stay in ticket order
        self.results.make_contiguous().sort_by_key(|(t, _)| *t);
    }

    fn take(&mut self, ticket: Ticket) -> Result<Outcome> {
        // Results of shifts whose output was never retrieved are dropped here.
        while let Some((t, _)) = self.results.front() {
            if *t >= ticket {
                break;
            }
            warn!(stale = t.0, wanted = ticket.0, "dropping unretrieved queue result");
            self.results.pop_front();
        }

        match self.results.pop_front() {
            Some((t, outcome)) if t == ticket => Ok(outcome),
            Some(other) => {
                let found = other.0 .0;
                self.results.push_front(other);
                Err(Error::IllegalState(format!(
                    "queue result {found} does not match ticket {}",
                    ticket.0
                )))
            }
            None => Err(Error::IllegalState(format!(
                "no queue result for ticket {}",
                ticket.0
            ))),
        }
    }

    /// Take the bits captured by a transfer.  The queue must have been flushed.
    pub fn take_transfer(&mut self, ticket: Ticket) -> Result<BitVec<u8>> {
        match self.take(ticket)? {
            Outcome::Transfer(bits) => Ok(bits),
            Outcome::Tdo(_) => Err(Error::IllegalState(format!(
                "ticket {} is a TDO sample, not a transfer",
                ticket.0
            ))),
        }
    }

    /// Take a sampled TDO level.  The queue must have been flushed.
    pub fn take_tdo(&mut self, ticket: Ticket) -> Result<bool> {
        match self.take(ticket)? {
            Outcome::Tdo(bit) => Ok(bit),
            Outcome::Transfer(_) => Err(Error::IllegalState(format!(
                "ticket {} is a transfer, not a TDO sample",
                ticket.0
            ))),
        }
    }
}
