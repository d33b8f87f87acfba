//! The IEEE 1149.1 TAP controller state graph, and the bookkeeping copy of the controller state
//! that a host keeps while it drives TMS.
use alloc::collections::VecDeque;
use alloc::vec;
use alloc::vec::Vec;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum JtagState {
    Reset = 0,
    Idle = 1,
    SelectDR = 2,
    CaptureDR = 3,
    ShiftDR = 4,
    Exit1DR = 5,
    PauseDR = 6,
    Exit2DR = 7,
    UpdateDR = 8,
    SelectIR = 9,
    CaptureIR = 10,
    ShiftIR = 11,
    Exit1IR = 12,
    PauseIR = 13,
    Exit2IR = 14,
    UpdateIR = 15,
    /// The host no longer knows where the controllers are, e.g. after TRST was driven low.
    Unknown = 16,
}

use JtagState::{
    CaptureDR, CaptureIR, Exit1DR, Exit1IR, Exit2DR, Exit2IR, Idle, PauseDR, PauseIR, Reset,
    SelectDR, SelectIR, ShiftDR, ShiftIR, UpdateDR, UpdateIR,
};

/// `[next state with TMS=0, next state with TMS=1]`, indexed by state.
const TRANSITIONS: [[JtagState; 2]; 16] = [
    [Idle, Reset],          // Reset
    [Idle, SelectDR],       // Idle
    [CaptureDR, SelectIR],  // SelectDR
    [ShiftDR, Exit1DR],     // CaptureDR
    [ShiftDR, Exit1DR],     // ShiftDR
    [PauseDR, UpdateDR],    // Exit1DR
    [PauseDR, Exit2DR],     // PauseDR
    [ShiftDR, UpdateDR],    // Exit2DR
    [Idle, SelectDR],       // UpdateDR
    [CaptureIR, Reset],     // SelectIR
    [ShiftIR, Exit1IR],     // CaptureIR
    [ShiftIR, Exit1IR],     // ShiftIR
    [PauseIR, UpdateIR],    // Exit1IR
    [PauseIR, Exit2IR],     // PauseIR
    [ShiftIR, UpdateIR],    // Exit2IR
    [Idle, SelectDR],       // UpdateIR
];

pub const ALL_STATES: [JtagState; 16] = [
    Reset, Idle, SelectDR, CaptureDR, ShiftDR, Exit1DR, PauseDR, Exit2DR, UpdateDR, SelectIR,
    CaptureIR, ShiftIR, Exit1IR, PauseIR, Exit2IR, UpdateIR,
];

impl JtagState {
    /// The state the controllers move to on one TCK edge with the given TMS level.  `Unknown`
    /// stays `Unknown`: only a reset makes the state known again.
    pub fn next(self, tms: bool) -> JtagState {
        match self {
            JtagState::Unknown => JtagState::Unknown,
            s => TRANSITIONS[s as usize][tms as usize],
        }
    }

    /// Capture-DR, Capture-IR, Shift-DR, Shift-IR, Exit2-DR and Exit2-IR: the states from which a
    /// register shift may start.
    pub fn is_shift_entry(self) -> bool {
        matches!(
            self,
            CaptureDR | CaptureIR | ShiftDR | ShiftIR | Exit2DR | Exit2IR
        )
    }

    /// States from which one TMS=0 edge enters Shift-DR or Shift-IR without shifting a bit.
    pub fn enters_shift(self) -> bool {
        matches!(self, CaptureDR | CaptureIR | Exit2DR | Exit2IR)
    }

    /// Run-Test/Idle, Update-DR and Update-IR: the states a capture sequence starts from.
    pub fn is_idle_like(self) -> bool {
        matches!(self, Idle | UpdateDR | UpdateIR)
    }

    /// Get the shortest TMS sequence leading from `self` to `target`.  From `Unknown` the
    /// sequence starts with five TMS=1 clocks, which reach Reset from any state.
    pub fn path_to(self, target: JtagState) -> Vec<bool> {
        if target == JtagState::Unknown {
            return Vec::new();
        }
        let (start, mut prefix) = match self {
            JtagState::Unknown => (Reset, vec![true; 5]),
            s => (s, Vec::new()),
        };
        if start == target {
            return prefix;
        }

        // Breadth-first search over the transition table; `via[s]` records how `s` was reached.
        let mut via: [Option<(JtagState, bool)>; 16] = [None; 16];
        let mut queue = VecDeque::new();
        queue.push_back(start);
        while let Some(state) = queue.pop_front() {
            for tms in [false, true] {
                let next = state.next(tms);
                if next == start || via[next as usize].is_some() {
                    continue;
                }
                via[next as usize] = Some((state, tms));
                if next == target {
                    let mut path = Vec::new();
                    let mut cur = target;
                    while cur != start {
                        let Some((prev, tms)) = via[cur as usize] else {
                            break;
                        };
                        path.push(tms);
                        cur = prev;
                    }
                    path.reverse();
                    prefix.extend(path);
                    return prefix;
                }
                queue.push_back(next);
            }
        }
        prefix
    }
}

/// Host side copy of the controller state.  It is advisory: the hardware may have been reset
/// behind our back, and nothing here can detect that.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TapTracker {
    state: JtagState,
}

impl Default for TapTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl TapTracker {
    pub fn new() -> Self {
        Self {
            state: JtagState::Unknown,
        }
    }

    pub fn state(&self) -> JtagState {
        self.state
    }

    /// Record that the controllers are in Test-Logic-Reset.  Does not clock anything.
    pub fn reset(&mut self) -> JtagState {
        self.state = Reset;
        self.state
    }

    /// Forget the state, e.g. when the cable is disconnected.
    pub fn forget(&mut self) -> JtagState {
        self.state = JtagState::Unknown;
        self.state
    }

    /// Record a change of the TRST line.  Releasing TRST (low to high) leaves the controllers in
    /// Test-Logic-Reset; asserting it makes the state unknown until the next reset.
    pub fn set_trst(&mut self, old: bool, new: bool) -> JtagState {
        if old != new {
            self.state = if new { Reset } else { JtagState::Unknown };
        }
        self.state
    }

    /// Mirror one TCK edge.  Must be called exactly once per clock sent to the cable.
    pub fn clock(&mut self, tms: bool) -> JtagState {
        self.state = self.state.next(tms);
        self.state
    }
}
