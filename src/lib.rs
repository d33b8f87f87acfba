//! This crate drives an IEEE 1149.1 (JTAG) scan chain from the host, at a variety of levels of
//! abstraction.  At the lowest level is the `Cable` trait, which clocks TMS/TDI and samples TDO.
//! Cables based on the FT2232 "jtagkey" design, J-Link probes, bit-banged `embedded-hal` pins and
//! an in-memory simulator are provided.
//!
//! The next higher level of abstraction is the `JtagSM`, which keeps track of the state of the
//! TAP controllers and queues clocks and transfers so that a cable sees as few calls as possible.
//! Shifts are split in a deferred half that queues the bits and a retrieve half that collects
//! what came back, so several registers can go out in one round trip.
//!
//! On top of it, a `Chain` holds one `Part` per chip.  Each part knows its instructions, data
//! registers and boundary scan signals, either defined through its methods or read from a part
//! description.  The chain shifts the active instruction of every part in one IR scan and the
//! selected data registers in one DR scan.
//!
//! # Example
//! ```
//! use jtag_chain::cable::sim::{SimCable, SimTap};
//! use jtag_chain::chain::Chain;
//! use jtag_chain::part::{Part, DIR};
//! use jtag_chain::statemachine::{ExitMode, JtagSM};
//!
//! let cable = SimCable::new(vec![SimTap::new(4).with_idcode(0b0001, 0x4ba0_0477)]);
//! let mut chain = Chain::new(JtagSM::new(Box::new(cable)));
//!
//! let mut part = Part::with_idcode(0x4ba0_0477)?;
//! part.set_instruction_length(4)?;
//! part.define_data_register("BR", 1)?;
//! part.define_data_register(DIR, 32)?;
//! part.define_instruction("BYPASS", "1111", Some("BR"))?;
//! part.define_instruction("IDCODE", "0001", Some(DIR))?;
//! chain.add_part(part);
//!
//! chain.reset()?;
//! chain.set_instruction("IDCODE");
//! chain.shift_instructions(false, true, ExitMode::Idle)?;
//! chain.shift_data_registers(true, true, ExitMode::Idle)?;
//!
//! let part = &chain.parts()[0];
//! assert_eq!(part.active_data_register().unwrap().output.to_integer(), 0x4ba0_0477);
//! # Ok::<(), jtag_chain::error::Error>(())
//! ```

#![no_std]

#[cfg(feature = "std")]
extern crate std;

extern crate alloc;

pub mod cable;
pub mod chain;
pub mod description;
pub mod error;
pub mod part;
pub mod queue;
pub mod register;
pub mod signal;
pub mod state;
pub mod statemachine;

pub use chain::Chain;
pub use error::{Error, Result};
pub use part::Part;
pub use register::BitRegister;
pub use state::JtagState;
pub use statemachine::{ExitMode, JtagSM};
