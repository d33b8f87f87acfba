//! Count the parts on a real chain: put every TAP in BYPASS, shift a single one through a run of
//! zeros and see how many clocks it takes to come out.
use jtag_chain::cable;
use jtag_chain::statemachine::{ExitMode, JtagSM};
use jtag_chain::BitRegister;
use tracing_subscriber::EnvFilter;

const MAX_PARTS: usize = 64;
// Longest instruction register chain we try to flood with ones
const MAX_IR_BITS: usize = 1024;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let name = std::env::args().nth(1).unwrap_or_else(|| "jtagkey".into());
    let cable = cable::new_from_string(&name, 1 << 20)?;
    let mut jtag = JtagSM::new(cable);
    jtag.trst_reset()?;

    // all ones is BYPASS for every part
    let mut ones = BitRegister::new(MAX_IR_BITS)?;
    ones.fill(true);
    jtag.capture_ir()?;
    jtag.shift_register(&ones, None, ExitMode::Idle)?;

    let mut probe = BitRegister::new(MAX_PARTS + 1)?;
    probe.set(0, true)?;
    let mut out = BitRegister::new(MAX_PARTS + 1)?;
    jtag.capture_dr()?;
    jtag.shift_register(&probe, Some(&mut out), ExitMode::Idle)?;

    match (0..out.len()).find(|&i| out.get(i) == Some(true)) {
        Some(parts) => println!("{parts} parts on the chain"),
        None => println!("no response within {MAX_PARTS} parts, is the target powered?"),
    }
    Ok(())
}
