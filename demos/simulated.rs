//! Walk a two part chain built on the simulated cable: read the IDCODEs, then sample and drive the
//! boundary scan register of the second part.  Run with `RUST_LOG=jtag_chain=trace` to see every
//! queued action.
use jtag_chain::cable::sim::{SimCable, SimTap};
use jtag_chain::part::{BSR, DIR};
use jtag_chain::{BitRegister, Chain, ExitMode, JtagSM, Part};
use tracing_subscriber::EnvFilter;

const CPLD: &str = "
instruction length 3
register BR 1
register DIR 32
boundary length 4
instruction BYPASS 111 BR
instruction IDCODE 001 DIR
instruction SAMPLE 010 BSR

pin LED
pin BUTTON
bit 0 I 1 BUTTON
bit 1 C 0 *
bit 2 O 0 LED 1 0 Z
bit 3 X 0 *
";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cable = SimCable::new(vec![
        SimTap::new(4).with_idcode(0b0001, 0x4ba0_0477),
        SimTap::new(3).with_idcode(0b001, 0x0620_a093).with_register(0b010, 4),
    ]);
    let mut chain = Chain::new(JtagSM::new(Box::new(cable)));

    let mut cpu = Part::with_idcode(0x4ba0_0477)?;
    cpu.manufacturer = "ARM".into();
    cpu.part = "Cortex-M debug port".into();
    cpu.set_instruction_length(4)?;
    cpu.define_data_register("BR", 1)?;
    cpu.define_data_register(DIR, 32)?;
    cpu.define_instruction("BYPASS", "1111", Some("BR"))?;
    cpu.define_instruction("IDCODE", "0001", Some(DIR))?;
    chain.add_part(cpu);

    let mut cpld = Part::from_description(BitRegister::from_integer(32, 0x0620_a093)?, CPLD)?;
    cpld.manufacturer = "Xilinx".into();
    cpld.part = "XC2C".into();
    chain.add_part(cpld);

    chain.trst_reset()?;
    chain.set_instruction("IDCODE");
    chain.shift_instructions(false, true, ExitMode::Idle)?;
    chain.shift_data_registers(true, true, ExitMode::Idle)?;
    for (i, part) in chain.parts().iter().enumerate() {
        let id = part.active_data_register().map(|d| d.output.to_integer());
        println!("{i}: {part}  idcode {:#010x}", id.unwrap_or_default());
    }

    chain.parts_mut()[0].set_active_instruction("BYPASS");
    chain.parts_mut()[1].set_active_instruction("SAMPLE");
    chain.shift_instructions(false, true, ExitMode::Idle)?;

    chain.parts_mut()[1].set_signal("LED", true, true)?;
    for _ in 0..2 {
        chain.shift_data_registers(true, true, ExitMode::Idle)?;
        let cpld = &chain.parts()[1];
        println!(
            "BSR {}  BUTTON {}",
            cpld.data_register(BSR).map(|d| d.output.to_bitstring()).unwrap_or_default(),
            cpld.get_signal("BUTTON")?
        );
    }
    Ok(())
}
