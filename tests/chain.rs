use std::any::Any;

use pretty_assertions::assert_eq;
use test_case::test_case;

use jtag_chain::cable::sim::{SimCable, SimTap};
use jtag_chain::part::{PartExtension, BSR};
use jtag_chain::queue::QueueConfig;
use jtag_chain::{BitRegister, Chain, Error, ExitMode, JtagSM, JtagState, Part};

const SAMPLE_PART: &str = "
instruction length 2
register BR 1
boundary length 3
instruction BYPASS 11 BR
instruction SAMPLE 10 BSR

pin PIN_A
pin PIN_B
pin PIN_C
bit 0 O 0 PIN_A
bit 1 I 0 PIN_B
bit 2 C 1 PIN_C 0 0 Z
";

// same cells, with PIN_C as a bidirectional pin
const BIDIR_PART: &str = "
instruction length 2
register BR 1
boundary length 3
instruction BYPASS 11 BR
instruction SAMPLE 10 BSR

pin PIN_A
pin PIN_B
pin PIN_C
bit 0 O 0 PIN_A
bit 1 I 0 PIN_B
bit 2 B 0 PIN_C
";

type SimChain = Chain<Box<SimCable>>;

fn sim_chain(taps: Vec<SimTap>) -> SimChain {
    Chain::new(JtagSM::new(Box::new(SimCable::new(taps))))
}

fn bypass_part(ir_len: usize) -> Part {
    let mut p = Part::with_idcode(0x1).unwrap();
    p.set_instruction_length(ir_len).unwrap();
    p.define_data_register("BR", 1).unwrap();
    p.define_instruction("BYPASS", &"1".repeat(ir_len), Some("BR")).unwrap();
    p
}

fn described_chain(description: &str) -> SimChain {
    let mut chain = sim_chain(vec![SimTap::new(2).with_register(0b10, 3)]);
    let part = Part::from_description(BitRegister::new(32).unwrap(), description).unwrap();
    chain.add_part(part);
    chain
}

fn sample_chain() -> SimChain {
    described_chain(SAMPLE_PART)
}

fn idcode_sm(idcode: u32) -> JtagSM<Box<SimCable>> {
    let cable = SimCable::new(vec![SimTap::new(4).with_idcode(0b0001, idcode)]);
    JtagSM::new(Box::new(cable))
}

fn two_part_chain(config: QueueConfig) -> SimChain {
    let cable = SimCable::new(vec![
        SimTap::new(4).with_idcode(0b0001, 0x1000_0001),
        SimTap::new(3).with_idcode(0b001, 0x2000_0001),
    ]);
    let mut chain = Chain::with_config(Box::new(cable), config);
    chain.add_part(bypass_part(4));
    let mut second = bypass_part(3);
    second.define_data_register("DIR", 32).unwrap();
    second.define_instruction("IDCODE", "001", Some("DIR")).unwrap();
    chain.add_part(second);
    chain
}

fn bsr_output(chain: &SimChain) -> String {
    chain.parts()[0].data_register(BSR).unwrap().output.to_bitstring()
}

#[test]
fn sample_reads_back_previous_shift() {
    let mut chain = sample_chain();
    chain.reset().unwrap();
    chain.set_instruction("SAMPLE");
    chain.shift_instructions(false, true, ExitMode::Idle).unwrap();
    assert_eq!(chain.sm.cable.taps()[0].instruction(), 0b10);

    chain.parts_mut()[0]
        .data_register_mut(BSR)
        .unwrap()
        .input
        .set_from_bitstring("101")
        .unwrap();
    chain.shift_data_registers(true, true, ExitMode::Idle).unwrap();
    assert_eq!(bsr_output(&chain), "000");
    assert_eq!(chain.state(), JtagState::Idle);

    chain.shift_data_registers(true, true, ExitMode::Idle).unwrap();
    assert_eq!(bsr_output(&chain), "101");
    assert_eq!(chain.sm.cable.state(), JtagState::Idle);
}

#[test]
fn boundary_signals_drive_and_sample() {
    let mut chain = described_chain(BIDIR_PART);
    chain.reset().unwrap();
    chain.set_instruction("SAMPLE");
    chain.shift_instructions(false, true, ExitMode::Idle).unwrap();

    let part = &mut chain.parts_mut()[0];
    part.set_signal("PIN_A", true, true).unwrap();
    part.set_signal("PIN_C", true, true).unwrap();
    assert!(matches!(
        part.set_signal("PIN_B", true, true),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        part.set_signal("PIN_D", true, true),
        Err(Error::NotFound { .. })
    ));
    assert_eq!(part.data_register(BSR).unwrap().input.to_bitstring(), "101");

    // the simulated register reflects the previous update on the next capture
    chain.shift_data_registers(true, true, ExitMode::Idle).unwrap();
    chain.shift_data_registers(true, true, ExitMode::Idle).unwrap();
    let part = &chain.parts()[0];
    assert!(part.get_signal("PIN_C").unwrap());
    assert!(!part.get_signal("PIN_B").unwrap());
    assert!(matches!(part.get_signal("PIN_A"), Err(Error::InvalidArgument(_))));
}

#[test]
fn bypass_single_bit_ends_in_idle() {
    let mut chain = sim_chain(vec![SimTap::new(4)]);
    chain.add_part(bypass_part(4));
    chain.reset_bypass().unwrap();

    chain.parts_mut()[0]
        .active_data_register_mut()
        .unwrap()
        .input
        .set(0, true)
        .unwrap();
    chain.shift_data_registers(true, true, ExitMode::Idle).unwrap();

    let br = chain.parts()[0].active_data_register().unwrap();
    assert_eq!(br.output.len(), 1);
    assert_eq!(br.output.get(0), Some(false));
    assert_eq!(chain.state(), JtagState::Idle);
    assert_eq!(chain.sm.cable.state(), JtagState::Idle);
}

#[test_case(1; "one part")]
#[test_case(2; "two parts")]
#[test_case(3; "three parts")]
fn bypass_delays_by_one_bit_per_part(parts: usize) {
    let mut chain = sim_chain((0..parts).map(|_| SimTap::new(3)).collect());
    for _ in 0..parts {
        chain.add_part(bypass_part(3));
    }
    chain.reset_bypass().unwrap();

    let input = BitRegister::from_bitstring("0001101").unwrap();
    let mut output = BitRegister::new(7).unwrap();
    chain.sm.capture_dr().unwrap();
    chain
        .sm
        .shift_register(&input, Some(&mut output), ExitMode::Idle)
        .unwrap();

    // every BYPASS register captures 0, then passes TDI on one clock later
    let expected = (input.to_integer() << parts) & 0x7f;
    assert_eq!(output.to_integer(), expected);
}

#[test]
fn instruction_scan_covers_every_part() {
    let mut chain = two_part_chain(QueueConfig::default());
    assert_eq!(chain.total_instr_len(), 7);

    chain.reset().unwrap();
    chain.parts_mut()[0].set_active_instruction("BYPASS");
    chain.parts_mut()[1].set_active_instruction("IDCODE");
    let before = chain.sm.cable.clocks();
    chain.shift_instructions(true, true, ExitMode::Idle).unwrap();
    // 3 to Capture-IR, 1 into Shift-IR, 7 bits, 2 back to Idle
    assert_eq!(chain.sm.cable.clocks() - before, 13);

    assert_eq!(chain.sm.cable.taps()[0].instruction(), 0b1111);
    assert_eq!(chain.sm.cable.taps()[1].instruction(), 0b001);
    let captured: Vec<String> = chain
        .parts()
        .iter()
        .map(|p| p.active_instruction().unwrap().out.to_bitstring())
        .collect();
    assert_eq!(captured, ["0001", "001"]);

    chain.shift_data_registers(true, true, ExitMode::Idle).unwrap();
    let id = &chain.parts()[1].active_data_register().unwrap().output;
    assert_eq!(id.to_integer(), 0x2000_0001);
}

#[test]
fn failed_scan_leaves_chain_untouched() {
    let mut chain = sim_chain(vec![SimTap::new(4), SimTap::new(4)]);
    chain.add_part(bypass_part(4));
    chain.add_part(bypass_part(4));
    chain.reset().unwrap();
    chain.parts_mut()[0].set_active_instruction("BYPASS");
    chain.parts_mut()[1].set_active_instruction("EXTEST");

    let clocks = chain.sm.cable.clocks();
    assert!(matches!(
        chain.shift_instructions(true, true, ExitMode::Idle),
        Err(Error::NoActiveInstruction { part: 1 })
    ));
    assert_eq!(chain.sm.cable.clocks(), clocks);
    assert_eq!(chain.state(), JtagState::Idle);
}

#[test]
fn duplicate_definitions_are_rejected() {
    let mut part = bypass_part(2);
    assert!(matches!(
        part.define_instruction("BYPASS", "01", Some("BR")),
        Err(Error::AlreadyDefined { .. })
    ));
    assert_eq!(part.instructions().len(), 1);
    assert!(matches!(
        part.define_data_register("BR", 4),
        Err(Error::AlreadyDefined { .. })
    ));
    assert_eq!(part.data_register("BR").unwrap().len(), 1);
}

#[test]
fn boundary_bits_are_checked() {
    let mut part = Part::from_description(BitRegister::new(32).unwrap(), SAMPLE_PART).unwrap();
    assert!(matches!(
        part.define_bsbit(3, "PIN_A", "O".parse().unwrap(), false, None),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        part.define_bsbit(0, "PIN_A", "O".parse().unwrap(), false, None),
        Err(Error::AlreadyDefined { .. })
    ));

    let mut bare = bypass_part(2);
    assert!(matches!(
        bare.define_bsbit(0, "PIN_A", "I".parse().unwrap(), false, None),
        Err(Error::NotFound { .. })
    ));
}

#[derive(Debug)]
struct SlowFlash;

impl PartExtension for SlowFlash {
    fn name(&self) -> &str {
        "slow-flash"
    }

    fn wait_ready(&self) -> usize {
        5
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn clocks_for_bypass_shift(extension: bool) -> usize {
    let mut chain = sim_chain(vec![SimTap::new(4)]);
    let mut part = bypass_part(4);
    if extension {
        part.set_extension(Box::new(SlowFlash));
    }
    chain.add_part(part);
    chain.set_active_part(0).unwrap();
    chain.reset_bypass().unwrap();

    let before = chain.sm.cable.clocks();
    chain.shift_data_registers(false, true, ExitMode::Idle).unwrap();
    chain.sm.cable.clocks() - before
}

#[test]
fn extension_adds_idle_clocks() {
    assert_eq!(clocks_for_bypass_shift(true), clocks_for_bypass_shift(false) + 5);
    assert_eq!(clocks_for_bypass_shift(false), 2 + 1 + 1 + 2);
}

#[test]
fn trst_reset_reaches_idle() {
    let mut chain = sim_chain(vec![SimTap::new(4)]);
    chain.add_part(bypass_part(4));
    chain.trst_reset().unwrap();
    assert!(chain.get_trst().unwrap());
    assert_eq!(chain.state(), JtagState::Idle);
    assert_eq!(chain.sm.cable.state(), JtagState::Idle);
}

#[test]
fn bypass_bit_survives_a_flush_before_the_shift() {
    let mut chain = Chain::with_config(
        Box::new(SimCable::new(vec![SimTap::new(4)])),
        QueueConfig { flush_threshold: 1 },
    );
    chain.add_part(bypass_part(4));
    chain.reset_bypass().unwrap();

    for _ in 0..2 {
        chain.shift_data_registers(true, true, ExitMode::Idle).unwrap();
        let br = chain.parts()[0].active_data_register().unwrap();
        assert_eq!(br.output.to_bitstring(), "0");
        assert_eq!(chain.state(), JtagState::Idle);
        assert_eq!(chain.sm.cable.state(), JtagState::Idle);
    }
}

#[test_case(1; "flush on every action")]
#[test_case(3; "flush every few actions")]
#[test_case(4096; "default threshold")]
fn scans_survive_queue_flushes(flush_threshold: usize) {
    let mut chain = two_part_chain(QueueConfig { flush_threshold });
    chain.reset().unwrap();
    chain.parts_mut()[0].set_active_instruction("BYPASS");
    chain.parts_mut()[1].set_active_instruction("IDCODE");

    chain.shift_instructions(true, true, ExitMode::Idle).unwrap();
    let captured: Vec<String> = chain
        .parts()
        .iter()
        .map(|p| p.active_instruction().unwrap().out.to_bitstring())
        .collect();
    assert_eq!(captured, ["0001", "001"]);

    chain.shift_data_registers(true, true, ExitMode::Idle).unwrap();
    let parts = chain.parts();
    assert_eq!(parts[0].active_data_register().unwrap().output.to_bitstring(), "0");
    assert_eq!(parts[1].active_data_register().unwrap().output.to_integer(), 0x2000_0001);
    assert_eq!(chain.sm.cable.state(), JtagState::Idle);
}

#[test_case(ExitMode::Update, JtagState::UpdateIR, JtagState::UpdateDR, true; "update")]
#[test_case(ExitMode::Exit1, JtagState::Exit1IR, JtagState::Exit1DR, false; "exit1")]
#[test_case(ExitMode::Shift, JtagState::ShiftIR, JtagState::ShiftDR, false; "shift")]
fn last_part_exit_mode(
    exit: ExitMode,
    ir_state: JtagState,
    dr_state: JtagState,
    latched: bool,
) {
    let mut chain = two_part_chain(QueueConfig::default());
    chain.reset().unwrap();
    chain.parts_mut()[0].set_active_instruction("BYPASS");
    chain.parts_mut()[1].set_active_instruction("IDCODE");

    chain.shift_instructions(true, true, exit).unwrap();
    assert_eq!(chain.state(), ir_state);
    assert_eq!(chain.sm.cable.state(), ir_state);
    let expected = if latched { 0b1111 } else { 0b0001 };
    assert_eq!(chain.sm.cable.taps()[0].instruction(), expected);

    chain.sm.move_to(JtagState::Idle).unwrap();
    chain.flush().unwrap();
    assert_eq!(chain.sm.cable.taps()[0].instruction(), 0b1111);

    chain.shift_data_registers(true, true, exit).unwrap();
    assert_eq!(chain.state(), dr_state);
    assert_eq!(chain.sm.cable.state(), dr_state);
    let id = &chain.parts()[1].active_data_register().unwrap().output;
    assert_eq!(id.to_integer(), 0x2000_0001);
}

#[test]
fn shift_resumes_from_exit2() {
    let mut sm = idcode_sm(0x1234_5777);
    sm.reset().unwrap();
    sm.capture_dr().unwrap();

    let mut low = BitRegister::new(8).unwrap();
    sm.shift_register(&BitRegister::new(8).unwrap(), Some(&mut low), ExitMode::Exit1)
        .unwrap();
    assert_eq!(low.to_integer(), 0x77);
    assert_eq!(sm.state(), JtagState::Exit1DR);

    sm.move_to(JtagState::Exit2DR).unwrap();
    assert_eq!(sm.state(), JtagState::Exit2DR);

    // one clock back into Shift-DR, then the remaining 24 bits
    let mut high = BitRegister::new(24).unwrap();
    sm.shift_register(&BitRegister::new(24).unwrap(), Some(&mut high), ExitMode::Idle)
        .unwrap();
    assert_eq!(high.to_integer(), 0x12_3457);
    assert_eq!(sm.state(), JtagState::Idle);
    assert_eq!(sm.cable.state(), JtagState::Idle);
}

#[test]
fn single_bit_continues_a_flushed_shift() {
    let mut sm = idcode_sm(0x1234_5777);
    sm.reset().unwrap();
    sm.capture_dr().unwrap();

    let mut low = BitRegister::new(8).unwrap();
    sm.shift_register(&BitRegister::new(8).unwrap(), Some(&mut low), ExitMode::Shift)
        .unwrap();
    assert_eq!(low.to_integer(), 0x77);
    assert_eq!(sm.queued(), 0);

    let mut next = BitRegister::new(1).unwrap();
    sm.shift_register(&BitRegister::new(1).unwrap(), Some(&mut next), ExitMode::Idle)
        .unwrap();
    assert_eq!(next.get(0), Some(true));
    assert_eq!(sm.state(), JtagState::Idle);
    assert_eq!(sm.cable.state(), JtagState::Idle);
}
