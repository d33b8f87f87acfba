//! One chip on the scan chain: its instruction set, data registers and boundary scan pins.
//!
//! Every definition method checks all of its arguments before it touches the part, so a failed
//! call leaves the part exactly as it was.
use alloc::boxed::Box;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::any::Any;
use core::fmt;

use tracing::debug;

use crate::error::{Error, Result};
use crate::register::BitRegister;
use crate::signal::{BsBit, BsBitKind, BsControl, ControlState, Signal, SignalAlias};

/// Name of the boundary scan register.
pub const BSR: &str = "BSR";
/// Name of the device identification register, seeded from the part ID.
pub const DIR: &str = "DIR";

/// Chip specific behaviour attached to a part, e.g. by a programming or debug module.
pub trait PartExtension: fmt::Debug {
    fn name(&self) -> &str;

    /// Extra Run-Test/Idle clocks the part needs after a shift that ends in Run-Test/Idle.
    fn wait_ready(&self) -> usize {
        0
    }

    fn as_any(&self) -> &dyn Any;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instruction {
    name: String,
    value: BitRegister,
    /// Bits captured from the instruction register by the last shift.
    pub out: BitRegister,
    data_register: Option<usize>,
}

impl Instruction {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The opcode.
    pub fn value(&self) -> &BitRegister {
        &self.value
    }

    /// Index of the data register the instruction selects.
    pub fn data_register(&self) -> Option<usize> {
        self.data_register
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataRegister {
    name: String,
    /// Bits shifted in by the next shift.
    pub input: BitRegister,
    /// Bits captured by the last shift.
    pub output: BitRegister,
}

impl DataRegister {
    fn new(name: &str, len: usize) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            input: BitRegister::new(len)?,
            output: BitRegister::new(len)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.input.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input.is_empty()
    }
}

#[derive(Debug)]
pub struct Part {
    pub manufacturer: String,
    pub part: String,
    pub stepping: String,
    id: BitRegister,
    instruction_length: usize,
    instructions: Vec<Instruction>,
    active_instruction: Option<usize>,
    data_registers: Vec<DataRegister>,
    signals: Vec<Signal>,
    aliases: Vec<SignalAlias>,
    bsbits: Vec<Option<BsBit>>,
    extension: Option<Box<dyn PartExtension>>,
}

impl Part {
    /// A part without instructions or registers.  `id` is the value read from its IDCODE
    /// register.
    pub fn new(id: BitRegister) -> Self {
        Self {
            manufacturer: String::new(),
            part: String::new(),
            stepping: String::new(),
            id,
            instruction_length: 0,
            instructions: Vec::new(),
            active_instruction: None,
            data_registers: Vec::new(),
            signals: Vec::new(),
            aliases: Vec::new(),
            bsbits: Vec::new(),
            extension: None,
        }
    }

    /// A part with a 32 bit IDCODE.
    pub fn with_idcode(idcode: u32) -> Result<Self> {
        Ok(Self::new(BitRegister::from_integer(32, idcode.into())?))
    }

    pub fn id(&self) -> &BitRegister {
        &self.id
    }

    pub fn instruction_length(&self) -> usize {
        self.instruction_length
    }

    /// Set the instruction register length.  It can not change once instructions are defined.
    pub fn set_instruction_length(&mut self, len: usize) -> Result<()> {
        if len < 1 {
            return Err(Error::InvalidArgument(format!(
                "instruction length must be at least 1, got {len}"
            )));
        }
        if !self.instructions.is_empty() && len != self.instruction_length {
            return Err(Error::IllegalState(format!(
                "instruction length is already {}",
                self.instruction_length
            )));
        }
        self.instruction_length = len;
        Ok(())
    }

    // Instructions

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn find_instruction(&self, name: &str) -> Option<usize> {
        self.instructions
            .iter()
            .position(|i| i.name.eq_ignore_ascii_case(name))
    }

    pub fn instruction(&self, name: &str) -> Option<&Instruction> {
        self.find_instruction(name).map(|i| &self.instructions[i])
    }

    /// Define an instruction with opcode `code`, written most significant bit first.  The
    /// instruction selects `register` when it is given; otherwise it can be bound later with
    /// `bind_instruction_register`.
    pub fn define_instruction(
        &mut self,
        name: &str,
        code: &str,
        register: Option<&str>,
    ) -> Result<usize> {
        if self.instruction_length == 0 {
            return Err(Error::IllegalState(format!(
                "instruction length not set before defining '{name}'"
            )));
        }
        if code.len() != self.instruction_length {
            return Err(Error::InvalidArgument(format!(
                "opcode '{code}' for '{name}' is not {} bits long",
                self.instruction_length
            )));
        }
        if self.find_instruction(name).is_some() {
            return Err(Error::already_defined("instruction", name));
        }
        let data_register = match register {
            Some(r) => Some(
                self.find_data_register(r)
                    .ok_or_else(|| Error::not_found("data register", r))?,
            ),
            None => None,
        };
        let value = BitRegister::from_bitstring(code)?;
        let out = BitRegister::new(self.instruction_length)?;

        debug!(name, code, ?register, "define instruction");
        self.instructions.push(Instruction {
            name: name.into(),
            value,
            out,
            data_register,
        });
        Ok(self.instructions.len() - 1)
    }

    /// Select the instruction called `name` for the next instruction shift.  An unknown name
    /// clears the selection, which later shifts report as `NoActiveInstruction`.
    pub fn set_active_instruction(&mut self, name: &str) -> Option<usize> {
        self.active_instruction = self.find_instruction(name);
        if self.active_instruction.is_none() {
            debug!(name, part = %self.part, "unknown instruction, selection cleared");
        }
        self.active_instruction
    }

    pub fn active_instruction(&self) -> Option<&Instruction> {
        self.active_instruction.map(|i| &self.instructions[i])
    }

    /// The data register the active instruction selects.
    pub fn active_data_register(&self) -> Option<&DataRegister> {
        self.active_instruction()
            .and_then(|i| i.data_register)
            .map(|d| &self.data_registers[d])
    }

    pub fn active_data_register_mut(&mut self) -> Option<&mut DataRegister> {
        let d = self.active_instruction().and_then(|i| i.data_register)?;
        Some(&mut self.data_registers[d])
    }

    /// Opcode and capture register of the active instruction.
    pub(crate) fn instruction_registers(
        &mut self,
        part: usize,
    ) -> Result<(&BitRegister, &mut BitRegister)> {
        let i = self
            .active_instruction
            .ok_or(Error::NoActiveInstruction { part })?;
        let ins = &mut self.instructions[i];
        Ok((&ins.value, &mut ins.out))
    }

    /// Input and output of the data register selected by the active instruction.
    pub(crate) fn data_registers_of_active(
        &mut self,
        part: usize,
    ) -> Result<(&BitRegister, &mut BitRegister)> {
        let i = self
            .active_instruction
            .ok_or(Error::NoActiveInstruction { part })?;
        let d = self.instructions[i]
            .data_register
            .ok_or_else(|| Error::NoDataRegister {
                part,
                instruction: self.instructions[i].name.clone(),
            })?;
        let dr = &mut self.data_registers[d];
        Ok((&dr.input, &mut dr.output))
    }

    // Data registers

    pub fn data_registers(&self) -> &[DataRegister] {
        &self.data_registers
    }

    pub fn find_data_register(&self, name: &str) -> Option<usize> {
        self.data_registers
            .iter()
            .position(|d| d.name.eq_ignore_ascii_case(name))
    }

    pub fn data_register(&self, name: &str) -> Option<&DataRegister> {
        self.find_data_register(name).map(|d| &self.data_registers[d])
    }

    pub fn data_register_mut(&mut self, name: &str) -> Option<&mut DataRegister> {
        self.find_data_register(name)
            .map(|d| &mut self.data_registers[d])
    }

    /// Define a `len` bit data register.  `BSR` also gets one boundary scan cell slot per bit,
    /// `DIR` captures the part ID.
    pub fn define_data_register(&mut self, name: &str, len: usize) -> Result<usize> {
        if self.find_data_register(name).is_some() {
            return Err(Error::already_defined("data register", name));
        }
        let mut dr = DataRegister::new(name, len)?;

        if name.eq_ignore_ascii_case(BSR) {
            let mut bsbits = Vec::new();
            bsbits
                .try_reserve_exact(len)
                .map_err(|_| Error::OutOfMemory)?;
            bsbits.resize(len, None);
            self.bsbits = bsbits;
        } else if name.eq_ignore_ascii_case(DIR) {
            dr.output.assign_truncated(self.id.as_bitslice());
        }

        debug!(name, len, "define data register");
        self.data_registers.push(dr);
        Ok(self.data_registers.len() - 1)
    }

    /// Change the length of a data register.  The boundary scan register can not be resized.
    pub fn resize_data_register(&mut self, name: &str, len: usize) -> Result<()> {
        let d = self
            .find_data_register(name)
            .ok_or_else(|| Error::not_found("data register", name))?;
        if name.eq_ignore_ascii_case(BSR) {
            return Err(Error::InvalidArgument("BSR can not be resized".into()));
        }
        if len < 1 {
            return Err(Error::InvalidArgument(format!(
                "register length must be at least 1, got {len}"
            )));
        }
        let dr = &mut self.data_registers[d];
        dr.input.resize(len)?;
        dr.output.resize(len)?;
        Ok(())
    }

    /// Point `instruction` at the data register `register`, creating the register with `len`
    /// bits or resizing it to `len` bits.
    pub fn bind_instruction_register(
        &mut self,
        instruction: &str,
        register: &str,
        len: usize,
    ) -> Result<()> {
        let i = self
            .find_instruction(instruction)
            .ok_or_else(|| Error::not_found("instruction", instruction))?;
        let d = match self.find_data_register(register) {
            Some(d) => {
                if self.data_registers[d].len() != len {
                    self.resize_data_register(register, len)?;
                }
                d
            }
            None => self.define_data_register(register, len)?,
        };
        self.instructions[i].data_register = Some(d);
        Ok(())
    }

    // Signals

    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    pub fn aliases(&self) -> &[SignalAlias] {
        &self.aliases
    }

    /// Look a signal up by name or alias, ignoring case.
    pub fn find_signal(&self, name: &str) -> Option<usize> {
        self.signals
            .iter()
            .position(|s| s.name.eq_ignore_ascii_case(name))
            .or_else(|| {
                self.aliases
                    .iter()
                    .find(|a| a.name.eq_ignore_ascii_case(name))
                    .map(|a| a.signal)
            })
    }

    pub fn signal(&self, name: &str) -> Option<&Signal> {
        self.find_signal(name).map(|s| &self.signals[s])
    }

    pub fn define_signal(&mut self, name: &str, pin: Option<&str>) -> Result<usize> {
        if self.find_signal(name).is_some() {
            return Err(Error::already_defined("signal", name));
        }
        debug!(name, ?pin, "define signal");
        self.signals.push(Signal::new(name, pin));
        Ok(self.signals.len() - 1)
    }

    pub fn define_alias(&mut self, alias: &str, signal: &str) -> Result<()> {
        if self.find_signal(alias).is_some() {
            return Err(Error::already_defined("signal", alias));
        }
        let s = self
            .find_signal(signal)
            .ok_or_else(|| Error::not_found("signal", signal))?;
        self.aliases.push(SignalAlias {
            name: alias.into(),
            signal: s,
        });
        Ok(())
    }

    // Boundary scan

    pub fn boundary_length(&self) -> usize {
        self.bsbits.len()
    }

    pub fn bsbit(&self, bit: usize) -> Option<&BsBit> {
        self.bsbits.get(bit).and_then(Option::as_ref)
    }

    /// Declare boundary scan cell `bit`.  The cell belongs to the signal called `name` if there
    /// is one, and is preloaded with `safe`.
    pub fn define_bsbit(
        &mut self,
        bit: usize,
        name: &str,
        kind: BsBitKind,
        safe: bool,
        control: Option<(usize, bool, ControlState)>,
    ) -> Result<()> {
        let bsr = self
            .find_data_register(BSR)
            .ok_or_else(|| Error::not_found("data register", BSR))?;
        let len = self.bsbits.len();
        if bit >= len {
            return Err(Error::InvalidArgument(format!(
                "bit {bit} out of range, BSR has {len} bits"
            )));
        }
        if self.bsbits[bit].is_some() {
            return Err(Error::already_defined("bit", &format!("{bit}")));
        }
        let control = match control {
            Some((c, _, _)) if c >= len => {
                return Err(Error::InvalidArgument(format!(
                    "control bit {c} out of range, BSR has {len} bits"
                )))
            }
            Some((bit, value, state)) => Some(BsControl { bit, value, state }),
            None => None,
        };

        self.data_registers[bsr].input.set(bit, safe)?;
        let signal = self.find_signal(name);
        if let Some(s) = signal {
            let s = &mut self.signals[s];
            if kind.is_input() {
                s.input = Some(bit);
            }
            if kind.is_output() {
                s.output = Some(bit);
            }
        }
        self.bsbits[bit] = Some(BsBit {
            bit,
            name: name.into(),
            kind,
            safe,
            signal,
            control,
        });
        Ok(())
    }

    /// Load the boundary scan register so that the next data shift drives `signal` to `value`
    /// (`output` set) or releases it for sampling (`output` clear).
    pub fn set_signal(&mut self, signal: &str, output: bool, value: bool) -> Result<()> {
        let bsr = self
            .find_data_register(BSR)
            .ok_or_else(|| Error::not_found("data register", BSR))?;
        let s = &self.signals[self
            .find_signal(signal)
            .ok_or_else(|| Error::not_found("signal", signal))?];

        let out_control = s
            .output
            .and_then(|b| self.bsbits[b].as_ref())
            .and_then(|b| b.control);
        let input = &mut self.data_registers[bsr].input;
        if output {
            let bit = s.output.ok_or_else(|| {
                Error::InvalidArgument(format!("signal '{}' can not be set as output", s.name))
            })?;
            input.set(bit, value)?;
            if let Some(c) = out_control {
                input.set(c.bit, !c.value)?;
            }
        } else {
            if s.input.is_none() {
                return Err(Error::InvalidArgument(format!(
                    "signal '{}' can not be set as input",
                    s.name
                )));
            }
            if let Some(c) = out_control {
                input.set(c.bit, c.value)?;
            }
        }
        Ok(())
    }

    /// The level of `signal` captured by the last boundary scan shift.
    pub fn get_signal(&self, signal: &str) -> Result<bool> {
        let bsr = self
            .data_register(BSR)
            .ok_or_else(|| Error::not_found("data register", BSR))?;
        let s = self
            .signal(signal)
            .ok_or_else(|| Error::not_found("signal", signal))?;
        let bit = s.input.ok_or_else(|| {
            Error::InvalidArgument(format!("signal '{}' is not an input", s.name))
        })?;
        bsr.output.get(bit).ok_or(Error::OutOfBounds {
            what: "BSR bit",
            len: bsr.len(),
            needed: bit + 1,
        })
    }

    // Extension

    pub fn set_extension(&mut self, extension: Box<dyn PartExtension>) {
        debug!(name = extension.name(), "attach part extension");
        self.extension = Some(extension);
    }

    pub fn extension(&self) -> Option<&dyn PartExtension> {
        self.extension.as_deref()
    }

    pub fn take_extension(&mut self) -> Option<Box<dyn PartExtension>> {
        self.extension.take()
    }

    /// Extra idle clocks requested by the extension.
    pub fn wait_ready(&self) -> usize {
        self.extension.as_ref().map_or(0, |e| e.wait_ready())
    }
}

impl fmt::Display for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let instruction = self.active_instruction().map_or("(none)", |i| i.name());
        let register = self.active_data_register().map_or("(none)", |d| d.name());
        write!(
            f,
            "{:<25} {:<20} {:<8} {:<20} {}",
            self.manufacturer, self.part, self.stepping, instruction, register
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    fn scenario() -> Part {
        let mut p = Part::with_idcode(0x0100_0001).unwrap();
        p.set_instruction_length(2).unwrap();
        p.define_data_register("BR", 1).unwrap();
        p.define_data_register("BSR", 3).unwrap();
        p.define_instruction("BYPASS", "11", Some("BR")).unwrap();
        p.define_instruction("SAMPLE", "10", Some("BSR")).unwrap();
        p.define_signal("PIN_A", None).unwrap();
        p.define_signal("PIN_B", None).unwrap();
        p.define_signal("PIN_C", None).unwrap();
        p.define_bsbit(0, "PIN_A", BsBitKind::Output, false, None).unwrap();
        p.define_bsbit(1, "PIN_B", BsBitKind::Input, false, None).unwrap();
        p.define_bsbit(2, "PIN_C", BsBitKind::Control, true, Some((0, false, ControlState::Z)))
            .unwrap();
        p
    }

    #[test]
    fn instruction_definition() {
        let mut p = scenario();
        assert_eq!(p.instructions().len(), 2);
        assert_eq!(p.instruction("sample").unwrap().value().to_bitstring(), "10");
        assert!(matches!(
            p.define_instruction("SAMPLE", "01", Some("BSR")),
            Err(Error::AlreadyDefined { .. })
        ));
        assert!(matches!(
            p.define_instruction("EXTEST", "000", Some("BSR")),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            p.define_instruction("EXTEST", "00", Some("NOPE")),
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            p.define_instruction("EXTEST", "0x", None),
            Err(Error::Syntax(_))
        ));
        assert_eq!(p.instructions().len(), 2);
        assert!(matches!(p.set_instruction_length(3), Err(Error::IllegalState(_))));
    }

    #[test]
    fn active_instruction_lookup() {
        let mut p = scenario();
        assert!(p.active_instruction().is_none());
        assert_eq!(p.set_active_instruction("bypass"), Some(0));
        assert_eq!(p.active_data_register().unwrap().name(), "BR");
        assert_eq!(p.set_active_instruction("IDCODE"), None);
        assert!(p.active_instruction().is_none());
        assert!(matches!(
            p.instruction_registers(3),
            Err(Error::NoActiveInstruction { part: 3 })
        ));
    }

    #[test]
    fn unbound_instruction_has_no_data_register() {
        let mut p = scenario();
        p.define_instruction("USER1", "01", None).unwrap();
        p.set_active_instruction("USER1");
        assert!(matches!(
            p.data_registers_of_active(0),
            Err(Error::NoDataRegister { part: 0, .. })
        ));
        p.bind_instruction_register("USER1", "USER", 7).unwrap();
        let (input, _) = p.data_registers_of_active(0).unwrap();
        assert_eq!(input.len(), 7);
        p.bind_instruction_register("USER1", "USER", 9).unwrap();
        assert_eq!(p.data_register("user").unwrap().len(), 9);
        assert!(matches!(
            p.resize_data_register("BSR", 4),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn dir_is_seeded_from_id() {
        let mut p = Part::with_idcode(0x1234_5678).unwrap();
        p.define_data_register("DIR", 32).unwrap();
        assert_eq!(p.data_register("DIR").unwrap().output.to_integer(), 0x1234_5678);
        assert!(matches!(
            p.define_data_register("dir", 32),
            Err(Error::AlreadyDefined { .. })
        ));
        assert!(matches!(
            p.define_data_register("EMPTY", 0),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn bsbits_preload_safe_values() {
        let p = scenario();
        assert_eq!(p.boundary_length(), 3);
        assert_eq!(p.data_register("BSR").unwrap().input.to_bitstring(), "100");
        let a = p.signal("PIN_A").unwrap();
        assert_eq!((a.input, a.output), (None, Some(0)));
        assert_eq!(p.signal("pin_b").unwrap().input, Some(1));
        assert_eq!(p.bsbit(2).unwrap().signal, Some(2));
    }

    #[test]
    fn bsbit_errors() {
        let mut p = scenario();
        assert!(matches!(
            p.define_bsbit(3, "X", BsBitKind::Internal, false, None),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            p.define_bsbit(1, "X", BsBitKind::Internal, false, None),
            Err(Error::AlreadyDefined { .. })
        ));

        let mut q = Part::with_idcode(1).unwrap();
        assert!(matches!(
            q.define_bsbit(0, "X", BsBitKind::Internal, false, None),
            Err(Error::NotFound { .. })
        ));
        q.define_data_register("BSR", 2).unwrap();
        assert!(matches!(
            q.define_bsbit(0, "X", BsBitKind::Output, false, Some((2, false, ControlState::Z))),
            Err(Error::InvalidArgument(_))
        ));
        assert!(q.bsbit(0).is_none());
    }

    #[test]
    fn signals_drive_the_bsr() {
        let mut p = scenario();
        // a bidirectional pin with a control cell
        let mut q = Part::with_idcode(1).unwrap();
        q.define_data_register("BSR", 3).unwrap();
        q.define_signal("D0", Some("A7")).unwrap();
        q.define_bsbit(2, "D0", BsBitKind::Bidir, false, Some((0, true, ControlState::Z)))
            .unwrap();
        q.define_bsbit(0, "*", BsBitKind::Control, true, None).unwrap();
        q.set_signal("D0", true, true).unwrap();
        assert_eq!(q.data_register("BSR").unwrap().input.to_bitstring(), "100");
        q.set_signal("d0", false, false).unwrap();
        assert_eq!(q.data_register("BSR").unwrap().input.to_bitstring(), "101");

        p.set_signal("PIN_A", true, true).unwrap();
        assert_eq!(p.data_register("BSR").unwrap().input.to_bitstring(), "101");
        assert!(matches!(
            p.set_signal("PIN_A", false, false),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            p.set_signal("PIN_B", true, false),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(p.set_signal("PIN_Z", true, false), Err(Error::NotFound { .. })));
    }

    #[test]
    fn get_signal_reads_bsr_output() {
        let mut p = scenario();
        assert!(!p.get_signal("PIN_B").unwrap());
        p.data_register_mut("BSR").unwrap().output.set(1, true).unwrap();
        assert!(p.get_signal("PIN_B").unwrap());
        assert!(matches!(p.get_signal("PIN_A"), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn aliases() {
        let mut p = scenario();
        p.define_alias("nRESET", "PIN_B").unwrap();
        assert_eq!(p.find_signal("nreset"), Some(1));
        assert!(matches!(
            p.define_alias("PIN_A", "PIN_B"),
            Err(Error::AlreadyDefined { .. })
        ));
        assert!(matches!(
            p.define_alias("OTHER", "MISSING"),
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            p.define_signal("NRESET", None),
            Err(Error::AlreadyDefined { .. })
        ));
    }

    #[derive(Debug)]
    struct Core {
        cycles: usize,
    }

    impl PartExtension for Core {
        fn name(&self) -> &str {
            "core"
        }

        fn wait_ready(&self) -> usize {
            self.cycles
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn extension_hook() {
        let mut p = scenario();
        assert_eq!(p.wait_ready(), 0);
        p.set_extension(Box::new(Core { cycles: 12 }));
        assert_eq!(p.wait_ready(), 12);
        let core = p.extension().unwrap().as_any().downcast_ref::<Core>().unwrap();
        assert_eq!(core.cycles, 12);
        assert!(p.take_extension().is_some());
        assert_eq!(p.wait_ready(), 0);
    }

    #[test]
    fn display() {
        let mut p = scenario();
        p.manufacturer = "Acme".to_string();
        p.part = "Widget".to_string();
        p.stepping = "1".to_string();
        p.set_active_instruction("SAMPLE");
        let line = p.to_string();
        assert!(line.starts_with("Acme "));
        assert!(line.ends_with(&format!("{:<20} BSR", "SAMPLE")));
    }
}
