//! Implement the `Cable` trait for "jlink" compatible hardware adapters
use crate::cable::{pack_bytes, Cable, CableError, PodSignal};

use std::format;
use std::time::Duration;
use std::vec;
use std::vec::Vec;

use bitvec::prelude::*;
use rusb::{DeviceHandle, Direction, GlobalContext};
use rusb::constants::*;
use tracing::{debug, trace, warn};

const CMD_SET_SPEED: u8 = 0x05;
const CMD_GET_STATE: u8 = 0x07;
const CMD_SELECT_INTERFACE: u8 = 0xc7;
const CMD_HW_JTAG2: u8 = 0xcd;
const CMD_RESET_SRST: u8 = 0xdc;
const CMD_SET_SRST: u8 = 0xdd;
const CMD_RESET_TRST: u8 = 0xde;
const CMD_SET_TRST: u8 = 0xdf;

// A tap sequence must stay under 390 bytes of TMS and as many of TDI
const SEQUENCE_BITS: usize = 384 * 8;
const TIMEOUT: Duration = Duration::from_millis(100);
// Below this the target is probably unpowered or disconnected
const MIN_VREF_MV: u16 = 1500;

/// Call `read` until `len` bytes have arrived.  A read returning nothing means the adapter has
/// stopped answering.
fn read_until<F>(len: usize, mut read: F) -> Result<Vec<u8>, CableError>
    where F: FnMut(&mut [u8]) -> Result<usize, CableError>
{
    let mut remaining = len;
    let mut data = Vec::with_capacity(len);
    while remaining > 0 {
        let mut buffer = vec![0; remaining];
        let n = read(&mut buffer)?;
        if n == 0 {
            return Err(CableError::Protocol(format!(
                "empty read with {remaining} bytes outstanding"
            )));
        }
        buffer.truncate(n);
        data.append(&mut buffer);
        remaining = remaining.saturating_sub(n);
    }
    Ok(data)
}

pub struct JLink {
    device: DeviceHandle<GlobalContext>,
    // queued bytes to send
    buffer: Vec<u8>,
    // number of bytes we'll receive after sending the above
    recv_bytes: usize,
    read_endpoint: u8,
    write_endpoint: u8,
    signals: PodSignal,
}

impl JLink {
    /// Open the first attached J-Link and run TCK at `clock` hertz.
    pub fn new(clock: u32) -> Result<Self, CableError> {
        let device = rusb::open_device_with_vid_pid(0x1366, 0x0105)
            .ok_or_else(|| CableError::Usb("no jlink attached".into()))?;
        let descriptor = device.device().active_config_descriptor()?;
        for i in descriptor.interfaces() {
            for d in i.descriptors() {
                if d.class_code() != LIBUSB_CLASS_VENDOR_SPEC ||
                    d.sub_class_code() != LIBUSB_CLASS_VENDOR_SPEC ||
                        d.num_endpoints() < 2 {
                            continue;
                }

                let mut read_endpoint = None;
                let mut write_endpoint = None;
                for e in d.endpoint_descriptors() {
                    match e.direction() {
                        Direction::In => read_endpoint = Some(e.address()),
                        Direction::Out => write_endpoint = Some(e.address()),
                    }
                }

                let (Some(read_endpoint), Some(write_endpoint)) = (read_endpoint, write_endpoint) else {
                    continue;
                };

                // Drain anything left over from a previous session
                let mut buf = [0; 2];
                let _ = device.read_bulk(read_endpoint, &mut buf, Duration::from_millis(10));

                let mut jlink = Self {
                    device,
                    buffer: vec![],
                    recv_bytes: 0,
                    read_endpoint,
                    write_endpoint,
                    signals: PodSignal::TRST | PodSignal::SRST,
                };

                jlink.get_status()?;
                jlink.set_clock(clock);
                jlink.set_interface(0)?;
                jlink.send_command(CMD_SET_TRST, &[]);
                jlink.send_command(CMD_SET_SRST, &[]);
                debug!(clock, "opened jlink");

                return Ok(jlink);
            }
        }
        Err(CableError::Usb("no jlink interface found".into()))
    }

    fn send_command(&mut self, cmd: u8, data: &[u8]) {
        self.buffer.push(cmd);
        self.buffer.extend_from_slice(data);
    }

    fn read_data(&mut self, len: usize) -> Result<Vec<u8>, CableError> {
        // Submit any pending writes
        let wr = self.device.write_bulk(self.write_endpoint, &self.buffer, TIMEOUT);
        let queued = self.buffer.len();
        self.buffer.clear();
        if wr? != queued {
            self.recv_bytes = 0;
            return Err(CableError::Protocol("short write".into()));
        }

        let recv_bytes = len + self.recv_bytes;
        let (device, endpoint) = (&self.device, self.read_endpoint);
        let data = read_until(recv_bytes, |buf| Ok(device.read_bulk(endpoint, buf, TIMEOUT)?));
        let mut data = match data {
            Ok(data) => data,
            Err(e) => {
                self.recv_bytes = 0;
                return Err(e);
            }
        };

        // Don't return any of the data from the pending write that we didn't care about
        let data = data.split_off(self.recv_bytes);
        self.recv_bytes = 0;
        Ok(data)
    }

    /// Read the adapter state: target voltage followed by the levels of the JTAG lines.
    pub fn get_status(&mut self) -> Result<Vec<u8>, CableError> {
        self.send_command(CMD_GET_STATE, &[]);
        let data = self.read_data(8)?;

        let vref = u16::from_le_bytes([data[0], data[1]]);
        if vref < MIN_VREF_MV {
            warn!(vref, "target voltage too low");
            return Err(CableError::Protocol(format!(
                "vref {vref} mV too low, possibly unpowered or disconnected"
            )));
        }
        Ok(data)
    }

    pub fn set_clock(&mut self, clock: u32) {
        let khz = (clock / 1000).min(u16::MAX as u32) as u16;
        self.send_command(CMD_SET_SPEED, &khz.to_le_bytes());
    }

    pub fn set_interface(&mut self, intf: u8) -> Result<(), CableError> {
        self.send_command(CMD_SELECT_INTERFACE, &[intf]);
        self.read_data(4).map(drop)
    }

    /// Queue one sequence of at most `SEQUENCE_BITS` clocks and return the number of TDO bytes
    /// the adapter answers with.
    fn tap_sequence(&mut self, tms: &BitSlice<u8>, tdi: &BitSlice<u8>) -> usize {
        let tms_bytes = pack_bytes(tms);
        let tdi_bytes = pack_bytes(tdi);
        let mut cmd = Vec::with_capacity(2 + tms_bytes.len() + tdi_bytes.len());
        cmd.extend_from_slice(&(tdi.len() as u16).to_le_bytes());
        cmd.extend_from_slice(&tms_bytes);
        cmd.extend_from_slice(&tdi_bytes);
        self.send_command(CMD_HW_JTAG2, &cmd);
        tdi_bytes.len()
    }

    fn set_line(&mut self, signal: PodSignal, high: bool) {
        let cmd = match (signal, high) {
            (PodSignal::TRST, true) => CMD_SET_TRST,
            (PodSignal::TRST, false) => CMD_RESET_TRST,
            (_, true) => CMD_SET_SRST,
            (_, false) => CMD_RESET_SRST,
        };
        self.send_command(cmd, &[]);
        self.signals.set(signal, high);
    }
}

impl Cable for JLink {
    fn clock(&mut self, tms: bool, tdi: bool, n: usize) -> Result<(), CableError> {
        let mut remaining = n;
        while remaining > 0 {
            let bits = remaining.min(SEQUENCE_BITS);
            let tms_bits = BitVec::<u8, Lsb0>::repeat(tms, bits);
            let tdi_bits = BitVec::<u8, Lsb0>::repeat(tdi, bits);
            // We don't care about the returned bytes, so read them whenever we do the next read
            self.recv_bytes += self.tap_sequence(&tms_bits, &tdi_bits);
            remaining -= bits;
        }
        Ok(())
    }

    fn get_tdo(&mut self) -> Result<bool, CableError> {
        let status = self.get_status()?;
        Ok(status[4] != 0)
    }

    fn clock_capture(&mut self, tms: bool, tdi: bool) -> Result<bool, CableError> {
        let tms_bits = BitVec::<u8, Lsb0>::repeat(tms, 1);
        let tdi_bits = BitVec::<u8, Lsb0>::repeat(tdi, 1);
        let bytes = self.tap_sequence(&tms_bits, &tdi_bits);
        let data = self.read_data(bytes)?;
        Ok(data[0] & 1 != 0)
    }

    fn transfer(
        &mut self,
        input: &BitSlice<u8>,
        mut output: Option<&mut BitSlice<u8>>,
    ) -> Result<(), CableError> {
        trace!(bits = input.len(), capture = output.is_some(), "jlink transfer");
        for (n, chunk) in input.chunks(SEQUENCE_BITS).enumerate() {
            let tms = BitVec::<u8, Lsb0>::repeat(false, chunk.len());
            let bytes = self.tap_sequence(&tms, chunk);
            let Some(out) = output.as_deref_mut() else {
                self.recv_bytes += bytes;
                continue;
            };
            let data = self.read_data(bytes)?;
            let start = n * SEQUENCE_BITS;
            out[start..start + chunk.len()]
                .copy_from_bitslice(&data.view_bits::<Lsb0>()[..chunk.len()]);
        }
        Ok(())
    }

    fn set_signal(&mut self, mask: PodSignal, value: PodSignal) -> Result<PodSignal, CableError> {
        if mask.intersects(PodSignal::TCK | PodSignal::TDI | PodSignal::TMS | PodSignal::TDO) {
            return Err(CableError::Unsupported("jlink only drives TRST and SRST directly"));
        }
        let old = self.signals;
        for signal in [PodSignal::TRST, PodSignal::SRST] {
            if mask.contains(signal) {
                self.set_line(signal, value.contains(signal));
            }
        }
        Ok(old)
    }

    fn get_signal(&mut self, signal: PodSignal) -> Result<bool, CableError> {
        if signal == PodSignal::TDO {
            return self.get_tdo();
        }
        Ok(self.signals.contains(signal))
    }

    fn flush(&mut self) -> Result<(), CableError> {
        self.read_data(0).map(drop)
    }
}
