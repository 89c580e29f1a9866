//! Implement the `Cable` trait for "jlink" compatible hardware adapters
use crate::cable::Cable;
use crate::error::TransportError;

use alloc::vec;
use alloc::vec::Vec;
use std::time::Duration;

use rusb::{DeviceHandle, Direction, GlobalContext};
use rusb::constants::*;

const CMD_SET_SPEED: u8 = 0x05;
const CMD_GET_STATE: u8 = 0x07;
const CMD_SELECT_IF: u8 = 0xc7;
const CMD_HW_JTAG2: u8 = 0xcd;
const CMD_HW_RESET1: u8 = 0xdd;
const CMD_HW_TRST1: u8 = 0xdf;

// Largest TMS/TDI pair a single JTAG2 command carries
const MAX_SEQUENCE_BYTES: usize = 390;

/// Commands waiting for the next bulk write
#[derive(Debug, Default)]
struct CommandQueue {
    commands: Vec<u8>,
    // reply bytes the queued commands produce that nobody reads
    discard: usize,
}

impl CommandQueue {
    fn push(&mut self, cmd: u8, data: &[u8]) {
        self.commands.push(cmd);
        self.commands.extend_from_slice(data);
    }

    /// Everything queued so far, leaving the queue empty
    fn take(&mut self) -> (Vec<u8>, usize) {
        (core::mem::take(&mut self.commands), core::mem::take(&mut self.discard))
    }
}

pub struct JLink {
    device: DeviceHandle<GlobalContext>,
    queue: CommandQueue,
    read_endpoint: u8,
    write_endpoint: u8,
}

impl JLink {
    /// Open the first J-Link on the bus.  `clock` is the TCK frequency in hertz.
    pub fn new(clock: u32) -> Result<Self, TransportError> {
        let device = rusb::open_device_with_vid_pid(0x1366, 0x0105)
            .ok_or(TransportError::Adapter("no jlink attached"))?;
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
                    queue: CommandQueue::default(),
                    read_endpoint,
                    write_endpoint,
                };

                jlink.get_status()?;
                jlink.set_clock(clock);
                jlink.set_interface(0)?;
                jlink.deassert_trst();
                jlink.deassert_srst();
                log::debug!("jlink ready, endpoints in {:#x} out {:#x}", read_endpoint, write_endpoint);

                return Ok(jlink);
            }
        }
        Err(TransportError::Adapter("no jlink attached"))
    }

    fn send_command(&mut self, cmd: u8, data: Vec<u8>) {
        self.queue.push(cmd, &data);
    }

    fn read_data(&mut self, len: usize) -> Result<Vec<u8>, TransportError> {
        // Submit any pending writes.  The queue is drained first so nothing is sent twice after an
        // error.
        let (commands, discard) = self.queue.take();
        let wr = self.device.write_bulk(self.write_endpoint, &commands, Duration::from_millis(100))?;
        if wr != commands.len() {
            return Err(TransportError::Adapter("short write to jlink"));
        }

        let mut recv_bytes = len + discard;
        let mut data = vec![];

        while recv_bytes > 0 {
            let mut buffer = vec![0; recv_bytes];
            let len = self.device.read_bulk(self.read_endpoint, &mut buffer, Duration::from_millis(100))?;
            if len == 0 {
                return Err(TransportError::ShortRead { expected: recv_bytes, got: 0 });
            }
            buffer.resize(len, 0);
            data.append(&mut buffer);
            recv_bytes -= len;
        }

        // Don't return any of the data from the pending write that we didn't care about
        Ok(data.split_off(discard))
    }

    pub fn get_status(&mut self) -> Result<Vec<u8>, TransportError> {
        self.send_command(CMD_GET_STATE, vec![]);
        let data = self.read_data(8)?;

        // Target voltage in millivolts, little endian
        let vref = u16::from_le_bytes([data[0], data[1]]);
        if vref < 1500 {
            return Err(TransportError::Adapter("vref too low, possibly unpowered or disconnected"));
        }
        Ok(data)
    }

    pub fn set_clock(&mut self, mut clock: u32) {
        clock /= 1000;
        let buf = vec![(clock & 0xff) as u8, ((clock >> 8) & 0xff) as u8];
        self.send_command(CMD_SET_SPEED, buf);
    }

    pub fn set_interface(&mut self, intf: u8) -> Result<(), TransportError> {
        let buf = vec![intf];
        self.send_command(CMD_SELECT_IF, buf);
        self.read_data(4)?;
        Ok(())
    }

    fn deassert_srst(&mut self) {
        self.send_command(CMD_HW_RESET1, vec![]);
    }

    fn deassert_trst(&mut self) {
        self.send_command(CMD_HW_TRST1, vec![]);
    }

    fn tap_sequence(&mut self, mut tms: Vec<u8>, mut tdi: Vec<u8>, bits: usize) -> Result<(), TransportError> {
        if tms.len() != tdi.len() || tms.len() >= MAX_SEQUENCE_BYTES {
            return Err(TransportError::InvalidScan("jlink sequence too long"));
        }
        let mut cmdbuf = vec![(bits & 0xff) as u8, ((bits >> 8) & 0xff) as u8];
        cmdbuf.append(&mut tms);
        cmdbuf.append(&mut tdi);

        self.send_command(CMD_HW_JTAG2, cmdbuf);
        Ok(())
    }

    /// Queue a data sequence, returning the number of TDO bytes it will produce
    fn send_tdi(&mut self, data: &[u8], bits: u8, pause_after: bool) -> Result<usize, TransportError> {
        if data.is_empty() {
            return Err(TransportError::InvalidScan("empty scan"));
        }
        let bits = bits.clamp(1, 8);
        let mut total_bits = (data.len()-1) * 8 + (bits as usize);

        let mut tms = vec![0; data.len()];
        let mut data = data.to_vec();

        if pause_after {
            let len = tms.len();
            tms[len-1] |= 1 << (bits-1);

            // Add an extra clock for the transition to pause state
            if total_bits % 8 == 0 {
                data.push(0);
                tms.push(0);
            }
            total_bits += 1;
        }

        let bytes = data.len();
        self.tap_sequence(tms, data, total_bits)?;
        Ok(bytes)
    }
}

impl Cable for JLink {
    fn change_mode(&mut self, tms: &[usize], tdi: bool) -> Result<(), TransportError> {
        let mut buf = vec![];
        let mut byte = 0u8;
        for (i, x) in tms.iter().enumerate() {
            if *x != 0 {
                byte |= 1 << (i % 8);
            }
            if i % 8 == 7 {
                buf.push(byte);
                byte = 0;
            }
        }

        // Push the last byte for cases when we don't have a multiple of 8
        // transitions.
        if tms.len() % 8 != 0 {
            buf.push(byte);
        }

        let tdi_bytes = if tdi {
            vec![0xff; buf.len()]
        } else {
            vec![0; buf.len()]
        };

        let bytes = tdi_bytes.len();
        self.tap_sequence(buf, tdi_bytes, tms.len())?;
        // We don't care about the returned bytes, so read them whenever we do the next read
        self.queue.discard += bytes;
        Ok(())
    }

    fn read_data(&mut self, bits: usize) -> Result<Vec<u8>, TransportError> {
        let (bytes, last) = super::split_bits(bits);
        let buf = vec![0; bytes.max(1)];
        self.read_write_data(&buf, last, false)
    }

    fn write_data(&mut self, data: &[u8], bits: u8, pause_after: bool) -> Result<(), TransportError> {
        let bytes = self.send_tdi(data, bits, pause_after)?;
        // We don't care about the returned bytes, so read them whenever we do the next read
        self.queue.discard += bytes;
        Ok(())
    }

    fn read_write_data(&mut self, data: &[u8], bits: u8, pause_after: bool) -> Result<Vec<u8>, TransportError> {
        let bytes = self.send_tdi(data, bits, pause_after)?;
        let mut reply = JLink::read_data(self, bytes)?;
        // Drop the byte the pause clock may have added
        reply.truncate(data.len());
        if reply.len() < data.len() {
            return Err(TransportError::ShortRead { expected: data.len(), got: reply.len() });
        }
        let bits = bits.clamp(1, 8);
        if bits < 8 {
            let last = reply.len() - 1;
            reply[last] &= (1 << bits) - 1;
        }
        Ok(reply)
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        JLink::read_data(self, 0)?;
        Ok(())
    }
}
