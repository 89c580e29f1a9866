//! Implement the `Cable` trait for FTDI MPSSE adapters, and "jtagkey" compatible hardware like
//! the Bus Blaster on top of it
use crate::cable::Cable;
use crate::error::TransportError;

use alloc::format;
use alloc::vec;
use alloc::vec::Vec;
use std::time::Duration;

use libftd2xx::{Ft2232h, Ftdi, FtdiCommon, FtdiMpsse, MpsseCmdBuilder, MpsseCmdExecutor};
use ftdi_mpsse::{ClockTMS, ClockTMSOut};
use libftd2xx::{ClockBits, ClockBitsOut, ClockData, ClockDataOut};

// The MPSSE command buffer on the FT2232H
const MAX_COMMAND_BYTES: usize = 4096;

fn ftdi_error<E: core::fmt::Debug>(err: E) -> TransportError {
    TransportError::Ftdi(format!("{:?}", err))
}

pub struct Mpsse<T> {
    ft: T,
    // Commands that don't need a response, sent on the next transfer or flush
    buffer: Vec<u8>,
}

impl<T: FtdiMpsse + MpsseCmdExecutor> Mpsse<T>
    where <T as MpsseCmdExecutor>::Error: core::fmt::Debug
{
    pub fn new(mut ft: T, clock: u32) -> Result<Self, TransportError>
    {
        ft.initialize_mpsse_default().map_err(ftdi_error)?;
        ft.set_clock(clock).map_err(ftdi_error)?;

        let builder = MpsseCmdBuilder::new()
            .disable_3phase_data_clocking()
            .disable_adaptive_data_clocking();
        ft.send(builder.as_slice()).map_err(ftdi_error)?;

        Ok(Self {
            ft,
            buffer: vec![],
        })
    }
}

impl<T: MpsseCmdExecutor> Mpsse<T>
    where <T as MpsseCmdExecutor>::Error: core::fmt::Debug
{
    fn queue(&mut self, builder: MpsseCmdBuilder) -> Result<(), TransportError> {
        if builder.as_slice().len() + self.buffer.len() > MAX_COMMAND_BYTES {
            self.flush()?;
        }
        self.buffer.extend_from_slice(builder.as_slice());
        Ok(())
    }

    /// Send the buffered commands followed by `builder`, and read back `len` bytes
    fn transfer(&mut self, builder: MpsseCmdBuilder, len: usize) -> Result<Vec<u8>, TransportError> {
        self.queue(builder)?;
        // Taken up front so a failed transfer is not sent again
        let commands = core::mem::take(&mut self.buffer);
        let mut buf = vec![0; len];
        self.ft.xfer(&commands, &mut buf).map_err(ftdi_error)?;
        Ok(buf)
    }
}

impl<T: MpsseCmdExecutor> Cable for Mpsse<T>
    where <T as MpsseCmdExecutor>::Error: core::fmt::Debug
{
    fn change_mode(&mut self, tms: &[usize], tdi: bool) -> Result<(), TransportError> {
        let mut count = 0;
        let mut buf = 0;
        let mut builder = MpsseCmdBuilder::new();

        for x in tms {
            if *x != 0 {
                buf |= 1 << count;
            }
            count += 1;

            if count == 7 {
                builder = builder.clock_tms_out(ClockTMSOut::NegEdge, buf, tdi, count);
                count = 0;
                buf = 0;
            }
        }
        if count > 0 {
            builder = builder.clock_tms_out(ClockTMSOut::NegEdge, buf, tdi, count);
        }
        self.queue(builder)
    }

    fn read_data(&mut self, bits: usize) -> Result<Vec<u8>, TransportError>
    {
        let (bytes, last) = super::split_bits(bits);
        let zeros = vec![0; bytes.max(1)];
        self.read_write_data(&zeros, last, false)
    }

    fn write_data(&mut self, data: &[u8], bits: u8, pause_after: bool) -> Result<(), TransportError>
    {
        let (last_byte, head) = data.split_last().ok_or(TransportError::InvalidScan("empty scan"))?;
        let mut builder = MpsseCmdBuilder::new();
        let bits = bits.clamp(1, 8);

        if !head.is_empty() {
            builder = builder.clock_data_out(ClockDataOut::LsbNeg, head);
        }
        if !pause_after {
            builder = builder.clock_bits_out(ClockBitsOut::LsbNeg, *last_byte, bits);
            return self.queue(builder);
        }

        // The last bit goes out with TMS high, then one more clock into Pause
        if bits > 1 {
            builder = builder.clock_bits_out(ClockBitsOut::LsbNeg, *last_byte, bits - 1);
        }
        let last_bit = last_byte & (1 << (bits - 1)) != 0;
        builder = builder.clock_tms_out(ClockTMSOut::NegEdge, 0b01, last_bit, 2);
        self.queue(builder)
    }

    fn read_write_data(&mut self, data: &[u8], bits: u8, pause_after: bool) -> Result<Vec<u8>, TransportError> {
        let (last_byte, head) = data.split_last().ok_or(TransportError::InvalidScan("empty scan"))?;
        let mut builder = MpsseCmdBuilder::new();
        let bits = bits.clamp(1, 8);

        if !head.is_empty() {
            builder = builder.clock_data(ClockData::LsbPosIn, head);
        }
        let shifted = if pause_after { bits - 1 } else { bits };
        let mut read_len = head.len();
        if shifted > 0 {
            builder = builder.clock_bits(ClockBits::LsbPosIn, *last_byte, shifted);
            read_len += 1;
        }
        if pause_after {
            let last_bit = last_byte & (1 << (bits - 1)) != 0;
            builder = builder.clock_tms(ClockTMS::NegTMSPosTDO, 0b1, last_bit, 1);
            builder = builder.clock_tms_out(ClockTMSOut::NegEdge, 0b0, last_bit, 1);
            read_len += 1;
        }

        let reply = self.transfer(builder, read_len)?;
        if reply.len() < read_len {
            return Err(TransportError::ShortRead { expected: read_len, got: reply.len() });
        }

        let mut out = reply[..head.len()].to_vec();
        // Partial bytes arrive in the top bits
        let mut last = 0u8;
        let mut idx = head.len();
        if shifted > 0 {
            last = reply[idx] >> (8 - shifted);
            idx += 1;
        }
        if pause_after {
            let tdo = reply[idx] >> 7;
            last |= tdo << (bits - 1);
        }
        out.push(last);
        Ok(out)
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        let commands = core::mem::take(&mut self.buffer);
        if !commands.is_empty() {
            self.ft.send(&commands).map_err(ftdi_error)?;
        }
        Ok(())
    }
}

// Lower pins
const PIN_TCK: u8 = 1;
const PIN_TDI: u8 = 1 << 1;
//const PIN_TDO: u8 = 1 << 2;
const PIN_TMS: u8 = 1 << 3;
const PIN_N_OE: u8 = 1 << 4;
const LOWER_OUTPUT_PINS: u8 = PIN_TCK | PIN_TDI | PIN_TMS | PIN_N_OE;

// Upper pins
const PIN_N_TRST: u8 = 1;
const PIN_N_SRST: u8 = 1 << 1;
const PIN_N_TRST_OE: u8 = 1 << 2;
const PIN_N_SRST_OE: u8 = 1 << 3;
const UPPER_OUTPUT_PINS: u8 = PIN_N_TRST | PIN_N_SRST | PIN_N_TRST_OE | PIN_N_SRST_OE;

pub struct JtagKey {
    ft: Mpsse<Ft2232h>,
}

impl JtagKey {
    /// Create a new JtagKey.  FT2232-based adapters like JtagKey have both an "A" interface and a
    /// "B" interface.  `primary` controls which to use. `clock` controls the speed of TCLK in hertz.
    pub fn new(clock: u32, primary: bool) -> Result<Self, TransportError> {
        let description = if primary {
            "Dual RS232-HS A"
        } else {
            "Dual RS232-HS B"
        };
        let ft = Ftdi::with_description(description)
            .map_err(|e| TransportError::Open(format!("{}: {:?}", description, e)))?;
        let ft = Ft2232h::try_from(ft).map_err(ftdi_error)?;
        let mut ft = Mpsse::new(ft, clock)?;
        ft.ft.set_latency_timer(Duration::from_millis(0)).map_err(ftdi_error)?;
        ft.ft.set_gpio_upper(PIN_N_TRST | PIN_N_SRST, UPPER_OUTPUT_PINS).map_err(ftdi_error)?;

        let builder = MpsseCmdBuilder::new()
            .set_gpio_lower(PIN_TMS, LOWER_OUTPUT_PINS);
        ft.ft.send(builder.as_slice()).map_err(ftdi_error)?;

        Ok(JtagKey {
            ft,
        })
    }
}

impl Cable for JtagKey {
    fn change_mode(&mut self, tms: &[usize], tdi: bool) -> Result<(), TransportError> {
        self.ft.change_mode(tms, tdi)
    }

    fn read_data(&mut self, bits: usize) -> Result<Vec<u8>, TransportError> {
        self.ft.read_data(bits)
    }

    fn write_data(&mut self, data: &[u8], bits: u8, pause_after: bool) -> Result<(), TransportError> {
        self.ft.write_data(data, bits, pause_after)
    }

    fn read_write_data(&mut self, data: &[u8], bits: u8, pause_after: bool) -> Result<Vec<u8>, TransportError> {
        self.ft.read_write_data(data, bits, pause_after)
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        self.ft.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ftdi_mpsse::MpsseSettings;

    // Records every write and fails the next `fail` of them
    #[derive(Default)]
    struct Adapter {
        sent: Vec<Vec<u8>>,
        fail: usize,
    }

    impl MpsseCmdExecutor for Adapter {
        type Error = &'static str;

        fn init(&mut self, _settings: &MpsseSettings) -> Result<(), Self::Error> {
            Ok(())
        }

        fn send(&mut self, data: &[u8]) -> Result<(), Self::Error> {
            if self.fail > 0 {
                self.fail -= 1;
                return Err("usb stall");
            }
            self.sent.push(data.to_vec());
            Ok(())
        }

        fn recv(&mut self, data: &mut [u8]) -> Result<(), Self::Error> {
            data.fill(0);
            Ok(())
        }
    }

    fn cable(fail: usize) -> Mpsse<Adapter> {
        Mpsse {
            ft: Adapter { fail, ..Adapter::default() },
            buffer: vec![],
        }
    }

    #[test]
    fn failed_transfer_is_not_resent() {
        let mut mpsse = cable(1);
        mpsse.change_mode(&[1, 1, 0], true).unwrap();
        assert!(matches!(mpsse.read_write_data(&[0b1101], 4, true), Err(TransportError::Ftdi(_))));
        assert!(mpsse.buffer.is_empty());

        mpsse.read_write_data(&[0b1101], 4, true).unwrap();
        let mut fresh = cable(0);
        fresh.read_write_data(&[0b1101], 4, true).unwrap();
        assert_eq!(mpsse.ft.sent, fresh.ft.sent);
    }

    #[test]
    fn failed_flush_drops_buffered_commands() {
        let mut mpsse = cable(1);
        mpsse.change_mode(&[1, 1, 1, 1, 1, 0], true).unwrap();
        assert!(mpsse.flush().is_err());
        mpsse.flush().unwrap();
        assert!(mpsse.ft.sent.is_empty());
    }
}
