//! Implement the `Cable` trait by bit-banging four `embedded-hal` pins
use alloc::vec::Vec;
use alloc::vec;
use embedded_hal::{delay::DelayNs, digital::{InputPin, OutputPin, PinState}};

use crate::cable::Cable;
use crate::error::TransportError;

pub struct Gpio<Clk, Tdi, Tdo, Tms, Delay> where Clk: OutputPin, Tdi: OutputPin, Tdo: InputPin, Tms: OutputPin, Delay: DelayNs {
    half_period: u32,
    delay: Delay,
    clock: Clk,
    tdi: Tdi,
    tdo: Tdo,
    tms: Tms
}

impl<Clk, Tdi, Tdo, Tms, Delay> Gpio<Clk, Tdi, Tdo, Tms, Delay> where Clk: OutputPin, Tdi: OutputPin, Tdo: InputPin, Tms: OutputPin, Delay: DelayNs {
    /// `freq_khz` is the TCK frequency; it must be non-zero.
    pub fn new(freq_khz: u32, clock: Clk, tdi: Tdi, tdo: Tdo, tms: Tms, delay: Delay) -> Gpio<Clk, Tdi, Tdo, Tms, Delay> {
        let period_ns = 1_000_000 / freq_khz.max(1);
        let half_period = period_ns / 2;
        Gpio { half_period, clock, tdi, tdo, tms, delay }
    }

    /// One TCK cycle.  TDO is sampled on the rising edge, TDI and TMS change while the clock is
    /// low.
    fn cycle(&mut self) -> Result<bool, TransportError> {
        self.clock.set_high().map_err(TransportError::pin)?;
        let tdo = self.tdo.is_high().map_err(TransportError::pin)?;

        self.delay.delay_ns(self.half_period);
        self.clock.set_low().map_err(TransportError::pin)?;
        self.delay.delay_ns(self.half_period);
        Ok(tdo)
    }

    fn set_tdi(&mut self, bit: bool) -> Result<(), TransportError> {
        self.tdi.set_state(PinState::from(bit)).map_err(TransportError::pin)
    }
}

impl<Clk, Tdi, Tdo, Tms, Delay> Cable for Gpio<Clk, Tdi, Tdo, Tms, Delay> where Clk: OutputPin, Tdi: OutputPin, Tdo: InputPin, Tms: OutputPin, Delay: DelayNs {
    fn change_mode(&mut self, tms: &[usize], tdi: bool) -> Result<(), TransportError> {
        // clock starts low
        self.set_tdi(tdi)?;

        for d in tms {
            let state = match d {
                0 => PinState::Low,
                _ => PinState::High,
            };
            self.tms.set_state(state).map_err(TransportError::pin)?;
            self.cycle()?;
        }
        Ok(())
    }

    fn read_data(&mut self, bits: usize) -> Result<Vec<u8>, TransportError> {
        let (bytes, last) = super::split_bits(bits);
        let zeros = vec![0; bytes.max(1)];
        self.read_write_data(&zeros, last, false)
    }

    fn write_data(&mut self, data: &[u8], bits: u8, pause_after: bool) -> Result<(), TransportError> {
        self.read_write_data(data, bits, pause_after)?;
        Ok(())
    }

    fn read_write_data(&mut self, data: &[u8], bits: u8, pause_after: bool) -> Result<Vec<u8>, TransportError> {
        if data.is_empty() {
            return Err(TransportError::InvalidScan("empty scan"));
        }
        // Constrain `bits` to be between 1 and 8
        let bits = bits.clamp(1, 8);
        let total = (data.len() - 1) * 8 + bits as usize;

        self.tms.set_low().map_err(TransportError::pin)?;
        let mut out_buffer = vec![0u8; data.len()];

        for i in 0..total {
            let (byte, b) = (i / 8, i % 8);

            // Write a bit from `data` onto TDI, low to high
            self.set_tdi((data[byte] >> b) & 1 == 1)?;

            if i == total - 1 && pause_after {
                // The last bit moves to Exit1
                self.tms.set_high().map_err(TransportError::pin)?;
            }

            let tdo = self.cycle()? as u8;
            out_buffer[byte] |= tdo << b;
        }

        if pause_after {
            // Exit1 -> Pause
            self.tms.set_low().map_err(TransportError::pin)?;
            self.cycle()?;
        }
        Ok(out_buffer)
    }
}
