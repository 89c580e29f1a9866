//! Implementations for different JTAG hardware adapters live here.  Hardware adapters should
//! implement the `Cable` trait.
//!
//! All cables shift data least significant bit first: bit 0 of `data[0]` is the first bit on TDI,
//! and the first bit sampled from TDO lands in bit 0 of the first returned byte.
use alloc::vec::Vec;

#[cfg(feature = "std")]
use alloc::boxed::Box;
#[cfg(feature = "std")]
use alloc::string::ToString;

use crate::error::TransportError;

pub mod gpio;
#[cfg(feature = "std")]
pub mod jlink;
#[cfg(feature = "std")]
pub mod mpsse;

pub trait Cable {
    /// Clock out a series of TMS values to change the state of the JTAG chain.  Each element of
    /// `tms` determines the value of the TMS line, zero for low and any other value for high.
    /// `tdi` controls the state of the TDI line during mode changes.
    fn change_mode(&mut self, tms: &[usize], tdi: bool) -> Result<(), TransportError>;

    /// Shift in `bits` bits from the TDO line while clocking out zeros.  Should be called with
    /// state = ShiftIR or ShiftDR, and will remain in that state.
    fn read_data(&mut self, bits: usize) -> Result<Vec<u8>, TransportError>;

    /// Shift out bits on the TDI line.  `bits` is the number of bits to send from the last byte.
    /// Should be called with state = ShiftIR or ShiftDR.  State won't change unless `pause_after`
    /// is true, in which case it will be PauseIR or PauseDR on exit.
    fn write_data(&mut self, data: &[u8], bits: u8, pause_after: bool) -> Result<(), TransportError>;

    /// Like `write_data`, but returns the bits shifted out of TDO while writing.
    fn read_write_data(
        &mut self,
        data: &[u8],
        bits: u8,
        pause_after: bool,
    ) -> Result<Vec<u8>, TransportError>;

    /// Push out anything the cable has buffered.
    fn flush(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Names accepted by `new_from_string`
#[cfg(feature = "std")]
pub const CABLE_NAMES: &[&str] = &["jtagkey", "jtagkey-b", "jlink"];

/// Open one of the USB cables by name.  `clock` is the TCK frequency in hertz.
#[cfg(feature = "std")]
pub fn new_from_string(name: &str, clock: u32) -> Result<Box<dyn Cable>, TransportError> {
    log::info!("opening cable {} at {} Hz", name, clock);
    match name {
        "jtagkey" => Ok(Box::new(mpsse::JtagKey::new(clock, true)?)),
        "jtagkey-b" => Ok(Box::new(mpsse::JtagKey::new(clock, false)?)),
        "jlink" => Ok(Box::new(jlink::JLink::new(clock)?)),
        _ => Err(TransportError::UnknownCable(name.to_string())),
    }
}

/// Split a scan of `bits` bits into byte count and the number of bits used in the last byte
pub(crate) fn split_bits(bits: usize) -> (usize, u8) {
    let bytes = bits.div_ceil(8);
    let last = match bits % 8 {
        0 => 8,
        n => n as u8,
    };
    (bytes, last)
}
