//! Packing of the pin bank into configuration and data chain scans.
//!
//! Both chains are `N + 1` bits for a bank of `N` pins.  Bit `i` carries pin `i`, and bit `N` is
//! the apply bit: when it is shifted in as 1 the device latches the other bits at Update-DR.
//! Captured payloads use the same layout, and their bit `N` means nothing.
use alloc::vec::Vec;

use crate::bits::ScanPayload;
use crate::error::TransportError;
use crate::pins::{Pin, PinBank};

pub mod config;
pub mod data;

pub use config::{read_config, write_config};
pub use data::exchange;

/// Scan length for `bank`, apply bit included
pub fn scan_len(bank: &PinBank) -> usize {
    bank.len() + 1
}

/// Build an outgoing payload from one bit per pin, with the apply bit set
pub(crate) fn encode(bank: &PinBank, bit: impl Fn(&Pin) -> bool) -> ScanPayload {
    let mut payload = ScanPayload::zeros(scan_len(bank));
    for (i, pin) in bank.iter().enumerate() {
        payload.set(i, bit(pin));
    }
    payload.set(bank.len(), true);
    payload
}

/// Hand each pin its bit of a captured payload; the apply bit is ignored
pub(crate) fn decode(bank: &mut PinBank, payload: &ScanPayload, mut apply: impl FnMut(&mut Pin, bool)) {
    for (i, pin) in bank.iter_mut().enumerate() {
        apply(pin, payload.get(i));
    }
}

/// The single capture a codec transaction expects back
pub(crate) fn single_capture(captures: Vec<ScanPayload>) -> Result<ScanPayload, TransportError> {
    captures
        .into_iter()
        .next()
        .ok_or(TransportError::MissingCapture)
}
