//! The scan queue the GPIO driver talks to.
//!
//! Scans are queued with `ir_scan` and `dr_scan` and nothing reaches the TAP until
//! `execute_queue`, which runs the whole queue as a unit and hands back what the capturing scans
//! shifted out.  `TapTransport` implements this on top of `JtagSM` and a `Cable`; `sim::SimTap`
//! implements it without any hardware.
use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::bits::ScanPayload;
use crate::cable::Cable;
use crate::error::TransportError;
use crate::statemachine::{JtagSM, JtagState, Register};

pub trait ScanTransport {
    /// Queue a scan of `ir` into the instruction register.
    fn ir_scan(&mut self, ir: &ScanPayload);

    /// Queue a scan of `bits` bits through the data register.  Without an `out` payload zeros are
    /// shifted in.  When `capture` is set, the bits shifted out are returned by `execute_queue`.
    fn dr_scan(&mut self, bits: usize, out: Option<&ScanPayload>, capture: bool);

    /// Run every queued scan.  On success the result holds one payload per capturing scan, in
    /// queue order.  The queue is empty afterwards whether or not execution succeeded.
    fn execute_queue(&mut self) -> Result<Vec<ScanPayload>, TransportError>;
}

impl<S: ScanTransport + ?Sized> ScanTransport for &mut S {
    fn ir_scan(&mut self, ir: &ScanPayload) {
        (**self).ir_scan(ir)
    }

    fn dr_scan(&mut self, bits: usize, out: Option<&ScanPayload>, capture: bool) {
        (**self).dr_scan(bits, out, capture)
    }

    fn execute_queue(&mut self) -> Result<Vec<ScanPayload>, TransportError> {
        (**self).execute_queue()
    }
}

impl<S: ScanTransport + ?Sized> ScanTransport for Box<S> {
    fn ir_scan(&mut self, ir: &ScanPayload) {
        (**self).ir_scan(ir)
    }

    fn dr_scan(&mut self, bits: usize, out: Option<&ScanPayload>, capture: bool) {
        (**self).dr_scan(bits, out, capture)
    }

    fn execute_queue(&mut self) -> Result<Vec<ScanPayload>, TransportError> {
        (**self).execute_queue()
    }
}

/// One queued scan
#[derive(Clone, Debug, PartialEq)]
pub struct Scan {
    pub register: Register,
    pub payload: ScanPayload,
    pub capture: bool,
}

/// `ScanTransport` for a single TAP reached through a `Cable`.
///
/// Each scan ends in Run-Test/Idle, so the TAP passes through Update-IR or Update-DR after every
/// scan.
pub struct TapTransport<T> {
    sm: JtagSM<T>,
    queue: Vec<Scan>,
}

impl<T, U> TapTransport<T>
    where T: core::ops::DerefMut<Target=U>,
          U: Cable + ?Sized
{
    /// Take over `cable`.  The TAP is reset and left in Run-Test/Idle.
    pub fn new(cable: T) -> Result<Self, TransportError> {
        Ok(Self::from_sm(JtagSM::new(cable)?))
    }

    pub fn from_sm(sm: JtagSM<T>) -> Self {
        Self {
            sm,
            queue: Vec::new(),
        }
    }

    /// Drop anything queued and put the TAP through Test-Logic-Reset.  `execute_queue` does this
    /// after a failed scan, since the TAP state is unknown at that point.
    pub fn reset(&mut self) -> Result<(), TransportError> {
        self.queue.clear();
        self.sm.mode_reset()?;
        self.sm.cable.flush()
    }

    /// Scans waiting for `execute_queue`
    pub fn pending(&self) -> &[Scan] {
        &self.queue
    }

    pub fn into_inner(self) -> JtagSM<T> {
        self.sm
    }

    fn run(&mut self, scans: &[Scan]) -> Result<Vec<ScanPayload>, TransportError> {
        let mut captures = Vec::new();
        for scan in scans {
            let data = scan.payload.as_bytes();
            let bits = scan.payload.last_byte_bits();
            if scan.capture {
                let tdo = self.sm.read_write_reg(scan.register, data, bits, true)?;
                if tdo.len() < data.len() {
                    return Err(TransportError::ShortRead { expected: data.len(), got: tdo.len() });
                }
                captures.push(ScanPayload::from_bytes(scan.payload.width(), &tdo));
            } else {
                self.sm.write_reg(scan.register, data, bits, true)?;
            }
            self.sm.change_mode(JtagState::Idle)?;
        }
        self.sm.cable.flush()?;
        Ok(captures)
    }
}

impl<T, U> ScanTransport for TapTransport<T>
    where T: core::ops::DerefMut<Target=U>,
          U: Cable + ?Sized
{
    fn ir_scan(&mut self, ir: &ScanPayload) {
        self.queue.push(Scan {
            register: Register::Instruction,
            payload: ir.clone(),
            capture: false,
        });
    }

    fn dr_scan(&mut self, bits: usize, out: Option<&ScanPayload>, capture: bool) {
        let payload = match out {
            Some(out) if out.width() == bits => out.clone(),
            Some(out) => ScanPayload::from_bytes(bits, out.as_bytes()),
            None => ScanPayload::zeros(bits),
        };
        self.queue.push(Scan {
            register: Register::Data,
            payload,
            capture,
        });
    }

    fn execute_queue(&mut self) -> Result<Vec<ScanPayload>, TransportError> {
        let scans = core::mem::take(&mut self.queue);
        if scans.iter().any(|s| s.payload.width() == 0) {
            return Err(TransportError::InvalidScan("zero-length scan"));
        }
        log::trace!("executing {} scans", scans.len());
        self.run(&scans).or_else(|err| {
            log::warn!("scan failed ({}), resetting TAP", err);
            if let Err(reset_err) = self.reset() {
                log::error!("TAP reset failed: {}", reset_err);
            }
            Err(err)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use crate::cable::Cable;

    // Cable that loops TDI back to TDO and logs what it was asked to do
    #[derive(Default)]
    struct Loopback {
        modes: Vec<Vec<usize>>,
        shifted: Vec<(Vec<u8>, u8, bool)>,
        flushes: usize,
        // reads left to fail
        fail: usize,
    }

    impl Cable for Loopback {
        fn change_mode(&mut self, tms: &[usize], _tdi: bool) -> Result<(), TransportError> {
            self.modes.push(tms.to_vec());
            Ok(())
        }

        fn read_data(&mut self, bits: usize) -> Result<Vec<u8>, TransportError> {
            Ok(vec![0; bits.div_ceil(8)])
        }

        fn write_data(&mut self, data: &[u8], bits: u8, pause_after: bool) -> Result<(), TransportError> {
            self.shifted.push((data.to_vec(), bits, pause_after));
            Ok(())
        }

        fn read_write_data(&mut self, data: &[u8], bits: u8, pause_after: bool) -> Result<Vec<u8>, TransportError> {
            if self.fail > 0 {
                self.fail -= 1;
                return Err(TransportError::Simulated);
            }
            self.shifted.push((data.to_vec(), bits, pause_after));
            Ok(data.to_vec())
        }

        fn flush(&mut self) -> Result<(), TransportError> {
            self.flushes += 1;
            Ok(())
        }
    }

    #[test]
    fn scans_wait_for_execute() {
        let mut cable = Loopback::default();
        let mut tap = TapTransport::new(&mut cable).unwrap();
        tap.ir_scan(&ScanPayload::from_value(4, 0x3));
        tap.dr_scan(4, Some(&ScanPayload::from_value(4, 0b1101)), true);
        assert_eq!(tap.pending().len(), 2);
        assert_eq!(tap.sm.cable.shifted.len(), 0);

        let captures = tap.execute_queue().unwrap();
        assert_eq!(captures, vec![ScanPayload::from_value(4, 0b1101)]);
        assert!(tap.pending().is_empty());

        let cable = &tap.sm.cable;
        assert_eq!(cable.shifted, vec![(vec![0x3], 4, true), (vec![0b1101], 4, true)]);
        assert_eq!(cable.flushes, 1);
        // reset, Idle -> ShiftIR, PauseIR -> Idle, Idle -> ShiftDR, PauseDR -> Idle
        assert_eq!(cable.modes, vec![
            vec![1, 1, 1, 1, 1, 0],
            vec![1, 1, 0, 0],
            vec![1, 1, 0],
            vec![1, 0, 0],
            vec![1, 1, 0],
        ]);
    }

    #[test]
    fn dr_scan_without_payload_shifts_zeros() {
        let mut cable = Loopback::default();
        let mut tap = TapTransport::new(&mut cable).unwrap();
        tap.dr_scan(9, None, true);
        let captures = tap.execute_queue().unwrap();
        assert_eq!(captures[0].as_bytes(), &[0, 0]);
        assert_eq!(tap.sm.cable.shifted[0], (vec![0, 0], 1, true));
    }

    #[test]
    fn zero_length_scan_is_rejected_and_queue_cleared() {
        let mut cable = Loopback::default();
        let mut tap = TapTransport::new(&mut cable).unwrap();
        tap.dr_scan(0, None, false);
        assert!(matches!(tap.execute_queue(), Err(TransportError::InvalidScan(_))));
        assert!(tap.pending().is_empty());
    }

    #[test]
    fn failed_scan_resets_the_tap() {
        let mut cable = Loopback { fail: 1, ..Loopback::default() };
        let mut tap = TapTransport::new(&mut cable).unwrap();
        tap.ir_scan(&ScanPayload::from_value(4, 0x0));
        tap.dr_scan(4, None, true);
        assert!(matches!(tap.execute_queue(), Err(TransportError::Simulated)));
        assert_eq!(tap.sm.state(), JtagState::Idle);
        assert_eq!(tap.sm.cable.modes.last(), Some(&vec![1, 1, 1, 1, 1, 0]));

        tap.sm.cable.modes.clear();
        tap.ir_scan(&ScanPayload::from_value(4, 0x3));
        tap.execute_queue().unwrap();
        // Idle -> ShiftIR, PauseIR -> Idle
        assert_eq!(tap.sm.cable.modes, vec![vec![1, 1, 0, 0], vec![1, 1, 0]]);
    }

    #[test]
    fn reset_drops_queued_scans() {
        let mut cable = Loopback::default();
        let mut tap = TapTransport::new(&mut cable).unwrap();
        tap.ir_scan(&ScanPayload::from_value(4, 0x3));
        tap.reset().unwrap();
        assert!(tap.pending().is_empty());
        assert!(tap.execute_queue().unwrap().is_empty());
        assert!(tap.sm.cable.shifted.is_empty());
        assert_eq!(tap.sm.cable.modes, vec![vec![1, 1, 1, 1, 1, 0], vec![1, 1, 1, 1, 1, 0]]);
    }
}
