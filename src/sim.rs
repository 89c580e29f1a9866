//! A simulated GPIO TAP for testing and development without hardware.
//!
//! `SimTap` implements `ScanTransport` by modelling the device behind the TAP: the 4-bit
//! instruction register, the chain select register, and the configuration and data chains.  A DR
//! scan captures the selected register first and latches what was shifted in afterwards, the way
//! Capture-DR and Update-DR order things on real hardware.
use alloc::vec::Vec;

use crate::bits::ScanPayload;
use crate::chain::{Chain, Opcodes, IR_LEN};
use crate::error::TransportError;
use crate::transport::ScanTransport;

// IR value after Test-Logic-Reset
const BYPASS: u8 = 0xf;

/// A scan the simulated TAP executed, with the bits that were shifted in
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Recorded {
    Ir(ScanPayload),
    Dr(ScanPayload),
}

#[derive(Debug)]
enum Queued {
    Ir(ScanPayload),
    Dr(ScanPayload, bool),
}

#[derive(Debug)]
pub struct SimTap {
    pins: usize,
    opcodes: Opcodes,
    ir: u8,
    select: Option<Chain>,
    directions: u32,
    outputs: u32,
    inputs: u32,
    loopback: bool,
    queue: Vec<Queued>,
    history: Vec<Recorded>,
    calls: usize,
    executions: usize,
    // executions to let through before failing
    skip: usize,
    fail: usize,
}

impl SimTap {
    /// A device with `pins` pins, all inputs, every output latch and input level low.  Panics if
    /// `pins` is 32 or more.
    pub fn new(pins: usize) -> Self {
        assert!(pins < 32);
        Self {
            pins,
            opcodes: Opcodes::default(),
            ir: BYPASS,
            select: None,
            directions: 0,
            outputs: 0,
            inputs: 0,
            loopback: false,
            queue: Vec::new(),
            history: Vec::new(),
            calls: 0,
            executions: 0,
            skip: 0,
            fail: 0,
        }
    }

    /// Feed each output pin's latch back to its input
    pub fn with_loopback(mut self, loopback: bool) -> Self {
        self.loopback = loopback;
        self
    }

    pub fn with_opcodes(mut self, opcodes: Opcodes) -> Self {
        self.opcodes = opcodes;
        self
    }

    fn mask(&self) -> u32 {
        (1 << self.pins) - 1
    }

    /// Levels applied to the pins from outside
    pub fn set_inputs(&mut self, levels: u32) {
        self.inputs = levels & self.mask();
    }

    /// Preload the direction latch, 1 for output
    pub fn set_directions(&mut self, directions: u32) {
        self.directions = directions & self.mask();
    }

    pub fn directions(&self) -> u32 {
        self.directions
    }

    pub fn outputs(&self) -> u32 {
        self.outputs
    }

    /// What the data chain captures: the external levels, or the output latch for output pins
    /// when looped back
    pub fn sampled(&self) -> u32 {
        if self.loopback {
            (self.inputs & !self.directions) | (self.outputs & self.directions)
        } else {
            self.inputs
        }
    }

    /// The chain currently connected between TDI and TDO, if any
    pub fn selected(&self) -> Option<Chain> {
        if self.ir == self.opcodes.extest {
            self.select
        } else {
            None
        }
    }

    /// Every scan executed so far, oldest first
    pub fn history(&self) -> &[Recorded] {
        &self.history
    }

    /// Number of `ir_scan` and `dr_scan` calls, executed or not
    pub fn calls(&self) -> usize {
        self.calls
    }

    /// Number of `execute_queue` calls, failed ones included
    pub fn executions(&self) -> usize {
        self.executions
    }

    /// Make the next `count` executions fail without touching the device
    pub fn fail_next(&mut self, count: usize) {
        self.skip = 0;
        self.fail = count;
    }

    /// Let `n` executions succeed, then fail the one after them
    pub fn fail_nth(&mut self, n: usize) {
        self.skip = n;
        self.fail = 1;
    }

    fn shift_dr(&mut self, data: &ScanPayload) -> ScanPayload {
        let width = data.width();
        let apply = self.pins < width && data.get(self.pins);
        let captured = match (self.ir, self.selected()) {
            (ir, _) if ir == self.opcodes.chain_select => {
                let captured = self.select.map_or(0, |c| c as u32);
                if width > 0 {
                    self.select = Some(if data.get(0) { Chain::Data } else { Chain::Config });
                }
                captured
            }
            (_, Some(Chain::Config)) => {
                let captured = self.directions;
                if apply {
                    self.directions = data.value() & self.mask();
                }
                captured
            }
            (_, Some(Chain::Data)) => {
                let captured = self.sampled();
                if apply {
                    self.outputs = data.value() & self.mask();
                }
                captured
            }
            // BYPASS or unknown instruction
            _ => 0,
        };
        ScanPayload::from_bytes(width, &captured.to_le_bytes())
    }
}

impl ScanTransport for SimTap {
    fn ir_scan(&mut self, ir: &ScanPayload) {
        self.calls += 1;
        self.queue.push(Queued::Ir(ir.clone()));
    }

    fn dr_scan(&mut self, bits: usize, out: Option<&ScanPayload>, capture: bool) {
        self.calls += 1;
        let data = match out {
            Some(out) => ScanPayload::from_bytes(bits, out.as_bytes()),
            None => ScanPayload::zeros(bits),
        };
        self.queue.push(Queued::Dr(data, capture));
    }

    fn execute_queue(&mut self) -> Result<Vec<ScanPayload>, TransportError> {
        let queue = core::mem::take(&mut self.queue);
        self.executions += 1;
        if self.skip > 0 {
            self.skip -= 1;
        } else if self.fail > 0 {
            self.fail -= 1;
            log::debug!("sim: failing {} queued scans", queue.len());
            return Err(TransportError::Simulated);
        }

        let mut captures = Vec::new();
        for scan in queue {
            match scan {
                Queued::Ir(ir) => {
                    if ir.width() != IR_LEN {
                        return Err(TransportError::InvalidScan("IR length mismatch"));
                    }
                    self.ir = ir.value() as u8;
                    self.history.push(Recorded::Ir(ir));
                }
                Queued::Dr(data, capture) => {
                    if data.width() > 32 {
                        return Err(TransportError::InvalidScan("DR scan longer than the device"));
                    }
                    let captured = self.shift_dr(&data);
                    if capture {
                        captures.push(captured);
                    }
                    self.history.push(Recorded::Dr(data));
                }
            }
        }
        Ok(captures)
    }
}
