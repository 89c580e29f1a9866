//! This provides a higher-level interface than the `Cable` trait.  Specifically, it keeps track of
//! the state of the JTAG state machine, and allows setting the state to any desired state.
//! `JtagSM` will get to that state by the most efficient path, based on the current state.
use alloc::vec::Vec;
use alloc::vec;

use crate::cable::Cable;
use crate::error::TransportError;

#[derive(Clone,Copy,Debug,PartialEq)]
pub enum Register {
    Data,
    Instruction
}

#[derive(Clone,Copy,Debug,PartialEq)]
pub enum JtagState {
    Reset = 0,
    Idle = 1,
    SelectDR = 2,
    CaptureDR = 3,
    ShiftDR = 4,
    Exit1DR = 5,
    PauseDR = 6,
    Exit2DR = 7,
    UpdateDR = 8,
    SelectIR = 9,
    CaptureIR = 10,
    ShiftIR = 11,
    Exit1IR = 12,
    PauseIR = 13,
    Exit2IR = 14,
    UpdateIR = 15,
}

// Successor states for TMS = 0 and TMS = 1, indexed by `JtagState`
const EDGES: [[JtagState; 2]; 16] = {
    use JtagState::*;
    [
        [Idle, Reset],           // Reset
        [Idle, SelectDR],        // Idle
        [CaptureDR, SelectIR],   // SelectDR
        [ShiftDR, Exit1DR],      // CaptureDR
        [ShiftDR, Exit1DR],      // ShiftDR
        [PauseDR, UpdateDR],     // Exit1DR
        [PauseDR, Exit2DR],      // PauseDR
        [ShiftDR, UpdateDR],     // Exit2DR
        [Idle, SelectDR],        // UpdateDR
        [CaptureIR, Reset],      // SelectIR
        [ShiftIR, Exit1IR],      // CaptureIR
        [ShiftIR, Exit1IR],      // ShiftIR
        [PauseIR, UpdateIR],     // Exit1IR
        [PauseIR, Exit2IR],      // PauseIR
        [ShiftIR, UpdateIR],     // Exit2IR
        [Idle, SelectIR],        // UpdateIR
    ]
};

#[derive(Clone)]
struct Path {
    path: Vec<usize>,
    state: JtagState,
}

impl Path {
    fn new(state: JtagState) -> Self {
        Self {
            state,
            path: Vec::new()
        }
    }
}

pub struct JtagSM<T> {
    pub cable: T,
    state: JtagState,
}

/// Shortest TMS sequence from `from` to `to`
fn get_path(from: JtagState, to: JtagState) -> Vec<usize> {
    let mut paths = vec![Path::new(from)];

    // Every state is reachable within 7 clocks of every other
    for _ in 0..8 {
        let mut newpaths = Vec::new();

        for p in paths {
            for tms in 0..2 {
                let mut next = p.clone();
                next.state = EDGES[p.state as usize][tms];
                next.path.push(tms);

                if next.state == to {
                    return next.path
                }
                newpaths.push(next);
            }
        }

        paths = newpaths;
    }
    unreachable!("JTAG state graph is strongly connected")
}

impl<T, U> JtagSM<T>
    where T: core::ops::DerefMut<Target=U>,
          U: Cable + ?Sized
{
    /// Create a JTAG state machine using an existing `Cable`.  The TAP is reset on the way.
    pub fn new(mut cable: T) -> Result<Self, TransportError> {
        cable.change_mode(&[1, 1, 1, 1, 1, 0], true)?;

        Ok(Self {
            cable,
            state: JtagState::Idle,
        })
    }

    pub fn state(&self) -> JtagState {
        self.state
    }

    /// Reset the scan chain by driving TMS high for 5 clocks, ending in Run-Test/Idle
    pub fn mode_reset(&mut self) -> Result<(), TransportError>
    {
        self.cable.change_mode(&[1, 1, 1, 1, 1, 0], true)?;
        self.state = JtagState::Idle;
        Ok(())
    }

    /// Use TMS to get into `state` by the most efficient path
    pub fn change_mode(&mut self, state: JtagState) -> Result<(), TransportError> {
        if self.state == state {
            return Ok(());
        }

        let path = get_path(self.state, state);
        log::trace!("path from {:?} to {:?}: {:?}", self.state, state, path);
        self.cable.change_mode(&path, true)?;
        self.state = state;
        Ok(())
    }

    fn enter_shift(&mut self, reg: Register) -> Result<(), TransportError> {
        if reg == Register::Data {
            self.change_mode(JtagState::ShiftDR)
        } else {
            self.change_mode(JtagState::ShiftIR)
        }
    }

    fn after_write(&mut self, reg: Register, pause_after: bool) {
        if pause_after {
            if reg == Register::Data {
                self.state = JtagState::PauseDR;
            } else {
                self.state = JtagState::PauseIR;
            }
        }
    }

    /// Write `data` into either the instruction or data register.  `bits` indicates how many bits
    /// of the last byte should be written (8 indicates that the entire byte should be written).
    /// The mode will either be ShiftIR / ShiftDR if `pause_after` is false, or PauseIR / PauseDR
    /// if `pause_after` is true.  This allows for setting the register with multiple calls to
    /// `write_reg`, which may be more convenient than manual bit-shifting.
    pub fn write_reg(&mut self, reg: Register, data: &[u8], bits: u8, pause_after: bool) -> Result<(), TransportError> {
        self.enter_shift(reg)?;
        self.cable.write_data(data, bits, pause_after)?;
        self.after_write(reg, pause_after);
        Ok(())
    }

    /// Similar to `write_reg` except it returns the bits that were shifted out during writing.
    pub fn read_write_reg(&mut self, reg: Register, data: &[u8], bits: u8, pause_after: bool) -> Result<Vec<u8>, TransportError> {
        self.enter_shift(reg)?;
        let data = self.cable.read_write_data(data, bits, pause_after)?;
        self.after_write(reg, pause_after);
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shortest_paths() {
        assert_eq!(get_path(JtagState::Idle, JtagState::ShiftDR), vec![1, 0, 0]);
        assert_eq!(get_path(JtagState::Idle, JtagState::ShiftIR), vec![1, 1, 0, 0]);
        // Pause -> Exit2 -> Update -> Idle
        assert_eq!(get_path(JtagState::PauseDR, JtagState::Idle), vec![1, 1, 0]);
        assert_eq!(get_path(JtagState::PauseIR, JtagState::Idle), vec![1, 1, 0]);
        assert_eq!(get_path(JtagState::Idle, JtagState::Idle), vec![0]);
    }
}
