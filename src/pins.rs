//! Cached state of the remote GPIO pins.
//!
//! The bank is pure data: it never talks to the TAP.  The codecs fill it from captured scans and
//! build outgoing scans from it.
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use bitflags::bitflags;

use crate::error::{Error, Result};

/// Largest bank that fits, apply bit included, in one 32-bit scan register
pub const MAX_PINS: usize = 31;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Input,
    Output,
}

impl Direction {
    /// Direction as it appears on the configuration chain
    pub fn bit(self) -> bool {
        self == Direction::Output
    }

    pub fn from_bit(bit: bool) -> Self {
        if bit {
            Direction::Output
        } else {
            Direction::Input
        }
    }
}

bitflags! {
    /// Parts of a pin's state the remote device has not confirmed yet
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Pending: u8 {
        const DIRECTION = 1 << 0;
        const OUTPUT = 1 << 1;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Pin {
    pub direction: Direction,
    /// Last value commanded, driven only while the pin is an output
    pub output: bool,
    /// Last value sampled by a data exchange
    pub input: bool,
    pub pending: Pending,
}

/// A pin index that has been checked against the bank it came from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PinIndex(usize);

impl PinIndex {
    pub fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for PinIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PinBank {
    pins: Vec<Pin>,
}

impl PinBank {
    /// A bank of `count` inputs, all driven low.  `count` must be between 1 and `MAX_PINS`.
    pub fn new(count: usize) -> Result<Self> {
        if count == 0 || count > MAX_PINS {
            return Err(Error::Config(alloc::format!(
                "pin count {} outside 1..={}", count, MAX_PINS
            )));
        }
        Ok(Self {
            pins: vec![Pin::default(); count],
        })
    }

    pub fn len(&self) -> usize {
        self.pins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }

    /// Validate a pin number taken from a command
    pub fn index(&self, index: u32) -> Result<PinIndex> {
        match usize::try_from(index) {
            Ok(i) if i < self.pins.len() => Ok(PinIndex(i)),
            _ => Err(Error::PinIndex {
                index,
                count: self.pins.len(),
            }),
        }
    }

    pub fn pin(&self, index: PinIndex) -> &Pin {
        &self.pins[index.0]
    }

    pub fn pin_mut(&mut self, index: PinIndex) -> &mut Pin {
        &mut self.pins[index.0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pin> {
        self.pins.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Pin> {
        self.pins.iter_mut()
    }

    /// Set the direction, marking it pending if it changed
    pub fn set_direction(&mut self, index: PinIndex, direction: Direction) {
        let pin = self.pin_mut(index);
        if pin.direction != direction {
            pin.pending |= Pending::DIRECTION;
        }
        pin.direction = direction;
    }

    /// Set the commanded output value, marking it pending if it changed
    pub fn set_output(&mut self, index: PinIndex, value: bool) {
        let pin = self.pin_mut(index);
        if pin.output != value {
            pin.pending |= Pending::OUTPUT;
        }
        pin.output = value;
    }

    pub fn any_pending(&self, what: Pending) -> bool {
        self.pins.iter().any(|p| p.pending.intersects(what))
    }

    pub fn clear_pending(&mut self, what: Pending) {
        for pin in &mut self.pins {
            pin.pending.remove(what);
        }
    }

    /// Directions as a bit mask, pin 0 in bit 0
    pub fn direction_mask(&self) -> u32 {
        self.mask(|p| p.direction.bit())
    }

    pub fn output_mask(&self) -> u32 {
        self.mask(|p| p.output)
    }

    pub fn input_mask(&self) -> u32 {
        self.mask(|p| p.input)
    }

    fn mask(&self, f: impl Fn(&Pin) -> bool) -> u32 {
        self.pins
            .iter()
            .enumerate()
            .fold(0, |acc, (i, p)| acc | ((f(p) as u32) << i))
    }
}

impl fmt::Display for PinBank {
    /// One line: direction, output and input patterns, highest pin first
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.pins.len();
        write!(
            f,
            "direction: {:0w$b} output: {:0w$b} input: {:0w$b}",
            self.direction_mask(),
            self.output_mask(),
            self.input_mask(),
            w = width
        )?;
        if self.any_pending(Pending::all()) {
            f.write_str(" (unsynced)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn bank_size_is_bounded() {
        assert!(matches!(PinBank::new(0), Err(Error::Config(_))));
        assert!(matches!(PinBank::new(MAX_PINS + 1), Err(Error::Config(_))));
        assert_eq!(PinBank::new(MAX_PINS).unwrap().len(), MAX_PINS);
    }

    #[test]
    fn index_is_checked() {
        let bank = PinBank::new(3).unwrap();
        assert_eq!(bank.index(2).unwrap().get(), 2);
        assert!(matches!(bank.index(3), Err(Error::PinIndex { index: 3, count: 3 })));
        assert!(matches!(bank.index(u32::MAX), Err(Error::PinIndex { .. })));
    }

    #[test]
    fn changes_are_pending_until_cleared() {
        let mut bank = PinBank::new(3).unwrap();
        let p1 = bank.index(1).unwrap();
        bank.set_direction(p1, Direction::Input);
        assert!(!bank.any_pending(Pending::all()));

        bank.set_direction(p1, Direction::Output);
        bank.set_output(p1, true);
        assert_eq!(bank.pin(p1).pending, Pending::DIRECTION | Pending::OUTPUT);

        bank.clear_pending(Pending::DIRECTION);
        assert!(!bank.any_pending(Pending::DIRECTION));
        assert!(bank.any_pending(Pending::OUTPUT));
    }

    #[test]
    fn display_lists_highest_pin_first() {
        let mut bank = PinBank::new(3).unwrap();
        let p0 = bank.index(0).unwrap();
        let p2 = bank.index(2).unwrap();
        bank.set_direction(p0, Direction::Output);
        bank.set_direction(p2, Direction::Output);
        bank.pin_mut(p2).input = true;
        bank.clear_pending(Pending::all());
        assert_eq!(bank.to_string(), "direction: 101 output: 000 input: 100");

        bank.set_output(p0, true);
        assert_eq!(bank.to_string(), "direction: 101 output: 001 input: 100 (unsynced)");
    }
}
