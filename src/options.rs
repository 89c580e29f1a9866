//! Driver options, fixed when the driver is created.
use alloc::format;

use crate::chain::{IR_LEN, CHAIN_SELECT, EXTEST};
use crate::error::{Error, Result};
use crate::pins::MAX_PINS;

/// What happens to the cached pin state when a configuration write or data exchange fails
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ApplyPolicy {
    /// Keep the new value in the cache; it stays marked as pending until an exchange succeeds
    #[default]
    Optimistic,
    /// Restore the value the pin had before the command
    Rollback,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Options {
    pub pin_count: usize,
    pub chain_select_opcode: u8,
    pub extest_opcode: u8,
    pub apply_policy: ApplyPolicy,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            pin_count: 3,
            chain_select_opcode: CHAIN_SELECT,
            extest_opcode: EXTEST,
            apply_policy: ApplyPolicy::Optimistic,
        }
    }
}

impl Options {
    pub fn pin_count(mut self, count: usize) -> Self {
        self.pin_count = count;
        self
    }

    pub fn chain_select_opcode(mut self, opcode: u8) -> Self {
        self.chain_select_opcode = opcode;
        self
    }

    pub fn extest_opcode(mut self, opcode: u8) -> Self {
        self.extest_opcode = opcode;
        self
    }

    pub fn apply_policy(mut self, policy: ApplyPolicy) -> Self {
        self.apply_policy = policy;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.pin_count == 0 || self.pin_count > MAX_PINS {
            return Err(Error::Config(format!(
                "pin count {} outside 1..={}", self.pin_count, MAX_PINS
            )));
        }
        for (name, opcode) in [("chain select", self.chain_select_opcode), ("extest", self.extest_opcode)] {
            if opcode >> IR_LEN != 0 {
                return Err(Error::Config(format!(
                    "{} opcode {:#x} does not fit a {}-bit IR", name, opcode, IR_LEN
                )));
            }
        }
        if self.chain_select_opcode == self.extest_opcode {
            return Err(Error::Config(format!(
                "chain select and extest share opcode {:#x}", self.extest_opcode
            )));
        }
        Ok(())
    }
}
