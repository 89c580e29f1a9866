//! The GPIO driver as a debugger target.
//!
//! A `JtagGpio` owns the transport to one TAP and the pin bank behind it.  It has no CPU to run,
//! so its lifecycle is bookkeeping only: `poll` reports any running target as halted straight away.
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::chain::Opcodes;
use crate::codec;
use crate::command::{self, CommandRegistration, CommandRegistry};
use crate::error::{Error, Result, TransportError};
use crate::options::{ApplyPolicy, Options};
use crate::pins::{Direction, Pending, PinBank, PinIndex};
use crate::transport::ScanTransport;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetState {
    Running,
    DebugRunning,
    Halted,
    Reset,
}

impl fmt::Display for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TargetState::Running => "running",
            TargetState::DebugRunning => "debug-running",
            TargetState::Halted => "halted",
            TargetState::Reset => "reset",
        })
    }
}

/// Lifecycle callbacks every target type provides to the debugger core
pub trait Target {
    fn name(&self) -> &'static str;

    fn state(&self) -> TargetState;

    fn poll(&mut self) -> Result<()>;

    fn halt(&mut self) -> Result<()>;

    fn assert_reset(&mut self) -> Result<()>;

    fn deassert_reset(&mut self) -> Result<()>;

    /// One-line human readable summary of the target
    fn report_state(&self) -> String;
}

pub struct JtagGpio<T> {
    tap: T,
    bank: PinBank,
    opcodes: Opcodes,
    policy: ApplyPolicy,
    state: TargetState,
    commands: CommandRegistry<T>,
}

impl<T: ScanTransport> JtagGpio<T> {
    /// Attach the driver to the TAP behind `tap`.  Nothing is scanned until the first command or
    /// `examine`.
    pub fn new(tap: T, options: Options) -> Result<Self> {
        options.validate()?;
        let bank = PinBank::new(options.pin_count)?;
        log::info!("jtag_gpio: {} pins, apply policy {:?}", bank.len(), options.apply_policy);
        Ok(Self {
            tap,
            bank,
            opcodes: Opcodes {
                chain_select: options.chain_select_opcode,
                extest: options.extest_opcode,
            },
            policy: options.apply_policy,
            state: TargetState::Running,
            commands: CommandRegistry::new(command::handlers()),
        })
    }

    pub fn bank(&self) -> &PinBank {
        &self.bank
    }

    pub fn tap(&self) -> &T {
        &self.tap
    }

    pub fn tap_mut(&mut self) -> &mut T {
        &mut self.tap
    }

    pub fn into_inner(self) -> T {
        self.tap
    }

    pub fn commands(&self) -> &[CommandRegistration<T>] {
        self.commands.entries()
    }

    pub fn help(&self) -> String {
        self.commands.help()
    }

    /// Run one of the registered commands.  `Ok(Some(_))` carries text to print.
    pub fn run_command(&mut self, name: &str, args: &[&str]) -> Result<Option<String>> {
        let (arity, handler) = {
            let cmd = self.commands.find(name)?;
            (cmd.arity, cmd.handler)
        };
        if args.len() != arity {
            return Err(Error::Argument(alloc::format!(
                "{} takes {} argument{}, got {}",
                name,
                arity,
                if arity == 1 { "" } else { "s" },
                args.len()
            )));
        }
        handler(self, args)
    }

    /// Seed the cached directions from the device
    pub fn examine(&mut self) -> Result<()> {
        codec::read_config(&mut self.tap, self.opcodes, &mut self.bank)?;
        log::info!("jtag_gpio: examined, {}", self.bank);
        Ok(())
    }

    /// Read the directions back from the device
    pub fn read_config(&mut self) -> Result<()> {
        codec::read_config(&mut self.tap, self.opcodes, &mut self.bank)?;
        Ok(())
    }

    /// Configure `pin` and latch the whole bank's directions on the device
    pub fn set_direction(&mut self, pin: PinIndex, direction: Direction) -> Result<()> {
        let previous = self.bank.pin(pin).direction;
        self.bank.set_direction(pin, direction);
        let result = codec::write_config(&mut self.tap, self.opcodes, &mut self.bank);
        self.settle(result, |bank| {
            bank.set_direction(pin, previous);
            bank.pin_mut(pin).pending.remove(Pending::DIRECTION);
        })
    }

    /// Drive `pin` to `value`
    pub fn set_pin(&mut self, pin: PinIndex, value: bool) -> Result<()> {
        let previous = self.bank.pin(pin).output;
        self.bank.set_output(pin, value);
        let result = self.exchange();
        self.settle(result, |bank| {
            bank.set_output(pin, previous);
            bank.pin_mut(pin).pending.remove(Pending::OUTPUT);
        })
    }

    /// Sample every pin and return the input value of `pin`
    pub fn get_pin(&mut self, pin: PinIndex) -> Result<bool> {
        self.exchange()?;
        Ok(self.bank.pin(pin).input)
    }

    /// One data chain round trip.  Directions the device has not confirmed are written first, so
    /// outputs are never driven on pins it still has as inputs.
    fn exchange(&mut self) -> core::result::Result<(), TransportError> {
        if self.bank.any_pending(Pending::DIRECTION) {
            log::debug!("jtag_gpio: resynchronizing directions before exchange");
            codec::write_config(&mut self.tap, self.opcodes, &mut self.bank)?;
        }
        codec::exchange(&mut self.tap, self.opcodes, &mut self.bank)
    }

    fn settle(
        &mut self,
        result: core::result::Result<(), TransportError>,
        rollback: impl FnOnce(&mut PinBank),
    ) -> Result<()> {
        if let Err(err) = result {
            match self.policy {
                ApplyPolicy::Optimistic => {
                    log::warn!("jtag_gpio: apply failed ({}), pins left unsynced", err);
                }
                ApplyPolicy::Rollback => {
                    log::warn!("jtag_gpio: apply failed ({}), rolling back", err);
                    rollback(&mut self.bank);
                }
            }
            return Err(err.into());
        }
        Ok(())
    }
}

impl<T: ScanTransport> Target for JtagGpio<T> {
    fn name(&self) -> &'static str {
        "jtag_gpio"
    }

    fn state(&self) -> TargetState {
        self.state
    }

    fn poll(&mut self) -> Result<()> {
        if matches!(self.state, TargetState::Running | TargetState::DebugRunning) {
            log::debug!("jtag_gpio: {} -> halted", self.state);
            self.state = TargetState::Halted;
        }
        Ok(())
    }

    fn halt(&mut self) -> Result<()> {
        self.state = TargetState::Halted;
        Ok(())
    }

    fn assert_reset(&mut self) -> Result<()> {
        log::info!("jtag_gpio: reset asserted");
        self.state = TargetState::Reset;
        Ok(())
    }

    fn deassert_reset(&mut self) -> Result<()> {
        log::info!("jtag_gpio: reset deasserted");
        self.state = TargetState::Running;
        Ok(())
    }

    fn report_state(&self) -> String {
        alloc::format!("target {} {}: {}", self.name(), self.state, self.bank)
    }
}

impl<T> fmt::Debug for JtagGpio<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JtagGpio")
            .field("bank", &self.bank)
            .field("opcodes", &self.opcodes)
            .field("policy", &self.policy)
            .field("state", &self.state)
            .field("commands", &self.commands.entries().iter().map(|c| c.name).collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimTap;

    fn gpio(tap: &mut SimTap) -> JtagGpio<&mut SimTap> {
        JtagGpio::new(tap, Options::default()).unwrap()
    }

    #[test]
    fn poll_halts_a_running_target_once() {
        let mut tap = SimTap::new(3);
        let mut g = gpio(&mut tap);
        assert_eq!(g.state(), TargetState::Running);
        g.poll().unwrap();
        assert_eq!(g.state(), TargetState::Halted);
        g.poll().unwrap();
        assert_eq!(g.state(), TargetState::Halted);

        g.assert_reset().unwrap();
        g.poll().unwrap();
        assert_eq!(g.state(), TargetState::Reset);
        assert_eq!(g.tap().executions(), 0);
    }

    #[test]
    fn reset_cycle_ends_running() {
        let mut tap = SimTap::new(3);
        let mut g = gpio(&mut tap);
        for start in [TargetState::Halted, TargetState::Reset, TargetState::DebugRunning] {
            g.state = start;
            g.assert_reset().unwrap();
            assert_eq!(g.state(), TargetState::Reset);
            g.deassert_reset().unwrap();
            assert_eq!(g.state(), TargetState::Running);
        }
        g.halt().unwrap();
        assert_eq!(g.state(), TargetState::Halted);
    }

    #[test]
    fn rejects_invalid_options() {
        let mut tap = SimTap::new(3);
        let err = JtagGpio::new(&mut tap, Options::default().pin_count(40)).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn pending_direction_is_written_before_exchange() {
        let mut tap = SimTap::new(3).with_loopback(true);
        let mut g = gpio(&mut tap);
        let p0 = g.bank().index(0).unwrap();

        g.tap_mut().fail_next(1);
        assert!(g.set_direction(p0, Direction::Output).is_err());
        assert_eq!(g.bank().pin(p0).direction, Direction::Output);
        assert_eq!(g.tap().directions(), 0);

        g.set_pin(p0, true).unwrap();
        assert_eq!(g.tap().directions(), 0b001);
        assert_eq!(g.tap().outputs(), 0b001);
        assert!(g.get_pin(p0).unwrap());
        assert!(!g.bank().any_pending(Pending::all()));
    }

    #[test]
    fn rollback_restores_previous_values() {
        let mut tap = SimTap::new(3);
        let mut g = JtagGpio::new(&mut tap, Options::default().apply_policy(ApplyPolicy::Rollback)).unwrap();
        let p1 = g.bank().index(1).unwrap();

        g.tap_mut().fail_next(1);
        assert!(matches!(g.set_direction(p1, Direction::Output), Err(Error::Transport(_))));
        assert_eq!(g.bank().pin(p1).direction, Direction::Input);
        assert!(!g.bank().any_pending(Pending::all()));

        g.tap_mut().fail_next(1);
        assert!(g.set_pin(p1, true).is_err());
        assert!(!g.bank().pin(p1).output);
        assert!(!g.bank().any_pending(Pending::all()));
    }

    #[test]
    fn report_state_is_one_line() {
        let mut tap = SimTap::new(3);
        tap.set_inputs(0b010);
        let mut g = gpio(&mut tap);
        let p0 = g.bank().index(0).unwrap();
        g.set_direction(p0, Direction::Output).unwrap();
        g.set_pin(p0, true).unwrap();
        g.poll().unwrap();
        assert_eq!(
            g.report_state(),
            "target jtag_gpio halted: direction: 001 output: 001 input: 010"
        );
    }
}
