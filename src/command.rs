//! The `settings`, `set_pin` and `get_pin` commands.
//!
//! Each driver builds its own `CommandRegistry` from `handlers()`.  Handlers get the driver they
//! act on as an argument and validate every argument before anything is scanned.
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::error::{Error, Result};
use crate::pins::{Direction, PinIndex};
use crate::target::JtagGpio;
use crate::transport::ScanTransport;

pub type Handler<T> = fn(&mut JtagGpio<T>, &[&str]) -> Result<Option<String>>;

pub struct CommandRegistration<T> {
    pub name: &'static str,
    pub arity: usize,
    pub usage: &'static str,
    pub help: &'static str,
    pub handler: Handler<T>,
}

// Manual impls: a derive would require `T: Clone`
impl<T> Clone for CommandRegistration<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for CommandRegistration<T> {}

/// The commands a `JtagGpio` answers to
pub fn handlers<T: ScanTransport>() -> Vec<CommandRegistration<T>> {
    alloc::vec![
        CommandRegistration {
            name: "settings",
            arity: 2,
            usage: "<pin_nr> <direction>",
            help: "set GPIO pin as input (0) or output (1)",
            handler: handle_settings_command,
        },
        CommandRegistration {
            name: "set_pin",
            arity: 2,
            usage: "<pin_nr> <value>",
            help: "set GPIO output value of pin nr",
            handler: handle_set_pin_command,
        },
        CommandRegistration {
            name: "get_pin",
            arity: 1,
            usage: "<pin_nr>",
            help: "print GPIO input value of pin nr",
            handler: handle_get_pin_command,
        },
    ]
}

pub struct CommandRegistry<T> {
    entries: Vec<CommandRegistration<T>>,
}

impl<T> CommandRegistry<T> {
    pub fn new(entries: Vec<CommandRegistration<T>>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[CommandRegistration<T>] {
        &self.entries
    }

    pub fn find(&self, name: &str) -> Result<&CommandRegistration<T>> {
        self.entries
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| Error::Argument(format!("unknown command '{}'", name)))
    }

    /// One line per command: name, usage and help
    pub fn help(&self) -> String {
        let mut out = String::new();
        for c in &self.entries {
            out += &format!("{} {}\n\t{}\n", c.name, c.usage, c.help);
        }
        out
    }
}

/// Parse a number in decimal or `0x` hexadecimal
pub fn parse_u32(s: &str) -> Result<u32> {
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else {
        s.parse::<u32>()
    };
    parsed.map_err(|_| Error::Argument(format!("'{}' is not a number", s)))
}

/// Parse and range check a pin number
fn parse_pin<T>(gpio: &JtagGpio<T>, s: &str) -> Result<PinIndex>
    where T: ScanTransport
{
    gpio.bank().index(parse_u32(s)?)
}

fn handle_settings_command<T: ScanTransport>(gpio: &mut JtagGpio<T>, args: &[&str]) -> Result<Option<String>> {
    let value = parse_u32(args[1])?;
    let pin = parse_pin(gpio, args[0])?;
    let direction = if value != 0 { Direction::Output } else { Direction::Input };
    gpio.set_direction(pin, direction)?;
    Ok(None)
}

fn handle_set_pin_command<T: ScanTransport>(gpio: &mut JtagGpio<T>, args: &[&str]) -> Result<Option<String>> {
    let value = parse_u32(args[1])?;
    let pin = parse_pin(gpio, args[0])?;
    gpio.set_pin(pin, value != 0)?;
    Ok(None)
}

fn handle_get_pin_command<T: ScanTransport>(gpio: &mut JtagGpio<T>, args: &[&str]) -> Result<Option<String>> {
    let pin = parse_pin(gpio, args[0])?;
    let value = gpio.get_pin(pin)?;
    Ok(Some((value as u8).to_string()))
}
