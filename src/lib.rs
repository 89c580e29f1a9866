//! This crate drives general-purpose I/O pins that sit behind a JTAG boundary-scan TAP.  The
//! remote device exposes two scan chains: a configuration chain holding one direction bit per pin
//! and a data chain holding one value bit per pin.  Both chains carry one extra "apply" bit above
//! the pin bits which tells the device to latch what was just shifted in.
//!
//! At the bottom sits the `Cable` trait, implemented for bit-banged GPIO, J-Link and FTDI MPSSE
//! adapters.  `JtagSM` tracks the TAP state machine on top of a cable, and `TapTransport` turns
//! that into a queue of IR and DR scans behind the `ScanTransport` trait.  The driver itself only
//! ever talks to a `ScanTransport`, so it can just as well run against the simulated device in
//! `sim`.
//!
//! The wire layout is fixed:
//!
//! * chain selection is an IR scan of CHAIN_SELECT, a 1-bit DR scan of the chain index (0 for
//!   the configuration chain, 1 for the data chain) and an IR scan of EXTEST;
//! * every configuration or data scan is `N + 1` bits long, bit `i` belongs to pin `i`, bit 0 is
//!   shifted first and bit `N` is the apply bit.
//!
//! # Example
//! ```
//! use jtag_gpio::options::Options;
//! use jtag_gpio::sim::SimTap;
//! use jtag_gpio::target::JtagGpio;
//!
//! let mut tap = SimTap::new(3).with_loopback(true);
//! let mut gpio = JtagGpio::new(&mut tap, Options::default()).unwrap();
//! gpio.run_command("settings", &["0", "1"]).unwrap();
//! gpio.run_command("set_pin", &["0", "1"]).unwrap();
//! let reply = gpio.run_command("get_pin", &["0"]).unwrap();
//! assert_eq!(reply.as_deref(), Some("1"));
//! ```

#![no_std]

#[cfg(feature = "std")]
extern crate std;

extern crate alloc;

pub mod bits;
pub mod cable;
pub mod chain;
pub mod codec;
pub mod command;
pub mod error;
pub mod options;
pub mod pins;
pub mod sim;
pub mod statemachine;
pub mod target;
pub mod transport;

pub use error::{Error, Result, TransportError};
