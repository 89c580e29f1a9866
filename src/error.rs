//! Error types shared by the cables, the scan transport and the GPIO driver.
use alloc::string::String;

use thiserror::Error;

/// Failures raised below the driver: by a cable, the TAP state machine or a scan transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No cable with that name is known
    #[error("unknown cable '{0}'")]
    UnknownCable(String),

    /// The cable could not be opened or initialized
    #[error("failed to open cable: {0}")]
    Open(String),

    /// A USB transfer to the adapter failed
    #[cfg(feature = "std")]
    #[error("USB transfer failed: {0}")]
    Usb(#[from] rusb::Error),

    /// The FTDI driver reported an error
    #[error("FTDI error: {0}")]
    Ftdi(String),

    /// Driving or sampling one of the JTAG lines failed
    #[error("GPIO line error: {0:?}")]
    Pin(embedded_hal::digital::ErrorKind),

    /// The adapter returned fewer bytes than the scan needs
    #[error("short read: expected {expected} bytes, got {got}")]
    ShortRead { expected: usize, got: usize },

    /// A capturing scan produced no data
    #[error("scan queue returned no capture")]
    MissingCapture,

    /// A scan was queued that the transport cannot shift
    #[error("invalid scan: {0}")]
    InvalidScan(&'static str),

    /// The adapter rejected or did not answer a command
    #[error("adapter error: {0}")]
    Adapter(&'static str),

    /// Fault injected by the simulated TAP
    #[error("simulated transport fault")]
    Simulated,
}

impl TransportError {
    pub(crate) fn pin<E: embedded_hal::digital::Error>(err: E) -> Self {
        TransportError::Pin(err.kind())
    }
}

/// Errors reported by the GPIO driver and its command surface.
#[derive(Debug, Error)]
pub enum Error {
    /// Wrong number of arguments, unparsable value or unknown command
    #[error("syntax error: {0}")]
    Argument(String),

    /// The pin index is outside the bank
    #[error("pin {index} out of range, bank has {count} pins")]
    PinIndex { index: u32, count: usize },

    /// Invalid driver options, detected when the driver is created
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A scan or the execution of the scan queue failed
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Result type alias using the driver `Error`
pub type Result<T> = core::result::Result<T, Error>;
