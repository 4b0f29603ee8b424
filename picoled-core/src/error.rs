//! Error taxonomy shared by the protocol drivers

use core::fmt;

/// Driver operation failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Bad size, pin or parameter at construction or initialize time
    Config,
    /// Pin cannot serve the requested function
    InvalidPin,
    /// Serial peripheral setup failed
    PortInitFailed,
    /// Operation needs a successful `initialize()` first
    NotInitialized,
    /// A transmission of this driver is in flight
    TransmissionInProgress,
    /// Payload plus framing exceeds the buffer capacity
    BufferOverflow,
    /// A bounded wait did not observe completion in time
    Timeout,
    /// Empty data, zero count or out-of-range argument
    InvalidParameters,
    /// Peripheral is owned by another driver instance
    PeripheralClaimed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Error::Config => "invalid configuration",
            Error::InvalidPin => "invalid pin",
            Error::PortInitFailed => "serial port initialization failed",
            Error::NotInitialized => "not initialized",
            Error::TransmissionInProgress => "transmission in progress",
            Error::BufferOverflow => "buffer overflow",
            Error::Timeout => "timeout",
            Error::InvalidParameters => "invalid parameters",
            Error::PeripheralClaimed => "peripheral already claimed",
        };
        f.write_str(msg)
    }
}

impl embedded_io::Error for Error {
    fn kind(&self) -> embedded_io::ErrorKind {
        use embedded_io::ErrorKind;
        match self {
            Error::Timeout => ErrorKind::TimedOut,
            Error::BufferOverflow => ErrorKind::OutOfMemory,
            Error::InvalidParameters | Error::Config | Error::InvalidPin => {
                ErrorKind::InvalidInput
            }
            Error::NotInitialized | Error::PortInitFailed => ErrorKind::NotConnected,
            Error::PeripheralClaimed => ErrorKind::AddrInUse,
            Error::TransmissionInProgress => ErrorKind::Other,
        }
    }
}

/// Result alias for driver operations
pub type Result<T> = core::result::Result<T, Error>;
