//! UART serial communication abstractions
//!
//! Both RS485-style drivers are simplex transmitters that pump bytes one
//! at a time from a polled or interrupt context, so the port trait exposes
//! FIFO status and single-byte writes rather than blocking bulk writes.

/// UART configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UartConfig {
    /// Baud rate in bits per second
    pub baudrate: u32,
    /// Number of data bits
    pub data_bits: DataBits,
    /// Parity mode
    pub parity: Parity,
    /// Number of stop bits
    pub stop_bits: StopBits,
}

impl Default for UartConfig {
    fn default() -> Self {
        Self {
            baudrate: 115200,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
        }
    }
}

impl UartConfig {
    /// DMX512 line framing: 250 kbaud, 8 data bits, no parity, 2 stop bits
    pub const fn dmx() -> Self {
        Self {
            baudrate: 250_000,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::Two,
        }
    }

    /// Bits on the wire per character, start bit included
    pub const fn bits_per_char(&self) -> u32 {
        1 + self.data_bits.count() + self.stop_bits.count() + self.parity.bits()
    }
}

/// Number of data bits per frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DataBits {
    Seven,
    #[default]
    Eight,
}

impl DataBits {
    pub const fn count(self) -> u32 {
        match self {
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        }
    }

    pub const fn from_count(bits: u8) -> Option<Self> {
        match bits {
            7 => Some(DataBits::Seven),
            8 => Some(DataBits::Eight),
            _ => None,
        }
    }
}

/// Parity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
}

impl Parity {
    pub const fn bits(self) -> u32 {
        match self {
            Parity::None => 0,
            Parity::Even | Parity::Odd => 1,
        }
    }
}

/// Number of stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StopBits {
    #[default]
    One,
    Two,
}

impl StopBits {
    pub const fn count(self) -> u32 {
        match self {
            StopBits::One => 1,
            StopBits::Two => 2,
        }
    }

    pub const fn from_count(bits: u8) -> Option<Self> {
        match bits {
            1 => Some(StopBits::One),
            2 => Some(StopBits::Two),
            _ => None,
        }
    }
}

/// Transmit-only UART
///
/// Implementations own the peripheral and its TX pin. The drivers never
/// block inside these calls; waiting is done by polling [`is_writable`]
/// and [`is_idle`].
///
/// [`is_writable`]: SerialPort::is_writable
/// [`is_idle`]: SerialPort::is_idle
pub trait SerialPort {
    /// Error type for configuration failures
    type Error;

    /// Identity used for ownership claims
    fn id(&self) -> crate::PeripheralId;

    /// Apply framing and baud rate, enabling the transmitter
    ///
    /// Returns the baud rate the hardware actually achieved.
    fn configure(&mut self, config: &UartConfig) -> Result<u32, Self::Error>;

    /// Change the baud rate without touching the framing
    fn set_baudrate(&mut self, baudrate: u32) -> Result<u32, Self::Error>;

    /// TX FIFO can accept another byte
    fn is_writable(&self) -> bool;

    /// Queue a byte; callers check [`SerialPort::is_writable`] first
    fn write_byte(&mut self, byte: u8);

    /// FIFO empty and the shift register has finished the last stop bit
    fn is_idle(&self) -> bool;

    /// Hold the TX line low (break) or return it to the idle mark level
    fn set_break(&mut self, asserted: bool);

    /// Enable or disable the TX-ready interrupt
    fn set_tx_interrupt(&mut self, enabled: bool);

    /// Disable the transmitter and release the line
    fn deinit(&mut self);
}
