//! Configuration constants and types
//!
//! Constants describe the protocols and the limits of the fixed-capacity
//! buffers. The config structs are filled from `bridge.toml` at build
//! time by the firmware and default to the stock PicoLED board wiring.

use picoled_hal::uart::{DataBits, Parity, StopBits, UartConfig};

use crate::color::ColorFormat;
use crate::error::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// DMX512
/// Channels in one universe
pub const DMX_UNIVERSE_SIZE: usize = 512;
/// Start code plus channels
pub const DMX_FRAME_SIZE: usize = DMX_UNIVERSE_SIZE + 1;
/// Null start code (dimmer data)
pub const DMX_START_CODE: u8 = 0x00;
pub const DMX_BAUD_RATE: u32 = 250_000;
/// Minimum break (line held low)
pub const DMX_BREAK_TIME_US: u32 = 100;
/// Minimum mark-after-break (line held high)
pub const DMX_MARK_TIME_US: u32 = 12;
/// Gap between frames in continuous mode
pub const DMX_INTER_FRAME_DELAY_US: u32 = 1000;
/// Highest refresh rate a full universe allows
pub const DMX_REFRESH_RATE_HZ: u32 = 44;

// WS2812
pub const MAX_LED_COUNT: usize = 1024;
pub const DEFAULT_LED_COUNT: u16 = 256;
pub const DEFAULT_GRID_WIDTH: u16 = 16;
pub const DEFAULT_GRID_HEIGHT: u16 = 16;
pub const WS2812_BIT_RATE_HZ: u32 = 800_000;
/// Idle time the LEDs need to latch a frame
pub const WS2812_RESET_TIME_US: u32 = 280;

// RS485
pub const RS485_DEFAULT_BAUD: u32 = 115_200;
pub const RS485_MAX_FRAME_SIZE: usize = 1024;
/// Blocking send timeout floor
pub const RS485_TX_TIMEOUT_MS: u32 = 100;
/// Default direction settle time on each side of a frame
pub const RS485_TURNAROUND_TIME_US: u32 = 50;
/// Longest preamble or postamble
pub const MAX_FRAMING_LEN: usize = 16;
/// Scratch space for formatted sends
pub const FORMAT_BUFFER_SIZE: usize = 512;

/// How long `end()` waits for an in-flight transmission before aborting
pub const END_WAIT_TIMEOUT_MS: u32 = 1000;

/// GPIO assignment for the three outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PinConfig {
    /// WS2812 data line
    pub led_panel_pin: u8,
    /// DMX512 UART TX
    pub dmx512_pin: u8,
    /// RS485 UART TX
    pub rs485_data_pin: u8,
    /// RS485 transceiver driver-enable, if wired
    pub rs485_enable_pin: Option<u8>,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            led_panel_pin: 2,
            dmx512_pin: 4,
            rs485_data_pin: 0,
            rs485_enable_pin: Some(9),
        }
    }
}

impl PinConfig {
    fn validate(&self) -> Result<()> {
        let mut pins = [
            Some(self.led_panel_pin),
            Some(self.dmx512_pin),
            Some(self.rs485_data_pin),
            self.rs485_enable_pin,
        ];
        pins.sort_unstable();
        let duplicate = pins
            .windows(2)
            .any(|w| w[0].is_some() && w[0] == w[1]);
        if duplicate {
            return Err(Error::InvalidPin);
        }
        Ok(())
    }
}

/// LED panel geometry and protocol options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LedConfig {
    /// Number of pixels on the chain
    pub num_pixels: u16,
    /// Matrix width for x/y addressing
    pub grid_width: u16,
    /// Matrix height for x/y addressing
    pub grid_height: u16,
    /// Lane order of the LEDs
    pub format: ColorFormat,
    /// Prefer the transfer engine when one is available
    pub use_dma: bool,
}

impl Default for LedConfig {
    fn default() -> Self {
        Self {
            num_pixels: DEFAULT_LED_COUNT,
            grid_width: DEFAULT_GRID_WIDTH,
            grid_height: DEFAULT_GRID_HEIGHT,
            format: ColorFormat::Grb,
            use_dma: true,
        }
    }
}

impl LedConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_pixels == 0 || self.num_pixels as usize > MAX_LED_COUNT {
            return Err(Error::Config);
        }
        if self.grid_width == 0 || self.grid_height == 0 {
            return Err(Error::Config);
        }
        Ok(())
    }
}

/// DMX512 transmitter options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DmxConfig {
    pub baudrate: u32,
    /// Start repeating frames as soon as the transmitter is up
    pub continuous: bool,
}

impl Default for DmxConfig {
    fn default() -> Self {
        Self {
            baudrate: DMX_BAUD_RATE,
            continuous: false,
        }
    }
}

/// RS485 simplex serial options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Rs485Config {
    /// Line framing and baud rate
    pub serial: UartConfig,
    /// Transmit buffer capacity in bytes (framing included)
    pub buffer_size: usize,
    /// Prefer the transfer engine when one is available
    pub use_dma: bool,
    /// Settle time after asserting direction, before the first byte
    pub pre_delay_us: u32,
    /// Settle time after the last stop bit, before releasing direction
    pub post_delay_us: u32,
    /// Drive the direction pin around every frame
    pub auto_direction: bool,
}

impl Default for Rs485Config {
    fn default() -> Self {
        Self {
            serial: UartConfig {
                baudrate: RS485_DEFAULT_BAUD,
                data_bits: DataBits::Eight,
                parity: Parity::None,
                stop_bits: StopBits::One,
            },
            buffer_size: RS485_MAX_FRAME_SIZE,
            use_dma: true,
            pre_delay_us: RS485_TURNAROUND_TIME_US,
            post_delay_us: RS485_TURNAROUND_TIME_US,
            auto_direction: true,
        }
    }
}

impl Rs485Config {
    pub fn validate(&self) -> Result<()> {
        if self.serial.baudrate == 0 {
            return Err(Error::Config);
        }
        if self.buffer_size == 0 || self.buffer_size > RS485_MAX_FRAME_SIZE {
            return Err(Error::Config);
        }
        Ok(())
    }
}

/// Complete bridge configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BridgeConfig {
    pub pins: PinConfig,
    pub led: LedConfig,
    pub dmx: DmxConfig,
    pub rs485: Rs485Config,
}

impl BridgeConfig {
    /// Check the parts that do not depend on the chip
    pub fn validate(&self) -> Result<()> {
        self.pins.validate()?;
        self.led.validate()?;
        if self.dmx.baudrate == 0 {
            return Err(Error::Config);
        }
        self.rs485.validate()
    }
}
