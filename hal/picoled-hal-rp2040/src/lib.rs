//! RP2040 bindings of the `picoled-hal` traits
//!
//! - [`RpOutputPin`]: push-pull GPIO (RS485 driver enable)
//! - [`RpSerialPort`]: PL011 UART with runtime framing and break control
//! - [`PioWs2812Lane`]: WS2812 bit encoder on a PIO state machine
//! - [`EmbassyClock`]: `embassy-time` instant and blocking delay
//!
//! No DMA channel is bound; drivers get `picoled_hal::NoDma`.

#![no_std]

pub mod gpio;
pub mod pins;
pub mod pio;
pub mod time;
pub mod uart;

pub use gpio::RpOutputPin;
pub use pins::UartId;
pub use pio::PioWs2812Lane;
pub use time::EmbassyClock;
pub use uart::RpSerialPort;
