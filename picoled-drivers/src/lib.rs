//! Protocol driver implementations
//!
//! Each driver is generic over the `picoled-hal` traits and owns its
//! peripheral exclusively between `initialize()` and `end()`:
//!
//! - WS2812 pixel driver (PIO lane, optional transfer engine)
//! - DMX512 transmitter (break / mark-after-break / 513 data bytes)
//! - RS485 simplex serial driver (direction control, framing)
//! - `PicoLed` bridge façade that owns all three and maps pixels to DMX
//!
//! In-flight transmissions advance only when `service()` is called, from
//! an interrupt handler or a polling task. Blocking calls poll it
//! themselves.

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

#[macro_use]
mod log;

mod deadline;

pub mod bridge;
pub mod dmx512;
pub mod rs485;
pub mod ws2812;

#[cfg(test)]
pub(crate) mod mock;

pub use bridge::{PicoLed, Protocol};
pub use dmx512::{Dmx512Transmitter, DmxState, DmxStats};
pub use rs485::{Rs485Serial, Rs485State, Rs485Stats};
pub use ws2812::{Ws2812Config, Ws2812Driver, Ws2812Stats, Ws2812Status};
