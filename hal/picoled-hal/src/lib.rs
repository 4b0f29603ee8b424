//! PicoLED Hardware Abstraction Layer
//!
//! This crate defines the hardware seams the protocol drivers are written
//! against. Chip crates implement them for real silicon; the driver tests
//! implement them with recording doubles.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Application (picoled-firmware)         │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  picoled-drivers (WS2812, DMX, RS485)   │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  picoled-hal (this crate - traits)      │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//!             ┌───────────────┐
//!             │ picoled-hal-  │
//!             │    rp2040     │
//!             └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`gpio::OutputPin`] - Digital output (RS485 direction control)
//! - [`uart::SerialPort`] - Transmit-only UART with break control
//! - [`pixel::PixelLane`] - Timing-critical one-wire pixel output
//! - [`dma::TransferEngine`] - Optional buffer-to-peripheral data mover
//! - [`time::Monotonic`] - Microsecond timestamps for polled state machines
//! - [`claim::PeripheralClaims`] - Single-owner registry for peripherals

#![no_std]
#![deny(unsafe_code)]

pub mod claim;
pub mod dma;
pub mod gpio;
pub mod pixel;
pub mod time;
pub mod uart;

// Re-export key traits at crate root for convenience
pub use claim::{ClaimError, PeripheralClaims, PeripheralId};
pub use dma::{NoDma, TransferEngine};
pub use gpio::{Level, OutputPin};
pub use pixel::PixelLane;
pub use time::{Clock, DelayNs, Monotonic};
pub use uart::{DataBits, Parity, SerialPort, StopBits, UartConfig};
