//! Board-agnostic core logic for the PicoLED bridge
//!
//! This crate contains everything that does not touch hardware:
//!
//! - Error taxonomy shared by all drivers
//! - Configuration constants and config types
//! - Colour lane-order packing, brightness and gamma
//! - The packed pixel buffer and the 513-byte DMX universe
//! - Pixel↔DMX channel mapping
//! - RS485 preamble/postamble framing
//! - Serial line timing math

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

pub mod color;
pub mod config;
pub mod dmx;
pub mod error;
pub mod frame;
pub mod mapping;
pub mod pixels;
pub mod timing;

pub use color::{Color, ColorFormat, GammaTable};
pub use dmx::Universe;
pub use error::{Error, Result};
pub use frame::FrameFormat;
pub use pixels::PixelBuffer;
