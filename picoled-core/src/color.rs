//! Colour lane-order packing
//!
//! Pixels are stored as one `u32` per LED in the strip's native lane
//! order, right-aligned:
//!
//! - `Rgb`:  `r << 16 | g << 8 | b`
//! - `Grb`:  `g << 16 | r << 8 | b` (WS2812 native)
//! - `Rgbw`: `w << 24 | r << 16 | g << 8 | b`
//!
//! The pixel lane shifts MSB first, so 24-bit words are moved to the top
//! of the register before they are queued (see [`wire_word`]).

use smart_leds::RGB8;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Byte arrangement of a packed pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ColorFormat {
    Rgb,
    #[default]
    Grb,
    Rgbw,
}

impl ColorFormat {
    /// Colour channels (bytes) per pixel
    pub const fn channels(self) -> usize {
        match self {
            ColorFormat::Rgb | ColorFormat::Grb => 3,
            ColorFormat::Rgbw => 4,
        }
    }

    /// Bits shifted out per pixel
    pub const fn bits_per_pixel(self) -> u8 {
        (self.channels() * 8) as u8
    }
}

/// Unpacked pixel colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    /// White channel, ignored by three-channel formats
    pub w: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, w: 0 }
    }

    pub const fn rgbw(r: u8, g: u8, b: u8, w: u8) -> Self {
        Self { r, g, b, w }
    }

    /// Scale every channel by `brightness / 255`
    pub const fn scaled(self, brightness: u8) -> Self {
        Self {
            r: scale_channel(self.r, brightness),
            g: scale_channel(self.g, brightness),
            b: scale_channel(self.b, brightness),
            w: scale_channel(self.w, brightness),
        }
    }
}

impl From<RGB8> for Color {
    fn from(c: RGB8) -> Self {
        Color::rgb(c.r, c.g, c.b)
    }
}

impl From<Color> for RGB8 {
    fn from(c: Color) -> Self {
        RGB8::new(c.r, c.g, c.b)
    }
}

/// Pack a colour into the native word for `format`
pub const fn color_to_native(color: Color, format: ColorFormat) -> u32 {
    let (r, g, b, w) = (
        color.r as u32,
        color.g as u32,
        color.b as u32,
        color.w as u32,
    );
    match format {
        ColorFormat::Rgb => (r << 16) | (g << 8) | b,
        ColorFormat::Grb => (g << 16) | (r << 8) | b,
        ColorFormat::Rgbw => (w << 24) | (r << 16) | (g << 8) | b,
    }
}

/// Unpack a native word; `w` is 0 for three-channel formats
pub const fn native_to_color(native: u32, format: ColorFormat) -> Color {
    match format {
        ColorFormat::Rgb => Color::rgb(lane(native, 16), lane(native, 8), lane(native, 0)),
        ColorFormat::Grb => Color::rgb(lane(native, 8), lane(native, 16), lane(native, 0)),
        ColorFormat::Rgbw => Color::rgbw(
            lane(native, 16),
            lane(native, 8),
            lane(native, 0),
            lane(native, 24),
        ),
    }
}

const fn lane(native: u32, shift: u32) -> u8 {
    ((native >> shift) & 0xFF) as u8
}

/// Left-align a native word for an MSB-first lane
pub const fn wire_word(native: u32, format: ColorFormat) -> u32 {
    match format {
        ColorFormat::Rgb | ColorFormat::Grb => native << 8,
        ColorFormat::Rgbw => native,
    }
}

/// `value * brightness / 255`
pub const fn scale_channel(value: u8, brightness: u8) -> u8 {
    ((value as u16 * brightness as u16) / 255) as u8
}

/// Precomputed gamma curve: `round((i / 255) ^ gamma * 255)`
#[derive(Clone)]
pub struct GammaTable {
    table: [u8; 256],
}

impl GammaTable {
    /// Build the curve for `gamma`
    ///
    /// Returns `None` unless `gamma` is finite and positive.
    pub fn new(gamma: f32) -> Option<Self> {
        if !gamma.is_finite() || gamma <= 0.0 {
            return None;
        }
        let mut table = [0u8; 256];
        for (i, entry) in table.iter_mut().enumerate() {
            let normalized = i as f32 / 255.0;
            let corrected = libm::powf(normalized, gamma) * 255.0 + 0.5;
            *entry = corrected.clamp(0.0, 255.0) as u8;
        }
        Some(Self { table })
    }

    /// Corrected value for one channel
    pub fn apply(&self, value: u8) -> u8 {
        self.table[value as usize]
    }

    /// Correct every channel of a colour
    pub fn apply_color(&self, color: Color) -> Color {
        Color::rgbw(
            self.apply(color.r),
            self.apply(color.g),
            self.apply(color.b),
            self.apply(color.w),
        )
    }
}
