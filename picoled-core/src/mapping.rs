//! Pixel↔DMX channel mapping
//!
//! Pixel `i` occupies channels `start + 3i`, `start + 3i + 1`,
//! `start + 3i + 2` as R, G, B. Mapping stops silently at the first pixel
//! that would not fit below channel 512. A start channel of 0 or above
//! 512 maps nothing. White is not carried; pixels read back from channels
//! keep the white level they already had.

use crate::color::Color;
use crate::config::DMX_UNIVERSE_SIZE;
use crate::dmx::Universe;
use crate::pixels::PixelBuffer;

/// Channels used per pixel
pub const CHANNELS_PER_PIXEL: usize = 3;

/// Number of whole pixels that fit from `start_channel` to channel 512
pub const fn pixels_that_fit(start_channel: u16) -> usize {
    if start_channel == 0 || start_channel as usize > DMX_UNIVERSE_SIZE {
        return 0;
    }
    (DMX_UNIVERSE_SIZE - start_channel as usize + 1) / CHANNELS_PER_PIXEL
}

/// Write pixel colours into the universe; returns pixels mapped
pub fn pixels_to_channels(
    pixels: &PixelBuffer,
    universe: &mut Universe,
    start_channel: u16,
) -> usize {
    let count = pixels.len().min(pixels_that_fit(start_channel));
    for (i, color) in pixels.colors().take(count).enumerate() {
        let channel = start_channel + (i * CHANNELS_PER_PIXEL) as u16;
        universe.set_channel(channel, color.r);
        universe.set_channel(channel + 1, color.g);
        universe.set_channel(channel + 2, color.b);
    }
    count
}

/// Read pixel colours from the universe; returns pixels mapped
pub fn channels_to_pixels(
    universe: &Universe,
    pixels: &mut PixelBuffer,
    start_channel: u16,
) -> usize {
    raw_channels_to_pixels(universe.channels(), pixels, start_channel, 0)
}

/// Read pixel colours from a bare channel slice (index 0 is channel 1)
///
/// `limit` caps the number of pixels written; 0 means as many as fit.
/// Channels missing from a short slice stop the mapping.
pub fn raw_channels_to_pixels(
    channels: &[u8],
    pixels: &mut PixelBuffer,
    start_channel: u16,
    limit: usize,
) -> usize {
    let mut count = pixels.len().min(pixels_that_fit(start_channel));
    if limit > 0 {
        count = count.min(limit);
    }
    let mut mapped = 0;
    for i in 0..count {
        let offset = start_channel as usize - 1 + i * CHANNELS_PER_PIXEL;
        let Some(rgb) = channels.get(offset..offset + CHANNELS_PER_PIXEL) else {
            break;
        };
        let w = pixels.get(i).map_or(0, |old| old.w);
        pixels.set(i, Color::rgbw(rgb[0], rgb[1], rgb[2], w));
        mapped += 1;
    }
    mapped
}
