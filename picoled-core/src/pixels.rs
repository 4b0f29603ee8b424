//! Packed pixel buffer
//!
//! Owns one native word per LED. Storage is a fixed-capacity vector sized
//! to [`MAX_LED_COUNT`]; `allocate` sets the live length once and it does
//! not change until `release`.

use heapless::Vec;

use crate::color::{color_to_native, native_to_color, Color, ColorFormat, GammaTable};
use crate::config::MAX_LED_COUNT;
use crate::error::{Error, Result};

/// Linear index of grid cell (x, y), row-major, 0-based
pub const fn xy_to_index(x: usize, y: usize, grid_width: usize) -> usize {
    y * grid_width + x
}

/// Fixed-length array of packed colours
#[derive(Clone)]
pub struct PixelBuffer {
    pixels: Vec<u32, MAX_LED_COUNT>,
    format: ColorFormat,
}

impl PixelBuffer {
    /// Create an unallocated buffer for `format`
    pub const fn new(format: ColorFormat) -> Self {
        Self {
            pixels: Vec::new(),
            format,
        }
    }

    /// Size the buffer to `count` zeroed pixels
    pub fn allocate(&mut self, count: usize) -> Result<()> {
        if count == 0 || count > MAX_LED_COUNT {
            return Err(Error::Config);
        }
        self.pixels.clear();
        self.pixels.resize(count, 0).map_err(|_| Error::Config)
    }

    /// Drop all pixels
    pub fn release(&mut self) {
        self.pixels.clear();
    }

    pub fn is_allocated(&self) -> bool {
        !self.pixels.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn format(&self) -> ColorFormat {
        self.format
    }

    /// Set one pixel; false if `index` is out of range
    pub fn set(&mut self, index: usize, color: Color) -> bool {
        match self.pixels.get_mut(index) {
            Some(slot) => {
                *slot = color_to_native(color, self.format);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, index: usize) -> Option<Color> {
        self.pixels
            .get(index)
            .map(|&native| native_to_color(native, self.format))
    }

    /// Set the pixel at grid cell (x, y)
    pub fn set_xy(&mut self, x: usize, y: usize, grid_width: usize, color: Color) -> bool {
        self.set(xy_to_index(x, y, grid_width), color)
    }

    pub fn fill(&mut self, color: Color) {
        let native = color_to_native(color, self.format);
        self.pixels.iter_mut().for_each(|p| *p = native);
    }

    pub fn clear(&mut self) {
        self.pixels.iter_mut().for_each(|p| *p = 0);
    }

    /// Load raw channel bytes in the buffer's lane order, starting at `start`
    ///
    /// Three bytes per pixel (`r g b` or `g r b`), four for RGBW
    /// (`r g b w`). Pixels past the end and a trailing partial pixel are
    /// ignored. Returns the number of pixels written.
    pub fn set_raw(&mut self, start: usize, data: &[u8]) -> usize {
        if start > self.pixels.len() {
            return 0;
        }
        let format = self.format;
        let mut written = 0;
        for (slot, chunk) in self.pixels[start..]
            .iter_mut()
            .zip(data.chunks_exact(format.channels()))
        {
            let color = match format {
                ColorFormat::Rgb => Color::rgb(chunk[0], chunk[1], chunk[2]),
                ColorFormat::Grb => Color::rgb(chunk[1], chunk[0], chunk[2]),
                ColorFormat::Rgbw => Color::rgbw(chunk[0], chunk[1], chunk[2], chunk[3]),
            };
            *slot = color_to_native(color, format);
            written += 1;
        }
        written
    }

    /// Scale every stored pixel by `brightness / 255`
    pub fn scale(&mut self, brightness: u8) {
        self.map_colors(|c| c.scaled(brightness));
    }

    /// Run every stored pixel through a gamma curve
    pub fn apply_gamma(&mut self, table: &GammaTable) {
        self.map_colors(|c| table.apply_color(c));
    }

    fn map_colors(&mut self, mut f: impl FnMut(Color) -> Color) {
        let format = self.format;
        for native in self.pixels.iter_mut() {
            *native = color_to_native(f(native_to_color(*native, format)), format);
        }
    }

    /// Raw native words
    pub fn as_slice(&self) -> &[u32] {
        &self.pixels
    }

    /// Unpacked colours in index order
    pub fn colors(&self) -> impl Iterator<Item = Color> + '_ {
        self.pixels
            .iter()
            .map(move |&native| native_to_color(native, self.format))
    }
}
