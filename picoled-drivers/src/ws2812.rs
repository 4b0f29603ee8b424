//! WS2812 pixel driver
//!
//! Keeps a packed pixel buffer and pushes it through a [`PixelLane`].
//! Two update strategies sit behind [`Ws2812Driver::update`]:
//!
//! - Pumped: every word is written to the lane queue by the CPU, then the
//!   driver blocks for the 280µs latch interval.
//! - Transfer engine: the buffer is staged as wire words and handed to a
//!   [`TransferEngine`]; [`Ws2812Driver::service`] finishes the update
//!   once the transfer, the lane drain and the latch interval are done.
//!
//! The engine is used only if enabled in the config and a channel could
//! be claimed at initialize time.

use heapless::Vec;
use smart_leds::{SmartLedsWrite, RGB8};

use picoled_core::color::{color_to_native, native_to_color, wire_word};
use picoled_core::config::{
    LedConfig, END_WAIT_TIMEOUT_MS, MAX_LED_COUNT, WS2812_BIT_RATE_HZ, WS2812_RESET_TIME_US,
};
use picoled_core::pixels::xy_to_index;
use picoled_core::timing::ws2812_frame_time_us;
use picoled_core::{Color, ColorFormat, Error, GammaTable, PixelBuffer, Result};
use picoled_hal::{Clock, PeripheralClaims, PixelLane, TransferEngine};

use crate::deadline::Deadline;

/// WS2812 driver configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Ws2812Config {
    /// Pixels on the chain
    pub num_pixels: u16,
    /// Row length when the chain is wired as a matrix
    pub grid_width: u16,
    /// Lane order of the LEDs
    pub format: ColorFormat,
    /// Prefer the transfer engine
    pub use_dma: bool,
}

impl Default for Ws2812Config {
    fn default() -> Self {
        LedConfig::default().into()
    }
}

impl From<LedConfig> for Ws2812Config {
    fn from(led: LedConfig) -> Self {
        Self {
            num_pixels: led.num_pixels,
            grid_width: led.grid_width,
            format: led.format,
            use_dma: led.use_dma,
        }
    }
}

/// Driver status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Ws2812Status {
    #[default]
    Idle,
    Updating,
    Error,
}

/// Update counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Ws2812Stats {
    /// Completed updates
    pub updates: u32,
    /// Timed-out or aborted updates
    pub errors: u32,
}

/// Progress of an asynchronous update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    /// Transfer engine is feeding the lane
    Streaming,
    /// Last words are still shifting out
    Draining,
    /// Line held low until the LEDs latch
    Latching { since: u64 },
}

/// WS2812 pixel driver
pub struct Ws2812Driver<L, D, C> {
    lane: L,
    dma: Option<D>,
    clock: C,
    config: Ws2812Config,
    pixels: PixelBuffer,
    /// Wire words handed to the transfer engine
    staging: Vec<u32, MAX_LED_COUNT>,
    initialized: bool,
    dma_claimed: bool,
    phase: Phase,
    status: Ws2812Status,
    stats: Ws2812Stats,
}

impl<L, D, C> Ws2812Driver<L, D, C>
where
    L: PixelLane,
    D: TransferEngine<u32>,
    C: Clock,
{
    /// Create a driver; nothing touches hardware until `initialize`
    pub fn new(lane: L, dma: Option<D>, clock: C, config: Ws2812Config) -> Self {
        Self {
            lane,
            dma,
            clock,
            config,
            pixels: PixelBuffer::new(config.format),
            staging: Vec::new(),
            initialized: false,
            dma_claimed: false,
            phase: Phase::Idle,
            status: Ws2812Status::Idle,
            stats: Ws2812Stats::default(),
        }
    }

    /// Allocate the pixel buffer, claim and configure the lane
    ///
    /// Idempotent once initialized. On failure nothing stays allocated
    /// or claimed.
    pub fn initialize(&mut self, claims: &mut PeripheralClaims) -> Result<()> {
        if self.initialized {
            return Ok(());
        }

        self.pixels.allocate(self.config.num_pixels as usize)?;

        let id = self.lane.id();
        if claims.claim(id).is_err() {
            warn!("WS2812: pixel lane already claimed");
            self.pixels.release();
            return Err(Error::PeripheralClaimed);
        }

        if self
            .lane
            .configure(WS2812_BIT_RATE_HZ, self.config.format.bits_per_pixel())
            .is_err()
        {
            warn!("WS2812: pixel lane configuration failed");
            claims.release(id);
            self.pixels.release();
            return Err(Error::Config);
        }

        self.dma_claimed = match (self.config.use_dma, self.dma.as_mut()) {
            (true, Some(dma)) => dma.claim(),
            _ => false,
        };

        self.initialized = true;
        self.phase = Phase::Idle;
        self.status = Ws2812Status::Idle;
        debug!(
            "WS2812: {} pixels, transfer engine {}",
            self.config.num_pixels,
            self.dma_claimed
        );
        Ok(())
    }

    /// Finish or abort any update, release hardware and free the buffer
    pub fn end(&mut self, claims: &mut PeripheralClaims) {
        if !self.initialized {
            return;
        }

        if self.is_busy() && !self.wait_for_completion(END_WAIT_TIMEOUT_MS) {
            self.abort();
        }

        if let Some(dma) = self.dma.as_mut() {
            if self.dma_claimed {
                dma.release();
            }
        }
        self.dma_claimed = false;

        self.lane.deinit();
        claims.release(self.lane.id());
        self.pixels.release();
        self.staging.clear();
        self.initialized = false;
        self.status = Ws2812Status::Idle;
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Transfer engine is in use for updates
    pub fn dma_enabled(&self) -> bool {
        self.dma_claimed
    }

    pub fn config(&self) -> &Ws2812Config {
        &self.config
    }

    pub fn status(&self) -> Ws2812Status {
        self.status
    }

    pub fn stats(&self) -> Ws2812Stats {
        self.stats
    }

    pub fn update_count(&self) -> u32 {
        self.stats.updates
    }

    pub fn error_count(&self) -> u32 {
        self.stats.errors
    }

    pub fn reset_statistics(&mut self) {
        self.stats = Ws2812Stats::default();
    }

    pub fn pixel_count(&self) -> usize {
        self.pixels.len()
    }

    /// Packed pixel buffer for inspection and mapping
    pub fn pixels(&self) -> &PixelBuffer {
        &self.pixels
    }

    /// Packed pixel buffer for bulk edits
    pub fn pixels_mut(&mut self) -> &mut PixelBuffer {
        &mut self.pixels
    }

    /// Set one pixel; false if out of range or not initialized
    pub fn set_pixel(&mut self, index: usize, color: Color) -> bool {
        self.pixels.set(index, color)
    }

    pub fn pixel(&self, index: usize) -> Option<Color> {
        self.pixels.get(index)
    }

    pub fn grid_width(&self) -> usize {
        self.config.grid_width as usize
    }

    /// Linear index of grid cell (x, y) on the configured matrix
    pub fn xy_to_index(&self, x: usize, y: usize) -> usize {
        xy_to_index(x, y, self.grid_width())
    }

    /// Set the pixel at grid cell (x, y) of a `grid_width` wide matrix
    pub fn set_pixel_xy(&mut self, x: usize, y: usize, color: Color, grid_width: usize) -> bool {
        self.pixels.set_xy(x, y, grid_width, color)
    }

    /// Load raw channel bytes in lane order; returns pixels written
    pub fn set_pixel_data(&mut self, start: usize, data: &[u8]) -> usize {
        self.pixels.set_raw(start, data)
    }

    pub fn fill(&mut self, color: Color) {
        self.pixels.fill(color);
    }

    pub fn clear(&mut self) {
        self.pixels.clear();
    }

    /// Scale every stored pixel by `brightness / 255`
    pub fn set_brightness(&mut self, brightness: u8) {
        self.pixels.scale(brightness);
    }

    /// Gamma-correct every stored pixel; false for a non-positive gamma
    pub fn apply_gamma_correction(&mut self, gamma: f32) -> bool {
        match GammaTable::new(gamma) {
            Some(table) => {
                self.pixels.apply_gamma(&table);
                true
            }
            None => false,
        }
    }

    pub fn color_to_native(&self, color: Color) -> u32 {
        color_to_native(color, self.config.format)
    }

    pub fn native_to_color(&self, native: u32) -> Color {
        native_to_color(native, self.config.format)
    }

    /// An update is in flight
    pub fn is_busy(&self) -> bool {
        self.phase != Phase::Idle
    }

    /// Send the buffer to the LEDs
    ///
    /// Rejected while another update is in flight. Without a transfer
    /// engine the call always blocks until the frame has latched. With
    /// one it returns immediately unless `blocking` is set.
    pub fn update(&mut self, blocking: bool) -> Result<()> {
        if !self.initialized {
            return Err(Error::NotInitialized);
        }
        if self.is_busy() {
            return Err(Error::TransmissionInProgress);
        }

        if self.dma_claimed {
            self.start_transfer();
            if blocking && !self.wait_for_completion(self.update_timeout_ms()) {
                self.abort();
                return Err(Error::Timeout);
            }
            Ok(())
        } else {
            self.update_pumped()
        }
    }

    fn update_timeout_ms(&self) -> u32 {
        let frame_ms = ws2812_frame_time_us(self.pixels.len(), self.config.format) / 1000;
        END_WAIT_TIMEOUT_MS.max(frame_ms * 2)
    }

    fn start_transfer(&mut self) {
        let format = self.config.format;
        self.staging.clear();
        for &native in self.pixels.as_slice() {
            // Capacity equals the pixel buffer's
            let _ = self.staging.push(wire_word(native, format));
        }
        if let Some(dma) = self.dma.as_mut() {
            dma.start(&self.staging);
        }
        self.phase = Phase::Streaming;
        self.status = Ws2812Status::Updating;
    }

    fn update_pumped(&mut self) -> Result<()> {
        self.status = Ws2812Status::Updating;
        let deadline = Deadline::after_ms(&self.clock, self.update_timeout_ms());

        if !self.pump_words(&deadline) {
            return Err(self.fail_update());
        }

        self.clock.delay_us(WS2812_RESET_TIME_US);
        self.stats.updates = self.stats.updates.wrapping_add(1);
        self.status = Ws2812Status::Idle;
        Ok(())
    }

    /// Write every pixel to the lane and wait for it to drain
    fn pump_words(&mut self, deadline: &Deadline) -> bool {
        let format = self.config.format;
        for &native in self.pixels.as_slice() {
            while !self.lane.is_writable() {
                if deadline.expired(&self.clock) {
                    return false;
                }
            }
            self.lane.push(wire_word(native, format));
        }
        while !self.lane.is_idle() {
            if deadline.expired(&self.clock) {
                return false;
            }
        }
        true
    }

    fn fail_update(&mut self) -> Error {
        warn!("WS2812: pixel lane stalled");
        self.stats.errors = self.stats.errors.wrapping_add(1);
        self.status = Ws2812Status::Error;
        Error::Timeout
    }

    /// Advance an asynchronous update by at most one phase
    pub fn service(&mut self) {
        match self.phase {
            Phase::Idle => {}
            Phase::Streaming => {
                let (done, active) = match self.dma.as_mut() {
                    Some(dma) => (dma.take_complete(), dma.is_active()),
                    None => (false, false),
                };
                if done {
                    self.phase = Phase::Draining;
                } else if !active {
                    // Engine went quiet without reporting the transfer done
                    warn!("WS2812: transfer engine dropped the update");
                    self.stats.errors = self.stats.errors.wrapping_add(1);
                    self.status = Ws2812Status::Error;
                    self.phase = Phase::Idle;
                }
            }
            Phase::Draining => {
                if self.lane.is_idle() {
                    self.phase = Phase::Latching {
                        since: self.clock.now_micros(),
                    };
                }
            }
            Phase::Latching { since } => {
                if self.clock.elapsed_micros(since) >= WS2812_RESET_TIME_US as u64 {
                    self.phase = Phase::Idle;
                    self.status = Ws2812Status::Idle;
                    self.stats.updates = self.stats.updates.wrapping_add(1);
                }
            }
        }
    }

    /// Poll until the update finishes; false on timeout
    ///
    /// A timeout of 0 waits forever.
    pub fn wait_for_completion(&mut self, timeout_ms: u32) -> bool {
        let deadline = Deadline::after_ms(&self.clock, timeout_ms);
        loop {
            self.service();
            if !self.is_busy() {
                return true;
            }
            if deadline.expired(&self.clock) {
                return false;
            }
        }
    }

    /// Cancel an in-flight asynchronous update
    pub fn abort(&mut self) {
        if !self.is_busy() {
            return;
        }
        if let Some(dma) = self.dma.as_mut() {
            dma.abort();
        }
        warn!("WS2812: update aborted");
        self.phase = Phase::Idle;
        self.status = Ws2812Status::Idle;
        self.stats.errors = self.stats.errors.wrapping_add(1);
    }
}

impl<L, D, C> SmartLedsWrite for Ws2812Driver<L, D, C>
where
    L: PixelLane,
    D: TransferEngine<u32>,
    C: Clock,
{
    type Error = Error;
    type Color = RGB8;

    /// Load colours from index 0 and send them, blocking
    fn write<T, I>(&mut self, iterator: T) -> Result<()>
    where
        T: IntoIterator<Item = I>,
        I: Into<Self::Color>,
    {
        for (index, color) in iterator.into_iter().enumerate() {
            let rgb: RGB8 = color.into();
            self.set_pixel(index, rgb.into());
        }
        self.update(true)
    }
}
