//! PicoLED bridge façade
//!
//! Owns one driver per protocol plus the peripheral claim registry, and
//! copies colours between the LED buffer and the DMX universe. All
//! copying happens on the caller's thread between transmissions.

use picoled_core::config::{BridgeConfig, LedConfig, PinConfig};
use picoled_core::mapping::{pixels_to_channels, raw_channels_to_pixels};
use picoled_core::{Color, Result};
use picoled_hal::{Clock, OutputPin, PeripheralClaims, PixelLane, SerialPort, TransferEngine};

use crate::dmx512::Dmx512Transmitter;
use crate::rs485::Rs485Serial;
use crate::ws2812::Ws2812Driver;

/// One of the three bridged outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Protocol {
    Led,
    Dmx,
    Rs485,
}

impl Protocol {
    const fn index(self) -> usize {
        match self {
            Protocol::Led => 0,
            Protocol::Dmx => 1,
            Protocol::Rs485 => 2,
        }
    }
}

/// Hardware handed to the bridge
pub struct BridgeParts<L, LD, DP, RP, E, RD> {
    pub led_lane: L,
    pub led_dma: Option<LD>,
    pub dmx_port: DP,
    pub rs485_port: RP,
    pub rs485_direction: Option<E>,
    pub rs485_dma: Option<RD>,
}

/// LED panel, DMX512 and RS485 outputs behind one interface
pub struct PicoLed<L, LD, DP, RP, E, RD, C> {
    led: Ws2812Driver<L, LD, C>,
    dmx: Dmx512Transmitter<DP, C>,
    rs485: Rs485Serial<RP, E, RD, C>,
    claims: PeripheralClaims,
    config: BridgeConfig,
    enabled: [bool; 3],
    initialized: bool,
}

impl<L, LD, DP, RP, E, RD, C> PicoLed<L, LD, DP, RP, E, RD, C>
where
    L: PixelLane,
    LD: TransferEngine<u32>,
    DP: SerialPort,
    RP: SerialPort,
    E: OutputPin,
    RD: TransferEngine<u8>,
    C: Clock + Clone,
{
    pub fn new(config: BridgeConfig, parts: BridgeParts<L, LD, DP, RP, E, RD>, clock: C) -> Self {
        Self {
            led: Ws2812Driver::new(
                parts.led_lane,
                parts.led_dma,
                clock.clone(),
                config.led.into(),
            ),
            dmx: Dmx512Transmitter::new(parts.dmx_port, clock.clone()),
            rs485: Rs485Serial::new(
                parts.rs485_port,
                parts.rs485_direction,
                parts.rs485_dma,
                clock,
                config.rs485,
            ),
            claims: PeripheralClaims::new(),
            config,
            enabled: [true; 3],
            initialized: false,
        }
    }

    /// Bring up every enabled protocol: LED, then DMX, then RS485
    ///
    /// If one fails, the ones already started are shut down again and
    /// the error is returned.
    pub fn begin(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        self.config.validate()?;

        for protocol in [Protocol::Led, Protocol::Dmx, Protocol::Rs485] {
            if !self.enabled[protocol.index()] {
                continue;
            }
            if let Err(e) = self.start(protocol) {
                warn!("Bridge: {} failed to start", protocol);
                self.stop_all();
                return Err(e);
            }
        }

        self.initialized = true;
        debug!("Bridge: started");
        Ok(())
    }

    /// Shut down all three protocols
    pub fn end(&mut self) {
        self.stop_all();
        self.initialized = false;
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn start(&mut self, protocol: Protocol) -> Result<()> {
        match protocol {
            Protocol::Led => self.led.initialize(&mut self.claims),
            Protocol::Dmx => {
                self.dmx
                    .initialize(&mut self.claims, self.config.dmx.baudrate)?;
                if self.config.dmx.continuous {
                    self.dmx.set_continuous_mode(true);
                }
                Ok(())
            }
            Protocol::Rs485 => self.rs485.initialize(&mut self.claims),
        }
    }

    fn stop(&mut self, protocol: Protocol) {
        match protocol {
            Protocol::Led => self.led.end(&mut self.claims),
            Protocol::Dmx => self.dmx.end(&mut self.claims),
            Protocol::Rs485 => self.rs485.end(&mut self.claims),
        }
    }

    fn stop_all(&mut self) {
        self.stop(Protocol::Led);
        self.stop(Protocol::Dmx);
        self.stop(Protocol::Rs485);
    }

    /// Turn one protocol on or off
    ///
    /// On a running bridge this starts or stops the driver right away;
    /// otherwise it decides whether `begin()` starts it.
    pub fn enable_protocol(&mut self, protocol: Protocol, enable: bool) -> Result<()> {
        if self.initialized {
            if enable {
                self.start(protocol)?;
            } else {
                self.stop(protocol);
            }
        }
        self.enabled[protocol.index()] = enable;
        Ok(())
    }

    /// Protocol is enabled, running and idle
    pub fn is_protocol_ready(&self, protocol: Protocol) -> bool {
        if !self.enabled[protocol.index()] {
            return false;
        }
        match protocol {
            Protocol::Led => self.led.is_initialized() && !self.led.is_busy(),
            Protocol::Dmx => self.dmx.is_initialized() && !self.dmx.is_busy(),
            Protocol::Rs485 => self.rs485.is_initialized() && !self.rs485.is_busy(),
        }
    }

    /// Advance every in-flight transmission
    pub fn service(&mut self) {
        self.led.service();
        self.dmx.service();
        self.rs485.service();
    }

    /// Start an LED update and a DMX frame, skipping whichever is busy
    pub fn update_all(&mut self) -> Result<()> {
        if self.is_protocol_ready(Protocol::Led) {
            self.led.update(false)?;
        }
        if self.is_protocol_ready(Protocol::Dmx) {
            self.dmx.transmit()?;
        }
        Ok(())
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn led_config(&self) -> &LedConfig {
        &self.config.led
    }

    pub fn pin_config(&self) -> &PinConfig {
        &self.config.pins
    }

    pub fn led_driver(&self) -> &Ws2812Driver<L, LD, C> {
        &self.led
    }

    pub fn dmx_transmitter(&self) -> &Dmx512Transmitter<DP, C> {
        &self.dmx
    }

    pub fn rs485_serial(&self) -> &Rs485Serial<RP, E, RD, C> {
        &self.rs485
    }

    // LED panel

    pub fn set_led(&mut self, index: usize, color: Color) -> bool {
        self.led.set_pixel(index, color)
    }

    /// Set grid cell (x, y); false outside the configured grid
    pub fn set_led_xy(&mut self, x: usize, y: usize, color: Color) -> bool {
        let led = &self.config.led;
        if x >= led.grid_width as usize || y >= led.grid_height as usize {
            return false;
        }
        self.led.set_pixel_xy(x, y, color, led.grid_width as usize)
    }

    pub fn led(&self, index: usize) -> Option<Color> {
        self.led.pixel(index)
    }

    pub fn fill_leds(&mut self, color: Color) {
        self.led.fill(color);
    }

    pub fn clear_leds(&mut self) {
        self.led.clear();
    }

    pub fn set_brightness(&mut self, brightness: u8) {
        self.led.set_brightness(brightness);
    }

    pub fn update_leds(&mut self, blocking: bool) -> Result<()> {
        self.led.update(blocking)
    }

    pub fn is_led_busy(&self) -> bool {
        self.led.is_busy()
    }

    pub fn wait_led_completion(&mut self, timeout_ms: u32) -> bool {
        self.led.wait_for_completion(timeout_ms)
    }

    // DMX512

    pub fn set_dmx_channel(&mut self, channel: u16, value: u8) -> bool {
        self.dmx.set_channel(channel, value)
    }

    pub fn dmx_channel(&self, channel: u16) -> u8 {
        self.dmx.channel(channel)
    }

    pub fn set_dmx_channel_range(&mut self, start: u16, data: &[u8]) -> bool {
        self.dmx.set_channel_range(start, data)
    }

    pub fn set_dmx_universe(&mut self, data: &[u8]) {
        self.dmx.set_universe(data);
    }

    pub fn clear_dmx_universe(&mut self) {
        self.dmx.clear_universe();
    }

    pub fn transmit_dmx(&mut self) -> Result<()> {
        self.dmx.transmit()
    }

    pub fn is_dmx_busy(&self) -> bool {
        self.dmx.is_busy()
    }

    /// The universe can change without tearing the frame on the wire
    pub fn is_dmx_between_frames(&self) -> bool {
        self.dmx.is_between_frames()
    }

    pub fn wait_dmx_completion(&mut self, timeout_ms: u32) -> bool {
        self.dmx.wait_for_completion(timeout_ms)
    }

    pub fn set_dmx_continuous(&mut self, enable: bool) {
        self.dmx.set_continuous_mode(enable);
    }

    // RS485

    pub fn send_rs485_frame(&mut self, data: &[u8], blocking: bool) -> Result<()> {
        self.rs485.send_frame(data, blocking)
    }

    pub fn send_rs485_str(&mut self, text: &str, blocking: bool) -> Result<()> {
        self.rs485.send_str(text, blocking)
    }

    pub fn is_rs485_busy(&self) -> bool {
        self.rs485.is_busy()
    }

    pub fn wait_rs485_completion(&mut self, timeout_ms: u32) -> bool {
        self.rs485.wait_for_completion(timeout_ms)
    }

    pub fn set_rs485_baud_rate(&mut self, baudrate: u32) -> Result<()> {
        self.rs485.set_baud_rate(baudrate)
    }

    // Mapping

    /// Copy LED colours into the universe from `start_channel`; returns
    /// pixels mapped
    pub fn leds_to_dmx(&mut self, start_channel: u16) -> usize {
        pixels_to_channels(self.led.pixels(), self.dmx.universe_mut(), start_channel)
    }

    /// Load LED colours from raw channel data (index 0 is channel 1)
    ///
    /// `num_leds` of 0 maps as many pixels as fit.
    pub fn dmx_to_leds(&mut self, dmx_data: &[u8], start_channel: u16, num_leds: usize) -> usize {
        raw_channels_to_pixels(dmx_data, self.led.pixels_mut(), start_channel, num_leds)
    }
}
