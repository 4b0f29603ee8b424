//! Serial line timing
//!
//! Used for blocking-send timeouts, transmission-time estimates and the
//! continuous DMX frame period.

use picoled_hal::uart::UartConfig;

use crate::color::ColorFormat;
use crate::config::{
    DMX_BREAK_TIME_US, DMX_FRAME_SIZE, DMX_MARK_TIME_US, WS2812_BIT_RATE_HZ, WS2812_RESET_TIME_US,
};

/// Time on the wire for one character, rounded up
pub fn byte_time_us(config: &UartConfig) -> u32 {
    if config.baudrate == 0 {
        return 0;
    }
    (config.bits_per_char() * 1_000_000).div_ceil(config.baudrate)
}

/// Time on the wire for `len` characters
pub fn transmission_time_us(config: &UartConfig, len: usize) -> u32 {
    if config.baudrate == 0 {
        return 0;
    }
    let bits = config.bits_per_char() as u64 * len as u64;
    (bits * 1_000_000).div_ceil(config.baudrate as u64) as u32
}

/// Break, mark-after-break and a full 513-byte frame at `baudrate`
pub fn dmx_frame_time_us(baudrate: u32) -> u32 {
    let line = UartConfig {
        baudrate,
        ..UartConfig::dmx()
    };
    let data = transmission_time_us(&line, DMX_FRAME_SIZE);
    DMX_BREAK_TIME_US + DMX_MARK_TIME_US + data
}

/// Shift-out time for `pixels` LEDs plus the latch interval
pub fn ws2812_frame_time_us(pixels: usize, format: ColorFormat) -> u32 {
    let bits = pixels as u64 * format.bits_per_pixel() as u64;
    let shift = (bits * 1_000_000).div_ceil(WS2812_BIT_RATE_HZ as u64) as u32;
    shift + WS2812_RESET_TIME_US
}

#[cfg(test)]
mod tests {
    use super::*;
    use picoled_hal::uart::{DataBits, Parity, StopBits};

    #[test]
    fn test_byte_time() {
        // 8N1 at 115200: 10 bits = 86.8us
        assert_eq!(byte_time_us(&UartConfig::default()), 87);
        // 8N2 at 250k: 11 bits = 44us
        assert_eq!(byte_time_us(&UartConfig::dmx()), 44);

        let odd = UartConfig {
            baudrate: 9600,
            data_bits: DataBits::Seven,
            parity: Parity::Odd,
            stop_bits: StopBits::Two,
        };
        // 1 + 7 + 2 + 1 = 11 bits
        assert_eq!(odd.bits_per_char(), 11);
    }

    #[test]
    fn test_transmission_time() {
        assert_eq!(transmission_time_us(&UartConfig::default(), 0), 0);
        // 100 bytes * 10 bits at 115200 = 8680.5us
        assert_eq!(transmission_time_us(&UartConfig::default(), 100), 8681);
    }

    #[test]
    fn test_dmx_frame_time_under_refresh_limit() {
        // 100 + 12 + 513 * 44
        let frame = dmx_frame_time_us(250_000);
        assert_eq!(frame, 22_684);
        assert!(1_000_000 / frame >= crate::config::DMX_REFRESH_RATE_HZ);
    }

    #[test]
    fn test_ws2812_frame_time() {
        // 256 * 24 bits at 800kHz = 7680us
        assert_eq!(ws2812_frame_time_us(256, ColorFormat::Grb), 7680 + 280);
    }
}
