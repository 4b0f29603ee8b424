//! DMX/LED sync demo
//!
//! Sweeps a coloured column across the panel and mirrors the panel into
//! the DMX universe from channel 1, three channels per pixel. Each tick
//! starts one DMX frame through `update_all()`, so bridge.toml keeps
//! continuous mode off for this demo.

use defmt::*;
use embassy_time::{Duration, Ticker};
use picoled_core::Color;

use crate::bridge::{with_bridge, Bridge, SharedBridge};

/// Frame interval in milliseconds (40 fps)
pub const FRAME_INTERVAL_MS: u64 = 25;

/// First DMX channel that receives pixel data
pub const DMX_START_CHANNEL: u16 = 1;

#[embassy_executor::task]
pub async fn sync_task(bridge: &'static SharedBridge) {
    info!("Sync task started");

    let mut ticker = Ticker::every(Duration::from_millis(FRAME_INTERVAL_MS));
    let mut step: u32 = 0;

    loop {
        ticker.next().await;
        with_bridge(bridge, |b| render_step(b, step));
        step = step.wrapping_add(1);
    }
}

fn render_step(bridge: &mut Bridge, step: u32) {
    if bridge.is_led_busy() {
        return;
    }

    let width = bridge.led_config().grid_width as u32;
    let height = bridge.led_config().grid_height as usize;
    let column = (step % width) as usize;
    let color = wheel((step / width).wrapping_mul(16) as u8);

    bridge.clear_leds();
    for y in 0..height {
        bridge.set_led_xy(column, y, color);
    }

    // The transmitter reads the universe live; copy between frames only
    if bridge.is_dmx_between_frames() {
        bridge.leds_to_dmx(DMX_START_CHANNEL);
    }

    if let Err(e) = bridge.update_all() {
        warn!("Bridge update failed: {}", e);
    }
}

/// Hue wheel: red → green → blue → red over 0..=255
fn wheel(pos: u8) -> Color {
    match pos {
        0..=84 => Color::rgb(255 - pos * 3, pos * 3, 0),
        85..=169 => {
            let p = pos - 85;
            Color::rgb(0, 255 - p * 3, p * 3)
        }
        _ => {
            let p = pos - 170;
            Color::rgb(p * 3, 0, 255 - p * 3)
        }
    }
}
