//! Status reports over RS485
//!
//! Once per second the driver statistics are encoded with postcard and
//! COBS so a listener can resynchronise on the zero delimiter.

use defmt::*;
use embassy_time::{Duration, Instant, Ticker};
use serde::Serialize;

use crate::bridge::{with_bridge, Bridge, SharedBridge};

/// Report interval in milliseconds
pub const TELEMETRY_INTERVAL_MS: u64 = 1000;

/// Encoded report buffer (worst-case varints plus COBS overhead)
const REPORT_BUFFER_SIZE: usize = 64;

/// One status report
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Telemetry {
    pub uptime_ms: u32,
    pub led_updates: u32,
    pub led_errors: u32,
    pub dmx_frames: u32,
    pub dmx_errors: u32,
    pub rs485_frames: u32,
    pub rs485_errors: u32,
}

impl Telemetry {
    fn collect(bridge: &Bridge, uptime_ms: u32) -> Self {
        let led = bridge.led_driver();
        let dmx = bridge.dmx_transmitter();
        let rs485 = bridge.rs485_serial();
        Self {
            uptime_ms,
            led_updates: led.update_count(),
            led_errors: led.error_count(),
            dmx_frames: dmx.frame_count(),
            dmx_errors: dmx.error_count(),
            rs485_frames: rs485.frames_sent(),
            rs485_errors: rs485.error_count(),
        }
    }
}

#[embassy_executor::task]
pub async fn telemetry_task(bridge: &'static SharedBridge) {
    info!("Telemetry task started");

    let mut ticker = Ticker::every(Duration::from_millis(TELEMETRY_INTERVAL_MS));
    let start = Instant::now();
    let mut buffer = [0u8; REPORT_BUFFER_SIZE];

    loop {
        ticker.next().await;
        let uptime_ms = start.elapsed().as_millis() as u32;

        with_bridge(bridge, |b| {
            if b.is_rs485_busy() {
                debug!("RS485 busy, skipping report");
                return;
            }
            let report = Telemetry::collect(b, uptime_ms);
            match postcard::to_slice_cobs(&report, &mut buffer) {
                Ok(bytes) => {
                    if let Err(e) = b.send_rs485_frame(bytes, false) {
                        warn!("Telemetry send failed: {}", e);
                    }
                }
                Err(_) => warn!("Telemetry encode failed"),
            }
        });
    }
}
