//! Service task
//!
//! Stands in for the UART and PIO interrupt handlers: every tick advances
//! each driver's state machine by one step (FIFO refill, break/mark
//! timing, direction release).

use defmt::*;
use embassy_time::{Duration, Ticker};

use crate::bridge::{with_bridge, SharedBridge};

/// Service interval in microseconds
///
/// Short enough that the 100 µs DMX break and the 32-byte UART FIFOs
/// (1.28 ms of DMX data) never run dry for long.
pub const SERVICE_INTERVAL_US: u64 = 250;

#[embassy_executor::task]
pub async fn service_task(bridge: &'static SharedBridge) {
    info!("Service task started");

    let mut ticker = Ticker::every(Duration::from_micros(SERVICE_INTERVAL_US));

    loop {
        ticker.next().await;
        with_bridge(bridge, |b| b.service());
    }
}
