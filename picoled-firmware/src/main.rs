//! PicoLED - WS2812 / DMX512 / RS485 bridge firmware
//!
//! Main firmware binary for RP2040 boards. Pins, panel geometry and serial
//! framing come from bridge.toml, validated and compiled in by build.rs.

#![no_std]
#![no_main]

use core::cell::RefCell;

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::bind_interrupts;
use embassy_rp::peripherals::PIO0;
use embassy_rp::pio::{InterruptHandler as PioInterruptHandler, Pio};
use embassy_rp::uart::{Config as UartConfig, UartTx};
use embassy_sync::blocking_mutex::Mutex;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use picoled_drivers::bridge::BridgeParts;
use picoled_drivers::PicoLed;
use picoled_hal_rp2040::{EmbassyClock, PioWs2812Lane, RpOutputPin, RpSerialPort};

#[macro_use]
mod board;
mod bridge;
mod tasks;

use crate::board::{BRIDGE_CONFIG, DMX_UART, RS485_UART};
use crate::bridge::{with_bridge, Bridge, SharedBridge, LED_STATE_MACHINE};

bind_interrupts!(struct Irqs {
    PIO0_IRQ_0 => PioInterruptHandler<PIO0>;
});

/// PIO0 block index for the lane's FIFO status reads
const PIO0_BLOCK: u8 = 0;

static BRIDGE: StaticCell<SharedBridge> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("PicoLED firmware starting...");

    let p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    let config = BRIDGE_CONFIG;
    info!(
        "Bridge config: {} LEDs ({}x{}), LED pin {}, DMX pin {}, RS485 pin {}",
        config.led.num_pixels,
        config.led.grid_width,
        config.led.grid_height,
        config.pins.led_panel_pin,
        config.pins.dmx512_pin,
        config.pins.rs485_data_pin
    );

    // LED panel on PIO0 state machine 0
    let Pio {
        mut common, sm0, ..
    } = Pio::new(p.PIO0, Irqs);
    let led_lane: PioWs2812Lane<'static, PIO0, LED_STATE_MACHINE> =
        PioWs2812Lane::new(&mut common, sm0, led_pin!(p), PIO0_BLOCK);

    // Serial outputs: TX halves only, framing is applied by the drivers
    let dmx_tx = UartTx::new_blocking(dmx_uart!(p), dmx_tx_pin!(p), UartConfig::default());
    let rs485_tx = UartTx::new_blocking(rs485_uart!(p), rs485_tx_pin!(p), UartConfig::default());
    let rs485_direction: Option<RpOutputPin<'static>> = rs485_enable_pin!(p);

    let parts = BridgeParts {
        led_lane,
        led_dma: None,
        dmx_port: RpSerialPort::new(dmx_tx, DMX_UART),
        rs485_port: RpSerialPort::new(rs485_tx, RS485_UART),
        rs485_direction,
        rs485_dma: None,
    };

    let mut picoled: Bridge = PicoLed::new(config, parts, EmbassyClock);
    if let Err(e) = picoled.begin() {
        // Nothing useful can run without the outputs; park here
        error!("Bridge initialization failed: {}", e);
        loop {
            embassy_time::Timer::after_secs(60).await;
        }
    }
    info!("Bridge initialized");

    if let Err(e) = picoled.send_rs485_str("PicoLED ready\n", true) {
        warn!("RS485 greeting failed: {}", e);
    }

    let bridge = BRIDGE.init(Mutex::new(RefCell::new(picoled)));

    spawner.spawn(tasks::service_task(bridge)).unwrap();
    spawner.spawn(tasks::sync_task(bridge)).unwrap();
    spawner.spawn(tasks::telemetry_task(bridge)).unwrap();

    info!("All tasks spawned, firmware running");

    loop {
        embassy_time::Timer::after_secs(60).await;
        let (led, dmx) = with_bridge(bridge, |b| {
            (b.led_driver().update_count(), b.dmx_transmitter().frame_count())
        });
        trace!("Heartbeat: {} LED updates, {} DMX frames", led, dmx);
    }
}
