//! Board configuration generated from bridge.toml
//!
//! Provides `BRIDGE_CONFIG`, the UART assignment of each serial output and
//! the pin-selection macros (`led_pin!`, `dmx_uart!`, `dmx_tx_pin!`,
//! `rs485_uart!`, `rs485_tx_pin!`, `rs485_enable_pin!`) that pick the
//! matching fields out of `embassy_rp::Peripherals`.

include!(concat!(env!("OUT_DIR"), "/bridge_config.rs"));
