//! The bridge instance shared between tasks

use core::cell::RefCell;

use embassy_rp::peripherals::PIO0;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use picoled_drivers::PicoLed;
use picoled_hal::NoDma;
use picoled_hal_rp2040::{EmbassyClock, PioWs2812Lane, RpOutputPin, RpSerialPort};

/// State machine of PIO0 that drives the LED panel
pub const LED_STATE_MACHINE: usize = 0;

/// Concrete bridge for this board
pub type Bridge = PicoLed<
    PioWs2812Lane<'static, PIO0, LED_STATE_MACHINE>,
    NoDma,
    RpSerialPort<'static>,
    RpSerialPort<'static>,
    RpOutputPin<'static>,
    NoDma,
    EmbassyClock,
>;

/// Bridge behind a critical-section mutex
///
/// Every task touches the drivers only inside `lock`, which serializes
/// buffer copies against `service()`.
pub type SharedBridge = Mutex<CriticalSectionRawMutex, RefCell<Bridge>>;

/// Run `f` with exclusive access to the bridge
pub fn with_bridge<R>(bridge: &SharedBridge, f: impl FnOnce(&mut Bridge) -> R) -> R {
    bridge.lock(|cell| f(&mut cell.borrow_mut()))
}
