//! RP2040 pin capabilities
//!
//! Pin numbers come from `bridge.toml`. The firmware build script
//! compiles this file in through `#[path]` and validates against it, so
//! it stays free of target-only dependencies.

/// User GPIOs on bank 0
pub const GPIO_COUNT: u8 = 30;

/// UART peripheral identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UartId {
    Uart0,
    Uart1,
}

impl UartId {
    pub const fn index(self) -> u8 {
        match self {
            UartId::Uart0 => 0,
            UartId::Uart1 => 1,
        }
    }
}

/// UART whose TX function is routed to `gpio`
pub fn gpio_to_uart(gpio: u8) -> Option<UartId> {
    match gpio {
        0 | 12 | 16 | 28 => Some(UartId::Uart0),
        4 | 8 | 20 | 24 => Some(UartId::Uart1),
        _ => None,
    }
}

/// Pin exists on bank 0
pub fn is_valid_gpio(gpio: u8) -> bool {
    gpio < GPIO_COUNT
}
