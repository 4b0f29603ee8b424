//! PL011 UART transmitter
//!
//! `embassy_rp::uart::UartTx` routes the pin and powers the block; the
//! line format, break bit, FIFO status and TX interrupt mask are then
//! driven through the PAC so the drivers can reframe the port at runtime
//! and hold the line low for a DMX break.

use embassy_rp::pac;
use embassy_rp::uart::{Blocking, UartTx};
use picoled_hal::{DataBits, Parity, PeripheralId, SerialPort, StopBits, UartConfig};

use crate::pins::UartId;

/// UART setup failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UartError {
    /// Baud rate is zero or outside the divider range
    InvalidBaudRate,
}

/// Integer and fractional baud divisors for `baudrate` at `clk_peri`
///
/// Returns `(ibrd, fbrd, actual_baud)`.
pub fn baud_divisors(clk_peri: u32, baudrate: u32) -> Option<(u16, u8, u32)> {
    if baudrate == 0 || clk_peri == 0 {
        return None;
    }
    let div = 8 * clk_peri as u64 / baudrate as u64;
    let (ibrd, fbrd) = match div >> 7 {
        0 => (1, 0),
        i if i >= 0xFFFF => (0xFFFF, 0),
        i => (i, ((div & 0x7F) + 1) / 2),
    };
    let actual = (4 * clk_peri as u64) / (64 * ibrd + fbrd);
    Some((ibrd as u16, fbrd as u8, actual as u32))
}

/// Blocking UART TX with register-level control
pub struct RpSerialPort<'d> {
    _tx: UartTx<'d, Blocking>,
    uart: UartId,
}

impl<'d> RpSerialPort<'d> {
    /// Wrap a TX half already bound to its pin
    pub fn new(tx: UartTx<'d, Blocking>, uart: UartId) -> Self {
        Self { _tx: tx, uart }
    }

    fn regs(&self) -> pac::uart::Uart {
        match self.uart {
            UartId::Uart0 => pac::UART0,
            UartId::Uart1 => pac::UART1,
        }
    }

    fn write_divisors(&self, baudrate: u32) -> Result<u32, UartError> {
        let clk = embassy_rp::clocks::clk_peri_freq();
        let (ibrd, fbrd, actual) =
            baud_divisors(clk, baudrate).ok_or(UartError::InvalidBaudRate)?;
        let r = self.regs();
        r.uartibrd().write(|w| w.set_baud_divint(ibrd));
        r.uartfbrd().write(|w| w.set_baud_divfrac(fbrd));
        Ok(actual)
    }

    fn wait_idle(&self) {
        while self.regs().uartfr().read().busy() {}
    }
}

impl SerialPort for RpSerialPort<'_> {
    type Error = UartError;

    fn id(&self) -> PeripheralId {
        PeripheralId::Uart(self.uart.index())
    }

    fn configure(&mut self, config: &UartConfig) -> Result<u32, UartError> {
        self.wait_idle();
        let r = self.regs();
        r.uartcr().modify(|w| w.set_uarten(false));

        let actual = self.write_divisors(config.baudrate)?;
        // Line control write also latches the divisors
        r.uartlcr_h().write(|w| {
            w.set_wlen(match config.data_bits {
                DataBits::Seven => 0b10,
                DataBits::Eight => 0b11,
            });
            w.set_stp2(config.stop_bits == StopBits::Two);
            w.set_pen(config.parity != Parity::None);
            w.set_eps(config.parity == Parity::Even);
            w.set_fen(true);
        });

        r.uartcr().modify(|w| {
            w.set_uarten(true);
            w.set_txe(true);
        });
        Ok(actual)
    }

    fn set_baudrate(&mut self, baudrate: u32) -> Result<u32, UartError> {
        self.wait_idle();
        let r = self.regs();
        r.uartcr().modify(|w| w.set_uarten(false));
        let actual = self.write_divisors(baudrate)?;
        r.uartlcr_h().modify(|_| {});
        r.uartcr().modify(|w| w.set_uarten(true));
        Ok(actual)
    }

    fn is_writable(&self) -> bool {
        !self.regs().uartfr().read().txff()
    }

    fn write_byte(&mut self, byte: u8) {
        self.regs().uartdr().write(|w| w.set_data(byte));
    }

    fn is_idle(&self) -> bool {
        let fr = self.regs().uartfr().read();
        fr.txfe() && !fr.busy()
    }

    fn set_break(&mut self, asserted: bool) {
        self.regs().uartlcr_h().modify(|w| w.set_brk(asserted));
    }

    fn set_tx_interrupt(&mut self, enabled: bool) {
        self.regs().uartimsc().modify(|w| w.set_txim(enabled));
    }

    fn deinit(&mut self) {
        self.wait_idle();
        let r = self.regs();
        r.uartimsc().modify(|w| w.set_txim(false));
        r.uartlcr_h().modify(|w| w.set_brk(false));
        r.uartcr().modify(|w| w.set_uarten(false));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baud_divisors() {
        // 125 MHz peripheral clock
        let (ibrd, fbrd, actual) = baud_divisors(125_000_000, 250_000).unwrap();
        assert_eq!((ibrd, fbrd), (31, 16));
        assert_eq!(actual, 250_000);

        let (ibrd, _, actual) = baud_divisors(125_000_000, 115_200).unwrap();
        assert_eq!(ibrd, 67);
        assert!(actual.abs_diff(115_200) < 100);

        assert!(baud_divisors(125_000_000, 0).is_none());
    }
}
