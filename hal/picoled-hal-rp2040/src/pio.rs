//! WS2812 bit encoder on a PIO state machine
//!
//! Each bit is 10 PIO cycles: 2 high, then 5 high-or-low depending on the
//! data bit, then 3 low. At 800 kHz that puts the state machine at 8 MHz.
//! Words are pulled MSB first with autopull at 24 bits (GRB/RGB) or 32
//! bits (RGBW).

use embassy_rp::pio::{
    Common, Config, Direction, FifoJoin, Instance, PioPin, ShiftConfig, ShiftDirection,
    StateMachine,
};
use embassy_rp::{pac, Peri};
use fixed::types::U24F8;
use picoled_hal::{PeripheralId, PixelLane};

/// High time before the data bit
const T1: u32 = 2;
/// Data bit time
const T2: u32 = 5;
/// Low time after the data bit
const T3: u32 = 3;
pub const CYCLES_PER_BIT: u32 = T1 + T2 + T3;

/// Lane configuration failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LaneError {
    InvalidBitRate,
    InvalidBitsPerPixel,
}

/// State machine clock divider for `bit_rate_hz`, computed in kHz
pub fn clock_divider(clk_sys_hz: u32, bit_rate_hz: u32) -> Option<U24F8> {
    let bit_khz = bit_rate_hz / 1_000;
    if bit_khz == 0 {
        return None;
    }
    let clock = U24F8::from_num(clk_sys_hz / 1_000);
    let cycles = U24F8::from_num(bit_khz * CYCLES_PER_BIT);
    Some(clock / cycles)
}

/// Queue empty and the state machine stalled waiting for its next word
///
/// The stall only happens once the output shift register ran dry, so it
/// marks the last bit as sent rather than merely queued.
fn lane_drained(txempty: u8, txstall: u8, sm: usize) -> bool {
    let bit = 1 << sm;
    txempty & bit != 0 && txstall & bit != 0
}

/// WS2812 output on one PIO state machine
pub struct PioWs2812Lane<'d, P: Instance, const SM: usize> {
    sm: StateMachine<'d, P, SM>,
    cfg: Config<'d, P>,
    block: u8,
}

impl<'d, P: Instance, const SM: usize> PioWs2812Lane<'d, P, SM> {
    /// Load the encoder program and bind `pin`; the state machine stays
    /// disabled until `configure`
    ///
    /// `block` is the PIO block index (0 or 1) of `P`.
    pub fn new(
        common: &mut Common<'d, P>,
        mut sm: StateMachine<'d, P, SM>,
        pin: Peri<'d, impl PioPin>,
        block: u8,
    ) -> Self {
        let prg = pio::pio_asm!(
            ".side_set 1",
            ".wrap_target",
            "bitloop:",
            "    out x, 1        side 0 [2]",
            "    jmp !x do_zero  side 1 [1]",
            "    jmp bitloop     side 1 [4]",
            "do_zero:",
            "    nop             side 0 [4]",
            ".wrap"
        );
        let installed = common.load_program(&prg.program);
        let out_pin = common.make_pio_pin(pin);

        let mut cfg = Config::default();
        cfg.use_program(&installed, &[&out_pin]);
        cfg.fifo_join = FifoJoin::TxOnly;

        sm.set_pin_dirs(Direction::Out, &[&out_pin]);
        sm.set_enable(false);

        Self { sm, cfg, block }
    }

    fn pio(&self) -> pac::pio::Pio {
        if self.block == 0 {
            pac::PIO0
        } else {
            pac::PIO1
        }
    }

    /// FIFO status bits for this state machine
    fn fstat(&self) -> pac::pio::regs::Fstat {
        self.pio().fstat().read()
    }
}

impl<P: Instance, const SM: usize> PixelLane for PioWs2812Lane<'_, P, SM> {
    type Error = LaneError;

    fn id(&self) -> PeripheralId {
        PeripheralId::PixelLane {
            block: self.block,
            lane: SM as u8,
        }
    }

    fn configure(&mut self, bit_rate_hz: u32, bits_per_pixel: u8) -> Result<(), LaneError> {
        if bits_per_pixel != 24 && bits_per_pixel != 32 {
            return Err(LaneError::InvalidBitsPerPixel);
        }
        let divider = clock_divider(embassy_rp::clocks::clk_sys_freq(), bit_rate_hz)
            .ok_or(LaneError::InvalidBitRate)?;

        self.cfg.clock_divider = divider;
        self.cfg.shift_out = ShiftConfig {
            auto_fill: true,
            threshold: bits_per_pixel,
            direction: ShiftDirection::Left,
        };

        self.sm.set_enable(false);
        self.sm.set_config(&self.cfg);
        self.sm.set_enable(true);
        Ok(())
    }

    fn is_writable(&self) -> bool {
        self.fstat().txfull() & (1 << SM) == 0
    }

    fn push(&mut self, word: u32) {
        self.sm.tx().push(word);
        // TXSTALL is sticky; drop the one left by the previous idle period
        self.pio()
            .fdebug()
            .write(|w| w.set_txstall(1 << SM as u8));
    }

    fn is_idle(&self) -> bool {
        let txstall = self.pio().fdebug().read().txstall();
        lane_drained(self.fstat().txempty(), txstall, SM)
    }

    fn deinit(&mut self) {
        self.sm.set_enable(false);
        self.sm.clear_fifos();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_divider() {
        // 125 MHz / (800 kHz * 10) = 15.625
        let div = clock_divider(125_000_000, 800_000).unwrap();
        assert_eq!(div, U24F8::from_num(15.625));
        assert!(clock_divider(125_000_000, 0).is_none());
    }

    #[test]
    fn test_drained_needs_stall() {
        // Queue empty while the last word still shifts out
        assert!(!lane_drained(0b0001, 0b0000, 0));
        assert!(lane_drained(0b0001, 0b0001, 0));
        // Stalled with words queued cannot happen, but is not idle
        assert!(!lane_drained(0b0000, 0b0001, 0));
        // Other state machines' bits do not count
        assert!(!lane_drained(0b1101, 0b1101, 1));
        assert!(lane_drained(0b1000, 0b1000, 3));
    }
}
