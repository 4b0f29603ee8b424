//! Timing-critical one-wire pixel output
//!
//! A pixel lane shifts colour words out MSB first, one protocol bit per
//! bit period, without CPU involvement once a word is queued. Words are
//! left-aligned: the first bit on the wire is bit 31.

/// One-wire pixel output lane (PIO state machine, SPI trick, RMT, ...)
pub trait PixelLane {
    /// Error type for configuration failures
    type Error;

    /// Identity used for ownership claims
    fn id(&self) -> crate::PeripheralId;

    /// Configure the lane for `bit_rate_hz` and start it
    ///
    /// `bits_per_pixel` is 24 or 32 and sets the autopull threshold.
    fn configure(&mut self, bit_rate_hz: u32, bits_per_pixel: u8) -> Result<(), Self::Error>;

    /// Output queue can accept another word
    fn is_writable(&self) -> bool;

    /// Queue one left-aligned word; callers check [`PixelLane::is_writable`] first
    fn push(&mut self, word: u32);

    /// Queue empty and the last bit has left the pin
    fn is_idle(&self) -> bool;

    /// Stop the lane and release the pin
    fn deinit(&mut self);
}
