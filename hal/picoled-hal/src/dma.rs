//! Asynchronous transfer engine abstraction
//!
//! A transfer engine drains a word buffer into a peripheral FIFO without
//! per-word CPU work. Drivers treat it as optional: if none is supplied,
//! or [`TransferEngine::claim`] fails at initialize time, they fall back
//! to pumping words themselves.

/// Buffer-to-peripheral data mover
pub trait TransferEngine<W: Copy> {
    /// Reserve a channel; false when none is free
    fn claim(&mut self) -> bool;

    /// Return the channel reserved by [`TransferEngine::claim`]
    fn release(&mut self);

    /// Start draining `words` into the peripheral
    ///
    /// Implementations copy or pin the data for the transfer's duration.
    fn start(&mut self, words: &[W]);

    /// A transfer is in flight
    fn is_active(&self) -> bool;

    /// Cancel the in-flight transfer
    fn abort(&mut self);

    /// Acknowledge a finished transfer
    ///
    /// Returns true exactly once per completed transfer.
    fn take_complete(&mut self) -> bool;
}

/// Stand-in for boards without a usable transfer engine
///
/// Never claims a channel, so drivers always take the pumped path.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDma;

impl<W: Copy> TransferEngine<W> for NoDma {
    fn claim(&mut self) -> bool {
        false
    }

    fn release(&mut self) {}

    fn start(&mut self, _words: &[W]) {}

    fn is_active(&self) -> bool {
        false
    }

    fn abort(&mut self) {}

    fn take_complete(&mut self) -> bool {
        false
    }
}
