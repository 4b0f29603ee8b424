//! Peripheral ownership tracking
//!
//! Each driver instance must be the only user of its serial port, pixel
//! lane and transfer channel. Drivers claim their peripherals in
//! `initialize()` and release them in `end()`; a second driver aimed at
//! the same peripheral fails to initialize instead of corrupting the first.

use heapless::FnvIndexSet;

/// Maximum number of peripherals that can be claimed at once
pub const MAX_CLAIMS: usize = 16;

/// Identity of a claimable peripheral
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PeripheralId {
    /// UART instance by index
    Uart(u8),
    /// Pixel lane, e.g. PIO block and state machine
    PixelLane { block: u8, lane: u8 },
    /// Transfer-engine channel by index
    Dma(u8),
}

/// Error when claiming a peripheral
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClaimError {
    /// Another driver already owns it
    AlreadyClaimed,
    /// Registry is full
    TooManyClaims,
}

/// Registry of claimed peripherals
pub struct PeripheralClaims {
    claimed: FnvIndexSet<PeripheralId, MAX_CLAIMS>,
}

impl Default for PeripheralClaims {
    fn default() -> Self {
        Self::new()
    }
}

impl PeripheralClaims {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            claimed: FnvIndexSet::new(),
        }
    }

    /// Claim a peripheral
    pub fn claim(&mut self, id: PeripheralId) -> Result<(), ClaimError> {
        if self.claimed.contains(&id) {
            return Err(ClaimError::AlreadyClaimed);
        }
        self.claimed
            .insert(id)
            .map(|_| ())
            .map_err(|_| ClaimError::TooManyClaims)
    }

    /// Release a peripheral
    pub fn release(&mut self, id: PeripheralId) {
        self.claimed.remove(&id);
    }

    /// Check if a peripheral is claimed
    pub fn is_claimed(&self, id: PeripheralId) -> bool {
        self.claimed.contains(&id)
    }

    /// Number of claimed peripherals
    pub fn claimed_count(&self) -> usize {
        self.claimed.len()
    }
}
