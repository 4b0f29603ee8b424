//! DMX512 universe frame
//!
//! The frame is exactly [`DMX_FRAME_SIZE`] bytes: the start code at
//! offset 0, then channels 1..=512. Channel numbers are 1-based at the
//! API; every mutator rejects channels outside `1..=512`.

use crate::config::{DMX_FRAME_SIZE, DMX_START_CODE, DMX_UNIVERSE_SIZE};

/// Start code plus 512 channel slots
#[derive(Clone, PartialEq, Eq)]
pub struct Universe {
    frame: [u8; DMX_FRAME_SIZE],
}

impl Default for Universe {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for Universe {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Universe")
            .field("start_code", &self.frame[0])
            .finish_non_exhaustive()
    }
}

impl Universe {
    /// All channels zero, null start code
    pub const fn new() -> Self {
        let mut frame = [0u8; DMX_FRAME_SIZE];
        frame[0] = DMX_START_CODE;
        Self { frame }
    }

    const fn is_channel(channel: u16) -> bool {
        channel >= 1 && channel as usize <= DMX_UNIVERSE_SIZE
    }

    /// Set one channel; false if `channel` is outside 1..=512
    pub fn set_channel(&mut self, channel: u16, value: u8) -> bool {
        if !Self::is_channel(channel) {
            return false;
        }
        self.frame[channel as usize] = value;
        true
    }

    /// Channel value, 0 for channels outside 1..=512
    pub fn channel(&self, channel: u16) -> u8 {
        if Self::is_channel(channel) {
            self.frame[channel as usize]
        } else {
            0
        }
    }

    /// Copy `data` into consecutive channels starting at `start`
    ///
    /// Rejected without writing if the range would pass channel 512 or
    /// `data` is empty.
    pub fn set_channel_range(&mut self, start: u16, data: &[u8]) -> bool {
        match Self::range(start, data.len()) {
            Some(range) => {
                self.frame[range].copy_from_slice(data);
                true
            }
            None => false,
        }
    }

    /// Copy consecutive channels starting at `start` into `out`
    pub fn channel_range(&self, start: u16, out: &mut [u8]) -> bool {
        match Self::range(start, out.len()) {
            Some(range) => {
                out.copy_from_slice(&self.frame[range]);
                true
            }
            None => false,
        }
    }

    fn range(start: u16, len: usize) -> Option<core::ops::Range<usize>> {
        if len == 0 || !Self::is_channel(start) {
            return None;
        }
        let first = start as usize;
        let last = first + len - 1;
        (last <= DMX_UNIVERSE_SIZE).then_some(first..last + 1)
    }

    /// Replace channels 1..=512 from `data`
    ///
    /// Shorter input leaves the remaining channels untouched; extra bytes
    /// are ignored. The start code is preserved.
    pub fn set_universe(&mut self, data: &[u8]) {
        let len = data.len().min(DMX_UNIVERSE_SIZE);
        self.frame[1..=len].copy_from_slice(&data[..len]);
    }

    /// Zero channels 1..=512, keeping the start code
    pub fn clear(&mut self) {
        self.frame[1..].fill(0);
    }

    pub fn start_code(&self) -> u8 {
        self.frame[0]
    }

    pub fn set_start_code(&mut self, code: u8) {
        self.frame[0] = code;
    }

    /// Frame carries the standard null start code
    pub fn is_valid(&self) -> bool {
        self.frame[0] == DMX_START_CODE
    }

    /// Bytes in wire order
    pub fn frame(&self) -> &[u8; DMX_FRAME_SIZE] {
        &self.frame
    }

    /// Channel values 1..=512
    pub fn channels(&self) -> &[u8] {
        &self.frame[1..]
    }
}
