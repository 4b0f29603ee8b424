//! RS485 frame assembly
//!
//! Frame layout on the wire:
//! - PREAMBLE (0-16 bytes): fixed bytes configured once
//! - PAYLOAD (1..capacity bytes): caller data
//! - POSTAMBLE (0-16 bytes): fixed bytes configured once
//!
//! The whole frame must fit the driver's transmit buffer. Validation
//! happens before anything is written, so a rejected send leaves the
//! buffer untouched.

use heapless::Vec;

use crate::config::{MAX_FRAMING_LEN, RS485_MAX_FRAME_SIZE};
use crate::error::{Error, Result};

/// Preamble/postamble wrapped around every payload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameFormat {
    preamble: Vec<u8, MAX_FRAMING_LEN>,
    postamble: Vec<u8, MAX_FRAMING_LEN>,
}

impl FrameFormat {
    /// No framing bytes
    pub const fn new() -> Self {
        Self {
            preamble: Vec::new(),
            postamble: Vec::new(),
        }
    }

    /// Framing from byte sequences of at most 16 bytes each
    pub fn with(preamble: &[u8], postamble: &[u8]) -> Result<Self> {
        Ok(Self {
            preamble: Vec::from_slice(preamble).map_err(|_| Error::InvalidParameters)?,
            postamble: Vec::from_slice(postamble).map_err(|_| Error::InvalidParameters)?,
        })
    }

    pub fn preamble(&self) -> &[u8] {
        &self.preamble
    }

    pub fn postamble(&self) -> &[u8] {
        &self.postamble
    }

    /// Bytes added around every payload
    pub fn overhead(&self) -> usize {
        self.preamble.len() + self.postamble.len()
    }

    /// Total frame length for a payload of `payload_len` bytes
    pub fn framed_len(&self, payload_len: usize) -> usize {
        self.overhead() + payload_len
    }

    /// Write the framed payload into `buffer`
    ///
    /// `capacity` is the configured transmit-buffer size; the frame must
    /// not exceed it. Returns the frame length.
    pub fn assemble(
        &self,
        payload: &[u8],
        buffer: &mut Vec<u8, RS485_MAX_FRAME_SIZE>,
        capacity: usize,
    ) -> Result<usize> {
        if payload.is_empty() {
            return Err(Error::InvalidParameters);
        }
        let frame_len = self.framed_len(payload.len());
        if frame_len > capacity.min(RS485_MAX_FRAME_SIZE) {
            return Err(Error::BufferOverflow);
        }

        buffer.clear();
        // Cannot fail: frame_len fits the vector's capacity
        let _ = buffer.extend_from_slice(&self.preamble);
        let _ = buffer.extend_from_slice(payload);
        let _ = buffer.extend_from_slice(&self.postamble);

        Ok(frame_len)
    }
}
