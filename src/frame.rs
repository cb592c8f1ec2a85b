//! Command frame layout for EP1
//!
//! Each command starts with 3 bytes:
//!
//! ```text
//! byte 0   destination        (4 = mp4x)
//! byte 1   command code       (bit 7 set = IN command, INSYNC and data follow)
//! byte 2   payload length     (0 - 0x3c)
//! byte 3.. payload
//! ```

use crate::error::{Error, Result};

/// Destination byte addressing the MP4x controller
pub const DEST_MP4X: u8 = 4;
/// Size of the frame header
pub const HEADER_LEN: usize = 3;
/// Largest payload a single command may carry
pub const MAX_PAYLOAD: usize = 0x3c;
/// Command code bit marking an IN (response-bearing) command
pub const RESPONSE_FLAG: u8 = 0x80;

/// True if `command` expects INSYNC and a response after being sent
pub fn expects_response(command: u8) -> bool {
    command & RESPONSE_FLAG != 0
}

/// An outbound command, borrowed from the caller for the duration of one call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandFrame<'a> {
    pub destination: u8,
    pub command: u8,
    payload: &'a [u8],
}

impl<'a> CommandFrame<'a> {
    /// Build a frame, rejecting payloads over [`MAX_PAYLOAD`]
    pub fn new(destination: u8, command: u8, payload: &'a [u8]) -> Result<Self> {
        if payload.len() > MAX_PAYLOAD {
            return Err(Error::PayloadTooLarge {
                len: payload.len(),
                max: MAX_PAYLOAD,
            });
        }
        Ok(Self {
            destination,
            command,
            payload,
        })
    }

    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }

    /// Encoded size in bytes, always at least [`HEADER_LEN`]
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.payload.len()
    }

    pub fn expects_response(&self) -> bool {
        expects_response(self.command)
    }

    /// Serialize into `out`, returning the number of bytes written
    pub fn write_to(&self, out: &mut [u8]) -> Result<usize> {
        let len = self.encoded_len();
        if len > out.len() {
            return Err(Error::PayloadTooLarge {
                len: self.payload.len(),
                max: out.len().saturating_sub(HEADER_LEN),
            });
        }
        out[0] = self.destination;
        out[1] = self.command;
        out[2] = self.payload.len() as u8;
        out[HEADER_LEN..len].copy_from_slice(self.payload);
        Ok(len)
    }

    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        out.extend_from_slice(&[self.destination, self.command, self.payload.len() as u8]);
        out.extend_from_slice(self.payload);
        out
    }
}
