//! Error types for mpic

use thiserror::Error;

/// Result type for mpic operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to an MP4x device
#[derive(Error, Debug)]
pub enum Error {
    #[error("USB error: {0}")]
    Usb(#[from] nusb::Error),

    #[error("USB transfer error: {0}")]
    UsbTransfer(#[from] nusb::transfer::TransferError),

    #[error("USB transfer on endpoint 0x{endpoint:02x} timed out after {timeout_ms}ms")]
    Timeout { endpoint: u8, timeout_ms: u64 },

    #[error("Device not found")]
    DeviceNotFound,

    #[error("Interface {0} is not claimed")]
    InterfaceNotClaimed(u8),

    #[error("Endpoint 0x{0:02x} is not available on any claimed interface")]
    EndpointUnavailable(u8),

    #[error("Can not send USB command: sent {actual} of {expected} bytes")]
    ShortWrite { expected: usize, actual: usize },

    #[error("Bad INSYNC on EP1: {0}")]
    OutOfSync(InsyncFault),

    #[error("Bad response: expected {expected} bytes, got {actual}")]
    BadResponse { expected: usize, actual: usize },

    #[error("Command payload of {len} bytes exceeds limit of {max}")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("Buffer overflow: {requested} bytes requested, capacity is {capacity}")]
    BufferOverflow { requested: usize, capacity: usize },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Why the INSYNC handshake was rejected
#[derive(Error, Debug)]
pub enum InsyncFault {
    #[error("{0}")]
    Transport(Box<Error>),

    #[error("expected 1 byte, got {0}")]
    Count(usize),

    #[error("expected 0xff, got 0x{0:02x}")]
    Value(u8),
}

impl Error {
    /// True for faults reported by the USB layer itself.
    ///
    /// These are the conditions a caller may reasonably retry. Protocol
    /// violations (short write, bad INSYNC, unexpected response size) are not.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Usb(_)
                | Error::UsbTransfer(_)
                | Error::Timeout { .. }
                | Error::DeviceNotFound
                | Error::InterfaceNotClaimed(_)
                | Error::EndpointUnavailable(_)
        )
    }
}
