//! Transport seam between the command protocol and the USB stack

use crate::error::Result;
use std::time::Duration;

/// Command OUT endpoint (EP1)
pub const EP1_OUT: u8 = 0x01;
/// Command IN endpoint (EP1)
pub const EP1_IN: u8 = 0x81;
/// Data OUT endpoint (EP2)
pub const EP2_OUT: u8 = 0x02;
/// Data IN endpoint (EP2)
pub const EP2_IN: u8 = 0x82;

/// Blocking bulk transport to one opened device.
///
/// Every transfer carries its own timeout; there is no other way to cancel.
pub trait Transport {
    fn claim_interface(&mut self, number: u8) -> Result<()>;

    fn release_interface(&mut self, number: u8) -> Result<()>;

    /// Bulk OUT transfer. Returns the number of bytes the device accepted.
    fn write(&mut self, endpoint: u8, data: &[u8], timeout: Duration) -> Result<usize>;

    /// Bulk IN transfer of up to `buf.len()` bytes.
    ///
    /// Returns the number of bytes the device delivered. Only the first
    /// `buf.len()` of them are stored, so a count above `buf.len()` means the
    /// device sent more than was asked for.
    fn read(&mut self, endpoint: u8, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Wait out a device-side processing interval
    fn settle(&mut self, interval: Duration) {
        std::thread::sleep(interval);
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::Transport;
    use crate::error::{Error, Result};
    use nusb::transfer::TransferError;
    use std::collections::VecDeque;
    use std::time::Duration;

    /// Scripted outcome of the next transfer
    #[derive(Debug, Clone)]
    pub enum Reply {
        /// OUT transfer accepted this many bytes
        Wrote(usize),
        /// IN transfer delivered these bytes
        Read(Vec<u8>),
        /// Transfer failed with a USB error
        Fail,
    }

    /// What the code under test asked for
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        Claim(u8),
        Release(u8),
        Write {
            endpoint: u8,
            data: Vec<u8>,
            timeout: Duration,
        },
        Read {
            endpoint: u8,
            len: usize,
            timeout: Duration,
        },
        Settle(Duration),
    }

    #[derive(Debug, Default)]
    pub struct MockTransport {
        script: VecDeque<Reply>,
        pub calls: Vec<Call>,
    }

    impl MockTransport {
        pub fn new(script: impl IntoIterator<Item = Reply>) -> Self {
            Self {
                script: script.into_iter().collect(),
                calls: Vec::new(),
            }
        }

        /// Number of bulk transfers issued, settle and claim calls excluded
        pub fn transfers(&self) -> usize {
            self.calls
                .iter()
                .filter(|c| matches!(c, Call::Write { .. } | Call::Read { .. }))
                .count()
        }

        fn next(&mut self) -> Reply {
            self.script.pop_front().unwrap_or(Reply::Fail)
        }
    }

    fn usb_failure() -> Error {
        Error::UsbTransfer(TransferError::Disconnected)
    }

    impl Transport for MockTransport {
        fn claim_interface(&mut self, number: u8) -> Result<()> {
            self.calls.push(Call::Claim(number));
            Ok(())
        }

        fn release_interface(&mut self, number: u8) -> Result<()> {
            self.calls.push(Call::Release(number));
            Ok(())
        }

        fn write(&mut self, endpoint: u8, data: &[u8], timeout: Duration) -> Result<usize> {
            self.calls.push(Call::Write {
                endpoint,
                data: data.to_vec(),
                timeout,
            });
            match self.next() {
                Reply::Wrote(n) => Ok(n),
                Reply::Read(_) => panic!("script expected a read, got a write"),
                Reply::Fail => Err(usb_failure()),
            }
        }

        fn read(&mut self, endpoint: u8, buf: &mut [u8], timeout: Duration) -> Result<usize> {
            self.calls.push(Call::Read {
                endpoint,
                len: buf.len(),
                timeout,
            });
            match self.next() {
                Reply::Read(bytes) => {
                    let stored = bytes.len().min(buf.len());
                    buf[..stored].copy_from_slice(&bytes[..stored]);
                    Ok(bytes.len())
                }
                Reply::Wrote(_) => panic!("script expected a write, got a read"),
                Reply::Fail => Err(usb_failure()),
            }
        }

        fn settle(&mut self, interval: Duration) {
            self.calls.push(Call::Settle(interval));
        }
    }
}
