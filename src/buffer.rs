//! Fixed-capacity transfer buffers owned by a device session

use crate::error::{Error, Result};

/// Common buffer size for command traffic on EP1
pub const MAX_BUF_SIZE: usize = 250;

/// EHT maximum IN size, used for the data buffers until the firmware
/// version is known
pub const DEFAULT_DATA_BUF_SIZE: usize = 0x800;

/// A byte buffer with a fill counter.
///
/// `len()` never exceeds `capacity()`.
#[derive(Debug, Clone)]
pub struct IoBuffer {
    len: usize,
    storage: Vec<u8>,
}

impl IoBuffer {
    /// Allocate a zero-filled buffer
    pub fn new(capacity: usize) -> Self {
        Self {
            len: 0,
            storage: vec![0u8; capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Zero the storage and clear the fill counter
    pub fn reset(&mut self) {
        self.storage.fill(0);
        self.len = 0;
    }

    /// Re-allocate to a new capacity; contents are discarded
    pub fn resize(&mut self, capacity: usize) {
        self.storage = vec![0u8; capacity];
        self.len = 0;
    }

    /// The filled part of the buffer
    pub fn as_slice(&self) -> &[u8] {
        &self.storage[..self.len]
    }

    /// Mutable view of the first `len` bytes of storage, for a transfer to fill
    pub fn window_mut(&mut self, len: usize) -> Result<&mut [u8]> {
        self.check(len)?;
        Ok(&mut self.storage[..len])
    }

    /// Mark the first `len` bytes as valid
    pub fn set_len(&mut self, len: usize) -> Result<()> {
        self.check(len)?;
        self.len = len;
        Ok(())
    }

    /// Copy `data` in, replacing the previous contents
    pub fn load(&mut self, data: &[u8]) -> Result<()> {
        self.check(data.len())?;
        self.storage[..data.len()].copy_from_slice(data);
        self.len = data.len();
        Ok(())
    }

    fn check(&self, requested: usize) -> Result<()> {
        if requested > self.capacity() {
            return Err(Error::BufferOverflow {
                requested,
                capacity: self.capacity(),
            });
        }
        Ok(())
    }
}

/// The four session buffers, one per direction per endpoint pair
#[derive(Debug, Clone)]
pub struct BufferSet {
    /// Output data buffer (EP2)
    pub data_out: IoBuffer,
    /// Input data buffer (EP2)
    pub data_in: IoBuffer,
    /// Output command buffer (EP1)
    pub cmd_out: IoBuffer,
    /// Input command buffer (EP1), holds data returned by the device
    pub cmd_in: IoBuffer,
}

impl Default for BufferSet {
    fn default() -> Self {
        Self {
            data_out: IoBuffer::new(DEFAULT_DATA_BUF_SIZE),
            data_in: IoBuffer::new(DEFAULT_DATA_BUF_SIZE),
            cmd_out: IoBuffer::new(MAX_BUF_SIZE),
            cmd_in: IoBuffer::new(MAX_BUF_SIZE),
        }
    }
}

impl BufferSet {
    /// Re-size the data buffers to the limits of a negotiated profile
    pub fn resize_data(&mut self, out_capacity: usize, in_capacity: usize) {
        self.data_out.resize(out_capacity);
        self.data_in.resize(in_capacity);
    }

    /// Zero all four buffers
    pub fn reset(&mut self) {
        self.data_out.reset();
        self.data_in.reset();
        self.cmd_out.reset();
        self.cmd_in.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_rejects_more_than_capacity() {
        let mut buf = IoBuffer::new(4);
        assert!(buf.load(&[1, 2, 3, 4]).is_ok());
        assert_eq!(buf.as_slice(), &[1, 2, 3, 4]);

        let err = buf.load(&[0; 5]).unwrap_err();
        assert!(matches!(
            err,
            Error::BufferOverflow {
                requested: 5,
                capacity: 4
            }
        ));
        // Failed load leaves previous contents alone
        assert_eq!(buf.len(), 4);
    }

    #[test]
    fn reset_zero_fills() {
        let mut buf = IoBuffer::new(8);
        buf.load(&[0xaa; 8]).unwrap();
        buf.reset();
        assert!(buf.is_empty());
        assert_eq!(buf.window_mut(8).unwrap(), &[0u8; 8]);
    }

    #[test]
    fn set_len_respects_capacity() {
        let mut buf = IoBuffer::new(2);
        assert!(buf.set_len(2).is_ok());
        assert!(buf.set_len(3).is_err());
        assert!(buf.window_mut(3).is_err());
    }

    #[test]
    fn default_set_uses_conservative_sizes() {
        let mut set = BufferSet::default();
        assert_eq!(set.cmd_out.capacity(), MAX_BUF_SIZE);
        assert_eq!(set.cmd_in.capacity(), MAX_BUF_SIZE);
        assert_eq!(set.data_out.capacity(), DEFAULT_DATA_BUF_SIZE);
        assert_eq!(set.data_in.capacity(), DEFAULT_DATA_BUF_SIZE);

        set.resize_data(8192, 16384);
        assert_eq!(set.data_out.capacity(), 8192);
        assert_eq!(set.data_in.capacity(), 16384);
        assert_eq!(set.cmd_out.capacity(), MAX_BUF_SIZE);
    }
}
