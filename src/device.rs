//! MP4x device session

use crate::buffer::BufferSet;
use crate::error::{Error, Result};
use crate::executor::{self, CommandResponse};
use crate::frame::CommandFrame;
use crate::profile::DeviceConfig;
use crate::system;
use crate::transport::{Transport, EP2_IN, EP2_OUT};
use crate::usb::NusbTransport;
use log::debug;
use nusb::MaybeFuture;
use std::time::Duration;

/// MP4x USB Vendor ID (Microchip)
pub const VENDOR_ID: u16 = 0x04d8;
/// MP4x USB Product ID
pub const PRODUCT_ID: u16 = 0xfca7;

/// Interface carrying both endpoint pairs
pub const INTERFACE: u8 = 0;

/// Timeout for EP2 data transfers
pub const DATA_TIMEOUT: Duration = Duration::from_millis(1000);

/// An open MP4x device.
///
/// Holds the transport, the four transfer buffers and the negotiated
/// configuration. Commands run strictly one after another; the session is not
/// meant to be shared between threads.
pub struct Mp4x<T: Transport = NusbTransport> {
    transport: T,
    buffers: BufferSet,
    config: DeviceConfig,
}

impl Mp4x<NusbTransport> {
    /// Open the first MP4x device, claim its interface and negotiate the
    /// configuration
    pub fn open() -> Result<Self> {
        let transport = NusbTransport::open(VENDOR_ID, PRODUCT_ID)?;
        Self::setup(transport)
    }

    /// Open the MP4x device at a given USB bus and address, claim its
    /// interface and negotiate the configuration
    pub fn open_at(bus: u8, address: u8) -> Result<Self> {
        let transport = NusbTransport::open_at(bus, address)?;
        Self::setup(transport)
    }

    /// Open a device by vendor and product ID without claiming or
    /// negotiating anything
    pub fn open_by_ids(vendor_id: u16, product_id: u16) -> Result<Self> {
        let transport = NusbTransport::open(vendor_id, product_id)?;
        Ok(Self::with_transport(transport))
    }

    fn setup(transport: NusbTransport) -> Result<Self> {
        let mut mp4x = Self::with_transport(transport);
        mp4x.claim_interface(INTERFACE)?;
        mp4x.negotiate();
        Ok(mp4x)
    }
}

impl<T: Transport> Mp4x<T> {
    /// Wrap an already opened transport. Buffers start at their
    /// pre-negotiation sizes and the configuration at the 1.2 profile.
    pub fn with_transport(transport: T) -> Self {
        Self {
            transport,
            buffers: BufferSet::default(),
            config: DeviceConfig::default(),
        }
    }

    pub fn claim_interface(&mut self, number: u8) -> Result<()> {
        self.transport.claim_interface(number)
    }

    pub fn release_interface(&mut self, number: u8) -> Result<()> {
        self.transport.release_interface(number)
    }

    /// Query the firmware version and adopt the matching configuration.
    ///
    /// Falls back to the 1.2 profile if the query fails. The data buffers are
    /// re-allocated to the new limits.
    pub fn negotiate(&mut self) -> &DeviceConfig {
        let config = system::negotiate(self);
        self.buffers
            .resize_data(config.profile.eht_buf_max, config.profile.in_recv_max);
        self.config = config;
        &self.config
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn buffers(&self) -> &BufferSet {
        &self.buffers
    }

    pub fn buffers_mut(&mut self) -> &mut BufferSet {
        &mut self.buffers
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send a command on EP1 and, for IN commands, collect the response
    pub fn command(
        &mut self,
        destination: u8,
        command: u8,
        payload: &[u8],
    ) -> Result<CommandResponse> {
        let frame = CommandFrame::new(destination, command, payload)?;
        executor::execute(
            &mut self.transport,
            &frame,
            &mut self.buffers.cmd_out,
            &mut self.buffers.cmd_in,
        )
    }

    /// Send a block of data on EP2
    pub fn write_data(&mut self, data: &[u8]) -> Result<usize> {
        let buf = &mut self.buffers.data_out;
        buf.load(data)?;
        let written = self
            .transport
            .write(EP2_OUT, buf.as_slice(), DATA_TIMEOUT)?;
        if written != data.len() {
            return Err(Error::ShortWrite {
                expected: data.len(),
                actual: written,
            });
        }
        Ok(written)
    }

    /// Receive up to `len` bytes of data on EP2
    pub fn read_data(&mut self, len: usize) -> Result<&[u8]> {
        let buf = &mut self.buffers.data_in;
        buf.reset();
        let count = self
            .transport
            .read(EP2_IN, buf.window_mut(len)?, DATA_TIMEOUT)?;
        buf.set_len(count.min(len))?;
        Ok(buf.as_slice())
    }

    /// Close the device. Claimed interfaces are released with the transport.
    pub fn close(self) {
        debug!("Closing MP4x session");
    }
}

/// List all connected MP4x devices as (bus, address) pairs
pub fn list_devices() -> Result<Vec<(u8, u8)>> {
    let mut devices = Vec::new();

    for device in nusb::list_devices().wait()? {
        if device.vendor_id() != VENDOR_ID || device.product_id() != PRODUCT_ID {
            continue;
        }
        devices.push((device.busnum(), device.device_address()));
    }

    Ok(devices)
}
