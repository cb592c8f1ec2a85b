//! Low-level USB access through nusb

use crate::device::{PRODUCT_ID, VENDOR_ID};
use crate::error::{Error, Result};
use crate::transport::Transport;
use log::{debug, trace};
use nusb::transfer::{Buffer, Bulk, In, Out, TransferError};
use nusb::{Endpoint, Interface, MaybeFuture};
use std::collections::HashMap;
use std::time::Duration;

/// Round up to the next multiple of max packet size for IN transfers
/// nusb 0.2 requires requested_len to be a multiple of max_packet_size
fn round_up_to_max_packet(len: usize, max_packet_size: usize) -> usize {
    len.max(1).div_ceil(max_packet_size) * max_packet_size
}

/// A claimed interface and the endpoints opened on it so far
struct Claim {
    number: u8,
    interface: Interface,
    out_eps: HashMap<u8, Endpoint<Bulk, Out>>,
    in_eps: HashMap<u8, Endpoint<Bulk, In>>,
}

/// [`Transport`] over a device opened with nusb
pub struct NusbTransport {
    device: nusb::Device,
    claims: Vec<Claim>,
}

impl NusbTransport {
    /// Open the first attached device matching `vendor_id`/`product_id`
    pub fn open(vendor_id: u16, product_id: u16) -> Result<Self> {
        for info in nusb::list_devices().wait()? {
            if info.vendor_id() == vendor_id && info.product_id() == product_id {
                debug!(
                    "Opening {:04x}:{:04x} at bus {:03} address {:03}",
                    vendor_id,
                    product_id,
                    info.busnum(),
                    info.device_address()
                );
                let device = info.open().wait()?;
                return Ok(Self::from_device(device));
            }
        }
        Err(Error::DeviceNotFound)
    }

    /// Open the MP4x device at a given USB bus and address
    pub fn open_at(bus: u8, address: u8) -> Result<Self> {
        for info in nusb::list_devices().wait()? {
            if info.busnum() == bus && info.device_address() == address {
                if info.vendor_id() != VENDOR_ID || info.product_id() != PRODUCT_ID {
                    return Err(Error::InvalidArgument(format!(
                        "USB device on bus {:03}:{:02} is not an MP4x",
                        bus, address
                    )));
                }
                let device = info.open().wait()?;
                return Ok(Self::from_device(device));
            }
        }
        Err(Error::DeviceNotFound)
    }

    pub fn from_device(device: nusb::Device) -> Self {
        Self {
            device,
            claims: Vec::new(),
        }
    }

    fn out_endpoint(&mut self, address: u8) -> Result<&mut Endpoint<Bulk, Out>> {
        let idx = match self
            .claims
            .iter()
            .position(|c| c.out_eps.contains_key(&address))
        {
            Some(idx) => idx,
            None => {
                let mut found = None;
                for (idx, claim) in self.claims.iter_mut().enumerate() {
                    if let Ok(ep) = claim.interface.endpoint::<Bulk, Out>(address) {
                        claim.out_eps.insert(address, ep);
                        found = Some(idx);
                        break;
                    }
                }
                found.ok_or(Error::EndpointUnavailable(address))?
            }
        };
        self.claims[idx]
            .out_eps
            .get_mut(&address)
            .ok_or(Error::EndpointUnavailable(address))
    }

    fn in_endpoint(&mut self, address: u8) -> Result<&mut Endpoint<Bulk, In>> {
        let idx = match self
            .claims
            .iter()
            .position(|c| c.in_eps.contains_key(&address))
        {
            Some(idx) => idx,
            None => {
                let mut found = None;
                for (idx, claim) in self.claims.iter_mut().enumerate() {
                    if let Ok(ep) = claim.interface.endpoint::<Bulk, In>(address) {
                        claim.in_eps.insert(address, ep);
                        found = Some(idx);
                        break;
                    }
                }
                found.ok_or(Error::EndpointUnavailable(address))?
            }
        };
        self.claims[idx]
            .in_eps
            .get_mut(&address)
            .ok_or(Error::EndpointUnavailable(address))
    }
}

/// Blocking transfers report an expired timeout as a cancellation
fn transfer_status(
    status: std::result::Result<(), TransferError>,
    endpoint: u8,
    timeout: Duration,
) -> Result<()> {
    match status {
        Ok(()) => Ok(()),
        Err(TransferError::Cancelled) => Err(Error::Timeout {
            endpoint,
            timeout_ms: timeout.as_millis() as u64,
        }),
        Err(e) => Err(Error::UsbTransfer(e)),
    }
}

impl Transport for NusbTransport {
    fn claim_interface(&mut self, number: u8) -> Result<()> {
        if self.claims.iter().any(|c| c.number == number) {
            return Ok(());
        }
        let interface = self.device.claim_interface(number).wait()?;
        self.claims.push(Claim {
            number,
            interface,
            out_eps: HashMap::new(),
            in_eps: HashMap::new(),
        });
        debug!("Claimed interface {}", number);
        Ok(())
    }

    fn release_interface(&mut self, number: u8) -> Result<()> {
        let idx = self
            .claims
            .iter()
            .position(|c| c.number == number)
            .ok_or(Error::InterfaceNotClaimed(number))?;
        // Dropping the interface and its endpoints releases the claim
        self.claims.remove(idx);
        debug!("Released interface {}", number);
        Ok(())
    }

    fn write(&mut self, endpoint: u8, data: &[u8], timeout: Duration) -> Result<usize> {
        let ep = self.out_endpoint(endpoint)?;
        let buf = Buffer::from(data.to_vec());
        let completion = ep.transfer_blocking(buf, timeout);
        transfer_status(completion.status, endpoint, timeout)?;
        trace!(
            "OUT 0x{:02x}: {} of {} bytes",
            endpoint,
            completion.actual_len,
            data.len()
        );
        Ok(completion.actual_len)
    }

    fn read(&mut self, endpoint: u8, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let ep = self.in_endpoint(endpoint)?;
        let max_packet_size = ep.max_packet_size();
        let requested_len = round_up_to_max_packet(buf.len(), max_packet_size);
        let mut transfer = Buffer::new(requested_len);
        transfer.set_requested_len(requested_len);
        let completion = ep.transfer_blocking(transfer, timeout);
        transfer_status(completion.status, endpoint, timeout)?;
        let actual = completion.actual_len;
        let stored = std::cmp::min(actual, buf.len());
        buf[..stored].copy_from_slice(&completion.buffer[..stored]);
        trace!("IN 0x{:02x}: {} bytes", endpoint, actual);
        Ok(actual)
    }
}
