//! mpic - command-protocol client for MP4x USB programmable devices
//!
//! Frames vendor commands for the EP1 command channel, runs the INSYNC
//! handshake for commands that return data, and sizes buffers and timeouts
//! according to the firmware version the device reports.
//!
//! This program is free software; you can redistribute it and/or modify
//! it under the terms of the GNU General Public License as published by
//! the Free Software Foundation; version 2 of the License.

pub mod buffer;
pub mod device;
pub mod error;
pub mod executor;
pub mod frame;
pub mod hexdump;
pub mod profile;
pub mod system;
pub mod transport;
pub mod usb;

pub use device::{list_devices, Mp4x, PRODUCT_ID, VENDOR_ID};
pub use error::{Error, InsyncFault, Result};
pub use executor::CommandResponse;
pub use frame::CommandFrame;
pub use profile::{DeviceConfig, DeviceKind, FirmwareVersion, Profile};
pub use transport::Transport;
pub use usb::NusbTransport;
