//! System level operations (version query, activation, negotiation)

use crate::device::Mp4x;
use crate::error::{Error, Result};
use crate::frame::DEST_MP4X;
use crate::profile::{DeviceConfig, FirmwareVersion};
use crate::transport::Transport;
use log::{debug, warn};

/// Returns version and release number. Bit 7 set: IN command.
pub const CMD_GET_VERSION: u8 = 0x93;

/// Query firmware version and release number
pub fn get_version<T: Transport>(mp4x: &mut Mp4x<T>) -> Result<FirmwareVersion> {
    let resp = mp4x.command(DEST_MP4X, CMD_GET_VERSION, &[])?;
    if resp.count != 2 {
        return Err(Error::BadResponse {
            expected: 2,
            actual: resp.count,
        });
    }
    Ok(FirmwareVersion::new(resp.data[0], resp.data[1]))
}

/// Activate the device.
///
/// The device acknowledges with its version and release number.
pub fn activate<T: Transport>(mp4x: &mut Mp4x<T>) -> Result<FirmwareVersion> {
    let version = get_version(mp4x)?;
    debug!("Activated, device reports version {}", version);
    Ok(version)
}

/// Derive the session configuration from the device's firmware version.
///
/// Never fails: if the device cannot be queried the 1.2 profile is used.
pub fn negotiate<T: Transport>(mp4x: &mut Mp4x<T>) -> DeviceConfig {
    let version = match get_version(mp4x) {
        Ok(version) => version,
        Err(e) => {
            warn!(
                "Version query failed ({}), assuming firmware {}",
                e,
                FirmwareVersion::FALLBACK
            );
            FirmwareVersion::FALLBACK
        }
    };
    let config = DeviceConfig::for_version(version);
    debug!(
        "Firmware {} (code {}): {}",
        version,
        config.version_code(),
        config.profile.kind
    );
    config
}
