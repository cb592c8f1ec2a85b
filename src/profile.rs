//! Firmware version to device profile mapping
//!
//! Buffer sizes, timeouts and table limits depend on the firmware version the
//! device reports. The mapping is a first-match table keyed by the version
//! code `10 * major + minor`.

use std::fmt;
use std::time::Duration;

/// Firmware version reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareVersion {
    pub major: u8,
    pub minor: u8,
}

impl FirmwareVersion {
    /// Assumed when the device cannot be queried
    pub const FALLBACK: FirmwareVersion = FirmwareVersion { major: 1, minor: 2 };

    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    /// `10 * major + minor`
    pub fn code(&self) -> u16 {
        10 * self.major as u16 + self.minor as u16
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Device family, identified by its type tag character
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DeviceKind {
    Mp44 = b'4',
    Mp45 = b'5',
    Mp46 = b'6',
    Mp47 = b'7',
}

impl DeviceKind {
    pub fn tag(&self) -> char {
        *self as u8 as char
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MP4{}", self.tag())
    }
}

/// Limits selected by firmware version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Profile {
    pub kind: DeviceKind,
    pub short_buf_max: usize,
    pub long_buf_max: usize,
    pub eht_buf_max: usize,
    pub in_recv_max: usize,
    pub decode_buf_max: usize,
    pub create_timeout: Duration,
    pub download_timeout: Duration,
    pub ap_index_table_size: usize,
    /// Upper bound on dcrt sections; 0 when the firmware has no such table
    pub max_section_count: usize,
}

/// One row of the version table. Codes are inclusive on both ends.
struct VersionBucket {
    min_code: u16,
    max_code: u16,
    profile: Profile,
    /// Exact code that selects a different profile inside this range
    exact: Option<(u16, Profile)>,
}

impl VersionBucket {
    fn select(&self, code: u16) -> Option<&Profile> {
        if code < self.min_code || code > self.max_code {
            return None;
        }
        match &self.exact {
            Some((exact, profile)) if *exact == code => Some(profile),
            _ => Some(&self.profile),
        }
    }
}

const GEN2: Profile = Profile {
    kind: DeviceKind::Mp45,
    short_buf_max: 1024,
    long_buf_max: 1792,
    eht_buf_max: 8192,
    in_recv_max: 16384,
    decode_buf_max: 16384,
    create_timeout: Duration::from_millis(450),
    download_timeout: Duration::from_millis(370),
    ap_index_table_size: 128,
    max_section_count: 31,
};

static VERSION_TABLE: [VersionBucket; 4] = [
    VersionBucket {
        min_code: 0,
        max_code: 12,
        profile: Profile {
            kind: DeviceKind::Mp44,
            short_buf_max: 256,
            long_buf_max: 512,
            eht_buf_max: 512,
            in_recv_max: 512,
            decode_buf_max: 256,
            create_timeout: Duration::from_millis(600),
            download_timeout: Duration::from_millis(500),
            ap_index_table_size: 16,
            max_section_count: 0,
        },
        exact: None,
    },
    VersionBucket {
        min_code: 13,
        max_code: 19,
        profile: Profile {
            kind: DeviceKind::Mp44,
            short_buf_max: 1024,
            long_buf_max: 1792,
            eht_buf_max: 2048,
            in_recv_max: 2048,
            decode_buf_max: 1792,
            create_timeout: Duration::from_millis(450),
            download_timeout: Duration::from_millis(370),
            ap_index_table_size: 16,
            max_section_count: 18,
        },
        exact: None,
    },
    VersionBucket {
        min_code: 20,
        max_code: 29,
        profile: GEN2,
        exact: Some((
            21,
            Profile {
                kind: DeviceKind::Mp46,
                max_section_count: 60,
                ..GEN2
            },
        )),
    },
    VersionBucket {
        min_code: 30,
        max_code: u16::MAX,
        profile: Profile {
            kind: DeviceKind::Mp47,
            create_timeout: Duration::ZERO,
            download_timeout: Duration::ZERO,
            max_section_count: 80,
            ..GEN2
        },
        exact: None,
    },
];

/// Negotiated configuration of one session. Read-only once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceConfig {
    pub version: FirmwareVersion,
    pub profile: Profile,
}

impl DeviceConfig {
    pub fn for_version(version: FirmwareVersion) -> Self {
        let code = version.code();
        let profile = VERSION_TABLE
            .iter()
            .find_map(|bucket| bucket.select(code))
            .copied()
            // The table spans every u16 code
            .unwrap_or(VERSION_TABLE[0].profile);
        Self { version, profile }
    }

    pub fn version_code(&self) -> u16 {
        self.version.code()
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self::for_version(FirmwareVersion::FALLBACK)
    }
}

impl fmt::Display for DeviceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = &self.profile;
        writeln!(f, "Firmware version: {} (code {})", self.version, self.version_code())?;
        writeln!(f, "Device type: {} ('{}')", p.kind, p.kind.tag())?;
        writeln!(f, "Short buffer max: {}", p.short_buf_max)?;
        writeln!(f, "Long buffer max: {}", p.long_buf_max)?;
        writeln!(f, "EHT buffer max: {}", p.eht_buf_max)?;
        writeln!(f, "IN receive max: {}", p.in_recv_max)?;
        writeln!(f, "Decode buffer max: {}", p.decode_buf_max)?;
        writeln!(f, "Create timeout: {}ms", p.create_timeout.as_millis())?;
        writeln!(f, "Download timeout: {}ms", p.download_timeout.as_millis())?;
        writeln!(f, "AP index table size: {}", p.ap_index_table_size)?;
        write!(f, "Max sections: {}", p.max_section_count)
    }
}
