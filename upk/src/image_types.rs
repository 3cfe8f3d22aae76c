//! Image kinds and the well-known file names that select them

use std::fmt;
use std::path::Path;

use crate::version::VersionFile;

pub const UBOOT_FILE_NAME: &str = "u-boot.bin";
pub const KERNEL_FILE_NAME: &str = "uImage";
pub const CRAMFS_FILE_NAME: &str = "root.cramfs";
pub const SCRIPT_FILE_NAME: &str = "env.img";

/// Kind of an image inside the package, stored as `i_type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageKind {
    /// OS kernel image
    Kernel = 2,
    /// Boot environment script
    Script = 6,
    /// U-Boot binary
    Uboot = 8,
    /// Root filesystem (CRAMFS)
    Cramfs = 9,
    /// Any other file, stored compressed with its own checksum
    Compress = 10,
}

impl ImageKind {
    /// Classify an image by its name
    ///
    /// Only the final path component is inspected, and a well-known name
    /// matches as a prefix (`uImage-2.6` is still a kernel).
    pub fn classify(name: &str) -> Self {
        let file_name = Path::new(name)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.to_string());

        if file_name.starts_with(CRAMFS_FILE_NAME) {
            Self::Cramfs
        } else if file_name.starts_with(KERNEL_FILE_NAME) {
            Self::Kernel
        } else if file_name.starts_with(UBOOT_FILE_NAME) {
            Self::Uboot
        } else if file_name.starts_with(SCRIPT_FILE_NAME) {
            Self::Script
        } else {
            Self::Compress
        }
    }

    /// Numeric tag written into the image table
    pub fn tag(self) -> u32 {
        self as u32
    }

    /// Name recorded in the table for well-known kinds
    pub fn table_name(self) -> Option<&'static str> {
        match self {
            Self::Kernel => Some(KERNEL_FILE_NAME),
            Self::Script => Some(SCRIPT_FILE_NAME),
            Self::Uboot => Some(UBOOT_FILE_NAME),
            Self::Cramfs => Some(CRAMFS_FILE_NAME),
            Self::Compress => None,
        }
    }

    /// Version file the per-image version is read from
    pub fn version_file(self) -> Option<VersionFile> {
        match self {
            Self::Kernel => Some(VersionFile::Kernel),
            Self::Uboot => Some(VersionFile::Uboot),
            Self::Cramfs => Some(VersionFile::Rootfs),
            Self::Compress => Some(VersionFile::Extapp),
            Self::Script => None,
        }
    }

    /// Whether the image bytes feed the package-wide data checksum
    ///
    /// Compressed images carry their own trailing checksum instead.
    pub fn in_data_crc(self) -> bool {
        self != Self::Compress
    }
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Kernel => "kernel",
            Self::Script => "script",
            Self::Uboot => "uboot",
            Self::Cramfs => "cramfs",
            Self::Compress => "compress",
        };
        f.pad(s)
    }
}
