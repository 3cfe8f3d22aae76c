//! Flash maps and fixed layout constants

use std::fmt;

use serde::{Deserialize, Serialize};

/// Root filesystem images above this size are split across two flash ranges
pub const SPLIT_THRESHOLD: u64 = 0x70_0000;

/// Alignment of the hardware section
pub const HW_BLOCK_SIZE: u64 = 0x2000;

/// Number of block boundaries tried when padding the hardware section
pub const HW_PAD_RETRIES: u64 = 15;

/// Magic written in the trailer, just before the hardware length
pub const HW_FLAG: u32 = 0x55AA_AA55;

/// Reserve bit that is set in every package header
pub const RESERVE_FIXED_BIT: u32 = 0x04;

/// Inclusive address range in the target flash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlashRange {
    pub start: u32,
    pub end: u32,
}

impl FlashRange {
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Number of bytes covered by the range
    pub fn capacity(&self) -> u64 {
        u64::from(self.end) + 1 - u64::from(self.start)
    }
}

impl fmt::Display for FlashRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}-0x{:08x}", self.start, self.end)
    }
}

/// Supported flash sizes
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlashSize {
    #[serde(rename = "8m")]
    Flash8M,
    #[default]
    #[serde(rename = "16m")]
    Flash16M,
}

impl FlashSize {
    /// Address ranges of this flash variant
    pub fn map(self) -> FlashMap {
        match self {
            FlashSize::Flash16M => FLASH_MAP_16M,
            FlashSize::Flash8M => FLASH_MAP_8M,
        }
    }

    /// Bits stored in `p_reserve`; bits[1:0] select the variant
    pub fn reserve_bits(self) -> u32 {
        let variant = match self {
            FlashSize::Flash8M => 0x01,
            FlashSize::Flash16M => 0x02,
        };
        variant | RESERVE_FIXED_BIT
    }
}

impl fmt::Display for FlashSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FlashSize::Flash8M => "8M",
            FlashSize::Flash16M => "16M",
        };
        write!(f, "{s}")
    }
}

/// Destination ranges for every image kind that has a flash address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashMap {
    pub uboot: FlashRange,
    pub kernel: FlashRange,
    pub rootfs: FlashRange,
    /// Only used by the second half of a split root filesystem
    pub rootfs_ext: Option<FlashRange>,
}

impl FlashMap {
    /// Largest root filesystem that fits, split or not
    pub fn rootfs_capacity(&self) -> u64 {
        self.rootfs.capacity() + self.rootfs_ext.map_or(0, |r| r.capacity())
    }
}

pub const FLASH_MAP_16M: FlashMap = FlashMap {
    uboot: FlashRange::new(0x0010_0000, 0x0013_FFFF),
    kernel: FlashRange::new(0x0016_0000, 0x002D_FFFF),
    rootfs: FlashRange::new(0x002E_0000, 0x009D_FFFF),
    rootfs_ext: Some(FlashRange::new(0x009E_0000, 0x00FF_FFFF)),
};

pub const FLASH_MAP_8M: FlashMap = FlashMap {
    uboot: FlashRange::new(0x0010_0000, 0x0013_FFFF),
    kernel: FlashRange::new(0x0016_0000, 0x0027_FFFF),
    rootfs: FlashRange::new(0x0028_0000, 0x0088_FFFF),
    rootfs_ext: None,
};
