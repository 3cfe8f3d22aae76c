//! Hardware section packer
//!
//! Layout, starting at offset 0 of the package:
//!
//! ```text
//! blob1 | blob2 crc (4) | blob2 len (4) | blob2 | zero padding to 8 KiB
//! ```

use std::fs::File;
use std::path::Path;

use crate::error::{Result, UpkError};
use crate::layout::{HW_BLOCK_SIZE, HW_PAD_RETRIES};
use crate::records::{HW_TRAILER_SIZE, HardwareTrailer};
use crate::sink::{PackageSink, copy_at};

/// Largest padded hardware section
pub const HW_MAX_LEN: u64 = (HW_PAD_RETRIES - 1) * HW_BLOCK_SIZE;

/// What [`pack_hardware`] wrote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardwareSection {
    pub first_len: u64,
    pub trailer: HardwareTrailer,
    /// Padded length of the whole section
    pub len: u64,
}

/// Round `len` up to the hardware block size
///
/// Fails when the result would need more than the allowed number of blocks.
pub fn padded_len(len: u64) -> Result<u64> {
    let padded = len.next_multiple_of(HW_BLOCK_SIZE);
    if padded > HW_MAX_LEN {
        return Err(UpkError::HardwareTooLarge {
            len,
            max: HW_MAX_LEN,
        });
    }
    Ok(padded)
}

/// Write both hardware blobs at the start of the package
pub fn pack_hardware<S>(sink: &mut S, first: &Path, second: &Path) -> Result<HardwareSection>
where
    S: PackageSink + ?Sized,
{
    let first_file = File::open(first).map_err(|e| UpkError::open(first, e))?;
    let second_file = File::open(second).map_err(|e| UpkError::open(second, e))?;

    let first_len = copy_at(sink, 0, first_file, None, 0)?.len;

    // placeholder, rewritten once blob2 is known
    sink.write_at(first_len, &HardwareTrailer::default().to_bytes()?)?;

    let second_start = first_len + HW_TRAILER_SIZE as u64;
    let copied = copy_at(sink, second_start, second_file, None, 0)?;
    let len = second_start + copied.len;
    let padded = padded_len(len)?;

    let trailer = HardwareTrailer {
        crc: copied.crc,
        len: u32::try_from(copied.len).map_err(|_| UpkError::HardwareTooLarge {
            len,
            max: HW_MAX_LEN,
        })?,
    };
    sink.write_at(first_len, &trailer.to_bytes()?)?;
    debug!("hw2 crc 0x{:08x} len {}", trailer.crc, trailer.len);

    if padded > len {
        sink.write_at(len, &vec![0u8; (padded - len) as usize])?;
    }
    info!("hardware section: {len} bytes, padded to {padded}");

    Ok(HardwareSection {
        first_len,
        trailer,
        len: padded,
    })
}
