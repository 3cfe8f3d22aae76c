//! Fixed-layout records of the UPK package
//!
//! Every record is serialized field by field in little-endian order with
//! zero-padded string fields, so the byte layout matches what the flash
//! loader reads on the device.

use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};

use crate::crc::calculate_crc32;
use crate::error::{Result, UpkError};
use crate::image_types::ImageKind;

/// Width of name fields
pub const NAMELEN: usize = 32;
/// Width of version fields
pub const VERLEN: usize = 20;
/// Width of the package description
pub const DESCLEN: usize = 40;
/// Width of the signature string
pub const SIGNATURELEN: usize = 52;

pub const PACKAGE_HEADER_SIZE: usize = 5 * 4 + NAMELEN + 3 * VERLEN + 4;
pub const IMAGE_INFO_SIZE: usize = 5 * 4 + NAMELEN + VERLEN;
pub const VERSION_INFO_SIZE: usize = DESCLEN + NAMELEN + 4 * VERLEN;
pub const SIGNATURE_SIZE: usize = SIGNATURELEN + 4;
pub const HW_TRAILER_SIZE: usize = 8;

/// Package identifier stored in the version info
pub const PACKAGE_ID: &str = "neuros-osd";
/// Identification string of the signature block
pub const UPK_SIGNATURE: &str = "Neuros Technology International LLC";

/// Hardware revision used when the package carries no hardware section
pub const DEFAULT_HW_VERSION: &str = "D.ev";
/// OS/application version used before the version files are read
pub const DEFAULT_SW_VERSION: &str = "0.00";

/// Reject `value` if it does not fit in `max` bytes
pub fn check_len(field: &'static str, value: &str, max: usize) -> Result<()> {
    if value.len() > max {
        return Err(UpkError::field_too_long(field, value.len(), max));
    }
    Ok(())
}

/// Cut a name down to what fits a name field with its terminator
pub fn truncate_name(name: &str) -> String {
    let mut end = name.len().min(NAMELEN - 1);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    name[..end].to_string()
}

fn write_padded<W: Write>(writer: &mut W, value: &str, width: usize) -> Result<()> {
    let bytes = value.as_bytes();
    let len = bytes.len().min(width);
    writer.write_all(&bytes[..len])?;
    writer.write_all(&vec![0u8; width - len])?;
    Ok(())
}

/// Package header, followed on disk by the image table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageHeader {
    /// Header plus image table size
    pub head_size: u32,
    /// Bits[1:0] flash variant, bit 2 always set
    pub reserve: u32,
    pub head_crc: u32,
    /// Size of the images covered by `data_crc`
    pub data_size: u32,
    pub data_crc: u32,
    pub name: String,
    pub v_uboot: String,
    pub v_kernel: String,
    pub v_rootfs: String,
    pub image_num: u32,
}

impl PackageHeader {
    /// Header size for a table of `image_num` entries
    pub fn size_for(image_num: usize) -> u32 {
        (PACKAGE_HEADER_SIZE + image_num * IMAGE_INFO_SIZE) as u32
    }

    pub fn validate(&self) -> Result<()> {
        check_len("package name", &self.name, NAMELEN - 1)?;
        check_len("u-boot version", &self.v_uboot, VERLEN - 1)?;
        check_len("kernel version", &self.v_kernel, VERLEN - 1)?;
        check_len("rootfs version", &self.v_rootfs, VERLEN - 1)?;
        Ok(())
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(self.head_size)?;
        writer.write_u32::<LittleEndian>(self.reserve)?;
        writer.write_u32::<LittleEndian>(self.head_crc)?;
        writer.write_u32::<LittleEndian>(self.data_size)?;
        writer.write_u32::<LittleEndian>(self.data_crc)?;
        write_padded(writer, &self.name, NAMELEN)?;
        write_padded(writer, &self.v_uboot, VERLEN)?;
        write_padded(writer, &self.v_kernel, VERLEN)?;
        write_padded(writer, &self.v_rootfs, VERLEN)?;
        writer.write_u32::<LittleEndian>(self.image_num)?;
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.validate()?;
        let mut buffer = Vec::with_capacity(PACKAGE_HEADER_SIZE);
        self.write_to(&mut buffer)?;
        Ok(buffer)
    }

    pub fn summary(&self) -> String {
        format!(
            "Package: {}\n\
             Header size: {} Reserve: 0x{:x} Header CRC: 0x{:08x}\n\
             Data size: {} Data CRC: 0x{:08x}\n\
             Depends on: u-boot {} kernel {} rootfs {}\n\
             Images: {}",
            self.name,
            self.head_size,
            self.reserve,
            self.head_crc,
            self.data_size,
            self.data_crc,
            self.v_uboot,
            self.v_kernel,
            self.v_rootfs,
            self.image_num
        )
    }
}

/// One entry of the image table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    pub kind: ImageKind,
    /// Bytes occupied in the package, own checksum included
    pub image_size: u32,
    /// Offset from the start of the package header
    pub start_p: u32,
    /// Flash destination, zero for kinds without an address
    pub start_f: u32,
    pub end_f: u32,
    pub name: String,
    pub version: String,
}

impl ImageInfo {
    pub fn validate(&self) -> Result<()> {
        check_len("image name", &self.name, NAMELEN - 1)?;
        check_len("image version", &self.version, VERLEN - 1)?;
        Ok(())
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(self.kind.tag())?;
        writer.write_u32::<LittleEndian>(self.image_size)?;
        writer.write_u32::<LittleEndian>(self.start_p)?;
        writer.write_u32::<LittleEndian>(self.start_f)?;
        writer.write_u32::<LittleEndian>(self.end_f)?;
        write_padded(writer, &self.name, NAMELEN)?;
        write_padded(writer, &self.version, VERLEN)?;
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.validate()?;
        let mut buffer = Vec::with_capacity(IMAGE_INFO_SIZE);
        self.write_to(&mut buffer)?;
        Ok(buffer)
    }

    /// Offset just past the image data
    pub fn end_p(&self) -> u32 {
        self.start_p + self.image_size
    }

    pub fn summary(&self) -> String {
        format!(
            "{:<32} {:<8} {:>10} @0x{:08x} flash 0x{:08x}-0x{:08x} ver {}",
            self.name,
            self.kind,
            self.image_size,
            self.start_p,
            self.start_f,
            self.end_f,
            self.version
        )
    }
}

/// Description and version record, stored twice in the package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    pub desc: String,
    pub pack_id: String,
    pub hw1_ver: String,
    pub hw2_ver: String,
    pub os_ver: String,
    pub app_ver: String,
}

impl Default for VersionInfo {
    fn default() -> Self {
        Self {
            desc: String::new(),
            pack_id: PACKAGE_ID.to_string(),
            hw1_ver: DEFAULT_HW_VERSION.to_string(),
            hw2_ver: DEFAULT_HW_VERSION.to_string(),
            os_ver: DEFAULT_SW_VERSION.to_string(),
            app_ver: DEFAULT_SW_VERSION.to_string(),
        }
    }
}

impl VersionInfo {
    pub fn validate(&self) -> Result<()> {
        check_len("description", &self.desc, DESCLEN - 1)?;
        check_len("package id", &self.pack_id, NAMELEN - 1)?;
        check_len("hw1 version", &self.hw1_ver, VERLEN - 1)?;
        check_len("hw2 version", &self.hw2_ver, VERLEN - 1)?;
        check_len("os version", &self.os_ver, VERLEN - 1)?;
        check_len("app version", &self.app_ver, VERLEN - 1)?;
        Ok(())
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_padded(writer, &self.desc, DESCLEN)?;
        write_padded(writer, &self.pack_id, NAMELEN)?;
        write_padded(writer, &self.hw1_ver, VERLEN)?;
        write_padded(writer, &self.hw2_ver, VERLEN)?;
        write_padded(writer, &self.os_ver, VERLEN)?;
        write_padded(writer, &self.app_ver, VERLEN)?;
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.validate()?;
        let mut buffer = Vec::with_capacity(VERSION_INFO_SIZE);
        self.write_to(&mut buffer)?;
        Ok(buffer)
    }

    pub fn summary(&self) -> String {
        format!(
            "Description: {}\n\
             Package id: {}\n\
             HW1: {} HW2: {} OS: {} App: {}",
            self.desc, self.pack_id, self.hw1_ver, self.hw2_ver, self.os_ver, self.app_ver
        )
    }
}

/// Identification block placed in front of the package header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    string: String,
}

impl Default for Signature {
    fn default() -> Self {
        Self {
            string: UPK_SIGNATURE.to_string(),
        }
    }
}

impl Signature {
    pub fn new(string: impl Into<String>) -> Result<Self> {
        let string = string.into();
        check_len("signature", &string, SIGNATURELEN)?;
        Ok(Self { string })
    }

    pub fn string(&self) -> &str {
        &self.string
    }

    fn padded(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(SIGNATURELEN);
        write_padded(&mut buffer, &self.string, SIGNATURELEN)?;
        Ok(buffer)
    }

    /// CRC32 of the zero padded string field
    pub fn crc(&self) -> Result<u32> {
        Ok(calculate_crc32(&self.padded()?))
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        let padded = self.padded()?;
        writer.write_all(&padded)?;
        writer.write_u32::<LittleEndian>(calculate_crc32(&padded))?;
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(SIGNATURE_SIZE);
        self.write_to(&mut buffer)?;
        Ok(buffer)
    }
}

/// Checksum and length of the second hardware blob
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HardwareTrailer {
    pub crc: u32,
    pub len: u32,
}

impl HardwareTrailer {
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(self.crc)?;
        writer.write_u32::<LittleEndian>(self.len)?;
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(HW_TRAILER_SIZE);
        self.write_to(&mut buffer)?;
        Ok(buffer)
    }
}
