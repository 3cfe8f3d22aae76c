//! Package builder producing complete `.upk` files

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, WriteBytesExt};

use crate::error::{Result, UpkError};
use crate::hardware::{HardwareSection, pack_hardware};
use crate::layout::{FlashSize, HW_FLAG};
use crate::records::{
    ImageInfo, NAMELEN, PACKAGE_ID, PackageHeader, Signature, VersionInfo, check_len,
};
use crate::signature::pack_signature;
use crate::sink::PackageSink;
use crate::table::{ImageInput, pack_firmware};
use crate::version::{DirVersionSource, VersionSource};
use crate::version_block::{pack_version_info, version_info};

/// Whether the package starts with the two hardware blobs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum HardwareMode {
    #[default]
    Absent,
    Present { first: PathBuf, second: PathBuf },
}

impl HardwareMode {
    pub fn is_present(&self) -> bool {
        matches!(self, HardwareMode::Present { .. })
    }
}

/// Everything written by a successful build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSummary {
    pub hardware: Option<HardwareSection>,
    /// Hardware section plus signature, as stored in the trailer
    pub hardware_len: u64,
    pub header: PackageHeader,
    pub entries: Vec<ImageInfo>,
    pub version: VersionInfo,
    /// Size of the finished package
    pub total_len: u64,
}

impl PackageSummary {
    pub fn print_info(&self) {
        if let Some(hw) = &self.hardware {
            println!(
                "Hardware: {} bytes, hw1 {} bytes, hw2 crc 0x{:08x} len {}",
                hw.len, hw.first_len, hw.trailer.crc, hw.trailer.len
            );
        }
        println!("{}", self.header.summary());
        for entry in &self.entries {
            println!("  {}", entry.summary());
        }
        println!("{}", self.version.summary());
        println!("Total size: {} bytes", self.total_len);
    }
}

/// Builder for firmware update packages
///
/// Collects the package settings and writes the sections in their fixed
/// order: hardware blobs, signature, header with image table and data,
/// version info, trailer.
#[derive(Debug, Clone)]
pub struct PackageBuilder {
    flash: Option<FlashSize>,
    hardware: HardwareMode,
    description: String,
    name: String,
    package_id: String,
    signature: Signature,
    version_dir: PathBuf,
    images: Vec<ImageInput>,
}

impl PackageBuilder {
    pub fn new() -> Self {
        Self {
            flash: None,
            hardware: HardwareMode::Absent,
            description: String::new(),
            name: String::new(),
            package_id: PACKAGE_ID.to_string(),
            signature: Signature::default(),
            version_dir: PathBuf::from("."),
            images: Vec::new(),
        }
    }

    /// Select the flash map; required before building
    pub fn flash_size(mut self, flash: FlashSize) -> Self {
        self.flash = Some(flash);
        self
    }

    pub fn hardware(mut self, mode: HardwareMode) -> Self {
        self.hardware = mode;
        self
    }

    /// Description stored in the version info record
    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    /// Package name stored in the header, truncated to fit
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn package_id(mut self, id: impl Into<String>) -> Self {
        self.package_id = id.into();
        self
    }

    pub fn signature(mut self, signature: Signature) -> Self {
        self.signature = signature;
        self
    }

    /// Directory holding the `*.version` files
    pub fn version_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.version_dir = dir.into();
        self
    }

    pub fn image(mut self, image: ImageInput) -> Self {
        self.images.push(image);
        self
    }

    pub fn images(mut self, images: impl IntoIterator<Item = ImageInput>) -> Self {
        self.images.extend(images);
        self
    }

    /// Check the settings that don't need any input file
    pub fn validate(&self) -> Result<()> {
        if self.flash.is_none() {
            return Err(UpkError::config("flash size not set"));
        }
        if self.images.is_empty() {
            return Err(UpkError::MissingInput);
        }
        check_len("package id", &self.package_id, NAMELEN - 1)?;
        Ok(())
    }

    /// Build the package, reading versions from the configured directory
    pub fn build<S>(&self, sink: &mut S) -> Result<PackageSummary>
    where
        S: PackageSink + ?Sized,
    {
        let versions = DirVersionSource::new(&self.version_dir);
        self.build_with_versions(sink, &versions)
    }

    /// Build the package into `sink`, which should start out empty
    pub fn build_with_versions<S>(
        &self,
        sink: &mut S,
        versions: &dyn VersionSource,
    ) -> Result<PackageSummary>
    where
        S: PackageSink + ?Sized,
    {
        self.validate()?;
        let flash = self.flash.unwrap_or_default();

        let version = version_info(
            &self.description,
            &self.package_id,
            self.hardware.is_present(),
            versions,
        )?;

        let hardware = match &self.hardware {
            HardwareMode::Absent => None,
            HardwareMode::Present { first, second } => Some(pack_hardware(sink, first, second)?),
        };
        let mut hw_len = hardware.map_or(0, |hw| hw.len);

        hw_len += pack_signature(sink, hw_len, &self.signature)?;

        let table = pack_firmware(sink, hw_len, &self.name, flash, &self.images, versions)?;

        pack_version_info(sink, hw_len + u64::from(table.header.head_size), &version)?;

        let mut trailer = Vec::with_capacity(8);
        trailer.write_u32::<LittleEndian>(HW_FLAG)?;
        trailer.write_u32::<LittleEndian>(hw_len as u32)?;
        sink.append(&trailer)?;

        let total_len = sink.end_offset()?;
        info!("package done: {total_len} bytes, {flash} flash");

        Ok(PackageSummary {
            hardware,
            hardware_len: hw_len,
            header: table.header,
            entries: table.entries,
            version,
            total_len,
        })
    }

    /// Build the package into a new file at `path`, replacing any old one
    pub fn build_to_file<P: AsRef<Path>>(&self, path: P) -> Result<PackageSummary> {
        self.validate()?;
        let path = path.as_ref();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| UpkError::open(path, e))?;
        let summary = self.build(&mut file)?;
        file.sync_all()?;
        Ok(summary)
    }
}

impl Default for PackageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc::calculate_crc32;
    use crate::hardware::HW_MAX_LEN;
    use crate::layout::HW_BLOCK_SIZE;
    use crate::records::{PACKAGE_HEADER_SIZE, SIGNATURE_SIZE, UPK_SIGNATURE, VERSION_INFO_SIZE};
    use byteorder::ByteOrder;
    use std::fs;
    use std::io::Cursor;

    struct Fixture {
        dir: tempfile::TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            for (file, ver) in [
                ("u-boot.version", "1.1.3"),
                ("uImage.version", "2.6.15"),
                ("rootfs.version", "3.01"),
                ("hw1.version", "R3"),
                ("hw2.version", "B"),
            ] {
                fs::write(dir.path().join(file), format!("{ver}\n")).unwrap();
            }
            Self { dir }
        }

        fn file(&self, name: &str, data: &[u8]) -> ImageInput {
            let path = self.dir.path().join(name);
            fs::write(&path, data).unwrap();
            ImageInput::new(name, path)
        }

        fn builder(&self) -> PackageBuilder {
            PackageBuilder::new()
                .flash_size(FlashSize::Flash16M)
                .description("test")
                .name("r3.upk")
                .version_dir(self.dir.path())
                .image(self.file("u-boot.bin", &[1u8; 100]))
                .image(self.file("uImage", &[2u8; 100]))
                .image(self.file("root.cramfs", &[3u8; 100]))
        }
    }

    #[test]
    fn test_build_without_hardware() {
        let fixture = Fixture::new();
        let mut sink = Cursor::new(Vec::new());
        let summary = fixture.builder().build(&mut sink).unwrap();
        let out = sink.into_inner();

        assert_eq!(summary.header.image_num, 3);
        assert_eq!(summary.header.reserve & 0x02, 0x02);
        assert_eq!(summary.hardware_len, SIGNATURE_SIZE as u64);
        assert_eq!(summary.total_len as usize, out.len());

        assert_eq!(&out[..UPK_SIGNATURE.len()], UPK_SIGNATURE.as_bytes());

        let tail = &out[out.len() - 8..];
        assert_eq!(LittleEndian::read_u32(tail), 0x55AA_AA55);
        assert_eq!(LittleEndian::read_u32(&tail[4..]), 56);

        // version info in its slot and again before the trailer
        let slot = 56 + summary.header.head_size as usize;
        let copy = out.len() - 8 - VERSION_INFO_SIZE;
        assert_eq!(&out[slot..slot + VERSION_INFO_SIZE], &out[copy..copy + VERSION_INFO_SIZE]);
        assert_eq!(&out[slot..slot + 4], b"test");

        let first = &summary.entries[0];
        assert_eq!(first.start_p as usize, summary.header.head_size as usize + VERSION_INFO_SIZE);
        let data = &out[56 + first.start_p as usize..copy];
        assert_eq!(data.len(), 300);
        assert_eq!(summary.header.data_crc, calculate_crc32(data));
    }

    #[test]
    fn test_build_with_hardware() {
        let fixture = Fixture::new();
        let hw1 = fixture.dir.path().join("hw1.bin");
        let hw2 = fixture.dir.path().join("hw2.bin");
        fs::write(&hw1, [0xAAu8; 300]).unwrap();
        fs::write(&hw2, [0xBBu8; 200]).unwrap();

        let mut sink = Cursor::new(Vec::new());
        let summary = fixture
            .builder()
            .hardware(HardwareMode::Present {
                first: hw1,
                second: hw2,
            })
            .build(&mut sink)
            .unwrap();
        let out = sink.into_inner();

        assert_eq!(summary.hardware_len, HW_BLOCK_SIZE + 56);
        assert_eq!(summary.version.hw1_ver, "R3");
        assert_eq!(summary.version.hw2_ver, "B");

        let sig = HW_BLOCK_SIZE as usize;
        assert_eq!(&out[sig..sig + UPK_SIGNATURE.len()], UPK_SIGNATURE.as_bytes());
        let header = sig + 56;
        assert_eq!(
            LittleEndian::read_u32(&out[header..]),
            summary.header.head_size
        );
        assert_eq!(
            LittleEndian::read_u32(&out[out.len() - 4..]) as u64,
            summary.hardware_len
        );
        assert!(summary.hardware_len <= HW_MAX_LEN + 56);
    }

    #[test]
    fn test_build_requires_flash() {
        let fixture = Fixture::new();
        let builder = PackageBuilder::new()
            .description("test")
            .version_dir(fixture.dir.path())
            .image(fixture.file("uImage", b"kernel"));

        let mut sink = Cursor::new(Vec::new());
        assert!(matches!(builder.build(&mut sink), Err(UpkError::Config(_))));
        assert!(sink.get_ref().is_empty());
    }

    #[test]
    fn test_build_requires_images() {
        let builder = PackageBuilder::new().flash_size(FlashSize::Flash8M);
        let mut sink = Cursor::new(Vec::new());
        assert!(matches!(builder.build(&mut sink), Err(UpkError::MissingInput)));
    }

    #[test]
    fn test_long_description_writes_nothing() {
        let fixture = Fixture::new();
        let mut sink = Cursor::new(Vec::new());
        let result = fixture
            .builder()
            .description("d".repeat(40))
            .build(&mut sink);

        assert!(matches!(result, Err(UpkError::FieldTooLong { .. })));
        assert!(sink.get_ref().is_empty());
    }

    #[test]
    fn test_build_to_file() {
        let fixture = Fixture::new();
        let out = fixture.dir.path().join("r3.upk");
        fs::write(&out, vec![0xEEu8; 100_000]).unwrap();

        let summary = fixture.builder().build_to_file(&out).unwrap();
        let data = fs::read(&out).unwrap();
        assert_eq!(data.len() as u64, summary.total_len);
        assert_eq!(
            LittleEndian::read_u32(&data[56..]) as usize,
            PACKAGE_HEADER_SIZE + 3 * 72
        );
    }
}
