//! Image table builder
//!
//! Section layout, relative to the start of the package header:
//!
//! ```text
//! header (116) | image table (n * 72) | version info slot (152) | image data ...
//! ```
//!
//! The number of entries is fixed before any image is written, so every table
//! slot and the start of the data region are known up front.

use std::fs::{self, File};
use std::io::{Seek, SeekFrom};
use std::path::PathBuf;

use byteorder::{LittleEndian, WriteBytesExt};

use crate::crc::crc32;
use crate::error::{Result, UpkError};
use crate::image_types::ImageKind;
use crate::layout::{FlashMap, FlashRange, FlashSize, SPLIT_THRESHOLD};
use crate::records::{
    IMAGE_INFO_SIZE, ImageInfo, PACKAGE_HEADER_SIZE, PackageHeader, VERLEN, VERSION_INFO_SIZE,
    truncate_name,
};
use crate::sink::{PackageSink, copy_at};
use crate::version::{VER_LIMIT_LEN, VersionFile, VersionSource};

/// An image to package: the name it is classified by and where to read it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInput {
    pub name: String,
    pub path: PathBuf,
}

impl ImageInput {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    /// Use the path as given as the image name
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: path.to_string_lossy().into_owned(),
            path,
        }
    }
}

/// Which bytes of the source file a table entry takes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Part {
    Whole,
    /// First `SPLIT_THRESHOLD` bytes of a split root filesystem
    SplitHead,
    /// Everything after `SPLIT_THRESHOLD`
    SplitTail,
}

impl Part {
    fn skip(self) -> u64 {
        match self {
            Part::SplitTail => SPLIT_THRESHOLD,
            _ => 0,
        }
    }

    fn limit(self) -> Option<u64> {
        match self {
            Part::SplitHead => Some(SPLIT_THRESHOLD),
            _ => None,
        }
    }
}

/// One planned table entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSlot {
    pub kind: ImageKind,
    pub input: ImageInput,
    pub part: Part,
    pub range: Option<FlashRange>,
}

impl ImageSlot {
    /// Name recorded in the table
    pub fn table_name(&self) -> String {
        match self.kind.table_name() {
            Some(name) => name.to_string(),
            None => truncate_name(&self.input.name),
        }
    }
}

/// Classified inputs with the root filesystem split applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TablePlan {
    slots: Vec<ImageSlot>,
}

impl TablePlan {
    /// Classify `inputs` and decide where each lands in flash
    ///
    /// The first root filesystem is checked against the flash map: it is
    /// rejected if it can't fit at all, and split in two entries when it is
    /// larger than [`SPLIT_THRESHOLD`].
    pub fn new(inputs: &[ImageInput], map: &FlashMap) -> Result<Self> {
        if inputs.is_empty() {
            return Err(UpkError::MissingInput);
        }

        let mut slots = Vec::with_capacity(inputs.len() + 1);
        let mut seen_rootfs = false;

        for input in inputs {
            let kind = ImageKind::classify(&input.name);
            let range = match kind {
                ImageKind::Uboot => Some(map.uboot),
                ImageKind::Kernel => Some(map.kernel),
                ImageKind::Cramfs => Some(map.rootfs),
                ImageKind::Script | ImageKind::Compress => None,
            };

            if kind == ImageKind::Cramfs && !seen_rootfs {
                seen_rootfs = true;
                let size = fs::metadata(&input.path)
                    .map_err(|e| UpkError::open(&input.path, e))?
                    .len();
                let capacity = map.rootfs_capacity();
                if size > capacity {
                    return Err(UpkError::ImageTooLarge {
                        name: input.name.clone(),
                        size,
                        capacity,
                    });
                }
                if let Some(ext) = map.rootfs_ext.filter(|_| size > SPLIT_THRESHOLD) {
                    info!(
                        "{} is {size} bytes, bigger than 0x{SPLIT_THRESHOLD:x}, splitting it",
                        input.name
                    );
                    slots.push(ImageSlot {
                        kind,
                        input: input.clone(),
                        part: Part::SplitHead,
                        range,
                    });
                    slots.push(ImageSlot {
                        kind,
                        input: input.clone(),
                        part: Part::SplitTail,
                        range: Some(ext),
                    });
                    continue;
                }
            }

            slots.push(ImageSlot {
                kind,
                input: input.clone(),
                part: Part::Whole,
                range,
            });
        }

        Ok(Self { slots })
    }

    pub fn slots(&self) -> &[ImageSlot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Header plus table size
    pub fn head_size(&self) -> u32 {
        PackageHeader::size_for(self.slots.len())
    }

    /// Offset of table entry `index`, relative to the header
    pub fn entry_offset(index: usize) -> u64 {
        (PACKAGE_HEADER_SIZE + index * IMAGE_INFO_SIZE) as u64
    }

    /// Offset of the first image byte, relative to the header
    pub fn data_offset(&self) -> u64 {
        u64::from(self.head_size()) + VERSION_INFO_SIZE as u64
    }
}

/// Header and table as written to the package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageTable {
    pub header: PackageHeader,
    pub entries: Vec<ImageInfo>,
}

impl ImageTable {
    /// CRC over the header (with a zero checksum field) followed by the table
    pub fn header_crc(&self) -> Result<u32> {
        let mut header = self.header.clone();
        header.head_crc = 0;
        let mut crc = crc32(0, &header.to_bytes()?);
        for entry in &self.entries {
            crc = crc32(crc, &entry.to_bytes()?);
        }
        Ok(crc)
    }
}

fn to_u32(name: &str, size: u64) -> Result<u32> {
    u32::try_from(size).map_err(|_| UpkError::ImageTooLarge {
        name: name.to_string(),
        size,
        capacity: u64::from(u32::MAX),
    })
}

/// Write header, image table and image data starting at `base`
///
/// Returns the header and table that were written. Nothing is written when
/// the inputs don't fit the flash map or a version string is invalid.
pub fn pack_firmware<S>(
    sink: &mut S,
    base: u64,
    name: &str,
    flash: FlashSize,
    inputs: &[ImageInput],
    versions: &dyn VersionSource,
) -> Result<ImageTable>
where
    S: PackageSink + ?Sized,
{
    let v_uboot = versions.bounded_version(VersionFile::Uboot, VER_LIMIT_LEN)?;
    let v_kernel = versions.bounded_version(VersionFile::Kernel, VER_LIMIT_LEN)?;
    let v_rootfs = versions.bounded_version(VersionFile::Rootfs, VER_LIMIT_LEN)?;

    let plan = TablePlan::new(inputs, &flash.map())?;

    let mut table = ImageTable {
        header: PackageHeader {
            head_size: plan.head_size(),
            reserve: flash.reserve_bits(),
            head_crc: 0,
            data_size: 0,
            data_crc: 0,
            name: truncate_name(name),
            v_uboot,
            v_kernel,
            v_rootfs,
            image_num: plan.len() as u32,
        },
        entries: Vec::with_capacity(plan.len()),
    };

    let mut curptr = plan.data_offset();
    let mut data_size = 0u64;

    for (index, slot) in plan.slots().iter().enumerate() {
        let version = match slot.kind.version_file() {
            Some(file @ VersionFile::Extapp) => versions.bounded_version(file, VER_LIMIT_LEN)?,
            Some(file) => versions.bounded_version(file, VERLEN - 1)?,
            None => String::new(),
        };

        let path = &slot.input.path;
        let mut file = File::open(path).map_err(|e| UpkError::open(path, e))?;
        if slot.part.skip() > 0 {
            file.seek(SeekFrom::Start(slot.part.skip()))?;
        }

        let start = base + curptr;
        let size = if slot.kind.in_data_crc() {
            let copied = copy_at(sink, start, file, slot.part.limit(), table.header.data_crc)?;
            table.header.data_crc = copied.crc;
            data_size += copied.len;
            copied.len
        } else {
            let copied = copy_at(sink, start, file, slot.part.limit(), 0)?;
            let mut own_crc = Vec::with_capacity(4);
            own_crc.write_u32::<LittleEndian>(copied.crc)?;
            sink.write_at(start + copied.len, &own_crc)?;
            copied.len + own_crc.len() as u64
        };

        let entry = ImageInfo {
            kind: slot.kind,
            image_size: to_u32(&slot.input.name, size)?,
            start_p: to_u32(&slot.input.name, curptr)?,
            start_f: slot.range.map_or(0, |r| r.start),
            end_f: slot.range.map_or(0, |r| r.end),
            name: slot.table_name(),
            version,
        };
        sink.write_at(base + TablePlan::entry_offset(index), &entry.to_bytes()?)?;
        debug!("{}", entry.summary());

        curptr += size;
        table.entries.push(entry);
    }

    table.header.data_size = to_u32(name, data_size)?;
    table.header.head_crc = table.header_crc()?;
    sink.write_at(base, &table.header.to_bytes()?)?;
    info!(
        "{} images, data size {} crc 0x{:08x}, header crc 0x{:08x}",
        table.header.image_num,
        table.header.data_size,
        table.header.data_crc,
        table.header.head_crc
    );

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc::calculate_crc32;
    use crate::layout::{FLASH_MAP_8M, FLASH_MAP_16M};
    use crate::version::DirVersionSource;
    use byteorder::ByteOrder;
    use std::io::Cursor;
    use std::path::Path;

    fn write_versions(dir: &Path) {
        fs::write(dir.join("u-boot.version"), "1.1.3\n").unwrap();
        fs::write(dir.join("uImage.version"), "2.6.15\n").unwrap();
        fs::write(dir.join("rootfs.version"), "3.01\n").unwrap();
        fs::write(dir.join("extapp.version"), "1.0\n").unwrap();
    }

    fn input(dir: &Path, name: &str, data: &[u8]) -> ImageInput {
        let path = dir.join(name);
        fs::write(&path, data).unwrap();
        ImageInput::new(name, path)
    }

    #[test]
    fn test_plan_small_rootfs() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = vec![
            input(dir.path(), "u-boot.bin", b"boot"),
            input(dir.path(), "root.cramfs", &[0u8; 100]),
        ];
        let plan = TablePlan::new(&inputs, &FLASH_MAP_16M).unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.slots()[1].part, Part::Whole);
        assert_eq!(plan.slots()[1].range, Some(FLASH_MAP_16M.rootfs));
        assert_eq!(plan.head_size(), 116 + 2 * 72);
        assert_eq!(plan.data_offset(), 116 + 2 * 72 + 152);
    }

    #[test]
    fn test_plan_split_rootfs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("root.cramfs");
        let file = File::create(&path).unwrap();
        file.set_len(SPLIT_THRESHOLD + 1).unwrap();
        let inputs = vec![
            ImageInput::new("root.cramfs", &path),
            input(dir.path(), "uImage", b"kernel"),
        ];

        let plan = TablePlan::new(&inputs, &FLASH_MAP_16M).unwrap();
        assert_eq!(plan.len(), 3);
        assert_eq!(plan.slots()[0].part, Part::SplitHead);
        assert_eq!(plan.slots()[0].range, Some(FLASH_MAP_16M.rootfs));
        assert_eq!(plan.slots()[1].part, Part::SplitTail);
        assert_eq!(plan.slots()[1].range, FLASH_MAP_16M.rootfs_ext);
        assert_eq!(plan.slots()[0].kind, ImageKind::Cramfs);
        assert_eq!(plan.slots()[1].kind, ImageKind::Cramfs);
        assert_eq!(plan.slots()[0].table_name(), "root.cramfs");
        assert_eq!(plan.slots()[1].table_name(), "root.cramfs");
        assert_eq!(plan.slots()[2].kind, ImageKind::Kernel);
        assert_eq!(plan.head_size(), 116 + 3 * 72);
    }

    #[test]
    fn test_plan_threshold_is_not_split() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("root.cramfs");
        File::create(&path).unwrap().set_len(SPLIT_THRESHOLD).unwrap();

        let plan =
            TablePlan::new(&[ImageInput::new("root.cramfs", &path)], &FLASH_MAP_16M).unwrap();
        assert_eq!(plan.len(), 1);
    }

    #[test]
    fn test_plan_rootfs_too_large() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("root.cramfs");
        File::create(&path)
            .unwrap()
            .set_len(FLASH_MAP_16M.rootfs_capacity() + 1)
            .unwrap();

        let err = TablePlan::new(&[ImageInput::new("root.cramfs", &path)], &FLASH_MAP_16M)
            .unwrap_err();
        assert!(matches!(err, UpkError::ImageTooLarge { .. }));
    }

    #[test]
    fn test_plan_8m_never_splits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("root.cramfs");
        File::create(&path)
            .unwrap()
            .set_len(FLASH_MAP_8M.rootfs_capacity() + 1)
            .unwrap();

        assert!(matches!(
            TablePlan::new(&[ImageInput::new("root.cramfs", &path)], &FLASH_MAP_8M),
            Err(UpkError::ImageTooLarge { .. })
        ));
    }

    #[test]
    fn test_plan_empty() {
        assert!(matches!(
            TablePlan::new(&[], &FLASH_MAP_16M),
            Err(UpkError::MissingInput)
        ));
    }

    #[test]
    fn test_pack_firmware_offsets_and_crcs() {
        let dir = tempfile::tempdir().unwrap();
        write_versions(dir.path());
        let boot = vec![0xB0u8; 100];
        let kernel = vec![0x4Bu8; 300];
        let app = b"compressed application".to_vec();
        let inputs = vec![
            input(dir.path(), "u-boot.bin", &boot),
            input(dir.path(), "apps.gz", &app),
            input(dir.path(), "uImage", &kernel),
        ];
        let versions = DirVersionSource::new(dir.path());

        let base = 56u64;
        let mut sink = Cursor::new(Vec::new());
        let table = pack_firmware(
            &mut sink,
            base,
            "r3.upk",
            FlashSize::Flash16M,
            &inputs,
            &versions,
        )
        .unwrap();
        let out = sink.into_inner();

        let header = &table.header;
        assert_eq!(header.image_num, 3);
        assert_eq!(header.head_size, 116 + 3 * 72);
        assert_eq!(header.reserve, 0x06);
        assert_eq!(header.data_size, 400);

        let mut expected = Vec::new();
        expected.extend_from_slice(&boot);
        expected.extend_from_slice(&kernel);
        assert_eq!(header.data_crc, calculate_crc32(&expected));

        let entries = &table.entries;
        assert_eq!(entries[0].start_p as u64, 116 + 3 * 72 + 152);
        for pair in entries.windows(2) {
            assert_eq!(pair[1].start_p, pair[0].end_p());
        }

        // generic image: data followed by its own crc
        let app_entry = &entries[1];
        assert_eq!(app_entry.kind, ImageKind::Compress);
        assert_eq!(app_entry.image_size as usize, app.len() + 4);
        assert_eq!((app_entry.start_f, app_entry.end_f), (0, 0));
        assert_eq!(app_entry.version, "1.0");
        let start = base as usize + app_entry.start_p as usize;
        assert_eq!(&out[start..start + app.len()], &app[..]);
        assert_eq!(
            LittleEndian::read_u32(&out[start + app.len()..]),
            calculate_crc32(&app)
        );

        assert_eq!(entries[2].start_f, FLASH_MAP_16M.kernel.start);
        assert_eq!(entries[2].version, "2.6.15");

        // header on disk carries the crc over header and table
        let head = base as usize;
        assert_eq!(&out[head..head + 116], &header.to_bytes().unwrap()[..]);
        let mut on_disk = out[head..head + header.head_size as usize].to_vec();
        on_disk[8..12].fill(0);
        assert_eq!(header.head_crc, calculate_crc32(&on_disk));
    }

    #[test]
    fn test_pack_firmware_long_version() {
        let dir = tempfile::tempdir().unwrap();
        write_versions(dir.path());
        fs::write(dir.path().join("u-boot.version"), "1.1.3-very-long-tag\n").unwrap();
        let inputs = vec![input(dir.path(), "u-boot.bin", b"boot")];

        let mut sink = Cursor::new(Vec::new());
        let err = pack_firmware(
            &mut sink,
            0,
            "r3.upk",
            FlashSize::Flash16M,
            &inputs,
            &DirVersionSource::new(dir.path()),
        )
        .unwrap_err();
        assert!(matches!(err, UpkError::VersionTooLong { file: "u-boot.version", .. }));
        assert!(sink.get_ref().is_empty());
    }

    #[test]
    fn test_pack_firmware_missing_image() {
        let dir = tempfile::tempdir().unwrap();
        write_versions(dir.path());
        let inputs = vec![
            input(dir.path(), "u-boot.bin", b"boot"),
            ImageInput::from_path(dir.path().join("uImage")),
        ];

        let mut sink = Cursor::new(Vec::new());
        let err = pack_firmware(
            &mut sink,
            0,
            "r3.upk",
            FlashSize::Flash16M,
            &inputs,
            &DirVersionSource::new(dir.path()),
        )
        .unwrap_err();
        assert!(matches!(err, UpkError::Open { .. }));
    }
}
