//! Version strings read from small text files
//!
//! Each component ships a `<name>.version` file next to its image. Only the
//! first line is used.

use std::fmt;
use std::fs;
use std::path::PathBuf;

use crate::error::{Result, UpkError};

/// Longest dependency version accepted in the package header
pub const VER_LIMIT_LEN: usize = 14;

/// Longest second hardware revision string
pub const VER_HW2_LEN: usize = 4;

/// Known version files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VersionFile {
    Uboot,
    Kernel,
    Rootfs,
    Extapp,
    Hw1,
    Hw2,
}

impl VersionFile {
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Uboot => "u-boot.version",
            Self::Kernel => "uImage.version",
            Self::Rootfs => "rootfs.version",
            Self::Extapp => "extapp.version",
            Self::Hw1 => "hw1.version",
            Self::Hw2 => "hw2.version",
        }
    }
}

impl fmt::Display for VersionFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file_name())
    }
}

/// Supplies the version string of a component
pub trait VersionSource {
    /// First line of the version file, without the line terminator
    fn version(&self, file: VersionFile) -> Result<String>;

    /// Same as [`VersionSource::version`], rejecting strings longer than `max`
    fn bounded_version(&self, file: VersionFile, max: usize) -> Result<String> {
        let version = self.version(file)?;
        if version.len() > max {
            return Err(UpkError::VersionTooLong {
                file: file.file_name(),
                len: version.len(),
                max,
            });
        }
        Ok(version)
    }
}

/// Reads version files from one directory
#[derive(Debug, Clone)]
pub struct DirVersionSource {
    dir: PathBuf,
}

impl DirVersionSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl VersionSource for DirVersionSource {
    fn version(&self, file: VersionFile) -> Result<String> {
        let path = self.dir.join(file.file_name());
        let raw = fs::read(&path).map_err(|e| UpkError::open(&path, e))?;
        let version = first_line(&raw);
        debug!("{}: {:?}", path.display(), version);
        Ok(version)
    }
}

/// Text before the first CR or LF
pub fn first_line(raw: &[u8]) -> String {
    let end = raw
        .iter()
        .position(|&b| b == b'\r' || b == b'\n')
        .unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_first_line() {
        assert_eq!(first_line(b"1.2.3\n"), "1.2.3");
        assert_eq!(first_line(b"1.2.3\r\n"), "1.2.3");
        assert_eq!(first_line(b"1.2.3"), "1.2.3");
        assert_eq!(first_line(b"a\nb\n"), "a");
        assert_eq!(first_line(b""), "");
    }

    #[test]
    fn test_dir_source() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("uImage.version"), "2.6.15-r3\n").unwrap();

        let source = DirVersionSource::new(dir.path());
        assert_eq!(source.version(VersionFile::Kernel).unwrap(), "2.6.15-r3");
        assert!(matches!(
            source.version(VersionFile::Uboot),
            Err(UpkError::Open { .. })
        ));
    }

    #[test]
    fn test_bounded_version() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("hw2.version"), "A1\n").unwrap();
        fs::write(dir.path().join("hw1.version"), "rev-B-0001\n").unwrap();

        let source = DirVersionSource::new(dir.path());
        assert_eq!(
            source.bounded_version(VersionFile::Hw2, VER_HW2_LEN).unwrap(),
            "A1"
        );
        let err = source
            .bounded_version(VersionFile::Hw1, VER_HW2_LEN)
            .unwrap_err();
        assert!(matches!(
            err,
            UpkError::VersionTooLong {
                file: "hw1.version",
                len: 10,
                max: 4
            }
        ));
    }
}
