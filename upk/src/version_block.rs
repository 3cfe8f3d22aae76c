//! Version info block writer
//!
//! The record is written twice: once in the slot reserved right after the
//! image table, once more at the end of the package.

use crate::error::Result;
use crate::records::{DESCLEN, VERLEN, VersionInfo, check_len};
use crate::sink::PackageSink;
use crate::version::{VER_HW2_LEN, VersionFile, VersionSource};

/// Build the version info record
///
/// Hardware revisions are only read when the package has a hardware
/// section; otherwise they keep their defaults.
pub fn version_info(
    desc: &str,
    pack_id: &str,
    has_hardware: bool,
    versions: &dyn VersionSource,
) -> Result<VersionInfo> {
    check_len("description", desc, DESCLEN - 1)?;

    let mut info = VersionInfo {
        desc: desc.to_string(),
        pack_id: pack_id.to_string(),
        ..Default::default()
    };

    if has_hardware {
        info.hw1_ver = versions.bounded_version(VersionFile::Hw1, VERLEN - 1)?;
        info.hw2_ver = versions.bounded_version(VersionFile::Hw2, VER_HW2_LEN)?;
    }
    info.os_ver = versions.bounded_version(VersionFile::Kernel, VERLEN - 1)?;
    info.app_ver = versions.bounded_version(VersionFile::Rootfs, VERLEN - 1)?;

    info.validate()?;
    Ok(info)
}

/// Write `info` at `offset`, then append a copy at the end of the package
pub fn pack_version_info<S>(sink: &mut S, offset: u64, info: &VersionInfo) -> Result<()>
where
    S: PackageSink + ?Sized,
{
    let bytes = info.to_bytes()?;
    sink.write_at(offset, &bytes)?;
    let tail = sink.append(&bytes)?;
    debug!("version info at 0x{offset:x} and 0x{tail:x}");
    Ok(())
}
