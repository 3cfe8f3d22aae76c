//! Random-access output for the package
//!
//! The assembler computes every offset up front and writes each record at
//! its final position, so the output only needs "write here" and "append".

use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};

use crate::crc::crc32;
use crate::error::Result;

const COPY_CHUNK: usize = 64 * 1024;

/// Destination of a package build
pub trait PackageSink {
    /// Write `buf` starting at `offset`
    fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<()>;

    /// Write `buf` at the current end, returning the offset it landed at
    fn append(&mut self, buf: &[u8]) -> Result<u64>;

    /// Current end of the package
    fn end_offset(&mut self) -> Result<u64>;
}

impl<T: Write + Seek> PackageSink for T {
    fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<()> {
        self.seek(SeekFrom::Start(offset))?;
        self.write_all(buf)?;
        Ok(())
    }

    fn append(&mut self, buf: &[u8]) -> Result<u64> {
        let offset = self.seek(SeekFrom::End(0))?;
        self.write_all(buf)?;
        Ok(offset)
    }

    fn end_offset(&mut self) -> Result<u64> {
        Ok(self.seek(SeekFrom::End(0))?)
    }
}

/// Result of [`copy_at`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Copied {
    /// Number of bytes written
    pub len: u64,
    /// Running checksum after the copied bytes
    pub crc: u32,
}

/// Copy `reader` into the sink at `offset`, at most `limit` bytes
///
/// Every copied byte is folded into `crc`, which is returned updated.
pub fn copy_at<S, R>(
    sink: &mut S,
    offset: u64,
    reader: R,
    limit: Option<u64>,
    crc: u32,
) -> Result<Copied>
where
    S: PackageSink + ?Sized,
    R: Read,
{
    let mut reader = reader.take(limit.unwrap_or(u64::MAX));
    let mut buf = vec![0u8; COPY_CHUNK];
    let mut copied = Copied { len: 0, crc };

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        sink.write_at(offset + copied.len, &buf[..n])?;
        copied.crc = crc32(copied.crc, &buf[..n]);
        copied.len += n as u64;
    }

    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc::calculate_crc32;
    use std::io::Cursor;

    #[test]
    fn test_write_at_extends_with_zeros() {
        let mut sink = Cursor::new(Vec::new());
        sink.write_at(4, b"abcd").unwrap();
        assert_eq!(sink.get_ref(), b"\0\0\0\0abcd");
        sink.write_at(0, b"xy").unwrap();
        assert_eq!(sink.get_ref(), b"xy\0\0abcd");
    }

    #[test]
    fn test_append_goes_to_end() {
        let mut sink = Cursor::new(Vec::new());
        sink.write_at(0, b"0123456789").unwrap();
        sink.write_at(2, b"ab").unwrap();
        assert_eq!(sink.append(b"!").unwrap(), 10);
        assert_eq!(sink.end_offset().unwrap(), 11);
        assert_eq!(sink.get_ref(), b"01ab456789!");
    }

    #[test]
    fn test_copy_at_with_limit() {
        let data: Vec<u8> = (0..=255u8).cycle().take(200_000).collect();
        let mut sink = Cursor::new(Vec::new());

        let copied = copy_at(&mut sink, 8, &data[..], Some(150_000), 0).unwrap();
        assert_eq!(copied.len, 150_000);
        assert_eq!(copied.crc, calculate_crc32(&data[..150_000]));
        assert_eq!(&sink.get_ref()[8..], &data[..150_000]);
    }

    #[test]
    fn test_copy_at_threads_crc() {
        let mut sink = Cursor::new(Vec::new());
        let first = copy_at(&mut sink, 0, &b"hello "[..], None, 0).unwrap();
        let second = copy_at(&mut sink, first.len, &b"world"[..], None, first.crc).unwrap();
        assert_eq!(second.crc, calculate_crc32(b"hello world"));
        assert_eq!(sink.get_ref(), b"hello world");
    }
}
