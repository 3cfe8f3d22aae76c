//! Signature block writer

use crate::error::Result;
use crate::records::{SIGNATURE_SIZE, Signature};
use crate::sink::PackageSink;

/// Write the signature block at `offset`, returning its length
pub fn pack_signature<S>(sink: &mut S, offset: u64, signature: &Signature) -> Result<u64>
where
    S: PackageSink + ?Sized,
{
    let bytes = signature.to_bytes()?;
    sink.write_at(offset, &bytes)?;
    debug!(
        "signature {:?} crc 0x{:08x} at 0x{offset:x}",
        signature.string(),
        signature.crc()?
    );
    Ok(SIGNATURE_SIZE as u64)
}
