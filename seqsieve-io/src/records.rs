use std::io::{Read, Write};

use crate::errors::IoError;

/// A record with a fixed little-endian on-disk layout.
///
/// Every table record of the cluster pipeline (seed entries, pairs, edges,
/// assignments) implements this trait; the byte layout is the contract between
/// worker processes sharing a working directory, so it never depends on the host's
/// in-memory representation.
pub trait Record: Sized {
    /// Serialized size in bytes; the layout is fixed per type.
    const SIZE: usize;

    fn write_to<W: Write>(&self, out: &mut W) -> std::io::Result<()>;
    fn read_from<R: Read>(input: &mut R) -> std::io::Result<Self>;

    /// Reads exactly `n` records from `input`.
    fn read_n<R: Read>(input: &mut R, n: usize, file_name: &str) -> Result<Vec<Self>, IoError> {
        let mut v = Vec::with_capacity(n);
        for _ in 0..n {
            let r = Self::read_from(input).map_err(|_| IoError::CorruptStream {
                file_name: file_name.to_string(),
            })?;
            v.push(r);
        }
        Ok(v)
    }
}

pub(crate) fn write_u64<W: Write>(out: &mut W, x: u64) -> std::io::Result<()> {
    out.write_all(&x.to_le_bytes())
}

pub(crate) fn read_u64<R: Read>(input: &mut R) -> std::io::Result<u64> {
    let mut buf = [0u8; 8];
    input.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}
