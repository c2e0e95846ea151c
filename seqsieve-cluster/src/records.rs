//! On-disk record types of the clustering tables.
//!
//! Every record has a fixed little-endian layout (the contract between worker
//! processes) and an ordering chosen so that a sorted bucket can be swept with the
//! key-merge iterator.

use std::cmp::Ordering;
use std::io::{Read, Write};

use seqsieve_io::Record;

use crate::radix::RadixKey;

fn write_i64<W: Write>(out: &mut W, x: i64) -> std::io::Result<()> {
    out.write_all(&x.to_le_bytes())
}

fn write_i32<W: Write>(out: &mut W, x: i32) -> std::io::Result<()> {
    out.write_all(&x.to_le_bytes())
}

fn write_u64<W: Write>(out: &mut W, x: u64) -> std::io::Result<()> {
    out.write_all(&x.to_le_bytes())
}

fn read_i64<R: Read>(input: &mut R) -> std::io::Result<i64> {
    let mut b = [0u8; 8];
    input.read_exact(&mut b)?;
    Ok(i64::from_le_bytes(b))
}

fn read_i32<R: Read>(input: &mut R) -> std::io::Result<i32> {
    let mut b = [0u8; 4];
    input.read_exact(&mut b)?;
    Ok(i32::from_le_bytes(b))
}

fn read_u64<R: Read>(input: &mut R) -> std::io::Result<u64> {
    let mut b = [0u8; 8];
    input.read_exact(&mut b)?;
    Ok(u64::from_le_bytes(b))
}

/// One indexed seed: the hashed seed key plus the owning sequence and its length.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SeedEntry {
    pub seed: u64,
    pub oid: i64,
    pub len: i32,
}

impl SeedEntry {
    /// Ordering by (seed, length descending, oid): the pair-table sweep wants the
    /// longest record of a seed group first.
    pub fn cmp(a: &SeedEntry, b: &SeedEntry) -> Ordering {
        a.seed
            .cmp(&b.seed)
            .then(b.len.cmp(&a.len))
            .then(a.oid.cmp(&b.oid))
    }
}

impl Record for SeedEntry {
    const SIZE: usize = 20;

    fn write_to<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        write_u64(out, self.seed)?;
        write_i64(out, self.oid)?;
        write_i32(out, self.len)
    }

    fn read_from<R: Read>(input: &mut R) -> std::io::Result<Self> {
        Ok(SeedEntry {
            seed: read_u64(input)?,
            oid: read_i64(input)?,
            len: read_i32(input)?,
        })
    }
}

impl RadixKey for SeedEntry {
    fn radix_key(&self) -> u64 {
        self.seed
    }
}

/// A candidate pair: `member` co-occurred with `rep` on at least one seed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PairEntry {
    pub rep_oid: i64,
    pub member_oid: i64,
    pub rep_len: i32,
    pub member_len: i32,
}

impl PairEntry {
    pub fn cmp(a: &PairEntry, b: &PairEntry) -> Ordering {
        a.rep_oid
            .cmp(&b.rep_oid)
            .then(a.member_oid.cmp(&b.member_oid))
    }
}

impl Record for PairEntry {
    const SIZE: usize = 24;

    fn write_to<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        write_i64(out, self.rep_oid)?;
        write_i64(out, self.member_oid)?;
        write_i32(out, self.rep_len)?;
        write_i32(out, self.member_len)
    }

    fn read_from<R: Read>(input: &mut R) -> std::io::Result<Self> {
        Ok(PairEntry {
            rep_oid: read_i64(input)?,
            member_oid: read_i64(input)?,
            rep_len: read_i32(input)?,
            member_len: read_i32(input)?,
        })
    }
}

impl RadixKey for PairEntry {
    fn radix_key(&self) -> u64 {
        self.rep_oid as u64
    }
}

/// The chunk-local pair form: lengths are no longer needed once chunking is decided.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PairEntryShort {
    pub rep_oid: i64,
    pub member_oid: i64,
}

impl Record for PairEntryShort {
    const SIZE: usize = 16;

    fn write_to<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        write_i64(out, self.rep_oid)?;
        write_i64(out, self.member_oid)
    }

    fn read_from<R: Read>(input: &mut R) -> std::io::Result<Self> {
        Ok(PairEntryShort {
            rep_oid: read_i64(input)?,
            member_oid: read_i64(input)?,
        })
    }
}

/// Tells the chunk builder which chunk a sequence is needed in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkTableEntry {
    pub oid: i64,
    pub chunk: i32,
}

impl ChunkTableEntry {
    pub fn cmp(a: &ChunkTableEntry, b: &ChunkTableEntry) -> Ordering {
        a.oid.cmp(&b.oid).then(a.chunk.cmp(&b.chunk))
    }
}

impl Record for ChunkTableEntry {
    const SIZE: usize = 12;

    fn write_to<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        write_i64(out, self.oid)?;
        write_i32(out, self.chunk)
    }

    fn read_from<R: Read>(input: &mut R) -> std::io::Result<Self> {
        Ok(ChunkTableEntry {
            oid: read_i64(input)?,
            chunk: read_i32(input)?,
        })
    }
}

impl RadixKey for ChunkTableEntry {
    fn radix_key(&self) -> u64 {
        self.oid as u64
    }
}

/// A post-alignment edge: `member` is covered by `rep` above the thresholds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Edge {
    pub rep_oid: i64,
    pub member_oid: i64,
    pub rep_len: i32,
    pub member_len: i32,
}

impl Edge {
    /// Ordering by (member, rep length descending, rep oid): the clustering sweep
    /// picks the first edge of each member group.
    pub fn cmp(a: &Edge, b: &Edge) -> Ordering {
        a.member_oid
            .cmp(&b.member_oid)
            .then(b.rep_len.cmp(&a.rep_len))
            .then(a.rep_oid.cmp(&b.rep_oid))
    }
}

impl Record for Edge {
    const SIZE: usize = 24;

    fn write_to<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        write_i64(out, self.rep_oid)?;
        write_i64(out, self.member_oid)?;
        write_i32(out, self.rep_len)?;
        write_i32(out, self.member_len)
    }

    fn read_from<R: Read>(input: &mut R) -> std::io::Result<Self> {
        Ok(Edge {
            rep_oid: read_i64(input)?,
            member_oid: read_i64(input)?,
            rep_len: read_i32(input)?,
            member_len: read_i32(input)?,
        })
    }
}

impl RadixKey for Edge {
    fn radix_key(&self) -> u64 {
        self.member_oid as u64
    }
}

/// The decision that `member` belongs to `rep`'s cluster.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Assignment {
    pub member_oid: i64,
    pub rep_oid: i64,
}

impl Record for Assignment {
    const SIZE: usize = 16;

    fn write_to<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        write_i64(out, self.member_oid)?;
        write_i64(out, self.rep_oid)
    }

    fn read_from<R: Read>(input: &mut R) -> std::io::Result<Self> {
        Ok(Assignment {
            member_oid: read_i64(input)?,
            rep_oid: read_i64(input)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip<T: Record + PartialEq + std::fmt::Debug>(r: &T) {
        let mut buf = Vec::new();
        r.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), T::SIZE);
        let back = T::read_from(&mut &buf[..]).unwrap();
        assert_eq!(*r, back);
    }

    #[test]
    fn all_records_roundtrip() {
        roundtrip(&SeedEntry { seed: 0xdeadbeef, oid: 42, len: 200 });
        roundtrip(&PairEntry { rep_oid: 1, member_oid: 2, rep_len: 200, member_len: 150 });
        roundtrip(&PairEntryShort { rep_oid: 1, member_oid: 2 });
        roundtrip(&ChunkTableEntry { oid: 9, chunk: 3 });
        roundtrip(&Edge { rep_oid: 1, member_oid: 2, rep_len: 200, member_len: 150 });
        roundtrip(&Assignment { member_oid: 2, rep_oid: 1 });
    }

    #[test]
    fn seed_entry_order_puts_longest_first() {
        let mut v = vec![
            SeedEntry { seed: 5, oid: 1, len: 100 },
            SeedEntry { seed: 5, oid: 0, len: 200 },
            SeedEntry { seed: 3, oid: 2, len: 50 },
        ];
        v.sort_by(SeedEntry::cmp);
        assert_eq!(v[0].seed, 3);
        assert_eq!(v[1].len, 200);
        assert_eq!(v[2].len, 100);
    }

    #[test]
    fn edge_order_prefers_long_reps() {
        let mut v = vec![
            Edge { rep_oid: 5, member_oid: 1, rep_len: 100, member_len: 50 },
            Edge { rep_oid: 3, member_oid: 1, rep_len: 200, member_len: 50 },
        ];
        v.sort_by(Edge::cmp);
        assert_eq!(v[0].rep_oid, 3);
    }
}
