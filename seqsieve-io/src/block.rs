use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::errors::IoError;
use crate::records::{read_u64, write_u64, Record};

/// Writes record streams as a sequence of independently compressed blocks.
///
/// Each block is a zlib stream containing `{u64 record_count, record_count × record}`;
/// a volume holds any number of blocks back to back. Blocks are cut when the
/// uncompressed payload crosses `BLOCK_SIZE`, so readers can stream a volume without
/// loading it whole.
pub struct BlockWriter {
    path: PathBuf,
    out: BufWriter<File>,
    pending: Vec<u8>,
    pending_records: u64,
    records: i64,
    bytes: i64,
}

impl BlockWriter {
    const BLOCK_SIZE: usize = 32768;

    pub fn create<P: AsRef<Path>>(path: P) -> Result<BlockWriter, IoError> {
        let file = File::create(path.as_ref()).map_err(|_| IoError::FileNotFound {
            file_name: path.as_ref().display().to_string(),
        })?;
        Ok(BlockWriter {
            path: path.as_ref().to_path_buf(),
            out: BufWriter::new(file),
            pending: Vec::with_capacity(Self::BLOCK_SIZE),
            pending_records: 0,
            records: 0,
            bytes: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total records written, including the not-yet-flushed block.
    pub fn records(&self) -> i64 {
        self.records
    }

    /// Compressed bytes flushed to disk so far.
    pub fn bytes(&self) -> i64 {
        self.bytes
    }

    pub fn write<T: Record>(&mut self, record: &T) -> Result<(), IoError> {
        record.write_to(&mut self.pending)?;
        self.pending_records += 1;
        self.records += 1;
        if self.pending.len() >= Self::BLOCK_SIZE {
            self.flush_block()?;
        }
        Ok(())
    }

    /// Writes raw text (FASTA chunks); each call counts `records` logical records.
    pub fn write_raw(&mut self, data: &[u8], records: i64) -> Result<(), IoError> {
        self.pending.extend_from_slice(data);
        self.pending_records += records as u64;
        self.records += records;
        if self.pending.len() >= Self::BLOCK_SIZE {
            self.flush_block()?;
        }
        Ok(())
    }

    fn flush_block(&mut self) -> Result<(), IoError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::fast());
        write_u64(&mut encoder, self.pending_records)?;
        encoder.write_all(&self.pending)?;
        let compressed = encoder.finish()?;
        write_u64(&mut self.out, compressed.len() as u64)?;
        self.out.write_all(&compressed)?;
        self.bytes += 8 + compressed.len() as i64;
        self.pending.clear();
        self.pending_records = 0;
        Ok(())
    }

    /// Flushes the trailing block and the underlying file.
    pub fn finish(&mut self) -> Result<(), IoError> {
        self.flush_block()?;
        self.out.flush()?;
        Ok(())
    }
}

/// Streams records back out of a file written by [`BlockWriter`].
pub struct BlockReader {
    path: PathBuf,
    input: BufReader<File>,
    block: Vec<u8>,
    block_pos: usize,
    block_records: u64,
    block_read: u64,
}

impl BlockReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<BlockReader, IoError> {
        let file = File::open(path.as_ref()).map_err(|_| IoError::FileNotFound {
            file_name: path.as_ref().display().to_string(),
        })?;
        Ok(BlockReader {
            path: path.as_ref().to_path_buf(),
            input: BufReader::new(file),
            block: Vec::new(),
            block_pos: 0,
            block_records: 0,
            block_read: 0,
        })
    }

    fn next_block(&mut self) -> Result<bool, IoError> {
        let len = match read_u64(&mut self.input) {
            Ok(len) => len as usize,
            Err(ref e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(false),
            Err(e) => return Err(IoError::Io(e)),
        };
        let mut compressed = vec![0u8; len];
        self.input
            .read_exact(&mut compressed)
            .map_err(|_| IoError::CorruptStream {
                file_name: self.path.display().to_string(),
            })?;
        let mut decoder = ZlibDecoder::new(&compressed[..]);
        self.block_records = read_u64(&mut decoder).map_err(|_| IoError::CorruptStream {
            file_name: self.path.display().to_string(),
        })?;
        self.block.clear();
        decoder
            .read_to_end(&mut self.block)
            .map_err(|_| IoError::CorruptStream {
                file_name: self.path.display().to_string(),
            })?;
        self.block_pos = 0;
        self.block_read = 0;
        Ok(true)
    }

    /// Reads the next record, or `None` at end of stream.
    pub fn read<T: Record>(&mut self) -> Result<Option<T>, IoError> {
        while self.block_read >= self.block_records {
            if !self.next_block()? {
                return Ok(None);
            }
        }
        let mut slice = &self.block[self.block_pos..];
        let record = T::read_from(&mut slice).map_err(|_| IoError::CorruptStream {
            file_name: self.path.display().to_string(),
        })?;
        self.block_pos += T::SIZE;
        self.block_read += 1;
        Ok(Some(record))
    }

    /// Reads every remaining record.
    pub fn read_all<T: Record>(&mut self) -> Result<Vec<T>, IoError> {
        let mut v = Vec::new();
        while let Some(r) = self.read::<T>()? {
            v.push(r);
        }
        Ok(v)
    }

    /// Drains the remaining raw bytes of the stream (FASTA chunk volumes).
    pub fn read_raw(&mut self) -> Result<Vec<u8>, IoError> {
        let mut data = Vec::new();
        loop {
            data.extend_from_slice(&self.block[self.block_pos..]);
            self.block_pos = self.block.len();
            self.block_read = self.block_records;
            if !self.next_block()? {
                return Ok(data);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Pair {
        a: i64,
        b: i32,
    }

    impl Record for Pair {
        const SIZE: usize = 12;

        fn write_to<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
            out.write_all(&self.a.to_le_bytes())?;
            out.write_all(&self.b.to_le_bytes())
        }

        fn read_from<R: Read>(input: &mut R) -> std::io::Result<Self> {
            let mut a = [0u8; 8];
            let mut b = [0u8; 4];
            input.read_exact(&mut a)?;
            input.read_exact(&mut b)?;
            Ok(Pair {
                a: i64::from_le_bytes(a),
                b: i32::from_le_bytes(b),
            })
        }
    }

    #[test]
    fn roundtrip_across_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records");
        let mut writer = BlockWriter::create(&path).unwrap();
        for i in 0..10000i64 {
            writer.write(&Pair { a: i, b: (i % 7) as i32 }).unwrap();
        }
        writer.finish().unwrap();
        assert_eq!(writer.records(), 10000);

        let mut reader = BlockReader::open(&path).unwrap();
        let records: Vec<Pair> = reader.read_all().unwrap();
        assert_eq!(records.len(), 10000);
        for (i, r) in records.iter().enumerate() {
            assert_eq!(r.a, i as i64);
            assert_eq!(r.b, (i % 7) as i32);
        }
    }

    #[test]
    fn empty_stream_reads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty");
        let mut writer = BlockWriter::create(&path).unwrap();
        writer.finish().unwrap();
        let mut reader = BlockReader::open(&path).unwrap();
        assert!(reader.read::<Pair>().unwrap().is_none());
    }
}
