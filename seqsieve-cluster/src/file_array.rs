//! Radix-partitioned append-only table writers.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use seqsieve_io::{BlockWriter, FileStack, Record};

use crate::errors::ClusterError;

const MAX_FILE_SIZE: i64 = 1024 * 1024 * 1024;

struct Bucket {
    writer: BlockWriter,
    dir: PathBuf,
    next_volume: i64,
    oid_begin: Option<i64>,
    oid_end: Option<i64>,
}

/// A size-bounded, append-only multi-file table partitioned into buckets.
///
/// Every bucket has its own directory with a `bucket.tsv` filestack; each worker
/// writes its own volumes (`worker_<w>_volume_<v>`), so file names never collide
/// between workers sharing the directory. Volumes roll over when they cross the size
/// bound, and every completed volume registers itself on the bucket's filestack.
pub struct FileArray {
    base_dir: PathBuf,
    worker_id: i64,
    max_file_size: i64,
    buckets: Vec<Mutex<Bucket>>,
}

impl FileArray {
    pub fn create<P: AsRef<Path>>(
        base_dir: P,
        size: usize,
        worker_id: i64,
    ) -> Result<FileArray, ClusterError> {
        Self::create_sized(base_dir, size, worker_id, MAX_FILE_SIZE)
    }

    pub fn create_sized<P: AsRef<Path>>(
        base_dir: P,
        size: usize,
        worker_id: i64,
        max_file_size: i64,
    ) -> Result<FileArray, ClusterError> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir)?;
        let mut buckets = Vec::with_capacity(size);
        for i in 0..size {
            let dir = base_dir.join(i.to_string());
            fs::create_dir_all(&dir)?;
            let path = dir.join(format!("worker_{}_volume_0", worker_id));
            buckets.push(Mutex::new(Bucket {
                writer: BlockWriter::create(&path)?,
                dir,
                next_volume: 1,
                oid_begin: None,
                oid_end: None,
            }));
        }
        Ok(FileArray {
            base_dir,
            worker_id,
            max_file_size,
            buckets,
        })
    }

    pub fn size(&self) -> usize {
        self.buckets.len()
    }

    /// Appends one record to a bucket, rolling the volume over when it is full.
    pub fn write<T: Record>(&self, bucket: usize, record: &T) -> Result<(), ClusterError> {
        let mut b = self.buckets[bucket].lock().unwrap();
        b.writer.write(record)?;
        self.maybe_roll(&mut b)?;
        Ok(())
    }

    /// Appends raw text (FASTA chunks) counting `records` logical records; tracks the
    /// covered OId range when one is supplied.
    pub fn write_raw(
        &self,
        bucket: usize,
        data: &[u8],
        records: i64,
        oid: Option<i64>,
    ) -> Result<(), ClusterError> {
        let mut b = self.buckets[bucket].lock().unwrap();
        b.writer.write_raw(data, records)?;
        if let Some(oid) = oid {
            b.oid_begin = Some(b.oid_begin.map_or(oid, |x| x.min(oid)));
            b.oid_end = Some(b.oid_end.map_or(oid + 1, |x| x.max(oid + 1)));
        }
        self.maybe_roll(&mut b)?;
        Ok(())
    }

    fn maybe_roll(&self, b: &mut Bucket) -> Result<(), ClusterError> {
        if b.writer.bytes() < self.max_file_size {
            return Ok(());
        }
        self.register(b)?;
        let path = b
            .dir
            .join(format!("worker_{}_volume_{}", self.worker_id, b.next_volume));
        b.next_volume += 1;
        b.oid_begin = None;
        b.oid_end = None;
        b.writer = BlockWriter::create(&path)?;
        Ok(())
    }

    fn register(&self, b: &mut Bucket) -> Result<(), ClusterError> {
        b.writer.finish()?;
        if b.writer.records() == 0 {
            let _ = fs::remove_file(b.writer.path());
            return Ok(());
        }
        let mut stack = FileStack::new(b.dir.join("bucket.tsv"))?;
        let line = match (b.oid_begin, b.oid_end) {
            (Some(begin), Some(end)) => format!(
                "{}\t{}\t{}\t{}",
                b.writer.path().display(),
                b.writer.records(),
                begin,
                end
            ),
            _ => format!("{}\t{}", b.writer.path().display(), b.writer.records()),
        };
        stack.push(&line)?;
        Ok(())
    }

    /// Path of one bucket's `bucket.tsv`.
    pub fn bucket(&self, i: usize) -> PathBuf {
        self.base_dir.join(i.to_string()).join("bucket.tsv")
    }

    /// Paths of every bucket's `bucket.tsv`.
    pub fn buckets(&self) -> Vec<PathBuf> {
        (0..self.buckets.len()).map(|i| self.bucket(i)).collect()
    }

    /// Flushes and registers every open volume; call once when the writer is done.
    pub fn finish(&self) -> Result<(), ClusterError> {
        for bucket in &self.buckets {
            let mut b = bucket.lock().unwrap();
            self.register(&mut b)?;
            // leave an empty writer behind; it registers nothing on drop
            let path = b
                .dir
                .join(format!("worker_{}_volume_{}", self.worker_id, b.next_volume));
            b.next_volume += 1;
            b.writer = BlockWriter::create(&path)?;
            b.writer.finish()?;
            let _ = fs::remove_file(b.writer.path());
        }
        Ok(())
    }
}

/// Write-combining front of a [`FileArray`]: worker-local buffers flushed per bucket
/// when they grow past the buffer bound, so the bucket mutexes stay cold.
pub struct BufferArray<'a, T: Record> {
    buffers: Vec<Vec<T>>,
    file_array: &'a FileArray,
}

impl<'a, T: Record> BufferArray<'a, T> {
    const BUF_RECORDS: usize = 4096;

    pub fn new(file_array: &'a FileArray) -> BufferArray<'a, T> {
        BufferArray {
            buffers: (0..file_array.size()).map(|_| Vec::new()).collect(),
            file_array,
        }
    }

    pub fn write(&mut self, bucket: usize, record: T) -> Result<(), ClusterError> {
        self.buffers[bucket].push(record);
        if self.buffers[bucket].len() >= Self::BUF_RECORDS {
            self.flush(bucket)?;
        }
        Ok(())
    }

    fn flush(&mut self, bucket: usize) -> Result<(), ClusterError> {
        for record in self.buffers[bucket].drain(..) {
            self.file_array.write(bucket, &record)?;
        }
        Ok(())
    }

    /// Flushes every buffer; call before dropping.
    pub fn finish(&mut self) -> Result<(), ClusterError> {
        for bucket in 0..self.buffers.len() {
            self.flush(bucket)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::SeedEntry;
    use crate::volume::VolumedFile;
    use seqsieve_io::BlockReader;

    #[test]
    fn records_land_in_their_buckets() {
        let dir = tempfile::tempdir().unwrap();
        let fa = FileArray::create(dir.path().join("table"), 4, 0).unwrap();
        let mut buf = BufferArray::new(&fa);
        for i in 0..1000i64 {
            buf.write(
                (i % 4) as usize,
                SeedEntry {
                    seed: i as u64,
                    oid: i,
                    len: 10,
                },
            )
            .unwrap();
        }
        buf.finish().unwrap();
        fa.finish().unwrap();

        let v = VolumedFile::open(fa.bucket(2)).unwrap();
        assert_eq!(v.records(), 250);
        let mut reader = BlockReader::open(&v.volumes()[0].path).unwrap();
        let records: Vec<SeedEntry> = reader.read_all().unwrap();
        assert_eq!(records.len(), 250);
        assert!(records.iter().all(|r| r.oid % 4 == 2));
    }

    #[test]
    fn volume_rollover_registers_every_volume() {
        let dir = tempfile::tempdir().unwrap();
        let fa = FileArray::create_sized(dir.path().join("table"), 1, 0, 2048).unwrap();
        for i in 0..20000i64 {
            fa.write(0, &SeedEntry { seed: i as u64, oid: i, len: 10 }).unwrap();
        }
        fa.finish().unwrap();
        let v = VolumedFile::open(fa.bucket(0)).unwrap();
        assert!(v.len() > 1, "expected multiple volumes, got {}", v.len());
        assert_eq!(v.records(), 20000);
    }
}
