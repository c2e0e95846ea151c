//! External radix sort over bucket files.

use std::path::{Path, PathBuf};

use seqsieve_io::{AtomicFile, BlockReader, FileStack, Record};

use crate::errors::ClusterError;
use crate::file_array::{BufferArray, FileArray};
use crate::job::Job;
use crate::volume::VolumedFile;

/// Bits of the record key consumed per partitioning level.
pub const RADIX_BITS: u64 = 8;
/// Bucket count of one partitioning level.
pub const RADIX_COUNT: usize = 1 << RADIX_BITS;

/// The sort key of a radix-partitioned record.
pub trait RadixKey {
    fn radix_key(&self) -> u64;
}

/// Re-partitions one oversized bucket on the next lower `RADIX_BITS` of the key.
fn radix_cluster<T: Record + RadixKey>(
    job: &Job,
    bucket: &VolumedFile,
    output_dir: &Path,
    bits_unsorted: u64,
) -> Result<Vec<PathBuf>, ClusterError> {
    let shift = bits_unsorted.saturating_sub(RADIX_BITS);
    let output = FileArray::create(output_dir, RADIX_COUNT, job.worker_id())?;
    let mut buffers: BufferArray<T> = BufferArray::new(&output);
    for volume in bucket.volumes() {
        let mut reader = BlockReader::open(&volume.path)?;
        while let Some(record) = reader.read::<T>()? {
            let radix = ((record.radix_key() >> shift) & (RADIX_COUNT as u64 - 1)) as usize;
            buffers.write(radix, record)?;
        }
    }
    buffers.finish()?;
    output.finish()?;
    job.log(&format!(
        "Radix clustered bucket records={}",
        bucket.records()
    ))?;
    Ok(output.buckets())
}

/// Externally sorts a radix-partitioned table.
///
/// Buckets below the in-memory size limit are passed through for in-place sorting by
/// the consumer; oversized buckets are recursively re-partitioned on the next lower
/// key bits. Workers pull bucket indices from an atomic-file queue and barrier on a
/// completion counter, so any number of processes can cooperate.
pub fn radix_sort<T: Record + RadixKey>(
    job: &Job,
    buckets: &[PathBuf],
    bits_unsorted: u64,
    memory_limit: i64,
) -> Result<Vec<PathBuf>, ClusterError> {
    let base_path = buckets
        .first()
        .and_then(|p| p.parent())
        .and_then(|p| p.parent())
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| job.base_dir());
    let queue_path = base_path.join("radix_sort_queue");
    let result_path = base_path.join("radix_sort_out");
    let mut queue = AtomicFile::new(&queue_path)?;
    let mut out = FileStack::new(&result_path)?;
    let mut buckets_processed = 0i64;
    loop {
        let i = queue.fetch_add(1)?;
        if i >= buckets.len() as i64 {
            break;
        }
        let bucket = VolumedFile::open(&buckets[i as usize])?;
        let data_size = bucket.records() * T::SIZE as i64;
        job.log(&format!(
            "Radix sorting. Bucket={}/{} Records={} Size={}",
            i + 1,
            buckets.len(),
            bucket.records(),
            data_size
        ))?;
        if data_size > memory_limit {
            let sub_dir = buckets[i as usize]
                .parent()
                .expect("bucket file has a directory")
                .to_path_buf();
            let v = radix_cluster::<T>(job, &bucket, &sub_dir, bits_unsorted)?;
            let lines: Vec<String> = v.iter().map(|p| p.display().to_string()).collect();
            out.push_all(lines.iter().map(|s| s.as_str()))?;
            bucket.remove()?;
        } else if bucket.records() > 0 {
            out.push(&buckets[i as usize].display().to_string())?;
        } else {
            bucket.remove()?;
        }
        buckets_processed += 1;
    }
    let mut finished = AtomicFile::new(base_path.join("radix_sort_finished"))?;
    finished.fetch_add(buckets_processed)?;
    finished.await_value(buckets.len() as i64)?;
    Ok(out.lines()?.into_iter().map(PathBuf::from).collect())
}

/// Loads every record of a sorted-table bucket into memory.
pub fn load_bucket<T: Record>(bucket: &VolumedFile) -> Result<Vec<T>, ClusterError> {
    let mut data = Vec::with_capacity(bucket.records().max(0) as usize);
    for volume in bucket.volumes() {
        let mut reader = BlockReader::open(&volume.path)?;
        while let Some(record) = reader.read::<T>()? {
            data.push(record);
        }
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClusterConfig;
    use crate::records::SeedEntry;
    use rayon::prelude::*;

    #[test]
    fn oversized_buckets_get_repartitioned() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClusterConfig {
            parallel_tmpdir: dir.path().to_path_buf(),
            ..ClusterConfig::default()
        };
        let job = Job::create(&config, 100, 1).unwrap();
        let fa = FileArray::create(job.base_dir().join("seed_table_0"), 2, job.worker_id()).unwrap();
        for i in 0..5000u64 {
            let key = seqsieve_util::murmur_mix(i);
            fa.write(
                (key >> (64 - RADIX_BITS)) as usize % 2,
                &SeedEntry {
                    seed: key,
                    oid: i as i64,
                    len: 10,
                },
            )
            .unwrap();
        }
        fa.finish().unwrap();

        // a tiny memory limit forces re-partitioning
        let sorted = radix_sort::<SeedEntry>(&job, &fa.buckets(), 64, 4096).unwrap();
        assert!(sorted.len() > 2);

        // radix bucket invariant: within each sub-bucket all keys share the high bits
        let mut total = 0i64;
        for b in &sorted {
            let v = VolumedFile::open(b).unwrap();
            let mut data: Vec<SeedEntry> = load_bucket(&v).unwrap();
            total += data.len() as i64;
            data.par_sort_by(SeedEntry::cmp);
            if let (Some(first), Some(last)) = (data.first(), data.last()) {
                assert_eq!(first.seed >> (64 - RADIX_BITS), last.seed >> (64 - RADIX_BITS));
            }
        }
        assert_eq!(total, 5000);
    }
}
