//! Stage (a): the per-shape seed table.
//!
//! Streams sequences from every volume, reduces them, enumerates the bottom-s seed
//! sketch, drops low-complexity seeds and writes one
//! [`SeedEntry`](crate::records::SeedEntry) per surviving seed into a
//! radix-partitioned table keyed on the seed hash's high bits.

use std::path::PathBuf;

use seqsieve_io::AtomicFile;
use seqsieve_seq::{seed_is_complex, Reduction, SketchIterator};

use crate::config::ClusterConfig;
use crate::errors::ClusterError;
use crate::file_array::{BufferArray, FileArray};
use crate::job::{Job, Sensitivity};
use crate::radix::{RADIX_BITS, RADIX_COUNT};
use crate::records::SeedEntry;
use crate::volume::VolumedFile;

/// Per-round seed statistics, merged into the job log.
#[derive(Clone, Copy, Debug, Default)]
pub struct SeedStats {
    pub seeds_considered: u64,
    pub seeds_indexed: u64,
}

pub fn build_seed_table(
    job: &Job,
    volumes: &VolumedFile,
    shape: usize,
    sensitivity: Sensitivity,
    config: &ClusterConfig,
) -> Result<Vec<PathBuf>, ClusterError> {
    let shape_length = sensitivity.shape_length();
    let sketch_size = if config.sketch_size > 0 {
        config.sketch_size
    } else {
        sensitivity.sketch_size()
    };
    let seed_cut = if config.seed_cut > 0.0 {
        config.seed_cut
    } else {
        sensitivity.seed_cut()
    };
    let seed_complexity_cut = seed_cut * std::f64::consts::LN_2 * shape_length as f64;

    let base_dir = job.base_dir().join(format!("seed_table_{}", shape));
    let output = FileArray::create(&base_dir, RADIX_COUNT, job.worker_id())?;
    let mut queue = AtomicFile::new(base_dir.join("queue"))?;
    let reduction = Reduction::default_reduction();
    let mut stats = SeedStats::default();
    let mut volumes_processed = 0i64;

    let mut buffers: BufferArray<SeedEntry> = BufferArray::new(&output);
    loop {
        let v = queue.fetch_add(1)?;
        if v >= volumes.len() as i64 {
            break;
        }
        let volume = &volumes.volumes()[v as usize];
        job.log(&format!(
            "Building seed table. Shape={} Volume={}/{} Records={}",
            shape + 1,
            v + 1,
            volumes.len(),
            volume.record_count
        ))?;
        let records = crate::volume::read_volume_records(&volume.path, job.round() > 0)?;
        let mut oid = volume.oid_begin;
        for record in records {
            if job.round() > 0 {
                oid = record.accession().parse().unwrap_or(oid);
            }
            if record.seq.len() >= shape_length {
                for seed in SketchIterator::new(&record.seq, reduction, shape_length, sketch_size) {
                    stats.seeds_considered += 1;
                    let window = &record.seq[seed.pos as usize..seed.pos as usize + shape_length];
                    if seed_is_complex(window, seed_complexity_cut) {
                        let key = seqsieve_util::murmur_mix(seed.key);
                        let radix = (key >> (64 - RADIX_BITS)) as usize;
                        buffers.write(
                            radix,
                            SeedEntry {
                                seed: key,
                                oid,
                                len: record.seq.len() as i32,
                            },
                        )?;
                        stats.seeds_indexed += 1;
                    }
                }
            }
            oid += 1;
        }
        volumes_processed += 1;
    }
    buffers.finish()?;
    output.finish()?;

    let mut finished = AtomicFile::new(base_dir.join("finished"))?;
    finished.fetch_add(volumes_processed)?;
    finished.await_value(volumes.len() as i64)?;
    job.log(&format!(
        "Seeds considered: {} Seeds indexed: {}",
        stats.seeds_considered, stats.seeds_indexed
    ))?;
    Ok(output.buckets())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radix::load_bucket;
    use seqsieve_io::FileStack;
    use std::io::Write;

    fn write_db(dir: &std::path::Path, seqs: &[&str]) -> PathBuf {
        let fasta = dir.join("db.fasta");
        let mut f = std::fs::File::create(&fasta).unwrap();
        for (i, s) in seqs.iter().enumerate() {
            writeln!(f, ">s{}\n{}", i + 1, s).unwrap();
        }
        drop(f);
        let list = dir.join("bucket.tsv");
        let mut stack = FileStack::new(&list).unwrap();
        stack
            .push(&format!("{}\t{}", fasta.display(), seqs.len()))
            .unwrap();
        list
    }

    #[test]
    fn identical_sequences_share_seed_groups() {
        let dir = tempfile::tempdir().unwrap();
        let s = "MKTFFVLLLCTFTVFSAYSRGVFRRDTHKSEIAHRFKDLGEEHFKGLVLIAF";
        let db = write_db(dir.path(), &[s, s, "GDLKFRHAIESKHTDRRFVGRSYAKEVNKIEWESPFDPHTTD"]);
        let volumes = VolumedFile::open(&db).unwrap();
        let config = ClusterConfig {
            parallel_tmpdir: dir.path().join("tmp"),
            ..ClusterConfig::default()
        };
        let job = Job::create(&config, volumes.max_oid(), volumes.len()).unwrap();
        let buckets =
            build_seed_table(&job, &volumes, 0, Sensitivity::Default, &config).unwrap();
        assert_eq!(buckets.len(), RADIX_COUNT);

        let mut entries: Vec<SeedEntry> = Vec::new();
        for (radix, b) in buckets.iter().enumerate() {
            if let Ok(v) = VolumedFile::open(b) {
                let data: Vec<SeedEntry> = load_bucket(&v).unwrap();
                for e in &data {
                    // radix bucket invariant
                    assert_eq!((e.seed >> (64 - RADIX_BITS)) as usize, radix);
                }
                entries.extend(data);
            }
        }
        assert!(!entries.is_empty());
        // oids 0 and 1 are identical sequences: every seed of 0 appears for 1
        let of0: std::collections::HashSet<u64> =
            entries.iter().filter(|e| e.oid == 0).map(|e| e.seed).collect();
        let of1: std::collections::HashSet<u64> =
            entries.iter().filter(|e| e.oid == 1).map(|e| e.seed).collect();
        assert_eq!(of0, of1);
        assert!(!of0.is_empty());
    }
}
