//! Stage (c): the candidate pair table.
//!
//! Each sorted seed bucket is swept seed group by seed group. In uni-directional
//! mode the longest record of a group (ties by smallest oid) becomes the rep and
//! pairs with every other member. In mutual mode a moving window over the
//! length-descending group keeps every pair within the length ratio; the median
//! record of the window is the rep.

use std::path::PathBuf;

use rayon::prelude::*;
use seqsieve_io::AtomicFile;
use seqsieve_util::{merge_keys, murmur_mix};

use crate::config::ClusterConfig;
use crate::errors::ClusterError;
use crate::file_array::{BufferArray, FileArray};
use crate::job::Job;
use crate::radix::{load_bucket, RADIX_COUNT};
use crate::records::{PairEntry, SeedEntry};
use crate::volume::VolumedFile;

fn pairs_uni_cov(
    group: &[SeedEntry],
    buffers: &mut BufferArray<PairEntry>,
) -> Result<(), ClusterError> {
    // group is sorted length-descending: the first record is the rep
    let rep = &group[0];
    let radix = (murmur_mix(rep.oid as u64) & (RADIX_COUNT as u64 - 1)) as usize;
    for member in &group[1..] {
        if member.oid == rep.oid {
            continue;
        }
        buffers.write(
            radix,
            PairEntry {
                rep_oid: rep.oid,
                member_oid: member.oid,
                rep_len: rep.len,
                member_len: member.len,
            },
        )?;
    }
    Ok(())
}

fn pairs_mutual_cov(
    group: &[SeedEntry],
    min_length_ratio: f64,
    buffers: &mut BufferArray<PairEntry>,
) -> Result<(), ClusterError> {
    let s = group.len();
    let mut i = 0usize;
    let mut j = 0usize;
    while i < s {
        let qlen = group[i].len;
        // widen the window while every pair inside respects the ratio
        let mut j1 = j;
        while j1 < s && group[j1].len as f64 / qlen as f64 >= min_length_ratio {
            j1 += 1;
        }
        let qpos = i + (j1 - j) / 2;
        let rep = &group[qpos.min(s - 1)];
        let radix = (murmur_mix(rep.oid as u64) & (RADIX_COUNT as u64 - 1)) as usize;
        for member in &group[j..j1] {
            if member.oid != rep.oid {
                buffers.write(
                    radix,
                    PairEntry {
                        rep_oid: rep.oid,
                        member_oid: member.oid,
                        rep_len: rep.len,
                        member_len: member.len,
                    },
                )?;
            }
        }
        j = j1;
        if j == s {
            break;
        }
        let tlen = group[j].len;
        while i < s && (tlen as f64 / group[i].len as f64) < min_length_ratio {
            i += 1;
        }
    }
    Ok(())
}

pub fn build_pair_table(
    job: &Job,
    seed_table: &[PathBuf],
    shape: usize,
    output: &FileArray,
    config: &ClusterConfig,
) -> Result<Vec<PathBuf>, ClusterError> {
    let seed_table_base = job.base_dir().join(format!("seed_table_{}", shape));
    let mut queue = AtomicFile::new(seed_table_base.join("build_pair_table_queue"))?;
    let unid = config.mutual_cover.is_none();
    let mut buckets_processed = 0i64;
    loop {
        let bucket = queue.fetch_add(1)?;
        if bucket >= seed_table.len() as i64 {
            break;
        }
        let file = VolumedFile::open(&seed_table[bucket as usize])?;
        let mut data: Vec<SeedEntry> = load_bucket(&file)?;
        job.log(&format!(
            "Building pair table. Bucket={}/{} Records={}",
            bucket + 1,
            seed_table.len(),
            data.len()
        ))?;
        data.par_sort_unstable_by(SeedEntry::cmp);
        let mut buffers: BufferArray<PairEntry> = BufferArray::new(output);
        for group in merge_keys(&data, |e| e.seed) {
            if unid {
                pairs_uni_cov(group, &mut buffers)?;
            } else {
                pairs_mutual_cov(group, config.min_length_ratio, &mut buffers)?;
            }
        }
        buffers.finish()?;
        file.remove()?;
        buckets_processed += 1;
    }
    let mut finished = AtomicFile::new(seed_table_base.join("pair_table_finished"))?;
    finished.fetch_add(buckets_processed)?;
    finished.await_value(seed_table.len() as i64)?;
    Ok(output.buckets())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(seed: u64, oid: i64, len: i32) -> SeedEntry {
        SeedEntry { seed, oid, len }
    }

    fn collect_pairs(dir: &std::path::Path, write: impl FnOnce(&mut BufferArray<PairEntry>)) -> Vec<PairEntry> {
        let fa = FileArray::create(dir.join("pairs"), RADIX_COUNT, 0).unwrap();
        let mut buffers = BufferArray::new(&fa);
        write(&mut buffers);
        buffers.finish().unwrap();
        fa.finish().unwrap();
        let mut out = Vec::new();
        for b in fa.buckets() {
            if let Ok(v) = VolumedFile::open(&b) {
                out.extend(load_bucket::<PairEntry>(&v).unwrap());
            }
        }
        out.sort_by(PairEntry::cmp);
        out
    }

    #[test]
    fn uni_mode_pairs_everyone_with_the_longest() {
        let dir = tempfile::tempdir().unwrap();
        let mut group = vec![entry(7, 3, 150), entry(7, 1, 200), entry(7, 2, 120)];
        group.sort_by(SeedEntry::cmp);
        let pairs = collect_pairs(dir.path(), |buffers| {
            pairs_uni_cov(&group, buffers).unwrap();
        });
        assert_eq!(pairs.len(), 2);
        assert!(pairs.iter().all(|p| p.rep_oid == 1 && p.rep_len == 200));
        assert!(pairs.iter().all(|p| p.rep_len >= p.member_len));
    }

    #[test]
    fn mutual_mode_respects_the_length_ratio() {
        let dir = tempfile::tempdir().unwrap();
        // lengths 1000 and 500 under ratio 0.8 must never pair
        let mut group = vec![entry(7, 0, 1000), entry(7, 1, 500)];
        group.sort_by(SeedEntry::cmp);
        let pairs = collect_pairs(dir.path(), |buffers| {
            pairs_mutual_cov(&group, 0.8, buffers).unwrap();
        });
        assert!(pairs.is_empty());

        let dir2 = tempfile::tempdir().unwrap();
        let mut group = vec![entry(7, 0, 100), entry(7, 1, 95), entry(7, 2, 90)];
        group.sort_by(SeedEntry::cmp);
        let pairs = collect_pairs(dir2.path(), |buffers| {
            pairs_mutual_cov(&group, 0.8, buffers).unwrap();
        });
        assert!(!pairs.is_empty());
        for p in &pairs {
            let ratio = p.member_len.min(p.rep_len) as f64 / p.member_len.max(p.rep_len) as f64;
            assert!(ratio >= 0.8);
        }
    }
}
