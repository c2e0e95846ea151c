//! Stages (g) and (h): clustering from edges and the transitive closure.

use std::io::{Read, Write};
use std::path::PathBuf;

use rayon::prelude::*;
use seqsieve_io::{AtomicFile, BlockReader};
use seqsieve_seq::write_fasta_record;
use seqsieve_util::merge_keys;

use crate::errors::ClusterError;
use crate::file_array::{BufferArray, FileArray};
use crate::job::Job;
use crate::radix::load_bucket;
use crate::records::{Assignment, Edge};
use crate::volume::VolumedFile;

/// Flattens the representative mapping in place until `rep[rep[i]] == rep[i]` for
/// every `i`, counting the clusters.
fn flatten_closure(rep: &mut [i64]) -> i64 {
    // path compression is iterative: a later entry may still point at an unflattened
    // chain, so repeat until nothing changes
    loop {
        let mut changed = false;
        for i in 0..rep.len() {
            let mut r = rep[i];
            while rep[r as usize] != r {
                r = rep[r as usize];
            }
            if r != rep[i] {
                rep[i] = r;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    rep.iter().enumerate().filter(|(i, &r)| r == *i as i64).count() as i64
}

fn write_closure(job: &Job, rep: &[i64]) -> Result<(), ClusterError> {
    let dir = job.base_dir().join("clustering");
    std::fs::create_dir_all(&dir)?;
    let mut out = std::fs::File::create(dir.join("rep"))?;
    for &r in rep {
        out.write_all(&r.to_le_bytes())?;
    }
    Ok(())
}

/// Reads the closure vector of a finished round.
pub fn read_closure(job: &Job, round: usize) -> Result<Vec<i64>, ClusterError> {
    let path = job.round_dir(round).join("clustering").join("rep");
    let mut data = Vec::new();
    std::fs::File::open(&path)?.read_to_end(&mut data)?;
    Ok(data
        .chunks_exact(8)
        .map(|c| i64::from_le_bytes(c.try_into().expect("8-byte chunk")))
        .collect())
}

fn compute_closure(
    job: &Job,
    assignments: &VolumedFile,
    size: i64,
) -> Result<(), ClusterError> {
    job.log("Computing transitive closure")?;
    let mut rep: Vec<i64> = (0..size).collect();
    for volume in assignments.volumes() {
        let mut reader = BlockReader::open(&volume.path)?;
        while let Some(a) = reader.read::<Assignment>()? {
            rep[a.member_oid as usize] = a.rep_oid;
        }
    }
    let clusters = flatten_closure(&mut rep);
    job.log(&format!("Cluster count = {}", clusters))?;
    write_closure(job, &rep)?;
    Ok(())
}

/// Uni-directional clustering: the best edge of every member decides its rep.
pub fn cluster(
    job: &Job,
    edges: &[PathBuf],
    db: &VolumedFile,
) -> Result<Option<PathBuf>, ClusterError> {
    let clustering_path = job.base_dir().join("clustering");
    std::fs::create_dir_all(&clustering_path)?;
    let output = FileArray::create(clustering_path.join("assignments"), 1, job.worker_id())?;
    let mut queue = AtomicFile::new(clustering_path.join("queue"))?;
    let mut buckets_processed = 0i64;
    loop {
        let bucket = queue.fetch_add(1)?;
        if bucket >= edges.len() as i64 {
            break;
        }
        let file = VolumedFile::open(&edges[bucket as usize])?;
        let mut data: Vec<Edge> = load_bucket(&file)?;
        job.log(&format!(
            "Clustering. Bucket={}/{} Records={}",
            bucket + 1,
            edges.len(),
            data.len()
        ))?;
        data.par_sort_unstable_by(Edge::cmp);
        let mut buffer: BufferArray<Assignment> = BufferArray::new(&output);
        for group in merge_keys(&data, |e| e.member_oid) {
            let best = &group[0];
            if best.member_len < best.rep_len
                || (best.member_len == best.rep_len && best.member_oid > best.rep_oid)
            {
                buffer.write(
                    0,
                    Assignment {
                        member_oid: best.member_oid,
                        rep_oid: best.rep_oid,
                    },
                )?;
            }
        }
        buffer.finish()?;
        file.remove()?;
        buckets_processed += 1;
    }
    output.finish()?;

    let mut finished = AtomicFile::new(clustering_path.join("finished"))?;
    let f = finished.fetch_add(buckets_processed)?;
    let mut closure_finished = AtomicFile::new(clustering_path.join("closure_finished"))?;
    if f + buckets_processed < edges.len() as i64 {
        closure_finished.await_value(1)?;
    } else {
        let assignments = VolumedFile::open(output.bucket(0))?;
        compute_closure(job, &assignments, job.max_oid + 1)?;
        assignments.remove()?;
        closure_finished.fetch_add(1)?;
    }
    get_reps(job, db)
}

/// Bi-directional clustering: node degrees decide the rep of both endpoints.
pub fn cluster_bidirectional(
    job: &Job,
    edges: &[PathBuf],
    db: &VolumedFile,
) -> Result<Option<PathBuf>, ClusterError> {
    let mut lock = AtomicFile::new(job.base_dir().join("cluster_bidirectional_lock"))?;
    let mut finished = AtomicFile::new(job.base_dir().join("cluster_bidirectional_finished"))?;
    if lock.fetch_add(1)? == 0 {
        job.log("Computing clustering (bi-directional coverage)")?;
        let size = (job.max_oid + 1) as usize;
        let mut degree = vec![0u32; size];
        let mut edge_data: Vec<Edge> = Vec::new();
        for bucket in edges {
            if let Ok(file) = VolumedFile::open(bucket) {
                let data: Vec<Edge> = load_bucket(&file)?;
                for e in &data {
                    degree[e.member_oid as usize] += 1;
                    degree[e.rep_oid as usize] += 1;
                }
                edge_data.extend(data);
                file.remove()?;
            }
        }
        let mut rep: Vec<i64> = (0..size as i64).collect();
        for e in &edge_data {
            let m = e.member_oid as usize;
            let r = e.rep_oid as usize;
            if degree[r] > degree[rep[m] as usize]
                || (degree[r] == degree[rep[m] as usize] && (r as i64) < rep[m])
            {
                rep[m] = r as i64;
            }
            if degree[m] > degree[rep[r] as usize]
                || (degree[m] == degree[rep[r] as usize] && (m as i64) < rep[r])
            {
                rep[r] = m as i64;
            }
        }
        let clusters = flatten_closure(&mut rep);
        job.log(&format!("Cluster count = {}", clusters))?;
        write_closure(job, &rep)?;
        finished.fetch_add(1)?;
    } else {
        finished.await_value(1)?;
    }
    get_reps(job, db)
}

/// Emits the representative FASTA volumes for the next round; `None` on the last
/// round.
fn get_reps(job: &Job, db: &VolumedFile) -> Result<Option<PathBuf>, ClusterError> {
    if job.last_round() {
        return Ok(None);
    }
    let rep = read_closure(job, job.round())?;
    let base_dir = job.base_dir().join("reps");
    let output = FileArray::create(&base_dir, 1, job.worker_id())?;
    let mut queue = AtomicFile::new(base_dir.join("queue"))?;
    let mut volumes_processed = 0i64;
    let mut record_buf = Vec::new();
    loop {
        let v = queue.fetch_add(1)?;
        if v >= db.len() as i64 {
            break;
        }
        let volume = &db.volumes()[v as usize];
        job.log(&format!(
            "Writing representatives. Volume={}/{} Records={}",
            v + 1,
            db.len(),
            volume.record_count
        ))?;
        let records = crate::volume::read_volume_records(&volume.path, job.round() > 0)?;
        let mut oid = volume.oid_begin;
        for record in records {
            if job.round() > 0 {
                oid = record.accession().parse().unwrap_or(oid);
            }
            if rep.get(oid as usize) == Some(&oid) {
                record_buf.clear();
                write_fasta_record(&mut record_buf, &oid.to_string(), &record.seq)?;
                output.write_raw(0, &record_buf, 1, Some(oid))?;
            }
            oid += 1;
        }
        volumes_processed += 1;
    }
    output.finish()?;
    let mut finished = AtomicFile::new(base_dir.join("finished"))?;
    finished.fetch_add(volumes_processed)?;
    finished.await_value(db.len() as i64)?;
    Ok(Some(output.bucket(0)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closure_reaches_a_fixed_point() {
        let mut rep = vec![0i64, 0, 1, 2, 4, 4, 5];
        let clusters = flatten_closure(&mut rep);
        assert_eq!(rep, vec![0, 0, 0, 0, 4, 4, 4]);
        assert_eq!(clusters, 2);
        for i in 0..rep.len() {
            assert_eq!(rep[rep[i] as usize], rep[i]);
        }
    }

    #[test]
    fn best_edge_wins_per_member() {
        let mut edges = vec![
            Edge { rep_oid: 9, member_oid: 2, rep_len: 100, member_len: 50 },
            Edge { rep_oid: 7, member_oid: 2, rep_len: 200, member_len: 50 },
            Edge { rep_oid: 8, member_oid: 3, rep_len: 200, member_len: 50 },
        ];
        edges.sort_by(Edge::cmp);
        let mut picks = Vec::new();
        for group in merge_keys(&edges, |e| e.member_oid) {
            picks.push((group[0].member_oid, group[0].rep_oid));
        }
        assert_eq!(picks, vec![(2, 7), (3, 8)]);
    }
}
