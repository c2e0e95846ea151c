//! The round driver and the final clustering output.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use seqsieve_io::AtomicFile;

use crate::align;
use crate::chunk::{build_chunk_table, build_chunks};
use crate::cluster::{cluster, cluster_bidirectional, read_closure};
use crate::config::ClusterConfig;
use crate::errors::ClusterError;
use crate::job::{cluster_steps, Job, Sensitivity};
use crate::pair_table::build_pair_table;
use crate::radix::{radix_sort, RADIX_COUNT};
use crate::records::{ChunkTableEntry, Edge, PairEntry, SeedEntry};
use crate::seed_table::build_seed_table;
use crate::volume::VolumedFile;

fn bit_length(x: i64) -> u64 {
    64 - (x.max(1) as u64).leading_zeros() as u64
}

/// Runs one clustering round over `volumes`; returns the representative volume list
/// for the next round, or `None` after the last round.
pub fn round(
    job: &Job,
    volumes: &VolumedFile,
    sensitivity: Sensitivity,
    config: &ClusterConfig,
) -> Result<Option<PathBuf>, ClusterError> {
    job.log(&format!(
        "Starting round {} sensitivity {:?}",
        job.round(),
        sensitivity
    ))?;

    let pair_table_base = job.base_dir().join("pair_table");
    std::fs::create_dir_all(&pair_table_base)?;
    let pair_table_files =
        crate::file_array::FileArray::create(&pair_table_base, RADIX_COUNT, job.worker_id())?;
    let shapes = 1usize;
    let mut pair_table = Vec::new();
    for shape in 0..shapes {
        let buckets = build_seed_table(job, volumes, shape, sensitivity, config)?;
        let sorted_seed_table =
            radix_sort::<SeedEntry>(job, &buckets, 64 - crate::radix::RADIX_BITS, config.memory_limit)?;
        pair_table = build_pair_table(job, &sorted_seed_table, shape, &pair_table_files, config)?;
    }
    pair_table_files.finish()?;

    let sorted_pair_table =
        radix_sort::<PairEntry>(job, &pair_table, 64 - crate::radix::RADIX_BITS, config.memory_limit)?;
    let (chunk_table, chunk_count) =
        build_chunk_table(job, &sorted_pair_table, volumes.max_oid(), config)?;
    let sorted_chunk_table = radix_sort::<ChunkTableEntry>(
        job,
        &chunk_table,
        bit_length(volumes.max_oid()),
        config.memory_limit,
    )?;
    build_chunks(job, volumes, &sorted_chunk_table, chunk_count)?;
    let edges = align::align(job, chunk_count, config)?;
    if config.mutual_cover.is_some() {
        cluster_bidirectional(job, &edges, volumes)
    } else {
        let sorted_edges =
            radix_sort::<Edge>(job, &edges, 64 - crate::radix::RADIX_BITS, config.memory_limit)?;
        cluster(job, &sorted_edges, volumes)
    }
}

/// Reads the accession tables written by the first round.
fn read_accessions(job: &Job, volumes: &VolumedFile) -> Result<HashMap<i64, String>, ClusterError> {
    let mut accessions = HashMap::new();
    for (v, volume) in volumes.volumes().iter().enumerate() {
        let path = job.root_dir().join("accessions").join(format!("{}.txt", v));
        let file = std::fs::File::open(&path)?;
        let mut oid = volume.oid_begin;
        for line in BufReader::new(file).lines() {
            accessions.insert(oid, line?);
            oid += 1;
        }
    }
    Ok(accessions)
}

/// Writes the accession table of one volume; called during the first round.
pub fn write_accessions(job: &Job, volumes: &VolumedFile) -> Result<(), ClusterError> {
    let dir = job.root_dir().join("accessions");
    std::fs::create_dir_all(&dir)?;
    for (v, volume) in volumes.volumes().iter().enumerate() {
        let path = dir.join(format!("{}.txt", v));
        if path.exists() {
            continue;
        }
        let file = std::fs::File::open(&volume.path)?;
        let records = seqsieve_seq::read_fasta(BufReader::new(file))?;
        let mut out = std::fs::File::create(&path)?;
        for record in records {
            writeln!(out, "{}", record.accession())?;
        }
    }
    Ok(())
}

/// Composes the per-round closures into the final member→representative table.
fn output(job: &Job, volumes: &VolumedFile, rounds: usize, config: &ClusterConfig) -> Result<(), ClusterError> {
    job.log("Writing final clustering")?;
    let accessions = read_accessions(job, volumes)?;
    let size = (job.max_oid + 1) as usize;
    let mut rep: Vec<i64> = (0..size as i64).collect();
    for round in 0..rounds {
        let round_rep = read_closure(job, round)?;
        for i in 0..size {
            let r = rep[i] as usize;
            if r < round_rep.len() {
                rep[i] = round_rep[r];
            }
        }
    }
    let mut out = std::fs::File::create(&config.output_file)?;
    for (i, &r) in rep.iter().enumerate() {
        let member = match accessions.get(&(i as i64)) {
            Some(a) => a,
            None => continue,
        };
        let rep_acc = accessions
            .get(&r)
            .expect("representative must have an accession");
        writeln!(out, "{}\t{}", rep_acc, member)?;
    }
    Ok(())
}

/// Runs the whole clustering job: the round schedule, then the final output.
pub fn run(config: &ClusterConfig, database: &std::path::Path) -> Result<(), ClusterError> {
    let volumes = VolumedFile::open(database)?;
    let mut job = Job::create(config, volumes.max_oid(), volumes.len())?;
    if job.worker_id() == 0 {
        match config.mutual_cover {
            Some(c) => job.log(&format!("Bi-directional coverage = {}", c))?,
            None => job.log(&format!("Uni-directional coverage = {}", config.member_cover))?,
        }
        job.log(&format!("Approx. id = {}", config.approx_min_id))?;
        job.log(&format!("#Volumes = {}", volumes.len()))?;
        job.log(&format!("#Sequences = {}", volumes.records()))?;
    }
    write_accessions(&job, &volumes)?;
    let steps = cluster_steps(config.approx_min_id);
    job.set_round_count(steps.len());

    let mut current: Option<PathBuf> = None;
    for (i, sensitivity) in steps.iter().enumerate() {
        let round_config = match config.mutual_cover {
            Some(c) => config.clone().with_mutual_cover(c, i == 0),
            None => config.clone(),
        };
        let reps = match &current {
            None => round(&job, &volumes, *sensitivity, &round_config)?,
            Some(path) => {
                let v = VolumedFile::open(path)?;
                round(&job, &v, *sensitivity, &round_config)?
            }
        };
        current = reps;
        if i < steps.len() - 1 {
            job.next_round()?;
        }
    }

    let mut output_lock = AtomicFile::new(job.root_dir().join("output_lock"))?;
    if output_lock.fetch_add(1)? == 0 {
        output(&job, &volumes, steps.len(), config)?;
    }
    Ok(())
}
