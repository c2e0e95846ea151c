//! Stages (d) and (e): chunk table and chunk building.
//!
//! The chunk table decides which RAM-sized alignment chunk every sequence is needed
//! in: pairs are swept rep group by rep group, the expected letter volume of the
//! open chunk is tracked with a HyperLogLog sketch over 64-letter blocks, and a new
//! chunk opens when the estimate crosses the bound. Every member referenced by a
//! chunk's pairs is emitted into the chunk table for that chunk. Stage (e) then
//! partitions the database by OId range and writes each sequence into the FASTA
//! volumes of every chunk that needs it.

use std::collections::HashMap;
use std::io::BufReader;
use std::path::PathBuf;

use rayon::prelude::*;
use seqsieve_io::{AtomicFile, BlockReader, BlockWriter};
use seqsieve_seq::alphabet::Letter;
use seqsieve_seq::{read_fasta, write_fasta_record};
use seqsieve_util::{merge_keys, HyperLogLog};

use crate::config::ClusterConfig;
use crate::errors::ClusterError;
use crate::file_array::{BufferArray, FileArray};
use crate::job::Job;
use crate::radix::{load_bucket, RADIX_BITS, RADIX_COUNT};
use crate::records::{ChunkTableEntry, PairEntry, PairEntryShort};
use crate::volume::VolumedFile;

fn bit_length(x: i64) -> u64 {
    64 - (x.max(1) as u64).leading_zeros() as u64
}

/// Expected-size tracker of one chunk: distinct 64-letter blocks per sequence.
struct SizeCounter {
    hll: HyperLogLog,
}

impl SizeCounter {
    fn new() -> SizeCounter {
        SizeCounter {
            hll: HyperLogLog::default(),
        }
    }

    fn add(&mut self, oid: i64, len: i32) {
        let x = oid << 17;
        let n = x + (len as i64 + 63) / 64;
        for i in x..n {
            self.hll.add(i);
        }
    }

    fn estimate(&self) -> i64 {
        self.hll.estimate()
    }
}

/// One open alignment chunk: its pairs file plus the size sketch.
struct ClusterChunk {
    id: i32,
    pairs_out: BlockWriter,
    size: SizeCounter,
}

impl ClusterChunk {
    fn create(next_chunk: &mut AtomicFile, chunks_path: &std::path::Path) -> Result<ClusterChunk, ClusterError> {
        let id = next_chunk.fetch_add(1)? as i32;
        let dir = chunks_path.join(id.to_string());
        std::fs::create_dir_all(&dir)?;
        Ok(ClusterChunk {
            id,
            pairs_out: BlockWriter::create(dir.join("pairs"))?,
            size: SizeCounter::new(),
        })
    }

    fn write_pairs(&mut self, pairs: &mut Vec<PairEntryShort>) -> Result<(), ClusterError> {
        for p in pairs.drain(..) {
            self.pairs_out.write(&p)?;
        }
        Ok(())
    }
}

/// Builds the (oid, chunk) table; returns the table buckets and the chunk count.
pub fn build_chunk_table(
    job: &Job,
    pair_table: &[PathBuf],
    max_oid: i64,
    config: &ClusterConfig,
) -> Result<(Vec<PathBuf>, i32), ClusterError> {
    let shift = bit_length(max_oid).saturating_sub(RADIX_BITS);
    let max_chunk_size = (config.linclust_chunk_size / 64).max(1);
    let base_path = job.base_dir().join("chunk_table");
    let chunks_path = job.base_dir().join("chunks");
    std::fs::create_dir_all(&base_path)?;
    std::fs::create_dir_all(&chunks_path)?;
    let output = FileArray::create(&base_path, RADIX_COUNT, job.worker_id())?;
    let mut queue = AtomicFile::new(base_path.join("queue"))?;
    let mut next_chunk = AtomicFile::new(base_path.join("next_chunk"))?;
    let mut current = ClusterChunk::create(&mut next_chunk, &chunks_path)?;
    let mut buckets_processed = 0i64;
    let mut total_pairs = 0i64;
    let mut distinct_pairs = 0i64;

    loop {
        let bucket = queue.fetch_add(1)?;
        if bucket >= pair_table.len() as i64 {
            break;
        }
        let file = VolumedFile::open(&pair_table[bucket as usize])?;
        let mut data: Vec<PairEntry> = load_bucket(&file)?;
        job.log(&format!(
            "Building chunk table. Bucket={}/{} Records={}",
            bucket + 1,
            pair_table.len(),
            data.len()
        ))?;
        total_pairs += data.len() as i64;
        data.par_sort_unstable_by(PairEntry::cmp);

        let mut buffers: BufferArray<ChunkTableEntry> = BufferArray::new(&output);
        let mut pairs_buffer: Vec<PairEntryShort> = Vec::new();
        for group in merge_keys(&data, |p| p.rep_oid) {
            let rep_oid = group[0].rep_oid;
            let rep_len = group[0].rep_len;
            buffers.write(
                ((rep_oid as u64) >> shift) as usize,
                ChunkTableEntry {
                    oid: rep_oid,
                    chunk: current.id,
                },
            )?;
            current.size.add(rep_oid, rep_len);
            for (n, pair) in group.iter().enumerate() {
                if n > 0 && pair.member_oid == group[n - 1].member_oid {
                    continue;
                }
                buffers.write(
                    ((pair.member_oid as u64) >> shift) as usize,
                    ChunkTableEntry {
                        oid: pair.member_oid,
                        chunk: current.id,
                    },
                )?;
                current.size.add(pair.member_oid, pair.member_len);
                pairs_buffer.push(PairEntryShort {
                    rep_oid,
                    member_oid: pair.member_oid,
                });
                distinct_pairs += 1;
            }
            current.write_pairs(&mut pairs_buffer)?;
            // open a new chunk when the letter estimate crosses the bound
            if current.size.estimate() >= max_chunk_size {
                job.log(&format!(
                    "Chunk {} estimated at {} letters",
                    current.id,
                    current.size.estimate() * 64
                ))?;
                current.pairs_out.finish()?;
                current = ClusterChunk::create(&mut next_chunk, &chunks_path)?;
            }
        }
        buffers.finish()?;
        file.remove()?;
        buckets_processed += 1;
    }
    current.pairs_out.finish()?;
    output.finish()?;
    job.log(&format!(
        "Chunk table done. Pairs={} Distinct={}",
        total_pairs, distinct_pairs
    ))?;

    let mut finished = AtomicFile::new(base_path.join("finished"))?;
    finished.fetch_add(buckets_processed)?;
    finished.await_value(pair_table.len() as i64)?;
    let chunk_count = next_chunk.get()? as i32;
    Ok((output.buckets(), chunk_count))
}

/// Stage (e): writes each referenced sequence into the FASTA volumes of its chunks.
pub fn build_chunks(
    job: &Job,
    db: &VolumedFile,
    chunk_table: &[PathBuf],
    chunk_count: i32,
) -> Result<(), ClusterError> {
    let base_path = job.base_dir().join("chunks");
    let output = FileArray::create(&base_path, chunk_count.max(1) as usize, job.worker_id())?;
    let mut queue = AtomicFile::new(base_path.join("queue"))?;
    let mut buckets_processed = 0i64;
    loop {
        let bucket = queue.fetch_add(1)?;
        if bucket >= chunk_table.len() as i64 {
            break;
        }
        let file = VolumedFile::open(&chunk_table[bucket as usize])?;
        let mut data: Vec<ChunkTableEntry> = load_bucket(&file)?;
        job.log(&format!(
            "Building chunks. Bucket={}/{} Records={}",
            bucket + 1,
            chunk_table.len(),
            data.len()
        ))?;
        if !data.is_empty() {
            data.par_sort_unstable_by(ChunkTableEntry::cmp);
            let oid_begin = data[0].oid;
            let oid_end = data[data.len() - 1].oid + 1;
            let volumes = db.find(oid_begin, oid_end)?;
            let mut table_ptr = 0usize;
            let mut record_buf = Vec::new();
            for volume in volumes {
                let records = crate::volume::read_volume_records(&volume.path, job.round() > 0)?;
                let mut file_oid = volume.oid_begin;
                for record in records {
                    if job.round() > 0 {
                        file_oid = record.accession().parse().unwrap_or(file_oid);
                    }
                    while table_ptr < data.len() && data[table_ptr].oid < file_oid {
                        table_ptr += 1;
                    }
                    if table_ptr >= data.len() {
                        break;
                    }
                    if data[table_ptr].oid == file_oid {
                        record_buf.clear();
                        write_fasta_record(&mut record_buf, &file_oid.to_string(), &record.seq)?;
                        let mut n = table_ptr;
                        while n < data.len() && data[n].oid == file_oid {
                            if n == table_ptr || data[n].chunk != data[n - 1].chunk {
                                output.write_raw(
                                    data[n].chunk as usize,
                                    &record_buf,
                                    1,
                                    Some(file_oid),
                                )?;
                            }
                            n += 1;
                        }
                    }
                    file_oid += 1;
                }
            }
        }
        file.remove()?;
        buckets_processed += 1;
    }
    output.finish()?;
    let mut finished = AtomicFile::new(base_path.join("finished"))?;
    finished.fetch_add(buckets_processed)?;
    finished.await_value(chunk_table.len() as i64)?;
    Ok(())
}

/// The loaded sequences of one alignment chunk.
pub struct ChunkSeqs {
    seqs: HashMap<i64, Vec<Letter>>,
    letters: usize,
}

impl ChunkSeqs {
    pub(crate) fn from_parts(seqs: HashMap<i64, Vec<Letter>>, letters: usize) -> ChunkSeqs {
        ChunkSeqs { seqs, letters }
    }

    /// Loads every FASTA volume of a chunk; record ids are global OIds.
    pub fn load(chunk_dir: &std::path::Path) -> Result<ChunkSeqs, ClusterError> {
        let volumes = VolumedFile::open(chunk_dir.join("bucket.tsv"))?;
        let mut seqs = HashMap::new();
        let mut letters = 0usize;
        for volume in volumes.volumes() {
            let mut reader = BlockReader::open(&volume.path)?;
            let raw = reader.read_raw()?;
            for record in read_fasta(BufReader::new(&raw[..]))? {
                let oid: i64 = record.accession().parse().unwrap_or(-1);
                letters += record.seq.len();
                seqs.insert(oid, record.seq);
            }
        }
        volumes.remove()?;
        Ok(ChunkSeqs { seqs, letters })
    }

    pub fn get(&self, oid: i64) -> Option<&[Letter]> {
        self.seqs.get(&oid).map(|v| v.as_slice())
    }

    pub fn oids(&self) -> usize {
        self.seqs.len()
    }

    pub fn letters(&self) -> usize {
        self.letters
    }
}

/// Reads the length-prefixed pair groups of one chunk.
pub fn read_chunk_pairs(chunk_dir: &std::path::Path) -> Result<Vec<PairEntryShort>, ClusterError> {
    let path = chunk_dir.join("pairs");
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut reader = BlockReader::open(&path)?;
    let mut pairs = Vec::new();
    while let Some(p) = reader.read::<PairEntryShort>()? {
        pairs.push(p);
    }
    let _ = std::fs::remove_file(&path);
    Ok(pairs)
}
