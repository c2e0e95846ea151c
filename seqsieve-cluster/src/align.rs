//! Stage (f): chunk alignment.
//!
//! Every chunk is a self-contained mini-database. For each rep all members with a
//! pair are aligned against it with the full-matrix swipe (coordinates on); an
//! alignment passing the identity and coverage thresholds emits a directed edge
//! (uni-directional mode) or a canonically ordered edge (mutual mode) into the
//! radix-partitioned edge table.

use std::path::PathBuf;

use seqsieve_align::banded::{bin, new_targets, DpTarget};
use seqsieve_align::swipe::{swipe, SwipeParams};
use seqsieve_align::{Hsp, HspValues, Statistics};
use seqsieve_io::AtomicFile;
use seqsieve_score::{ScoreMatrix, SubstitutionMatrixList};
use seqsieve_util::{merge_keys, murmur_mix};

use crate::chunk::{read_chunk_pairs, ChunkSeqs};
use crate::config::ClusterConfig;
use crate::errors::ClusterError;
use crate::file_array::{BufferArray, FileArray};
use crate::job::Job;
use crate::radix::RADIX_COUNT;
use crate::records::Edge;

/// Search-space width for the E-values of chunk alignments.
const DB_LETTERS: u64 = 1_000_000_000;

fn approx_id(hsp: &Hsp, qlen: i32, tlen: i32) -> f64 {
    if hsp.identities > 0 && hsp.length > 0 {
        hsp.id_percent()
    } else {
        hsp.approx_id_percent(qlen, tlen)
    }
}

fn align_rep(
    rep_oid: i64,
    members: &[crate::records::PairEntryShort],
    seqs: &ChunkSeqs,
    matrix: &ScoreMatrix,
    config: &ClusterConfig,
    edges: &mut BufferArray<Edge>,
    stat: &mut Statistics,
) -> Result<(), ClusterError> {
    let rep = match seqs.get(rep_oid) {
        Some(r) => r,
        None => return Ok(()),
    };
    let rep_len = rep.len() as i32;
    let mut dp = new_targets();
    let mut member_oids: Vec<i64> = Vec::with_capacity(members.len());
    for pair in members {
        let member = match seqs.get(pair.member_oid) {
            Some(m) => m,
            None => continue,
        };
        let cells = rep_len as i64 * member.len() as i64;
        let b = bin(HspValues::COORDS, rep_len, 0, 0, cells, 0, 0, i64::MAX);
        dp[b].push(DpTarget::full(
            member,
            member_oids.len() as u32,
            rep_len,
            None,
        ));
        member_oids.push(pair.member_oid);
    }
    let params = SwipeParams {
        query: rep,
        frame: 0,
        query_source_len: rep_len,
        composition_bias: None,
        v: HspValues::COORDS,
        matrix,
        band_bin: 24,
        col_bin: 400,
    };
    let unid = config.mutual_cover.is_none();
    for hsp in swipe(&dp, &params, stat) {
        let member_oid = member_oids[hsp.swipe_target as usize];
        let member_len = seqs.get(member_oid).map(|m| m.len()).unwrap_or(0) as i32;
        if approx_id(&hsp, rep_len, member_len) < config.approx_min_id {
            continue;
        }
        if unid {
            if hsp.subject_cover_percent(member_len) >= config.member_cover {
                edges.write(
                    (murmur_mix(member_oid as u64) & (RADIX_COUNT as u64 - 1)) as usize,
                    Edge {
                        rep_oid,
                        member_oid,
                        rep_len,
                        member_len,
                    },
                )?;
            }
            if hsp.query_cover_percent(rep_len) >= config.member_cover {
                edges.write(
                    (murmur_mix(rep_oid as u64) & (RADIX_COUNT as u64 - 1)) as usize,
                    Edge {
                        rep_oid: member_oid,
                        member_oid: rep_oid,
                        rep_len: member_len,
                        member_len: rep_len,
                    },
                )?;
            }
        } else {
            let cover = config.mutual_cover.unwrap_or(config.member_cover);
            if hsp.subject_cover_percent(member_len) >= cover
                && hsp.query_cover_percent(rep_len) >= cover
            {
                let (oid1, oid2, len1, len2) = if rep_oid <= member_oid {
                    (rep_oid, member_oid, rep_len, member_len)
                } else {
                    (member_oid, rep_oid, member_len, rep_len)
                };
                edges.write(
                    (murmur_mix(oid1 as u64) & (RADIX_COUNT as u64 - 1)) as usize,
                    Edge {
                        rep_oid: oid1,
                        member_oid: oid2,
                        rep_len: len1,
                        member_len: len2,
                    },
                )?;
            }
        }
    }
    Ok(())
}

/// Aligns every chunk and returns the edge-table buckets.
pub fn align(job: &Job, chunk_count: i32, config: &ClusterConfig) -> Result<Vec<PathBuf>, ClusterError> {
    let chunks_path = job.base_dir().join("chunks");
    let aln_path = job.base_dir().join("alignments");
    std::fs::create_dir_all(&aln_path)?;
    let mut matrix = ScoreMatrix::load(SubstitutionMatrixList::BLOSUM62);
    matrix.set_db_letters(DB_LETTERS);
    let output = FileArray::create(&aln_path, RADIX_COUNT, job.worker_id())?;
    let mut queue = AtomicFile::new(chunks_path.join("align_queue"))?;
    let mut chunks_processed = 0i64;
    let mut stat = Statistics::default();
    loop {
        let chunk = queue.fetch_add(1)?;
        if chunk >= chunk_count as i64 {
            break;
        }
        let chunk_dir = chunks_path.join(chunk.to_string());
        if !chunk_dir.exists() {
            chunks_processed += 1;
            continue;
        }
        let pairs = read_chunk_pairs(&chunk_dir)?;
        if pairs.is_empty() {
            chunks_processed += 1;
            continue;
        }
        let seqs = ChunkSeqs::load(&chunk_dir)?;
        job.log(&format!(
            "Computing alignments. Chunk={}/{} Sequences={} Letters={} Pairs={}",
            chunk + 1,
            chunk_count,
            seqs.oids(),
            seqs.letters(),
            pairs.len()
        ))?;
        let mut edges: BufferArray<Edge> = BufferArray::new(&output);
        let mut sorted = pairs;
        sorted.sort_by_key(|p| (p.rep_oid, p.member_oid));
        for group in merge_keys(&sorted, |p| p.rep_oid) {
            align_rep(
                group[0].rep_oid,
                group,
                &seqs,
                &matrix,
                config,
                &mut edges,
                &mut stat,
            )?;
        }
        edges.finish()?;
        chunks_processed += 1;
    }
    output.finish()?;
    job.log(&format!(
        "Extensions computed: {}",
        stat.extensions_computed
    ))?;
    let mut finished = AtomicFile::new(aln_path.join("finished"))?;
    finished.fetch_add(chunks_processed)?;
    finished.await_value(chunk_count as i64)?;
    Ok(output.buckets())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::PairEntryShort;
    use crate::volume::VolumedFile;
    use seqsieve_seq::alphabet::encode_seq;
    use std::collections::HashMap;

    fn chunk_of(seqs: &[(i64, &str)]) -> ChunkSeqs {
        let mut map = HashMap::new();
        let mut letters = 0;
        for (oid, s) in seqs {
            let e = encode_seq(s);
            letters += e.len();
            map.insert(*oid, e);
        }
        ChunkSeqs::from_parts(map, letters)
    }

    fn collect_edges(dir: &std::path::Path, write: impl FnOnce(&mut BufferArray<Edge>)) -> Vec<Edge> {
        let fa = FileArray::create(dir.join("edges"), RADIX_COUNT, 0).unwrap();
        let mut buf = BufferArray::new(&fa);
        write(&mut buf);
        buf.finish().unwrap();
        fa.finish().unwrap();
        let mut out = Vec::new();
        for b in fa.buckets() {
            if let Ok(v) = VolumedFile::open(&b) {
                out.extend(crate::radix::load_bucket::<Edge>(&v).unwrap());
            }
        }
        out
    }

    #[test]
    fn high_identity_pair_produces_an_edge() {
        let dir = tempfile::tempdir().unwrap();
        let long = "MKTFFVLLLCTFTVFSAYSRGVFRRDTHKSEIAHRFKDLGEEHFKGLVLIAFSQYLQQCP";
        let short = &long[..55]; // fully covered member
        let seqs = chunk_of(&[(0, long), (1, short)]);
        let matrix = ScoreMatrix::load(SubstitutionMatrixList::BLOSUM62);
        let config = ClusterConfig {
            member_cover: 80.0,
            approx_min_id: 90.0,
            ..ClusterConfig::default()
        };
        let mut stat = Statistics::default();
        let edges = collect_edges(dir.path(), |buf| {
            align_rep(
                0,
                &[PairEntryShort { rep_oid: 0, member_oid: 1 }],
                &seqs,
                &matrix,
                &config,
                buf,
                &mut stat,
            )
            .unwrap();
        });
        assert!(edges.iter().any(|e| e.rep_oid == 0 && e.member_oid == 1));
        // soundness: the rep is not shorter than the member on that edge
        for e in &edges {
            if e.rep_oid == 0 {
                assert!(e.rep_len >= e.member_len);
            }
        }
    }

    #[test]
    fn mutual_cover_rejects_length_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let base = "MKTFFVLLLCTFTVFSAYSRGVFRRDTHKSEIAHRFKDLGEEHFKGLVLIAFSQYLQQCP";
        let long: String = base.repeat(4); // 240 aa
        let short = &long[..120];
        let seqs = chunk_of(&[(0, &long), (1, short)]);
        let matrix = ScoreMatrix::load(SubstitutionMatrixList::BLOSUM62);
        let mutual = ClusterConfig::default().with_mutual_cover(80.0, false);
        let mut stat = Statistics::default();
        let edges = collect_edges(dir.path(), |buf| {
            align_rep(
                0,
                &[PairEntryShort { rep_oid: 0, member_oid: 1 }],
                &seqs,
                &matrix,
                &mutual,
                buf,
                &mut stat,
            )
            .unwrap();
        });
        assert!(edges.is_empty(), "mutual coverage must reject the pair");

        let dir2 = tempfile::tempdir().unwrap();
        let uni = ClusterConfig {
            member_cover: 80.0,
            ..ClusterConfig::default()
        };
        let edges = collect_edges(dir2.path(), |buf| {
            align_rep(
                0,
                &[PairEntryShort { rep_oid: 0, member_oid: 1 }],
                &seqs,
                &matrix,
                &uni,
                buf,
                &mut stat,
            )
            .unwrap();
        });
        assert!(
            edges.iter().any(|e| e.rep_oid == 0 && e.member_oid == 1),
            "member coverage must accept the pair with the longer as rep"
        );
    }
}
