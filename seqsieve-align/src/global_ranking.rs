//! Global ranking: the two-pass front-end for databases that do not fit in memory.
//!
//! The first pass reduces every (query, target) pair to a 6-byte hit
//! `{target oid, score}` written to a per-query merged list on disk; the second pass
//! loads each query's top hits and feeds only those targets into the extension
//! pipeline. Seed scores that overflowed their 8-bit storage are recomputed with a
//! windowed ungapped scan before the ranking sort.

use std::io::{Read, Write};

use seqsieve_score::ScoreMatrix;
use seqsieve_seq::alphabet::Letter;
use seqsieve_seq::Block;

use crate::config::ExtensionConfig;
use crate::target::{SeedHitList, TargetScore};
use crate::ungapped::ungapped_window;

/// Ungapped scan window of the overflow recompute.
const UNGAPPED_WINDOW: i32 = 48;

/// One ranking hit of the merged query list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RankingHit {
    pub oid: u32,
    pub score: u16,
    pub context: u8,
}

impl RankingHit {
    /// Ordering by score descending, oid ascending.
    pub fn cmp(a: &RankingHit, b: &RankingHit) -> std::cmp::Ordering {
        b.score.cmp(&a.score).then(a.oid.cmp(&b.oid))
    }
}

/// Recomputes one target's overflowed seed score by scanning a window around each
/// overflowed hit.
fn recompute_overflow_score(
    hits: &[crate::target::SeedHit],
    query: &[Letter],
    target: &[Letter],
    matrix: &ScoreMatrix,
) -> u16 {
    let mut score = 0i32;
    for hit in hits {
        if hit.score != TargetScore::OVERFLOW as i32 {
            continue;
        }
        let q0 = (hit.i - UNGAPPED_WINDOW).max(0);
        let s = ungapped_window(
            query,
            target,
            q0,
            hit.j - (hit.i - q0),
            UNGAPPED_WINDOW * 2,
            matrix,
        );
        score = score.max(s);
    }
    score.clamp(0, u16::MAX as i32) as u16
}

/// First-pass product for one query: the top-K ranking hits, overflow scores
/// resolved.
pub fn ranking_list(
    list: &mut SeedHitList,
    query: &[Letter],
    block: &Block,
    matrix: &ScoreMatrix,
    config: &ExtensionConfig,
) -> Vec<RankingHit> {
    let mut overflows = 0usize;
    for ts in list.target_scores.iter_mut() {
        if ts.score == TargetScore::OVERFLOW {
            let block_id = list.target_block_ids[ts.target as usize];
            let target = block.seqs().seq(block_id as usize);
            ts.score = recompute_overflow_score(
                list.seed_hits.group(ts.target as usize),
                query,
                target,
                matrix,
            );
            overflows += 1;
        }
    }
    if overflows > 0 {
        list.target_scores.sort_by(TargetScore::cmp);
    }
    let k = config.global_ranking_targets.max(0) as usize;
    list.target_scores
        .iter()
        .take(k)
        .map(|ts| RankingHit {
            oid: block.oid(list.target_block_ids[ts.target as usize]) as u32,
            score: ts.score,
            context: 0,
        })
        .collect()
}

/// Appends one query's ranking hits to the merged query list:
/// `{u32 query_block_id, u32 byte_count, hits}` little-endian.
pub fn write_query_list<W: Write>(
    out: &mut W,
    query_block_id: u32,
    hits: &[RankingHit],
) -> std::io::Result<()> {
    out.write_all(&query_block_id.to_le_bytes())?;
    let bytes = (hits.len() * 6) as u32;
    out.write_all(&bytes.to_le_bytes())?;
    for h in hits {
        out.write_all(&h.oid.to_le_bytes())?;
        out.write_all(&h.score.to_le_bytes())?;
    }
    Ok(())
}

/// Reads the next query's hits back, or `None` at end of stream.
pub fn read_query_list<R: Read>(input: &mut R) -> std::io::Result<Option<(u32, Vec<RankingHit>)>> {
    let mut head = [0u8; 4];
    match input.read_exact(&mut head) {
        Ok(()) => {}
        Err(ref e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }
    let query_block_id = u32::from_le_bytes(head);
    input.read_exact(&mut head)?;
    let bytes = u32::from_le_bytes(head);
    let n = bytes as usize / 6;
    let mut hits = Vec::with_capacity(n);
    for _ in 0..n {
        let mut oid = [0u8; 4];
        let mut score = [0u8; 2];
        input.read_exact(&mut oid)?;
        input.read_exact(&mut score)?;
        hits.push(RankingHit {
            oid: u32::from_le_bytes(oid),
            score: u16::from_le_bytes(score),
            context: 0,
        });
    }
    Ok(Some((query_block_id, hits)))
}
