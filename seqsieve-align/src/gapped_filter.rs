//! Cheap diagonal scan pruning seeds that cannot reach the gapped-stage cutoffs.
//!
//! For every surviving seed hit a slab of diagonals around the hit is scored with a
//! local running-maximum scan; the per-diagonal maxima are then combined allowing one
//! gap. Targets whose best combination misses the stage-1 cutoff are dropped before
//! any expensive DP runs; a second, wider window confirms stage-2 survivors.

use seqsieve_score::ScoreMatrix;
use seqsieve_seq::alphabet::{letter_at, Letter};
use seqsieve_seq::{Block, FlatArray};

use crate::config::ExtensionConfig;
use crate::stats::Statistics;
use crate::target::{SeedHit, SeedHitList};

/// Per-diagonal local maxima over a window around the seed.
fn scan_diags(
    query: &[Letter],
    query_cbs: Option<&[i8]>,
    target: &[Letter],
    d_begin: i32,
    j_begin: i32,
    j_end: i32,
    band: i32,
    matrix: &ScoreMatrix,
) -> Vec<i32> {
    let mut max_scores = vec![0i32; band as usize];
    let mut running = vec![0i32; band as usize];
    for j in j_begin..j_end {
        for b in 0..band as usize {
            let d = d_begin + b as i32;
            let i = j + d;
            if i < 0 || i >= query.len() as i32 {
                continue;
            }
            let mut s = matrix.score(letter_at(query, i as i64), letter_at(target, j as i64));
            if let Some(cbs) = query_cbs {
                s += cbs[i as usize] as i32;
            }
            running[b] = (running[b] + s).max(0);
            max_scores[b] = max_scores[b].max(running[b]);
        }
    }
    max_scores
}

/// Combines per-diagonal maxima into the best chain of at most two diagonals
/// separated by one gap.
fn diag_alignment(scores: &[i32], matrix: &ScoreMatrix) -> i32 {
    let gap_open = matrix.gap_open() + matrix.gap_extend();
    let gap_extend = matrix.gap_extend();
    let mut best = 0i32;
    // max over previous diagonals of score minus the extend cost of the shift
    let mut best_prev = i32::MIN / 2;
    for &s in scores {
        if best_prev > 0 {
            best = best.max(s + best_prev - gap_open);
        }
        best = best.max(s);
        best_prev = (best_prev - gap_extend).max(s);
    }
    best
}

fn filter_hit(
    hit: &SeedHit,
    query: &[Letter],
    query_cbs: Option<&[i8]>,
    target: &[Letter],
    band: i32,
    window: i32,
    matrix: &ScoreMatrix,
) -> i32 {
    let slen = target.len() as i32;
    let d = (hit.diag() - band / 2).max(-(slen - 1));
    let j0 = (hit.j - window).max(0);
    let j1 = (hit.j + window).min(slen);
    let scores = scan_diags(query, query_cbs, target, d, j0, j1, band, matrix);
    diag_alignment(&scores, matrix)
}

/// Returns true when any hit of the target clears both stage cutoffs.
fn target_passes(
    hits: &[SeedHit],
    query: &[&[Letter]],
    query_cbs: &[Option<&[i8]>],
    target: &[Letter],
    matrix: &ScoreMatrix,
    config: &ExtensionConfig,
    stat: &mut Statistics,
) -> bool {
    const WINDOW1: i32 = 100;
    let qlen = query[0].len();
    let cutoff1 = matrix.score_for_evalue(config.gapped_filter_evalue1, qlen, target.len());
    let cutoff2 = matrix.score_for_evalue(config.gapped_filter_evalue2, qlen, target.len());
    for hit in hits {
        stat.gapped_filter_hits1 += 1;
        let frame = hit.frame as usize;
        let f1 = filter_hit(hit, query[frame], query_cbs[frame], target, 64, WINDOW1, matrix);
        if f1 > cutoff1 {
            stat.gapped_filter_hits2 += 1;
            let f2 = filter_hit(
                hit,
                query[frame],
                query_cbs[frame],
                target,
                128,
                config.gapped_filter_window,
                matrix,
            );
            if f2 > cutoff2 {
                return true;
            }
        }
    }
    false
}

/// Filters a seed-hit list, keeping only targets with at least one promising hit.
pub fn gapped_filter(
    query: &[&[Letter]],
    query_cbs: &[Option<&[i8]>],
    list: &SeedHitList,
    targets: &Block,
    matrix: &ScoreMatrix,
    config: &ExtensionConfig,
    stat: &mut Statistics,
) -> SeedHitList {
    let mut out = SeedHitList {
        seed_hits: FlatArray::new(),
        target_block_ids: Vec::new(),
        target_scores: Vec::new(),
    };
    for t in 0..list.target_block_ids.len() {
        let block_id = list.target_block_ids[t];
        let target = targets.seqs().seq(block_id as usize);
        if target_passes(
            list.seed_hits.group(t),
            query,
            query_cbs,
            target,
            matrix,
            config,
            stat,
        ) {
            out.target_block_ids.push(block_id);
            out.seed_hits.push_group(list.seed_hits.group(t));
            out.target_scores.push(list.target_scores[t]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use seqsieve_score::SubstitutionMatrixList;
    use seqsieve_seq::alphabet::encode_seq;

    #[test]
    fn related_hit_scores_above_unrelated() {
        let m = ScoreMatrix::load(SubstitutionMatrixList::BLOSUM62);
        let q = encode_seq("MKTFFVLLLCTFTVFSAYSRGVFRRDTHKSEIAHRFKDLGE");
        let t_match = q.clone();
        let t_miss = encode_seq("GGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGG");
        let hit = SeedHit {
            i: 10,
            j: 10,
            score: 20,
            frame: 0,
        };
        let good = filter_hit(&hit, &q, None, &t_match, 64, 100, &m);
        let bad = filter_hit(&hit, &q, None, &t_miss, 64, 100, &m);
        assert!(good > bad);
        assert!(good > 100);
        assert!(bad <= 10);
    }

    #[test]
    fn one_gap_chain_combines_two_diagonals() {
        let m = ScoreMatrix::load(SubstitutionMatrixList::BLOSUM62);
        let mut scores = vec![0; 64];
        scores[10] = 50;
        scores[12] = 40;
        let combined = diag_alignment(&scores, &m);
        // 50 + 40 minus one open and two extends
        assert!(combined > 50);
        assert!(combined <= 90 - m.gap_open());
    }
}
