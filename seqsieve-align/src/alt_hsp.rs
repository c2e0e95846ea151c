//! Alternative-HSP recomputation.
//!
//! For every match, the subject regions already covered by its HSPs are blanked with
//! the hard-mask letter in a per-query scratch copy, the full matrix is re-swiped
//! against the masked copy and any new HSP passing the E-value cutoff is spliced onto
//! the match. The loop runs until no new HSP appears, every frame is fully masked, or
//! the per-target HSP cap is reached. Masking guarantees that the surviving HSPs
//! never overlap on the subject.

use seqsieve_score::ScoreMatrix;
use seqsieve_seq::alphabet::SUPER_HARD_MASK;
use seqsieve_seq::{is_fully_masked, Block, SequenceSet};

use crate::banded::{bin, new_targets, DpTarget};
use crate::config::ExtensionConfig;
use crate::extend::QueryContext;
use crate::hsp::HspValues;
use crate::stats::Statistics;
use crate::swipe::{swipe, SwipeParams};
use crate::target::Match;

struct ActiveTarget {
    match_idx: usize,
    /// per-frame index into the scratch arena; None when the frame never had an HSP
    masked_seq: Vec<Option<usize>>,
    active: u32,
}

/// Runs the alt-HSP loop over all matches of one query; no-op when at most one HSP
/// per target is configured.
pub fn recompute_alt_hsps(
    matches: &mut [Match],
    ctx: &QueryContext,
    block: &Block,
    matrix: &ScoreMatrix,
    config: &ExtensionConfig,
    hsp_values: HspValues,
    stat: &mut Statistics,
) {
    if config.max_hsps == 1 {
        return;
    }
    let contexts = config.contexts;

    // scratch copies of every (match, frame) with at least one HSP
    let mut scratch = SequenceSet::new();
    let mut active: Vec<ActiveTarget> = Vec::with_capacity(matches.len());
    for (idx, m) in matches.iter().enumerate() {
        let mut t = ActiveTarget {
            match_idx: idx,
            masked_seq: vec![None; contexts],
            active: 0,
        };
        let seq = block.seqs().seq(m.target_block_id as usize);
        for hsp in &m.hsp {
            let frame = hsp.frame as usize;
            if t.masked_seq[frame].is_none() {
                t.masked_seq[frame] = Some(scratch.push(seq));
                t.active |= 1 << frame;
            }
        }
        active.push(t);
    }
    scratch.finish();

    // initial masking of the already covered regions
    for (t, m) in active.iter().zip(matches.iter()) {
        for hsp in &m.hsp {
            if let Some(arena_idx) = t.masked_seq[hsp.frame as usize] {
                let seq = scratch.seq_mut(arena_idx);
                for pos in hsp.subject_range.begin..hsp.subject_range.end {
                    seq[pos as usize] = SUPER_HARD_MASK;
                }
            }
        }
    }
    active.retain(|t| t.active != 0);

    while !active.is_empty() {
        let mut next_active: Vec<ActiveTarget> = Vec::new();
        let mut dp: Vec<crate::banded::Targets> = (0..contexts).map(|_| new_targets()).collect();
        for (pos, t) in active.iter().enumerate() {
            for frame in 0..contexts {
                if t.active & (1 << frame) == 0 {
                    continue;
                }
                if let Some(arena_idx) = t.masked_seq[frame] {
                    let seq = scratch.seq(arena_idx);
                    let qlen = ctx.query[frame].len() as i32;
                    let cells = qlen as i64 * seq.len() as i64;
                    let b = bin(hsp_values, qlen, 0, 0, cells, 0, 0, config.max_swipe_dp);
                    dp[frame][b].push(DpTarget::full(seq, pos as u32, qlen, None));
                }
            }
        }

        let mut accepted: Vec<(usize, crate::hsp::Hsp)> = Vec::new();
        for frame in 0..contexts {
            let params = SwipeParams {
                query: ctx.query[frame],
                frame: frame as u8,
                query_source_len: ctx.source_len,
                composition_bias: ctx.bias[frame].as_ref().map(|b| b.int8.as_slice()),
                v: hsp_values,
                matrix,
                band_bin: config.band_bin,
                col_bin: config.col_bin,
            };
            for hsp in swipe(&dp[frame], &params, stat) {
                if hsp.evalue <= config.max_evalue {
                    accepted.push((frame, hsp));
                }
            }
        }
        drop(dp);

        let mut found = vec![false; active.len()];
        for (frame, hsp) in accepted {
            let pos = hsp.swipe_target as usize;
            let t = &active[pos];
            found[pos] = true;
            // mask the newly covered region before the next round
            if let Some(arena_idx) = t.masked_seq[frame] {
                let seq = scratch.seq_mut(arena_idx);
                for p in hsp.subject_range.begin..hsp.subject_range.end {
                    seq[p as usize] = SUPER_HARD_MASK;
                }
            }
            matches[t.match_idx].hsp.push(hsp);
        }

        for (pos, mut t) in active.drain(..).enumerate() {
            if !found[pos] {
                continue;
            }
            let m = &mut matches[t.match_idx];
            m.inner_culling();
            // drop frames masked beyond use
            for frame in 0..contexts {
                if t.active & (1 << frame) == 0 {
                    continue;
                }
                if let Some(arena_idx) = t.masked_seq[frame] {
                    if is_fully_masked(scratch.seq(arena_idx), config.fully_masked_threshold) {
                        t.active &= !(1 << frame);
                    }
                }
            }
            let under_cap = config.max_hsps == 0 || m.hsp.len() < config.max_hsps;
            if t.active != 0 && under_cap {
                next_active.push(t);
            }
        }
        active = next_active;
    }
}
