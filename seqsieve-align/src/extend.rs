//! Per-query extension orchestrator.
//!
//! Drives the staged pipeline for one query: seed-hit loading (done by the caller),
//! optional k-mer and gapped filters, ungapped extension and chaining, the score-only
//! gapped pass over ranked target chunks with the ranking termination rule, the
//! traceback pass over the survivors, alt-HSP recomputation and the final culling.

use std::sync::Arc;

use seqsieve_score::{adjust_rule, BiasCorrection, MatrixAdjustRule, ScoreMatrix, TargetMatrix};
use seqsieve_score::composition::composition;
use seqsieve_seq::alphabet::{count_true_aa, Letter};
use seqsieve_seq::{Block, FlatArray};

use crate::alt_hsp::recompute_alt_hsps;
use crate::banded::{bin, new_targets, DpTarget};
use crate::chaining::{chain, hamming_ext, HammingExt};
use crate::config::{ExtensionConfig, ExtensionMode};
use crate::culling::{append_targets, apply_filters, cull_matches, cull_targets};
use crate::diag::{ApproxHsp, DiagonalSegment};
use crate::gapped_filter::gapped_filter;
use crate::hsp::{Hsp, HspValues};
use crate::kmer_filter::kmer_filter;
use crate::stats::Statistics;
use crate::swipe::{swipe, SwipeParams};
use crate::target::{Match, SeedHit, SeedHitList, Target, TargetScore, WorkTarget};
use crate::ungapped::{self_score, xdrop_ungapped};
use crate::wavefront::anchored::anchored_hsp;

const MAX_CHUNK_SIZE: i64 = 400;
const MIN_CHUNK_SIZE: i64 = 128;
const MAPANY_CHUNK_SIZE: i64 = 16;
const UNIFIED_TARGET_LEN: usize = 50;

/// Query-side state shared by every stage of one query's extension.
pub struct QueryContext<'a> {
    pub query_block_id: u32,
    /// one sequence per context (frame)
    pub query: Vec<&'a [Letter]>,
    pub source_len: i32,
    pub bias: Vec<Option<BiasCorrection>>,
    pub composition: [f64; seqsieve_seq::alphabet::TRUE_AA],
    pub self_aln_score: f64,
}

impl<'a> QueryContext<'a> {
    pub fn new(
        query_block_id: u32,
        query: Vec<&'a [Letter]>,
        matrix: &ScoreMatrix,
        config: &ExtensionConfig,
    ) -> QueryContext<'a> {
        let bias: Vec<Option<BiasCorrection>> = if config.comp_based_stats >= 1 {
            query.iter().map(|q| Some(BiasCorrection::new(q, matrix))).collect()
        } else {
            query.iter().map(|_| None).collect()
        };
        let comp = composition(query[0]);
        let source_len = query[0].len() as i32;
        let self_aln = self_score(
            query[0],
            bias[0].as_ref().map(|b| b.int8.as_slice()),
            matrix,
        ) as f64;
        QueryContext {
            query_block_id,
            query,
            source_len,
            bias,
            composition: comp,
            self_aln_score: self_aln,
        }
    }

    fn bias_slice(&self, frame: usize) -> Option<&[i8]> {
        self.bias[frame].as_ref().map(|b| b.int8.as_slice())
    }
}

/// Ranking chunk size for one query.
fn ranking_chunk_size(target_count: i64, ref_letters: i64, config: &ExtensionConfig) -> i64 {
    if config.no_ranking || config.global_ranking_targets > 0 {
        return target_count;
    }
    if config.ext_chunk_size > 0 {
        return config.ext_chunk_size;
    }
    if config.mapany {
        return MAPANY_CHUNK_SIZE;
    }
    let default_letters: f64 = if config.mode == ExtensionMode::BandedSlow {
        800e6
    } else {
        2e9
    };
    let block_mult = ((ref_letters as f64 / default_letters).round() as i64).max(1);
    if config.toppercent < 100.0 {
        return MIN_CHUNK_SIZE * block_mult;
    }
    let multiple = (config.max_target_seqs + 31) / 32 * 32;
    let size = MIN_CHUNK_SIZE.max(multiple.min(MAX_CHUNK_SIZE)) * block_mult;
    if config.target_hard_cap > 0 {
        size.min(config.target_hard_cap)
    } else {
        size
    }
}

/// Chunk-loop exit test. The hard cap strictly precedes every other condition.
fn ranking_terminate(
    new_hits: bool,
    last_tail_score: i32,
    tail_score: i32,
    targets_processed: i64,
    targets_aligned: i64,
    matrix: &ScoreMatrix,
    config: &ExtensionConfig,
) -> bool {
    if config.target_hard_cap > 0 && targets_processed >= config.target_hard_cap {
        return true;
    }
    if config.mapany && config.toppercent == 100.0 && targets_aligned > 0 {
        return true;
    }
    !new_hits
        && (last_tail_score == 0
            || tail_score as f64 / last_tail_score as f64 <= config.ranking_score_drop_factor
            || matrix.bitscore(tail_score) < config.ranking_cutoff_bitscore)
}

/// The ungapped stage for one target: X-drop extension of its seed hits and chaining
/// of the resulting diagonal segments.
fn ungapped_stage(
    hits: &mut [SeedHit],
    block_id: u32,
    ctx: &QueryContext,
    targets: &Block,
    matrix: &ScoreMatrix,
    config: &ExtensionConfig,
) -> WorkTarget {
    let contexts = config.contexts;
    let mut target = WorkTarget::new(block_id, contexts);
    let target_seq = targets.seqs().seq(block_id as usize);

    if config.comp_based_stats >= 2 && !config.anchored_swipe {
        let qlen_true = count_true_aa(ctx.query[0]);
        if adjust_rule(&ctx.composition, qlen_true, target_seq) == MatrixAdjustRule::Scale {
            target.matrix = Some(Arc::new(TargetMatrix::new(&ctx.composition, target_seq, matrix)));
        }
    }

    if config.mode == ExtensionMode::Full {
        for hit in hits.iter() {
            let f = hit.frame as usize;
            target.ungapped_score[f] = target.ungapped_score[f].max(hit.score);
        }
        return target;
    }

    hits.sort_by(SeedHit::cmp);
    let mut segments: Vec<Vec<DiagonalSegment>> = vec![Vec::new(); contexts];
    for hit in hits.iter() {
        let f = hit.frame as usize;
        target.ungapped_score[f] = target.ungapped_score[f].max(hit.score);
        if let Some(last) = segments[f].last() {
            if last.diag() == hit.diag() && last.subject_end() >= hit.j {
                continue;
            }
        }
        let d = xdrop_ungapped(
            ctx.query[f],
            ctx.bias_slice(f),
            target_seq,
            hit.i,
            hit.j,
            config.raw_ungapped_xdrop,
            matrix,
            false,
        );
        if d.score > 0 {
            segments[f].push(d);
        }
    }

    if contexts == 1 {
        let qlen = ctx.query[0].len() as i32;
        let tlen = target_seq.len() as i32;
        match hamming_ext(&segments[0], qlen, tlen, true) {
            HammingExt::Accept(h) => {
                let hsp = diagonal_hsp(
                    ctx.query[0],
                    ctx.bias_slice(0),
                    target_seq,
                    h.max_diag.diag(),
                    matrix,
                );
                if hsp.evalue <= config.max_evalue {
                    target.done = true;
                    target.done_hsp = Some(hsp);
                    target.hsp[0].push(h);
                    return target;
                }
            }
            HammingExt::Reject => {
                target.ungapped_score[0] = 0;
                return target;
            }
            HammingExt::Undecided => {}
        }
    }

    for (frame, segs) in segments.iter_mut().enumerate() {
        if segs.is_empty() {
            continue;
        }
        segs.sort_by(DiagonalSegment::cmp_diag);
        let qlen = ctx.query[frame].len() as i32;
        let band = config.band(qlen);
        target.hsp[frame] = chain(
            segs,
            qlen,
            target_seq.len() as i32,
            band,
            config.min_band_overlap,
            frame as u8,
        );
    }
    target
}

/// Gap-free alignment of the full overlap of a pair along one diagonal, with exact
/// identity counts and transcript; backs the hamming fast path.
fn diagonal_hsp(
    query: &[Letter],
    query_cbs: Option<&[i8]>,
    target: &[Letter],
    d: i32,
    matrix: &ScoreMatrix,
) -> Hsp {
    let i0 = d.max(0);
    let j0 = (-d).max(0);
    let len = (query.len() as i32 - i0).min(target.len() as i32 - j0).max(0);
    let mut hsp = Hsp::default();
    let mut score = 0i32;
    for n in 0..len {
        let q = query[(i0 + n) as usize];
        let t = target[(j0 + n) as usize];
        score += matrix.score(q, t);
        if let Some(cbs) = query_cbs {
            score += cbs[(i0 + n) as usize] as i32;
        }
        if q == t {
            hsp.transcript.push(crate::hsp::EditOp::Match);
        } else {
            hsp.transcript.push(crate::hsp::EditOp::Substitution(t));
        }
    }
    hsp.score = score;
    hsp.evalue = matrix.evalue(score, query.len(), target.len());
    hsp.bit_score = matrix.bitscore(score);
    hsp.query_range = crate::interval::Interval::new(i0, i0 + len);
    hsp.query_source_range = hsp.query_range;
    hsp.subject_range = crate::interval::Interval::new(j0, j0 + len);
    hsp.d_begin = d;
    hsp.d_end = d + 1;
    hsp.update_stats_from_transcript();
    hsp
}

/// Band of one chained HSP, optionally narrowed when the chain already covers most of
/// either sequence.
fn hsp_band(base_band: i32, qlen: i32, tlen: i32, hsp: &ApproxHsp, config: &ExtensionConfig) -> i32 {
    if config.narrow_band_cov > 0.0
        && (hsp.query_range.length() as f64 / qlen as f64 >= config.narrow_band_cov
            || hsp.subject_range.length() as f64 / tlen as f64 >= config.narrow_band_cov)
    {
        return ((hsp.d_max - hsp.d_min) as f64 * config.narrow_band_factor) as i32;
    }
    base_band
}

/// The score-only gapped pass over one chunk of work targets.
fn align_chunk(
    work: Vec<WorkTarget>,
    ctx: &QueryContext,
    targets: &Block,
    matrix: &ScoreMatrix,
    config: &ExtensionConfig,
    stat: &mut Statistics,
) -> Vec<Target> {
    let contexts = config.contexts;
    let mut out: Vec<Target> = Vec::with_capacity(work.len());
    let mut dp: Vec<crate::banded::Targets> = (0..contexts).map(|_| new_targets()).collect();

    for (idx, w) in work.iter().enumerate() {
        let mut t = Target::new(w.block_id, w.ungapped_score[0], w.matrix.clone(), contexts);
        if w.done {
            if let Some(hsp) = &w.done_hsp {
                t.add_hit(hsp.clone());
                t.done = true;
            }
        } else if config.anchored_swipe {
            // anchored wavefront path: final coordinates already in the first pass
            let seq = targets.seqs().seq(w.block_id as usize);
            for frame in 0..contexts {
                for approx in &w.hsp[frame] {
                    if let Some(mut hsp) = anchored_hsp(
                        ctx.query[frame],
                        ctx.bias_slice(frame),
                        seq,
                        &approx.max_diag,
                        frame as u8,
                        matrix,
                        config,
                    ) {
                        hsp.swipe_target = idx as u32;
                        if hsp.evalue <= config.max_evalue {
                            t.add_hit(hsp);
                        }
                    }
                }
            }
            t.done = t.has_hits();
        } else {
            add_dp_targets(w, idx as u32, ctx, targets, &mut dp, config);
        }
        if w.matrix.is_some() {
            stat.cbs_targets += 1;
        }
        out.push(t);
    }

    for frame in 0..contexts {
        let params = SwipeParams {
            query: ctx.query[frame],
            frame: frame as u8,
            query_source_len: ctx.source_len,
            composition_bias: ctx.bias_slice(frame),
            v: HspValues::NONE,
            matrix,
            band_bin: config.band_bin,
            col_bin: config.col_bin,
        };
        let hsps = swipe(&dp[frame], &params, stat);
        for hsp in hsps {
            out[hsp.swipe_target as usize].add_hit(hsp);
        }
    }

    let mut survivors: Vec<Target> = Vec::new();
    for mut t in out {
        if t.has_hits() {
            if config.max_hsps == 1 {
                t.inner_culling();
            }
            survivors.push(t);
        }
    }
    survivors
}

/// Adds the DP band entries of one work target to the per-frame batches.
fn add_dp_targets<'a>(
    w: &'a WorkTarget,
    target_idx: u32,
    ctx: &QueryContext,
    targets: &'a Block,
    dp: &mut [crate::banded::Targets<'a>],
    config: &ExtensionConfig,
) {
    let seq: &'a [Letter] = targets.seqs().seq(w.block_id as usize);
    let tlen = seq.len() as i32;
    let matrix = w.matrix.as_deref();
    let score_width = matrix.map(|m| m.score_width()).unwrap_or(0);
    for frame in 0..config.contexts {
        let qlen = ctx.query[frame].len() as i32;
        if config.mode == ExtensionMode::Full {
            if w.ungapped_score[frame] == 0 {
                continue;
            }
            let cells = qlen as i64 * tlen as i64;
            let b = bin(
                HspValues::NONE,
                qlen,
                0,
                w.ungapped_score[frame],
                cells,
                score_width,
                0,
                config.max_swipe_dp,
            );
            dp[frame][b].push(DpTarget::full(seq, target_idx, qlen, matrix));
            continue;
        }
        let base_band = config.band(qlen);
        for hsp in &w.hsp[frame] {
            let b = hsp_band(base_band, qlen, tlen, hsp, config);
            let d0 = (hsp.d_min - b).max(-(tlen - 1));
            let d1 = (hsp.d_max + 1 + b).min(qlen);
            let dp_size = DpTarget::banded_cols(qlen, tlen, d0, d1) as i64 * (d1 - d0) as i64;
            let b_idx = bin(
                HspValues::NONE,
                d1 - d0,
                0,
                hsp.score,
                dp_size,
                score_width,
                0,
                config.max_swipe_dp,
            );
            dp[frame][b_idx].push(DpTarget::banded(
                seq,
                d0,
                d1,
                hsp.subject_range,
                hsp.score,
                target_idx,
                qlen,
                matrix,
                hsp.max_diag,
            ));
        }
    }
}

/// The traceback pass: re-aligns the surviving targets with coordinate values and
/// converts them into matches.
fn traceback_round(
    targets: Vec<Target>,
    ctx: &QueryContext,
    block: &Block,
    matrix: &ScoreMatrix,
    config: &ExtensionConfig,
    hsp_values: HspValues,
    stat: &mut Statistics,
) -> Vec<Match> {
    let contexts = config.contexts;
    let mut matches: Vec<Match> = Vec::with_capacity(targets.len());
    let mut pending: Vec<Target> = Vec::new();
    for t in targets {
        if t.done {
            matches.push(Match::from_target(t));
        } else {
            pending.push(t);
        }
    }

    let mut dp: Vec<crate::banded::Targets> = (0..contexts).map(|_| new_targets()).collect();
    for (target_idx, t) in pending.iter().enumerate() {
        let seq = block.seqs().seq(t.block_id as usize);
        let tlen = seq.len() as i32;
        let matrix_ref = t.matrix.as_deref();
        let score_width = matrix_ref.map(|m| m.score_width()).unwrap_or(0);
        for frame in 0..contexts {
            let qlen = ctx.query[frame].len() as i32;
            for hsp in &t.hsp[frame] {
                let full = config.mode == ExtensionMode::Full;
                let (d0, d1) = if full {
                    (-(tlen - 1).max(0), qlen)
                } else {
                    (hsp.d_begin, hsp.d_end)
                };
                let dp_size = if full {
                    qlen as i64 * tlen as i64
                } else {
                    DpTarget::banded_cols(qlen, tlen, d0, d1) as i64 * (d1 - d0) as i64
                };
                let b = bin(
                    hsp_values,
                    if full { qlen } else { d1 - d0 },
                    hsp.score,
                    0,
                    dp_size,
                    score_width,
                    0,
                    config.max_swipe_dp,
                );
                if full {
                    dp[frame][b].push(DpTarget::full(seq, target_idx as u32, qlen, matrix_ref));
                } else {
                    dp[frame][b].push(DpTarget::banded(
                        seq,
                        d0,
                        d1,
                        hsp.subject_range,
                        hsp.score,
                        target_idx as u32,
                        qlen,
                        matrix_ref,
                        DiagonalSegment::default(),
                    ));
                }
            }
        }
    }

    let mut realigned: Vec<Target> = pending
        .iter()
        .map(|t| {
            let mut n = Target::new(t.block_id, t.ungapped_score, t.matrix.clone(), contexts);
            n.done = false;
            n
        })
        .collect();

    for frame in 0..contexts {
        let params = SwipeParams {
            query: ctx.query[frame],
            frame: frame as u8,
            query_source_len: ctx.source_len,
            composition_bias: ctx.bias_slice(frame),
            v: hsp_values,
            matrix,
            band_bin: config.band_bin,
            col_bin: config.col_bin,
        };
        let hsps = swipe(&dp[frame], &params, stat);
        for hsp in hsps {
            if hsp.evalue <= config.max_evalue {
                realigned[hsp.swipe_target as usize].add_hit(hsp);
            }
        }
    }

    for mut t in realigned {
        if !t.has_hits() {
            continue;
        }
        t.inner_culling();
        if config.max_hsps > 0 {
            t.max_hsp_culling(config.max_hsps);
        }
        if config.max_hsps == 1 {
            matches.push(Match::from_single_hsp(t));
        } else {
            matches.push(Match::from_target(t));
        }
    }
    matches
}

/// HSP values the configured output filters require.
pub fn filter_hsp_values(config: &ExtensionConfig) -> HspValues {
    let mut v = HspValues::NONE;
    if config.max_hsps != 1 {
        v |= HspValues::COORDS;
    }
    if config.min_id > 0.0 {
        v |= HspValues::IDENT | HspValues::LENGTH;
    }
    if config.approx_min_id > 0.0 {
        v |= HspValues::COORDS;
    }
    if config.query_cover > 0.0 {
        v |= HspValues::QUERY_COORDS;
    }
    if config.subject_cover > 0.0 {
        v |= HspValues::TARGET_COORDS;
    }
    if config.query_or_target_cover > 0.0 {
        v |= HspValues::COORDS;
    }
    v
}

/// Extends one query against a target block, given its decoded seed hits.
///
/// This is the top of the pipeline: the output is the ranked, culled match list with
/// whatever values `output_values` requests.
pub fn extend(
    ctx: &QueryContext,
    block: &Block,
    mut list: SeedHitList,
    matrix: &ScoreMatrix,
    config: &ExtensionConfig,
    output_values: HspValues,
    stat: &mut Statistics,
) -> Vec<Match> {
    stat.target_hits0 += list.target_block_ids.len() as u64;

    let mut trivial_matches: Vec<Match> = Vec::new();
    if config.filter_kmer_len > 0 {
        let (filtered, trivial) = kmer_filter(ctx.query[0], ctx.bias_slice(0), block, &list, matrix, config);
        stat.trivial_aln += trivial.len() as u64;
        list = filtered;
        trivial_matches = trivial;
    }

    let target_count = list.target_block_ids.len() as i64;
    if target_count == 0 && !config.swipe_all {
        if config.add_self_aln {
            return vec![Match::self_match(ctx.query_block_id, ctx.source_len)];
        }
        cull_matches(&mut trivial_matches, config);
        return trivial_matches;
    }

    let chunk_size = ranking_chunk_size(target_count, block.letters() as i64, config);
    if chunk_size < target_count || config.global_ranking_targets > 0 {
        list.target_scores.sort_by(TargetScore::cmp);
    }
    if config.global_ranking_targets > 0 {
        // first ranking pass: score stubs only, alignment happens in the second pass
        let hits =
            crate::global_ranking::ranking_list(&mut list, ctx.query[0], block, matrix, config);
        stat.target_hits1 += hits.len() as u64;
        return hits
            .into_iter()
            .map(|h| Match {
                target_block_id: h.oid,
                filter_score: h.score as i32,
                filter_evalue: f64::MAX,
                ungapped_score: h.score as i32,
                hsp: Vec::new(),
                matrix: None,
            })
            .collect();
    }

    let mut matches = extend_ranked(ctx, block, &list, chunk_size, matrix, config, output_values, stat);

    if !trivial_matches.is_empty() {
        matches.extend(trivial_matches);
    }
    if config.add_self_aln
        && !matches.iter().any(|m| m.target_block_id == ctx.query_block_id)
    {
        matches.push(Match::self_match(ctx.query_block_id, ctx.source_len));
    }
    cull_matches(&mut matches, config);
    matches
}

#[allow(clippy::too_many_arguments)]
fn extend_ranked(
    ctx: &QueryContext,
    block: &Block,
    list: &SeedHitList,
    chunk_size: i64,
    matrix: &ScoreMatrix,
    config: &ExtensionConfig,
    output_values: HspValues,
    stat: &mut Statistics,
) -> Vec<Match> {
    let total = list.target_scores.len();
    let mut i0 = 0usize;
    let mut i1 = (chunk_size as usize).min(total);

    // cheap E-value based chunk growth when no ranking constraints apply
    if config.toppercent == 100.0 && (i1 - i0) < config.max_target_seqs as usize {
        while i1 < total
            && matrix.evalue_ungapped(
                list.target_scores[i1].score as i32,
                ctx.query[0].len(),
                UNIFIED_TARGET_LEN,
            ) <= config.max_evalue
        {
            i1 = (i1 + 16).min(total);
        }
    }

    let first_round_culling = !config.have_filters() || config.toppercent != 100.0;
    let mut matches: Vec<Match> = Vec::new();
    let mut new_hits_ev = false;
    let mut tail_score = 0i32;
    let mut previous_tail_score;

    loop {
        let mut aligned_targets: Vec<Target> = Vec::new();
        while total > 0 && i0 < total {
            // assemble the chunk in rank order
            let mut chunk_hits: FlatArray<SeedHit> = FlatArray::new();
            let mut chunk_ids: Vec<u32> = Vec::with_capacity(i1 - i0);
            let mut chunk_scores: Vec<TargetScore> = Vec::with_capacity(i1 - i0);
            for ts in &list.target_scores[i0..i1] {
                chunk_ids.push(list.target_block_ids[ts.target as usize]);
                chunk_hits.push_group(list.seed_hits.group(ts.target as usize));
                chunk_scores.push(*ts);
            }
            let chunk_list = SeedHitList {
                seed_hits: chunk_hits,
                target_block_ids: chunk_ids,
                target_scores: chunk_scores,
            };

            let chunk_list = if config.gapped_filter {
                let bias: Vec<Option<&[i8]>> = (0..config.contexts).map(|f| ctx.bias_slice(f)).collect();
                gapped_filter(&ctx.query, &bias, &chunk_list, block, matrix, config, stat)
            } else {
                chunk_list
            };

            let mut work: Vec<WorkTarget> = Vec::with_capacity(chunk_list.target_block_ids.len());
            let mut hits_scratch: Vec<SeedHit> = Vec::new();
            for t in 0..chunk_list.target_block_ids.len() {
                hits_scratch.clear();
                hits_scratch.extend_from_slice(chunk_list.seed_hits.group(t));
                work.push(ungapped_stage(
                    &mut hits_scratch,
                    chunk_list.target_block_ids[t],
                    ctx,
                    block,
                    matrix,
                    config,
                ));
            }
            stat.target_hits2 += work.len() as u64;

            let aligned = align_chunk(work, ctx, block, matrix, config, stat);
            stat.target_hits4 += aligned.len() as u64;
            let mut new_hits = !aligned.is_empty();
            new_hits_ev = new_hits_ev || new_hits;
            if (i1 - i0) < total {
                new_hits = append_targets(&mut aligned_targets, aligned, first_round_culling, config);
            } else {
                aligned_targets = aligned;
            }

            i0 = i1;
            i1 = (i1 + (chunk_size.min(MAX_CHUNK_SIZE) as usize)).min(total);
            previous_tail_score = tail_score;
            if new_hits && i1 > 0 {
                tail_score = list.target_scores[i1 - 1].score as i32;
            }
            if i0 >= total
                || ranking_terminate(
                    new_hits,
                    previous_tail_score,
                    list.target_scores[i1.saturating_sub(1)].score as i32,
                    i1 as i64,
                    aligned_targets.len() as i64,
                    matrix,
                    config,
                )
            {
                break;
            }
        }

        if config.swipe_all {
            aligned_targets = full_db_align(ctx, block, matrix, config, stat);
        }

        cull_targets(&mut aligned_targets, !first_round_culling, config);
        stat.target_hits5 += aligned_targets.len() as u64;

        let hsp_values = output_values | filter_hsp_values(config);
        let mut round_matches =
            traceback_round(aligned_targets, ctx, block, matrix, config, hsp_values, stat);
        apply_filters(
            &mut round_matches,
            ctx.source_len,
            ctx.self_aln_score,
            |id| block.seqs().seq_len(id as usize) as i32,
            config,
        );
        matches.append(&mut round_matches);

        let goon = config.toppercent == 100.0
            && (matches.len() as i64) < config.max_target_seqs
            && i0 < total
            && new_hits_ev
            && (!config.mapany || matches.is_empty());
        if !goon {
            break;
        }
        i1 = (i0 + chunk_size as usize).min(total);
    }

    if config.max_hsps != 1 {
        let hsp_values = output_values | filter_hsp_values(config);
        recompute_alt_hsps(&mut matches, ctx, block, matrix, config, hsp_values, stat);
    }
    cull_matches(&mut matches, config);
    matches
}

/// Aligns the query against every sequence of the block with the full matrix; the
/// `swipe_all` mode.
fn full_db_align(
    ctx: &QueryContext,
    block: &Block,
    matrix: &ScoreMatrix,
    config: &ExtensionConfig,
    stat: &mut Statistics,
) -> Vec<Target> {
    let contexts = config.contexts;
    let mut out: Vec<Target> = (0..block.len())
        .map(|id| Target::new(id as u32, 0, None, contexts))
        .collect();
    for frame in 0..contexts {
        let qlen = ctx.query[frame].len() as i32;
        let mut dp = new_targets();
        for id in 0..block.len() {
            let seq = block.seqs().seq(id);
            let cells = qlen as i64 * seq.len() as i64;
            let b = bin(HspValues::NONE, qlen, 0, 0, cells, 0, 0, config.max_swipe_dp);
            dp[b].push(DpTarget::full(seq, id as u32, qlen, None));
        }
        let params = SwipeParams {
            query: ctx.query[frame],
            frame: frame as u8,
            query_source_len: ctx.source_len,
            composition_bias: ctx.bias_slice(frame),
            v: HspValues::NONE,
            matrix,
            band_bin: config.band_bin,
            col_bin: config.col_bin,
        };
        for hsp in swipe(&dp, &params, stat) {
            out[hsp.swipe_target as usize].add_hit(hsp);
        }
    }
    out.retain(|t| t.has_hits());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use seqsieve_score::SubstitutionMatrixList;
    use seqsieve_seq::alphabet::encode_seq;

    fn setup(block_seqs: &[&str]) -> (Block, ScoreMatrix) {
        let mut block = Block::new();
        for (i, s) in block_seqs.iter().enumerate() {
            block.push(&format!("t{}", i), &encode_seq(s), i as i64);
        }
        block.finish();
        let matrix = ScoreMatrix::load(SubstitutionMatrixList::BLOSUM62);
        (block, matrix)
    }

    fn seed_list(hits: &[(u32, i32, i32, u16)]) -> SeedHitList {
        // (target_block_id, i, j, score) — one group per distinct target, in order
        let mut list = SeedHitList::new();
        let mut last = u32::MAX;
        for &(t, i, j, score) in hits {
            if t != last {
                list.seed_hits.next();
                list.target_block_ids.push(t);
                list.target_scores.push(TargetScore {
                    target: list.target_block_ids.len() as u32 - 1,
                    score,
                });
                last = t;
            }
            list.seed_hits.push(SeedHit {
                i,
                j,
                score: score as i32,
                frame: 0,
            });
        }
        list
    }

    #[test]
    fn identity_query_produces_full_match() {
        let q = encode_seq("MKTFFVLLLCTFTVFS");
        let (block, matrix) = setup(&["MKTFFVLLLCTFTVFS"]);
        let config = ExtensionConfig {
            max_evalue: 1e-3,
            ..ExtensionConfig::default()
        };
        let ctx = QueryContext::new(0, vec![&q], &matrix, &config);
        let list = seed_list(&[(0, 0, 0, 30)]);
        let mut stat = Statistics::default();
        let matches = extend(&ctx, &block, list, &matrix, &config, HspValues::TRANSCRIPT, &mut stat);
        assert_eq!(matches.len(), 1);
        let m = &matches[0];
        assert_eq!(m.hsp.len(), 1);
        let h = &m.hsp[0];
        assert_eq!(h.query_range.begin, 0);
        assert_eq!(h.query_range.end, 16);
        assert_eq!(h.subject_range, h.query_range);
        assert_eq!(h.identities, 16);
        assert!(h.evalue <= 1e-7);
        assert_eq!(m.filter_score, h.score);
        assert_eq!(m.filter_evalue, h.evalue);
    }

    #[test]
    fn empty_seed_input_gives_empty_matches() {
        let q = encode_seq("MKTFFVLLLCTFTVFS");
        let (block, matrix) = setup(&["MKTFFVLLLCTFTVFS"]);
        let config = ExtensionConfig::default();
        let ctx = QueryContext::new(0, vec![&q], &matrix, &config);
        let mut stat = Statistics::default();
        let matches = extend(
            &ctx,
            &block,
            SeedHitList::new(),
            &matrix,
            &config,
            HspValues::NONE,
            &mut stat,
        );
        assert!(matches.is_empty());
    }

    #[test]
    fn two_disjoint_hsps_on_one_target() {
        // target carries the query twice with a long low-complexity spacer
        let q = "MKTFFVLLLCTFTVFSAYSRGVFRRDTHKSEIAHRFKDLGE";
        let spacer = "PGSTNNAPDQSWEKHMYRCVLIPGSTNNAPDQSWEKHMYRCVLIPGSTNN";
        let target = format!("{}{}{}", q, spacer, q);
        let qe = encode_seq(q);
        let (block, matrix) = setup(&[&target]);
        let config = ExtensionConfig {
            max_hsps: 2,
            max_evalue: 1e-3,
            ..ExtensionConfig::default()
        };
        let ctx = QueryContext::new(0, vec![&qe], &matrix, &config);
        let second_start = (q.len() + spacer.len()) as i32;
        let list = seed_list(&[(0, 0, 0, 30), (0, 0, second_start, 30)]);
        let mut stat = Statistics::default();
        let matches = extend(&ctx, &block, list, &matrix, &config, HspValues::TRANSCRIPT, &mut stat);
        assert_eq!(matches.len(), 1);
        let m = &matches[0];
        assert_eq!(m.hsp.len(), 2, "expected two HSPs, got {}", m.hsp.len());
        let a = &m.hsp[0];
        let b = &m.hsp[1];
        assert!(a.subject_range.intersect(&b.subject_range).is_empty());
        assert_eq!(a.identities, qe.len() as i32);
        assert_eq!(b.identities, qe.len() as i32);
    }

    #[test]
    fn self_aln_injected_when_configured() {
        let q = encode_seq("MKTFFVLLLCTFTVFS");
        let (block, matrix) = setup(&["MKTFFVLLLCTFTVFS"]);
        let config = ExtensionConfig {
            add_self_aln: true,
            ..ExtensionConfig::default()
        };
        let ctx = QueryContext::new(0, vec![&q], &matrix, &config);
        let mut stat = Statistics::default();
        let matches = extend(
            &ctx,
            &block,
            SeedHitList::new(),
            &matrix,
            &config,
            HspValues::NONE,
            &mut stat,
        );
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].filter_evalue, 0.0);
    }
}
