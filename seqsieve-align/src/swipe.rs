//! Banded and full-matrix Smith-Waterman kernels.
//!
//! Score-only bins run a lane-batched kernel: up to 16 (8-bit) or 8 (16-bit) targets
//! are interleaved into lane vectors and one column loop advances them together; an
//! unfilled lane is a blank target. A lane that saturates its element width is
//! escalated to the exact scalar kernel, so score overflow is never an error.
//! Traceback bins run a per-target banded matrix with full score storage and a
//! backtrace pass that emits the edit transcript.

use seqsieve_score::ScoreMatrix;
use seqsieve_seq::alphabet::{letter_at, Letter};

use crate::banded::{DpTarget, Targets};
use crate::hsp::{EditOp, Hsp, HspValues};
use crate::lanes::{V16, V8, LANES16, LANES8};
use crate::stats::Statistics;

/// Query-side parameters of one swipe batch.
pub struct SwipeParams<'a> {
    pub query: &'a [Letter],
    pub frame: u8,
    pub query_source_len: i32,
    pub composition_bias: Option<&'a [i8]>,
    pub v: HspValues,
    pub matrix: &'a ScoreMatrix,
    pub band_bin: i32,
    pub col_bin: i32,
}

impl<'a> SwipeParams<'a> {
    #[inline]
    fn cell_score(&self, t: &DpTarget, i: i32, j: i32) -> i32 {
        let q = letter_at(self.query, i as i64);
        let s = letter_at(t.seq, j as i64);
        let mut score = match t.matrix {
            Some(m) => m.score(q, s),
            None => self.matrix.score(q, s),
        };
        if let Some(cbs) = self.composition_bias {
            if i >= 0 && (i as usize) < cbs.len() {
                score += cbs[i as usize] as i32;
            }
        }
        score
    }
}

/// Runs every bin of a DP batch and returns the produced HSPs.
///
/// HSPs carry raw score, E-value and bit score; coordinates and transcripts are
/// present when the batch was run with coordinate values requested.
pub fn swipe(targets: &Targets, params: &SwipeParams, stat: &mut Statistics) -> Vec<Hsp> {
    let mut out = Vec::new();
    for (bin, bin_targets) in targets.iter().enumerate() {
        if bin_targets.is_empty() {
            continue;
        }
        stat.extensions_computed += bin_targets.len() as u64;
        let mut sorted: Vec<&DpTarget> = bin_targets.iter().collect();
        sorted.sort_by(|a, b| {
            DpTarget::cmp_packing(*a, *b, params.band_bin.max(1), params.col_bin.max(1))
        });
        match bin {
            0 => swipe_score_lanes::<V8>(&sorted, params, stat, &mut out),
            1 => swipe_score_lanes::<V16>(&sorted, params, stat, &mut out),
            2 => {
                for t in &sorted {
                    let score = score_only_scalar(t, params);
                    push_score_only(t, score, params, &mut out);
                }
            }
            _ => {
                for t in &sorted {
                    if let Some(hsp) = traceback_target(t, params) {
                        out.push(hsp);
                    }
                }
            }
        }
    }
    out
}

fn push_score_only(t: &DpTarget, score: i32, params: &SwipeParams, out: &mut Vec<Hsp>) {
    if score <= 0 {
        return;
    }
    let mut hsp = Hsp::default();
    hsp.score = score;
    hsp.evalue = params
        .matrix
        .evalue(score, params.query.len(), t.true_target_len as usize);
    hsp.bit_score = params.matrix.bitscore(score);
    hsp.frame = params.frame;
    hsp.d_begin = t.d_begin;
    hsp.d_end = t.d_end;
    hsp.swipe_target = t.target_idx;
    out.push(hsp);
}

// ---------- score-only lane kernels ----------

/// Lane arithmetic shared by the 8- and 16-bit score-only kernels.
trait LaneVec: Copy {
    const LANES: usize;
    fn zero() -> Self;
    fn splat(v: i32) -> Self;
    fn add_sat(self, o: Self) -> Self;
    fn sub_sat(self, o: Self) -> Self;
    fn max(self, o: Self) -> Self;
    fn from_scores(scores: &[i32]) -> Self;
    fn lane(&self, l: usize) -> i32;
    fn saturation() -> i32;
}

impl LaneVec for V8 {
    const LANES: usize = LANES8;
    fn zero() -> Self {
        V8::zero()
    }
    fn splat(v: i32) -> Self {
        V8::splat(v.clamp(i8::MIN as i32, i8::MAX as i32) as i8)
    }
    fn add_sat(self, o: Self) -> Self {
        V8::add_sat(self, o)
    }
    fn sub_sat(self, o: Self) -> Self {
        V8::sub_sat(self, o)
    }
    fn max(self, o: Self) -> Self {
        V8::max(self, o)
    }
    fn from_scores(scores: &[i32]) -> Self {
        let mut r = [0i8; LANES8];
        for (i, &s) in scores.iter().enumerate() {
            r[i] = s.clamp(i8::MIN as i32, i8::MAX as i32) as i8;
        }
        V8(r)
    }
    fn lane(&self, l: usize) -> i32 {
        self.0[l] as i32
    }
    fn saturation() -> i32 {
        i8::MAX as i32
    }
}

impl LaneVec for V16 {
    const LANES: usize = LANES16;
    fn zero() -> Self {
        V16::zero()
    }
    fn splat(v: i32) -> Self {
        V16::splat(v.clamp(i16::MIN as i32, i16::MAX as i32) as i16)
    }
    fn add_sat(self, o: Self) -> Self {
        V16::add_sat(self, o)
    }
    fn sub_sat(self, o: Self) -> Self {
        V16::sub_sat(self, o)
    }
    fn max(self, o: Self) -> Self {
        V16::max(self, o)
    }
    fn from_scores(scores: &[i32]) -> Self {
        let mut r = [0i16; LANES16];
        for (i, &s) in scores.iter().enumerate() {
            r[i] = s.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
        }
        V16(r)
    }
    fn lane(&self, l: usize) -> i32 {
        self.0[l] as i32
    }
    fn saturation() -> i32 {
        i16::MAX as i32
    }
}

/// Lane-batched banded swipe, score only.
///
/// Lanes hold independent targets; row `r` of column `j` is the cell
/// `(d_begin + j + r, j)` of each lane's own band. The diagonal predecessor of row
/// `r` is row `r` of the previous column, the horizontal predecessor is row `r + 1`;
/// positions outside a lane's sequences score as delimiters and can never turn a
/// lane positive.
fn swipe_score_lanes<V: LaneVec>(
    targets: &[&DpTarget],
    params: &SwipeParams,
    stat: &mut Statistics,
    out: &mut Vec<Hsp>,
) {
    let gap_open = params.matrix.gap_open() + params.matrix.gap_extend();
    let gap_extend = params.matrix.gap_extend();
    let v_gap_open = V::splat(gap_open);
    let v_gap_extend = V::splat(gap_extend);
    for chunk in targets.chunks(V::LANES) {
        let max_band = chunk.iter().map(|t| t.band()).max().unwrap_or(0);
        let max_cols = chunk.iter().map(|t| t.cols).max().unwrap_or(0);
        let mut best = V::zero();
        let mut prev_h = vec![V::zero(); max_band as usize];
        let mut prev_e = vec![V::zero(); max_band as usize + 1];
        let mut cur_h = vec![V::zero(); max_band as usize];
        let mut cur_e = vec![V::zero(); max_band as usize + 1];
        let mut scores = vec![0i32; V::LANES];
        for j in 0..max_cols {
            let mut vgap = V::zero();
            for r in 0..max_band {
                for s in scores.iter_mut() {
                    *s = 0;
                }
                for (l, t) in chunk.iter().enumerate() {
                    let i = t.d_begin + j + r;
                    scores[l] = params.cell_score(t, i, j);
                }
                let subst = V::from_scores(&scores);
                let diag = prev_h[r as usize];
                let hgap_in = prev_e[r as usize + 1];
                let h = diag
                    .add_sat(subst)
                    .max(hgap_in)
                    .max(vgap)
                    .max(V::zero());
                best = best.max(h);
                let open = h.sub_sat(v_gap_open);
                vgap = vgap.sub_sat(v_gap_extend).max(open);
                cur_e[r as usize] = hgap_in.sub_sat(v_gap_extend).max(open);
                cur_h[r as usize] = h;
            }
            std::mem::swap(&mut prev_h, &mut cur_h);
            std::mem::swap(&mut prev_e, &mut cur_e);
        }
        for (l, t) in chunk.iter().enumerate() {
            let lane_best = best.lane(l);
            if lane_best >= V::saturation() {
                // saturated lane: redo with the exact scalar kernel
                stat.swipe_escalations += 1;
                let score = score_only_scalar(t, params);
                push_score_only(t, score, params, out);
            } else {
                push_score_only(t, lane_best, params, out);
            }
        }
    }
}

/// Exact scalar banded Smith-Waterman, score only.
fn score_only_scalar(t: &DpTarget, params: &SwipeParams) -> i32 {
    let qlen = params.query.len() as i32;
    let tlen = t.seq.len() as i32;
    if qlen == 0 || tlen == 0 {
        return 0;
    }
    let (d_begin, d_end) = effective_band(t, qlen, tlen);
    let band = d_end - d_begin;
    if band <= 0 {
        return 0;
    }
    let gap_open = params.matrix.gap_open() + params.matrix.gap_extend();
    let gap_extend = params.matrix.gap_extend();
    let mut hrow = vec![0i32; qlen as usize];
    let mut hgap = vec![0i32; qlen as usize];
    let mut best = 0i32;
    for j in 0..tlen {
        let i0 = d_begin + j;
        let i1 = (i0 + band).min(qlen);
        let i_begin = i0.max(0);
        if i_begin >= i1 {
            continue;
        }
        let mut vgap = 0i32;
        let mut diag = if i0 > 0 { hrow[(i0 - 1) as usize] } else { 0 };
        for i in i_begin..i1 {
            let subst = params.cell_score(t, i, j);
            let e = hgap[i as usize];
            let h = (diag + subst).max(e).max(vgap).max(0);
            best = best.max(h);
            let open = h - gap_open;
            vgap = (vgap - gap_extend).max(open);
            hgap[i as usize] = (e - gap_extend).max(open);
            diag = hrow[i as usize];
            hrow[i as usize] = h;
        }
    }
    best
}

fn effective_band(t: &DpTarget, qlen: i32, tlen: i32) -> (i32, i32) {
    if t.full_matrix {
        (-(tlen - 1).max(0), qlen)
    } else {
        (t.d_begin.max(-(tlen - 1)), t.d_end.min(qlen))
    }
}

// ---------- traceback kernel ----------

struct BandedMatrix {
    data: Vec<i32>,
    band: i32,
    d_begin: i32,
    cols: i32,
}

impl BandedMatrix {
    fn new(band: i32, cols: i32, d_begin: i32) -> BandedMatrix {
        BandedMatrix {
            data: vec![0; band as usize * cols as usize],
            band,
            d_begin,
            cols,
        }
    }

    #[inline]
    fn in_band(&self, i: i32, j: i32) -> bool {
        if j < 0 || j >= self.cols {
            return false;
        }
        let r = i - (self.d_begin + j);
        i >= 0 && r >= 0 && r < self.band
    }

    #[inline]
    fn get(&self, i: i32, j: i32) -> i32 {
        if !self.in_band(i, j) {
            return 0;
        }
        let r = i - (self.d_begin + j);
        self.data[j as usize * self.band as usize + r as usize]
    }

    #[inline]
    fn set(&mut self, i: i32, j: i32, v: i32) {
        let r = i - (self.d_begin + j);
        self.data[j as usize * self.band as usize + r as usize] = v;
    }
}

/// Banded Smith-Waterman with full score storage and backtrace.
fn traceback_target(t: &DpTarget, params: &SwipeParams) -> Option<Hsp> {
    let qlen = params.query.len() as i32;
    let tlen = t.seq.len() as i32;
    if qlen == 0 || tlen == 0 {
        return None;
    }
    let (d_begin, d_end) = effective_band(t, qlen, tlen);
    let band = d_end - d_begin;
    if band <= 0 {
        return None;
    }
    let gap_open = params.matrix.gap_open() + params.matrix.gap_extend();
    let gap_extend = params.matrix.gap_extend();
    let mut mtx = BandedMatrix::new(band, tlen, d_begin);
    let mut hgap = vec![0i32; qlen as usize];
    let mut best = 0i32;
    let mut best_i = -1i32;
    let mut best_j = -1i32;
    for j in 0..tlen {
        let i0 = d_begin + j;
        let i1 = (i0 + band).min(qlen);
        let i_begin = i0.max(0);
        if i_begin >= i1 {
            continue;
        }
        let mut vgap = 0i32;
        let mut diag = if i0 > 0 { mtx.get(i0 - 1, j - 1) } else { 0 };
        for i in i_begin..i1 {
            let subst = params.cell_score(t, i, j);
            let e = hgap[i as usize];
            let h = (diag + subst).max(e).max(vgap).max(0);
            if h > best {
                best = h;
                best_i = i;
                best_j = j;
            }
            let open = h - gap_open;
            vgap = (vgap - gap_extend).max(open);
            hgap[i as usize] = (e - gap_extend).max(open);
            diag = mtx.get(i, j - 1);
            mtx.set(i, j, h);
        }
    }
    if best <= 0 {
        return None;
    }
    Some(backtrace(t, params, &mtx, best, best_i, best_j, gap_open, gap_extend))
}

#[allow(clippy::too_many_arguments)]
fn backtrace(
    t: &DpTarget,
    params: &SwipeParams,
    mtx: &BandedMatrix,
    score: i32,
    mut i: i32,
    mut j: i32,
    gap_open: i32,
    gap_extend: i32,
) -> Hsp {
    let mut hsp = Hsp::default();
    hsp.score = score;
    hsp.frame = params.frame;
    hsp.swipe_target = t.target_idx;
    hsp.d_begin = mtx.d_begin;
    hsp.d_end = mtx.d_begin + mtx.band;
    hsp.query_range.end = i + 1;
    hsp.subject_range.end = j + 1;
    let mut ops: Vec<EditOp> = Vec::new();

    while mtx.get(i, j) > 0 {
        let s = mtx.get(i, j);
        let subst = params.cell_score(t, i, j);
        let diag = if i > 0 && j > 0 { mtx.get(i - 1, j - 1) } else { 0 };
        if s == diag + subst && (mtx.in_band(i - 1, j - 1) || diag == 0) {
            let q = letter_at(params.query, i as i64);
            let tl = letter_at(t.seq, j as i64);
            if q == tl {
                ops.push(EditOp::Match);
            } else {
                ops.push(EditOp::Substitution(tl));
            }
            i -= 1;
            j -= 1;
            continue;
        }
        // gap run: scan back along the column (gap in subject) and row (gap in query)
        let mut found = false;
        let mut g = gap_open;
        for k in 1..=mtx.band.max(mtx.cols) {
            if mtx.in_band(i - k, j) && s == mtx.get(i - k, j) - g {
                ops.push(EditOp::Insertion(k as u32));
                i -= k;
                found = true;
                break;
            }
            if mtx.in_band(i, j - k) && s == mtx.get(i, j - k) - g {
                for n in 0..k {
                    ops.push(EditOp::Deletion(letter_at(t.seq, (j - n) as i64)));
                }
                j -= k;
                found = true;
                break;
            }
            g += gap_extend;
        }
        if !found {
            panic!("traceback error at i={} j={}", i, j);
        }
    }
    hsp.query_range.begin = i + 1;
    hsp.subject_range.begin = j + 1;
    hsp.query_source_range = hsp.query_range;
    ops.reverse();
    hsp.transcript = ops;
    hsp.update_stats_from_transcript();
    hsp.evalue = params
        .matrix
        .evalue(score, params.query.len(), t.true_target_len as usize);
    hsp.bit_score = params.matrix.bitscore(score);
    if !params.v.needs_transcript() {
        hsp.transcript.clear();
    }
    hsp
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::banded::new_targets;
    use crate::interval::Interval;
    use seqsieve_score::SubstitutionMatrixList;
    use seqsieve_seq::alphabet::encode_seq;

    fn matrix() -> ScoreMatrix {
        ScoreMatrix::load(SubstitutionMatrixList::BLOSUM62)
    }

    fn params<'a>(query: &'a [Letter], m: &'a ScoreMatrix, v: HspValues) -> SwipeParams<'a> {
        SwipeParams {
            query,
            frame: 0,
            query_source_len: query.len() as i32,
            composition_bias: None,
            v,
            matrix: m,
            band_bin: 24,
            col_bin: 400,
        }
    }

    #[test]
    fn identity_alignment_with_transcript() {
        let m = matrix();
        let q = encode_seq("MKTFFVLLLCTFTVFS");
        let t = q.clone();
        let mut targets = new_targets();
        targets[5].push(DpTarget::full(&t, 0, q.len() as i32, None));
        let p = params(&q, &m, HspValues::TRANSCRIPT);
        let mut stat = Statistics::default();
        let hsps = swipe(&targets, &p, &mut stat);
        assert_eq!(hsps.len(), 1);
        let h = &hsps[0];
        assert_eq!(h.query_range, Interval::new(0, 16));
        assert_eq!(h.subject_range, Interval::new(0, 16));
        assert_eq!(h.identities, 16);
        assert_eq!(h.transcript, vec![EditOp::Match; 16]);
        assert!(h.evalue <= 1e-7);
    }

    #[test]
    fn single_deletion_is_recovered() {
        let m = matrix();
        let q = encode_seq("MKTFFVLLCTFTVFS"); // 15 aa
        let t = encode_seq("MKTFFVLLLCTFTVFS"); // 16 aa
        let mut targets = new_targets();
        targets[5].push(DpTarget::full(&t, 0, q.len() as i32, None));
        let p = params(&q, &m, HspValues::TRANSCRIPT);
        let mut stat = Statistics::default();
        let hsps = swipe(&targets, &p, &mut stat);
        assert_eq!(hsps.len(), 1);
        let h = &hsps[0];
        let deletions = h
            .transcript
            .iter()
            .filter(|op| matches!(op, EditOp::Deletion(_)))
            .count();
        assert_eq!(deletions, 1);
        assert_eq!(h.length, 16);
        assert_eq!(h.identities, 15);
    }

    #[test]
    fn banded_matches_full_on_near_diagonal_pair() {
        let m = matrix();
        let q = encode_seq("MKTFFVLLLCTFTVFSAYSRGVFRRDTHKSEIAHRFKDLGE");
        let t = encode_seq("MKTFFVLLLCTFTVFSAASRGVFRRDTHKSEIAHRFKDLGE");
        let mut targets = new_targets();
        targets[5].push(DpTarget::full(&t, 0, q.len() as i32, None));
        targets[4].push(DpTarget::banded(
            &t,
            -8,
            8,
            Interval::default(),
            0,
            1,
            q.len() as i32,
            None,
            Default::default(),
        ));
        let p = params(&q, &m, HspValues::COORDS);
        let mut stat = Statistics::default();
        let hsps = swipe(&targets, &p, &mut stat);
        assert_eq!(hsps.len(), 2);
        assert_eq!(hsps[0].score, hsps[1].score);
    }

    #[test]
    fn score_only_lanes_agree_with_scalar() {
        let m = matrix();
        let q = encode_seq("MKTFFVLLLCTFTVFSAYSRGVFRRDTHKSEIAHRFKDLGE");
        let t1 = encode_seq("MKTFFVLLLCTFTVFSAASRGVFRRDTHKSEIAHRFKDLGE");
        let t2 = encode_seq("GGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGG");
        let t3 = encode_seq("AYSRGVFRRDTHKSEI");
        let seqs = [&t1, &t2, &t3];
        let mut targets = new_targets();
        for (idx, t) in seqs.iter().enumerate() {
            targets[0].push(DpTarget::full(t, idx as u32, q.len() as i32, None));
        }
        let p = params(&q, &m, HspValues::NONE);
        let mut stat = Statistics::default();
        let mut hsps = swipe(&targets, &p, &mut stat);
        hsps.sort_by_key(|h| h.swipe_target);
        let scalar: Vec<i32> = seqs
            .iter()
            .enumerate()
            .map(|(idx, t)| score_only_scalar(&DpTarget::full(t, idx as u32, q.len() as i32, None), &p))
            .collect();
        for h in &hsps {
            assert_eq!(h.score, scalar[h.swipe_target as usize]);
        }
        // the near-identical target saturates the byte lanes and must be escalated
        assert!(stat.swipe_escalations >= 1);
        assert!(hsps.iter().any(|h| h.swipe_target == 0));
        assert!(scalar[1] < scalar[0]);
    }

    #[test]
    fn composition_adjusted_matrix_changes_the_score() {
        let m = matrix();
        let q = encode_seq("KKKKKKKKKKKKKKKKKKKK");
        let t = q.clone();
        let comp = seqsieve_score::composition::composition(&q);
        let tm = seqsieve_score::TargetMatrix::new(&comp, &t, &m);
        let mut plain = new_targets();
        plain[2].push(DpTarget::full(&t, 0, q.len() as i32, None));
        let mut adjusted = new_targets();
        adjusted[2].push(DpTarget::full(&t, 0, q.len() as i32, Some(&tm)));
        let p = params(&q, &m, HspValues::NONE);
        let mut stat = Statistics::default();
        let plain_score = swipe(&plain, &p, &mut stat)[0].score;
        let adjusted_score = swipe(&adjusted, &p, &mut stat)[0].score;
        assert!(adjusted_score < plain_score);
    }
}
