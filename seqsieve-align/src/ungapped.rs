//! Ungapped X-drop extension kernels.

use seqsieve_score::ScoreMatrix;
use seqsieve_seq::alphabet::{letter_at, Letter, DELIMITER};

use crate::diag::DiagonalSegment;
use crate::hsp::{EditOp, Hsp};
use crate::interval::Interval;

/// Extends a seed at `(qa, sa)` in both directions, accumulating substitution scores
/// with an optional per-query-position bias, until the running score drops `xdrop`
/// below the running maximum or a delimiter is reached.
///
/// When `count_identities` is set the `ident` field of the result is exact; otherwise
/// it is zero.
pub fn xdrop_ungapped(
    query: &[Letter],
    query_cbs: Option<&[i8]>,
    subject: &[Letter],
    qa: i32,
    sa: i32,
    xdrop: i32,
    matrix: &ScoreMatrix,
    count_identities: bool,
) -> DiagonalSegment {
    let mut score = 0i32;
    let mut st = 0i32;
    let mut delta = 0i32;
    let mut len = 0i32;
    let mut ident = 0i32;
    let mut run_ident = 0i32;

    // left of the anchor
    let mut n = 1i32;
    loop {
        let q = qa - n;
        let s = sa - n;
        let ql = letter_at(query, q as i64);
        let sl = letter_at(subject, s as i64);
        if score - st >= xdrop || ql == DELIMITER || sl == DELIMITER {
            break;
        }
        st += matrix.score(ql, sl);
        if let Some(cbs) = query_cbs {
            st += cbs[q as usize] as i32;
        }
        if count_identities && ql == sl {
            run_ident += 1;
        }
        if st > score {
            score = st;
            delta = n;
            ident += run_ident;
            run_ident = 0;
        }
        n += 1;
    }

    // right from the anchor
    st = score;
    run_ident = 0;
    let mut m = 0i32;
    loop {
        let q = qa + m;
        let s = sa + m;
        let ql = letter_at(query, q as i64);
        let sl = letter_at(subject, s as i64);
        if score - st >= xdrop || ql == DELIMITER || sl == DELIMITER {
            break;
        }
        st += matrix.score(ql, sl);
        if let Some(cbs) = query_cbs {
            st += cbs[q as usize] as i32;
        }
        if count_identities && ql == sl {
            run_ident += 1;
        }
        if st > score {
            score = st;
            len = m + 1;
            ident += run_ident;
            run_ident = 0;
        }
        m += 1;
    }

    DiagonalSegment {
        i: qa - delta,
        j: sa - delta,
        len: len + delta,
        score,
        ident,
    }
}

/// Anchored variant: extends left of the anchor begin and right of the anchor end,
/// summing both extents with the anchor's own score range.
pub fn xdrop_ungapped_anchored(
    query: &[Letter],
    subject: &[Letter],
    anchor: &DiagonalSegment,
    xdrop: i32,
    matrix: &ScoreMatrix,
) -> DiagonalSegment {
    let left = xdrop_directional(query, subject, anchor.i - 1, anchor.j - 1, -1, xdrop, matrix);
    let right = xdrop_directional(
        query,
        subject,
        anchor.query_end(),
        anchor.subject_end(),
        1,
        xdrop,
        matrix,
    );
    let anchor_score = score_range(query, subject, anchor.i, anchor.j, anchor.subject_end(), matrix);
    DiagonalSegment {
        i: anchor.i - left.1,
        j: anchor.j - left.1,
        len: anchor.len + left.1 + right.1,
        score: left.0 + right.0 + anchor_score,
        ident: 0,
    }
}

fn xdrop_directional(
    query: &[Letter],
    subject: &[Letter],
    qa: i32,
    sa: i32,
    step: i32,
    xdrop: i32,
    matrix: &ScoreMatrix,
) -> (i32, i32) {
    let mut max_score = 0i32;
    let mut score = 0i32;
    let mut max_n = 0i32;
    let mut n = 0i32;
    loop {
        let q = qa + n * step;
        let s = sa + n * step;
        let ql = letter_at(query, q as i64);
        let sl = letter_at(subject, s as i64);
        if ql == DELIMITER || sl == DELIMITER || max_score - score >= xdrop {
            break;
        }
        score += matrix.score(ql, sl);
        n += 1;
        if score > max_score {
            max_score = score;
            max_n = n;
        }
    }
    (max_score, max_n)
}

/// Best local score inside a fixed window starting at `(q, s)`.
pub fn ungapped_window(query: &[Letter], subject: &[Letter], q: i32, s: i32, window: i32, matrix: &ScoreMatrix) -> i32 {
    let mut score = 0i32;
    let mut st = 0i32;
    for n in 0..window {
        let ql = letter_at(query, (q + n) as i64);
        let sl = letter_at(subject, (s + n) as i64);
        if ql == DELIMITER || sl == DELIMITER {
            break;
        }
        st += matrix.score(ql, sl);
        st = st.max(0);
        score = score.max(st);
    }
    score
}

/// Best local self-alignment score of a sequence; the reference point of the
/// approx-id filters.
pub fn self_score(seq: &[Letter], query_cbs: Option<&[i8]>, matrix: &ScoreMatrix) -> i32 {
    let mut s = 0i32;
    let mut sl = 0i32;
    for (i, &l) in seq.iter().enumerate() {
        sl += matrix.score(l, l);
        if let Some(cbs) = query_cbs {
            sl += cbs[i] as i32;
        }
        sl = sl.max(0);
        s = s.max(sl);
    }
    s
}

/// Raw score of the diagonal run `(i, j)..(i + (j_end - j), j_end)`.
pub fn score_range(query: &[Letter], subject: &[Letter], i: i32, j: i32, j_end: i32, matrix: &ScoreMatrix) -> i32 {
    let mut score = 0;
    let mut q = i;
    let mut s = j;
    while s < j_end {
        score += matrix.score(letter_at(query, q as i64), letter_at(subject, s as i64));
        q += 1;
        s += 1;
    }
    score
}

/// Score of every `window`-wide run of an equal-length pair, one value per end
/// position; used by anchor clipping.
pub fn window_scores(query: &[Letter], subject: &[Letter], window: usize, matrix: &ScoreMatrix) -> Vec<i32> {
    let len = query.len().min(subject.len());
    let mut scores = Vec::with_capacity(len);
    let mut sum = 0i32;
    for i in 0..len {
        sum += matrix.score(query[i], subject[i]);
        if i >= window {
            sum -= matrix.score(query[i - window], subject[i - window]);
        }
        scores.push(sum);
    }
    scores
}

/// Clips an anchor to its well-conserved core.
///
/// Window scores over the anchor run are thresholded at `anchor_score · window`; the
/// clipped anchor spans the contiguous above-threshold region around the best window,
/// shrunk to exact matches at both ends. Returns `None` when nothing survives.
pub fn make_clipped_anchor(
    anchor: &DiagonalSegment,
    query: &[Letter],
    query_cbs: Option<&[i8]>,
    subject: &[Letter],
    window: i32,
    anchor_score: f64,
    matrix: &ScoreMatrix,
) -> Option<DiagonalSegment> {
    let q = &query[anchor.i as usize..anchor.query_end() as usize];
    let t = &subject[anchor.j as usize..anchor.subject_end() as usize];
    let w = (window as usize).min(q.len().max(1));
    let scores = window_scores(q, t, w, matrix);
    if scores.is_empty() {
        return None;
    }
    let cutoff = (anchor_score * w as f64).round() as i32;
    let best = scores
        .iter()
        .enumerate()
        .max_by_key(|(_, &s)| s)
        .map(|(i, _)| i)
        .unwrap();
    let mut d1 = best;
    while d1 + 1 < scores.len() && scores[d1 + 1] >= cutoff {
        d1 += 1;
    }
    let mut d0 = best;
    while d0 > 0 && scores[d0 - 1] >= cutoff {
        d0 -= 1;
    }
    let mut d0 = d0.saturating_sub(w - 1);
    let mut d1 = d1 + 1;
    while d0 < q.len() && q[d0] != t[d0] {
        d0 += 1;
    }
    while d1 > 0 && q[d1 - 1] != t[d1 - 1] {
        d1 -= 1;
    }
    if d1 <= d0 {
        return None;
    }
    let i0 = anchor.i + d0 as i32;
    let j0 = anchor.j + d0 as i32;
    let mut score = score_range(query, subject, i0, j0, anchor.j + d1 as i32, matrix);
    if let Some(cbs) = query_cbs {
        for i in i0..anchor.i + d1 as i32 {
            score += cbs[i as usize] as i32;
        }
    }
    Some(DiagonalSegment {
        i: i0,
        j: j0,
        len: (d1 - d0) as i32,
        score,
        ident: 0,
    })
}

const TRIVIAL_WINDOW: i32 = 40;
const TRIVIAL_ID: i32 = 30;

fn trivial_at(
    query: &[Letter],
    target: &[Letter],
    dq: i32,
    dt: i32,
    query_cbs: Option<&[i8]>,
    matrix: &ScoreMatrix,
    max_evalue: f64,
) -> Option<Hsp> {
    let l = ((query.len() as i32) - dq).min(target.len() as i32 - dt);
    let bits = (1u64 << TRIVIAL_WINDOW) - 1;
    let mut n = 0i32;
    let mut score = 0i32;
    let mut mask = 0u64;
    let mut identities = 0i32;
    for i in 0..l {
        let ql = query[(i + dq) as usize];
        let tl = target[(i + dt) as usize];
        let eq = (ql == tl) as u64;
        identities += eq as i32;
        mask = ((mask << 1) | eq) & bits;
        n += 1;
        if n >= TRIVIAL_WINDOW && (mask.count_ones() as i32) < TRIVIAL_ID {
            return None;
        }
        score += matrix.score(ql, tl);
        if let Some(cbs) = query_cbs {
            score += cbs[(i + dq) as usize] as i32;
        }
    }
    let evalue = matrix.evalue(score, query.len(), target.len());
    if evalue > max_evalue {
        return None;
    }
    if l < TRIVIAL_WINDOW && (mask.count_ones() as f64) / (l as f64) < TRIVIAL_ID as f64 / TRIVIAL_WINDOW as f64 {
        return None;
    }
    let mut hsp = Hsp::default();
    hsp.score = score;
    hsp.query_range = Interval::new(dq, dq + l);
    hsp.query_source_range = hsp.query_range;
    hsp.subject_range = Interval::new(dt, dt + l);
    hsp.evalue = evalue;
    hsp.bit_score = matrix.bitscore(score);
    hsp.length = l;
    hsp.identities = identities;
    hsp.mismatches = l - identities;
    hsp.d_begin = dq - dt;
    hsp.d_end = dq - dt + 1;
    hsp.transcript = (0..l)
        .map(|i| {
            let ql = query[(i + dq) as usize];
            let tl = target[(i + dt) as usize];
            if ql == tl {
                EditOp::Match
            } else {
                EditOp::Substitution(tl)
            }
        })
        .collect();
    Some(hsp)
}

/// Gap-free alignment test for near-equal-length pairs.
///
/// Slides the shorter sequence over the longer and accepts the first offset whose
/// sliding 40-residue window never falls below 30 identities and whose score passes
/// the E-value cutoff.
pub fn trivial(
    query: &[Letter],
    target: &[Letter],
    query_cbs: Option<&[i8]>,
    matrix: &ScoreMatrix,
    max_evalue: f64,
) -> Option<Hsp> {
    if query.len() <= target.len() {
        for i in 0..=(target.len() - query.len()) as i32 {
            if let Some(hsp) = trivial_at(query, target, 0, i, query_cbs, matrix, max_evalue) {
                return Some(hsp);
            }
        }
    } else {
        for i in 0..=(query.len() - target.len()) as i32 {
            if let Some(hsp) = trivial_at(query, target, i, 0, query_cbs, matrix, max_evalue) {
                return Some(hsp);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use seqsieve_score::SubstitutionMatrixList;
    use seqsieve_seq::alphabet::encode_seq;

    fn matrix() -> ScoreMatrix {
        ScoreMatrix::load(SubstitutionMatrixList::BLOSUM62)
    }

    #[test]
    fn identity_extension_covers_both_sequences() {
        let m = matrix();
        let q = encode_seq("MKTFFVLLLCTFTVFS");
        let d = xdrop_ungapped(&q, None, &q, 8, 8, 20, &m, true);
        assert_eq!(d.i, 0);
        assert_eq!(d.j, 0);
        assert_eq!(d.len, 16);
        assert_eq!(d.ident, 16);
        let expected: i32 = q.iter().map(|&l| m.score(l, l)).sum();
        assert_eq!(d.score, expected);
    }

    #[test]
    fn extension_is_idempotent() {
        let m = matrix();
        let q = encode_seq("MKTFFVLLLCTFTVFSAYSRGVFRRD");
        let t = encode_seq("MKTFFVLLLCTFTVFSAASRGVFRRD");
        let d1 = xdrop_ungapped(&q, None, &t, 5, 5, 20, &m, false);
        let d2 = xdrop_ungapped(&q, None, &t, d1.i, d1.j, 20, &m, false);
        assert_eq!(d1, d2);
    }

    #[test]
    fn xdrop_stops_on_garbage() {
        let m = matrix();
        let q = encode_seq("MKTFFVLLWWWWWWWWPPPPPPPP");
        let t = encode_seq("MKTFFVLLAAAAAAAAGGGGGGGG");
        let d = xdrop_ungapped(&q, None, &t, 0, 0, 10, &m, false);
        assert!(d.len <= 10);
    }

    #[test]
    fn self_score_bounds_any_alignment() {
        let m = matrix();
        let q = encode_seq("MKTFFVLLLCTFTVFS");
        let s = self_score(&q, None, &m);
        let d = xdrop_ungapped(&q, None, &q, 0, 0, 20, &m, false);
        assert!(s >= d.score);
        assert_eq!(s, d.score); // identity matrix diagonal is the best possible
    }

    #[test]
    fn trivial_finds_identity_pair() {
        let m = matrix();
        let q = encode_seq("MKTFFVLLLCTFTVFSMKTFFVLLLCTFTVFSMKTFFVLLLCTFTVFS");
        let hsp = trivial(&q, &q, None, &m, 1e-3).expect("identity pair must pass");
        assert_eq!(hsp.identities, q.len() as i32);
        assert!(hsp.evalue < 1e-7);
    }

    #[test]
    fn trivial_rejects_unrelated_pair() {
        let m = matrix();
        let q = encode_seq("MKTFFVLLLCTFTVFSMKTFFVLLLCTFTVFSMKTFFVLLLCTFTVFS");
        let t = encode_seq("GGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGG");
        assert!(trivial(&q, &t, None, &m, 1e-3).is_none());
    }

    #[test]
    fn anchored_extension_matches_plain_extension_on_identity() {
        let m = matrix();
        let q = encode_seq("MKTFFVLLLCTFTVFS");
        let anchor = DiagonalSegment::new(6, 6, 4, 0);
        let d = xdrop_ungapped_anchored(&q, &q, &anchor, 100, &m);
        assert_eq!(d.i, 0);
        assert_eq!(d.len, 16);
    }

    #[test]
    fn clipped_anchor_skips_noisy_flanks() {
        let m = matrix();
        let q = encode_seq("GGGGMKTFFVLLLCTFTVFSGGGG");
        let t = encode_seq("AAAAMKTFFVLLLCTFTVFSAAAA");
        let anchor = DiagonalSegment::new(0, 0, 24, 0);
        let clipped = make_clipped_anchor(&anchor, &q, None, &t, 8, 1.0, &m).expect("core survives");
        assert!(clipped.i >= 4);
        assert!(clipped.query_end() <= 20);
        assert!(clipped.score > 0);
    }
}
