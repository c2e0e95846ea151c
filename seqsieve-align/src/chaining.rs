//! Colinear combination of ungapped segments into approximate HSPs.

use crate::diag::{ApproxHsp, DiagonalSegment};
use crate::interval::Interval;

/// Outcome of the near-equal-length fast path.
pub enum HammingExt {
    /// a confident full-coverage hit; skip the gapped stage
    Accept(ApproxHsp),
    /// confidently unrelated; drop the target
    Reject,
    /// no decision; continue with regular chaining
    Undecided,
}

/// Combines diagonal segments (sorted by diagonal) into runs whose band-projected
/// intervals overlap by at least `min_band_overlap` of either interval.
///
/// Every emitted [`ApproxHsp`] carries the extreme diagonals of its run, the best
/// segment score and the best individual segment as the anchor.
pub fn chain(
    segments: &[DiagonalSegment],
    qlen: i32,
    tlen: i32,
    band: i32,
    min_band_overlap: f64,
    frame: u8,
) -> Vec<ApproxHsp> {
    let mut out = Vec::new();
    if segments.is_empty() {
        return out;
    }
    let mut run: Option<RunState> = None;
    for seg in segments {
        let b0 = (seg.diag() - band).max(-(tlen - 1));
        let b1 = (seg.diag() + 1 + band).min(qlen);
        match run.as_mut() {
            Some(state) => {
                let current = Interval::new(state.d_min, state.d_max);
                let next = Interval::new(b0, b1);
                let overlap = current.intersect(&next).length() as f64;
                let frac_current = overlap / current.length().max(1) as f64;
                let frac_next = overlap / next.length().max(1) as f64;
                if frac_current > min_band_overlap || frac_next > min_band_overlap {
                    state.add(seg, b0, b1);
                } else {
                    out.push(state.emit(frame));
                    run = Some(RunState::new(seg, b0, b1));
                }
            }
            None => run = Some(RunState::new(seg, b0, b1)),
        }
    }
    if let Some(state) = run {
        out.push(state.emit(frame));
    }
    out
}

struct RunState {
    d_min: i32,
    d_max: i32,
    score: i32,
    query_range: Interval,
    subject_range: Interval,
    max_diag: DiagonalSegment,
}

impl RunState {
    fn new(seg: &DiagonalSegment, b0: i32, b1: i32) -> RunState {
        RunState {
            d_min: b0,
            d_max: b1,
            score: seg.score,
            query_range: seg.query_range(),
            subject_range: seg.subject_range(),
            max_diag: *seg,
        }
    }

    fn add(&mut self, seg: &DiagonalSegment, b0: i32, b1: i32) {
        self.d_min = self.d_min.min(b0);
        self.d_max = self.d_max.max(b1);
        self.score = self.score.max(seg.score);
        self.query_range = Interval::new(
            self.query_range.begin.min(seg.i),
            self.query_range.end.max(seg.query_end()),
        );
        self.subject_range = Interval::new(
            self.subject_range.begin.min(seg.j),
            self.subject_range.end.max(seg.subject_end()),
        );
        if seg.score > self.max_diag.score {
            self.max_diag = *seg;
        }
    }

    fn emit(&self, frame: u8) -> ApproxHsp {
        ApproxHsp {
            d_min: self.d_min,
            d_max: self.d_max,
            score: self.score,
            query_range: self.query_range,
            subject_range: self.subject_range,
            max_diag: self.max_diag,
            frame,
        }
    }
}

/// Near-equal-length fast path: estimates a Hamming-like score along the dominant
/// diagonal and short-circuits chaining when the pair is either clearly one full-
/// coverage run or clearly unrelated.
pub fn hamming_ext(
    segments: &[DiagonalSegment],
    qlen: i32,
    tlen: i32,
    allow_accept: bool,
) -> HammingExt {
    const MAX_DIAG_SPREAD: i32 = 3;
    const MIN_COV: f64 = 0.9;
    if segments.is_empty() {
        return HammingExt::Undecided;
    }
    if (qlen - tlen).abs() > MAX_DIAG_SPREAD {
        return HammingExt::Undecided;
    }
    // dominant diagonal: the one holding the best segment; only runs on exactly this
    // diagonal count, so a pair needing a gap can never be accepted as gap-free
    let best = segments
        .iter()
        .max_by_key(|s| s.score)
        .expect("non-empty segments");
    let d = best.diag();
    let mut covered = 0i32;
    let mut score = 0i32;
    for s in segments {
        if s.diag() == d {
            covered += s.len;
            score += s.score;
        }
    }
    let cov = covered as f64 / qlen.min(tlen) as f64;
    if cov >= MIN_COV && allow_accept {
        return HammingExt::Accept(ApproxHsp {
            d_min: d - MAX_DIAG_SPREAD,
            d_max: d + MAX_DIAG_SPREAD,
            score,
            query_range: Interval::new(0, qlen),
            subject_range: Interval::new(0, tlen),
            max_diag: *best,
            frame: 0,
        });
    }
    if cov < 0.1 && segments.iter().map(|s| s.len).sum::<i32>() < qlen / 10 {
        return HammingExt::Reject;
    }
    HammingExt::Undecided
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(i: i32, j: i32, len: i32, score: i32) -> DiagonalSegment {
        DiagonalSegment::new(i, j, len, score)
    }

    #[test]
    fn nearby_diagonals_merge_into_one_run() {
        let mut segments = vec![seg(0, 0, 20, 40), seg(25, 23, 20, 35)];
        segments.sort_by(DiagonalSegment::cmp_diag);
        let runs = chain(&segments, 100, 100, 16, 0.5, 0);
        assert_eq!(runs.len(), 1);
        let r = &runs[0];
        assert_eq!(r.score, 40);
        assert_eq!(r.max_diag.score, 40);
        assert!(r.d_min <= 0 && r.d_max >= 2);
        assert_eq!(r.query_range, Interval::new(0, 45));
    }

    #[test]
    fn distant_diagonals_stay_separate() {
        let mut segments = vec![seg(0, 0, 10, 30), seg(0, 80, 10, 28)];
        segments.sort_by(DiagonalSegment::cmp_diag);
        let runs = chain(&segments, 200, 200, 8, 0.5, 0);
        assert_eq!(runs.len(), 2);
    }

    #[test]
    fn hamming_accepts_full_cover_equal_length() {
        let segments = vec![seg(0, 0, 95, 200)];
        match hamming_ext(&segments, 100, 100, true) {
            HammingExt::Accept(h) => {
                assert_eq!(h.query_range.length(), 100);
                assert!(h.score > 0);
            }
            _ => panic!("expected acceptance"),
        }
    }

    #[test]
    fn hamming_undecided_for_length_mismatch() {
        let segments = vec![seg(0, 0, 95, 200)];
        assert!(matches!(
            hamming_ext(&segments, 100, 200, true),
            HammingExt::Undecided
        ));
    }
}
