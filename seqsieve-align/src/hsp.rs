use std::cmp::Ordering;
use std::ops::{BitOr, BitOrAssign};

use seqsieve_seq::alphabet::Letter;

use crate::interval::Interval;

/// Which values of an HSP a pipeline stage has to produce.
///
/// Score-only stages run in cheaper DP bins; coordinates and transcripts force the
/// traceback bins.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HspValues(u32);

impl HspValues {
    pub const NONE: HspValues = HspValues(0);
    pub const QUERY_COORDS: HspValues = HspValues(1);
    pub const TARGET_COORDS: HspValues = HspValues(2);
    pub const COORDS: HspValues = HspValues(1 | 2);
    pub const IDENT: HspValues = HspValues(4);
    pub const LENGTH: HspValues = HspValues(8);
    pub const TRANSCRIPT: HspValues = HspValues(16 | 1 | 2 | 4 | 8);

    pub fn contains(&self, other: HspValues) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(&self, other: HspValues) -> bool {
        self.0 & other.0 != 0
    }

    /// True when coordinates (and hence a traceback pass) are required.
    pub fn needs_coords(&self) -> bool {
        self.intersects(HspValues(1 | 2 | 4 | 8 | 16))
    }

    pub fn needs_transcript(&self) -> bool {
        self.contains(HspValues(16))
    }
}

impl BitOr for HspValues {
    type Output = HspValues;
    fn bitor(self, rhs: HspValues) -> HspValues {
        HspValues(self.0 | rhs.0)
    }
}

impl BitOrAssign for HspValues {
    fn bitor_assign(&mut self, rhs: HspValues) {
        self.0 |= rhs.0;
    }
}

/// One operation of an edit transcript.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditOp {
    Match,
    Substitution(Letter),
    /// gap in the subject consuming `len` query residues
    Insertion(u32),
    /// gap in the query consuming one subject residue
    Deletion(Letter),
    FrameshiftFwd,
    FrameshiftRev,
}

/// A fully realised local alignment between a query and a target region.
#[derive(Clone, Debug, Default)]
pub struct Hsp {
    pub score: i32,
    pub bit_score: f64,
    pub evalue: f64,
    pub frame: u8,
    pub length: i32,
    pub identities: i32,
    pub mismatches: i32,
    pub positives: i32,
    pub gap_openings: i32,
    pub gaps: i32,
    pub query_range: Interval,
    pub query_source_range: Interval,
    pub subject_range: Interval,
    pub d_begin: i32,
    pub d_end: i32,
    pub transcript: Vec<EditOp>,
    /// index of the owning target inside its DP batch
    pub swipe_target: u32,
}

impl Hsp {
    /// Total order: E-value ascending, then score descending, then query begin.
    pub fn cmp(a: &Hsp, b: &Hsp) -> Ordering {
        a.evalue
            .partial_cmp(&b.evalue)
            .unwrap_or(Ordering::Equal)
            .then(b.score.cmp(&a.score))
            .then(a.query_range.begin.cmp(&b.query_range.begin))
    }

    pub fn query_cover_percent(&self, query_len: i32) -> f64 {
        if query_len == 0 {
            return 0.0;
        }
        self.query_source_range.length() as f64 * 100.0 / query_len as f64
    }

    pub fn subject_cover_percent(&self, subject_len: i32) -> f64 {
        if subject_len == 0 {
            return 0.0;
        }
        self.subject_range.length() as f64 * 100.0 / subject_len as f64
    }

    /// Identity over alignment length, as a percentage.
    pub fn id_percent(&self) -> f64 {
        if self.length == 0 {
            return 0.0;
        }
        self.identities as f64 * 100.0 / self.length as f64
    }

    /// Approximate identity derived from the score density when the exact identity
    /// count was not produced.
    pub fn approx_id_percent(&self, query_len: i32, subject_len: i32) -> f64 {
        if self.identities > 0 && self.length > 0 {
            return self.id_percent();
        }
        let span = self
            .query_range
            .length()
            .max(self.subject_range.length())
            .max(query_len.min(subject_len));
        if span == 0 {
            return 0.0;
        }
        // score per column of an identical BLOSUM62 alignment is ~5
        (self.score as f64 / span as f64 / 5.0 * 100.0).min(100.0)
    }

    /// Envelope test: do the two HSPs overlap at least `fraction` of the shorter on
    /// the query axis AND on the subject axis?
    pub fn envelops(&self, other: &Hsp, fraction: f64) -> bool {
        self.query_range.overlap_fraction(&other.query_range) >= fraction
            && self.subject_range.overlap_fraction(&other.subject_range) >= fraction
    }

    /// Recomputes length/identity/gap counts from the transcript.
    ///
    /// Consecutive deletions count as one gap opening; an `Insertion(n)` op is one
    /// opening of length `n` by construction.
    pub fn update_stats_from_transcript(&mut self) {
        let mut length = 0;
        let mut identities = 0;
        let mut mismatches = 0;
        let mut gaps = 0;
        let mut openings = 0;
        let mut in_deletion = false;
        for op in &self.transcript {
            match op {
                EditOp::Match => {
                    length += 1;
                    identities += 1;
                    in_deletion = false;
                }
                EditOp::Substitution(_) => {
                    length += 1;
                    mismatches += 1;
                    in_deletion = false;
                }
                EditOp::Insertion(n) => {
                    length += *n as i32;
                    gaps += *n as i32;
                    openings += 1;
                    in_deletion = false;
                }
                EditOp::Deletion(_) => {
                    length += 1;
                    gaps += 1;
                    if !in_deletion {
                        openings += 1;
                    }
                    in_deletion = true;
                }
                EditOp::FrameshiftFwd | EditOp::FrameshiftRev => {
                    in_deletion = false;
                }
            }
        }
        self.length = length;
        self.identities = identities;
        self.mismatches = mismatches;
        self.gaps = gaps;
        self.gap_openings = openings;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_prefers_lower_evalue_then_higher_score() {
        let mut a = Hsp::default();
        a.evalue = 1e-10;
        a.score = 50;
        let mut b = Hsp::default();
        b.evalue = 1e-5;
        b.score = 100;
        assert_eq!(Hsp::cmp(&a, &b), Ordering::Less);
        b.evalue = 1e-10;
        assert_eq!(Hsp::cmp(&a, &b), Ordering::Greater);
    }

    #[test]
    fn transcript_stats() {
        let mut h = Hsp::default();
        h.transcript = vec![
            EditOp::Match,
            EditOp::Match,
            EditOp::Substitution(3),
            EditOp::Deletion(4),
            EditOp::Deletion(5),
            EditOp::Match,
            EditOp::Insertion(2),
        ];
        h.update_stats_from_transcript();
        assert_eq!(h.length, 7);
        assert_eq!(h.identities, 3);
        assert_eq!(h.mismatches, 1);
        assert_eq!(h.gaps, 4);
        assert_eq!(h.gap_openings, 2);
    }

    #[test]
    fn envelope_requires_both_axes() {
        let mut a = Hsp::default();
        a.query_range = Interval::new(0, 100);
        a.subject_range = Interval::new(0, 100);
        let mut b = Hsp::default();
        b.query_range = Interval::new(10, 90);
        b.subject_range = Interval::new(200, 280);
        assert!(!a.envelops(&b, 0.5));
        b.subject_range = Interval::new(20, 80);
        assert!(a.envelops(&b, 0.5));
    }
}
