use std::cmp::Ordering;
use std::sync::Arc;

use seqsieve_score::TargetMatrix;
use seqsieve_seq::FlatArray;

use crate::diag::ApproxHsp;
use crate::hsp::Hsp;
use crate::interval::Interval;

/// One decoded seed hit: query/target positions of a short word match.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SeedHit {
    pub i: i32,
    pub j: i32,
    pub score: i32,
    pub frame: u8,
}

impl SeedHit {
    pub fn diag(&self) -> i32 {
        self.i - self.j
    }

    /// Ordering by (diagonal, target position); the ungapped stage expects it.
    pub fn cmp(a: &SeedHit, b: &SeedHit) -> Ordering {
        a.diag().cmp(&b.diag()).then(a.j.cmp(&b.j))
    }
}

/// Pre-extension ranking entry: the maximum ungapped seed score of one target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TargetScore {
    pub target: u32,
    pub score: u16,
}

impl TargetScore {
    /// Marker: the 8-bit seed score overflowed and needs a windowed recompute.
    pub const OVERFLOW: u16 = u8::MAX as u16;

    /// Ordering by score descending, target ascending.
    pub fn cmp(a: &TargetScore, b: &TargetScore) -> Ordering {
        b.score.cmp(&a.score).then(a.target.cmp(&b.target))
    }
}

/// Seed hits of one query grouped by target, with the ranking scores.
pub struct SeedHitList {
    pub seed_hits: FlatArray<SeedHit>,
    pub target_block_ids: Vec<u32>,
    pub target_scores: Vec<TargetScore>,
}

impl SeedHitList {
    pub fn new() -> SeedHitList {
        SeedHitList {
            seed_hits: FlatArray::new(),
            target_block_ids: Vec::new(),
            target_scores: Vec::new(),
        }
    }
}

impl Default for SeedHitList {
    fn default() -> Self {
        SeedHitList::new()
    }
}

/// A target between the ungapped and gapped stages: chained approximate HSPs per
/// frame, plus the composition-adjusted matrix when one applies.
pub struct WorkTarget {
    pub block_id: u32,
    pub ungapped_score: Vec<i32>,
    /// one ApproxHsp list per query context
    pub hsp: Vec<Vec<ApproxHsp>>,
    pub matrix: Option<Arc<TargetMatrix>>,
    /// set when a fast path fully resolved the target
    pub done: bool,
    pub done_hsp: Option<Hsp>,
}

impl WorkTarget {
    pub fn new(block_id: u32, contexts: usize) -> WorkTarget {
        WorkTarget {
            block_id,
            ungapped_score: vec![0; contexts],
            hsp: vec![Vec::new(); contexts],
            matrix: None,
            done: false,
            done_hsp: None,
        }
    }
}

/// A target with fully scored HSPs, grouped by frame.
pub struct Target {
    pub block_id: u32,
    pub filter_score: i32,
    pub filter_evalue: f64,
    pub best_frame: u8,
    pub ungapped_score: i32,
    /// one Hsp list per query context
    pub hsp: Vec<Vec<Hsp>>,
    pub matrix: Option<Arc<TargetMatrix>>,
    pub done: bool,
}

impl Target {
    pub fn new(
        block_id: u32,
        ungapped_score: i32,
        matrix: Option<Arc<TargetMatrix>>,
        contexts: usize,
    ) -> Target {
        Target {
            block_id,
            filter_score: 0,
            filter_evalue: f64::MAX,
            best_frame: 0,
            ungapped_score,
            hsp: vec![Vec::new(); contexts],
            matrix,
            done: false,
        }
    }

    /// Adds a scored HSP, maintaining the filter-score/filter-evalue invariants.
    pub fn add_hit(&mut self, hsp: Hsp) {
        if hsp.evalue < self.filter_evalue
            || (hsp.evalue == self.filter_evalue && hsp.score > self.filter_score)
        {
            self.filter_evalue = hsp.evalue;
            self.filter_score = hsp.score;
            self.best_frame = hsp.frame;
        }
        let frame = hsp.frame as usize;
        self.hsp[frame].push(hsp);
    }

    pub fn has_hits(&self) -> bool {
        self.filter_evalue != f64::MAX
    }

    /// Ordering by filter E-value, then filter score, then block id.
    pub fn cmp_evalue(a: &Target, b: &Target) -> Ordering {
        a.filter_evalue
            .partial_cmp(&b.filter_evalue)
            .unwrap_or(Ordering::Equal)
            .then_with(|| Target::cmp_score(a, b))
    }

    pub fn cmp_score(a: &Target, b: &Target) -> Ordering {
        b.filter_score
            .cmp(&a.filter_score)
            .then(a.block_id.cmp(&b.block_id))
    }

    /// Removes HSPs enveloped by better ones on the same frame.
    ///
    /// After this pass, no two surviving HSPs of a frame overlap more than half of the
    /// shorter range on both the query and the subject axis.
    pub fn inner_culling(&mut self) {
        for frame_hsps in self.hsp.iter_mut() {
            frame_hsps.sort_by(Hsp::cmp);
            let mut kept: Vec<Hsp> = Vec::with_capacity(frame_hsps.len());
            for hsp in frame_hsps.drain(..) {
                if !kept.iter().any(|better| better.envelops(&hsp, 0.5)) {
                    kept.push(hsp);
                }
            }
            *frame_hsps = kept;
        }
        self.refresh_filter();
    }

    /// Keeps at most `max_hsps` best HSPs over all frames.
    pub fn max_hsp_culling(&mut self, max_hsps: usize) {
        if max_hsps == 0 {
            return;
        }
        let mut all: Vec<Hsp> = self.hsp.iter_mut().flat_map(|v| v.drain(..)).collect();
        all.sort_by(Hsp::cmp);
        all.truncate(max_hsps);
        for hsp in all {
            self.hsp[hsp.frame as usize].push(hsp);
        }
        self.refresh_filter();
    }

    fn refresh_filter(&mut self) {
        self.filter_score = 0;
        self.filter_evalue = f64::MAX;
        for frame_hsps in &self.hsp {
            for hsp in frame_hsps {
                if hsp.evalue < self.filter_evalue
                    || (hsp.evalue == self.filter_evalue && hsp.score > self.filter_score)
                {
                    self.filter_evalue = hsp.evalue;
                    self.filter_score = hsp.score;
                    self.best_frame = hsp.frame;
                }
            }
        }
    }
}

/// The post-traceback output of the pipeline for one (query, target) pair.
pub struct Match {
    pub target_block_id: u32,
    pub filter_score: i32,
    pub filter_evalue: f64,
    pub ungapped_score: i32,
    pub hsp: Vec<Hsp>,
    pub matrix: Option<Arc<TargetMatrix>>,
}

impl Match {
    /// General path: drains every frame of a [`Target`] into one sorted HSP list.
    pub fn from_target(mut target: Target) -> Match {
        let mut hsp: Vec<Hsp> = target.hsp.iter_mut().flat_map(|v| v.drain(..)).collect();
        hsp.sort_by(Hsp::cmp);
        let (filter_score, filter_evalue) = hsp
            .first()
            .map(|h| (h.score, h.evalue))
            .unwrap_or((0, f64::MAX));
        Match {
            target_block_id: target.block_id,
            filter_score,
            filter_evalue,
            ungapped_score: target.ungapped_score,
            hsp,
            matrix: target.matrix,
        }
    }

    /// Fast path used when at most one HSP per target is configured: keeps only the
    /// best HSP and skips the per-frame bookkeeping.
    pub fn from_single_hsp(mut target: Target) -> Match {
        let mut hsp: Vec<Hsp> = target.hsp.iter_mut().flat_map(|v| v.drain(..)).collect();
        assert!(
            !hsp.is_empty(),
            "from_single_hsp called on a target without hits"
        );
        hsp.sort_by(Hsp::cmp);
        hsp.truncate(1);
        let filter_score = hsp[0].score;
        let filter_evalue = hsp[0].evalue;
        Match {
            target_block_id: target.block_id,
            filter_score,
            filter_evalue,
            ungapped_score: target.ungapped_score,
            hsp,
            matrix: target.matrix,
        }
    }

    /// Synthetic maximal self-match injected when a query is searched against a
    /// database containing itself.
    pub fn self_match(query_block_id: u32, query_len: i32) -> Match {
        let mut hsp = Hsp::default();
        hsp.evalue = 0.0;
        hsp.score = i32::MAX;
        hsp.bit_score = f64::MAX;
        hsp.query_range = Interval::new(0, query_len);
        hsp.query_source_range = hsp.query_range;
        hsp.subject_range = Interval::new(0, query_len);
        hsp.identities = query_len;
        hsp.length = query_len;
        Match {
            target_block_id: query_block_id,
            filter_score: i32::MAX,
            filter_evalue: 0.0,
            ungapped_score: 0,
            hsp: vec![hsp],
            matrix: None,
        }
    }

    /// Ordering by filter E-value, then filter score, then target block id.
    pub fn cmp(a: &Match, b: &Match) -> Ordering {
        a.filter_evalue
            .partial_cmp(&b.filter_evalue)
            .unwrap_or(Ordering::Equal)
            .then(b.filter_score.cmp(&a.filter_score))
            .then(a.target_block_id.cmp(&b.target_block_id))
    }

    pub fn inner_culling(&mut self) {
        self.hsp.sort_by(Hsp::cmp);
        let mut kept: Vec<Hsp> = Vec::with_capacity(self.hsp.len());
        for hsp in self.hsp.drain(..) {
            let enveloped = kept
                .iter()
                .any(|better| better.frame == hsp.frame && better.envelops(&hsp, 0.5));
            if !enveloped {
                kept.push(hsp);
            }
        }
        self.hsp = kept;
        if let Some(first) = self.hsp.first() {
            self.filter_score = first.score;
            self.filter_evalue = first.evalue;
        }
    }
}
