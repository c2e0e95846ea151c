//! K-mer prefilter and trivial-alignment shortcut.
//!
//! Targets whose length differs from the query by at most three residues first try
//! the gap-free trivial alignment; a hit resolves the pair without any DP. The
//! remaining targets must share enough query k-mers to stay in the pipeline.

use std::collections::HashSet;

use seqsieve_score::ScoreMatrix;
use seqsieve_seq::alphabet::{is_amino_acid, Letter};
use seqsieve_seq::{Block, FlatArray};

use crate::config::ExtensionConfig;
use crate::target::{Match, SeedHitList};

const MAX_LEN_DIFF_TRIVIAL_ALN: i32 = 3;

/// Fraction of one sequence's k-mers found in a reference k-mer set.
struct KmerCoverage {
    kmers: HashSet<u64>,
    k: usize,
}

impl KmerCoverage {
    fn new(seq: &[Letter], k: usize) -> KmerCoverage {
        let mut kmers = HashSet::new();
        for window in seq.windows(k) {
            if let Some(packed) = pack(window) {
                kmers.insert(packed);
            }
        }
        KmerCoverage { kmers, k }
    }

    /// Returns (fraction of `seq` covered, fraction of the reference covered).
    fn covered(&self, seq: &[Letter]) -> (f64, f64) {
        let mut total = 0usize;
        let mut hit = 0usize;
        let mut shared = HashSet::new();
        for window in seq.windows(self.k) {
            if let Some(packed) = pack(window) {
                total += 1;
                if self.kmers.contains(&packed) {
                    hit += 1;
                    shared.insert(packed);
                }
            }
        }
        if total == 0 || self.kmers.is_empty() {
            return (0.0, 0.0);
        }
        (
            hit as f64 / total as f64,
            shared.len() as f64 / self.kmers.len() as f64,
        )
    }
}

fn pack(window: &[Letter]) -> Option<u64> {
    let mut packed = 0u64;
    for &l in window {
        if !is_amino_acid(l) {
            return None;
        }
        packed = (packed << 5) | l as u64;
    }
    Some(packed)
}

/// Splits a seed-hit list into the surviving list plus the trivially resolved
/// matches.
pub fn kmer_filter(
    query: &[Letter],
    query_cbs: Option<&[i8]>,
    targets: &Block,
    list: &SeedHitList,
    matrix: &ScoreMatrix,
    config: &ExtensionConfig,
) -> (SeedHitList, Vec<Match>) {
    let filter = KmerCoverage::new(query, config.filter_kmer_len);
    let mut out = SeedHitList {
        seed_hits: FlatArray::new(),
        target_block_ids: Vec::new(),
        target_scores: Vec::new(),
    };
    let mut matches = Vec::new();
    for t in 0..list.target_block_ids.len() {
        let block_id = list.target_block_ids[t];
        let target = targets.seqs().seq(block_id as usize);

        if (query.len() as i32 - target.len() as i32).abs() <= MAX_LEN_DIFF_TRIVIAL_ALN {
            if let Some(hsp) = crate::ungapped::trivial(query, target, query_cbs, matrix, config.max_evalue) {
                matches.push(Match {
                    target_block_id: block_id,
                    filter_score: hsp.score,
                    filter_evalue: hsp.evalue,
                    ungapped_score: 0,
                    hsp: vec![hsp],
                    matrix: None,
                });
                continue;
            }
        }

        let (cov_target, cov_query) = filter.covered(target);
        if cov_target >= config.filter_kmer_cutoff || cov_query >= config.filter_kmer_cutoff {
            out.target_block_ids.push(block_id);
            out.seed_hits.push_group(list.seed_hits.group(t));
            out.target_scores.push(list.target_scores[t]);
        }
    }
    (out, matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{SeedHit, TargetScore};
    use seqsieve_score::SubstitutionMatrixList;
    use seqsieve_seq::alphabet::encode_seq;

    fn list_for(block: &Block) -> SeedHitList {
        let mut list = SeedHitList {
            seed_hits: FlatArray::new(),
            target_block_ids: Vec::new(),
            target_scores: Vec::new(),
        };
        for i in 0..block.len() {
            list.seed_hits.push_group(&[SeedHit {
                i: 0,
                j: 0,
                score: 20,
                frame: 0,
            }]);
            list.target_block_ids.push(i as u32);
            list.target_scores.push(TargetScore {
                target: i as u32,
                score: 20,
            });
        }
        list
    }

    #[test]
    fn near_identical_pair_is_resolved_trivially() {
        let q = encode_seq("MKTFFVLLLCTFTVFSMKTFFVLLLCTFTVFSMKTFFVLLLCTFTVFS");
        let mut block = Block::new();
        block.push("t0", &q, 0);
        block.push("t1", &encode_seq("GGGGGGGGGG"), 1);
        block.finish();
        let m = ScoreMatrix::load(SubstitutionMatrixList::BLOSUM62);
        let config = ExtensionConfig {
            filter_kmer_len: 6,
            max_evalue: 1e-3,
            ..ExtensionConfig::default()
        };
        let list = list_for(&block);
        let (filtered, matches) = kmer_filter(&q, None, &block, &list, &m, &config);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].target_block_id, 0);
        // the unrelated short target shares no 6-mers and is dropped
        assert!(filtered.target_block_ids.is_empty());
    }
}
