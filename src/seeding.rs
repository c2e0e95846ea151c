//! Seed indexing front-end.
//!
//! The alignment core consumes a stream of raw seed hits; this module produces it.
//! Target sequences are indexed by their reduced-alphabet k-mers (all k-mers, not a
//! sketch — search wants full sensitivity at this stage); each query k-mer then
//! yields one raw hit per indexed position, scored by a short ungapped window around
//! the match. Window scores are clamped to a byte; the overflow marker tells the
//! ranking stage to recompute exactly.

use std::collections::HashMap;

use seqsieve_align::load_hits::RawHit;
use seqsieve_align::ungapped::ungapped_window;
use seqsieve_align::TargetScore;
use seqsieve_score::ScoreMatrix;
use seqsieve_seq::alphabet::Letter;
use seqsieve_seq::{Block, Reduction};

/// Scoring window around a seed match.
const SEED_WINDOW: i32 = 24;

/// K-mer index over the target block's concatenated arena offsets.
pub struct SeedIndex {
    k: usize,
    /// packed reduced k-mer -> global arena offsets of its occurrences
    index: HashMap<u64, Vec<u64>>,
}

impl SeedIndex {
    pub fn build(block: &Block, k: usize) -> SeedIndex {
        let reduction = Reduction::default_reduction();
        let mut index: HashMap<u64, Vec<u64>> = HashMap::new();
        for t in 0..block.len() {
            let seq = block.seqs().seq(t);
            let base = block.seqs().offset(t);
            for seed in packed_kmers(seq, reduction, k) {
                index.entry(seed.0).or_default().push(base + seed.1 as u64);
            }
        }
        SeedIndex { k, index }
    }

    /// Enumerates the raw hits of one query against the index.
    pub fn hits(
        &self,
        query_id: u32,
        query: &[Letter],
        block: &Block,
        matrix: &ScoreMatrix,
    ) -> Vec<RawHit> {
        let reduction = Reduction::default_reduction();
        let mut hits = Vec::new();
        for (seed, qpos) in packed_kmers(query, reduction, self.k) {
            if let Some(positions) = self.index.get(&seed) {
                for &subject_offset in positions {
                    let (t, j) = block.seqs().local_position(subject_offset);
                    let target = block.seqs().seq(t);
                    let q0 = (qpos - SEED_WINDOW / 2).max(0);
                    let score = ungapped_window(
                        query,
                        target,
                        q0,
                        j as i32 - (qpos - q0),
                        SEED_WINDOW,
                        matrix,
                    );
                    // 8-bit storage; the overflow marker requests an exact recompute
                    let score = if score >= TargetScore::OVERFLOW as i32 {
                        TargetScore::OVERFLOW
                    } else {
                        score as u16
                    };
                    hits.push(RawHit {
                        query: query_id,
                        subject_offset,
                        seed_offset: qpos,
                        score,
                    });
                }
            }
        }
        hits
    }
}

fn packed_kmers(seq: &[Letter], reduction: &Reduction, k: usize) -> Vec<(u64, i32)> {
    let bits = reduction.bit_width();
    let mask = if (bits as u64 * k as u64) >= 64 {
        u64::MAX
    } else {
        (1u64 << (bits as u64 * k as u64)) - 1
    };
    let mut out = Vec::new();
    if seq.len() < k {
        return out;
    }
    let mut packed = 0u64;
    let mut valid = 0usize;
    for (i, &l) in seq.iter().enumerate() {
        match reduction.reduce(l) {
            Some(c) => {
                packed = ((packed << bits) | c as u64) & mask;
                valid += 1;
            }
            None => valid = 0,
        }
        if valid >= k {
            out.push((packed, (i + 1 - k) as i32));
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
    fn identity_pair_produces_diagonal_hits() {
        let s = encode_seq("MKTFFVLLLCTFTVFSAYSRGVFRRD");
        let mut block = Block::new();
        block.push("t", &s, 0);
        block.finish();
        let matrix = ScoreMatrix::load(SubstitutionMatrixList::BLOSUM62);
        let index = SeedIndex::build(&block, 6);
        let hits = index.hits(0, &s, &block, &matrix);
        assert!(!hits.is_empty());
        for h in &hits {
            let (t, j) = block.seqs().local_position(h.subject_offset);
            assert_eq!(t, 0);
            // identity pair: hits sit on the main diagonal
            assert_eq!(h.seed_offset, j as i32);
            assert!(h.score > 0);
        }
    }

    #[test]
    fn unrelated_sequences_share_no_seeds() {
        let a = encode_seq("MKTFFVLLLCTFTVFSAYSRGVFRRD");
        let b = encode_seq("GDHHHNNNQQQEEEDDDKKKRRRSSS");
        let mut block = Block::new();
        block.push("t", &b, 0);
        block.finish();
        let matrix = ScoreMatrix::load(SubstitutionMatrixList::BLOSUM62);
        let index = SeedIndex::build(&block, 6);
        assert!(index.hits(0, &a, &block, &matrix).is_empty());
    }
}
