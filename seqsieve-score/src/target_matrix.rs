use seqsieve_seq::alphabet::{Letter, ALPHABET_SIZE, TRUE_AA};

use crate::composition::{composition, relative_entropy, BACKGROUND_FREQ};
use crate::matrix::ScoreMatrix;

/// Outcome of the matrix-adjust decision for one (query, target) pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatrixAdjustRule {
    /// Compositions are close to the background; keep the standard matrix.
    DontAdjust,
    /// Rescale the matrix for the pair's compositions.
    Scale,
}

/// Decides whether a pair needs a compositionally adjusted matrix.
///
/// Comparison of both compositions' divergence from the background; short sequences
/// never adjust because the frequencies are too noisy to trust.
pub fn adjust_rule(
    query_comp: &[f64; TRUE_AA],
    query_len_true_aa: i32,
    target_seq: &[Letter],
) -> MatrixAdjustRule {
    const MIN_LEN: i32 = 30;
    const MIN_DIVERGENCE: f64 = 0.05;
    if query_len_true_aa < MIN_LEN || (target_seq.len() as i32) < MIN_LEN {
        return MatrixAdjustRule::DontAdjust;
    }
    let target_comp = composition(target_seq);
    let d = relative_entropy(query_comp) + relative_entropy(&target_comp);
    if d >= MIN_DIVERGENCE {
        MatrixAdjustRule::Scale
    } else {
        MatrixAdjustRule::DontAdjust
    }
}

/// A compositionally adjusted substitution matrix for one (query, target) pair.
///
/// Every score is shifted by the expected-score deficit of the two compositions and
/// the result is stored at an integer width chosen so the DP lane element fits:
/// 8 bits when every entry is a sane byte, 16 otherwise.
pub struct TargetMatrix {
    scores: Vec<i16>,
    score_width: u32,
}

impl TargetMatrix {
    pub fn new(query_comp: &[f64; TRUE_AA], target_seq: &[Letter], matrix: &ScoreMatrix) -> TargetMatrix {
        let target_comp = composition(target_seq);
        // per-residue expected-score shifts relative to the background
        let mut query_shift = [0f64; TRUE_AA];
        let mut target_shift = [0f64; TRUE_AA];
        for r in 0..TRUE_AA {
            let mut expected_bg = 0.0;
            let mut expected_q = 0.0;
            let mut expected_t = 0.0;
            for o in 0..TRUE_AA {
                let s = matrix.score(r as Letter, o as Letter) as f64;
                expected_bg += BACKGROUND_FREQ[o] * s;
                expected_q += query_comp[o] * s;
                expected_t += target_comp[o] * s;
            }
            query_shift[r] = expected_bg - expected_q;
            target_shift[r] = expected_bg - expected_t;
        }

        let mut scores = vec![0i16; ALPHABET_SIZE * ALPHABET_SIZE];
        let mut max_abs = 0i32;
        for a in 0..ALPHABET_SIZE {
            for b in 0..ALPHABET_SIZE {
                let base = matrix.score(a as Letter, b as Letter);
                let shift = if a < TRUE_AA && b < TRUE_AA {
                    (query_shift[a] + target_shift[b]) / 2.0
                } else {
                    0.0
                };
                let v = (base as f64 + shift).round() as i32;
                let v = v.clamp(i16::MIN as i32, i16::MAX as i32);
                max_abs = max_abs.max(v.abs());
                scores[a * ALPHABET_SIZE + b] = v as i16;
            }
        }
        let score_width = if max_abs < 128 { 8 } else { 16 };
        TargetMatrix { scores, score_width }
    }

    #[inline]
    pub fn score(&self, a: Letter, b: Letter) -> i32 {
        self.scores[a as usize * ALPHABET_SIZE + b as usize] as i32
    }

    /// Lane element width (8 or 16 bits) needed to hold the adjusted scores.
    pub fn score_width(&self) -> u32 {
        self.score_width
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::SubstitutionMatrixList;
    use seqsieve_seq::alphabet::encode_seq;

    #[test]
    fn background_like_pair_is_not_adjusted() {
        let seq = encode_seq("ARNDCQEGHILKMFPSTWYVARNDCQEGHILKMFPSTWYV");
        let comp = composition(&seq);
        assert_eq!(adjust_rule(&comp, 40, &seq), MatrixAdjustRule::DontAdjust);
    }

    #[test]
    fn biased_pair_is_adjusted_and_penalized() {
        let m = ScoreMatrix::load(SubstitutionMatrixList::BLOSUM62);
        let biased = encode_seq("KKKKKKKKKKKKKKKKRRRRRRRRRRRRRRRR");
        let comp = composition(&biased);
        assert_eq!(adjust_rule(&comp, 32, &biased), MatrixAdjustRule::Scale);
        let tm = TargetMatrix::new(&comp, &biased, &m);
        let k = seqsieve_seq::alphabet::encode_char(b'K');
        // K/K matches inside a K-rich pair are worth less than in the standard matrix
        assert!(tm.score(k, k) < m.score(k, k));
    }

    #[test]
    fn short_sequences_keep_standard_matrix() {
        let seq = encode_seq("KKKKK");
        let comp = composition(&seq);
        assert_eq!(adjust_rule(&comp, 5, &seq), MatrixAdjustRule::DontAdjust);
    }
}
