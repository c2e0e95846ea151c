use seqsieve_seq::alphabet::{is_amino_acid, Letter, TRUE_AA};

use crate::composition::BACKGROUND_FREQ;
use crate::matrix::ScoreMatrix;

/// Windowed composition-bias correction over query positions.
///
/// For every query residue `r` the correction is the background expected score of `r`
/// minus the average score of `r` against the residues inside a 40-wide window around
/// it (excluding `r` itself). Positions in compositionally biased regions receive a
/// negative correction, so spurious matches inside them no longer reach the cutoffs.
pub struct BiasCorrection {
    values: Vec<f32>,
    /// the same corrections rounded to i8, consumed by the DP lanes
    pub int8: Vec<i8>,
}

const WINDOW_HALF: usize = 20;
const WINDOW: usize = 41;

impl BiasCorrection {
    pub fn new(seq: &[Letter], matrix: &ScoreMatrix) -> BiasCorrection {
        let background = background_scores(matrix);
        let len = seq.len();
        let mut values = vec![0f32; len];

        // running per-residue score sums over the sliding window
        let mut window_scores = [0i64; TRUE_AA];
        let mut in_window = 0usize;

        let add = |scores: &mut [i64; TRUE_AA], l: Letter, matrix: &ScoreMatrix, sign: i64| {
            for r in 0..TRUE_AA {
                scores[r] += sign * matrix.score(l, r as Letter) as i64;
            }
        };

        let mut head = 0usize;
        let window_half = WINDOW_HALF.min(len.saturating_sub(1));
        while head < window_half && head < len {
            add(&mut window_scores, seq[head], matrix, 1);
            in_window += 1;
            head += 1;
        }
        let mut tail = 0usize;
        for m in 0..len {
            while head < len && in_window < WINDOW && head <= m + WINDOW_HALF {
                add(&mut window_scores, seq[head], matrix, 1);
                in_window += 1;
                head += 1;
            }
            while m > tail + WINDOW_HALF {
                add(&mut window_scores, seq[tail], matrix, -1);
                in_window -= 1;
                tail += 1;
            }
            let r = seq[m];
            if is_amino_acid(r) && in_window > 1 {
                let window_avg = (window_scores[r as usize] - matrix.score(r, r) as i64) as f32
                    / (in_window - 1) as f32;
                values[m] = background[r as usize] as f32 - window_avg;
            }
        }

        let int8 = values
            .iter()
            .map(|&v| v.round().clamp(i8::MIN as f32, i8::MAX as f32) as i8)
            .collect();
        BiasCorrection { values, int8 }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn at(&self, i: usize) -> f32 {
        self.values[i]
    }
}

/// Expected score of each residue against the background composition.
fn background_scores(matrix: &ScoreMatrix) -> [f64; TRUE_AA] {
    let mut scores = [0f64; TRUE_AA];
    for i in 0..TRUE_AA {
        for j in 0..TRUE_AA {
            scores[i] += BACKGROUND_FREQ[j] * matrix.score(i as Letter, j as Letter) as f64;
        }
    }
    scores
}
