//! Residue composition vectors.

use seqsieve_seq::alphabet::{is_amino_acid, Letter, TRUE_AA};

/// Robinson & Robinson background frequencies of the 20 standard residues, in the
/// internal encoding order.
pub const BACKGROUND_FREQ: [f64; TRUE_AA] = [
    0.0844581, 0.0581912, 0.0421072, 0.0546748, 0.0146359, 0.040118, 0.0621211, 0.0669379,
    0.0225159, 0.0547866, 0.0957934, 0.0523275, 0.0218629, 0.038769, 0.0505311, 0.0760908,
    0.0573267, 0.0127314, 0.0295317, 0.0644889,
];

/// Residue frequencies of one sequence; ambiguous positions are ignored.
pub fn composition(seq: &[Letter]) -> [f64; TRUE_AA] {
    let mut counts = [0u32; TRUE_AA];
    let mut n = 0u32;
    for &l in seq {
        if is_amino_acid(l) {
            counts[l as usize] += 1;
            n += 1;
        }
    }
    let mut freq = [0.0; TRUE_AA];
    if n > 0 {
        for i in 0..TRUE_AA {
            freq[i] = counts[i] as f64 / n as f64;
        }
    }
    freq
}

/// Relative entropy of a composition against the background, in nats.
///
/// Strongly biased sequences diverge from the background; the matrix-adjust rule uses
/// this to decide whether a bespoke target matrix pays off.
pub fn relative_entropy(freq: &[f64; TRUE_AA]) -> f64 {
    let mut d = 0.0;
    for i in 0..TRUE_AA {
        if freq[i] > 0.0 {
            d += freq[i] * (freq[i] / BACKGROUND_FREQ[i]).ln();
        }
    }
    d
}

#[cfg(test)]
mod tests {
    use super::*;
    use seqsieve_seq::alphabet::encode_seq;

    #[test]
    fn frequencies_sum_to_one() {
        let f = composition(&encode_seq("MKTFFVLLLCTFTVFS"));
        let sum: f64 = f.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn biased_sequence_has_higher_entropy() {
        let balanced = composition(&encode_seq("ARNDCQEGHILKMFPSTWYV"));
        let biased = composition(&encode_seq("KKKKKKKKKKRRRRRRRRRR"));
        assert!(relative_entropy(&biased) > relative_entropy(&balanced));
    }
}
