use crate::alphabet::{is_amino_acid, Letter};

/// Shannon-entropy test for seed complexity.
///
/// A seed window passes when its residue entropy reaches `cut` nats; the cluster seed
/// table uses `cut = ln 2 · shape_weight · seed_cut` so the threshold scales with the
/// seed length. Low-complexity seeds (poly-A runs, short repeats) would otherwise
/// flood the pair table.
pub fn seed_is_complex(window: &[Letter], cut: f64) -> bool {
    let mut counts = [0u32; 32];
    let mut n = 0u32;
    for &l in window {
        if is_amino_acid(l) {
            counts[l as usize] += 1;
            n += 1;
        }
    }
    if n == 0 {
        return false;
    }
    let mut entropy = 0.0;
    for &c in counts.iter() {
        if c > 0 {
            let p = c as f64 / n as f64;
            entropy -= p * p.ln();
        }
    }
    entropy * n as f64 >= cut
}

/// True when at least `threshold` of the residues are masked or ambiguous.
///
/// Targets failing this test are excluded from the alt-HSP rescan: there is nothing
/// left to align against.
pub fn is_fully_masked(seq: &[Letter], threshold: f64) -> bool {
    if seq.is_empty() {
        return true;
    }
    let masked = seq.iter().filter(|&&l| !is_amino_acid(l)).count();
    masked as f64 / seq.len() as f64 >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabet::encode_seq;

    #[test]
    fn homopolymer_seed_is_low_complexity() {
        let poly = encode_seq("AAAAAAAA");
        let mixed = encode_seq("MKTFVLRC");
        let cut = std::f64::consts::LN_2 * 8.0 * 1.0;
        assert!(!seed_is_complex(&poly, cut));
        assert!(seed_is_complex(&mixed, cut));
    }

    #[test]
    fn mask_fraction_threshold() {
        let seq = encode_seq("MKXXXXXX");
        assert!(is_fully_masked(&seq, 0.7));
        assert!(!is_fully_masked(&seq, 0.9));
        assert!(is_fully_masked(&[], 0.5));
    }
}
