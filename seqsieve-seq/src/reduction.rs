use once_cell::sync::Lazy;

use crate::alphabet::{is_amino_acid, Letter, TRUE_AA};

/// A reduced amino-acid alphabet used for seed enumeration.
///
/// Residues with similar substitution behaviour share one group code, so seeds
/// tolerate conservative substitutions. The default is the 11-group reduction
/// `KR EQD N C G H ILV M F Y W P ST A` widely used for sensitive seeding.
pub struct Reduction {
    map: [u8; TRUE_AA],
    groups: u8,
}

static DEFAULT_GROUPS: &[&str] = &[
    "KR", "EDQN", "C", "G", "H", "ILVM", "F", "Y", "W", "P", "STA",
];

static DEFAULT_REDUCTION: Lazy<Reduction> = Lazy::new(|| Reduction::from_groups(DEFAULT_GROUPS));

impl Reduction {
    /// Builds a reduction from explicit residue groups.
    pub fn from_groups(groups: &[&str]) -> Reduction {
        let mut map = [0u8; TRUE_AA];
        for (code, group) in groups.iter().enumerate() {
            for c in group.bytes() {
                let l = crate::alphabet::encode_char(c);
                assert!(is_amino_acid(l), "reduction group contains non-residue {}", c as char);
                map[l as usize] = code as u8;
            }
        }
        Reduction {
            map,
            groups: groups.len() as u8,
        }
    }

    /// The process-wide default reduction.
    pub fn default_reduction() -> &'static Reduction {
        &DEFAULT_REDUCTION
    }

    /// Number of groups; seeds pack `bit_width()` bits per position.
    pub fn group_count(&self) -> u8 {
        self.groups
    }

    /// Bits needed to store one reduced code.
    pub fn bit_width(&self) -> u32 {
        u8::BITS - (self.groups - 1).leading_zeros()
    }

    /// Reduced code of a residue; ambiguous letters have no code.
    #[inline]
    pub fn reduce(&self, l: Letter) -> Option<u8> {
        if is_amino_acid(l) {
            Some(self.map[l as usize])
        } else {
            None
        }
    }

    /// Reduces a whole sequence; ambiguous positions become `None`.
    pub fn reduce_seq(&self, seq: &[Letter]) -> Vec<Option<u8>> {
        seq.iter().map(|&l| self.reduce(l)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabet::encode_seq;

    #[test]
    fn conservative_pairs_share_group() {
        let r = Reduction::default_reduction();
        let seq = encode_seq("KRILEDX");
        let codes = r.reduce_seq(&seq);
        assert_eq!(codes[0], codes[1]); // K and R
        assert_eq!(codes[2], codes[3]); // I and L
        assert_eq!(codes[4], codes[5]); // E and D
        assert_eq!(codes[6], None); // X has no group
    }

    #[test]
    fn bit_width_covers_group_count() {
        let r = Reduction::default_reduction();
        assert!(1u32 << r.bit_width() >= r.group_count() as u32);
    }
}
