use std::fs::File;
use std::io::{BufRead, BufReader};

use seqsieve_seq::alphabet::{encode_char, Letter, ALPHABET_SIZE, STOP_LETTER, TRUE_AA};

use crate::errors::ScoringError;
use crate::errors::ScoringError::{CantParseNcbiEntry, FileNotFound, IncorrectNcbiFormat, ReadingError};

/// Lists substitution matrices shipped with this crate.
///
/// ```
/// use seqsieve_score::{ScoreMatrix, SubstitutionMatrixList};
/// let blosum62 = ScoreMatrix::load(SubstitutionMatrixList::BLOSUM62);
/// assert_eq!(blosum62.score_by_aa(b'C', b'C'), 9);
/// assert_eq!(blosum62.score_by_aa(b'W', b'W'), 11);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubstitutionMatrixList {
    BLOSUM45,
    BLOSUM62,
    BLOSUM80,
}

/// Karlin–Altschul parameters of one (matrix, gap-penalty) combination.
#[derive(Clone, Copy, Debug)]
struct KaParams {
    lambda_gapped: f64,
    k_gapped: f64,
    lambda_ungapped: f64,
    k_ungapped: f64,
}

/// Score of masked and delimiter codes against everything.
const MASK_SCORE: i32 = -16;

/// An amino-acid substitution matrix over the internal alphabet, with gap penalties
/// and the statistics needed to convert raw scores to E-values and bit scores.
///
/// The score table covers the full internal letter space, so DP kernels index it with
/// any letter they encounter; masked and delimiter codes score strongly negative.
#[derive(Clone)]
pub struct ScoreMatrix {
    score: Vec<i32>,
    gap_open: i32,
    gap_extend: i32,
    params: KaParams,
    db_letters: f64,
    name: &'static str,
}

impl ScoreMatrix {
    /// Loads a matrix shipped with the crate, with its default gap penalties.
    pub fn load(matrix_name: SubstitutionMatrixList) -> ScoreMatrix {
        let (data, gap_open, gap_extend, params, name) = match matrix_name {
            SubstitutionMatrixList::BLOSUM45 => (
                include_str!("../data/BLOSUM45"),
                14,
                2,
                KaParams {
                    lambda_gapped: 0.195,
                    k_gapped: 0.038,
                    lambda_ungapped: 0.2291,
                    k_ungapped: 0.092,
                },
                "BLOSUM45",
            ),
            SubstitutionMatrixList::BLOSUM62 => (
                include_str!("../data/BLOSUM62"),
                11,
                1,
                KaParams {
                    lambda_gapped: 0.267,
                    k_gapped: 0.041,
                    lambda_ungapped: 0.3176,
                    k_ungapped: 0.134,
                },
                "BLOSUM62",
            ),
            SubstitutionMatrixList::BLOSUM80 => (
                include_str!("../data/BLOSUM80"),
                10,
                1,
                KaParams {
                    lambda_gapped: 0.299,
                    k_gapped: 0.071,
                    lambda_ungapped: 0.3430,
                    k_ungapped: 0.177,
                },
                "BLOSUM80",
            ),
        };
        let mut m = ScoreMatrix::ncbi_matrix_from_buffer(BufReader::new(data.as_bytes()))
            .expect("shipped matrix data must parse");
        m.gap_open = gap_open;
        m.gap_extend = gap_extend;
        m.params = params;
        m.name = name;
        m
    }

    /// Loads a matrix from a file in the NCBI format; gap penalties and statistics
    /// stay at the BLOSUM62 defaults unless overridden with [`with_gap_penalties`](Self::with_gap_penalties).
    pub fn ncbi_matrix_from_file(file_name: &str) -> Result<ScoreMatrix, ScoringError> {
        let file = match File::open(file_name) {
            Ok(f) => f,
            Err(_) => {
                return Err(FileNotFound {
                    file_name: file_name.to_string(),
                })
            }
        };
        ScoreMatrix::ncbi_matrix_from_buffer(BufReader::new(file))
    }

    /// Parses a matrix in the NCBI format.
    ///
    /// The 20 standard residues and the `X` column are loaded; `B`, `Z` and `*`
    /// entries are folded into the stop score.
    pub fn ncbi_matrix_from_buffer<R: BufRead>(reader: R) -> Result<ScoreMatrix, ScoringError> {
        let mut m = ScoreMatrix::empty();
        let mut order: Vec<Letter> = Vec::new();
        let mut row = 0usize;
        let mut stop_score = -4;
        for line in reader.lines() {
            let line = match line {
                Ok(l) => l,
                Err(_) => return Err(ReadingError),
            };
            if line.starts_with('#') || line.trim().is_empty() {
                continue;
            }
            if line.starts_with(' ') {
                // header row fixes the column order
                order = line
                    .split_whitespace()
                    .map(|t| encode_char(t.as_bytes()[0]))
                    .collect();
                continue;
            }
            let values: Vec<&str> = line.split_whitespace().collect();
            if values.len() < 21 {
                return Err(IncorrectNcbiFormat { line: line.clone() });
            }
            let row_char = values[0].as_bytes()[0];
            if row_char == b'B' || row_char == b'Z' {
                continue;
            }
            let row_letter = encode_char(row_char);
            if row_char == b'*' {
                // the * row is constant except for the *,* entry at its end
                stop_score = match values[1].parse::<i32>() {
                    Ok(v) => v,
                    Err(_) => {
                        return Err(CantParseNcbiEntry {
                            line: line.clone(),
                            value: values[1].to_string(),
                        })
                    }
                };
                continue;
            }
            for (col, token) in values[1..].iter().enumerate() {
                if col >= order.len() {
                    break;
                }
                let col_letter = order[col];
                if col_letter as usize > TRUE_AA {
                    continue; // B, Z and * columns
                }
                let v = match token.parse::<i32>() {
                    Ok(v) => v,
                    Err(_) => {
                        return Err(CantParseNcbiEntry {
                            line: line.clone(),
                            value: token.to_string(),
                        })
                    }
                };
                m.set(row_letter, col_letter, v);
                m.set(col_letter, row_letter, v);
            }
            row += 1;
            if row > TRUE_AA + 1 {
                break;
            }
        }
        // stop scores and the sentinels
        for l in 0..ALPHABET_SIZE as u8 {
            m.set(STOP_LETTER, l, stop_score);
            m.set(l, STOP_LETTER, stop_score);
        }
        m.set(STOP_LETTER, STOP_LETTER, 1);
        for l in 0..ALPHABET_SIZE as u8 {
            for sentinel in (TRUE_AA as u8 + 2)..ALPHABET_SIZE as u8 {
                m.set(sentinel, l, MASK_SCORE);
                m.set(l, sentinel, MASK_SCORE);
            }
        }
        Ok(m)
    }

    fn empty() -> ScoreMatrix {
        ScoreMatrix {
            score: vec![0; ALPHABET_SIZE * ALPHABET_SIZE],
            gap_open: 11,
            gap_extend: 1,
            params: KaParams {
                lambda_gapped: 0.267,
                k_gapped: 0.041,
                lambda_ungapped: 0.3176,
                k_ungapped: 0.134,
            },
            db_letters: 0.0,
            name: "custom",
        }
    }

    fn set(&mut self, a: Letter, b: Letter, v: i32) {
        self.score[a as usize * ALPHABET_SIZE + b as usize] = v;
    }

    pub fn with_gap_penalties(mut self, gap_open: i32, gap_extend: i32) -> ScoreMatrix {
        self.gap_open = gap_open;
        self.gap_extend = gap_extend;
        self
    }

    /// Installs the database size used as the search-space width of E-values.
    pub fn set_db_letters(&mut self, letters: u64) {
        self.db_letters = letters as f64;
    }

    #[inline]
    /// Substitution score of two internal letters.
    pub fn score(&self, a: Letter, b: Letter) -> i32 {
        self.score[a as usize * ALPHABET_SIZE + b as usize]
    }

    #[inline]
    /// Substitution score of two single-letter amino acid codes such as `b'W'`.
    pub fn score_by_aa(&self, a: u8, b: u8) -> i32 {
        self.score(encode_char(a), encode_char(b))
    }

    pub fn gap_open(&self) -> i32 {
        self.gap_open
    }

    pub fn gap_extend(&self) -> i32 {
        self.gap_extend
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Largest score of the matrix over standard residues.
    pub fn max_score(&self) -> i32 {
        let mut max = i32::MIN;
        for a in 0..TRUE_AA {
            for b in 0..TRUE_AA {
                max = max.max(self.score[a * ALPHABET_SIZE + b]);
            }
        }
        max
    }

    /// The bias added to raw scores so unsigned 8-bit lanes never underflow.
    pub fn bias(&self) -> i32 {
        let mut min = i32::MAX;
        for a in 0..TRUE_AA {
            for b in 0..TRUE_AA {
                min = min.min(self.score[a * ALPHABET_SIZE + b]);
            }
        }
        -min
    }

    /// E-value of a raw gapped score for a query of length `qlen` against a search
    /// space of `tlen` letters (the target length, or the database letter count when
    /// one was installed with [`set_db_letters`](Self::set_db_letters)).
    pub fn evalue(&self, score: i32, qlen: usize, tlen: usize) -> f64 {
        let n = if self.db_letters > 0.0 {
            self.db_letters
        } else {
            tlen as f64
        };
        self.params.k_gapped * qlen as f64 * n * (-self.params.lambda_gapped * score as f64).exp()
    }

    /// Bit score of a raw gapped score.
    pub fn bitscore(&self, score: i32) -> f64 {
        (self.params.lambda_gapped * score as f64 - self.params.k_gapped.ln()) / std::f64::consts::LN_2
    }

    /// Smallest raw score whose E-value is at most `evalue` for the given search
    /// space; the gapped filter derives its stage cutoffs from this.
    pub fn score_for_evalue(&self, evalue: f64, qlen: usize, tlen: usize) -> i32 {
        let n = if self.db_letters > 0.0 {
            self.db_letters
        } else {
            tlen as f64
        };
        let space = self.params.k_gapped * qlen as f64 * n;
        if space <= 0.0 {
            return 0;
        }
        ((space / evalue).ln() / self.params.lambda_gapped).ceil().max(0.0) as i32
    }

    /// E-value under the ungapped parameters, used by the seed-ranking shortcut.
    pub fn evalue_ungapped(&self, score: i32, qlen: usize, tlen: usize) -> f64 {
        let n = if self.db_letters > 0.0 {
            self.db_letters
        } else {
            tlen as f64
        };
        self.params.k_ungapped * qlen as f64 * n * (-self.params.lambda_ungapped * score as f64).exp()
    }
}

impl std::fmt::Display for ScoreMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "# {} gap_open={} gap_extend={}", self.name, self.gap_open, self.gap_extend)?;
        let header = "ARNDCQEGHILKMFPSTWYVX";
        writeln!(f, "   {}", header.chars().map(|c| format!("{:>3}", c)).collect::<String>())?;
        for a in header.bytes() {
            write!(f, "{}", a as char)?;
            for b in header.bytes() {
                write!(f, "{:3}", self.score_by_aa(a, b))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seqsieve_seq::alphabet::{DELIMITER, SUPER_HARD_MASK};

    #[test]
    fn blosum62_spot_checks() {
        let m = ScoreMatrix::load(SubstitutionMatrixList::BLOSUM62);
        assert_eq!(m.score_by_aa(b'A', b'A'), 4);
        assert_eq!(m.score_by_aa(b'W', b'W'), 11);
        assert_eq!(m.score_by_aa(b'A', b'R'), -1);
        assert_eq!(m.score_by_aa(b'E', b'D'), 2);
        assert_eq!(m.score_by_aa(b'X', b'A'), 0);
        assert_eq!(m.score_by_aa(b'X', b'X'), -1);
    }

    #[test]
    fn sentinels_score_strongly_negative() {
        let m = ScoreMatrix::load(SubstitutionMatrixList::BLOSUM62);
        assert_eq!(m.score(SUPER_HARD_MASK, 0), MASK_SCORE);
        assert_eq!(m.score(0, DELIMITER), MASK_SCORE);
    }

    #[test]
    fn evalue_decreases_with_score() {
        let m = ScoreMatrix::load(SubstitutionMatrixList::BLOSUM62);
        let e1 = m.evalue(50, 100, 1000);
        let e2 = m.evalue(100, 100, 1000);
        assert!(e2 < e1);
        assert!(m.bitscore(100) > m.bitscore(50));
    }

    #[test]
    fn identity_16mer_is_significant() {
        let m = ScoreMatrix::load(SubstitutionMatrixList::BLOSUM62);
        let seq = seqsieve_seq::alphabet::encode_seq("MKTFFVLLLCTFTVFS");
        let score: i32 = seq.iter().map(|&l| m.score(l, l)).sum();
        assert!(m.evalue(score, 16, 16) <= 1e-7);
    }

    #[test]
    fn symmetric_over_standard_residues() {
        for list in [
            SubstitutionMatrixList::BLOSUM45,
            SubstitutionMatrixList::BLOSUM62,
            SubstitutionMatrixList::BLOSUM80,
        ] {
            let m = ScoreMatrix::load(list);
            for a in 0..TRUE_AA as u8 {
                for b in 0..TRUE_AA as u8 {
                    assert_eq!(m.score(a, b), m.score(b, a));
                }
            }
        }
    }
}
