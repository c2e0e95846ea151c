use seqsieve_util::murmur_mix;

use crate::alphabet::Letter;
use crate::reduction::Reduction;

/// One enumerated seed: the packed reduced k-mer and its position in the sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Seed {
    pub key: u64,
    pub pos: i32,
}

fn packed_kmers(seq: &[Letter], reduction: &Reduction, k: usize) -> Vec<Seed> {
    let bits = reduction.bit_width();
    let width = bits as u64 * k as u64;
    let mask = if width >= 64 { u64::MAX } else { (1u64 << width) - 1 };
    let codes = reduction.reduce_seq(seq);
    let mut out = Vec::new();
    if seq.len() < k {
        return out;
    }
    let mut packed = 0u64;
    let mut valid = 0usize;
    for (i, code) in codes.iter().enumerate() {
        match code {
            Some(c) => {
                packed = ((packed << bits) | *c as u64) & mask;
                valid += 1;
            }
            None => {
                valid = 0;
            }
        }
        if valid >= k {
            out.push(Seed {
                key: packed,
                pos: (i + 1 - k) as i32,
            });
        }
    }
    out
}

/// Bottom-`s` seed sketch of one sequence.
///
/// All valid reduced k-mers are ranked by their Murmur-mixed hash; the `s` smallest
/// form the sketch. Implemented as a pure function over the sequence so it can run
/// per-sequence inside any worker without shared state.
pub struct SketchIterator {
    data: Vec<Seed>,
    pos: usize,
}

impl SketchIterator {
    pub fn new(seq: &[Letter], reduction: &Reduction, k: usize, sketch_size: usize) -> SketchIterator {
        let mut kmers: Vec<(u64, Seed)> = packed_kmers(seq, reduction, k)
            .into_iter()
            .map(|s| (murmur_mix(s.key), s))
            .collect();
        kmers.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.pos.cmp(&b.1.pos)));
        kmers.truncate(sketch_size);
        SketchIterator {
            data: kmers.into_iter().map(|(_, s)| s).collect(),
            pos: 0,
        }
    }
}

impl Iterator for SketchIterator {
    type Item = Seed;

    fn next(&mut self) -> Option<Seed> {
        if self.pos >= self.data.len() {
            return None;
        }
        let s = self.data[self.pos];
        self.pos += 1;
        Some(s)
    }
}

/// Window minimizers over the reduced k-mer stream.
///
/// For every window of `w` consecutive valid k-mers, yields the one with the smallest
/// Murmur-mixed hash; runs of windows sharing a minimizer yield it once. State is an
/// explicit ring buffer rather than a stateful hash-deque, so the generator is a pure
/// function of `(sequence, k, w)`.
pub struct MinimizerIterator {
    kmers: Vec<(u64, Seed)>,
    window: usize,
    next_window_start: usize,
    last_emitted: Option<usize>,
}

impl MinimizerIterator {
    pub fn new(seq: &[Letter], reduction: &Reduction, k: usize, window: usize) -> MinimizerIterator {
        let kmers = packed_kmers(seq, reduction, k)
            .into_iter()
            .map(|s| (murmur_mix(s.key), s))
            .collect();
        MinimizerIterator {
            kmers,
            window: window.max(1),
            next_window_start: 0,
            last_emitted: None,
        }
    }
}

impl Iterator for MinimizerIterator {
    type Item = Seed;

    fn next(&mut self) -> Option<Seed> {
        while self.next_window_start + self.window <= self.kmers.len() {
            let begin = self.next_window_start;
            let window = &self.kmers[begin..begin + self.window];
            let mut min_idx = 0;
            for (i, kmer) in window.iter().enumerate() {
                if kmer.0 < window[min_idx].0 {
                    min_idx = i;
                }
            }
            self.next_window_start += 1;
            let absolute = begin + min_idx;
            if self.last_emitted != Some(absolute) {
                self.last_emitted = Some(absolute);
                return Some(window[min_idx].1);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabet::encode_seq;

    fn reduction() -> &'static Reduction {
        Reduction::default_reduction()
    }

    #[test]
    fn sketch_is_deterministic_and_bounded() {
        let seq = encode_seq("MKTFFVLLLCTFTVFSAYSRGVFRRDTHKSEIAHRFKDLGE");
        let a: Vec<Seed> = SketchIterator::new(&seq, reduction(), 5, 8).collect();
        let b: Vec<Seed> = SketchIterator::new(&seq, reduction(), 5, 8).collect();
        assert_eq!(a, b);
        assert!(a.len() <= 8);
        assert!(!a.is_empty());
    }

    #[test]
    fn short_sequence_has_no_seeds() {
        let seq = encode_seq("MKT");
        assert_eq!(SketchIterator::new(&seq, reduction(), 5, 8).count(), 0);
    }

    #[test]
    fn ambiguous_positions_break_kmers() {
        let with_x = encode_seq("MKTFXVLLLC");
        let seeds: Vec<Seed> = SketchIterator::new(&with_x, reduction(), 5, 100).collect();
        // no k-mer may span position 4
        for s in &seeds {
            assert!(s.pos > 4 || s.pos + 5 <= 4, "seed at {} spans the X", s.pos);
        }
    }

    #[test]
    fn minimizers_are_a_subset_of_kmers() {
        let seq = encode_seq("MKTFFVLLLCTFTVFSAYSRGVFRRDTHKSEIAHRFKDLGE");
        let minimizers: Vec<Seed> = MinimizerIterator::new(&seq, reduction(), 5, 4).collect();
        let all: Vec<Seed> = packed_kmers(&seq, reduction(), 5);
        for m in &minimizers {
            assert!(all.contains(m));
        }
        assert!(minimizers.len() < all.len());
    }

    #[test]
    fn identical_sequences_share_their_sketch() {
        let a = encode_seq("MKTFFVLLLCTFTVFSAYSRGVFRRD");
        let s1: Vec<u64> = SketchIterator::new(&a, reduction(), 5, 6).map(|s| s.key).collect();
        let s2: Vec<u64> = SketchIterator::new(&a, reduction(), 5, 6).map(|s| s.key).collect();
        assert_eq!(s1, s2);
    }
}
