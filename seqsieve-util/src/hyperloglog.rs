use crate::hash::murmur_mix;

/// HyperLogLog cardinality sketch.
///
/// Used by the cluster chunk builder to bound the expected number of distinct
/// sequence blocks per chunk without materialising the set.
#[derive(Clone)]
pub struct HyperLogLog {
    p: u32,
    m: usize,
    registers: Vec<u8>,
    alpha: f64,
}

impl HyperLogLog {
    pub fn new(precision: u32) -> HyperLogLog {
        assert!((4..=20).contains(&precision), "precision must be between 4 and 20");
        let m = 1usize << precision;
        let alpha = match m {
            16 => 0.673,
            32 => 0.697,
            64 => 0.709,
            _ => 0.7213 / (1.0 + 1.079 / m as f64),
        };
        HyperLogLog {
            p: precision,
            m,
            registers: vec![0; m],
            alpha,
        }
    }

    pub fn add(&mut self, x: i64) {
        let hash = murmur_mix(x as u64);
        let index = (hash >> (64 - self.p)) as usize;
        let w = hash & ((1u64 << (64 - self.p)) - 1);
        let rho = if w == 0 {
            (64 - self.p + 1) as u8
        } else {
            (w.leading_zeros() - self.p + 1) as u8
        };
        if self.registers[index] < rho {
            self.registers[index] = rho;
        }
    }

    pub fn estimate(&self) -> i64 {
        let mut sum = 0.0;
        let mut zeros = 0usize;
        let mut all_zero = true;
        for &r in &self.registers {
            sum += 1.0 / (1u64 << r) as f64;
            if r != 0 {
                all_zero = false;
            } else {
                zeros += 1;
            }
        }
        if all_zero {
            return 0;
        }
        let m = self.m as f64;
        let mut e = self.alpha * m * m / sum;
        if e <= 2.5 * m && zeros > 0 {
            e = m * (m / zeros as f64).ln();
        }
        e.round() as i64
    }

    /// Takes the register-wise maximum with another sketch of the same precision.
    pub fn merge(&mut self, other: &HyperLogLog) {
        assert_eq!(self.p, other.p, "precision must match for merging");
        for (r, &o) in self.registers.iter_mut().zip(other.registers.iter()) {
            if *r < o {
                *r = o;
            }
        }
    }
}

impl Default for HyperLogLog {
    fn default() -> Self {
        HyperLogLog::new(10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn estimate_within_tolerance() {
        let mut hll = HyperLogLog::default();
        for i in 0..10000i64 {
            hll.add(i);
        }
        let e = hll.estimate();
        assert!((8500..=11500).contains(&e), "estimate {} out of range", e);
    }

    #[test]
    fn duplicates_do_not_inflate_the_estimate() {
        let mut rng = SmallRng::seed_from_u64(7);
        let keys: Vec<i64> = (0..1000).map(|_| rng.gen_range(0..500)).collect();
        let mut hll = HyperLogLog::default();
        for &k in &keys {
            hll.add(k);
        }
        let e = hll.estimate();
        assert!((400..=600).contains(&e), "estimate {} out of range", e);
    }

    #[test]
    fn merge_matches_union() {
        let mut a = HyperLogLog::default();
        let mut b = HyperLogLog::default();
        for i in 0..5000i64 {
            a.add(i);
        }
        for i in 2500..7500i64 {
            b.add(i);
        }
        a.merge(&b);
        let e = a.estimate();
        assert!((6300..=8700).contains(&e), "estimate {} out of range", e);
    }

    #[test]
    fn empty_sketch_estimates_zero() {
        assert_eq!(HyperLogLog::default().estimate(), 0);
    }
}
