/// Splits the range `0..count` into `parts` contiguous slices of near-equal size.
///
/// # Example
/// ```
/// use seqsieve_util::Partition;
/// let p = Partition::new(10, 3);
/// assert_eq!((p.begin(0), p.end(0)), (0, 4));
/// assert_eq!((p.begin(2), p.end(2)), (8, 10));
/// ```
#[derive(Clone, Copy, Debug)]
pub struct Partition {
    pub parts: i64,
    count: i64,
    size: i64,
}

impl Partition {
    pub fn new(count: i64, parts: i64) -> Partition {
        let parts = parts.clamp(1, count.max(1));
        Partition {
            parts,
            count,
            size: (count + parts - 1) / parts,
        }
    }

    pub fn begin(&self, part: i64) -> i64 {
        (part * self.size).min(self.count)
    }

    pub fn end(&self, part: i64) -> i64 {
        ((part + 1) * self.size).min(self.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parts_cover_range_without_overlap() {
        for count in [0i64, 1, 7, 100, 101] {
            for parts in [1i64, 2, 3, 8] {
                let p = Partition::new(count, parts);
                let mut covered = 0;
                for i in 0..p.parts {
                    assert!(p.begin(i) <= p.end(i));
                    covered += p.end(i) - p.begin(i);
                    if i > 0 {
                        assert_eq!(p.begin(i), p.end(i - 1));
                    }
                }
                assert_eq!(covered, count);
            }
        }
    }
}
