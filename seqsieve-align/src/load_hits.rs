//! Decodes raw seed hits into per-target groups.

use seqsieve_seq::SequenceSet;

use crate::target::{SeedHit, SeedHitList, TargetScore};

/// A raw hit as produced by the external seed indexer: global subject offset plus the
/// query seed offset.
#[derive(Clone, Copy, Debug)]
pub struct RawHit {
    pub query: u32,
    pub subject_offset: u64,
    pub seed_offset: i32,
    pub score: u16,
}

impl RawHit {
    fn cmp_subject(a: &RawHit, b: &RawHit) -> std::cmp::Ordering {
        a.subject_offset.cmp(&b.subject_offset)
    }
}

/// Groups raw hits by their owning target.
///
/// Hits are sorted by subject offset, then walked while tracking the target that owns
/// the current offset. Two locator strategies exist; the choice is by the
/// information-theoretic cost of `hits` binary searches against one linear sweep of
/// the `limits` array.
///
/// Out-of-range subject offsets are a caller bug and panic.
pub fn load_hits(
    hits: &mut [RawHit],
    ref_seqs: &SequenceSet,
    query_contexts: usize,
) -> SeedHitList {
    let mut list = SeedHitList::new();
    if hits.is_empty() {
        return list;
    }
    list.seed_hits.reserve(hits.len(), hits.len());
    hits.sort_by(RawHit::cmp_subject);
    let total_subjects = ref_seqs.len();

    let mut target = u32::MAX;
    let mut score: u16 = 0;
    let mut push_hit = |list: &mut SeedHitList, t: u32, i: i32, j: i32, frame: u8, s: u16, target: &mut u32, score: &mut u16| {
        if t != *target {
            if *target != u32::MAX {
                list.target_scores.push(TargetScore {
                    target: (list.target_block_ids.len() - 1) as u32,
                    score: *score,
                });
                *score = 0;
            }
            list.seed_hits.next();
            list.target_block_ids.push(t);
            *target = t;
        }
        list.seed_hits.push(SeedHit {
            i,
            j,
            score: s as i32,
            frame,
        });
        *score = (*score).max(s);
    };

    let use_binary_search =
        (total_subjects.max(2) as f64).log2() * (hits.len() as f64) < total_subjects as f64 / 10.0;
    if use_binary_search {
        for h in hits.iter() {
            let (t, j) = ref_seqs.local_position(h.subject_offset);
            push_hit(
                &mut list,
                t as u32,
                h.seed_offset,
                j as i32,
                (h.query as usize % query_contexts) as u8,
                h.score,
                &mut target,
                &mut score,
            );
        }
    } else {
        let limits = ref_seqs.limits();
        let mut it = 0usize;
        for h in hits.iter() {
            let offset = h.subject_offset as usize;
            assert!(
                offset < ref_seqs.buffer_len(),
                "subject offset {} outside the arena",
                offset
            );
            while it < limits.len() && limits[it] <= offset {
                it += 1;
            }
            assert!(it > 0, "subject offset {} below the arena", offset);
            let t = (it - 1) as u32;
            let j = (offset - limits[it - 1]) as i32;
            push_hit(
                &mut list,
                t,
                h.seed_offset,
                j,
                (h.query as usize % query_contexts) as u8,
                h.score,
                &mut target,
                &mut score,
            );
        }
    }
    if target != u32::MAX {
        list.target_scores.push(TargetScore {
            target: (list.target_block_ids.len() - 1) as u32,
            score,
        });
    }
    list
}

#[cfg(test)]
mod tests {
    use super::*;
    use seqsieve_seq::alphabet::encode_seq;

    fn arena() -> SequenceSet {
        let mut set = SequenceSet::new();
        set.push(&encode_seq("MKTFFVLLLC")); // target 0
        set.push(&encode_seq("ARNDARND")); // target 1
        set.push(&encode_seq("WYVWYVWYV")); // target 2
        set.finish();
        set
    }

    #[test]
    fn hits_group_by_target_with_max_scores() {
        let set = arena();
        let mut hits = vec![
            RawHit {
                query: 0,
                subject_offset: set.offset(1) + 3,
                seed_offset: 5,
                score: 20,
            },
            RawHit {
                query: 0,
                subject_offset: set.offset(0) + 2,
                seed_offset: 1,
                score: 30,
            },
            RawHit {
                query: 0,
                subject_offset: set.offset(1),
                seed_offset: 0,
                score: 25,
            },
        ];
        let list = load_hits(&mut hits, &set, 1);
        assert_eq!(list.target_block_ids, vec![0, 1]);
        assert_eq!(list.seed_hits.groups(), 2);
        assert_eq!(list.seed_hits.count(0), 1);
        assert_eq!(list.seed_hits.count(1), 2);
        assert_eq!(list.seed_hits.group(0)[0].j, 2);
        assert_eq!(list.target_scores[0].score, 30);
        assert_eq!(list.target_scores[1].score, 25);
    }

    #[test]
    fn empty_input_gives_empty_list() {
        let set = arena();
        let list = load_hits(&mut [], &set, 1);
        assert!(list.target_block_ids.is_empty());
        assert!(list.target_scores.is_empty());
    }

    #[test]
    #[should_panic]
    fn out_of_range_offset_is_fatal() {
        let set = arena();
        let mut hits = vec![RawHit {
            query: 0,
            subject_offset: 1_000_000,
            seed_offset: 0,
            score: 1,
        }];
        load_hits(&mut hits, &set, 1);
    }
}
