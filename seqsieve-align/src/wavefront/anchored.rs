//! Anchored wavefront extension.
//!
//! Extends a chained anchor in both directions with the wavefront aligner: each side
//! is aligned as a whole, then clipped back to its maximum-scoring prefix under the
//! substitution matrix, so the result behaves like a local X-drop extension with
//! gaps. Heuristic or budget termination inside the wavefront is treated as "best
//! alignment within the explored region"; only an exhausted memory budget drops the
//! pair entirely.

use seqsieve_score::ScoreMatrix;
use seqsieve_seq::alphabet::Letter;

use crate::config::ExtensionConfig;
use crate::diag::DiagonalSegment;
use crate::hsp::{EditOp, Hsp};
use crate::interval::Interval;
use crate::ungapped::make_clipped_anchor;
use crate::wavefront::{WfaAligner, WfaStatus};

/// One direction of extension: the score-clipped operation list plus consumed
/// lengths.
struct Extension {
    ops: Vec<EditOp>,
    query_len: i32,
    target_len: i32,
    score: i32,
}

/// Walks a cigar over concrete sequences, accumulating matrix scores, and clips at
/// the maximum-scoring prefix.
fn clip_extension(
    cigar: &[EditOp],
    query: &[Letter],
    query_cbs: Option<&[i8]>,
    target: &[Letter],
    matrix: &ScoreMatrix,
) -> Extension {
    let mut score = 0i32;
    let mut best_score = 0i32;
    let mut best_len = 0usize;
    let mut best_q = 0i32;
    let mut best_t = 0i32;
    let mut q = 0i32;
    let mut t = 0i32;
    let gap_open = matrix.gap_open() + matrix.gap_extend();
    let gap_extend = matrix.gap_extend();
    for (n, op) in cigar.iter().enumerate() {
        match op {
            EditOp::Match | EditOp::Substitution(_) => {
                if q as usize >= query.len() || t as usize >= target.len() {
                    break;
                }
                score += matrix.score(query[q as usize], target[t as usize]);
                if let Some(cbs) = query_cbs {
                    score += cbs[q as usize] as i32;
                }
                q += 1;
                t += 1;
            }
            EditOp::Insertion(len) => {
                // consecutive single-residue insertions cost one opening
                let opened = n > 0 && matches!(cigar[n - 1], EditOp::Insertion(_));
                score -= if opened {
                    gap_extend * *len as i32
                } else {
                    gap_open + (*len as i32 - 1) * gap_extend
                };
                q += *len as i32;
            }
            EditOp::Deletion(_) => {
                // consecutive deletions cost one opening
                let opened = n > 0 && matches!(cigar[n - 1], EditOp::Deletion(_));
                score -= if opened { gap_extend } else { gap_open };
                t += 1;
            }
            EditOp::FrameshiftFwd | EditOp::FrameshiftRev => {}
        }
        if score > best_score {
            best_score = score;
            best_len = n + 1;
            best_q = q;
            best_t = t;
        }
    }
    Extension {
        ops: cigar[..best_len].to_vec(),
        query_len: best_q,
        target_len: best_t,
        score: best_score,
    }
}

fn extend_side(
    query: &[Letter],
    query_cbs: Option<&[i8]>,
    target: &[Letter],
    config: &ExtensionConfig,
    matrix: &ScoreMatrix,
) -> Option<Extension> {
    if query.is_empty() || target.is_empty() {
        return Some(Extension {
            ops: Vec::new(),
            query_len: 0,
            target_len: 0,
            score: 0,
        });
    }
    let mut aligner = WfaAligner::new(config.wfa_penalties).with_heuristic(config.wfa_heuristic);
    if let Some(max_score) = config.wfa_max_score {
        aligner = aligner.with_max_score(max_score);
    }
    if let Some(budget) = config.wfa_max_memory {
        aligner = aligner.with_max_memory(budget);
    }
    let result = aligner.align_end_to_end(query, target);
    if result.status == WfaStatus::Oom {
        return None;
    }
    Some(clip_extension(&result.cigar, query, query_cbs, target, matrix))
}

/// Substitutes concrete letters into the placeholder substitution/deletion ops.
fn resolve_letters(ops: &mut [EditOp], query: &[Letter], target: &[Letter], q0: i32, t0: i32) {
    let mut q = q0;
    let mut t = t0;
    for op in ops.iter_mut() {
        match op {
            EditOp::Match => {
                q += 1;
                t += 1;
            }
            EditOp::Substitution(l) => {
                *l = target[t as usize];
                q += 1;
                t += 1;
            }
            EditOp::Insertion(len) => q += *len as i32,
            EditOp::Deletion(l) => {
                *l = target[t as usize];
                t += 1;
            }
            EditOp::FrameshiftFwd | EditOp::FrameshiftRev => {}
        }
    }
}

/// Anchored extension of one chained anchor; returns the assembled HSP or `None`
/// when the anchor clips away or the memory budget is exhausted.
pub fn anchored_hsp(
    query: &[Letter],
    query_cbs: Option<&[i8]>,
    target: &[Letter],
    anchor: &DiagonalSegment,
    frame: u8,
    matrix: &ScoreMatrix,
    config: &ExtensionConfig,
) -> Option<Hsp> {
    let anchor = make_clipped_anchor(
        anchor,
        query,
        query_cbs,
        target,
        config.anchor_window,
        config.anchor_score,
        matrix,
    )?;

    // left: reversed prefixes
    let left_q: Vec<Letter> = query[..anchor.i as usize].iter().rev().copied().collect();
    let left_t: Vec<Letter> = target[..anchor.j as usize].iter().rev().copied().collect();
    let left_cbs: Option<Vec<i8>> = query_cbs.map(|c| c[..anchor.i as usize].iter().rev().copied().collect());
    let left = extend_side(&left_q, left_cbs.as_deref(), &left_t, config, matrix)?;

    // right: suffixes past the anchor
    let right_q = &query[anchor.query_end() as usize..];
    let right_t = &target[anchor.subject_end() as usize..];
    let right_cbs = query_cbs.map(|c| &c[anchor.query_end() as usize..]);
    let right = extend_side(right_q, right_cbs, right_t, config, matrix)?;

    // assemble: reversed left ops, anchor diagonal, right ops
    let q_begin = anchor.i - left.query_len;
    let t_begin = anchor.j - left.target_len;
    let mut ops: Vec<EditOp> = left.ops.iter().rev().copied().collect();
    for n in 0..anchor.len {
        let q = query[(anchor.i + n) as usize];
        let t = target[(anchor.j + n) as usize];
        if q == t {
            ops.push(EditOp::Match);
        } else {
            ops.push(EditOp::Substitution(t));
        }
    }
    ops.extend(right.ops.iter().copied());
    resolve_letters(&mut ops, query, target, q_begin, t_begin);

    let score = left.score + anchor.score + right.score;
    if score <= 0 {
        return None;
    }
    let mut hsp = Hsp::default();
    hsp.score = score;
    hsp.frame = frame;
    hsp.query_range = Interval::new(q_begin, anchor.query_end() + right.query_len);
    hsp.query_source_range = hsp.query_range;
    hsp.subject_range = Interval::new(t_begin, anchor.subject_end() + right.target_len);
    hsp.d_begin = hsp.query_range.begin - hsp.subject_range.begin;
    hsp.d_end = hsp.query_range.end - hsp.subject_range.end + 1;
    hsp.transcript = ops;
    hsp.update_stats_from_transcript();
    hsp.evalue = matrix.evalue(score, query.len(), target.len());
    hsp.bit_score = matrix.bitscore(score);
    Some(hsp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use seqsieve_score::SubstitutionMatrixList;
    use seqsieve_seq::alphabet::encode_seq;

    fn config() -> ExtensionConfig {
        ExtensionConfig {
            anchored_swipe: true,
            ..ExtensionConfig::default()
        }
    }

    #[test]
    fn identity_pair_extends_to_full_length() {
        let m = ScoreMatrix::load(SubstitutionMatrixList::BLOSUM62);
        let q = encode_seq("MKTFFVLLLCTFTVFSAYSRGVFRRD");
        let anchor = DiagonalSegment::new(10, 10, 6, 30);
        let hsp = anchored_hsp(&q, None, &q, &anchor, 0, &m, &config()).expect("alignment");
        assert_eq!(hsp.query_range, Interval::new(0, 26));
        assert_eq!(hsp.subject_range, Interval::new(0, 26));
        assert_eq!(hsp.identities, 26);
    }

    #[test]
    fn gapped_pair_recovers_the_gap() {
        let m = ScoreMatrix::load(SubstitutionMatrixList::BLOSUM62);
        let q = encode_seq("MKTFFVLLCTFTVFSAYSRGVFRRD"); // one L missing
        let t = encode_seq("MKTFFVLLLCTFTVFSAYSRGVFRRD");
        let anchor = DiagonalSegment::new(12, 13, 6, 30);
        let hsp = anchored_hsp(&q, None, &t, &anchor, 0, &m, &config()).expect("alignment");
        let dels = hsp
            .transcript
            .iter()
            .filter(|op| matches!(op, EditOp::Deletion(_)))
            .count();
        assert_eq!(dels, 1);
        assert_eq!(hsp.identities, 25);
    }

    #[test]
    fn unrelated_flanks_are_clipped_away() {
        let m = ScoreMatrix::load(SubstitutionMatrixList::BLOSUM62);
        let core = "MKTFFVLLLCTFTVFS";
        let q = encode_seq(&format!("WWWWWWWW{}WWWWWWWW", core));
        let t = encode_seq(&format!("GGGGGGGG{}GGGGGGGG", core));
        let anchor = DiagonalSegment::new(10, 10, 8, 30);
        let hsp = anchored_hsp(&q, None, &t, &anchor, 0, &m, &config()).expect("alignment");
        assert!(hsp.query_range.begin >= 8);
        assert!(hsp.query_range.end <= 24);
        assert_eq!(hsp.identities, hsp.length);
    }
}
