//! Per-target and cross-match culling.

use crate::config::ExtensionConfig;
use crate::hsp::Hsp;
use crate::target::{Match, Target};

/// Score gate of the top-percent rule: scores below `best · (1 - top/100)` lose.
fn top_percent_cutoff(best_score: i32, toppercent: f64) -> i32 {
    ((1.0 - toppercent / 100.0) * best_score as f64) as i32
}

/// Sorts targets and, unless `sort_only`, drops everything outside the configured
/// top-percent gate or beyond the target cap.
pub fn cull_targets(targets: &mut Vec<Target>, sort_only: bool, config: &ExtensionConfig) {
    targets.sort_by(Target::cmp_evalue);
    if sort_only {
        return;
    }
    if config.toppercent < 100.0 {
        let best = targets.first().map(|t| t.filter_score).unwrap_or(0);
        let cutoff = top_percent_cutoff(best, config.toppercent).max(1);
        targets.retain(|t| t.filter_score >= cutoff);
    } else {
        targets.truncate(config.max_target_seqs.max(0) as usize);
    }
}

/// Merges freshly aligned targets into the per-query accumulator.
///
/// With first-round culling on, a new target must beat the accumulator's top-percent
/// gate to enter. Returns whether any new target was accepted.
pub fn append_targets(
    accumulator: &mut Vec<Target>,
    new_targets: Vec<Target>,
    with_culling: bool,
    config: &ExtensionConfig,
) -> bool {
    if new_targets.is_empty() {
        return false;
    }
    let best = accumulator
        .iter()
        .map(|t| t.filter_score)
        .max()
        .unwrap_or(0);
    let cutoff = if with_culling && config.toppercent < 100.0 {
        top_percent_cutoff(best, config.toppercent)
    } else {
        0
    };
    let mut any = false;
    for t in new_targets {
        if !with_culling || t.filter_score >= cutoff {
            accumulator.push(t);
            any = true;
        }
    }
    any
}

/// Removes HSPs failing the identity/coverage filters; matches left without HSPs are
/// dropped. `target_len` resolves a block-local target id to its sequence length.
pub fn apply_filters(
    matches: &mut Vec<Match>,
    query_len: i32,
    query_self_aln_score: f64,
    target_len: impl Fn(u32) -> i32,
    config: &ExtensionConfig,
) {
    if !config.have_filters() {
        return;
    }
    for m in matches.iter_mut() {
        let target_len = target_len(m.target_block_id);
        m.hsp.retain(|h| hsp_passes(h, query_len, target_len, query_self_aln_score, config));
        if let Some(first) = m.hsp.first() {
            m.filter_score = first.score;
            m.filter_evalue = first.evalue;
        } else {
            m.filter_evalue = f64::MAX;
        }
    }
    matches.retain(|m| !m.hsp.is_empty());
}

fn hsp_passes(
    hsp: &Hsp,
    query_len: i32,
    target_len: i32,
    query_self_aln_score: f64,
    config: &ExtensionConfig,
) -> bool {
    if config.min_id > 0.0 && hsp.id_percent() < config.min_id {
        return false;
    }
    if config.approx_min_id > 0.0 {
        let approx = if query_self_aln_score > 0.0 {
            (hsp.score as f64 / query_self_aln_score * 100.0).min(100.0)
        } else {
            hsp.approx_id_percent(query_len, target_len)
        };
        if approx < config.approx_min_id {
            return false;
        }
    }
    if config.query_cover > 0.0 && hsp.query_cover_percent(query_len) < config.query_cover {
        return false;
    }
    if config.subject_cover > 0.0 && hsp.subject_cover_percent(target_len) < config.subject_cover {
        return false;
    }
    if config.query_or_target_cover > 0.0
        && hsp.query_cover_percent(query_len) < config.query_or_target_cover
        && hsp.subject_cover_percent(target_len) < config.query_or_target_cover
    {
        return false;
    }
    true
}

/// Final cross-match culling: sort, apply the E-value cutoff, then either the
/// top-percent gate or the top-K cap. Ties break deterministically on the block id.
pub fn cull_matches(matches: &mut Vec<Match>, config: &ExtensionConfig) {
    matches.sort_by(Match::cmp);
    matches.retain(|m| m.filter_evalue <= config.max_evalue);
    if config.toppercent < 100.0 {
        let best = matches.first().map(|m| m.filter_score).unwrap_or(0);
        let cutoff = top_percent_cutoff(best, config.toppercent);
        matches.retain(|m| m.filter_score >= cutoff);
    } else {
        matches.truncate(config.max_target_seqs.max(0) as usize);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interval::Interval;

    fn mk_match(block_id: u32, score: i32, evalue: f64) -> Match {
        let mut h = Hsp::default();
        h.score = score;
        h.evalue = evalue;
        h.bit_score = score as f64;
        h.query_range = Interval::new(0, 50);
        h.query_source_range = h.query_range;
        h.subject_range = Interval::new(0, 50);
        Match {
            target_block_id: block_id,
            filter_score: score,
            filter_evalue: evalue,
            ungapped_score: 0,
            hsp: vec![h],
            matrix: None,
        }
    }

    #[test]
    fn top_percent_keeps_matches_near_the_best() {
        // bit scores 200, 180, 100 with --top 10: only the first two survive
        let mut matches = vec![
            mk_match(0, 200, 1e-20),
            mk_match(1, 180, 1e-18),
            mk_match(2, 100, 1e-10),
        ];
        let config = ExtensionConfig {
            toppercent: 10.0,
            max_evalue: 10.0,
            ..ExtensionConfig::default()
        };
        cull_matches(&mut matches, &config);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].target_block_id, 0);
        assert_eq!(matches[1].target_block_id, 1);
    }

    #[test]
    fn top_k_cap_truncates() {
        let mut matches = vec![
            mk_match(0, 200, 1e-20),
            mk_match(1, 180, 1e-18),
            mk_match(2, 100, 1e-10),
        ];
        let config = ExtensionConfig {
            max_target_seqs: 2,
            max_evalue: 10.0,
            ..ExtensionConfig::default()
        };
        cull_matches(&mut matches, &config);
        assert_eq!(matches.len(), 2);
    }

    #[test]
    fn evalue_cutoff_applies_before_caps() {
        let mut matches = vec![mk_match(0, 20, 5.0), mk_match(1, 10, 50.0)];
        let config = ExtensionConfig {
            max_evalue: 10.0,
            ..ExtensionConfig::default()
        };
        cull_matches(&mut matches, &config);
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn ties_break_on_block_id() {
        let mut matches = vec![mk_match(5, 100, 1e-10), mk_match(2, 100, 1e-10)];
        let config = ExtensionConfig::default();
        cull_matches(&mut matches, &config);
        assert_eq!(matches[0].target_block_id, 2);
    }

    #[test]
    fn coverage_filter_drops_short_hsps() {
        let mut matches = vec![mk_match(0, 100, 1e-10)];
        matches[0].hsp[0].subject_range = Interval::new(0, 10);
        let config = ExtensionConfig {
            subject_cover: 80.0,
            ..ExtensionConfig::default()
        };
        apply_filters(&mut matches, 50, 0.0, |_| 50, &config);
        assert!(matches.is_empty());
    }
}
