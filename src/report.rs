//! Tabular match report.
//!
//! One line per HSP in the classic 12-column tabular layout:
//! query, target, identity%, length, mismatches, gap openings, query start/end,
//! target start/end, E-value, bit score. Coordinates are 1-based inclusive.

use std::io::Write;

use seqsieve_align::Match;
use seqsieve_seq::Block;

pub fn write_matches<W: Write>(
    out: &mut W,
    query_title: &str,
    matches: &[Match],
    block: &Block,
) -> std::io::Result<()> {
    for m in matches {
        let target_title = block.title(m.target_block_id);
        for hsp in &m.hsp {
            writeln!(
                out,
                "{}\t{}\t{:.1}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{:.1e}\t{:.1}",
                query_title,
                target_title,
                hsp.id_percent(),
                hsp.length,
                hsp.mismatches,
                hsp.gap_openings,
                hsp.query_range.begin + 1,
                hsp.query_range.end,
                hsp.subject_range.begin + 1,
                hsp.subject_range.end,
                hsp.evalue,
                hsp.bit_score
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use seqsieve_align::{Hsp, Interval};
    use seqsieve_seq::alphabet::encode_seq;

    #[test]
    fn one_line_per_hsp() {
        let mut block = Block::new();
        block.push("target1", &encode_seq("MKTF"), 0);
        block.finish();
        let mut hsp = Hsp::default();
        hsp.length = 4;
        hsp.identities = 4;
        hsp.query_range = Interval::new(0, 4);
        hsp.subject_range = Interval::new(0, 4);
        hsp.evalue = 1e-8;
        hsp.bit_score = 20.0;
        let matches = vec![Match {
            target_block_id: 0,
            filter_score: 20,
            filter_evalue: 1e-8,
            ungapped_score: 0,
            hsp: vec![hsp],
            matrix: None,
        }];
        let mut buf = Vec::new();
        write_matches(&mut buf, "query1", &matches, &block).unwrap();
        let line = String::from_utf8(buf).unwrap();
        assert!(line.starts_with("query1\ttarget1\t100.0\t4\t0\t0\t1\t4\t1\t4"));
    }
}
