use std::sync::{Arc, Mutex};

use seqsieve::search::run_search;
use seqsieve_align::{EditOp, ExtensionConfig, HspValues, Statistics};
use seqsieve_align::extend::{extend, QueryContext};
use seqsieve_align::load_hits::load_hits;
use seqsieve_score::{ScoreMatrix, SubstitutionMatrixList};
use seqsieve_seq::alphabet::encode_seq;
use seqsieve_seq::{Block, FastaRecord};

fn block_of(seqs: &[(&str, &str)]) -> Block {
    let mut block = Block::new();
    for (i, (title, seq)) in seqs.iter().enumerate() {
        block.push(title, &encode_seq(seq), i as i64);
    }
    block.finish();
    block
}

fn search_one(
    query: &str,
    block: &Block,
    matrix: &ScoreMatrix,
    config: &ExtensionConfig,
) -> Vec<seqsieve_align::Match> {
    let q = encode_seq(query);
    let index = seqsieve::seeding::SeedIndex::build(block, 6);
    let mut raw = index.hits(0, &q, block, matrix);
    let list = load_hits(&mut raw, block.seqs(), config.contexts);
    let ctx = QueryContext::new(0, vec![&q], matrix, config);
    let mut stat = Statistics::default();
    extend(&ctx, block, list, matrix, config, HspValues::TRANSCRIPT, &mut stat)
}

// S1 — identity alignment
#[test]
fn identity_alignment() {
    let s = "MKTFFVLLLCTFTVFS";
    let block = block_of(&[("t", s)]);
    let mut matrix = ScoreMatrix::load(SubstitutionMatrixList::BLOSUM62);
    matrix.set_db_letters(block.letters() as u64);
    let config = ExtensionConfig {
        max_evalue: 1e-3,
        ..ExtensionConfig::default()
    };
    let matches = search_one(s, &block, &matrix, &config);
    assert_eq!(matches.len(), 1);
    let m = &matches[0];
    assert_eq!(m.hsp.len(), 1);
    let h = &m.hsp[0];
    assert_eq!((h.query_range.begin, h.query_range.end), (0, 16));
    assert_eq!(h.query_range, h.subject_range);
    assert_eq!(h.identities, 16);
    assert_eq!(h.transcript, vec![EditOp::Match; 16]);
    assert!(h.evalue <= 1e-7, "evalue {}", h.evalue);
}

// S2 — gapped alignment with a single deletion
#[test]
fn gapped_alignment_with_single_deletion() {
    let query = "MKTFFVLLCTFTVFS"; // 15 aa
    let target = "MKTFFVLLLCTFTVFS"; // 16 aa
    let block = block_of(&[("t", target)]);
    let matrix = ScoreMatrix::load(SubstitutionMatrixList::BLOSUM62);
    let config = ExtensionConfig {
        max_evalue: 1.0,
        ..ExtensionConfig::default()
    };
    let matches = search_one(query, &block, &matrix, &config);
    assert_eq!(matches.len(), 1);
    let h = &matches[0].hsp[0];
    let deletions = h
        .transcript
        .iter()
        .filter(|op| matches!(op, EditOp::Deletion(_)))
        .count();
    assert_eq!(deletions, 1);
    assert_eq!(h.length, 16);
    assert_eq!(h.identities, 15);
}

// S3 — two disjoint HSPs on one target
#[test]
fn two_disjoint_hsps() {
    let query = "MKTFFVLLLCTFTVFSAYSRGVFRRDTHKSEIAHRFKDLGE";
    let spacer = "PGSTNNAPDQSWEKHMYRCVLIPGSTNNAPDQSWEKHMYRCV";
    let target = format!("{}{}{}", query, spacer, query);
    let block = block_of(&[("t", &target)]);
    let matrix = ScoreMatrix::load(SubstitutionMatrixList::BLOSUM62);
    let config = ExtensionConfig {
        max_hsps: 2,
        max_evalue: 1e-3,
        ..ExtensionConfig::default()
    };
    let matches = search_one(query, &block, &matrix, &config);
    assert_eq!(matches.len(), 1);
    let m = &matches[0];
    assert_eq!(m.hsp.len(), 2);
    let (a, b) = (&m.hsp[0], &m.hsp[1]);
    assert!(a.subject_range.intersect(&b.subject_range).is_empty());
    assert_eq!(a.identities, query.len() as i32);
    assert_eq!(b.identities, query.len() as i32);
}

// S4 — top-percent culling keeps matches within 10% of the best bit score
#[test]
fn top_percent_culling() {
    let query = "MKTFFVLLLCTFTVFSAYSRGVFRRDTHKSEIAHRFKDLGEEHFKGLVLIAFSQYLQQCP";
    // near-identical, slightly diverged, and distant targets
    let best = query.to_string();
    let near = query.replace("AYSRGV", "AYSRGI");
    let far: String = format!("{}GDLKFRHAIESKHTDRRFVGRSYAKEVNKIEWESPFDPHT", &query[..20]);
    let block = block_of(&[("best", best.as_str()), ("near", near.as_str()), ("far", far.as_str())]);
    let matrix = ScoreMatrix::load(SubstitutionMatrixList::BLOSUM62);
    let config = ExtensionConfig {
        toppercent: 10.0,
        max_evalue: 10.0,
        ..ExtensionConfig::default()
    };
    let matches = search_one(query, &block, &matrix, &config);
    let names: Vec<u32> = matches.iter().map(|m| m.target_block_id).collect();
    assert!(names.contains(&0));
    assert!(names.contains(&1));
    assert!(!names.contains(&2), "distant target must be culled: {:?}", names);
}

// end-to-end through the driver: order preserved, records committed whole
#[test]
fn driver_reports_in_query_order() {
    let s1 = "MKTFFVLLLCTFTVFSAYSRGVFRRDTHKSEIAHRFKDLGE";
    let s2 = "GDLKFRHAIESKHTDRRFVGRSYAKEVNKIEWESPFDPHTT";
    let block = Arc::new(block_of(&[("t1", s1), ("t2", s2)]));
    let matrix = Arc::new(ScoreMatrix::load(SubstitutionMatrixList::BLOSUM62));
    let config = Arc::new(ExtensionConfig {
        max_evalue: 1e-3,
        ..ExtensionConfig::default()
    });
    let queries = vec![
        FastaRecord { id: "q1".into(), seq: encode_seq(s1) },
        FastaRecord { id: "q2".into(), seq: encode_seq(s2) },
    ];
    let sink: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
    struct SharedWriter(Arc<Mutex<Vec<u8>>>);
    impl std::io::Write for SharedWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
    run_search(
        queries,
        block,
        matrix,
        config,
        6,
        3,
        Box::new(SharedWriter(sink.clone())),
    );
    let text = String::from_utf8(sink.lock().unwrap().clone()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("q1\tt1"));
    assert!(lines[1].starts_with("q2\tt2"));
}
