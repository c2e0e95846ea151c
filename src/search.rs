//! The parallel search driver.
//!
//! Queries fan out over the thread pool; every worker loads the query's seed hits,
//! runs the extension pipeline and renders its report lines into a buffer. Buffers
//! flow through a reorder queue keyed on the query ordinal, so the output stream
//! preserves input order no matter which worker finished first, and a query's record
//! is committed whole or not at all.

use std::io::Write;
use std::sync::{Arc, Mutex};

use seqsieve_align::extend::{extend, QueryContext};
use seqsieve_align::load_hits::load_hits;
use seqsieve_align::{ExtensionConfig, HspValues, Statistics};
use seqsieve_score::ScoreMatrix;
use seqsieve_seq::{Block, FastaRecord};
use seqsieve_util::{Priority, ReorderQueue, ThreadPool};

use crate::seeding::SeedIndex;

/// Searches every query against the block and writes the tabular report in input
/// order. Returns the merged pipeline statistics.
pub fn run_search(
    queries: Vec<FastaRecord>,
    block: Arc<Block>,
    matrix: Arc<ScoreMatrix>,
    config: Arc<ExtensionConfig>,
    seed_len: usize,
    threads: usize,
    out: Box<dyn Write + Send>,
) -> Statistics {
    let index = Arc::new(SeedIndex::build(&block, seed_len));
    let queries = Arc::new(queries);
    let out = Arc::new(Mutex::new(out));
    let sink_out = out.clone();
    let reorder: Arc<ReorderQueue<Vec<u8>>> = Arc::new(ReorderQueue::new(
        0,
        Box::new(move |buffer: Vec<u8>| {
            let mut out = sink_out.lock().unwrap();
            out.write_all(&buffer).expect("writing the report failed");
        }),
    ));
    let stats = Arc::new(Mutex::new(Statistics::default()));

    let pool = ThreadPool::new();
    let set = pool.task_set(Priority::Default);
    for query_id in 0..queries.len() {
        let queries = queries.clone();
        let block = block.clone();
        let matrix = matrix.clone();
        let config = config.clone();
        let index = index.clone();
        let reorder = reorder.clone();
        let stats = stats.clone();
        set.enqueue(move || {
            let record = &queries[query_id];
            let mut stat = Statistics::default();
            let mut raw = index.hits(query_id as u32, &record.seq, &block, &matrix);
            let list = load_hits(&mut raw, block.seqs(), config.contexts);
            let ctx = QueryContext::new(query_id as u32, vec![&record.seq], &matrix, &config);
            let matches = extend(
                &ctx,
                &block,
                list,
                &matrix,
                &config,
                HspValues::TRANSCRIPT,
                &mut stat,
            );
            let mut buffer = Vec::new();
            crate::report::write_matches(&mut buffer, record.accession(), &matches, &block)
                .expect("rendering the report failed");
            reorder.push(query_id as u32, buffer);
            stats.lock().unwrap().add(&stat);
        });
    }
    pool.run(threads.max(1), &set);
    set.run();
    pool.join();
    out.lock().unwrap().flush().expect("flushing the report failed");
    let result = *stats.lock().unwrap();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use seqsieve_score::SubstitutionMatrixList;
    use seqsieve_seq::alphabet::encode_seq;

    fn block_of(seqs: &[(&str, &str)]) -> Block {
        let mut block = Block::new();
        for (i, (title, seq)) in seqs.iter().enumerate() {
            block.push(title, &encode_seq(seq), i as i64);
        }
        block.finish();
        block
    }

    #[test]
    fn output_preserves_query_order() {
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
            FastaRecord { id: "q3".into(), seq: encode_seq("MMMMWWWWMMMM") },
        ];
        let buffer: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
        struct SharedWriter(Arc<Mutex<Vec<u8>>>);
        impl Write for SharedWriter {
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
            4,
            Box::new(SharedWriter(buffer.clone())),
        );
        let text = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2, "q1 and q2 hit, q3 does not: {:?}", lines);
        assert!(lines[0].starts_with("q1\tt1"));
        assert!(lines[1].starts_with("q2\tt2"));
    }
}
