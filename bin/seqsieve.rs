use std::env;
use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use seqsieve::config::{ClusterArgs, SearchArgs};
use seqsieve::search::run_search;
use seqsieve_align::ExtensionConfig;
use seqsieve_io::{out_writer, FileStack};
use seqsieve_score::{ScoreMatrix, SubstitutionMatrixList};
use seqsieve_seq::{read_fasta, Block};

#[derive(Parser, Debug)]
#[clap(name = "seqsieve")]
#[clap(about = "Protein sequence similarity search and clustering.", long_about = None)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search protein queries against a protein database
    Blastp(SearchArgs),
    /// Cluster a database into groups of mutually similar sequences
    Cluster(ClusterArgs),
    /// Cluster with the coarse linear-time settings only
    Linclust(ClusterArgs),
    /// Cluster down to low identity with the full round schedule
    Deepclust(ClusterArgs),
}

fn load_block(path: &Path) -> Result<Block> {
    let file = fs::File::open(path).with_context(|| format!("can't open {}", path.display()))?;
    let records = read_fasta(BufReader::new(file))?;
    let mut block = Block::new();
    for (i, r) in records.iter().enumerate() {
        block.push(&r.id, &r.seq, i as i64);
    }
    block.finish();
    Ok(block)
}

fn run_blastp(args: &SearchArgs) -> Result<()> {
    let start = Instant::now();
    let config: ExtensionConfig = args.extension_config();
    let queries = {
        let file = fs::File::open(&args.query)
            .with_context(|| format!("can't open {}", args.query.display()))?;
        read_fasta(BufReader::new(file))?
    };
    let block = load_block(&args.db)?;
    let mut matrix = ScoreMatrix::load(SubstitutionMatrixList::BLOSUM62);
    matrix.set_db_letters(block.letters() as u64);
    info!(
        "Searching {} queries against {} sequences ({} letters)",
        queries.len(),
        block.len(),
        block.letters()
    );
    let query_count = queries.len();
    let stats = run_search(
        queries,
        Arc::new(block),
        Arc::new(matrix),
        Arc::new(config),
        args.seed_len,
        args.threads,
        out_writer(&args.out, false),
    );
    info!(
        "{} queries aligned in {:?} ({} extensions)",
        query_count,
        start.elapsed(),
        stats.extensions_computed
    );
    Ok(())
}

/// Wraps a bare FASTA database into a single-volume list the cluster engine reads.
fn volume_list_for(db: &Path, tmpdir: &Path) -> Result<PathBuf> {
    if db.extension().map(|e| e == "tsv").unwrap_or(false) {
        return Ok(db.to_path_buf());
    }
    let file = fs::File::open(db).with_context(|| format!("can't open {}", db.display()))?;
    let records = read_fasta(BufReader::new(file))?;
    let dir = tmpdir.join("seqsieve-db");
    fs::create_dir_all(&dir)?;
    let list = dir.join("bucket.tsv");
    let canonical = db
        .canonicalize()
        .with_context(|| format!("can't resolve {}", db.display()))?;
    let mut stack = FileStack::new(&list)?;
    if stack.lines()?.is_empty() {
        stack.push(&format!("{}\t{}", canonical.display(), records.len()))?;
    }
    Ok(list)
}

fn run_cluster(args: &ClusterArgs, default_approx_id: Option<f64>) -> Result<()> {
    let start = Instant::now();
    let mut config = args.cluster_config();
    if let Some(id) = default_approx_id {
        if config.approx_min_id == 0.0 {
            config.approx_min_id = id;
        }
    }
    let list = volume_list_for(&args.db, &config.parallel_tmpdir)?;
    seqsieve_cluster::run(&config, &list)?;
    info!("Clustering finished in {:?}", start.elapsed());
    Ok(())
}

fn is_user_error(e: &anyhow::Error) -> bool {
    e.to_string().starts_with("can't open") || e.to_string().starts_with("can't resolve")
}

pub fn main() {
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info")
    }
    env_logger::init();
    let cli = Cli::parse();

    let result = match &cli.command {
        Command::Blastp(args) => run_blastp(args),
        Command::Cluster(args) => run_cluster(args, None),
        // the linear-stage-only mode targets high identity by default
        Command::Linclust(args) => run_cluster(args, Some(90.0)),
        Command::Deepclust(args) => run_cluster(args, None),
    };
    if let Err(e) = result {
        eprintln!("seqsieve: {:#}", e);
        std::process::exit(if is_user_error(&e) { 1 } else { 2 });
    }
}
