//! Command-line configuration.

use std::path::PathBuf;

use clap::Args;

use seqsieve_align::{ExtensionConfig, ExtensionMode};
use seqsieve_cluster::ClusterConfig;

/// Flags of the search subcommands.
#[derive(Args, Debug)]
pub struct SearchArgs {
    /// query file in FASTA format
    #[clap(long, short = 'q')]
    pub query: PathBuf,
    /// database file in FASTA format
    #[clap(long, short = 'd')]
    pub db: PathBuf,
    /// output file; stdout when omitted
    #[clap(long, short = 'o', default_value = "")]
    pub out: String,
    /// maximum E-value to report alignments
    #[clap(long, short = 'e', default_value_t = 0.001)]
    pub evalue: f64,
    /// maximum number of target sequences to report per query
    #[clap(long, short = 'k', default_value_t = 25)]
    pub max_target_seqs: i64,
    /// report alignments within this percentage range of the top bit score
    #[clap(long)]
    pub top: Option<f64>,
    /// minimum identity percentage to report an alignment
    #[clap(long, default_value_t = 0.0)]
    pub id: f64,
    /// minimum query cover percentage
    #[clap(long, default_value_t = 0.0)]
    pub query_cover: f64,
    /// minimum subject cover percentage
    #[clap(long, default_value_t = 0.0)]
    pub subject_cover: f64,
    /// maximum HSPs per target sequence; 0 means unlimited
    #[clap(long, default_value_t = 1)]
    pub max_hsps: usize,
    /// sensitivity mode: faster, fast, default, sensitive
    #[clap(long, default_value = "default")]
    pub sensitivity: String,
    /// composition based statistics mode 0..4
    #[clap(long, default_value_t = 1)]
    pub comp_based_stats: u32,
    /// number of CPU threads
    #[clap(long, short = 'p', default_value_t = 1)]
    pub threads: usize,
    /// seed length of the index
    #[clap(long, default_value_t = 6)]
    pub seed_len: usize,
    /// use the anchored wavefront extension path
    #[clap(long, action)]
    pub anchored: bool,
}

impl SearchArgs {
    pub fn extension_config(&self) -> ExtensionConfig {
        let mode = match self.sensitivity.as_str() {
            "faster" | "fast" | "default" => ExtensionMode::BandedFast,
            _ => ExtensionMode::BandedSlow,
        };
        ExtensionConfig {
            mode,
            max_evalue: self.evalue,
            max_target_seqs: self.max_target_seqs,
            toppercent: self.top.unwrap_or(100.0),
            min_id: self.id,
            query_cover: self.query_cover,
            subject_cover: self.subject_cover,
            max_hsps: self.max_hsps,
            comp_based_stats: self.comp_based_stats,
            anchored_swipe: self.anchored,
            ..ExtensionConfig::default()
        }
    }
}

/// Flags of the clustering subcommands.
#[derive(Args, Debug)]
pub struct ClusterArgs {
    /// database volume list (bucket.tsv) or a single FASTA file
    #[clap(long, short = 'd')]
    pub db: PathBuf,
    /// output member-to-representative table
    #[clap(long, short = 'o')]
    pub out: PathBuf,
    /// minimum coverage of the cluster member (percent)
    #[clap(long, default_value_t = 80.0)]
    pub member_cover: f64,
    /// require this coverage of both sequences (percent); switches modes
    #[clap(long)]
    pub mutual_cover: Option<f64>,
    /// approximate minimum identity within a cluster (percent)
    #[clap(long, default_value_t = 0.0)]
    pub approx_id: f64,
    /// number of CPU threads
    #[clap(long, short = 'p', default_value_t = 1)]
    pub threads: usize,
    /// working directory shared by cooperating workers
    #[clap(long)]
    pub parallel_tmpdir: Option<PathBuf>,
    /// in-memory bucket bound of the external sort, bytes
    #[clap(long, default_value_t = 1 << 30)]
    pub memory_limit: i64,
    /// expected letters per alignment chunk
    #[clap(long, default_value_t = 1 << 30)]
    pub chunk_size: i64,
}

impl ClusterArgs {
    pub fn cluster_config(&self) -> ClusterConfig {
        let tmpdir = self
            .parallel_tmpdir
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        let base = ClusterConfig {
            parallel_tmpdir: tmpdir,
            output_file: self.out.clone(),
            threads: self.threads,
            member_cover: self.member_cover,
            approx_min_id: self.approx_id,
            memory_limit: self.memory_limit,
            linclust_chunk_size: self.chunk_size,
            ..ClusterConfig::default()
        };
        match self.mutual_cover {
            Some(c) => base.with_mutual_cover(c, true),
            None => base,
        }
    }
}
