use std::path::PathBuf;

/// Immutable configuration of one clustering run.
#[derive(Clone, Debug)]
pub struct ClusterConfig {
    /// working directory shared by all workers
    pub parallel_tmpdir: PathBuf,
    /// final member→representative table
    pub output_file: PathBuf,
    pub threads: usize,
    /// uni-directional coverage threshold (percent of the member)
    pub member_cover: f64,
    /// bi-directional coverage; present switches to mutual mode
    pub mutual_cover: Option<f64>,
    /// approximate identity threshold (percent)
    pub approx_min_id: f64,
    /// in-memory bucket size bound of the external sort, bytes
    pub memory_limit: i64,
    /// expected letters per alignment chunk
    pub linclust_chunk_size: i64,
    /// bottom-s sketch size; 0 derives it from the sensitivity
    pub sketch_size: usize,
    /// seed complexity cut; 0 derives it from the sensitivity
    pub seed_cut: f64,
    /// minimum member/rep length ratio of the mutual-coverage pair sweep
    pub min_length_ratio: f64,
}

impl ClusterConfig {
    /// Derives the mutual-mode length ratio from the coverage threshold.
    pub fn with_mutual_cover(mut self, cover: f64, coarse_round: bool) -> ClusterConfig {
        self.mutual_cover = Some(cover);
        self.min_length_ratio = if coarse_round {
            (cover / 100.0 + 0.05).min(1.0)
        } else {
            cover / 100.0 - 0.05
        };
        self
    }
}

impl Default for ClusterConfig {
    fn default() -> ClusterConfig {
        ClusterConfig {
            parallel_tmpdir: std::env::temp_dir(),
            output_file: PathBuf::from("clusters.tsv"),
            threads: 1,
            member_cover: 80.0,
            mutual_cover: None,
            approx_min_id: 0.0,
            memory_limit: 1 << 30,
            linclust_chunk_size: 1 << 30,
            sketch_size: 0,
            seed_cut: 0.0,
            min_length_ratio: 0.0,
        }
    }
}
