//! Shared job state and the round schedule.

use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Instant;

use seqsieve_io::{AtomicFile, FileStack};

use crate::config::ClusterConfig;
use crate::errors::ClusterError;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// One sensitivity level of the round schedule.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sensitivity {
    Faster,
    Fast,
    Default,
    MoreSensitive,
}

impl Sensitivity {
    /// Seed length in the reduced alphabet.
    pub fn shape_length(&self) -> usize {
        match self {
            Sensitivity::Faster => 14,
            Sensitivity::Fast => 12,
            Sensitivity::Default => 12,
            Sensitivity::MoreSensitive => 10,
        }
    }

    /// Bottom-s sketch size per sequence.
    pub fn sketch_size(&self) -> usize {
        match self {
            Sensitivity::Faster => 12,
            Sensitivity::Fast => 16,
            Sensitivity::Default => 20,
            Sensitivity::MoreSensitive => 30,
        }
    }

    /// Seed complexity cut.
    pub fn seed_cut(&self) -> f64 {
        match self {
            Sensitivity::Faster => 0.8,
            Sensitivity::Fast => 0.8,
            Sensitivity::Default => 0.9,
            Sensitivity::MoreSensitive => 1.0,
        }
    }
}

/// Derives the round schedule from the target identity: coarse rounds first, finer
/// rounds on the survivors.
pub fn cluster_steps(approx_min_id: f64) -> Vec<Sensitivity> {
    if approx_min_id >= 90.0 {
        vec![Sensitivity::Faster, Sensitivity::Fast]
    } else if approx_min_id >= 50.0 {
        vec![Sensitivity::Fast, Sensitivity::Default]
    } else {
        vec![Sensitivity::Default, Sensitivity::MoreSensitive]
    }
}

/// Shared state of one clustering job.
///
/// Owns the working directory layout
/// `<tmpdir>/seqsieve-tmp-<version>/round<r>/...`, the worker id and the shared log.
pub struct Job {
    base_dir: PathBuf,
    worker_id: i64,
    round: Mutex<usize>,
    round_count: usize,
    log_file: Mutex<FileStack>,
    start: Instant,
    pub max_oid: i64,
    pub volumes: usize,
}

impl Job {
    pub fn create(config: &ClusterConfig, max_oid: i64, volumes: usize) -> Result<Job, ClusterError> {
        let root = config
            .parallel_tmpdir
            .join(format!("seqsieve-tmp-{}", VERSION));
        fs::create_dir_all(&root)?;
        fs::create_dir_all(root.join("round0"))?;
        let log_file = FileStack::new(root.join("seqsieve_job.log"))?;
        let mut worker_id = AtomicFile::new(root.join("worker_id"))?;
        let worker_id = worker_id.fetch_add(1)?;
        Ok(Job {
            base_dir: root,
            worker_id,
            round: Mutex::new(0),
            round_count: 1,
            log_file: Mutex::new(log_file),
            start: Instant::now(),
            max_oid,
            volumes,
        })
    }

    pub fn worker_id(&self) -> i64 {
        self.worker_id
    }

    pub fn root_dir(&self) -> PathBuf {
        self.base_dir.clone()
    }

    /// Directory of the current round.
    pub fn base_dir(&self) -> PathBuf {
        self.round_dir(*self.round.lock().unwrap())
    }

    pub fn round_dir(&self, round: usize) -> PathBuf {
        self.base_dir.join(format!("round{}", round))
    }

    pub fn round(&self) -> usize {
        *self.round.lock().unwrap()
    }

    pub fn next_round(&self) -> Result<(), ClusterError> {
        let mut round = self.round.lock().unwrap();
        *round += 1;
        fs::create_dir_all(self.round_dir(*round))?;
        Ok(())
    }

    pub fn set_round_count(&mut self, n: usize) {
        self.round_count = n;
    }

    pub fn last_round(&self) -> bool {
        self.round() == self.round_count - 1
    }

    /// Logs a worker-stamped progress line to stderr and the shared job log.
    pub fn log(&self, message: &str) -> Result<(), ClusterError> {
        let line = format!(
            "[{}, {}] {}",
            self.worker_id,
            self.start.elapsed().as_secs(),
            message
        );
        log::info!("{}", line);
        self.log_file.lock().unwrap().push(&line)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_gets_finer_with_lower_identity() {
        let coarse = cluster_steps(95.0);
        let fine = cluster_steps(30.0);
        assert_eq!(coarse[0], Sensitivity::Faster);
        assert_eq!(fine.last(), Some(&Sensitivity::MoreSensitive));
        assert!(coarse[0].sketch_size() < fine.last().unwrap().sketch_size());
    }

    #[test]
    fn workers_get_distinct_ids() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClusterConfig {
            parallel_tmpdir: dir.path().to_path_buf(),
            ..ClusterConfig::default()
        };
        let a = Job::create(&config, 10, 1).unwrap();
        let b = Job::create(&config, 10, 1).unwrap();
        assert_ne!(a.worker_id(), b.worker_id());
        a.log("hello").unwrap();
    }
}
