//! Multi-file logical tables.

use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use seqsieve_io::{BlockReader, FileStack};
use seqsieve_seq::{read_fasta, FastaRecord};

use crate::errors::ClusterError;

/// Reads the FASTA records of one database volume.
///
/// Round-0 input volumes are plain FASTA files; the representative volumes written
/// between rounds are block-compressed.
pub(crate) fn read_volume_records(path: &Path, compressed: bool) -> Result<Vec<FastaRecord>, ClusterError> {
    if compressed {
        let mut reader = BlockReader::open(path)?;
        let raw = reader.read_raw()?;
        Ok(read_fasta(BufReader::new(&raw[..]))?)
    } else {
        let file = fs::File::open(path).map_err(|_| {
            ClusterError::Io(seqsieve_io::IoError::FileNotFound {
                file_name: path.display().to_string(),
            })
        })?;
        Ok(read_fasta(BufReader::new(file))?)
    }
}

/// One file of a multi-file logical table, with its OId range.
#[derive(Clone, Debug)]
pub struct Volume {
    pub path: PathBuf,
    pub oid_begin: i64,
    pub oid_end: i64,
    pub record_count: i64,
}

/// A sorted list of non-overlapping volumes, parsed from a `bucket.tsv` file whose
/// lines are `path\trecord_count[\toid_begin\toid_end]`. Missing ranges are assigned
/// densely in file order.
pub struct VolumedFile {
    list_file: PathBuf,
    volumes: Vec<Volume>,
    records: i64,
    max_oid: i64,
}

impl VolumedFile {
    pub fn open<P: AsRef<Path>>(list_file: P) -> Result<VolumedFile, ClusterError> {
        let mut stack = FileStack::new(list_file.as_ref())?;
        let mut volumes = Vec::new();
        let mut oid = 0i64;
        let mut records = 0i64;
        let mut max_oid = 0i64;
        for line in stack.lines()? {
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 2 {
                return Err(ClusterError::BadVolumeList {
                    file_name: list_file.as_ref().display().to_string(),
                    line,
                });
            }
            let record_count: i64 = fields[1].parse().map_err(|_| ClusterError::BadVolumeList {
                file_name: list_file.as_ref().display().to_string(),
                line: line.clone(),
            })?;
            let (oid_begin, oid_end) = if fields.len() >= 4 {
                let b: i64 = fields[2].parse().map_err(|_| ClusterError::BadVolumeList {
                    file_name: list_file.as_ref().display().to_string(),
                    line: line.clone(),
                })?;
                let e: i64 = fields[3].parse().map_err(|_| ClusterError::BadVolumeList {
                    file_name: list_file.as_ref().display().to_string(),
                    line: line.clone(),
                })?;
                (b, e)
            } else {
                (oid, oid + record_count)
            };
            volumes.push(Volume {
                path: PathBuf::from(fields[0]),
                oid_begin,
                oid_end,
                record_count,
            });
            oid = oid_end;
            records += record_count;
            max_oid = max_oid.max(oid_end - 1);
        }
        volumes.sort_by_key(|v| v.oid_begin);
        Ok(VolumedFile {
            list_file: list_file.as_ref().to_path_buf(),
            volumes,
            records,
            max_oid,
        })
    }

    pub fn volumes(&self) -> &[Volume] {
        &self.volumes
    }

    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }

    /// Total records across all volumes (the sparse count for later rounds).
    pub fn records(&self) -> i64 {
        self.records
    }

    pub fn max_oid(&self) -> i64 {
        self.max_oid
    }

    pub fn list_file(&self) -> &Path {
        &self.list_file
    }

    /// Volumes intersecting the OId range `[oid_begin, oid_end)`.
    pub fn find(&self, oid_begin: i64, oid_end: i64) -> Result<&[Volume], ClusterError> {
        let start = self.volumes.partition_point(|v| v.oid_end <= oid_begin);
        if start >= self.volumes.len() {
            return Err(ClusterError::OidOutOfBounds { oid: oid_begin });
        }
        let mut end = start + 1;
        while end < self.volumes.len() && self.volumes[end].oid_begin < oid_end {
            end += 1;
        }
        Ok(&self.volumes[start..end])
    }

    /// Removes every volume file, the list file and its directory.
    pub fn remove(&self) -> Result<(), ClusterError> {
        for v in &self.volumes {
            let _ = fs::remove_file(&v.path);
        }
        let _ = fs::remove_file(&self.list_file);
        if let Some(dir) = self.list_file.parent() {
            let _ = fs::remove_dir(dir);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_ranges_are_assigned_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("bucket.tsv");
        let mut stack = FileStack::new(&list).unwrap();
        stack.push("a\t10").unwrap();
        stack.push("b\t5").unwrap();
        let v = VolumedFile::open(&list).unwrap();
        assert_eq!(v.records(), 15);
        assert_eq!(v.max_oid(), 14);
        assert_eq!(v.volumes()[1].oid_begin, 10);
        let found = v.find(12, 13).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].oid_begin, 10);
    }

    #[test]
    fn explicit_ranges_survive() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("bucket.tsv");
        let mut stack = FileStack::new(&list).unwrap();
        stack.push("a\t2\t100\t200").unwrap();
        let v = VolumedFile::open(&list).unwrap();
        assert_eq!(v.max_oid(), 199);
        assert_eq!(v.records(), 2);
        assert!(v.find(250, 260).is_err());
    }
}
