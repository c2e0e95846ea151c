use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
/// Errors raised by the external clustering engine
pub enum ClusterError {
    #[error("format error in volume list '{file_name}': '{line}'")]
    /// A bucket.tsv line doesn't parse
    BadVolumeList {
        /// the volume list file
        file_name: String,
        /// the offending line
        line: String,
    },
    #[error("OID {oid} out of bounds of the volume list")]
    /// A record referenced an OID outside every volume
    OidOutOfBounds {
        /// the offending OID
        oid: i64,
    },
    #[error(transparent)]
    /// error from the record I/O layer
    Io(#[from] seqsieve_io::IoError),
    #[error(transparent)]
    /// error from the sequence layer
    Sequence(#[from] seqsieve_seq::SequenceError),
    #[error("general I/O error")]
    /// I/O error from the operating system
    Os(#[from] std::io::Error),
}
