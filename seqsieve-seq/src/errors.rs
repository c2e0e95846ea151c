use displaydoc::Display;
use thiserror::Error;

#[derive(Debug, Error, Display)]
#[non_exhaustive]
/// Errors that may be thrown while reading or encoding sequences
pub enum SequenceError {
    /// The file: {file_name} can't be opened for reading
    FileNotFound {
        /// name of the missing file
        file_name: String,
    },
    /// FASTA record without a header line: '{line}'
    MissingHeader {
        /// the first offending line
        line: String,
    },
    /// General I/O error occurred while reading a sequence file
    Io(#[from] std::io::Error),
}
