use displaydoc::Display;
use thiserror::Error;

#[derive(Debug, Error, Display, PartialEq)]
#[non_exhaustive]
/// Errors that may be thrown while loading or using a substitution matrix
pub enum ScoringError {
    /// The file: {file_name} can't be opened for reading
    FileNotFound {
        /// name of the missing file
        file_name: String,
    },
    /// Reading error occurred while loading a substitution matrix
    ReadingError,
    /// The following line of a NCBI matrix file is not formatted correctly: {line}
    IncorrectNcbiFormat {
        /// the incorrectly formatted line that broke the parser
        line: String,
    },
    /// The following entry: {value} can't be parsed as a score; the problematic line was: {line}
    CantParseNcbiEntry {
        /// the incorrectly formatted line
        line: String,
        /// the offending token
        value: String,
    },
}
