use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
/// Errors raised by the file-based coordination and record I/O layer
pub enum IoError {
    #[error("can't open '{file_name}' for reading or writing")]
    /// The named file can't be opened
    FileNotFound {
        /// name of the missing file
        file_name: String,
    },
    #[error("the record stream in '{file_name}' is truncated or corrupt")]
    /// A record stream ended in the middle of a record or block
    CorruptStream {
        /// file the stream was read from
        file_name: String,
    },
    #[error("'{value}' found in '{file_name}' can't be parsed as an integer")]
    /// A stored counter or record count isn't a valid integer
    BadInteger {
        /// file the value was read from
        file_name: String,
        /// the offending value
        value: String,
    },
    #[error("general I/O error")]
    /// I/O error from the operating system
    Io(#[from] std::io::Error),
}
