//! File-based coordination and record I/O shared by the `seqsieve` crates.
//!
//! This crate provides:
//!  - [`FileStack`](crate::FileStack): a newline-delimited stack in an advisory-locked
//!    file, safe to share between processes on one filesystem
//!  - [`AtomicFile`](crate::AtomicFile): a filesystem-backed fetch-add counter with a
//!    barrier ([`await_value`](crate::AtomicFile::await_value)) built on a [`FileStack`]
//!  - [`BlockWriter`](crate::BlockWriter) / [`BlockReader`](crate::BlockReader):
//!    record streams framed as `{u64 count, records}` inside zlib blocks
//!  - [`Record`](crate::Record): little-endian fixed-layout record (de)serialization

mod errors;
mod filestack;
mod atomic_file;
mod block;
mod records;
mod utils;

pub use errors::IoError;
pub use filestack::FileStack;
pub use atomic_file::AtomicFile;
pub use block::{BlockReader, BlockWriter};
pub use records::Record;
pub use utils::out_writer;
