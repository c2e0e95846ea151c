//! External-memory clustering engine.
//!
//! A clustering round turns one [`VolumedFile`](crate::VolumedFile) of FASTA volumes
//! into the representatives of the next round:
//!
//! seed table → external radix sort → pair table → chunk table → chunks →
//! chunk alignment → edges → clustering + transitive closure → representatives.
//!
//! All intermediate tables are radix-partitioned multi-file buckets under a shared
//! working directory; workers coordinate through
//! [`AtomicFile`](seqsieve_io::AtomicFile) queues and barriers, which makes the
//! engine re-entrant across processes — crash recovery is a restart.

mod errors;
mod records;
mod volume;
mod file_array;
mod radix;
mod job;
mod config;
mod seed_table;
mod pair_table;
mod chunk;
mod align;
mod cluster;
mod output;

pub use errors::ClusterError;
pub use records::{Assignment, ChunkTableEntry, Edge, PairEntry, PairEntryShort, SeedEntry};
pub use volume::{Volume, VolumedFile};
pub use file_array::{BufferArray, FileArray};
pub use radix::{radix_sort, RadixKey, RADIX_BITS, RADIX_COUNT};
pub use job::{Job, Sensitivity};
pub use config::ClusterConfig;
pub use output::run;
