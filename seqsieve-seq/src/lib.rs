//! Internal alphabet, sequence arenas and seed iterators for the `seqsieve` crates.
//!
//! This crate provides:
//!  - the internal [`Letter`](crate::alphabet::Letter) alphabet: 20 standard residues,
//!    an ambiguity code, a stop code, a hard-mask code and the DELIMITER sentinel that
//!    brackets every stored sequence
//!  - [`SequenceSet`](crate::SequenceSet): an append-only arena of encoded sequences
//!    addressed by cumulative offsets
//!  - [`Block`](crate::Block): a loaded database subset mapping block-local ids to
//!    database-global OIds
//!  - [`FlatArray`](crate::FlatArray): contiguous per-group storage for seed hits
//!  - FASTA reading/writing, the reduced alphabet and the sketch/minimizer seed
//!    iterators used by the clustering engine

pub mod alphabet;
mod sequence_set;
mod block;
mod flat_array;
mod fasta;
mod reduction;
mod sketch;
mod complexity;
mod errors;

pub use sequence_set::SequenceSet;
pub use block::Block;
pub use flat_array::FlatArray;
pub use fasta::{read_fasta, write_fasta_record, FastaRecord};
pub use reduction::Reduction;
pub use sketch::{MinimizerIterator, Seed, SketchIterator};
pub use complexity::{is_fully_masked, seed_is_complex};
pub use errors::SequenceError;
