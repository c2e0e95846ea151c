//! seqsieve — protein sequence similarity search and clustering.
//!
//! The workspace splits into the alignment core ([`seqsieve_align`]), the
//! external-memory clustering engine ([`seqsieve_cluster`]) and their supporting
//! crates. This crate wires them into the command-line tool: FASTA loading, seed
//! indexing, the parallel search driver with input-ordered output, and the tabular
//! report writer.

pub mod config;
pub mod seeding;
pub mod search;
pub mod report;
