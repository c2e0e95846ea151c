//! Seed-and-extend alignment core.
//!
//! The pipeline turns a stream of short seed hits into a culled, scored list of local
//! alignments:
//!
//! seeds → [`load_hits`](crate::load_hits::load_hits) → (optional)
//! [`gapped_filter`](crate::gapped_filter) → [`ungapped`](crate::ungapped) extension →
//! [`chaining`](crate::chaining) → banded/full [`swipe`](crate::swipe) or
//! [`wavefront`](crate::wavefront) alignment → [`Hsp`](crate::Hsp) list →
//! [`culling`](crate::culling) + [`alt_hsp`](crate::alt_hsp) → ranked
//! [`Match`](crate::Match)es.
//!
//! [`extend::extend`](crate::extend::extend) drives the whole state machine for one
//! query; [`global_ranking`](crate::global_ranking) is the optional two-pass front-end
//! for databases that do not fit in memory.

pub mod config;
mod interval;
mod diag;
mod hsp;
mod stats;
pub mod ungapped;
pub mod chaining;
pub mod gapped_filter;
mod lanes;
pub mod banded;
pub mod swipe;
pub mod wavefront;
pub mod load_hits;
mod target;
pub mod culling;
pub mod extend;
pub mod alt_hsp;
pub mod global_ranking;
pub mod kmer_filter;

pub use config::{ExtensionConfig, ExtensionMode};
pub use interval::Interval;
pub use diag::{ApproxHsp, DiagonalSegment};
pub use hsp::{EditOp, Hsp, HspValues};
pub use stats::Statistics;
pub use load_hits::RawHit;
pub use target::{Match, SeedHit, SeedHitList, Target, TargetScore, WorkTarget};
pub use wavefront::{Heuristic, Penalties, WfaAligner, WfaStatus};
