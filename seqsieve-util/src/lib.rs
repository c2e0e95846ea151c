//! Concurrency primitives and small algorithms shared by the `seqsieve` crates.
//!
//! This crate provides:
//!  - [`ThreadPool`](crate::ThreadPool): a two-priority task pool with bulk-joinable
//!    [`TaskSet`](crate::TaskSet)s and an optional default work range
//!  - [`BoundedQueue`](crate::BoundedQueue) and [`ReorderQueue`](crate::ReorderQueue)
//!    connecting alignment workers to writer threads
//!  - [`Partition`](crate::Partition) to split an index range into near-equal parts
//!  - [`HyperLogLog`](crate::HyperLogLog) cardinality sketches
//!  - [`murmur_mix`](crate::murmur_mix) and [`merge_keys`](crate::merge_keys) used by
//!    the external clustering tables

mod thread_pool;
mod scheduled;
mod queues;
mod partition;
mod hyperloglog;
mod hash;
mod merge;

pub use thread_pool::{ThreadPool, TaskSet, Priority};
pub use scheduled::scheduled_thread_pool;
pub use queues::{BoundedQueue, ReorderQueue};
pub use partition::Partition;
pub use hyperloglog::HyperLogLog;
pub use hash::murmur_mix;
pub use merge::{merge_keys, KeyMerge};
