//! The sync module deals with synchronization between queue submissions.
//!
//! - [`submit_batch`] provides a utility to chain submissions together with semaphores and submit them all
//!   as one batch. Executing a [`PassGraph`](crate::PassGraph) submits its timeline segments through it.

pub mod submit_batch;
