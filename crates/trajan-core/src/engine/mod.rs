//! # Engine Module
//!
//! The stateful half of the library: it owns the project graph, decides what is
//! stale, and drives the parallel per-frame computation that refreshes it.
//!
//! ## Overview
//!
//! A [`project::Project`] holds streams, data sources and results in slot-map
//! arenas. Edits diff old against new content and invalidate only the results
//! downstream of a real change. [`project::Project::build`] then collects the
//! outstanding results, groups the data sources they need by stream, and hands
//! each stream to the [`scheduler`], one stream at a time. The scheduler fans
//! frames out over a [`pool::WorkerPool`], merges per-worker partial results,
//! and returns natural-unit series which the project converts, reduces with
//! [`statistics`] and cross-correlates with [`correlation`].
//!
//! ## Architecture
//!
//! - **Dependency Graph** ([`project`]) - Arenas, edits, invalidation cascade and the build driver
//! - **Scheduling** ([`scheduler`]) - Averaging and measurement passes over the frames of one stream
//! - **Worker Pool** ([`pool`]) - Dedicated rayon pool plus per-worker scratch arenas
//! - **Reduction** ([`statistics`], [`correlation`]) - Summary statistics and Pearson matrices
//! - **Configuration** ([`config`]) - Thread count, kernel choice and eigensolver bounds
//! - **Build Context** ([`context`]) - Collaborators shared by one build call
//! - **Progress Monitoring** ([`progress`]) - Progress events and cooperative cancellation
//! - **Error Handling** ([`error`]) - Engine-specific error types
//!
//! ## Key Capabilities
//!
//! - **At-most-once computation** of every result until an upstream edit invalidates it
//! - **Localized failures**: a frame or reference that cannot be loaded zero-fills its slots
//! - **Deterministic merges** of per-worker residue slabs after each join
//! - **Cancellation** that never commits a partially computed result

pub mod config;
pub mod context;
pub mod correlation;
pub mod error;
pub mod pool;
pub mod progress;
pub mod project;
pub mod scheduler;
pub mod statistics;

#[cfg(test)]
pub(crate) mod test_support;
