//! # Trajan Core Library
//!
//! An incremental, multi-threaded engine for molecular-dynamics trajectory analysis.
//!
//! ## Architectural Philosophy
//!
//! The library is designed with a strict three-layer architecture to keep stateless
//! numerics apart from the stateful machinery that schedules and caches them.
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Frame`, `Stream`, `DataSource`,
//!   `AnalysisResult`), the Kabsch/Jacobi superposition kernels, per-frame metric
//!   evaluators, the atom selection language, and I/O (PDB frames, CSV tables).
//!
//! - **[`engine`]: The Logic Core.** The `Project` dependency graph that tracks which
//!   results are stale, the worker pool and scheduler that recompute them frame by
//!   frame, and the statistics and correlation reducers.
//!
//! - **[`workflows`]: The Public API.** One-call entry points that set up the engine
//!   from a configuration and run a build.

pub mod core;
pub mod engine;
pub mod workflows;
