//! # Core Module
//!
//! Stateless building blocks of the trajectory engine: the data model, the
//! numeric kernels and the per-frame metric evaluators.
//!
//! ## Overview
//!
//! Nothing in this layer knows about scheduling, caching or threads. Every
//! function takes the frames and masks it needs by reference and returns plain
//! values, which keeps the kernels independently testable and lets the
//! [`engine`](crate::engine) decide how work is spread across workers.
//!
//! ## Architecture
//!
//! - **Data Model** ([`models`]) - Atoms, frames, streams, data sources and results
//! - **Superposition** ([`alignment`]) - Kabsch fit driven by a Jacobi eigensolver, with scalar and SIMD kernels
//! - **Metrics** ([`metrics`]) - One evaluator per data source kind (geometry, RMSD/RMSF, surface, scripts)
//! - **Atom Selection** ([`selection`]) - Parser and evaluator of the selection language
//! - **File I/O** ([`io`]) - Frame loading and CSV export
//! - **Utilities** ([`utils`]) - Geometry helpers and residue/atom naming tables

pub mod alignment;
pub mod io;
pub mod metrics;
pub mod models;
pub mod selection;
pub mod utils;
