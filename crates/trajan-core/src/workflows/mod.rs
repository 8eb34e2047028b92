//! # Workflows Module
//!
//! High-level entry points that tie the [`engine`](crate::engine) and
//! [`core`](crate::core) layers together.
//!
//! ## Overview
//!
//! A workflow takes a fully described [`Project`](crate::engine::project::Project)
//! plus its runtime collaborators (frame loader, script host, progress sink,
//! cancellation token), sets up the worker pool from the configuration, and runs
//! the incremental build. Callers only need to read the refreshed results back.
//!
//! ## Architecture
//!
//! - **Analysis Workflow** ([`analyze`]) - One-call build of every outstanding result

pub mod analyze;
