//! # Core Models Module
//!
//! Data structures describing trajectories and the analyses defined on them.
//!
//! ## Key Components
//!
//! - [`atom`] - Per-atom identity and flags (backbone, selection)
//! - [`frame`] - One snapshot: atom table plus original/working/secondary coordinates
//! - [`mask`] - Bitset over the atoms of a frame
//! - [`stream`] - Ordered frame files plus the resident reference frame
//! - [`data_source`] - Metric definitions bound to a stream
//! - [`analysis`] - Results, their per-source bindings (`DsRef`) and statistics
//! - [`ids`] - Arena keys for streams, data sources and results
//!
//! ## Usage
//!
//! ```ignore
//! use trajan::core::models::{atom::Atom, frame::Frame};
//!
//! let atoms = vec![Atom::new(1, "CA", "ALA", 1, 'A')];
//! let frame = Frame::new(atoms, vec![Point3::new(0.0, 0.0, 0.0)]);
//! assert_eq!(frame.residue_count(), 1);
//! ```

pub mod analysis;
pub mod atom;
pub mod data_source;
pub mod frame;
pub mod ids;
pub mod mask;
pub mod stream;
