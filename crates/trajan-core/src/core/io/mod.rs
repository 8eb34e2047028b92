//! Reading trajectory frames and writing finished results.
//!
//! Frame sources sit behind the [`traits::FrameLoader`] trait so the engine
//! never depends on a file format; [`pdb::PdbFrameLoader`] is the provided
//! implementation. [`table`] writes result series, statistics and correlation
//! matrices as CSV.

pub mod pdb;
pub mod table;
pub mod traits;
