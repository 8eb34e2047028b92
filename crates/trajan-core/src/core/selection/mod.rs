//! Atom selection expressions.
//!
//! An expression such as `protein and not within(5, residue LIG)` is parsed
//! once into a [`Selection`] tree and then evaluated against any number of
//! frames, yielding an [`AtomMask`](crate::core::models::mask::AtomMask).
//! Spatial predicates are recomputed on every evaluation from the frame's
//! working coordinates.

pub mod ast;
pub mod eval;
pub mod parser;

pub use ast::{NamePattern, Selection, SelectionVisitor};
pub use parser::{SelectionError, parse};
