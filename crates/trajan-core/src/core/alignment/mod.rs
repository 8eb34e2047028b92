//! Rigid-body superposition of coordinate sets.
//!
//! The Kabsch fit is driven by a cyclic Jacobi eigensolver over `RᵗR`. The
//! per-atom loops live behind [`kernel::AlignmentKernel`] with a portable and an
//! SSE2 implementation; one is picked at engine start-up.

pub mod jacobi;
pub mod kernel;
#[cfg(target_arch = "x86_64")]
pub mod simd;
pub mod superpose;
