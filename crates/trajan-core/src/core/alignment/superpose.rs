use super::jacobi::{JacobiError, jacobi};
use super::kernel::AlignmentKernel;
use crate::core::models::mask::AtomMask;
use nalgebra::{Matrix3, Point3, Vector3};
use thiserror::Error;
use tracing::{trace, warn};

/// Value reported by [`rmsd`] when the two coordinate sets cannot be paired.
pub const RMSD_SHAPE_MISMATCH: f64 = -1.0;

const DEGENERATE_EPSILON: f64 = 1e-10;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AlignError {
    #[error("At least two anchor atoms are required, found {found}")]
    TooFewAnchors { found: usize },
    #[error("Coordinate sets differ in size ({moving} vs {target})")]
    ShapeMismatch { moving: usize, target: usize },
    #[error("Anchor atoms are collinear or coincident")]
    Degenerate,
    #[error(transparent)]
    Jacobi(#[from] JacobiError),
}

/// What a call to [`superpose`] did to the moving coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignOutcome {
    /// The optimal proper rotation was applied.
    Aligned,
    /// Fewer than two anchors, or the sets differ in size. Coordinates untouched.
    Skipped,
    /// The anchors do not span a plane. Coordinates untouched.
    Degenerate,
    /// The eigensolver exhausted its sweep budget. Coordinates untouched.
    NotConverged,
}

impl AlignOutcome {
    pub fn is_aligned(self) -> bool {
        self == AlignOutcome::Aligned
    }
}

/// Computes the proper rotation `U` minimizing `Σ |U·movingᵢ − targetᵢ|²` over
/// the anchor atoms of `mask`.
///
/// Both sets are expected to be centered on their anchor centroid already.
/// The eigenbasis of `RᵗR` is completed as `a₃ = a₁ × a₂` and its image as
/// `b₃ = b₁ × b₂`, so the result is always a rotation; when the optimum would
/// be a reflection the nearest proper rotation is returned instead.
pub fn kabsch_rotation(
    kernel: &dyn AlignmentKernel,
    moving: &[Point3<f64>],
    target: &[Point3<f64>],
    mask: &AtomMask,
    max_sweeps: usize,
) -> Result<Matrix3<f64>, AlignError> {
    if moving.len() != target.len() {
        return Err(AlignError::ShapeMismatch {
            moving: moving.len(),
            target: target.len(),
        });
    }
    let anchors = mask.indices().filter(|&i| i < moving.len()).count();
    if anchors < 2 {
        return Err(AlignError::TooFewAnchors { found: anchors });
    }

    let r = kernel.covariance(moving, target, mask);
    let rtr = r.transpose() * r;
    let eigen = jacobi(&rtr, max_sweeps)?.sorted_descending();

    let mu = eigen.values;
    if mu[1] <= DEGENERATE_EPSILON * mu[0].max(1.0) {
        return Err(AlignError::Degenerate);
    }

    let a1: Vector3<f64> = eigen.vectors.column(0).into_owned();
    let a2: Vector3<f64> = eigen.vectors.column(1).into_owned();
    let a3 = a1.cross(&a2);

    let b1 = (r * a1) / mu[0].sqrt();
    let b2 = (r * a2) / mu[1].sqrt();
    let b3 = b1.cross(&b2);

    if (r * a3).dot(&b3) < 0.0 {
        trace!("Optimal superposition is improper; keeping the proper rotation");
    }

    Ok(b1 * a1.transpose() + b2 * a2.transpose() + b3 * a3.transpose())
}

/// Rotates every coordinate of `moving` onto `target`, fitting on the anchors
/// of `mask`.
///
/// Failures never propagate: the coordinates are left as they were and the
/// outcome says why.
pub fn superpose(
    kernel: &dyn AlignmentKernel,
    moving: &mut [Point3<f64>],
    target: &[Point3<f64>],
    mask: &AtomMask,
    max_sweeps: usize,
) -> AlignOutcome {
    match kabsch_rotation(kernel, moving, target, mask, max_sweeps) {
        Ok(rotation) => {
            kernel.rotate(moving, &rotation);
            AlignOutcome::Aligned
        }
        Err(AlignError::TooFewAnchors { .. }) | Err(AlignError::ShapeMismatch { .. }) => {
            AlignOutcome::Skipped
        }
        Err(AlignError::Degenerate) => AlignOutcome::Degenerate,
        Err(AlignError::Jacobi(e)) => {
            warn!("Alignment skipped: {}", e);
            AlignOutcome::NotConverged
        }
    }
}

/// Root-mean-square deviation between paired masked atoms.
///
/// Returns [`RMSD_SHAPE_MISMATCH`] when the sets differ in size and 0 when the
/// mask selects nothing.
pub fn rmsd(
    kernel: &dyn AlignmentKernel,
    a: &[Point3<f64>],
    b: &[Point3<f64>],
    mask: &AtomMask,
) -> f64 {
    if a.len() != b.len() {
        return RMSD_SHAPE_MISMATCH;
    }
    let (sum, count) = kernel.squared_deviation(a, b, mask);
    if count == 0 {
        return 0.0;
    }
    (sum / count as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::alignment::jacobi::DEFAULT_MAX_SWEEPS;
    use crate::core::alignment::kernel::{KernelKind, SCALAR_KERNEL};
    use nalgebra::{Rotation3, Unit};

    const TOLERANCE: f64 = 1e-9;

    fn centered_cloud() -> Vec<Point3<f64>> {
        let raw = vec![
            Point3::new(1.2, 0.1, -0.4),
            Point3::new(-0.7, 1.9, 0.3),
            Point3::new(0.4, -1.1, 2.2),
            Point3::new(-1.8, -0.6, -1.0),
            Point3::new(2.1, 1.4, 0.9),
            Point3::new(-0.3, -2.0, -1.7),
        ];
        let c = raw.iter().map(|p| p.coords).sum::<Vector3<f64>>() / raw.len() as f64;
        raw.into_iter().map(|p| p - c).collect()
    }

    fn rotated(coords: &[Point3<f64>], rotation: &Rotation3<f64>) -> Vec<Point3<f64>> {
        coords.iter().map(|p| rotation * p).collect()
    }

    #[test]
    fn rmsd_of_identical_sets_is_zero() {
        let a = centered_cloud();
        assert_eq!(rmsd(&SCALAR_KERNEL, &a, &a, &AtomMask::all(a.len())), 0.0);
    }

    #[test]
    fn rmsd_reports_shape_mismatch_sentinel() {
        let a = centered_cloud();
        let b = &a[..3];
        assert_eq!(rmsd(&SCALAR_KERNEL, &a, b, &AtomMask::all(a.len())), RMSD_SHAPE_MISMATCH);
    }

    #[test]
    fn superpose_recovers_known_rotation() {
        let target = centered_cloud();
        let axis = Unit::new_normalize(Vector3::new(1.0, 2.0, -0.5));
        let rotation = Rotation3::from_axis_angle(&axis, 0.9);
        let mut moving = rotated(&target, &rotation);
        let mask = AtomMask::all(target.len());

        let outcome = superpose(&SCALAR_KERNEL, &mut moving, &target, &mask, DEFAULT_MAX_SWEEPS);
        assert_eq!(outcome, AlignOutcome::Aligned);
        assert!(rmsd(&SCALAR_KERNEL, &moving, &target, &mask) < TOLERANCE);
    }

    #[test]
    fn superpose_fitted_on_subset_moves_every_atom() {
        let target = centered_cloud();
        let rotation = Rotation3::from_axis_angle(&Vector3::x_axis(), -1.3);
        let mut moving = rotated(&target, &rotation);
        let mask = AtomMask::from_indices(target.len(), &[0, 1, 2, 3]);

        superpose(&SCALAR_KERNEL, &mut moving, &target, &mask, DEFAULT_MAX_SWEEPS);
        for (m, t) in moving.iter().zip(&target) {
            assert!((m - t).norm() < 1e-8);
        }
    }

    #[test]
    fn realigning_an_aligned_set_is_idempotent() {
        let target = centered_cloud();
        let rotation = Rotation3::from_axis_angle(&Vector3::z_axis(), 2.4);
        let mut moving = rotated(&target, &rotation);
        let mask = AtomMask::all(target.len());

        superpose(&SCALAR_KERNEL, &mut moving, &target, &mask, DEFAULT_MAX_SWEEPS);
        let once = moving.clone();
        superpose(&SCALAR_KERNEL, &mut moving, &target, &mask, DEFAULT_MAX_SWEEPS);
        for (a, b) in moving.iter().zip(&once) {
            assert!((a - b).norm() < TOLERANCE);
        }
    }

    #[test]
    fn fewer_than_two_anchors_is_a_no_op() {
        let target = centered_cloud();
        let mut moving = rotated(&target, &Rotation3::from_axis_angle(&Vector3::y_axis(), 0.5));
        let before = moving.clone();
        let mask = AtomMask::from_indices(target.len(), &[2]);

        let outcome = superpose(&SCALAR_KERNEL, &mut moving, &target, &mask, DEFAULT_MAX_SWEEPS);
        assert_eq!(outcome, AlignOutcome::Skipped);
        assert_eq!(moving, before);
    }

    #[test]
    fn collinear_anchors_are_degenerate() {
        let target = vec![
            Point3::new(-1.0, 0.0, 0.0),
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
        ];
        let mut moving = target.clone();
        let outcome = superpose(&SCALAR_KERNEL, &mut moving, &target, &AtomMask::all(3), DEFAULT_MAX_SWEEPS);
        assert_eq!(outcome, AlignOutcome::Degenerate);
    }

    #[test]
    fn exhausted_sweep_budget_leaves_coordinates_untouched() {
        let target = centered_cloud();
        let mut moving = rotated(&target, &Rotation3::from_axis_angle(&Vector3::y_axis(), 0.5));
        let before = moving.clone();
        let outcome = superpose(&SCALAR_KERNEL, &mut moving, &target, &AtomMask::all(target.len()), 0);
        assert_eq!(outcome, AlignOutcome::NotConverged);
        assert_eq!(moving, before);
    }

    #[test]
    fn result_is_a_proper_rotation_even_for_mirrored_input() {
        let target = centered_cloud();
        let mirrored: Vec<_> = target.iter().map(|p| Point3::new(-p.x, p.y, p.z)).collect();
        let rotation = kabsch_rotation(
            &SCALAR_KERNEL,
            &mirrored,
            &target,
            &AtomMask::all(target.len()),
            DEFAULT_MAX_SWEEPS,
        )
        .unwrap();
        assert!((rotation.determinant() - 1.0).abs() < 1e-9);
        assert!((rotation.transpose() * rotation - Matrix3::identity()).norm() < 1e-9);
    }

    #[test]
    fn detected_kernel_agrees_with_scalar_kernel() {
        let target = centered_cloud();
        let rotation = Rotation3::from_axis_angle(&Vector3::y_axis(), -0.7);
        let mask = AtomMask::all(target.len());

        let mut scalar = rotated(&target, &rotation);
        let mut detected = scalar.clone();
        superpose(&SCALAR_KERNEL, &mut scalar, &target, &mask, DEFAULT_MAX_SWEEPS);
        superpose(KernelKind::detect().kernel(), &mut detected, &target, &mask, DEFAULT_MAX_SWEEPS);
        for (s, d) in scalar.iter().zip(&detected) {
            assert!((s - d).norm() < TOLERANCE);
        }
    }
}
