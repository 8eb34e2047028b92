use crate::core::models::mask::AtomMask;
use nalgebra::{Matrix3, Point3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The per-atom loops of superposition and RMSD evaluation.
///
/// Implementations must agree numerically (not necessarily bit for bit). A
/// kernel is chosen once per engine via [`KernelKind`]; callers never branch
/// between strategies themselves.
pub trait AlignmentKernel: Send + Sync + fmt::Debug {
    fn kind(&self) -> KernelKind;

    /// Cross-covariance `R = Σ targetᵢ ⊗ movingᵢ` over the masked atoms.
    fn covariance(
        &self,
        moving: &[Point3<f64>],
        target: &[Point3<f64>],
        mask: &AtomMask,
    ) -> Matrix3<f64>;

    /// Applies `rotation` to every coordinate in place.
    fn rotate(&self, coords: &mut [Point3<f64>], rotation: &Matrix3<f64>);

    /// Sum of squared distances between paired masked atoms, and the number of
    /// pairs visited.
    fn squared_deviation(&self, a: &[Point3<f64>], b: &[Point3<f64>], mask: &AtomMask) -> (f64, usize);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KernelKind {
    Scalar,
    Simd,
}

impl KernelKind {
    /// Picks the fastest strategy the running CPU supports.
    pub fn detect() -> Self {
        if Self::simd_available() {
            KernelKind::Simd
        } else {
            KernelKind::Scalar
        }
    }

    pub fn simd_available() -> bool {
        #[cfg(target_arch = "x86_64")]
        {
            std::arch::is_x86_feature_detected!("sse2")
        }
        #[cfg(not(target_arch = "x86_64"))]
        {
            false
        }
    }

    /// The shared kernel instance for this strategy.
    ///
    /// Requesting [`KernelKind::Simd`] on a target without the SIMD path yields
    /// the scalar kernel.
    pub fn kernel(self) -> &'static dyn AlignmentKernel {
        match self {
            KernelKind::Scalar => &SCALAR_KERNEL,
            #[cfg(target_arch = "x86_64")]
            KernelKind::Simd => &super::simd::SIMD_KERNEL,
            #[cfg(not(target_arch = "x86_64"))]
            KernelKind::Simd => &SCALAR_KERNEL,
        }
    }
}

impl fmt::Display for KernelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelKind::Scalar => f.write_str("scalar"),
            KernelKind::Simd => f.write_str("simd"),
        }
    }
}

pub static SCALAR_KERNEL: ScalarKernel = ScalarKernel;

/// Portable reference implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScalarKernel;

impl AlignmentKernel for ScalarKernel {
    fn kind(&self) -> KernelKind {
        KernelKind::Scalar
    }

    fn covariance(
        &self,
        moving: &[Point3<f64>],
        target: &[Point3<f64>],
        mask: &AtomMask,
    ) -> Matrix3<f64> {
        let mut r = Matrix3::zeros();
        for index in mask.indices() {
            let (Some(m), Some(t)) = (moving.get(index), target.get(index)) else {
                continue;
            };
            r += t.coords * m.coords.transpose();
        }
        r
    }

    fn rotate(&self, coords: &mut [Point3<f64>], rotation: &Matrix3<f64>) {
        for p in coords.iter_mut() {
            *p = Point3::from(rotation * p.coords);
        }
    }

    fn squared_deviation(&self, a: &[Point3<f64>], b: &[Point3<f64>], mask: &AtomMask) -> (f64, usize) {
        let mut sum = 0.0;
        let mut count = 0usize;
        for index in mask.indices() {
            let (Some(pa), Some(pb)) = (a.get(index), b.get(index)) else {
                continue;
            };
            sum += (pa - pb).norm_squared();
            count += 1;
        }
        (sum, count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Rotation3, Vector3};

    fn cloud() -> Vec<Point3<f64>> {
        vec![
            Point3::new(1.0, 2.0, 3.0),
            Point3::new(-1.5, 0.5, 2.0),
            Point3::new(0.3, -2.2, 1.1),
            Point3::new(2.2, 1.1, -0.7),
            Point3::new(-0.4, -0.9, -1.8),
        ]
    }

    #[test]
    fn covariance_matches_outer_product_sum() {
        let a = cloud();
        let b: Vec<_> = a.iter().map(|p| Point3::from(p.coords * 2.0)).collect();
        let mask = AtomMask::from_indices(a.len(), &[0, 2]);
        let r = ScalarKernel.covariance(&a, &b, &mask);
        let expected = b[0].coords * a[0].coords.transpose() + b[2].coords * a[2].coords.transpose();
        assert!((r - expected).norm() < 1e-12);
    }

    #[test]
    fn rotate_applies_matrix_to_every_atom() {
        let mut coords = cloud();
        let rot = Rotation3::from_axis_angle(&Vector3::z_axis(), 0.3);
        ScalarKernel.rotate(&mut coords, rot.matrix());
        for (rotated, original) in coords.iter().zip(cloud()) {
            assert!((rotated - rot * original).norm() < 1e-12);
        }
    }

    #[test]
    fn squared_deviation_counts_only_masked_pairs() {
        let a = cloud();
        let mut b = cloud();
        b[1].x += 2.0;
        b[3].y -= 1.0;
        let (sum, count) = ScalarKernel.squared_deviation(&a, &b, &AtomMask::from_indices(5, &[1, 4]));
        assert_eq!(count, 2);
        assert!((sum - 4.0).abs() < 1e-12);
    }

    #[test]
    fn kernel_for_kind_reports_its_kind() {
        assert_eq!(KernelKind::Scalar.kernel().kind(), KernelKind::Scalar);
        let detected = KernelKind::detect();
        if KernelKind::simd_available() {
            assert_eq!(detected.kernel().kind(), KernelKind::Simd);
        } else {
            assert_eq!(detected, KernelKind::Scalar);
        }
    }
}
