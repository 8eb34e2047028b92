//! SSE2 implementation of the alignment kernel.
//!
//! Atoms are processed two at a time, one per 64-bit lane; an odd trailing atom
//! goes through the scalar formula. SSE2 is part of the x86-64 baseline, so
//! the intrinsics are always callable on this target.

use super::kernel::{AlignmentKernel, KernelKind};
use crate::core::models::mask::AtomMask;
use nalgebra::{Matrix3, Point3};
use std::arch::x86_64::*;

pub static SIMD_KERNEL: SimdKernel = SimdKernel;

#[derive(Debug, Default, Clone, Copy)]
pub struct SimdKernel;

#[inline]
fn horizontal_sum(v: __m128d) -> f64 {
    let mut lanes = [0.0f64; 2];
    // SAFETY: SSE2 is always present on x86-64; `lanes` holds two f64 and the
    // store is unaligned.
    unsafe { _mm_storeu_pd(lanes.as_mut_ptr(), v) };
    lanes[0] + lanes[1]
}

#[inline]
fn lanes(a: f64, b: f64) -> __m128d {
    // SAFETY: SSE2 baseline; register-only.
    unsafe { _mm_set_pd(b, a) }
}

fn paired_indices(mask: &AtomMask, len_a: usize, len_b: usize) -> Vec<usize> {
    mask.indices().filter(|&i| i < len_a && i < len_b).collect()
}

// SAFETY (all blocks below): the intrinsics are SSE2, which every x86-64 CPU
// supports. Only register arithmetic and unaligned stores into local
// two-element arrays are performed.
impl AlignmentKernel for SimdKernel {
    fn kind(&self) -> KernelKind {
        KernelKind::Simd
    }

    fn covariance(
        &self,
        moving: &[Point3<f64>],
        target: &[Point3<f64>],
        mask: &AtomMask,
    ) -> Matrix3<f64> {
        let indices = paired_indices(mask, moving.len(), target.len());
        let mut acc = [[unsafe { _mm_setzero_pd() }; 3]; 3];

        let mut pairs = indices.chunks_exact(2);
        for pair in &mut pairs {
            let (m0, m1) = (&moving[pair[0]], &moving[pair[1]]);
            let (t0, t1) = (&target[pair[0]], &target[pair[1]]);
            let m = [lanes(m0.x, m1.x), lanes(m0.y, m1.y), lanes(m0.z, m1.z)];
            let t = [lanes(t0.x, t1.x), lanes(t0.y, t1.y), lanes(t0.z, t1.z)];
            for i in 0..3 {
                for j in 0..3 {
                    acc[i][j] = unsafe { _mm_add_pd(acc[i][j], _mm_mul_pd(t[i], m[j])) };
                }
            }
        }

        let mut r = Matrix3::zeros();
        for i in 0..3 {
            for j in 0..3 {
                r[(i, j)] = horizontal_sum(acc[i][j]);
            }
        }
        if let [last] = pairs.remainder() {
            r += target[*last].coords * moving[*last].coords.transpose();
        }
        r
    }

    fn rotate(&self, coords: &mut [Point3<f64>], rotation: &Matrix3<f64>) {
        let rot = unsafe {
            [
                [
                    _mm_set1_pd(rotation[(0, 0)]),
                    _mm_set1_pd(rotation[(0, 1)]),
                    _mm_set1_pd(rotation[(0, 2)]),
                ],
                [
                    _mm_set1_pd(rotation[(1, 0)]),
                    _mm_set1_pd(rotation[(1, 1)]),
                    _mm_set1_pd(rotation[(1, 2)]),
                ],
                [
                    _mm_set1_pd(rotation[(2, 0)]),
                    _mm_set1_pd(rotation[(2, 1)]),
                    _mm_set1_pd(rotation[(2, 2)]),
                ],
            ]
        };

        let mut chunks = coords.chunks_exact_mut(2);
        for pair in &mut chunks {
            let x = lanes(pair[0].x, pair[1].x);
            let y = lanes(pair[0].y, pair[1].y);
            let z = lanes(pair[0].z, pair[1].z);
            let mut out = [[0.0f64; 2]; 3];
            for (row, dst) in rot.iter().zip(out.iter_mut()) {
                unsafe {
                    let v = _mm_add_pd(
                        _mm_add_pd(_mm_mul_pd(row[0], x), _mm_mul_pd(row[1], y)),
                        _mm_mul_pd(row[2], z),
                    );
                    _mm_storeu_pd(dst.as_mut_ptr(), v);
                }
            }
            pair[0] = Point3::new(out[0][0], out[1][0], out[2][0]);
            pair[1] = Point3::new(out[0][1], out[1][1], out[2][1]);
        }
        for p in chunks.into_remainder() {
            *p = Point3::from(rotation * p.coords);
        }
    }

    fn squared_deviation(&self, a: &[Point3<f64>], b: &[Point3<f64>], mask: &AtomMask) -> (f64, usize) {
        let indices = paired_indices(mask, a.len(), b.len());
        let mut acc = unsafe { _mm_setzero_pd() };

        let mut pairs = indices.chunks_exact(2);
        for pair in &mut pairs {
            let (a0, a1) = (&a[pair[0]], &a[pair[1]]);
            let (b0, b1) = (&b[pair[0]], &b[pair[1]]);
            unsafe {
                let dx = _mm_sub_pd(lanes(a0.x, a1.x), lanes(b0.x, b1.x));
                let dy = _mm_sub_pd(lanes(a0.y, a1.y), lanes(b0.y, b1.y));
                let dz = _mm_sub_pd(lanes(a0.z, a1.z), lanes(b0.z, b1.z));
                let sq = _mm_add_pd(
                    _mm_add_pd(_mm_mul_pd(dx, dx), _mm_mul_pd(dy, dy)),
                    _mm_mul_pd(dz, dz),
                );
                acc = _mm_add_pd(acc, sq);
            }
        }

        let mut sum = horizontal_sum(acc);
        if let [last] = pairs.remainder() {
            sum += (a[*last] - b[*last]).norm_squared();
        }
        (sum, indices.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::alignment::kernel::ScalarKernel;
    use nalgebra::{Rotation3, Vector3};

    fn cloud(n: usize) -> Vec<Point3<f64>> {
        (0..n)
            .map(|i| {
                let t = i as f64;
                Point3::new((t * 0.7).sin() * 3.0, (t * 1.3).cos() * 2.0, t * 0.25 - 1.0)
            })
            .collect()
    }

    #[test]
    fn covariance_agrees_with_scalar_kernel_for_odd_counts() {
        let a = cloud(7);
        let b: Vec<_> = cloud(7).iter().map(|p| Point3::new(p.y, -p.x, p.z + 0.5)).collect();
        let mask = AtomMask::all(7);
        let scalar = ScalarKernel.covariance(&a, &b, &mask);
        let simd = SimdKernel.covariance(&a, &b, &mask);
        assert!((scalar - simd).norm() < 1e-9);
    }

    #[test]
    fn rotate_agrees_with_scalar_kernel() {
        let rot = Rotation3::from_axis_angle(&Vector3::y_axis(), 1.1);
        let mut scalar = cloud(5);
        let mut simd = cloud(5);
        ScalarKernel.rotate(&mut scalar, rot.matrix());
        SimdKernel.rotate(&mut simd, rot.matrix());
        for (s, v) in scalar.iter().zip(&simd) {
            assert!((s - v).norm() < 1e-9);
        }
    }

    #[test]
    fn squared_deviation_agrees_with_scalar_kernel() {
        let a = cloud(9);
        let b: Vec<_> = a.iter().map(|p| p + Vector3::new(0.1, -0.2, 0.3)).collect();
        let mask = AtomMask::from_indices(9, &[0, 1, 3, 8, 20]);
        let (s_sum, s_count) = ScalarKernel.squared_deviation(&a, &b, &mask);
        let (v_sum, v_count) = SimdKernel.squared_deviation(&a, &b, &mask);
        assert_eq!(s_count, v_count);
        assert!((s_sum - v_sum).abs() < 1e-9);
    }
}
