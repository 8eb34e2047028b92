use crate::core::models::mask::AtomMask;
use nalgebra::{Point3, Vector3};

#[inline]
pub fn distance(a: &Point3<f64>, b: &Point3<f64>) -> f64 {
    (a - b).norm()
}

/// Angle `a-b-c` at vertex `b`, in radians. Degenerate arms give 0.
pub fn angle(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> f64 {
    let ba = a - b;
    let bc = c - b;
    let denom = ba.norm() * bc.norm();
    if denom < 1e-12 {
        return 0.0;
    }
    (ba.dot(&bc) / denom).clamp(-1.0, 1.0).acos()
}

/// Signed torsion `a-b-c-d` in radians, in `(-π, π]`.
pub fn torsion(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>, d: &Point3<f64>) -> f64 {
    let b1 = b - a;
    let b2 = c - b;
    let b3 = d - c;

    let n1 = b1.cross(&b2);
    let n2 = b2.cross(&b3);
    let b2_len = b2.norm();
    if b2_len < 1e-12 || n1.norm() < 1e-12 || n2.norm() < 1e-12 {
        return 0.0;
    }

    let x = n1.dot(&n2);
    let y = n1.cross(&n2).dot(&b2) / b2_len;
    y.atan2(x)
}

pub fn masked_centroid(coords: &[Point3<f64>], mask: &AtomMask) -> Option<Point3<f64>> {
    let mut sum = Vector3::zeros();
    let mut count = 0usize;
    for index in mask.indices() {
        if let Some(p) = coords.get(index) {
            sum += p.coords;
            count += 1;
        }
    }
    (count > 0).then(|| Point3::from(sum / count as f64))
}

/// Unweighted radius of gyration of the masked atoms.
pub fn radius_of_gyration(coords: &[Point3<f64>], mask: &AtomMask) -> Option<f64> {
    let center = masked_centroid(coords, mask)?;
    let mut sum = 0.0;
    let mut count = 0usize;
    for index in mask.indices() {
        if let Some(p) = coords.get(index) {
            sum += (p - center).norm_squared();
            count += 1;
        }
    }
    Some((sum / count as f64).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    const TOLERANCE: f64 = 1e-12;

    #[test]
    fn angle_of_right_angle_is_half_pi() {
        let a = Point3::new(1.0, 0.0, 0.0);
        let b = Point3::origin();
        let c = Point3::new(0.0, 1.0, 0.0);
        assert!((angle(&a, &b, &c) - FRAC_PI_2).abs() < TOLERANCE);
    }

    #[test]
    fn angle_with_degenerate_arm_is_zero() {
        let a = Point3::origin();
        assert_eq!(angle(&a, &a, &Point3::new(1.0, 0.0, 0.0)), 0.0);
    }

    #[test]
    fn torsion_sign_follows_handedness() {
        let a = Point3::new(1.0, 0.0, 0.0);
        let b = Point3::new(0.0, 0.0, 0.0);
        let c = Point3::new(0.0, 0.0, 1.0);
        let d_pos = Point3::new(0.0, 1.0, 1.0);
        let d_neg = Point3::new(0.0, -1.0, 1.0);
        assert!((torsion(&a, &b, &c, &d_pos) - FRAC_PI_2).abs() < TOLERANCE);
        assert!((torsion(&a, &b, &c, &d_neg) + FRAC_PI_2).abs() < TOLERANCE);
    }

    #[test]
    fn trans_torsion_is_pi() {
        let a = Point3::new(1.0, 0.0, 0.0);
        let b = Point3::new(0.0, 0.0, 0.0);
        let c = Point3::new(0.0, 0.0, 1.0);
        let d = Point3::new(-1.0, 0.0, 1.0);
        assert!((torsion(&a, &b, &c, &d).abs() - PI).abs() < TOLERANCE);
    }

    #[test]
    fn radius_of_gyration_of_symmetric_pair() {
        let coords = vec![Point3::new(-1.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)];
        let rg = radius_of_gyration(&coords, &AtomMask::all(2)).unwrap();
        assert!((rg - 1.0).abs() < TOLERANCE);
        assert!(radius_of_gyration(&coords, &AtomMask::none(2)).is_none());
    }
}
