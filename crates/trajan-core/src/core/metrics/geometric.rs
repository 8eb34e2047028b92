use super::{MetricEvaluator, MetricInput};
use crate::core::utils::geometry;

#[derive(Debug, Clone, Copy)]
pub struct DistanceEvaluator;

impl MetricEvaluator for DistanceEvaluator {
    fn evaluate(&self, input: &MetricInput) -> f64 {
        match (input.arg_position(0), input.arg_position(1)) {
            (Some(a), Some(b)) => geometry::distance(a, b),
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CentroidDistanceEvaluator;

impl MetricEvaluator for CentroidDistanceEvaluator {
    fn evaluate(&self, input: &MetricInput) -> f64 {
        let coords = &input.frame.working;
        let centroids = input
            .selection(0)
            .and_then(|m| geometry::masked_centroid(coords, m))
            .zip(input.selection(1).and_then(|m| geometry::masked_centroid(coords, m)));
        centroids.map_or(0.0, |(a, b)| geometry::distance(&a, &b))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AngleEvaluator;

impl MetricEvaluator for AngleEvaluator {
    fn evaluate(&self, input: &MetricInput) -> f64 {
        match (input.arg_position(0), input.arg_position(1), input.arg_position(2)) {
            (Some(a), Some(b), Some(c)) => geometry::angle(a, b, c),
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TorsionEvaluator;

impl MetricEvaluator for TorsionEvaluator {
    fn evaluate(&self, input: &MetricInput) -> f64 {
        match (
            input.arg_position(0),
            input.arg_position(1),
            input.arg_position(2),
            input.arg_position(3),
        ) {
            (Some(a), Some(b), Some(c), Some(d)) => geometry::torsion(a, b, c, d),
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RadiusOfGyrationEvaluator;

impl MetricEvaluator for RadiusOfGyrationEvaluator {
    fn evaluate(&self, input: &MetricInput) -> f64 {
        geometry::radius_of_gyration(&input.frame.working, &input.primary_mask()).unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metrics::test_support::{frame_of, input};
    use crate::core::models::data_source::{DataSource, DataSourceKind};
    use crate::core::models::ids::StreamId;
    use crate::core::models::mask::AtomMask;
    use nalgebra::Point3;
    use std::f64::consts::FRAC_PI_2;

    fn square() -> Vec<Point3<f64>> {
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(3.0, 0.0, 0.0),
            Point3::new(3.0, 4.0, 0.0),
            Point3::new(3.0, 4.0, 5.0),
        ]
    }

    #[test]
    fn distance_reads_atom_arguments() {
        let frame = frame_of(&square(), 1);
        let ds = DataSource::new("d", StreamId::default(), DataSourceKind::Distance).with_args(&[0, 2]);
        assert!((DistanceEvaluator.evaluate(&input(&ds, &frame, &frame)) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn out_of_range_arguments_yield_zero() {
        let frame = frame_of(&square(), 1);
        let ds = DataSource::new("d", StreamId::default(), DataSourceKind::Distance).with_args(&[0, 40]);
        assert_eq!(DistanceEvaluator.evaluate(&input(&ds, &frame, &frame)), 0.0);
    }

    #[test]
    fn angle_and_torsion_use_radians() {
        let frame = frame_of(&square(), 1);
        let ds = DataSource::new("a", StreamId::default(), DataSourceKind::Angle).with_args(&[0, 1, 2]);
        assert!((AngleEvaluator.evaluate(&input(&ds, &frame, &frame)) - FRAC_PI_2).abs() < 1e-12);

        let ds = DataSource::new("t", StreamId::default(), DataSourceKind::Torsion).with_args(&[0, 1, 2, 3]);
        let value = TorsionEvaluator.evaluate(&input(&ds, &frame, &frame));
        assert!((value.abs() - FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn centroid_distance_uses_both_selections() {
        let frame = frame_of(&square(), 1);
        let ds = DataSource::new("c", StreamId::default(), DataSourceKind::CentroidDistance);
        let first = AtomMask::from_indices(4, &[0, 1]);
        let second = AtomMask::from_indices(4, &[2]);
        let mut inp = input(&ds, &frame, &frame);
        assert_eq!(CentroidDistanceEvaluator.evaluate(&inp), 0.0);

        inp.selections = [Some(&first), Some(&second)];
        let expected = (Point3::<f64>::new(1.5, 0.0, 0.0) - Point3::<f64>::new(3.0, 4.0, 0.0)).norm();
        assert!((CentroidDistanceEvaluator.evaluate(&inp) - expected).abs() < 1e-12);
    }

    #[test]
    fn radius_of_gyration_defaults_to_all_atoms() {
        let positions = vec![Point3::new(-2.0, 0.0, 0.0), Point3::new(2.0, 0.0, 0.0)];
        let frame = frame_of(&positions, 1);
        let ds = DataSource::new("rg", StreamId::default(), DataSourceKind::RadiusOfGyration);
        assert!((RadiusOfGyrationEvaluator.evaluate(&input(&ds, &frame, &frame)) - 2.0).abs() < 1e-12);
    }
}
