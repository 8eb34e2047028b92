use super::{MetricEvaluator, MetricInput};
use crate::core::alignment::superpose::{RMSD_SHAPE_MISMATCH, rmsd};
use crate::core::models::frame::Frame;
use crate::core::models::mask::AtomMask;

/// RMSD of the backbone against the stream reference, after backbone fit.
#[derive(Debug, Clone, Copy)]
pub struct RmsdEvaluator;

impl MetricEvaluator for RmsdEvaluator {
    fn evaluate(&self, input: &MetricInput) -> f64 {
        if !input.frame.is_compatible(input.reference) {
            return RMSD_SHAPE_MISMATCH;
        }
        let mut mask = input.reference.backbone_mask();
        if mask.count() == 0 {
            mask = AtomMask::all(input.frame.atom_count());
        }
        rmsd(input.kernel, &input.frame.working, &input.reference.working, &mask)
    }
}

/// RMSD of selection 0 after fitting on selection 0.
#[derive(Debug, Clone, Copy)]
pub struct RmsdSelectionEvaluator;

impl MetricEvaluator for RmsdSelectionEvaluator {
    fn evaluate(&self, input: &MetricInput) -> f64 {
        if !input.frame.is_compatible(input.reference) {
            return RMSD_SHAPE_MISMATCH;
        }
        rmsd(
            input.kernel,
            &input.frame.secondary,
            &input.reference.working,
            &input.primary_mask(),
        )
    }
}

/// Per-residue root-mean-square fluctuation around the averaged structure.
///
/// Accumulates weighted squared deviations per atom; the merged slab is turned
/// into one value per residue by averaging over the counted atoms of each
/// residue and taking the square root.
#[derive(Debug, Clone, Copy)]
pub struct RmsfEvaluator {
    /// Measure `secondary` (fitted on selection 0) and count only selected atoms.
    pub scoped: bool,
}

impl RmsfEvaluator {
    fn counted_mask(&self, frame: &Frame, mask: Option<&AtomMask>) -> AtomMask {
        match (self.scoped, mask) {
            (true, Some(m)) => m.clone(),
            _ => AtomMask::all(frame.atom_count()),
        }
    }
}

impl MetricEvaluator for RmsfEvaluator {
    fn evaluate(&self, _input: &MetricInput) -> f64 {
        0.0
    }

    fn accumulate_residues(&self, input: &MetricInput, slab: &mut [f64], weight: f64) {
        let Some(average) = input.average else {
            return;
        };
        let coords = if self.scoped {
            &input.frame.secondary
        } else {
            &input.frame.working
        };
        if average.len() != coords.len() {
            return;
        }
        let mask = self.counted_mask(input.frame, input.selection(0));
        for i in mask.indices() {
            if let Some(cell) = slab.get_mut(i) {
                *cell += (coords[i] - average[i]).norm_squared() * weight;
            }
        }
    }

    fn slab_len(&self, frame: &Frame) -> usize {
        frame.atom_count()
    }

    fn finalize_residues(&self, frame: &Frame, mask: Option<&AtomMask>, merged: Vec<f64>) -> Vec<f64> {
        let counted = self.counted_mask(frame, mask);
        frame
            .residue_ranges()
            .map(|range| {
                let (sum, count) = range
                    .filter(|&i| counted.get(i))
                    .fold((0.0, 0usize), |(s, c), i| (s + merged.get(i).copied().unwrap_or(0.0), c + 1));
                if count == 0 {
                    0.0
                } else {
                    (sum / count as f64).max(0.0).sqrt()
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metrics::test_support::{frame_of, input};
    use crate::core::models::data_source::{DataSource, DataSourceKind};
    use crate::core::models::ids::StreamId;
    use nalgebra::{Point3, Vector3};

    fn line(n: usize) -> Vec<Point3<f64>> {
        (0..n).map(|i| Point3::new(i as f64, (i % 2) as f64, 0.0)).collect()
    }

    #[test]
    fn rmsd_of_frame_against_itself_is_zero() {
        let frame = frame_of(&line(4), 1);
        let ds = DataSource::new("r", StreamId::default(), DataSourceKind::Rmsd);
        assert_eq!(RmsdEvaluator.evaluate(&input(&ds, &frame, &frame)), 0.0);
    }

    #[test]
    fn rmsd_reports_sentinel_for_mismatched_frames() {
        let frame = frame_of(&line(4), 1);
        let reference = frame_of(&line(3), 1);
        let ds = DataSource::new("r", StreamId::default(), DataSourceKind::Rmsd);
        assert_eq!(RmsdEvaluator.evaluate(&input(&ds, &frame, &reference)), RMSD_SHAPE_MISMATCH);
        assert_eq!(
            RmsdSelectionEvaluator.evaluate(&input(&ds, &frame, &reference)),
            RMSD_SHAPE_MISMATCH
        );
    }

    #[test]
    fn rmsd_measures_uniform_shift() {
        let reference = frame_of(&line(4), 1);
        let shifted: Vec<_> = line(4).iter().map(|p| p + Vector3::new(0.0, 0.0, 2.0)).collect();
        let frame = frame_of(&shifted, 1);
        let ds = DataSource::new("r", StreamId::default(), DataSourceKind::Rmsd);
        assert!((RmsdEvaluator.evaluate(&input(&ds, &frame, &reference)) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn rmsd_selection_compares_secondary_copy_on_selected_atoms() {
        let reference = frame_of(&line(4), 1);
        let mut frame = frame_of(&line(4), 1);
        frame.secondary[3].z += 3.0;
        let ds = DataSource::new("r", StreamId::default(), DataSourceKind::RmsdSelection);
        let mask = AtomMask::from_indices(4, &[2, 3]);
        let mut inp = input(&ds, &frame, &reference);
        inp.selections = [Some(&mask), None];
        let expected = (9.0f64 / 2.0).sqrt();
        assert!((RmsdSelectionEvaluator.evaluate(&inp) - expected).abs() < 1e-12);
    }

    #[test]
    fn rmsf_accumulates_per_atom_and_finalizes_per_residue() {
        let average = line(4);
        let moved: Vec<_> = average.iter().map(|p| p + Vector3::new(1.0, 0.0, 0.0)).collect();
        let frame = frame_of(&moved, 2);
        let ds = DataSource::new("f", StreamId::default(), DataSourceKind::Rmsf);
        let mut inp = input(&ds, &frame, &frame);
        inp.average = Some(average.as_slice());

        let evaluator = RmsfEvaluator { scoped: false };
        let mut slab = vec![0.0; evaluator.slab_len(&frame)];
        assert_eq!(slab.len(), 4);
        evaluator.accumulate_residues(&inp, &mut slab, 0.5);
        evaluator.accumulate_residues(&inp, &mut slab, 0.5);
        assert!(slab.iter().all(|v| (v - 1.0).abs() < 1e-12));

        let per_residue = evaluator.finalize_residues(&frame, None, slab);
        assert_eq!(per_residue.len(), 2);
        assert!(per_residue.iter().all(|v| (v - 1.0).abs() < 1e-12));
    }

    #[test]
    fn scoped_rmsf_counts_only_selected_atoms() {
        let frame = frame_of(&line(4), 2);
        let evaluator = RmsfEvaluator { scoped: true };
        let mask = AtomMask::from_indices(4, &[0]);
        let merged = vec![4.0, 100.0, 9.0, 9.0];
        let per_residue = evaluator.finalize_residues(&frame, Some(&mask), merged);
        assert_eq!(per_residue, vec![2.0, 0.0]);
    }

    #[test]
    fn rmsf_without_average_adds_nothing() {
        let frame = frame_of(&line(2), 1);
        let ds = DataSource::new("f", StreamId::default(), DataSourceKind::Rmsf);
        let mut slab = vec![0.0; 2];
        RmsfEvaluator { scoped: false }.accumulate_residues(&input(&ds, &frame, &frame), &mut slab, 1.0);
        assert_eq!(slab, vec![0.0, 0.0]);
    }
}
