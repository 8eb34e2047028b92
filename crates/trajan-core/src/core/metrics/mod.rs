//! Per-frame metric evaluation.
//!
//! Every [`DataSourceKind`] maps to one [`MetricEvaluator`]. The scheduler
//! prepares a [`MetricInput`] per frame (aligned coordinates, evaluated
//! selection masks, the averaged structure when needed) and calls either
//! [`MetricEvaluator::evaluate`] for time-based results or
//! [`MetricEvaluator::accumulate_residues`] for residue-based ones.
//!
//! Evaluators never fail: malformed input yields a neutral value (0, or
//! [`RMSD_SHAPE_MISMATCH`](crate::core::alignment::superpose::RMSD_SHAPE_MISMATCH)
//! for the RMSD family).

pub mod geometric;
pub mod script;
pub mod structural;
pub mod surface;

use crate::core::alignment::kernel::AlignmentKernel;
use crate::core::models::data_source::{DataSource, DataSourceKind, MAX_SELECTIONS};
use crate::core::models::frame::Frame;
use crate::core::models::mask::AtomMask;
use nalgebra::Point3;
use script::{ScriptEvaluator, ScriptHost};
use std::sync::Arc;

/// Everything a metric may read for one frame.
#[derive(Clone, Copy)]
pub struct MetricInput<'a> {
    pub data_source: &'a DataSource,
    /// The current frame. `working` is aligned on the stream backbone;
    /// `secondary` is aligned on selection 0 for the selection-scoped kinds.
    pub frame: &'a Frame,
    /// Structure the frame was aligned to: the stream reference, or the data
    /// source's own reference for selection-scoped kinds.
    pub reference: &'a Frame,
    /// Averaged coordinates in the same alignment as the measured copy.
    pub average: Option<&'a [Point3<f64>]>,
    /// Selection masks evaluated for this build, by slot.
    pub selections: [Option<&'a AtomMask>; MAX_SELECTIONS],
    pub kernel: &'a dyn AlignmentKernel,
    pub worker: usize,
}

impl<'a> MetricInput<'a> {
    pub fn selection(&self, slot: usize) -> Option<&'a AtomMask> {
        self.selections.get(slot).copied().flatten()
    }

    /// Selection 0, or every atom when the data source has none.
    pub fn primary_mask(&self) -> AtomMask {
        self.selection(0)
            .cloned()
            .unwrap_or_else(|| AtomMask::all(self.frame.atom_count()))
    }

    /// Working coordinates of atom `args[slot]`.
    pub fn arg_position(&self, slot: usize) -> Option<&'a Point3<f64>> {
        let index = *self.data_source.args.get(slot)?;
        self.frame.working.get(index)
    }
}

pub trait MetricEvaluator: Send + Sync {
    /// One value for a time-based result.
    fn evaluate(&self, input: &MetricInput) -> f64;

    /// Adds this frame's contribution, scaled by `weight`, into a
    /// residue-based slab of length [`MetricEvaluator::slab_len`].
    fn accumulate_residues(&self, input: &MetricInput, slab: &mut [f64], weight: f64) {
        let _ = (input, slab, weight);
    }

    /// Length of the per-worker accumulation slab.
    fn slab_len(&self, frame: &Frame) -> usize {
        frame.residue_count()
    }

    /// Turns a merged slab into the per-residue series.
    fn finalize_residues(&self, frame: &Frame, mask: Option<&AtomMask>, merged: Vec<f64>) -> Vec<f64> {
        let _ = (frame, mask);
        merged
    }
}

/// Builds the evaluator for a data source kind.
pub fn evaluator_for(kind: DataSourceKind, host: &Arc<dyn ScriptHost>) -> Box<dyn MetricEvaluator> {
    use self::geometric::*;
    use self::structural::*;
    use self::surface::{SurfaceEvaluator, SurfaceMeasure};

    match kind {
        DataSourceKind::Distance => Box::new(DistanceEvaluator),
        DataSourceKind::CentroidDistance => Box::new(CentroidDistanceEvaluator),
        DataSourceKind::Angle => Box::new(AngleEvaluator),
        DataSourceKind::Torsion => Box::new(TorsionEvaluator),
        DataSourceKind::RadiusOfGyration => Box::new(RadiusOfGyrationEvaluator),
        DataSourceKind::Rmsd => Box::new(RmsdEvaluator),
        DataSourceKind::RmsdSelection => Box::new(RmsdSelectionEvaluator),
        DataSourceKind::Rmsf => Box::new(RmsfEvaluator { scoped: false }),
        DataSourceKind::RmsfSelection => Box::new(RmsfEvaluator { scoped: true }),
        DataSourceKind::Sas => Box::new(SurfaceEvaluator::new(SurfaceMeasure::Area, false)),
        DataSourceKind::SasSelection => Box::new(SurfaceEvaluator::new(SurfaceMeasure::Area, true)),
        DataSourceKind::Occlusion => Box::new(SurfaceEvaluator::new(SurfaceMeasure::Occlusion, false)),
        DataSourceKind::OcclusionSelection => {
            Box::new(SurfaceEvaluator::new(SurfaceMeasure::Occlusion, true))
        }
        DataSourceKind::UserScript => Box::new(ScriptEvaluator::new(Arc::clone(host))),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::core::alignment::kernel::SCALAR_KERNEL;
    use crate::core::models::atom::Atom;

    /// A frame of `positions.len()` carbon atoms, `per_residue` atoms per residue.
    pub fn frame_of(positions: &[Point3<f64>], per_residue: usize) -> Frame {
        let atoms = positions
            .iter()
            .enumerate()
            .map(|(i, _)| Atom::new(i as u32 + 1, "CA", "ALA", (i / per_residue) as i32 + 1, 'A'))
            .collect();
        Frame::new(atoms, positions.to_vec())
    }

    pub fn input<'a>(ds: &'a DataSource, frame: &'a Frame, reference: &'a Frame) -> MetricInput<'a> {
        MetricInput {
            data_source: ds,
            frame,
            reference,
            average: None,
            selections: [None, None],
            kernel: &SCALAR_KERNEL,
            worker: 0,
        }
    }
}
