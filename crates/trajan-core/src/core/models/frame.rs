use super::atom::Atom;
use super::mask::AtomMask;
use crate::core::utils::geometry::masked_centroid;
use nalgebra::{Point3, Vector3};
use std::ops::Range;

/// A single trajectory snapshot.
///
/// Holds the atom table plus three parallel coordinate arrays:
///
/// - `original` - coordinates as loaded, never modified after construction.
/// - `working` - centered and rotated in place by the alignment kernels.
/// - `secondary` - a second working copy used when a metric aligns on its own
///   selection without disturbing the frame-wide alignment.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    atoms: Vec<Atom>,
    original: Vec<Point3<f64>>,
    pub working: Vec<Point3<f64>>,
    pub secondary: Vec<Point3<f64>>,
    residue_starts: Vec<usize>,
    residue_of_atom: Vec<usize>,
}

impl Frame {
    /// Creates a frame from atoms and their positions.
    ///
    /// Residue boundaries are detected from consecutive atoms whose chain,
    /// residue serial or residue name differ. If the two slices have different
    /// lengths the longer one is truncated.
    pub fn new(atoms: Vec<Atom>, positions: Vec<Point3<f64>>) -> Self {
        let mut atoms = atoms;
        let mut positions = positions;
        let len = atoms.len().min(positions.len());
        atoms.truncate(len);
        positions.truncate(len);

        let mut residue_starts = Vec::new();
        let mut residue_of_atom = Vec::with_capacity(len);
        for (i, atom) in atoms.iter().enumerate() {
            if i == 0 || !atom.same_residue(&atoms[i - 1]) {
                residue_starts.push(i);
            }
            residue_of_atom.push(residue_starts.len() - 1);
        }

        Self {
            working: positions.clone(),
            secondary: positions.clone(),
            original: positions,
            atoms,
            residue_starts,
            residue_of_atom,
        }
    }

    #[inline]
    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn atom(&self, index: usize) -> Option<&Atom> {
        self.atoms.get(index)
    }

    pub fn atoms_mut(&mut self) -> &mut [Atom] {
        &mut self.atoms
    }

    pub fn original(&self) -> &[Point3<f64>] {
        &self.original
    }

    #[inline]
    pub fn residue_count(&self) -> usize {
        self.residue_starts.len()
    }

    /// Iterates over the atom index range of every residue, in file order.
    pub fn residue_ranges(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        self.residue_starts.iter().enumerate().map(|(r, &start)| {
            let end = self
                .residue_starts
                .get(r + 1)
                .copied()
                .unwrap_or(self.atoms.len());
            start..end
        })
    }

    pub fn residue_of(&self, atom_index: usize) -> Option<usize> {
        self.residue_of_atom.get(atom_index).copied()
    }

    pub fn backbone_mask(&self) -> AtomMask {
        AtomMask::from_fn(self.atoms.len(), |i| self.atoms[i].backbone)
    }

    pub fn selected_mask(&self) -> AtomMask {
        AtomMask::from_fn(self.atoms.len(), |i| self.atoms[i].selected)
    }

    /// Marks exactly the atoms of `mask` as selected.
    pub fn apply_selection(&mut self, mask: &AtomMask) {
        for (i, atom) in self.atoms.iter_mut().enumerate() {
            atom.selected = mask.get(i);
        }
    }

    /// Whether both frames describe the same number of atoms.
    #[inline]
    pub fn is_compatible(&self, other: &Frame) -> bool {
        self.atoms.len() == other.atoms.len()
    }

    pub fn reset_working(&mut self) {
        self.working.copy_from_slice(&self.original);
    }

    pub fn copy_working_into_secondary(&mut self) {
        self.secondary.copy_from_slice(&self.working);
    }

    /// Translates the working coordinates so that the centroid of the masked
    /// atoms lies at the origin. Returns the removed offset.
    ///
    /// An empty mask falls back to the centroid of all atoms.
    pub fn move_to_centroid(&mut self, mask: &AtomMask) -> Vector3<f64> {
        translate_to_centroid(&mut self.working, mask)
    }

    /// Same as [`Frame::move_to_centroid`] for the secondary working copy.
    pub fn move_secondary_to_centroid(&mut self, mask: &AtomMask) -> Vector3<f64> {
        translate_to_centroid(&mut self.secondary, mask)
    }
}

fn translate_to_centroid(coords: &mut [Point3<f64>], mask: &AtomMask) -> Vector3<f64> {
    let center = masked_centroid(coords, mask)
        .or_else(|| masked_centroid(coords, &AtomMask::all(coords.len())))
        .map(|c| c.coords)
        .unwrap_or_else(Vector3::zeros);
    for p in coords.iter_mut() {
        *p -= center;
    }
    center
}
