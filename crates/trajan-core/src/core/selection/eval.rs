use super::ast::{NamePattern, Selection, SelectionVisitor};
use crate::core::models::atom::{Atom, ResidueClass};
use crate::core::models::frame::Frame;
use crate::core::models::mask::AtomMask;
use nalgebra::Point3;
use std::ops::RangeInclusive;

/// Evaluates a selection against one frame's atom table and working
/// coordinates.
pub struct MaskEvaluator<'a> {
    atoms: &'a [Atom],
    coords: &'a [Point3<f64>],
}

impl<'a> MaskEvaluator<'a> {
    pub fn new(frame: &'a Frame) -> Self {
        Self {
            atoms: frame.atoms(),
            coords: &frame.working,
        }
    }

    fn by_atom(&self, predicate: impl Fn(&Atom) -> bool) -> AtomMask {
        AtomMask::from_fn(self.atoms.len(), |i| predicate(&self.atoms[i]))
    }

    /// For every atom, whether any atom of `inner` lies within `radius`.
    ///
    /// Brute force over all pairs.
    fn near(&mut self, radius: f64, inner: &Selection) -> AtomMask {
        let anchors: Vec<Point3<f64>> = inner
            .accept(self)
            .indices()
            .filter_map(|i| self.coords.get(i).copied())
            .collect();
        let r2 = radius * radius;
        AtomMask::from_fn(self.atoms.len(), |i| {
            self.coords
                .get(i)
                .is_some_and(|p| anchors.iter().any(|a| (p - a).norm_squared() <= r2))
        })
    }
}

fn in_ranges(ranges: &[RangeInclusive<i64>], value: i64) -> bool {
    ranges.iter().any(|r| r.contains(&value))
}

fn any_match(patterns: &[NamePattern], name: &str) -> bool {
    patterns.iter().any(|p| p.matches(name))
}

impl SelectionVisitor for MaskEvaluator<'_> {
    type Output = AtomMask;

    fn visit_all(&mut self) -> AtomMask {
        AtomMask::all(self.atoms.len())
    }

    fn visit_none(&mut self) -> AtomMask {
        AtomMask::none(self.atoms.len())
    }

    fn visit_atom(&mut self, names: &[NamePattern]) -> AtomMask {
        self.by_atom(|a| any_match(names, &a.name))
    }

    fn visit_atom_no(&mut self, ranges: &[RangeInclusive<i64>]) -> AtomMask {
        self.by_atom(|a| in_ranges(ranges, a.serial as i64))
    }

    fn visit_residue(&mut self, names: &[NamePattern]) -> AtomMask {
        self.by_atom(|a| any_match(names, &a.residue_name))
    }

    fn visit_residue_no(&mut self, ranges: &[RangeInclusive<i64>]) -> AtomMask {
        self.by_atom(|a| in_ranges(ranges, a.residue_serial as i64))
    }

    fn visit_chain(&mut self, chains: &[char]) -> AtomMask {
        self.by_atom(|a| chains.iter().any(|c| c.eq_ignore_ascii_case(&a.chain_id)))
    }

    fn visit_element(&mut self, elements: &[NamePattern]) -> AtomMask {
        self.by_atom(|a| any_match(elements, &a.element))
    }

    fn visit_backbone(&mut self) -> AtomMask {
        self.by_atom(|a| a.backbone)
    }

    fn visit_protein(&mut self) -> AtomMask {
        self.by_atom(|a| a.class == ResidueClass::Protein)
    }

    fn visit_dna(&mut self) -> AtomMask {
        self.by_atom(|a| a.class == ResidueClass::Nucleic)
    }

    fn visit_water(&mut self) -> AtomMask {
        self.by_atom(|a| a.class == ResidueClass::Water)
    }

    fn visit_sidechain(&mut self) -> AtomMask {
        self.by_atom(Atom::is_sidechain)
    }

    fn visit_and(&mut self, lhs: &Selection, rhs: &Selection) -> AtomMask {
        let l = lhs.accept(self);
        let r = rhs.accept(self);
        &l & &r
    }

    fn visit_or(&mut self, lhs: &Selection, rhs: &Selection) -> AtomMask {
        let l = lhs.accept(self);
        let r = rhs.accept(self);
        &l | &r
    }

    fn visit_not(&mut self, inner: &Selection) -> AtomMask {
        !&inner.accept(self)
    }

    fn visit_within(&mut self, radius: f64, inner: &Selection) -> AtomMask {
        self.near(radius, inner)
    }

    fn visit_not_within(&mut self, radius: f64, inner: &Selection) -> AtomMask {
        !&self.near(radius, inner)
    }
}

impl Selection {
    /// The atoms of `frame` matched by this selection.
    pub fn evaluate(&self, frame: &Frame) -> AtomMask {
        self.accept(&mut MaskEvaluator::new(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::selection::parse;

    fn sample_frame() -> Frame {
        let atoms = vec![
            Atom::new(1, "N", "ALA", 1, 'A'),
            Atom::new(2, "CA", "ALA", 1, 'A'),
            Atom::new(3, "CB", "ALA", 1, 'A'),
            Atom::new(4, "O", "HOH", 2, 'W'),
            Atom::new(5, "P", "DA", 3, 'B'),
            Atom::new(6, "ZN", "ZN", 4, 'C').with_element("Zn"),
        ];
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.5, 0.0, 0.0),
            Point3::new(2.0, 1.4, 0.0),
            Point3::new(10.0, 0.0, 0.0),
            Point3::new(20.0, 0.0, 0.0),
            Point3::new(2.0, 3.0, 0.0),
        ];
        Frame::new(atoms, positions)
    }

    fn selected(expr: &str) -> Vec<usize> {
        parse(expr).unwrap().evaluate(&sample_frame()).indices().collect()
    }

    #[test]
    fn class_keywords_follow_residue_classification() {
        assert_eq!(selected("protein"), vec![0, 1, 2]);
        assert_eq!(selected("water"), vec![3]);
        assert_eq!(selected("dna"), vec![4]);
        assert_eq!(selected("backbone and protein"), vec![0, 1]);
        assert_eq!(selected("sidechain"), vec![2]);
    }

    #[test]
    fn name_and_number_leaves_match_atom_fields() {
        assert_eq!(selected("atom C*"), vec![1, 2]);
        assert_eq!(selected("atomno 2-4"), vec![1, 2, 3]);
        assert_eq!(selected("resno 3, 4"), vec![4, 5]);
        assert_eq!(selected("residue hoh"), vec![3]);
        assert_eq!(selected("chain a"), vec![0, 1, 2]);
        assert_eq!(selected("element zn"), vec![5]);
    }

    #[test]
    fn combinators_compose_masks() {
        assert_eq!(selected("not protein"), vec![3, 4, 5]);
        assert_eq!(selected("water or dna"), vec![3, 4]);
        assert_eq!(selected("all and not all"), Vec::<usize>::new());
        assert_eq!(selected("none"), Vec::<usize>::new());
    }

    #[test]
    fn within_measures_distance_to_inner_selection() {
        assert_eq!(selected("within(2.0, atom CB)"), vec![1, 2, 5]);
        assert_eq!(selected("notwithin(2.0, atom CB)"), vec![0, 3, 4]);
        assert_eq!(selected("within(5, none)"), Vec::<usize>::new());
    }
}
