use crate::core::utils::identifiers;
use std::str::FromStr;

/// Classifies the residue an atom belongs to.
///
/// The class is derived once from the residue name when a frame is loaded and is
/// used by the selection language (`protein`, `dna`, `water`) and by the
/// backbone detection rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum ResidueClass {
    /// Standard or common non-standard amino acid.
    Protein,
    /// Deoxy- or ribonucleotide.
    Nucleic,
    /// Solvent water molecule.
    Water,
    /// Ligands, ions and anything unrecognized.
    #[default]
    Other,
}

impl ResidueClass {
    pub fn from_residue_name(residue_name: &str) -> Self {
        if identifiers::is_protein_residue(residue_name) {
            ResidueClass::Protein
        } else if identifiers::is_nucleic_residue(residue_name) {
            ResidueClass::Nucleic
        } else if identifiers::is_water_residue(residue_name) {
            ResidueClass::Water
        } else {
            ResidueClass::Other
        }
    }
}

impl FromStr for ResidueClass {
    type Err = ();

    /// Parses a residue class name, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "protein" => Ok(ResidueClass::Protein),
            "nucleic" | "dna" | "rna" => Ok(ResidueClass::Nucleic),
            "water" | "solvent" => Ok(ResidueClass::Water),
            "other" | "unknown" => Ok(ResidueClass::Other),
            _ => Err(()),
        }
    }
}

/// Per-atom identity and flags of a trajectory frame.
///
/// Coordinates are not stored here; they live in the parallel coordinate
/// arrays of the owning [`Frame`](super::frame::Frame) so that alignment and
/// RMSD kernels can stream over contiguous memory.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// Atom serial number from the source file.
    pub serial: u32,
    /// Atom name (e.g., "CA", "O5'").
    pub name: String,
    /// Residue name (e.g., "ALA", "DG").
    pub residue_name: String,
    /// Residue sequence number from the source file.
    pub residue_serial: i32,
    /// Chain identifier, `' '` when absent.
    pub chain_id: char,
    /// Upper-case element symbol.
    pub element: String,
    /// Family of the parent residue.
    pub class: ResidueClass,
    /// Whether the atom came from a HETATM record.
    pub hetero: bool,
    /// Whether the atom belongs to the alignment anchor set.
    pub backbone: bool,
    /// Whether the atom is part of the current user selection.
    pub selected: bool,
}

impl Atom {
    /// Creates an atom and derives its residue class, element and backbone flag
    /// from the names.
    pub fn new(serial: u32, name: &str, residue_name: &str, residue_serial: i32, chain_id: char) -> Self {
        let name = name.trim().to_string();
        let residue_name = residue_name.trim().to_string();
        Self {
            serial,
            element: identifiers::infer_element(&name),
            class: ResidueClass::from_residue_name(&residue_name),
            backbone: identifiers::is_backbone_atom(&residue_name, &name),
            hetero: false,
            selected: false,
            name,
            residue_name,
            residue_serial,
            chain_id,
        }
    }

    pub fn with_element(mut self, element: &str) -> Self {
        let element = element.trim();
        if !element.is_empty() {
            self.element = element.to_ascii_uppercase();
        }
        self
    }

    pub fn is_heavy(&self) -> bool {
        self.element != "H" && self.element != "D"
    }

    pub fn is_sidechain(&self) -> bool {
        self.class == ResidueClass::Protein && !self.backbone
    }

    /// Whether `other` belongs to the same residue as this atom.
    pub fn same_residue(&self, other: &Atom) -> bool {
        self.chain_id == other.chain_id
            && self.residue_serial == other.residue_serial
            && self.residue_name == other.residue_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_atom_derives_class_and_backbone_flag() {
        let ca = Atom::new(2, " CA ", "ALA", 1, 'A');
        assert_eq!(ca.name, "CA");
        assert_eq!(ca.class, ResidueClass::Protein);
        assert!(ca.backbone);
        assert!(!ca.is_sidechain());
        assert_eq!(ca.element, "C");

        let cb = Atom::new(3, "CB", "ALA", 1, 'A');
        assert!(!cb.backbone);
        assert!(cb.is_sidechain());
    }

    #[test]
    fn water_atoms_are_never_backbone() {
        let ow = Atom::new(10, "O", "HOH", 100, 'W');
        assert_eq!(ow.class, ResidueClass::Water);
        assert!(!ow.backbone);
    }

    #[test]
    fn explicit_element_overrides_inferred_one() {
        let atom = Atom::new(1, "CA", "CA", 5, 'B').with_element("ca");
        assert_eq!(atom.element, "CA");
        assert_eq!(atom.class, ResidueClass::Other);
    }

    #[test]
    fn same_residue_compares_chain_serial_and_name() {
        let a = Atom::new(1, "N", "GLY", 7, 'A');
        let b = Atom::new(2, "CA", "GLY", 7, 'A');
        let c = Atom::new(3, "N", "GLY", 8, 'A');
        assert!(a.same_residue(&b));
        assert!(!a.same_residue(&c));
    }

    #[test]
    fn from_str_parses_residue_classes_case_insensitively() {
        assert_eq!(ResidueClass::from_str("Protein"), Ok(ResidueClass::Protein));
        assert_eq!(ResidueClass::from_str("DNA"), Ok(ResidueClass::Nucleic));
        assert_eq!(ResidueClass::from_str("water"), Ok(ResidueClass::Water));
        assert_eq!(ResidueClass::from_str("foo"), Err(()));
    }
}
