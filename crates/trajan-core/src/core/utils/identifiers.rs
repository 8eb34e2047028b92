use phf::{Map, Set, phf_map, phf_set};

static PROTEIN_BACKBONE_ATOM_NAMES: Set<&'static str> = phf_set! {
    "N", "CA", "C", "O", "OXT", "OT1", "OT2",
};

static NUCLEIC_BACKBONE_ATOM_NAMES: Set<&'static str> = phf_set! {
    "P", "OP1", "OP2", "O1P", "O2P", "O5'", "C5'", "C4'", "C3'", "O3'",
    "O5*", "C5*", "C4*", "C3*", "O3*",
};

static PROTEIN_RESIDUE_NAMES: Set<&'static str> = phf_set! {
    "ALA", "ARG", "ASN", "ASP", "CYS", "GLN", "GLU", "GLY", "HIS", "ILE",
    "LEU", "LYS", "MET", "PHE", "PRO", "SER", "THR", "TRP", "TYR", "VAL",
    "HSD", "HSE", "HSP", "HID", "HIE", "HIP", "CYX", "ASH", "GLH", "LYN",
};

static NUCLEIC_RESIDUE_NAMES: Set<&'static str> = phf_set! {
    "DA", "DC", "DG", "DT", "DU", "A", "C", "G", "T", "U",
    "ADE", "CYT", "GUA", "THY", "URA", "DA5", "DA3", "DC5", "DC3", "DG5", "DG3", "DT5", "DT3",
};

static WATER_RESIDUE_NAMES: Set<&'static str> = phf_set! {
    "HOH", "WAT", "TIP3", "TIP", "SOL", "H2O", "TIP4", "SPC",
};

// Van der Waals radii in Angstroms (Bondi).
static VDW_RADII: Map<&'static str, f64> = phf_map! {
    "H" => 1.20, "C" => 1.70, "N" => 1.55, "O" => 1.52, "S" => 1.80, "P" => 1.80,
    "F" => 1.47, "CL" => 1.75, "BR" => 1.85, "I" => 1.98, "SE" => 1.90,
    "NA" => 2.27, "K" => 2.75, "MG" => 1.73, "CA" => 2.31, "ZN" => 1.39, "FE" => 1.94,
};

const DEFAULT_VDW_RADIUS: f64 = 1.80;

// Element symbols that would otherwise be mistaken for C, N, O or H names.
const TWO_LETTER_ELEMENTS: [&str; 6] = ["CL", "BR", "ZN", "FE", "MG", "SE"];

pub fn is_protein_residue(residue_name: &str) -> bool {
    PROTEIN_RESIDUE_NAMES.contains(residue_name.trim())
}

pub fn is_nucleic_residue(residue_name: &str) -> bool {
    NUCLEIC_RESIDUE_NAMES.contains(residue_name.trim())
}

pub fn is_water_residue(residue_name: &str) -> bool {
    WATER_RESIDUE_NAMES.contains(residue_name.trim())
}

pub fn is_backbone_atom(residue_name: &str, atom_name: &str) -> bool {
    let atom_name = atom_name.trim();
    if is_protein_residue(residue_name) {
        PROTEIN_BACKBONE_ATOM_NAMES.contains(atom_name)
    } else if is_nucleic_residue(residue_name) {
        NUCLEIC_BACKBONE_ATOM_NAMES.contains(atom_name)
    } else {
        false
    }
}

pub fn is_heavy_atom(atom_name: &str) -> bool {
    let first_char = atom_name
        .trim()
        .trim_start_matches(|c: char| c.is_ascii_digit())
        .chars()
        .next()
        .map(|c| c.to_ascii_uppercase());
    !matches!(first_char, Some('H') | Some('D'))
}

/// Guesses the element symbol from a PDB atom name when the element columns are blank.
pub fn infer_element(atom_name: &str) -> String {
    let letters: String = atom_name
        .trim()
        .chars()
        .skip_while(|c| c.is_ascii_digit())
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    let upper = letters.to_ascii_uppercase();
    if let Some(symbol) = TWO_LETTER_ELEMENTS.iter().find(|s| upper.starts_with(**s)) {
        return symbol.to_string();
    }
    upper.chars().next().map(|c| c.to_string()).unwrap_or_default()
}

pub fn vdw_radius(element: &str) -> f64 {
    VDW_RADII
        .get(element.trim().to_ascii_uppercase().as_str())
        .copied()
        .unwrap_or(DEFAULT_VDW_RADIUS)
}
