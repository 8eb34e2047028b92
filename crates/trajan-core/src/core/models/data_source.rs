use super::analysis::ResultLayout;
use super::ids::StreamId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Maximum number of atom-index arguments a data source can carry.
pub const MAX_ARGS: usize = 6;
/// Maximum number of selection expressions a data source can carry.
pub const MAX_SELECTIONS: usize = 2;

/// The physical quantity a metric produces before unit conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quantity {
    /// Angstroms.
    Length,
    /// Radians.
    Angle,
    /// Square Angstroms.
    Area,
    /// Dimensionless.
    Unitless,
}

/// What a data source measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataSourceKind {
    /// Distance between atoms `args[0]` and `args[1]`.
    Distance,
    /// Distance between the centroids of selection 0 and selection 1.
    CentroidDistance,
    /// Angle `args[0]-args[1]-args[2]`.
    Angle,
    /// Signed torsion `args[0]-args[1]-args[2]-args[3]`.
    Torsion,
    /// RMSD of the backbone atoms against the stream reference.
    Rmsd,
    /// RMSD of selection 0, aligned on selection 0.
    RmsdSelection,
    /// Per-residue fluctuation of all atoms around the average structure.
    Rmsf,
    /// Per-residue fluctuation of the atoms of selection 0, aligned on selection 0.
    RmsfSelection,
    /// Radius of gyration of selection 0 (all atoms when absent).
    RadiusOfGyration,
    /// Solvent-accessible surface area of all atoms.
    Sas,
    /// Solvent-accessible surface area of the atoms of selection 0.
    SasSelection,
    /// Buried fraction of the atomic surfaces of all atoms.
    Occlusion,
    /// Buried fraction of the atomic surfaces of the atoms of selection 0.
    OcclusionSelection,
    /// A user-defined script evaluated by an external host.
    UserScript,
}

impl DataSourceKind {
    pub fn quantity(self) -> Quantity {
        match self {
            DataSourceKind::Distance
            | DataSourceKind::CentroidDistance
            | DataSourceKind::Rmsd
            | DataSourceKind::RmsdSelection
            | DataSourceKind::Rmsf
            | DataSourceKind::RmsfSelection
            | DataSourceKind::RadiusOfGyration => Quantity::Length,
            DataSourceKind::Angle | DataSourceKind::Torsion => Quantity::Angle,
            DataSourceKind::Sas | DataSourceKind::SasSelection => Quantity::Area,
            DataSourceKind::Occlusion
            | DataSourceKind::OcclusionSelection
            | DataSourceKind::UserScript => Quantity::Unitless,
        }
    }

    /// Whether the kind can be bound into a result with the given layout.
    pub fn supports(self, layout: ResultLayout) -> bool {
        match self {
            DataSourceKind::Rmsf | DataSourceKind::RmsfSelection => layout == ResultLayout::Residue,
            DataSourceKind::Sas
            | DataSourceKind::SasSelection
            | DataSourceKind::Occlusion
            | DataSourceKind::OcclusionSelection => true,
            _ => layout == ResultLayout::Time,
        }
    }

    /// Number of atom-index arguments the kind reads.
    pub fn required_args(self) -> usize {
        match self {
            DataSourceKind::Distance => 2,
            DataSourceKind::Angle => 3,
            DataSourceKind::Torsion => 4,
            _ => 0,
        }
    }

    /// Number of selection expressions the kind requires.
    pub fn required_selections(self) -> usize {
        match self {
            DataSourceKind::CentroidDistance => 2,
            DataSourceKind::RmsdSelection
            | DataSourceKind::RmsfSelection
            | DataSourceKind::SasSelection
            | DataSourceKind::OcclusionSelection => 1,
            _ => 0,
        }
    }

    /// Whether the kind needs the averaged structure of the stream.
    pub fn needs_average(self) -> bool {
        matches!(self, DataSourceKind::Rmsf | DataSourceKind::RmsfSelection)
    }

    /// Whether the kind aligns on its own selection instead of the backbone.
    pub fn aligns_on_selection(self) -> bool {
        matches!(
            self,
            DataSourceKind::RmsdSelection | DataSourceKind::RmsfSelection
        )
    }
}

impl fmt::Display for DataSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataSourceKind::Distance => "distance",
            DataSourceKind::CentroidDistance => "centroid-distance",
            DataSourceKind::Angle => "angle",
            DataSourceKind::Torsion => "torsion",
            DataSourceKind::Rmsd => "rmsd",
            DataSourceKind::RmsdSelection => "rmsd-selection",
            DataSourceKind::Rmsf => "rmsf",
            DataSourceKind::RmsfSelection => "rmsf-selection",
            DataSourceKind::RadiusOfGyration => "radius-of-gyration",
            DataSourceKind::Sas => "sas",
            DataSourceKind::SasSelection => "sas-selection",
            DataSourceKind::Occlusion => "occlusion",
            DataSourceKind::OcclusionSelection => "occlusion-selection",
            DataSourceKind::UserScript => "user-script",
        };
        f.write_str(name)
    }
}

/// Source text of a user-defined metric, handed verbatim to the script host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserScript {
    pub source: String,
}

/// A named metric definition bound to one stream.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSource {
    pub name: String,
    pub stream: StreamId,
    pub kind: DataSourceKind,
    pub args: [usize; MAX_ARGS],
    pub selections: [Option<String>; MAX_SELECTIONS],
    /// Alternate structure used as the alignment/RMSD reference instead of the
    /// stream's frame 0.
    pub reference_path: Option<PathBuf>,
    pub script: Option<UserScript>,
}

impl DataSource {
    pub fn new(name: &str, stream: StreamId, kind: DataSourceKind) -> Self {
        Self {
            name: name.to_string(),
            stream,
            kind,
            args: [0; MAX_ARGS],
            selections: [None, None],
            reference_path: None,
            script: None,
        }
    }

    pub fn with_args(mut self, args: &[usize]) -> Self {
        for (slot, &value) in self.args.iter_mut().zip(args) {
            *slot = value;
        }
        self
    }

    pub fn with_selection(mut self, slot: usize, expression: &str) -> Self {
        if let Some(entry) = self.selections.get_mut(slot) {
            *entry = Some(expression.to_string());
        }
        self
    }

    pub fn with_reference(mut self, path: impl Into<PathBuf>) -> Self {
        self.reference_path = Some(path.into());
        self
    }

    pub fn with_script(mut self, source: &str) -> Self {
        self.script = Some(UserScript {
            source: source.to_string(),
        });
        self
    }

    /// The atom-index arguments this kind actually reads.
    pub fn active_args(&self) -> &[usize] {
        &self.args[..self.kind.required_args()]
    }

    pub fn selection(&self, slot: usize) -> Option<&str> {
        self.selections.get(slot).and_then(|s| s.as_deref())
    }

    /// Whether switching from `self` to `other` changes any computed value.
    ///
    /// Only the name is excluded; every other field feeds the computation.
    pub fn differs_in_content(&self, other: &DataSource) -> bool {
        self.stream != other.stream
            || self.kind != other.kind
            || self.active_args() != other.active_args()
            || self.selections != other.selections
            || self.reference_path != other.reference_path
            || self.script != other.script
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_support_matches_metric_family() {
        assert!(DataSourceKind::Rmsd.supports(ResultLayout::Time));
        assert!(!DataSourceKind::Rmsd.supports(ResultLayout::Residue));
        assert!(DataSourceKind::Rmsf.supports(ResultLayout::Residue));
        assert!(!DataSourceKind::Rmsf.supports(ResultLayout::Time));
        assert!(DataSourceKind::Sas.supports(ResultLayout::Time));
        assert!(DataSourceKind::Sas.supports(ResultLayout::Residue));
    }

    #[test]
    fn with_args_fills_leading_slots() {
        let ds = DataSource::new("d", StreamId::default(), DataSourceKind::Angle).with_args(&[4, 5, 6]);
        assert_eq!(ds.args, [4, 5, 6, 0, 0, 0]);
        assert_eq!(ds.active_args(), &[4, 5, 6]);
    }

    #[test]
    fn rename_is_not_a_content_change() {
        let a = DataSource::new("a", StreamId::default(), DataSourceKind::Distance).with_args(&[1, 2]);
        let mut b = a.clone();
        b.name = "renamed".into();
        assert!(!a.differs_in_content(&b));
    }

    #[test]
    fn unused_args_are_not_a_content_change() {
        let a = DataSource::new("a", StreamId::default(), DataSourceKind::Distance).with_args(&[1, 2]);
        let mut b = a.clone();
        b.args[5] = 99;
        assert!(!a.differs_in_content(&b));
        b.args[1] = 3;
        assert!(a.differs_in_content(&b));
    }

    #[test]
    fn selection_and_script_edits_are_content_changes() {
        let a = DataSource::new("a", StreamId::default(), DataSourceKind::RmsdSelection)
            .with_selection(0, "backbone");
        let b = a.clone().with_selection(0, "protein and backbone");
        assert!(a.differs_in_content(&b));

        let c = a.clone().with_script("return 1");
        assert!(a.differs_in_content(&c));
    }

    #[test]
    fn kind_display_is_kebab_case() {
        assert_eq!(DataSourceKind::RadiusOfGyration.to_string(), "radius-of-gyration");
    }
}
