use crate::error::{CliError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;
use trajan::core::models::analysis::{ResultLayout, YUnit};
use trajan::core::models::data_source::DataSourceKind;
use trajan::core::models::stream::{FrameFormat, StreamFlags};
use trajan::engine::config::KernelPreference;

/// `[engine]` table.
#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileEngineConfig {
    pub threads: Option<usize>,
    #[serde(rename = "single-threaded")]
    pub single_threaded: Option<bool>,
    pub kernel: Option<KernelPreference>,
    #[serde(rename = "max-jacobi-sweeps")]
    pub max_jacobi_sweeps: Option<usize>,
}

/// One `[[stream]]` entry. Relative file paths are resolved against the
/// directory of the project file.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileStream {
    pub name: String,
    pub files: Vec<PathBuf>,
    #[serde(default)]
    pub format: FrameFormat,
    #[serde(default)]
    pub flags: StreamFlags,
}

/// One `[[data-source]]` entry.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileDataSource {
    pub name: String,
    /// Name of the stream the metric reads.
    pub stream: String,
    pub kind: DataSourceKind,
    /// Zero-based atom indices.
    #[serde(default)]
    pub args: Vec<usize>,
    #[serde(default)]
    pub selections: Vec<String>,
    pub reference: Option<PathBuf>,
    pub script: Option<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileBinding {
    #[serde(rename = "data-source")]
    pub data_source: String,
    pub scale: Option<f64>,
    pub bias: Option<f64>,
    pub visible: Option<bool>,
}

/// One `[[result]]` entry.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileResult {
    pub name: String,
    #[serde(default)]
    pub layout: ResultLayout,
    #[serde(rename = "y-unit", default)]
    pub y_unit: YUnit,
    #[serde(default)]
    pub sources: Vec<FileBinding>,
}

/// The whole project description as written on disk.
#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub engine: Option<FileEngineConfig>,
    #[serde(default)]
    pub stream: Vec<FileStream>,
    #[serde(rename = "data-source", default)]
    pub data_source: Vec<FileDataSource>,
    #[serde(default)]
    pub result: Vec<FileResult>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading project description from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content).map_err(|e| match e {
            CliError::FileParsing { source, .. } => CliError::FileParsing {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| CliError::FileParsing {
            path: PathBuf::from("<inline>"),
            source: e.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROJECT: &str = r#"
        [engine]
        threads = 4
        kernel = "scalar"

        [[stream]]
        name = "traj"
        files = ["frames/f0.pdb", "frames/f1.pdb"]
        format = "pdb-segment"
        flags = { skip-water = true }

        [[data-source]]
        name = "bb-rmsd"
        stream = "traj"
        kind = "rmsd"

        [[data-source]]
        name = "site"
        stream = "traj"
        kind = "rmsd-selection"
        selections = ["resno 10-20 and backbone"]
        reference = "crystal.pdb"

        [[result]]
        name = "rmsd"
        y-unit = "nanometer"
        sources = [
            { data-source = "bb-rmsd" },
            { data-source = "site", scale = 2.0, bias = -0.5, visible = false },
        ]
    "#;

    #[test]
    fn parses_full_project() {
        let cfg = FileConfig::from_toml(PROJECT).unwrap();

        let engine = cfg.engine.unwrap();
        assert_eq!(engine.threads, Some(4));
        assert_eq!(engine.kernel, Some(KernelPreference::Scalar));
        assert_eq!(engine.max_jacobi_sweeps, None);

        assert_eq!(cfg.stream.len(), 1);
        assert_eq!(cfg.stream[0].format, FrameFormat::PdbSegment);
        assert!(cfg.stream[0].flags.skip_water);
        assert!(!cfg.stream[0].flags.skip_hydrogens);

        assert_eq!(cfg.data_source[1].kind, DataSourceKind::RmsdSelection);
        assert_eq!(cfg.data_source[1].selections, vec!["resno 10-20 and backbone"]);
        assert_eq!(cfg.data_source[1].reference, Some(PathBuf::from("crystal.pdb")));

        let result = &cfg.result[0];
        assert_eq!(result.layout, ResultLayout::Time);
        assert_eq!(result.y_unit, YUnit::Nanometer);
        assert_eq!(result.sources[1].scale, Some(2.0));
        assert_eq!(result.sources[1].visible, Some(false));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = FileConfig::from_toml(
            r#"
            [[stream]]
            name = "traj"
            files = []
            colour = "red"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, CliError::FileParsing { .. }));
    }

    #[test]
    fn empty_document_is_an_empty_project() {
        let cfg = FileConfig::from_toml("").unwrap();
        assert_eq!(cfg, FileConfig::default());
    }
}
