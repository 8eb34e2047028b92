use super::frame::Frame;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// On-disk layout of the snapshots of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FrameFormat {
    /// Standard fixed-column PDB.
    #[default]
    Pdb,
    /// PDB as written by NAMD/CHARMM, where the chain column is replaced by the
    /// segment identifier in columns 73-76.
    PdbSegment,
}

/// Loader options that change which atoms end up in a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct StreamFlags {
    /// Drop water residues while loading.
    pub skip_water: bool,
    /// Drop HETATM records while loading.
    pub skip_hetero: bool,
    /// Drop hydrogens while loading.
    pub skip_hydrogens: bool,
}

/// An ordered sequence of trajectory frames plus its resident reference frame.
#[derive(Debug, Clone)]
pub struct Stream {
    pub name: String,
    pub format: FrameFormat,
    pub flags: StreamFlags,
    files: Vec<PathBuf>,
    reference: Frame,
    average: Option<Frame>,
}

impl Stream {
    /// Creates a stream around an already loaded reference frame.
    ///
    /// The reference working coordinates are expected to be centered on the
    /// backbone centroid; [`Stream::new`] does that itself.
    pub fn new(
        name: &str,
        format: FrameFormat,
        flags: StreamFlags,
        files: Vec<PathBuf>,
        reference: Frame,
    ) -> Self {
        let mut reference = reference;
        let backbone = reference.backbone_mask();
        reference.move_to_centroid(&backbone);
        Self {
            name: name.to_string(),
            format,
            flags,
            files,
            reference,
            average: None,
        }
    }

    #[inline]
    pub fn frame_count(&self) -> usize {
        self.files.len()
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn file(&self, index: usize) -> Option<&Path> {
        self.files.get(index).map(PathBuf::as_path)
    }

    pub fn reference(&self) -> &Frame {
        &self.reference
    }

    pub fn average(&self) -> Option<&Frame> {
        self.average.as_ref()
    }

    pub(crate) fn set_average(&mut self, average: Frame) {
        self.average = Some(average);
    }

    pub(crate) fn clear_average(&mut self) {
        self.average = None;
    }

    pub(crate) fn replace_source(&mut self, files: Vec<PathBuf>, format: FrameFormat, flags: StreamFlags, reference: Frame) {
        let fresh = Stream::new(&self.name, format, flags, files, reference);
        *self = fresh;
    }
}
