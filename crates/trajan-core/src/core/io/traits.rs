use crate::core::models::frame::Frame;
use crate::core::models::stream::{FrameFormat, StreamFlags};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to open '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: ParseErrorKind },
    #[error("No atoms left in '{0}' after filtering")]
    NoAtoms(PathBuf),
    #[error("Frame source '{0}' is not available")]
    NotFound(PathBuf),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseErrorKind {
    #[error("Invalid integer format in columns {columns} (value: '{value}')")]
    InvalidInt { columns: &'static str, value: String },
    #[error("Invalid float format in columns {columns} (value: '{value}')")]
    InvalidFloat { columns: &'static str, value: String },
    #[error("Line is too short for an ATOM/HETATM record")]
    LineTooShort,
}

/// Produces frames for a stream.
///
/// The engine calls `load` concurrently from every worker of the pool;
/// `worker` is the index of the calling worker and may be used to keep
/// per-thread scratch state. Implementations must not assume any frame order.
pub trait FrameLoader: Send + Sync + fmt::Debug {
    fn load(
        &self,
        worker: usize,
        format: FrameFormat,
        path: &Path,
        flags: StreamFlags,
    ) -> Result<Frame, LoadError>;
}
