use thiserror::Error;

use super::config::ConfigError;
use crate::core::io::traits::LoadError;
use crate::core::models::analysis::ResultLayout;
use crate::core::models::data_source::DataSourceKind;
use crate::core::models::ids::{DataSourceId, ResultId, StreamId};
use crate::core::selection::SelectionError;
use std::path::PathBuf;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Stream not found: {0:?}")]
    StreamNotFound(StreamId),

    #[error("Data source not found: {0:?}")]
    DataSourceNotFound(DataSourceId),

    #[error("Result not found: {0:?}")]
    ResultNotFound(ResultId),

    #[error("A {kind} data source cannot be shown in a {layout:?}-based result")]
    LayoutMismatch {
        kind: DataSourceKind,
        layout: ResultLayout,
    },

    #[error("Data source '{name}' of kind {kind} needs {expected} selection(s)")]
    MissingSelection {
        name: String,
        kind: DataSourceKind,
        expected: usize,
    },

    #[error("Invalid selection in data source '{name}': {source}")]
    Selection {
        name: String,
        #[source]
        source: SelectionError,
    },

    #[error("Failed to load reference frame '{path}': {source}")]
    ReferenceLoad {
        path: PathBuf,
        #[source]
        source: LoadError,
    },

    #[error("No {layout:?}-based series was produced for data source {data_source:?}")]
    SeriesMissing {
        data_source: DataSourceId,
        layout: ResultLayout,
    },

    #[error("Stream '{0}' has no frames")]
    EmptyStream(String),

    #[error("Failed to create worker pool: {0}")]
    WorkerPool(String),

    #[error("Invalid configuration: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },
}
