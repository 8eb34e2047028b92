use super::file::FileConfig;
use std::path::PathBuf;
use trajan::engine::config::BuildConfig;

pub struct AppConfig {
    pub project_path: PathBuf,
    /// Directory relative paths in the project file are resolved against.
    pub project_dir: PathBuf,
    pub output_dir: PathBuf,
    pub rebuild_all: bool,
    pub build_config: BuildConfig,
    pub project: FileConfig,
}
