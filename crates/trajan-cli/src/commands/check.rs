use crate::cli::CheckArgs;
use crate::config::builder;
use crate::config::file::FileConfig;
use crate::error::{CliError, Result};
use std::path::Path;
use tracing::{info, warn};

pub async fn run(args: CheckArgs) -> Result<()> {
    let file = FileConfig::from_file(&args.project)?;
    let base_dir = args.project.parent().unwrap_or(Path::new(""));

    let problems = builder::validate(&file, base_dir);
    if !problems.is_empty() {
        for problem in &problems {
            warn!("{}", problem);
        }
        return Err(CliError::Validation(problems));
    }

    info!(
        streams = file.stream.len(),
        data_sources = file.data_source.len(),
        results = file.result.len(),
        "Project description is valid."
    );
    println!(
        "✓ '{}': {} stream(s), {} data source(s), {} result(s)",
        args.project.display(),
        file.stream.len(),
        file.data_source.len(),
        file.result.len()
    );
    Ok(())
}
