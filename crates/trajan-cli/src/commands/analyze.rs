use crate::cli::AnalyzeArgs;
use crate::config::builder;
use crate::error::{CliError, Result};
use crate::ui::{CliProgressHandler, UiEvent};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task;
use tracing::{debug, info, warn};
use trajan::core::io::pdb::PdbFrameLoader;
use trajan::core::io::table;
use trajan::core::metrics::script::NullScriptHost;
use trajan::core::models::analysis::AnalysisResult;
use trajan::engine::progress::{CancellationToken, ProgressReporter};
use trajan::engine::project::{BuildOutcome, Project};
use trajan::workflows::analyze::{self, AnalyzeOptions};

pub async fn run(
    args: AnalyzeArgs,
    threads: Option<usize>,
    ui_sender: mpsc::Sender<UiEvent>,
) -> Result<()> {
    info!("Building configuration...");
    let config = builder::build_config(&args, threads)?;
    debug!(project = %config.project_path.display(), "Configuration resolved: {:?}", config.build_config);

    let loader = PdbFrameLoader;
    info!("Loading reference frames...");
    let mut project =
        task::block_in_place(|| builder::build_project(&config.project, &config.project_dir, &loader))?;

    let cancel = CancellationToken::new();
    let interrupt = {
        let token = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received; cancelling the build.");
                token.cancel();
            }
        })
    };

    let progress_handler = CliProgressHandler::new(ui_sender);
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());
    let options = AnalyzeOptions {
        config: config.build_config.clone(),
        rebuild_all: config.rebuild_all,
    };

    let outcome = task::block_in_place(|| {
        analyze::run(
            &mut project,
            &options,
            &loader,
            Arc::new(NullScriptHost),
            &reporter,
            &cancel,
        )
    });
    interrupt.abort();

    match outcome? {
        BuildOutcome::Cancelled => return Err(CliError::Cancelled),
        BuildOutcome::UpToDate => info!("Every result was already up to date."),
        BuildOutcome::Built(report) => info!(
            results = report.results_built,
            streams = report.streams_processed,
            frames = report.frames_processed,
            "Build finished in {:.2?}.",
            report.elapsed
        ),
    }

    let written = task::block_in_place(|| export_results(&project, &config.output_dir))?;
    info!(
        "Wrote {} table(s) to '{}'.",
        written.len(),
        config.output_dir.display()
    );
    Ok(())
}

/// File-name-safe form of a result name.
fn file_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() {
        "result".to_string()
    } else {
        stem
    }
}

fn column_names(project: &Project, result: &AnalysisResult) -> Vec<String> {
    result
        .sources()
        .iter()
        .map(|r| {
            project
                .data_source(r.data_source)
                .map(|ds| ds.name.clone())
                .unwrap_or_default()
        })
        .collect()
}

fn write_table<F, E>(path: PathBuf, write: F) -> Result<PathBuf>
where
    F: FnOnce(BufWriter<File>) -> std::result::Result<(), E>,
    E: Into<anyhow::Error>,
{
    let file = File::create(&path)?;
    write(BufWriter::new(file)).map_err(|e| CliError::Export {
        path: path.clone(),
        source: e.into(),
    })?;
    debug!(path = %path.display(), "Table written.");
    Ok(path)
}

/// Writes the series, statistics and correlation tables of every result.
pub fn export_results(project: &Project, output_dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(output_dir)?;
    let mut written = Vec::new();
    for (_, result) in project.results() {
        let columns = column_names(project, result);
        let stem = file_stem(&result.name);

        written.push(write_table(output_dir.join(format!("{stem}.csv")), |w| {
            table::write_series(w, result, &columns)
        })?);
        written.push(write_table(
            output_dir.join(format!("{stem}_stats.csv")),
            |w| table::write_statistics(w, result, &columns),
        )?);
        written.push(write_table(
            output_dir.join(format!("{stem}_correlation.csv")),
            |w| table::write_correlation(w, result, &columns),
        )?);
    }
    Ok(written)
}
