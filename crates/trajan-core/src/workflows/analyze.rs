use crate::core::io::traits::FrameLoader;
use crate::core::metrics::script::ScriptHost;
use crate::engine::config::BuildConfig;
use crate::engine::context::BuildContext;
use crate::engine::error::EngineError;
use crate::engine::pool::WorkerPool;
use crate::engine::progress::{CancellationToken, Progress, ProgressReporter};
use crate::engine::project::{BuildOutcome, Project};
use std::sync::Arc;
use tracing::{info, instrument};

/// Options of one analysis run.
#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    pub config: BuildConfig,
    /// Recompute results that are already actual.
    pub rebuild_all: bool,
}

/// Builds every outstanding result of `project`.
///
/// Creates a worker pool sized from the configuration, runs
/// [`Project::build`], and returns its outcome. Results stay inside the
/// project; read them through [`Project::results`].
#[instrument(skip_all, name = "analyze_workflow")]
pub fn run(
    project: &mut Project,
    options: &AnalyzeOptions,
    loader: &dyn FrameLoader,
    script_host: Arc<dyn ScriptHost>,
    reporter: &ProgressReporter,
    cancel: &CancellationToken,
) -> Result<BuildOutcome, EngineError> {
    reporter.report(Progress::PhaseStart {
        name: "Preparation",
    });
    let pool = WorkerPool::from_config(&options.config)?;
    info!(
        threads = pool.thread_count(),
        kernel = %options.config.kernel,
        rebuild_all = options.rebuild_all,
        "Starting analysis."
    );
    reporter.report(Progress::PhaseFinish);

    let ctx = BuildContext::new(
        &options.config,
        &pool,
        loader,
        &script_host,
        reporter,
        cancel,
    );
    project.build(options.rebuild_all, &ctx)
}
