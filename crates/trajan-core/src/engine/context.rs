use super::config::BuildConfig;
use super::pool::WorkerPool;
use super::progress::{CancellationToken, ProgressReporter};
use crate::core::io::traits::FrameLoader;
use crate::core::metrics::script::ScriptHost;
use std::sync::Arc;

/// Shared collaborators of one [`Project::build`](super::project::Project::build) call.
#[derive(Clone, Copy)]
pub struct BuildContext<'a> {
    pub config: &'a BuildConfig,
    pub pool: &'a WorkerPool,
    pub loader: &'a dyn FrameLoader,
    pub script_host: &'a Arc<dyn ScriptHost>,
    pub reporter: &'a ProgressReporter<'a>,
    pub cancel: &'a CancellationToken,
}

impl<'a> BuildContext<'a> {
    pub fn new(
        config: &'a BuildConfig,
        pool: &'a WorkerPool,
        loader: &'a dyn FrameLoader,
        script_host: &'a Arc<dyn ScriptHost>,
        reporter: &'a ProgressReporter<'a>,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            config,
            pool,
            loader,
            script_host,
            reporter,
            cancel,
        }
    }
}
