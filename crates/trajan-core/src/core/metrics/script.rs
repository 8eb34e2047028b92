use super::{MetricEvaluator, MetricInput};
use crate::core::models::frame::Frame;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScriptError {
    #[error("No script runtime is available")]
    Unavailable,
    #[error("Data source has no script attached")]
    Missing,
    #[error("Script evaluation failed: {0}")]
    Evaluation(String),
}

/// Runtime that executes user-defined metric scripts.
///
/// Called concurrently from every worker.
pub trait ScriptHost: Send + Sync + fmt::Debug {
    fn evaluate(&self, script: &str, frame: &Frame) -> Result<f64, ScriptError>;
}

/// Host used when no runtime is configured; every evaluation fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullScriptHost;

impl ScriptHost for NullScriptHost {
    fn evaluate(&self, _script: &str, _frame: &Frame) -> Result<f64, ScriptError> {
        Err(ScriptError::Unavailable)
    }
}

/// Evaluates the data source's script, failing closed to 0.
#[derive(Debug, Clone)]
pub struct ScriptEvaluator {
    host: Arc<dyn ScriptHost>,
}

impl ScriptEvaluator {
    pub fn new(host: Arc<dyn ScriptHost>) -> Self {
        Self { host }
    }
}

impl MetricEvaluator for ScriptEvaluator {
    fn evaluate(&self, input: &MetricInput) -> f64 {
        let result = match &input.data_source.script {
            Some(script) => self.host.evaluate(&script.source, input.frame),
            None => Err(ScriptError::Missing),
        };
        match result {
            Ok(value) if value.is_finite() => value,
            Ok(value) => {
                warn!(data_source = %input.data_source.name, "Script returned {}; using 0", value);
                0.0
            }
            Err(e) => {
                warn!(data_source = %input.data_source.name, "{}; using 0", e);
                0.0
            }
        }
    }
}
