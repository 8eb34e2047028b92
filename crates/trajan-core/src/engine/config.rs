use crate::core::alignment::jacobi::DEFAULT_MAX_SWEEPS;
use crate::core::alignment::kernel::KernelKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// Which alignment kernel the engine should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KernelPreference {
    /// The fastest kernel the running CPU supports.
    #[default]
    Auto,
    Scalar,
    Simd,
}

impl KernelPreference {
    pub fn resolve(self) -> Result<KernelKind, ConfigError> {
        match self {
            KernelPreference::Auto => Ok(KernelKind::detect()),
            KernelPreference::Scalar => Ok(KernelKind::Scalar),
            KernelPreference::Simd if KernelKind::simd_available() => Ok(KernelKind::Simd),
            KernelPreference::Simd => Err(ConfigError::InvalidParameter {
                name: "kernel",
                reason: "SIMD kernel is not supported on this CPU".into(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildConfig {
    /// Worker count; `None` uses the hardware concurrency.
    pub threads: Option<usize>,
    /// Forces a single worker regardless of `threads`.
    pub single_threaded: bool,
    /// Resolved alignment kernel.
    pub kernel: KernelKind,
    /// Sweep bound of the Jacobi eigensolver.
    pub max_jacobi_sweeps: usize,
}

impl BuildConfig {
    /// Number of workers the pool will be created with.
    pub fn worker_count(&self) -> usize {
        if self.single_threaded {
            return 1;
        }
        self.threads
            .unwrap_or_else(|| std::thread::available_parallelism().map_or(1, |n| n.get()))
            .max(1)
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            threads: None,
            single_threaded: false,
            kernel: KernelKind::detect(),
            max_jacobi_sweeps: DEFAULT_MAX_SWEEPS,
        }
    }
}

#[derive(Default)]
pub struct BuildConfigBuilder {
    threads: Option<usize>,
    single_threaded: bool,
    kernel: Option<KernelPreference>,
    max_jacobi_sweeps: Option<usize>,
}

impl BuildConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }
    pub fn single_threaded(mut self, single_threaded: bool) -> Self {
        self.single_threaded = single_threaded;
        self
    }
    pub fn kernel(mut self, kernel: KernelPreference) -> Self {
        self.kernel = Some(kernel);
        self
    }
    pub fn max_jacobi_sweeps(mut self, sweeps: usize) -> Self {
        self.max_jacobi_sweeps = Some(sweeps);
        self
    }

    pub fn build(self) -> Result<BuildConfig, ConfigError> {
        if self.threads == Some(0) {
            return Err(ConfigError::InvalidParameter {
                name: "threads",
                reason: "must be at least 1".into(),
            });
        }
        let max_jacobi_sweeps = self
            .max_jacobi_sweeps
            .ok_or(ConfigError::MissingParameter("max_jacobi_sweeps"))?;
        if max_jacobi_sweeps == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "max_jacobi_sweeps",
                reason: "must be at least 1".into(),
            });
        }
        let kernel = self
            .kernel
            .ok_or(ConfigError::MissingParameter("kernel"))?
            .resolve()?;

        Ok(BuildConfig {
            threads: self.threads,
            single_threaded: self.single_threaded,
            kernel,
            max_jacobi_sweeps,
        })
    }
}
