use trajan::core::alignment::jacobi::DEFAULT_MAX_SWEEPS;
use trajan::engine::config::KernelPreference;

pub struct DefaultsConfig {
    pub kernel: KernelPreference,
    pub max_jacobi_sweeps: usize,
    pub single_threaded: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            kernel: KernelPreference::Auto,
            max_jacobi_sweeps: DEFAULT_MAX_SWEEPS,
            single_threaded: false,
        }
    }
}
