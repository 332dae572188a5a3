use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Run name; prefixes every collector log file.
    pub name: String,

    /// Collector sampling cadence.
    pub interval: Duration,

    /// How long each collector samples before exiting on its own.
    pub duration: Duration,

    /// Local directory receiving the collector logs.
    pub log_dir: PathBuf,

    /// Directory appended to `PATH` on the remote side so the collector binary is found.
    pub remote_path: Option<String>,

    pub collector_program: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            name: "test".to_string(),
            interval: Duration::from_millis(20),
            duration: Duration::from_secs(100),
            log_dir: PathBuf::from("."),
            remote_path: None,
            collector_program: "perfmon".to_string(),
        }
    }
}
