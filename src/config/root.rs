use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RootConfig {
    /// Command prefix that runs a shell command line as root. The quoted service
    /// command line is appended as the last argument. Empty runs the service directly.
    /// TOML: `root.elevate_command`. Default: `["su", "-c"]`.
    #[serde(default = "default_elevate_command")]
    pub elevate_command: Vec<String>,

    /// Upper bound for root acquisition, service start-up and the first health probe.
    /// TOML: `root.timeout_secs`. Default: `15`.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Binary launched with `serve`. Defaults to the running executable.
    /// TOML: `root.service_binary`.
    #[serde(default)]
    pub service_binary: Option<PathBuf>,
}

impl RootConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for RootConfig {
    fn default() -> Self {
        Self {
            elevate_command: default_elevate_command(),
            timeout_secs: default_timeout_secs(),
            service_binary: None,
        }
    }
}

fn default_elevate_command() -> Vec<String> {
    vec!["su".to_string(), "-c".to_string()]
}

fn default_timeout_secs() -> u64 {
    15
}
