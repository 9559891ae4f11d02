//! Engine configuration.
//!
//! Values come from built-in defaults, then the environment, then command-line
//! flags (applied by the binary), each layer overriding the previous one.

use std::path::PathBuf;

/// Executable invoked by process steps when nothing else is configured
pub const DEFAULT_EXECUTABLE: &str = "sfdx";

/// Environment variable overriding the wrapped executable
pub const EXECUTABLE_ENV: &str = "PLAN_EXECUTOR_BIN";

/// Default location of the resume checkpoint, relative to the working directory
pub const DEFAULT_CHECKPOINT_PATH: &str = ".plan-executor/checkpoint.json";

/// Settings shared by every step of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// External executable run by `process` steps
    pub executable: String,
    /// Launch process steps through `sh -c`
    pub use_shell: bool,
    /// Resume checkpoint file; `None` disables checkpointing
    pub checkpoint_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            executable: DEFAULT_EXECUTABLE.to_string(),
            use_shell: false,
            checkpoint_path: Some(PathBuf::from(DEFAULT_CHECKPOINT_PATH)),
        }
    }
}

impl EngineConfig {
    /// Defaults overlaid with the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overlaid with values from `lookup`
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(executable) = lookup(EXECUTABLE_ENV).filter(|v| !v.trim().is_empty()) {
            config.executable = executable.trim().to_string();
        }
        config
    }

    pub fn with_executable(mut self, executable: impl Into<String>) -> Self {
        self.executable = executable.into();
        self
    }

    pub fn with_shell(mut self, use_shell: bool) -> Self {
        self.use_shell = use_shell;
        self
    }

    pub fn with_checkpoint(mut self, path: Option<PathBuf>) -> Self {
        self.checkpoint_path = path;
        self
    }
}
