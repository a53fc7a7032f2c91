//! CLI configuration for the supervisor binary, with environment-variable
//! fallback for the options that make sense to set once in a unit file.

use std::path::PathBuf;

use clap::Parser;

/// Configuration for the manager/dispatch-loop binary.
#[derive(Debug, Clone, Parser)]
#[command(name = "feedcore-manager", about = "Direct-drive feed fetcher supervisor")]
pub struct SupervisorConfig {
    /// Desired worker pool size.
    #[arg(long, env = "FETCHER_WORKERS", default_value_t = 4)]
    pub workers: u32,

    /// Per-call wall-clock limit inside each child, in seconds. `0` disables
    /// the timeout.
    #[arg(long = "job-timeout-secs", env = "FETCHER_JOB_TIMEOUT_SECS", default_value_t = 60.0)]
    pub job_timeout_seconds: f64,

    /// Grid period for the driver's periodic wake, in seconds.
    #[arg(long = "period-secs", env = "FETCHER_PERIOD_SECS", default_value_t = 1.0)]
    pub period_seconds: f64,

    /// Maximum size of a request frame, in bytes.
    #[arg(long = "max-request-bytes", default_value_t = crate::frame::DEFAULT_MAX_REQUEST_BYTES)]
    pub max_request_bytes: usize,

    /// Maximum size of a response frame, in bytes.
    #[arg(long = "max-response-bytes", default_value_t = crate::frame::DEFAULT_MAX_RESPONSE_BYTES)]
    pub max_response_bytes: usize,

    /// Path to the worker child executable. Defaults to a binary named
    /// `feedcore-worker` next to the supervisor's own executable.
    #[arg(long = "worker-binary")]
    pub worker_binary: Option<PathBuf>,

    /// Directory for per-worker log files. When unset, children inherit the
    /// supervisor's stdout/stderr.
    #[arg(long = "log-dir", env = "FETCHER_LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

impl SupervisorConfig {
    /// Job timeout as a `Duration`, or `None` if timeouts are disabled.
    pub fn job_timeout(&self) -> Option<std::time::Duration> {
        if self.job_timeout_seconds <= 0.0 {
            None
        } else {
            Some(std::time::Duration::from_secs_f64(self.job_timeout_seconds))
        }
    }

    /// Grid period as a `Duration`.
    pub fn period(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.period_seconds)
    }

    /// Resolve the worker binary path: the configured override, or a binary
    /// named `feedcore-worker` next to the currently running executable.
    pub fn resolve_worker_binary(&self) -> anyhow::Result<PathBuf> {
        if let Some(path) = &self.worker_binary {
            return Ok(path.clone());
        }
        let exe = std::env::current_exe()?;
        let dir = exe
            .parent()
            .ok_or_else(|| anyhow::anyhow!("current executable has no parent directory"))?;
        let candidate = dir.join(if cfg!(windows) {
            "feedcore-worker.exe"
        } else {
            "feedcore-worker"
        });
        Ok(candidate)
    }
}
