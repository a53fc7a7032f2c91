//! The supervisor's application context: trace sources and shutdown
//! coordination shared by the manager and the dispatch loop.
//!
//! A much smaller cousin of a general-purpose DI container — this crate's
//! domain needs exactly two shared services, so it gets exactly two fields
//! instead of a generic service registry.

use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use crate::tracing::{TraceManager, Tracing};

/// Shared context handed to the manager and the dispatch loop. Mirrors the
/// teacher's `HostContext` owning a `CancellationToken` for coordinated
/// shutdown, minus the generic `TypeId`-keyed service registry this
/// domain's two services don't need.
pub struct SupervisorContext {
    trace_manager: TraceManager,
    log_dir: Option<PathBuf>,
    shutdown: CancellationToken,
}

impl SupervisorContext {
    pub fn new(log_dir: Option<PathBuf>) -> Self {
        Self {
            trace_manager: TraceManager::new(),
            log_dir,
            shutdown: CancellationToken::new(),
        }
    }

    /// A named trace source for the given component.
    pub fn trace(&self, name: &str) -> Tracing {
        self.trace_manager.get(name)
    }

    /// Open (creating if necessary) the per-worker log file for `worker_id`,
    /// if a log directory was configured. Matches the base spec's
    /// `{method}_open_log(fork_id)` convention, realized here as a fixed
    /// hook rather than a reflective call.
    pub fn open_worker_log(&self, worker_id: u32) -> std::io::Result<Option<std::fs::File>> {
        match &self.log_dir {
            None => Ok(None),
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                let path = dir.join(format!("worker-{}.log", worker_id));
                std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map(Some)
            }
        }
    }

    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }

    /// A clone of the shutdown token, cheap to hand to a `ctrlc` handler or
    /// a `tokio::select!` arm — cancelling any clone cancels them all.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn request_shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}
