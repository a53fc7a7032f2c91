//! The fixed-size worker pool: spawns children, multiplexes their
//! readiness, respawns crashed children with a stable ID.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use tokio::net::UnixListener;
use tokio_util::sync::CancellationToken;

use feedcore_common::errors::{DispatchError, ProtocolError};
use feedcore_common::frame::{FrameLimits, ResponseFrame};
use feedcore_common::ids::WorkerId;
use feedcore_common::tracing::Tracing;
use feedcore_sdk::trace::TraceWriter;

use crate::worker_handle::{WorkerHandle, WorkerState};

/// What `Manager::poll` observed for one worker during a single cycle.
pub enum PollEvent {
    /// The worker replied; `active` should be decremented and any
    /// registered `{method}_done` callback invoked with the response.
    Completed { id: WorkerId, response: ResponseFrame },
    /// The worker's channel closed (crash, or a send failure). The manager
    /// has already respawned it with the same ID by the time this is
    /// returned.
    Respawned { id: WorkerId },
}

/// Spawn-time configuration for the worker pool.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub pool_size: u32,
    pub job_timeout: Option<Duration>,
    pub worker_binary: PathBuf,
    pub socket_dir: PathBuf,
    pub limits: FrameLimits,
    pub log_dir: Option<PathBuf>,
}

/// Owns the fixed-size worker pool.
pub struct Manager {
    config: ManagerConfig,
    listener: UnixListener,
    socket_path: PathBuf,
    workers: BTreeMap<WorkerId, WorkerHandle>,
    active: usize,
    current_workers: usize,
    trace: Tracing,
    shutdown: CancellationToken,
}

impl Manager {
    /// Bind the listening socket children will connect back to. Does not
    /// spawn any children yet; call [`Manager::start`] for that.
    pub fn bind(config: ManagerConfig, trace: Tracing) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.socket_dir)?;
        let socket_path = config.socket_dir.join(format!("feedcore-manager-{}.sock", std::process::id()));
        if socket_path.exists() {
            std::fs::remove_file(&socket_path)?;
        }
        let listener = UnixListener::bind(&socket_path)?;
        Ok(Self {
            config,
            listener,
            socket_path,
            workers: BTreeMap::new(),
            active: 0,
            current_workers: 0,
            trace,
            shutdown: CancellationToken::new(),
        })
    }

    /// Wire an external shutdown signal in. Once cancelled, a dead worker is
    /// removed and reaped but not respawned — per §4.4, a crash observed
    /// while shutting down should not fork a replacement right before the
    /// program exits.
    pub fn set_shutdown_token(&mut self, token: CancellationToken) {
        self.shutdown = token;
    }

    /// Fork `N` children with IDs `0..N`, accepting their connect-back and
    /// populating the worker map.
    pub async fn start(&mut self) -> anyhow::Result<()> {
        for raw_id in 0..self.config.pool_size {
            let id = WorkerId::new(raw_id);
            let handle = self.spawn_worker(id).await?;
            self.workers.insert(id, handle);
            self.current_workers += 1;
        }
        self.trace.info(&format!("started {} workers", self.current_workers));
        Ok(())
    }

    async fn spawn_worker(&mut self, id: WorkerId) -> anyhow::Result<WorkerHandle> {
        let mut command = tokio::process::Command::new(&self.config.worker_binary);
        command
            .arg("--worker-id")
            .arg(id.get().to_string())
            .arg("--socket")
            .arg(&self.socket_path)
            .arg("--max-request-bytes")
            .arg(self.config.limits.max_request_bytes.to_string())
            .arg("--max-response-bytes")
            .arg(self.config.limits.max_response_bytes.to_string());
        if let Some(timeout) = self.config.job_timeout {
            command.arg("--job-timeout-secs").arg(timeout.as_secs_f64().to_string());
        }
        if let Some(log_dir) = &self.config.log_dir {
            command.arg("--log-dir").arg(log_dir);
        }
        command.stdin(std::process::Stdio::null());

        let child = command.spawn().map_err(|source| DispatchError::SpawnFailed { id, source })?;

        let (stream, _addr) = self.listener.accept().await?;
        let (read_half, write_half) = stream.into_split();
        Ok(WorkerHandle::new(id, child, read_half, write_half, self.config.limits))
    }

    /// Any idle handle with `active < N`; iterated in ascending ID order so
    /// selection is deterministic.
    pub fn find_idle_worker(&mut self) -> Option<WorkerId> {
        if self.active >= self.config.pool_size as usize {
            return None;
        }
        self.workers
            .iter()
            .find(|(_, handle)| !handle.is_busy() && handle.state() == WorkerState::Running)
            .map(|(&id, _)| id)
    }

    pub async fn dispatch_on(
        &mut self,
        id: WorkerId,
        method: impl Into<String>,
        args: Vec<serde_json::Value>,
        kw: serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), ProtocolError> {
        let handle = self.workers.get_mut(&id).expect("dispatch target must exist");
        match handle.dispatch(method, args, kw).await {
            Ok(()) => {
                self.active += 1;
                Ok(())
            }
            Err(e) => {
                self.handle_worker_death(id).await;
                Err(e)
            }
        }
    }

    /// Wait for readable events across all busy workers up to `timeout`,
    /// draining completions and respawning dead children as they're found.
    pub async fn poll(&mut self, timeout: Option<Duration>) -> Vec<PollEvent> {
        let sleep = tokio::time::sleep(timeout.unwrap_or(Duration::from_secs(3600)));
        tokio::pin!(sleep);

        let mut pending = FuturesUnordered::new();
        for (&id, handle) in self.workers.iter_mut() {
            if handle.is_busy() {
                pending.push(async move {
                    let result = handle.receive().await;
                    (id, result)
                });
            }
        }

        let mut events = Vec::new();
        if pending.is_empty() {
            if timeout.is_some() {
                (&mut sleep).await;
            }
            return events;
        }

        let mut dead = Vec::new();
        loop {
            tokio::select! {
                _ = &mut sleep => break,
                next = pending.next() => {
                    match next {
                        Some((id, Ok(response))) => {
                            self.active = self.active.saturating_sub(1);
                            events.push(PollEvent::Completed { id, response });
                        }
                        Some((id, Err(_eof_or_io))) => {
                            self.active = self.active.saturating_sub(1);
                            dead.push(id);
                        }
                        None => break,
                    }
                }
            }
        }
        drop(pending);
        for id in dead {
            if self.handle_worker_death(id).await {
                events.push(PollEvent::Respawned { id });
            }
        }
        events
    }

    /// Remove and reap a dead handle, then respawn it under the same ID
    /// unless shutdown has been requested. Returns whether a replacement was
    /// actually spawned.
    async fn handle_worker_death(&mut self, id: WorkerId) -> bool {
        if let Some(mut dead) = self.workers.remove(&id) {
            let _ = dead.reap();
        }
        self.current_workers = self.current_workers.saturating_sub(1);

        if self.shutdown.is_cancelled() {
            self.trace.verbose(&format!("worker {} died during shutdown, not respawning", id));
            return false;
        }

        self.trace.warning(&format!("worker {} died, respawning", id));
        match self.spawn_worker(id).await {
            Ok(handle) => {
                self.workers.insert(id, handle);
                self.current_workers += 1;
                true
            }
            Err(e) => {
                self.trace.error(&format!("failed to respawn worker {}: {}", id, e));
                false
            }
        }
    }

    pub fn active_workers(&self) -> usize {
        self.active
    }

    pub fn current_workers(&self) -> usize {
        self.current_workers
    }

    pub fn nworkers(&self) -> usize {
        self.config.pool_size as usize
    }

    /// Close every handle's write half, then drain one poll cycle for
    /// in-flight replies. Idempotent: a second call finds no busy handles.
    pub async fn close_all(&mut self, timeout: Duration) {
        for handle in self.workers.values_mut() {
            handle.close_write().await;
        }
        let _ = self.poll(Some(timeout)).await;
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

impl Drop for Manager {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}
