//! The manager-side handle to one worker child: its channel, busy/idle
//! state, and process identity.

use serde_json::{Map, Value};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::process::Child;

use feedcore_common::errors::ProtocolError;
use feedcore_common::frame::{self, FrameLimits, RequestFrame, ResponseFrame};
use feedcore_common::ids::WorkerId;

/// Lifecycle state of a worker handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Running,
    WriteClosed,
    Dead,
}

/// The parent-side object wrapping the channel to one child.
pub struct WorkerHandle {
    pub id: WorkerId,
    pub pid: Option<u32>,
    child: Child,
    read_half: OwnedReadHalf,
    write_half: OwnedWriteHalf,
    busy: bool,
    state: WorkerState,
    limits: FrameLimits,
}

impl WorkerHandle {
    pub fn new(
        id: WorkerId,
        child: Child,
        read_half: OwnedReadHalf,
        write_half: OwnedWriteHalf,
        limits: FrameLimits,
    ) -> Self {
        let pid = child.id();
        Self {
            id,
            pid,
            child,
            read_half,
            write_half,
            busy: false,
            state: WorkerState::Running,
            limits,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Encode and send a request. Precondition: not busy. Sets `busy` on
    /// success; write failures mark the handle dead so the next poll cycle
    /// observes it as needing a respawn.
    pub async fn dispatch(
        &mut self,
        method: impl Into<String>,
        args: Vec<Value>,
        kw: Map<String, Value>,
    ) -> Result<(), ProtocolError> {
        debug_assert!(!self.busy, "dispatch called on a busy worker");
        let request = RequestFrame::new(method, args, kw);
        match frame::write_request(&mut self.write_half, &request, self.limits.max_request_bytes).await {
            Ok(()) => {
                self.busy = true;
                Ok(())
            }
            Err(e) => {
                self.state = WorkerState::Dead;
                Err(e)
            }
        }
    }

    /// Read one response. Precondition: busy. `busy` is cleared here, and
    /// only here, on success — never on dispatch, never a second time in the
    /// poll loop.
    pub async fn receive(&mut self) -> Result<ResponseFrame, ProtocolError> {
        debug_assert!(self.busy, "receive called on an idle worker");
        match frame::read_response(&mut self.read_half, self.limits.max_response_bytes).await {
            Ok(response) => {
                self.busy = false;
                Ok(response)
            }
            Err(e) => {
                self.state = WorkerState::Dead;
                Err(e)
            }
        }
    }

    /// Shut the write half, signalling end-of-input. The child exits after
    /// finishing any in-flight job.
    pub async fn close_write(&mut self) {
        use tokio::io::AsyncWriteExt;
        let _ = self.write_half.shutdown().await;
        if self.state == WorkerState::Running {
            self.state = WorkerState::WriteClosed;
        }
    }

    /// Non-blocking check on the child process. `Ok(Some(status))` if it has
    /// exited, `Ok(None)` if still running.
    pub fn reap(&mut self) -> std::io::Result<Option<std::process::ExitStatus>> {
        self.child.try_wait()
    }
}

// Busy/state transitions are exercised end-to-end in manager.rs's unit
// tests and the crate's integration tests, which spawn real worker
// processes; a real `WorkerHandle` can't be constructed without one.
