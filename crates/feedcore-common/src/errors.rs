//! Typed failure modes at the library seams. Everything above these seams
//! (CLI parsing, binary setup) uses `anyhow::Result` with `.context(...)`.

use crate::ids::WorkerId;

/// Failures at the frame codec / channel boundary. `Eof` and `Io` are caught
/// by the manager and converted into the respawn path; they never reach the
/// external scheduler.
#[derive(thiserror::Error, Debug)]
pub enum ProtocolError {
    #[error("frame exceeds {max} bytes (got {actual})")]
    FrameTooLarge { max: usize, actual: usize },

    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("channel closed")]
    Eof,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failures in the manager's worker-pool bookkeeping.
#[derive(thiserror::Error, Debug)]
pub enum DispatchError {
    #[error("worker {0} is busy")]
    WorkerBusy(WorkerId),

    #[error("no idle worker available")]
    NoIdleWorker,

    #[error("failed to spawn worker {id}: {source}")]
    SpawnFailed {
        id: WorkerId,
        #[source]
        source: std::io::Error,
    },
}
