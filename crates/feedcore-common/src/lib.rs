// feedcore-common: the frame codec, typed errors, tracing, configuration
// and shared application context used by both the manager and worker
// binaries.

pub mod config;
pub mod context;
pub mod errors;
pub mod frame;
pub mod ids;
pub mod tracing;

pub use config::SupervisorConfig;
pub use context::SupervisorContext;
pub use errors::{DispatchError, ProtocolError};
pub use frame::{FrameLimits, RequestFrame, ResponseFrame};
pub use ids::WorkerId;
pub use tracing::{TraceManager, Tracing};
