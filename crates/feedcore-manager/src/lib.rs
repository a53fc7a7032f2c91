// feedcore-manager: the fixed-size worker pool, the manager that owns it,
// and the scheduler driver that alternates dispatch fills with poll waits.

pub mod dispatch_loop;
pub mod manager;
pub mod work_source;
pub mod worker_handle;

pub use dispatch_loop::{default_callbacks, DispatchLoop, DoneCallbacks};
pub use manager::{Manager, ManagerConfig, PollEvent};
pub use work_source::{FeedItem, StaticHunter, WorkSource};
pub use worker_handle::{WorkerHandle, WorkerState};
