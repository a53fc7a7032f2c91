//! The scheduler driver: alternates dispatch fills (hand every idle worker
//! a job) with poll waits (drain completions), woken early by any reply or,
//! failing that, by a fixed periodic grid tick.

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use feedcore_common::frame::ResponseFrame;
use feedcore_common::tracing::Tracing;
use feedcore_sdk::trace::TraceWriter;

use crate::manager::{Manager, PollEvent};
use crate::work_source::WorkSource;

const MIN_POLL_WAIT: Duration = Duration::from_millis(1);

/// Completion callbacks keyed by method name — the `{method}_done`
/// convention from the base design, resolved here by a static lookup
/// instead of reflection.
pub struct DoneCallbacks {
    callbacks: HashMap<&'static str, Box<dyn Fn(&ResponseFrame, &dyn WorkSource) + Send + Sync>>,
}

impl DoneCallbacks {
    pub fn new() -> Self {
        Self { callbacks: HashMap::new() }
    }

    pub fn register(
        &mut self,
        method: &'static str,
        callback: impl Fn(&ResponseFrame, &dyn WorkSource) + Send + Sync + 'static,
    ) {
        self.callbacks.insert(method, Box::new(callback));
    }

    fn invoke(&self, response: &ResponseFrame, source: &dyn WorkSource) {
        if let Some(callback) = self.callbacks.get(response.method.as_str()) {
            callback(response, source);
        }
    }
}

impl Default for DoneCallbacks {
    fn default() -> Self {
        Self::new()
    }
}

/// The default callback table: `fetch` pairs with the `WorkSource`'s own
/// `completed` hook, matching `fetch_done` calling `hunter.completed(item)`
/// in the reference scheduler.
pub fn default_callbacks() -> DoneCallbacks {
    let mut callbacks = DoneCallbacks::new();
    callbacks.register("fetch", |response, source| source.completed(response));
    callbacks
}

/// Drives the manager against a `WorkSource` until the source reports no
/// more work and no job is in flight.
pub struct DispatchLoop<'a> {
    manager: &'a mut Manager,
    source: &'a dyn WorkSource,
    period: Duration,
    callbacks: DoneCallbacks,
    trace: Tracing,
}

impl<'a> DispatchLoop<'a> {
    pub fn new(
        manager: &'a mut Manager,
        source: &'a dyn WorkSource,
        period: Duration,
        callbacks: DoneCallbacks,
        trace: Tracing,
    ) -> Self {
        Self { manager, source, period, callbacks, trace }
    }

    /// Run until `WorkSource::has_work` goes false and no job remains
    /// in-flight. A live scheduler would instead loop forever; tests and the
    /// demo binary use this to run to quiescence.
    pub async fn run_to_quiescence(&mut self) {
        while self.source.has_work() || self.manager.active_workers() > 0 {
            self.step().await;
        }
    }

    /// One iteration of the driver: a dispatch fill followed by a poll
    /// wait. Exposed separately from `run_to_quiescence` so tests can
    /// observe intermediate state.
    pub async fn step(&mut self) {
        let t0 = SystemTime::now();
        let mut dispatched_any = false;

        while let Some(worker_id) = self.manager.find_idle_worker() {
            let Some(item) = self.source.next_work() else { break };
            dispatched_any = true;
            self.source.mark_issued(&item);
            if let Err(e) = self
                .manager
                .dispatch_on(worker_id, "fetch", vec![item.to_value()], Default::default())
                .await
            {
                self.trace.warning(&format!("dispatch to worker {} failed: {}", worker_id, e));
            }
        }

        if !dispatched_any {
            self.source.check_stale();
        }

        let wait = self.time_until_next_grid_wake(t0);
        let events = self.manager.poll(Some(wait)).await;
        for event in events {
            if let PollEvent::Completed { response, .. } = event {
                self.callbacks.invoke(&response, self.source);
            }
        }
    }

    fn time_until_next_grid_wake(&self, t0: SystemTime) -> Duration {
        let next_wake = align_up(t0, self.period);
        match next_wake.duration_since(SystemTime::now()) {
            Ok(d) if d > MIN_POLL_WAIT => d,
            _ => MIN_POLL_WAIT,
        }
    }
}

/// `⌊t0/period⌋·period + period`, so independent instances aligned on the
/// same wall clock wake at the same moments instead of drifting apart.
fn align_up(t0: SystemTime, period: Duration) -> SystemTime {
    let epoch_secs = t0.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64();
    let period_secs = period.as_secs_f64().max(0.001);
    let grid_secs = (epoch_secs / period_secs).floor() * period_secs + period_secs;
    UNIX_EPOCH + Duration::from_secs_f64(grid_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_wake_is_always_in_the_future_and_aligned() {
        let period = Duration::from_millis(200);
        let t0 = SystemTime::now();
        let wake = align_up(t0, period);
        assert!(wake > t0);
        let epoch = wake.duration_since(UNIX_EPOCH).unwrap().as_secs_f64();
        let period_secs = period.as_secs_f64();
        let remainder = epoch / period_secs;
        assert!((remainder - remainder.round()).abs() < 1e-6);
    }
}
