//! Named trace sources, one per component, backed by the `tracing` crate.
//!
//! Mirrors the split between a per-component `Tracing` handle and a
//! `TraceManager` factory that hands them out, minus any redaction layer —
//! feed URLs and method names carry nothing secret-shaped, unlike the
//! credentials a CI runner's log stream has to mask.

use chrono::Utc;
use feedcore_sdk::TraceWriter;

/// Trace event severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TraceEventType {
    Verbose,
    Information,
    Warning,
    Error,
}

impl std::fmt::Display for TraceEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TraceEventType::Verbose => write!(f, "VERB"),
            TraceEventType::Information => write!(f, "INFO"),
            TraceEventType::Warning => write!(f, "WARN"),
            TraceEventType::Error => write!(f, "ERR "),
        }
    }
}

/// Configuration for a trace source's output.
#[derive(Debug, Clone)]
pub struct TraceSetting {
    pub level: TraceEventType,
    pub print_to_stdout: bool,
}

impl Default for TraceSetting {
    fn default() -> Self {
        Self {
            level: TraceEventType::Verbose,
            print_to_stdout: false,
        }
    }
}

/// A named trace source. Each component (manager, dispatch loop, a worker
/// child) gets its own instance via [`TraceManager::get`].
#[derive(Clone)]
pub struct Tracing {
    name: String,
    setting: TraceSetting,
}

impl Tracing {
    pub fn new(name: impl Into<String>, setting: TraceSetting) -> Self {
        Self {
            name: name.into(),
            setting,
        }
    }

    fn trace(&self, event_type: TraceEventType, message: &str) {
        if event_type < self.setting.level {
            return;
        }

        let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ");
        let formatted = format!("[{}][{}] {}: {}", timestamp, &self.name, event_type, message);

        match event_type {
            TraceEventType::Error => tracing::error!("{}", formatted),
            TraceEventType::Warning => tracing::warn!("{}", formatted),
            TraceEventType::Information => tracing::info!("{}", formatted),
            TraceEventType::Verbose => tracing::debug!("{}", formatted),
        }

        if self.setting.print_to_stdout {
            println!("{}", formatted);
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn error_err(&self, err: &dyn std::error::Error) {
        self.error(&format!("{}", err));
        let mut source = err.source();
        while let Some(cause) = source {
            self.error(&format!("caused by: {}", cause));
            source = cause.source();
        }
    }
}

impl TraceWriter for Tracing {
    fn info(&self, message: &str) {
        self.trace(TraceEventType::Information, message);
    }

    fn verbose(&self, message: &str) {
        self.trace(TraceEventType::Verbose, message);
    }

    fn warning(&self, message: &str) {
        self.trace(TraceEventType::Warning, message);
    }

    fn error(&self, message: &str) {
        self.trace(TraceEventType::Error, message);
    }
}

/// Hands out named [`Tracing`] sources sharing one output setting.
pub struct TraceManager {
    default_setting: TraceSetting,
}

impl TraceManager {
    pub fn new() -> Self {
        Self {
            default_setting: TraceSetting::default(),
        }
    }

    pub fn with_setting(setting: TraceSetting) -> Self {
        Self {
            default_setting: setting,
        }
    }

    pub fn get(&self, name: &str) -> Tracing {
        Tracing::new(name, self.default_setting.clone())
    }
}

impl Default for TraceManager {
    fn default() -> Self {
        Self::new()
    }
}
