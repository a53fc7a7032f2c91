//! Trace / logging abstraction so call sites don't depend directly on the
//! `tracing` crate (or on any particular sink). `feedcore_common::Tracing`
//! is the one implementation in this workspace; it owns its own
//! level-filtering and timestamping instead of delegating to a second layer
//! here.

/// A lightweight diagnostic sink. Implementations decide where messages go.
pub trait TraceWriter: Send + Sync {
    /// Log an informational message.
    fn info(&self, message: &str);

    /// Log a verbose / debug message.
    fn verbose(&self, message: &str);

    /// Log a warning message.
    fn warning(&self, message: &str);

    /// Log an error message.
    fn error(&self, message: &str);
}
