//! Lifecycle events emitted by a generation run.
//!
//! The core never writes diagnostics itself (apart from optional `tracing`
//! output). Instead every component reports what it is doing through an
//! [`Observer`], and the host decides where the events go: logs, metrics, a
//! test buffer, or nowhere ([`NoopObserver`]).
//!
//! Events from different tasks arrive concurrently, so observers must be
//! `Send + Sync` and cheap. Ordering is only guaranteed per task.

use crate::Report;

/// Which component fired the stop signal first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopOrigin {
    /// The aggregator reached the target or lost its reader.
    Aggregator,
    /// The coordinator finished relaying or the caller cancelled.
    Coordinator,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A source task began producing.
    SourceStarted { source_id: usize },
    /// A source task closed its channel and terminated.
    SourceExited { source_id: usize, emitted: u64 },
    /// The seen-set reached the target count.
    TargetReached { unique: usize },
    /// The stop signal was fired for the first time.
    StopRequested { origin: StopOrigin },
    /// The aggregator closed its output and terminated.
    AggregatorExited { unique: usize, duplicates: u64 },
    /// The coordinator stopped relaying and is about to return.
    RunFinished { report: Report },
}

/// Receives [`Event`]s from every task of a run.
pub trait Observer: Send + Sync + 'static {
    fn on_event(&self, event: &Event);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl Observer for NoopObserver {
    fn on_event(&self, _event: &Event) {}
}

impl<F> Observer for F
where
    F: Fn(&Event) + Send + Sync + 'static,
{
    fn on_event(&self, event: &Event) {
        self(event);
    }
}
