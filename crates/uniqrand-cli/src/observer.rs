use crate::telemetry::{
    increment_duplicates_discarded, increment_runs, increment_runs_aborted,
    increment_values_delivered,
};
use uniqrand::{Event, Observer, Outcome};

/// Routes pipeline events to the console log and to metrics.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryObserver;

impl Observer for TelemetryObserver {
    fn on_event(&self, event: &Event) {
        match event {
            Event::SourceStarted { source_id } => {
                tracing::trace!("[Source #{source_id}] started");
            }
            Event::SourceExited { source_id, emitted } => {
                tracing::debug!("[Source #{source_id}] exit after {emitted} values");
            }
            Event::TargetReached { unique } => {
                tracing::debug!("Target of {unique} distinct values reached");
            }
            Event::StopRequested { origin } => {
                tracing::info!("Stop signal fired by {origin:?}");
            }
            Event::AggregatorExited { unique, duplicates } => {
                tracing::debug!("[Aggregator] exit with {unique} unique, {duplicates} duplicates");
                increment_duplicates_discarded(*duplicates);
            }
            Event::RunFinished { report } => {
                increment_runs();
                increment_values_delivered(report.delivered as u64);
                if report.outcome != Outcome::Completed {
                    increment_runs_aborted();
                }
            }
        }
    }
}
