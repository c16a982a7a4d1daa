//! Public entry point: runs sources and the aggregator, relays results and
//! owns shutdown.
//!
//! ## Pipeline
//!
//! ```text
//! source 0 ─┐
//! source 1 ─┼─▶ aggregator ─▶ relay ─▶ coordinator ─▶ caller's output
//! source N ─┘
//! ```
//!
//! Every source writes to its own one-slot channel, the aggregator visits
//! them round-robin and forwards first-time values into an internal relay
//! channel. The coordinator forwards from the relay to the caller and applies
//! the exact-count cutoff, so the caller's consumption rate never affects
//! how the pipeline winds down.
//!
//! ## Shutdown
//!
//! - On success the stop signal is fired, the relay is drained until closed
//!   and every task is joined before [`UniqueGenerator::generate`] returns.
//! - On caller cancellation (or a dropped output receiver) the stop signal is
//!   fired and a background task drains the relay and joins the workers;
//!   `generate` returns without waiting for it.
//!
//! When the target is reached at the same instant the caller cancels, the
//! run may report either outcome; the delivered count always matches what
//! the caller can read from its channel.

use crate::{
    Error, Event, GenerateConfig, NoopObserver, Observer, RandSource, Result, SeededRandom,
    StopOrigin, StopSignal, TaskGauge,
    aggregator::{Aggregation, aggregate_loop},
    source::source_loop,
};
use core::marker::PhantomData;
use std::sync::Arc;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

/// Default capacity of the aggregator → coordinator relay channel.
pub const DEFAULT_RELAY_CAPACITY: usize = 1;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// The requested number of distinct values was delivered.
    Completed,
    /// The caller's cancellation token fired first.
    Cancelled,
    /// The caller dropped the receiving end of its output channel.
    Disconnected,
    /// The relay closed before the target was reached. Only happens if the
    /// aggregator task died, or every source task did.
    Exhausted,
}

/// Summary returned by [`UniqueGenerator::generate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Report {
    /// Values successfully sent to the caller's output channel.
    pub delivered: usize,
    pub outcome: Outcome,
}

impl Report {
    pub const fn is_complete(&self) -> bool {
        matches!(self.outcome, Outcome::Completed)
    }
}

/// Generates distinct integers in `[0, range_bound)` with concurrent sources.
///
/// The range bound is fixed per generator; each call to
/// [`generate`](Self::generate) picks its own target and worker count and
/// builds a fresh set of tasks, channels and stop signal. Nothing is shared
/// between runs except the observer and the task gauge.
///
/// `R` is the per-source random stream, [`SeededRandom`] by default.
pub struct UniqueGenerator<R = SeededRandom> {
    range_bound: u64,
    relay_capacity: usize,
    observer: Arc<dyn Observer>,
    gauge: TaskGauge,
    _rand: PhantomData<fn() -> R>,
}

impl<R> Clone for UniqueGenerator<R> {
    fn clone(&self) -> Self {
        Self {
            range_bound: self.range_bound,
            relay_capacity: self.relay_capacity,
            observer: Arc::clone(&self.observer),
            gauge: self.gauge.clone(),
            _rand: PhantomData,
        }
    }
}

impl UniqueGenerator<SeededRandom> {
    /// Creates a generator over `[0, range_bound)` using [`SeededRandom`]
    /// sources.
    pub fn new(range_bound: u64) -> Self {
        Self::with_rand_source(range_bound)
    }
}

impl<R> UniqueGenerator<R>
where
    R: RandSource,
{
    /// Creates a generator over `[0, range_bound)` drawing from `R`.
    pub fn with_rand_source(range_bound: u64) -> Self {
        Self {
            range_bound,
            relay_capacity: DEFAULT_RELAY_CAPACITY,
            observer: Arc::new(NoopObserver),
            gauge: TaskGauge::new(),
            _rand: PhantomData,
        }
    }

    /// Routes lifecycle events to `observer`.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }

    /// Sets the relay channel capacity. Values below 1 are raised to 1.
    #[must_use]
    pub fn with_relay_capacity(mut self, capacity: usize) -> Self {
        self.relay_capacity = capacity.max(1);
        self
    }

    pub const fn range_bound(&self) -> u64 {
        self.range_bound
    }

    /// Number of tasks spawned by this generator that are still running,
    /// across all runs. Returns to `0` once every run has fully wound down.
    pub fn active_tasks(&self) -> usize {
        self.gauge.active()
    }

    /// Resolves once [`active_tasks`](Self::active_tasks) is `0`, which
    /// includes the background wind-down of cancelled runs.
    pub async fn wait_idle(&self) {
        self.gauge.idle().await;
    }

    /// Sends `target_count` distinct values in `[0, range_bound)` to
    /// `output`, produced by `worker_count` concurrent sources.
    ///
    /// Returns once the target is delivered, `ctx` is cancelled or the
    /// receiver of `output` is dropped. `output` is dropped on return, so the
    /// caller's receiver sees the channel close after the last value.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] before spawning anything if the
    /// target is zero or exceeds the range, the range is empty, or the worker
    /// count is zero or above [`GenerateConfig::MAX_WORKERS`]. Cancellation
    /// is not an error, see [`Outcome`].
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(range_bound = self.range_bound, target_count = target_count, worker_count = worker_count)))]
    pub async fn generate(
        &self,
        ctx: CancellationToken,
        target_count: usize,
        worker_count: usize,
        output: mpsc::Sender<u64>,
    ) -> Result<Report> {
        GenerateConfig::new(self.range_bound, target_count, worker_count).validate()?;

        let stop = StopSignal::new();
        let mut receivers = Vec::with_capacity(worker_count);
        let mut sources = Vec::with_capacity(worker_count);

        for source_id in 0..worker_count {
            // One slot is the smallest buffer tokio offers; the source parks
            // on its second value until the aggregator comes around.
            let (tx, rx) = mpsc::channel(1);
            receivers.push(rx);
            sources.push(self.gauge.spawn(source_loop(
                source_id,
                self.range_bound,
                R::for_source(source_id),
                stop.clone(),
                tx,
                Arc::clone(&self.observer),
            )));
        }

        let (relay_tx, mut relay_rx) = mpsc::channel(self.relay_capacity);
        let aggregator = self.gauge.spawn(aggregate_loop(
            target_count,
            receivers,
            stop.clone(),
            relay_tx,
            Arc::clone(&self.observer),
        ));

        let (delivered, outcome) = relay(&ctx, target_count, &mut relay_rx, &output).await;
        drop(output);

        // The aggregator fires on reaching the target, but the coordinator
        // is the one that guarantees the signal is fired before returning.
        if stop.fire() {
            self.observer.on_event(&Event::StopRequested {
                origin: StopOrigin::Coordinator,
            });
        }

        let report = Report { delivered, outcome };

        match outcome {
            Outcome::Completed | Outcome::Exhausted => {
                if let Some(_aggregation) = wind_down(relay_rx, sources, aggregator).await {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        "Run finished with {} unique values and {} duplicates",
                        _aggregation.unique,
                        _aggregation.duplicates
                    );
                }
            }
            Outcome::Cancelled | Outcome::Disconnected => {
                #[cfg(feature = "tracing")]
                tracing::debug!("Run aborted ({outcome:?}), draining in background");
                self.gauge.spawn(wind_down(relay_rx, sources, aggregator));
            }
        }

        #[cfg(feature = "tracing")]
        tracing::info!("Delivered {delivered} of {target_count} values ({outcome:?})");
        self.observer.on_event(&Event::RunFinished { report });

        Ok(report)
    }

    /// Starts a run in the background and exposes its output as a stream.
    ///
    /// The configuration is validated synchronously; the returned
    /// [`RunHandle`] resolves to the run's [`Report`]. `buffer` is the
    /// capacity of the output channel (at least 1).
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Same configuration errors as [`generate`](Self::generate).
    pub fn stream(
        &self,
        ctx: CancellationToken,
        target_count: usize,
        worker_count: usize,
        buffer: usize,
    ) -> Result<(ReceiverStream<u64>, RunHandle)> {
        GenerateConfig::new(self.range_bound, target_count, worker_count).validate()?;

        let (tx, rx) = mpsc::channel(buffer.max(1));
        let this = self.clone();
        let handle = self.gauge.spawn(async move {
            this.generate(ctx, target_count, worker_count, tx).await
        });

        Ok((ReceiverStream::new(rx), RunHandle { handle }))
    }
}

/// Handle to a run started with [`UniqueGenerator::stream`].
#[derive(Debug)]
pub struct RunHandle {
    handle: JoinHandle<Result<Report>>,
}

impl RunHandle {
    /// Waits for the run to return its report.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Runtime`] if the run's task panicked or was aborted,
    /// otherwise whatever [`UniqueGenerator::generate`] returned.
    pub async fn join(self) -> Result<Report> {
        self.handle.await.map_err(|e| Error::Runtime {
            context: format!("Run task failed: {e}"),
        })?
    }
}

/// Forwards values from the relay to the caller until the target is met or
/// the run is cut short. Returns how many values reached `output`.
async fn relay(
    ctx: &CancellationToken,
    target_count: usize,
    relay_rx: &mut mpsc::Receiver<u64>,
    output: &mpsc::Sender<u64>,
) -> (usize, Outcome) {
    let mut delivered = 0;

    while delivered < target_count {
        let value = tokio::select! {
            biased;
            () = ctx.cancelled() => return (delivered, Outcome::Cancelled),
            next = relay_rx.recv() => match next {
                Some(value) => value,
                None => return (delivered, Outcome::Exhausted),
            },
        };

        tokio::select! {
            biased;
            () = ctx.cancelled() => return (delivered, Outcome::Cancelled),
            sent = output.send(value) => {
                if sent.is_err() {
                    return (delivered, Outcome::Disconnected);
                }
            }
        }

        delivered += 1;
    }

    (delivered, Outcome::Completed)
}

/// Drains the relay until the aggregator closes it, then joins every worker.
///
/// Closing the relay first turns any pending aggregator send into an error,
/// which makes the aggregator stop and drain its sources.
async fn wind_down(
    mut relay_rx: mpsc::Receiver<u64>,
    sources: Vec<JoinHandle<()>>,
    aggregator: JoinHandle<Aggregation>,
) -> Option<Aggregation> {
    relay_rx.close();
    while relay_rx.recv().await.is_some() {}

    for (_source_id, result) in futures::future::join_all(sources)
        .await
        .into_iter()
        .enumerate()
    {
        if let Err(_e) = result {
            #[cfg(feature = "tracing")]
            tracing::error!("Source {_source_id} failed: {_e}");
        }
    }

    match aggregator.await {
        Ok(aggregation) => Some(aggregation),
        Err(_e) => {
            #[cfg(feature = "tracing")]
            tracing::error!("Aggregator failed: {_e}");
            None
        }
    }
}
