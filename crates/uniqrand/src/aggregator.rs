use crate::{Event, Observer, StopOrigin, StopSignal};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Upper bound on the seen-set's initial capacity. Larger targets grow the
/// set as values arrive, so memory tracks what was actually seen.
const SEEN_PREALLOC: usize = 1 << 16;

/// Final state of an aggregator run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aggregation {
    /// Size of the seen-set when the aggregator stopped.
    pub unique: usize,
    /// Values received that were already in the seen-set.
    pub duplicates: u64,
    /// Whether the seen-set reached the target count.
    pub target_reached: bool,
}

/// Aggregator task: deduplicates values from every source and forwards
/// first-time values to `tx`.
///
/// Sources are visited in a fixed round-robin order, one value per open
/// source per round. A source that reports its channel closed is skipped from
/// then on; once every source is closed the run is exhausted.
///
/// On reaching `target` (checked after every insert, not once per round) the
/// aggregator fires `stop`, drains every source channel until closed and only
/// then closes `tx`. Draining releases sources parked mid-send so they can
/// observe the stop. The same drain happens if someone else fired `stop` or
/// if the reader of `tx` goes away.
///
/// The seen-set lives on this task's stack and is never shared.
pub async fn aggregate_loop(
    target: usize,
    sources: Vec<mpsc::Receiver<u64>>,
    stop: StopSignal,
    tx: mpsc::Sender<u64>,
    observer: Arc<dyn Observer>,
) -> Aggregation {
    #[cfg(feature = "tracing")]
    tracing::trace!("Aggregator started with {} sources", sources.len());

    let mut slots: Vec<Option<mpsc::Receiver<u64>>> = sources.into_iter().map(Some).collect();
    let mut seen = HashSet::with_capacity(target.min(SEEN_PREALLOC));
    let mut duplicates = 0_u64;
    let mut target_reached = false;

    'rounds: loop {
        let mut any_open = false;

        for slot in &mut slots {
            let Some(rx) = slot else {
                continue;
            };

            // Sources only stop on the shared signal, so a value or a close
            // is always on its way and this receive cannot hang.
            let Some(value) = rx.recv().await else {
                *slot = None;
                continue;
            };
            any_open = true;

            if stop.is_fired() {
                #[cfg(feature = "tracing")]
                tracing::debug!("Aggregator observed stop, draining sources");
                break 'rounds;
            }

            if !seen.insert(value) {
                duplicates += 1;
                continue;
            }

            // Sources are stopped before the last value is handed over, so
            // they wind down while the coordinator is still relaying.
            if seen.len() == target {
                target_reached = true;
                observer.on_event(&Event::TargetReached { unique: seen.len() });
                request_stop(&stop, observer.as_ref());
            }

            if tx.send(value).await.is_err() {
                #[cfg(feature = "tracing")]
                tracing::debug!("Aggregator output closed, stopping sources");
                request_stop(&stop, observer.as_ref());
                break 'rounds;
            }

            if target_reached {
                break 'rounds;
            }
        }

        if !any_open {
            #[cfg(feature = "tracing")]
            tracing::debug!("All sources closed before the target was reached");
            break;
        }
    }

    drain(&mut slots).await;
    drop(tx);

    #[cfg(feature = "tracing")]
    tracing::trace!(
        "Aggregator exited with {} unique values and {duplicates} duplicates",
        seen.len()
    );
    observer.on_event(&Event::AggregatorExited {
        unique: seen.len(),
        duplicates,
    });

    Aggregation {
        unique: seen.len(),
        duplicates,
        target_reached,
    }
}

fn request_stop(stop: &StopSignal, observer: &dyn Observer) {
    if stop.fire() {
        observer.on_event(&Event::StopRequested {
            origin: StopOrigin::Aggregator,
        });
    }
}

/// Receives from every still-open source until it reports closed.
///
/// Closing the receiving half first makes any parked send fail immediately,
/// so the source exits even if it has not looked at the stop signal yet.
async fn drain(slots: &mut [Option<mpsc::Receiver<u64>>]) {
    for rx in slots.iter_mut().flatten() {
        rx.close();
        while rx.recv().await.is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NoopObserver;
    use core::time::Duration;
    use std::sync::Mutex;

    /// Spawns a scripted source that sends `values` in order, then keeps
    /// repeating the last one until the stop signal fires.
    fn scripted(stop: &StopSignal, values: Vec<u64>) -> mpsc::Receiver<u64> {
        let (tx, rx) = mpsc::channel(1);
        let stop = stop.clone();
        tokio::spawn(async move {
            let last = *values.last().unwrap();
            for value in values.into_iter().chain(core::iter::repeat(last)) {
                tokio::select! {
                    biased;
                    () = stop.fired() => break,
                    sent = tx.send(value) => if sent.is_err() { break },
                }
            }
        });
        rx
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn forwards_each_value_once_and_stops_at_target() {
        let stop = StopSignal::new();
        let sources = vec![
            scripted(&stop, vec![1, 2, 3, 1]),
            scripted(&stop, vec![1, 2, 4, 5]),
        ];
        let (tx, mut rx) = mpsc::channel(16);

        let aggregation =
            aggregate_loop(4, sources, stop.clone(), tx, Arc::new(NoopObserver)).await;

        let mut forwarded = Vec::new();
        while let Some(v) = rx.recv().await {
            forwarded.push(v);
        }

        // Round robin: 1 (a), 1 dup (b), 2 (a), 2 dup (b), 3 (a), 4 (b).
        assert_eq!(forwarded, vec![1, 2, 3, 4]);
        assert_eq!(
            aggregation,
            Aggregation {
                unique: 4,
                duplicates: 2,
                target_reached: true,
            }
        );
        assert!(stop.is_fired());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn target_on_last_source_stops_without_extra_round() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let observer: Arc<dyn Observer> =
            Arc::new(move |e: &Event| sink.lock().unwrap().push(e.clone()));

        let stop = StopSignal::new();
        let sources = vec![
            scripted(&stop, vec![7]),
            scripted(&stop, vec![8]),
            scripted(&stop, vec![9]),
        ];
        let (tx, mut rx) = mpsc::channel(16);

        let aggregation = aggregate_loop(3, sources, stop.clone(), tx, observer).await;

        assert_eq!(aggregation.unique, 3);
        assert_eq!(aggregation.duplicates, 0);
        assert!(aggregation.target_reached);
        assert_eq!(rx.recv().await, Some(7));
        assert_eq!(rx.recv().await, Some(8));
        assert_eq!(rx.recv().await, Some(9));
        assert_eq!(rx.recv().await, None);

        let events = events.lock().unwrap();
        assert!(events.contains(&Event::TargetReached { unique: 3 }));
        assert!(events.contains(&Event::StopRequested {
            origin: StopOrigin::Aggregator
        }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn exhausted_when_every_source_closes() {
        let stop = StopSignal::new();
        let (tx_a, rx_a) = mpsc::channel(4);
        let (tx_b, rx_b) = mpsc::channel(4);
        tx_a.send(1).await.unwrap();
        tx_b.send(2).await.unwrap();
        drop(tx_a);
        drop(tx_b);

        let (tx, mut rx) = mpsc::channel(16);
        let aggregation =
            aggregate_loop(10, vec![rx_a, rx_b], stop.clone(), tx, Arc::new(NoopObserver)).await;

        assert_eq!(rx.recv().await, Some(1));
        assert_eq!(rx.recv().await, Some(2));
        assert_eq!(rx.recv().await, None);
        assert!(!aggregation.target_reached);
        assert_eq!(aggregation.unique, 2);
        assert!(!stop.is_fired());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn closed_output_stops_sources() {
        let stop = StopSignal::new();
        let sources = vec![scripted(&stop, vec![1, 2, 3])];
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let aggregation = tokio::time::timeout(
            Duration::from_secs(5),
            aggregate_loop(3, sources, stop.clone(), tx, Arc::new(NoopObserver)),
        )
        .await
        .expect("aggregator hung on a closed output");

        assert!(stop.is_fired());
        assert!(!aggregation.target_reached);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn huge_target_starts_without_reserving_it() {
        let stop = StopSignal::new();
        let sources = vec![scripted(&stop, vec![3, 1, 4]), scripted(&stop, vec![5])];
        let (tx, mut rx) = mpsc::channel(16);

        let handle = tokio::spawn(aggregate_loop(
            usize::MAX,
            sources,
            stop.clone(),
            tx,
            Arc::new(NoopObserver),
        ));

        assert_eq!(rx.recv().await, Some(3));
        stop.fire();

        let aggregation = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("aggregator did not observe the stop")
            .expect("aggregator panicked");
        assert!(!aggregation.target_reached);
        assert!(aggregation.unique >= 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn external_stop_drains_and_exits() {
        let stop = StopSignal::new();
        let sources = vec![scripted(&stop, vec![1]), scripted(&stop, vec![2])];
        let (tx, mut rx) = mpsc::channel(16);

        let handle = tokio::spawn(aggregate_loop(
            100,
            sources,
            stop.clone(),
            tx,
            Arc::new(NoopObserver),
        ));
        tokio::time::sleep(Duration::from_millis(20)).await;
        stop.fire();

        let aggregation = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("aggregator did not observe the stop")
            .unwrap();
        assert!(!aggregation.target_reached);
        assert!(aggregation.duplicates > 0);

        let mut forwarded = Vec::new();
        while let Some(v) = rx.recv().await {
            forwarded.push(v);
        }
        assert_eq!(forwarded, vec![1, 2]);
    }
}
