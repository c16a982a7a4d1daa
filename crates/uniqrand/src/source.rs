use crate::{Event, Observer, RandSource, StopSignal};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Source task: emits random values in `[0, range_bound)` until stopped.
///
/// Each source owns its random stream and the only [`mpsc::Sender`] of its
/// channel. The loop ends when:
///
/// - the stop signal is observed before drawing the next value,
/// - the stop signal fires while a send is blocked on a full channel,
/// - the reader has closed or dropped the channel.
///
/// The sender is dropped on the way out, which closes the channel exactly
/// once and lets the aggregator see the source as finished.
///
/// # Arguments
///
/// - `source_id`: Index of this source, used for events and tracing.
/// - `range_bound`: Exclusive upper bound of emitted values, never zero.
/// - `rand`: This source's private random stream.
/// - `stop`: Stop signal shared by the whole run.
/// - `tx`: Write half of this source's private channel.
/// - `observer`: Receives the start and exit events.
pub async fn source_loop<R>(
    source_id: usize,
    range_bound: u64,
    mut rand: R,
    stop: StopSignal,
    tx: mpsc::Sender<u64>,
    observer: Arc<dyn Observer>,
) where
    R: RandSource,
{
    #[cfg(feature = "tracing")]
    tracing::trace!("Source {source_id} started");
    observer.on_event(&Event::SourceStarted { source_id });

    let mut emitted = 0_u64;

    while !stop.is_fired() {
        let value = rand.next_below(range_bound);

        tokio::select! {
            biased;
            () = stop.fired() => break,
            sent = tx.send(value) => {
                if sent.is_err() {
                    #[cfg(feature = "tracing")]
                    tracing::debug!("Source {source_id} lost its reader");
                    break;
                }
                emitted += 1;
            }
        }
    }

    drop(tx);

    #[cfg(feature = "tracing")]
    tracing::trace!("Source {source_id} exited after {emitted} values");
    observer.on_event(&Event::SourceExited { source_id, emitted });
}
