mod config;
mod observer;
mod telemetry;

use clap::Parser;
use config::{AppConfig, CliArgs};
use core::time::Duration;
use observer::TelemetryObserver;
use std::sync::Arc;
use std::time::Instant;
use telemetry::{init_telemetry, record_run_duration};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::signal;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use uniqrand::{Outcome, UniqueGenerator};

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = AppConfig::try_from(args)?;

    let providers = init_telemetry()?;
    log_startup_info(&config);

    let generator = UniqueGenerator::new(config.range_bound)
        .with_relay_capacity(config.relay_capacity)
        .with_observer(Arc::new(TelemetryObserver));

    // `run` cancels the generation; `helpers` only stops the side tasks once
    // the run is over.
    let run = CancellationToken::new();
    let helpers = CancellationToken::new();

    tokio::spawn(cancel_on_signal(run.clone(), helpers.clone()));
    if let Some(after) = config.cancel_after {
        tokio::spawn(cancel_after(after, run.clone(), helpers.clone()));
    }
    if let Some(every) = config.report_interval {
        tokio::spawn(report_active_tasks(generator.clone(), every, helpers.clone()));
    }

    let (tx, rx) = mpsc::channel(config.output_buffer_size);
    let printer = tokio::spawn(print_values(rx, run.clone(), config.cancel_after_values));

    let start = Instant::now();
    let report = generator
        .generate(run, config.target_count, config.num_workers, tx)
        .await?;
    let printed = printer.await??;
    record_run_duration(start.elapsed().as_millis() as f64);

    tracing::info!(
        "Run finished: {:?}, {} of {} values delivered, {} printed",
        report.outcome,
        report.delivered,
        config.target_count,
        printed
    );

    if report.outcome != Outcome::Completed {
        wait_for_quiescence(&generator, config.shutdown_timeout).await;
    }

    helpers.cancel();
    providers.shutdown();
    Ok(())
}

fn log_startup_info(config: &AppConfig) {
    if cfg!(debug_assertions) {
        tracing::info!("Starting generation with full config: {:#?}", config);
    } else {
        tracing::info!(
            "Generating {} distinct values in [0, {}) with {} workers",
            config.target_count,
            config.range_bound,
            config.num_workers
        );
    }
}

/// Writes every received value to stdout, one per line.
///
/// Cancels `run` once `cancel_after` values have been printed, then keeps
/// printing whatever the coordinator had already handed over.
async fn print_values(
    mut rx: mpsc::Receiver<u64>,
    run: CancellationToken,
    cancel_after: Option<usize>,
) -> std::io::Result<usize> {
    let mut out = BufWriter::new(tokio::io::stdout());
    let mut printed = 0;

    while let Some(value) = rx.recv().await {
        out.write_all(format!("{value}\n").as_bytes()).await?;
        printed += 1;

        if cancel_after == Some(printed) {
            tracing::info!("Printed {printed} values, cancelling");
            run.cancel();
        }
    }

    out.flush().await?;
    Ok(printed)
}

async fn cancel_on_signal(run: CancellationToken, helpers: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = helpers.cancelled() => return,
        () = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        () = terminate => tracing::info!("Received SIGTERM signal"),
    }

    tracing::info!("Cancelling run...");
    run.cancel();
}

async fn cancel_after(after: Duration, run: CancellationToken, helpers: CancellationToken) {
    tokio::select! {
        () = helpers.cancelled() => {}
        () = sleep(after) => {
            tracing::info!("Run exceeded {after:?}, cancelling");
            run.cancel();
        }
    }
}

/// Periodically logs how many pipeline tasks are alive.
async fn report_active_tasks(generator: UniqueGenerator, every: Duration, helpers: CancellationToken) {
    let mut ticker = tokio::time::interval(every);
    loop {
        tokio::select! {
            () = helpers.cancelled() => break,
            _ = ticker.tick() => {
                tracing::info!("Pipeline tasks alive: {}", generator.active_tasks());
            }
        }
    }
}

/// Gives background wind-down of an aborted run a bounded time to finish.
async fn wait_for_quiescence(generator: &UniqueGenerator, limit: Duration) {
    let drained = timeout(limit, generator.wait_idle()).await;

    match drained {
        Ok(()) => tracing::debug!("All pipeline tasks exited"),
        Err(_) => tracing::warn!(
            "Shutdown timed out ({} pipeline tasks still alive)",
            generator.active_tasks()
        ),
    }
}
