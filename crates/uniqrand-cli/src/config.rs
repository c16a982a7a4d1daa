use anyhow::bail;
use clap::Parser;
use core::time::Duration;
use uniqrand::GenerateConfig;

/// Runtime configuration for the `uniqrand` binary.
///
/// Every value can be given as a CLI argument or an environment variable
/// (including through a `.env` file). The defaults produce a small run that
/// finishes immediately.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "uniqrand",
    version,
    about = "Prints distinct random integers produced by concurrent workers"
)]
pub struct CliArgs {
    /// Exclusive upper bound of generated values; every value is in
    /// `[0, RANGE_BOUND)`.
    ///
    /// Environment variable: `RANGE_BOUND`
    #[arg(long, env = "RANGE_BOUND", default_value_t = 1_000)]
    pub range_bound: u64,

    /// Number of distinct values to print. Must not exceed the range bound.
    ///
    /// Environment variable: `TARGET_COUNT`
    #[arg(short = 'n', long, env = "TARGET_COUNT", default_value_t = 100)]
    pub count: usize,

    /// Number of concurrent source tasks drawing random values.
    ///
    /// Defaults to the number of logical CPUs.
    ///
    /// Environment variable: `NUM_WORKERS`
    #[arg(short = 'w', long, env = "NUM_WORKERS", default_value_t = num_cpus::get())]
    pub num_workers: usize,

    /// Capacity of the channel between the aggregator and the coordinator.
    ///
    /// Environment variable: `RELAY_CAPACITY`
    #[arg(long, env = "RELAY_CAPACITY", default_value_t = 1)]
    pub relay_capacity: usize,

    /// Capacity of the channel between the coordinator and the printer.
    ///
    /// Environment variable: `OUTPUT_BUFFER_SIZE`
    #[arg(long, env = "OUTPUT_BUFFER_SIZE", default_value_t = 64)]
    pub output_buffer_size: usize,

    /// Cancel the run after this many milliseconds.
    ///
    /// Environment variable: `CANCEL_AFTER_MS`
    #[arg(long, env = "CANCEL_AFTER_MS")]
    pub cancel_after_ms: Option<u64>,

    /// Cancel the run once this many values have been printed.
    ///
    /// Environment variable: `CANCEL_AFTER_VALUES`
    #[arg(long, env = "CANCEL_AFTER_VALUES")]
    pub cancel_after_values: Option<usize>,

    /// Interval between reports of live pipeline tasks, in milliseconds. `0`
    /// disables the report.
    ///
    /// Environment variable: `REPORT_INTERVAL_MS`
    #[arg(long, env = "REPORT_INTERVAL_MS", default_value_t = 1_000)]
    pub report_interval_ms: u64,

    /// Seconds to wait for background tasks to finish after a cancelled run.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT`
    #[arg(long, env = "SHUTDOWN_TIMEOUT", default_value_t = 3)]
    pub shutdown_timeout: u64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub range_bound: u64,
    pub target_count: usize,
    pub num_workers: usize,
    pub relay_capacity: usize,
    pub output_buffer_size: usize,
    pub cancel_after: Option<Duration>,
    pub cancel_after_values: Option<usize>,
    pub report_interval: Option<Duration>,
    pub shutdown_timeout: Duration,
}

impl TryFrom<CliArgs> for AppConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.range_bound == 0 {
            bail!("RANGE_BOUND must be greater than 0");
        }

        if args.count == 0 {
            bail!("TARGET_COUNT must be greater than 0");
        }

        if args.count as u64 > args.range_bound {
            bail!(
                "TARGET_COUNT ({}) exceeds the number of distinct values in range (RANGE_BOUND = {})",
                args.count,
                args.range_bound
            );
        }

        if args.num_workers == 0 {
            bail!("NUM_WORKERS must be greater than 0");
        }

        if args.num_workers > GenerateConfig::MAX_WORKERS {
            bail!(
                "NUM_WORKERS ({}) exceeds the limit of {}",
                args.num_workers,
                GenerateConfig::MAX_WORKERS
            );
        }

        if args.relay_capacity == 0 {
            bail!("RELAY_CAPACITY must be greater than 0");
        }

        if args.output_buffer_size == 0 {
            bail!("OUTPUT_BUFFER_SIZE must be greater than 0");
        }

        if args.cancel_after_values == Some(0) {
            bail!("CANCEL_AFTER_VALUES must be greater than 0");
        }

        Ok(Self {
            range_bound: args.range_bound,
            target_count: args.count,
            num_workers: args.num_workers,
            relay_capacity: args.relay_capacity,
            output_buffer_size: args.output_buffer_size,
            cancel_after: args.cancel_after_ms.map(Duration::from_millis),
            cancel_after_values: args.cancel_after_values,
            report_interval: (args.report_interval_ms > 0)
                .then(|| Duration::from_millis(args.report_interval_ms)),
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<AppConfig> {
        let args = CliArgs::try_parse_from(core::iter::once("uniqrand").chain(args.iter().copied()))?;
        AppConfig::try_from(args)
    }

    #[test]
    fn parses_explicit_values() {
        let config = parse(&[
            "--range-bound",
            "500",
            "-n",
            "500",
            "-w",
            "1",
            "--cancel-after-values",
            "250",
            "--report-interval-ms",
            "0",
        ])
        .unwrap();

        assert_eq!(config.range_bound, 500);
        assert_eq!(config.target_count, 500);
        assert_eq!(config.num_workers, 1);
        assert_eq!(config.cancel_after_values, Some(250));
        assert_eq!(config.cancel_after, None);
        assert_eq!(config.report_interval, None);
    }

    #[test]
    fn rejects_count_above_range() {
        let err = parse(&["--range-bound", "5", "--count", "8"]).unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }

    #[test]
    fn rejects_zero_workers() {
        assert!(parse(&["--num-workers", "0"]).is_err());
    }

    #[test]
    fn rejects_workers_above_limit() {
        let workers = (GenerateConfig::MAX_WORKERS + 1).to_string();
        let err = parse(&["--num-workers", &workers]).unwrap_err();
        assert!(err.to_string().contains("exceeds the limit"));
    }

    #[test]
    fn converts_durations() {
        let config = parse(&["--cancel-after-ms", "1500", "--shutdown-timeout", "7"]).unwrap();
        assert_eq!(config.cancel_after, Some(Duration::from_millis(1500)));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(7));
        assert_eq!(config.report_interval, Some(Duration::from_secs(1)));
    }
}
