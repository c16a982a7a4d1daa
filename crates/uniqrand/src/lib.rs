//! # `uniqrand`: distinct random integers from racing producers
//!
//! `uniqrand` draws `K` distinct integers uniformly from `[0, N)` using `W`
//! concurrent tokio tasks, deduplicates them in a single aggregator and
//! streams the result into a caller-owned channel. A run ends when the target
//! is delivered or the caller cancels, and in both cases every task it
//! spawned winds down without leaking or blocking.
//!
//! ## Usage
//!
//! ```rust
//! use tokio::sync::mpsc;
//! use tokio_util::sync::CancellationToken;
//! use uniqrand::UniqueGenerator;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> uniqrand::Result<()> {
//! let generator = UniqueGenerator::new(10);
//! let (tx, mut rx) = mpsc::channel(16);
//!
//! let report = generator
//!     .generate(CancellationToken::new(), 10, 3, tx)
//!     .await?;
//! assert!(report.is_complete());
//!
//! let mut values = Vec::new();
//! while let Some(v) = rx.recv().await {
//!     values.push(v);
//! }
//! values.sort_unstable();
//! assert_eq!(values, (0..10).collect::<Vec<_>>());
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! - [`UniqueGenerator`] - public entry point and shutdown protocol.
//! - [`source_loop`] - a single producer of random values.
//! - [`aggregate_loop`] - round-robin fan-in with deduplication.
//! - [`StopSignal`] - idempotent broadcast stop shared by a run.
//! - [`Observer`] / [`Event`] - lifecycle hooks for the host application.
//! - [`TaskGauge`] - live task count, for quiescence checks.

mod aggregator;
mod config;
mod coordinator;
mod error;
mod event;
mod gauge;
mod random;
mod signal;
mod source;


pub use crate::aggregator::*;
pub use crate::config::*;
pub use crate::coordinator::*;
pub use crate::error::*;
pub use crate::event::*;
pub use crate::gauge::*;
pub use crate::random::*;
pub use crate::signal::*;
pub use crate::source::*;
