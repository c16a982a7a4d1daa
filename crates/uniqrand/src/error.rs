//! Error types for unique value generation.
//!
//! Only two things can go wrong from a caller's point of view:
//!
//! - `InvalidConfig`: the requested run can never finish (for example more
//!   distinct values than the range holds) or has no workers. Raised before
//!   any task is spawned.
//! - `Runtime`: a helper task driving [`generate`] could not be joined.
//!
//! Cancellation is deliberately absent: a cancelled run is a successful call
//! that reports [`Outcome::Cancelled`].
//!
//! [`generate`]: crate::UniqueGenerator::generate
//! [`Outcome::Cancelled`]: crate::Outcome::Cancelled

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All error variants that `uniqrand` can emit.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// The run configuration can never be satisfied.
    #[error("Invalid config: {reason}")]
    InvalidConfig { reason: String },

    /// A task spawned on behalf of the caller failed to complete.
    #[error("Runtime error: {context}")]
    Runtime { context: String },
}

impl Error {
    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}
