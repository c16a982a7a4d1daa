use crate::{Error, Result};

/// The shape of a single generation run.
///
/// `range_bound` is fixed by the owning [`UniqueGenerator`], the rest comes
/// from the caller of [`generate`]. A config that passes [`validate`] is
/// guaranteed to terminate once enough distinct values have been drawn.
///
/// [`UniqueGenerator`]: crate::UniqueGenerator
/// [`generate`]: crate::UniqueGenerator::generate
/// [`validate`]: GenerateConfig::validate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerateConfig {
    /// Exclusive upper bound of every emitted value.
    pub range_bound: u64,
    /// Number of distinct values to deliver.
    pub target_count: usize,
    /// Number of concurrent sources.
    pub worker_count: usize,
}

impl GenerateConfig {
    /// Most sources a single run may start.
    pub const MAX_WORKERS: usize = 1 << 16;

    pub const fn new(range_bound: u64, target_count: usize, worker_count: usize) -> Self {
        Self {
            range_bound,
            target_count,
            worker_count,
        }
    }

    /// Checks that the run can start and can finish.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if:
    /// - the range is empty,
    /// - the target count is zero,
    /// - the target count exceeds the number of values in the range,
    /// - there are no workers, or more than [`MAX_WORKERS`](Self::MAX_WORKERS).
    pub fn validate(&self) -> Result<()> {
        if self.range_bound == 0 {
            return Err(Error::invalid_config("Range bound must be greater than 0"));
        }

        if self.target_count == 0 {
            return Err(Error::invalid_config("Target count must be greater than 0"));
        }

        // Pigeonhole: K distinct values cannot come out of fewer than K slots.
        if self.target_count as u64 > self.range_bound {
            return Err(Error::invalid_config(format!(
                "Target count {} exceeds range bound ({})",
                self.target_count, self.range_bound
            )));
        }

        if self.worker_count == 0 {
            return Err(Error::invalid_config("Worker count must be greater than 0"));
        }

        if self.worker_count > Self::MAX_WORKERS {
            return Err(Error::invalid_config(format!(
                "Worker count {} exceeds the limit of {}",
                self.worker_count,
                Self::MAX_WORKERS
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_target_equal_to_range() {
        assert_eq!(GenerateConfig::new(10, 10, 3).validate(), Ok(()));
    }

    #[test]
    fn rejects_target_above_range() {
        let err = GenerateConfig::new(5, 8, 1).validate().unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
        assert_eq!(
            err.to_string(),
            "Invalid config: Target count 8 exceeds range bound (5)"
        );
    }

    #[test]
    fn rejects_zero_values() {
        assert!(GenerateConfig::new(0, 1, 1).validate().is_err());
        assert!(GenerateConfig::new(10, 0, 1).validate().is_err());
        assert!(GenerateConfig::new(10, 1, 0).validate().is_err());
    }

    #[test]
    fn bounds_worker_count() {
        let limit = GenerateConfig::MAX_WORKERS;
        assert_eq!(GenerateConfig::new(10, 1, limit).validate(), Ok(()));

        let err = GenerateConfig::new(10, 1, usize::MAX).validate().unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
        assert!(err.to_string().contains("exceeds the limit"));
    }
}
