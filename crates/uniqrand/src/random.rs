use rand::{Rng, SeedableRng, rngs::StdRng};
use std::time::{SystemTime, UNIX_EPOCH};

/// A trait for per-source random streams.
///
/// Every source owns its own instance, built by [`RandSource::for_source`]
/// with the source's index, so implementations never need to be `Sync`. This
/// abstraction lets you plug in a real generator or a scripted one in tests.
///
/// # Example
/// ```
/// use uniqrand::RandSource;
///
/// struct Counter(u64);
/// impl RandSource for Counter {
///     fn for_source(source_id: usize) -> Self {
///         Counter(source_id as u64)
///     }
///
///     fn next_below(&mut self, bound: u64) -> u64 {
///         self.0 += 1;
///         self.0 % bound
///     }
/// }
///
/// let mut rng = Counter::for_source(2);
/// assert_eq!(rng.next_below(10), 3);
/// ```
pub trait RandSource: Send + 'static {
    /// Creates the stream for the source with index `source_id`.
    fn for_source(source_id: usize) -> Self
    where
        Self: Sized;

    /// Returns a value in `[0, bound)`. `bound` is never zero.
    fn next_below(&mut self, bound: u64) -> u64;
}

/// A [`RandSource`] backed by [`StdRng`], seeded per source.
///
/// The seed mixes the wall clock in nanoseconds with the source index, so two
/// sources started in the same instant still draw from different streams.
#[derive(Clone, Debug)]
pub struct SeededRandom {
    rng: StdRng,
}

impl SeededRandom {
    /// Golden-ratio increment, spreads neighbouring indices across the seed
    /// space.
    const INDEX_SPREAD: u64 = 0x9E37_79B9_7F4A_7C15;

    /// Builds a stream from an explicit seed.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn clock_nanos() -> u64 {
        // A clock before the epoch only costs seed entropy, the index still
        // separates the streams.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_nanos() as u64)
    }
}

impl RandSource for SeededRandom {
    fn for_source(source_id: usize) -> Self {
        let spread = (source_id as u64 + 1).wrapping_mul(Self::INDEX_SPREAD);
        Self::with_seed(Self::clock_nanos() ^ spread)
    }

    fn next_below(&mut self, bound: u64) -> u64 {
        self.rng.random_range(0..bound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stays_in_range() {
        let mut rng = SeededRandom::for_source(0);
        for bound in [1, 2, 7, 1_000, u64::MAX] {
            for _ in 0..1_000 {
                assert!(rng.next_below(bound) < bound);
            }
        }
    }

    #[test]
    fn bound_of_one_always_yields_zero() {
        let mut rng = SeededRandom::for_source(3);
        assert!((0..100).all(|_| rng.next_below(1) == 0));
    }

    #[test]
    fn same_seed_same_stream() {
        let mut a = SeededRandom::with_seed(42);
        let mut b = SeededRandom::with_seed(42);
        let xs: Vec<_> = (0..64).map(|_| a.next_below(1 << 40)).collect();
        let ys: Vec<_> = (0..64).map(|_| b.next_below(1 << 40)).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn sources_get_distinct_streams() {
        let mut a = SeededRandom::for_source(0);
        let mut b = SeededRandom::for_source(1);
        let xs: Vec<_> = (0..64).map(|_| a.next_below(u64::MAX)).collect();
        let ys: Vec<_> = (0..64).map(|_| b.next_below(u64::MAX)).collect();
        assert_ne!(xs, ys);
    }
}
