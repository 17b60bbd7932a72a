//! Minimum-interval gate for refresh operations

use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};
use tokio::time::Instant;

/// Lets a refresh through at most once per `min_interval`, one at a time
///
/// The interval counts from the end of the last attempt, whether it succeeded
/// or not, so a failing upstream sees no more requests than a healthy one.
#[derive(Debug)]
pub struct Throttle {
    min_interval: Duration,
    last_attempt: Mutex<Option<Instant>>,
    in_flight: AsyncMutex<()>,
}

/// Permission to run one refresh; dropping it starts the interval
#[derive(Debug)]
pub struct Pass<'a> {
    throttle: &'a Throttle,
    _guard: MutexGuard<'a, ()>,
}

/// Outcome of a throttled refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Refresh<T> {
    /// A request was made and this is its result
    Fetched(T),
    /// Throttled or already in flight; this is the cached value
    Cached(T),
}

impl<T> Refresh<T> {
    /// Whether a request was made
    #[must_use]
    pub const fn is_fetched(&self) -> bool {
        matches!(self, Self::Fetched(_))
    }

    /// The value, fetched or cached
    #[must_use]
    pub const fn value(&self) -> &T {
        match self {
            Self::Fetched(value) | Self::Cached(value) => value,
        }
    }

    /// The value, fetched or cached
    #[must_use]
    pub fn into_inner(self) -> T {
        match self {
            Self::Fetched(value) | Self::Cached(value) => value,
        }
    }

    /// Transform the value, keeping the outcome
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Refresh<U> {
        match self {
            Self::Fetched(value) => Refresh::Fetched(f(value)),
            Self::Cached(value) => Refresh::Cached(f(value)),
        }
    }
}

impl Throttle {
    /// Create a gate with the given minimum interval (zero disables it)
    #[must_use]
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_attempt: Mutex::new(None),
            in_flight: AsyncMutex::new(()),
        }
    }

    /// The configured minimum interval
    #[must_use]
    pub const fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// `None` while another refresh is running or the interval has not elapsed
    pub fn try_pass(&self) -> Option<Pass<'_>> {
        let guard = self.in_flight.try_lock().ok()?;

        if let Some(last) = *self.last_attempt.lock() {
            if last.elapsed() < self.min_interval {
                return None;
            }
        }

        Some(Pass {
            throttle: self,
            _guard: guard,
        })
    }
}

impl Drop for Pass<'_> {
    fn drop(&mut self) {
        *self.throttle.last_attempt.lock() = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_interval_gates_after_attempt() {
        let throttle = Throttle::new(Duration::from_secs(120));
        assert_eq!(throttle.min_interval(), Duration::from_secs(120));

        drop(throttle.try_pass().unwrap());
        assert!(throttle.try_pass().is_none());

        tokio::time::advance(Duration::from_secs(119)).await;
        assert!(throttle.try_pass().is_none());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(throttle.try_pass().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_counts_from_end_of_attempt() {
        let throttle = Throttle::new(Duration::from_secs(120));

        let pass = throttle.try_pass().unwrap();
        tokio::time::advance(Duration::from_secs(100)).await;
        drop(pass);

        tokio::time::advance(Duration::from_secs(100)).await;
        assert!(throttle.try_pass().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_refresh_is_skipped() {
        let throttle = Throttle::new(Duration::ZERO);

        let first = throttle.try_pass().unwrap();
        assert!(throttle.try_pass().is_none());

        drop(first);
        assert!(throttle.try_pass().is_some());
    }

    #[test]
    fn test_refresh_outcome() {
        let fetched = Refresh::Fetched(2).map(|n| n * 2);
        assert!(fetched.is_fetched());
        assert_eq!(*fetched.value(), 4);

        let cached = Refresh::Cached("old");
        assert!(!cached.is_fetched());
        assert_eq!(cached.into_inner(), "old");
    }
}
