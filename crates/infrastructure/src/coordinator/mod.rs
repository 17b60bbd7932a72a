//! Interval-based polling coordinators
//!
//! A [`PollingCoordinator`] runs one refresh operation on a fixed interval and
//! publishes the result to subscribers through a `watch` channel. The first
//! refresh is awaited by the caller so setup can fail fast; afterwards a
//! failed tick keeps the last published value and only records the error.
//! A tick answered from the connector's cache is counted as throttled, not
//! as a success.

mod ptv;

use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use integration_ptv::{PtvError, Refresh};
use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tracing::{debug, error, info, instrument};

pub use ptv::{
    PtvCoordinators, combined_coordinator, departures_coordinator, disruptions_coordinator,
};

/// Coordinator errors
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// The blocking first refresh failed; setup must not complete
    #[error("First refresh of {name} failed: {source}")]
    FirstRefreshFailed {
        /// Coordinator name
        name: String,
        /// Underlying refresh error
        source: PtvError,
    },

    /// Interval must be positive
    #[error("Invalid interval for {0}: must be greater than zero")]
    InvalidInterval(String),

    /// `start` called while the polling task is alive
    #[error("Coordinator {0} is already running")]
    AlreadyRunning(String),
}

impl CoordinatorError {
    /// Returns true if retrying setup later might succeed
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::FirstRefreshFailed { source, .. } => source.is_retryable(),
            Self::InvalidInterval(_) | Self::AlreadyRunning(_) => false,
        }
    }
}

/// What subscribers see: the last good value and the outcome of the last tick
#[derive(Debug, Clone)]
pub struct CoordinatorState<T> {
    /// Last successfully refreshed value
    pub value: Option<T>,
    /// Whether the most recent refresh succeeded
    pub last_update_success: bool,
    /// Error of the most recent refresh, if it failed
    pub last_error: Option<String>,
    /// When `value` was produced
    pub last_success: Option<DateTime<Utc>>,
}

impl<T> Default for CoordinatorState<T> {
    fn default() -> Self {
        Self {
            value: None,
            last_update_success: false,
            last_error: None,
            last_success: None,
        }
    }
}

impl<T> CoordinatorState<T> {
    /// Whether any value was ever published
    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.value.is_some()
    }
}

/// Statistics for a coordinator
#[derive(Debug, Clone)]
pub struct CoordinatorStats {
    /// Coordinator name
    pub name: String,
    /// Poll interval
    pub interval: Duration,
    /// Whether the polling task is alive
    pub running: bool,
    /// Number of successful refreshes
    pub success_count: u64,
    /// Number of failed refreshes
    pub failure_count: u64,
    /// Number of ticks answered from cache without a request
    pub throttled_count: u64,
    /// Last refresh time
    pub last_run: Option<DateTime<Utc>>,
    /// Last successful refresh time
    pub last_success: Option<DateTime<Utc>>,
    /// Last failure time
    pub last_failure: Option<DateTime<Utc>>,
    /// Last error message
    pub last_error: Option<String>,
    /// Average refresh duration in milliseconds
    pub avg_duration_ms: u64,
}

#[derive(Default)]
struct RefreshMetadata {
    success_count: AtomicU64,
    failure_count: AtomicU64,
    throttled_count: AtomicU64,
    last_run: RwLock<Option<DateTime<Utc>>>,
    last_success: RwLock<Option<DateTime<Utc>>>,
    last_failure: RwLock<Option<DateTime<Utc>>>,
    last_error: RwLock<Option<String>>,
    total_duration_ms: AtomicU64,
}

impl RefreshMetadata {
    fn record_success(&self, at: DateTime<Utc>, duration_ms: u64) {
        self.success_count.fetch_add(1, Ordering::Relaxed);
        self.total_duration_ms
            .fetch_add(duration_ms, Ordering::Relaxed);
        *self.last_run.write() = Some(at);
        *self.last_success.write() = Some(at);
    }

    fn record_failure(&self, at: DateTime<Utc>, error: String, duration_ms: u64) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
        self.total_duration_ms
            .fetch_add(duration_ms, Ordering::Relaxed);
        *self.last_run.write() = Some(at);
        *self.last_failure.write() = Some(at);
        *self.last_error.write() = Some(error);
    }

    fn record_throttled(&self, at: DateTime<Utc>) {
        self.throttled_count.fetch_add(1, Ordering::Relaxed);
        *self.last_run.write() = Some(at);
    }

    fn to_stats(&self, name: &str, interval: Duration, running: bool) -> CoordinatorStats {
        let success = self.success_count.load(Ordering::Relaxed);
        let failure = self.failure_count.load(Ordering::Relaxed);
        let total = success + failure;
        let avg_duration = if total > 0 {
            self.total_duration_ms.load(Ordering::Relaxed) / total
        } else {
            0
        };

        CoordinatorStats {
            name: name.to_string(),
            interval,
            running,
            success_count: success,
            failure_count: failure,
            throttled_count: self.throttled_count.load(Ordering::Relaxed),
            last_run: *self.last_run.read(),
            last_success: *self.last_success.read(),
            last_failure: *self.last_failure.read(),
            last_error: self.last_error.read().clone(),
            avg_duration_ms: avg_duration,
        }
    }
}

type RefreshFn<T> =
    Box<dyn Fn() -> BoxFuture<'static, Result<Refresh<T>, PtvError>> + Send + Sync>;

/// Runs one refresh operation on a fixed interval
pub struct PollingCoordinator<T> {
    name: String,
    interval: Duration,
    refresh_fn: RefreshFn<T>,
    state: watch::Sender<CoordinatorState<T>>,
    metadata: RefreshMetadata,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<T> std::fmt::Debug for PollingCoordinator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingCoordinator")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl<T> PollingCoordinator<T> {
    /// Coordinator name, used in logs and stats
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Poll interval
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether the polling task is alive
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the polling task; the published state stays readable
    pub fn stop(&self) {
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
            info!(coordinator = %self.name, "Coordinator stopped");
        }
    }

    /// Subscribe to state changes
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CoordinatorState<T>> {
        self.state.subscribe()
    }

    /// Refresh statistics
    #[must_use]
    pub fn stats(&self) -> CoordinatorStats {
        self.metadata
            .to_stats(&self.name, self.interval, self.is_running())
    }
}

impl<T> PollingCoordinator<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a coordinator; nothing runs until [`Self::first_refresh`] or
    /// [`Self::start`]
    pub fn new<F, Fut>(
        name: impl Into<String>,
        interval: Duration,
        refresh: F,
    ) -> Result<Self, CoordinatorError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Refresh<T>, PtvError>> + Send + 'static,
    {
        let name = name.into();
        if interval.is_zero() {
            return Err(CoordinatorError::InvalidInterval(name));
        }

        let (state, _) = watch::channel(CoordinatorState::default());

        Ok(Self {
            name,
            interval,
            refresh_fn: Box::new(move || refresh().boxed()),
            state,
            metadata: RefreshMetadata::default(),
            task: Mutex::new(None),
        })
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> CoordinatorState<T> {
        self.state.borrow().clone()
    }

    /// Last good value
    #[must_use]
    pub fn value(&self) -> Option<T> {
        self.state.borrow().value.clone()
    }

    /// Run one refresh and publish its outcome
    ///
    /// On failure the previously published value is left in place.
    #[instrument(skip(self), fields(coordinator = %self.name))]
    pub async fn refresh(&self) -> Result<T, PtvError> {
        let start = Instant::now();
        let result = (self.refresh_fn)().await;
        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        let now = Utc::now();

        match result {
            Ok(Refresh::Fetched(value)) => {
                self.metadata.record_success(now, duration_ms);
                self.state.send_modify(|state| {
                    state.value = Some(value.clone());
                    state.last_update_success = true;
                    state.last_error = None;
                    state.last_success = Some(now);
                });
                debug!(duration_ms, "Refresh published");
                Ok(value)
            },
            Ok(Refresh::Cached(value)) => {
                self.metadata.record_throttled(now);
                // only fills an empty state; the cache is what was published
                self.state.send_if_modified(|state| {
                    if state.value.is_some() {
                        return false;
                    }
                    state.value = Some(value.clone());
                    true
                });
                debug!("Refresh throttled, keeping published value");
                Ok(value)
            },
            Err(e) => {
                self.metadata.record_failure(now, e.to_string(), duration_ms);
                self.state.send_modify(|state| {
                    state.last_update_success = false;
                    state.last_error = Some(e.to_string());
                });
                error!(error = %e, duration_ms, "Refresh failed");
                Err(e)
            },
        }
    }

    /// Blocking first refresh; its failure fails setup
    pub async fn first_refresh(&self) -> Result<T, CoordinatorError> {
        self.refresh()
            .await
            .map_err(|source| CoordinatorError::FirstRefreshFailed {
                name: self.name.clone(),
                source,
            })
    }

    /// Spawn the polling loop; the first tick fires one interval from now
    pub fn start(self: &Arc<Self>) -> Result<(), CoordinatorError> {
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Err(CoordinatorError::AlreadyRunning(self.name.clone()));
        }

        let coordinator = Arc::clone(self);
        *task = Some(tokio::spawn(async move { coordinator.run().await }));

        info!(
            coordinator = %self.name,
            interval_secs = self.interval.as_secs(),
            "Coordinator started"
        );
        Ok(())
    }

    async fn run(&self) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            // failures are recorded in the published state
            self.refresh().await.ok();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting(
        fail_from: usize,
    ) -> (
        Arc<AtomicUsize>,
        impl Fn() -> BoxFuture<'static, Result<Refresh<usize>, PtvError>> + Send + Sync + 'static,
    ) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let refresh = move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n >= fail_from {
                    Err(PtvError::RequestFailed { status: 503 })
                } else {
                    Ok(Refresh::Fetched(n))
                }
            }
            .boxed()
        };
        (calls, refresh)
    }

    #[test]
    fn test_zero_interval_rejected() {
        let result = PollingCoordinator::new("departures", Duration::ZERO, || async {
            Ok::<_, PtvError>(Refresh::Fetched(1))
        });
        assert!(matches!(result, Err(CoordinatorError::InvalidInterval(_))));
    }

    #[tokio::test]
    async fn test_first_refresh_publishes_value() {
        let (calls, refresh) = counting(usize::MAX);
        let coordinator =
            PollingCoordinator::new("departures", Duration::from_secs(60), refresh).unwrap();
        let rx = coordinator.subscribe();

        assert_eq!(coordinator.first_refresh().await.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let state = rx.borrow().clone();
        assert_eq!(state.value, Some(1));
        assert!(state.last_update_success);
        assert!(state.last_success.is_some());
        assert_eq!(coordinator.stats().success_count, 1);
    }

    #[tokio::test]
    async fn test_first_refresh_failure_is_an_error() {
        let (_, refresh) = counting(1);
        let coordinator =
            PollingCoordinator::new("departures", Duration::from_secs(60), refresh).unwrap();

        let err = coordinator.first_refresh().await.unwrap_err();
        assert!(matches!(err, CoordinatorError::FirstRefreshFailed { .. }));
        assert!(err.is_retryable());
        assert!(!coordinator.state().is_available());
        assert!(coordinator.state().last_error.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_tick_keeps_last_value() {
        let (calls, refresh) = counting(3);
        let coordinator = Arc::new(
            PollingCoordinator::new("disruptions", Duration::from_secs(60), refresh).unwrap(),
        );
        let mut rx = coordinator.subscribe();

        coordinator.first_refresh().await.unwrap();
        rx.borrow_and_update();
        coordinator.start().unwrap();

        // second call succeeds, third fails
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().value, Some(2));

        rx.changed().await.unwrap();
        let state = rx.borrow_and_update().clone();
        assert_eq!(state.value, Some(2));
        assert!(!state.last_update_success);
        assert!(state.last_error.is_some());

        // the loop survives failures
        rx.changed().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 4);

        let stats = coordinator.stats();
        assert_eq!(stats.success_count, 2);
        assert_eq!(stats.failure_count, 2);
        assert!(stats.running);

        coordinator.stop();
        assert!(!coordinator.is_running());
    }

    #[tokio::test]
    async fn test_cached_answer_is_counted_as_throttled() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let coordinator = PollingCoordinator::new("departures", Duration::from_secs(60), move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Ok::<_, PtvError>(Refresh::Fetched(7))
                } else {
                    Ok(Refresh::Cached(7))
                }
            }
        })
        .unwrap();
        let mut rx = coordinator.subscribe();

        coordinator.first_refresh().await.unwrap();
        let published_at = coordinator.state().last_success;
        rx.borrow_and_update();

        assert_eq!(coordinator.refresh().await.unwrap(), 7);
        assert!(!rx.has_changed().unwrap());

        let stats = coordinator.stats();
        assert_eq!(stats.success_count, 1);
        assert_eq!(stats.throttled_count, 1);
        assert_eq!(stats.failure_count, 0);
        assert_eq!(coordinator.state().last_success, published_at);
    }

    #[tokio::test]
    async fn test_cached_answer_fills_empty_state() {
        let coordinator = PollingCoordinator::new("departures", Duration::from_secs(60), || async {
            Ok::<_, PtvError>(Refresh::Cached(3))
        })
        .unwrap();

        assert_eq!(coordinator.first_refresh().await.unwrap(), 3);
        assert_eq!(coordinator.value(), Some(3));
        assert_eq!(coordinator.stats().success_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_is_rejected() {
        let coordinator = Arc::new(
            PollingCoordinator::new("departures", Duration::from_secs(60), || async {
                Ok::<_, PtvError>(Refresh::Fetched(()))
            })
            .unwrap(),
        );

        coordinator.start().unwrap();
        assert!(matches!(
            coordinator.start(),
            Err(CoordinatorError::AlreadyRunning(_))
        ));

        coordinator.stop();
        tokio::task::yield_now().await;
        assert!(coordinator.start().is_ok());
        coordinator.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_waits_one_interval() {
        let (calls, refresh) = counting(usize::MAX);
        let coordinator = Arc::new(
            PollingCoordinator::new("departures", Duration::from_secs(600), refresh).unwrap(),
        );

        coordinator.start().unwrap();
        tokio::time::sleep(Duration::from_secs(599)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        coordinator.stop();
    }
}
