//! Gated query slot with request deduplication and stale-result discard.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::ApiError;

/// Lifecycle of one cached asynchronous read.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryState<T> {
    /// Not dispatched: the enabling predicate is false, or the slot was
    /// reset. Carries no data and no error.
    Idle,
    /// Fetch in flight.
    Loading,
    /// Resolved with a value.
    Ready(T),
    /// Resolved: the backend reported no record.
    Missing,
    /// Fetch rejected or timed out.
    Failed(String),
}

impl<T> QueryState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Whether the read has reached a terminal state for this dispatch.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Ready(_) | Self::Missing | Self::Failed(_))
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self::Idle
    }
}

/// Fetch closure: each call produces one fresh read attempt.
/// `Ok(None)` means the backend settled with no record.
pub type Fetcher<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<Option<T>, ApiError>> + Send + Sync>;

/// A predicate-gated, deduplicating fetch slot.
///
/// State is published through a watch channel, so any number of simultaneous
/// subscribers observe the same in-flight request instead of duplicating it.
/// Every dispatch is stamped with a generation; disable and invalidate bump
/// the generation, so a resolution arriving after the race was decided can
/// never mutate the slot.
pub struct GatedQuery<T> {
    label: &'static str,
    tx: Arc<watch::Sender<QueryState<T>>>,
    fetcher: Fetcher<T>,
    timeout: Option<Duration>,
    enabled: AtomicBool,
    generation: Arc<Mutex<u64>>,
    inflight: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Clone + Send + Sync + 'static> GatedQuery<T> {
    /// Create a disabled slot. `label` names the query in logs and timeout
    /// errors.
    pub fn new<F>(label: &'static str, timeout: Option<Duration>, fetcher: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, Result<Option<T>, ApiError>> + Send + Sync + 'static,
    {
        let (tx, _rx) = watch::channel(QueryState::Idle);
        Self {
            label,
            tx: Arc::new(tx),
            fetcher: Arc::new(fetcher),
            timeout,
            enabled: AtomicBool::new(false),
            generation: Arc::new(Mutex::new(0)),
            inflight: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<QueryState<T>> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> QueryState<T> {
        self.tx.borrow().clone()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Flip the enabling predicate. Turning it on dispatches a fetch if none
    /// is in flight; turning it off aborts any in-flight fetch and resets the
    /// slot, so the request's effect is suppressed, not merely ignored.
    pub fn set_enabled(&self, enabled: bool) {
        let was = self.enabled.swap(enabled, Ordering::SeqCst);
        if enabled && !was {
            self.dispatch();
        } else if !enabled && was {
            self.reset();
        }
    }

    /// Force a fresh read. No-op while disabled; deduplicated while a fetch
    /// is already in flight.
    pub fn refresh(&self) {
        if !self.enabled.load(Ordering::SeqCst) {
            return;
        }
        if self.tx.borrow().is_loading() {
            return;
        }
        self.dispatch();
    }

    /// Drop whatever the slot holds and, if enabled, fetch fresh.
    pub fn invalidate(&self) {
        self.reset();
        if self.enabled.load(Ordering::SeqCst) {
            self.dispatch();
        }
    }

    fn reset(&self) {
        {
            let mut generation = self.generation.lock().unwrap();
            *generation += 1;
        }
        if let Some(handle) = self.inflight.lock().unwrap().take() {
            handle.abort();
        }
        self.tx.send_replace(QueryState::Idle);
    }

    fn dispatch(&self) {
        let my_generation = {
            let mut generation = self.generation.lock().unwrap();
            *generation += 1;
            *generation
        };
        self.tx.send_replace(QueryState::Loading);

        let fut = (self.fetcher)();
        let tx = Arc::clone(&self.tx);
        let generation = Arc::clone(&self.generation);
        let timeout = self.timeout;
        let label = self.label;

        let handle = tokio::spawn(async move {
            let result = match timeout {
                Some(deadline) => match tokio::time::timeout(deadline, fut).await {
                    Ok(result) => result,
                    Err(_) => Err(ApiError::Timeout {
                        endpoint: label.to_string(),
                        timeout: deadline,
                    }),
                },
                None => fut.await,
            };

            let next = match result {
                Ok(Some(value)) => QueryState::Ready(value),
                Ok(None) => QueryState::Missing,
                Err(e) => {
                    tracing::warn!(query = label, error = %e, "query fetch failed");
                    QueryState::Failed(e.to_string())
                }
            };

            let current = generation.lock().unwrap();
            if *current != my_generation {
                tracing::debug!(query = label, "discarding stale query resolution");
                return;
            }
            tx.send_replace(next);
        });

        *self.inflight.lock().unwrap() = Some(handle);
    }
}

impl<T> Drop for GatedQuery<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.inflight.lock().unwrap().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;

    use futures::FutureExt;

    use super::*;

    fn counting_query(
        calls: Arc<AtomicU32>,
        delay: Option<Duration>,
        result: Result<Option<u32>, ()>,
    ) -> GatedQuery<u32> {
        GatedQuery::new("test", None, move || {
            calls.fetch_add(1, Ordering::SeqCst);
            let result = result.clone();
            async move {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                result.map_err(|_| ApiError::Http {
                    endpoint: "test".to_string(),
                    reason: "boom".to_string(),
                })
            }
            .boxed()
        })
    }

    async fn settled(query: &GatedQuery<u32>) -> QueryState<u32> {
        let mut rx = query.subscribe();
        rx.wait_for(|state| state.is_settled()).await.unwrap().clone()
    }

    #[tokio::test]
    async fn disabled_query_never_dispatches() {
        let calls = Arc::new(AtomicU32::new(0));
        let query = counting_query(Arc::clone(&calls), None, Ok(Some(7)));

        query.refresh();
        tokio::task::yield_now().await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(query.snapshot().is_idle());
    }

    #[tokio::test]
    async fn enable_dispatches_exactly_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let query = counting_query(Arc::clone(&calls), None, Ok(Some(7)));

        query.set_enabled(true);
        assert_eq!(settled(&query).await, QueryState::Ready(7));

        // Re-asserting the predicate must not refetch.
        query.set_enabled(true);
        tokio::task::yield_now().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn refresh_is_deduplicated_while_loading() {
        let calls = Arc::new(AtomicU32::new(0));
        let query = counting_query(
            Arc::clone(&calls),
            Some(Duration::from_millis(20)),
            Ok(Some(7)),
        );

        query.set_enabled(true);
        query.refresh();
        query.refresh();
        assert_eq!(settled(&query).await, QueryState::Ready(7));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn disable_mid_flight_suppresses_resolution() {
        let calls = Arc::new(AtomicU32::new(0));
        let query = counting_query(
            Arc::clone(&calls),
            Some(Duration::from_millis(50)),
            Ok(Some(7)),
        );

        query.set_enabled(true);
        assert!(query.snapshot().is_loading());
        query.set_enabled(false);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(query.snapshot().is_idle());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidate_forces_a_fresh_read() {
        let calls = Arc::new(AtomicU32::new(0));
        let query = counting_query(Arc::clone(&calls), None, Ok(Some(7)));

        query.set_enabled(true);
        assert_eq!(settled(&query).await, QueryState::Ready(7));

        query.invalidate();
        assert_eq!(settled(&query).await, QueryState::Ready(7));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn absent_record_settles_missing() {
        let calls = Arc::new(AtomicU32::new(0));
        let query = counting_query(Arc::clone(&calls), None, Ok(None));

        query.set_enabled(true);
        assert_eq!(settled(&query).await, QueryState::Missing);
    }

    #[tokio::test]
    async fn rejection_settles_failed() {
        let calls = Arc::new(AtomicU32::new(0));
        let query = counting_query(Arc::clone(&calls), None, Err(()));

        query.set_enabled(true);
        let state = settled(&query).await;
        assert!(state.error().unwrap().contains("boom"));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_fetch_times_out_as_failed() {
        let query: GatedQuery<u32> =
            GatedQuery::new("slow", Some(Duration::from_secs(30)), move || {
                async move {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(Some(7))
                }
                .boxed()
            });

        query.set_enabled(true);
        let mut rx = query.subscribe();
        let state = rx.wait_for(|state| state.is_settled()).await.unwrap().clone();
        assert!(state.error().unwrap().contains("timed out"));
    }
}
