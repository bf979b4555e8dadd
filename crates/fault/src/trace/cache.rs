//! The cache module contains the [CachingTraceProvider], a memoizing wrapper around a
//! [TraceProvider].

use super::{StepData, TraceProvider};
use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use ethers::types::{H256, U256};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// A map of per-key cells. Concurrent queries for the same key share one computation, while
/// queries for different keys never wait on each other.
type CellMap<K, V> = DashMap<K, Arc<OnceCell<V>>>;

/// The [CachingTraceProvider] memoizes the results of an inner [TraceProvider]. Failed queries
/// are not cached and are retried by the next caller.
#[derive(Debug)]
pub struct CachingTraceProvider<P> {
    /// The wrapped provider.
    inner: P,
    /// Cached commitments by trace index.
    values: CellMap<U256, H256>,
    /// Cached step data by trace index.
    steps: CellMap<U256, StepData>,
    /// The cached absolute prestate commitment.
    prestate: OnceCell<H256>,
}

impl<P: TraceProvider> CachingTraceProvider<P> {
    /// Wraps `inner` in a new, empty cache.
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            values: DashMap::new(),
            steps: DashMap::new(),
            prestate: OnceCell::new(),
        }
    }

    /// Returns the wrapped provider.
    pub fn inner(&self) -> &P {
        &self.inner
    }

    /// Returns the cell for `key`, inserting an empty one if absent. The shard lock is released
    /// before the cell is awaited.
    fn cell<V>(map: &CellMap<U256, V>, key: U256) -> Arc<OnceCell<V>> {
        Arc::clone(&map.entry(key).or_default())
    }
}

#[async_trait]
impl<P: TraceProvider> TraceProvider for CachingTraceProvider<P> {
    async fn get(&self, trace_index: U256) -> Result<H256> {
        let cell = Self::cell(&self.values, trace_index);
        let value = cell
            .get_or_try_init(|| {
                tracing::trace!(target: "trace-cache", "Cache miss for value at trace index {}", trace_index);
                self.inner.get(trace_index)
            })
            .await?;
        Ok(*value)
    }

    async fn get_step_data(&self, trace_index: U256) -> Result<StepData> {
        let cell = Self::cell(&self.steps, trace_index);
        let step = cell
            .get_or_try_init(|| {
                tracing::trace!(target: "trace-cache", "Cache miss for step data at trace index {}", trace_index);
                self.inner.get_step_data(trace_index)
            })
            .await?;
        Ok(step.clone())
    }

    async fn absolute_prestate_commitment(&self) -> Result<H256> {
        let prestate = self
            .prestate
            .get_or_try_init(|| self.inner.absolute_prestate_commitment())
            .await?;
        Ok(*prestate)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{trace::AlphabetTraceProvider, FaultError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::task::JoinSet;

    /// A provider counting the queries that reach it.
    struct CountingProvider {
        inner: AlphabetTraceProvider,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TraceProvider for CountingProvider {
        async fn get(&self, trace_index: U256) -> Result<H256> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            self.inner.get(trace_index).await
        }

        async fn get_step_data(&self, trace_index: U256) -> Result<StepData> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.get_step_data(trace_index).await
        }

        async fn absolute_prestate_commitment(&self) -> Result<H256> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.absolute_prestate_commitment().await
        }
    }

    fn cached() -> Arc<CachingTraceProvider<CountingProvider>> {
        Arc::new(CachingTraceProvider::new(CountingProvider {
            inner: AlphabetTraceProvider::new(b"abcdefgh".to_vec(), 3),
            calls: AtomicUsize::new(0),
        }))
    }

    #[tokio::test]
    async fn values_are_memoized() {
        let provider = cached();
        let first = provider.get(U256::from(2)).await.unwrap();
        let second = provider.get(U256::from(2)).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first, provider.inner().inner.get(U256::from(2)).await.unwrap());
        assert_eq!(provider.inner().calls.load(Ordering::SeqCst), 1);

        provider.get_step_data(U256::from(2)).await.unwrap();
        provider.get_step_data(U256::from(2)).await.unwrap();
        provider.absolute_prestate_commitment().await.unwrap();
        provider.absolute_prestate_commitment().await.unwrap();
        assert_eq!(provider.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_queries_share_one_computation() {
        let provider = cached();
        let mut set = JoinSet::new();
        for i in 0..64u64 {
            let provider = Arc::clone(&provider);
            set.spawn(async move { provider.get(U256::from(i % 8)).await.unwrap() });
        }
        while let Some(res) = set.join_next().await {
            res.unwrap();
        }
        assert_eq!(provider.inner().calls.load(Ordering::SeqCst), 8);
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let provider = cached();
        let err = provider.get(U256::from(8)).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FaultError>(),
            Some(FaultError::IndexOutOfRange { .. })
        ));
        assert!(provider.get(U256::from(8)).await.is_err());
        assert_eq!(provider.inner().calls.load(Ordering::SeqCst), 2);
    }
}
