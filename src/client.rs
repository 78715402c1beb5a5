//! Cached vector-store handle.
//!
//! A [`ClientSlot`] holds at most one live [`VectorStore`] handle.
//! [`get`](ClientSlot::get) hands out the cached handle while it reports
//! ready and reconnects otherwise; [`close`](ClientSlot::close) releases it
//! so the next `get` starts fresh.
//!
//! The handle sits in a `std::sync::RwLock` that is never held across an
//! `.await`. Connecting is serialized by an async mutex, so concurrent
//! first callers share one connection instead of racing to open several.

use std::sync::{Arc, PoisonError, RwLock};

use ragpipe_core::error::Result;
use ragpipe_core::store::{StoreConnector, VectorStore};

pub struct ClientSlot {
    connector: Arc<dyn StoreConnector>,
    handle: RwLock<Option<Arc<dyn VectorStore>>>,
    connect_lock: tokio::sync::Mutex<()>,
}

impl ClientSlot {
    pub fn new(connector: Arc<dyn StoreConnector>) -> Self {
        Self {
            connector,
            handle: RwLock::new(None),
            connect_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn endpoint(&self) -> String {
        self.connector.endpoint()
    }

    fn cached(&self) -> Option<Arc<dyn VectorStore>> {
        self.handle
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Remove `stale` from the slot if it is still the cached handle.
    fn evict(&self, stale: &Arc<dyn VectorStore>) {
        let mut slot = self.handle.write().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|h| Arc::ptr_eq(h, stale)) {
            *slot = None;
        }
    }

    /// Whether a handle is currently cached. Does not probe it.
    pub fn is_connected(&self) -> bool {
        self.cached().is_some()
    }

    /// Return the cached handle if it is ready, otherwise connect and cache.
    ///
    /// Connection failures are returned as-is (`Error::Connectivity`); there
    /// are no internal retries.
    pub async fn get(&self) -> Result<Arc<dyn VectorStore>> {
        if let Some(handle) = self.cached() {
            if handle.is_ready().await {
                return Ok(handle);
            }
            tracing::warn!(endpoint = %handle.endpoint(), "cached store handle not ready; reconnecting");
            self.evict(&handle);
            handle.close().await;
        }

        let _guard = self.connect_lock.lock().await;
        // Another caller may have connected while we waited.
        if let Some(handle) = self.cached() {
            return Ok(handle);
        }

        let handle = self.connector.connect().await?;
        tracing::debug!(endpoint = %handle.endpoint(), "store handle cached");
        *self.handle.write().unwrap_or_else(PoisonError::into_inner) = Some(handle.clone());
        Ok(handle)
    }

    /// Close and forget the cached handle. No-op when nothing is cached.
    pub async fn close(&self) {
        let handle = self
            .handle
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.close().await;
            tracing::debug!(endpoint = %handle.endpoint(), "store handle closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragpipe_core::store::memory::{InMemoryStore, MemoryConnector};

    fn slot() -> (ClientSlot, Arc<MemoryConnector>) {
        let connector = Arc::new(MemoryConnector::new(Arc::new(InMemoryStore::new())));
        (ClientSlot::new(connector.clone()), connector)
    }

    #[tokio::test]
    async fn test_get_reuses_handle() {
        let (slot, connector) = slot();
        let a = slot.get().await.unwrap();
        let b = slot.get().await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(connector.connect_count(), 1);
    }

    #[tokio::test]
    async fn test_close_forces_reconnect() {
        let (slot, connector) = slot();
        slot.get().await.unwrap();
        slot.close().await;
        assert!(!slot.is_connected());
        slot.get().await.unwrap();
        assert_eq!(connector.connect_count(), 2);
    }

    #[tokio::test]
    async fn test_close_when_empty_is_noop() {
        let (slot, connector) = slot();
        slot.close().await;
        slot.close().await;
        assert_eq!(connector.connect_count(), 0);
    }

    #[tokio::test]
    async fn test_unready_handle_is_replaced() {
        let (slot, connector) = slot();
        slot.get().await.unwrap();
        connector.store().set_ready(false);
        let err = slot.get().await.err().unwrap();
        assert!(err.is_connectivity());
        assert!(!slot.is_connected());

        connector.store().set_ready(true);
        slot.get().await.unwrap();
        assert_eq!(connector.connect_count(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_first_calls_connect_once() {
        let (slot, connector) = slot();
        let slot = Arc::new(slot);
        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let slot = slot.clone();
                tokio::spawn(async move { slot.get().await.map(|_| ()) })
            })
            .collect();
        for t in tasks {
            t.await.unwrap().unwrap();
        }
        assert_eq!(connector.connect_count(), 1);
    }
}
