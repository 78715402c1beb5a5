//! Lazily constructed, process-lifetime model instances.
//!
//! Loading an embedding or reranking model takes seconds of blocking work.
//! A [`ModelSlot`] runs the loader once under `spawn_blocking`, caches the
//! result, and hands out clones of the `Arc` afterwards. Concurrent first
//! callers wait on the same load. [`reset`](ModelSlot::reset) drops the
//! cached instance so the next call loads again.

use std::sync::{Arc, PoisonError, RwLock};

use ragpipe_core::error::{Error, ModelKind, Result};

pub struct ModelSlot<T: ?Sized> {
    kind: ModelKind,
    value: RwLock<Option<Arc<T>>>,
    init_lock: tokio::sync::Mutex<()>,
}

impl<T: ?Sized + Send + Sync + 'static> ModelSlot<T> {
    pub fn new(kind: ModelKind) -> Self {
        Self {
            kind,
            value: RwLock::new(None),
            init_lock: tokio::sync::Mutex::new(()),
        }
    }

    fn cached(&self) -> Option<Arc<T>> {
        self.value
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.cached().is_some()
    }

    /// Return the cached instance, loading it with `init` on first use.
    ///
    /// A failed load leaves the slot empty, so a later call tries again.
    pub async fn get_or_init<F>(&self, model: &str, init: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Result<Arc<T>> + Send + 'static,
    {
        if let Some(value) = self.cached() {
            return Ok(value);
        }

        let _guard = self.init_lock.lock().await;
        if let Some(value) = self.cached() {
            return Ok(value);
        }

        let started = std::time::Instant::now();
        let value = run_blocking(init).await.map_err(|e| match e {
            load @ Error::ModelLoad { .. } => load,
            other => Error::ModelLoad {
                kind: self.kind,
                model: model.to_string(),
                reason: other.to_string(),
            },
        })?;
        tracing::info!(
            kind = %self.kind,
            model,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "model ready"
        );

        *self.value.write().unwrap_or_else(PoisonError::into_inner) = Some(value.clone());
        Ok(value)
    }

    /// Drop the cached instance. Callers still holding an `Arc` keep theirs.
    pub fn reset(&self) {
        self.value
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

/// Run blocking work on tokio's blocking pool.
///
/// A panic in `f` surfaces as [`Error::Inference`].
pub async fn run_blocking<R, F>(f: F) -> Result<R>
where
    F: FnOnce() -> Result<R> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Inference(format!("blocking task failed: {}", e)))?
}
