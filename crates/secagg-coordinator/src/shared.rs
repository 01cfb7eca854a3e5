//! A coordinator shared between concurrent request handlers

use crate::{Coordinator, Result};
use secagg_core::AggregateValue;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};

struct Inner<V: AggregateValue> {
    coordinator: Mutex<Coordinator<V>>,
    changed: Notify,
}

/// Cloneable handle to one coordinator.
///
/// Every mutation wakes tasks blocked in `wait_for`.
pub struct SharedCoordinator<V: AggregateValue> {
    inner: Arc<Inner<V>>,
}

impl<V: AggregateValue> Clone for SharedCoordinator<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V: AggregateValue> SharedCoordinator<V> {
    pub fn new(coordinator: Coordinator<V>) -> Self {
        Self {
            inner: Arc::new(Inner {
                coordinator: Mutex::new(coordinator),
                changed: Notify::new(),
            }),
        }
    }

    /// Mutate the coordinator and notify waiters
    pub async fn update<R>(&self, f: impl FnOnce(&mut Coordinator<V>) -> R) -> R {
        let result = {
            let mut coordinator = self.inner.coordinator.lock().await;
            f(&mut coordinator)
        };
        self.inner.changed.notify_waiters();
        result
    }

    /// Inspect the coordinator
    pub async fn read<R>(&self, f: impl FnOnce(&Coordinator<V>) -> R) -> R {
        let coordinator = self.inner.coordinator.lock().await;
        f(&coordinator)
    }

    /// Repeat `f` until it stops reporting `NotReady`.
    ///
    /// Retries on every change and at least once per `interval`, at most
    /// `attempts` times; the last `NotReady` is returned after that.
    pub async fn wait_for<R, F>(&self, attempts: usize, interval: Duration, mut f: F) -> Result<R>
    where
        F: FnMut(&Coordinator<V>) -> Result<R>,
    {
        let mut attempt = 0;
        loop {
            let changed = self.inner.changed.notified();
            match self.read(&mut f).await {
                Err(e) if e.is_retryable() && attempt < attempts => attempt += 1,
                other => return other,
            }

            tokio::select! {
                _ = changed => {}
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }
}
