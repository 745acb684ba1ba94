// ── Controller serialization lock ──
//
// One async mutex per controller connection. Every conversation with the
// controller (login + fetch, or login + read + write) runs while holding it.
// Re-entry is expressed by passing the held guard down as `LockScope::Held`
// instead of acquiring a second time.

use tokio::sync::{Mutex, MutexGuard};
use tracing::trace;

/// Serializes controller conversations.
#[derive(Debug, Default)]
pub struct ControllerLock {
    inner: Mutex<()>,
}

/// Proof that the caller holds the `ControllerLock`.
#[derive(Debug)]
pub struct LockGuard<'a> {
    _guard: MutexGuard<'a, ()>,
}

/// How a controller-facing operation obtains the lock.
#[derive(Debug, Clone, Copy)]
pub enum LockScope<'a> {
    /// Take the lock for the duration of the operation.
    Acquire,
    /// The caller already holds the lock.
    Held(&'a LockGuard<'a>),
}

impl ControllerLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self) -> LockGuard<'_> {
        trace!("waiting for controller lock");
        let guard = self.inner.lock().await;
        trace!("controller lock acquired");
        LockGuard { _guard: guard }
    }

    /// Acquire unless `scope` says the caller already holds the lock.
    /// The returned guard (if any) must be kept alive for the operation.
    pub async fn enter(&self, scope: LockScope<'_>) -> Option<LockGuard<'_>> {
        match scope {
            LockScope::Acquire => Some(self.acquire().await),
            LockScope::Held(_) => None,
        }
    }
}
