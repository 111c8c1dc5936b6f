//! Future spawning abstraction and its tokio implementation.

use std::future::Future;
use std::sync::Arc;

use tokio::runtime::Handle;

/// Abstraction for spawning the control loop and workers on a runtime.
pub trait Spawn {
    /// Spawn a detached future.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;

    /// Whether [`Spawn::spawn`] can be called right now.
    fn is_available(&self) -> bool {
        true
    }
}

/// Spawner backed by tokio.
///
/// Without an explicit handle it spawns onto the ambient runtime of the
/// calling thread.
#[derive(Debug, Clone, Default)]
pub struct TokioSpawner {
    handle: Option<Arc<Handle>>,
}

impl TokioSpawner {
    /// Spawn onto a specific runtime.
    #[must_use]
    pub fn new(handle: Handle) -> Self {
        Self {
            handle: Some(Arc::new(handle)),
        }
    }

    /// Spawn onto the runtime of the current thread, if there is one.
    #[must_use]
    pub fn current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl Spawn for TokioSpawner {
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match &self.handle {
            Some(handle) => {
                handle.spawn(fut);
            }
            None => {
                tokio::spawn(fut);
            }
        }
    }

    fn is_available(&self) -> bool {
        self.handle.is_some() || Handle::try_current().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_outside_runtime() {
        assert!(!TokioSpawner::default().is_available());
        assert!(TokioSpawner::current().is_none());
    }

    #[tokio::test]
    async fn test_spawns_on_ambient_runtime() {
        let spawner = TokioSpawner::default();
        assert!(spawner.is_available());
        let (tx, rx) = tokio::sync::oneshot::channel();
        spawner.spawn(async move {
            let _ = tx.send(7);
        });
        assert_eq!(rx.await.unwrap(), 7);
    }
}
