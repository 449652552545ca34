use super::naming::VariantKind;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::oneshot;

/// Identity of one derivative file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DerivativeKey {
    pub album: String,
    /// Derivative path relative to the album's thumbnail root.
    pub derivative: String,
    pub kind: VariantKind,
}

/// Outcome of a registration attempt.
pub(crate) enum Registration {
    /// The caller owns the computation until the guard is dropped.
    Owner(InFlightGuard),
    /// Someone else is computing it; the receiver fires when they finish
    /// with `true` on success.
    Running(oneshot::Receiver<bool>),
}

type Waiters = Vec<oneshot::Sender<bool>>;

/// Keys whose derivative is currently being produced.
///
/// The lock is only taken for membership changes and is never held across an
/// await point.
#[derive(Clone, Default)]
pub struct InFlightRegistry {
    inner: Arc<Mutex<HashMap<DerivativeKey, Waiters>>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&self, key: &DerivativeKey) -> Registration {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(waiters) = map.get_mut(key) {
            let (tx, rx) = oneshot::channel();
            waiters.push(tx);
            return Registration::Running(rx);
        }
        map.insert(key.clone(), Vec::new());
        Registration::Owner(InFlightGuard {
            registry: self.clone(),
            key: key.clone(),
            succeeded: false,
        })
    }

    pub fn contains(&self, key: &DerivativeKey) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    fn complete(&self, key: &DerivativeKey, succeeded: bool) {
        let waiters = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        for tx in waiters.into_iter().flatten() {
            let _ = tx.send(succeeded);
        }
    }
}

/// Removes its key from the registry when dropped, whether the producer
/// finished, failed or panicked.
pub(crate) struct InFlightGuard {
    registry: InFlightRegistry,
    key: DerivativeKey,
    succeeded: bool,
}

impl InFlightGuard {
    pub(crate) fn succeed(mut self) {
        self.succeeded = true;
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.registry.complete(&self.key, self.succeeded);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> DerivativeKey {
        DerivativeKey {
            album: "test".to_string(),
            derivative: name.to_string(),
            kind: VariantKind::ThumbnailUseWidth,
        }
    }

    #[tokio::test]
    async fn test_second_registration_waits_for_owner() {
        let registry = InFlightRegistry::new();

        let Registration::Owner(guard) = registry.register(&key("tn__a.jpg")) else {
            panic!("first registration should own the key");
        };
        let Registration::Running(rx) = registry.register(&key("tn__a.jpg")) else {
            panic!("second registration should wait");
        };
        assert!(registry.contains(&key("tn__a.jpg")));

        guard.succeed();
        assert!(rx.await.unwrap());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_dropped_guard_reports_failure() {
        let registry = InFlightRegistry::new();

        let Registration::Owner(guard) = registry.register(&key("tn__b.jpg")) else {
            panic!("first registration should own the key");
        };
        let Registration::Running(rx) = registry.register(&key("tn__b.jpg")) else {
            panic!("second registration should wait");
        };

        drop(guard);
        assert!(!rx.await.unwrap());
        assert!(!registry.contains(&key("tn__b.jpg")));
    }

    #[test]
    fn test_distinct_keys_are_independent() {
        let registry = InFlightRegistry::new();
        let first = registry.register(&key("tn__a.jpg"));
        let second = registry.register(&key("tn__b.jpg"));
        assert!(matches!(first, Registration::Owner(_)));
        assert!(matches!(second, Registration::Owner(_)));
        assert_eq!(registry.len(), 2);
    }
}
