use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Process-wide "one pipeline at a time" lock.
///
/// Acquisition never waits: a caller that finds the gate held gets `None`
/// back and is expected to report a conflict. The returned [`GateGuard`] is
/// moved into the pipeline task and releases the gate when dropped, on any
/// exit path including unwinding.
#[derive(Debug, Clone, Default)]
pub struct SingleFlightGate {
    inner: Arc<Mutex<()>>,
}

/// Proof of holding the gate.
#[derive(Debug)]
pub struct GateGuard {
    _guard: OwnedMutexGuard<()>,
}

impl SingleFlightGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self) -> Option<GateGuard> {
        Arc::clone(&self.inner)
            .try_lock_owned()
            .ok()
            .map(|guard| GateGuard { _guard: guard })
    }

    pub fn is_held(&self) -> bool {
        self.inner.try_lock().is_err()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails_while_held() {
        let gate = SingleFlightGate::new();
        let guard = gate.try_acquire().expect("first acquire");
        assert!(gate.is_held());
        assert!(gate.try_acquire().is_none());
        drop(guard);
        assert!(!gate.is_held());
        assert!(gate.try_acquire().is_some());
    }

    #[test]
    fn test_clones_share_one_gate() {
        let gate = SingleFlightGate::new();
        let other = gate.clone();
        let _guard = gate.try_acquire().unwrap();
        assert!(other.try_acquire().is_none());
    }

    #[tokio::test]
    async fn test_released_when_task_panics() {
        let gate = SingleFlightGate::new();
        let guard = gate.try_acquire().unwrap();
        let handle = tokio::spawn(async move {
            let _guard = guard;
            panic!("stage blew up");
        });
        assert!(handle.await.is_err());
        assert!(gate.try_acquire().is_some());
    }
}
