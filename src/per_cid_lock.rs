use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use tokio::sync::Mutex;
use tokio::sync::OwnedMutexGuard;

/// Registry of per-conversation locks used to serialize memory compression
/// per cid. Compression is not concurrency-safe across overlapping callers
/// on the same conversation id; callers acquire the lock for their cid
/// before calling into the [`crate::memory_compressor::MemoryCompressor`].
///
/// Locks for distinct cids are independent: acquiring one never blocks on
/// another. The registry itself is guarded by a short-held `std::sync::Mutex`
/// around `HashMap` lookup/insert only, mirroring the teacher's
/// `SessionManager` registry shape in `exec_command/session_manager.rs`.
#[derive(Default)]
pub struct PerCidLock {
    locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl PerCidLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the lock for `cid`, creating its entry on first use. Holds
    /// the returned guard for the duration of a compression call.
    pub async fn lock(&self, cid: &str) -> OwnedMutexGuard<()> {
        let entry = {
            let mut locks = self
                .locks
                .lock()
                .unwrap_or_else(|poison| poison.into_inner());
            locks.entry(cid.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
        };
        entry.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn distinct_cids_do_not_block_each_other() {
        let registry = PerCidLock::new();
        let guard_a = registry.lock("a").await;
        let lock_b = tokio::time::timeout(Duration::from_millis(50), registry.lock("b")).await;
        assert!(lock_b.is_ok(), "locking a different cid must not block");
        drop(guard_a);
    }

    #[tokio::test]
    async fn same_cid_is_serialized() {
        let registry = Arc::new(PerCidLock::new());
        let guard_a = registry.lock("a").await;

        let registry_clone = registry.clone();
        let waiter = tokio::spawn(async move {
            let _second = registry_clone.lock("a").await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished(), "second lock on same cid must wait");

        drop(guard_a);
        waiter.await.expect("waiter task completes once first guard drops");
    }
}
