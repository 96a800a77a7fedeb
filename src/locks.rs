//! Keyed async mutexes.
//!
//! The archive and the directory index are read-modify-write over shared
//! store state. The store's unique indexes reject duplicate inserts, but two
//! concurrent writers on the same fingerprint key or the same normalized path
//! could still interleave their read and write halves. A [`KeyedLocks`]
//! registry serializes writers per key, leaving unrelated keys fully
//! concurrent.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;

#[derive(Clone, Default)]
pub struct KeyedLocks {
    inner: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the mutex for `key`, creating it on first use. The guard
    /// releases on drop.
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap();
            map.entry(key.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_same_key_serializes() {
        let locks = KeyedLocks::new();
        let guard = locks.acquire("k").await;
        let second = locks.acquire("k");
        tokio::pin!(second);
        // Not acquirable while the first guard lives
        assert!(futures_pending(&mut second).await);
        drop(guard);
        second.await;
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let locks = KeyedLocks::new();
        let _a = locks.acquire("a").await;
        let _b = locks.acquire("b").await;
    }

    async fn futures_pending<F: std::future::Future + Unpin>(fut: &mut F) -> bool {
        tokio::select! {
            _ = fut => false,
            _ = tokio::time::sleep(std::time::Duration::from_millis(10)) => true,
        }
    }
}
