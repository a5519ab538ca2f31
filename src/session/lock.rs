//! Per-user turn serialisation
//!
//! Messages from the same user are processed one at a time so the
//! read-modify-write of the session context cannot interleave. Different
//! users never wait on each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Default)]
pub struct UserLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `user`'s turn.
    pub async fn acquire(&self, user: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

            // Drop entries nobody is holding or waiting on.
            if locks.len() > 1024 {
                locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            }

            locks
                .entry(user.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    pub fn tracked_users(&self) -> usize {
        self.locks
            .lock()
            .map(|locks| locks.len())
            .unwrap_or_default()
    }
}
