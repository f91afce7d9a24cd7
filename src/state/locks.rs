//! Per-user serialization
//!
//! Each user id maps to its own async mutex, so at most one dialogue
//! operation runs for a user at a time while different users proceed
//! independently. Entries are dropped once nobody holds or waits on them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub struct UserLocks {
    locks: Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `user_id`
    pub async fn lock(&self, user_id: i64) -> UserGuard<'_> {
        let entry = LockEntry {
            owner: self,
            user_id,
            lock: {
                let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                locks.entry(user_id).or_default().clone()
            },
        };

        // A cancelled wait drops `entry`, which cleans up like a released guard.
        let guard = entry.lock.clone().lock_owned().await;
        UserGuard { _guard: guard, _entry: entry }
    }

    /// Number of users with a held or awaited lock
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive access to one user's dialogue state
#[derive(Debug)]
pub struct UserGuard<'a> {
    // Fields drop in order: release the mutex, then the table entry.
    _guard: OwnedMutexGuard<()>,
    _entry: LockEntry<'a>,
}

/// One holder or waiter of a user's mutex
#[derive(Debug)]
struct LockEntry<'a> {
    owner: &'a UserLocks,
    user_id: i64,
    lock: Arc<AsyncMutex<()>>,
}

impl Drop for LockEntry<'_> {
    fn drop(&mut self) {
        let mut locks = self.owner.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(current) = locks.get(&self.user_id) else {
            return;
        };
        // Only the table and this entry still reference the mutex.
        if Arc::ptr_eq(current, &self.lock) && Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.user_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_entries_removed_after_release() {
        let locks = UserLocks::new();
        {
            let _guard = locks.lock(1).await;
            assert_eq!(locks.len(), 1);
        }
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_different_users_do_not_block() {
        let locks = UserLocks::new();
        let _a = locks.lock(1).await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.lock(2)).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_same_user_is_serialized() {
        let locks = Arc::new(UserLocks::new());
        let first = locks.lock(7).await;

        let waiter = tokio::time::timeout(Duration::from_millis(50), locks.lock(7)).await;
        assert!(waiter.is_err(), "second lock must wait while the first is held");

        drop(first);
        let second = tokio::time::timeout(Duration::from_millis(100), locks.lock(7)).await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn test_cancelled_waiter_removes_entry() {
        let locks = UserLocks::new();
        let held = locks.lock(7).await;

        let mut waiter = Box::pin(locks.lock(7));
        assert!(futures::poll!(&mut waiter).is_pending());
        assert_eq!(locks.len(), 1);

        drop(held);
        drop(waiter);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_timed_out_waiter_removes_entry() {
        let locks = UserLocks::new();
        {
            let _held = locks.lock(8).await;
            let waited = tokio::time::timeout(Duration::from_millis(20), locks.lock(8)).await;
            assert!(waited.is_err());
        }
        assert!(locks.is_empty());
    }
}
