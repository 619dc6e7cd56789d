// libs/shared/database/src/locks.rs
//
// Application-level mutual exclusion for check-then-write sequences.
// A booking holds the doctor, patient and room keys for its date while it
// runs the conflict check and the insert, so two concurrent requests can
// never both pass the check and both write.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDate;
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_models::time::DayOfWeek;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SchedulingLockKey {
    Appointment(Uuid),
    Schedule(Uuid),
    Doctor(Uuid, NaiveDate),
    Patient(Uuid, NaiveDate),
    Room(Uuid, NaiveDate),
    RoomWeekday(Uuid, DayOfWeek),
}

#[derive(Debug, Clone, Error)]
#[error("Timed out after {waited:?} waiting for scheduling lock {key:?}")]
pub struct LockTimeout {
    pub key: SchedulingLockKey,
    pub waited: Duration,
}

type LockRegistry = Arc<Mutex<HashMap<SchedulingLockKey, Arc<AsyncMutex<()>>>>>;

pub struct SchedulingLockManager {
    locks: LockRegistry,
    acquire_timeout: Duration,
}

impl SchedulingLockManager {
    pub fn new(acquire_timeout: Duration) -> Self {
        Self {
            locks: Arc::new(Mutex::new(HashMap::new())),
            acquire_timeout,
        }
    }

    pub fn from_seconds(seconds: u64) -> Self {
        Self::new(Duration::from_secs(seconds))
    }

    /// Acquire every key in `keys` and hold them until the guard drops.
    /// Keys are taken in sorted order, so overlapping key sets never deadlock.
    pub async fn acquire<I>(&self, keys: I) -> Result<SchedulingGuard, LockTimeout>
    where
        I: IntoIterator<Item = SchedulingLockKey>,
    {
        let mut ordered: Vec<SchedulingLockKey> = keys.into_iter().collect();
        ordered.sort();
        ordered.dedup();

        let mut guard = SchedulingGuard {
            held: Vec::with_capacity(ordered.len()),
            keys: Vec::with_capacity(ordered.len()),
            registry: Arc::clone(&self.locks),
        };

        for key in ordered {
            let mutex = self.mutex_for(key);
            guard.keys.push(key);

            match tokio::time::timeout(self.acquire_timeout, mutex.lock_owned()).await {
                Ok(held) => guard.held.push(held),
                Err(_) => {
                    warn!("Scheduling lock contention: {:?} not acquired within {:?}",
                          key, self.acquire_timeout);
                    // `guard` drops here and releases what was already taken
                    return Err(LockTimeout { key, waited: self.acquire_timeout });
                }
            }
        }

        debug!("Acquired {} scheduling lock(s)", guard.held.len());
        Ok(guard)
    }

    fn mutex_for(&self, key: SchedulingLockKey) -> Arc<AsyncMutex<()>> {
        let mut registry = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(registry.entry(key).or_insert_with(|| Arc::new(AsyncMutex::new(()))))
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }
}

impl Default for SchedulingLockManager {
    fn default() -> Self {
        Self::from_seconds(30)
    }
}

pub struct SchedulingGuard {
    held: Vec<OwnedMutexGuard<()>>,
    keys: Vec<SchedulingLockKey>,
    registry: LockRegistry,
}

impl SchedulingGuard {
    pub fn keys(&self) -> &[SchedulingLockKey] {
        &self.keys
    }
}

impl Drop for SchedulingGuard {
    fn drop(&mut self) {
        self.held.clear();

        // Forget keys nobody else is waiting on
        let mut registry = self.registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        for key in &self.keys {
            let idle = registry
                .get(key)
                .map(|mutex| Arc::strong_count(mutex) == 1)
                .unwrap_or(false);
            if idle {
                registry.remove(key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 16).unwrap()
    }

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let manager = SchedulingLockManager::new(Duration::from_millis(50));
        let doctor = Uuid::new_v4();

        let first = manager.acquire([SchedulingLockKey::Doctor(doctor, date())]).await.unwrap();
        let second = manager.acquire([SchedulingLockKey::Doctor(doctor, date())]).await;
        assert!(second.is_err());

        drop(first);
        let third = manager.acquire([SchedulingLockKey::Doctor(doctor, date())]).await;
        assert!(third.is_ok());
    }

    #[tokio::test]
    async fn test_disjoint_keys_do_not_block() {
        let manager = SchedulingLockManager::new(Duration::from_millis(50));
        let _a = manager.acquire([SchedulingLockKey::Room(Uuid::new_v4(), date())]).await.unwrap();
        let b = manager.acquire([SchedulingLockKey::Room(Uuid::new_v4(), date())]).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_duplicate_keys_in_one_request() {
        let manager = SchedulingLockManager::new(Duration::from_millis(50));
        let key = SchedulingLockKey::Patient(Uuid::new_v4(), date());
        let guard = manager.acquire([key, key]).await.unwrap();
        assert_eq!(guard.keys(), &[key]);
    }

    #[tokio::test]
    async fn test_partial_acquisition_is_released_on_timeout() {
        let manager = SchedulingLockManager::new(Duration::from_millis(50));
        let doctor = SchedulingLockKey::Doctor(Uuid::new_v4(), date());
        let room = SchedulingLockKey::Room(Uuid::new_v4(), date());

        let _room_held = manager.acquire([room]).await.unwrap();
        // doctor sorts before room, so it is taken first and must be released
        assert!(manager.acquire([doctor, room]).await.is_err());
        assert!(manager.acquire([doctor]).await.is_ok());
    }

    #[tokio::test]
    async fn test_idle_keys_are_pruned() {
        let manager = SchedulingLockManager::default();
        {
            let _guard = manager
                .acquire([SchedulingLockKey::Appointment(Uuid::new_v4())])
                .await
                .unwrap();
            assert_eq!(manager.tracked_keys(), 1);
        }
        assert_eq!(manager.tracked_keys(), 0);
    }

    #[tokio::test]
    async fn test_waiter_proceeds_after_release() {
        let manager = Arc::new(SchedulingLockManager::new(Duration::from_secs(2)));
        let key = SchedulingLockKey::Schedule(Uuid::new_v4());
        let guard = manager.acquire([key]).await.unwrap();

        let waiter = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.acquire([key]).await.is_ok() })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(guard);
        assert!(waiter.await.unwrap());
    }
}
