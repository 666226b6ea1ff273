//! Deadline-based autolock policy.

use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::platform::AutolockPolicy;

/// [`AutolockPolicy`] backed by a wall-clock deadline.
///
/// The store may remain logically unlocked until the recorded deadline
/// passes; after that, `lock_currently_required` reports `true` until a new
/// deadline is recorded. A freshly constructed policy has no deadline and
/// never requires a lock.
#[derive(Debug)]
pub struct TimedAutolockPolicy {
    timeout: Duration,
    next_lock_at: Mutex<Option<SystemTime>>,
}

impl TimedAutolockPolicy {
    /// Creates a policy that allows `timeout` of background time before the
    /// store must be treated as lock-required.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            next_lock_at: Mutex::new(None),
        }
    }

    fn set_deadline(&self, deadline: Option<SystemTime>) {
        *self.next_lock_at.lock().unwrap() = deadline;
    }
}

impl AutolockPolicy for TimedAutolockPolicy {
    fn lock_currently_required(&self) -> bool {
        self.next_lock_at
            .lock()
            .unwrap()
            .is_some_and(|deadline| SystemTime::now() >= deadline)
    }

    fn store_next_autolock_time(&self) {
        self.set_deadline(Some(SystemTime::now() + self.timeout));
    }

    fn forward_date_next_lock_time(&self) {
        self.set_deadline(Some(SystemTime::now() + self.timeout));
    }

    fn back_date_next_lock_time(&self) {
        // Any past instant forces the next check to require a lock.
        self.set_deadline(Some(UNIX_EPOCH));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn test_fresh_policy_does_not_require_lock() {
        let policy = TimedAutolockPolicy::new(HOUR);
        assert!(!policy.lock_currently_required());
    }

    #[test]
    fn test_store_next_with_headroom_does_not_require_lock() {
        let policy = TimedAutolockPolicy::new(HOUR);
        policy.store_next_autolock_time();
        assert!(!policy.lock_currently_required());
    }

    #[test]
    fn test_zero_timeout_requires_lock_immediately() {
        let policy = TimedAutolockPolicy::new(Duration::ZERO);
        policy.store_next_autolock_time();
        assert!(policy.lock_currently_required());
    }

    #[test]
    fn test_back_date_forces_lock() {
        let policy = TimedAutolockPolicy::new(HOUR);
        policy.store_next_autolock_time();
        policy.back_date_next_lock_time();
        assert!(policy.lock_currently_required());
    }

    #[test]
    fn test_forward_date_clears_forced_lock() {
        let policy = TimedAutolockPolicy::new(HOUR);
        policy.back_date_next_lock_time();
        assert!(policy.lock_currently_required());

        policy.forward_date_next_lock_time();
        assert!(!policy.lock_currently_required());
    }
}
