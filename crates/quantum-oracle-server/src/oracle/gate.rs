//! Admission control for user actions: one in flight, none while cooling down.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use quantum_oracle::MAX_RETRY_AFTER_SECS;

/// Set while an action is running.
#[derive(Debug, Default)]
pub struct BusyFlag {
    busy: AtomicBool,
}

impl BusyFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the flag, or `None` if another action holds it.
    pub fn try_acquire(&self) -> Option<BusyGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard { flag: &self.busy })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Releases the [`BusyFlag`] on drop.
#[derive(Debug)]
pub struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Deadline before which actions are refused after a rate limit.
#[derive(Debug, Default)]
pub struct Cooldown {
    until: Mutex<Option<Instant>>,
}

impl Cooldown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self, secs: u64) {
        self.start_at(Instant::now(), secs);
    }

    /// Refuse actions for `secs` from `now`, capped at [`MAX_RETRY_AFTER_SECS`].
    pub fn start_at(&self, now: Instant, secs: u64) {
        let wait = Duration::from_secs(secs.min(MAX_RETRY_AFTER_SECS));
        let mut until = self.until.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(deadline) = now.checked_add(wait) {
            *until = Some(deadline);
        }
    }

    pub fn clear(&self) {
        *self.until.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.remaining_at(Instant::now())
    }

    /// Time left at `now`; expired deadlines are cleared.
    pub fn remaining_at(&self, now: Instant) -> Option<Duration> {
        let mut until = self.until.lock().unwrap_or_else(|e| e.into_inner());
        match *until {
            Some(deadline) if deadline > now => Some(deadline - now),
            Some(_) => {
                *until = None;
                None
            }
            None => None,
        }
    }

    /// Whole seconds left, rounded up.
    pub fn remaining_secs(&self) -> Option<u64> {
        self.remaining().map(ceil_secs)
    }
}

pub(crate) fn ceil_secs(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_flag_is_exclusive() {
        let flag = BusyFlag::new();
        let guard = flag.try_acquire().expect("first claim");
        assert!(flag.is_busy());
        assert!(flag.try_acquire().is_none());

        drop(guard);
        assert!(!flag.is_busy());
        assert!(flag.try_acquire().is_some());
    }

    #[test]
    fn test_cooldown_counts_down_and_expires() {
        let cooldown = Cooldown::new();
        let start = Instant::now();
        cooldown.start_at(start, 60);

        assert_eq!(
            cooldown.remaining_at(start + Duration::from_secs(15)),
            Some(Duration::from_secs(45))
        );
        assert_eq!(cooldown.remaining_at(start + Duration::from_secs(60)), None);
        // Expired deadline was cleared.
        assert_eq!(cooldown.remaining_at(start), None);
    }

    #[test]
    fn test_cooldown_caps_huge_hint() {
        let cooldown = Cooldown::new();
        let start = Instant::now();
        cooldown.start_at(start, u64::MAX);

        assert_eq!(
            cooldown.remaining_at(start),
            Some(Duration::from_secs(MAX_RETRY_AFTER_SECS))
        );
    }

    #[test]
    fn test_cooldown_clear() {
        let cooldown = Cooldown::new();
        cooldown.start(60);
        assert!(cooldown.remaining_secs().is_some());
        cooldown.clear();
        assert!(cooldown.remaining_secs().is_none());
    }

    #[test]
    fn test_ceil_secs() {
        assert_eq!(ceil_secs(Duration::from_millis(59_001)), 60);
        assert_eq!(ceil_secs(Duration::from_secs(5)), 5);
    }
}
