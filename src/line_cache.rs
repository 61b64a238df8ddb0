//! Single-slot cache of the freshest monitor output line.
//!
//! One background reader publishes, any number of callers read. Readers see
//! the latest line at the time of the read, never a queue: lines published
//! between two reads are skipped. Once a line has been published the slot
//! is never empty again.

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Slot {
    line: Option<String>,
    published: u64,
}

/// Latest-value slot guarded by a mutex, with a condvar for first-line waits.
#[derive(Debug, Default)]
pub struct LineCache {
    slot: Mutex<Slot>,
    first_line: Condvar,
}

impl LineCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `line` if it is non-empty after trimming.
    ///
    /// Returns whether the line was stored.
    pub fn publish(&self, line: &str) -> bool {
        let line = line.trim();
        if line.is_empty() {
            return false;
        }

        let mut slot = self.slot.lock();
        let was_empty = slot.line.is_none();
        slot.line = Some(line.to_owned());
        slot.published += 1;
        drop(slot);

        if was_empty {
            self.first_line.notify_all();
        }
        true
    }

    /// Blocks until a line has been published, then returns the latest one.
    ///
    /// Never blocks once any line exists.
    pub fn read_latest(&self) -> String {
        let mut slot = self.slot.lock();
        loop {
            if let Some(line) = &slot.line {
                return line.clone();
            }
            self.first_line.wait(&mut slot);
        }
    }

    /// Like [`read_latest`](Self::read_latest) but gives up after `timeout`.
    ///
    /// A timeout too large to represent as a deadline waits without limit.
    pub fn read_latest_timeout(&self, timeout: Duration) -> Option<String> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return Some(self.read_latest());
        };
        let mut slot = self.slot.lock();
        loop {
            if let Some(line) = &slot.line {
                return Some(line.clone());
            }
            if self.first_line.wait_until(&mut slot, deadline).timed_out() {
                return slot.line.clone();
            }
        }
    }

    /// Returns the latest line without waiting.
    #[must_use]
    pub fn try_latest(&self) -> Option<String> {
        self.slot.lock().line.clone()
    }

    /// Number of lines stored so far.
    #[must_use]
    pub fn published(&self) -> u64 {
        self.slot.lock().published
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_new_cache_is_empty() {
        let cache = LineCache::new();

        assert_eq!(cache.try_latest(), None);
        assert_eq!(cache.published(), 0);
        assert_eq!(cache.read_latest_timeout(Duration::from_millis(10)), None);
    }

    #[test]
    fn test_publish_trims_and_overwrites() {
        let cache = LineCache::new();

        assert!(cache.publish("  {\"a\":1}\n"));
        assert_eq!(cache.try_latest().as_deref(), Some("{\"a\":1}"));

        assert!(cache.publish("{\"a\":2}"));
        assert_eq!(cache.read_latest(), "{\"a\":2}");
        assert_eq!(cache.published(), 2);
    }

    #[test]
    fn test_blank_lines_never_clear_the_slot() {
        let cache = LineCache::new();
        cache.publish("first");

        assert!(!cache.publish(""));
        assert!(!cache.publish("   \r\n"));

        assert_eq!(cache.read_latest(), "first");
        assert_eq!(cache.published(), 1);
    }

    #[test]
    fn test_read_latest_blocks_until_first_publish() {
        let cache = Arc::new(LineCache::new());
        let reader = {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                let start = Instant::now();
                let line = cache.read_latest();
                (line, start.elapsed())
            })
        };

        thread::sleep(Duration::from_millis(100));
        cache.publish("hello");

        let (line, waited) = reader.join().unwrap();
        assert_eq!(line, "hello");
        assert!(waited >= Duration::from_millis(50), "reader returned early after {waited:?}");
    }

    #[test]
    fn test_read_latest_never_blocks_after_first_line() {
        let cache = LineCache::new();
        cache.publish("steady");

        let start = Instant::now();
        for _ in 0..10_000 {
            assert_eq!(cache.read_latest(), "steady");
        }
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_read_latest_timeout_wakes_on_publish() {
        let cache = Arc::new(LineCache::new());
        let writer = {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                cache.publish("late");
            })
        };

        let line = cache.read_latest_timeout(Duration::from_secs(5));
        writer.join().unwrap();

        assert_eq!(line.as_deref(), Some("late"));
    }

    #[test]
    fn test_read_latest_timeout_accepts_unbounded_timeout() {
        let cache = Arc::new(LineCache::new());
        let reader = {
            let cache = Arc::clone(&cache);
            thread::spawn(move || cache.read_latest_timeout(Duration::MAX))
        };

        thread::sleep(Duration::from_millis(50));
        cache.publish("eventually");

        assert_eq!(reader.join().unwrap().as_deref(), Some("eventually"));
        assert_eq!(cache.read_latest_timeout(Duration::MAX).as_deref(), Some("eventually"));
    }

    #[test]
    fn test_many_readers_one_writer() {
        let cache = Arc::new(LineCache::new());
        let readers: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    let mut last = 0u64;
                    for _ in 0..200 {
                        let value: u64 = cache.read_latest().parse().unwrap();
                        assert!(value >= last, "reads went backwards: {value} < {last}");
                        last = value;
                    }
                })
            })
            .collect();

        for i in 1..=500u64 {
            cache.publish(&i.to_string());
        }

        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(cache.try_latest().as_deref(), Some("500"));
    }

    #[test]
    fn test_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LineCache>();
    }
}
