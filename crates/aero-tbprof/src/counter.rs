//! Shared `u64` counters with a selectable update policy.
//!
//! Execution callbacks fire from every vCPU thread. [`CounterMode::Atomic`] uses read-modify-write
//! instructions so no increment is ever lost. [`CounterMode::Unsynchronized`] uses a relaxed
//! load followed by a relaxed store: concurrent updates of the same counter from different vCPUs
//! may overwrite each other (small undercounts), but each access is still a well-defined atomic
//! access.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CounterMode {
    #[default]
    Atomic,
    Unsynchronized,
}

#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub const fn new(value: u64) -> Self {
        Self(AtomicU64::new(value))
    }

    #[inline]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set(&self, value: u64) {
        self.0.store(value, Ordering::Relaxed);
    }

    /// Add `n` and return the new value.
    #[inline]
    pub fn add(&self, n: u64, mode: CounterMode) -> u64 {
        match mode {
            CounterMode::Atomic => self.0.fetch_add(n, Ordering::Relaxed).wrapping_add(n),
            CounterMode::Unsynchronized => {
                let value = self.get().wrapping_add(n);
                self.set(value);
                value
            }
        }
    }

    /// Subtract up to `n` without going below zero and return the amount actually removed.
    #[inline]
    pub fn drain_up_to(&self, n: u64, mode: CounterMode) -> u64 {
        match mode {
            CounterMode::Atomic => {
                let prev = self
                    .0
                    .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                        Some(v.saturating_sub(n))
                    })
                    .unwrap_or_else(|v| v);
                prev.min(n)
            }
            CounterMode::Unsynchronized => {
                let prev = self.get();
                self.set(prev.saturating_sub(n));
                prev.min(n)
            }
        }
    }

    /// Reset to zero and return the previous value.
    #[inline]
    pub fn take(&self, mode: CounterMode) -> u64 {
        match mode {
            CounterMode::Atomic => self.0.swap(0, Ordering::Relaxed),
            CounterMode::Unsynchronized => {
                let value = self.get();
                self.set(0);
                value
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_modes_agree_single_threaded() {
        for mode in [CounterMode::Atomic, CounterMode::Unsynchronized] {
            let c = Counter::new(0);
            assert_eq!(c.add(60, mode), 60);
            assert_eq!(c.add(60, mode), 120);
            assert_eq!(c.drain_up_to(20, mode), 20);
            assert_eq!(c.get(), 100);
            assert_eq!(c.drain_up_to(1_000, mode), 100);
            assert_eq!(c.get(), 0);
            c.set(7);
            assert_eq!(c.take(mode), 7);
            assert_eq!(c.get(), 0);
        }
    }

    #[test]
    fn atomic_mode_loses_no_increments() {
        let c = Counter::new(0);
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..10_000 {
                        c.add(3, CounterMode::Atomic);
                    }
                });
            }
        });
        assert_eq!(c.get(), 4 * 10_000 * 3);
    }
}
