//! In-process counter store

use super::{CounterBackend, CounterError, CounterStore, WindowSpan};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Sweep expired counters once every this many increments
const SWEEP_INTERVAL: u64 = 1024;

#[derive(Debug)]
struct LocalCounter {
    count: u64,
    expires_at_ms: u64,
}

/// Counters held in a concurrent map; per-key updates are atomic
#[derive(Debug)]
pub struct LocalCounterStore {
    counters: DashMap<String, LocalCounter>,
    increments: AtomicU64,
    sweep_interval: u64,
}

impl Default for LocalCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalCounterStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::with_sweep_interval(SWEEP_INTERVAL)
    }

    /// Create a store sweeping every `interval` increments
    pub fn with_sweep_interval(interval: u64) -> Self {
        Self {
            counters: DashMap::new(),
            increments: AtomicU64::new(0),
            sweep_interval: interval.max(1),
        }
    }

    /// Number of live counter entries
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    /// Check if no counters are held
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Drop every counter whose window ended at or before `now_ms`
    pub fn sweep(&self, now_ms: u64) {
        self.counters.retain(|_, counter| counter.expires_at_ms > now_ms);
    }
}

#[async_trait]
impl CounterStore for LocalCounterStore {
    async fn increment(&self, key: &str, window: &WindowSpan) -> Result<u64, CounterError> {
        let count = {
            let mut counter = self
                .counters
                .entry(key.to_string())
                .or_insert(LocalCounter {
                    count: 0,
                    expires_at_ms: window.end_ms,
                });
            counter.count += 1;
            counter.count
        };

        // The entry guard must be released before retain() locks the shards.
        if self.increments.fetch_add(1, Ordering::Relaxed) % self.sweep_interval == self.sweep_interval - 1 {
            self.sweep(window.now_ms);
        }

        Ok(count)
    }

    fn backend(&self) -> CounterBackend {
        CounterBackend::Local
    }
}
