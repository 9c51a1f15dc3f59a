use std::collections::HashMap;

use parking_lot::Mutex;

/// Concurrent accumulation of universe lines keyed by date. Many transform
/// workers append; buckets are append-only until drained for the merge
/// phase.
#[derive(Default)]
pub struct DateBuckets {
    inner: Mutex<HashMap<String, Vec<String>>>,
}

impl DateBuckets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get-or-create the bucket for `date_key` and append `line`. Atomic
    /// with respect to concurrent first inserts for the same date.
    pub fn insert(&self, date_key: &str, line: String) {
        let mut map = self.inner.lock();
        map.entry(date_key.to_string()).or_default().push(line);
    }

    pub fn date_count(&self) -> usize {
        self.inner.lock().len()
    }

    /// Takes every bucket, leaving the aggregator empty. Called exactly
    /// once, after all producers have stopped.
    pub fn drain(&self) -> HashMap<String, Vec<String>> {
        std::mem::take(&mut *self.inner.lock())
    }
}
