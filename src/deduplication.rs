// Anti-storm filter for scanner-originated events.

use crate::core::NotificationKind;
use moka::future::Cache;
use std::time::Duration;

/// Suppresses repeat notifications for the same subject within a rolling
/// window.
///
/// A scanner that observes the same failed equipment on every tick would
/// otherwise re-notify every recipient each time. The window is keyed on
/// `(kind, related_id)`: two different equipment ids never suppress each
/// other, and a different kind for the same id is still delivered.
pub struct Deduplicator {
    cache: Cache<String, ()>,
}

impl Deduplicator {
    /// Creates a new `Deduplicator`.
    ///
    /// # Arguments
    /// * `window` - How long a `(kind, related_id)` pair stays suppressed.
    /// * `max_capacity` - The maximum number of entries in the cache.
    pub fn new(window: Duration, max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .time_to_live(window)
            .max_capacity(max_capacity)
            .build();
        Self { cache }
    }

    /// Checks whether `(kind, related_id)` was already notified within the
    /// window, recording it if not.
    ///
    /// # Returns
    /// * `true` if the pair is a duplicate and the event should be dropped.
    /// * `false` if the pair is fresh.
    pub async fn is_duplicate(&self, kind: NotificationKind, related_id: i64) -> bool {
        let key = Self::generate_key(kind, related_id);
        let is_dupe = self.cache.contains_key(&key);

        if !is_dupe {
            self.cache.insert(key, ()).await;
        }

        metrics::gauge!("dedup_cache_entries").set(self.cache.entry_count() as f64);

        is_dupe
    }

    fn generate_key(kind: NotificationKind, related_id: i64) -> String {
        let data = format!("{}::{}", kind.as_str(), related_id);
        blake3::hash(data.as_bytes()).to_hex().to_string()
    }
}
