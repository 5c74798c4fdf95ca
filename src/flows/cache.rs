use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use crate::reminders::timezone::SharedClock;

struct CacheEntry {
    value: Value,
    inserted_at: DateTime<Utc>,
}

/// Bounded response cache with time-to-live, owned by the flow runner.
///
/// When full, expired entries go first, then the oldest insertion.
pub struct FlowCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    capacity: usize,
    ttl: Duration,
    clock: SharedClock,
}

impl FlowCache {
    pub fn new(capacity: usize, ttl: Duration, clock: SharedClock) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity,
            ttl,
            clock,
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        let now = self.clock.utc();
        let mut entries = self.entries.lock().ok()?;
        match entries.get(key) {
            Some(entry) if now - entry.inserted_at < self.ttl => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: String, value: Value) {
        if self.capacity == 0 {
            return;
        }
        let now = self.clock.utc();
        let Ok(mut entries) = self.entries.lock() else {
            tracing::warn!("Flow cache lock poisoned; skipping insert");
            return;
        };

        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            entries.retain(|_, entry| now - entry.inserted_at < self.ttl);
        }
        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.inserted_at)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
            }
        }

        entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: now,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
