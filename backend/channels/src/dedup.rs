//! Processed-event registry: at-most-once handling per Slack `event_id`.
//!
//! Slack redelivers an event when it doesn't get a timely 200, reusing the
//! same `event_id`. The membership check and insert happen under one lock, so
//! two concurrent deliveries of the same id can never both pass.

use std::collections::{HashSet, VecDeque};

use tokio::sync::Mutex;
use tracing::debug;

#[derive(Default)]
struct RegistryState {
    seen: HashSet<String>,
    /// Insertion order; only maintained when bounded.
    order: VecDeque<String>,
}

/// In-memory set of already-processed event ids.
///
/// Unbounded by default: ids are never forgotten for the life of the process.
/// With a capacity, the oldest ids are evicted first.
pub struct EventRegistry {
    state: Mutex<RegistryState>,
    max_entries: Option<usize>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
            max_entries: None,
        }
    }

    /// A registry that remembers at most `max_entries` ids (minimum 1).
    pub fn bounded(max_entries: usize) -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
            max_entries: Some(max_entries.max(1)),
        }
    }

    pub fn with_capacity(max_entries: Option<usize>) -> Self {
        match max_entries {
            Some(n) => Self::bounded(n),
            None => Self::new(),
        }
    }

    /// Record `event_id`. Returns `true` the first time an id is seen and
    /// `false` for every later sighting.
    pub async fn check_and_record(&self, event_id: &str) -> bool {
        let mut state = self.state.lock().await;
        if state.seen.contains(event_id) {
            debug!(event_id, "Event already processed");
            return false;
        }
        state.seen.insert(event_id.to_string());

        if let Some(max) = self.max_entries {
            state.order.push_back(event_id.to_string());
            while state.order.len() > max {
                if let Some(oldest) = state.order.pop_front() {
                    state.seen.remove(&oldest);
                    debug!(event_id = %oldest, "Evicted oldest processed event id");
                }
            }
        }
        true
    }

    pub async fn contains(&self, event_id: &str) -> bool {
        self.state.lock().await.seen.contains(event_id)
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.seen.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub fn max_entries(&self) -> Option<usize> {
        self.max_entries
    }
}

impl Default for EventRegistry {
    fn default() -> Self {
        Self::new()
    }
}
