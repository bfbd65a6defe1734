//! Short-lived "recently updated" set used for row highlighting.
//!
//! Each mark carries a sequence number. Expiring a [`RecentToken`] only
//! removes the entry if it still carries that token's sequence, so a timer
//! started for an older update cannot clear the highlight of a newer one.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

/// Default highlight window.
pub const DEFAULT_HIGHLIGHT_WINDOW: Duration = Duration::from_secs(3);

/// Handle for expiring one specific mark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentToken {
    pub id: String,
    pub seq: u64,
    pub marked_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RecentEntry {
    seq: u64,
    marked_at: Instant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentUpdates {
    entries: HashMap<String, RecentEntry>,
    window: Duration,
    next_seq: u64,
}

impl Default for RecentUpdates {
    fn default() -> Self {
        Self::new(DEFAULT_HIGHLIGHT_WINDOW)
    }
}

impl RecentUpdates {
    pub fn new(window: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            window,
            next_seq: 0,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Mark `id` as updated at `now`, replacing any earlier mark.
    pub fn mark(&mut self, id: &str, now: Instant) -> RecentToken {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(
            id.to_string(),
            RecentEntry {
                seq,
                marked_at: now,
            },
        );
        RecentToken {
            id: id.to_string(),
            seq,
            marked_at: now,
        }
    }

    /// Remove the mark made for `token`, if it is still the current one.
    pub fn expire(&mut self, token: &RecentToken) -> bool {
        match self.entries.get(&token.id) {
            Some(entry) if entry.seq == token.seq => {
                self.entries.remove(&token.id);
                true
            }
            _ => false,
        }
    }

    /// Remove every mark older than the window. Returns how many were dropped.
    pub fn prune(&mut self, now: Instant) -> usize {
        let window = self.window;
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.marked_at) < window);
        before - self.entries.len()
    }

    /// Whether `id` is highlighted at `now`.
    pub fn contains(&self, id: &str, now: Instant) -> bool {
        self.entries
            .get(id)
            .is_some_and(|entry| now.saturating_duration_since(entry.marked_at) < self.window)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
