//! Running per-category counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::events::EventCategory;

/// Six monotonic counters, one per category, incremented exactly once per
/// classified event immediately after that category's persistence write was
/// attempted. A failed write still counts, so a counter can exceed the durable
/// row count; [`crate::database::Database::statistics`] is the durable view.
#[derive(Debug, Default)]
pub struct Stats {
    messages: AtomicU64,
    reactions: AtomicU64,
    events: AtomicU64,
    media: AtomicU64,
    contacts: AtomicU64,
    groups: AtomicU64,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self, category: EventCategory) {
        let counter = match category {
            EventCategory::Messages => &self.messages,
            EventCategory::Reactions => &self.reactions,
            EventCategory::Events => &self.events,
            EventCategory::Media => &self.media,
            EventCategory::Contacts => &self.contacts,
            EventCategory::Groups => &self.groups,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// An instantaneous owned copy of the counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            messages: self.messages.load(Ordering::Relaxed),
            reactions: self.reactions.load(Ordering::Relaxed),
            events: self.events.load(Ordering::Relaxed),
            media: self.media.load(Ordering::Relaxed),
            contacts: self.contacts.load(Ordering::Relaxed),
            groups: self.groups.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of the running counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub messages: u64,
    pub reactions: u64,
    pub events: u64,
    pub media: u64,
    pub contacts: u64,
    pub groups: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_is_per_category() {
        let stats = Stats::new();
        stats.increment(EventCategory::Messages);
        stats.increment(EventCategory::Messages);
        stats.increment(EventCategory::Reactions);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.messages, 2);
        assert_eq!(snapshot.reactions, 1);
        assert_eq!(snapshot.events, 0);
        assert_eq!(snapshot.media, 0);
        assert_eq!(snapshot.contacts, 0);
        assert_eq!(snapshot.groups, 0);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let stats = Stats::new();
        let before = stats.snapshot();
        stats.increment(EventCategory::Groups);
        let after = stats.snapshot();

        assert_eq!(before.groups, 0);
        assert_eq!(after.groups, 1);
    }
}
