use serde::{Deserialize, Serialize};

/// Per-category switches controlling what the monitor records.
///
/// A disabled category means raw events of that family are discarded before
/// classification; nothing is persisted, counted, or broadcast for them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MonitorOptions {
    pub monitor_messages: bool,
    pub monitor_reactions: bool,
    pub monitor_events: bool,
    pub monitor_media: bool,
    pub monitor_contacts: bool,
    pub monitor_groups: bool,
    /// Whether attachments are downloaded to disk. Media capture requires both
    /// this flag and `monitor_media`.
    pub save_media: bool,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            monitor_messages: true,
            monitor_reactions: true,
            monitor_events: true,
            monitor_media: true,
            monitor_contacts: true,
            monitor_groups: true,
            save_media: true,
        }
    }
}
