//! The normalized event model: the single currency of the pipeline.
//!
//! A [`NormalizedEvent`] is built synchronously by the classifier from one raw
//! platform event, is immutable once built, and is consumed by exactly one
//! persistence write, at most one media capture, exactly one stats increment,
//! and a broadcast to all current subscribers.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Classification of the container an event occurred in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    Private,
    Group,
    Supergroup,
    Channel,
    Unknown,
}

impl ConversationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationKind::Private => "private",
            ConversationKind::Group => "group",
            ConversationKind::Supergroup => "supergroup",
            ConversationKind::Channel => "channel",
            ConversationKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ConversationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the six event families. Each has its own persistence partition and
/// its own stats counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    Messages,
    Reactions,
    Events,
    Media,
    Contacts,
    Groups,
}

impl EventCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventCategory::Messages => "messages",
            EventCategory::Reactions => "reactions",
            EventCategory::Events => "events",
            EventCategory::Media => "media",
            EventCategory::Contacts => "contacts",
            EventCategory::Groups => "groups",
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a message attachment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Video,
    Audio,
    Image,
    Document,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Image => "image",
            MediaKind::Document => "document",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observed message state. New, edited, and deleted messages each append a
/// distinct row; `message_id` + `chat_id` identify a message, not a row.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessageRecord {
    pub message_id: i64,
    pub chat_id: i64,
    pub chat_title: Option<String>,
    pub chat_type: ConversationKind,
    pub sender_id: Option<i64>,
    pub sender_username: Option<String>,
    pub sender_first_name: Option<String>,
    pub sender_last_name: Option<String>,
    pub text: String,
    pub is_outgoing: bool,
    pub is_edited: bool,
    pub is_deleted: bool,
    pub is_forwarded: bool,
    pub forward_from_id: Option<i64>,
    pub media_type: Option<MediaKind>,
    /// Set only when media capture reported success.
    pub media_path: Option<String>,
    pub date: DateTime<Utc>,
}

/// One (message, reacting user) pair observed at a snapshot in time.
///
/// The upstream data gives no reliable signal for reaction removal, so the
/// action is always `"added"`; this models reaction presence at observation
/// time, not add/remove deltas.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReactionRecord {
    pub message_id: i64,
    pub chat_id: i64,
    pub user_id: i64,
    pub user_username: Option<String>,
    pub reaction: String,
    pub action: String,
    pub date: DateTime<Utc>,
}

/// A per-user or per-conversation happening: joins, kicks, title changes,
/// pins, profile updates.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatEventRecord {
    pub event_type: String,
    pub chat_id: Option<i64>,
    pub chat_title: Option<String>,
    pub user_id: Option<i64>,
    pub user_username: Option<String>,
    pub user_first_name: Option<String>,
    pub details: serde_json::Value,
    pub date: DateTime<Utc>,
}

/// Metadata for a captured attachment, written alongside the owning message
/// when capture succeeds.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MediaAssetRecord {
    pub message_id: i64,
    pub chat_id: Option<i64>,
    pub media_type: MediaKind,
    pub file_name: String,
    pub file_path: String,
    pub file_size: i64,
    pub mime_type: Option<String>,
    pub date: DateTime<Utc>,
}

/// A snapshot of a contact's profile as currently known.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContactRecord {
    pub user_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub action: String,
    pub date: DateTime<Utc>,
}

/// A conversation-lifecycle action (created, migrated), as opposed to the
/// per-user actions recorded as [`ChatEventRecord`]s.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GroupEventRecord {
    pub chat_id: i64,
    pub chat_title: Option<String>,
    pub action: String,
    pub user_id: Option<i64>,
    pub user_username: Option<String>,
    pub details: serde_json::Value,
    pub date: DateTime<Utc>,
}

/// The canonical, category-tagged record produced by the classifier.
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum NormalizedEvent {
    Message(MessageRecord),
    Reaction(ReactionRecord),
    ChatEvent(ChatEventRecord),
    MediaAsset(MediaAssetRecord),
    Contact(ContactRecord),
    GroupEvent(GroupEventRecord),
}

impl NormalizedEvent {
    /// The persistence partition and stats counter this event belongs to.
    pub fn category(&self) -> EventCategory {
        match self {
            NormalizedEvent::Message(_) => EventCategory::Messages,
            NormalizedEvent::Reaction(_) => EventCategory::Reactions,
            NormalizedEvent::ChatEvent(_) => EventCategory::Events,
            NormalizedEvent::MediaAsset(_) => EventCategory::Media,
            NormalizedEvent::Contact(_) => EventCategory::Contacts,
            NormalizedEvent::GroupEvent(_) => EventCategory::Groups,
        }
    }

    /// Timestamp carried by the underlying record.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            NormalizedEvent::Message(r) => r.date,
            NormalizedEvent::Reaction(r) => r.date,
            NormalizedEvent::ChatEvent(r) => r.date,
            NormalizedEvent::MediaAsset(r) => r.date,
            NormalizedEvent::Contact(r) => r.date,
            NormalizedEvent::GroupEvent(r) => r.date,
        }
    }
}

/// Broadcast payload delivered to every registered subscriber.
#[derive(Clone, Debug, Serialize)]
pub struct MonitorUpdate {
    pub category: EventCategory,
    #[serde(rename = "data")]
    pub event: NormalizedEvent,
    /// Human-readable one-line rendering of the event.
    pub display: String,
    pub conversation_kind: Option<ConversationKind>,
}
