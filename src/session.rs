//! The account-session collaborator interface and the raw platform event
//! shapes it delivers.
//!
//! Authentication and connection management live outside this crate; the
//! pipeline only requires an implementation of [`AccountSession`] for entity
//! resolution and attachment downloads, plus a feed of [`RawEvent`]s queued
//! into the sender returned by [`crate::Vigil::event_sender`].

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Entity lookup failed: {0}")]
    Lookup(String),

    #[error("Attachment download failed: {0}")]
    Download(String),

    #[error("Session not connected")]
    NotConnected,
}

/// Addressing metadata for the container an event belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PeerRef {
    User(i64),
    Chat(i64),
    Channel(i64),
}

impl PeerRef {
    /// The owning conversation identifier, whichever container holds it.
    pub fn id(&self) -> i64 {
        match self {
            PeerRef::User(id) | PeerRef::Chat(id) | PeerRef::Channel(id) => *id,
        }
    }
}

/// Capability flags of a resolved conversation container, used to derive the
/// conversation kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatFlavor {
    /// An individual-account peer.
    User,
    /// A basic group.
    Group,
    /// A channel-style container; `broadcast` distinguishes broadcast channels
    /// from large discussion groups.
    Channel { broadcast: bool },
    Unknown,
}

/// A resolved conversation container.
#[derive(Clone, Debug)]
pub struct ChatInfo {
    pub id: i64,
    pub title: Option<String>,
    pub first_name: Option<String>,
    pub flavor: ChatFlavor,
}

/// A resolved user entity.
#[derive(Clone, Debug, Default)]
pub struct UserInfo {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
}

/// The authenticated account itself.
#[derive(Clone, Debug)]
pub struct SelfInfo {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
}

/// An attachment carried by a raw message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RawMedia {
    Photo,
    Document { mime_type: Option<String> },
}

/// Forward-origin marker on a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ForwardInfo {
    pub from_user_id: Option<i64>,
}

/// A platform-native message, new or edited.
#[derive(Clone, Debug)]
pub struct RawMessage {
    pub id: i64,
    pub peer: PeerRef,
    pub sender_id: Option<i64>,
    pub text: Option<String>,
    pub outgoing: bool,
    pub forward: Option<ForwardInfo>,
    pub media: Option<RawMedia>,
    pub date: DateTime<Utc>,
}

/// One reaction symbol with the users currently listed as recent reactors.
#[derive(Clone, Debug)]
pub struct RawReaction {
    pub symbol: String,
    pub recent_reactor_ids: Vec<i64>,
}

/// The current reaction state attached to a message.
#[derive(Clone, Debug)]
pub struct RawReactions {
    pub message_id: i64,
    pub peer: PeerRef,
    pub reactions: Vec<RawReaction>,
}

/// Sub-cases of a chat-action event. `Unknown` shapes are silently dropped by
/// the classifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatActionKind {
    UserJoined,
    UserLeft,
    UserAdded,
    UserKicked,
    UserBanned,
    TitleChanged { new_title: String },
    PhotoChanged,
    MessagePinned { message_id: i64 },
    /// Conversation-lifecycle action: the container was created.
    Created { title: String },
    /// Conversation-lifecycle action: the container was migrated from a basic
    /// group to a large container.
    Migrated { from_chat_id: i64 },
    Unknown,
}

/// A membership or conversation change.
#[derive(Clone, Debug)]
pub struct RawChatAction {
    pub peer: PeerRef,
    pub actor_user_id: Option<i64>,
    pub kind: ChatActionKind,
}

/// A profile update for a user the account can see.
#[derive(Clone, Debug)]
pub struct RawUserUpdate {
    pub user_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
}

/// An unprocessed notification as delivered by the account session, in
/// platform-native shape. One enumerated kind per registered handler.
#[derive(Clone, Debug)]
pub enum RawEvent {
    NewMessage(RawMessage),
    MessageEdited(RawMessage),
    /// A deletion batch: the upstream supplies only the ids, with no other
    /// metadata about the deleted messages.
    MessagesDeleted {
        peer: PeerRef,
        message_ids: Vec<i64>,
    },
    ReactionsChanged(RawReactions),
    ChatAction(RawChatAction),
    UserUpdate(RawUserUpdate),
}

impl RawEvent {
    /// The raw-event kind as a string, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            RawEvent::NewMessage(_) => "new_message",
            RawEvent::MessageEdited(_) => "message_edited",
            RawEvent::MessagesDeleted { .. } => "messages_deleted",
            RawEvent::ReactionsChanged(_) => "reactions_changed",
            RawEvent::ChatAction(_) => "chat_action",
            RawEvent::UserUpdate(_) => "user_update",
        }
    }
}

/// A live, authenticated connection to the messaging platform.
///
/// The session resolves entities on demand and downloads attachment payloads;
/// event delivery happens over the pipeline's raw-event channel rather than
/// through this trait, mirroring how the processing loop is wired.
#[async_trait]
pub trait AccountSession: Send + Sync {
    /// Self-identity lookup for the authenticated account.
    async fn me(&self) -> Result<SelfInfo, SessionError>;

    /// Resolves the conversation container a peer reference points at.
    async fn resolve_chat(&self, peer: &PeerRef) -> Result<ChatInfo, SessionError>;

    /// Resolves a user entity by id.
    async fn resolve_user(&self, user_id: i64) -> Result<UserInfo, SessionError>;

    /// Downloads the attachment carried by `message` to `destination`.
    async fn download_attachment(
        &self,
        message: &RawMessage,
        destination: &Path,
    ) -> Result<(), SessionError>;
}
