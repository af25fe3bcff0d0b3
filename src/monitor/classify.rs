//! Pure classification helpers: conversation kinds, media kinds, and the
//! building blocks of display lines.

use crate::events::{ConversationKind, MediaKind};
use crate::session::{ChatFlavor, ChatInfo, RawMedia};

pub(crate) const TEXT_PREVIEW_CHARS: usize = 50;

/// Derives the conversation kind from the container's capabilities.
pub(crate) fn conversation_kind(flavor: &ChatFlavor) -> ConversationKind {
    match flavor {
        ChatFlavor::User => ConversationKind::Private,
        ChatFlavor::Group => ConversationKind::Group,
        ChatFlavor::Channel { broadcast: true } => ConversationKind::Channel,
        ChatFlavor::Channel { broadcast: false } => ConversationKind::Supergroup,
        ChatFlavor::Unknown => ConversationKind::Unknown,
    }
}

/// Display title for a conversation: explicit title, else the peer's first
/// name, else a placeholder.
pub(crate) fn chat_display_title(chat: &ChatInfo) -> String {
    chat.title
        .clone()
        .or_else(|| chat.first_name.clone())
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Classifies an attachment by its underlying kind: photos directly, documents
/// by MIME-type prefix.
pub(crate) fn media_kind(media: &RawMedia) -> MediaKind {
    match media {
        RawMedia::Photo => MediaKind::Photo,
        RawMedia::Document { mime_type } => {
            let mime = mime_type.as_deref().unwrap_or("");
            if mime.starts_with("video/") {
                MediaKind::Video
            } else if mime.starts_with("audio/") {
                MediaKind::Audio
            } else if mime.starts_with("image/") {
                MediaKind::Image
            } else {
                MediaKind::Document
            }
        }
    }
}

/// First [`TEXT_PREVIEW_CHARS`] characters of a message text, or a placeholder
/// when the text is empty.
pub(crate) fn text_preview(text: &str) -> String {
    if text.is_empty() {
        "[no text]".to_string()
    } else {
        text.chars().take(TEXT_PREVIEW_CHARS).collect()
    }
}

/// Display name for a sender or actor: first name, else username, else a
/// placeholder.
pub(crate) fn display_name(first_name: Option<&str>, username: Option<&str>) -> String {
    first_name
        .or(username)
        .unwrap_or("Unknown")
        .to_string()
}

pub(crate) fn direction_tag(outgoing: bool) -> &'static str {
    if outgoing { "OUTGOING" } else { "INCOMING" }
}

/// Best-effort placeholder text for a deleted message. Only the deletion and
/// the id are recoverable from the upstream data.
pub(crate) fn tombstone_text(message_id: i64) -> String {
    format!("[DELETED - ID: {}]", message_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_kind_derivation() {
        assert_eq!(
            conversation_kind(&ChatFlavor::User),
            ConversationKind::Private
        );
        assert_eq!(
            conversation_kind(&ChatFlavor::Group),
            ConversationKind::Group
        );
        assert_eq!(
            conversation_kind(&ChatFlavor::Channel { broadcast: true }),
            ConversationKind::Channel
        );
        assert_eq!(
            conversation_kind(&ChatFlavor::Channel { broadcast: false }),
            ConversationKind::Supergroup
        );
        assert_eq!(
            conversation_kind(&ChatFlavor::Unknown),
            ConversationKind::Unknown
        );
    }

    #[test]
    fn test_media_kind_by_mime_prefix() {
        assert_eq!(media_kind(&RawMedia::Photo), MediaKind::Photo);
        let doc = |mime: Option<&str>| RawMedia::Document {
            mime_type: mime.map(str::to_string),
        };
        assert_eq!(media_kind(&doc(Some("video/mp4"))), MediaKind::Video);
        assert_eq!(media_kind(&doc(Some("audio/ogg"))), MediaKind::Audio);
        assert_eq!(media_kind(&doc(Some("image/png"))), MediaKind::Image);
        assert_eq!(
            media_kind(&doc(Some("application/pdf"))),
            MediaKind::Document
        );
        assert_eq!(media_kind(&doc(None)), MediaKind::Document);
    }

    #[test]
    fn test_text_preview_truncates_on_char_boundaries() {
        assert_eq!(text_preview(""), "[no text]");
        assert_eq!(text_preview("hello"), "hello");

        let long = "й".repeat(80);
        let preview = text_preview(&long);
        assert_eq!(preview.chars().count(), TEXT_PREVIEW_CHARS);
    }

    #[test]
    fn test_chat_display_title_fallbacks() {
        let chat = |title: Option<&str>, first: Option<&str>| ChatInfo {
            id: 1,
            title: title.map(str::to_string),
            first_name: first.map(str::to_string),
            flavor: ChatFlavor::User,
        };
        assert_eq!(chat_display_title(&chat(Some("Team"), None)), "Team");
        assert_eq!(chat_display_title(&chat(None, Some("Alice"))), "Alice");
        assert_eq!(chat_display_title(&chat(None, None)), "Unknown");
    }

    #[test]
    fn test_tombstone_text_contains_id() {
        assert_eq!(tombstone_text(42), "[DELETED - ID: 42]");
    }
}
