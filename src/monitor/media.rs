//! Attachment capture to durable blob storage.

use std::path::PathBuf;

use chrono::Utc;
use thiserror::Error;

use crate::events::{ConversationKind, MediaAssetRecord, MediaKind, NormalizedEvent};
use crate::monitor::Monitor;
use crate::session::{RawMessage, SessionError};

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Download failed: {0}")]
    Download(#[from] SessionError),

    #[error("Filesystem error: {0}")]
    Filesystem(#[from] std::io::Error),
}

impl Monitor {
    /// Downloads the attachment carried by `message` and records it in the
    /// media partition.
    ///
    /// Returns the stored path when the payload landed on disk, `None` on any
    /// failure; failure never propagates past this boundary, the owning
    /// message persists with a null media path.
    pub(crate) async fn capture_media(
        &self,
        message: &RawMessage,
        kind: MediaKind,
        conversation_kind: ConversationKind,
    ) -> Option<String> {
        match self.try_capture_media(message, kind).await {
            Ok(record) => {
                let path = record.file_path.clone();
                let display = format!(
                    "MEDIA | {} | {} ({} bytes)",
                    kind, record.file_name, record.file_size
                );
                self.record_and_broadcast(
                    NormalizedEvent::MediaAsset(record),
                    display,
                    Some(conversation_kind),
                )
                .await;
                Some(path)
            }
            Err(e) => {
                tracing::error!(
                    target: "vigil::media",
                    "Failed to capture {} attachment for message {}: {}",
                    kind,
                    message.id,
                    e
                );
                None
            }
        }
    }

    async fn try_capture_media(
        &self,
        message: &RawMessage,
        kind: MediaKind,
    ) -> Result<MediaAssetRecord, MediaError> {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let file_name = if kind == MediaKind::Photo {
            format!("{}_{}_{}.jpg", message.id, kind, stamp)
        } else {
            format!("{}_{}_{}", message.id, kind, stamp)
        };
        let file_path: PathBuf = self.media_dir.join(&file_name);

        self.session
            .download_attachment(message, &file_path)
            .await?;

        // Size read back from the stored file; 0 if the stat fails.
        let file_size = tokio::fs::metadata(&file_path)
            .await
            .map(|m| m.len() as i64)
            .unwrap_or(0);

        Ok(MediaAssetRecord {
            message_id: message.id,
            chat_id: Some(message.peer.id()),
            media_type: kind,
            file_name,
            file_path: file_path.display().to_string(),
            file_size,
            mime_type: None,
            date: message.date,
        })
    }
}
