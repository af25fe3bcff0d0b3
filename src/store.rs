//! Append-only persistence for normalized events.
//!
//! One insert operation per category. Every insert takes the database's
//! single-writer lock, runs in its own transaction, and returns the generated
//! row id. Categories are persisted independently; there is no cross-category
//! transaction.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use crate::database::{Database, DatabaseError};
use crate::events::{
    ChatEventRecord, ContactRecord, GroupEventRecord, MediaAssetRecord, MessageRecord,
    NormalizedEvent, ReactionRecord,
};

impl MessageRecord {
    /// Appends this message state to the messages partition.
    pub async fn save(&self, db: &Database) -> Result<i64, DatabaseError> {
        let _writer = db.write_lock().lock().await;
        let mut txn = db.pool.begin().await?;
        let result = sqlx::query(
            "INSERT INTO messages (
                message_id, chat_id, chat_title, chat_type, sender_id,
                sender_username, sender_first_name, sender_last_name, text,
                is_outgoing, is_edited, is_deleted, is_forwarded,
                forward_from_id, media_type, media_path, date
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(self.message_id)
        .bind(self.chat_id)
        .bind(&self.chat_title)
        .bind(self.chat_type.as_str())
        .bind(self.sender_id)
        .bind(&self.sender_username)
        .bind(&self.sender_first_name)
        .bind(&self.sender_last_name)
        .bind(&self.text)
        .bind(self.is_outgoing)
        .bind(self.is_edited)
        .bind(self.is_deleted)
        .bind(self.is_forwarded)
        .bind(self.forward_from_id)
        .bind(self.media_type.map(|m| m.as_str()))
        .bind(&self.media_path)
        .bind(self.date)
        .execute(&mut *txn)
        .await?;
        txn.commit().await?;
        Ok(result.last_insert_rowid())
    }
}

impl ReactionRecord {
    pub async fn save(&self, db: &Database) -> Result<i64, DatabaseError> {
        let _writer = db.write_lock().lock().await;
        let mut txn = db.pool.begin().await?;
        let result = sqlx::query(
            "INSERT INTO reactions (
                message_id, chat_id, user_id, user_username, reaction, action, date
            ) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(self.message_id)
        .bind(self.chat_id)
        .bind(self.user_id)
        .bind(&self.user_username)
        .bind(&self.reaction)
        .bind(&self.action)
        .bind(self.date)
        .execute(&mut *txn)
        .await?;
        txn.commit().await?;
        Ok(result.last_insert_rowid())
    }
}

impl ChatEventRecord {
    pub async fn save(&self, db: &Database) -> Result<i64, DatabaseError> {
        let _writer = db.write_lock().lock().await;
        let mut txn = db.pool.begin().await?;
        let result = sqlx::query(
            "INSERT INTO events (
                event_type, chat_id, chat_title, user_id, user_username,
                user_first_name, details, date
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&self.event_type)
        .bind(self.chat_id)
        .bind(&self.chat_title)
        .bind(self.user_id)
        .bind(&self.user_username)
        .bind(&self.user_first_name)
        .bind(self.details.to_string())
        .bind(self.date)
        .execute(&mut *txn)
        .await?;
        txn.commit().await?;
        Ok(result.last_insert_rowid())
    }
}

impl MediaAssetRecord {
    pub async fn save(&self, db: &Database) -> Result<i64, DatabaseError> {
        let _writer = db.write_lock().lock().await;
        let mut txn = db.pool.begin().await?;
        let result = sqlx::query(
            "INSERT INTO media (
                message_id, chat_id, media_type, file_name, file_path,
                file_size, mime_type, date
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(self.message_id)
        .bind(self.chat_id)
        .bind(self.media_type.as_str())
        .bind(&self.file_name)
        .bind(&self.file_path)
        .bind(self.file_size)
        .bind(&self.mime_type)
        .bind(self.date)
        .execute(&mut *txn)
        .await?;
        txn.commit().await?;
        Ok(result.last_insert_rowid())
    }
}

impl ContactRecord {
    pub async fn save(&self, db: &Database) -> Result<i64, DatabaseError> {
        let _writer = db.write_lock().lock().await;
        let mut txn = db.pool.begin().await?;
        let result = sqlx::query(
            "INSERT INTO contacts (
                user_id, username, first_name, last_name, phone, action, date
            ) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(self.user_id)
        .bind(&self.username)
        .bind(&self.first_name)
        .bind(&self.last_name)
        .bind(&self.phone)
        .bind(&self.action)
        .bind(self.date)
        .execute(&mut *txn)
        .await?;
        txn.commit().await?;
        Ok(result.last_insert_rowid())
    }
}

impl GroupEventRecord {
    pub async fn save(&self, db: &Database) -> Result<i64, DatabaseError> {
        let _writer = db.write_lock().lock().await;
        let mut txn = db.pool.begin().await?;
        let result = sqlx::query(
            "INSERT INTO groups (
                chat_id, chat_title, action, user_id, user_username, details, date
            ) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(self.chat_id)
        .bind(&self.chat_title)
        .bind(&self.action)
        .bind(self.user_id)
        .bind(&self.user_username)
        .bind(self.details.to_string())
        .bind(self.date)
        .execute(&mut *txn)
        .await?;
        txn.commit().await?;
        Ok(result.last_insert_rowid())
    }
}

impl NormalizedEvent {
    /// Persists the event to its category partition.
    pub async fn save(&self, db: &Database) -> Result<i64, DatabaseError> {
        match self {
            NormalizedEvent::Message(r) => r.save(db).await,
            NormalizedEvent::Reaction(r) => r.save(db).await,
            NormalizedEvent::ChatEvent(r) => r.save(db).await,
            NormalizedEvent::MediaAsset(r) => r.save(db).await,
            NormalizedEvent::Contact(r) => r.save(db).await,
            NormalizedEvent::GroupEvent(r) => r.save(db).await,
        }
    }
}

/// Durable row counts per category, read back from the store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CategoryCounts {
    pub messages: i64,
    pub reactions: i64,
    pub events: i64,
    pub media: i64,
    pub contacts: i64,
    pub groups: i64,
}

/// One row of the merged recent-events view.
#[derive(Clone, Debug, FromRow, Serialize)]
pub struct RecentEvent {
    pub kind: String,
    pub date: DateTime<Utc>,
    pub chat_title: Option<String>,
    pub username: Option<String>,
    pub content: Option<String>,
}

impl Database {
    /// Aggregate row counts per category.
    pub async fn statistics(&self) -> Result<CategoryCounts, DatabaseError> {
        let messages = self.count_table("messages").await?;
        let reactions = self.count_table("reactions").await?;
        let events = self.count_table("events").await?;
        let media = self.count_table("media").await?;
        let contacts = self.count_table("contacts").await?;
        let groups = self.count_table("groups").await?;

        Ok(CategoryCounts {
            messages,
            reactions,
            events,
            media,
            contacts,
            groups,
        })
    }

    async fn count_table(&self, table: &str) -> Result<i64, DatabaseError> {
        let count = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Unified view over messages, reactions, and chat events, ordered by
    /// timestamp descending.
    pub async fn recent_events(&self, limit: i64) -> Result<Vec<RecentEvent>, DatabaseError> {
        let rows = sqlx::query_as::<_, RecentEvent>(
            "SELECT 'message' AS kind, date, chat_title, sender_username AS username, text AS content
             FROM messages
             UNION ALL
             SELECT 'reaction' AS kind, date, NULL AS chat_title, user_username AS username, reaction AS content
             FROM reactions
             UNION ALL
             SELECT 'event' AS kind, date, chat_title, user_username AS username, event_type AS content
             FROM events
             ORDER BY date DESC
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use tempfile::tempdir;

    use super::*;
    use crate::events::{ConversationKind, MediaKind};

    async fn setup_test_db() -> (Database, tempfile::TempDir) {
        let temp_dir = tempdir().unwrap();
        let db = Database::new(temp_dir.path().join("test.sqlite"))
            .await
            .unwrap();
        (db, temp_dir)
    }

    fn message_at(date: DateTime<Utc>, text: &str) -> MessageRecord {
        MessageRecord {
            message_id: 10,
            chat_id: 100,
            chat_title: Some("Alice".to_string()),
            chat_type: ConversationKind::Private,
            sender_id: Some(7),
            sender_username: Some("alice".to_string()),
            sender_first_name: Some("Alice".to_string()),
            sender_last_name: None,
            text: text.to_string(),
            is_outgoing: false,
            is_edited: false,
            is_deleted: false,
            is_forwarded: false,
            forward_from_id: None,
            media_type: None,
            media_path: None,
            date,
        }
    }

    #[tokio::test]
    async fn test_save_returns_generated_ids() {
        let (db, _guard) = setup_test_db().await;
        let date = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();

        let first = message_at(date, "one").save(&db).await.unwrap();
        let second = message_at(date, "two").save(&db).await.unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 2);
    }

    #[tokio::test]
    async fn test_statistics_counts_every_category() {
        let (db, _guard) = setup_test_db().await;
        let date = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();

        message_at(date, "hello").save(&db).await.unwrap();
        ReactionRecord {
            message_id: 10,
            chat_id: 100,
            user_id: 7,
            user_username: Some("alice".to_string()),
            reaction: "👍".to_string(),
            action: "added".to_string(),
            date,
        }
        .save(&db)
        .await
        .unwrap();
        ChatEventRecord {
            event_type: "user_joined".to_string(),
            chat_id: Some(200),
            chat_title: Some("Group".to_string()),
            user_id: Some(7),
            user_username: Some("alice".to_string()),
            user_first_name: Some("Alice".to_string()),
            details: serde_json::json!({}),
            date,
        }
        .save(&db)
        .await
        .unwrap();
        MediaAssetRecord {
            message_id: 10,
            chat_id: Some(100),
            media_type: MediaKind::Photo,
            file_name: "10_photo_20260101_120000.jpg".to_string(),
            file_path: "/tmp/10_photo_20260101_120000.jpg".to_string(),
            file_size: 42,
            mime_type: None,
            date,
        }
        .save(&db)
        .await
        .unwrap();
        ContactRecord {
            user_id: 7,
            username: Some("alice".to_string()),
            first_name: Some("Alice".to_string()),
            last_name: None,
            phone: None,
            action: "updated".to_string(),
            date,
        }
        .save(&db)
        .await
        .unwrap();
        GroupEventRecord {
            chat_id: 200,
            chat_title: Some("Group".to_string()),
            action: "created".to_string(),
            user_id: Some(7),
            user_username: Some("alice".to_string()),
            details: serde_json::json!({"title": "Group"}),
            date,
        }
        .save(&db)
        .await
        .unwrap();

        let counts = db.statistics().await.unwrap();
        assert_eq!(
            counts,
            CategoryCounts {
                messages: 1,
                reactions: 1,
                events: 1,
                media: 1,
                contacts: 1,
                groups: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_recent_events_merges_and_orders_descending() {
        let (db, _guard) = setup_test_db().await;
        let base = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();

        message_at(base, "oldest").save(&db).await.unwrap();
        ReactionRecord {
            message_id: 10,
            chat_id: 100,
            user_id: 7,
            user_username: Some("bob".to_string()),
            reaction: "🔥".to_string(),
            action: "added".to_string(),
            date: base + chrono::Duration::seconds(10),
        }
        .save(&db)
        .await
        .unwrap();
        ChatEventRecord {
            event_type: "message_pinned".to_string(),
            chat_id: Some(100),
            chat_title: Some("Alice".to_string()),
            user_id: Some(7),
            user_username: Some("alice".to_string()),
            user_first_name: Some("Alice".to_string()),
            details: serde_json::json!({"message_id": 10}),
            date: base + chrono::Duration::seconds(20),
        }
        .save(&db)
        .await
        .unwrap();

        let rows = db.recent_events(10).await.unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].kind, "event");
        assert_eq!(rows[0].content.as_deref(), Some("message_pinned"));
        assert_eq!(rows[1].kind, "reaction");
        assert_eq!(rows[1].content.as_deref(), Some("🔥"));
        assert_eq!(rows[2].kind, "message");
        assert_eq!(rows[2].content.as_deref(), Some("oldest"));

        let limited = db.recent_events(2).await.unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].kind, "event");
    }

    #[tokio::test]
    async fn test_message_roundtrip_through_recent_view() {
        let (db, _guard) = setup_test_db().await;
        let date = Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();

        message_at(date, "hello").save(&db).await.unwrap();

        let rows = db.recent_events(1).await.unwrap();
        assert_eq!(rows[0].kind, "message");
        assert_eq!(rows[0].date, date);
        assert_eq!(rows[0].chat_title.as_deref(), Some("Alice"));
        assert_eq!(rows[0].username.as_deref(), Some("alice"));
        assert_eq!(rows[0].content.as_deref(), Some("hello"));
    }
}
