//! The ingestion pipeline: classify raw session events, persist them,
//! capture media, count them, and fan them out to subscribers.

pub(crate) mod broadcast;
pub(crate) mod classify;
pub(crate) mod media;
pub(crate) mod stats;


use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use serde_json::json;
use tokio::sync::mpsc::Receiver;

use crate::config::MonitorOptions;
use crate::database::Database;
use crate::error::Result;
use crate::events::{
    ChatEventRecord, ContactRecord, ConversationKind, GroupEventRecord, MessageRecord,
    MonitorUpdate, NormalizedEvent, ReactionRecord,
};
use crate::session::{
    AccountSession, ChatActionKind, PeerRef, RawChatAction, RawEvent, RawMessage, RawReactions,
    RawUserUpdate,
};
use broadcast::BroadcastBus;
use stats::Stats;

pub use stats::StatsSnapshot;

/// The event classification, persistence, media-capture, and broadcast
/// pipeline for one authenticated account session.
pub struct Monitor {
    pub(crate) session: Arc<dyn AccountSession>,
    pub(crate) database: Arc<Database>,
    options: MonitorOptions,
    pub(crate) media_dir: PathBuf,
    stats: Stats,
    bus: BroadcastBus,
    running: AtomicBool,
}

impl Monitor {
    pub(crate) fn new(
        session: Arc<dyn AccountSession>,
        database: Arc<Database>,
        options: MonitorOptions,
        media_dir: PathBuf,
    ) -> Self {
        Self {
            session,
            database,
            options,
            media_dir,
            stats: Stats::new(),
            bus: BroadcastBus::new(),
            running: AtomicBool::new(false),
        }
    }

    /// Marks the monitor running and resolves the account's own identity.
    /// Identity lookup failure is logged and non-fatal.
    pub async fn start(&self) {
        self.running.store(true, Ordering::SeqCst);

        match self.session.me().await {
            Ok(me) => {
                tracing::info!(
                    target: "vigil::monitor",
                    "Monitoring as {} (@{})",
                    me.first_name.as_deref().unwrap_or("Unknown"),
                    me.username.as_deref().unwrap_or("no username")
                );
            }
            Err(e) => {
                tracing::error!(
                    target: "vigil::monitor",
                    "Failed to resolve own identity: {}",
                    e
                );
            }
        }

        tracing::info!(target: "vigil::monitor", "Monitoring started");
    }

    /// Clears the running flag. Raw events received afterwards are discarded;
    /// in-flight handlers run to completion.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        tracing::info!(target: "vigil::monitor", "Monitoring stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub(crate) fn bus(&self) -> &BroadcastBus {
        &self.bus
    }

    /// Main dispatch loop. One raw event at a time; each handler runs to
    /// completion before the next event is considered, so same-category order
    /// follows upstream delivery order. A handler error aborts that single
    /// event only.
    pub(crate) async fn process_events(
        monitor: Arc<Monitor>,
        mut receiver: Receiver<RawEvent>,
        mut shutdown: Receiver<()>,
    ) {
        tracing::debug!(
            target: "vigil::monitor",
            "Starting event dispatch loop"
        );

        let mut shutting_down = false;

        loop {
            tokio::select! {
                Some(event) = receiver.recv() => {
                    if !monitor.is_running() {
                        tracing::debug!(
                            target: "vigil::monitor",
                            "Discarding {} event received while stopped",
                            event.kind()
                        );
                        continue;
                    }

                    let kind = event.kind();
                    if let Err(e) = monitor.dispatch(event).await {
                        tracing::error!(
                            target: "vigil::monitor",
                            "Error processing {} event: {}",
                            kind,
                            e
                        );
                    }
                }
                Some(_) = shutdown.recv(), if !shutting_down => {
                    tracing::info!(
                        target: "vigil::monitor",
                        "Received shutdown signal, finishing current queue..."
                    );
                    shutting_down = true;
                }
                else => {
                    if shutting_down {
                        tracing::debug!(
                            target: "vigil::monitor",
                            "Queue flushed, shutting down dispatch loop"
                        );
                    } else {
                        tracing::debug!(
                            target: "vigil::monitor",
                            "All channels closed, exiting dispatch loop"
                        );
                    }
                    break;
                }
            }
        }
    }

    /// Static dispatch table: raw-event kind to handler, gated by the
    /// per-category monitoring options. Toggled-off events are discarded.
    pub(crate) async fn dispatch(&self, event: RawEvent) -> Result<()> {
        match event {
            RawEvent::NewMessage(message) if self.options.monitor_messages => {
                self.handle_new_message(message).await
            }
            RawEvent::MessageEdited(message) if self.options.monitor_messages => {
                self.handle_edited_message(message).await
            }
            RawEvent::MessagesDeleted { peer, message_ids } if self.options.monitor_messages => {
                self.handle_deleted_messages(peer, message_ids).await
            }
            RawEvent::ReactionsChanged(update) if self.options.monitor_reactions => {
                self.handle_reactions(update).await
            }
            RawEvent::ChatAction(action)
                if self.options.monitor_events || self.options.monitor_groups =>
            {
                self.handle_chat_action(action).await
            }
            RawEvent::UserUpdate(update)
                if self.options.monitor_events || self.options.monitor_contacts =>
            {
                self.handle_user_update(update).await
            }
            _ => Ok(()),
        }
    }

    /// Persists the event to its partition, bumps the category counter, and
    /// broadcasts to subscribers. A failed write is logged and the event is
    /// still counted and broadcast; the durable view may lag the counters.
    async fn record_and_broadcast(
        &self,
        event: NormalizedEvent,
        display_line: String,
        conversation_kind: Option<ConversationKind>,
    ) {
        let category = event.category();

        if let Err(e) = event.save(&self.database).await {
            tracing::error!(
                target: "vigil::store",
                "Failed to persist {} record: {}",
                category,
                e
            );
        }
        self.stats.increment(category);

        tracing::info!(target: "vigil::monitor", "{}", display_line);

        self.bus
            .broadcast(MonitorUpdate {
                category,
                event,
                display: display_line,
                conversation_kind,
            })
            .await;
    }

    async fn handle_new_message(&self, message: RawMessage) -> Result<()> {
        let chat = self.session.resolve_chat(&message.peer).await?;
        let sender = match message.sender_id {
            Some(id) => Some(self.session.resolve_user(id).await?),
            None => None,
        };

        let kind = classify::conversation_kind(&chat.flavor);
        let chat_title = classify::chat_display_title(&chat);

        let media_type = message.media.as_ref().map(classify::media_kind);
        let media_path = match media_type {
            Some(media_kind) if self.options.save_media && self.options.monitor_media => {
                self.capture_media(&message, media_kind, kind).await
            }
            _ => None,
        };

        let text = message.text.clone().unwrap_or_default();
        let record = MessageRecord {
            message_id: message.id,
            chat_id: chat.id,
            chat_title: Some(chat_title.clone()),
            chat_type: kind,
            sender_id: sender.as_ref().map(|s| s.id),
            sender_username: sender.as_ref().and_then(|s| s.username.clone()),
            sender_first_name: sender.as_ref().and_then(|s| s.first_name.clone()),
            sender_last_name: sender.as_ref().and_then(|s| s.last_name.clone()),
            text,
            is_outgoing: message.outgoing,
            is_edited: false,
            is_deleted: false,
            is_forwarded: message.forward.is_some(),
            forward_from_id: message.forward.as_ref().and_then(|f| f.from_user_id),
            media_type,
            media_path,
            date: message.date,
        };

        let media_suffix = media_type
            .map(|m| format!(" [{}]", m))
            .unwrap_or_default();
        let display = format!(
            "{} | {} | {}: {}{}",
            classify::direction_tag(record.is_outgoing),
            chat_title,
            classify::display_name(
                record.sender_first_name.as_deref(),
                record.sender_username.as_deref()
            ),
            classify::text_preview(&record.text),
            media_suffix
        );

        self.record_and_broadcast(NormalizedEvent::Message(record), display, Some(kind))
            .await;
        Ok(())
    }

    async fn handle_edited_message(&self, message: RawMessage) -> Result<()> {
        let chat = self.session.resolve_chat(&message.peer).await?;
        let sender = match message.sender_id {
            Some(id) => Some(self.session.resolve_user(id).await?),
            None => None,
        };

        let kind = classify::conversation_kind(&chat.flavor);
        let chat_title = classify::chat_display_title(&chat);

        // Edits append a new state row; the attachment was captured with the
        // original message, so no media fields here.
        let record = MessageRecord {
            message_id: message.id,
            chat_id: chat.id,
            chat_title: Some(chat_title.clone()),
            chat_type: kind,
            sender_id: sender.as_ref().map(|s| s.id),
            sender_username: sender.as_ref().and_then(|s| s.username.clone()),
            sender_first_name: sender.as_ref().and_then(|s| s.first_name.clone()),
            sender_last_name: sender.as_ref().and_then(|s| s.last_name.clone()),
            text: message.text.clone().unwrap_or_default(),
            is_outgoing: message.outgoing,
            is_edited: true,
            is_deleted: false,
            is_forwarded: message.forward.is_some(),
            forward_from_id: None,
            media_type: None,
            media_path: None,
            date: message.date,
        };

        let display = format!(
            "EDITED | {} | {} | {}: {}",
            classify::direction_tag(record.is_outgoing),
            chat_title,
            classify::display_name(
                record.sender_first_name.as_deref(),
                record.sender_username.as_deref()
            ),
            classify::text_preview(&record.text)
        );

        self.record_and_broadcast(NormalizedEvent::Message(record), display, Some(kind))
            .await;
        Ok(())
    }

    /// A deletion batch yields one tombstone row per id. The upstream event
    /// carries no other metadata, so identity fields stay null.
    async fn handle_deleted_messages(&self, peer: PeerRef, message_ids: Vec<i64>) -> Result<()> {
        let chat = self.session.resolve_chat(&peer).await?;
        let kind = classify::conversation_kind(&chat.flavor);
        let chat_title = classify::chat_display_title(&chat);

        for message_id in message_ids {
            let now = Utc::now();
            let record = MessageRecord {
                message_id,
                chat_id: chat.id,
                chat_title: Some(chat_title.clone()),
                chat_type: kind,
                sender_id: None,
                sender_username: None,
                sender_first_name: None,
                sender_last_name: None,
                text: classify::tombstone_text(message_id),
                is_outgoing: false,
                is_edited: false,
                is_deleted: true,
                is_forwarded: false,
                forward_from_id: None,
                media_type: None,
                media_path: None,
                date: now,
            };

            let display = format!(
                "DELETED | {} | message id {} | {}",
                chat_title,
                message_id,
                now.format("%H:%M:%S")
            );

            self.record_and_broadcast(NormalizedEvent::Message(record), display, Some(kind))
                .await;
        }
        Ok(())
    }

    /// Each (reacting user, symbol) pair in the current recent-reactors list
    /// yields one reaction row. Reactor lookup is best-effort; a failed lookup
    /// leaves the username null.
    async fn handle_reactions(&self, update: RawReactions) -> Result<()> {
        let chat = self.session.resolve_chat(&update.peer).await?;
        let kind = classify::conversation_kind(&chat.flavor);
        let chat_title = classify::chat_display_title(&chat);

        for reaction in &update.reactions {
            for &user_id in &reaction.recent_reactor_ids {
                let user_username = self
                    .session
                    .resolve_user(user_id)
                    .await
                    .ok()
                    .and_then(|u| u.username);

                let record = ReactionRecord {
                    message_id: update.message_id,
                    chat_id: chat.id,
                    user_id,
                    user_username: user_username.clone(),
                    reaction: reaction.symbol.clone(),
                    action: "added".to_string(),
                    date: Utc::now(),
                };

                let display = format!(
                    "REACTION | {} | {} from {} | message id {}",
                    chat_title,
                    reaction.symbol,
                    user_username.as_deref().unwrap_or("Unknown"),
                    update.message_id
                );

                self.record_and_broadcast(NormalizedEvent::Reaction(record), display, Some(kind))
                    .await;
            }
        }
        Ok(())
    }

    async fn handle_chat_action(&self, action: RawChatAction) -> Result<()> {
        let chat = self.session.resolve_chat(&action.peer).await?;
        let kind = classify::conversation_kind(&chat.flavor);
        let chat_title = classify::chat_display_title(&chat);

        let actor = match action.actor_user_id {
            Some(id) => Some(self.session.resolve_user(id).await?),
            None => None,
        };
        let actor_name = classify::display_name(
            actor.as_ref().and_then(|u| u.first_name.as_deref()),
            actor.as_ref().and_then(|u| u.username.as_deref()),
        );

        // Conversation-lifecycle actions go to the groups partition.
        if let Some((group_action, details)) = match &action.kind {
            ChatActionKind::Created { title } => {
                Some(("created", json!({ "title": title })))
            }
            ChatActionKind::Migrated { from_chat_id } => {
                Some(("migrated", json!({ "from_chat_id": from_chat_id })))
            }
            _ => None,
        } {
            if !self.options.monitor_groups {
                return Ok(());
            }

            let record = GroupEventRecord {
                chat_id: chat.id,
                chat_title: Some(chat_title.clone()),
                action: group_action.to_string(),
                user_id: actor.as_ref().map(|u| u.id),
                user_username: actor.as_ref().and_then(|u| u.username.clone()),
                details,
                date: Utc::now(),
            };

            let display = format!(
                "{} | {} | {}",
                group_action.to_uppercase(),
                chat_title,
                actor_name
            );

            self.record_and_broadcast(NormalizedEvent::GroupEvent(record), display, Some(kind))
                .await;
            return Ok(());
        }

        if !self.options.monitor_events {
            return Ok(());
        }

        let (event_type, details) = match &action.kind {
            ChatActionKind::UserJoined => ("user_joined", json!({})),
            ChatActionKind::UserLeft => ("user_left", json!({})),
            ChatActionKind::UserAdded => ("user_added", json!({})),
            ChatActionKind::UserKicked => ("user_kicked", json!({})),
            ChatActionKind::UserBanned => ("user_banned", json!({})),
            ChatActionKind::TitleChanged { new_title } => {
                ("chat_title_changed", json!({ "new_title": new_title }))
            }
            ChatActionKind::PhotoChanged => ("chat_photo_changed", json!({})),
            ChatActionKind::MessagePinned { message_id } => {
                ("message_pinned", json!({ "message_id": message_id }))
            }
            // Shapes that match no known sub-case are silently dropped.
            _ => return Ok(()),
        };

        let record = ChatEventRecord {
            event_type: event_type.to_string(),
            chat_id: Some(chat.id),
            chat_title: Some(chat_title.clone()),
            user_id: actor.as_ref().map(|u| u.id),
            user_username: actor.as_ref().and_then(|u| u.username.clone()),
            user_first_name: actor.as_ref().and_then(|u| u.first_name.clone()),
            details,
            date: Utc::now(),
        };

        let display = format!(
            "{} | {} | {}",
            event_type.to_uppercase(),
            chat_title,
            actor_name
        );

        self.record_and_broadcast(NormalizedEvent::ChatEvent(record), display, Some(kind))
            .await;
        Ok(())
    }

    /// Profile updates are classified as `user_updated` chat events, with a
    /// details payload snapshotting the profile as currently known; the same
    /// raw event also appends a contact snapshot. The two partitions are gated
    /// independently on event and contact monitoring.
    async fn handle_user_update(&self, update: RawUserUpdate) -> Result<()> {
        let now = Utc::now();
        let name = classify::display_name(update.first_name.as_deref(), update.username.as_deref());

        if self.options.monitor_events {
            let details = json!({
                "username": update.username,
                "first_name": update.first_name,
                "last_name": update.last_name,
                "phone": update.phone,
            });

            let chat_event = ChatEventRecord {
                event_type: "user_updated".to_string(),
                chat_id: None,
                chat_title: None,
                user_id: Some(update.user_id),
                user_username: update.username.clone(),
                user_first_name: update.first_name.clone(),
                details,
                date: now,
            };
            let display = format!("USER_UPDATED | {}", name);
            self.record_and_broadcast(NormalizedEvent::ChatEvent(chat_event), display, None)
                .await;
        }

        if self.options.monitor_contacts {
            let contact = ContactRecord {
                user_id: update.user_id,
                username: update.username.clone(),
                first_name: update.first_name.clone(),
                last_name: update.last_name.clone(),
                phone: update.phone.clone(),
                action: "updated".to_string(),
                date: now,
            };
            let display = format!("CONTACT | {}", name);
            self.record_and_broadcast(NormalizedEvent::Contact(contact), display, None)
                .await;
        }

        Ok(())
    }
}
