pub use crate::config::MonitorOptions;
pub use crate::error::{Result, VigilError};
pub use crate::events::{
    ChatEventRecord, ContactRecord, ConversationKind, EventCategory, GroupEventRecord,
    MediaAssetRecord, MediaKind, MessageRecord, MonitorUpdate, NormalizedEvent, ReactionRecord,
};
pub use crate::monitor::{Monitor, StatsSnapshot};
pub use crate::session::{
    AccountSession, ChatActionKind, ChatFlavor, ChatInfo, ForwardInfo, PeerRef, RawChatAction,
    RawEvent, RawMedia, RawMessage, RawReaction, RawReactions, RawUserUpdate, SelfInfo,
    SessionError, UserInfo,
};
pub use crate::store::{CategoryCounts, RecentEvent};

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use anyhow::Context;
use tokio::sync::mpsc::{self, Sender};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter::EnvFilter, fmt::Layer, prelude::*, registry::Registry};

use crate::database::Database;

mod config;
mod database;
mod error;
mod events;
mod monitor;
mod session;
mod store;

static TRACING_GUARDS: OnceLock<Mutex<Option<(WorkerGuard, WorkerGuard)>>> = OnceLock::new();
static TRACING_INIT: OnceLock<()> = OnceLock::new();

fn init_tracing(logs_dir: &Path) {
    TRACING_INIT.get_or_init(|| {
        let file_appender = tracing_appender::rolling::RollingFileAppender::builder()
            .rotation(tracing_appender::rolling::Rotation::DAILY)
            .filename_prefix("vigil")
            .filename_suffix("log")
            .build(logs_dir)
            .expect("Failed to create file appender");

        let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);
        let (non_blocking_stdout, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());

        TRACING_GUARDS
            .set(Mutex::new(Some((file_guard, stdout_guard))))
            .ok();

        let stdout_layer = Layer::new()
            .with_writer(non_blocking_stdout)
            .with_ansi(true)
            .with_target(true);

        let file_layer = Layer::new()
            .with_writer(non_blocking_file)
            .with_ansi(false)
            .with_target(true);

        Registry::default()
            .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
            .with(stdout_layer)
            .with(file_layer)
            .init();
    });
}

#[derive(Clone, Debug)]
pub struct VigilConfig {
    /// Directory for application data (database, captured media).
    pub data_dir: PathBuf,

    /// Directory for application logs.
    pub logs_dir: PathBuf,

    /// Per-category monitoring switches.
    pub monitor: MonitorOptions,
}

impl VigilConfig {
    pub fn new(data_dir: &Path, logs_dir: &Path) -> Self {
        let env_suffix = if cfg!(debug_assertions) {
            "dev"
        } else {
            "release"
        };

        Self {
            data_dir: data_dir.join(env_suffix),
            logs_dir: logs_dir.join(env_suffix),
            monitor: MonitorOptions::default(),
        }
    }

    pub fn with_options(mut self, monitor: MonitorOptions) -> Self {
        self.monitor = monitor;
        self
    }

    fn media_dir(&self) -> PathBuf {
        self.data_dir.join("media")
    }
}

/// The monitoring application: owns the event store, the pipeline, and the
/// channels wiring the account session into it.
///
/// Constructed explicitly from a [`VigilConfig`] and an [`AccountSession`];
/// there is no global instance.
pub struct Vigil {
    pub config: VigilConfig,
    database: Arc<Database>,
    monitor: Arc<Monitor>,
    event_sender: Sender<RawEvent>,
    shutdown_sender: Sender<()>,
}

impl std::fmt::Debug for Vigil {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vigil")
            .field("config", &self.config)
            .field("database", &"<REDACTED>")
            .field("monitor", &"<REDACTED>")
            .finish()
    }
}

impl Vigil {
    /// Initializes the monitoring application with the provided configuration
    /// and account session.
    ///
    /// Sets up the data, media, and log directories, configures logging,
    /// opens the database, builds the pipeline, and spawns the dispatch loop.
    /// Raw events queued into [`Vigil::event_sender`] flow through it once
    /// [`Vigil::start`] has been called.
    ///
    /// # Errors
    ///
    /// Returns an error if the directories cannot be created or the database
    /// cannot be initialized.
    pub async fn initialize(
        config: VigilConfig,
        session: Arc<dyn AccountSession>,
    ) -> Result<Self> {
        let data_dir = &config.data_dir;
        let logs_dir = &config.logs_dir;
        let media_dir = config.media_dir();

        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory: {:?}", data_dir))
            .map_err(VigilError::from)?;
        std::fs::create_dir_all(logs_dir)
            .with_context(|| format!("Failed to create logs directory: {:?}", logs_dir))
            .map_err(VigilError::from)?;
        std::fs::create_dir_all(&media_dir)
            .with_context(|| format!("Failed to create media directory: {:?}", media_dir))
            .map_err(VigilError::from)?;

        // Only initialize tracing once
        init_tracing(logs_dir);
        tracing::debug!("Logging initialized in directory: {:?}", logs_dir);

        let database = Arc::new(Database::new(data_dir.join("vigil.sqlite")).await?);

        let (event_sender, event_receiver) = mpsc::channel(500);
        let (shutdown_sender, shutdown_receiver) = mpsc::channel(1);

        let monitor = Arc::new(Monitor::new(
            session,
            database.clone(),
            config.monitor.clone(),
            media_dir,
        ));

        // Start the dispatch loop only when not running tests
        if !cfg!(test) {
            tokio::spawn(Monitor::process_events(
                monitor.clone(),
                event_receiver,
                shutdown_receiver,
            ));
        }

        Ok(Self {
            config,
            database,
            monitor,
            event_sender,
            shutdown_sender,
        })
    }

    /// Raw-event intake for the session implementation: queue platform events
    /// here and the dispatch loop picks them up in order.
    pub fn event_sender(&self) -> Sender<RawEvent> {
        self.event_sender.clone()
    }

    /// Starts monitoring: marks the pipeline running and resolves the
    /// account's own identity.
    pub async fn start(&self) {
        self.monitor.start().await;
    }

    /// Stops the pipeline and signals the dispatch loop to drain its queue
    /// and exit. In-flight handlers run to completion.
    pub async fn shutdown(&self) -> Result<()> {
        self.monitor.stop();
        match self.shutdown_sender.send(()).await {
            Ok(_) => Ok(()),
            Err(_) => Ok(()), // Expected if the loop already shut down
        }
    }

    pub fn is_running(&self) -> bool {
        self.monitor.is_running()
    }

    /// Registers a broadcast subscriber. Updates arrive on the returned
    /// receiver; a subscriber that stops draining only loses its own copies.
    pub async fn subscribe(&self, buffer_size: Option<usize>) -> mpsc::Receiver<MonitorUpdate> {
        self.monitor.bus().subscribe(buffer_size).await
    }

    /// Instantaneous copy of the running per-category counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.monitor.stats()
    }

    /// Durable row counts per category, read from the store.
    pub async fn statistics(&self) -> Result<CategoryCounts> {
        self.database.statistics().await.map_err(VigilError::from)
    }

    /// The merged recent-events view (messages, reactions, chat events),
    /// newest first, bounded by `limit`.
    pub async fn recent_events(&self, limit: i64) -> Result<Vec<RecentEvent>> {
        self.database
            .recent_events(limit)
            .await
            .map_err(VigilError::from)
    }

    /// Deletes all recorded data: every category partition and all captured
    /// media files.
    pub async fn delete_all_data(&self) -> Result<()> {
        tracing::debug!(target: "vigil::delete_all_data", "Deleting all data");

        self.database.delete_all_data().await?;

        let media_dir = self.config.media_dir();
        if media_dir.exists() {
            tokio::fs::remove_dir_all(&media_dir).await?;
        }
        tokio::fs::create_dir_all(&media_dir).await?;

        Ok(())
    }
}
