//! Download session manager.
//!
//! Tracks one state machine per resolved video id:
//!
//! ```text
//! checking --(resource absent)--> downloading --(bytes ready)--> completed
//! checking --(resource present)--> completed
//! downloading --(server error)--> error
//! any --(user cancels)--> cancelled
//! cancelled --(re-invoked)--> checking   [new session object]
//! ```
//!
//! Sessions are deduplicated by id: a second `start_download` for an id that
//! is already in flight joins as a waiter and settles with the same terminal
//! outcome. Terminal transitions settle every registered waiter under the
//! session-table lock before anything else observes the new state.

mod adapters;

pub use adapters::{DouyinAdapter, GenericAdapter, SourceAdapter, StartRequest, YouTubeAdapter};

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use prep_common::{CancellationToken, ProgressFn, ProgressUpdate};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::{EngineError, Result};
use crate::media::{ArtifactLocation, DownloadOutcome};
use crate::progress::{ChannelCallback, ChannelEvent, ProgressChannel};
use crate::server::MediaServer;

/// Caller-supplied knobs for one download request.
#[derive(Debug, Clone, Default)]
pub struct DownloadOptions {
    /// Requested quality; the configured default applies when absent.
    pub quality: Option<String>,
    /// Discard a completed session and download again.
    pub force_refresh: bool,
    /// Use this id instead of deriving one from the URL. Required for
    /// deduplicating generic-site downloads, whose derived ids are unique
    /// per invocation.
    pub stable_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Checking,
    Downloading,
    Completed,
    Error,
    Cancelled,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error | Self::Cancelled)
    }
}

/// Non-blocking view of one session's current state.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub status: SessionStatus,
    pub progress: u8,
    pub url: Option<String>,
    pub error: Option<String>,
}

/// Terminal outcome fanned out to waiters.
enum SettledOutcome {
    Completed(DownloadOutcome),
    Failed(String),
    Cancelled,
}

/// Terminal event fed from the progress channel into the driving task.
enum TerminalEvent {
    Completed { url: Option<String> },
    Failed { error: String },
}

struct SessionEntry {
    /// Creation generation. A session recreated under the same id gets a new
    /// epoch, so tasks from a superseded generation cannot touch it.
    epoch: u64,
    status: SessionStatus,
    progress: u8,
    /// Highest transport-reported value; bounds the simulation.
    real_progress: Option<u8>,
    result: Option<ArtifactLocation>,
    error: Option<String>,
    waiters: Vec<oneshot::Sender<SettledOutcome>>,
    cancel: CancellationToken,
}

impl SessionEntry {
    fn new(epoch: u64, cancel: CancellationToken) -> Self {
        Self {
            epoch,
            status: SessionStatus::Checking,
            progress: 0,
            real_progress: None,
            result: None,
            error: None,
            waiters: Vec::new(),
            cancel,
        }
    }
}

type SessionTable = Mutex<HashMap<String, SessionEntry>>;

/// Per-source download session manager. One instance per source type; all
/// instances share this shape, differing only in their [`SourceAdapter`].
pub struct SessionManager<A: SourceAdapter> {
    adapter: A,
    server: Arc<dyn MediaServer>,
    channel: Arc<ProgressChannel>,
    sessions: Arc<SessionTable>,
    epochs: AtomicU64,
    config: SessionConfig,
}

impl<A: SourceAdapter> SessionManager<A> {
    pub fn new(
        adapter: A,
        server: Arc<dyn MediaServer>,
        channel: Arc<ProgressChannel>,
        config: SessionConfig,
    ) -> Self {
        Self {
            adapter,
            server,
            channel,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            epochs: AtomicU64::new(0),
            config,
        }
    }

    /// Download the video behind `url`, deduplicated per resolved id.
    ///
    /// A completed session short-circuits to its cached artifact (unless
    /// `force_refresh`). An in-flight session makes this call wait for the
    /// existing download; the new caller's `on_progress` is NOT attached.
    /// Concurrent observers read [`check_status`](Self::check_status) instead.
    pub async fn start_download(
        &self,
        url: &str,
        on_progress: Option<ProgressFn>,
        options: DownloadOptions,
    ) -> Result<DownloadOutcome> {
        let id = match &options.stable_id {
            Some(id) => id.clone(),
            None => self.adapter.resolve(url).ok_or_else(|| {
                EngineError::invalid_url(
                    url,
                    format!("not a recognizable {} URL", self.adapter.kind()),
                )
            })?,
        };
        let quality = options
            .quality
            .clone()
            .unwrap_or_else(|| self.config.default_quality.clone());

        enum Claim {
            Cached(DownloadOutcome),
            Wait(oneshot::Receiver<SettledOutcome>),
            Fresh(u64, CancellationToken),
        }

        let claim = {
            let mut sessions = self.sessions.lock();
            match sessions.get_mut(&id) {
                Some(entry)
                    if entry.status == SessionStatus::Completed && !options.force_refresh =>
                {
                    match entry.result.clone() {
                        Some(location) => Claim::Cached(DownloadOutcome {
                            id: id.clone(),
                            location,
                        }),
                        None => {
                            let (epoch, token) = self.fresh_session(&mut sessions, &id);
                            Claim::Fresh(epoch, token)
                        }
                    }
                }
                Some(entry) if !entry.status.is_terminal() => {
                    let (tx, rx) = oneshot::channel();
                    entry.waiters.push(tx);
                    Claim::Wait(rx)
                }
                // Absent, cancelled, errored, or force-refreshed: new session.
                _ => {
                    let (epoch, token) = self.fresh_session(&mut sessions, &id);
                    Claim::Fresh(epoch, token)
                }
            }
        };

        match claim {
            Claim::Cached(outcome) => {
                debug!(id = %outcome.id, "download already completed; reusing artifact");
                Ok(outcome)
            }
            Claim::Wait(receiver) => {
                debug!(id, "download already in flight; awaiting its outcome");
                match receiver.await {
                    Ok(SettledOutcome::Completed(outcome)) => Ok(outcome),
                    Ok(SettledOutcome::Failed(message)) => {
                        Err(EngineError::SessionFailed { message })
                    }
                    Ok(SettledOutcome::Cancelled) | Err(_) => Err(EngineError::Cancelled),
                }
            }
            Claim::Fresh(epoch, token) => {
                let result = self
                    .run(
                        &id,
                        url,
                        &quality,
                        options.force_refresh,
                        on_progress,
                        epoch,
                        &token,
                    )
                    .await;
                self.settle(&id, epoch, result)
            }
        }
    }

    fn fresh_session(
        &self,
        sessions: &mut HashMap<String, SessionEntry>,
        id: &str,
    ) -> (u64, CancellationToken) {
        let epoch = self.epochs.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        sessions.insert(id.to_string(), SessionEntry::new(epoch, token.clone()));
        (epoch, token)
    }

    /// Synchronous, non-blocking read of a session's state. Unknown ids get
    /// the default "checking" shape rather than an error.
    pub fn check_status(&self, id: &str) -> StatusSnapshot {
        let sessions = self.sessions.lock();
        match sessions.get(id) {
            Some(entry) => StatusSnapshot {
                status: entry.status,
                progress: entry.progress,
                url: match &entry.result {
                    Some(ArtifactLocation::ServerPath(path)) => Some(path.clone()),
                    _ => None,
                },
                error: entry.error.clone(),
            },
            None => StatusSnapshot {
                status: SessionStatus::Checking,
                progress: 0,
                url: None,
                error: None,
            },
        }
    }

    /// Cancel the session for `id`: local transition first (progress reset to
    /// 0), then best-effort server notification and channel teardown. A
    /// network failure while notifying the server never undoes the local
    /// transition.
    pub async fn cancel(&self, id: &str) {
        let token = {
            let mut sessions = self.sessions.lock();
            match sessions.get_mut(id) {
                Some(entry) => {
                    info!(id, "cancelling download");
                    entry.status = SessionStatus::Cancelled;
                    entry.progress = 0;
                    entry.real_progress = None;
                    Some(entry.cancel.clone())
                }
                None => None,
            }
        };
        let Some(token) = token else {
            debug!(id, "cancel requested for unknown session");
            return;
        };
        token.cancel();
        self.adapter.cancel(&*self.server, id).await;
        self.channel.unsubscribe(id).await;
    }

    /// Drop every session (context switch). Outstanding waiters settle as
    /// cancelled and in-flight work is told to stop.
    pub fn clear(&self) {
        let mut sessions = self.sessions.lock();
        for (_, mut entry) in sessions.drain() {
            entry.cancel.cancel();
            for waiter in entry.waiters.drain(..) {
                let _ = waiter.send(SettledOutcome::Cancelled);
            }
        }
    }

    async fn run(
        &self,
        id: &str,
        url: &str,
        quality: &str,
        force_refresh: bool,
        on_progress: Option<ProgressFn>,
        epoch: u64,
        token: &CancellationToken,
    ) -> Result<ArtifactLocation> {
        if !force_refresh {
            match self.adapter.probe(&*self.server, id).await {
                Ok(Some(path)) => {
                    debug!(id, path, "artifact already present on server");
                    if let Some(value) = record_progress(&self.sessions, id, epoch, 100, true) {
                        deliver(&on_progress, value, None);
                    }
                    return Ok(ArtifactLocation::ServerPath(path));
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(id, error = %e, "existence check failed; attempting download anyway");
                }
            }
        }

        if token.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        self.transition(id, SessionStatus::Downloading);
        info!(id, source = %self.adapter.kind(), "starting download");

        let (terminal_tx, terminal_rx) = oneshot::channel();
        let terminal = Arc::new(Mutex::new(Some(terminal_tx)));
        let callback = self.channel_callback(id, epoch, on_progress.clone(), terminal);
        self.channel.subscribe(id, callback).await;

        let simulation = self.spawn_simulation(id, epoch, on_progress.clone(), token.clone());

        let fallback_path = self.adapter.artifact_path(id);
        let flight = async {
            let request = StartRequest {
                id,
                url,
                quality,
                force_refresh,
            };
            match self.adapter.start(&*self.server, request).await? {
                Some(path) => Ok(ArtifactLocation::ServerPath(path)),
                None => match terminal_rx.await {
                    Ok(TerminalEvent::Completed { url }) => {
                        Ok(ArtifactLocation::ServerPath(url.unwrap_or(fallback_path)))
                    }
                    Ok(TerminalEvent::Failed { error }) => {
                        Err(EngineError::server_reported("Video download", error))
                    }
                    Err(_) => Err(EngineError::channel(
                        "progress channel closed before a terminal status",
                    )),
                },
            }
        };

        let result = tokio::select! {
            _ = token.cancelled() => Err(EngineError::Cancelled),
            result = flight => result,
        };

        simulation.abort();
        self.channel.unsubscribe(id).await;

        if result.is_ok()
            && let Some(value) = record_progress(&self.sessions, id, epoch, 100, true)
        {
            deliver(&on_progress, value, None);
        }
        result
    }

    /// Apply the terminal outcome under the table lock, settling every waiter
    /// before the lock is released.
    fn settle(
        &self,
        id: &str,
        epoch: u64,
        result: Result<ArtifactLocation>,
    ) -> Result<DownloadOutcome> {
        let mut sessions = self.sessions.lock();
        let Some(entry) = sessions.get_mut(id) else {
            // The table was cleared mid-flight.
            return Err(EngineError::Cancelled);
        };
        if entry.epoch != epoch {
            // A newer session took over this id; the outcome of the
            // superseded run must not touch it.
            return Err(EngineError::Cancelled);
        }

        if entry.status == SessionStatus::Cancelled {
            for waiter in entry.waiters.drain(..) {
                let _ = waiter.send(SettledOutcome::Cancelled);
            }
            return Err(EngineError::Cancelled);
        }

        match result {
            Ok(location) => {
                entry.status = SessionStatus::Completed;
                entry.progress = 100;
                entry.error = None;
                entry.result = Some(location.clone());
                let outcome = DownloadOutcome {
                    id: id.to_string(),
                    location,
                };
                for waiter in entry.waiters.drain(..) {
                    let _ = waiter.send(SettledOutcome::Completed(outcome.clone()));
                }
                info!(id, "download completed");
                Ok(outcome)
            }
            Err(error) if error.is_cancelled() => {
                entry.status = SessionStatus::Cancelled;
                entry.progress = 0;
                for waiter in entry.waiters.drain(..) {
                    let _ = waiter.send(SettledOutcome::Cancelled);
                }
                Err(error)
            }
            Err(error) => {
                entry.status = SessionStatus::Error;
                entry.error = Some(error.to_string());
                for waiter in entry.waiters.drain(..) {
                    let _ = waiter.send(SettledOutcome::Failed(error.to_string()));
                }
                warn!(id, error = %error, "download failed");
                Err(error)
            }
        }
    }

    fn transition(&self, id: &str, status: SessionStatus) {
        let mut sessions = self.sessions.lock();
        if let Some(entry) = sessions.get_mut(id)
            && !entry.status.is_terminal()
        {
            entry.status = status;
        }
    }

    fn channel_callback(
        &self,
        id: &str,
        epoch: u64,
        on_progress: Option<ProgressFn>,
        terminal: Arc<Mutex<Option<oneshot::Sender<TerminalEvent>>>>,
    ) -> ChannelCallback {
        let sessions = self.sessions.clone();
        let id = id.to_string();
        Arc::new(move |event| match event {
            ChannelEvent::Progress { percent, phase } => {
                if let Some(value) = record_progress(&sessions, &id, epoch, percent, true) {
                    deliver(&on_progress, value, phase);
                }
            }
            ChannelEvent::Completed { url } => {
                if let Some(value) = record_progress(&sessions, &id, epoch, 100, true) {
                    deliver(&on_progress, value, None);
                }
                if let Some(tx) = terminal.lock().take() {
                    let _ = tx.send(TerminalEvent::Completed { url });
                }
            }
            ChannelEvent::Failed { error } => {
                if let Some(tx) = terminal.lock().take() {
                    let _ = tx.send(TerminalEvent::Failed { error });
                }
            }
        })
    }

    /// Keep the UI moving while transport progress is absent or stalled.
    ///
    /// Each tick advances displayed progress by a fixed step, never past the
    /// simulation ceiling, and once a real value has been observed never more
    /// than one step beyond it. Real values always win.
    fn spawn_simulation(
        &self,
        id: &str,
        epoch: u64,
        on_progress: Option<ProgressFn>,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        let sessions = self.sessions.clone();
        let id = id.to_string();
        let step = self.config.simulate_step;
        let ceiling = self.config.simulate_ceiling;
        let tick = self.config.simulate_tick;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tick);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let advanced = {
                    let mut sessions = sessions.lock();
                    let Some(entry) = sessions.get_mut(&id) else {
                        break;
                    };
                    if entry.epoch != epoch || entry.status != SessionStatus::Downloading {
                        break;
                    }
                    if entry.progress >= ceiling {
                        continue;
                    }
                    let mut candidate = entry.progress.saturating_add(step);
                    if let Some(real) = entry.real_progress {
                        candidate = candidate.min(real.saturating_add(step));
                    }
                    candidate = candidate.min(ceiling);
                    if candidate <= entry.progress {
                        continue;
                    }
                    entry.progress = candidate;
                    candidate
                };
                deliver(&on_progress, advanced, None);
            }
        })
    }
}

/// Record a progress observation, enforcing monotonic non-decreasing delivery.
/// Returns the effective value when it advanced, `None` when suppressed.
fn record_progress(
    sessions: &SessionTable,
    id: &str,
    epoch: u64,
    value: u8,
    real: bool,
) -> Option<u8> {
    let mut sessions = sessions.lock();
    let entry = sessions.get_mut(id)?;
    if entry.epoch != epoch
        || !matches!(
            entry.status,
            SessionStatus::Checking | SessionStatus::Downloading
        )
    {
        return None;
    }
    let value = value.min(100);
    if real {
        entry.real_progress = Some(entry.real_progress.map_or(value, |prior| prior.max(value)));
    }
    if value <= entry.progress {
        return None;
    }
    entry.progress = value;
    Some(value)
}

fn deliver(on_progress: &Option<ProgressFn>, percent: u8, phase: Option<String>) {
    if let Some(callback) = on_progress {
        callback(ProgressUpdate { percent, phase });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChannelConfig;
    use crate::server::{AcceptReply, ExistsReply, ProgressReply};
    use crate::test_support::FakeServer;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn manager_with<AD: SourceAdapter>(
        adapter: AD,
        server: Arc<FakeServer>,
    ) -> Arc<SessionManager<AD>> {
        let channel_config = ChannelConfig {
            enable_push: false,
            ws_url: None,
            ..ChannelConfig::default()
        };
        let channel = Arc::new(ProgressChannel::new(server.clone(), channel_config));
        Arc::new(SessionManager::new(
            adapter,
            server,
            channel,
            SessionConfig::default(),
        ))
    }

    const YT_URL: &str = "https://youtu.be/dQw4w9WgXcQ";

    #[tokio::test]
    async fn existing_server_artifact_completes_without_downloading() {
        let server = Arc::new(FakeServer::new());
        server.push_exists(ExistsReply {
            exists: true,
            url: Some("/videos/dQw4w9WgXcQ.mp4".into()),
        });
        let manager = manager_with(YouTubeAdapter, server.clone());

        let outcome = manager
            .start_download(YT_URL, None, DownloadOptions::default())
            .await
            .unwrap();

        assert_eq!(outcome.id, "dQw4w9WgXcQ");
        assert_eq!(outcome.server_path(), Some("/videos/dQw4w9WgXcQ.mp4"));
        assert_eq!(server.download_calls.load(Ordering::Relaxed), 0);
        let status = manager.check_status("dQw4w9WgXcQ");
        assert_eq!(status.status, SessionStatus::Completed);
        assert_eq!(status.progress, 100);
    }

    #[tokio::test]
    async fn second_call_reuses_the_completed_session() {
        let server = Arc::new(FakeServer::new());
        let manager = manager_with(YouTubeAdapter, server.clone());

        let first = manager
            .start_download(YT_URL, None, DownloadOptions::default())
            .await
            .unwrap();
        assert_eq!(server.download_calls.load(Ordering::Relaxed), 1);

        let second = manager
            .start_download(YT_URL, None, DownloadOptions::default())
            .await
            .unwrap();

        // No second server download request was issued.
        assert_eq!(server.download_calls.load(Ordering::Relaxed), 1);
        assert_eq!(first.server_path(), second.server_path());
    }

    #[tokio::test]
    async fn force_refresh_discards_the_cached_session() {
        let server = Arc::new(FakeServer::new());
        let manager = manager_with(YouTubeAdapter, server.clone());

        manager
            .start_download(YT_URL, None, DownloadOptions::default())
            .await
            .unwrap();
        manager
            .start_download(
                YT_URL,
                None,
                DownloadOptions {
                    force_refresh: true,
                    ..DownloadOptions::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(server.download_calls.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn cancel_resets_progress_and_settles_every_waiter() {
        let server = Arc::new(FakeServer::new());
        server.hang_downloads.store(true, Ordering::Relaxed);
        let manager = manager_with(YouTubeAdapter, server.clone());

        let driver = {
            let manager = manager.clone();
            tokio::spawn(async move {
                manager
                    .start_download(YT_URL, None, DownloadOptions::default())
                    .await
            })
        };
        // Let the driver reach the in-flight state before joining it.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let waiter = {
            let manager = manager.clone();
            tokio::spawn(async move {
                manager
                    .start_download(YT_URL, None, DownloadOptions::default())
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        manager.cancel("dQw4w9WgXcQ").await;

        let status = manager.check_status("dQw4w9WgXcQ");
        assert_eq!(status.status, SessionStatus::Cancelled);
        assert_eq!(status.progress, 0);

        let driver_result = driver.await.unwrap();
        let waiter_result = waiter.await.unwrap();
        assert!(matches!(driver_result, Err(EngineError::Cancelled)));
        assert!(matches!(waiter_result, Err(EngineError::Cancelled)));
        assert!(server.cancel_calls.load(Ordering::Relaxed) >= 1);
    }

    #[tokio::test]
    async fn cancelled_sessions_can_be_recreated() {
        let server = Arc::new(FakeServer::new());
        let manager = manager_with(YouTubeAdapter, server.clone());

        manager.cancel("nonexistent").await;

        // A fresh request after cancellation starts a brand new session.
        let outcome = manager
            .start_download(YT_URL, None, DownloadOptions::default())
            .await
            .unwrap();
        manager.cancel(&outcome.id).await;
        assert_eq!(
            manager.check_status(&outcome.id).status,
            SessionStatus::Cancelled
        );

        manager
            .start_download(YT_URL, None, DownloadOptions::default())
            .await
            .unwrap();
        assert_eq!(
            manager.check_status(&outcome.id).status,
            SessionStatus::Completed
        );
    }

    #[tokio::test(start_paused = true)]
    async fn progress_is_monotonically_non_decreasing() {
        let server = Arc::new(FakeServer::new());
        // Out-of-order transport values: the 10 must be suppressed.
        for (progress, status) in [
            (Some(40), "downloading"),
            (Some(10), "downloading"),
            (Some(75), "downloading"),
            (Some(100), "completed"),
        ] {
            server.push_progress(ProgressReply {
                success: true,
                progress,
                status: status.into(),
                error: None,
            });
        }
        let manager = manager_with(GenericAdapter, server.clone());

        let recorded = Arc::new(Mutex::new(Vec::new()));
        let sink = recorded.clone();
        let on_progress: ProgressFn = Arc::new(move |update| {
            sink.lock().push(update.percent);
        });

        let outcome = manager
            .start_download(
                "https://example.com/clips/1",
                Some(on_progress),
                DownloadOptions {
                    stable_id: Some("site-test-1".into()),
                    ..DownloadOptions::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome.server_path(), Some("/videos/site-test-1.mp4"));
        assert_eq!(server.generic_calls.load(Ordering::Relaxed), 1);

        let values = recorded.lock().clone();
        assert!(!values.is_empty());
        assert!(
            values.windows(2).all(|pair| pair[0] <= pair[1]),
            "progress went backwards: {values:?}"
        );
        assert_eq!(*values.last().unwrap(), 100);
        assert_eq!(manager.check_status("site-test-1").progress, 100);
    }

    #[tokio::test(start_paused = true)]
    async fn server_rejection_becomes_a_terminal_error() {
        let server = Arc::new(FakeServer::new());
        server.set_generic_accept(AcceptReply {
            success: false,
            error: Some("yt-dlp exploded".into()),
        });
        let manager = manager_with(GenericAdapter, server.clone());

        let result = manager
            .start_download(
                "https://example.com/clips/1",
                None,
                DownloadOptions {
                    stable_id: Some("site-test-2".into()),
                    ..DownloadOptions::default()
                },
            )
            .await;

        let err = result.unwrap_err();
        assert!(err.to_string().contains("yt-dlp exploded"));
        let status = manager.check_status("site-test-2");
        assert_eq!(status.status, SessionStatus::Error);
        assert!(status.error.unwrap().contains("yt-dlp exploded"));

        // An errored session is replaced on the next request.
        server.set_generic_accept(AcceptReply {
            success: true,
            error: None,
        });
        server.push_progress(ProgressReply {
            success: true,
            progress: Some(100),
            status: "completed".into(),
            error: None,
        });
        let retried = manager
            .start_download(
                "https://example.com/clips/1",
                None,
                DownloadOptions {
                    stable_id: Some("site-test-2".into()),
                    ..DownloadOptions::default()
                },
            )
            .await;
        assert!(retried.is_ok());
    }

    #[tokio::test]
    async fn invalid_urls_are_rejected_without_a_session() {
        let server = Arc::new(FakeServer::new());
        let manager = manager_with(YouTubeAdapter, server);

        let result = manager
            .start_download("https://example.com/not-youtube", None, DownloadOptions::default())
            .await;
        assert!(matches!(result, Err(EngineError::InvalidUrl { .. })));
    }

    #[tokio::test]
    async fn unknown_sessions_report_the_default_checking_shape() {
        let server = Arc::new(FakeServer::new());
        let manager = manager_with(YouTubeAdapter, server);

        let status = manager.check_status("never-seen");
        assert_eq!(status.status, SessionStatus::Checking);
        assert_eq!(status.progress, 0);
        assert!(status.url.is_none());
        assert!(status.error.is_none());
    }
}
