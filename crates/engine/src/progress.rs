//! Progress channel adapter.
//!
//! Abstracts over two transports for per-session download progress: a push
//! channel (persistent websocket subscription) and a fallback pull channel
//! (fixed-interval polling of the status endpoint). Callers see a single
//! subscribe/unsubscribe contract; transport selection and failover happen
//! behind it. At most one callback and one transport are active per session
//! id at any time.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use prep_common::{CancellationToken, RetryAction, retry_with_backoff};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, error, info, warn};

use crate::config::ChannelConfig;
use crate::server::MediaServer;

/// Ceiling on how long the initial push connection attempt may take before
/// the subscription falls back to polling.
const PUSH_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// An observation delivered to a subscription callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Progress { percent: u8, phase: Option<String> },
    Completed { url: Option<String> },
    Failed { error: String },
}

/// Subscription callback. Invoked from transport tasks with no locks held;
/// must not block.
pub type ChannelCallback = Arc<dyn Fn(ChannelEvent) + Send + Sync>;

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ClientFrame<'a> {
    Subscribe {
        #[serde(rename = "videoId")]
        video_id: &'a str,
    },
    Unsubscribe {
        #[serde(rename = "videoId")]
        video_id: &'a str,
    },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ServerFrame {
    Progress {
        #[serde(rename = "videoId")]
        video_id: String,
        #[serde(default)]
        progress: Option<u8>,
        status: String,
        #[serde(default)]
        phase: Option<String>,
        #[serde(default)]
        timestamp: Option<i64>,
    },
    Error {
        #[serde(rename = "videoId")]
        video_id: String,
        error: String,
        #[serde(default)]
        timestamp: Option<i64>,
    },
}

enum Transport {
    Push,
    Poll(JoinHandle<()>),
}

struct Subscription {
    callback: ChannelCallback,
    transport: Transport,
}

impl Subscription {
    fn shutdown(self) {
        if let Transport::Poll(handle) = self.transport {
            handle.abort();
        }
    }
}

struct ChannelInner {
    subs: parking_lot::Mutex<HashMap<String, Subscription>>,
    /// Outbound frame sender for the active push connection, if any.
    writer: tokio::sync::Mutex<Option<mpsc::Sender<Message>>>,
}

/// The progress channel adapter. One instance serves every session of a
/// companion-server instance; the subscription table lives inside it.
pub struct ProgressChannel {
    server: Arc<dyn MediaServer>,
    config: ChannelConfig,
    inner: Arc<ChannelInner>,
}

impl ProgressChannel {
    pub fn new(server: Arc<dyn MediaServer>, config: ChannelConfig) -> Self {
        Self {
            server,
            config,
            inner: Arc::new(ChannelInner {
                subs: parking_lot::Mutex::new(HashMap::new()),
                writer: tokio::sync::Mutex::new(None),
            }),
        }
    }

    /// Register `callback` for progress events of `id`.
    ///
    /// Replaces any prior callback for the same id (and tears down its
    /// transport). Prefers the push channel; falls back to interval polling
    /// when the push connection cannot be established or is disabled.
    pub async fn subscribe(&self, id: &str, callback: ChannelCallback) {
        if let Some(previous) = self.inner.subs.lock().remove(id) {
            debug!(id, "replacing existing progress subscription");
            previous.shutdown();
        }

        if self.config.enable_push
            && self.ensure_push().await
            && self.send_frame(&ClientFrame::Subscribe { video_id: id }).await
        {
            self.inner.subs.lock().insert(
                id.to_string(),
                Subscription {
                    callback,
                    transport: Transport::Push,
                },
            );
            debug!(id, "subscribed via push channel");
            return;
        }

        let handle = self.spawn_poll(id.to_string(), callback.clone());
        self.inner.subs.lock().insert(
            id.to_string(),
            Subscription {
                callback,
                transport: Transport::Poll(handle),
            },
        );
        debug!(id, "subscribed via polling fallback");
    }

    /// Drop the subscription for `id`, if any.
    pub async fn unsubscribe(&self, id: &str) {
        let Some(subscription) = self.inner.subs.lock().remove(id) else {
            return;
        };
        let was_push = matches!(subscription.transport, Transport::Push);
        subscription.shutdown();
        if was_push {
            let _ = self
                .send_frame(&ClientFrame::Unsubscribe { video_id: id })
                .await;
        }
        debug!(id, "unsubscribed");
    }

    /// Number of live subscriptions (for diagnostics and tests).
    pub fn subscription_count(&self) -> usize {
        self.inner.subs.lock().len()
    }

    /// Establish the push connection if it is not already up.
    async fn ensure_push(&self) -> bool {
        let mut writer = self.inner.writer.lock().await;
        if let Some(sender) = writer.as_ref()
            && !sender.is_closed()
        {
            return true;
        }

        let Some(url) = self.config.ws_url.clone() else {
            debug!("push channel unavailable: no websocket URL configured");
            return false;
        };

        let connect = tokio::time::timeout(PUSH_CONNECT_TIMEOUT, connect_async(&url));
        match connect.await {
            Ok(Ok((stream, _))) => {
                info!(url, "push channel connected");
                let (sender, receiver) = mpsc::channel(32);
                self.spawn_push_task(url, stream, receiver);
                *writer = Some(sender);
                true
            }
            Ok(Err(e)) => {
                warn!(error = %e, url, "push channel connect failed; falling back to polling");
                false
            }
            Err(_) => {
                warn!(url, "push channel connect timed out; falling back to polling");
                false
            }
        }
    }

    async fn send_frame(&self, frame: &ClientFrame<'_>) -> bool {
        let text = match serde_json::to_string(frame) {
            Ok(text) => text,
            Err(e) => {
                debug!(error = %e, "failed to encode channel frame");
                return false;
            }
        };
        let writer = self.inner.writer.lock().await;
        match writer.as_ref() {
            Some(sender) => sender.send(Message::text(text)).await.is_ok(),
            None => false,
        }
    }

    /// Background task owning the websocket: forwards outbound frames, reads
    /// and dispatches inbound ones, and reconnects with backoff on unexpected
    /// closure while subscriptions remain.
    fn spawn_push_task(
        &self,
        url: String,
        stream: tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
        >,
        mut outbound: mpsc::Receiver<Message>,
    ) {
        let inner = self.inner.clone();
        let policy = self.config.reconnect.clone();

        tokio::spawn(async move {
            let (mut sink, mut source) = stream.split();

            'connection: loop {
                loop {
                    tokio::select! {
                        frame = outbound.recv() => match frame {
                            Some(message) => {
                                if let Err(e) = sink.send(message).await {
                                    warn!(error = %e, "push channel send failed");
                                    break;
                                }
                            }
                            // All channel handles dropped: shut down cleanly.
                            None => {
                                let _ = sink.close().await;
                                return;
                            }
                        },
                        incoming = source.next() => match incoming {
                            Some(Ok(message)) => dispatch(&inner, message),
                            Some(Err(e)) => {
                                warn!(error = %e, "push channel read error");
                                break;
                            }
                            None => {
                                info!("push channel closed by server");
                                break;
                            }
                        },
                    }
                }

                // Unexpected closure. Reconnect only while someone is listening.
                if inner.subs.lock().is_empty() {
                    break 'connection;
                }

                let token = CancellationToken::new();
                let reconnected = retry_with_backoff(&policy, &token, |attempt| {
                    let url = url.clone();
                    async move {
                        debug!(attempt, "reconnecting push channel");
                        match connect_async(&url).await {
                            Ok((stream, _)) => RetryAction::Success(stream),
                            Err(e) => RetryAction::Retry(e),
                        }
                    }
                })
                .await;

                match reconnected {
                    Ok(stream) => {
                        info!("push channel reconnected");
                        let (new_sink, new_source) = stream.split();
                        sink = new_sink;
                        source = new_source;

                        // Re-announce every push subscription on the new socket.
                        let ids: Vec<String> = inner
                            .subs
                            .lock()
                            .iter()
                            .filter(|(_, sub)| matches!(sub.transport, Transport::Push))
                            .map(|(id, _)| id.clone())
                            .collect();
                        for id in ids {
                            let frame = ClientFrame::Subscribe { video_id: &id };
                            if let Ok(text) = serde_json::to_string(&frame)
                                && let Err(e) = sink.send(Message::text(text)).await
                            {
                                warn!(error = %e, id, "failed to resubscribe after reconnect");
                            }
                        }
                        continue 'connection;
                    }
                    Err(_) => {
                        // Subscriptions stay registered but receive nothing
                        // until a caller resubscribes and re-establishes.
                        error!("push channel reconnect attempts exhausted; subscriptions are idle");
                        break 'connection;
                    }
                }
            }

            *inner.writer.lock().await = None;
        });
    }

    /// Fixed-interval polling task for one session id. Terminates on the
    /// first terminal status, delivering the same callback contract as the
    /// push channel.
    fn spawn_poll(&self, id: String, callback: ChannelCallback) -> JoinHandle<()> {
        let server = self.server.clone();
        let inner = self.inner.clone();
        let interval = self.config.poll_interval;
        let giveup = self.config.poll_giveup;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick fires immediately; consume it so polls start one
            // interval after subscription, like a plain interval timer.
            ticker.tick().await;
            let started = tokio::time::Instant::now();

            loop {
                ticker.tick().await;

                if let Some(limit) = giveup
                    && started.elapsed() >= limit
                {
                    warn!(id, "polling fallback gave up after {:?}", limit);
                    callback(ChannelEvent::Failed {
                        error: "progress polling timed out".to_string(),
                    });
                    break;
                }

                match server.download_only_progress(&id).await {
                    Ok(reply) => {
                        if !reply.success {
                            debug!(id, "progress poll unsuccessful; will retry");
                            continue;
                        }
                        match reply.status.as_str() {
                            "completed" => {
                                callback(ChannelEvent::Completed { url: None });
                                break;
                            }
                            "error" => {
                                callback(ChannelEvent::Failed {
                                    error: reply
                                        .error
                                        .unwrap_or_else(|| "download failed".to_string()),
                                });
                                break;
                            }
                            "cancelled" => break,
                            _ => {
                                if let Some(percent) = reply.progress {
                                    callback(ChannelEvent::Progress {
                                        percent: percent.min(100),
                                        phase: None,
                                    });
                                }
                            }
                        }
                    }
                    // Transient poll failures are absorbed; the next tick retries.
                    Err(e) => debug!(id, error = %e, "progress poll failed"),
                }
            }

            // Self-removal after a terminal status; dropping our own handle
            // here must not abort the running task, so no shutdown() call.
            inner.subs.lock().remove(&id);
        })
    }
}

/// Decode an inbound websocket message and route it to the matching
/// subscription. The subscription lock is released before the callback runs.
fn dispatch(inner: &ChannelInner, message: Message) {
    let Message::Text(text) = message else {
        return;
    };
    let frame: ServerFrame = match serde_json::from_str(text.as_str()) {
        Ok(frame) => frame,
        Err(e) => {
            debug!(error = %e, "ignoring malformed push frame");
            return;
        }
    };

    match frame {
        ServerFrame::Progress {
            video_id,
            progress,
            status,
            phase,
            ..
        } => {
            let callback = inner
                .subs
                .lock()
                .get(&video_id)
                .map(|sub| sub.callback.clone());
            let Some(callback) = callback else {
                return;
            };
            match status.as_str() {
                "completed" => callback(ChannelEvent::Completed { url: None }),
                "error" => callback(ChannelEvent::Failed {
                    error: phase.unwrap_or_else(|| "download failed".to_string()),
                }),
                "cancelled" => {}
                _ => {
                    if let Some(percent) = progress {
                        callback(ChannelEvent::Progress {
                            percent: percent.min(100),
                            phase,
                        });
                    }
                }
            }
        }
        ServerFrame::Error {
            video_id, error, ..
        } => {
            let callback = inner
                .subs
                .lock()
                .get(&video_id)
                .map(|sub| sub.callback.clone());
            if let Some(callback) = callback {
                callback(ChannelEvent::Failed { error });
            }
        }
    }
}
