//! Gateway transport for the client.
//!
//! Provides [`ConnectedGateway`] which handles the I/O for one gateway
//! connection. This is a thin layer that dials, frames, and redials;
//! protocol decisions stay in the Sans-IO [`Client`](crate::Client).
//!
//! The websocket transport is tried first; where websockets are blocked the
//! HTTP long-poll fallback takes over. After a connection loss the supervisor
//! redials the same flavor a bounded number of times with a fixed delay
//! between attempts, emitting lifecycle events the state machine turns into
//! operator-visible status.

use std::sync::Arc;

use deskline_proto::{Inbound, Outbound};
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::{mpsc, Notify};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message as WsMessage};

use crate::{ClientConfig, ClientEvent, TransportKind};

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Unusable configuration: missing credential, bad gateway URL, no
    /// transports. Fatal to the feature; never retried.
    #[error("configuration error: {0}")]
    Config(String),

    /// Dialing the gateway failed on every configured transport.
    #[error("connection failed: {0}")]
    Connection(String),
}

/// Owned handle to a live gateway connection.
///
/// Explicitly constructor-injected rather than a process-wide singleton, so
/// isolated instances can coexist (tests, multiple mounts). Wire traffic
/// flows through the channels; an internal task owns the socket.
pub struct ConnectedGateway {
    /// Send events to the gateway.
    pub to_server: mpsc::Sender<Outbound>,
    /// Lifecycle transitions and decoded wire pushes, in arrival order.
    pub events: mpsc::Receiver<ClientEvent>,
    /// Wakes the reconnect supervisor out of its retry delay.
    reconnect_nudge: Arc<Notify>,
    /// Abort handle to stop the connection task.
    abort_handle: tokio::task::AbortHandle,
}

impl ConnectedGateway {
    /// Redial now instead of waiting out the current retry delay.
    ///
    /// Issued by the caller when the state machine returns
    /// [`ClientAction::Reconnect`](crate::ClientAction::Reconnect).
    pub fn nudge_reconnect(&self) {
        self.reconnect_nudge.notify_one();
    }

    /// Stop the connection. Idempotent.
    pub fn stop(&self) {
        self.abort_handle.abort();
    }
}

/// Dial the gateway and spawn the connection task.
///
/// Transports are tried in the configured order; the first that answers wins
/// and later disconnects are redialed with that same flavor.
///
/// # Errors
///
/// - [`TransportError::Config`] for an empty credential, a non-http(s)
///   gateway URL, or an empty transport list (fail fast, nothing spawned)
/// - [`TransportError::Connection`] if every configured transport fails to
///   dial
pub async fn connect(config: ClientConfig) -> Result<ConnectedGateway, TransportError> {
    if !config.has_credential() {
        return Err(TransportError::Config("missing credential".to_owned()));
    }
    if config.transports.is_empty() {
        return Err(TransportError::Config("no transports configured".to_owned()));
    }
    // Validate the address shape before any I/O.
    base_url(&config)?;

    let (link, kind) = dial(&config).await?;

    let (out_tx, out_rx) = mpsc::channel::<Outbound>(64);
    let (evt_tx, evt_rx) = mpsc::channel::<ClientEvent>(256);
    let nudge = Arc::new(Notify::new());

    let task = tokio::spawn(run_gateway(config, link, kind, out_rx, evt_tx, Arc::clone(&nudge)));

    Ok(ConnectedGateway {
        to_server: out_tx,
        events: evt_rx,
        reconnect_nudge: nudge,
        abort_handle: task.abort_handle(),
    })
}

/// One live connection, either flavor.
enum Link {
    WebSocket(WsStream),
    LongPoll(PollLink),
}

/// HTTP long-poll connection state.
struct PollLink {
    http: reqwest::Client,
    events_url: String,
    emit_url: String,
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Why a link stopped serving.
enum LinkOutcome {
    /// The connection dropped; `server_initiated` when the gateway closed it.
    Closed { server_initiated: bool },
    /// The caller dropped its handle; shut down for good.
    CallerGone,
}

/// Gateway base address with a validated http(s) scheme.
fn base_url(config: &ClientConfig) -> Result<String, TransportError> {
    let base = config.gateway_url.trim_end_matches('/');
    if base.starts_with("http://") || base.starts_with("https://") {
        Ok(base.to_owned())
    } else {
        Err(TransportError::Config(format!("invalid gateway URL scheme: {base}")))
    }
}

/// Websocket endpoint with the credential as a query parameter.
fn websocket_url(config: &ClientConfig) -> Result<String, TransportError> {
    let base = base_url(config)?;
    let ws_base = if base.starts_with("https://") {
        base.replacen("https://", "wss://", 1)
    } else {
        base.replacen("http://", "ws://", 1)
    };
    Ok(format!("{ws_base}/ws?token={}", config.credential))
}

/// Long-poll read endpoint.
fn events_url(config: &ClientConfig) -> Result<String, TransportError> {
    Ok(format!("{}/events?token={}", base_url(config)?, config.credential))
}

/// Long-poll write endpoint.
fn emit_url(config: &ClientConfig) -> Result<String, TransportError> {
    Ok(format!("{}/emit?token={}", base_url(config)?, config.credential))
}

/// Try each configured transport in order.
async fn dial(config: &ClientConfig) -> Result<(Link, TransportKind), TransportError> {
    let mut last_error = None;

    for kind in &config.transports {
        match dial_kind(config, *kind).await {
            Ok(link) => {
                tracing::info!(?kind, "connected to gateway");
                return Ok((link, *kind));
            },
            Err(e) => {
                tracing::warn!(?kind, error = %e, "dial failed");
                last_error = Some(e);
            },
        }
    }

    Err(last_error
        .unwrap_or_else(|| TransportError::Config("no transports configured".to_owned())))
}

/// Dial one specific transport flavor.
async fn dial_kind(config: &ClientConfig, kind: TransportKind) -> Result<Link, TransportError> {
    match kind {
        TransportKind::WebSocket => {
            let url = websocket_url(config)?;
            let (stream, _response) = connect_async(&url)
                .await
                .map_err(|e| TransportError::Connection(format!("websocket dial failed: {e}")))?;
            Ok(Link::WebSocket(stream))
        },
        TransportKind::LongPoll => {
            let link = PollLink {
                http: reqwest::Client::builder().build().map_err(|e| {
                    TransportError::Connection(format!("http client init failed: {e}"))
                })?,
                events_url: events_url(config)?,
                emit_url: emit_url(config)?,
            };

            // Zero-wait probe so an unreachable fallback fails at dial time,
            // not on the first real poll.
            link.http
                .get(format!("{}&wait=0", link.events_url))
                .send()
                .await
                .and_then(reqwest::Response::error_for_status)
                .map_err(|e| TransportError::Connection(format!("long-poll probe failed: {e}")))?;

            Ok(Link::LongPoll(link))
        },
    }
}

/// Connection task: serve the link, redial on loss, forward lifecycle events.
async fn run_gateway(
    config: ClientConfig,
    mut link: Link,
    kind: TransportKind,
    mut out_rx: mpsc::Receiver<Outbound>,
    evt_tx: mpsc::Sender<ClientEvent>,
    nudge: Arc<Notify>,
) {
    if evt_tx.send(ClientEvent::Connected).await.is_err() {
        return;
    }

    loop {
        let outcome = match link {
            Link::WebSocket(stream) => run_websocket(stream, &mut out_rx, &evt_tx).await,
            Link::LongPoll(poll) => run_long_poll(poll, &mut out_rx, &evt_tx).await,
        };

        let server_initiated = match outcome {
            LinkOutcome::CallerGone => return,
            LinkOutcome::Closed { server_initiated } => server_initiated,
        };

        if evt_tx.send(ClientEvent::Disconnected { server_initiated }).await.is_err() {
            return;
        }

        link = match redial(&config, kind, &evt_tx, &nudge).await {
            Some(next) => next,
            None => return,
        };

        if evt_tx.send(ClientEvent::Reconnected).await.is_err() {
            return;
        }
    }
}

/// Bounded fixed-delay redial loop.
///
/// Emits one `ReconnectFailed` per failed attempt; `None` means the
/// supervisor gave up (or the caller went away) and the task should end.
async fn redial(
    config: &ClientConfig,
    kind: TransportKind,
    evt_tx: &mpsc::Sender<ClientEvent>,
    nudge: &Notify,
) -> Option<Link> {
    if config.reconnect_attempts == 0 {
        let _ = evt_tx
            .send(ClientEvent::ReconnectFailed {
                reason: "reconnection disabled".to_owned(),
                attempts_exhausted: true,
            })
            .await;
        return None;
    }

    for attempt in 1..=config.reconnect_attempts {
        tokio::select! {
            () = tokio::time::sleep(config.reconnect_delay) => {},
            () = nudge.notified() => {
                tracing::info!("redial requested; skipping the retry delay");
            },
        }

        match dial_kind(config, kind).await {
            Ok(link) => {
                tracing::info!(attempt, "reconnected to gateway");
                return Some(link);
            },
            Err(e) => {
                let attempts_exhausted = attempt == config.reconnect_attempts;
                tracing::warn!(attempt, error = %e, "reconnect attempt failed");
                let event = ClientEvent::ReconnectFailed {
                    reason: e.to_string(),
                    attempts_exhausted,
                };
                if evt_tx.send(event).await.is_err() {
                    return None;
                }
            },
        }
    }
    None
}

/// Serve a websocket link until it drops or the caller goes away.
async fn run_websocket(
    stream: WsStream,
    out_rx: &mut mpsc::Receiver<Outbound>,
    evt_tx: &mpsc::Sender<ClientEvent>,
) -> LinkOutcome {
    let (mut sink, mut reader) = stream.split();

    loop {
        tokio::select! {
            outbound = out_rx.recv() => match outbound {
                Some(event) => {
                    let text = match event.encode() {
                        Ok(text) => text,
                        Err(e) => {
                            tracing::warn!(error = %e, "dropping unencodable event");
                            continue;
                        },
                    };
                    if let Err(e) = sink.send(WsMessage::Text(text.into())).await {
                        tracing::warn!(error = %e, "websocket send failed");
                        return LinkOutcome::Closed { server_initiated: false };
                    }
                },
                None => return LinkOutcome::CallerGone,
            },
            incoming = reader.next() => match incoming {
                Some(Ok(WsMessage::Text(text))) => match Inbound::decode(&text) {
                    Ok(inbound) => {
                        if evt_tx.send(ClientEvent::Wire(inbound)).await.is_err() {
                            return LinkOutcome::CallerGone;
                        }
                    },
                    // Malformed frames are skipped, never fatal.
                    Err(e) => tracing::warn!(error = %e, "skipping malformed frame"),
                },
                Some(Ok(WsMessage::Close(_))) => {
                    return LinkOutcome::Closed { server_initiated: true };
                },
                Some(Ok(_)) => {}, // ping/pong/binary
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "websocket read failed");
                    return LinkOutcome::Closed { server_initiated: false };
                },
                None => return LinkOutcome::Closed { server_initiated: false },
            },
        }
    }
}

/// Serve a long-poll link until it drops or the caller goes away.
async fn run_long_poll(
    link: PollLink,
    out_rx: &mut mpsc::Receiver<Outbound>,
    evt_tx: &mpsc::Sender<ClientEvent>,
) -> LinkOutcome {
    let mut poll = Box::pin(fetch_events(link.http.clone(), link.events_url.clone()));

    loop {
        tokio::select! {
            outbound = out_rx.recv() => match outbound {
                Some(event) => {
                    let result = link
                        .http
                        .post(&link.emit_url)
                        .json(&event)
                        .send()
                        .await
                        .and_then(|r| r.error_for_status());
                    if let Err(e) = result {
                        tracing::warn!(error = %e, "long-poll emit failed");
                        return LinkOutcome::Closed { server_initiated: false };
                    }
                },
                None => return LinkOutcome::CallerGone,
            },
            events = &mut poll => {
                match events {
                    Ok(batch) => {
                        for inbound in batch {
                            if evt_tx.send(ClientEvent::Wire(inbound)).await.is_err() {
                                return LinkOutcome::CallerGone;
                            }
                        }
                    },
                    Err(e) => {
                        tracing::warn!(error = %e, "long-poll read failed");
                        return LinkOutcome::Closed { server_initiated: false };
                    },
                }
                poll = Box::pin(fetch_events(link.http.clone(), link.events_url.clone()));
            },
        }
    }
}

/// One long-poll read: blocks server-side until events arrive or the wait
/// window lapses, then returns the batch.
async fn fetch_events(
    http: reqwest::Client,
    events_url: String,
) -> Result<Vec<Inbound>, reqwest::Error> {
    let response = http.get(format!("{events_url}&wait=25")).send().await?.error_for_status()?;
    response.json::<Vec<Inbound>>().await
}
