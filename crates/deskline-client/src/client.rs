//! Client state machine.
//!
//! The `Client` is the top-level state machine that multiplexes a roster of
//! support sessions over one gateway connection. It is a pure state machine:
//! time comes in through [`ClientEvent::Tick`], wire pushes through
//! [`ClientEvent::Wire`], and every output is either a returned
//! [`ClientAction`] or a change to the observable snapshot.
//!
//! # Routing invariant
//!
//! The visible message buffer only ever holds messages of the currently
//! active session. Incoming pushes are classified against the active marker
//! at processing time (never against a value captured earlier), switches
//! clear the buffer synchronously, and stale log snapshots are discarded by
//! an id match guard rather than cancelled at the transport level.

use std::{collections::BTreeSet, ops::Sub, time::Duration};

use deskline_proto::{
    DeliveryStatus, Inbound, Message, MessageId, Outbound, Sender, Session, SessionId,
    SessionStatus,
};

use crate::{
    config::ClientConfig,
    event::{ClientAction, ClientEvent, Notification},
};

/// Error shown when the client is constructed without a credential.
const ERR_MISSING_CREDENTIAL: &str = "missing credential: chat gateway unavailable";

/// Error shown when an outbound action requires connectivity.
const ERR_NOT_CONNECTED: &str = "not connected to the chat gateway";

/// Error shown when a reply is empty after trimming.
const ERR_EMPTY_MESSAGE: &str = "cannot send an empty message";

/// Error shown when a reply targets an ended session.
const ERR_SESSION_CLOSED: &str = "session has ended and accepts no replies";

/// High-level connectivity, as shown to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// No connection and none in progress.
    Disconnected,
    /// Initial connection attempt in progress.
    Connecting,
    /// Connected and authenticated.
    Connected,
    /// Connection lost; the transport is redialing.
    Reconnecting,
}

/// An in-flight log fetch, tracked for the soft timeout.
///
/// `since` is armed lazily by the first tick after the join, so the state
/// machine never has to read a clock of its own.
#[derive(Debug, Clone, Copy)]
struct PendingFetch<I> {
    session_id: SessionId,
    since: Option<I>,
}

/// Session-multiplexed messaging client.
///
/// One instance per mounted UI. Generic over the instant type to support
/// both production (`std::time::Instant`) and deterministic test clocks.
#[derive(Debug, Clone)]
pub struct Client<I = std::time::Instant>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    /// Configuration (credential, timeouts).
    config: ClientConfig,
    /// Connectivity as shown to the operator.
    status: ConnectionStatus,
    /// Single nullable error surface. `None` when healthy.
    error: Option<String>,
    /// Roster of known sessions, newest first.
    sessions: Vec<Session>,
    /// Sessions with messages the operator has not looked at.
    unread: BTreeSet<SessionId>,
    /// The one session whose log is mirrored in `messages`.
    active_session: Option<SessionId>,
    /// Visible log of the active session. Transient: reset on every switch.
    messages: Vec<Message>,
    /// Roster fetch in flight.
    loading_sessions: bool,
    /// Log fetch in flight.
    loading_messages: bool,
    /// Soft-timeout bookkeeping for the current log fetch.
    pending_fetch: Option<PendingFetch<I>>,
    /// The one-shot roster auto-fetch has fired.
    roster_fetched: bool,
    /// Next id for locally synthesized notices. Counts down from -1 so it
    /// can never collide with server-assigned (positive) message ids.
    next_notice_id: MessageId,
    /// Most recent tick, used to arm fetch timers.
    last_tick: Option<I>,
}

impl<I> Client<I>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    /// Create a new client.
    ///
    /// Without a credential the client starts in a terminal error state and
    /// never asks for a connection; the feature is unusable until re-auth.
    pub fn new(config: ClientConfig) -> Self {
        let (status, error) = if config.has_credential() {
            (ConnectionStatus::Connecting, None)
        } else {
            (ConnectionStatus::Disconnected, Some(ERR_MISSING_CREDENTIAL.to_owned()))
        };

        Self {
            config,
            status,
            error,
            sessions: Vec::new(),
            unread: BTreeSet::new(),
            active_session: None,
            messages: Vec::new(),
            loading_sessions: false,
            loading_messages: false,
            pending_fetch: None,
            roster_fetched: false,
            next_notice_id: -1,
            last_tick: None,
        }
    }

    /// Process an event and return resulting actions.
    pub fn handle(&mut self, event: ClientEvent<I>) -> Vec<ClientAction> {
        match event {
            ClientEvent::Connected => self.handle_connected(),
            ClientEvent::Reconnected => {
                self.status = ConnectionStatus::Connected;
                self.error = None;
                // No automatic re-join or roster re-fetch: state resumes from
                // the last pull until the operator asks again.
                vec![]
            },
            ClientEvent::Disconnected { server_initiated } => {
                self.handle_disconnected(server_initiated)
            },
            ClientEvent::ConnectFailed { reason } => {
                self.status = ConnectionStatus::Disconnected;
                self.error = Some(reason);
                vec![]
            },
            ClientEvent::ReconnectFailed { reason, attempts_exhausted } => {
                self.status = if attempts_exhausted {
                    ConnectionStatus::Disconnected
                } else {
                    ConnectionStatus::Reconnecting
                };
                self.error = Some(reason);
                vec![]
            },
            ClientEvent::Wire(inbound) => self.handle_wire(inbound),
            ClientEvent::FetchSessions => self.handle_fetch_sessions(),
            ClientEvent::JoinSession { session_id } => self.handle_join_session(session_id),
            ClientEvent::SendMessage { session_id, text } => {
                self.handle_send_message(session_id, &text)
            },
            ClientEvent::Tick { now } => self.handle_tick(now),
        }
    }

    fn handle_connected(&mut self) -> Vec<ClientAction> {
        self.status = ConnectionStatus::Connected;
        self.error = None;

        // Exactly one roster fetch per mount, on the initial connect only.
        if self.config.has_credential() && !self.roster_fetched {
            self.roster_fetched = true;
            self.loading_sessions = true;
            return vec![ClientAction::Send(Outbound::GetAllSessions)];
        }
        vec![]
    }

    fn handle_disconnected(&mut self, server_initiated: bool) -> Vec<ClientAction> {
        self.status = ConnectionStatus::Reconnecting;
        if server_initiated {
            tracing::warn!("gateway closed the connection; requesting immediate redial");
            return vec![ClientAction::Reconnect];
        }
        vec![]
    }

    fn handle_fetch_sessions(&mut self) -> Vec<ClientAction> {
        if !self.is_connected() {
            // Transient faults during reconnect windows must not alarm the
            // operator: skip silently, without touching the error surface.
            tracing::debug!("roster fetch skipped while disconnected");
            return vec![];
        }
        self.loading_sessions = true;
        vec![ClientAction::Send(Outbound::GetAllSessions)]
    }

    fn handle_join_session(&mut self, session_id: SessionId) -> Vec<ClientAction> {
        if !self.is_connected() {
            tracing::debug!(session_id, "join skipped while disconnected");
            return vec![];
        }
        if self.active_session == Some(session_id) {
            // Idempotent re-join: a populated buffer must not be clobbered.
            return vec![];
        }

        // The marker moves synchronously, before any response arrives, so
        // pushes racing with the in-flight fetch classify against the new id
        // and the previous session's content never flashes.
        self.active_session = Some(session_id);
        self.messages.clear();
        self.loading_messages = true;
        self.unread.remove(&session_id);
        self.pending_fetch = Some(PendingFetch { session_id, since: self.last_tick });

        vec![ClientAction::Send(Outbound::GetMessages { session_id })]
    }

    fn handle_send_message(&mut self, session_id: SessionId, text: &str) -> Vec<ClientAction> {
        if !self.is_connected() {
            tracing::warn!(session_id, "reply rejected: not connected");
            self.error = Some(ERR_NOT_CONNECTED.to_owned());
            return vec![];
        }

        let trimmed = text.trim();
        if trimmed.is_empty() {
            tracing::warn!(session_id, "reply rejected: empty after trimming");
            self.error = Some(ERR_EMPTY_MESSAGE.to_owned());
            return vec![];
        }

        let closed = self
            .sessions
            .iter()
            .any(|s| s.id == session_id && s.status == SessionStatus::Closed);
        if closed {
            tracing::warn!(session_id, "reply rejected: session is closed");
            self.error = Some(ERR_SESSION_CLOSED.to_owned());
            return vec![];
        }

        // No optimistic append: the reply shows up through the live-append
        // path when the gateway echoes it, keeping one source of truth for
        // ordering.
        vec![ClientAction::Send(Outbound::ReplyMessage {
            session_id,
            message: trimmed.to_owned(),
        })]
    }

    fn handle_wire(&mut self, inbound: Inbound) -> Vec<ClientAction> {
        match inbound {
            Inbound::AllSessions(roster) => {
                self.sessions = roster;
                self.loading_sessions = false;
                let sessions = &self.sessions;
                self.unread.retain(|id| sessions.iter().any(|s| s.id == *id));
                vec![]
            },
            Inbound::Messages(log) => self.handle_log_snapshot(log),
            Inbound::NewMessage(message) => self.handle_new_message(message),
            Inbound::NewSession(update) => {
                let session: Session = update.into();
                match self.sessions.iter().position(|s| s.id == session.id) {
                    Some(index) => self.sessions[index] = session,
                    None => self.sessions.insert(0, session),
                }
                vec![]
            },
            Inbound::SessionEnded { session_id, message } => {
                self.handle_session_ended(session_id, message)
            },
            Inbound::SessionError { message } => {
                // Non-fatal: the connection stays up.
                self.error = Some(message);
                vec![]
            },
        }
    }

    fn handle_log_snapshot(&mut self, log: Vec<Message>) -> Vec<ClientAction> {
        let pending_id = self.pending_fetch.map(|p| p.session_id);
        // The wire payload is a bare array; an empty log cannot identify
        // itself and resolves against the fetch that is in flight.
        let log_id = log.first().map(|m| m.session_id).or(pending_id);

        // Loading always clears, matched or not: a stale response must not
        // leave the operator staring at a spinner.
        self.loading_messages = false;
        if log_id.is_some() && log_id == pending_id {
            self.pending_fetch = None;
        }

        if log_id.is_some() && log_id == self.active_session {
            self.messages = log;
        } else {
            tracing::warn!(
                ?log_id,
                active = ?self.active_session,
                "discarding log snapshot for a session no longer active"
            );
        }
        vec![]
    }

    fn handle_new_message(&mut self, message: Message) -> Vec<ClientAction> {
        if self.active_session == Some(message.session_id) {
            // Arrival order preserved; no reordering, no dedup (ids are
            // unique from the gateway).
            self.messages.push(message);
            return vec![];
        }

        match self.sessions.iter().find(|s| s.id == message.session_id) {
            Some(session) => {
                self.unread.insert(message.session_id);
                vec![ClientAction::Notify(Notification {
                    session_id: message.session_id,
                    guest_name: session.guest_name.clone(),
                    body: message.body,
                })]
            },
            None => {
                // Race with a not-yet-fetched roster: better no notification
                // than a malformed one.
                tracing::warn!(
                    session_id = message.session_id,
                    "dropping notification for a session missing from the roster"
                );
                vec![]
            },
        }
    }

    fn handle_session_ended(
        &mut self,
        session_id: SessionId,
        message: String,
    ) -> Vec<ClientAction> {
        if let Some(session) = self.sessions.iter_mut().find(|s| s.id == session_id) {
            // Closed sessions stay in the roster as history.
            session.status = SessionStatus::Closed;
        }

        if self.active_session == Some(session_id) {
            let notice = self.synthesize_notice(session_id, message);
            self.messages.push(notice);
        }
        vec![]
    }

    /// Build the locally synthesized notice appended when the active session
    /// ends. It never came from the wire log, so it reuses the latest known
    /// timestamp to keep the visible log monotone without reading a clock.
    fn synthesize_notice(&mut self, session_id: SessionId, body: String) -> Message {
        let created_at = self
            .messages
            .last()
            .map(|m| m.created_at)
            .or_else(|| {
                self.sessions
                    .iter()
                    .find(|s| s.id == session_id)
                    .map(|s| s.updated_at.unwrap_or(s.created_at))
            })
            .unwrap_or(chrono::DateTime::UNIX_EPOCH);

        let id = self.next_notice_id;
        self.next_notice_id -= 1;

        Message {
            id,
            session_id,
            sender: Sender::System,
            sender_id: None,
            body,
            status: DeliveryStatus::default(),
            created_at,
        }
    }

    fn handle_tick(&mut self, now: I) -> Vec<ClientAction> {
        self.last_tick = Some(now);

        let expired = match &mut self.pending_fetch {
            Some(pending) => match pending.since {
                // Timer arms on the first tick after the join.
                None => {
                    pending.since = Some(now);
                    false
                },
                Some(started) => now - started >= self.config.message_fetch_timeout,
            },
            None => false,
        };

        if expired {
            if let Some(pending) = self.pending_fetch.take() {
                tracing::warn!(
                    session_id = pending.session_id,
                    "log fetch timed out; releasing the loading flag"
                );
            }
            // Soft timeout: no retry, no error, just no stuck spinner.
            self.loading_messages = false;
        }
        vec![]
    }

    /// Connectivity as shown to the operator.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// True only while connected and authenticated.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    /// Current error, if any. `None` while healthy.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Roster snapshot, newest first.
    #[must_use]
    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    /// The session whose log is currently mirrored. `None` before any join.
    #[must_use]
    pub fn active_session(&self) -> Option<SessionId> {
        self.active_session
    }

    /// Visible log of the active session.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Roster fetch in flight.
    #[must_use]
    pub fn is_loading_sessions(&self) -> bool {
        self.loading_sessions
    }

    /// Log fetch in flight.
    #[must_use]
    pub fn is_loading_messages(&self) -> bool {
        self.loading_messages
    }

    /// Whether a session has messages the operator has not looked at.
    #[must_use]
    pub fn unread(&self, session_id: SessionId) -> bool {
        self.unread.contains(&session_id)
    }

    /// The configuration this client was built with.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}
