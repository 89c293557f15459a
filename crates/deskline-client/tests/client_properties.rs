//! Property-based tests for the client state machine.
//!
//! Tests verify that routing invariants hold under arbitrary event sequences.
//! This ensures behavioral correctness across all possible interleavings of
//! joins, pushes, snapshots, and ticks.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use deskline_client::{Client, ClientConfig, ClientEvent, Inbound};
use deskline_proto::{DeliveryStatus, Message, Sender, Session, SessionStatus, SessionUpdate};
use proptest::prelude::*;

fn timestamp() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-03-01T09:30:00Z")
        .map(|t| t.with_timezone(&Utc))
        .unwrap()
}

fn session(id: i64, name: &str) -> Session {
    Session {
        id,
        guest_name: name.into(),
        status: SessionStatus::Open,
        session_key: None,
        customer_id: None,
        created_at: timestamp(),
        updated_at: None,
    }
}

fn message(id: i64, session_id: i64) -> Message {
    Message {
        id,
        session_id,
        sender: Sender::Customer,
        sender_id: None,
        body: format!("message {id}"),
        status: DeliveryStatus::Sent,
        created_at: timestamp(),
    }
}

/// Connected client with sessions 1 and 2 in the roster.
fn seeded_client() -> Client<Instant> {
    let mut client = Client::new(ClientConfig::new("http://gateway.local", "token"));
    let _ = client.handle(ClientEvent::Connected);
    let _ = client.handle(ClientEvent::Wire(Inbound::AllSessions(vec![
        session(1, "Alice"),
        session(2, "Bob"),
    ])));
    client
}

/// Generate joins, pushes, log snapshots, lifecycle pushes, and ticks over a
/// small id space, so switches and arrivals genuinely interleave.
fn event_strategy() -> impl Strategy<Value = ClientEvent<Instant>> {
    let base = Instant::now();
    prop_oneof![
        3 => (1i64..=2).prop_map(|id| ClientEvent::JoinSession { session_id: id }),
        4 => (1i64..=3, 1i64..10_000)
            .prop_map(|(sid, id)| ClientEvent::Wire(Inbound::NewMessage(message(id, sid)))),
        2 => (1i64..=2, prop::collection::vec(1i64..10_000, 0..4)).prop_map(|(sid, ids)| {
            let log = ids.into_iter().map(|id| message(id, sid)).collect();
            ClientEvent::Wire(Inbound::Messages(log))
        }),
        1 => (1i64..=2).prop_map(|sid| ClientEvent::Wire(Inbound::SessionEnded {
            session_id: sid,
            message: "Guest left".into(),
        })),
        1 => (0u64..12)
            .prop_map(move |s| ClientEvent::Tick { now: base + Duration::from_secs(s) }),
    ]
}

proptest! {
    /// Session isolation holds under arbitrary event sequences: the visible
    /// buffer never contains a message tagged with anything but the active
    /// session, and is empty while nothing is active.
    #[test]
    fn prop_visible_buffer_is_isolated(events in prop::collection::vec(event_strategy(), 0..60)) {
        let mut client = seeded_client();

        for event in events {
            let _ = client.handle(event.clone());

            match client.active_session() {
                Some(active) => prop_assert!(
                    client.messages().iter().all(|m| m.session_id == active),
                    "foreign message in buffer after {event:?}"
                ),
                None => prop_assert!(client.messages().is_empty()),
            }

            // The active session can never be flagged unread.
            if let Some(active) = client.active_session() {
                prop_assert!(!client.unread(active));
            }
        }
    }

    /// Upserting an existing roster entry replaces it in place without
    /// disturbing the relative order of the others.
    #[test]
    fn prop_upsert_existing_preserves_order(len in 1usize..6, pick in 0usize..6) {
        prop_assume!(pick < len);

        let roster: Vec<Session> =
            (1..=len as i64).map(|id| session(id, &format!("guest {id}"))).collect();
        let mut client = seeded_client();
        let _ = client.handle(ClientEvent::Wire(Inbound::AllSessions(roster)));
        let before: Vec<i64> = client.sessions().iter().map(|s| s.id).collect();

        let target = before[pick];
        let _ = client.handle(ClientEvent::Wire(Inbound::NewSession(SessionUpdate {
            session_id: target,
            customer_id: Some(7),
            guest_name: "renamed".into(),
            status: SessionStatus::Open,
            created_at: timestamp(),
        })));

        let after: Vec<i64> = client.sessions().iter().map(|s| s.id).collect();
        prop_assert_eq!(after, before);
        prop_assert_eq!(client.sessions()[pick].guest_name.as_str(), "renamed");
    }

    /// Upserting an unseen id prepends it and shifts everything else intact.
    #[test]
    fn prop_upsert_unseen_prepends(len in 0usize..6) {
        let roster: Vec<Session> =
            (1..=len as i64).map(|id| session(id, &format!("guest {id}"))).collect();
        let mut client = seeded_client();
        let _ = client.handle(ClientEvent::Wire(Inbound::AllSessions(roster)));
        let before: Vec<i64> = client.sessions().iter().map(|s| s.id).collect();

        let _ = client.handle(ClientEvent::Wire(Inbound::NewSession(SessionUpdate {
            session_id: 100,
            customer_id: None,
            guest_name: "newcomer".into(),
            status: SessionStatus::Open,
            created_at: timestamp(),
        })));

        let after: Vec<i64> = client.sessions().iter().map(|s| s.id).collect();
        prop_assert_eq!(after.first().copied(), Some(100));
        prop_assert_eq!(&after[1..], &before[..]);
    }

    /// Whitespace-only replies never reach the wire, whatever the whitespace.
    #[test]
    fn prop_whitespace_replies_never_emit(text in "[ \t\r\n]{0,8}") {
        let mut client = seeded_client();

        let actions = client.handle(ClientEvent::SendMessage { session_id: 1, text });
        prop_assert!(actions.is_empty());
        prop_assert!(client.error().is_some());
    }
}
