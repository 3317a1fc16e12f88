//! Fan-out semantics at the registry boundary.
//!
//! An admin broadcast while five distinct users are connected (one of them
//! twice) produces one stored record per distinct user, while the doubly
//! connected user sees the live push once on each session.

use tokio::sync::mpsc;
use uuid::Uuid;

use pulse::dispatch::dedupe_recipients;
use pulse::models::notification::{NewNotification, Notification, NotificationKind, Priority};
use pulse::protocol::ServerEvent;
use pulse::registry::SessionRegistry;

fn sample(recipient: Uuid) -> Notification {
    let payload = NewNotification::new(NotificationKind::SystemAlert, "Maintenance", "Tonight");
    Notification {
        id: Uuid::new_v4(),
        seq: 1,
        recipient_id: recipient,
        kind: payload.kind,
        title: payload.title,
        message: payload.message,
        priority: Priority::High,
        actionable: false,
        action: None,
        link: None,
        metadata: Default::default(),
        read: false,
        read_at: None,
        created_at: chrono::Utc::now(),
    }
}

#[tokio::test]
async fn broadcast_to_five_users_one_with_two_sessions() {
    let registry = SessionRegistry::new();
    let users: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();

    let mut receivers = Vec::new();
    for (i, user) in users.iter().enumerate() {
        let sessions = if i == 0 { 2 } else { 1 };
        for _ in 0..sessions {
            let (tx, rx) = mpsc::unbounded_channel();
            registry.register(*user, Uuid::new_v4(), tx);
            receivers.push((*user, rx));
        }
    }

    assert_eq!(registry.connected_user_count(), 5);
    assert_eq!(registry.session_count(), 6);

    // The population the dispatcher persists for: one record per distinct
    // user even if the caller's union repeats ids.
    let mut population = users.clone();
    population.extend_from_slice(&users); // simulated sloppy union
    let distinct = dedupe_recipients(&population);
    assert_eq!(distinct.len(), 5);

    // Push the per-recipient record to each live session.
    for user in &distinct {
        let record = sample(*user);
        for session in registry.sessions(*user) {
            session
                .tx
                .send(ServerEvent::NewNotification {
                    notification: record.clone(),
                })
                .unwrap();
        }
    }

    // Each session received exactly one frame; the user with two sessions
    // got it on both, but both frames carry the same stored record id.
    let mut per_user_ids: std::collections::HashMap<Uuid, Vec<Uuid>> = Default::default();
    for (user, mut rx) in receivers {
        let event = rx.try_recv().expect("each session receives the push");
        assert!(rx.try_recv().is_err(), "no session receives it twice");
        match event {
            ServerEvent::NewNotification { notification } => {
                assert_eq!(notification.recipient_id, user);
                per_user_ids.entry(user).or_default().push(notification.id);
            }
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    let double = &per_user_ids[&users[0]];
    assert_eq!(double.len(), 2);
    assert_eq!(double[0], double[1], "one record fanned out, not duplicated");
}

#[tokio::test]
async fn per_recipient_fifo_over_one_session() {
    let registry = SessionRegistry::new();
    let user = Uuid::new_v4();
    let (tx, mut rx) = mpsc::unbounded_channel();
    registry.register(user, Uuid::new_v4(), tx);

    // Two creations, t1 < t2, enqueued in persist order.
    let mut first = sample(user);
    first.seq = 1;
    let mut second = sample(user);
    second.seq = 2;

    for record in [&first, &second] {
        for session in registry.sessions(user) {
            session
                .tx
                .send(ServerEvent::NewNotification {
                    notification: record.clone(),
                })
                .unwrap();
        }
    }

    let seqs: Vec<i64> = std::iter::from_fn(|| rx.try_recv().ok())
        .map(|ev| match ev {
            ServerEvent::NewNotification { notification } => notification.seq,
            other => panic!("unexpected frame: {:?}", other),
        })
        .collect();
    assert_eq!(seqs, vec![1, 2]);
}

#[tokio::test]
async fn dead_session_send_fails_without_affecting_others() {
    let registry = SessionRegistry::new();
    let user = Uuid::new_v4();

    let dead_session = Uuid::new_v4();
    let (dead_tx, dead_rx) = mpsc::unbounded_channel();
    drop(dead_rx); // connection died mid-flight
    registry.register(user, dead_session, dead_tx);

    let (live_tx, mut live_rx) = mpsc::unbounded_channel();
    registry.register(user, Uuid::new_v4(), live_tx);

    let record = sample(user);
    let mut delivered = 0;
    for session in registry.sessions(user) {
        let sent = session
            .tx
            .send(ServerEvent::NewNotification {
                notification: record.clone(),
            })
            .is_ok();
        if sent {
            delivered += 1;
        } else {
            // what the dispatcher does: drop the phantom target
            registry.unregister(user, session.session_id);
        }
    }

    assert_eq!(delivered, 1);
    assert!(live_rx.try_recv().is_ok());
    assert_eq!(registry.session_count(), 1);
}
