//! Event Router: demultiplexes the ESL event stream to per-subscriber channels.
//!
//! Subscribers register under an `(event_name, optional uuid)` key. A broad
//! `(event_name, None)` subscription matches every uuid for that event name.
//! Dispatch happens on a single background task fed by the [`EslEventStream`];
//! a subscriber whose receiver has been dropped is pruned like a caught
//! exception, and never interrupts delivery to its siblings.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, trace};

use crate::connection::EslEventStream;
use crate::event::{EslEvent, EslEventType};

type SubscriberKey = (EslEventType, Option<String>);

/// Depth of each subscriber's mailbox. Call-orchestrator subscribers consume
/// promptly (a single wait per state), so a small buffer is enough headroom
/// against a burst of unrelated events on the same uuid.
const SUBSCRIBER_CHANNEL_SIZE: usize = 16;

struct Subscriber {
    tx: mpsc::Sender<EslEvent>,
    one_shot: bool,
}

type Table = Arc<Mutex<HashMap<SubscriberKey, Vec<Subscriber>>>>;

/// Fans out events from a single [`EslEventStream`] to many registered
/// subscribers.
#[derive(Clone)]
pub struct EventRouter {
    table: Table,
    /// Set once the source stream ends (transport disconnect). Lets
    /// subscriptions registered *after* the fact still observe the source is
    /// gone instead of waiting on a channel nothing will ever send on.
    closed: Arc<AtomicBool>,
}

/// A single registered subscription. Drop it to deregister early.
pub struct Subscription {
    rx: mpsc::Receiver<EslEvent>,
}

impl Subscription {
    /// Receive the next matching event, or `None` once the router's source
    /// stream has ended and no more events will ever arrive.
    pub async fn recv(&mut self) -> Option<EslEvent> {
        self.rx
            .recv()
            .await
    }
}

impl EventRouter {
    /// Spawn the dispatch loop against `events`. The router stays usable
    /// (subscriptions may still be registered) even after the loop ends —
    /// `recv()` on existing subscriptions simply yields no further events.
    pub fn spawn(events: EslEventStream) -> (Self, tokio::task::JoinHandle<()>) {
        let table: Table = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let handle = tokio::spawn(dispatch_loop(events, table.clone(), closed.clone()));
        (Self { table, closed }, handle)
    }

    /// Register a persistent subscription: events keep arriving until the
    /// returned [`Subscription`] is dropped.
    pub async fn subscribe(&self, event_type: EslEventType, uuid: Option<String>) -> Subscription {
        self.register(event_type, uuid, false)
            .await
    }

    /// Register a one-shot subscription: removed from the table after its
    /// first successful delivery. Used for "wait for this event" steps.
    pub async fn subscribe_once(
        &self,
        event_type: EslEventType,
        uuid: Option<String>,
    ) -> Subscription {
        self.register(event_type, uuid, true)
            .await
    }

    async fn register(
        &self,
        event_type: EslEventType,
        uuid: Option<String>,
        one_shot: bool,
    ) -> Subscription {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CHANNEL_SIZE);
        // The source stream may have already ended (transport disconnect).
        // Don't register a subscriber that will never be dispatched to —
        // just drop `tx` so `rx.recv()` resolves to `None` immediately.
        if !self.closed.load(Ordering::Acquire) {
            self.table
                .lock()
                .await
                .entry((event_type, uuid))
                .or_default()
                .push(Subscriber { tx, one_shot });
        }
        Subscription { rx }
    }
}

async fn dispatch_loop(mut events: EslEventStream, table: Table, closed: Arc<AtomicBool>) {
    while let Some(event) = events
        .recv()
        .await
    {
        let Some(event_type) = event.event_type() else {
            trace!("Ignoring event with unrecognized Event-Name");
            continue;
        };
        let uuid = event
            .unique_id()
            .cloned();

        let mut table_guard = table.lock().await;

        // A broad `(event_type, None)` key matches every uuid for that event
        // type, so only add it when it's distinct from the specific key —
        // otherwise an event with no `Unique-ID` would dispatch twice to the
        // same broad subscriber.
        let mut keys = vec![(event_type, uuid.clone())];
        if uuid.is_some() {
            keys.push((event_type, None));
        }

        for key in keys {
            let Some(subs) = table_guard.get_mut(&key) else {
                continue;
            };

            subs.retain_mut(|sub| match sub.tx.try_send(event.clone()) {
                Ok(()) => !sub.one_shot,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    debug!("Subscriber mailbox full, dropping event for it");
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!("Subscriber receiver dropped, deregistering");
                    false
                }
            });
        }
    }

    // Drop every registered subscriber's sender so in-flight `recv()` calls
    // resolve to `None` instead of waiting forever on a table nothing will
    // ever populate again.
    table.lock().await.clear();
    closed.store(true, Ordering::Release);
    debug!("Event router dispatch loop ending: source stream closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc as tokio_mpsc;

    fn make_event(name: &str, uuid: Option<&str>) -> EslEvent {
        let mut event = EslEvent::new();
        event.set_header("Event-Name".to_string(), name.to_string());
        if let Some(uuid) = uuid {
            event.set_header("Unique-ID".to_string(), uuid.to_string());
        }
        event
    }

    // A minimal stand-in that feeds a prepared sequence of events through a
    // real channel, mirroring what the reader task would send.
    async fn router_over(events: Vec<EslEvent>) -> EventRouter {
        let (tx, rx) = tokio_mpsc::channel(32);
        for event in events {
            tx.send(event)
                .await
                .unwrap();
        }
        drop(tx);
        let (router, _handle) = EventRouter::spawn(EslEventStream::from_receiver(rx));
        router
    }

    #[tokio::test]
    async fn broad_subscription_matches_any_uuid() {
        let router = router_over(vec![
            make_event("CHANNEL_ANSWER", Some("uuid-a")),
            make_event("CHANNEL_ANSWER", Some("uuid-b")),
        ])
        .await;

        let mut sub = router
            .subscribe(EslEventType::ChannelAnswer, None)
            .await;

        let first = tokio::time::timeout(Duration::from_secs(1), sub.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.unique_id(), Some(&"uuid-a".to_string()));

        let second = tokio::time::timeout(Duration::from_secs(1), sub.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.unique_id(), Some(&"uuid-b".to_string()));
    }

    #[tokio::test]
    async fn uuid_scoped_subscription_ignores_other_uuids() {
        let router = router_over(vec![
            make_event("CHANNEL_ANSWER", Some("other-uuid")),
            make_event("CHANNEL_ANSWER", Some("target-uuid")),
        ])
        .await;

        let mut sub = router
            .subscribe_once(EslEventType::ChannelAnswer, Some("target-uuid".to_string()))
            .await;

        let event = tokio::time::timeout(Duration::from_secs(1), sub.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.unique_id(), Some(&"target-uuid".to_string()));
    }

    #[tokio::test]
    async fn one_shot_subscription_is_pruned_after_delivery() {
        let router = router_over(vec![
            make_event("CHANNEL_HANGUP_COMPLETE", Some("uuid-a")),
            make_event("CHANNEL_HANGUP_COMPLETE", Some("uuid-a")),
        ])
        .await;

        let mut sub = router
            .subscribe_once(EslEventType::ChannelHangupComplete, Some("uuid-a".to_string()))
            .await;

        assert!(sub
            .recv()
            .await
            .is_some());
        // Second event was never routed to this (already-pruned) subscription.
        assert!(tokio::time::timeout(Duration::from_millis(200), sub.recv())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn source_stream_closing_unblocks_existing_and_new_subscribers() {
        let (tx, rx) = tokio_mpsc::channel(8);
        let (router, handle) = EventRouter::spawn(EslEventStream::from_receiver(rx));

        let mut early_sub = router
            .subscribe_once(EslEventType::ChannelAnswer, Some("agent-1".to_string()))
            .await;

        drop(tx);
        handle.await.unwrap();

        assert!(early_sub.recv().await.is_none());

        // A subscription registered after the source closed must not hang
        // waiting on a table that will never be dispatched to again.
        let mut late_sub = router
            .subscribe_once(EslEventType::ChannelAnswer, Some("agent-1".to_string()))
            .await;
        assert!(tokio::time::timeout(Duration::from_millis(200), late_sub.recv())
            .await
            .unwrap()
            .is_none());
    }
}
