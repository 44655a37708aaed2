//! Per-session broadcast fan-out with bounded, drop-on-full per-subscriber
//! channels (spec.md §3 `Subscriber`/`BrowserEvent`, §4.6 `EventBus`).
//!
//! Deliberately not `tokio::sync::broadcast`: broadcast's lagged-receiver
//! semantics drop the *oldest* unread events for every slow subscriber at
//! once, whereas spec.md wants an independent bounded channel per
//! subscriber so one slow client never perturbs another's stream.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Channel depth per subscriber (spec.md §3 `Subscriber`).
pub const SUBSCRIBER_CAPACITY: usize = 256;

/// A browser-originated event, stamped with the session it came from and
/// when the bus broadcast it (spec.md §3).
#[derive(Debug, Clone)]
pub struct BrowserEvent {
	pub session_id: Uuid,
	pub timestamp_ms_epoch: u64,
	pub kind: BrowserEventKind,
}

#[derive(Debug, Clone)]
pub enum BrowserEventKind {
	RequestSent {
		request_id: String,
		method: String,
		url: String,
		headers: Vec<(String, String)>,
		post_data: Option<String>,
		resource_type: String,
	},
	ResponseReceived {
		request_id: String,
		url: String,
		status: u32,
		status_text: String,
		headers: Vec<(String, String)>,
		mime_type: String,
		remote_ip: String,
		time_ms: f64,
	},
	Console {
		level: String,
		message: String,
	},
	PageLifecycle {
		r#type: String,
		url: String,
	},
	/// Surfaced by the `Interactive` stream when a command fails; `source`
	/// identifies the originating `request_id` as `command:<id>` (spec.md
	/// §4.9).
	Error {
		source: String,
		message: String,
		code: String,
	},
}

impl BrowserEventKind {
	fn unstamped(self, session_id: Uuid) -> BrowserEvent {
		BrowserEvent {
			session_id,
			timestamp_ms_epoch: now_ms(),
			kind: self,
		}
	}
}

fn now_ms() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_millis() as u64)
		.unwrap_or(0)
}

struct SubscriberEntry {
	tx: mpsc::Sender<BrowserEvent>,
	dropped: Arc<AtomicU64>,
}

/// A single subscription handle returned by [`EventBus::subscribe`].
pub struct Subscriber {
	pub id: u64,
	pub rx: mpsc::Receiver<BrowserEvent>,
	dropped: Arc<AtomicU64>,
}

impl Subscriber {
	/// Number of events dropped for this subscriber because its channel
	/// was full (SPEC_FULL.md §F.3).
	pub fn dropped_count(&self) -> u64 {
		self.dropped.load(Ordering::Relaxed)
	}
}

/// The per-session broadcast bus (spec.md §4.6).
///
/// `Broadcast` takes a read-lock over the subscriber map and iterates it
/// under that lock so every subscriber sees events in the order
/// `Broadcast` was called (spec.md §5 ordering guarantee);
/// `Subscribe`/`Unsubscribe` take the write-lock.
pub struct EventBus {
	session_id: Uuid,
	subscribers: RwLock<HashMap<u64, SubscriberEntry>>,
	next_id: AtomicU64,
}

impl EventBus {
	pub fn new(session_id: Uuid) -> Self {
		Self {
			session_id,
			subscribers: RwLock::new(HashMap::new()),
			next_id: AtomicU64::new(1),
		}
	}

	/// Allocates a new bounded channel and registers it (spec.md §4.6
	/// `Subscribe`).
	pub fn subscribe(&self) -> Subscriber {
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
		let dropped = Arc::new(AtomicU64::new(0));
		self.subscribers.write().insert(
			id,
			SubscriberEntry {
				tx,
				dropped: dropped.clone(),
			},
		);
		Subscriber { id, rx, dropped }
	}

	/// Removes and closes a subscriber's channel. Idempotent.
	pub fn unsubscribe(&self, id: u64) {
		self.subscribers.write().remove(&id);
	}

	pub fn subscriber_count(&self) -> usize {
		self.subscribers.read().len()
	}

	/// Stamps `kind` with this bus's session id and the current time, then
	/// attempts a non-blocking send to every subscriber. A full channel
	/// means the event is dropped for that subscriber only — broadcasting
	/// never blocks on a slow client (spec.md §4.6, §5).
	pub fn broadcast(&self, kind: BrowserEventKind) {
		let event = kind.unstamped(self.session_id);
		let subscribers = self.subscribers.read();
		for entry in subscribers.values() {
			if let Err(mpsc::error::TrySendError::Full(_)) = entry.tx.try_send(event.clone()) {
				entry.dropped.fetch_add(1, Ordering::Relaxed);
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn console(msg: &str) -> BrowserEventKind {
		BrowserEventKind::Console {
			level: "log".into(),
			message: msg.into(),
		}
	}

	#[tokio::test]
	async fn subscriber_receives_events_in_broadcast_order() {
		let bus = EventBus::new(Uuid::new_v4());
		let mut sub = bus.subscribe();
		bus.broadcast(console("one"));
		bus.broadcast(console("two"));

		let first = sub.rx.recv().await.unwrap();
		let second = sub.rx.recv().await.unwrap();
		assert!(matches!(first.kind, BrowserEventKind::Console { message, .. } if message == "one"));
		assert!(matches!(second.kind, BrowserEventKind::Console { message, .. } if message == "two"));
	}

	#[tokio::test]
	async fn full_channel_drops_only_for_that_subscriber() {
		let bus = EventBus::new(Uuid::new_v4());
		let stalled = bus.subscribe();
		let mut fresh_after = None;

		for i in 0..(SUBSCRIBER_CAPACITY + 10) {
			bus.broadcast(console(&format!("msg-{i}")));
			if i == SUBSCRIBER_CAPACITY {
				fresh_after = Some(bus.subscribe());
			}
		}

		assert!(stalled.dropped_count() >= 10);

		let mut fresh = fresh_after.unwrap();
		// The fresh subscriber, subscribed after the buffer filled, still
		// receives every event broadcast from that point on.
		let mut received = 0;
		while fresh.rx.try_recv().is_ok() {
			received += 1;
		}
		assert!(received > 0);
	}

	#[tokio::test]
	async fn unsubscribe_removes_from_subscriber_count() {
		let bus = EventBus::new(Uuid::new_v4());
		let sub = bus.subscribe();
		assert_eq!(bus.subscriber_count(), 1);
		bus.unsubscribe(sub.id);
		assert_eq!(bus.subscriber_count(), 0);
	}
}
