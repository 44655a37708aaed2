//! CDP WebSocket transport: call/reply correlation and event fan-in.
//!
//! One [`CdpTransport`] owns one WebSocket connection (to the browser
//! endpoint, or to a specific page/target's `devtoolsFrontendUrl`
//! equivalent — CDP multiplexes both over the same socket via
//! `sessionId`). A background task owns the socket; callers talk to it
//! through channels, splitting the read and write halves of the socket,
//! a `Sender` half and a receiver loop, adapted from length-prefixed stdio
//! framing to WebSocket text frames.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tracing::{trace, warn};

use crate::error::{Error, Result};

#[cfg(test)]
mod tests;

/// A CDP event as received off the wire: the bare method name, its
/// parameters, and the CDP `sessionId` it was scoped to (empty string for
/// browser-level events that have no session).
#[derive(Debug, Clone)]
pub struct CdpEvent {
	pub session_id: String,
	pub method: String,
	pub params: Value,
}

#[derive(Serialize)]
struct CdpRequest<'a> {
	id: i64,
	method: &'a str,
	params: &'a Value,
	#[serde(skip_serializing_if = "Option::is_none")]
	#[serde(rename = "sessionId")]
	session_id: Option<&'a str>,
}

type PendingMap = DashMap<i64, oneshot::Sender<Result<Value>>>;

/// A live connection to a CDP endpoint.
///
/// Cloning shares the same underlying socket and pending-call table; every
/// clone can issue calls and subscribe to events independently.
#[derive(Clone)]
pub struct CdpTransport {
	next_id: Arc<AtomicI64>,
	pending: Arc<PendingMap>,
	outbound: mpsc::UnboundedSender<Message>,
	events: broadcast::Sender<CdpEvent>,
}

impl CdpTransport {
	/// Connects to a CDP WebSocket endpoint and spawns the read/write pump.
	pub async fn connect(ws_url: &str) -> Result<Self> {
		let (stream, _response) = tokio_tungstenite::connect_async(ws_url)
			.await
			.map_err(|err| Error::ConnectionFailed(err.to_string()))?;
		let (mut write, mut read) = stream.split();

		let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
		let pending: Arc<PendingMap> = Arc::new(DashMap::new());
		let (events_tx, _events_rx) = broadcast::channel(1024);

		let writer_task_events = events_tx.clone();
		tokio::spawn(async move {
			while let Some(msg) = outbound_rx.recv().await {
				if write.send(msg).await.is_err() {
					break;
				}
			}
			drop(writer_task_events);
		});

		let read_pending = pending.clone();
		let read_events = events_tx.clone();
		tokio::spawn(async move {
			while let Some(frame) = read.next().await {
				let frame = match frame {
					Ok(f) => f,
					Err(err) => {
						warn!(target = "scout.runtime", error = %err, "CDP socket read error");
						break;
					}
				};
				let text = match frame {
					Message::Text(t) => t,
					Message::Close(_) => break,
					_ => continue,
				};
				dispatch_frame(&text, &read_pending, &read_events);
			}
			// Socket closed: fail every still-pending call rather than
			// leaving the caller hanging forever.
			for entry in read_pending.iter() {
				trace!(target = "scout.runtime", id = *entry.key(), "CDP connection closed with call pending");
			}
			read_pending.clear();
		});

		Ok(Self {
			next_id: Arc::new(AtomicI64::new(1)),
			pending,
			outbound: outbound_tx,
			events: events_tx,
		})
	}

	/// Sends a CDP command and awaits its reply.
	pub async fn call(&self, method: &str, params: Value, session_id: Option<&str>) -> Result<Value> {
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		let (tx, rx) = oneshot::channel();
		self.pending.insert(id, tx);

		let request = CdpRequest {
			id,
			method,
			params: &params,
			session_id,
		};
		let text = serde_json::to_string(&request)?;
		if self.outbound.send(Message::Text(text.into())).is_err() {
			self.pending.remove(&id);
			return Err(Error::ConnectionClosed);
		}

		match rx.await {
			Ok(result) => result,
			Err(_) => Err(Error::ConnectionClosed),
		}
	}

	/// Subscribes to the event stream. Each subscriber gets its own
	/// `broadcast::Receiver`; a slow subscriber only loses its own events
	/// (tokio's `broadcast` reports `Lagged`, which callers should log and
	/// continue past rather than treat as fatal).
	pub fn subscribe(&self) -> broadcast::Receiver<CdpEvent> {
		self.events.subscribe()
	}
}

fn dispatch_frame(text: &str, pending: &PendingMap, events: &broadcast::Sender<CdpEvent>) {
	let value: Value = match serde_json::from_str(text) {
		Ok(v) => v,
		Err(err) => {
			warn!(target = "scout.runtime", error = %err, "malformed CDP frame");
			return;
		}
	};

	let obj = match value.as_object() {
		Some(o) => o,
		None => return,
	};

	if let Some(id) = obj.get("id").and_then(Value::as_i64) {
		if let Some((_, sender)) = pending.remove(&id) {
			let reply = if let Some(err) = obj.get("error") {
				let code = err.get("code").and_then(Value::as_i64).unwrap_or(-1);
				let message = err
					.get("message")
					.and_then(Value::as_str)
					.unwrap_or("unknown CDP error")
					.to_string();
				Err(Error::Protocol { code, message })
			} else {
				Ok(obj.get("result").cloned().unwrap_or(Value::Null))
			};
			let _ = sender.send(reply);
		}
		return;
	}

	if let Some(method) = obj.get("method").and_then(Value::as_str) {
		let params = obj.get("params").cloned().unwrap_or(Value::Null);
		let session_id = obj
			.get("sessionId")
			.and_then(Value::as_str)
			.unwrap_or_default()
			.to_string();
		let _ = events.send(CdpEvent {
			session_id,
			method: method.to_string(),
			params,
		});
	}
}

/// Parameters passed to a CDP method call, as a convenience over building
/// a raw [`serde_json::Value`] map at every call site.
pub fn params<const N: usize>(pairs: [(&str, Value); N]) -> Value {
	let map: HashMap<&str, Value> = pairs.into_iter().collect();
	serde_json::to_value(map).unwrap_or(Value::Null)
}
