//! Wires a page's CDP event stream into its [`EventBus`] and, if
//! installed, its [`NetworkRecorder`] (spec.md §4.7 "CDP event pump").
//!
//! One background task per session, started by [`EventPump::spawn`] and
//! torn down by dropping the returned handle (which aborts the task) —
//! cancellation closes the session's CDP connection, which terminates the
//! pump's receive loop (spec.md §9 design notes).

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, trace};

use scout_runtime::{CdpEvent, Connection};

use crate::event_bus::{BrowserEventKind, EventBus};
use crate::recorder::NetworkRecorder;

/// Shared, pump-readable record of the page's last-known URL, updated by
/// navigation operations so `Page.loadEventFired` projections can carry a
/// URL even though the CDP event itself doesn't include one (spec.md
/// §4.7 `PageLifecycle{type="load", url=current_url}`).
pub type CurrentUrl = Arc<Mutex<String>>;

/// Shared, swappable slot holding the session's currently-installed
/// recorder (or `None`), read fresh by the pump on every event so a
/// recorder attached mid-session is picked up without restarting the
/// pump (see [`EventPump::spawn`]).
pub type RecorderSlot = Arc<Mutex<Option<Arc<NetworkRecorder>>>>;

/// Handle to a running event pump. Dropping it aborts the background task.
pub struct EventPump {
	task: tokio::task::JoinHandle<()>,
}

impl EventPump {
	/// Spawns the pump for `cdp_session_id` (the CDP-protocol session
	/// assigned by `Target.attachToTarget`, not to be confused with
	/// Scout's own [`crate::session::SessionId`]).
	///
	/// `recorder` is a shared slot rather than a fixed `Option` so that a
	/// recorder attached after the session was created (spec.md §4.9
	/// `StartRecording` on a session created with `record=false`) is
	/// visible to the pump on its very next event, instead of only to
	/// recorders that existed at spawn time.
	pub fn spawn(
		connection: Connection,
		cdp_session_id: String,
		bus: Arc<EventBus>,
		recorder: RecorderSlot,
		current_url: CurrentUrl,
	) -> Self {
		let mut events = connection.subscribe();
		let task = tokio::spawn(async move {
			loop {
				let event = match events.recv().await {
					Ok(event) => event,
					Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
						debug!(target = "scout.core.pump", dropped = n, "CDP event pump lagged");
						continue;
					}
					Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
				};
				if event.session_id != cdp_session_id {
					continue;
				}
				let current_recorder = recorder.lock().clone();
				project(&event, &bus, current_recorder.as_deref(), &current_url);

				if event.method == "Network.loadingFinished" {
					fetch_response_body(&connection, &event, current_recorder.as_deref()).await;
				}
			}
		});
		Self { task }
	}
}

impl Drop for EventPump {
	fn drop(&mut self) {
		self.task.abort();
	}
}

/// Fetches a response body via `Network.getResponseBody` for a finished
/// load, if a recorder with `capture_body` is installed. Fetch failures
/// are tolerated per spec.md §4.8 ("bodies that fail to fetch are
/// tolerated").
async fn fetch_response_body(connection: &Connection, event: &CdpEvent, recorder: Option<&NetworkRecorder>) {
	let Some(recorder) = recorder else { return };
	if !recorder.captures_body() {
		return;
	}
	let Some(request_id) = event.params["requestId"].as_str() else {
		return;
	};
	let body = connection
		.call_with_session_id(&event.session_id, "Network.getResponseBody", serde_json::json!({ "requestId": request_id }))
		.await
		.ok()
		.and_then(|result| result["body"].as_str().map(str::to_string));
	recorder.on_response_body(request_id, body);
}

fn project(event: &CdpEvent, bus: &EventBus, recorder: Option<&NetworkRecorder>, current_url: &CurrentUrl) {
	match event.method.as_str() {
		"Network.requestWillBeSent" => project_request_will_be_sent(event, bus, recorder),
		"Network.responseReceived" => project_response_received(event, bus, recorder),
		"Network.loadingFinished" => {
			if let Some(recorder) = recorder {
				if let Some(request_id) = event.params["requestId"].as_str() {
					let ts = event.params["timestamp"].as_f64().unwrap_or(0.0) * 1000.0;
					recorder.on_loading_finished(request_id, ts);
				}
			}
		}
		"Network.loadingFailed" => {
			if let Some(recorder) = recorder {
				if let Some(request_id) = event.params["requestId"].as_str() {
					let ts = event.params["timestamp"].as_f64().unwrap_or(0.0) * 1000.0;
					recorder.on_loading_finished(request_id, ts);
				}
			}
		}
		"Runtime.consoleAPICalled" => project_console(event, bus),
		"Page.loadEventFired" => {
			bus.broadcast(BrowserEventKind::PageLifecycle {
				r#type: "load".to_string(),
				url: current_url.lock().clone(),
			});
		}
		_ => trace!(target = "scout.core.pump", method = %event.method, "unhandled CDP event"),
	}
}

fn project_request_will_be_sent(event: &CdpEvent, bus: &EventBus, recorder: Option<&NetworkRecorder>) {
	let params = &event.params;
	let Some(request_id) = params["requestId"].as_str() else {
		return;
	};
	let request = &params["request"];
	let method = request["method"].as_str().unwrap_or_default().to_string();
	let url = request["url"].as_str().unwrap_or_default().to_string();
	let headers = headers_from(&request["headers"]);
	let post_data = request["postData"].as_str().map(str::to_string);
	let resource_type = params["type"].as_str().unwrap_or_default().to_string();
	let timestamp_ms = params["timestamp"].as_f64().unwrap_or(0.0) * 1000.0;

	if let Some(recorder) = recorder {
		recorder.on_request_will_be_sent(request_id, &method, &url, headers.clone(), post_data.clone(), timestamp_ms);
	}

	bus.broadcast(BrowserEventKind::RequestSent {
		request_id: request_id.to_string(),
		method,
		url,
		headers,
		post_data,
		resource_type,
	});
}

fn project_response_received(event: &CdpEvent, bus: &EventBus, recorder: Option<&NetworkRecorder>) {
	let params = &event.params;
	let Some(request_id) = params["requestId"].as_str() else {
		return;
	};
	let response = &params["response"];
	let url = response["url"].as_str().unwrap_or_default().to_string();
	let status = response["status"].as_u64().unwrap_or(0) as u32;
	let status_text = response["statusText"].as_str().unwrap_or_default().to_string();
	let headers = headers_from(&response["headers"]);
	let mime_type = response["mimeType"].as_str().unwrap_or_default().to_string();
	let remote_ip = response["remoteIPAddress"].as_str().unwrap_or_default().to_string();
	let time_ms = response["timing"]["receiveHeadersEnd"].as_f64().unwrap_or(0.0);

	if let Some(recorder) = recorder {
		recorder.on_response_received(request_id, status, &status_text, headers.clone(), &mime_type);
	}

	bus.broadcast(BrowserEventKind::ResponseReceived {
		request_id: request_id.to_string(),
		url,
		status,
		status_text,
		headers,
		mime_type,
		remote_ip,
		time_ms,
	});
}

fn project_console(event: &CdpEvent, bus: &EventBus) {
	let params = &event.params;
	let level = params["type"].as_str().unwrap_or("log").to_string();
	let message = params["args"]
		.as_array()
		.map(|args| {
			args.iter()
				.map(stringify_remote_object)
				.collect::<Vec<_>>()
				.join(" ")
		})
		.unwrap_or_default();

	bus.broadcast(BrowserEventKind::Console { level, message });
}

fn stringify_remote_object(value: &Value) -> String {
	if let Some(s) = value["value"].as_str() {
		return s.to_string();
	}
	if let Some(description) = value["description"].as_str() {
		return description.to_string();
	}
	value["value"].to_string()
}

fn headers_from(value: &Value) -> Vec<(String, String)> {
	value
		.as_object()
		.map(|obj| {
			obj.iter()
				.map(|(k, v)| (k.clone(), v.as_str().unwrap_or_default().to_string()))
				.collect()
		})
		.unwrap_or_default()
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;
	use uuid::Uuid;

	#[test]
	fn request_will_be_sent_feeds_bus_and_recorder() {
		let bus = EventBus::new(Uuid::new_v4());
		let recorder = NetworkRecorder::new(crate::recorder::RecorderOptions::default());
		let mut sub = bus.subscribe();

		let event = CdpEvent {
			session_id: "s1".to_string(),
			method: "Network.requestWillBeSent".to_string(),
			params: json!({
				"requestId": "req-1",
				"timestamp": 1.0,
				"type": "Document",
				"request": {"method": "GET", "url": "https://example.com", "headers": {"Accept": "*/*"}},
			}),
		};
		project(&event, &bus, Some(&recorder), &Arc::new(Mutex::new(String::new())));

		let got = sub.rx.try_recv().unwrap();
		assert!(matches!(got.kind, BrowserEventKind::RequestSent { ref url, .. } if url == "https://example.com"));
		assert_eq!(recorder.entries().len(), 1);
	}

	#[test]
	fn page_load_event_carries_current_url() {
		let bus = EventBus::new(Uuid::new_v4());
		let mut sub = bus.subscribe();
		let current_url = Arc::new(Mutex::new("https://example.com/landed".to_string()));

		let event = CdpEvent {
			session_id: "s1".to_string(),
			method: "Page.loadEventFired".to_string(),
			params: json!({}),
		};
		project(&event, &bus, None, &current_url);

		let got = sub.rx.try_recv().unwrap();
		match got.kind {
			BrowserEventKind::PageLifecycle { r#type, url } => {
				assert_eq!(r#type, "load");
				assert_eq!(url, "https://example.com/landed");
			}
			other => panic!("unexpected event: {other:?}"),
		}
	}
}
