//! CDP-event-driven network capture and HAR 1.2 export (spec.md §3 "HAR
//! entry", §4.8 `NetworkRecorder`).
//!
//! Nil-safe: every operation is a no-op on a recorder that hasn't been
//! installed, so the CDP event pump and RPC layer can hold an
//! `Option<Arc<NetworkRecorder>>` and call through it unconditionally
//! (spec.md §4.8 invariant).

use indexmap::IndexMap;
use parking_lot::Mutex;
use scout_protocol::har::{HarContent, HarCreator, HarEntry, HarHeader, HarLog, HarRequest, HarResponse, HarTimings};

use crate::error::Result;

/// Default cap on a single response body before it's truncated in the
/// HAR export (SPEC_FULL.md §F.2; spec.md §9 design notes call for a cap
/// but leave the number to implementers).
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Options a recorder is created with (spec.md §4.8 "creator metadata",
/// §6 "creator from recorder options").
#[derive(Debug, Clone)]
pub struct RecorderOptions {
	pub capture_body: bool,
	pub max_body_bytes: usize,
	pub creator_name: String,
	pub creator_version: String,
}

impl Default for RecorderOptions {
	fn default() -> Self {
		Self {
			capture_body: false,
			max_body_bytes: DEFAULT_MAX_BODY_BYTES,
			creator_name: "scout".to_string(),
			creator_version: env!("CARGO_PKG_VERSION").to_string(),
		}
	}
}

struct InProgressEntry {
	request: HarRequest,
	started_at_iso: String,
	started_at_ms: f64,
	response: Option<HarResponse>,
	total_ms: Option<f64>,
}

/// A captured entry snapshot returned by [`NetworkRecorder::entries`].
pub type EntrySnapshot = HarEntry;

/// Per-page network recorder: ingests CDP network events keyed by CDP
/// `requestId` and serializes captured pairs as HAR 1.2 on demand
/// (spec.md §4.8).
pub struct NetworkRecorder {
	options: RecorderOptions,
	entries: Mutex<IndexMap<String, InProgressEntry>>,
	stopped: Mutex<bool>,
}

impl NetworkRecorder {
	pub fn new(options: RecorderOptions) -> Self {
		Self {
			options,
			entries: Mutex::new(IndexMap::new()),
			stopped: Mutex::new(false),
		}
	}

	fn is_stopped(&self) -> bool {
		*self.stopped.lock()
	}

	/// Whether this recorder was configured to capture response bodies
	/// (spec.md §4.8 "if `capture_body=true`, invoke the CDP
	/// `Network.getResponseBody` reply").
	pub fn captures_body(&self) -> bool {
		self.options.capture_body
	}

	/// `Network.requestWillBeSent`: allocates an entry with its request
	/// portion populated.
	pub fn on_request_will_be_sent(
		&self,
		request_id: &str,
		method: &str,
		url: &str,
		headers: Vec<(String, String)>,
		post_data: Option<String>,
		timestamp_ms: f64,
	) {
		if self.is_stopped() {
			return;
		}
		let entry = InProgressEntry {
			request: HarRequest {
				method: method.to_string(),
				url: url.to_string(),
				headers: headers.into_iter().map(|(name, value)| HarHeader { name, value }).collect(),
				post_data,
			},
			started_at_iso: iso_timestamp(timestamp_ms),
			started_at_ms: timestamp_ms,
			response: None,
			total_ms: None,
		};
		self.entries.lock().insert(request_id.to_string(), entry);
	}

	/// `Network.responseReceived`: fills the response portion of a
	/// previously allocated entry. A response with no matching request is
	/// dropped (spec.md §3 HAR entry invariant).
	pub fn on_response_received(
		&self,
		request_id: &str,
		status: u32,
		status_text: &str,
		headers: Vec<(String, String)>,
		mime_type: &str,
	) {
		if self.is_stopped() {
			return;
		}
		let mut entries = self.entries.lock();
		let Some(entry) = entries.get_mut(request_id) else {
			return;
		};
		entry.response = Some(HarResponse {
			status,
			status_text: status_text.to_string(),
			headers: headers.into_iter().map(|(name, value)| HarHeader { name, value }).collect(),
			mime_type: mime_type.to_string(),
			content: HarContent {
				text: None,
				size: 0,
				truncated: false,
			},
		});
	}

	/// Populates the response body, called after a `Network.getResponseBody`
	/// round-trip. Bodies that failed to fetch are tolerated: the entry
	/// simply keeps an empty `content.text` (spec.md §4.8).
	pub fn on_response_body(&self, request_id: &str, body: Option<String>) {
		if self.is_stopped() || !self.options.capture_body {
			return;
		}
		let mut entries = self.entries.lock();
		let Some(entry) = entries.get_mut(request_id) else {
			return;
		};
		let Some(response) = entry.response.as_mut() else {
			return;
		};
		let Some(body) = body else {
			return;
		};

		response.content.size = body.len() as u64;
		if body.len() > self.options.max_body_bytes {
			response.content.text = Some(body[..self.options.max_body_bytes].to_string());
			response.content.truncated = true;
		} else {
			response.content.text = Some(body);
		}
	}

	/// `Network.loadingFinished` / `Network.loadingFailed`: finalizes the
	/// entry's timing.
	pub fn on_loading_finished(&self, request_id: &str, timestamp_ms: f64) {
		if self.is_stopped() {
			return;
		}
		let mut entries = self.entries.lock();
		let Some(entry) = entries.get_mut(request_id) else {
			return;
		};
		entry.total_ms = Some((timestamp_ms - entry.started_at_ms).max(0.0));
	}

	/// Read-only snapshot of every entry that has at least a request
	/// portion, in capture order. Entries never given a matching response
	/// are still exported (HAR 1.2 permits a missing `content.text`).
	pub fn entries(&self) -> Vec<EntrySnapshot> {
		self.entries
			.lock()
			.values()
			.map(|entry| EntrySnapshot {
				started_at: entry.started_at_iso.clone(),
				request: entry.request.clone(),
				response: entry.response.clone().unwrap_or_else(empty_response),
				timings: HarTimings {
					total_ms: entry.total_ms.unwrap_or(0.0),
				},
			})
			.collect()
	}

	/// Drops all captured entries.
	pub fn clear(&self) {
		self.entries.lock().clear();
	}

	/// Detaches from CDP streams. Idempotent (spec.md §4.8 invariant) —
	/// modeled here as a flag that makes every ingestion method a no-op,
	/// since the actual stream detachment happens one layer up in the CDP
	/// event pump.
	pub fn stop(&self) {
		*self.stopped.lock() = true;
	}

	/// Serializes every captured entry as HAR 1.2 (spec.md §4.8, §6).
	/// Returns the encoded bytes and the entry count.
	pub fn export_har(&self) -> Result<(Vec<u8>, usize)> {
		let entries = self.entries();
		let count = entries.len();
		let har = HarLog::new(
			HarCreator {
				name: self.options.creator_name.clone(),
				version: self.options.creator_version.clone(),
			},
			entries,
		);
		let bytes = serde_json::to_vec(&har).map_err(|err| crate::error::ScoutError::internal("recorder", err))?;
		Ok((bytes, count))
	}
}

fn empty_response() -> HarResponse {
	HarResponse {
		status: 0,
		status_text: String::new(),
		headers: Vec::new(),
		mime_type: String::new(),
		content: HarContent {
			text: None,
			size: 0,
			truncated: false,
		},
	}
}

fn iso_timestamp(timestamp_ms: f64) -> String {
	let millis = timestamp_ms.max(0.0) as i64;
	let secs = millis / 1000;
	let nanos = ((millis % 1000) * 1_000_000) as u32;
	time::OffsetDateTime::from_unix_timestamp(secs)
		.ok()
		.map(|t| t.replace_nanosecond(nanos).unwrap_or(t))
		.and_then(|t| t.format(&time::format_description::well_known::Rfc3339).ok())
		.unwrap_or_default()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn recorder(capture_body: bool) -> NetworkRecorder {
		NetworkRecorder::new(RecorderOptions {
			capture_body,
			creator_name: "test-tool".to_string(),
			creator_version: "1.0.0".to_string(),
			..Default::default()
		})
	}

	#[test]
	fn request_then_response_produces_one_entry() {
		let rec = recorder(false);
		rec.on_request_will_be_sent("req-1", "GET", "https://example.com", vec![], None, 0.0);
		rec.on_response_received("req-1", 200, "OK", vec![], "text/html");
		rec.on_loading_finished("req-1", 50.0);

		let entries = rec.entries();
		assert_eq!(entries.len(), 1);
		assert_eq!(entries[0].response.status, 200);
		assert_eq!(entries[0].timings.total_ms, 50.0);
	}

	#[test]
	fn response_with_no_matching_request_is_dropped() {
		let rec = recorder(false);
		rec.on_response_received("unknown", 200, "OK", vec![], "text/html");
		assert_eq!(rec.entries().len(), 0);
	}

	#[test]
	fn clear_resets_entries_to_empty() {
		let rec = recorder(false);
		rec.on_request_will_be_sent("req-1", "GET", "https://example.com", vec![], None, 0.0);
		rec.clear();
		assert_eq!(rec.entries().len(), 0);
	}

	#[test]
	fn stop_is_idempotent_and_suppresses_further_ingestion() {
		let rec = recorder(false);
		rec.stop();
		rec.stop();
		rec.on_request_will_be_sent("req-1", "GET", "https://example.com", vec![], None, 0.0);
		assert_eq!(rec.entries().len(), 0);
	}

	#[test]
	fn export_har_has_version_and_matching_creator() {
		let rec = recorder(false);
		rec.on_request_will_be_sent("req-1", "GET", "https://example.com", vec![], None, 0.0);
		rec.on_response_received("req-1", 200, "OK", vec![], "text/html");

		let (bytes, count) = rec.export_har().unwrap();
		assert_eq!(count, 1);
		let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
		assert_eq!(value["log"]["version"], "1.2");
		assert_eq!(value["log"]["creator"]["name"], "test-tool");
		assert_eq!(value["log"]["creator"]["version"], "1.0.0");
		assert_eq!(value["log"]["entries"].as_array().unwrap().len(), 1);
	}

	#[test]
	fn oversized_body_is_truncated() {
		let rec = NetworkRecorder::new(RecorderOptions {
			capture_body: true,
			max_body_bytes: 4,
			..Default::default()
		});
		rec.on_request_will_be_sent("req-1", "GET", "https://example.com", vec![], None, 0.0);
		rec.on_response_received("req-1", 200, "OK", vec![], "text/plain");
		rec.on_response_body("req-1", Some("0123456789".to_string()));

		let entries = rec.entries();
		assert!(entries[0].response.content.truncated);
		assert_eq!(entries[0].response.content.text.as_deref(), Some("0123"));
	}
}
