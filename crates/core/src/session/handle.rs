//! A single browser session: the page operations listed in spec.md §4.5
//! and the RPC surface of §4.9, all scoped to one [`Connection`] and one
//! initial target.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use base64::Engine;
use parking_lot::Mutex as SyncMutex;
use serde_json::{Value, json};
use uuid::Uuid;

use scout_runtime::{BrowserProcess, Connection};

use crate::error::{Result, ScoutError};
use crate::event_bus::EventBus;
use crate::pump::{CurrentUrl, EventPump, RecorderSlot};
use crate::recorder::{NetworkRecorder, RecorderOptions};
use crate::session::dom;
use crate::session::keys;

pub type SessionId = Uuid;

/// A running session: browser process, CDP connection to its one page,
/// the session's event bus, and (if requested) its network recorder
/// (spec.md §4.5).
pub struct Session {
	id: SessionId,
	browser: SyncMutex<Option<BrowserProcess>>,
	connection: Connection,
	target_id: String,
	current_url: CurrentUrl,
	bus: Arc<EventBus>,
	/// Shared with the [`EventPump`] so a recorder attached after session
	/// creation (`StartRecording`) is visible to the pump immediately
	/// (see [`crate::pump::RecorderSlot`]).
	recorder: RecorderSlot,
	pump: SyncMutex<Option<EventPump>>,
	closed: AtomicBool,
}

impl Session {
	pub(crate) fn new(
		id: SessionId,
		browser: BrowserProcess,
		connection: Connection,
		target_id: String,
		bus: Arc<EventBus>,
		recorder: RecorderSlot,
		pump: EventPump,
		current_url: CurrentUrl,
	) -> Self {
		Self {
			id,
			browser: SyncMutex::new(Some(browser)),
			connection,
			target_id,
			current_url,
			bus,
			recorder,
			pump: SyncMutex::new(Some(pump)),
			closed: AtomicBool::new(false),
		}
	}

	pub fn id(&self) -> SessionId {
		self.id
	}

	pub fn bus(&self) -> &Arc<EventBus> {
		&self.bus
	}

	fn check_open(&self) -> Result<()> {
		if self.closed.load(Ordering::Acquire) {
			return Err(ScoutError::failed_precondition("session has been destroyed"));
		}
		Ok(())
	}

	async fn resolve(&self, selector: &str, xpath: bool) -> Result<String> {
		dom::resolve_object_id(&self.connection, &self.target_id, selector, xpath).await
	}

	pub async fn navigate(&self, url: &str) -> Result<(String, String)> {
		self.check_open()?;
		self.connection
			.call_on_target(&self.target_id, "Page.navigate", json!({ "url": url }))
			.await
			.map_err(ScoutError::from)?;
		*self.current_url.lock() = url.to_string();
		let title = self.get_title().await.unwrap_or_default();
		Ok((url.to_string(), title))
	}

	pub async fn reload(&self) -> Result<(String, String)> {
		self.check_open()?;
		self.connection
			.call_on_target(&self.target_id, "Page.reload", json!({}))
			.await
			.map_err(ScoutError::from)?;
		let url = self.get_url().await.unwrap_or_default();
		let title = self.get_title().await.unwrap_or_default();
		Ok((url, title))
	}

	pub async fn go_back(&self) -> Result<(String, String)> {
		self.check_open()?;
		dom::evaluate_json(&self.connection, &self.target_id, "history.back()").await?;
		let url = self.get_url().await.unwrap_or_default();
		*self.current_url.lock() = url.clone();
		let title = self.get_title().await.unwrap_or_default();
		Ok((url, title))
	}

	pub async fn go_forward(&self) -> Result<(String, String)> {
		self.check_open()?;
		dom::evaluate_json(&self.connection, &self.target_id, "history.forward()").await?;
		let url = self.get_url().await.unwrap_or_default();
		*self.current_url.lock() = url.clone();
		let title = self.get_title().await.unwrap_or_default();
		Ok((url, title))
	}

	pub async fn click(&self, selector: &str, xpath: bool) -> Result<()> {
		self.click_with(selector, xpath, "left", 1).await
	}

	pub async fn double_click(&self, selector: &str, xpath: bool) -> Result<()> {
		self.click_with(selector, xpath, "left", 2).await
	}

	pub async fn right_click(&self, selector: &str, xpath: bool) -> Result<()> {
		self.click_with(selector, xpath, "right", 1).await
	}

	async fn click_with(&self, selector: &str, xpath: bool, button: &str, click_count: u32) -> Result<()> {
		self.check_open()?;
		let object_id = self.resolve(selector, xpath).await?;
		let (x, y) = dom::center_point(&self.connection, &self.target_id, &object_id).await?;
		dom::dispatch_click(&self.connection, &self.target_id, x, y, button, click_count)
			.await
			.map_err(ScoutError::from)?;
		Ok(())
	}

	pub async fn hover(&self, selector: &str, xpath: bool) -> Result<()> {
		self.check_open()?;
		let object_id = self.resolve(selector, xpath).await?;
		let (x, y) = dom::center_point(&self.connection, &self.target_id, &object_id).await?;
		dom::dispatch_hover(&self.connection, &self.target_id, x, y).await
	}

	pub async fn type_text(&self, selector: &str, xpath: bool, text: &str, clear_first: bool) -> Result<()> {
		self.check_open()?;
		let object_id = self.resolve(selector, xpath).await?;
		dom::type_text(&self.connection, &self.target_id, &object_id, text, clear_first).await
	}

	pub async fn select_option(&self, selector: &str, xpath: bool, value: &str) -> Result<()> {
		self.check_open()?;
		let object_id = self.resolve(selector, xpath).await?;
		dom::select_option(&self.connection, &self.target_id, &object_id, value).await
	}

	/// Dispatches `key_name` to the page's currently focused element
	/// (spec.md §4.9 `PressKey`, key-name mapping).
	pub async fn press_key(&self, key_name: &str) -> Result<()> {
		self.check_open()?;
		let key = keys::resolve(key_name);
		dom::press_key(&self.connection, &self.target_id, &key).await
	}

	pub async fn get_text(&self, selector: &str, xpath: bool) -> Result<String> {
		self.check_open()?;
		let object_id = self.resolve(selector, xpath).await?;
		dom::get_text(&self.connection, &self.target_id, &object_id).await
	}

	pub async fn get_attribute(&self, selector: &str, xpath: bool, attribute: &str) -> Result<Option<String>> {
		self.check_open()?;
		let object_id = self.resolve(selector, xpath).await?;
		dom::get_attribute(&self.connection, &self.target_id, &object_id, attribute).await
	}

	pub async fn get_title(&self) -> Result<String> {
		self.check_open()?;
		let value = dom::evaluate_json(&self.connection, &self.target_id, "document.title").await?;
		Ok(value.as_str().unwrap_or_default().to_string())
	}

	pub async fn get_url(&self) -> Result<String> {
		self.check_open()?;
		let value = dom::evaluate_json(&self.connection, &self.target_id, "location.href").await?;
		let url = value.as_str().unwrap_or_default().to_string();
		if !url.is_empty() {
			*self.current_url.lock() = url.clone();
		}
		Ok(url)
	}

	pub async fn element_exists(&self, selector: &str, xpath: bool) -> Result<bool> {
		self.check_open()?;
		match self.resolve(selector, xpath).await {
			Ok(_) => Ok(true),
			Err(err) if matches!(err.code, crate::error::ErrorCode::NotFound) => Ok(false),
			Err(err) => Err(err),
		}
	}

	/// Runs `script` in the page's main world (spec.md §4.9 `Eval`).
	pub async fn eval(&self, script: &str) -> Result<Value> {
		self.check_open()?;
		dom::evaluate_json(&self.connection, &self.target_id, script).await
	}

	pub async fn screenshot(&self, full_page: bool, format: &str, quality: Option<u32>) -> Result<Vec<u8>> {
		self.check_open()?;
		let mut params = json!({ "format": format, "captureBeyondViewport": full_page });
		if format == "jpeg" {
			if let Some(quality) = quality {
				params["quality"] = json!(quality);
			}
		}
		let result = self
			.connection
			.call_on_target(&self.target_id, "Page.captureScreenshot", params)
			.await
			.map_err(ScoutError::from)?;
		decode_base64_field(&result, "data")
	}

	pub async fn pdf(&self) -> Result<Vec<u8>> {
		self.check_open()?;
		let result = self
			.connection
			.call_on_target(&self.target_id, "Page.printToPDF", json!({}))
			.await
			.map_err(ScoutError::from)?;
		decode_base64_field(&result, "data")
	}

	/// Attaches a [`NetworkRecorder`] (spec.md §4.8, §7).
	///
	/// `AlreadyExists` if a recorder is already installed for this session
	/// (spec.md §7: "a second `StartRecording` on an already-recording
	/// session").
	pub fn start_recording(&self, capture_body: bool) -> Result<()> {
		let mut slot = self.recorder.lock();
		if slot.is_some() {
			return Err(ScoutError::already_exists("recording is already active for this session"));
		}
		*slot = Some(Arc::new(NetworkRecorder::new(RecorderOptions {
			capture_body,
			..Default::default()
		})));
		Ok(())
	}

	pub fn stop_recording(&self) {
		if let Some(recorder) = self.recorder.lock().as_ref() {
			recorder.stop();
		}
	}

	/// Serializes the session's captured HAR (spec.md §4.8 `ExportHAR`).
	///
	/// `FailedPrecondition` if no recorder was ever started for this
	/// session (spec.md §7: "`ExportHAR` when no recorder is active"),
	/// distinct from the recorder's own nil-safety for its ingestion
	/// methods (spec.md §4.8 invariant).
	pub fn export_har(&self) -> Result<(Vec<u8>, usize)> {
		match self.recorder.lock().as_ref() {
			Some(recorder) => recorder.export_har(),
			None => Err(ScoutError::failed_precondition("no recorder is active for this session")),
		}
	}

	pub(crate) fn recorder(&self) -> Option<Arc<NetworkRecorder>> {
		self.recorder.lock().clone()
	}

	/// Stops the recorder and closes the browser. Idempotent: a second
	/// call observes the browser handle already taken and is a no-op
	/// (spec.md §4.5 "never closed twice").
	pub(crate) async fn close(&self) {
		self.closed.store(true, Ordering::Release);
		self.stop_recording();
		self.pump.lock().take();

		let taken = self.browser.lock().take();
		if let Some(mut browser) = taken {
			let _ = browser.kill().await;
		}
	}
}

fn decode_base64_field(result: &Value, field: &str) -> Result<Vec<u8>> {
	let encoded = result[field]
		.as_str()
		.ok_or_else(|| ScoutError::internal("capture", "missing encoded payload in CDP response"))?;
	base64::engine::general_purpose::STANDARD
		.decode(encoded)
		.map_err(|err| ScoutError::internal("capture", err))
}
