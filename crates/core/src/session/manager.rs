//! The session manager: concurrent session table plus session lifecycle
//! (spec.md §4.5).

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use scout_runtime::launcher;

use crate::error::{Result, ScoutError};
use crate::event_bus::EventBus;
use crate::pump::EventPump;
use crate::recorder::{NetworkRecorder, RecorderOptions};
use crate::session::handle::{Session, SessionId};
use crate::session::options::CreateSessionOptions;

/// How long a browser process is given to print its DevTools WebSocket
/// banner on startup before `Create` fails.
const BROWSER_STARTUP_TIMEOUT: Duration = Duration::from_secs(15);

/// Owns every live session, keyed by id (spec.md §4.5).
///
/// `DashMap` gives the concurrent lookup/insert/remove spec.md's table
/// needs without a manager-wide lock serializing unrelated sessions'
/// operations.
pub struct SessionManager {
	sessions: DashMap<SessionId, Arc<Session>>,
}

impl Default for SessionManager {
	fn default() -> Self {
		Self::new()
	}
}

impl SessionManager {
	pub fn new() -> Self {
		Self { sessions: DashMap::new() }
	}

	/// Launches a browser, opens a blank initial page, installs the CDP
	/// event pump, and (if `opts.record`) attaches a recorder (spec.md
	/// §4.5 `Create`).
	///
	/// Any failure after the browser process is spawned kills it before
	/// returning, so a failed `Create` never leaks a browser process.
	pub async fn create(&self, opts: CreateSessionOptions) -> Result<Arc<Session>> {
		let id = Uuid::new_v4();

		let browser = launcher::launch(&opts.launch_options(), BROWSER_STARTUP_TIMEOUT)
			.await
			.map_err(ScoutError::from)?;

		match self.create_inner(id, browser, &opts).await {
			Ok(session) => {
				self.sessions.insert(id, session.clone());
				info!(target = "scout.core.session", session_id = %id, "session created");
				Ok(session)
			}
			Err((err, mut browser)) => {
				let _ = browser.kill().await;
				Err(err)
			}
		}
	}

	/// Returns the launched browser process back to the caller on error,
	/// so `create` can kill it rather than leaking the process (spec.md
	/// §4.5 invariant: a failed `Create` never leaks a browser process).
	async fn create_inner(
		&self,
		id: SessionId,
		browser: scout_runtime::BrowserProcess,
		opts: &CreateSessionOptions,
	) -> std::result::Result<Arc<Session>, (ScoutError, scout_runtime::BrowserProcess)> {
		macro_rules! try_step {
			($expr:expr) => {
				match $expr {
					Ok(value) => value,
					Err(err) => return Err((ScoutError::from(err), browser)),
				}
			};
		}

		let connection = try_step!(scout_runtime::Connection::connect(browser.ws_url()).await);
		let target_id = try_step!(connection.new_page("about:blank").await);
		let cdp_session_id = match connection.session_id_of(&target_id) {
			Some(id) => id,
			None => return Err((ScoutError::internal("session", "newly attached target has no CDP session id"), browser)),
		};

		try_step!(connection.call_on_target(&target_id, "Page.enable", serde_json::json!({})).await);
		try_step!(connection.call_on_target(&target_id, "Network.enable", serde_json::json!({})).await);
		try_step!(connection.call_on_target(&target_id, "Runtime.enable", serde_json::json!({})).await);

		let bus = Arc::new(EventBus::new(id));
		let initial_recorder = if opts.record {
			Some(Arc::new(NetworkRecorder::new(RecorderOptions {
				capture_body: opts.capture_body,
				..Default::default()
			})))
		} else {
			None
		};
		let recorder = Arc::new(Mutex::new(initial_recorder));
		let current_url = Arc::new(Mutex::new("about:blank".to_string()));
		let pump = EventPump::spawn(connection.clone(), cdp_session_id, bus.clone(), recorder.clone(), current_url.clone());

		let session = Arc::new(Session::new(id, browser, connection, target_id, bus, recorder, pump, current_url));
		Ok(session)
	}

	/// Looks up a live session (spec.md §4.5 `Lookup`).
	pub fn lookup(&self, id: SessionId) -> Result<Arc<Session>> {
		self.sessions
			.get(&id)
			.map(|entry| entry.value().clone())
			.ok_or_else(|| ScoutError::not_found(format!("no session with id {id}")))
	}

	/// Stops the recorder (if any), closes the browser, and removes the
	/// session from the table. Idempotent against missing ids, which
	/// surface as `NotFound` rather than silently succeeding (spec.md
	/// §4.5 `Destroy`).
	pub async fn destroy(&self, id: SessionId) -> Result<()> {
		let (_, session) = self
			.sessions
			.remove(&id)
			.ok_or_else(|| ScoutError::not_found(format!("no session with id {id}")))?;
		session.close().await;
		Ok(())
	}

	pub fn session_count(&self) -> usize {
		self.sessions.len()
	}

	/// Destroys every live session, tolerating individual close failures
	/// so one stuck browser doesn't block draining the rest
	/// (SPEC_FULL.md §F.6 graceful daemon shutdown).
	pub async fn shutdown(&self) {
		let ids: Vec<SessionId> = self.sessions.iter().map(|entry| *entry.key()).collect();
		for id in ids {
			if let Some((_, session)) = self.sessions.remove(&id) {
				session.close().await;
			}
		}
		if self.sessions.is_empty() {
			info!(target = "scout.core.session", "all sessions drained");
		} else {
			warn!(target = "scout.core.session", remaining = self.sessions.len(), "sessions remained after shutdown sweep");
		}
	}
}
