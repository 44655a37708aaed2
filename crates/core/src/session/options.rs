//! Session creation options (spec.md §4.5 `Create`, §6
//! `CreateSessionOptions`).

use std::path::PathBuf;

use scout_runtime::LaunchOptions;

/// Options accepted by [`super::SessionManager::create`]. A superset of
/// [`LaunchOptions`]: everything that governs browser-process launch,
/// plus the session-level `record` flag that decides whether a
/// [`crate::recorder::NetworkRecorder`] is attached.
#[derive(Debug, Clone, Default)]
pub struct CreateSessionOptions {
	pub headless: bool,
	pub stealth: bool,
	pub user_agent: Option<String>,
	pub proxy: Option<String>,
	pub window_width: Option<u32>,
	pub window_height: Option<u32>,
	pub user_data_dir: Option<PathBuf>,
	pub extra_extensions: Vec<PathBuf>,
	pub no_sandbox: bool,
	/// Attaches a [`crate::recorder::NetworkRecorder`] at creation time
	/// (spec.md §4.5 "If `record=true`, attaches a NetworkRecorder").
	pub record: bool,
	/// Only meaningful when `record` is set; forwarded to the recorder's
	/// options (spec.md §4.8, §6 `StartRecording`).
	pub capture_body: bool,
}

impl CreateSessionOptions {
	pub(crate) fn launch_options(&self) -> LaunchOptions {
		LaunchOptions {
			headless: self.headless,
			stealth: self.stealth,
			user_agent: self.user_agent.clone(),
			proxy: self.proxy.clone(),
			window_width: self.window_width,
			window_height: self.window_height,
			user_data_dir: self.user_data_dir.clone(),
			extra_extensions: self.extra_extensions.clone(),
			no_sandbox: self.no_sandbox,
		}
	}
}
