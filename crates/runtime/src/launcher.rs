//! Headless browser process discovery and launch.
//!
//! Locates a browser binary (env override, then a search
//! order over installed candidates) but for a Chromium-family binary
//! speaking the Chrome DevTools Protocol directly, rather than shelling out
//! to a Node.js driver process.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Options controlling how a browser instance is launched.
///
/// Mirrors the fields of `CreateSessionOptions` (spec.md §4.5, §6) that
/// govern process launch as opposed to page-level behavior.
#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
	pub headless: bool,
	/// Apply a handful of flags/patches that make automation less
	/// fingerprintable (disable the `AutomationControlled` blink feature).
	pub stealth: bool,
	pub user_agent: Option<String>,
	pub proxy: Option<String>,
	pub window_width: Option<u32>,
	pub window_height: Option<u32>,
	pub user_data_dir: Option<PathBuf>,
	pub extra_extensions: Vec<PathBuf>,
	pub no_sandbox: bool,
}

/// A running browser process plus the CDP WebSocket endpoint it printed on
/// startup.
pub struct BrowserProcess {
	child: Child,
	ws_url: String,
}

impl BrowserProcess {
	pub fn ws_url(&self) -> &str {
		&self.ws_url
	}

	/// Terminates the browser process. Safe to call on an already-exited
	/// child (the OS call simply fails and is ignored).
	pub async fn kill(&mut self) -> Result<()> {
		if let Err(err) = self.child.start_kill() {
			debug!(target = "scout.runtime", error = %err, "browser process already exited");
			return Ok(());
		}
		let _ = self.child.wait().await;
		Ok(())
	}

	pub async fn wait(&mut self) -> Result<std::process::ExitStatus> {
		Ok(self.child.wait().await?)
	}
}

/// Candidate binary names searched in `PATH`, in order, per platform.
#[cfg(not(target_os = "windows"))]
const CANDIDATE_NAMES: &[&str] = &[
	"chromium",
	"chromium-browser",
	"google-chrome",
	"google-chrome-stable",
	"microsoft-edge",
	"microsoft-edge-stable",
];

#[cfg(target_os = "windows")]
const CANDIDATE_NAMES: &[&str] = &["chrome.exe", "msedge.exe"];

/// Locates a usable Chromium-family executable.
///
/// Search order:
/// 1. `CHROME_PATH` / `SCOUT_CHROME_PATH` environment variable override.
/// 2. Well-known binary names resolved through `PATH` via `which`.
/// 3. Platform-default install locations.
pub fn find_browser_executable() -> Result<PathBuf> {
	for var in ["SCOUT_CHROME_PATH", "CHROME_PATH"] {
		if let Ok(path) = std::env::var(var) {
			let path = PathBuf::from(path);
			if path.exists() {
				debug!(target = "scout.runtime", source = var, path = %path.display(), "using browser override");
				return Ok(path);
			}
			warn!(target = "scout.runtime", source = var, path = %path.display(), "override does not exist, ignoring");
		}
	}

	for name in CANDIDATE_NAMES {
		if let Ok(path) = which::which(name) {
			debug!(target = "scout.runtime", candidate = name, path = %path.display(), "resolved browser binary");
			return Ok(path);
		}
	}

	for path in default_install_locations() {
		if path.exists() {
			debug!(target = "scout.runtime", path = %path.display(), "found browser at default install location");
			return Ok(path);
		}
	}

	Err(Error::BrowserNotFound)
}

#[cfg(target_os = "macos")]
fn default_install_locations() -> Vec<PathBuf> {
	vec![
		PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
		PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
	]
}

#[cfg(all(unix, not(target_os = "macos")))]
fn default_install_locations() -> Vec<PathBuf> {
	vec![
		PathBuf::from("/usr/bin/chromium"),
		PathBuf::from("/usr/bin/chromium-browser"),
		PathBuf::from("/usr/bin/google-chrome"),
		PathBuf::from("/usr/bin/google-chrome-stable"),
		PathBuf::from("/snap/bin/chromium"),
	]
}

#[cfg(target_os = "windows")]
fn default_install_locations() -> Vec<PathBuf> {
	vec![
		PathBuf::from("C:\\Program Files\\Google\\Chrome\\Application\\chrome.exe"),
		PathBuf::from("C:\\Program Files (x86)\\Google\\Chrome\\Application\\chrome.exe"),
	]
}

fn build_args(opts: &LaunchOptions, devtools_port: u16) -> Vec<String> {
	let mut args = vec![
		format!("--remote-debugging-port={devtools_port}"),
		"--remote-allow-origins=*".to_string(),
		"--disable-background-networking".to_string(),
		"--disable-default-apps".to_string(),
		"--disable-popup-blocking".to_string(),
		"--disable-sync".to_string(),
		"--no-first-run".to_string(),
		"--no-default-browser-check".to_string(),
	];

	if opts.headless {
		args.push("--headless=new".to_string());
	}
	if opts.no_sandbox {
		args.push("--no-sandbox".to_string());
	}
	if opts.stealth {
		args.push("--disable-blink-features=AutomationControlled".to_string());
	}
	if let Some(ua) = &opts.user_agent {
		args.push(format!("--user-agent={ua}"));
	}
	if let Some(proxy) = &opts.proxy {
		args.push(format!("--proxy-server={proxy}"));
	}
	if let (Some(w), Some(h)) = (opts.window_width, opts.window_height) {
		args.push(format!("--window-size={w},{h}"));
	}
	if let Some(dir) = &opts.user_data_dir {
		args.push(format!("--user-data-dir={}", dir.display()));
	}
	if !opts.extra_extensions.is_empty() {
		let joined = opts
			.extra_extensions
			.iter()
			.map(|p| p.display().to_string())
			.collect::<Vec<_>>()
			.join(",");
		args.push(format!("--load-extension={joined}"));
	}

	args
}

/// Launches a browser process and blocks until its CDP WebSocket endpoint
/// is known, or `startup_timeout` elapses.
///
/// Port 0 asks the browser to pick an ephemeral port; the actual endpoint
/// is parsed from the `DevTools listening on ws://...` banner it writes to
/// stderr on startup, matching every Chromium-family browser's behavior.
pub async fn launch(opts: &LaunchOptions, startup_timeout: Duration) -> Result<BrowserProcess> {
	let executable = find_browser_executable()?;
	let args = build_args(opts, 0);

	debug!(target = "scout.runtime", binary = %executable.display(), ?args, "launching browser");

	let mut command = Command::new(&executable);
	command
		.args(&args)
		.stdin(Stdio::null())
		.stdout(Stdio::null())
		.stderr(Stdio::piped())
		.kill_on_drop(true);

	let mut child = command
		.spawn()
		.map_err(|err| Error::LaunchFailed(err.to_string()))?;

	let stderr = child
		.stderr
		.take()
		.ok_or_else(|| Error::LaunchFailed("no stderr pipe on child process".into()))?;

	let ws_url = timeout(startup_timeout, read_devtools_banner(stderr))
		.await
		.map_err(|_| Error::LaunchTimeout)??;

	debug!(target = "scout.runtime", %ws_url, "browser DevTools endpoint ready");

	Ok(BrowserProcess { child, ws_url })
}

/// Resolves the browser-wide CDP WebSocket endpoint of an already-running
/// instance by querying its `/json/version` HTTP endpoint, the standard
/// Chromium DevTools discovery mechanism.
///
/// Used by the daemon to attach to a browser it previously launched rather
/// than starting a new one (reachability probing, spec.md §4.10's analog
/// at the browser-process layer rather than the RPC layer).
pub async fn resolve_ws_url_via_http(devtools_port: u16) -> Result<String> {
	let url = format!("http://127.0.0.1:{devtools_port}/json/version");
	let response = reqwest::get(&url)
		.await
		.map_err(|err| Error::ConnectionFailed(err.to_string()))?;
	let body: serde_json::Value = response
		.json()
		.await
		.map_err(|err| Error::ConnectionFailed(err.to_string()))?;
	body["webSocketDebuggerUrl"]
		.as_str()
		.map(str::to_string)
		.ok_or_else(|| Error::ConnectionFailed("/json/version had no webSocketDebuggerUrl".into()))
}

async fn read_devtools_banner(stderr: tokio::process::ChildStderr) -> Result<String> {
	const PREFIX: &str = "DevTools listening on ";
	let mut lines = BufReader::new(stderr).lines();
	while let Some(line) = lines.next_line().await? {
		if let Some(rest) = line.strip_prefix(PREFIX) {
			return Ok(rest.trim().to_string());
		}
	}
	Err(Error::LaunchFailed(
		"browser exited before printing a DevTools endpoint".into(),
	))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn build_args_includes_headless_and_sandbox_flags() {
		let opts = LaunchOptions {
			headless: true,
			no_sandbox: true,
			window_width: Some(1280),
			window_height: Some(720),
			..Default::default()
		};
		let args = build_args(&opts, 9222);
		assert!(args.contains(&"--headless=new".to_string()));
		assert!(args.contains(&"--no-sandbox".to_string()));
		assert!(args.contains(&"--window-size=1280,720".to_string()));
		assert!(args.contains(&"--remote-debugging-port=9222".to_string()));
	}

	#[test]
	fn build_args_omits_optional_flags_when_unset() {
		let opts = LaunchOptions::default();
		let args = build_args(&opts, 9222);
		assert!(!args.iter().any(|a| a.starts_with("--user-agent")));
		assert!(!args.iter().any(|a| a.starts_with("--proxy-server")));
	}

	#[tokio::test]
	async fn read_devtools_banner_extracts_ws_url() {
		let script = "#!/bin/sh\necho 'DevTools listening on ws://127.0.0.1:9222/devtools/browser/abc' 1>&2\nsleep 5\n";
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("fake-chrome.sh");
		std::fs::write(&path, script).unwrap();
		#[cfg(unix)]
		{
			use std::os::unix::fs::PermissionsExt;
			let mut perms = std::fs::metadata(&path).unwrap().permissions();
			perms.set_mode(0o755);
			std::fs::set_permissions(&path, perms).unwrap();
		}

		let mut child = Command::new(&path)
			.stdout(Stdio::null())
			.stderr(Stdio::piped())
			.kill_on_drop(true)
			.spawn()
			.unwrap();
		let stderr = child.stderr.take().unwrap();
		let ws_url = read_devtools_banner(stderr).await.unwrap();
		assert_eq!(ws_url, "ws://127.0.0.1:9222/devtools/browser/abc");
		let _ = child.start_kill();
	}
}
