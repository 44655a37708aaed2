//! Error types for the CDP transport and browser process layer.

use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur below `scout-core`: finding/launching a browser,
/// speaking CDP over its WebSocket endpoint, and correlating calls.
#[derive(Debug, Error)]
pub enum Error {
	/// No usable headless Chromium-family binary was found.
	#[error(
		"no browser binary found; set CHROME_PATH or install chromium/google-chrome-stable"
	)]
	BrowserNotFound,

	/// The browser process failed to start or exited before becoming ready.
	#[error("failed to launch browser: {0}")]
	LaunchFailed(String),

	/// Timed out waiting for the `DevTools listening on ws://...` banner.
	#[error("timed out waiting for browser DevTools endpoint")]
	LaunchTimeout,

	/// Failed to establish or maintain the CDP WebSocket connection.
	#[error("CDP connection failed: {0}")]
	ConnectionFailed(String),

	/// The CDP peer returned a JSON-RPC style `error` object.
	#[error("CDP error {code}: {message}")]
	Protocol { code: i64, message: String },

	/// The CDP connection closed while a call was in flight.
	#[error("CDP connection closed")]
	ConnectionClosed,

	/// Timed out waiting for a CDP call's reply.
	#[error("timed out waiting for CDP reply to {0}")]
	Timeout(String),

	/// I/O error (process spawn, pipe read).
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// JSON (de)serialization error.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

impl Error {
	/// True for errors that indicate the underlying browser is gone and the
	/// caller should not retry on the same connection.
	pub fn is_connection_lost(&self) -> bool {
		matches!(self, Error::ConnectionClosed | Error::ConnectionFailed(_))
	}
}
