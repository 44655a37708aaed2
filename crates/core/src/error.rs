//! The RPC-stable error taxonomy (spec.md §7) plus the path sanitizer that
//! every `Internal` error is passed through before it leaves the process.
//!
//! A stable `ErrorCode` the RPC layer maps to a `tonic::Code`, carried
//! alongside a message that has already had anything filesystem-specific
//! scrubbed out of it.

use thiserror::Error;

/// Result type alias used throughout `scout-core`.
pub type Result<T> = std::result::Result<T, ScoutError>;

/// The stable error taxonomy from spec.md §7, carried independently of the
/// human-readable message so the RPC layer can map it to a `tonic::Code`
/// without parsing strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
	NotFound,
	AlreadyExists,
	FailedPrecondition,
	InvalidArgument,
	Internal,
	Unauthenticated,
	PermissionDenied,
	Canceled,
	DeadlineExceeded,
}

/// A `scout-core` error: a stable code plus a message that is safe to
/// return to an RPC client (already sanitized for `Internal` errors; see
/// [`sanitize_path`]).
#[derive(Debug, Error, Clone)]
#[error("{code:?}: {message}")]
pub struct ScoutError {
	pub code: ErrorCode,
	pub message: String,
}

impl ScoutError {
	pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
		Self {
			code,
			message: message.into(),
		}
	}

	pub fn not_found(message: impl Into<String>) -> Self {
		Self::new(ErrorCode::NotFound, message)
	}

	pub fn already_exists(message: impl Into<String>) -> Self {
		Self::new(ErrorCode::AlreadyExists, message)
	}

	pub fn failed_precondition(message: impl Into<String>) -> Self {
		Self::new(ErrorCode::FailedPrecondition, message)
	}

	pub fn invalid_argument(message: impl Into<String>) -> Self {
		Self::new(ErrorCode::InvalidArgument, message)
	}

	/// Wraps a browser-layer failure: tags it with a subsystem and runs the
	/// message through [`sanitize_path`] (spec.md §4.5).
	pub fn internal(subsystem: &str, message: impl std::fmt::Display) -> Self {
		Self::new(
			ErrorCode::Internal,
			format!("{subsystem}: {}", sanitize_path(&message.to_string())),
		)
	}

	pub fn unauthenticated(message: impl Into<String>) -> Self {
		Self::new(ErrorCode::Unauthenticated, message)
	}

	pub fn permission_denied(message: impl Into<String>) -> Self {
		Self::new(ErrorCode::PermissionDenied, message)
	}

	pub fn canceled(message: impl Into<String>) -> Self {
		Self::new(ErrorCode::Canceled, message)
	}

	pub fn deadline_exceeded(message: impl Into<String>) -> Self {
		Self::new(ErrorCode::DeadlineExceeded, message)
	}
}

impl From<scout_runtime::Error> for ScoutError {
	fn from(err: scout_runtime::Error) -> Self {
		ScoutError::internal("runtime", err)
	}
}

/// Replaces any substring that looks like an absolute filesystem path with
/// `[path-redacted]` (spec.md §4.5, §7, testable property in §8).
///
/// Recognizes `/tmp/...`, `/var/...`, `/home/<user>/...`, `/Users/<user>/...`
/// and Windows drive paths (`C:\...`). A "path" run is any maximal sequence
/// of non-whitespace characters starting at one of those prefixes.
pub fn sanitize_path(message: &str) -> String {
	let mut out = String::with_capacity(message.len());
	let mut rest = message;

	loop {
		match find_next_path_start(rest) {
			None => {
				out.push_str(rest);
				break;
			}
			Some(start) => {
				out.push_str(&rest[..start]);
				let path_rest = &rest[start..];
				let end = path_rest
					.find(|c: char| c.is_whitespace())
					.unwrap_or(path_rest.len());
				out.push_str("[path-redacted]");
				rest = &path_rest[end..];
			}
		}
	}

	out
}

fn find_next_path_start(s: &str) -> Option<usize> {
	const UNIX_PREFIXES: &[&str] = &["/tmp/", "/var/", "/home/", "/Users/"];

	let mut best: Option<usize> = None;
	for prefix in UNIX_PREFIXES {
		if let Some(idx) = s.find(prefix) {
			// /home/ and /Users/ additionally require a path segment after
			// the username before we're confident it's a path, but the
			// prefix alone is already a strong enough signal per spec.md's
			// examples (`/home/<x>/...`).
			best = Some(best.map_or(idx, |b: usize| b.min(idx)));
		}
	}

	// Windows drive path: `<letter>:\` anywhere, case-insensitive drive
	// letter.
	let bytes = s.as_bytes();
	for i in 0..bytes.len().saturating_sub(2) {
		let c = bytes[i];
		if c.is_ascii_alphabetic() && bytes[i + 1] == b':' && bytes[i + 2] == b'\\' {
			best = Some(best.map_or(i, |b| b.min(i)));
			break;
		}
	}

	best
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn redacts_unix_tmp_path() {
		let msg = sanitize_path("failed: /tmp/scout-abc123/profile is locked");
		assert_eq!(msg, "failed: [path-redacted]");
	}

	#[test]
	fn redacts_windows_path() {
		let msg = sanitize_path(r"failed: C:\Users\john\AppData\Local\chrome");
		assert_eq!(msg, "failed: [path-redacted]");
	}

	#[test]
	fn redacts_home_path() {
		let msg = sanitize_path("open /home/alice/.scout/identity/key.pem: permission denied");
		assert_eq!(msg, "open [path-redacted]: permission denied");
	}

	#[test]
	fn leaves_plain_messages_untouched() {
		let msg = sanitize_path("element not found: selector '#submit'");
		assert_eq!(msg, "element not found: selector '#submit'");
	}

	#[test]
	fn redacts_multiple_paths_in_one_message() {
		let msg = sanitize_path("copy /tmp/a.txt to /var/log/b.txt failed");
		assert_eq!(msg, "copy [path-redacted] to [path-redacted] failed");
	}
}
