//! Reserved on-disk layout (spec.md §6): `<home>/.scout/...`.
//!
//! A single typed accessor, the way `pw-cli`'s `workspace.rs` resolves its
//! config/workspace directories — no additional config file format is
//! introduced here, only the paths spec.md itself names.

use std::path::PathBuf;

use crate::error::{ErrorCode, ScoutError};

/// Resolved locations under `<home>/.scout/`.
#[derive(Debug, Clone)]
pub struct ScoutPaths {
	root: PathBuf,
}

impl ScoutPaths {
	/// Resolves `<home>/.scout` using the platform home directory.
	pub fn resolve() -> Result<Self, ScoutError> {
		let home = dirs::home_dir().ok_or_else(|| {
			ScoutError::new(ErrorCode::Internal, "could not determine home directory")
		})?;
		Ok(Self::with_root(home.join(".scout")))
	}

	/// Builds a `ScoutPaths` rooted at an arbitrary directory (tests, or an
	/// explicit `--data-dir` override at the CLI surface).
	pub fn with_root(root: PathBuf) -> Self {
		Self { root }
	}

	pub fn root(&self) -> &std::path::Path {
		&self.root
	}

	pub fn identity_dir(&self) -> PathBuf {
		self.root.join("identity")
	}

	pub fn trusted_dir(&self) -> PathBuf {
		self.root.join("trusted")
	}

	pub fn sessions_dir(&self) -> PathBuf {
		self.root.join("sessions")
	}

	pub fn current_session_file(&self) -> PathBuf {
		self.root.join("current-session")
	}

	pub fn daemon_pid_file(&self) -> PathBuf {
		self.root.join("daemon.pid")
	}

	/// Creates `root` (mode 0755) and its direct children if they don't
	/// already exist.
	pub fn ensure(&self) -> std::io::Result<()> {
		create_dir(&self.root, 0o755)?;
		create_dir(&self.identity_dir(), 0o700)?;
		create_dir(&self.trusted_dir(), 0o700)?;
		create_dir(&self.sessions_dir(), 0o700)?;
		Ok(())
	}
}

#[cfg(unix)]
fn create_dir(path: &std::path::Path, mode: u32) -> std::io::Result<()> {
	use std::os::unix::fs::DirBuilderExt;
	if path.exists() {
		return Ok(());
	}
	std::fs::DirBuilder::new()
		.mode(mode)
		.recursive(true)
		.create(path)
}

#[cfg(not(unix))]
fn create_dir(path: &std::path::Path, _mode: u32) -> std::io::Result<()> {
	std::fs::create_dir_all(path)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn ensure_creates_reserved_subdirectories() {
		let dir = tempfile::tempdir().unwrap();
		let paths = ScoutPaths::with_root(dir.path().join(".scout"));
		paths.ensure().unwrap();

		assert!(paths.identity_dir().is_dir());
		assert!(paths.trusted_dir().is_dir());
		assert!(paths.sessions_dir().is_dir());
	}
}
