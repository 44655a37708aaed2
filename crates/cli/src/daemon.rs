//! Daemon supervision (spec.md §4.10): detect a reachable daemon on a
//! local address, spawn one if absent, and track the child in a PID file.
//!
//! Reachability-probe-then-spawn: check for a live daemon, and if none
//! answers on a local address, launch one and wait for it to come up.

use std::net::TcpStream;
use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use scout::ScoutPaths;

use crate::error::{CliError, Result};

const REACHABILITY_TIMEOUT: Duration = Duration::from_secs(2);
const RAW_TCP_TIMEOUT: Duration = Duration::from_secs(3);
const SPAWN_POLL_INTERVAL: Duration = Duration::from_millis(250);
const SPAWN_POLL_ATTEMPTS: u32 = 20;

/// Is `host` one of the local-loopback spellings spec.md §4.10 names?
fn is_local(host: &str) -> bool {
	matches!(host, "" | "localhost" | "127.0.0.1" | "::1")
}

/// Probes `host:port` for a reachable daemon, spawning one (local
/// addresses only) if unreachable. Returns once a daemon is believed
/// reachable, or a [`CliError::DaemonStart`] if spawning failed or a
/// non-local daemon could not be raised.
pub async fn ensure_reachable(host: &str, port: u16) -> Result<()> {
	if probe_grpc(host, port).await {
		debug!(target = "scout.cli.daemon", %host, port, "daemon already reachable");
		return Ok(());
	}

	if !is_local(host) {
		debug!(target = "scout.cli.daemon", %host, port, "grpc probe failed, falling back to raw TCP connect");
		if probe_raw_tcp(host, port) {
			return Ok(());
		}
		return Err(CliError::DaemonStart(format!("{host}:{port}")));
	}

	debug!(target = "scout.cli.daemon", %host, port, "no local daemon reachable, spawning one");
	spawn_local(port)?;

	for attempt in 0..SPAWN_POLL_ATTEMPTS {
		tokio::time::sleep(SPAWN_POLL_INTERVAL).await;
		if probe_grpc(host, port).await {
			debug!(target = "scout.cli.daemon", attempt, "spawned daemon became reachable");
			return Ok(());
		}
	}

	Err(CliError::DaemonStart(format!("{host}:{port}")))
}

/// Opens a plaintext TCP connection and waits for the 2-second budget
/// spec.md §4.10 names for the reachability probe; full mTLS/gRPC framing
/// is not required to establish that *something* is listening, since a
/// secured daemon still accepts the TCP handshake before the TLS layer
/// rejects an untrusted peer.
async fn probe_grpc(host: &str, port: u16) -> bool {
	let addr = format!("{}:{port}", if host.is_empty() { "127.0.0.1" } else { host });
	tokio::time::timeout(REACHABILITY_TIMEOUT, tokio::net::TcpStream::connect(addr))
		.await
		.map(|r| r.is_ok())
		.unwrap_or(false)
}

fn probe_raw_tcp(host: &str, port: u16) -> bool {
	let addr = format!("{host}:{port}");
	match addr.parse() {
		Ok(socket_addr) => TcpStream::connect_timeout(&socket_addr, RAW_TCP_TIMEOUT).is_ok(),
		Err(_) => std::net::ToSocketAddrs::to_socket_addrs(&addr)
			.ok()
			.and_then(|mut it| it.next())
			.map(|socket_addr| TcpStream::connect_timeout(&socket_addr, RAW_TCP_TIMEOUT).is_ok())
			.unwrap_or(false),
	}
}

/// Re-execs the current binary as `server --port <port> --insecure`,
/// detached from the session's process group, and records its pid
/// (spec.md §4.10 step 3).
fn spawn_local(port: u16) -> Result<()> {
	let exe = std::env::current_exe()?;
	let mut cmd = std::process::Command::new(exe);
	cmd.args(["server", "--port", &port.to_string(), "--insecure"]);
	cmd.stdin(std::process::Stdio::null());
	cmd.stdout(std::process::Stdio::null());
	cmd.stderr(std::process::Stdio::null());

	#[cfg(unix)]
	{
		use std::os::unix::process::CommandExt;
		// Detach into its own process group so the spawned daemon survives
		// the CLI process exiting (spec.md §4.10 "detach from the process
		// group on non-Windows").
		cmd.process_group(0);
	}

	let child = cmd.spawn()?;
	write_pid_file(child.id())?;
	Ok(())
}

fn write_pid_file(pid: u32) -> Result<()> {
	let paths = ScoutPaths::resolve()?;
	paths.ensure()?;
	std::fs::write(paths.daemon_pid_file(), pid.to_string())?;
	Ok(())
}

/// `<home>/.scout/current-session` (spec.md §4.10, §6): `session use <id>`
/// overwrites it, `resolveSession(flag)` reads it as the fallback.
pub fn current_session_file() -> Result<PathBuf> {
	let paths = ScoutPaths::resolve()?;
	Ok(paths.current_session_file())
}

/// `resolveSession(flag)`: the flag if present, else the current-session
/// file's contents (trailing whitespace stripped), else `NoActiveSession`
/// (spec.md §4.10).
pub fn resolve_session(flag: Option<&str>) -> Result<String> {
	if let Some(id) = flag {
		if !id.is_empty() {
			return Ok(id.to_string());
		}
	}
	let path = current_session_file()?;
	match std::fs::read_to_string(&path) {
		Ok(contents) => {
			let trimmed = contents.trim().to_string();
			if trimmed.is_empty() {
				Err(CliError::NoActiveSession)
			} else {
				Ok(trimmed)
			}
		}
		Err(_) => Err(CliError::NoActiveSession),
	}
}

/// `session use <id>`: overwrites the current-session file.
pub fn set_current_session(id: &str) -> Result<()> {
	let paths = ScoutPaths::resolve()?;
	paths.ensure()?;
	std::fs::write(paths.current_session_file(), id)?;
	Ok(())
}
