//! CLI-level error type: wraps RPC failures and the client-side failures
//! that never reach the daemon (no active session, daemon unreachable),
//! mirroring `scout::ScoutError`'s own `{code, message}` split one layer
//! up (SPEC_FULL.md §C): a stable code plus a human-readable message.

use thiserror::Error;

use crate::output::CommandError;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
	#[error("no active session; pass --session or run `scout session use <id>`")]
	NoActiveSession,

	#[error("could not reach or start a daemon at {0}")]
	DaemonStart(String),

	#[error("malformed device id: {0}")]
	InvalidDeviceId(String),

	#[error(transparent)]
	Rpc(#[from] tonic::Status),

	#[error(transparent)]
	Transport(#[from] tonic::transport::Error),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),

	#[error(transparent)]
	Core(#[from] scout::ScoutError),

	#[error(transparent)]
	Anyhow(#[from] anyhow::Error),
}

impl CliError {
	pub fn to_command_error(&self) -> CommandError {
		let (code, message) = match self {
			CliError::NoActiveSession => ("NO_ACTIVE_SESSION".to_string(), self.to_string()),
			CliError::DaemonStart(_) => ("DAEMON_START_FAILED".to_string(), self.to_string()),
			CliError::InvalidDeviceId(_) => ("INVALID_ARGUMENT".to_string(), self.to_string()),
			CliError::Rpc(status) => (status_code_label(status.code()), status.message().to_string()),
			CliError::Core(err) => (scout::rpc::error_map::code_label(err.code).to_string(), err.message.clone()),
			CliError::Transport(err) => ("UNAVAILABLE".to_string(), err.to_string()),
			CliError::Io(err) => ("IO_ERROR".to_string(), err.to_string()),
			CliError::Json(err) => ("INTERNAL".to_string(), err.to_string()),
			CliError::Anyhow(err) => ("INTERNAL".to_string(), err.to_string()),
		};
		CommandError { code, message }
	}
}

fn status_code_label(code: tonic::Code) -> String {
	use tonic::Code;
	match code {
		Code::NotFound => "NOT_FOUND",
		Code::AlreadyExists => "ALREADY_EXISTS",
		Code::FailedPrecondition => "FAILED_PRECONDITION",
		Code::InvalidArgument => "INVALID_ARGUMENT",
		Code::Unauthenticated => "UNAUTHENTICATED",
		Code::PermissionDenied => "PERMISSION_DENIED",
		Code::Cancelled => "CANCELED",
		Code::DeadlineExceeded => "DEADLINE_EXCEEDED",
		_ => "INTERNAL",
	}
	.to_string()
}
