//! Maps [`ScoutError`]'s stable taxonomy onto `tonic::Status` (spec.md §7:
//! "a stable code the RPC layer maps to a `tonic::Code`").

use tonic::{Code, Status};

use crate::error::{ErrorCode, ScoutError};

pub fn to_status(err: ScoutError) -> Status {
	let code = match err.code {
		ErrorCode::NotFound => Code::NotFound,
		ErrorCode::AlreadyExists => Code::AlreadyExists,
		ErrorCode::FailedPrecondition => Code::FailedPrecondition,
		ErrorCode::InvalidArgument => Code::InvalidArgument,
		ErrorCode::Internal => Code::Internal,
		ErrorCode::Unauthenticated => Code::Unauthenticated,
		ErrorCode::PermissionDenied => Code::PermissionDenied,
		ErrorCode::Canceled => Code::Cancelled,
		ErrorCode::DeadlineExceeded => Code::DeadlineExceeded,
	};
	Status::new(code, err.message)
}

/// The reverse mapping's label, used to tag `Interactive` stream error
/// events (spec.md §4.9 "command errors wrapped as `Error` events").
pub fn code_label(code: ErrorCode) -> &'static str {
	match code {
		ErrorCode::NotFound => "NOT_FOUND",
		ErrorCode::AlreadyExists => "ALREADY_EXISTS",
		ErrorCode::FailedPrecondition => "FAILED_PRECONDITION",
		ErrorCode::InvalidArgument => "INVALID_ARGUMENT",
		ErrorCode::Internal => "INTERNAL",
		ErrorCode::Unauthenticated => "UNAUTHENTICATED",
		ErrorCode::PermissionDenied => "PERMISSION_DENIED",
		ErrorCode::Canceled => "CANCELED",
		ErrorCode::DeadlineExceeded => "DEADLINE_EXCEEDED",
	}
}
