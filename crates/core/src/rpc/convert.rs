//! Conversions between `scout-core`'s domain types and the generated
//! wire types in `scout_protocol::pb`.

use std::collections::HashMap;

use scout_protocol::pb;
use uuid::Uuid;

use crate::error::ScoutError;
use crate::event_bus::{BrowserEvent, BrowserEventKind};
use crate::session::SessionId;

/// Parses a wire `session_id` string into a [`SessionId`], surfacing a
/// malformed value as `InvalidArgument` rather than the generic
/// `NotFound` a bad UUID lookup would otherwise produce.
pub fn parse_session_id(raw: &str) -> Result<SessionId, ScoutError> {
	Uuid::parse_str(raw).map_err(|_| ScoutError::invalid_argument(format!("'{raw}' is not a valid session id")))
}

pub fn to_wire_event(event: BrowserEvent) -> pb::BrowserEvent {
	let kind = match event.kind {
		BrowserEventKind::RequestSent {
			request_id,
			method,
			url,
			headers,
			post_data,
			resource_type,
		} => pb::browser_event::Kind::RequestSent(pb::browser_event::RequestSent {
			request_id,
			method,
			url,
			headers: headers_to_map(headers),
			post_data,
			resource_type,
		}),
		BrowserEventKind::ResponseReceived {
			request_id,
			url,
			status,
			status_text,
			headers,
			mime_type,
			remote_ip,
			time_ms,
		} => pb::browser_event::Kind::ResponseReceived(pb::browser_event::ResponseReceived {
			request_id,
			url,
			status,
			status_text,
			headers: headers_to_map(headers),
			mime_type,
			remote_ip,
			time_ms,
		}),
		BrowserEventKind::Console { level, message } => {
			pb::browser_event::Kind::Console(pb::browser_event::Console { level, message })
		}
		BrowserEventKind::PageLifecycle { r#type, url } => {
			pb::browser_event::Kind::PageLifecycle(pb::browser_event::PageLifecycle { r#type, url })
		}
		BrowserEventKind::Error { source, message, code } => {
			pb::browser_event::Kind::Error(pb::browser_event::ErrorEvent { source, message, code })
		}
	};

	pb::BrowserEvent {
		session_id: event.session_id.to_string(),
		timestamp_ms_epoch: event.timestamp_ms_epoch,
		kind: Some(kind),
	}
}

fn headers_to_map(headers: Vec<(String, String)>) -> HashMap<String, String> {
	headers.into_iter().collect()
}
