//! HAR network-capture lifecycle: `start`/`stop`/`export` (spec.md §4.8).
//!
//! Also hosts [`event_to_json`], the manual `pb::BrowserEvent -> JSON`
//! projection the `events` command uses: the generated `pb` types carry
//! no `serde::Serialize` impl (SPEC_FULL.md §A — wire types only, no
//! display concerns), so the CLI's own display layer owns this mapping.

use std::path::PathBuf;

use serde_json::{json, Value};

use scout_protocol::pb;

use crate::cli::{ConnectionArgs, HarCommand};
use crate::error::{CliError, Result};
use crate::output::{print_result, OutputFormat, ResultBuilder};

pub async fn run(action: HarCommand, conn: &ConnectionArgs, format: OutputFormat) -> Result<()> {
	match action {
		HarCommand::Start { capture_body } => start(conn, format, capture_body).await,
		HarCommand::Stop => stop(conn, format).await,
		HarCommand::Export { out } => export(conn, format, out).await,
	}
}

async fn start(conn: &ConnectionArgs, format: OutputFormat, capture_body: bool) -> Result<()> {
	let session_id = super::resolve_session(&conn.session)?;
	let mut client = super::client(conn).await?;
	client
		.start_recording(pb::StartRecordingRequest { session_id, capture_body })
		.await
		.map_err(CliError::from)?;
	print_result(&ResultBuilder::<()>::new("har.start").build(), format);
	Ok(())
}

async fn stop(conn: &ConnectionArgs, format: OutputFormat) -> Result<()> {
	let session_id = super::resolve_session(&conn.session)?;
	let mut client = super::client(conn).await?;
	client.stop_recording(pb::SessionRef { session_id }).await.map_err(CliError::from)?;
	print_result(&ResultBuilder::<()>::new("har.stop").build(), format);
	Ok(())
}

async fn export(conn: &ConnectionArgs, format: OutputFormat, out: Option<PathBuf>) -> Result<()> {
	use serde::Serialize;

	#[derive(Serialize)]
	#[serde(rename_all = "camelCase")]
	struct HarData {
		entry_count: u32,
		#[serde(skip_serializing_if = "Option::is_none")]
		path: Option<String>,
		#[serde(skip_serializing_if = "Option::is_none")]
		har: Option<Value>,
	}

	let session_id = super::resolve_session(&conn.session)?;
	let mut client = super::client(conn).await?;
	let response = client.export_har(pb::SessionRef { session_id }).await.map_err(CliError::from)?.into_inner();

	let (path, har) = match out {
		Some(path) => {
			std::fs::write(&path, &response.data)?;
			(Some(path.to_string_lossy().into_owned()), None)
		}
		None => {
			let har: Value = serde_json::from_slice(&response.data)?;
			(None, Some(har))
		}
	};

	print_result(
		&ResultBuilder::new("har.export")
			.data(HarData {
				entry_count: response.entry_count,
				path,
				har,
			})
			.build(),
		format,
	);
	Ok(())
}

/// Projects one wire [`pb::BrowserEvent`] into the JSON line the `events`
/// command prints.
pub(crate) fn event_to_json(event: &pb::BrowserEvent) -> Value {
	use pb::browser_event::Kind;

	let kind = match &event.kind {
		Some(Kind::RequestSent(e)) => json!({
			"kind": "requestSent",
			"requestId": e.request_id,
			"method": e.method,
			"url": e.url,
			"headers": e.headers,
			"postData": e.post_data,
			"resourceType": e.resource_type,
		}),
		Some(Kind::ResponseReceived(e)) => json!({
			"kind": "responseReceived",
			"requestId": e.request_id,
			"url": e.url,
			"status": e.status,
			"statusText": e.status_text,
			"headers": e.headers,
			"mimeType": e.mime_type,
			"remoteIp": e.remote_ip,
			"timeMs": e.time_ms,
		}),
		Some(Kind::Console(e)) => json!({
			"kind": "console",
			"level": e.level,
			"message": e.message,
		}),
		Some(Kind::PageLifecycle(e)) => json!({
			"kind": "pageLifecycle",
			"type": e.r#type,
			"url": e.url,
		}),
		Some(Kind::Error(e)) => json!({
			"kind": "error",
			"source": e.source,
			"message": e.message,
			"code": e.code,
		}),
		None => json!({ "kind": "unknown" }),
	};

	json!({
		"sessionId": event.session_id,
		"timestampMsEpoch": event.timestamp_ms_epoch,
		"event": kind,
	})
}
