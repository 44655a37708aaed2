//! Screenshot/PDF capture and the `events` live-stream command (spec.md
//! §4.7, §4.6).

use std::path::PathBuf;

use serde::Serialize;

use scout_protocol::pb;

use crate::cli::{ConnectionArgs, ImageFormat};
use crate::error::{CliError, Result};
use crate::output::{print_result, OutputFormat, ResultBuilder};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BytesData {
	format: String,
	byte_count: usize,
	#[serde(skip_serializing_if = "Option::is_none")]
	path: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	data_base64: Option<String>,
}

fn emit_bytes(command: &str, format: OutputFormat, response: pb::BytesResponse, out: Option<PathBuf>) -> Result<()> {
	let byte_count = response.data.len();
	let path = match out {
		Some(path) => {
			std::fs::write(&path, &response.data)?;
			Some(path.to_string_lossy().into_owned())
		}
		None => None,
	};
	let data_base64 = if path.is_none() {
		use base64::Engine;
		Some(base64::engine::general_purpose::STANDARD.encode(&response.data))
	} else {
		None
	};

	print_result(
		&ResultBuilder::new(command)
			.data(BytesData {
				format: response.format,
				byte_count,
				path,
				data_base64,
			})
			.build(),
		format,
	);
	Ok(())
}

pub async fn screenshot(
	conn: &ConnectionArgs,
	format: OutputFormat,
	full_page: bool,
	image_format: ImageFormat,
	quality: Option<u32>,
	out: Option<PathBuf>,
) -> Result<()> {
	let session_id = super::resolve_session(&conn.session)?;
	let mut client = super::client(conn).await?;
	let wire_format = match image_format {
		ImageFormat::Png => pb::ScreenshotFormat::Png,
		ImageFormat::Jpeg => pb::ScreenshotFormat::Jpeg,
	};
	let response = client
		.screenshot(pb::ScreenshotRequest {
			session_id,
			full_page,
			format: wire_format as i32,
			quality: quality.unwrap_or(0),
		})
		.await
		.map_err(CliError::from)?
		.into_inner();
	emit_bytes("screenshot", format, response, out)
}

pub async fn pdf(conn: &ConnectionArgs, format: OutputFormat, out: Option<PathBuf>) -> Result<()> {
	let session_id = super::resolve_session(&conn.session)?;
	let mut client = super::client(conn).await?;
	let response = client.pdf(pb::SessionRef { session_id }).await.map_err(CliError::from)?.into_inner();
	emit_bytes("pdf", format, response, out)
}

/// Subscribes to a session's event stream and prints each event as a
/// JSON line until interrupted (spec.md §4.6 `StreamEvents`).
pub async fn events(conn: &ConnectionArgs, format: OutputFormat) -> Result<()> {
	use futures_util::StreamExt;

	let session_id = super::resolve_session(&conn.session)?;
	let mut client = super::client(conn).await?;
	let mut stream = client
		.stream_events(pb::SessionRef { session_id })
		.await
		.map_err(CliError::from)?
		.into_inner();

	while let Some(event) = stream.next().await {
		match event {
			Ok(event) => {
				if format == OutputFormat::Json {
					if let Ok(json) = serde_json::to_string(&crate::commands::har::event_to_json(&event)) {
						println!("{json}");
					}
				} else {
					println!("{:?}", event);
				}
			}
			Err(status) => return Err(CliError::Rpc(status)),
		}
	}
	Ok(())
}
