//! Navigation and interaction commands (spec.md §4.5): navigate/reload/
//! back/forward, the click family, typing, select, and key press.

use serde::Serialize;

use scout_protocol::pb;

use crate::cli::{ConnectionArgs, SelectorArgs};
use crate::error::{CliError, Result};
use crate::output::{print_result, OutputFormat, ResultBuilder};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NavigateResult {
	url: String,
	title: String,
}

fn print_navigate_result(format: OutputFormat, command: &str, response: pb::NavigateResponse) {
	let result = ResultBuilder::new(command)
		.data(NavigateResult {
			url: response.url,
			title: response.title,
		})
		.build();
	print_result(&result, format);
}

pub async fn navigate(conn: &ConnectionArgs, format: OutputFormat, url: &str) -> Result<()> {
	let session_id = super::resolve_session(&conn.session)?;
	let mut client = super::client(conn).await?;
	let response = client
		.navigate(pb::NavigateRequest {
			session_id,
			url: url.to_string(),
		})
		.await
		.map_err(CliError::from)?
		.into_inner();
	print_navigate_result(format, "navigate", response);
	Ok(())
}

pub async fn reload(conn: &ConnectionArgs, format: OutputFormat) -> Result<()> {
	let session_id = super::resolve_session(&conn.session)?;
	let mut client = super::client(conn).await?;
	let response = client.reload(pb::SessionRef { session_id }).await.map_err(CliError::from)?.into_inner();
	print_navigate_result(format, "reload", response);
	Ok(())
}

pub async fn back(conn: &ConnectionArgs, format: OutputFormat) -> Result<()> {
	let session_id = super::resolve_session(&conn.session)?;
	let mut client = super::client(conn).await?;
	let response = client.go_back(pb::SessionRef { session_id }).await.map_err(CliError::from)?.into_inner();
	print_navigate_result(format, "back", response);
	Ok(())
}

pub async fn forward(conn: &ConnectionArgs, format: OutputFormat) -> Result<()> {
	let session_id = super::resolve_session(&conn.session)?;
	let mut client = super::client(conn).await?;
	let response = client.go_forward(pb::SessionRef { session_id }).await.map_err(CliError::from)?.into_inner();
	print_navigate_result(format, "forward", response);
	Ok(())
}

pub async fn click(conn: &ConnectionArgs, format: OutputFormat, command: &str, sel: &SelectorArgs) -> Result<()> {
	let session_id = super::resolve_session(&conn.session)?;
	let mut client = super::client(conn).await?;
	let selector = pb::ElementSelector {
		session_id,
		selector: sel.selector.clone(),
		xpath: sel.xpath,
	};

	match command {
		"click" => client.click(selector).await,
		"doubleClick" => client.double_click(selector).await,
		"rightClick" => client.right_click(selector).await,
		"hover" => client.hover(selector).await,
		other => unreachable!("unhandled click-family command: {other}"),
	}
	.map_err(CliError::from)?;

	let result = ResultBuilder::<()>::new(command).build();
	print_result(&result, format);
	Ok(())
}

pub async fn type_text(conn: &ConnectionArgs, format: OutputFormat, sel: &SelectorArgs, text: &str, clear_first: bool) -> Result<()> {
	let session_id = super::resolve_session(&conn.session)?;
	let mut client = super::client(conn).await?;
	client
		.r#type(pb::TypeRequest {
			session_id,
			selector: sel.selector.clone(),
			xpath: sel.xpath,
			text: text.to_string(),
			clear_first,
		})
		.await
		.map_err(CliError::from)?;

	let result = ResultBuilder::<()>::new("type").build();
	print_result(&result, format);
	Ok(())
}

pub async fn select_option(conn: &ConnectionArgs, format: OutputFormat, sel: &SelectorArgs, value: &str) -> Result<()> {
	let session_id = super::resolve_session(&conn.session)?;
	let mut client = super::client(conn).await?;
	client
		.select_option(pb::SelectOptionRequest {
			session_id,
			selector: sel.selector.clone(),
			xpath: sel.xpath,
			value: value.to_string(),
		})
		.await
		.map_err(CliError::from)?;

	let result = ResultBuilder::<()>::new("selectOption").build();
	print_result(&result, format);
	Ok(())
}

pub async fn press_key(conn: &ConnectionArgs, format: OutputFormat, key_name: &str) -> Result<()> {
	let session_id = super::resolve_session(&conn.session)?;
	let mut client = super::client(conn).await?;
	client
		.press_key(pb::PressKeyRequest {
			session_id,
			key_name: key_name.to_string(),
		})
		.await
		.map_err(CliError::from)?;

	let result = ResultBuilder::<()>::new("pressKey").build();
	print_result(&result, format);
	Ok(())
}
