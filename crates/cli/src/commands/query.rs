//! Read-only queries: text/attribute/title/url/exists, and `eval`
//! (spec.md §4.5, §4.7).

use serde::Serialize;
use serde_json::Value;

use scout_protocol::pb;

use crate::cli::{ConnectionArgs, SelectorArgs};
use crate::error::{CliError, Result};
use crate::output::{print_result, OutputFormat, ResultBuilder};

#[derive(Serialize)]
struct TextData {
	text: String,
}

#[derive(Serialize)]
struct BoolData {
	value: bool,
}

pub async fn text(conn: &ConnectionArgs, format: OutputFormat, sel: &SelectorArgs) -> Result<()> {
	let session_id = super::resolve_session(&conn.session)?;
	let mut client = super::client(conn).await?;
	let response = client
		.get_text(pb::ElementSelector {
			session_id,
			selector: sel.selector.clone(),
			xpath: sel.xpath,
		})
		.await
		.map_err(CliError::from)?
		.into_inner();
	print_result(&ResultBuilder::new("text").data(TextData { text: response.text }).build(), format);
	Ok(())
}

pub async fn attribute(conn: &ConnectionArgs, format: OutputFormat, sel: &SelectorArgs, attribute: &str) -> Result<()> {
	let session_id = super::resolve_session(&conn.session)?;
	let mut client = super::client(conn).await?;
	let response = client
		.get_attribute(pb::GetAttributeRequest {
			session_id,
			selector: sel.selector.clone(),
			xpath: sel.xpath,
			attribute: attribute.to_string(),
		})
		.await
		.map_err(CliError::from)?
		.into_inner();
	print_result(&ResultBuilder::new("attribute").data(TextData { text: response.text }).build(), format);
	Ok(())
}

pub async fn title(conn: &ConnectionArgs, format: OutputFormat) -> Result<()> {
	let session_id = super::resolve_session(&conn.session)?;
	let mut client = super::client(conn).await?;
	let response = client.get_title(pb::SessionRef { session_id }).await.map_err(CliError::from)?.into_inner();
	print_result(&ResultBuilder::new("title").data(TextData { text: response.text }).build(), format);
	Ok(())
}

pub async fn url(conn: &ConnectionArgs, format: OutputFormat) -> Result<()> {
	let session_id = super::resolve_session(&conn.session)?;
	let mut client = super::client(conn).await?;
	let response = client.get_url(pb::SessionRef { session_id }).await.map_err(CliError::from)?.into_inner();
	print_result(&ResultBuilder::new("url").data(TextData { text: response.text }).build(), format);
	Ok(())
}

pub async fn exists(conn: &ConnectionArgs, format: OutputFormat, sel: &SelectorArgs) -> Result<()> {
	let session_id = super::resolve_session(&conn.session)?;
	let mut client = super::client(conn).await?;
	let response = client
		.element_exists(pb::ElementSelector {
			session_id,
			selector: sel.selector.clone(),
			xpath: sel.xpath,
		})
		.await
		.map_err(CliError::from)?
		.into_inner();
	print_result(&ResultBuilder::new("exists").data(BoolData { value: response.value }).build(), format);
	Ok(())
}

pub async fn eval(conn: &ConnectionArgs, format: OutputFormat, script: &str) -> Result<()> {
	let session_id = super::resolve_session(&conn.session)?;
	let mut client = super::client(conn).await?;
	let response = client
		.eval(pb::EvalRequest {
			session_id,
			script: script.to_string(),
		})
		.await
		.map_err(CliError::from)?
		.into_inner();

	let value: Value = serde_json::from_str(&response.result_json).unwrap_or(Value::Null);
	print_result(&ResultBuilder::new("eval").data(value).build(), format);
	Ok(())
}
