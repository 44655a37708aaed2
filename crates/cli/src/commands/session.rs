//! `scout session {create, use, destroy, current}` (spec.md §4.5, §4.10).

use serde::Serialize;

use scout_protocol::pb;

use crate::cli::{ConnectionArgs, CreateSessionArgs, SessionCommand};
use crate::daemon;
use crate::error::{CliError, Result};
use crate::output::{print_result, OutputFormat, ResultBuilder};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionCreated {
	session_id: String,
	url: String,
	title: String,
}

pub async fn run(action: SessionCommand, conn: &ConnectionArgs, format: OutputFormat) -> Result<()> {
	match action {
		SessionCommand::Create(args) => create(conn, format, args).await,
		SessionCommand::Use { session_id } => use_session(format, &session_id),
		SessionCommand::Destroy { session_id } => destroy(conn, format, session_id).await,
		SessionCommand::Current => current(format),
	}
}

async fn create(conn: &ConnectionArgs, format: OutputFormat, args: CreateSessionArgs) -> Result<()> {
	let mut client = super::client(conn).await?;
	let opts = pb::CreateSessionOptions {
		headless: args.headless,
		stealth: args.stealth,
		user_agent: args.user_agent.unwrap_or_default(),
		proxy: args.proxy.unwrap_or_default(),
		window_width: args.window_width.unwrap_or(0),
		window_height: args.window_height.unwrap_or(0),
		user_data_dir: args.user_data_dir.map(|p| p.to_string_lossy().into_owned()).unwrap_or_default(),
		extra_extensions: Vec::new(),
		no_sandbox: args.no_sandbox,
		record: args.record,
	};

	let response = client.create_session(opts).await.map_err(CliError::from)?.into_inner();
	daemon::set_current_session(&response.session_id)?;

	let result = ResultBuilder::new("session.create")
		.data(SessionCreated {
			session_id: response.session_id,
			url: response.url,
			title: response.title,
		})
		.build();
	print_result(&result, format);
	Ok(())
}

fn use_session(format: OutputFormat, session_id: &str) -> Result<()> {
	daemon::set_current_session(session_id)?;
	let result = ResultBuilder::<()>::new("session.use").build();
	print_result(&result, format);
	Ok(())
}

async fn destroy(conn: &ConnectionArgs, format: OutputFormat, session_id: Option<String>) -> Result<()> {
	let id = match session_id {
		Some(id) => id,
		None => super::resolve_session(&None)?,
	};
	let mut client = super::client(conn).await?;
	client
		.destroy_session(pb::SessionRef { session_id: id })
		.await
		.map_err(CliError::from)?;

	let result = ResultBuilder::<()>::new("session.destroy").build();
	print_result(&result, format);
	Ok(())
}

fn current(format: OutputFormat) -> Result<()> {
	#[derive(Serialize)]
	struct Current {
		session_id: Option<String>,
	}
	let session_id = daemon::resolve_session(None).ok();
	let result = ResultBuilder::new("session.current").data(Current { session_id }).build();
	print_result(&result, format);
	Ok(())
}
