//! Command dispatch: each variant of [`crate::cli::Commands`] (other than
//! `Server`, handled directly in `main.rs`) maps to one function here
//! that dials the daemon, issues the RPC(s), and prints a
//! [`crate::output::CommandResult`].

mod capture;
mod har;
mod navigate;
mod pair;
mod query;
mod session;
mod trust;

use scout_protocol::pb::scout_client::ScoutClient;
use tonic::transport::Channel;

use crate::cli::{Cli, Commands, ConnectionArgs};
use crate::client::Connection;
use crate::daemon;
use crate::error::Result;

pub async fn dispatch(cli: Cli) -> Result<()> {
	let format = cli.format;
	let conn = &cli.connection;

	match cli.command {
		Commands::Server { .. } => unreachable!("handled in main.rs"),

		Commands::Session { action } => session::run(action, conn, format).await,

		Commands::Navigate { url } => navigate::navigate(conn, format, &url).await,
		Commands::Reload => navigate::reload(conn, format).await,
		Commands::Back => navigate::back(conn, format).await,
		Commands::Forward => navigate::forward(conn, format).await,

		Commands::Click(sel) => navigate::click(conn, format, "click", &sel).await,
		Commands::DoubleClick(sel) => navigate::click(conn, format, "doubleClick", &sel).await,
		Commands::RightClick(sel) => navigate::click(conn, format, "rightClick", &sel).await,
		Commands::Hover(sel) => navigate::click(conn, format, "hover", &sel).await,

		Commands::Type { selector, text, clear_first } => navigate::type_text(conn, format, &selector, &text, clear_first).await,
		Commands::SelectOption { selector, value } => navigate::select_option(conn, format, &selector, &value).await,
		Commands::PressKey { key_name } => navigate::press_key(conn, format, &key_name).await,

		Commands::Text(sel) => query::text(conn, format, &sel).await,
		Commands::Attribute { selector, attribute } => query::attribute(conn, format, &selector, &attribute).await,
		Commands::Title => query::title(conn, format).await,
		Commands::Url => query::url(conn, format).await,
		Commands::Exists(sel) => query::exists(conn, format, &sel).await,
		Commands::Eval { script } => query::eval(conn, format, &script).await,

		Commands::Screenshot {
			full_page,
			format: image_format,
			quality,
			out,
		} => capture::screenshot(conn, format, full_page, image_format, quality, out).await,
		Commands::Pdf { out } => capture::pdf(conn, format, out).await,

		Commands::Har { action } => har::run(action, conn, format).await,
		Commands::Events => capture::events(conn, format).await,

		Commands::Pair { peer } => pair::run(conn, format, &peer).await,
		Commands::Trust { action } => trust::run(action, conn, format).await,
	}
}

/// Resolves the session id a non-session command should operate on:
/// `--session` if given, else the current-session file (spec.md §4.10).
pub(crate) fn resolve_session(session_flag: &Option<String>) -> Result<String> {
	daemon::resolve_session(session_flag.as_deref())
}

/// Ensures a daemon is reachable and dials it with the connection flags
/// shared by every command.
pub(crate) async fn client(conn: &ConnectionArgs) -> Result<ScoutClient<Channel>> {
	Connection::connect(&conn.host, conn.port, conn.insecure, conn.data_dir.as_deref()).await
}
