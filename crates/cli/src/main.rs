//! Entry point: parses arguments, sets up logging, and dispatches to a
//! command handler, printing a [`output::CommandResult`] envelope and
//! mapping every error through [`error::CliError`] (SPEC_FULL.md §A).

mod cli;
mod client;
mod commands;
mod daemon;
mod error;
mod logging;
mod output;
mod server;
mod styles;
mod transport;

use clap::Parser;

use cli::{Cli, Commands};
use output::OutputFormat;

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	if let Commands::Server { port, pairing_port } = &cli.command {
		let args = server::ServerArgs {
			port: *port,
			pairing_port: *pairing_port,
			insecure: cli.connection.insecure,
			data_dir: cli.connection.data_dir.clone(),
		};
		if let Err(err) = server::run(args).await {
			output::print_error_stderr(&err.to_command_error());
			std::process::exit(1);
		}
		return;
	}

	let format = cli.format;
	match commands::dispatch(cli).await {
		Ok(()) => {}
		Err(err) => {
			if format == OutputFormat::Json {
				let result: output::EmptyResult = output::CommandResult {
					ok: false,
					command: "scout".to_string(),
					data: None,
					error: Some(err.to_command_error()),
					duration_ms: None,
				};
				output::print_result(&result, format);
			} else {
				output::print_error_stderr(&err.to_command_error());
			}
			std::process::exit(1);
		}
	}
}
