//! `tracing` setup for the CLI/daemon process (SPEC_FULL.md §B).
//!
//! Verbosity maps to an `EnvFilter` string: quiet by default, `-v`
//! surfaces info from this crate while keeping the core's chatter at
//! warn, `-vv` turns on debug everywhere.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

pub fn init_logging(verbosity: u8) {
	let filter = match verbosity {
		0 => "error,scout=off,scout_runtime=off",
		1 => "info,scout=warn,scout_runtime=warn",
		_ => "debug",
	};

	let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
	let stderr = std::io::stderr.with_max_level(tracing::Level::TRACE);

	tracing_subscriber::fmt()
		.with_env_filter(env_filter)
		.with_writer(stderr)
		.with_target(true)
		.with_level(true)
		.compact()
		.init();
}
