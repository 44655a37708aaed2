//! The `scout` command tree (SPEC_FULL.md §A), built the way the
//! one `Cli` root with global connection/output flags, one `Commands`
//! enum per top-level verb, nested enums for command groups.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "scout", version, about = "Scout: a fleet of browser-automation daemons", styles = crate::styles::cli_styles())]
pub struct Cli {
	#[command(flatten)]
	pub connection: ConnectionArgs,

	/// Output format for command results.
	#[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
	pub format: OutputFormat,

	/// Increase logging verbosity (-v, -vv).
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Debug, Args)]
pub struct ConnectionArgs {
	/// Daemon host (spec.md §4.10 "local address check").
	#[arg(long, global = true, default_value = "127.0.0.1")]
	pub host: String,

	/// Daemon main-service port (spec.md §6 "Port defaults").
	#[arg(long, global = true, default_value_t = 50051)]
	pub port: u16,

	/// Skip mTLS and talk plaintext (only meaningful against a daemon
	/// also started with `--insecure`).
	#[arg(long, global = true)]
	pub insecure: bool,

	/// Override `<home>/.scout` for identity/trust/session-pointer state.
	#[arg(long, global = true)]
	pub data_dir: Option<PathBuf>,

	/// Session id; falls back to the current-session file (spec.md
	/// §4.10 `resolveSession`).
	#[arg(long, short = 's', global = true)]
	pub session: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
	/// Runs the daemon in the foreground (normally spawned automatically).
	Server {
		/// Main-service port (mTLS, or plaintext under `--insecure`;
		/// spec.md §6 "Port defaults" names 50051).
		#[arg(long, default_value_t = 50051)]
		port: u16,
		/// Unauthenticated pairing-service port (spec.md §9 "do not multiplex").
		#[arg(long, default_value_t = 50052)]
		pairing_port: u16,
	},

	/// Session lifecycle.
	Session {
		#[command(subcommand)]
		action: SessionCommand,
	},

	/// Navigates the current (or `--session`) session to a URL.
	Navigate { url: String },
	/// Reloads the current page.
	Reload,
	/// Navigates back in session history.
	Back,
	/// Navigates forward in session history.
	Forward,

	/// Clicks an element.
	Click(SelectorArgs),
	/// Double-clicks an element.
	DoubleClick(SelectorArgs),
	/// Right-clicks an element.
	RightClick(SelectorArgs),
	/// Hovers over an element.
	Hover(SelectorArgs),

	/// Types text into an element.
	Type {
		#[command(flatten)]
		selector: SelectorArgs,
		text: String,
		/// Clears the field before typing.
		#[arg(long)]
		clear_first: bool,
	},
	/// Selects an `<option>` by value.
	SelectOption {
		#[command(flatten)]
		selector: SelectorArgs,
		value: String,
	},
	/// Sends a single named key press (e.g. `Enter`, `Tab`).
	PressKey { key_name: String },

	/// Reads an element's text content.
	Text(SelectorArgs),
	/// Reads an element attribute.
	Attribute {
		#[command(flatten)]
		selector: SelectorArgs,
		attribute: String,
	},
	/// Reads the page title.
	Title,
	/// Reads the current URL.
	Url,
	/// Tests whether an element exists.
	Exists(SelectorArgs),

	/// Evaluates a JavaScript expression and prints its JSON result.
	Eval { script: String },

	/// Captures a screenshot.
	Screenshot {
		#[arg(long)]
		full_page: bool,
		#[arg(long = "image-format", value_enum, default_value_t = ImageFormat::Png)]
		format: ImageFormat,
		#[arg(long)]
		quality: Option<u32>,
		/// Writes the bytes to this path instead of base64-encoding them
		/// into the JSON result.
		#[arg(long)]
		out: Option<PathBuf>,
	},
	/// Renders the page to PDF.
	Pdf {
		#[arg(long)]
		out: Option<PathBuf>,
	},

	/// Network-capture (HAR) lifecycle.
	Har {
		#[command(subcommand)]
		action: HarCommand,
	},

	/// Streams a session's browser events to stdout until interrupted.
	Events,

	/// Pairs with a peer daemon's unauthenticated pairing listener
	/// (spec.md §4.3).
	Pair {
		/// The peer's pairing-service address (`host:port`).
		peer: String,
	},

	/// Trust-store administration (spec.md §4.2).
	Trust {
		#[command(subcommand)]
		action: TrustCommand,
	},
}

#[derive(Debug, Subcommand)]
pub enum SessionCommand {
	/// Creates a new session and makes it current.
	Create(CreateSessionArgs),
	/// Sets the current-session pointer without creating anything.
	Use { session_id: String },
	/// Destroys a session.
	Destroy { session_id: Option<String> },
	/// Prints the currently-selected session id, if any.
	Current,
}

#[derive(Debug, Args)]
pub struct CreateSessionArgs {
	#[arg(long)]
	pub headless: bool,
	#[arg(long)]
	pub stealth: bool,
	#[arg(long)]
	pub user_agent: Option<String>,
	#[arg(long)]
	pub proxy: Option<String>,
	#[arg(long)]
	pub window_width: Option<u32>,
	#[arg(long)]
	pub window_height: Option<u32>,
	#[arg(long)]
	pub user_data_dir: Option<PathBuf>,
	#[arg(long)]
	pub no_sandbox: bool,
	/// Starts network recording immediately (spec.md §4.8).
	#[arg(long)]
	pub record: bool,
	#[arg(long)]
	pub capture_body: bool,
}

#[derive(Debug, Subcommand)]
pub enum HarCommand {
	Start {
		#[arg(long)]
		capture_body: bool,
	},
	Stop,
	Export {
		#[arg(long)]
		out: Option<PathBuf>,
	},
}

#[derive(Debug, Subcommand)]
pub enum TrustCommand {
	/// Lists trusted peer devices.
	List,
	/// Removes a trusted peer by device id.
	Remove { device_id: String },
	/// Imports a peer certificate directly (spec.md §4.2 "admin action"),
	/// bypassing the pairing exchange.
	Import {
		device_id: String,
		/// Path to the peer's DER-encoded certificate.
		cert_der_path: PathBuf,
	},
}

#[derive(Debug, Args)]
pub struct SelectorArgs {
	pub selector: String,
	/// Interprets `selector` as an XPath expression instead of CSS.
	#[arg(long)]
	pub xpath: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ImageFormat {
	Png,
	Jpeg,
}
