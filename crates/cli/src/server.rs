//! The daemon binary's process glue (spec.md §4.9, §4.3, §9): wires
//! `scout-core`'s domain types into two separate listeners — the mTLS
//! main service and an unauthenticated pairing service that must never
//! share a port with it.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

use scout::pairing::PairingService;
use scout::rpc::{PairingRpcService, ScoutService, MAX_MESSAGE_SIZE_BYTES};
use scout::tls::TransportCreds;
use scout::{Identity, ScoutPaths, SessionManager, TrustStore};
use scout_protocol::pb::pairing_server::PairingServer;
use scout_protocol::pb::scout_server::ScoutServer;

use crate::error::Result;
use crate::transport;

pub struct ServerArgs {
	pub port: u16,
	pub pairing_port: u16,
	pub insecure: bool,
	pub data_dir: Option<std::path::PathBuf>,
}

/// Runs the daemon until its process receives a shutdown signal
/// (Ctrl-C), then drains every open session before returning (spec.md
/// §4.10 "graceful shutdown drains sessions", SPEC_FULL.md §F.6).
pub async fn run(args: ServerArgs) -> Result<()> {
	let paths = match &args.data_dir {
		Some(root) => ScoutPaths::with_root(root.clone()),
		None => ScoutPaths::resolve()?,
	};
	paths.ensure()?;

	let identity = Identity::load_or_generate(&paths.identity_dir())?;
	let trust_store = TrustStore::new(paths.trusted_dir());
	info!(target = "scout.server", device_id = %identity.device_id, "identity loaded");

	let sessions = Arc::new(SessionManager::new());
	let main_addr: SocketAddr = format!("127.0.0.1:{}", args.port).parse().expect("loopback address is well-formed");
	let pairing_addr: SocketAddr = format!("127.0.0.1:{}", args.pairing_port).parse().expect("loopback address is well-formed");

	let scout_service = ScoutServer::new(ScoutService::new(sessions.clone()))
		.max_decoding_message_size(MAX_MESSAGE_SIZE_BYTES)
		.max_encoding_message_size(MAX_MESSAGE_SIZE_BYTES);

	let pairing_logic = PairingService::new(identity.clone(), trust_store.clone());
	let pairing_service = PairingServer::new(PairingRpcService::new(pairing_logic));

	let shutdown_sessions = sessions.clone();
	let shutdown = async move {
		let _ = tokio::signal::ctrl_c().await;
		info!(target = "scout.server", "shutdown requested, draining sessions");
		shutdown_sessions.shutdown().await;
	};

	if args.insecure {
		info!(target = "scout.server", %main_addr, "serving Scout (insecure)");
		let main = tonic::transport::Server::builder()
			.add_service(scout_service)
			.serve_with_shutdown(main_addr, shutdown);

		info!(target = "scout.server", %pairing_addr, "serving Pairing (insecure)");
		let pairing = tonic::transport::Server::builder()
			.add_service(pairing_service)
			.serve(pairing_addr);

		let (main_res, pairing_res) = tokio::join!(main, pairing);
		main_res.map_err(crate::error::CliError::Transport)?;
		pairing_res.map_err(crate::error::CliError::Transport)?;
		return Ok(());
	}

	let creds = TransportCreds::new(identity, trust_store);
	let incoming = transport::bind_mtls(main_addr, creds.server_config()?).await?;

	info!(target = "scout.server", %main_addr, "serving Scout (mTLS)");
	let main = tonic::transport::Server::builder()
		.add_service(scout_service)
		.serve_with_incoming_shutdown(incoming, shutdown);

	info!(target = "scout.server", %pairing_addr, "serving Pairing (unauthenticated)");
	let pairing = tonic::transport::Server::builder()
		.add_service(pairing_service)
		.serve(pairing_addr);

	let (main_res, pairing_res) = tokio::join!(main, pairing);
	main_res.map_err(crate::error::CliError::Transport)?;
	pairing_res.map_err(crate::error::CliError::Transport)?;
	Ok(())
}
