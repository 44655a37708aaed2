//! `scout pair <peer>`: initiates the unauthenticated pairing exchange
//! against a peer daemon's pairing listener (spec.md §4.3).

use serde::Serialize;

use scout::{Identity, ScoutPaths, TrustStore};
use scout_protocol::pb;
use scout_protocol::pb::pairing_client::PairingClient;

use crate::cli::ConnectionArgs;
use crate::error::{CliError, Result};
use crate::output::{print_result, OutputFormat, ResultBuilder};
use crate::transport;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PairResult {
	server_device_id: String,
}

pub async fn run(conn: &ConnectionArgs, format: OutputFormat, peer: &str) -> Result<()> {
	let addr = resolve_peer_addr(peer)?;

	let paths = match &conn.data_dir {
		Some(root) => ScoutPaths::with_root(root.clone()),
		None => ScoutPaths::resolve()?,
	};
	paths.ensure()?;
	let identity = Identity::load_or_generate(&paths.identity_dir())?;
	let trust_store = TrustStore::new(paths.trusted_dir());

	let channel = transport::connect_plaintext(addr).await?;
	let mut client = PairingClient::new(channel);

	let response = client
		.pair(pb::PairRequest {
			client_device_id: identity.device_id.clone(),
			client_cert_der: identity.cert_der.clone(),
		})
		.await
		.map_err(CliError::from)?
		.into_inner();

	trust_store.trust(&response.server_device_id, &response.server_cert_der)?;

	print_result(
		&ResultBuilder::new("pair")
			.data(PairResult {
				server_device_id: response.server_device_id,
			})
			.build(),
		format,
	);
	Ok(())
}

fn resolve_peer_addr(peer: &str) -> Result<std::net::SocketAddr> {
	use std::net::ToSocketAddrs;
	if let Ok(addr) = peer.parse() {
		return Ok(addr);
	}
	peer.to_socket_addrs()?
		.next()
		.ok_or_else(|| CliError::DaemonStart(peer.to_string()))
}
