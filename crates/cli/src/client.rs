//! Builds the client-side gRPC channel: mTLS by default, or plaintext
//! under `--insecure` (spec.md §4.4, §9).

use scout::{Identity, ScoutPaths, TrustStore};
use scout::tls::TransportCreds;
use scout_protocol::pb::scout_client::ScoutClient;
use tonic::transport::Channel;

use crate::daemon;
use crate::error::Result;
use crate::transport;

/// Resolved client-side connection context: where the daemon lives and
/// whether the channel is authenticated.
pub struct Connection {
	pub addr: std::net::SocketAddr,
	pub insecure: bool,
}

impl Connection {
	/// Ensures a daemon is reachable at `addr` (spawning a local one if
	/// needed, spec.md §4.10), then dials it.
	pub async fn connect(host: &str, port: u16, insecure: bool, data_dir: Option<&std::path::Path>) -> Result<ScoutClient<Channel>> {
		daemon::ensure_reachable(host, port).await?;

		let resolved_host = if host.is_empty() { "127.0.0.1" } else { host };
		let addr: std::net::SocketAddr = format!("{resolved_host}:{port}")
			.parse()
			.or_else(|_| resolve_dns(resolved_host, port))?;

		let channel = if insecure {
			transport::connect_plaintext(addr).await?
		} else {
			let paths = match data_dir {
				Some(root) => ScoutPaths::with_root(root.to_path_buf()),
				None => ScoutPaths::resolve()?,
			};
			paths.ensure()?;
			let identity = Identity::load_or_generate(&paths.identity_dir())?;
			let trust_store = TrustStore::new(paths.trusted_dir());
			let creds = TransportCreds::new(identity, trust_store);
			transport::connect_mtls(addr, creds.client_config()?).await?
		};

		Ok(ScoutClient::new(channel).max_decoding_message_size(scout::rpc::MAX_MESSAGE_SIZE_BYTES))
	}
}

fn resolve_dns(host: &str, port: u16) -> Result<std::net::SocketAddr> {
	use std::net::ToSocketAddrs;
	format!("{host}:{port}")
		.to_socket_addrs()?
		.next()
		.ok_or_else(|| crate::error::CliError::DaemonStart(format!("{host}:{port}")))
}
