//! Manual TLS plumbing for tonic: [`scout::tls::TransportCreds`] hands out
//! raw `rustls::ClientConfig`/`ServerConfig` (self-signed certs, device-id
//! verifiers instead of a CA chain), which tonic's own `ClientTlsConfig`/
//! `ServerTlsConfig` convenience wrappers have no hook for — so the
//! channel connector and server incoming-stream are both hand-wired here
//! with `tokio_rustls` directly, the same way `scout-runtime` talks raw
//! `tokio_tungstenite` to the CDP endpoint instead of going through a
//! higher-level HTTP client.

use std::sync::Arc;

use http::Uri;
use hyper_util::rt::TokioIo;
use rustls_pki_types::ServerName;
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::server::TlsStream;
use tokio_rustls::TlsAcceptor;
use tokio_rustls::TlsConnector;
use tokio_stream::wrappers::ReceiverStream;
use tonic::transport::{Channel, Endpoint};
use tracing::warn;

use crate::error::{CliError, Result};

/// Connects `addr` and negotiates mTLS with `client_config`, producing a
/// tonic `Channel` that otherwise behaves like any HTTP/2-over-TLS
/// channel (spec.md §4.4 client side).
pub async fn connect_mtls(addr: std::net::SocketAddr, client_config: rustls::ClientConfig) -> Result<Channel> {
	let connector = TlsConnector::from(Arc::new(client_config));
	Endpoint::from_static("https://scout.invalid")
		.connect_with_connector(tower::service_fn(move |_: Uri| {
			let connector = connector.clone();
			async move {
				let tcp = TcpStream::connect(addr).await?;
				tcp.set_nodelay(true).ok();
				let server_name =
					ServerName::try_from("scout").map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err))?;
				let tls = connector.connect(server_name, tcp).await?;
				Ok::<_, std::io::Error>(TokioIo::new(tls))
			}
		}))
		.await
		.map_err(CliError::Transport)
}

/// Connects `addr` over plaintext, for `--insecure` local development
/// (spec.md §9: the daemon supervisor's own spawn path runs with
/// `--insecure` until the operator pairs a real peer).
pub async fn connect_plaintext(addr: std::net::SocketAddr) -> Result<Channel> {
	Endpoint::from_static("http://scout.invalid")
		.connect_with_connector(tower::service_fn(move |_: Uri| async move {
			let tcp = TcpStream::connect(addr).await?;
			tcp.set_nodelay(true).ok();
			Ok::<_, std::io::Error>(TokioIo::new(tcp))
		}))
		.await
		.map_err(CliError::Transport)
}

type IncomingItem = std::io::Result<TokioIo<TlsStream<TcpStream>>>;

/// A `tonic::transport::Server::serve_with_incoming` source that accepts
/// plain TCP connections and upgrades each to mTLS before handing it to
/// the gRPC dispatcher (spec.md §4.9 main service listener). The accept
/// loop runs as its own task so one slow handshake never stalls the
/// listener, mirroring the `mpsc`-channel forwarding `scout-core`'s RPC
/// streaming handlers already use for the same reason.
pub async fn bind_mtls(addr: std::net::SocketAddr, server_config: rustls::ServerConfig) -> Result<ReceiverStream<IncomingItem>> {
	let listener = TcpListener::bind(addr).await?;
	let acceptor = TlsAcceptor::from(Arc::new(server_config));
	let (tx, rx) = tokio::sync::mpsc::channel(16);

	tokio::spawn(async move {
		loop {
			let (tcp, peer) = match listener.accept().await {
				Ok(pair) => pair,
				Err(err) => {
					let _ = tx.send(Err(err)).await;
					continue;
				}
			};
			let acceptor = acceptor.clone();
			let tx = tx.clone();
			tokio::spawn(async move {
				match acceptor.accept(tcp).await {
					Ok(tls) => {
						if tx.send(Ok(TokioIo::new(tls))).await.is_err() {
							return;
						}
					}
					Err(err) => {
						warn!(target = "scout.cli.server", %peer, %err, "mTLS handshake failed");
					}
				}
			});
		}
	});

	Ok(ReceiverStream::new(rx))
}
