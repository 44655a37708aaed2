//! End-to-end pairing scenario (spec.md §8 scenario 1): two independently
//! generated identities pair over an insecure channel, and the resulting
//! trust is then actually exercised by a real mTLS handshake using
//! [`scout::tls::TransportCreds`] — not just asserted against the trust
//! store in isolation.

use scout::identity::Identity;
use scout::pairing::PairingService;
use scout::tls::TransportCreds;
use scout::trust::TrustStore;

use rustls_pki_types::ServerName;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[test]
fn peer_b_pairs_with_peer_a_and_is_trusted() {
	let dir_a = tempfile::tempdir().unwrap();
	let identity_a = Identity::generate().unwrap();
	let trust_a = TrustStore::new(dir_a.path());
	let pairing = PairingService::new(identity_a.clone(), trust_a.clone());

	let identity_b = Identity::generate().unwrap();

	let result = pairing.pair(&identity_b.device_id, &identity_b.cert_der).unwrap();

	assert_eq!(result.server_device_id, identity_a.device_id);
	assert_eq!(result.server_cert_der, identity_a.cert_der);
	assert!(trust_a.is_trusted(&identity_b.device_id));
}

#[test]
fn pairing_with_a_lying_device_id_leaves_the_peer_untrusted() {
	let dir_a = tempfile::tempdir().unwrap();
	let identity_a = Identity::generate().unwrap();
	let trust_a = TrustStore::new(dir_a.path());
	let pairing = PairingService::new(identity_a, trust_a.clone());

	let identity_b = Identity::generate().unwrap();
	let unrelated = Identity::generate().unwrap();

	let err = pairing.pair(&unrelated.device_id, &identity_b.cert_der).unwrap_err();

	assert_eq!(err.code, scout::ErrorCode::FailedPrecondition);
	assert!(!trust_a.is_trusted(&identity_b.device_id));
	assert!(!trust_a.is_trusted(&unrelated.device_id));
}

/// After pairing, a real mTLS handshake between A (server) and B (client)
/// succeeds only because B's certificate is now in A's trust store
/// (spec.md §4.4): this exercises [`TransportCreds`] end to end rather
/// than unit-testing the verifier callback in isolation.
#[tokio::test]
async fn paired_peer_completes_an_mtls_handshake() {
	let dir_a = tempfile::tempdir().unwrap();
	let identity_a = Identity::generate().unwrap();
	let trust_a = TrustStore::new(dir_a.path());

	let identity_b = Identity::generate().unwrap();
	let dir_b = tempfile::tempdir().unwrap();
	let trust_b = TrustStore::new(dir_b.path());

	let pairing = PairingService::new(identity_a.clone(), trust_a.clone());
	let result = pairing.pair(&identity_b.device_id, &identity_b.cert_der).unwrap();
	trust_b.trust(&result.server_device_id, &result.server_cert_der).unwrap();

	let creds_a = TransportCreds::new(identity_a, trust_a);
	let creds_b = TransportCreds::new(identity_b, trust_b);

	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();

	let server_config = std::sync::Arc::new(creds_a.server_config().unwrap());
	let server = tokio::spawn(async move {
		let (tcp, _) = listener.accept().await.unwrap();
		let acceptor = tokio_rustls::TlsAcceptor::from(server_config);
		let mut tls = acceptor.accept(tcp).await.unwrap();
		let mut buf = [0u8; 5];
		tls.read_exact(&mut buf).await.unwrap();
		assert_eq!(&buf, b"hello");
	});

	let client_config = std::sync::Arc::new(creds_b.client_config().unwrap());
	let connector = tokio_rustls::TlsConnector::from(client_config);
	let tcp = TcpStream::connect(addr).await.unwrap();
	let server_name = ServerName::try_from("scout").unwrap();
	let mut tls = connector.connect(server_name, tcp).await.unwrap();
	tls.write_all(b"hello").await.unwrap();

	server.await.unwrap();
}

/// The mirror of the handshake test above: an identity that was never
/// paired is rejected by the server's device-id verifier (spec.md §4.4,
/// §7 `NotTrusted`).
#[tokio::test]
async fn unpaired_peer_is_rejected_by_the_handshake() {
	let dir_a = tempfile::tempdir().unwrap();
	let identity_a = Identity::generate().unwrap();
	let trust_a = TrustStore::new(dir_a.path());
	let creds_a = TransportCreds::new(identity_a, trust_a);

	let stranger = Identity::generate().unwrap();
	let dir_stranger = tempfile::tempdir().unwrap();
	let trust_stranger = TrustStore::new(dir_stranger.path());
	let creds_stranger = TransportCreds::new(stranger, trust_stranger);

	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();

	let server_config = std::sync::Arc::new(creds_a.server_config().unwrap());
	let server = tokio::spawn(async move {
		let (tcp, _) = listener.accept().await.unwrap();
		let acceptor = tokio_rustls::TlsAcceptor::from(server_config);
		acceptor.accept(tcp).await
	});

	let client_config = std::sync::Arc::new(creds_stranger.client_config().unwrap());
	let connector = tokio_rustls::TlsConnector::from(client_config);
	let tcp = TcpStream::connect(addr).await.unwrap();
	let server_name = ServerName::try_from("scout").unwrap();
	// The client side has no CA verification of its own, so its half of
	// the handshake may report success or a transport-level reset
	// depending on timing; the server's verdict is what spec.md actually
	// constrains.
	let _ = connector.connect(server_name, tcp).await;

	let server_result = server.await.unwrap();
	assert!(server_result.is_err());
}
