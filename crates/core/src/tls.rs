//! mTLS transport credentials (spec.md §4.4): self-signed certificates on
//! both ends, no certificate-authority chain — trust is enforced purely
//! by checking the peer's derived device ID against the local
//! [`TrustStore`](crate::trust::TrustStore).
//!
//! Server side accepts any client certificate whose derived device ID is
//! currently trusted; client side skips server-certificate verification
//! outright (the client's own responsibility is to re-check the server's
//! device ID before issuing sensitive calls, spec.md §4.4 last paragraph).

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::server::danger::{ClientCertVerified, ClientCertVerifier};
use rustls::{CertificateError, DigitallySignedStruct, DistinguishedName, Error as TlsError, SignatureScheme};
use rustls_pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer, ServerName, UnixTime};

use crate::error::{Result, ScoutError};
use crate::identity::{device_id_from_der, Identity};
use crate::trust::TrustStore;

/// Builds the rustls configurations for both ends of an mTLS connection
/// from a local [`Identity`] and [`TrustStore`] (spec.md §4.4).
#[derive(Clone)]
pub struct TransportCreds {
	identity: Identity,
	trust_store: TrustStore,
}

impl TransportCreds {
	pub fn new(identity: Identity, trust_store: TrustStore) -> Self {
		Self {
			identity,
			trust_store,
		}
	}

	fn cert_chain(&self) -> Vec<CertificateDer<'static>> {
		vec![CertificateDer::from(self.identity.cert_der.clone())]
	}

	fn private_key(&self) -> Result<PrivateKeyDer<'static>> {
		let mut reader = std::io::BufReader::new(self.identity.key_pem().as_bytes());
		let key = rustls_pemfile::pkcs8_private_keys(&mut reader)
			.next()
			.ok_or_else(|| ScoutError::internal("tls", "no PKCS8 private key found"))?
			.map_err(|err| ScoutError::internal("tls", err))?;
		Ok(PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key.secret_pkcs8_der().to_vec())))
	}

	/// Server-side TLS config: presents the local identity, requires a
	/// client certificate, and accepts it iff its derived device ID is
	/// trusted (spec.md §4.4 server side). Pinned to TLS 1.3 only — the
	/// default `builder()` would also accept TLS 1.2, which spec.md §4.4
	/// rules out ("TLS 1.3 minimum").
	pub fn server_config(&self) -> Result<rustls::ServerConfig> {
		let verifier: Arc<dyn ClientCertVerifier> = Arc::new(DeviceIdClientVerifier {
			trust_store: self.trust_store.clone(),
		});

		let config = rustls::ServerConfig::builder_with_protocol_versions(&[&rustls::version::TLS13])
			.with_client_cert_verifier(verifier)
			.with_single_cert(self.cert_chain(), self.private_key()?)
			.map_err(|err| ScoutError::internal("tls", err))?;
		Ok(config)
	}

	/// Client-side TLS config: presents the local identity, skips CA
	/// verification of the server certificate (self-signed), relying on
	/// the server enforcing trust of its own device ID (spec.md §4.4
	/// client side). Pinned to TLS 1.3 to match the server side.
	pub fn client_config(&self) -> Result<rustls::ClientConfig> {
		let verifier: Arc<dyn ServerCertVerifier> = Arc::new(AcceptAnySelfSigned);
		let config = rustls::ClientConfig::builder_with_protocol_versions(&[&rustls::version::TLS13])
			.dangerous()
			.with_custom_certificate_verifier(verifier)
			.with_client_auth_cert(self.cert_chain(), self.private_key()?)
			.map_err(|err| ScoutError::internal("tls", err))?;
		Ok(config)
	}
}

/// Server-side client-certificate verifier: accepts any well-formed
/// certificate whose derived device ID is in the trust store, rejecting
/// everything else with [`CertificateError::ApplicationVerificationFailure`]
/// (spec.md §4.4, §7 `NotTrusted`).
#[derive(Debug)]
struct DeviceIdClientVerifier {
	trust_store: TrustStore,
}

impl ClientCertVerifier for DeviceIdClientVerifier {
	fn client_auth_mandatory(&self) -> bool {
		true
	}

	fn root_hint_subjects(&self) -> &[DistinguishedName] {
		&[]
	}

	fn verify_client_cert(
		&self,
		end_entity: &CertificateDer<'_>,
		_intermediates: &[CertificateDer<'_>],
		_now: UnixTime,
	) -> std::result::Result<ClientCertVerified, TlsError> {
		let device_id = device_id_from_der(end_entity.as_ref());
		if self.trust_store.is_trusted(&device_id) {
			Ok(ClientCertVerified::assertion())
		} else {
			Err(TlsError::InvalidCertificate(CertificateError::ApplicationVerificationFailure))
		}
	}

	fn verify_tls12_signature(
		&self,
		message: &[u8],
		cert: &CertificateDer<'_>,
		dss: &DigitallySignedStruct,
	) -> std::result::Result<HandshakeSignatureValid, TlsError> {
		rustls::crypto::verify_tls12_signature(
			message,
			cert,
			dss,
			&rustls::crypto::ring::default_provider().signature_verification_algorithms,
		)
	}

	fn verify_tls13_signature(
		&self,
		message: &[u8],
		cert: &CertificateDer<'_>,
		dss: &DigitallySignedStruct,
	) -> std::result::Result<HandshakeSignatureValid, TlsError> {
		rustls::crypto::verify_tls13_signature(
			message,
			cert,
			dss,
			&rustls::crypto::ring::default_provider().signature_verification_algorithms,
		)
	}

	fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
		rustls::crypto::ring::default_provider()
			.signature_verification_algorithms
			.supported_schemes()
	}
}

/// Client-side server-certificate verifier that accepts any certificate:
/// the client re-checks the server's device ID against its own trust
/// store at the application layer instead of relying on a CA chain
/// (spec.md §4.4 client side, design notes §9 "both sides should...
/// re-check the peer's derived device ID").
#[derive(Debug)]
struct AcceptAnySelfSigned;

impl ServerCertVerifier for AcceptAnySelfSigned {
	fn verify_server_cert(
		&self,
		_end_entity: &CertificateDer<'_>,
		_intermediates: &[CertificateDer<'_>],
		_server_name: &ServerName<'_>,
		_ocsp_response: &[u8],
		_now: UnixTime,
	) -> std::result::Result<ServerCertVerified, TlsError> {
		Ok(ServerCertVerified::assertion())
	}

	fn verify_tls12_signature(
		&self,
		message: &[u8],
		cert: &CertificateDer<'_>,
		dss: &DigitallySignedStruct,
	) -> std::result::Result<HandshakeSignatureValid, TlsError> {
		rustls::crypto::verify_tls12_signature(
			message,
			cert,
			dss,
			&rustls::crypto::ring::default_provider().signature_verification_algorithms,
		)
	}

	fn verify_tls13_signature(
		&self,
		message: &[u8],
		cert: &CertificateDer<'_>,
		dss: &DigitallySignedStruct,
	) -> std::result::Result<HandshakeSignatureValid, TlsError> {
		rustls::crypto::verify_tls13_signature(
			message,
			cert,
			dss,
			&rustls::crypto::ring::default_provider().signature_verification_algorithms,
		)
	}

	fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
		rustls::crypto::ring::default_provider()
			.signature_verification_algorithms
			.supported_schemes()
	}
}

/// Re-checks a peer's device ID against the local trust store, the
/// application-layer check both client and server should perform before
/// issuing sensitive calls (spec.md §4.4 last paragraph).
pub fn peer_is_trusted(trust_store: &TrustStore, peer_cert_der: &[u8]) -> bool {
	trust_store.is_trusted(&device_id_from_der(peer_cert_der))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::identity::Identity;

	#[test]
	fn untrusted_client_cert_is_rejected() {
		let dir = tempfile::tempdir().unwrap();
		let store = TrustStore::new(dir.path());
		let verifier = DeviceIdClientVerifier {
			trust_store: store,
		};
		let identity = Identity::generate().unwrap();
		let cert = CertificateDer::from(identity.cert_der.clone());

		let result = verifier.verify_client_cert(&cert, &[], UnixTime::now());
		assert!(result.is_err());
	}

	#[test]
	fn trusted_client_cert_is_accepted() {
		let dir = tempfile::tempdir().unwrap();
		let store = TrustStore::new(dir.path());
		let identity = Identity::generate().unwrap();
		store.trust(&identity.device_id, &identity.cert_der).unwrap();

		let verifier = DeviceIdClientVerifier {
			trust_store: store,
		};
		let cert = CertificateDer::from(identity.cert_der.clone());
		assert!(verifier.verify_client_cert(&cert, &[], UnixTime::now()).is_ok());
	}
}
