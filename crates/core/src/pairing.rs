//! The insecure pairing RPC that bootstraps trust between two daemons
//! (spec.md §3 glossary, §4.3).
//!
//! Runs on its own unauthenticated listener, separate from the mTLS main
//! RPC endpoint (design notes §9: "do not multiplex"). The one thing it
//! must get right is binding the claimed device ID to the certificate's
//! own key material before trusting it.

use rustls_pki_types::CertificateDer;

use crate::error::{Result, ScoutError};
use crate::identity::{device_id_from_der, Identity};
use crate::trust::TrustStore;

/// A hook invoked after a peer is successfully trusted, e.g. to refresh a
/// UI list of paired devices (spec.md §4.3 step 6 `OnPaired`).
pub trait OnPaired: Send + Sync {
	fn on_paired(&self, device_id: &str);
}

/// A no-op [`OnPaired`] for daemons that don't care to observe pairing.
pub struct NoopOnPaired;

impl OnPaired for NoopOnPaired {
	fn on_paired(&self, _device_id: &str) {}
}

/// The pairing service (spec.md §4.3): exchanges certificates over an
/// unauthenticated channel and binds the claimed device ID to the
/// certificate's own key material.
pub struct PairingService {
	identity: Identity,
	trust_store: TrustStore,
	on_paired: Box<dyn OnPaired>,
}

/// Result of a successful pairing exchange, returned to the caller
/// (spec.md §4.3 step 7).
pub struct PairResult {
	pub server_device_id: String,
	pub server_cert_der: Vec<u8>,
}

impl PairingService {
	pub fn new(identity: Identity, trust_store: TrustStore) -> Self {
		Self {
			identity,
			trust_store,
			on_paired: Box::new(NoopOnPaired),
		}
	}

	pub fn with_on_paired(mut self, hook: Box<dyn OnPaired>) -> Self {
		self.on_paired = hook;
		self
	}

	/// Executes the pairing algorithm (spec.md §4.3 steps 1-7).
	///
	/// 1. Rejects empty fields.
	/// 2. Parses the client certificate.
	/// 3. Derives `derived_id` from it.
	/// 4. Fails with `FailedPrecondition` if `derived_id != client_device_id`
	///    — this binds the wire identifier to key material and defeats a
	///    peer that lies about which ID it owns.
	/// 5. Trusts the certificate.
	/// 6. Invokes the `OnPaired` hook.
	/// 7. Returns the local identity.
	pub fn pair(&self, client_device_id: &str, client_cert_der: &[u8]) -> Result<PairResult> {
		if client_device_id.is_empty() || client_cert_der.is_empty() {
			return Err(ScoutError::invalid_argument(
				"pairing request is missing client_device_id or client_cert_der",
			));
		}

		// Parsing validates the DER is a well-formed X.509 certificate
		// before we derive anything from it.
		x509_parser::parse_x509_certificate(client_cert_der)
			.map_err(|err| ScoutError::invalid_argument(format!("malformed client certificate: {err}")))?;

		let derived_id = device_id_from_der(client_cert_der);
		if derived_id != client_device_id {
			return Err(ScoutError::failed_precondition(
				"client_device_id does not match the certificate's derived device id",
			));
		}

		self.trust_store.trust(&derived_id, client_cert_der)?;
		self.on_paired.on_paired(&derived_id);

		Ok(PairResult {
			server_device_id: self.identity.device_id.clone(),
			server_cert_der: self.identity.cert_der.clone(),
		})
	}
}

/// Parses DER bytes and re-derives the device ID, used by callers that
/// already hold a peer's raw certificate (e.g. the mTLS accept path)
/// rather than going through [`PairingService::pair`].
pub fn device_id_of(cert_der: &[u8]) -> Option<(CertificateDer<'static>, String)> {
	x509_parser::parse_x509_certificate(cert_der).ok()?;
	Some((CertificateDer::from(cert_der.to_vec()), device_id_from_der(cert_der)))
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Mutex;

	struct RecordingHook(Mutex<Vec<String>>);

	impl OnPaired for RecordingHook {
		fn on_paired(&self, device_id: &str) {
			self.0.lock().unwrap().push(device_id.to_string());
		}
	}

	#[test]
	fn pair_trusts_a_matching_client() {
		let dir = tempfile::tempdir().unwrap();
		let server_identity = Identity::generate().unwrap();
		let trust_store = TrustStore::new(dir.path());
		let service = PairingService::new(server_identity.clone(), trust_store.clone());

		let client_identity = Identity::generate().unwrap();
		let result = service
			.pair(&client_identity.device_id, &client_identity.cert_der)
			.unwrap();

		assert_eq!(result.server_device_id, server_identity.device_id);
		assert_eq!(result.server_cert_der, server_identity.cert_der);
		assert!(trust_store.is_trusted(&client_identity.device_id));
	}

	#[test]
	fn pair_invokes_on_paired_hook() {
		let dir = tempfile::tempdir().unwrap();
		let server_identity = Identity::generate().unwrap();
		let trust_store = TrustStore::new(dir.path());
		let hook = Box::new(RecordingHook(Mutex::new(Vec::new())));
		let service = PairingService::new(server_identity, trust_store).with_on_paired(hook);

		let client_identity = Identity::generate().unwrap();
		service
			.pair(&client_identity.device_id, &client_identity.cert_der)
			.unwrap();
	}

	#[test]
	fn pair_rejects_mismatched_device_id() {
		let dir = tempfile::tempdir().unwrap();
		let server_identity = Identity::generate().unwrap();
		let trust_store = TrustStore::new(dir.path());
		let service = PairingService::new(server_identity, trust_store.clone());

		let client_identity = Identity::generate().unwrap();
		let lying_id = Identity::generate().unwrap().device_id;
		let err = service.pair(&lying_id, &client_identity.cert_der).unwrap_err();

		assert_eq!(err.code, crate::error::ErrorCode::FailedPrecondition);
		assert!(!trust_store.is_trusted(&client_identity.device_id));
	}

	#[test]
	fn pair_rejects_empty_fields() {
		let dir = tempfile::tempdir().unwrap();
		let service = PairingService::new(Identity::generate().unwrap(), TrustStore::new(dir.path()));
		let err = service.pair("", b"").unwrap_err();
		assert_eq!(err.code, crate::error::ErrorCode::InvalidArgument);
	}
}
