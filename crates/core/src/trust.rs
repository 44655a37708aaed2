//! Directory-backed trust set of peer device certificates (spec.md §3
//! `TrustEntry`, §4.2 `TrustStore`).
//!
//! Presence of `<device_id>.pem` in the trust directory *is* trust;
//! absence is untrusted (spec.md §3 invariant). The core assumes one
//! writer per trust directory (spec.md §5) — two daemons sharing a home
//! directory are not supported.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use rustls_pki_types::CertificateDer;

use crate::error::{ErrorCode, Result, ScoutError};
use crate::identity::validate_device_id;

/// Wraps DER bytes as a PEM `CERTIFICATE` block (spec.md §6 "Trust store
/// entry: PEM certificate per peer"), base64 lines wrapped at 64 columns
/// per RFC 7468.
fn der_to_pem(der: &[u8]) -> String {
	let encoded = base64::engine::general_purpose::STANDARD.encode(der);
	let mut pem = String::from("-----BEGIN CERTIFICATE-----\n");
	for line in encoded.as_bytes().chunks(64) {
		pem.push_str(std::str::from_utf8(line).expect("base64 output is ASCII"));
		pem.push('\n');
	}
	pem.push_str("-----END CERTIFICATE-----\n");
	pem
}

/// Parses a PEM `CERTIFICATE` block back to DER.
fn pem_to_der(pem: &[u8]) -> Result<Vec<u8>> {
	let mut reader = std::io::BufReader::new(pem);
	let cert = rustls_pemfile::certs(&mut reader)
		.next()
		.ok_or_else(|| ScoutError::internal("trust", "no certificate found in trust store entry"))?
		.map_err(|err| ScoutError::internal("trust", err))?;
	Ok(cert.to_vec())
}

/// A trusted peer, as listed by [`TrustStore::list`].
#[derive(Debug, Clone)]
pub struct TrustedDevice {
	pub device_id: String,
	pub cert_der: Vec<u8>,
	pub trusted_at: u64,
}

/// The on-disk trust set under `<home>/.scout/trusted/` (spec.md §6).
#[derive(Debug, Clone)]
pub struct TrustStore {
	dir: PathBuf,
}

impl TrustStore {
	pub fn new(dir: impl Into<PathBuf>) -> Self {
		Self { dir: dir.into() }
	}

	fn entry_path(&self, device_id: &str) -> PathBuf {
		self.dir.join(format!("{device_id}.pem"))
	}

	/// Trusts `device_id`, persisting `cert_der` as `<device_id>.pem`.
	///
	/// Rejects empty DER: spec.md §9 leaves the insecure
	/// `Trust(id, nil_cert)` path an unresolved question and tells
	/// implementers not to guess intent. This store requires real
	/// certificate bytes on every path, including the admin-import path
	/// (SPEC_FULL.md §F.4, DESIGN.md Open Questions).
	pub fn trust(&self, device_id: &str, cert_der: &[u8]) -> Result<()> {
		if cert_der.is_empty() {
			return Err(ScoutError::invalid_argument(
				"refusing to trust an empty certificate; use pairing or an explicit admin import",
			));
		}
		validate_device_id(device_id)
			.map_err(|err| ScoutError::invalid_argument(format!("malformed device id: {err}")))?;

		std::fs::create_dir_all(&self.dir).map_err(|err| ScoutError::internal("trust", err))?;
		std::fs::write(self.entry_path(device_id), der_to_pem(cert_der))
			.map_err(|err| ScoutError::internal("trust", err))?;
		Ok(())
	}

	/// Explicit admin-import entry point (spec.md §4.2 "admin action"),
	/// identical to [`TrustStore::trust`] but named for the CLI's
	/// trust-import command so that call site reads as an intentional
	/// operator action rather than a pairing side effect.
	pub fn admin_import(&self, device_id: &str, cert_der: &[u8]) -> Result<()> {
		self.trust(device_id, cert_der)
	}

	/// File-existence test (spec.md §3 invariant).
	pub fn is_trusted(&self, device_id: &str) -> bool {
		self.entry_path(device_id).is_file()
	}

	/// Idempotent removal.
	pub fn remove(&self, device_id: &str) -> Result<()> {
		match std::fs::remove_file(self.entry_path(device_id)) {
			Ok(()) => Ok(()),
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(err) => Err(ScoutError::internal("trust", err)),
		}
	}

	/// Lists every trusted device, ignoring non-`.pem` entries (spec.md
	/// §4.2).
	pub fn list(&self) -> Result<Vec<TrustedDevice>> {
		let entries = match std::fs::read_dir(&self.dir) {
			Ok(entries) => entries,
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
			Err(err) => return Err(ScoutError::internal("trust", err)),
		};

		let mut devices = Vec::new();
		for entry in entries {
			let entry = entry.map_err(|err| ScoutError::internal("trust", err))?;
			let path = entry.path();
			if path.extension().and_then(|e| e.to_str()) != Some("pem") {
				continue;
			}
			let device_id = match path.file_stem().and_then(|s| s.to_str()) {
				Some(s) => s.to_string(),
				None => continue,
			};
			let pem = std::fs::read(&path).map_err(|err| ScoutError::internal("trust", err))?;
			let cert_der = pem_to_der(&pem)?;
			let trusted_at = entry
				.metadata()
				.ok()
				.and_then(|m| m.modified().ok())
				.and_then(|t| t.duration_since(UNIX_EPOCH).ok())
				.map(|d| d.as_secs())
				.unwrap_or(0);
			devices.push(TrustedDevice {
				device_id,
				cert_der,
				trusted_at,
			});
		}
		Ok(devices)
	}

	/// Reads every trusted certificate into a rustls root store for mTLS
	/// verification (spec.md §4.2 `CertPool`).
	pub fn cert_pool(&self) -> Result<Vec<CertificateDer<'static>>> {
		Ok(self
			.list()?
			.into_iter()
			.map(|d| CertificateDer::from(d.cert_der))
			.collect())
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::identity::Identity;

	fn fake_device_id() -> String {
		Identity::generate().unwrap().device_id
	}

	#[test]
	fn trust_then_is_trusted() {
		let dir = tempfile::tempdir().unwrap();
		let store = TrustStore::new(dir.path());
		let id = fake_device_id();

		assert!(!store.is_trusted(&id));
		store.trust(&id, b"fake-der-bytes").unwrap();
		assert!(store.is_trusted(&id));
	}

	#[test]
	fn remove_then_not_trusted() {
		let dir = tempfile::tempdir().unwrap();
		let store = TrustStore::new(dir.path());
		let id = fake_device_id();
		store.trust(&id, b"fake-der-bytes").unwrap();

		store.remove(&id).unwrap();
		assert!(!store.is_trusted(&id));
	}

	#[test]
	fn remove_is_idempotent() {
		let dir = tempfile::tempdir().unwrap();
		let store = TrustStore::new(dir.path());
		store.remove(&fake_device_id()).unwrap();
		store.remove(&fake_device_id()).unwrap();
	}

	#[test]
	fn list_cardinality_matches_trust_count() {
		let dir = tempfile::tempdir().unwrap();
		let store = TrustStore::new(dir.path());
		for _ in 0..3 {
			store.trust(&fake_device_id(), b"fake-der-bytes").unwrap();
		}
		assert_eq!(store.list().unwrap().len(), 3);
	}

	#[test]
	fn empty_der_is_rejected() {
		let dir = tempfile::tempdir().unwrap();
		let store = TrustStore::new(dir.path());
		let err = store.trust(&fake_device_id(), b"").unwrap_err();
		assert_eq!(err.code, ErrorCode::InvalidArgument);
	}
}
