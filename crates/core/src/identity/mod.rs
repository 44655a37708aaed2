//! Device identity: a self-signed P-256 certificate plus the device ID
//! derived from it (spec.md §3, §4.1).

mod device_id;

use std::path::Path;

use rcgen::{CertificateParams, DistinguishedName, ExtendedKeyUsagePurpose, KeyPair, KeyUsagePurpose};
use time::{Duration as TimeDuration, OffsetDateTime};

pub use device_id::{DeviceIdError, device_id_from_der, short_id, validate_device_id};

use crate::error::{ErrorCode, Result, ScoutError};

/// A device's identity: its self-signed certificate, private key, and
/// derived device ID.
#[derive(Clone)]
pub struct Identity {
	pub device_id: String,
	pub cert_der: Vec<u8>,
	cert_pem: String,
	key_pem: String,
}

impl Identity {
	pub fn cert_pem(&self) -> &str {
		&self.cert_pem
	}

	pub fn key_pem(&self) -> &str {
		&self.key_pem
	}

	/// Generates a fresh P-256 keypair and a 10-year self-signed
	/// certificate with `KeyUsage = {DigitalSignature, KeyEncipherment}`,
	/// `ExtKeyUsage = {ServerAuth, ClientAuth}` (spec.md §3).
	pub fn generate() -> Result<Self> {
		let key_pair = KeyPair::generate_for(&rcgen::PKCS_ECDSA_P256_SHA256)
			.map_err(|err| ScoutError::internal("identity", err))?;

		let mut params = CertificateParams::new(Vec::<String>::new())
			.map_err(|err| ScoutError::internal("identity", err))?;
		params.distinguished_name = DistinguishedName::new();
		params.key_usages = vec![KeyUsagePurpose::DigitalSignature, KeyUsagePurpose::KeyEncipherment];
		params.extended_key_usages = vec![
			ExtendedKeyUsagePurpose::ServerAuth,
			ExtendedKeyUsagePurpose::ClientAuth,
		];
		let now = OffsetDateTime::now_utc();
		params.not_before = now - TimeDuration::days(1);
		params.not_after = now + TimeDuration::days(10 * 365);

		let cert = params
			.self_signed(&key_pair)
			.map_err(|err| ScoutError::internal("identity", err))?;

		let cert_der = cert.der().to_vec();
		let device_id = device_id_from_der(&cert_der);

		Ok(Self {
			device_id,
			cert_der,
			cert_pem: cert.pem(),
			key_pem: key_pair.serialize_pem(),
		})
	}

	/// Persists `cert.pem` (mode 0644) and `key.pem` (mode 0600) under
	/// `dir` (mode 0700), matching spec.md §3.
	pub fn save(&self, dir: &Path) -> Result<()> {
		create_private_dir(dir)?;
		write_with_mode(&dir.join("cert.pem"), self.cert_pem.as_bytes(), 0o644)?;
		write_with_mode(&dir.join("key.pem"), self.key_pem.as_bytes(), 0o600)?;
		Ok(())
	}

	/// Loads a previously saved identity from `dir`.
	pub fn load(dir: &Path) -> Result<Self> {
		let cert_pem = std::fs::read_to_string(dir.join("cert.pem"))
			.map_err(|err| ScoutError::internal("identity", err))?;
		let key_pem = std::fs::read_to_string(dir.join("key.pem"))
			.map_err(|err| ScoutError::internal("identity", err))?;

		let cert_der = pem_to_der(&cert_pem)?;
		let device_id = device_id_from_der(&cert_der);

		Ok(Self {
			device_id,
			cert_der,
			cert_pem,
			key_pem,
		})
	}

	/// Loads the identity at `dir` if present, otherwise generates and
	/// persists a new one. Single-writer bootstrap: callers are expected to
	/// hold whatever external lock keeps two daemons from racing on the
	/// same `dir` (spec.md §5 "the identity directory is not locked").
	pub fn load_or_generate(dir: &Path) -> Result<Self> {
		if dir.join("cert.pem").exists() && dir.join("key.pem").exists() {
			Self::load(dir)
		} else {
			let identity = Self::generate()?;
			identity.save(dir)?;
			Ok(identity)
		}
	}
}

fn pem_to_der(pem: &str) -> Result<Vec<u8>> {
	let mut reader = std::io::BufReader::new(pem.as_bytes());
	let cert = rustls_pemfile::certs(&mut reader)
		.next()
		.ok_or_else(|| ScoutError::new(ErrorCode::Internal, "no certificate found in PEM"))?
		.map_err(|err| ScoutError::internal("identity", err))?;
	Ok(cert.to_vec())
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> Result<()> {
	use std::os::unix::fs::DirBuilderExt;
	std::fs::DirBuilder::new()
		.mode(0o700)
		.recursive(true)
		.create(dir)
		.map_err(|err| ScoutError::internal("identity", err))
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> Result<()> {
	std::fs::create_dir_all(dir).map_err(|err| ScoutError::internal("identity", err))
}

#[cfg(unix)]
fn write_with_mode(path: &Path, contents: &[u8], mode: u32) -> Result<()> {
	use std::io::Write;
	use std::os::unix::fs::OpenOptionsExt;

	let mut file = std::fs::OpenOptions::new()
		.write(true)
		.create(true)
		.truncate(true)
		.mode(mode)
		.open(path)
		.map_err(|err| ScoutError::internal("identity", err))?;
	file.write_all(contents)
		.map_err(|err| ScoutError::internal("identity", err))
}

#[cfg(not(unix))]
fn write_with_mode(path: &Path, contents: &[u8], _mode: u32) -> Result<()> {
	std::fs::write(path, contents).map_err(|err| ScoutError::internal("identity", err))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn generate_produces_a_valid_device_id() {
		let identity = Identity::generate().unwrap();
		validate_device_id(&identity.device_id).unwrap();
	}

	#[test]
	fn save_then_load_round_trips_the_same_device_id() {
		let dir = tempfile::tempdir().unwrap();
		let identity = Identity::generate().unwrap();
		identity.save(dir.path()).unwrap();

		let loaded = Identity::load(dir.path()).unwrap();
		assert_eq!(loaded.device_id, identity.device_id);
		assert_eq!(loaded.cert_der, identity.cert_der);
	}

	#[test]
	fn load_or_generate_is_idempotent() {
		let dir = tempfile::tempdir().unwrap();
		let first = Identity::load_or_generate(dir.path()).unwrap();
		let second = Identity::load_or_generate(dir.path()).unwrap();
		assert_eq!(first.device_id, second.device_id);
	}

	#[cfg(unix)]
	#[test]
	fn key_file_is_written_with_owner_only_permissions() {
		use std::os::unix::fs::PermissionsExt;

		let dir = tempfile::tempdir().unwrap();
		let identity = Identity::generate().unwrap();
		identity.save(dir.path()).unwrap();

		let meta = std::fs::metadata(dir.path().join("key.pem")).unwrap();
		assert_eq!(meta.permissions().mode() & 0o777, 0o600);
	}
}
