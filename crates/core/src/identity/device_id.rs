//! Canonical device-ID derivation and Luhn-mod-32 validation (spec.md §4.1).
//!
//! `DeviceIDFromCert` is deterministic (SHA-256 over the DER, base32,
//! Luhn-check, chunked) and `ValidateDeviceID` rejects any single-character
//! corruption, mirroring Syncthing's device-ID scheme.

use data_encoding::BASE32_NOPAD;
use sha2::{Digest, Sha256};

const LUHN_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";
const GROUP_LEN: usize = 13;
const CHUNK_LEN: usize = 7;

/// Errors returned by [`validate_device_id`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeviceIdError {
	#[error("device id has the wrong length")]
	InvalidLength,
	#[error("device id contains characters outside the base32 alphabet")]
	BadAlphabet,
	#[error("device id failed its Luhn-mod-32 check")]
	CheckFailed,
}

/// Derives the canonical, dashed, Luhn-checked device ID for a
/// certificate's DER encoding (spec.md §3, §4.1).
///
/// Deterministic: calling this twice on the same bytes always yields the
/// same string (spec.md §8 "Device ID determinism").
pub fn device_id_from_der(cert_der: &[u8]) -> String {
	let hash = Sha256::digest(cert_der);
	let encoded = BASE32_NOPAD.encode(&hash);
	debug_assert_eq!(encoded.len(), 52);

	let luhnified = luhnify(&encoded);
	chunkify(&luhnified)
}

/// Computes the Luhn-mod-32 check character for a single alphabet run.
fn luhn_check_char(group: &str) -> char {
	let mut factor: u32 = 1;
	let mut sum: u32 = 0;
	let n: u32 = 32;

	for ch in group.chars() {
		let codepoint = alphabet_index(ch).expect("group is restricted to the luhn alphabet") as u32;
		let mut addend = factor * codepoint;
		factor = if factor == 1 { 2 } else { 1 };
		addend = (addend / n) + (addend % n);
		sum += addend;
	}

	let remainder = sum % n;
	let check = (n - remainder) % n;
	LUHN_ALPHABET[check as usize] as char
}

fn alphabet_index(ch: char) -> Option<usize> {
	LUHN_ALPHABET.iter().position(|&b| b as char == ch)
}

/// Splits `encoded` into four 13-char groups and appends one Luhn-mod-32
/// check character after each, yielding 56 characters.
fn luhnify(encoded: &str) -> String {
	let mut out = String::with_capacity(56);
	for group in encoded.as_bytes().chunks(GROUP_LEN) {
		let group = std::str::from_utf8(group).expect("base32 output is ASCII");
		out.push_str(group);
		out.push(luhn_check_char(group));
	}
	out
}

/// Inserts a `-` after every 7th character.
fn chunkify(luhnified: &str) -> String {
	luhnified
		.as_bytes()
		.chunks(CHUNK_LEN)
		.map(|chunk| std::str::from_utf8(chunk).expect("ascii"))
		.collect::<Vec<_>>()
		.join("-")
}

/// Validates that `s` is a well-formed, Luhn-consistent device ID. Strips
/// dashes and whitespace and uppercases before checking, so both display
/// and compact forms are accepted.
pub fn validate_device_id(s: &str) -> Result<(), DeviceIdError> {
	let cleaned: String = s
		.chars()
		.filter(|c| !c.is_whitespace() && *c != '-')
		.map(|c| c.to_ascii_uppercase())
		.collect();

	if cleaned.len() != 56 {
		return Err(DeviceIdError::InvalidLength);
	}
	if !cleaned.chars().all(|c| alphabet_index(c).is_some()) {
		return Err(DeviceIdError::BadAlphabet);
	}

	for group in cleaned.as_bytes().chunks(GROUP_LEN + 1) {
		let group = std::str::from_utf8(group).expect("ascii");
		let (data, check) = group.split_at(GROUP_LEN);
		let expected = luhn_check_char(data);
		if check.chars().next() != Some(expected) {
			return Err(DeviceIdError::CheckFailed);
		}
	}

	Ok(())
}

/// The first 7-char group of the dashed canonical form — a display aid for
/// logs and CLI tables, not a trust boundary (SPEC_FULL.md §F.1).
pub fn short_id(device_id: &str) -> &str {
	device_id.split('-').next().unwrap_or(device_id)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn fake_der(seed: u8) -> Vec<u8> {
		vec![seed; 300]
	}

	#[test]
	fn device_id_is_deterministic() {
		let der = fake_der(7);
		assert_eq!(device_id_from_der(&der), device_id_from_der(&der));
	}

	#[test]
	fn device_id_has_eight_groups_of_seven() {
		let id = device_id_from_der(&fake_der(1));
		let groups: Vec<&str> = id.split('-').collect();
		assert_eq!(groups.len(), 8);
		assert!(groups.iter().all(|g| g.len() == 7));
	}

	#[test]
	fn generated_device_id_validates() {
		let id = device_id_from_der(&fake_der(42));
		validate_device_id(&id).unwrap();
	}

	#[test]
	fn single_character_corruption_is_rejected() {
		let id = device_id_from_der(&fake_der(99));
		let mut chars: Vec<char> = id.chars().collect();
		// Flip a data character (not a dash) to a different alphabet letter.
		let idx = chars.iter().position(|c| *c != '-').unwrap();
		let original = chars[idx];
		let replacement = LUHN_ALPHABET
			.iter()
			.map(|&b| b as char)
			.find(|&c| c != original)
			.unwrap();
		chars[idx] = replacement;
		let corrupted: String = chars.into_iter().collect();
		assert!(validate_device_id(&corrupted).is_err());
	}

	#[test]
	fn wrong_length_is_rejected() {
		assert_eq!(validate_device_id("TOOSHORT"), Err(DeviceIdError::InvalidLength));
	}

	#[test]
	fn bad_alphabet_character_is_rejected() {
		let id = device_id_from_der(&fake_der(3));
		let corrupted = id.replacen('A', "1", 1).replacen('B', "0", 1);
		// Only assert if we actually introduced a non-alphabet char.
		if corrupted.contains('0') || corrupted.contains('1') {
			assert!(validate_device_id(&corrupted).is_err());
		}
	}

	#[test]
	fn short_id_is_first_group() {
		let id = "ABCDEFG-HIJKLMN-OPQRSTU-VWXYZ23-4567ABC-DEFGHIJ-KLMNOPQ-RSTUVWX";
		assert_eq!(short_id(id), "ABCDEFG");
	}
}
