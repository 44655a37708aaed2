//! Key-name → physical key mapping for `PressKey` (spec.md §4.9).
//!
//! Maps the small set of named keys spec.md lists, falls back to
//! treating any single-character string as that character, and yields a
//! no-op (key code 0) for anything else.

/// A resolved physical key, ready to hand to
/// `Input.dispatchKeyEvent` (`windowsVirtualKeyCode`/`code`/`key` triple).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalKey {
	pub key: String,
	pub code: String,
	pub windows_virtual_key_code: i32,
	pub text: Option<String>,
}

impl PhysicalKey {
	/// A key name that resolved to nothing (spec.md §4.9 "other names
	/// yield a no-op (key code 0)").
	pub fn noop() -> Self {
		Self {
			key: String::new(),
			code: String::new(),
			windows_virtual_key_code: 0,
			text: None,
		}
	}

	pub fn is_noop(&self) -> bool {
		self.windows_virtual_key_code == 0 && self.text.is_none()
	}
}

/// Resolves a key name per spec.md §4.9's accepted set, a single
/// character, or a no-op.
pub fn resolve(key_name: &str) -> PhysicalKey {
	if let Some(key) = named_key(key_name) {
		return key;
	}

	let mut chars = key_name.chars();
	if let (Some(ch), None) = (chars.next(), chars.next()) {
		return PhysicalKey {
			key: ch.to_string(),
			code: char_code_name(ch),
			windows_virtual_key_code: ch as i32,
			text: Some(ch.to_string()),
		};
	}

	PhysicalKey::noop()
}

fn char_code_name(ch: char) -> String {
	if ch.is_ascii_alphabetic() {
		format!("Key{}", ch.to_ascii_uppercase())
	} else if ch.is_ascii_digit() {
		format!("Digit{ch}")
	} else {
		String::new()
	}
}

fn named_key(name: &str) -> Option<PhysicalKey> {
	let (key, code, vk) = match name {
		"Enter" => ("Enter", "Enter", 13),
		"Tab" => ("Tab", "Tab", 9),
		"Escape" => ("Escape", "Escape", 27),
		"Space" => (" ", "Space", 32),
		"Backspace" => ("Backspace", "Backspace", 8),
		"Delete" => ("Delete", "Delete", 46),
		"ArrowUp" => ("ArrowUp", "ArrowUp", 38),
		"ArrowDown" => ("ArrowDown", "ArrowDown", 40),
		"ArrowLeft" => ("ArrowLeft", "ArrowLeft", 37),
		"ArrowRight" => ("ArrowRight", "ArrowRight", 39),
		"Home" => ("Home", "Home", 36),
		"End" => ("End", "End", 35),
		"PageUp" => ("PageUp", "PageUp", 33),
		"PageDown" => ("PageDown", "PageDown", 34),
		_ => return None,
	};
	let text = if key == "Enter" || key == " " {
		Some(if key == " " { " ".to_string() } else { "\r".to_string() })
	} else {
		None
	};
	Some(PhysicalKey {
		key: key.to_string(),
		code: code.to_string(),
		windows_virtual_key_code: vk,
		text,
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn resolves_named_keys() {
		assert_eq!(resolve("Enter").key, "Enter");
		assert_eq!(resolve("ArrowDown").windows_virtual_key_code, 40);
	}

	#[test]
	fn resolves_single_character() {
		let key = resolve("a");
		assert_eq!(key.key, "a");
		assert_eq!(key.text.as_deref(), Some("a"));
	}

	#[test]
	fn unknown_multi_char_name_is_noop() {
		assert!(resolve("NotARealKey").is_noop());
	}
}
