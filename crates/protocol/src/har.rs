//! HAR 1.2 document types (spec.md §3, §4.8).
//!
//! Only the subset of the HAR 1.2 schema Scout actually populates is
//! modeled; unused optional fields (cache, timings breakdown beyond
//! `total_ms`, pages) are omitted rather than stubbed with defaults nobody
//! reads.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarLog {
	pub log: HarLogBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarLogBody {
	pub version: String,
	pub creator: HarCreator,
	pub entries: Vec<HarEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarCreator {
	pub name: String,
	pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarEntry {
	pub started_at: String,
	pub request: HarRequest,
	pub response: HarResponse,
	pub timings: HarTimings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarRequest {
	pub method: String,
	pub url: String,
	pub headers: Vec<HarHeader>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub post_data: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarResponse {
	pub status: u32,
	pub status_text: String,
	pub headers: Vec<HarHeader>,
	pub mime_type: String,
	pub content: HarContent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarContent {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub text: Option<String>,
	pub size: u64,
	#[serde(skip_serializing_if = "std::ops::Not::not", default)]
	pub truncated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarHeader {
	pub name: String,
	pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarTimings {
	pub total_ms: f64,
}

impl HarLog {
	pub fn new(creator: HarCreator, entries: Vec<HarEntry>) -> Self {
		Self {
			log: HarLogBody {
				version: "1.2".to_string(),
				creator,
				entries,
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn serializes_with_version_1_2() {
		let har = HarLog::new(
			HarCreator {
				name: "test-tool".into(),
				version: "1.0.0".into(),
			},
			vec![],
		);
		let json = serde_json::to_string(&har).unwrap();
		assert!(json.contains(r#""version":"1.2""#));
		assert!(json.contains(r#""name":"test-tool""#));
	}
}
