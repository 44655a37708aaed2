//! Browser-level CDP connection: target attach/detach on top of the raw
//! transport.
//!
//! Correlates outstanding CDP requests with their eventual responses,
//! protocol objects, but for CDP targets: a thin registry mapping a page's
//! `targetId` to the `sessionId` CDP assigns once we flatten-attach to it,
//! so callers above this crate can address a specific page without
//! re-deriving the mapping themselves.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::{Value, json};
use tokio::sync::broadcast;

use crate::error::{Error, Result};
use crate::transport::{CdpEvent, CdpTransport};

#[cfg(test)]
mod tests;

/// A browser-level CDP connection.
///
/// Holds the transport plus the target→session map. Cloning shares state
/// (cheap `Arc` clone), matching `CdpTransport`'s own clone semantics.
#[derive(Clone)]
pub struct Connection {
	transport: CdpTransport,
	sessions: Arc<DashMap<String, String>>,
}

impl Connection {
	pub async fn connect(ws_url: &str) -> Result<Self> {
		Ok(Self {
			transport: CdpTransport::connect(ws_url).await?,
			sessions: Arc::new(DashMap::new()),
		})
	}

	/// Issues a browser-level CDP call (no `sessionId`).
	pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
		self.transport.call(method, params, None).await
	}

	/// Issues a CDP call scoped to a previously attached target.
	pub async fn call_on_target(&self, target_id: &str, method: &str, params: Value) -> Result<Value> {
		let session_id = self
			.sessions
			.get(target_id)
			.map(|r| r.value().clone())
			.ok_or_else(|| Error::ConnectionFailed(format!("target {target_id} is not attached")))?;
		self.transport.call(method, params, Some(&session_id)).await
	}

	/// Issues a CDP call scoped to a raw CDP `sessionId`, for callers (the
	/// event pump) that only have the session id an event arrived on, not
	/// the target id it maps back to.
	pub async fn call_with_session_id(&self, session_id: &str, method: &str, params: Value) -> Result<Value> {
		self.transport.call(method, params, Some(session_id)).await
	}

	/// Creates a new page/target via `Target.createTarget` and attaches to
	/// it, returning the new target id.
	pub async fn new_page(&self, url: &str) -> Result<String> {
		let result = self
			.call("Target.createTarget", json!({"url": url}))
			.await?;
		let target_id = result["targetId"]
			.as_str()
			.ok_or_else(|| Error::ConnectionFailed("Target.createTarget returned no targetId".into()))?
			.to_string();
		self.attach(&target_id).await?;
		Ok(target_id)
	}

	/// Attaches to an existing target with `flatten: true` so subsequent
	/// calls can be addressed with CDP's `sessionId` multiplexing rather
	/// than a dedicated socket per page.
	pub async fn attach(&self, target_id: &str) -> Result<String> {
		let result = self
			.call(
				"Target.attachToTarget",
				json!({"targetId": target_id, "flatten": true}),
			)
			.await?;
		let session_id = result["sessionId"]
			.as_str()
			.ok_or_else(|| Error::ConnectionFailed("Target.attachToTarget returned no sessionId".into()))?
			.to_string();
		self.sessions.insert(target_id.to_string(), session_id.clone());
		Ok(session_id)
	}

	/// Detaches from a target and drops its session mapping. Idempotent.
	pub async fn detach(&self, target_id: &str) -> Result<()> {
		if let Some((_, session_id)) = self.sessions.remove(target_id) {
			let _ = self
				.call("Target.detachFromTarget", json!({"sessionId": session_id}))
				.await;
		}
		Ok(())
	}

	pub async fn close_target(&self, target_id: &str) -> Result<()> {
		self.detach(target_id).await?;
		let _ = self
			.call("Target.closeTarget", json!({"targetId": target_id}))
			.await?;
		Ok(())
	}

	/// Subscribes to every CDP event on the connection, unfiltered. Callers
	/// that care about a single target filter by `session_id` themselves
	/// (see [`Connection::session_id_of`]).
	pub fn subscribe(&self) -> broadcast::Receiver<CdpEvent> {
		self.transport.subscribe()
	}

	pub fn session_id_of(&self, target_id: &str) -> Option<String> {
		self.sessions.get(target_id).map(|r| r.value().clone())
	}
}
