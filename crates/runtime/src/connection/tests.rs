use serde_json::json;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use super::*;

/// Fake CDP server that answers `Target.createTarget` and
/// `Target.attachToTarget` deterministically so the session-map bookkeeping
/// can be tested without a real browser.
async fn spawn_fake_server() -> String {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();

	tokio::spawn(async move {
		let (stream, _) = listener.accept().await.unwrap();
		let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
		let (mut write, mut read) = ws.split();

		while let Some(Ok(Message::Text(text))) = read.next().await {
			let req: Value = serde_json::from_str(&text).unwrap();
			let id = req["id"].clone();
			let method = req["method"].as_str().unwrap_or_default();
			let result = match method {
				"Target.createTarget" => json!({"targetId": "target-1"}),
				"Target.attachToTarget" => json!({"sessionId": "session-1"}),
				_ => json!({}),
			};
			let reply = json!({"id": id, "result": result});
			if write
				.send(Message::Text(reply.to_string().into()))
				.await
				.is_err()
			{
				break;
			}
		}
	});

	format!("ws://{addr}")
}

#[tokio::test]
async fn new_page_attaches_and_registers_session() {
	let url = spawn_fake_server().await;
	let conn = Connection::connect(&url).await.unwrap();

	let target_id = conn.new_page("about:blank").await.unwrap();
	assert_eq!(target_id, "target-1");
	assert_eq!(conn.session_id_of(&target_id), Some("session-1".to_string()));
}

#[tokio::test]
async fn detach_clears_session_mapping() {
	let url = spawn_fake_server().await;
	let conn = Connection::connect(&url).await.unwrap();
	let target_id = conn.new_page("about:blank").await.unwrap();

	conn.detach(&target_id).await.unwrap();
	assert_eq!(conn.session_id_of(&target_id), None);
}

#[tokio::test]
async fn call_on_target_fails_for_unattached_target() {
	let url = spawn_fake_server().await;
	let conn = Connection::connect(&url).await.unwrap();

	let result = conn
		.call_on_target("never-attached", "Page.navigate", json!({}))
		.await;
	assert!(result.is_err());
}
