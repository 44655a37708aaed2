use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use super::*;

/// Spawns a minimal fake CDP server on loopback and returns its ws:// URL.
/// The server echoes back `{"id": <id>, "result": {"echo": true}}` for
/// every request it receives, and separately accepts a oneshot to push a
/// synthetic event frame.
async fn spawn_fake_server() -> (String, tokio::sync::oneshot::Sender<Value>) {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	let (event_tx, event_rx) = tokio::sync::oneshot::channel::<Value>();

	tokio::spawn(async move {
		let (stream, _) = listener.accept().await.unwrap();
		let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
		let (mut write, mut read) = ws.split();

		let mut event_rx = Some(event_rx);
		loop {
			tokio::select! {
				frame = read.next() => {
					let Some(Ok(Message::Text(text))) = frame else { break };
					let req: Value = serde_json::from_str(&text).unwrap();
					let id = req["id"].clone();
					let reply = json!({"id": id, "result": {"echo": true}});
					if write.send(Message::Text(reply.to_string().into())).await.is_err() {
						break;
					}
				}
				Some(event) = async {
					match event_rx.take() {
						Some(rx) => rx.await.ok(),
						None => std::future::pending().await,
					}
				} => {
					let _ = write.send(Message::Text(event.to_string().into())).await;
				}
			}
		}
	});

	(format!("ws://{addr}"), event_tx)
}

#[tokio::test]
async fn call_round_trips_through_fake_server() {
	let (url, _event_tx) = spawn_fake_server().await;
	let transport = CdpTransport::connect(&url).await.unwrap();

	let result = transport
		.call("Page.navigate", json!({"url": "about:blank"}), None)
		.await
		.unwrap();

	assert_eq!(result, json!({"echo": true}));
}

#[tokio::test]
async fn concurrent_calls_get_correlated_replies() {
	let (url, _event_tx) = spawn_fake_server().await;
	let transport = CdpTransport::connect(&url).await.unwrap();

	let a = transport.call("A", Value::Null, None);
	let b = transport.call("B", Value::Null, None);
	let (ra, rb) = tokio::join!(a, b);
	assert!(ra.is_ok());
	assert!(rb.is_ok());
}

#[tokio::test]
async fn subscribers_receive_broadcast_events() {
	let (url, event_tx) = spawn_fake_server().await;
	let transport = CdpTransport::connect(&url).await.unwrap();
	let mut rx = transport.subscribe();

	event_tx
		.send(json!({
			"method": "Network.requestWillBeSent",
			"params": {"requestId": "1"},
			"sessionId": "sess-a",
		}))
		.unwrap();

	let event = rx.recv().await.unwrap();
	assert_eq!(event.method, "Network.requestWillBeSent");
	assert_eq!(event.session_id, "sess-a");
}

#[tokio::test]
async fn connection_closed_fails_pending_calls() {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();

	tokio::spawn(async move {
		let (stream, _) = listener.accept().await.unwrap();
		let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
		// Accept the connection then drop it immediately without replying.
		drop(ws);
	});

	let transport = CdpTransport::connect(&format!("ws://{addr}")).await.unwrap();
	let result = transport.call("Page.navigate", Value::Null, None).await;
	assert!(result.is_err());
}
