//! `scout.v1.Scout` service implementation: the unary surface, the two
//! streaming RPCs, and the 64 MiB message-size cap (spec.md §4.9, §6).

use std::pin::Pin;
use std::sync::Arc;

use futures_util::Stream;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status, Streaming};

use scout_protocol::pb;

use crate::rpc::convert::{parse_session_id, to_wire_event};
use crate::rpc::error_map::{code_label, to_status};
use crate::session::{CreateSessionOptions, SessionManager};

/// Message size cap enforced at the server/channel builder level (spec.md
/// §6). Applied by whoever constructs the `tonic::transport::Server` /
/// `Channel` around this service, not by the service itself.
pub const MAX_MESSAGE_SIZE_BYTES: usize = 64 * 1024 * 1024;

/// Channel depth for `StreamEvents`/`Interactive` forwarding tasks;
/// matches the event bus's own per-subscriber capacity (spec.md §4.6).
const STREAM_CHANNEL_CAPACITY: usize = 256;

pub struct ScoutService {
	sessions: Arc<SessionManager>,
}

impl ScoutService {
	pub fn new(sessions: Arc<SessionManager>) -> Self {
		Self { sessions }
	}
}

type EventStream = Pin<Box<dyn Stream<Item = Result<pb::BrowserEvent, Status>> + Send + 'static>>;

#[tonic::async_trait]
impl pb::scout_server::Scout for ScoutService {
	async fn create_session(&self, request: Request<pb::CreateSessionOptions>) -> Result<Response<pb::CreateSessionResponse>, Status> {
		let opts = request.into_inner();
		let session = self
			.sessions
			.create(CreateSessionOptions {
				headless: opts.headless,
				stealth: opts.stealth,
				user_agent: non_empty(opts.user_agent),
				proxy: non_empty(opts.proxy),
				window_width: non_zero(opts.window_width),
				window_height: non_zero(opts.window_height),
				user_data_dir: non_empty(opts.user_data_dir).map(Into::into),
				extra_extensions: opts.extra_extensions.into_iter().map(Into::into).collect(),
				no_sandbox: opts.no_sandbox,
				record: opts.record,
				capture_body: false,
			})
			.await
			.map_err(to_status)?;

		let url = session.get_url().await.unwrap_or_else(|_| "about:blank".to_string());
		let title = session.get_title().await.unwrap_or_default();
		Ok(Response::new(pb::CreateSessionResponse {
			session_id: session.id().to_string(),
			url,
			title,
		}))
	}

	async fn destroy_session(&self, request: Request<pb::SessionRef>) -> Result<Response<pb::Empty>, Status> {
		let id = parse_session_id(&request.into_inner().session_id).map_err(to_status)?;
		self.sessions.destroy(id).await.map_err(to_status)?;
		Ok(Response::new(pb::Empty {}))
	}

	async fn navigate(&self, request: Request<pb::NavigateRequest>) -> Result<Response<pb::NavigateResponse>, Status> {
		let req = request.into_inner();
		let id = parse_session_id(&req.session_id).map_err(to_status)?;
		let session = self.sessions.lookup(id).map_err(to_status)?;
		let (url, title) = session.navigate(&req.url).await.map_err(to_status)?;
		Ok(Response::new(pb::NavigateResponse { url, title }))
	}

	async fn reload(&self, request: Request<pb::SessionRef>) -> Result<Response<pb::NavigateResponse>, Status> {
		let session = self.lookup(&request.into_inner().session_id)?;
		let (url, title) = session.reload().await.map_err(to_status)?;
		Ok(Response::new(pb::NavigateResponse { url, title }))
	}

	async fn go_back(&self, request: Request<pb::SessionRef>) -> Result<Response<pb::NavigateResponse>, Status> {
		let session = self.lookup(&request.into_inner().session_id)?;
		let (url, title) = session.go_back().await.map_err(to_status)?;
		Ok(Response::new(pb::NavigateResponse { url, title }))
	}

	async fn go_forward(&self, request: Request<pb::SessionRef>) -> Result<Response<pb::NavigateResponse>, Status> {
		let session = self.lookup(&request.into_inner().session_id)?;
		let (url, title) = session.go_forward().await.map_err(to_status)?;
		Ok(Response::new(pb::NavigateResponse { url, title }))
	}

	async fn click(&self, request: Request<pb::ElementSelector>) -> Result<Response<pb::Empty>, Status> {
		let req = request.into_inner();
		let session = self.lookup(&req.session_id)?;
		session.click(&req.selector, req.xpath).await.map_err(to_status)?;
		Ok(Response::new(pb::Empty {}))
	}

	async fn double_click(&self, request: Request<pb::ElementSelector>) -> Result<Response<pb::Empty>, Status> {
		let req = request.into_inner();
		let session = self.lookup(&req.session_id)?;
		session.double_click(&req.selector, req.xpath).await.map_err(to_status)?;
		Ok(Response::new(pb::Empty {}))
	}

	async fn right_click(&self, request: Request<pb::ElementSelector>) -> Result<Response<pb::Empty>, Status> {
		let req = request.into_inner();
		let session = self.lookup(&req.session_id)?;
		session.right_click(&req.selector, req.xpath).await.map_err(to_status)?;
		Ok(Response::new(pb::Empty {}))
	}

	async fn hover(&self, request: Request<pb::ElementSelector>) -> Result<Response<pb::Empty>, Status> {
		let req = request.into_inner();
		let session = self.lookup(&req.session_id)?;
		session.hover(&req.selector, req.xpath).await.map_err(to_status)?;
		Ok(Response::new(pb::Empty {}))
	}

	async fn r#type(&self, request: Request<pb::TypeRequest>) -> Result<Response<pb::Empty>, Status> {
		let req = request.into_inner();
		let session = self.lookup(&req.session_id)?;
		session
			.type_text(&req.selector, req.xpath, &req.text, req.clear_first)
			.await
			.map_err(to_status)?;
		Ok(Response::new(pb::Empty {}))
	}

	async fn select_option(&self, request: Request<pb::SelectOptionRequest>) -> Result<Response<pb::Empty>, Status> {
		let req = request.into_inner();
		let session = self.lookup(&req.session_id)?;
		session.select_option(&req.selector, req.xpath, &req.value).await.map_err(to_status)?;
		Ok(Response::new(pb::Empty {}))
	}

	async fn press_key(&self, request: Request<pb::PressKeyRequest>) -> Result<Response<pb::Empty>, Status> {
		let req = request.into_inner();
		let session = self.lookup(&req.session_id)?;
		session.press_key(&req.key_name).await.map_err(to_status)?;
		Ok(Response::new(pb::Empty {}))
	}

	async fn get_text(&self, request: Request<pb::ElementSelector>) -> Result<Response<pb::TextResponse>, Status> {
		let req = request.into_inner();
		let session = self.lookup(&req.session_id)?;
		let text = session.get_text(&req.selector, req.xpath).await.map_err(to_status)?;
		Ok(Response::new(pb::TextResponse { text }))
	}

	async fn get_attribute(&self, request: Request<pb::GetAttributeRequest>) -> Result<Response<pb::TextResponse>, Status> {
		let req = request.into_inner();
		let session = self.lookup(&req.session_id)?;
		let text = session
			.get_attribute(&req.selector, req.xpath, &req.attribute)
			.await
			.map_err(to_status)?
			.unwrap_or_default();
		Ok(Response::new(pb::TextResponse { text }))
	}

	async fn get_title(&self, request: Request<pb::SessionRef>) -> Result<Response<pb::TextResponse>, Status> {
		let session = self.lookup(&request.into_inner().session_id)?;
		let text = session.get_title().await.map_err(to_status)?;
		Ok(Response::new(pb::TextResponse { text }))
	}

	async fn get_url(&self, request: Request<pb::SessionRef>) -> Result<Response<pb::TextResponse>, Status> {
		let session = self.lookup(&request.into_inner().session_id)?;
		let text = session.get_url().await.map_err(to_status)?;
		Ok(Response::new(pb::TextResponse { text }))
	}

	async fn element_exists(&self, request: Request<pb::ElementSelector>) -> Result<Response<pb::BoolResponse>, Status> {
		let req = request.into_inner();
		let session = self.lookup(&req.session_id)?;
		let value = session.element_exists(&req.selector, req.xpath).await.map_err(to_status)?;
		Ok(Response::new(pb::BoolResponse { value }))
	}

	async fn eval(&self, request: Request<pb::EvalRequest>) -> Result<Response<pb::EvalResponse>, Status> {
		let req = request.into_inner();
		let session = self.lookup(&req.session_id)?;
		let value = session.eval(&req.script).await.map_err(to_status)?;
		let result_json = serde_json::to_string(&value).unwrap_or_else(|_| "null".to_string());
		Ok(Response::new(pb::EvalResponse { result_json }))
	}

	async fn screenshot(&self, request: Request<pb::ScreenshotRequest>) -> Result<Response<pb::BytesResponse>, Status> {
		let req = request.into_inner();
		let session = self.lookup(&req.session_id)?;
		let format = match pb::ScreenshotFormat::try_from(req.format).unwrap_or(pb::ScreenshotFormat::Png) {
			pb::ScreenshotFormat::Jpeg => "jpeg",
			_ => "png",
		};
		let quality = if req.quality > 0 { Some(req.quality) } else { None };
		let data = session.screenshot(req.full_page, format, quality).await.map_err(to_status)?;
		Ok(Response::new(pb::BytesResponse {
			data,
			format: format.to_string(),
		}))
	}

	async fn pdf(&self, request: Request<pb::SessionRef>) -> Result<Response<pb::BytesResponse>, Status> {
		let session = self.lookup(&request.into_inner().session_id)?;
		let data = session.pdf().await.map_err(to_status)?;
		Ok(Response::new(pb::BytesResponse {
			data,
			format: "pdf".to_string(),
		}))
	}

	async fn start_recording(&self, request: Request<pb::StartRecordingRequest>) -> Result<Response<pb::Empty>, Status> {
		let req = request.into_inner();
		let session = self.lookup(&req.session_id)?;
		session.start_recording(req.capture_body).map_err(to_status)?;
		Ok(Response::new(pb::Empty {}))
	}

	async fn stop_recording(&self, request: Request<pb::SessionRef>) -> Result<Response<pb::Empty>, Status> {
		let session = self.lookup(&request.into_inner().session_id)?;
		session.stop_recording();
		Ok(Response::new(pb::Empty {}))
	}

	async fn export_har(&self, request: Request<pb::SessionRef>) -> Result<Response<pb::HarResponse>, Status> {
		let session = self.lookup(&request.into_inner().session_id)?;
		let (data, entry_count) = session.export_har().map_err(to_status)?;
		Ok(Response::new(pb::HarResponse {
			data,
			entry_count: entry_count as u32,
		}))
	}

	type StreamEventsStream = EventStream;

	async fn stream_events(&self, request: Request<pb::SessionRef>) -> Result<Response<Self::StreamEventsStream>, Status> {
		let session = self.lookup(&request.into_inner().session_id)?;
		let mut subscriber = session.bus().subscribe();
		let bus = session.bus().clone();

		let (tx, rx) = tokio::sync::mpsc::channel(STREAM_CHANNEL_CAPACITY);
		tokio::spawn(async move {
			while let Some(event) = subscriber.rx.recv().await {
				if tx.send(Ok(to_wire_event(event))).await.is_err() {
					break;
				}
			}
			bus.unsubscribe(subscriber.id);
		});

		Ok(Response::new(Box::pin(ReceiverStream::new(rx))))
	}

	type InteractiveStream = EventStream;

	async fn interactive(&self, request: Request<Streaming<pb::Command>>) -> Result<Response<Self::InteractiveStream>, Status> {
		let sessions = self.sessions.clone();
		let mut inbound = request.into_inner();
		let (tx, rx) = tokio::sync::mpsc::channel(STREAM_CHANNEL_CAPACITY);

		tokio::spawn(async move {
			let mut bound: Option<(Arc<crate::session::Session>, u64)> = None;

			while let Ok(Some(command)) = inbound.message().await {
				let Ok(session_id) = parse_session_id(&command.session_id) else {
					continue;
				};

				let session = match &bound {
					Some((session, _)) if session.id() == session_id => session.clone(),
					_ => match sessions.lookup(session_id) {
						Ok(session) => {
							let subscriber_id = forward_bus_to_stream(&session, tx.clone());
							bound = Some((session.clone(), subscriber_id));
							session
						}
						Err(_) => continue,
					},
				};

				if let Err(err) = dispatch_command(&session, command.clone()).await {
					let event = pb::BrowserEvent {
						session_id: session_id.to_string(),
						timestamp_ms_epoch: now_ms(),
						kind: Some(pb::browser_event::Kind::Error(pb::browser_event::ErrorEvent {
							source: format!("command:{}", command.request_id),
							message: err.message,
							code: code_label(err.code).to_string(),
						})),
					};
					if tx.send(Ok(event)).await.is_err() {
						break;
					}
				}
			}

			if let Some((session, subscriber_id)) = bound {
				session.bus().unsubscribe(subscriber_id);
			}
		});

		Ok(Response::new(Box::pin(ReceiverStream::new(rx))))
	}
}

impl ScoutService {
	fn lookup(&self, session_id: &str) -> Result<Arc<crate::session::Session>, Status> {
		let id = parse_session_id(session_id).map_err(to_status)?;
		self.sessions.lookup(id).map_err(to_status)
	}
}

/// Spawns a task forwarding one session's events onto the `Interactive`
/// stream's shared outbound channel, returning the subscriber id so it
/// can be torn down when the stream rebinds or ends.
fn forward_bus_to_stream(session: &Arc<crate::session::Session>, tx: tokio::sync::mpsc::Sender<Result<pb::BrowserEvent, Status>>) -> u64 {
	let mut subscriber = session.bus().subscribe();
	let id = subscriber.id;
	tokio::spawn(async move {
		while let Some(event) = subscriber.rx.recv().await {
			if tx.send(Ok(to_wire_event(event))).await.is_err() {
				break;
			}
		}
	});
	id
}

/// Executes one `Interactive` command against its bound session (spec.md
/// §4.9: first `Navigate`/`Click` failure is non-fatal to the stream).
async fn dispatch_command(session: &crate::session::Session, command: pb::Command) -> Result<(), crate::error::ScoutError> {
	use pb::command::Action;

	match command.action {
		Some(Action::Navigate(action)) => {
			session.navigate(&action.url).await?;
		}
		Some(Action::Click(action)) => {
			session.click(&action.selector, action.xpath).await?;
		}
		Some(Action::Type(action)) => {
			session
				.type_text(&action.selector, action.xpath, &action.text, action.clear_first)
				.await?;
		}
		Some(Action::PressKey(action)) => {
			session.press_key(&action.key_name).await?;
		}
		Some(Action::Eval(action)) => {
			session.eval(&action.script).await?;
		}
		Some(Action::Screenshot(action)) => {
			session.screenshot(action.full_page, "png", None).await?;
		}
		Some(Action::Wait(_action)) => {
			// No script sandbox for wait conditions (spec.md §1 non-goals):
			// only a timeout-bounded delay is supported here.
			tokio::time::sleep(std::time::Duration::from_millis(_action.timeout_ms.min(30_000))).await;
		}
		Some(Action::Scroll(action)) => {
			session
				.eval(&format!("window.scrollBy({}, {})", action.dx, action.dy))
				.await?;
		}
		None => {}
	}
	Ok(())
}

fn now_ms() -> u64 {
	use std::time::{SystemTime, UNIX_EPOCH};
	SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

fn non_empty(s: String) -> Option<String> {
	if s.is_empty() { None } else { Some(s) }
}

fn non_zero(n: u32) -> Option<u32> {
	if n == 0 { None } else { Some(n) }
}
