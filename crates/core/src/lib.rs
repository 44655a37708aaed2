//! The normative core of the Scout browser-automation daemon (spec.md
//! §1-§9): session lifecycle, event fan-out, HAR recording, and the
//! identity/trust/mTLS layer that lets a fleet of daemons trust each
//! other. Everything in this crate is addressed by the RPC service in
//! [`rpc`]; the CLI, the daemon binary's process glue and the CDP
//! transport itself are external collaborators (`scout-cli`,
//! `scout-runtime`).

pub mod error;
pub mod event_bus;
pub mod identity;
pub mod pairing;
pub mod paths;
pub mod pump;
pub mod recorder;
pub mod rpc;
pub mod session;
pub mod trust;
pub mod tls;

pub use error::{ErrorCode, Result, ScoutError};
pub use event_bus::{BrowserEvent, EventBus};
pub use identity::Identity;
pub use pairing::PairingService;
pub use paths::ScoutPaths;
pub use recorder::NetworkRecorder;
pub use session::{CreateSessionOptions, Session, SessionId, SessionManager};
pub use trust::TrustStore;
