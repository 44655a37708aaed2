//! Service-trait implementations binding `scout-core`'s domain types to
//! the generated `scout.v1` gRPC contract (spec.md §4.9).

mod convert;
pub mod error_map;
mod pairing_service;
mod scout_service;

pub use pairing_service::PairingRpcService;
pub use scout_service::{MAX_MESSAGE_SIZE_BYTES, ScoutService};
