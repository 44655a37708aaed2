//! Wire types for the Scout daemon RPC service (internal).
//!
//! This crate has no logic beyond (de)serialization: the gRPC contract
//! generated from `proto/scout.proto`, and the plain-JSON formats Scout
//! writes to disk or returns as opaque RPC payloads (HAR export).
//!
//! # Main types
//!
//! - [`pb`] - generated gRPC client/server code and message types
//! - [`har`] - HAR 1.2 document types returned by `ExportHar`

pub mod har;

/// Generated gRPC types and service traits for `scout.v1`.
///
/// Client stubs live at `pb::scout_client::ScoutClient` /
/// `pb::pairing_client::PairingClient`; server traits at
/// `pb::scout_server::Scout` / `pb::pairing_server::Pairing`.
pub mod pb {
	tonic::include_proto!("scout.v1");
}
