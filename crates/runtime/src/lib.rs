//! CDP transport and headless browser process lifecycle for Scout.
//!
//! This crate is the layer below `scout-core`: it knows how to find and
//! launch a headless Chromium-family browser, speak the Chrome DevTools
//! Protocol over its WebSocket endpoint, and correlate request/response
//! pairs and fan out protocol events. It has no notion of sessions, event
//! buses, or HAR export — those are `scout-core` concerns.

pub mod connection;
pub mod error;
pub mod launcher;
pub mod transport;

pub use connection::Connection;
pub use error::{Error, Result};
pub use launcher::{BrowserProcess, LaunchOptions};
pub use transport::{CdpEvent, CdpTransport};
