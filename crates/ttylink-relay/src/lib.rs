//! Relay engine for terminal sessions between NAT-hidden devices and
//! browsers.
//!
//! Devices dial out and register under an externally supplied id; browsers
//! log in against that id and receive an opaque session token. From then
//! on the relay forwards frames verbatim between the two peers of each
//! session without interpreting payloads.

pub mod broker;
pub mod connection;
pub mod http;
pub mod registry;
pub mod router;
pub mod sweeper;
