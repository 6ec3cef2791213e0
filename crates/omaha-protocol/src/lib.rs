//! Omaha update protocol for updatectl
//!
//! This crate defines the client side of the Omaha protocol as spoken by
//! simulated update-engine instances:
//!
//! - [`Request`] / [`Response`]: the wire model, one app entry per message
//! - [`Event`]: the lifecycle (type, result) pairs reported to the server
//! - [`Transport`]: the seam used to send one request and receive one
//!   response
//! - [`HttpTransport`]: `POST {server}/v1/update/` with a `text/xml` body

mod client;
mod errors;
mod protocol;

// Re-export error types
pub use errors::ProtocolError;

// Re-export transport types
pub use client::{HttpTransport, Transport, UPDATE_PATH};

// Re-export protocol types
pub use protocol::{
    decode_response, encode_request, encode_response, AppRequest, AppResponse, Event,
    EventElement, EventResult, EventType, InstallSource, Manifest, Os, Package, Packages, Ping,
    Request, Response, UpdateCheckRequest, UpdateCheckResponse, UpdateStatus, Url, Urls,
    EVENT_ERROR_CODE, OS_PLATFORM, OS_VERSION, PROTOCOL_VERSION, UPDATER_VERSION,
};
