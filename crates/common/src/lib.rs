//! Common utilities and shared components for updatectl
//!
//! This crate provides functionality used across the updatectl crates:
//! tracing setup, the process-level error type, and identity newtypes.

pub mod observability;

pub mod errors;
pub mod types;

// Re-export commonly used items at the crate root
pub use observability::{init_tracing, LogFormat};

// Re-export error types
pub use errors::{UpdatectlError, UpdatectlResult};

// Re-export common types
pub use types::{MachineId, SessionId};
