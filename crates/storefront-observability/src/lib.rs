//! Observability setup for the storefront services.
//!
//! Services log through `tracing` with structured fields; this crate installs
//! the subscriber that formats and filters them.

mod logging;

pub use logging::*;
