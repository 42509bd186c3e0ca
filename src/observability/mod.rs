//! Observability module: structured logging for the command-line binary.
//!
//! The library itself only emits `tracing` events; installing a subscriber is
//! left to the host, which for the bundled binary is [`init_tracing`].

mod tracing_init;

pub use tracing_init::*;
