//! Structured logging setup.
//!
//! Console output in pretty, compact, or JSON format, filtered through
//! `EnvFilter`.

mod tracing_init;

pub use tracing_init::*;
