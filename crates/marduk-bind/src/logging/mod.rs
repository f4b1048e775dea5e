//! Logger setup for hosts and tools that embed the binding compiler.
//!
//! The compiler itself only emits through the `log` facade: unresolved
//! bindings, skipped handler statements and discarded conversions are
//! reported at `warn` or `debug` depending on
//! [`CompilerConfig::warn_unresolved`](crate::config::CompilerConfig).

mod init;

pub use init::{init_logging, LoggingConfig};
