//! Console logging for the command line tool.
//!
//! Installs a `tracing-subscriber` registry with the format, level and filter
//! directives from `[observability.logging]`.

mod tracing_init;

pub use tracing_init::*;
