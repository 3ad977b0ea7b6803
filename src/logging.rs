//! Logging setup (A2, `SPEC_FULL.md` §2): a `tracing-subscriber` stack
//! replacing `original_source/src/logging/logging.go`'s zap + lumberjack
//! rotating file logger. Log rotation is an operational concern better
//! handled by the process supervisor (systemd, a container runtime) than by
//! the binary itself, so this crate logs structured lines to stdout and
//! leaves rotation to the deployment environment.

use tracing_subscriber::EnvFilter;

use crate::config::LogLevel;

/// Initializes the global `tracing` subscriber. Must be called exactly once,
/// before any other module logs.
pub fn init(level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_filter_directive()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
