//! Runtime configuration (A1, `SPEC_FULL.md` §2): CLI flags layered over
//! environment variables, mirroring `original_source/src/config/config.go`'s
//! `OPC_ENGINE_SIMULATOR_*` variables but expressed as a `clap` derive so
//! `--help` documents every knob instead of leaving it to a README.

use std::path::PathBuf;

use clap::Parser;

/// Accepted log levels, mapped onto a `tracing` filter directive in
/// [`crate::logging::init`].
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
#[clap(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// OPC UA server simulator: a value-change engine driving synthetic
/// waveforms over a configurable namespace tree.
#[derive(Debug, Parser)]
#[command(name = "opc-engine-simulator", version, about)]
pub struct Config {
    /// Path to the project file describing the namespace tree to simulate.
    /// May also be supplied via `OPC_ENGINE_SIMULATOR_PROJECT_PATH`.
    #[arg(env = "OPC_ENGINE_SIMULATOR_PROJECT_PATH")]
    pub project_path: PathBuf,

    /// Minimum severity of emitted log records.
    #[arg(
        long,
        env = "OPC_ENGINE_SIMULATOR_LOG_LEVEL",
        default_value = "info",
        value_enum
    )]
    pub log_level: LogLevel,

    /// Network interface the control channel listens on.
    #[arg(
        long,
        env = "OPC_ENGINE_SIMULATOR_NETWORK_INTERFACE",
        default_value = "0.0.0.0"
    )]
    pub network_interface: String,

    /// TCP port the control channel listens on.
    #[arg(long, env = "OPC_ENGINE_SIMULATOR_SERVER_PORT", default_value_t = 4840)]
    pub server_port: u16,
}

impl Config {
    pub fn from_args() -> Self {
        Config::parse()
    }

    pub fn control_addr(&self) -> String {
        format!("{}:{}", self.network_interface, self.server_port)
    }
}
