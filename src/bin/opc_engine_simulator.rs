//! Process entry point (A4, `SPEC_FULL.md` §2): wires configuration,
//! logging, the initial project file, the supervisor, and the control
//! channel together, then waits for a termination signal before tearing
//! everything down — the same shape as `original_source/src/main.go`.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::watch;

use opc_engine_simulator::config::Config;
use opc_engine_simulator::sink::{EventSink, InMemorySink};
use opc_engine_simulator::{control, logging, project, supervisor};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_args();
    logging::init(config.log_level);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "OPC Engine Simulator starting"
    );

    let project_text = tokio::fs::read_to_string(&config.project_path)
        .await
        .with_context(|| format!("reading project file {}", config.project_path.display()))?;
    let tree = project::parse_project(&project_text).context("parsing project file")?;

    // A fresh sink is built per reconfiguration (`spec.md` §4.5 step 2), so
    // the supervisor is handed a factory rather than a single instance.
    let (supervisor_handle, supervisor_task) =
        supervisor::spawn(Box::new(|| Arc::new(InMemorySink::new()) as Arc<dyn EventSink>));
    supervisor_handle
        .configure_nodes(tree)
        .await
        .context("starting initial engine configuration")?;

    let listener = TcpListener::bind(config.control_addr())
        .await
        .with_context(|| format!("binding control channel on {}", config.control_addr()))?;
    let (control_stop_tx, control_stop_rx) = watch::channel(false);
    let control_task = tokio::spawn(control::run(listener, supervisor_handle, control_stop_rx));

    wait_for_termination_signal().await;
    tracing::info!("termination signal received, shutting down");

    let _ = control_stop_tx.send(true);
    let _ = control_task.await;
    let _ = supervisor_task.await;

    tracing::info!("OPC Engine Simulator stopped");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_termination_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt()).expect("failed to register SIGINT handler");
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");

    tokio::select! {
        _ = sigint.recv() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_termination_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
