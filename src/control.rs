//! TCP control channel (C9, `spec.md` §6): a line-delimited JSON protocol,
//! one command per connection, ported from
//! `original_source/src/tcp-server/tcp_server_impl.go`. The only recognized
//! command today is `configure nodes`, whose payload is a structure tree
//! handed to the [`crate::supervisor::SupervisorHandle`].

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

use crate::project::ProjectError;
use crate::supervisor::SupervisorHandle;

/// Errors surfaced by the control channel itself, as distinct from the
/// supervisor's own reconfiguration failures (`SPEC_FULL.md` §7).
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("invalid message")]
    MalformedMessage,
    #[error("unrecognized command")]
    UnrecognizedCommand,
    #[error(transparent)]
    Project(#[from] ProjectError),
}

#[derive(Debug, Deserialize)]
struct IncomingCommand {
    command: String,
    payload: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct Response {
    status: &'static str,
    reason: Option<String>,
}

impl Response {
    fn success() -> Self {
        Response {
            status: "success",
            reason: None,
        }
    }

    fn failure(reason: impl std::fmt::Display) -> Self {
        Response {
            status: "failure",
            reason: Some(reason.to_string()),
        }
    }
}

/// Runs the control server's accept loop until `stop_rx` fires. Each
/// accepted connection is handled to completion (or error) before the
/// listener accepts the next one, matching the original's single-threaded
/// accept loop — concurrent connections are not a goal of this channel
/// (`spec.md` §6).
pub async fn run(listener: TcpListener, supervisor: SupervisorHandle, mut stop_rx: watch::Receiver<bool>) {
    tracing::info!(addr = ?listener.local_addr().ok(), "starting control server");

    loop {
        tokio::select! {
            biased;
            _ = stop_rx.changed() => {
                tracing::info!("stopping control server");
                return;
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, addr)) => {
                        tracing::debug!(%addr, "accepted control connection");
                        if let Err(e) = handle_connection(stream, &supervisor).await {
                            tracing::warn!(%addr, error = %e, "error handling control connection");
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "error accepting control connection");
                    }
                }
            }
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    supervisor: &SupervisorHandle,
) -> anyhow::Result<()> {
    let (reader, mut writer) = stream.split();
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();
    reader.read_until(b'\n', &mut line).await?;
    let text = String::from_utf8_lossy(&line);
    let text = text.trim();

    let response = match serde_json::from_str::<IncomingCommand>(text) {
        Err(_) => {
            tracing::warn!("received malformed control message");
            Response::failure(ControlError::MalformedMessage)
        }
        Ok(command) => dispatch(command, supervisor).await,
    };

    let body = serde_json::to_vec(&response)?;
    writer.write_all(&body).await?;
    Ok(())
}

async fn dispatch(command: IncomingCommand, supervisor: &SupervisorHandle) -> Response {
    match command.command.to_lowercase().as_str() {
        "configure nodes" => match parse_structure_payload(command.payload) {
            Ok(tree) => match supervisor.configure_nodes(tree).await {
                Ok(()) => Response::success(),
                Err(reason) => Response::failure(reason),
            },
            Err(e) => Response::failure(ControlError::from(e)),
        },
        other => {
            tracing::warn!(command = other, "unrecognized control command");
            Response::failure(ControlError::UnrecognizedCommand)
        }
    }
}

fn parse_structure_payload(
    payload: serde_json::Value,
) -> Result<crate::structure::StructureTree, ProjectError> {
    let json = serde_json::to_string(&payload).map_err(ProjectError::Json)?;
    crate::project::parse_project(&json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_success_has_explicit_null_reason() {
        let r = Response::success();
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(json, r#"{"status":"success","reason":null}"#);
    }

    #[test]
    fn response_failure_includes_reason() {
        let r = Response::failure("bad input");
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(json, r#"{"status":"failure","reason":"bad input"}"#);
    }
}
