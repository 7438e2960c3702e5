//! Per-connection decode/dispatch/encode.
//!
//! One request per connection: apply a 10 s deadline, decode one frame,
//! dispatch by action, encode the response, close. Action handlers catch
//! their own expected errors and fold them into `{ok:false, error}` rather
//! than tearing the connection down; only framing/deadline failures
//! propagate out of [`handle_connection`].

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;

use super::DaemonState;
use crate::codec::{self, Action, Request, Response};
use crate::error::{DaemonError, Result};
use crate::keys;

const CONNECTION_DEADLINE: Duration = Duration::from_secs(10);

pub async fn handle_connection(state: Arc<DaemonState>, mut stream: TcpStream) -> Result<()> {
    tokio::time::timeout(CONNECTION_DEADLINE, serve(&state, &mut stream))
        .await
        .map_err(|_| DaemonError::Protocol("connection deadline exceeded".into()))?
}

async fn serve(state: &DaemonState, stream: &mut TcpStream) -> Result<()> {
    let request: Request = codec::read_frame(stream).await?;
    let response = dispatch(state, request);
    codec::write_frame(stream, &response).await
}

fn dispatch(state: &DaemonState, req: Request) -> Response {
    match try_dispatch(state, &req) {
        Ok(resp) => resp,
        Err(e) => Response::err(e.to_string()),
    }
}

fn try_dispatch(state: &DaemonState, req: &Request) -> Result<Response> {
    let action = req.action.ok_or_else(|| DaemonError::ActionRejected("missing action".into()))?;
    match action {
        Action::Ping => Ok(Response::ok()),
        Action::SendKeys => send_keys(state, req),
        Action::SendKey => send_key(state, req),
        Action::CapturePane => capture_pane(state, req),
        Action::HasSession => Ok(Response::ok_with_exists(state.has_session())),
        Action::KillSession => {
            state.pty.close();
            Ok(Response::ok())
        }
        Action::SetOption => set_option(state, req),
        Action::PipePane => pipe_pane(state, req),
    }
}

fn send_keys(state: &DaemonState, req: &Request) -> Result<Response> {
    let text = req.text.as_deref().unwrap_or("");
    if !text.is_empty() {
        state.pty.write(text.as_bytes())?;
    }
    if req.send_enter.unwrap_or(false) {
        state.pty.write(b"\r")?;
    }
    Ok(Response::ok())
}

fn send_key(state: &DaemonState, req: &Request) -> Result<Response> {
    let name = req.key.as_deref().ok_or_else(|| DaemonError::ActionRejected("send_key: missing key".into()))?;
    let bytes = keys::translate(name)?;
    state.pty.write(bytes)?;
    Ok(Response::ok())
}

fn capture_pane(state: &DaemonState, req: &Request) -> Result<Response> {
    let max_lines = req.lines.map(|n| n as i64).unwrap_or(0);
    let screen = state.screen.lock().expect("screen mutex poisoned");
    let rows = screen.screen().capture(max_lines);
    Ok(Response::ok_with_output(rows.join("\n")))
}

fn set_option(state: &DaemonState, req: &Request) -> Result<Response> {
    let option = req.option.as_deref().ok_or_else(|| DaemonError::ActionRejected("set_option: missing option".into()))?;
    if option != "history-limit" {
        return Err(DaemonError::ActionRejected(format!("unsupported option: {}", option)));
    }
    let value = req.value.as_deref().ok_or_else(|| DaemonError::ActionRejected("set_option: missing value".into()))?;
    let limit: usize = value
        .parse()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| DaemonError::ActionRejected(format!("history-limit must be a positive integer, got {}", value)))?;
    state.scrollback.lock().expect("scrollback mutex poisoned").set_capacity(limit);
    Ok(Response::ok())
}

fn pipe_pane(state: &DaemonState, req: &Request) -> Result<Response> {
    let shell_cmd = req.shell_cmd.as_deref().unwrap_or("");
    state.tee.set(shell_cmd)?;
    Ok(Response::ok())
}
