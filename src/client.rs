//! CLI-side transport: read the control file, dial the advertised port,
//! send one request, read the response, and map it to the documented exit
//! code and stderr behaviour.

use std::path::Path;
use std::time::Duration;

use tokio::net::TcpStream;

use crate::codec::{self, Action, Request, Response};
use crate::config::ControlFile;
use crate::error::{DaemonError, Result};

const CONFIRM_TIMEOUT: Duration = Duration::from_secs(5);

/// Read the control file at `socket_path`, confirm the daemon is actually
/// listening, and exchange one request/response pair.
pub async fn send(socket_path: &Path, request: Request) -> Result<Response> {
    let control = ControlFile::read(socket_path)?;
    control.confirm_running(CONFIRM_TIMEOUT).await?;

    let addr = format!("127.0.0.1:{}", control.port);
    let mut stream = TcpStream::connect(&addr).await.map_err(DaemonError::system)?;

    codec::write_frame(&mut stream, &request).await?;
    codec::read_frame(&mut stream).await
}

/// Run one request against the daemon at `socket_path`, print its
/// `output`/error to stdout/stderr as appropriate, and return the process
/// exit code: a transport error or `{ok:false}` response is exit 1 with the
/// message on stderr; a successful `has_session` maps `exists` to 0/1;
/// anything else successful is exit 0.
pub async fn run(socket_path: &Path, action: Action, request: Request) -> i32 {
    match send(socket_path, request).await {
        Err(e) => {
            eprintln!("{}", e);
            1
        }
        Ok(response) => {
            if !response.ok {
                eprintln!("{}", response.error.as_deref().unwrap_or("unknown error"));
                return 1;
            }
            if action == Action::HasSession {
                return if response.exists.unwrap_or(false) { 0 } else { 1 };
            }
            if let Some(output) = &response.output {
                println!("{}", output);
            }
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_file_not_found_maps_to_session_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.sock");
        let err = ControlFile::read(&missing).unwrap_err();
        assert!(matches!(err, DaemonError::NotFound(_)));
    }
}
