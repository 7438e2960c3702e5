//! Wire codec: `[4-byte big-endian length][length bytes of UTF-8 JSON]`.
//!
//! Symmetric for requests and responses, so the same `read_frame`/
//! `write_frame` pair serves both the dispatcher (reading a request,
//! writing a response) and the client (writing a request, reading a
//! response).

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::{DaemonError, Result};

/// Frames larger than this are rejected before their body is read.
pub const MAX_FRAME_LEN: usize = 10 * 1024 * 1024;

/// The dispatcher action a request names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Ping,
    SendKeys,
    SendKey,
    CapturePane,
    HasSession,
    KillSession,
    SetOption,
    PipePane,
}

/// A single request frame. All fields besides `action` are optional; a
/// given action only interprets the fields it needs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Request {
    pub action: Option<Action>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub literal: Option<bool>,
    #[serde(default)]
    pub send_enter: Option<bool>,
    #[serde(default)]
    pub lines: Option<usize>,
    #[serde(default)]
    pub alternate: Option<bool>,
    #[serde(default)]
    pub join: Option<bool>,
    #[serde(default)]
    pub option: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub shell_cmd: Option<String>,
}

/// A single response frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exists: Option<bool>,
}

impl Response {
    pub fn ok() -> Self {
        Response { ok: true, ..Default::default() }
    }

    pub fn ok_with_output(output: String) -> Self {
        Response { ok: true, output: Some(output), ..Default::default() }
    }

    pub fn ok_with_exists(exists: bool) -> Self {
        Response { ok: true, exists: Some(exists), ..Default::default() }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Response { ok: false, error: Some(message.into()), ..Default::default() }
    }
}

/// Read one length-prefixed JSON frame from `stream` and deserialize it.
pub async fn read_frame<T, S>(stream: &mut S) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
    S: tokio::io::AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    stream
        .read_exact(&mut len_buf)
        .await
        .map_err(|e| DaemonError::Protocol(format!("reading frame length: {}", e)))?;
    let len = u32::from_be_bytes(len_buf) as usize;

    if len > MAX_FRAME_LEN {
        return Err(DaemonError::Protocol(format!(
            "frame length {} exceeds maximum {}",
            len, MAX_FRAME_LEN
        )));
    }

    let mut body = vec![0u8; len];
    stream
        .read_exact(&mut body)
        .await
        .map_err(|e| DaemonError::Protocol(format!("reading frame body: {}", e)))?;

    serde_json::from_slice(&body).map_err(|e| DaemonError::Protocol(format!("decoding frame: {}", e)))
}

/// Serialize `value` and write it as one length-prefixed JSON frame.
pub async fn write_frame<T, S>(stream: &mut S, value: &T) -> Result<()>
where
    T: Serialize,
    S: tokio::io::AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(value).map_err(|e| DaemonError::Protocol(format!("encoding frame: {}", e)))?;
    if body.len() > MAX_FRAME_LEN {
        return Err(DaemonError::Protocol(format!(
            "frame length {} exceeds maximum {}",
            body.len(),
            MAX_FRAME_LEN
        )));
    }
    let len = (body.len() as u32).to_be_bytes();
    stream
        .write_all(&len)
        .await
        .map_err(|e| DaemonError::Protocol(format!("writing frame length: {}", e)))?;
    stream
        .write_all(&body)
        .await
        .map_err(|e| DaemonError::Protocol(format!("writing frame body: {}", e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn round_trips_arbitrary_request() {
        let req = Request {
            action: Some(Action::SendKeys),
            text: Some("héllo wörld 🎉".to_string()),
            send_enter: Some(true),
            ..Default::default()
        };

        let mut buf = Vec::new();
        write_frame(&mut buf, &req).await.unwrap();

        let mut cursor = Cursor::new(buf);
        let decoded: Request = read_frame(&mut cursor).await.unwrap();

        assert_eq!(decoded.action, Some(Action::SendKeys));
        assert_eq!(decoded.text, req.text);
        assert_eq!(decoded.send_enter, Some(true));
    }

    #[tokio::test]
    async fn oversized_header_is_rejected_before_reading_body() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&((MAX_FRAME_LEN as u32) + 1).to_be_bytes());
        // Deliberately do not append a body; rejection must happen before
        // the codec tries to read it.
        let mut cursor = Cursor::new(buf);
        let err = read_frame::<Request, _>(&mut cursor).await.unwrap_err();
        assert!(matches!(err, DaemonError::Protocol(_)));
    }

    #[tokio::test]
    async fn truncated_body_is_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&10u32.to_be_bytes());
        buf.extend_from_slice(b"short");
        let mut cursor = Cursor::new(buf);
        let err = read_frame::<Request, _>(&mut cursor).await.unwrap_err();
        assert!(matches!(err, DaemonError::Protocol(_)));
    }

    #[tokio::test]
    async fn tolerates_multiple_concatenated_messages() {
        let mut buf = Vec::new();
        write_frame(&mut buf, &Request { action: Some(Action::Ping), ..Default::default() })
            .await
            .unwrap();
        write_frame(&mut buf, &Request { action: Some(Action::HasSession), ..Default::default() })
            .await
            .unwrap();

        let mut cursor = Cursor::new(buf);
        let first: Request = read_frame(&mut cursor).await.unwrap();
        let second: Request = read_frame(&mut cursor).await.unwrap();

        assert_eq!(first.action, Some(Action::Ping));
        assert_eq!(second.action, Some(Action::HasSession));
    }

    #[tokio::test]
    async fn response_serializes_only_populated_fields() {
        let resp = Response::ok();
        let json = serde_json::to_string(&resp).unwrap();
        assert_eq!(json, r#"{"ok":true}"#);
    }
}
