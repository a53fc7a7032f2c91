//! The length-delimited JSON frame codec used between the manager and each
//! worker child.
//!
//! Wire format: a 4-byte little-endian length prefix followed by that many
//! bytes of UTF-8 JSON. The prefix is mandatory here (not merely an option)
//! because the transport is an async `tokio::net::UnixStream`, which may
//! split or coalesce writes; without it, a reader issuing a partial read
//! could not tell where one document ends and the next begins.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::errors::ProtocolError;

/// Default cap on a request frame's encoded size.
pub const DEFAULT_MAX_REQUEST_BYTES: usize = 32 * 1024;
/// Default cap on a response frame's encoded size.
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 8 * 1024;

/// Frame size limits, configured per supervisor instance.
#[derive(Debug, Clone, Copy)]
pub struct FrameLimits {
    pub max_request_bytes: usize,
    pub max_response_bytes: usize,
}

impl Default for FrameLimits {
    fn default() -> Self {
        Self {
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }
}

/// A request sent from the manager to a worker: a method name plus
/// positional and keyword arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestFrame {
    pub method: String,
    pub args: Vec<Value>,
    pub kw: Map<String, Value>,
}

impl RequestFrame {
    pub fn new(method: impl Into<String>, args: Vec<Value>, kw: Map<String, Value>) -> Self {
        Self {
            method: method.into(),
            args,
            kw,
        }
    }

    fn to_wire(&self) -> Value {
        Value::Array(vec![
            Value::String(self.method.clone()),
            Value::Array(self.args.clone()),
            Value::Object(self.kw.clone()),
        ])
    }

    fn from_wire(value: Value) -> Result<Self, ProtocolError> {
        let (method, args, kw): (String, Vec<Value>, Map<String, Value>) =
            serde_json::from_value(value)?;
        Ok(Self { method, args, kw })
    }
}

/// A reply sent from a worker back to the manager. Echoes the request's
/// `method`, `args`, `kw` for callback correlation, and carries exactly one
/// of `ret` (success) or `exc`/`info` (failure).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFrame {
    pub method: String,
    pub args: Vec<Value>,
    pub kw: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ret: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub exc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub info: Option<String>,
}

impl ResponseFrame {
    pub fn ok(request: &RequestFrame, ret: Value) -> Self {
        Self {
            method: request.method.clone(),
            args: request.args.clone(),
            kw: request.kw.clone(),
            ret: Some(ret),
            exc: None,
            info: None,
        }
    }

    pub fn err(request: &RequestFrame, exc: impl Into<String>, info: impl Into<String>) -> Self {
        Self {
            method: request.method.clone(),
            args: request.args.clone(),
            kw: request.kw.clone(),
            ret: None,
            exc: Some(exc.into()),
            info: Some(info.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.exc.is_none()
    }
}

/// Write one length-prefixed JSON document.
async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    value: &Value,
    max_bytes: usize,
) -> Result<(), ProtocolError> {
    let body = serde_json::to_vec(value)?;
    if body.len() > max_bytes {
        return Err(ProtocolError::FrameTooLarge {
            max: max_bytes,
            actual: body.len(),
        });
    }
    writer.write_all(&(body.len() as u32).to_le_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one length-prefixed JSON document. Returns `Eof` if the peer closed
/// the stream before sending a length prefix.
async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    max_bytes: usize,
) -> Result<Value, ProtocolError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Err(ProtocolError::Eof),
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_le_bytes(len_buf) as usize;
    if len > max_bytes {
        return Err(ProtocolError::FrameTooLarge {
            max: max_bytes,
            actual: len,
        });
    }
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(serde_json::from_slice(&body)?)
}

pub async fn write_request<W: AsyncWrite + Unpin>(
    writer: &mut W,
    request: &RequestFrame,
    max_bytes: usize,
) -> Result<(), ProtocolError> {
    write_frame(writer, &request.to_wire(), max_bytes).await
}

pub async fn read_request<R: AsyncRead + Unpin>(
    reader: &mut R,
    max_bytes: usize,
) -> Result<RequestFrame, ProtocolError> {
    RequestFrame::from_wire(read_frame(reader, max_bytes).await?)
}

pub async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &ResponseFrame,
    max_bytes: usize,
) -> Result<(), ProtocolError> {
    let value = serde_json::to_value(response)?;
    write_frame(writer, &value, max_bytes).await
}

pub async fn read_response<R: AsyncRead + Unpin>(
    reader: &mut R,
    max_bytes: usize,
) -> Result<ResponseFrame, ProtocolError> {
    let value = read_frame(reader, max_bytes).await?;
    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn request_round_trips() {
        let mut kw = Map::new();
        kw.insert("verbose".into(), json!(true));
        let request = RequestFrame::new("fetch", vec![json!(42)], kw);

        let mut buf = Vec::new();
        write_request(&mut buf, &request, DEFAULT_MAX_REQUEST_BYTES)
            .await
            .unwrap();

        let mut cursor = std::io::Cursor::new(buf);
        let decoded = read_request(&mut cursor, DEFAULT_MAX_REQUEST_BYTES)
            .await
            .unwrap();
        assert_eq!(decoded, request);
    }

    #[tokio::test]
    async fn response_round_trips_success() {
        let request = RequestFrame::new("add", vec![json!(1), json!(2)], Map::new());
        let response = ResponseFrame::ok(&request, json!(3));

        let mut buf = Vec::new();
        write_response(&mut buf, &response, DEFAULT_MAX_RESPONSE_BYTES)
            .await
            .unwrap();

        let mut cursor = std::io::Cursor::new(buf);
        let decoded = read_response(&mut cursor, DEFAULT_MAX_RESPONSE_BYTES)
            .await
            .unwrap();
        assert_eq!(decoded, response);
        assert!(decoded.is_ok());
    }

    #[tokio::test]
    async fn response_round_trips_failure() {
        let request = RequestFrame::new("sleep", vec![json!(5)], Map::new());
        let response = ResponseFrame::err(&request, "Timeout", "deadline exceeded");

        let mut buf = Vec::new();
        write_response(&mut buf, &response, DEFAULT_MAX_RESPONSE_BYTES)
            .await
            .unwrap();

        let mut cursor = std::io::Cursor::new(buf);
        let decoded = read_response(&mut cursor, DEFAULT_MAX_RESPONSE_BYTES)
            .await
            .unwrap();
        assert!(!decoded.is_ok());
        assert_eq!(decoded.exc.as_deref(), Some("Timeout"));
    }

    #[tokio::test]
    async fn oversized_request_is_rejected() {
        let huge = vec![json!("x".repeat(100)); 10_000];
        let request = RequestFrame::new("fetch", huge, Map::new());
        let mut buf = Vec::new();
        let result = write_request(&mut buf, &request, DEFAULT_MAX_REQUEST_BYTES).await;
        assert!(matches!(result, Err(ProtocolError::FrameTooLarge { .. })));
    }

    #[tokio::test]
    async fn empty_stream_is_eof() {
        let mut cursor = std::io::Cursor::new(Vec::<u8>::new());
        let result = read_request(&mut cursor, DEFAULT_MAX_REQUEST_BYTES).await;
        assert!(matches!(result, Err(ProtocolError::Eof)));
    }
}
