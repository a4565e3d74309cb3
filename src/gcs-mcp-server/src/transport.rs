//! Newline-delimited JSON-RPC over a byte stream (stdio in production).
//!
//! Requests are resolved one at a time. While a request is in flight the
//! reader keeps going: a `notifications/cancelled` naming that request, or
//! end of input, drops the handler future without writing a response. Any
//! other line is queued and handled afterwards in arrival order.
//!
//! A line longer than the frame limit is never buffered whole: the excess is
//! discarded as it arrives and the sender gets a `too_large` error.

use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::{Context, Result};
use gcs_mcp_core::ErrorKind;
use serde::Serialize;
use serde::de::{DeserializeSeed, Deserializer, IgnoredAny, MapAccess, Visitor};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use gcs_mcp_types::{
    CancelledNotification, JsonRpcError, JsonRpcMessage, JsonRpcRequest, JsonRpcResponse,
    LogLevel, RequestId, methods,
};

use crate::server::McpServer;

/// Room for the JSON-RPC envelope around an object body.
const ENVELOPE_ALLOWANCE: u64 = 64 * 1024;

/// Most frames held back while a request is in flight.
const MAX_BACKLOG_FRAMES: usize = 32;

/// Longest accepted line for a server whose tools take `max_object_size`
/// byte bodies: room for the body in base64 plus the envelope.
pub fn frame_limit(max_object_size: u64) -> usize {
    let limit = (max_object_size.saturating_mul(4) / 3).saturating_add(ENVELOPE_ALLOWANCE);
    usize::try_from(limit).unwrap_or(usize::MAX)
}

/// One unit of input.
#[derive(Debug, PartialEq)]
enum Frame {
    Line(Vec<u8>),
    /// A line over the limit; only its top-level id, if it came early
    /// enough to be seen, survives.
    Oversized(Option<RequestId>),
}

impl Frame {
    fn len(&self) -> usize {
        match self {
            Self::Line(bytes) => bytes.len(),
            Self::Oversized(_) => 0,
        }
    }
}

/// Reads `\n`-terminated frames of at most `limit` bytes.
///
/// Cancel safe: buffered bytes are only consumed once they are copied into
/// `partial` or discarded.
struct FrameReader<R> {
    inner: BufReader<R>,
    partial: Vec<u8>,
    limit: usize,
    overflowed: bool,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    fn new(reader: R, limit: usize) -> Self {
        Self {
            inner: BufReader::new(reader),
            partial: Vec::new(),
            limit,
            overflowed: false,
        }
    }

    /// Next frame, or `None` at end of input.
    async fn next_frame(&mut self) -> std::io::Result<Option<Frame>> {
        loop {
            let available = self.inner.fill_buf().await?;
            if available.is_empty() {
                if !self.overflowed && self.partial.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(self.finish_frame()));
            }

            let (chunk, complete) = match available.iter().position(|&b| b == b'\n') {
                Some(end) => (&available[..=end], true),
                None => (available, false),
            };
            let consumed = chunk.len();

            if !self.overflowed {
                let room = self.limit.saturating_sub(self.partial.len());
                if chunk.len() <= room {
                    self.partial.extend_from_slice(chunk);
                } else {
                    self.partial.extend_from_slice(&chunk[..room]);
                    self.overflowed = true;
                }
            }
            self.inner.consume(consumed);

            if complete {
                return Ok(Some(self.finish_frame()));
            }
        }
    }

    fn finish_frame(&mut self) -> Frame {
        let bytes = std::mem::take(&mut self.partial);
        if std::mem::replace(&mut self.overflowed, false) {
            Frame::Oversized(recover_id(&bytes))
        } else {
            Frame::Line(bytes)
        }
    }
}

/// Frames read while a request was in flight, bounded in count and bytes.
struct Backlog {
    frames: VecDeque<Frame>,
    bytes: usize,
    max_bytes: usize,
}

impl Backlog {
    fn new(max_bytes: usize) -> Self {
        Self {
            frames: VecDeque::new(),
            bytes: 0,
            max_bytes,
        }
    }

    fn push(&mut self, frame: Frame) {
        self.bytes += frame.len();
        self.frames.push_back(frame);
    }

    fn pop(&mut self) -> Option<Frame> {
        let frame = self.frames.pop_front()?;
        self.bytes -= frame.len();
        Some(frame)
    }

    fn is_full(&self) -> bool {
        self.frames.len() >= MAX_BACKLOG_FRAMES || self.bytes >= self.max_bytes
    }
}

/// How an in-flight request ended.
enum Outcome {
    Completed(JsonRpcResponse),
    Cancelled,
    Disconnected,
}

/// Run the server with stdio transport.
pub async fn run_stdio(server: Arc<McpServer>) -> Result<()> {
    info!(server = %server.info().name, "Starting MCP server with stdio transport");
    run(server, tokio::io::stdin(), tokio::io::stdout()).await
}

/// Serve `reader`/`writer` until end of input.
pub async fn run<R, W>(server: Arc<McpServer>, reader: R, mut writer: W) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let limit = frame_limit(server.max_object_size());
    let mut frames = FrameReader::new(reader, limit);
    let mut backlog = Backlog::new(limit);

    loop {
        let frame = match backlog.pop() {
            Some(frame) => frame,
            None => match frames.next_frame().await.context("Failed to read input")? {
                Some(frame) => frame,
                None => {
                    debug!("EOF received, shutting down");
                    break;
                }
            },
        };

        let bytes = match frame {
            Frame::Line(bytes) => bytes,
            Frame::Oversized(id) => {
                warn!(limit, id = ?id, "Input line exceeds the frame limit");
                let error = JsonRpcError::invalid_request(format!("Message exceeds {limit} bytes"))
                    .with_data(json!({ "kind": ErrorKind::TooLarge.as_str() }));
                write_error(&mut writer, id, error).await?;
                continue;
            }
        };

        let Ok(text) = std::str::from_utf8(&bytes) else {
            warn!(bytes = bytes.len(), "Input line is not UTF-8");
            write_error(&mut writer, None, JsonRpcError::parse_error("Invalid UTF-8")).await?;
            continue;
        };
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }

        match JsonRpcMessage::parse(trimmed) {
            Ok(JsonRpcMessage::Request(request)) => {
                let id = request.id.clone();
                match resolve(&server, request, &mut frames, &mut backlog).await? {
                    Outcome::Completed(response) => write_message(&mut writer, &response).await?,
                    Outcome::Cancelled => {
                        debug!(id = %id, "Request cancelled; no response sent");
                        if let Some(note) = server
                            .log_notification(LogLevel::Debug, format!("request {id} cancelled"))
                            .await
                        {
                            write_message(&mut writer, &note).await?;
                        }
                    }
                    Outcome::Disconnected => {
                        debug!(id = %id, "EOF while a request was in flight; abandoning it");
                        break;
                    }
                }
            }
            Ok(JsonRpcMessage::Notification(notification)) => {
                server.handle_notification(notification).await;
            }
            Err(e) => {
                warn!(error = %e, "Invalid JSON-RPC message");
                write_error(&mut writer, None, e.to_rpc_error()).await?;
            }
        }
    }

    info!("MCP server stopped");
    Ok(())
}

/// Drive one request to completion while watching the input for its
/// cancellation. Once the backlog is full, input is left unread until the
/// handler finishes.
async fn resolve<R>(
    server: &McpServer,
    request: JsonRpcRequest,
    frames: &mut FrameReader<R>,
    backlog: &mut Backlog,
) -> Result<Outcome>
where
    R: AsyncRead + Unpin,
{
    let id = request.id.clone();
    let handler = server.handle_request(request);
    tokio::pin!(handler);

    loop {
        if backlog.is_full() {
            debug!(id = %id, "Backlog full; waiting for the in-flight request");
            return Ok(Outcome::Completed((&mut handler).await));
        }
        tokio::select! {
            biased;
            response = &mut handler => return Ok(Outcome::Completed(response)),
            frame = frames.next_frame() => {
                match frame.context("Failed to read input")? {
                    None => return Ok(Outcome::Disconnected),
                    Some(Frame::Line(bytes)) if cancels(&bytes, &id) => {
                        return Ok(Outcome::Cancelled);
                    }
                    Some(frame) => backlog.push(frame),
                }
            }
        }
    }
}

/// Whether `frame` is a `notifications/cancelled` for request `id`.
fn cancels(frame: &[u8], id: &RequestId) -> bool {
    let Ok(text) = std::str::from_utf8(frame) else {
        return false;
    };
    match JsonRpcMessage::parse(text.trim()) {
        Ok(JsonRpcMessage::Notification(notification))
            if notification.method == methods::CANCELLED =>
        {
            notification
                .params
                .and_then(|params| serde_json::from_value::<CancelledNotification>(params).ok())
                .is_some_and(|cancelled| cancelled.request_id == *id)
        }
        _ => false,
    }
}

/// The top-level `"id"` of a possibly truncated JSON object, if it appears
/// before the cut.
fn recover_id(head: &[u8]) -> Option<RequestId> {
    let mut id = None;
    let mut de = serde_json::Deserializer::from_slice(head);
    // The truncated tail always ends in an error; `id` is set before it.
    let _ = TopLevelId(&mut id).deserialize(&mut de);
    id
}

struct TopLevelId<'a>(&'a mut Option<RequestId>);

impl<'de> DeserializeSeed<'de> for TopLevelId<'_> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for TopLevelId<'_> {
    type Value = ();

    fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("a JSON-RPC message object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<(), A::Error> {
        while let Some(key) = map.next_key::<String>()? {
            if key == "id" {
                *self.0 = map.next_value::<Option<RequestId>>()?;
                return Ok(());
            }
            map.next_value::<IgnoredAny>()?;
        }
        Ok(())
    }
}

async fn write_error<W: AsyncWrite + Unpin>(
    writer: &mut W,
    id: Option<RequestId>,
    error: JsonRpcError,
) -> Result<()> {
    let response = JsonRpcResponse::error(id.unwrap_or(RequestId::Number(0)), error);
    write_message(writer, &response).await
}

async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut line = serde_json::to_vec(message).context("Failed to serialize response")?;
    line.push(b'\n');
    writer
        .write_all(&line)
        .await
        .context("Failed to write response")?;
    writer.flush().await?;
    Ok(())
}
