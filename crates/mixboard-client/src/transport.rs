//! Push transports
//!
//! Implement `Connector` to feed a channel from something other than SSE.

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use std::time::Duration;

use crate::error::TransportError;

/// Raw message payloads from one open connection. Ends when the server closes it.
pub type FrameStream = BoxStream<'static, Result<String, TransportError>>;

/// Opens push connections to a fixed endpoint
///
/// # Example
///
/// ```rust,ignore
/// use mixboard_client::{Connector, FrameStream, TransportError};
/// use async_trait::async_trait;
///
/// struct WsConnector { url: String }
///
/// #[async_trait]
/// impl Connector for WsConnector {
///     async fn connect(&self) -> Result<FrameStream, TransportError> {
///         let socket = open_socket(&self.url).await?;
///         Ok(socket.text_frames().boxed())
///     }
///
///     fn endpoint(&self) -> &str { &self.url }
/// }
/// ```
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a fresh connection
    async fn connect(&self) -> Result<FrameStream, TransportError>;

    /// Where this connector points (for logging)
    fn endpoint(&self) -> &str;
}

/// Server-Sent Events over HTTP
pub struct SseConnector {
    client: reqwest::Client,
    url: String,
}

impl SseConnector {
    pub fn new(url: impl Into<String>) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        Ok(Self::with_client(client, url))
    }

    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl Connector for SseConnector {
    async fn connect(&self) -> Result<FrameStream, TransportError> {
        let response = self
            .client
            .get(&self.url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        let mut decoder = SseDecoder::default();
        let frames = response.bytes_stream().flat_map(move |chunk| {
            let items: Vec<Result<String, TransportError>> = match chunk {
                Ok(bytes) => match decoder.push(&bytes) {
                    Ok(frames) => frames.into_iter().map(|f| Ok(f.data)).collect(),
                    Err(e) => vec![Err(e)],
                },
                Err(e) => vec![Err(TransportError::Stream(e.to_string()))],
            };
            futures::stream::iter(items)
        });

        Ok(frames.boxed())
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}

/// One dispatched SSE event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

/// Largest partial event held while waiting for its terminator
pub const DEFAULT_MAX_BUFFER: usize = 1024 * 1024;

/// Incremental `text/event-stream` parser.
///
/// Chunks may split anywhere, including inside a UTF-8 sequence or a CRLF
/// pair. Lines may end in LF, CRLF or a lone CR. Comment lines (keep-alives)
/// and events without data produce nothing.
#[derive(Debug)]
pub struct SseDecoder {
    buf: Vec<u8>,
    max_buffer: usize,
    // Last byte seen was CR; a leading LF in the next chunk belongs to it
    after_cr: bool,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::with_max_buffer(DEFAULT_MAX_BUFFER)
    }
}

impl SseDecoder {
    pub fn with_max_buffer(max_buffer: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_buffer,
            after_cr: false,
        }
    }

    /// Feed a chunk, returning every event it completed.
    ///
    /// Fails once an unterminated event outgrows the buffer limit; the
    /// decoder should be discarded with its connection.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<SseFrame>, TransportError> {
        for &byte in chunk {
            match byte {
                b'\r' => {
                    self.buf.push(b'\n');
                    self.after_cr = true;
                }
                b'\n' if self.after_cr => self.after_cr = false,
                _ => {
                    self.buf.push(byte);
                    self.after_cr = false;
                }
            }
        }

        let mut frames = Vec::new();
        while let Some(end) = self.buf.windows(2).position(|w| w == b"\n\n") {
            let block: Vec<u8> = self.buf.drain(..end + 2).collect();
            if let Some(frame) = parse_block(&block[..end]) {
                frames.push(frame);
            }
        }

        if self.buf.len() > self.max_buffer {
            return Err(TransportError::Stream(format!(
                "event exceeds {} bytes without a terminator",
                self.max_buffer
            )));
        }
        Ok(frames)
    }
}

fn parse_block(block: &[u8]) -> Option<SseFrame> {
    let text = String::from_utf8_lossy(block);
    let mut event = None;
    let mut data: Vec<&str> = Vec::new();

    for line in text.split('\n') {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => event = Some(value.to_string()),
            "data" => data.push(value),
            _ => {}
        }
    }

    if data.is_empty() {
        return None;
    }
    Some(SseFrame {
        event,
        data: data.join("\n"),
    })
}
