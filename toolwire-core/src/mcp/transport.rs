//! MCP Transport Implementations
//!
//! A transport carries raw JSON-RPC frames. It is split into a reader and a
//! writer so the server can keep reading while earlier requests are still
//! being answered.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};

use super::protocol::{JsonRpcRequest, JsonRpcResponse};
use crate::error::{Result, ToolwireError};

/// Receiving half of a transport
#[async_trait]
pub trait MessageReader: Send {
    /// Next raw frame, or `None` once the peer has closed the stream
    async fn read_message(&mut self) -> Result<Option<String>>;
}

/// Sending half of a transport
#[async_trait]
pub trait MessageWriter: Send {
    /// Send one raw frame
    async fn write_message(&mut self, message: &str) -> Result<()>;
}

/// A bidirectional message channel
pub trait Transport: Send {
    type Reader: MessageReader + 'static;
    type Writer: MessageWriter + 'static;

    /// Separate into independently owned halves
    fn split(self) -> (Self::Reader, Self::Writer);
}

/// Newline-delimited JSON over any async byte stream
pub struct LineTransport<R, W> {
    reader: R,
    writer: W,
}

/// Stdio transport (used by desktop MCP clients)
pub type StdioTransport = LineTransport<Stdin, Stdout>;

impl<R, W> LineTransport<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }
}

impl LineTransport<Stdin, Stdout> {
    /// Frames on stdin, responses on stdout
    pub fn stdio() -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout())
    }
}

impl<R, W> Transport for LineTransport<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    type Reader = LineReader<R>;
    type Writer = LineWriter<W>;

    fn split(self) -> (Self::Reader, Self::Writer) {
        (
            LineReader {
                reader: BufReader::new(self.reader),
                line: Vec::new(),
            },
            LineWriter { writer: self.writer },
        )
    }
}

/// Reading half of a [`LineTransport`]
pub struct LineReader<R> {
    reader: BufReader<R>,
    line: Vec<u8>,
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> MessageReader for LineReader<R> {
    async fn read_message(&mut self) -> Result<Option<String>> {
        loop {
            self.line.clear();
            let read = self
                .reader
                .read_until(b'\n', &mut self.line)
                .await
                .map_err(|e| ToolwireError::Transport(format!("Failed to read frame: {}", e)))?;
            if read == 0 {
                return Ok(None);
            }

            // The whole line has been consumed, so a bad frame only costs itself
            let line = std::str::from_utf8(&self.line)
                .map_err(|e| ToolwireError::MalformedFrame(format!("frame is not valid UTF-8: {}", e)))?;
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                return Ok(Some(trimmed.to_string()));
            }
        }
    }
}

/// Writing half of a [`LineTransport`]
pub struct LineWriter<W> {
    writer: W,
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> MessageWriter for LineWriter<W> {
    async fn write_message(&mut self, message: &str) -> Result<()> {
        let write = async {
            self.writer.write_all(message.as_bytes()).await?;
            self.writer.write_all(b"\n").await?;
            self.writer.flush().await
        };
        write
            .await
            .map_err(|e| ToolwireError::Transport(format!("Failed to write frame: {}", e)))
    }
}

/// In-memory transport for testing
#[derive(Default)]
pub struct MemoryTransport {
    incoming: VecDeque<String>,
    outgoing: Arc<Mutex<Vec<String>>>,
}

impl MemoryTransport {
    /// Create a new memory transport
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a raw frame to be received
    pub fn push_message(&mut self, message: impl Into<String>) {
        self.incoming.push_back(message.into());
    }

    /// Queue a request to be received
    pub fn push_request(&mut self, request: &JsonRpcRequest) -> Result<()> {
        self.incoming.push_back(serde_json::to_string(request)?);
        Ok(())
    }

    /// Handle for inspecting what the server sent
    pub fn handle(&self) -> MemoryTransportHandle {
        MemoryTransportHandle {
            outgoing: Arc::clone(&self.outgoing),
        }
    }
}

/// View of the frames written to a [`MemoryTransport`]
#[derive(Clone)]
pub struct MemoryTransportHandle {
    outgoing: Arc<Mutex<Vec<String>>>,
}

impl MemoryTransportHandle {
    /// Raw frames, in the order they were written
    pub fn messages(&self) -> Vec<String> {
        self.outgoing.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Written frames parsed as responses. Unparseable frames are skipped.
    pub fn responses(&self) -> Vec<JsonRpcResponse> {
        self.messages()
            .iter()
            .filter_map(|m| serde_json::from_str(m).ok())
            .collect()
    }
}

impl Transport for MemoryTransport {
    type Reader = MemoryReader;
    type Writer = MemoryWriter;

    fn split(self) -> (Self::Reader, Self::Writer) {
        (
            MemoryReader {
                incoming: self.incoming,
            },
            MemoryWriter {
                outgoing: self.outgoing,
            },
        )
    }
}

/// Reading half of a [`MemoryTransport`]
pub struct MemoryReader {
    incoming: VecDeque<String>,
}

#[async_trait]
impl MessageReader for MemoryReader {
    async fn read_message(&mut self) -> Result<Option<String>> {
        Ok(self.incoming.pop_front())
    }
}

/// Writing half of a [`MemoryTransport`]
pub struct MemoryWriter {
    outgoing: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl MessageWriter for MemoryWriter {
    async fn write_message(&mut self, message: &str) -> Result<()> {
        self.outgoing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_string());
        Ok(())
    }
}
