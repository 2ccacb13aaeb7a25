//! MCP Transport Implementations
//!
//! Transports handle the I/O for MCP communication. `receive` must be
//! cancel-safe: the server polls it alongside finished tool calls and drops
//! the pending receive whenever a response is ready to send.

use super::protocol::{JsonRpcRequest, JsonRpcResponse};
use crate::error::{BurrowError, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin, Stdout};
use tracing::debug;

/// One message read from a transport
#[derive(Debug, Clone)]
pub enum Inbound {
    /// A well-formed request or notification
    Request(JsonRpcRequest),
    /// A line that did not parse as JSON-RPC
    Malformed(String),
}

impl Inbound {
    /// Parse one line of newline-delimited JSON
    pub fn parse(line: &str) -> Self {
        match serde_json::from_str(line) {
            Ok(request) => Inbound::Request(request),
            Err(e) => Inbound::Malformed(e.to_string()),
        }
    }
}

/// Transport trait for MCP communication
#[async_trait]
pub trait Transport: Send + Sync {
    /// Receive the next message, or `None` once the peer has gone away
    async fn receive(&mut self) -> Result<Option<Inbound>>;

    /// Send a response through the transport
    async fn send(&mut self, response: JsonRpcResponse) -> Result<()>;
}

/// Stdio transport for MCP
///
/// Messages are sent as newline-delimited JSON on stdin/stdout.
pub struct StdioTransport {
    stdin: Lines<BufReader<Stdin>>,
    stdout: Stdout,
}

impl StdioTransport {
    /// Create a new stdio transport
    pub fn new() -> Self {
        Self {
            stdin: BufReader::new(tokio::io::stdin()).lines(),
            stdout: tokio::io::stdout(),
        }
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn receive(&mut self) -> Result<Option<Inbound>> {
        loop {
            let line = self.stdin.next_line().await.map_err(|e| {
                BurrowError::Other(format!("Failed to read from stdin: {}", e))
            })?;

            match line {
                None => return Ok(None),
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => {
                    debug!(bytes = line.len(), "Received message");
                    return Ok(Some(Inbound::parse(line.trim())));
                }
            }
        }
    }

    async fn send(&mut self, response: JsonRpcResponse) -> Result<()> {
        let mut json = serde_json::to_string(&response)?;
        json.push('\n');

        self.stdout
            .write_all(json.as_bytes())
            .await
            .map_err(|e| BurrowError::Other(format!("Failed to write to stdout: {}", e)))?;
        self.stdout
            .flush()
            .await
            .map_err(|e| BurrowError::Other(format!("Failed to flush stdout: {}", e)))?;

        Ok(())
    }
}

/// In-memory transport for testing
#[derive(Debug, Default)]
pub struct MemoryTransport {
    requests: VecDeque<Inbound>,
    responses: Vec<JsonRpcResponse>,
}

impl MemoryTransport {
    /// Create a new memory transport
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a request to be received
    pub fn push_request(&mut self, request: JsonRpcRequest) {
        self.requests.push_back(Inbound::Request(request));
    }

    /// Add a raw line to be received, as if read off the wire
    pub fn push_line(&mut self, line: &str) {
        self.requests.push_back(Inbound::parse(line));
    }

    /// Get all sent responses
    pub fn responses(&self) -> &[JsonRpcResponse] {
        &self.responses
    }

    /// Take the last response
    pub fn pop_response(&mut self) -> Option<JsonRpcResponse> {
        self.responses.pop()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn receive(&mut self) -> Result<Option<Inbound>> {
        Ok(self.requests.pop_front())
    }

    async fn send(&mut self, response: JsonRpcResponse) -> Result<()> {
        self.responses.push(response);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::protocol::RequestId;

    #[tokio::test]
    async fn test_memory_transport() {
        let mut transport = MemoryTransport::new();
        transport.push_request(JsonRpcRequest::new(1i64, "tools/list"));

        match transport.receive().await.unwrap() {
            Some(Inbound::Request(request)) => assert_eq!(request.method, "tools/list"),
            other => panic!("unexpected {:?}", other),
        }

        let response = JsonRpcResponse::success(RequestId::Number(1), serde_json::json!({}));
        transport.send(response).await.unwrap();
        assert_eq!(transport.responses().len(), 1);
    }

    #[tokio::test]
    async fn test_memory_transport_empty() {
        let mut transport = MemoryTransport::new();
        assert!(transport.receive().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_garbage_line_is_malformed() {
        let mut transport = MemoryTransport::new();
        transport.push_line("{not json");
        assert!(matches!(
            transport.receive().await.unwrap(),
            Some(Inbound::Malformed(_))
        ));
    }
}
