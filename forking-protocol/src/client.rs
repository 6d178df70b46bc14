use crate::messages::{ControlCommand, ControlResponse};
use anyhow::{Context, Result};
use log::debug;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

pub const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Talks to a running service, one connection per request.
#[derive(Debug, Clone)]
pub struct ControlClient {
    address: String,
    timeout: Duration,
}

impl ControlClient {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            timeout: DEFAULT_CLIENT_TIMEOUT,
        }
    }

    /// Bounds connect, write and read together.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Sends a typed command and parses the answer.
    pub async fn send_command(&self, command: ControlCommand) -> Result<ControlResponse> {
        let line = self.send_line(&command.to_line()).await?;
        Ok(ControlResponse::parse(&line))
    }

    /// Sends a raw line (a newline is appended if missing) and returns the raw answer.
    pub async fn send_line(&self, line: &str) -> Result<String> {
        timeout(self.timeout, self.exchange(line))
            .await
            .with_context(|| format!("No answer from {} within {:?}", self.address, self.timeout))?
    }

    async fn exchange(&self, line: &str) -> Result<String> {
        let mut stream = TcpStream::connect(&self.address)
            .await
            .with_context(|| format!("Failed to connect to {}", self.address))?;

        let mut request = line.to_string();
        if !request.ends_with('\n') {
            request.push('\n');
        }
        stream
            .write_all(request.as_bytes())
            .await
            .context("Failed to send request")?;

        let mut reader = BufReader::new(stream);
        let mut answer = String::new();
        reader
            .read_line(&mut answer)
            .await
            .context("Failed to read response")?;
        if answer.is_empty() {
            anyhow::bail!("Connection closed by {} without a response", self.address);
        }
        debug!("Client: {} answered {:?}", self.address, answer.trim_end());
        Ok(answer)
    }
}
