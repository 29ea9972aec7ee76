use async_trait::async_trait;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::SinkError;
use crate::output::{LineSink, SinkResult};

/// How long a single connection attempt may take
const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Minimum time between reconnection attempts
const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// TCP client sink that writes every line to a remote listener.
///
/// The connection is opened on first use. After a failure the stream is
/// dropped and a new connection is attempted on a later send, at most once
/// per retry interval, so a dead peer costs the pacer nothing in between.
pub struct TcpLineSink {
    addr: String,
    stream: Option<TcpStream>,
    retry_interval: Duration,
    last_attempt: Option<Instant>,
}

impl TcpLineSink {
    /// Create a sink for `host:port`
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            stream: None,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            last_attempt: None,
        }
    }

    /// Set the minimum delay between reconnection attempts
    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }

    /// Check if a connection is currently open
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Open the connection now instead of on the first send
    pub async fn connect(&mut self) -> SinkResult<()> {
        self.last_attempt = Some(Instant::now());

        let stream = match tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&self.addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(SinkError::Io {
                    addr: self.addr.clone(),
                    source: e,
                })
            }
            Err(_) => {
                debug!("Connection attempt to {} timed out", self.addr);
                return Err(SinkError::NotConnected(self.addr.clone()));
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not disable Nagle on {}: {}", self.addr, e);
        }
        info!("Connected to {}", self.addr);
        self.stream = Some(stream);
        Ok(())
    }

    fn retry_due(&self) -> bool {
        self.last_attempt
            .map_or(true, |last| last.elapsed() >= self.retry_interval)
    }
}

#[async_trait]
impl LineSink for TcpLineSink {
    fn name(&self) -> &str {
        &self.addr
    }

    async fn send(&mut self, line: &str) -> SinkResult<()> {
        if self.stream.is_none() {
            if !self.retry_due() {
                return Err(SinkError::NotConnected(self.addr.clone()));
            }
            self.connect().await?;
        }

        let Some(stream) = self.stream.as_mut() else {
            return Err(SinkError::NotConnected(self.addr.clone()));
        };

        if let Err(e) = stream.write_all(line.as_bytes()).await {
            warn!("Connection to {} lost: {}", self.addr, e);
            self.stream = None;
            return Err(SinkError::Io {
                addr: self.addr.clone(),
                source: e,
            });
        }
        Ok(())
    }
}
