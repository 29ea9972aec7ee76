use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

use crate::error::SinkError;
use crate::output::{LineSink, SinkResult};

/// A line delivered to a memory sink and when it arrived
#[derive(Debug, Clone)]
pub struct SentLine {
    pub line: String,
    pub at: Instant,
}

/// Recording sink for testing without a network.
///
/// Clones share the same buffer, so a test can keep one handle while the
/// engine owns another.
#[derive(Clone, Default)]
pub struct MemorySink {
    sent: Arc<Mutex<Vec<SentLine>>>,
    fail: Arc<AtomicBool>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following send fail (or succeed again)
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// All delivered lines with arrival times
    pub fn sent(&self) -> Vec<SentLine> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Delivered lines without their terminators
    pub fn lines(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .map(|s| s.line.trim_end().to_string())
            .collect()
    }

    /// Number of delivered lines
    pub fn len(&self) -> usize {
        self.sent.lock().map(|s| s.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl LineSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    async fn send(&mut self, line: &str) -> SinkResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SinkError::Closed("memory".to_string()));
        }
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| SinkError::Closed("memory".to_string()))?;
        sent.push(SentLine {
            line: line.to_string(),
            at: Instant::now(),
        });
        Ok(())
    }
}
