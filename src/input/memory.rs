use async_trait::async_trait;

use crate::input::{LineSource, SourceResult};

/// In-memory line source for testing without files
pub struct MemoryLineSource {
    name: String,
    lines: Vec<String>,
    position: usize,
}

impl MemoryLineSource {
    /// Create a new source over the given lines
    pub fn new<I, S>(name: &str, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.to_string(),
            lines: lines.into_iter().map(Into::into).collect(),
            position: 0,
        }
    }

    /// Number of lines in the source
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[async_trait]
impl LineSource for MemoryLineSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn restart(&mut self) -> SourceResult<()> {
        self.position = 0;
        Ok(())
    }

    async fn next_line(&mut self) -> SourceResult<Option<String>> {
        let line = self.lines.get(self.position).cloned();
        if line.is_some() {
            self.position += 1;
        }
        Ok(line)
    }
}
