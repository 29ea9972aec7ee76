pub mod file;
pub mod memory;
pub mod scan;

pub use file::FileLineSource;
pub use memory::MemoryLineSource;
pub use scan::{scan_range, ScanReport};

use async_trait::async_trait;
use crate::error::SourceError;

/// Result type for line source operations
pub type SourceResult<T> = Result<T, SourceError>;

/// A finite, restartable sequence of log lines.
///
/// Implementations:
/// - Log files on disk
/// - In-memory logs for testing
#[async_trait]
pub trait LineSource: Send {
    /// Name used in log output and error messages
    fn name(&self) -> &str;

    /// Rewind to the first line
    async fn restart(&mut self) -> SourceResult<()>;

    /// Next line without its terminator, or `None` at end of log
    async fn next_line(&mut self) -> SourceResult<Option<String>>;
}
