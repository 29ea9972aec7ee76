pub mod memory;
pub mod tcp;

pub use memory::MemorySink;
pub use tcp::TcpLineSink;

use async_trait::async_trait;
use crate::error::SinkError;

/// Result type for transport sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// Default NMEA0183 TCP port
pub const DEFAULT_NMEA_PORT: u16 = 10110;

/// Destination for replayed lines.
///
/// Delivery is best effort: the engine reports failures and carries on,
/// reconnecting is up to the sink.
///
/// Implementations:
/// - TCP client connections
/// - Recording sinks for testing
#[async_trait]
pub trait LineSink: Send {
    /// Name used in log output and status snapshots
    fn name(&self) -> &str;

    /// Deliver one line. The line already carries its terminator.
    async fn send(&mut self, line: &str) -> SinkResult<()>;
}
