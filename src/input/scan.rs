use tracing::info;

use crate::core::{is_valid_sentence, LogBounds};
use crate::decode::extract_timestamp;
use crate::error::ReplayError;
use crate::input::LineSource;

/// Outcome of a full pre-scan of a log
#[derive(Debug, Clone, PartialEq)]
pub struct ScanReport {
    pub bounds: LogBounds,
    /// Lines read, valid or not
    pub lines: usize,
    /// Lines passing checksum validation
    pub valid_sentences: usize,
    /// Valid sentences carrying a timestamp
    pub timestamped: usize,
}

/// Read a source once from its current position to the end and find the
/// first and last timestamps. The caller restarts the source for playback.
pub async fn scan_range(source: &mut dyn LineSource) -> Result<ScanReport, ReplayError> {
    let mut start = None;
    let mut end = None;
    let mut lines = 0usize;
    let mut valid_sentences = 0usize;
    let mut timestamped = 0usize;

    while let Some(line) = source.next_line().await? {
        lines += 1;
        if !is_valid_sentence(&line) {
            continue;
        }
        valid_sentences += 1;

        if let Some(ts) = extract_timestamp(&line) {
            timestamped += 1;
            start.get_or_insert(ts);
            end = Some(ts);
        }
    }

    let (start, end) = match (start, end) {
        (Some(start), Some(end)) => (start, end),
        _ => return Err(ReplayError::NoTimestamps(source.name().to_string())),
    };

    let report = ScanReport {
        bounds: LogBounds::new(start, end),
        lines,
        valid_sentences,
        timestamped,
    };
    info!(
        "Scanned {}: {} lines, {} valid sentences, {} timestamped, {} .. {}",
        source.name(),
        report.lines,
        report.valid_sentences,
        report.timestamped,
        report.bounds.start.format("%Y-%m-%d %H:%M:%S%.3f"),
        report.bounds.end.format("%Y-%m-%d %H:%M:%S%.3f"),
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::MemoryLineSource;
    use crate::test_support::{at, rmc, sentence};

    #[tokio::test]
    async fn test_scan_bounds() {
        let mut source = MemoryLineSource::new(
            "test",
            vec![
                sentence("GPGGA,100000,,,,,1,08,0.9,,M,,M,,"),
                rmc(10, 0, 0),
                "garbage".to_string(),
                rmc(10, 0, 5),
                sentence("GPGGA,100005,,,,,1,08,0.9,,M,,M,,"),
                rmc(10, 0, 10),
                sentence("GPGGA,100010,,,,,1,08,0.9,,M,,M,,"),
            ],
        );

        let report = scan_range(&mut source).await.unwrap();
        assert_eq!(report.bounds.start, at(10, 0, 0));
        assert_eq!(report.bounds.end, at(10, 0, 10));
        assert_eq!(report.lines, 7);
        assert_eq!(report.valid_sentences, 6);
        assert_eq!(report.timestamped, 3);
    }

    #[tokio::test]
    async fn test_scan_ignores_bad_checksums() {
        let mut bad = rmc(11, 0, 0);
        bad.replace_range(bad.len() - 2.., "ZZ");
        let mut source = MemoryLineSource::new("test", vec![rmc(10, 0, 0), bad]);

        let report = scan_range(&mut source).await.unwrap();
        assert_eq!(report.bounds.end, at(10, 0, 0));
    }

    #[tokio::test]
    async fn test_scan_without_timestamps() {
        let mut source = MemoryLineSource::new("empty", vec![sentence("GPGGA,100000,,,,,1,08,0.9,,M,,M,,")]);
        let result = scan_range(&mut source).await;
        assert!(matches!(result, Err(ReplayError::NoTimestamps(name)) if name == "empty"));
    }
}
