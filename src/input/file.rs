use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tracing::debug;

use crate::error::SourceError;
use crate::input::{LineSource, SourceResult};

/// Line source reading a log file from disk
pub struct FileLineSource {
    path: PathBuf,
    name: String,
    lines: Lines<BufReader<File>>,
}

impl FileLineSource {
    /// Open a log file, failing with `NotFound` or `NotReadable`
    pub async fn open(path: impl AsRef<Path>) -> SourceResult<Self> {
        let path = path.as_ref().to_path_buf();
        let lines = Self::open_lines(&path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        debug!("Opened log file {}", path.display());
        Ok(Self { path, name, lines })
    }

    /// Full path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn open_lines(path: &Path) -> SourceResult<Lines<BufReader<File>>> {
        let file = File::open(path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => SourceError::NotFound(path.to_path_buf()),
            _ => SourceError::NotReadable {
                path: path.to_path_buf(),
                source: e,
            },
        })?;
        Ok(BufReader::new(file).lines())
    }
}

#[async_trait]
impl LineSource for FileLineSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn restart(&mut self) -> SourceResult<()> {
        self.lines = Self::open_lines(&self.path).await?;
        Ok(())
    }

    async fn next_line(&mut self) -> SourceResult<Option<String>> {
        self.lines.next_line().await.map_err(|e| SourceError::Read {
            name: self.name.clone(),
            source: e,
        })
    }
}
