//! Append-only per-project error log.

use std::fmt::Display;
use std::path::PathBuf;

use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Line-oriented error log at `<project>/log.error`.
///
/// One UTF-8 record per line. Appends are serialized through an internal
/// mutex so concurrent workers never interleave partial lines.
pub struct ErrorLog {
    path: PathBuf,
    writer: Mutex<()>,
}

impl ErrorLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: Mutex::new(()),
        }
    }

    /// Append one record: `[<utc timestamp>] <message>: <err>`.
    ///
    /// Error text often carries multi-line tool output (captured ffmpeg
    /// stderr in particular); newlines are flattened to spaces so one append
    /// is always exactly one line.
    pub async fn append(&self, err: impl Display, message: &str) -> std::io::Result<()> {
        let line = format!(
            "[{}] {}: {}\n",
            chrono::Utc::now().to_rfc3339(),
            flatten(message),
            flatten(&err.to_string())
        );

        let _guard = self.writer.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

fn flatten(text: &str) -> String {
    text.replace("\r\n", " ").replace(['\n', '\r'], " ")
}
