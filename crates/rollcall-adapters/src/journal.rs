//! Daily CSV event journal
//!
//! Appends one row per attendance event to `{YYMMDD}/{YYMMDD}_log.csv`
//! under the storage root, next to that day's artifacts. A fresh file
//! starts with a UTF-8 BOM so spreadsheet tools pick the encoding up,
//! followed by the column header. The day is taken from each record's
//! own timestamp, never from the wall clock, so a row always lands in
//! the file of the day it describes.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::NaiveDate;
use rollcall_core::ports::{JournalError, JournalPort, JournalRecord};
use tokio::io::AsyncWriteExt;
use tracing::debug;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

const COLUMNS: [&str; 8] = [
    "date",
    "time",
    "period",
    "status",
    "detected",
    "threshold",
    "artifact",
    "note",
];

/// CSV adapter implementing JournalPort.
pub struct CsvJournal {
    root: PathBuf,
}

impl CsvJournal {
    /// Creates a journal rooted at `root`, normally the same directory
    /// the artifact store writes into.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Journal file for `date`, `{root}/{YYMMDD}/{YYMMDD}_log.csv`.
    pub fn day_file(&self, date: NaiveDate) -> PathBuf {
        let stamp = date.format("%y%m%d").to_string();
        self.root.join(&stamp).join(format!("{}_log.csv", stamp))
    }

    /// Encodes the record (and, for a fresh file, the BOM and header)
    /// into the byte run a single append call will write.
    fn encode(record: &JournalRecord, fresh: bool) -> Result<Vec<u8>, JournalError> {
        let mut payload = Vec::new();
        if fresh {
            payload.extend_from_slice(UTF8_BOM);
        }

        let mut writer = csv::Writer::from_writer(payload);
        if fresh {
            writer
                .write_record(COLUMNS)
                .map_err(|e| JournalError::Encoding(e.to_string()))?;
        }
        writer
            .write_record(&[
                record.at.format("%Y-%m-%d").to_string(),
                record.at.format("%H:%M:%S").to_string(),
                record.period.label(),
                record.status.as_str().to_string(),
                record.detected.map(|n| n.to_string()).unwrap_or_default(),
                record.threshold.to_string(),
                record.artifact.clone().unwrap_or_default(),
                record.note.clone(),
            ])
            .map_err(|e| JournalError::Encoding(e.to_string()))?;

        writer
            .into_inner()
            .map_err(|e| JournalError::Encoding(e.to_string()))
    }
}

#[async_trait]
impl JournalPort for CsvJournal {
    async fn append(&self, record: &JournalRecord) -> Result<(), JournalError> {
        let path = self.day_file(record.at.date());
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }

        // Appends are serialized by the engine; header goes out in the
        // same write as the first row.
        let fresh = !tokio::fs::try_exists(&path).await?;
        let payload = Self::encode(record, fresh)?;

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(&payload).await?;
        file.flush().await?;

        debug!(
            "Journal row appended: {} {} ({})",
            record.period.label(),
            record.status,
            path.display()
        );
        Ok(())
    }
}
