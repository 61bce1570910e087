//! Append-only per-thread viewer log
//!
//! One file per thread, named `<thread_id>.<extension>`, laid out as two
//! comma-separated columns. The header row is written exactly once, when
//! the file is created.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::config::StorageConfig;
use crate::errors::{StorageError, StorageResult};
use crate::models::Sample;
use crate::utils::time::format_record_timestamp;

/// Header row of every thread log
pub const LOG_HEADER: [&str; 2] = ["Date", "Series1"];

#[derive(Debug, Clone)]
pub struct RecordStore {
    dir: PathBuf,
    extension: String,
}

impl RecordStore {
    pub fn new(config: &StorageConfig) -> Self {
        Self::with_dir(config.log_dir.clone(), config.extension.clone())
    }

    pub fn with_dir<P: Into<PathBuf>, E: Into<String>>(dir: P, extension: E) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the log for `thread_id`
    pub fn log_path(&self, thread_id: &str) -> PathBuf {
        let file_stem: String = thread_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.{}", file_stem, self.extension))
    }

    /// Create the log with its header row unless it already exists.
    ///
    /// Returns `true` when the file was created by this call.
    pub async fn ensure_log(&self, thread_id: &str) -> StorageResult<bool> {
        let path = self.log_path(thread_id);

        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StorageError::io(&self.dir, e))?;

        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(StorageError::io(&path, e)),
        };

        let header = format!("{}\n", LOG_HEADER.join(","));
        file.write_all(header.as_bytes())
            .await
            .map_err(|e| StorageError::io(&path, e))?;
        file.flush().await.map_err(|e| StorageError::io(&path, e))?;

        info!("Created record log {}", path.display());
        Ok(true)
    }

    /// Append one `(timestamp, viewer_count)` row for the sample's thread.
    ///
    /// The file is opened in append mode, written and flushed before
    /// returning; any failure is returned to the caller.
    pub async fn append(&self, sample: &Sample) -> StorageResult<()> {
        self.ensure_log(&sample.thread_id).await?;

        let path = self.log_path(&sample.thread_id);
        let row = format!(
            "{},{}\n",
            format_record_timestamp(sample.observed_at),
            sample.viewer_count
        );

        let mut file = OpenOptions::new()
            .append(true)
            .open(&path)
            .await
            .map_err(|e| StorageError::io(&path, e))?;
        file.write_all(row.as_bytes())
            .await
            .map_err(|e| StorageError::io(&path, e))?;
        file.flush().await.map_err(|e| StorageError::io(&path, e))?;

        debug!("Recorded {} viewers to {}", sample.viewer_count, path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sample(thread_id: &str, viewer_count: i64) -> Sample {
        Sample {
            thread_id: thread_id.to_string(),
            title: "Event X".to_string(),
            viewer_count,
            observed_at: Utc.with_ymd_and_hms(2016, 5, 1, 14, 3, 22).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_ensure_log_writes_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::with_dir(dir.path(), "csv");

        assert!(store.ensure_log("abc").await.unwrap());
        assert!(!store.ensure_log("abc").await.unwrap());

        let contents = std::fs::read_to_string(store.log_path("abc")).unwrap();
        assert_eq!(contents, "Date,Series1\n");
    }

    #[tokio::test]
    async fn test_append_n_rows_gives_n_plus_one_lines() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::with_dir(dir.path(), "csv");
        store.ensure_log("abc").await.unwrap();

        for count in 0..5 {
            store.append(&sample("abc", count)).await.unwrap();
        }

        let contents = std::fs::read_to_string(store.log_path("abc")).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "Date,Series1");
        assert_eq!(lines[1], "2016/05/01 14:03:22,0");
        assert_eq!(lines[5], "2016/05/01 14:03:22,4");
    }

    #[tokio::test]
    async fn test_append_without_existing_log_still_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::with_dir(dir.path().join("nested"), "csv");

        store.append(&sample("late", 7)).await.unwrap();

        let contents = std::fs::read_to_string(store.log_path("late")).unwrap();
        assert_eq!(contents, "Date,Series1\n2016/05/01 14:03:22,7\n");
    }

    #[tokio::test]
    async fn test_append_failure_is_surfaced() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();
        let store = RecordStore::with_dir(&blocker, "csv");

        let err = store.append(&sample("abc", 1)).await.unwrap_err();
        assert!(matches!(err, StorageError::Io { .. }));
    }

    #[test]
    fn test_log_path_sanitizes_thread_id() {
        let store = RecordStore::with_dir("/data", "csv");
        assert_eq!(store.log_path("ab/../c"), PathBuf::from("/data/ab____c.csv"));
    }
}
