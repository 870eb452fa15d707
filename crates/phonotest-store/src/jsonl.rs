//! Append-only JSON Lines response store.
//!
//! Each record is one line of JSON. Appends never rewrite earlier lines,
//! though a torn last line gets its missing newline first. An upsert
//! rewrites the whole file through a temporary file in the same directory
//! that is then renamed over the original.

use std::collections::HashSet;
use std::io::{SeekFrom, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;

use phonotest_core::error::StoreError;
use phonotest_core::model::{Category, TrialResponse, TrialSetKey};
use phonotest_core::traits::ResponseStore;

/// A response store backed by a single `.jsonl` file.
pub struct JsonlStore {
    path: PathBuf,
    /// Serializes writers within this process.
    write_lock: Mutex<()>,
}

impl JsonlStore {
    /// Use `path` as the backing file. Nothing is created until the first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn ensure_parent(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Read every record. A missing file is an empty store.
    ///
    /// A line that does not decode is skipped with a warning; this only
    /// happens when a previous append was cut off mid-line.
    async fn read_all(&self) -> Result<Vec<TrialResponse>, StoreError> {
        Ok(self.read_records().await?.0)
    }

    /// Like [`read_all`](Self::read_all), also returning how many lines
    /// were skipped.
    async fn read_records(&self) -> Result<(Vec<TrialResponse>, usize), StoreError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok((Vec::new(), 0)),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        let mut skipped = 0;
        for (lineno, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<TrialResponse>(line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    skipped += 1;
                    tracing::warn!(
                        path = %self.path.display(),
                        line = lineno + 1,
                        "skipping unreadable record: {e}"
                    );
                }
            }
        }
        Ok((records, skipped))
    }

    /// Whether the file is non-empty and its last byte is not a newline.
    async fn has_torn_tail(&self) -> Result<bool, StoreError> {
        let mut file = match tokio::fs::File::open(&self.path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        if file.metadata().await?.len() == 0 {
            return Ok(false);
        }
        file.seek(SeekFrom::End(-1)).await?;
        Ok(file.read_u8().await? != b'\n')
    }

    /// Append encoded `lines`. The caller holds `write_lock`.
    async fn append_lines(&self, lines: &[String]) -> Result<usize, StoreError> {
        self.ensure_parent().await?;
        let torn = self.has_torn_tail().await?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        // Terminate a cut-off last line so the first new record starts on
        // its own line.
        if torn {
            tracing::warn!(path = %self.path.display(), "terminating torn trailing line");
            file.write_all(b"\n").await?;
        }

        for (committed, line) in lines.iter().enumerate() {
            if let Err(e) = file.write_all(line.as_bytes()).await {
                return Err(if committed == 0 {
                    StoreError::Io(e)
                } else {
                    StoreError::Partial {
                        committed,
                        total: lines.len(),
                        message: e.to_string(),
                    }
                });
            }
        }
        file.sync_data()
            .await
            .map_err(|e| unconfirmed_write(lines.len(), e))?;

        tracing::debug!(path = %self.path.display(), records = lines.len(), "appended records");
        Ok(lines.len())
    }
}

/// Every line was handed to the OS but `sync_data` failed, so none of them
/// is known to be on disk.
fn unconfirmed_write(written: usize, e: std::io::Error) -> StoreError {
    StoreError::Backend(format!(
        "{written} record(s) written but not confirmed durable: {e}"
    ))
}

fn encode_line(record: &TrialResponse) -> Result<String, StoreError> {
    let mut line = serde_json::to_string(record)?;
    line.push('\n');
    Ok(line)
}

/// Write `lines` to a temp file next to `path` and rename it into place.
fn replace_file(path: &Path, lines: &[String]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    for line in lines {
        tmp.write_all(line.as_bytes())?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl ResponseStore for JsonlStore {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn put_multi(&self, records: &[TrialResponse]) -> Result<usize, StoreError> {
        // Encode everything first so a bad record fails before any write.
        let lines = records
            .iter()
            .map(encode_line)
            .collect::<Result<Vec<_>, _>>()?;

        let _guard = self.write_lock.lock().await;
        self.append_lines(&lines).await
    }

    async fn put_multi_if_absent(
        &self,
        subject_id: &str,
        key: TrialSetKey,
        records: &[TrialResponse],
    ) -> Result<Option<usize>, StoreError> {
        let lines = records
            .iter()
            .map(encode_line)
            .collect::<Result<Vec<_>, _>>()?;

        let _guard = self.write_lock.lock().await;
        let exists = self
            .read_all()
            .await?
            .iter()
            .any(|r| r.subject_id == subject_id && r.trial_set_key() == key);
        if exists {
            return Ok(None);
        }
        self.append_lines(&lines).await.map(Some)
    }

    async fn upsert_multi(&self, records: &[TrialResponse]) -> Result<usize, StoreError> {
        let _guard = self.write_lock.lock().await;
        self.ensure_parent().await?;

        let (existing, skipped) = self.read_records().await?;
        if skipped > 0 {
            return Err(StoreError::Backend(format!(
                "{} has {skipped} unreadable line(s); refusing to rewrite it",
                self.path.display()
            )));
        }

        let incoming: HashSet<_> = records.iter().map(TrialResponse::key).collect();
        let mut lines = Vec::new();
        for existing in existing {
            if !incoming.contains(&existing.key()) {
                lines.push(encode_line(&existing)?);
            }
        }
        let replaced_from = lines.len();
        for record in records {
            lines.push(encode_line(record)?);
        }

        let path = self.path.clone();
        tokio::task::spawn_blocking(move || replace_file(&path, &lines))
            .await
            .map_err(|e| StoreError::Backend(format!("rewrite task failed: {e}")))??;

        tracing::debug!(
            path = %self.path.display(),
            kept = replaced_from,
            written = records.len(),
            "rewrote store"
        );
        Ok(records.len())
    }

    async fn has_submission(
        &self,
        subject_id: &str,
        key: TrialSetKey,
    ) -> Result<bool, StoreError> {
        Ok(self
            .read_all()
            .await?
            .iter()
            .any(|r| r.subject_id == subject_id && r.trial_set_key() == key))
    }

    async fn load_category(&self, category: Category) -> Result<Vec<TrialResponse>, StoreError> {
        let mut records = self.read_all().await?;
        records.retain(|r| r.category == category);
        Ok(records)
    }
}
