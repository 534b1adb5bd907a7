use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use calmkit_schema::{Classification, Emotion, MoodEntry};
use chrono::Utc;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub const NO_MEMORY_SENTINEL: &str = "No memory yet.";
pub const NO_HISTORY_SENTINEL: &str = "No previous mood logs.";

/// Append-only mood log persisted as a single JSON array.
///
/// The whole file is read on every call and rewritten on every append.
/// Appends from one process are serialized; separate processes writing the
/// same file are not coordinated and the last writer wins.
pub struct MoodLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl MoodLog {
    /// Open the log at `path`, creating parent directories and an empty array if needed.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create mood log dir: {}", parent.display()))?;
        }
        if tokio::fs::metadata(&path).await.is_err() {
            write_records(&path, &[]).await?;
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist a new entry and return it once the write has completed.
    pub async fn append(
        &self,
        user_id: &str,
        text: &str,
        classification: &Classification,
        intervention: Option<String>,
        notes: Option<String>,
    ) -> Result<MoodEntry> {
        let _guard = self.write_lock.lock().await;
        let Snapshot {
            mut records,
            entries,
        } = self.load().await?;

        let now = Utc::now();
        let id = match entries.iter().map(|e| e.id).max() {
            Some(last) => now.timestamp_micros().max(last + 1),
            None => now.timestamp_micros(),
        };
        let entry = MoodEntry {
            id,
            user_id: user_id.to_owned(),
            timestamp: now,
            text: text.to_owned(),
            emotion: classification.emotion,
            intensity: classification.intensity,
            trigger_tags: classification.trigger_tags.clone(),
            intervention,
            notes,
        };
        records.push(serde_json::to_value(&entry)?);
        write_records(&self.path, &records).await?;

        debug!(
            id = entry.id,
            emotion = %entry.emotion,
            intensity = entry.intensity,
            total = records.len(),
            "mood entry saved"
        );
        Ok(entry)
    }

    /// The last `n` entries in insertion order.
    pub async fn recent(&self, n: usize) -> Result<Vec<MoodEntry>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let mut entries = self.load().await?.entries;
        if entries.len() > n {
            let start = entries.len() - n;
            entries = entries.split_off(start);
        }
        Ok(entries)
    }

    /// One-line rolling summary over the last `window` entries.
    pub async fn summary(&self, window: usize) -> Result<String> {
        let entries = self.recent(window).await?;
        Ok(MoodSummary::from_entries(&entries).to_string())
    }

    /// Recent entries plus the rolling summary, formatted for display.
    pub async fn history_report(&self, last_n: usize) -> Result<String> {
        let entries = self.recent(last_n).await?;
        if entries.is_empty() {
            return Ok(NO_HISTORY_SENTINEL.to_string());
        }

        let mut report = String::from("Recent mood logs:\n");
        let start = entries.len().saturating_sub(3);
        for entry in &entries[start..] {
            report.push_str(&format!(
                "- {}: {} (intensity {})\n",
                entry.timestamp.format("%Y-%m-%d"),
                entry.emotion,
                entry.intensity
            ));
        }
        report.push('\n');
        report.push_str(&MoodSummary::from_entries(&entries).to_string());
        Ok(report)
    }

    /// Read every stored record. Records that do not decode as entries are
    /// skipped for reads but kept so the next append writes them back.
    async fn load(&self) -> Result<Snapshot> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Snapshot::default()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to read mood log: {}", self.path.display()))
            }
        };

        let records = match serde_json::from_slice::<serde_json::Value>(&raw) {
            Ok(serde_json::Value::Array(records)) => records,
            Ok(_) => {
                warn!(path = %self.path.display(), "mood log is not a JSON array, treating as empty");
                Vec::new()
            }
            Err(error) => {
                warn!(path = %self.path.display(), %error, "mood log is not valid JSON, treating as empty");
                Vec::new()
            }
        };

        let mut entries = Vec::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            match MoodEntry::deserialize(record) {
                Ok(entry) => entries.push(entry),
                Err(error) => {
                    warn!(path = %self.path.display(), index, %error, "skipping unreadable mood entry");
                }
            }
        }
        Ok(Snapshot { records, entries })
    }
}

#[derive(Default)]
struct Snapshot {
    records: Vec<serde_json::Value>,
    entries: Vec<MoodEntry>,
}

async fn write_records(path: &Path, records: &[serde_json::Value]) -> Result<()> {
    let json = serde_json::to_vec_pretty(records)?;

    let mut tmp_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "mood_log.json".into());
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    let mut file = tokio::fs::File::create(&tmp_path)
        .await
        .with_context(|| format!("failed to create {}", tmp_path.display()))?;
    file.write_all(&json)
        .await
        .with_context(|| format!("failed to write {}", tmp_path.display()))?;
    file.sync_all().await?;
    drop(file);

    tokio::fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("failed to replace mood log: {}", path.display()))?;
    Ok(())
}

/// Aggregate over a window of mood entries.
#[derive(Debug, Clone, PartialEq)]
pub struct MoodSummary {
    pub count: usize,
    pub mean_intensity: f64,
    /// Emotions by descending count; ties keep first-seen order.
    pub counts: Vec<(Emotion, usize)>,
}

impl MoodSummary {
    pub fn from_entries(entries: &[MoodEntry]) -> Self {
        let mut counts: Vec<(Emotion, usize)> = Vec::new();
        let mut total: u64 = 0;
        for entry in entries {
            total += u64::from(entry.intensity);
            match counts.iter_mut().find(|(e, _)| *e == entry.emotion) {
                Some((_, c)) => *c += 1,
                None => counts.push((entry.emotion, 1)),
            }
        }
        counts.sort_by(|a, b| b.1.cmp(&a.1));

        let mean_intensity = if entries.is_empty() {
            0.0
        } else {
            total as f64 / entries.len() as f64
        };

        Self {
            count: entries.len(),
            mean_intensity,
            counts,
        }
    }

    pub fn top(&self, k: usize) -> &[(Emotion, usize)] {
        &self.counts[..self.counts.len().min(k)]
    }
}

impl fmt::Display for MoodSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.count == 0 {
            return f.write_str(NO_MEMORY_SENTINEL);
        }
        let common = self
            .top(3)
            .iter()
            .map(|(emotion, count)| format!("{emotion}({count})"))
            .collect::<Vec<_>>()
            .join(", ");
        write!(
            f,
            "Last {} entries avg intensity {:.2}. Common: {}.",
            self.count, self.mean_intensity, common
        )
    }
}
