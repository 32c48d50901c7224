//! Append-only record of every event exchanged during a session.
//!
//! The in-memory sequence is owned by the session; `persist` and `restore`
//! are the only operations that touch durable storage and both are
//! all-or-nothing with respect to the in-memory state.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Sent,
    Received,
}

/// One journaled event. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    #[serde(rename = "type")]
    pub direction: Direction,
    pub timestamp: DateTime<Utc>,
    pub data: Value,
}

#[derive(Debug, Default)]
pub struct HistoryJournal {
    records: Vec<HistoryRecord>,
}

impl HistoryJournal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record stamped with the current time.
    ///
    /// Timestamps are clamped to the previous record's, so the sequence stays
    /// non-decreasing even if the wall clock steps backwards.
    pub fn append(&mut self, direction: Direction, data: Value) -> HistoryRecord {
        let now = Utc::now();
        let timestamp = self.records.last().map_or(now, |last| last.timestamp.max(now));
        let record = HistoryRecord {
            direction,
            timestamp,
            data,
        };
        self.records.push(record.clone());
        record
    }

    /// Snapshot of all records in insertion order. Not a live view.
    #[must_use]
    pub fn all(&self) -> Vec<HistoryRecord> {
        self.records.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Write the full sequence to `path` as a pretty-printed JSON array,
    /// overwriting any existing content.
    ///
    /// # Errors
    /// Returns [`Error::Persistence`] on I/O failure. The in-memory sequence
    /// is never rolled back.
    pub async fn persist(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(&self.records)?;
        tokio::fs::write(path, json)
            .await
            .map_err(|err| Error::Persistence(format!("write {}: {err}", path.display())))?;
        tracing::info!(path = %path.display(), records = self.records.len(), "session history saved");
        Ok(())
    }

    /// Replace the in-memory sequence with the contents of `path`.
    ///
    /// # Errors
    /// Returns [`Error::Persistence`] if the file is missing or malformed;
    /// the current sequence is left untouched on failure.
    pub async fn restore(&mut self, path: &Path) -> Result<()> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|err| Error::Persistence(format!("read {}: {err}", path.display())))?;
        let records: Vec<HistoryRecord> = serde_json::from_str(&raw)
            .map_err(|err| Error::Persistence(format!("parse {}: {err}", path.display())))?;
        self.records = records;
        tracing::info!(path = %path.display(), records = self.records.len(), "session history loaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn append_keeps_insertion_order_and_monotonic_timestamps() {
        let mut journal = HistoryJournal::new();
        for i in 0..10 {
            journal.append(Direction::Sent, json!({ "seq": i }));
        }
        let records = journal.all();
        assert_eq!(records.len(), 10);
        for window in records.windows(2) {
            assert!(window[0].timestamp <= window[1].timestamp);
        }
        assert_eq!(records[3].data, json!({ "seq": 3 }));
    }

    #[test]
    fn snapshot_is_detached_from_later_appends() {
        let mut journal = HistoryJournal::new();
        journal.append(Direction::Received, json!({ "type": "session.created" }));
        let snapshot = journal.all();
        journal.append(Direction::Sent, json!({ "type": "response.create" }));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(journal.len(), 2);
    }

    #[tokio::test]
    async fn empty_journal_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");

        let journal = HistoryJournal::new();
        journal.persist(&path).await.unwrap();

        let mut restored = HistoryJournal::new();
        restored.restore(&path).await.unwrap();
        assert!(restored.is_empty());
    }

    #[tokio::test]
    async fn non_empty_journal_round_trips_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");

        let mut journal = HistoryJournal::new();
        journal.append(Direction::Sent, json!({ "type": "response.create" }));
        journal.append(
            Direction::Received,
            json!({ "type": "error", "error": { "message": "boom" } }),
        );
        journal.append(Direction::Sent, json!({ "type": "conversation.item.create" }));
        journal.persist(&path).await.unwrap();

        let mut restored = HistoryJournal::new();
        restored.restore(&path).await.unwrap();
        assert_eq!(restored.all(), journal.all());
    }

    #[tokio::test]
    async fn persist_overwrites_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");

        let mut journal = HistoryJournal::new();
        for i in 0..5 {
            journal.append(Direction::Sent, json!({ "seq": i }));
        }
        journal.persist(&path).await.unwrap();

        journal.clear();
        journal.append(Direction::Sent, json!({ "seq": "only" }));
        journal.persist(&path).await.unwrap();

        let mut restored = HistoryJournal::new();
        restored.restore(&path).await.unwrap();
        assert_eq!(restored.len(), 1);
    }

    #[tokio::test]
    async fn restore_failure_leaves_memory_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        let garbled = dir.path().join("garbled.json");
        tokio::fs::write(&garbled, b"not json").await.unwrap();

        let mut journal = HistoryJournal::new();
        journal.append(Direction::Sent, json!({ "keep": true }));

        assert!(matches!(
            journal.restore(&missing).await,
            Err(Error::Persistence(_))
        ));
        assert!(matches!(
            journal.restore(&garbled).await,
            Err(Error::Persistence(_))
        ));
        assert_eq!(journal.len(), 1);
    }

    #[tokio::test]
    async fn persisted_format_is_a_pretty_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");

        let mut journal = HistoryJournal::new();
        journal.append(Direction::Received, json!({ "type": "session.created" }));
        journal.persist(&path).await.unwrap();

        let raw = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(raw.starts_with('['));
        assert!(raw.contains('\n'));
        let parsed: Vec<Value> = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed[0]["type"], "received");
        assert!(parsed[0]["timestamp"].is_string());
        assert_eq!(parsed[0]["data"]["type"], "session.created");
    }
}
