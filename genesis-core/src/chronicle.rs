//! Player-facing log of engine activity.
//!
//! Purely observational: nothing reads it back to make decisions, and it
//! is not persisted.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChronicleEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl fmt::Display for ChronicleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.timestamp.format("%H:%M:%S"), self.message)
    }
}

/// Append-only event log.
#[derive(Debug, Default)]
pub struct Chronicle {
    entries: Mutex<Vec<ChronicleEntry>>,
}

impl Chronicle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message stamped with the current time.
    pub fn record(&self, message: impl Into<String>) {
        let entry = ChronicleEntry {
            timestamp: Utc::now(),
            message: message.into(),
        };
        tracing::info!(target: "chronicle", "{}", entry.message);
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(entry);
    }

    /// All entries, newest first.
    pub fn entries(&self) -> Vec<ChronicleEntry> {
        let entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.iter().rev().cloned().collect()
    }

    /// The most recent entry.
    pub fn latest(&self) -> Option<ChronicleEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .last()
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_newest_first() {
        let chronicle = Chronicle::new();
        chronicle.record("first");
        chronicle.record("second");
        chronicle.record("third");

        let messages: Vec<_> = chronicle.entries().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["third", "second", "first"]);
        assert_eq!(chronicle.latest().unwrap().message, "third");
        assert_eq!(chronicle.len(), 3);
    }

    #[test]
    fn test_timestamps_non_decreasing_oldest_to_newest() {
        let chronicle = Chronicle::new();
        for i in 0..5 {
            chronicle.record(format!("event {i}"));
        }
        let entries = chronicle.entries();
        assert!(entries.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
    }

    #[test]
    fn test_display_includes_time() {
        let entry = ChronicleEntry {
            timestamp: DateTime::parse_from_rfc3339("2024-05-01T13:04:05Z")
                .unwrap()
                .with_timezone(&Utc),
            message: "Created Mist!".to_string(),
        };
        assert_eq!(entry.to_string(), "[13:04:05] Created Mist!");
    }

    #[test]
    fn test_empty() {
        let chronicle = Chronicle::new();
        assert!(chronicle.is_empty());
        assert!(chronicle.latest().is_none());
    }
}
