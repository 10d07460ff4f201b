// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! History store implementation
//!
//! Keeps finished readings in a JSON file, newest first, so they can be
//! listed, shown again, or resumed as a conversation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::config::Settings;
use crate::error::{ArcanaError, Result};
use crate::llm::message::ConversationHistory;
use crate::reading::{construct_prompts, DrawnItem};

/// Most readings kept in the history file
pub const MAX_HISTORY_ITEMS: usize = 50;

/// Receives finished readings
pub trait ReadingRecorder: Send + Sync {
    fn save(
        &self,
        question: &str,
        spread_name: &str,
        spread_id: &str,
        items: &[DrawnItem],
        final_text: &str,
    ) -> Result<()>;
}

/// A finished reading stored in history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReadingRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub question: String,
    pub spread_name: String,
    pub spread_id: String,
    pub items: Vec<DrawnItem>,
    pub analysis: String,
}

impl ReadingRecord {
    /// Create a record stamped with the current time
    pub fn new(
        question: impl Into<String>,
        spread_name: impl Into<String>,
        spread_id: impl Into<String>,
        items: Vec<DrawnItem>,
        analysis: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            question: question.into(),
            spread_name: spread_name.into(),
            spread_id: spread_id.into(),
            items,
            analysis: analysis.into(),
        }
    }

    /// Question shortened for listings
    pub fn summary(&self) -> String {
        let question = self.question.trim();
        if question.is_empty() {
            return format!("({})", self.spread_name);
        }
        if question.chars().count() > 60 {
            let head: String = question.chars().take(57).collect();
            format!("{}...", head)
        } else {
            question.to_string()
        }
    }

    /// Rebuild the conversation the reading ended with
    pub fn conversation(&self) -> ConversationHistory {
        let prompts = construct_prompts(
            &self.question,
            &self.spread_name,
            &self.spread_id,
            &self.items,
        );
        ConversationHistory::seeded(&prompts, self.analysis.clone())
    }
}

/// File-backed reading history
pub struct HistoryStore {
    path: PathBuf,
    records: Mutex<Vec<ReadingRecord>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!(target: "arcana.history", "history lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

impl HistoryStore {
    /// Open or create the history at the default path
    pub fn open() -> Result<Self> {
        Self::open_at(Settings::history_path())
    }

    /// Open or create the history at a specific path
    pub fn open_at(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let records = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            match serde_json::from_str::<Vec<ReadingRecord>>(&content) {
                Ok(records) => records,
                Err(error) => {
                    tracing::warn!(
                        target: "arcana.history",
                        %error,
                        path = %path.display(),
                        "history file unreadable, starting empty"
                    );
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    fn persist(&self, records: &[ReadingRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(records)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }

    /// Write `staged` to disk and only then make it the in-memory state
    fn commit(&self, records: &mut Vec<ReadingRecord>, staged: Vec<ReadingRecord>) -> Result<()> {
        self.persist(&staged)?;
        *records = staged;
        Ok(())
    }

    /// Insert a record at the front, dropping the oldest beyond the cap
    pub fn insert(&self, record: ReadingRecord) -> Result<()> {
        let mut records = lock(&self.records);
        let mut staged = Vec::with_capacity(records.len() + 1);
        staged.push(record);
        staged.extend(records.iter().take(MAX_HISTORY_ITEMS - 1).cloned());
        self.commit(&mut records, staged)
    }

    /// All records, newest first
    pub fn list(&self) -> Vec<ReadingRecord> {
        let mut records = lock(&self.records).clone();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        records
    }

    /// Look a record up by full id
    pub fn get(&self, id: Uuid) -> Option<ReadingRecord> {
        lock(&self.records).iter().find(|r| r.id == id).cloned()
    }

    /// Look a record up by a unique id prefix
    pub fn find(&self, prefix: &str) -> Result<ReadingRecord> {
        let prefix = prefix.trim().to_ascii_lowercase();
        if prefix.is_empty() {
            return Err(ArcanaError::InvalidInput("empty reading id".to_string()));
        }

        let records = lock(&self.records);
        let matches: Vec<&ReadingRecord> = records
            .iter()
            .filter(|r| r.id.to_string().starts_with(&prefix))
            .collect();

        match matches.as_slice() {
            [record] => Ok((*record).clone()),
            [] => Err(ArcanaError::InvalidInput(format!(
                "no reading matches '{}'",
                prefix
            ))),
            _ => Err(ArcanaError::InvalidInput(format!(
                "'{}' matches {} readings, use a longer id",
                prefix,
                matches.len()
            ))),
        }
    }

    /// Delete a record
    pub fn delete(&self, id: Uuid) -> Result<bool> {
        let mut records = lock(&self.records);
        let staged: Vec<ReadingRecord> = records.iter().filter(|r| r.id != id).cloned().collect();

        if staged.len() < records.len() {
            self.commit(&mut records, staged)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Delete every record, returning how many were removed
    pub fn clear(&self) -> Result<usize> {
        let mut records = lock(&self.records);
        let removed = records.len();
        self.commit(&mut records, Vec::new())?;
        Ok(removed)
    }

    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ReadingRecorder for HistoryStore {
    fn save(
        &self,
        question: &str,
        spread_name: &str,
        spread_id: &str,
        items: &[DrawnItem],
        final_text: &str,
    ) -> Result<()> {
        let record = ReadingRecord::new(question, spread_name, spread_id, items.to_vec(), final_text);
        tracing::debug!(target: "arcana.history", id = %record.id, "saving reading");
        self.insert(record)
    }
}
