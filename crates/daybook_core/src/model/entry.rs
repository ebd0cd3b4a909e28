//! Entry and daily note domain model.
//!
//! # Responsibility
//! - Define the dated journal entry record and its lineage linkage.
//! - Define the per-date daily note container.
//!
//! # Invariants
//! - `uuid` is stable and never reused for another entry.
//! - `lineage_id`, once set, never changes for the entry's lifetime.
//! - `is_pin_origin` implies `lineage_id.is_some()`.

use crate::model::lineage::LineageId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for one journal entry.
pub type EntryId = Uuid;

/// One dated journal entry.
///
/// `title` and `content` are opaque to the core: editors own their format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub uuid: EntryId,
    /// Date of the daily note this entry is attached to.
    pub entry_date: NaiveDate,
    pub title: String,
    pub content: String,
    pub is_completed: bool,
    /// Shared by every copy of one pinned entry.
    pub lineage_id: Option<LineageId>,
    /// True only for the entry that was explicitly pinned.
    pub is_pin_origin: bool,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Epoch milliseconds.
    pub updated_at: i64,
}

impl Entry {
    /// Creates an unlinked entry for `entry_date` with a generated ID.
    ///
    /// Timestamps are zero until the store assigns them.
    pub fn new(
        entry_date: NaiveDate,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            entry_date,
            title: title.into(),
            content: content.into(),
            is_completed: false,
            lineage_id: None,
            is_pin_origin: false,
            created_at: 0,
            updated_at: 0,
        }
    }

    /// Builds the by-value copy of `self` for `date` inside `lineage_id`.
    ///
    /// Completion state does not carry over to the new day.
    pub fn sibling_copy(&self, lineage_id: LineageId, date: NaiveDate) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            entry_date: date,
            title: self.title.clone(),
            content: self.content.clone(),
            is_completed: false,
            lineage_id: Some(lineage_id),
            is_pin_origin: false,
            created_at: 0,
            updated_at: 0,
        }
    }

    /// Checks field-level invariants before persistence.
    pub fn validate(&self) -> Result<(), EntryValidationError> {
        if self.is_pin_origin && self.lineage_id.is_none() {
            return Err(EntryValidationError::OriginWithoutLineage);
        }
        Ok(())
    }
}

/// Field-level entry validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryValidationError {
    /// `is_pin_origin` set on an entry that belongs to no lineage.
    OriginWithoutLineage,
}

impl Display for EntryValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OriginWithoutLineage => {
                write!(f, "is_pin_origin requires a lineage_id")
            }
        }
    }
}

impl Error for EntryValidationError {}

/// Per-date container for entries. Created lazily on first access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyNote {
    pub note_date: NaiveDate,
    /// Epoch milliseconds.
    pub created_at: i64,
}

/// Calendar summary row for one daily note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySummary {
    pub note_date: NaiveDate,
    pub entry_count: u32,
}
