//! Pin use-case service.
//!
//! # Responsibility
//! - Pin, unpin and toggle entries.
//! - Expose pin state and on-demand materialization of one lineage.
//!
//! # Invariants
//! - Pinning an entry that already belongs to a lineage reactivates that
//!   lineage; a second lineage is never created for it.
//! - Unpinning never deletes copies.

use crate::db::retry::{retry_transient, TransientError};
use crate::model::entry::EntryId;
use crate::model::lineage::{LineageId, PinState};
use crate::repo::entry_repo::RepoError;
use crate::repo::lineage_repo::{LineageRepository, Materialized, PinRecord};
use chrono::NaiveDate;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for pin use-cases.
#[derive(Debug)]
pub enum PinServiceError {
    /// Target entry does not exist.
    EntryNotFound(EntryId),
    /// Target lineage does not exist.
    LineageNotFound(LineageId),
    /// Lock or abort failure that survived one retry.
    Transient(RepoError),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for PinServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EntryNotFound(id) => write!(f, "entry not found: {id}"),
            Self::LineageNotFound(id) => write!(f, "pin lineage not found: {id}"),
            Self::Transient(err) => write!(f, "storage busy, retry later: {err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for PinServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Transient(err) | Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for PinServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::EntryNotFound(id) => Self::EntryNotFound(id),
            RepoError::LineageNotFound(id) => Self::LineageNotFound(id),
            other if other.is_transient() => Self::Transient(other),
            other => Self::Repo(other),
        }
    }
}

/// Pin service facade over repository implementations.
pub struct PinService<R: LineageRepository> {
    repo: R,
}

impl<R: LineageRepository> PinService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Pins one entry. Idempotent while the lineage is active.
    pub fn pin(&self, entry_id: EntryId) -> Result<PinRecord, PinServiceError> {
        let record = retry_transient("entry_pin", || self.repo.pin_entry(entry_id))?;
        if record.changed {
            info!(
                "event=entry_pin module=service status=ok entry_id={} lineage_id={}",
                entry_id,
                lineage_label(&record)
            );
        }
        Ok(record)
    }

    /// Stops future copies of the entry's lineage. Idempotent.
    pub fn unpin(&self, entry_id: EntryId) -> Result<PinRecord, PinServiceError> {
        let record = retry_transient("entry_unpin", || self.repo.unpin_entry(entry_id))?;
        if record.changed {
            info!(
                "event=entry_unpin module=service status=ok entry_id={} lineage_id={}",
                entry_id,
                lineage_label(&record)
            );
        }
        Ok(record)
    }

    /// Unpins an actively pinned entry, pins any other.
    pub fn toggle_pin(&self, entry_id: EntryId) -> Result<PinRecord, PinServiceError> {
        match self.pin_state(entry_id)? {
            PinState::PinnedActive => self.unpin(entry_id),
            PinState::Unpinned | PinState::PinnedInactive => self.pin(entry_id),
        }
    }

    /// Reads the entry's pin state.
    pub fn pin_state(&self, entry_id: EntryId) -> Result<PinState, PinServiceError> {
        Ok(self.repo.pin_record(entry_id)?.state())
    }

    /// Ensures the lineage copy for `date` exists when the lineage is due.
    pub fn materialize(
        &self,
        lineage_id: LineageId,
        date: NaiveDate,
    ) -> Result<Materialized, PinServiceError> {
        Ok(retry_transient("pin_materialize", || {
            self.repo.materialize(lineage_id, date)
        })?)
    }
}

fn lineage_label(record: &PinRecord) -> String {
    record
        .lineage
        .as_ref()
        .map_or_else(|| "none".to_string(), |lineage| lineage.lineage_id.to_string())
}
