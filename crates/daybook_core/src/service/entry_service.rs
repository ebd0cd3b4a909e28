//! Entry use-case service.
//!
//! # Responsibility
//! - Provide entry create/update/complete/get APIs.
//! - Coordinate cascade deletion of an entry and its whole lineage.
//!
//! # Invariants
//! - Deleting any member of a lineage deletes every member, on every date.
//! - Transactional writes are replayed once on a transient failure.

use crate::db::retry::{retry_transient, TransientError};
use crate::model::entry::{Entry, EntryId};
use crate::repo::entry_repo::{CascadeDeletion, EntryRepository, RepoError};
use chrono::NaiveDate;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for entry use-cases.
#[derive(Debug)]
pub enum EntryServiceError {
    /// Target entry does not exist.
    EntryNotFound(EntryId),
    /// Date range has `from` after `to`.
    InvalidRange { from: NaiveDate, to: NaiveDate },
    /// Lock or abort failure that survived one retry.
    Transient(RepoError),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for EntryServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EntryNotFound(id) => write!(f, "entry not found: {id}"),
            Self::InvalidRange { from, to } => {
                write!(f, "invalid date range: {from} is after {to}")
            }
            Self::Transient(err) => write!(f, "storage busy, retry later: {err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for EntryServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Transient(err) | Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for EntryServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::EntryNotFound(id) => Self::EntryNotFound(id),
            other if other.is_transient() => Self::Transient(other),
            other => Self::Repo(other),
        }
    }
}

/// Entry service facade over repository implementations.
pub struct EntryService<R: EntryRepository> {
    repo: R,
}

impl<R: EntryRepository> EntryService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates one unpinned entry on `date`.
    pub fn create_entry(
        &self,
        date: NaiveDate,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<Entry, EntryServiceError> {
        let entry = Entry::new(date, title, content);
        Ok(retry_transient("entry_create", || {
            self.repo.create_entry(&entry)
        })?)
    }

    /// Replaces title and content. Existing pin copies keep their text.
    pub fn update_entry(
        &self,
        id: EntryId,
        title: &str,
        content: &str,
    ) -> Result<Entry, EntryServiceError> {
        Ok(retry_transient("entry_update", || {
            self.repo.update_entry_text(id, title, content)
        })?)
    }

    /// Sets completion state of one entry only.
    pub fn set_completed(&self, id: EntryId, completed: bool) -> Result<Entry, EntryServiceError> {
        Ok(retry_transient("entry_complete", || {
            self.repo.set_entry_completed(id, completed)
        })?)
    }

    /// Gets one entry by stable ID.
    pub fn get_entry(&self, id: EntryId) -> Result<Entry, EntryServiceError> {
        self.repo
            .get_entry(id)?
            .ok_or(EntryServiceError::EntryNotFound(id))
    }

    /// Lists stored entries in `from..=to`. Never materializes copies.
    pub fn entries_in_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Entry>, EntryServiceError> {
        if from > to {
            return Err(EntryServiceError::InvalidRange { from, to });
        }
        Ok(self.repo.list_entries_in_range(from, to)?)
    }

    /// Deletes the entry; when it belongs to a lineage, deletes the whole
    /// lineage with every membership of every member.
    pub fn delete_entry(&self, id: EntryId) -> Result<CascadeDeletion, EntryServiceError> {
        Ok(retry_transient("entry_delete", || {
            self.repo.delete_entry_cascade(id)
        })?)
    }
}
