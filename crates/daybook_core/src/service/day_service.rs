//! Daily note use-case service.
//!
//! # Responsibility
//! - Resolve one day, lazily materializing pinned copies.
//! - Summarize existing days for calendar views.

use crate::db::retry::{retry_transient, TransientError};
use crate::model::entry::DaySummary;
use crate::repo::day_repo::{DayRecord, DayRepository};
use crate::repo::entry_repo::RepoError;
use chrono::NaiveDate;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Service error for daily note use-cases.
#[derive(Debug)]
pub enum DayServiceError {
    /// Date range has `from` after `to`.
    InvalidRange { from: NaiveDate, to: NaiveDate },
    /// Lock or abort failure that survived one retry.
    Transient(RepoError),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for DayServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidRange { from, to } => {
                write!(f, "invalid date range: {from} is after {to}")
            }
            Self::Transient(err) => write!(f, "storage busy, retry later: {err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DayServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Transient(err) | Self::Repo(err) => Some(err),
            Self::InvalidRange { .. } => None,
        }
    }
}

impl From<RepoError> for DayServiceError {
    fn from(value: RepoError) -> Self {
        if value.is_transient() {
            Self::Transient(value)
        } else {
            Self::Repo(value)
        }
    }
}

/// Daily note service facade over repository implementations.
pub struct DayService<R: DayRepository> {
    repo: R,
}

impl<R: DayRepository> DayService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Returns the day's note and entries, creating due pin copies first.
    pub fn get_day(&self, date: NaiveDate) -> Result<DayRecord, DayServiceError> {
        let started_at = Instant::now();
        let record = retry_transient("day_resolve", || self.repo.resolve_day(date))?;
        info!(
            "event=day_resolve module=service status=ok date={} entries={} materialized={} duration_ms={}",
            date,
            record.entries.len(),
            record.materialized.len(),
            started_at.elapsed().as_millis()
        );
        Ok(record)
    }

    /// Lists existing days in `from..=to` with entry counts.
    pub fn list_days(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DaySummary>, DayServiceError> {
        if from > to {
            return Err(DayServiceError::InvalidRange { from, to });
        }
        Ok(self.repo.list_days(from, to)?)
    }
}
