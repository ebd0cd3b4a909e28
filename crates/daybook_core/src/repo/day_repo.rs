//! Daily note repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Resolve the full entry set of one date, materializing due pin copies.
//! - Provide read-only calendar summaries over a date range.
//!
//! # Invariants
//! - Resolution is one immediate transaction: note creation, every
//!   materialization and the final read commit together or not at all.
//! - Range summaries never create notes or copies.

use crate::model::entry::{DailyNote, DaySummary, Entry, EntryId};
use crate::model::lineage::LineageId;
use crate::repo::entry_repo::{
    ensure_daily_note, ensure_schema_ready, load_daily_note, load_entries_for_date, RepoError,
    RepoResult,
};
use crate::repo::lineage_repo::{load_due_lineages, materialize_in_tx, Materialized};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Transaction, TransactionBehavior};
use std::collections::HashSet;

/// One entry as shown on a day, with its live pin flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayEntry {
    pub entry: Entry,
    /// True while the entry's lineage is active.
    pub pinned: bool,
}

/// Resolved content of one date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayRecord {
    pub note: DailyNote,
    /// Newest first: `created_at DESC`, then reverse insertion order.
    pub entries: Vec<DayEntry>,
    /// Copies inserted by this resolution.
    pub materialized: Vec<EntryId>,
}

/// Repository interface for daily note operations.
pub trait DayRepository {
    /// Creates the note if absent, materializes due copies, returns entries.
    fn resolve_day(&self, date: NaiveDate) -> RepoResult<DayRecord>;
    /// Lists existing notes in `from..=to` with entry counts.
    fn list_days(&self, from: NaiveDate, to: NaiveDate) -> RepoResult<Vec<DaySummary>>;
}

/// SQLite-backed daily note repository.
pub struct SqliteDayRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDayRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn })
    }
}

impl DayRepository for SqliteDayRepository<'_> {
    fn resolve_day(&self, date: NaiveDate) -> RepoResult<DayRecord> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        ensure_daily_note(&tx, date)?;

        // Every sibling on `date` has origin_date <= date, so the due set
        // covers every lineage that can be active on this day.
        let mut materialized = Vec::new();
        let mut active_lineages: HashSet<LineageId> = HashSet::new();
        for lineage in load_due_lineages(&tx, date)? {
            active_lineages.insert(lineage.lineage_id);
            if let Materialized::Created(entry) = materialize_in_tx(&tx, &lineage, date)? {
                materialized.push(entry.uuid);
            }
        }

        let note = load_daily_note(&tx, date)?.ok_or_else(|| {
            RepoError::InvalidData(format!("daily note {date} missing after creation"))
        })?;

        let entries = load_entries_for_date(&tx, date)?
            .into_iter()
            .map(|entry| {
                let pinned = entry
                    .lineage_id
                    .is_some_and(|lineage_id| active_lineages.contains(&lineage_id));
                DayEntry { entry, pinned }
            })
            .collect();

        tx.commit()?;
        Ok(DayRecord {
            note,
            entries,
            materialized,
        })
    }

    fn list_days(&self, from: NaiveDate, to: NaiveDate) -> RepoResult<Vec<DaySummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                n.note_date AS note_date,
                COUNT(e.uuid) AS entry_count
             FROM daily_notes n
             LEFT JOIN entries e ON e.entry_date = n.note_date
             WHERE n.note_date >= ?1
               AND n.note_date <= ?2
             GROUP BY n.note_date
             ORDER BY n.note_date ASC;",
        )?;
        let mut rows = stmt.query(params![from, to])?;
        let mut days = Vec::new();
        while let Some(row) = rows.next()? {
            days.push(DaySummary {
                note_date: row.get("note_date")?,
                entry_count: row.get("entry_count")?,
            });
        }
        Ok(days)
    }
}
