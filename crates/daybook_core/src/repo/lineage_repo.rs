//! Pin lineage repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist pin/unpin transitions on `pin_lineages`.
//! - Materialize one lineage copy for one date, exactly once.
//!
//! # Invariants
//! - At most one entry per `(lineage_id, entry_date)`, enforced by the
//!   `ux_entries_lineage_date` unique index.
//! - A uniqueness violation during materialization means another writer
//!   already produced the copy; the existing row is returned.
//! - Lineage existence and activity are re-read inside the same transaction
//!   that inserts the copy.

use crate::model::entry::{Entry, EntryId};
use crate::model::lineage::{LineageId, PinLineage, PinState};
use crate::repo::entry_repo::{
    bool_to_int, ensure_daily_note, ensure_schema_ready, insert_entry, int_to_bool,
    load_required_entry, parse_entry_row, parse_uuid, RepoError, RepoResult, ENTRY_SELECT_SQL,
};
use chrono::NaiveDate;
use log::debug;
use rusqlite::{params, Connection, ErrorCode, Row, Transaction, TransactionBehavior};
use uuid::Uuid;

const LINEAGE_SELECT_SQL: &str = "SELECT
    lineage_id,
    origin_entry_id,
    origin_date,
    active,
    created_at,
    updated_at
FROM pin_lineages";

/// Entry plus its lineage after a pin transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinRecord {
    pub entry: Entry,
    pub lineage: Option<PinLineage>,
    /// `false` when the call was an idempotent no-op.
    pub changed: bool,
}

impl PinRecord {
    pub fn state(&self) -> PinState {
        PinState::from_lineage(self.lineage.as_ref())
    }
}

/// Result of one materialization attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Materialized {
    /// A new copy was inserted by this call.
    Created(Entry),
    /// The copy (or the origin itself) already existed for the date.
    Existing(Entry),
    /// Lineage inactive, or date before the origin date.
    NotDue,
}

impl Materialized {
    pub fn entry(&self) -> Option<&Entry> {
        match self {
            Self::Created(entry) | Self::Existing(entry) => Some(entry),
            Self::NotDue => None,
        }
    }

    pub fn into_entry(self) -> Option<Entry> {
        match self {
            Self::Created(entry) | Self::Existing(entry) => Some(entry),
            Self::NotDue => None,
        }
    }
}

/// Repository interface for pin lineage operations.
pub trait LineageRepository {
    /// Pins one entry, creating or reactivating its lineage.
    fn pin_entry(&self, entry_id: EntryId) -> RepoResult<PinRecord>;
    /// Deactivates the entry's lineage; existing copies are kept.
    fn unpin_entry(&self, entry_id: EntryId) -> RepoResult<PinRecord>;
    /// Loads one entry with its lineage.
    fn pin_record(&self, entry_id: EntryId) -> RepoResult<PinRecord>;
    /// Loads one lineage by id.
    fn get_lineage(&self, lineage_id: LineageId) -> RepoResult<Option<PinLineage>>;
    /// Lists active lineages whose origin date is on or before `date`.
    fn list_due_lineages(&self, date: NaiveDate) -> RepoResult<Vec<PinLineage>>;
    /// Ensures the lineage copy for `date` exists when the lineage is due.
    fn materialize(&self, lineage_id: LineageId, date: NaiveDate) -> RepoResult<Materialized>;
}

/// SQLite-backed pin lineage repository.
pub struct SqliteLineageRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteLineageRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn })
    }
}

impl LineageRepository for SqliteLineageRepository<'_> {
    fn pin_entry(&self, entry_id: EntryId) -> RepoResult<PinRecord> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let entry = load_required_entry(&tx, entry_id)?;

        let changed = match entry.lineage_id {
            Some(lineage_id) => {
                let reactivated = tx.execute(
                    "UPDATE pin_lineages
                     SET active = 1,
                         updated_at = (strftime('%s', 'now') * 1000)
                     WHERE lineage_id = ?1
                       AND active = 0;",
                    [lineage_id.to_string()],
                )?;
                reactivated > 0
            }
            None => {
                let lineage_id = Uuid::new_v4();
                tx.execute(
                    "INSERT INTO pin_lineages (
                        lineage_id,
                        origin_entry_id,
                        origin_date,
                        active
                    ) VALUES (?1, ?2, ?3, 1);",
                    params![lineage_id.to_string(), entry_id.to_string(), entry.entry_date],
                )?;
                tx.execute(
                    "UPDATE entries
                     SET lineage_id = ?2,
                         is_pin_origin = 1,
                         updated_at = (strftime('%s', 'now') * 1000)
                     WHERE uuid = ?1
                       AND lineage_id IS NULL;",
                    params![entry_id.to_string(), lineage_id.to_string()],
                )?;
                true
            }
        };

        let record = load_pin_record(&tx, entry_id, changed)?;
        tx.commit()?;
        debug!(
            "event=entry_pin module=repo status={} entry_id={}",
            if changed { "ok" } else { "noop" },
            entry_id
        );
        Ok(record)
    }

    fn unpin_entry(&self, entry_id: EntryId) -> RepoResult<PinRecord> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let entry = load_required_entry(&tx, entry_id)?;

        let changed = match entry.lineage_id {
            Some(lineage_id) => {
                let deactivated = tx.execute(
                    "UPDATE pin_lineages
                     SET active = 0,
                         updated_at = (strftime('%s', 'now') * 1000)
                     WHERE lineage_id = ?1
                       AND active = 1;",
                    [lineage_id.to_string()],
                )?;
                deactivated > 0
            }
            None => false,
        };

        let record = load_pin_record(&tx, entry_id, changed)?;
        tx.commit()?;
        debug!(
            "event=entry_unpin module=repo status={} entry_id={}",
            if changed { "ok" } else { "noop" },
            entry_id
        );
        Ok(record)
    }

    fn pin_record(&self, entry_id: EntryId) -> RepoResult<PinRecord> {
        load_pin_record(self.conn, entry_id, false)
    }

    fn get_lineage(&self, lineage_id: LineageId) -> RepoResult<Option<PinLineage>> {
        load_lineage(self.conn, lineage_id)
    }

    fn list_due_lineages(&self, date: NaiveDate) -> RepoResult<Vec<PinLineage>> {
        load_due_lineages(self.conn, date)
    }

    fn materialize(&self, lineage_id: LineageId, date: NaiveDate) -> RepoResult<Materialized> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let lineage =
            load_lineage(&tx, lineage_id)?.ok_or(RepoError::LineageNotFound(lineage_id))?;
        let outcome = materialize_in_tx(&tx, &lineage, date)?;
        tx.commit()?;
        Ok(outcome)
    }
}

/// Materializes `lineage` on `date` using the caller's open transaction.
///
/// The caller must have re-read `lineage` inside the same transaction.
pub(crate) fn materialize_in_tx(
    conn: &Connection,
    lineage: &PinLineage,
    date: NaiveDate,
) -> RepoResult<Materialized> {
    if !lineage.is_due_on(date) {
        return Ok(Materialized::NotDue);
    }

    if let Some(existing) = load_sibling_on(conn, lineage.lineage_id, date)? {
        return Ok(Materialized::Existing(existing));
    }

    let origin = load_required_entry(conn, lineage.origin_entry_id)?;
    ensure_daily_note(conn, date)?;
    insert_sibling(conn, &origin.sibling_copy(lineage.lineage_id, date))
}

/// Inserts a lineage copy; a lost uniqueness race yields the surviving row.
fn insert_sibling(conn: &Connection, copy: &Entry) -> RepoResult<Materialized> {
    let lineage_id = copy.lineage_id.ok_or_else(|| {
        RepoError::InvalidData(format!("entry {} is not part of a lineage", copy.uuid))
    })?;
    let date = copy.entry_date;

    match insert_entry(conn, copy) {
        Ok(()) => {
            debug!(
                "event=pin_materialize module=repo status=ok lineage_id={} date={} entry_id={}",
                lineage_id, date, copy.uuid
            );
            Ok(Materialized::Created(load_required_entry(conn, copy.uuid)?))
        }
        Err(err) if err.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) => {
            debug!(
                "event=pin_materialize module=repo status=noop lineage_id={} date={} reason=unique_race",
                lineage_id, date
            );
            load_sibling_on(conn, lineage_id, date)?
                .map(Materialized::Existing)
                .ok_or(RepoError::TransactionAborted(
                    "materialization conflict without a surviving sibling",
                ))
        }
        Err(err) => Err(err.into()),
    }
}

pub(crate) fn load_lineage(
    conn: &Connection,
    lineage_id: LineageId,
) -> RepoResult<Option<PinLineage>> {
    let mut stmt = conn.prepare(&format!("{LINEAGE_SELECT_SQL} WHERE lineage_id = ?1;"))?;
    let mut rows = stmt.query([lineage_id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_lineage_row(row)?));
    }
    Ok(None)
}

pub(crate) fn load_due_lineages(conn: &Connection, date: NaiveDate) -> RepoResult<Vec<PinLineage>> {
    let mut stmt = conn.prepare(&format!(
        "{LINEAGE_SELECT_SQL}
         WHERE active = ?1
           AND origin_date <= ?2
         ORDER BY origin_date ASC, created_at ASC, lineage_id ASC;"
    ))?;
    let mut rows = stmt.query(params![bool_to_int(true), date])?;
    let mut lineages = Vec::new();
    while let Some(row) = rows.next()? {
        lineages.push(parse_lineage_row(row)?);
    }
    Ok(lineages)
}

fn load_sibling_on(
    conn: &Connection,
    lineage_id: LineageId,
    date: NaiveDate,
) -> RepoResult<Option<Entry>> {
    let mut stmt = conn.prepare(&format!(
        "{ENTRY_SELECT_SQL}
         WHERE lineage_id = ?1
           AND entry_date = ?2;"
    ))?;
    let mut rows = stmt.query(params![lineage_id.to_string(), date])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_entry_row(row)?));
    }
    Ok(None)
}

fn load_pin_record(conn: &Connection, entry_id: EntryId, changed: bool) -> RepoResult<PinRecord> {
    let entry = load_required_entry(conn, entry_id)?;
    let lineage = match entry.lineage_id {
        Some(lineage_id) => Some(
            load_lineage(conn, lineage_id)?.ok_or_else(|| {
                RepoError::InvalidData(format!(
                    "entry {entry_id} references missing lineage {lineage_id}"
                ))
            })?,
        ),
        None => None,
    };
    Ok(PinRecord {
        entry,
        lineage,
        changed,
    })
}

fn parse_lineage_row(row: &Row<'_>) -> RepoResult<PinLineage> {
    let lineage_text: String = row.get("lineage_id")?;
    let origin_text: String = row.get("origin_entry_id")?;
    Ok(PinLineage {
        lineage_id: parse_uuid(&lineage_text, "pin_lineages.lineage_id")?,
        origin_entry_id: parse_uuid(&origin_text, "pin_lineages.origin_entry_id")?,
        origin_date: row.get("origin_date")?,
        active: int_to_bool(row.get("active")?, "pin_lineages.active")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
