//! Entry repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD APIs over `entries` and lazy `daily_notes` creation.
//! - Own cascade deletion of a whole pin lineage.
//! - Host the repository error type shared by every store.
//!
//! # Invariants
//! - Write paths call `Entry::validate()` before SQL mutations.
//! - `lineage_id` is never rewritten by this repository once set.
//! - Cascade deletion runs in one immediate transaction spanning the
//!   lineage row, all siblings and all their memberships.

use crate::db::migrations::latest_version;
use crate::db::retry::TransientError;
use crate::db::DbError;
use crate::model::entry::{DailyNote, Entry, EntryId, EntryValidationError};
use crate::model::lineage::LineageId;
use crate::model::list::ListId;
use crate::repo::list_repo::compact_list_order;
use chrono::NaiveDate;
use log::info;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub(crate) const ENTRY_SELECT_SQL: &str = "SELECT
    uuid,
    entry_date,
    title,
    content,
    is_completed,
    lineage_id,
    is_pin_origin,
    created_at,
    updated_at
FROM entries";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for journal persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(EntryValidationError),
    Db(DbError),
    EntryNotFound(EntryId),
    LineageNotFound(LineageId),
    ListNotFound(ListId),
    /// Entry is not a member of the list it was addressed through.
    NotAMember {
        list_id: ListId,
        entry_id: EntryId,
    },
    /// List exists but does not belong to the addressed exclusivity group.
    NotInGroup {
        list_id: ListId,
        group_id: String,
    },
    DuplicateListName(String),
    GroupAlreadyInitialized(String),
    /// Column sequence is not a permutation of the group's columns.
    InvalidGroupOrder {
        group_id: String,
        reason: String,
    },
    /// A concurrent writer changed the rows this transaction relied on.
    TransactionAborted(&'static str),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    InvalidData(String),
}

impl RepoError {
    /// Returns whether the error means "the addressed row does not exist".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::EntryNotFound(_)
                | Self::LineageNotFound(_)
                | Self::ListNotFound(_)
                | Self::NotAMember { .. }
        )
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::EntryNotFound(id) => write!(f, "entry not found: {id}"),
            Self::LineageNotFound(id) => write!(f, "pin lineage not found: {id}"),
            Self::ListNotFound(id) => write!(f, "list not found: {id}"),
            Self::NotAMember { list_id, entry_id } => {
                write!(f, "entry {entry_id} is not in list {list_id}")
            }
            Self::NotInGroup { list_id, group_id } => {
                write!(f, "list {list_id} is not a column of group `{group_id}`")
            }
            Self::DuplicateListName(name) => write!(f, "list name already exists: `{name}`"),
            Self::GroupAlreadyInitialized(group) => {
                write!(f, "group `{group}` is already initialized")
            }
            Self::InvalidGroupOrder { group_id, reason } => {
                write!(f, "invalid column order for group `{group_id}`: {reason}")
            }
            Self::TransactionAborted(details) => write!(f, "transaction aborted: {details}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl TransientError for RepoError {
    fn is_transient(&self) -> bool {
        match self {
            Self::Db(err) => err.is_transient(),
            Self::TransactionAborted(_) => true,
            _ => false,
        }
    }
}

impl From<EntryValidationError> for RepoError {
    fn from(value: EntryValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Outcome of deleting one entry and everything linked to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeDeletion {
    /// Lineage removed along with the entry, if it had one.
    pub lineage_id: Option<LineageId>,
    /// Every entry row removed, the addressed one included.
    pub deleted_entry_ids: Vec<EntryId>,
    /// Lists that lost at least one membership.
    pub touched_list_ids: Vec<ListId>,
}

/// Repository interface for entry operations.
pub trait EntryRepository {
    /// Persists a new entry, creating its daily note when absent.
    fn create_entry(&self, entry: &Entry) -> RepoResult<Entry>;
    /// Replaces title and content of one entry.
    fn update_entry_text(&self, id: EntryId, title: &str, content: &str) -> RepoResult<Entry>;
    /// Sets the completion checkbox of one entry.
    fn set_entry_completed(&self, id: EntryId, completed: bool) -> RepoResult<Entry>;
    /// Loads one entry by id.
    fn get_entry(&self, id: EntryId) -> RepoResult<Option<Entry>>;
    /// Lists entries stored on `date` without triggering materialization.
    fn list_entries_for_date(&self, date: NaiveDate) -> RepoResult<Vec<Entry>>;
    /// Lists entries with `from <= entry_date <= to`, by date, newest first
    /// within one date.
    fn list_entries_in_range(&self, from: NaiveDate, to: NaiveDate) -> RepoResult<Vec<Entry>>;
    /// Deletes an entry, its lineage siblings and all their memberships.
    fn delete_entry_cascade(&self, id: EntryId) -> RepoResult<CascadeDeletion>;
}

/// SQLite-backed entry repository.
pub struct SqliteEntryRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEntryRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn })
    }
}

impl EntryRepository for SqliteEntryRepository<'_> {
    fn create_entry(&self, entry: &Entry) -> RepoResult<Entry> {
        entry.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        ensure_daily_note(&tx, entry.entry_date)?;
        insert_entry(&tx, entry)?;
        let created = load_required_entry(&tx, entry.uuid)?;
        tx.commit()?;
        Ok(created)
    }

    fn update_entry_text(&self, id: EntryId, title: &str, content: &str) -> RepoResult<Entry> {
        let changed = self.conn.execute(
            "UPDATE entries
             SET title = ?2,
                 content = ?3,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![id.to_string(), title, content],
        )?;
        if changed == 0 {
            return Err(RepoError::EntryNotFound(id));
        }
        load_required_entry(self.conn, id)
    }

    fn set_entry_completed(&self, id: EntryId, completed: bool) -> RepoResult<Entry> {
        let changed = self.conn.execute(
            "UPDATE entries
             SET is_completed = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![id.to_string(), bool_to_int(completed)],
        )?;
        if changed == 0 {
            return Err(RepoError::EntryNotFound(id));
        }
        load_required_entry(self.conn, id)
    }

    fn get_entry(&self, id: EntryId) -> RepoResult<Option<Entry>> {
        load_entry(self.conn, id)
    }

    fn list_entries_for_date(&self, date: NaiveDate) -> RepoResult<Vec<Entry>> {
        load_entries_for_date(self.conn, date)
    }

    fn list_entries_in_range(&self, from: NaiveDate, to: NaiveDate) -> RepoResult<Vec<Entry>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ENTRY_SELECT_SQL}
             WHERE entry_date >= ?1
               AND entry_date <= ?2
             ORDER BY entry_date ASC, created_at DESC, rowid DESC;"
        ))?;
        let mut rows = stmt.query(params![from, to])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(parse_entry_row(row)?);
        }
        Ok(entries)
    }

    fn delete_entry_cascade(&self, id: EntryId) -> RepoResult<CascadeDeletion> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let entry = load_entry(&tx, id)?.ok_or(RepoError::EntryNotFound(id))?;

        let deleted_entry_ids = match entry.lineage_id {
            Some(lineage_id) => lineage_entry_ids(&tx, lineage_id)?,
            None => vec![entry.uuid],
        };

        let mut touched = BTreeSet::new();
        for entry_id in &deleted_entry_ids {
            for list_id in membership_list_ids(&tx, *entry_id)? {
                touched.insert(list_id);
            }
            tx.execute(
                "DELETE FROM list_memberships WHERE entry_uuid = ?1;",
                [entry_id.to_string()],
            )?;
        }

        match entry.lineage_id {
            Some(lineage_id) => {
                tx.execute(
                    "DELETE FROM entries WHERE lineage_id = ?1;",
                    [lineage_id.to_string()],
                )?;
                tx.execute(
                    "DELETE FROM pin_lineages WHERE lineage_id = ?1;",
                    [lineage_id.to_string()],
                )?;
            }
            None => {
                tx.execute("DELETE FROM entries WHERE uuid = ?1;", [id.to_string()])?;
            }
        }

        for list_id in &touched {
            compact_list_order(&tx, *list_id)?;
        }

        tx.commit()?;
        info!(
            "event=entry_delete module=repo status=ok entry_id={} lineage_id={} deleted={} lists={}",
            id,
            entry
                .lineage_id
                .map_or_else(|| "none".to_string(), |value| value.to_string()),
            deleted_entry_ids.len(),
            touched.len()
        );

        Ok(CascadeDeletion {
            lineage_id: entry.lineage_id,
            deleted_entry_ids,
            touched_list_ids: touched.into_iter().collect(),
        })
    }
}

/// Creates the daily note for `date` if it does not exist yet.
pub(crate) fn ensure_daily_note(conn: &Connection, date: NaiveDate) -> RepoResult<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO daily_notes (note_date) VALUES (?1);",
        [date],
    )?;
    Ok(inserted > 0)
}

pub(crate) fn load_daily_note(conn: &Connection, date: NaiveDate) -> RepoResult<Option<DailyNote>> {
    let note = conn
        .query_row(
            "SELECT note_date, created_at FROM daily_notes WHERE note_date = ?1;",
            [date],
            |row| {
                Ok(DailyNote {
                    note_date: row.get(0)?,
                    created_at: row.get(1)?,
                })
            },
        )
        .optional()?;
    Ok(note)
}

pub(crate) fn insert_entry(conn: &Connection, entry: &Entry) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO entries (
            uuid,
            entry_date,
            title,
            content,
            is_completed,
            lineage_id,
            is_pin_origin
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
        params![
            entry.uuid.to_string(),
            entry.entry_date,
            entry.title.as_str(),
            entry.content.as_str(),
            bool_to_int(entry.is_completed),
            entry.lineage_id.map(|value| value.to_string()),
            bool_to_int(entry.is_pin_origin),
        ],
    )?;
    Ok(())
}

pub(crate) fn load_entry(conn: &Connection, id: EntryId) -> RepoResult<Option<Entry>> {
    let mut stmt = conn.prepare(&format!("{ENTRY_SELECT_SQL} WHERE uuid = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_entry_row(row)?));
    }
    Ok(None)
}

pub(crate) fn load_required_entry(conn: &Connection, id: EntryId) -> RepoResult<Entry> {
    load_entry(conn, id)?.ok_or(RepoError::EntryNotFound(id))
}

pub(crate) fn load_entries_for_date(conn: &Connection, date: NaiveDate) -> RepoResult<Vec<Entry>> {
    let mut stmt = conn.prepare(&format!(
        "{ENTRY_SELECT_SQL}
         WHERE entry_date = ?1
         ORDER BY created_at DESC, rowid DESC;"
    ))?;
    let mut rows = stmt.query([date])?;
    let mut entries = Vec::new();
    while let Some(row) = rows.next()? {
        entries.push(parse_entry_row(row)?);
    }
    Ok(entries)
}

fn lineage_entry_ids(conn: &Connection, lineage_id: LineageId) -> RepoResult<Vec<EntryId>> {
    let mut stmt = conn.prepare(
        "SELECT uuid
         FROM entries
         WHERE lineage_id = ?1
         ORDER BY entry_date ASC;",
    )?;
    let mut rows = stmt.query([lineage_id.to_string()])?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        let value: String = row.get(0)?;
        ids.push(parse_uuid(&value, "entries.uuid")?);
    }
    Ok(ids)
}

fn membership_list_ids(conn: &Connection, entry_id: EntryId) -> RepoResult<Vec<ListId>> {
    let mut stmt = conn.prepare("SELECT list_uuid FROM list_memberships WHERE entry_uuid = ?1;")?;
    let mut rows = stmt.query([entry_id.to_string()])?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        let value: String = row.get(0)?;
        ids.push(parse_uuid(&value, "list_memberships.list_uuid")?);
    }
    Ok(ids)
}

pub(crate) fn parse_entry_row(row: &Row<'_>) -> RepoResult<Entry> {
    let uuid_text: String = row.get("uuid")?;
    let lineage_id = row
        .get::<_, Option<String>>("lineage_id")?
        .map(|value| parse_uuid(&value, "entries.lineage_id"))
        .transpose()?;

    let entry = Entry {
        uuid: parse_uuid(&uuid_text, "entries.uuid")?,
        entry_date: row.get("entry_date")?,
        title: row.get("title")?,
        content: row.get("content")?,
        is_completed: int_to_bool(row.get("is_completed")?, "entries.is_completed")?,
        lineage_id,
        is_pin_origin: int_to_bool(row.get("is_pin_origin")?, "entries.is_pin_origin")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    };
    entry.validate()?;
    Ok(entry)
}

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

pub(crate) fn int_to_bool(value: i64, column: &'static str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean `{other}` in {column}"
        ))),
    }
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

/// Rejects connections that were not opened through `db::open_db*`.
pub(crate) fn ensure_schema_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }
    Ok(())
}
