//! List and membership repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist lists, exclusivity groups and ordered memberships.
//! - Enforce "one list per exclusivity group per entry" atomically.
//!
//! # Invariants
//! - Membership order is deterministic: `order_index ASC, entry_uuid ASC`.
//! - `order_index` values in one list are rewritten to `0..n` after every
//!   removal or move.
//! - Exclusive add (remove siblings, then insert) is one immediate
//!   transaction; readers never observe the entry in zero or two columns.
//! - `list_memberships.exclusivity_group_id` mirrors the owning list and is
//!   covered by the `ux_list_memberships_group` unique index.

use crate::db::DbError;
use crate::model::entry::EntryId;
use crate::model::list::{
    EntryList, ExclusivityGroupId, ListId, ListMembership, NewList, DEFAULT_LIST_COLOR,
};
use crate::repo::entry_repo::{
    bool_to_int, ensure_schema_ready, int_to_bool, load_entry, parse_uuid, RepoError, RepoResult,
};
use log::{debug, warn};
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, Transaction, TransactionBehavior,
};
use std::collections::HashSet;
use uuid::Uuid;

const LIST_SELECT_SQL: &str = "SELECT
    l.uuid AS uuid,
    l.name AS name,
    l.description AS description,
    l.color AS color,
    l.exclusivity_group_id AS exclusivity_group_id,
    l.group_order AS group_order,
    l.is_archived AS is_archived,
    l.created_at AS created_at,
    l.updated_at AS updated_at,
    (SELECT COUNT(*) FROM list_memberships m WHERE m.list_uuid = l.uuid) AS entry_count
FROM lists l";

const MEMBERSHIP_SELECT_SQL: &str = "SELECT
    m.list_uuid AS list_uuid,
    l.name AS list_name,
    m.entry_uuid AS entry_uuid,
    m.exclusivity_group_id AS exclusivity_group_id,
    m.order_index AS order_index
FROM list_memberships m
INNER JOIN lists l ON l.uuid = m.list_uuid";

/// Which lists a listing query returns.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GroupFilter {
    /// Lists without an exclusivity group.
    #[default]
    Ordinary,
    /// Columns of one exclusivity group, in column order.
    Group(ExclusivityGroupId),
    /// Every list.
    All,
}

/// Query options for listing lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub group: GroupFilter,
    pub include_archived: bool,
}

/// Outcome of adding an entry to a list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipChange {
    /// Every membership of the entry after the operation.
    pub memberships: Vec<ListMembership>,
    /// `false` when the entry already was in the list.
    pub changed: bool,
    /// Exclusive siblings the entry was moved out of.
    pub displaced_from: Vec<ListId>,
}

/// Repository interface for list and membership operations.
pub trait ListRepository {
    /// Creates one list; `name` must already be normalized.
    fn create_list(&self, list: &NewList) -> RepoResult<EntryList>;
    /// Loads one list by id.
    fn get_list(&self, id: ListId) -> RepoResult<Option<EntryList>>;
    /// Lists lists matching the query.
    fn list_lists(&self, query: &ListQuery) -> RepoResult<Vec<EntryList>>;
    /// Renames one list.
    fn rename_list(&self, id: ListId, name: &str) -> RepoResult<EntryList>;
    /// Archives or restores one list.
    fn set_list_archived(&self, id: ListId, archived: bool) -> RepoResult<EntryList>;
    /// Deletes one list and its memberships. Entries are kept.
    fn delete_list(&self, id: ListId) -> RepoResult<()>;
    /// Creates the named columns of an empty exclusivity group.
    fn initialize_group(&self, group_id: &str, names: &[&str]) -> RepoResult<Vec<EntryList>>;
    /// Rewrites column order of one group to the given sequence, which must
    /// name every column of the group exactly once.
    fn reorder_group(&self, group_id: &str, ordered: &[ListId]) -> RepoResult<Vec<EntryList>>;
    /// Adds an entry to a list, leaving any exclusive sibling column.
    fn add_membership(&self, list_id: ListId, entry_id: EntryId) -> RepoResult<MembershipChange>;
    /// Removes an entry from a list. Returns `false` when it was absent.
    fn remove_membership(&self, list_id: ListId, entry_id: EntryId) -> RepoResult<bool>;
    /// Moves an entry to `new_index` inside one list.
    fn move_membership(
        &self,
        list_id: ListId,
        entry_id: EntryId,
        new_index: i64,
    ) -> RepoResult<Vec<ListMembership>>;
    /// Lists every membership of one entry.
    fn memberships_for_entry(&self, entry_id: EntryId) -> RepoResult<Vec<ListMembership>>;
    /// Lists the ordered members of one list.
    fn list_members(&self, list_id: ListId) -> RepoResult<Vec<ListMembership>>;
}

/// SQLite-backed list repository.
pub struct SqliteListRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteListRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn })
    }
}

impl ListRepository for SqliteListRepository<'_> {
    fn create_list(&self, list: &NewList) -> RepoResult<EntryList> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let id = insert_list(&tx, list)?;
        let created = load_required_list(&tx, id)?;
        tx.commit()?;
        Ok(created)
    }

    fn get_list(&self, id: ListId) -> RepoResult<Option<EntryList>> {
        load_list(self.conn, id)
    }

    fn list_lists(&self, query: &ListQuery) -> RepoResult<Vec<EntryList>> {
        let mut sql = format!("{LIST_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if !query.include_archived {
            sql.push_str(" AND l.is_archived = 0");
        }

        match &query.group {
            GroupFilter::Ordinary => {
                sql.push_str(" AND l.exclusivity_group_id IS NULL ORDER BY l.name COLLATE NOCASE ASC");
            }
            GroupFilter::Group(group_id) => {
                sql.push_str(" AND l.exclusivity_group_id = ? ORDER BY l.group_order ASC, l.uuid ASC");
                bind_values.push(Value::Text(group_id.clone()));
            }
            GroupFilter::All => {
                sql.push_str(
                    " ORDER BY l.exclusivity_group_id IS NOT NULL, l.exclusivity_group_id ASC,
                      l.group_order ASC, l.name COLLATE NOCASE ASC",
                );
            }
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut lists = Vec::new();
        while let Some(row) = rows.next()? {
            lists.push(parse_list_row(row)?);
        }
        Ok(lists)
    }

    fn rename_list(&self, id: ListId, name: &str) -> RepoResult<EntryList> {
        let changed = self
            .conn
            .execute(
                "UPDATE lists
                 SET name = ?2,
                     updated_at = (strftime('%s', 'now') * 1000)
                 WHERE uuid = ?1;",
                params![id.to_string(), name],
            )
            .map_err(|err| map_duplicate_name(err, name))?;
        if changed == 0 {
            return Err(RepoError::ListNotFound(id));
        }
        load_required_list(self.conn, id)
    }

    fn set_list_archived(&self, id: ListId, archived: bool) -> RepoResult<EntryList> {
        let changed = self.conn.execute(
            "UPDATE lists
             SET is_archived = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![id.to_string(), bool_to_int(archived)],
        )?;
        if changed == 0 {
            return Err(RepoError::ListNotFound(id));
        }
        load_required_list(self.conn, id)
    }

    fn delete_list(&self, id: ListId) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "DELETE FROM list_memberships WHERE list_uuid = ?1;",
            [id.to_string()],
        )?;
        let changed = tx.execute("DELETE FROM lists WHERE uuid = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::ListNotFound(id));
        }
        tx.commit()?;
        Ok(())
    }

    fn initialize_group(&self, group_id: &str, names: &[&str]) -> RepoResult<Vec<EntryList>> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let existing: i64 = tx.query_row(
            "SELECT COUNT(*) FROM lists WHERE exclusivity_group_id = ?1;",
            [group_id],
            |row| row.get(0),
        )?;
        if existing > 0 {
            return Err(RepoError::GroupAlreadyInitialized(group_id.to_string()));
        }

        let mut ids = Vec::with_capacity(names.len());
        for name in names {
            ids.push(insert_list(
                &tx,
                &NewList {
                    name: (*name).to_string(),
                    exclusivity_group_id: Some(group_id.to_string()),
                    ..NewList::default()
                },
            )?);
        }

        let mut columns = Vec::with_capacity(ids.len());
        for id in ids {
            columns.push(load_required_list(&tx, id)?);
        }
        tx.commit()?;
        Ok(columns)
    }

    fn reorder_group(&self, group_id: &str, ordered: &[ListId]) -> RepoResult<Vec<EntryList>> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let mut seen = HashSet::with_capacity(ordered.len());
        for list_id in ordered {
            let list = load_required_list(&tx, *list_id)?;
            if list.exclusivity_group_id.as_deref() != Some(group_id) {
                return Err(RepoError::NotInGroup {
                    list_id: *list_id,
                    group_id: group_id.to_string(),
                });
            }
            if !seen.insert(*list_id) {
                return Err(RepoError::InvalidGroupOrder {
                    group_id: group_id.to_string(),
                    reason: format!("list {list_id} appears more than once"),
                });
            }
        }
        let column_count: i64 = tx.query_row(
            "SELECT COUNT(*) FROM lists WHERE exclusivity_group_id = ?1;",
            [group_id],
            |row| row.get(0),
        )?;
        if column_count != ordered.len() as i64 {
            return Err(RepoError::InvalidGroupOrder {
                group_id: group_id.to_string(),
                reason: format!(
                    "expected all {column_count} columns, got {}",
                    ordered.len()
                ),
            });
        }

        for (index, list_id) in ordered.iter().enumerate() {
            tx.execute(
                "UPDATE lists
                 SET group_order = ?2,
                     updated_at = (strftime('%s', 'now') * 1000)
                 WHERE uuid = ?1;",
                params![list_id.to_string(), index as i64],
            )?;
        }
        tx.commit()?;

        self.list_lists(&ListQuery {
            group: GroupFilter::Group(group_id.to_string()),
            include_archived: true,
        })
    }

    fn add_membership(&self, list_id: ListId, entry_id: EntryId) -> RepoResult<MembershipChange> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let list = load_required_list(&tx, list_id)?;
        if load_entry(&tx, entry_id)?.is_none() {
            return Err(RepoError::EntryNotFound(entry_id));
        }

        if membership_exists(&tx, list_id, entry_id)? {
            // Also repairs a stray second column left in the same group.
            let displaced_from = match list.exclusivity_group_id.as_deref() {
                Some(group_id) => leave_group(&tx, entry_id, group_id, Some(list_id))?,
                None => Vec::new(),
            };
            let memberships = load_entry_memberships(&tx, entry_id)?;
            tx.commit()?;
            debug!(
                "event=list_add module=repo status=noop list_id={} entry_id={}",
                list_id, entry_id
            );
            return Ok(MembershipChange {
                memberships,
                changed: !displaced_from.is_empty(),
                displaced_from,
            });
        }

        let displaced_from = match list.exclusivity_group_id.as_deref() {
            Some(group_id) => leave_group(&tx, entry_id, group_id, None)?,
            None => Vec::new(),
        };

        append_membership(&tx, &list, entry_id)?;

        let memberships = load_entry_memberships(&tx, entry_id)?;
        tx.commit()?;
        debug!(
            "event=list_add module=repo status=ok list_id={} entry_id={} displaced={}",
            list_id,
            entry_id,
            displaced_from.len()
        );
        Ok(MembershipChange {
            memberships,
            changed: true,
            displaced_from,
        })
    }

    fn remove_membership(&self, list_id: ListId, entry_id: EntryId) -> RepoResult<bool> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        load_required_list(&tx, list_id)?;
        let removed = tx.execute(
            "DELETE FROM list_memberships WHERE list_uuid = ?1 AND entry_uuid = ?2;",
            params![list_id.to_string(), entry_id.to_string()],
        )?;
        if removed > 0 {
            compact_list_order(&tx, list_id)?;
        }
        tx.commit()?;
        Ok(removed > 0)
    }

    fn move_membership(
        &self,
        list_id: ListId,
        entry_id: EntryId,
        new_index: i64,
    ) -> RepoResult<Vec<ListMembership>> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        load_required_list(&tx, list_id)?;
        let mut member_ids = list_member_ids(&tx, list_id)?;
        let Some(position) = member_ids.iter().position(|id| *id == entry_id) else {
            return Err(RepoError::NotAMember { list_id, entry_id });
        };
        member_ids.remove(position);

        let target_index = new_index.clamp(0, member_ids.len() as i64) as usize;
        member_ids.insert(target_index, entry_id);
        write_order(&tx, list_id, &member_ids)?;

        let members = load_list_members(&tx, list_id)?;
        tx.commit()?;
        Ok(members)
    }

    fn memberships_for_entry(&self, entry_id: EntryId) -> RepoResult<Vec<ListMembership>> {
        if load_entry(self.conn, entry_id)?.is_none() {
            return Err(RepoError::EntryNotFound(entry_id));
        }
        let memberships = load_entry_memberships(self.conn, entry_id)?;
        let mut seen_groups = HashSet::new();
        for membership in &memberships {
            if let Some(group_id) = membership.exclusivity_group_id.as_deref() {
                if !seen_groups.insert(group_id) {
                    warn!(
                        "event=invariant_violation module=repo status=error entry_id={} group_id={} reason=multiple_exclusive_memberships",
                        entry_id, group_id
                    );
                }
            }
        }
        Ok(memberships)
    }

    fn list_members(&self, list_id: ListId) -> RepoResult<Vec<ListMembership>> {
        load_required_list(self.conn, list_id)?;
        load_list_members(self.conn, list_id)
    }
}

/// Rewrites `order_index` of one list to `0..n`, keeping relative order.
pub(crate) fn compact_list_order(conn: &Connection, list_id: ListId) -> RepoResult<()> {
    let member_ids = list_member_ids(conn, list_id)?;
    write_order(conn, list_id, &member_ids)
}

/// Removes `entry_id` from every list of `group_id` except `keep`, and
/// returns the lists it left.
fn leave_group(
    conn: &Connection,
    entry_id: EntryId,
    group_id: &str,
    keep: Option<ListId>,
) -> RepoResult<Vec<ListId>> {
    let mut stmt = conn.prepare(
        "SELECT m.list_uuid
         FROM list_memberships m
         INNER JOIN lists l ON l.uuid = m.list_uuid
         WHERE m.entry_uuid = ?1
           AND l.exclusivity_group_id = ?2;",
    )?;
    let mut rows = stmt.query(params![entry_id.to_string(), group_id])?;
    let mut left = Vec::new();
    while let Some(row) = rows.next()? {
        let value: String = row.get(0)?;
        let list_id = parse_uuid(&value, "list_memberships.list_uuid")?;
        if Some(list_id) != keep {
            left.push(list_id);
        }
    }
    drop(rows);
    drop(stmt);

    for list_id in &left {
        conn.execute(
            "DELETE FROM list_memberships WHERE list_uuid = ?1 AND entry_uuid = ?2;",
            params![list_id.to_string(), entry_id.to_string()],
        )?;
        compact_list_order(conn, *list_id)?;
    }
    Ok(left)
}

fn write_order(conn: &Connection, list_id: ListId, member_ids: &[EntryId]) -> RepoResult<()> {
    for (index, entry_id) in member_ids.iter().enumerate() {
        conn.execute(
            "UPDATE list_memberships
             SET order_index = ?3
             WHERE list_uuid = ?1
               AND entry_uuid = ?2
               AND order_index <> ?3;",
            params![list_id.to_string(), entry_id.to_string(), index as i64],
        )?;
    }
    Ok(())
}

fn insert_list(conn: &Connection, list: &NewList) -> RepoResult<ListId> {
    let id = Uuid::new_v4();
    let group_order: i64 = match list.exclusivity_group_id.as_deref() {
        Some(group_id) => conn.query_row(
            "SELECT COALESCE(MAX(group_order), -1) + 1
             FROM lists
             WHERE exclusivity_group_id = ?1;",
            [group_id],
            |row| row.get(0),
        )?,
        None => 0,
    };

    conn.execute(
        "INSERT INTO lists (
            uuid,
            name,
            description,
            color,
            exclusivity_group_id,
            group_order
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
        params![
            id.to_string(),
            list.name.as_str(),
            list.description.as_str(),
            list.color.as_deref().unwrap_or(DEFAULT_LIST_COLOR),
            list.exclusivity_group_id.as_deref(),
            group_order,
        ],
    )
    .map_err(|err| map_duplicate_name(err, &list.name))?;
    Ok(id)
}

fn map_duplicate_name(err: rusqlite::Error, name: &str) -> RepoError {
    let err = DbError::Sqlite(err);
    if err.is_constraint_violation() {
        RepoError::DuplicateListName(name.to_string())
    } else {
        RepoError::Db(err)
    }
}

fn load_list(conn: &Connection, id: ListId) -> RepoResult<Option<EntryList>> {
    let list = conn
        .query_row(
            &format!("{LIST_SELECT_SQL} WHERE l.uuid = ?1;"),
            [id.to_string()],
            |row| Ok(parse_list_row(row)),
        )
        .optional()?;
    list.transpose()
}

fn load_required_list(conn: &Connection, id: ListId) -> RepoResult<EntryList> {
    load_list(conn, id)?.ok_or(RepoError::ListNotFound(id))
}

/// Appends `entry_id` to the end of `list`. A uniqueness violation means a
/// concurrent writer placed the entry in another column of the same group.
fn append_membership(conn: &Connection, list: &EntryList, entry_id: EntryId) -> RepoResult<()> {
    let inserted = conn.execute(
        "INSERT INTO list_memberships (
            list_uuid,
            entry_uuid,
            exclusivity_group_id,
            order_index
        ) VALUES (
            ?1,
            ?2,
            ?3,
            (SELECT COUNT(*) FROM list_memberships WHERE list_uuid = ?1)
        );",
        params![
            list.uuid.to_string(),
            entry_id.to_string(),
            list.exclusivity_group_id.as_deref(),
        ],
    );
    if let Err(err) = inserted {
        let err = DbError::Sqlite(err);
        if err.is_constraint_violation() {
            return Err(RepoError::TransactionAborted(
                "exclusive membership changed during add",
            ));
        }
        return Err(err.into());
    }
    Ok(())
}

fn membership_exists(conn: &Connection, list_id: ListId, entry_id: EntryId) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM list_memberships
            WHERE list_uuid = ?1
              AND entry_uuid = ?2
        );",
        params![list_id.to_string(), entry_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn list_member_ids(conn: &Connection, list_id: ListId) -> RepoResult<Vec<EntryId>> {
    let mut stmt = conn.prepare(
        "SELECT entry_uuid
         FROM list_memberships
         WHERE list_uuid = ?1
         ORDER BY order_index ASC, entry_uuid ASC;",
    )?;
    let mut rows = stmt.query([list_id.to_string()])?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        let value: String = row.get(0)?;
        ids.push(parse_uuid(&value, "list_memberships.entry_uuid")?);
    }
    Ok(ids)
}

fn load_list_members(conn: &Connection, list_id: ListId) -> RepoResult<Vec<ListMembership>> {
    let mut stmt = conn.prepare(&format!(
        "{MEMBERSHIP_SELECT_SQL}
         WHERE m.list_uuid = ?1
         ORDER BY m.order_index ASC, m.entry_uuid ASC;"
    ))?;
    let mut rows = stmt.query([list_id.to_string()])?;
    let mut members = Vec::new();
    while let Some(row) = rows.next()? {
        members.push(parse_membership_row(row)?);
    }
    Ok(members)
}

fn load_entry_memberships(conn: &Connection, entry_id: EntryId) -> RepoResult<Vec<ListMembership>> {
    let mut stmt = conn.prepare(&format!(
        "{MEMBERSHIP_SELECT_SQL}
         WHERE m.entry_uuid = ?1
         ORDER BY l.exclusivity_group_id IS NOT NULL, l.group_order ASC, l.name COLLATE NOCASE ASC;"
    ))?;
    let mut rows = stmt.query([entry_id.to_string()])?;
    let mut memberships = Vec::new();
    while let Some(row) = rows.next()? {
        memberships.push(parse_membership_row(row)?);
    }
    Ok(memberships)
}

fn parse_list_row(row: &Row<'_>) -> RepoResult<EntryList> {
    let uuid_text: String = row.get("uuid")?;
    Ok(EntryList {
        uuid: parse_uuid(&uuid_text, "lists.uuid")?,
        name: row.get("name")?,
        description: row.get("description")?,
        color: row.get("color")?,
        exclusivity_group_id: row.get("exclusivity_group_id")?,
        group_order: row.get("group_order")?,
        is_archived: int_to_bool(row.get("is_archived")?, "lists.is_archived")?,
        entry_count: row.get("entry_count")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_membership_row(row: &Row<'_>) -> RepoResult<ListMembership> {
    let list_text: String = row.get("list_uuid")?;
    let entry_text: String = row.get("entry_uuid")?;
    Ok(ListMembership {
        list_id: parse_uuid(&list_text, "list_memberships.list_uuid")?,
        list_name: row.get("list_name")?,
        entry_id: parse_uuid(&entry_text, "list_memberships.entry_uuid")?,
        exclusivity_group_id: row.get("exclusivity_group_id")?,
        order_index: row.get("order_index")?,
    })
}

#[cfg(test)]
mod tests {
    use super::{append_membership, ListRepository, SqliteListRepository};
    use crate::db::open_db_in_memory;
    use crate::model::entry::Entry;
    use crate::model::list::{KANBAN_DEFAULT_COLUMNS, KANBAN_GROUP_ID};
    use crate::repo::entry_repo::{ensure_daily_note, insert_entry, RepoError};
    use chrono::NaiveDate;

    #[test]
    fn second_column_insert_aborts_on_group_conflict() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteListRepository::try_new(&conn).unwrap();
        let columns = repo
            .initialize_group(KANBAN_GROUP_ID, &KANBAN_DEFAULT_COLUMNS)
            .unwrap();
        let entry = Entry::new(
            NaiveDate::from_ymd_opt(2024, 5, 8).unwrap(),
            "Card",
            "",
        );
        ensure_daily_note(&conn, entry.entry_date).unwrap();
        insert_entry(&conn, &entry).unwrap();
        repo.add_membership(columns[0].uuid, entry.uuid).unwrap();

        let err = append_membership(&conn, &columns[1], entry.uuid).unwrap_err();
        assert!(matches!(err, RepoError::TransactionAborted(_)));

        let memberships = repo.memberships_for_entry(entry.uuid).unwrap();
        assert_eq!(memberships.len(), 1);
        assert_eq!(memberships[0].list_id, columns[0].uuid);
    }
}
