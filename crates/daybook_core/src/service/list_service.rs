//! List use-case service.
//!
//! # Responsibility
//! - Manage lists, Kanban columns and entry membership.
//! - Normalize list names before they reach storage.
//!
//! # Invariants
//! - An entry is in at most one list of any exclusivity group.
//! - List names are trimmed and never blank.
//! - Kanban initialization succeeds once per database.
//!
//! # See also
//! - `repo::list_repo` for ordering and exclusivity enforcement.

use crate::db::retry::{retry_transient, TransientError};
use crate::model::entry::EntryId;
use crate::model::list::{
    EntryList, ListId, ListMembership, NewList, KANBAN_DEFAULT_COLUMNS, KANBAN_GROUP_ID,
};
use crate::repo::entry_repo::RepoError;
use crate::repo::list_repo::{GroupFilter, ListQuery, ListRepository, MembershipChange};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for list use-cases.
#[derive(Debug)]
pub enum ListServiceError {
    /// List name is empty after trimming.
    InvalidName(String),
    /// Another list already uses the name.
    DuplicateName(String),
    /// Target list does not exist.
    ListNotFound(ListId),
    /// Target entry does not exist.
    EntryNotFound(EntryId),
    /// Entry is not a member of the addressed list.
    NotAMember { list_id: ListId, entry_id: EntryId },
    /// List is not a column of the addressed group.
    NotInGroup { list_id: ListId, group_id: String },
    /// Kanban columns already exist.
    KanbanAlreadyInitialized,
    /// Column sequence repeats or leaves out columns of the group.
    InvalidGroupOrder(String),
    /// Lock or abort failure that survived one retry.
    Transient(RepoError),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for ListServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidName(value) => write!(f, "invalid list name: `{value}`"),
            Self::DuplicateName(value) => write!(f, "list name already exists: `{value}`"),
            Self::ListNotFound(id) => write!(f, "list not found: {id}"),
            Self::EntryNotFound(id) => write!(f, "entry not found: {id}"),
            Self::NotAMember { list_id, entry_id } => {
                write!(f, "entry {entry_id} is not in list {list_id}")
            }
            Self::NotInGroup { list_id, group_id } => {
                write!(f, "list {list_id} is not a column of group `{group_id}`")
            }
            Self::KanbanAlreadyInitialized => write!(f, "kanban board already initialized"),
            Self::InvalidGroupOrder(reason) => write!(f, "invalid column order: {reason}"),
            Self::Transient(err) => write!(f, "storage busy, retry later: {err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ListServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Transient(err) | Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ListServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::ListNotFound(id) => Self::ListNotFound(id),
            RepoError::EntryNotFound(id) => Self::EntryNotFound(id),
            RepoError::NotAMember { list_id, entry_id } => Self::NotAMember { list_id, entry_id },
            RepoError::NotInGroup { list_id, group_id } => Self::NotInGroup { list_id, group_id },
            RepoError::DuplicateListName(name) => Self::DuplicateName(name),
            RepoError::GroupAlreadyInitialized(_) => Self::KanbanAlreadyInitialized,
            RepoError::InvalidGroupOrder { reason, .. } => Self::InvalidGroupOrder(reason),
            other if other.is_transient() => Self::Transient(other),
            other => Self::Repo(other),
        }
    }
}

/// List service facade over repository implementations.
pub struct ListService<R: ListRepository> {
    repo: R,
}

impl<R: ListRepository> ListService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates one list. `group` makes it a column of that exclusivity group.
    pub fn create_list(
        &self,
        name: &str,
        description: &str,
        color: Option<&str>,
        group: Option<&str>,
    ) -> Result<EntryList, ListServiceError> {
        let input = NewList {
            name: normalize_list_name(name)?,
            description: description.trim().to_string(),
            color: color
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string),
            exclusivity_group_id: group
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string),
        };
        let list = retry_transient("list_create", || self.repo.create_list(&input))?;
        info!(
            "event=list_create module=service status=ok list_id={} exclusive={}",
            list.uuid,
            list.is_exclusive()
        );
        Ok(list)
    }

    /// Gets one list by stable ID.
    pub fn get_list(&self, id: ListId) -> Result<EntryList, ListServiceError> {
        self.repo
            .get_list(id)?
            .ok_or(ListServiceError::ListNotFound(id))
    }

    /// Lists ordinary lists, or the columns of `group` when given.
    pub fn list_lists(
        &self,
        group: Option<&str>,
        include_archived: bool,
    ) -> Result<Vec<EntryList>, ListServiceError> {
        let query = ListQuery {
            group: group.map_or(GroupFilter::Ordinary, |value| {
                GroupFilter::Group(value.to_string())
            }),
            include_archived,
        };
        Ok(self.repo.list_lists(&query)?)
    }

    /// Lists Kanban columns in board order.
    pub fn kanban_columns(&self) -> Result<Vec<EntryList>, ListServiceError> {
        self.list_lists(Some(KANBAN_GROUP_ID), true)
    }

    pub fn rename_list(&self, id: ListId, name: &str) -> Result<EntryList, ListServiceError> {
        let name = normalize_list_name(name)?;
        Ok(retry_transient("list_rename", || {
            self.repo.rename_list(id, &name)
        })?)
    }

    pub fn set_list_archived(
        &self,
        id: ListId,
        archived: bool,
    ) -> Result<EntryList, ListServiceError> {
        Ok(retry_transient("list_archive", || {
            self.repo.set_list_archived(id, archived)
        })?)
    }

    /// Deletes one list and its memberships. Entries are kept.
    pub fn delete_list(&self, id: ListId) -> Result<(), ListServiceError> {
        retry_transient("list_delete", || self.repo.delete_list(id))?;
        info!("event=list_delete module=service status=ok list_id={}", id);
        Ok(())
    }

    /// Creates the default Kanban columns. Fails when they already exist.
    pub fn initialize_kanban(&self) -> Result<Vec<EntryList>, ListServiceError> {
        let columns = retry_transient("kanban_init", || {
            self.repo
                .initialize_group(KANBAN_GROUP_ID, &KANBAN_DEFAULT_COLUMNS)
        })?;
        info!(
            "event=kanban_init module=service status=ok columns={}",
            columns.len()
        );
        Ok(columns)
    }

    /// Rewrites the column order of `group_id`; `ordered` names every column
    /// exactly once.
    pub fn reorder_group(
        &self,
        group_id: &str,
        ordered: &[ListId],
    ) -> Result<Vec<EntryList>, ListServiceError> {
        Ok(retry_transient("group_reorder", || {
            self.repo.reorder_group(group_id, ordered)
        })?)
    }

    /// Adds an entry to a list, moving it out of exclusive sibling columns.
    pub fn add_to_list(
        &self,
        list_id: ListId,
        entry_id: EntryId,
    ) -> Result<MembershipChange, ListServiceError> {
        Ok(retry_transient("list_add", || {
            self.repo.add_membership(list_id, entry_id)
        })?)
    }

    /// Removes an entry from a list. Idempotent when it is not a member.
    pub fn remove_from_list(
        &self,
        list_id: ListId,
        entry_id: EntryId,
    ) -> Result<bool, ListServiceError> {
        Ok(retry_transient("list_remove", || {
            self.repo.remove_membership(list_id, entry_id)
        })?)
    }

    /// Moves an entry inside one list; out-of-range indexes clamp.
    pub fn move_within_list(
        &self,
        list_id: ListId,
        entry_id: EntryId,
        new_index: i64,
    ) -> Result<Vec<ListMembership>, ListServiceError> {
        Ok(retry_transient("list_move", || {
            self.repo.move_membership(list_id, entry_id, new_index)
        })?)
    }

    pub fn memberships_for_entry(
        &self,
        entry_id: EntryId,
    ) -> Result<Vec<ListMembership>, ListServiceError> {
        Ok(self.repo.memberships_for_entry(entry_id)?)
    }

    pub fn list_members(&self, list_id: ListId) -> Result<Vec<ListMembership>, ListServiceError> {
        Ok(self.repo.list_members(list_id)?)
    }
}

fn normalize_list_name(name: &str) -> Result<String, ListServiceError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ListServiceError::InvalidName(name.to_string()));
    }
    Ok(trimmed.to_string())
}
