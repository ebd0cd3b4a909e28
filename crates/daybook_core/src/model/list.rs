//! List and list membership domain model.
//!
//! # Responsibility
//! - Define user lists and Kanban columns as one shape.
//! - Define ordered entry membership in a list.
//!
//! # Invariants
//! - Lists sharing a non-null `exclusivity_group_id` are mutually exclusive
//!   for any single entry.
//! - `exclusivity_group_id` is fixed when the list is created.
//! - Membership `order_index` values in one list are `0..n`.

use crate::model::entry::EntryId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for one list.
pub type ListId = Uuid;

/// Declarative key grouping mutually exclusive lists.
pub type ExclusivityGroupId = String;

/// Group key used by the built-in Kanban board.
pub const KANBAN_GROUP_ID: &str = "kanban";

/// Column names created by Kanban initialization, in board order.
pub const KANBAN_DEFAULT_COLUMNS: [&str; 3] = ["To Do", "In Progress", "Done"];

/// Default list color (hex).
pub const DEFAULT_LIST_COLOR: &str = "#3b82f6";

/// A user list or a column of an exclusive board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryList {
    pub uuid: ListId,
    /// Unique across all lists, case-insensitive.
    pub name: String,
    pub description: String,
    pub color: String,
    /// `None` for ordinary, non-exclusive lists.
    pub exclusivity_group_id: Option<ExclusivityGroupId>,
    /// Column position inside the exclusivity group.
    pub group_order: i64,
    pub is_archived: bool,
    /// Number of entries currently in the list.
    pub entry_count: u32,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Epoch milliseconds.
    pub updated_at: i64,
}

impl EntryList {
    pub fn is_exclusive(&self) -> bool {
        self.exclusivity_group_id.is_some()
    }
}

/// Input for list creation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewList {
    pub name: String,
    pub description: String,
    /// Falls back to `DEFAULT_LIST_COLOR`.
    pub color: Option<String>,
    pub exclusivity_group_id: Option<ExclusivityGroupId>,
}

/// One entry's place in one list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListMembership {
    pub list_id: ListId,
    pub list_name: String,
    pub entry_id: EntryId,
    pub exclusivity_group_id: Option<ExclusivityGroupId>,
    pub order_index: i64,
}
