//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose day, pin, list and entry use-cases to Dart via FRB.
//! - Translate string ids and ISO dates at the boundary.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Every failure is reported through an envelope with `ok = false`.
//! - One connection is opened per call; no state is cached besides the
//!   resolved DB path.

use chrono::NaiveDate;
use daybook_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, open_db,
    ping as ping_inner, DayEntry, DayService, EntryList, EntryService, ListMembership,
    ListService, PinRecord, PinService, PinState, SqliteDayRepository, SqliteEntryRepository,
    SqliteLineageRepository, SqliteListRepository,
};
use log::warn;
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::OnceLock;
use uuid::Uuid;

const DB_FILE_NAME: &str = "daybook.sqlite3";
const DB_PATH_ENV: &str = "DAYBOOK_DB_PATH";
static DB_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir`.
/// - Returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// One entry as rendered on a day view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayEntryItem {
    pub entry_id: String,
    /// ISO `YYYY-MM-DD`.
    pub entry_date: String,
    pub title: String,
    pub content: String,
    pub is_completed: bool,
    /// Lineage is currently active.
    pub pinned: bool,
    pub is_pin_origin: bool,
    pub lineage_id: Option<String>,
}

/// Day view envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayResponse {
    pub ok: bool,
    pub note_date: String,
    /// Newest first; includes pinned copies.
    pub entries: Vec<DayEntryItem>,
    pub message: String,
}

/// Pin transition envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinResponse {
    pub ok: bool,
    pub entry_id: String,
    /// `unpinned|pinned|paused`.
    pub state: String,
    pub lineage_id: Option<String>,
    pub message: String,
}

/// Generic action envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResponse {
    pub ok: bool,
    /// Created or affected object id.
    pub id: Option<String>,
    pub message: String,
}

impl ActionResponse {
    fn success(message: impl Into<String>, id: Option<String>) -> Self {
        Self {
            ok: true,
            id,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            id: None,
            message: message.into(),
        }
    }
}

/// One list membership of an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipItem {
    pub list_id: String,
    pub list_name: String,
    pub group_id: Option<String>,
    pub order_index: i64,
}

/// Membership set envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipsResponse {
    pub ok: bool,
    pub items: Vec<MembershipItem>,
    pub message: String,
}

/// Ordered list contents envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorderResponse {
    pub ok: bool,
    pub entry_ids: Vec<String>,
    pub message: String,
}

/// One list or Kanban column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItem {
    pub list_id: String,
    pub name: String,
    pub color: String,
    pub group_id: Option<String>,
    pub group_order: i64,
    pub entry_count: u32,
}

/// List set envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListsResponse {
    pub ok: bool,
    pub items: Vec<ListItem>,
    pub message: String,
}

/// Loads a day, creating copies of pinned entries that are due on it.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - `date` must be ISO `YYYY-MM-DD`.
#[flutter_rust_bridge::frb(sync)]
pub fn get_day(date: String) -> DayResponse {
    let result = parse_date(&date).and_then(|date| {
        with_conn(|conn| {
            let repo = SqliteDayRepository::try_new(conn).map_err(|err| err.to_string())?;
            DayService::new(repo)
                .get_day(date)
                .map_err(|err| err.to_string())
        })
    });
    match result {
        Ok(record) => DayResponse {
            ok: true,
            note_date: record.note.note_date.to_string(),
            message: format!("{} entries.", record.entries.len()),
            entries: record.entries.into_iter().map(to_day_entry_item).collect(),
        },
        Err(err) => DayResponse {
            ok: false,
            note_date: date.trim().to_string(),
            entries: Vec::new(),
            message: failure_message("get_day", &err),
        },
    }
}

/// Pins one entry so it appears on every later day.
#[flutter_rust_bridge::frb(sync)]
pub fn pin_entry(entry_id: String) -> PinResponse {
    pin_call("pin_entry", &entry_id, |service, id| service.pin(id))
}

/// Stops future copies of an entry. Existing copies stay.
#[flutter_rust_bridge::frb(sync)]
pub fn unpin_entry(entry_id: String) -> PinResponse {
    pin_call("unpin_entry", &entry_id, |service, id| service.unpin(id))
}

/// Flips an entry between pinned and not pinned.
#[flutter_rust_bridge::frb(sync)]
pub fn toggle_pin(entry_id: String) -> PinResponse {
    pin_call("toggle_pin", &entry_id, |service, id| service.toggle_pin(id))
}

/// Deletes an entry, and its whole lineage when it was pinned.
#[flutter_rust_bridge::frb(sync)]
pub fn delete_entry(entry_id: String) -> ActionResponse {
    let result = parse_id(&entry_id, "entry_id").and_then(|id| {
        with_conn(|conn| {
            let repo = SqliteEntryRepository::try_new(conn).map_err(|err| err.to_string())?;
            EntryService::new(repo)
                .delete_entry(id)
                .map_err(|err| err.to_string())
        })
    });
    match result {
        Ok(deletion) => ActionResponse::success(
            format!("Deleted {} entries.", deletion.deleted_entry_ids.len()),
            Some(entry_id.trim().to_string()),
        ),
        Err(err) => ActionResponse::failure(failure_message("delete_entry", &err)),
    }
}

/// Creates an unpinned entry on `date`.
#[flutter_rust_bridge::frb(sync)]
pub fn create_entry(date: String, title: String, content: String) -> ActionResponse {
    let result = parse_date(&date).and_then(|date| {
        with_conn(|conn| {
            let repo = SqliteEntryRepository::try_new(conn).map_err(|err| err.to_string())?;
            EntryService::new(repo)
                .create_entry(date, title.trim(), content)
                .map_err(|err| err.to_string())
        })
    });
    match result {
        Ok(entry) => ActionResponse::success("Entry created.", Some(entry.uuid.to_string())),
        Err(err) => ActionResponse::failure(failure_message("create_entry", &err)),
    }
}

/// Adds an entry to a list; Kanban columns are mutually exclusive.
#[flutter_rust_bridge::frb(sync)]
pub fn add_entry_to_list(list_id: String, entry_id: String) -> MembershipsResponse {
    let result = parse_id_pair(&list_id, &entry_id).and_then(|(list_id, entry_id)| {
        with_list_service(|service| {
            service
                .add_to_list(list_id, entry_id)
                .map(|change| change.memberships)
                .map_err(|err| err.to_string())
        })
    });
    match result {
        Ok(memberships) => MembershipsResponse {
            ok: true,
            message: format!("Entry is in {} list(s).", memberships.len()),
            items: memberships.into_iter().map(to_membership_item).collect(),
        },
        Err(err) => MembershipsResponse {
            ok: false,
            items: Vec::new(),
            message: failure_message("add_entry_to_list", &err),
        },
    }
}

/// Removes an entry from a list. Succeeds when it was not a member.
#[flutter_rust_bridge::frb(sync)]
pub fn remove_entry_from_list(list_id: String, entry_id: String) -> ActionResponse {
    let result = parse_id_pair(&list_id, &entry_id).and_then(|(list_id, entry_id)| {
        with_list_service(|service| {
            service
                .remove_from_list(list_id, entry_id)
                .map_err(|err| err.to_string())
        })
    });
    match result {
        Ok(true) => ActionResponse::success("Entry removed.", Some(entry_id.trim().to_string())),
        Ok(false) => {
            ActionResponse::success("Entry was not in list.", Some(entry_id.trim().to_string()))
        }
        Err(err) => ActionResponse::failure(failure_message("remove_entry_from_list", &err)),
    }
}

/// Moves an entry to `new_index` inside one list.
#[flutter_rust_bridge::frb(sync)]
pub fn reorder_list(list_id: String, entry_id: String, new_index: i64) -> ReorderResponse {
    let result = parse_id_pair(&list_id, &entry_id).and_then(|(list_id, entry_id)| {
        with_list_service(|service| {
            service
                .move_within_list(list_id, entry_id, new_index)
                .map_err(|err| err.to_string())
        })
    });
    match result {
        Ok(members) => ReorderResponse {
            ok: true,
            entry_ids: members
                .into_iter()
                .map(|member| member.entry_id.to_string())
                .collect(),
            message: "List reordered.".to_string(),
        },
        Err(err) => ReorderResponse {
            ok: false,
            entry_ids: Vec::new(),
            message: failure_message("reorder_list", &err),
        },
    }
}

/// Creates a list; `group_id` makes it an exclusive column of that group.
#[flutter_rust_bridge::frb(sync)]
pub fn create_list(name: String, group_id: Option<String>) -> ActionResponse {
    let result = with_list_service(|service| {
        service
            .create_list(&name, "", None, group_id.as_deref())
            .map_err(|err| err.to_string())
    });
    match result {
        Ok(list) => ActionResponse::success("List created.", Some(list.uuid.to_string())),
        Err(err) => ActionResponse::failure(failure_message("create_list", &err)),
    }
}

/// Creates the default Kanban columns. Fails when they already exist.
#[flutter_rust_bridge::frb(sync)]
pub fn initialize_kanban() -> ListsResponse {
    match with_list_service(|service| service.initialize_kanban().map_err(|err| err.to_string()))
    {
        Ok(columns) => ListsResponse {
            ok: true,
            items: columns.into_iter().map(to_list_item).collect(),
            message: "Kanban initialized.".to_string(),
        },
        Err(err) => ListsResponse {
            ok: false,
            items: Vec::new(),
            message: failure_message("initialize_kanban", &err),
        },
    }
}

fn pin_call(
    operation: &'static str,
    entry_id: &str,
    f: impl FnOnce(
        &PinService<SqliteLineageRepository<'_>>,
        Uuid,
    ) -> Result<PinRecord, daybook_core::PinServiceError>,
) -> PinResponse {
    let result = parse_id(entry_id, "entry_id").and_then(|id| {
        with_conn(|conn| {
            let repo = SqliteLineageRepository::try_new(conn).map_err(|err| err.to_string())?;
            f(&PinService::new(repo), id).map_err(|err| err.to_string())
        })
    });
    match result {
        Ok(record) => PinResponse {
            ok: true,
            entry_id: record.entry.uuid.to_string(),
            state: pin_state_label(record.state()).to_string(),
            lineage_id: record
                .lineage
                .as_ref()
                .map(|lineage| lineage.lineage_id.to_string()),
            message: if record.changed {
                "Pin state updated.".to_string()
            } else {
                "Pin state unchanged.".to_string()
            },
        },
        Err(err) => PinResponse {
            ok: false,
            entry_id: entry_id.trim().to_string(),
            state: String::new(),
            lineage_id: None,
            message: failure_message(operation, &err),
        },
    }
}

fn with_list_service<T>(
    f: impl FnOnce(&ListService<SqliteListRepository<'_>>) -> Result<T, String>,
) -> Result<T, String> {
    with_conn(|conn| {
        let repo = SqliteListRepository::try_new(conn).map_err(|err| err.to_string())?;
        f(&ListService::new(repo))
    })
}

fn with_conn<T>(f: impl FnOnce(&Connection) -> Result<T, String>) -> Result<T, String> {
    let db_path = resolve_db_path();
    let conn = open_db(&db_path).map_err(|err| format!("DB open failed: {err}"))?;
    f(&conn)
}

fn resolve_db_path() -> PathBuf {
    DB_PATH
        .get_or_init(|| {
            if let Ok(raw) = std::env::var(DB_PATH_ENV) {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(DB_FILE_NAME)
        })
        .clone()
}

fn failure_message(operation: &'static str, err: &str) -> String {
    warn!(
        "event=ffi_call module=ffi status=error operation={} error={}",
        operation, err
    );
    format!("{operation} failed: {err}")
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|err| format!("invalid date `{}`: {err}", value.trim()))
}

fn parse_id(value: &str, field: &str) -> Result<Uuid, String> {
    Uuid::parse_str(value.trim()).map_err(|err| format!("invalid {field} `{}`: {err}", value.trim()))
}

fn parse_id_pair(list_id: &str, entry_id: &str) -> Result<(Uuid, Uuid), String> {
    Ok((parse_id(list_id, "list_id")?, parse_id(entry_id, "entry_id")?))
}

fn pin_state_label(state: PinState) -> &'static str {
    match state {
        PinState::Unpinned => "unpinned",
        PinState::PinnedActive => "pinned",
        PinState::PinnedInactive => "paused",
    }
}

fn to_day_entry_item(day_entry: DayEntry) -> DayEntryItem {
    let DayEntry { entry, pinned } = day_entry;
    DayEntryItem {
        entry_id: entry.uuid.to_string(),
        entry_date: entry.entry_date.to_string(),
        title: entry.title,
        content: entry.content,
        is_completed: entry.is_completed,
        pinned,
        is_pin_origin: entry.is_pin_origin,
        lineage_id: entry.lineage_id.map(|id| id.to_string()),
    }
}

fn to_membership_item(membership: ListMembership) -> MembershipItem {
    MembershipItem {
        list_id: membership.list_id.to_string(),
        list_name: membership.list_name,
        group_id: membership.exclusivity_group_id,
        order_index: membership.order_index,
    }
}

fn to_list_item(list: EntryList) -> ListItem {
    ListItem {
        list_id: list.uuid.to_string(),
        name: list.name,
        color: list.color,
        group_id: list.exclusivity_group_id,
        group_order: list.group_order,
        entry_count: list.entry_count,
    }
}

#[cfg(test)]
mod tests {
    use super::{
        add_entry_to_list, core_version, create_entry, create_list, delete_entry, get_day,
        init_logging, pin_entry, ping, remove_entry_from_list, reorder_list, toggle_pin,
        unpin_entry,
    };
    use std::time::{SystemTime, UNIX_EPOCH};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn init_logging_rejects_empty_log_dir() {
        let error = init_logging("info".to_string(), String::new());
        assert!(!error.is_empty());
    }

    #[test]
    fn init_logging_rejects_unsupported_level() {
        let error = init_logging("verbose".to_string(), "/tmp/logs".to_string());
        assert!(!error.is_empty());
    }

    #[test]
    fn get_day_rejects_malformed_date() {
        let response = get_day("2024-13-40".to_string());
        assert!(!response.ok);
        assert!(response.message.contains("invalid date"));
    }

    #[test]
    fn pin_entry_rejects_malformed_id() {
        let response = pin_entry("not-a-uuid".to_string());
        assert!(!response.ok);
        assert!(response.message.contains("entry_id"));
    }

    #[test]
    fn pinned_entry_shows_up_on_next_day_and_unpin_keeps_copy() {
        let title = unique_token("ffi-pin");
        let created = create_entry("2031-03-01".to_string(), title.clone(), String::new());
        assert!(created.ok, "{}", created.message);
        let entry_id = created.id.unwrap();

        let pinned = pin_entry(entry_id.clone());
        assert!(pinned.ok, "{}", pinned.message);
        assert_eq!(pinned.state, "pinned");

        let next_day = get_day("2031-03-02".to_string());
        assert!(next_day.ok, "{}", next_day.message);
        let copy = next_day
            .entries
            .iter()
            .find(|item| item.title == title)
            .expect("copy should be materialized");
        assert!(copy.pinned);
        assert!(!copy.is_pin_origin);
        assert_eq!(copy.lineage_id, pinned.lineage_id);

        let unpinned = unpin_entry(entry_id.clone());
        assert_eq!(unpinned.state, "paused");
        let again = get_day("2031-03-02".to_string());
        let kept = again
            .entries
            .iter()
            .filter(|item| item.title == title)
            .count();
        assert_eq!(kept, 1);

        assert_eq!(toggle_pin(entry_id.clone()).state, "pinned");
        let deleted = delete_entry(entry_id);
        assert!(deleted.ok, "{}", deleted.message);
        let after = get_day("2031-03-02".to_string());
        assert!(after.entries.iter().all(|item| item.title != title));
    }

    #[test]
    fn exclusive_columns_hold_entry_once() {
        let group = unique_token("ffi-board");
        let first = create_list(unique_token("ffi-col-a"), Some(group.clone()));
        let second = create_list(unique_token("ffi-col-b"), Some(group));
        assert!(first.ok && second.ok, "{} / {}", first.message, second.message);
        let (first, second) = (first.id.unwrap(), second.id.unwrap());

        let entry_id = create_entry("2031-04-01".to_string(), "card".to_string(), String::new())
            .id
            .unwrap();

        let added = add_entry_to_list(first.clone(), entry_id.clone());
        assert!(added.ok, "{}", added.message);
        let moved = add_entry_to_list(second.clone(), entry_id.clone());
        assert!(moved.ok, "{}", moved.message);
        assert_eq!(moved.items.len(), 1);
        assert_eq!(moved.items[0].list_id, second);

        let reordered = reorder_list(second.clone(), entry_id.clone(), 5);
        assert_eq!(reordered.entry_ids, vec![entry_id.clone()]);

        let removed = remove_entry_from_list(first, entry_id.clone());
        assert!(removed.ok);
        assert_eq!(removed.message, "Entry was not in list.");
    }

    fn unique_token(prefix: &str) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time went backwards")
            .as_nanos();
        format!("{prefix}-{nanos}")
    }
}
