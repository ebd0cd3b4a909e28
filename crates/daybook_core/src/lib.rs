//! Core domain logic for Daybook.
//! This crate is the single source of truth for journal, pin and list
//! invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use db::{open_db, open_db_in_memory, DbError};
pub use logging::{default_log_level, init_logging, logging_status, LoggingConfig, LoggingError};
pub use model::entry::{DailyNote, DaySummary, Entry, EntryId};
pub use model::lineage::{LineageId, PinLineage, PinState};
pub use model::list::{
    EntryList, ExclusivityGroupId, ListId, ListMembership, KANBAN_DEFAULT_COLUMNS,
    KANBAN_GROUP_ID,
};
pub use repo::day_repo::{DayEntry, DayRecord, DayRepository, SqliteDayRepository};
pub use repo::entry_repo::{
    CascadeDeletion, EntryRepository, RepoError, RepoResult, SqliteEntryRepository,
};
pub use repo::lineage_repo::{LineageRepository, Materialized, PinRecord, SqliteLineageRepository};
pub use repo::list_repo::{
    GroupFilter, ListQuery, ListRepository, MembershipChange, SqliteListRepository,
};
pub use service::day_service::{DayService, DayServiceError};
pub use service::entry_service::{EntryService, EntryServiceError};
pub use service::list_service::{ListService, ListServiceError};
pub use service::pin_service::{PinService, PinServiceError};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
