//! Pin lineage domain model.
//!
//! # Responsibility
//! - Represent "this entry is pinned" as an explicit relation shared by the
//!   origin entry and all of its materialized copies.
//!
//! # Invariants
//! - One lineage per origin entry.
//! - `active` only gates future materialization; existing copies stay.

use crate::model::entry::EntryId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for one pin lineage.
pub type LineageId = Uuid;

/// The relation linking a pinned origin entry to its copies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinLineage {
    pub lineage_id: LineageId,
    pub origin_entry_id: EntryId,
    /// Copies are only materialized for dates on or after this one.
    pub origin_date: NaiveDate,
    pub active: bool,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Epoch milliseconds.
    pub updated_at: i64,
}

impl PinLineage {
    /// Returns whether a copy is due for `date`.
    pub fn is_due_on(&self, date: NaiveDate) -> bool {
        self.active && date >= self.origin_date
    }
}

/// Pin lifecycle of one entry.
///
/// `Unpinned --pin--> PinnedActive --unpin--> PinnedInactive --pin--> PinnedActive`.
/// Deleting the entry removes the whole lineage, so there is no deleted state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinState {
    Unpinned,
    PinnedActive,
    PinnedInactive,
}

impl PinState {
    /// Derives the state from an optional lineage row.
    pub fn from_lineage(lineage: Option<&PinLineage>) -> Self {
        match lineage {
            None => Self::Unpinned,
            Some(lineage) if lineage.active => Self::PinnedActive,
            Some(_) => Self::PinnedInactive,
        }
    }

    pub fn is_pinned(self) -> bool {
        self == Self::PinnedActive
    }
}

#[cfg(test)]
mod tests {
    use super::{PinLineage, PinState};
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn lineage(active: bool) -> PinLineage {
        PinLineage {
            lineage_id: Uuid::new_v4(),
            origin_entry_id: Uuid::new_v4(),
            origin_date: NaiveDate::from_ymd_opt(2024, 5, 8).unwrap(),
            active,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn due_only_on_or_after_origin_while_active() {
        let active = lineage(true);
        assert!(active.is_due_on(NaiveDate::from_ymd_opt(2024, 5, 8).unwrap()));
        assert!(active.is_due_on(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()));
        assert!(!active.is_due_on(NaiveDate::from_ymd_opt(2024, 5, 7).unwrap()));

        let inactive = lineage(false);
        assert!(!inactive.is_due_on(NaiveDate::from_ymd_opt(2024, 5, 9).unwrap()));
    }

    #[test]
    fn pin_state_follows_lineage_activity() {
        assert_eq!(PinState::from_lineage(None), PinState::Unpinned);
        assert_eq!(
            PinState::from_lineage(Some(&lineage(true))),
            PinState::PinnedActive
        );
        assert_eq!(
            PinState::from_lineage(Some(&lineage(false))),
            PinState::PinnedInactive
        );
        assert!(!PinState::PinnedInactive.is_pinned());
    }
}
