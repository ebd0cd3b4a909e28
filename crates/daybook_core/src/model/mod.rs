//! Journal domain model.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Keep pin lineage and list exclusivity as explicit, typed relations.
//!
//! # Invariants
//! - Every entry, lineage and list is identified by a stable UUID.
//! - Deletion is hard delete; a deleted lineage never comes back.

pub mod entry;
pub mod lineage;
pub mod list;
