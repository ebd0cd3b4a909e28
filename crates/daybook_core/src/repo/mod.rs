//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Every multi-row write runs in one immediate transaction.
//! - Repository APIs return semantic errors (`EntryNotFound`,
//!   `ListNotFound`, ...) in addition to DB transport errors.
//! - Unique indexes are the final arbiter for materialization and
//!   exclusive membership races.

pub mod day_repo;
pub mod entry_repo;
pub mod lineage_repo;
pub mod list_repo;
