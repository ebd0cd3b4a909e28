//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Keep UI/FFI layers decoupled from storage details.
//! - Replay transactional writes once on lock/abort failures.

pub mod day_service;
pub mod entry_service;
pub mod list_service;
pub mod pin_service;
